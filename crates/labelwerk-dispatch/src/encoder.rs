// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command encoder for the TSPL label language.
//
// Pure function from a print job and a capability profile to the wire
// byte stream: no I/O, no device state, deterministic. Commands are
// validated against the profile first (out-of-range values fail, never
// clamp), serialized one CRLF-terminated line each, then packed into
// transport chunks that never split a command mid-stream.
//
// Multi-value parameters are comma-separated and string parameters are
// double-quoted; the language has no escape form for a quote inside a
// string, so quotes and control bytes are rejected at validation.

use labelwerk_core::error::{LabelwerkError, Result};
use labelwerk_core::types::{LabelCommand, PrintJob, Symbology};

use crate::capabilities::CapabilityProfile;

/// Line terminator of the command language.
const CRLF: &[u8] = b"\r\n";

/// The encoded form of one job: ordered transport-sized chunks.
///
/// Reassembling the chunks in order reproduces the single-stream
/// encoding byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedJob {
    chunks: Vec<Vec<u8>>,
}

impl EncodedJob {
    pub fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<Vec<u8>> {
        self.chunks
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.len()).sum()
    }

    /// The whole stream, chunks concatenated in order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_bytes());
        for chunk in &self.chunks {
            out.extend_from_slice(chunk);
        }
        out
    }
}

/// Encode a job against a device capability profile.
///
/// Fails with `LabelwerkError::Encoding` naming the offending command
/// index and field on the first violation.
pub fn encode(job: &PrintJob, profile: &CapabilityProfile) -> Result<EncodedJob> {
    if job.commands.is_empty() {
        return Err(LabelwerkError::Encoding {
            index: 0,
            verb: "JOB",
            field: "commands",
            reason: "job contains no commands".into(),
        });
    }

    let mut lines = Vec::with_capacity(job.commands.len());
    // Drawing commands are validated against the label set by the most
    // recent SIZE command, tracked in dots.
    let mut label_dots: Option<(u32, u32)> = None;

    for (index, command) in job.commands.iter().enumerate() {
        validate(index, command, profile, &mut label_dots)?;
        let mut line = serialize(command).into_bytes();
        line.extend_from_slice(CRLF);
        if line.len() > profile.buffer_bytes {
            return Err(LabelwerkError::Encoding {
                index,
                verb: command.verb(),
                field: "length",
                reason: format!(
                    "command line of {} bytes exceeds the {}-byte device buffer",
                    line.len(),
                    profile.buffer_bytes
                ),
            });
        }
        lines.push(line);
    }

    Ok(EncodedJob {
        chunks: pack(lines, profile.buffer_bytes),
    })
}

/// Chunk a raw, pre-encoded command-language payload at line boundaries.
///
/// This is the inbound form where the application layer already rendered
/// the command text itself. Bytes pass through unmodified; only the
/// chunking is applied, so capture files and retries see the exact
/// payload the caller provided.
pub fn chunk_payload(payload: &[u8], buffer_bytes: usize) -> Result<EncodedJob> {
    if payload.is_empty() {
        return Err(LabelwerkError::Encoding {
            index: 0,
            verb: "PAYLOAD",
            field: "payload",
            reason: "payload is empty".into(),
        });
    }

    let mut lines = Vec::new();
    let mut start = 0;
    for (pos, byte) in payload.iter().enumerate() {
        if *byte == b'\n' {
            lines.push(payload[start..=pos].to_vec());
            start = pos + 1;
        }
    }
    if start < payload.len() {
        // Final line without a terminator is still one command.
        lines.push(payload[start..].to_vec());
    }

    for (index, line) in lines.iter().enumerate() {
        if line.len() > buffer_bytes {
            return Err(LabelwerkError::Encoding {
                index,
                verb: "PAYLOAD",
                field: "line",
                reason: format!(
                    "line of {} bytes exceeds the {}-byte device buffer",
                    line.len(),
                    buffer_bytes
                ),
            });
        }
    }

    Ok(EncodedJob {
        chunks: pack(lines, buffer_bytes),
    })
}

/// Greedily pack whole lines into chunks of at most `buffer_bytes`.
///
/// Every line fits the buffer (checked by the callers), so each chunk
/// boundary falls on a command boundary.
fn pack(lines: Vec<Vec<u8>>, buffer_bytes: usize) -> Vec<Vec<u8>> {
    let mut chunks = Vec::new();
    let mut current: Vec<u8> = Vec::new();

    for line in lines {
        if !current.is_empty() && current.len() + line.len() > buffer_bytes {
            chunks.push(std::mem::take(&mut current));
        }
        current.extend_from_slice(&line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Render one command as its command-language line (without terminator).
fn serialize(command: &LabelCommand) -> String {
    match command {
        LabelCommand::Size {
            width_mm,
            height_mm,
        } => format!("SIZE {} mm,{} mm", width_mm, height_mm),
        LabelCommand::Gap { gap_mm, offset_mm } => {
            format!("GAP {} mm,{} mm", gap_mm, offset_mm)
        }
        LabelCommand::Density { level } => format!("DENSITY {}", level),
        LabelCommand::Speed { ips } => format!("SPEED {}", ips),
        LabelCommand::Direction { reversed } => {
            format!("DIRECTION {}", u8::from(*reversed))
        }
        LabelCommand::Clear => "CLS".into(),
        LabelCommand::Text {
            x,
            y,
            font,
            rotation,
            x_scale,
            y_scale,
            content,
        } => format!(
            "TEXT {},{},\"{}\",{},{},{},\"{}\"",
            x,
            y,
            font,
            rotation.degrees(),
            x_scale,
            y_scale,
            content
        ),
        LabelCommand::Barcode {
            x,
            y,
            symbology,
            height,
            human_readable,
            rotation,
            narrow,
            wide,
            content,
        } => format!(
            "BARCODE {},{},\"{}\",{},{},{},{},{},\"{}\"",
            x,
            y,
            symbology.tspl_keyword(),
            height,
            u8::from(*human_readable),
            rotation.degrees(),
            narrow,
            wide,
            content
        ),
        LabelCommand::Feed { dots } => format!("FEED {}", dots),
        LabelCommand::Print { sets, copies } => format!("PRINT {},{}", sets, copies),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn err(
    index: usize,
    verb: &'static str,
    field: &'static str,
    reason: impl Into<String>,
) -> LabelwerkError {
    LabelwerkError::Encoding {
        index,
        verb,
        field,
        reason: reason.into(),
    }
}

fn validate(
    index: usize,
    command: &LabelCommand,
    profile: &CapabilityProfile,
    label_dots: &mut Option<(u32, u32)>,
) -> Result<()> {
    let verb = command.verb();
    match command {
        LabelCommand::Size {
            width_mm,
            height_mm,
        } => {
            if *width_mm == 0 || *width_mm > profile.max_width_mm {
                return Err(err(
                    index,
                    verb,
                    "width_mm",
                    format!(
                        "{} outside printable range 1-{}",
                        width_mm, profile.max_width_mm
                    ),
                ));
            }
            if *height_mm == 0 || *height_mm > profile.max_height_mm {
                return Err(err(
                    index,
                    verb,
                    "height_mm",
                    format!(
                        "{} outside printable range 1-{}",
                        height_mm, profile.max_height_mm
                    ),
                ));
            }
            *label_dots = Some((
                profile.width_dots(*width_mm),
                profile.height_dots(*height_mm),
            ));
        }
        LabelCommand::Gap { gap_mm, offset_mm } => {
            if *gap_mm > 25 {
                return Err(err(index, verb, "gap_mm", format!("{} exceeds 25 mm", gap_mm)));
            }
            if *offset_mm > 25 {
                return Err(err(
                    index,
                    verb,
                    "offset_mm",
                    format!("{} exceeds 25 mm", offset_mm),
                ));
            }
        }
        LabelCommand::Density { level } => {
            if *level > profile.max_density {
                return Err(err(
                    index,
                    verb,
                    "level",
                    format!("{} exceeds maximum {}", level, profile.max_density),
                ));
            }
        }
        LabelCommand::Speed { ips } => {
            if *ips == 0 || *ips > profile.max_speed_ips {
                return Err(err(
                    index,
                    verb,
                    "ips",
                    format!("{} outside range 1-{}", ips, profile.max_speed_ips),
                ));
            }
        }
        LabelCommand::Direction { .. } | LabelCommand::Clear => {}
        LabelCommand::Text {
            x,
            y,
            font,
            x_scale,
            y_scale,
            content,
            ..
        } => {
            let (width, height) = drawing_area(profile, label_dots);
            if *x >= width {
                return Err(err(
                    index,
                    verb,
                    "x",
                    format!("{} outside label width of {} dots", x, width),
                ));
            }
            if *y >= height {
                return Err(err(
                    index,
                    verb,
                    "y",
                    format!("{} outside label length of {} dots", y, height),
                ));
            }
            if *font == 0 || *font > profile.font_max {
                return Err(err(
                    index,
                    verb,
                    "font",
                    format!("{} outside range 1-{}", font, profile.font_max),
                ));
            }
            for (field, scale) in [("x_scale", x_scale), ("y_scale", y_scale)] {
                if *scale == 0 || *scale > profile.text_scale_max {
                    return Err(err(
                        index,
                        verb,
                        field,
                        format!("{} outside range 1-{}", scale, profile.text_scale_max),
                    ));
                }
            }
            check_string(index, verb, "content", content)?;
        }
        LabelCommand::Barcode {
            x,
            y,
            symbology,
            height,
            narrow,
            wide,
            content,
            ..
        } => {
            let (width, length) = drawing_area(profile, label_dots);
            if *x >= width {
                return Err(err(
                    index,
                    verb,
                    "x",
                    format!("{} outside label width of {} dots", x, width),
                ));
            }
            if *y >= length {
                return Err(err(
                    index,
                    verb,
                    "y",
                    format!("{} outside label length of {} dots", y, length),
                ));
            }
            if !profile.supports_symbology(*symbology) {
                return Err(err(
                    index,
                    verb,
                    "symbology",
                    format!("{} not supported by this device", symbology.tspl_keyword()),
                ));
            }
            if *height == 0 || *height > length {
                return Err(err(
                    index,
                    verb,
                    "height",
                    format!("{} outside range 1-{} dots", height, length),
                ));
            }
            if *narrow == 0 || *narrow > 10 {
                return Err(err(
                    index,
                    verb,
                    "narrow",
                    format!("{} outside range 1-10", narrow),
                ));
            }
            if *wide < *narrow || *wide > 10 {
                return Err(err(
                    index,
                    verb,
                    "wide",
                    format!("{} outside range {}-10", wide, narrow),
                ));
            }
            check_string(index, verb, "content", content)?;
            check_symbology_content(index, verb, *symbology, content)?;
        }
        LabelCommand::Feed { dots } => {
            if *dots == 0 || *dots > 9999 {
                return Err(err(index, verb, "dots", format!("{} outside range 1-9999", dots)));
            }
        }
        LabelCommand::Print { sets, copies } => {
            for (field, value) in [("sets", sets), ("copies", copies)] {
                if *value == 0 || *value > profile.max_copies {
                    return Err(err(
                        index,
                        verb,
                        field,
                        format!("{} outside range 1-{}", value, profile.max_copies),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Coordinate bounds for drawing commands: the label set by the latest
/// SIZE command, or the device's full printable area before one is seen
/// (firmware falls back to its current stored geometry).
fn drawing_area(profile: &CapabilityProfile, label_dots: &Option<(u32, u32)>) -> (u32, u32) {
    label_dots.unwrap_or((
        profile.width_dots(profile.max_width_mm),
        profile.height_dots(profile.max_height_mm),
    ))
}

/// Quoted string parameters cannot carry quotes or control bytes.
fn check_string(
    index: usize,
    verb: &'static str,
    field: &'static str,
    content: &str,
) -> Result<()> {
    if content.is_empty() {
        return Err(err(index, verb, field, "must not be empty"));
    }
    if let Some(bad) = content.chars().find(|c| *c == '"' || c.is_control()) {
        return Err(err(
            index,
            verb,
            field,
            format!("character {:?} cannot be represented in a quoted parameter", bad),
        ));
    }
    Ok(())
}

/// Per-symbology content rules. The firmware rejects (or worse, garbles)
/// data a symbology cannot carry, so the encoder refuses it up front.
fn check_symbology_content(
    index: usize,
    verb: &'static str,
    symbology: Symbology,
    content: &str,
) -> Result<()> {
    let all_digits = content.bytes().all(|b| b.is_ascii_digit());
    match symbology {
        Symbology::Ean13 => {
            if !all_digits || !matches!(content.len(), 12 | 13) {
                return Err(err(index, verb, "content", "EAN-13 requires 12 or 13 digits"));
            }
        }
        Symbology::Ean8 => {
            if !all_digits || !matches!(content.len(), 7 | 8) {
                return Err(err(index, verb, "content", "EAN-8 requires 7 or 8 digits"));
            }
        }
        Symbology::UpcA => {
            if !all_digits || !matches!(content.len(), 11 | 12) {
                return Err(err(index, verb, "content", "UPC-A requires 11 or 12 digits"));
            }
        }
        Symbology::Interleaved2of5 => {
            if !all_digits || content.len() % 2 != 0 {
                return Err(err(
                    index,
                    verb,
                    "content",
                    "Interleaved 2 of 5 requires an even number of digits",
                ));
            }
        }
        Symbology::Code39 => {
            if !content
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b" -.$/+%".contains(&b))
            {
                return Err(err(
                    index,
                    verb,
                    "content",
                    "Code 39 carries only uppercase letters, digits, and -.$/+% space",
                ));
            }
        }
        Symbology::Codabar => {
            if !content
                .bytes()
                .all(|b| b.is_ascii_digit() || b"-$:/.+ABCD".contains(&b))
            {
                return Err(err(
                    index,
                    verb,
                    "content",
                    "Codabar carries only digits, -$:/.+ and A-D start/stop",
                ));
            }
        }
        Symbology::Code128 => {
            if !content.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
                return Err(err(
                    index,
                    verb,
                    "content",
                    "Code 128 carries only printable ASCII",
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelwerk_core::types::{DeviceIdentity, LabelCommand, Rotation};

    fn text(content: &str) -> LabelCommand {
        LabelCommand::Text {
            x: 10,
            y: 20,
            font: 3,
            rotation: Rotation::None,
            x_scale: 1,
            y_scale: 1,
            content: content.into(),
        }
    }

    fn job(commands: Vec<LabelCommand>) -> PrintJob {
        PrintJob::new(DeviceIdentity::network("192.168.1.50", 9100), commands)
    }

    fn simple_job() -> PrintJob {
        job(vec![
            LabelCommand::Size {
                width_mm: 60,
                height_mm: 40,
            },
            LabelCommand::Clear,
            text("HELLO"),
            LabelCommand::Print { sets: 1, copies: 1 },
        ])
    }

    #[test]
    fn encoding_is_deterministic() {
        let job = simple_job();
        let profile = CapabilityProfile::default();
        let first = encode(&job, &profile).expect("encode");
        let second = encode(&job, &profile).expect("encode again");
        assert_eq!(first.to_bytes(), second.to_bytes());
        assert_eq!(first.chunks(), second.chunks());
    }

    #[test]
    fn serialization_matches_command_language() {
        let encoded = encode(&simple_job(), &CapabilityProfile::default()).expect("encode");
        let text = String::from_utf8(encoded.to_bytes()).expect("utf8");
        assert_eq!(
            text,
            "SIZE 60 mm,40 mm\r\nCLS\r\nTEXT 10,20,\"3\",0,1,1,\"HELLO\"\r\nPRINT 1,1\r\n"
        );
    }

    #[test]
    fn barcode_line_renders_all_parameters() {
        let j = job(vec![
            LabelCommand::Size {
                width_mm: 60,
                height_mm: 40,
            },
            LabelCommand::Barcode {
                x: 16,
                y: 100,
                symbology: Symbology::Code128,
                height: 64,
                human_readable: true,
                rotation: Rotation::None,
                narrow: 2,
                wide: 4,
                content: "ABC-123".into(),
            },
        ]);
        let encoded = encode(&j, &CapabilityProfile::default()).expect("encode");
        let text = String::from_utf8(encoded.to_bytes()).expect("utf8");
        assert!(text.contains("BARCODE 16,100,\"128\",64,1,0,2,4,\"ABC-123\"\r\n"));
    }

    #[test]
    fn unsupported_symbology_names_command_index_and_field() {
        let profile = CapabilityProfile {
            symbologies: [Symbology::Code128].into_iter().collect(),
            ..Default::default()
        };
        let j = job(vec![
            LabelCommand::Size {
                width_mm: 60,
                height_mm: 40,
            },
            LabelCommand::Barcode {
                x: 16,
                y: 100,
                symbology: Symbology::Codabar,
                height: 64,
                human_readable: false,
                rotation: Rotation::None,
                narrow: 2,
                wide: 4,
                content: "A1234A".into(),
            },
        ]);
        let error = encode(&j, &profile).expect_err("must fail");
        match error {
            LabelwerkError::Encoding { index, field, .. } => {
                assert_eq!(index, 1);
                assert_eq!(field, "symbology");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn values_fail_instead_of_clamping() {
        let j = job(vec![LabelCommand::Size {
            width_mm: 500,
            height_mm: 40,
        }]);
        let error = encode(&j, &CapabilityProfile::default()).expect_err("must fail");
        match error {
            LabelwerkError::Encoding { index, field, .. } => {
                assert_eq!(index, 0);
                assert_eq!(field, "width_mm");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn text_then_unsupported_barcode_fails_at_index_one() {
        let profile = CapabilityProfile {
            symbologies: [Symbology::Code128].into_iter().collect(),
            ..Default::default()
        };
        let j = job(vec![
            text("HELLO"),
            LabelCommand::Barcode {
                x: 16,
                y: 100,
                symbology: Symbology::Ean8,
                height: 64,
                human_readable: false,
                rotation: Rotation::None,
                narrow: 2,
                wide: 4,
                content: "1234567".into(),
            },
        ]);
        let error = encode(&j, &profile).expect_err("must fail");
        match error {
            LabelwerkError::Encoding { index, verb, field, .. } => {
                assert_eq!(index, 1);
                assert_eq!(verb, "BARCODE");
                assert_eq!(field, "symbology");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn quote_in_content_is_rejected() {
        let j = job(vec![
            LabelCommand::Size {
                width_mm: 60,
                height_mm: 40,
            },
            text("say \"hi\""),
        ]);
        let error = encode(&j, &CapabilityProfile::default()).expect_err("must fail");
        match error {
            LabelwerkError::Encoding { index, field, .. } => {
                assert_eq!(index, 1);
                assert_eq!(field, "content");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn ean13_content_rules() {
        let barcode = |content: &str| {
            job(vec![
                LabelCommand::Size {
                    width_mm: 60,
                    height_mm: 40,
                },
                LabelCommand::Barcode {
                    x: 16,
                    y: 100,
                    symbology: Symbology::Ean13,
                    height: 64,
                    human_readable: true,
                    rotation: Rotation::None,
                    narrow: 2,
                    wide: 4,
                    content: content.into(),
                },
            ])
        };
        let profile = CapabilityProfile::default();
        assert!(encode(&barcode("471952031526"), &profile).is_ok());
        assert!(encode(&barcode("4719520315260"), &profile).is_ok());
        assert!(encode(&barcode("12345"), &profile).is_err());
        assert!(encode(&barcode("47195203152A"), &profile).is_err());
    }

    #[test]
    fn itf_requires_even_digit_count() {
        let j = job(vec![
            LabelCommand::Size {
                width_mm: 60,
                height_mm: 40,
            },
            LabelCommand::Barcode {
                x: 16,
                y: 100,
                symbology: Symbology::Interleaved2of5,
                height: 64,
                human_readable: false,
                rotation: Rotation::None,
                narrow: 2,
                wide: 4,
                content: "12345".into(),
            },
        ]);
        assert!(encode(&j, &CapabilityProfile::default()).is_err());
    }

    #[test]
    fn long_job_chunks_at_command_boundaries() {
        let mut commands = vec![LabelCommand::Size {
            width_mm: 60,
            height_mm: 40,
        }];
        for _ in 0..50 {
            commands.push(text("HELLO"));
        }
        commands.push(LabelCommand::Print { sets: 1, copies: 1 });
        let j = job(commands);

        // Shrink the buffer so the job cannot fit one chunk.
        let profile = CapabilityProfile {
            buffer_bytes: 256,
            ..Default::default()
        };
        let encoded = encode(&j, &profile).expect("encode");
        assert!(encoded.chunk_count() >= 2, "expected multiple chunks");

        for chunk in encoded.chunks() {
            assert!(chunk.len() <= 256);
            // Whole commands only: every chunk ends on a line terminator.
            assert!(chunk.ends_with(b"\r\n"));
        }

        // Reassembly reproduces the single-stream encoding.
        let whole_profile = CapabilityProfile {
            buffer_bytes: 1 << 20,
            ..Default::default()
        };
        let whole = encode(&j, &whole_profile).expect("encode unchunked");
        assert_eq!(whole.chunk_count(), 1);
        assert_eq!(encoded.to_bytes(), whole.to_bytes());
    }

    #[test]
    fn oversized_single_command_is_rejected() {
        let j = job(vec![
            LabelCommand::Size {
                width_mm: 60,
                height_mm: 40,
            },
            text(&"X".repeat(300)),
        ]);
        let profile = CapabilityProfile {
            buffer_bytes: 128,
            ..Default::default()
        };
        let error = encode(&j, &profile).expect_err("must fail");
        match error {
            LabelwerkError::Encoding { index, field, .. } => {
                assert_eq!(index, 1);
                assert_eq!(field, "length");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_job_is_rejected() {
        let j = job(vec![]);
        assert!(encode(&j, &CapabilityProfile::default()).is_err());
    }

    #[test]
    fn raw_payload_chunks_at_line_boundaries() {
        let payload = b"SIZE 60 mm,40 mm\r\nCLS\r\nTEXT 10,20,\"3\",0,1,1,\"HELLO\"\r\nPRINT 1,1\r\n";
        let encoded = chunk_payload(payload, 32).expect("chunk");
        assert!(encoded.chunk_count() >= 2);
        assert_eq!(encoded.to_bytes(), payload);
        for chunk in encoded.chunks() {
            assert!(chunk.ends_with(b"\n"));
        }
    }

    #[test]
    fn raw_payload_passes_through_unmodified() {
        let payload = b"CLS\nPRINT 1\n";
        let encoded = chunk_payload(payload, 4096).expect("chunk");
        assert_eq!(encoded.chunk_count(), 1);
        assert_eq!(encoded.to_bytes(), payload);
    }

    #[test]
    fn raw_payload_oversized_line_is_rejected() {
        let mut payload = vec![b'A'; 100];
        payload.push(b'\n');
        assert!(chunk_payload(&payload, 50).is_err());
    }
}
