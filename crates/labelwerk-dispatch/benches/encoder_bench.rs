// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for command encoding and chunking in the
// labelwerk-dispatch crate.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use labelwerk_dispatch::capabilities::CapabilityProfile;
use labelwerk_dispatch::encoder::{chunk_payload, encode};
use labelwerk_core::types::{DeviceIdentity, LabelCommand, PrintJob, Rotation, Symbology};

/// A shipping label with the typical mix: geometry, a few text runs, a
/// barcode, and the print trigger.
fn shipping_label() -> PrintJob {
    PrintJob::new(
        DeviceIdentity::network("192.168.1.50", 9100),
        vec![
            LabelCommand::Size {
                width_mm: 100,
                height_mm: 150,
            },
            LabelCommand::Gap {
                gap_mm: 3,
                offset_mm: 0,
            },
            LabelCommand::Density { level: 8 },
            LabelCommand::Clear,
            LabelCommand::Text {
                x: 16,
                y: 16,
                font: 3,
                rotation: Rotation::None,
                x_scale: 1,
                y_scale: 1,
                content: "SHIP TO".into(),
            },
            LabelCommand::Text {
                x: 16,
                y: 64,
                font: 4,
                rotation: Rotation::None,
                x_scale: 1,
                y_scale: 1,
                content: "221B BAKER STREET".into(),
            },
            LabelCommand::Barcode {
                x: 16,
                y: 400,
                symbology: Symbology::Code128,
                height: 128,
                human_readable: true,
                rotation: Rotation::None,
                narrow: 2,
                wide: 4,
                content: "PKG-0042-GB".into(),
            },
            LabelCommand::Print { sets: 1, copies: 1 },
        ],
    )
}

/// A long job: many text runs, forcing the chunker to work.
fn dense_label(lines: usize) -> PrintJob {
    let mut commands = vec![
        LabelCommand::Size {
            width_mm: 100,
            height_mm: 150,
        },
        LabelCommand::Clear,
    ];
    for i in 0..lines {
        commands.push(LabelCommand::Text {
            x: 16,
            y: (i as u32 % 140) * 8,
            font: 2,
            rotation: Rotation::None,
            x_scale: 1,
            y_scale: 1,
            content: format!("LINE {i:04} LOREM IPSUM DOLOR"),
        });
    }
    commands.push(LabelCommand::Print { sets: 1, copies: 1 });
    PrintJob::new(DeviceIdentity::network("192.168.1.50", 9100), commands)
}

fn bench_encode_shipping_label(c: &mut Criterion) {
    let profile = CapabilityProfile::default();
    let job = shipping_label();
    c.bench_function("encode_shipping_label", |b| {
        b.iter(|| encode(black_box(&job), black_box(&profile)).unwrap())
    });
}

fn bench_encode_dense_label(c: &mut Criterion) {
    let profile = CapabilityProfile {
        buffer_bytes: 1024,
        ..Default::default()
    };
    let job = dense_label(500);
    c.bench_function("encode_dense_label_500", |b| {
        b.iter(|| encode(black_box(&job), black_box(&profile)).unwrap())
    });
}

fn bench_chunk_raw_payload(c: &mut Criterion) {
    let profile = CapabilityProfile::default();
    let payload = encode(&dense_label(500), &profile).unwrap().to_bytes();
    c.bench_function("chunk_raw_payload", |b| {
        b.iter(|| chunk_payload(black_box(&payload), black_box(1024)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_encode_shipping_label,
    bench_encode_dense_label,
    bench_chunk_raw_payload
);
criterion_main!(benches);
