// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device capability profiles.
//
// The encoder validates every command against the capability profile of
// the target printer before any byte leaves the process. Out-of-range
// values fail encoding — they are never silently clamped.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use labelwerk_core::types::Symbology;

/// What the target printer model can do.
///
/// Used by the encoder for validation and chunk sizing. The default
/// profile describes a generic 4-inch 203 dpi thermal transfer printer,
/// the most common class of compact label hardware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityProfile {
    /// Maximum printable label width in millimetres.
    pub max_width_mm: u32,
    /// Maximum label length in millimetres.
    pub max_height_mm: u32,
    /// Print head resolution. 8 dots/mm = 203 dpi, 12 dots/mm = 300 dpi.
    pub dots_per_mm: u32,
    /// Barcode symbologies the firmware renders.
    pub symbologies: HashSet<Symbology>,
    /// Highest built-in bitmap font number.
    pub font_max: u8,
    /// Maximum text scale multiplier (applies to both axes).
    pub text_scale_max: u8,
    /// Maximum darkness level.
    pub max_density: u8,
    /// Maximum print speed in inches per second.
    pub max_speed_ips: u8,
    /// Maximum sets/copies per PRINT command.
    pub max_copies: u32,
    /// Receive buffer size — the byte budget of one transport chunk.
    pub buffer_bytes: usize,
}

impl Default for CapabilityProfile {
    fn default() -> Self {
        Self {
            max_width_mm: 104,
            max_height_mm: 610,
            dots_per_mm: 8,
            symbologies: [
                Symbology::Code128,
                Symbology::Code39,
                Symbology::Ean13,
                Symbology::Ean8,
                Symbology::UpcA,
                Symbology::Codabar,
                Symbology::Interleaved2of5,
            ]
            .into_iter()
            .collect(),
            font_max: 8,
            text_scale_max: 10,
            max_density: 15,
            max_speed_ips: 6,
            max_copies: 999,
            buffer_bytes: 4096,
        }
    }
}

impl CapabilityProfile {
    /// Whether the firmware renders the given symbology.
    pub fn supports_symbology(&self, symbology: Symbology) -> bool {
        self.symbologies.contains(&symbology)
    }

    /// Printable width in dots for a label of the given width.
    pub fn width_dots(&self, width_mm: u32) -> u32 {
        width_mm * self.dots_per_mm
    }

    /// Label length in dots for a label of the given height.
    pub fn height_dots(&self, height_mm: u32) -> u32 {
        height_mm * self.dots_per_mm
    }
}
