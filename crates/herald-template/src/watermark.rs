// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Invisible watermarking so identical renders are byte-distinct.

use herald_config::model::TemplateConfig;
use rand::Rng;
use rand::seq::SliceRandom;

/// Zero-width code points used for watermarking.
pub const INVISIBLE_CHARS: [char; 5] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}'];

/// How many invisible characters to add around a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkPolicy {
    pub suffix_min: usize,
    pub suffix_max: usize,
    /// When set, a single prefix character is added half of the time.
    pub prefix: bool,
}

impl Default for WatermarkPolicy {
    fn default() -> Self {
        Self::from(&TemplateConfig::default())
    }
}

impl From<&TemplateConfig> for WatermarkPolicy {
    fn from(config: &TemplateConfig) -> Self {
        Self {
            suffix_min: config.watermark_suffix_min,
            suffix_max: config.watermark_suffix_max.max(config.watermark_suffix_min),
            prefix: config.watermark_prefix,
        }
    }
}

impl WatermarkPolicy {
    /// Wrap `text` with randomly chosen invisible characters.
    pub fn apply<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> String {
        let suffix_len = rng.gen_range(self.suffix_min..=self.suffix_max.max(self.suffix_min));
        let prefix_len = usize::from(self.prefix && rng.gen_bool(0.5));

        let mut out = String::with_capacity(text.len() + 3 * (suffix_len + prefix_len));
        for _ in 0..prefix_len {
            out.push(pick(rng));
        }
        out.push_str(text);
        for _ in 0..suffix_len {
            out.push(pick(rng));
        }
        out
    }
}

fn pick<R: Rng + ?Sized>(rng: &mut R) -> char {
    *INVISIBLE_CHARS.choose(rng).unwrap_or(&INVISIBLE_CHARS[0])
}

/// Remove every watermark character, wherever it appears.
pub fn strip_watermark(text: &str) -> String {
    text.chars().filter(|c| !INVISIBLE_CHARS.contains(c)).collect()
}
