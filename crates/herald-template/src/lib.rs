// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message rendering for outbound campaigns.
//!
//! Rendering runs three stages in a fixed order: `{{variable}}` substitution,
//! `{a|b|c}` option-group resolution, then invisible watermarking. It never
//! fails, and two renders of the same input are byte-distinct with high
//! probability while remaining visually identical.

pub mod renderer;
pub mod spintax;
pub mod substitution;
pub mod watermark;

pub use renderer::Renderer;
pub use watermark::{WatermarkPolicy, strip_watermark};
