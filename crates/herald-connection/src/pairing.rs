// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal rendering of pairing payloads.

use qrcode::QrCode;
use qrcode::render::unicode::Dense1x2;
use tracing::warn;

/// A pairing payload issued by the transport and its printable form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingCode {
    pub payload: String,
    /// Unicode half-block QR code, or the raw payload if it could not be encoded.
    pub rendered: String,
}

impl PairingCode {
    pub fn new(payload: impl Into<String>) -> Self {
        let payload = payload.into();
        let rendered = render_qr(&payload).unwrap_or_else(|| payload.clone());
        Self { payload, rendered }
    }
}

/// Render `payload` as a QR code using two rows per character cell.
pub fn render_qr(payload: &str) -> Option<String> {
    match QrCode::new(payload.as_bytes()) {
        Ok(code) => Some(
            code.render::<Dense1x2>()
                .dark_color(Dense1x2::Light)
                .light_color(Dense1x2::Dark)
                .quiet_zone(true)
                .build(),
        ),
        Err(e) => {
            warn!(error = %e, "pairing payload cannot be encoded as a QR code");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_multiline_block() {
        let code = PairingCode::new("2@abc,def,ghi");
        assert_eq!(code.payload, "2@abc,def,ghi");
        assert!(code.rendered.lines().count() > 10);
        assert_ne!(code.rendered, code.payload);
    }

    #[test]
    fn oversized_payload_falls_back_to_raw() {
        let payload = "x".repeat(8000);
        let code = PairingCode::new(payload.clone());
        assert_eq!(code.rendered, payload);
    }
}
