// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Herald dispatch engine.
//!
//! This crate provides the error type, the domain model (campaigns, contacts,
//! blacklist entries, transport events), and the adapter traits that the
//! store and the transport implement.

pub mod clock;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use clock::{Clock, SystemClock};
pub use error::HeraldError;
pub use types::{
    AdapterType, Address, Campaign, CampaignStatus, ConnectionState, Contact, ContactCounts,
    ContactStatus, HealthStatus, MessageId, NewContact, Presence, TransportEvent,
};

pub use traits::{
    AuthState, KeyStore, PluginAdapter, StorageAdapter, TransportAdapter, TransportLink,
    TransportSession,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn herald_error_has_all_variants() {
        let _config = HeraldError::Config("test".into());
        let _storage = HeraldError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _transport = HeraldError::Transport {
            message: "test".into(),
            source: None,
        };
        let _not_connected = HeraldError::NotConnected;
        let _phone = HeraldError::InvalidPhone("x".into());
        let _missing = HeraldError::CampaignNotFound("c".into());
        let _none = HeraldError::NoActiveCampaign;
        let _timeout = HeraldError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = HeraldError::Internal("test".into());
    }

    #[test]
    fn adapter_type_display_round_trip() {
        use std::str::FromStr;

        for variant in [AdapterType::Transport, AdapterType::Storage] {
            let s = variant.to_string();
            let parsed = AdapterType::from_str(&s).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn all_traits_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_transport_adapter<T: TransportAdapter>() {}
        fn _assert_storage_adapter<T: StorageAdapter>() {}
        fn _assert_key_store<T: KeyStore>() {}
        fn _assert_session<T: TransportSession>() {}
    }
}
