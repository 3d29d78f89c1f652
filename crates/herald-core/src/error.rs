// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Herald dispatch engine.

use thiserror::Error;

/// The primary error type used across all Herald adapter traits and core operations.
#[derive(Debug, Error)]
pub enum HeraldError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Transport errors (send failure, probe failure, session teardown).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An operation needed a live transport session and there was none.
    #[error("transport is not connected")]
    NotConnected,

    /// A phone string could not be normalized into a transport address.
    #[error("invalid phone number: {0:?}")]
    InvalidPhone(String),

    /// The referenced campaign does not exist.
    #[error("campaign not found: {0}")]
    CampaignNotFound(String),

    /// A control request needed a bound campaign and none was active.
    #[error("no active campaign")]
    NoActiveCampaign,

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HeraldError {
    /// Shorthand for a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        HeraldError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Whether retrying the same operation later can reasonably succeed.
    ///
    /// Transport hiccups, timeouts, and a missing session are transient; bad
    /// input and configuration are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HeraldError::Transport { .. } | HeraldError::NotConnected | HeraldError::Timeout { .. }
        )
    }
}
