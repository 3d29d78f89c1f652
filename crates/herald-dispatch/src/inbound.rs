// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound messages: opt-outs and human replies.

use std::sync::Arc;

use herald_core::types::InboundText;
use herald_core::{Clock, HeraldError, StorageAdapter};
use tracing::{info, warn};

/// Blacklist reason recorded for opt-outs.
pub const OPT_OUT_REASON: &str = "user_opt_out";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundAction {
    /// The sender asked to stop; `swept` pending contacts were blacklisted.
    OptedOut { phone: String, swept: u64 },
    /// A human answered; dispatch should pause.
    Reply { phone: String },
    /// Own message or unusable sender.
    Ignored,
}

#[derive(Clone)]
pub struct InboundHandler {
    storage: Arc<dyn StorageAdapter>,
    clock: Arc<dyn Clock>,
    stop_keywords: Vec<String>,
}

impl InboundHandler {
    pub fn new(storage: Arc<dyn StorageAdapter>, clock: Arc<dyn Clock>, stop_keywords: &[String]) -> Self {
        let stop_keywords = stop_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            storage,
            clock,
            stop_keywords,
        }
    }

    /// Whether the trimmed, lowercased text contains any stop keyword.
    pub fn is_opt_out(&self, text: &str) -> bool {
        let clean = text.trim().to_lowercase();
        self.stop_keywords.iter().any(|k| clean.contains(k.as_str()))
    }

    /// Classify an inbound message and apply opt-outs to the store.
    ///
    /// Replies are only classified here; the caller records the reply time.
    pub async fn handle(&self, message: &InboundText) -> Result<InboundAction, HeraldError> {
        if message.is_own {
            return Ok(InboundAction::Ignored);
        }
        let phone = message.sender_phone();
        if phone.is_empty() {
            warn!(remote = %message.message_ref.remote, "inbound message without a phone sender");
            return Ok(InboundAction::Ignored);
        }

        let text = message.text.as_deref().unwrap_or_default();
        if self.is_opt_out(text) {
            self.storage
                .add_to_blacklist(&phone, OPT_OUT_REASON, self.clock.now())
                .await?;
            let swept = self.storage.blacklist_pending_contacts(&phone).await?;
            info!(phone = %phone, swept, "opt-out received; sender blacklisted");
            return Ok(InboundAction::OptedOut { phone, swept });
        }

        info!(phone = %phone, "reply received");
        Ok(InboundAction::Reply { phone })
    }
}
