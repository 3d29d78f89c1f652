// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign dispatch for the Herald engine.
//!
//! The contact queue supplies work from the store, the scheduler paces it out
//! over the live transport session, and [`Engine`] exposes the control
//! surface used by the binary.

pub mod admin;
pub mod control;
pub mod import;
pub mod inbound;
pub mod interrupt;
pub mod queue;
pub mod report;
pub mod scheduler;
pub mod state;

pub use admin::{
    FORCE_CONTINUE_KEY, RESET_SESSION_KEY, StoreControl, TEST_MESSAGE_KEY, TestMessageRequest,
};
pub use control::{Engine, StatusReport};
pub use import::{ColumnMapping, ImportRow, map_rows};
pub use inbound::{InboundAction, InboundHandler};
pub use queue::ContactQueue;
pub use report::{CampaignSummary, LogLine, Progress};
pub use scheduler::{Scheduler, SchedulerSettings};
pub use state::{Activity, SchedulerMode, SchedulerState};
