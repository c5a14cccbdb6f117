//! Core library for the Eskadra fleet client.
//!
//! The crate exposes a [`ServerApi`] seam describing the provider calls a
//! fleet needs, a reqwest-backed Scaleway implementation of that seam, and
//! the [`Fleet`] reconciler that creates, deletes, starts, terminates, and
//! watches named servers against a freshly fetched remote inventory.

pub mod api;
pub mod config;
pub mod fleet;
pub mod scaleway;
pub mod test_support;

pub use api::{
    ApiFuture, ImageSummary, PowerAction, ServerApi, ServerRecord, ServerSpec, ServerSpecBuilder,
    ServerState, SpecError, VolumeRef,
};
pub use config::{ConfigError, DEFAULT_API_BASE_URL, FleetConfig};
pub use fleet::{
    ActionOutcome, ActionReport, CreateOutcome, CreateReport, DeleteOutcome, DeleteReport, Fleet,
    FleetError, Inventory, PollStatus, ServerReport,
};
pub use scaleway::{ScalewayApi, ScalewayApiError};
