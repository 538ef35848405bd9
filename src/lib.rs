//! Freshen: time-gated, idempotent auto-update trigger.
//!
//! On each invocation, decides whether locally cached data is stale relative
//! to a freshness threshold and, if so, runs an external updater and records
//! the refresh time.
//!
//! # Architecture
//!
//! - **Staleness oracle** ([`oracle`]): reads the freshness marker and
//!   compares its age to the threshold. Unreadable markers count as stale.
//! - **Update orchestrator** ([`orchestrator`]): opt-out check, data
//!   directory readiness, staleness check, update call and marker write.
//!   Failures are contained and returned as a [`RunOutcome`].
//! - **Update capability** ([`updater`]): the [`Updater`] trait seam, with a
//!   command-running adapter for the CLI.

pub mod config;
pub mod error;
pub mod lock;
pub mod marker;
pub mod oracle;
pub mod orchestrator;
pub mod paths;
pub mod updater;

pub use config::UpdateConfig;
pub use error::{FreshenError, Result};
pub use marker::FreshnessMarker;
pub use oracle::{Staleness, StalenessOracle};
pub use orchestrator::{NoticeCategory, OptOutSignal, RunOutcome, UpdateOrchestrator};
pub use updater::{CommandUpdater, FnUpdater, Updater};
