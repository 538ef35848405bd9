//! Update orchestrator.
//!
//! Sequences one auto-update invocation:
//!
//! 1. Opt-out check (no side effects when opted out)
//! 2. Data directory readiness
//! 3. Optional update lock
//! 4. Staleness check
//! 5. Update, then marker write
//!
//! Every failure is contained and reported as a [`RunOutcome`]; nothing is
//! propagated to the caller. A failed update leaves the marker untouched so
//! the next invocation retries.

use crate::config::UpdateConfig;
use crate::error::{FreshenError, Result};
use crate::lock::{LockAttempt, UpdateLock};
use crate::marker::FreshnessMarker;
use crate::oracle::StalenessOracle;
use crate::updater::Updater;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Value of the opt-out variable that disables updates.
pub const OPT_OUT_VALUE: &str = "1";

/// Where the opt-out flag is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptOutSignal {
    /// Process environment variable, read fresh on every check.
    Env(String),
    /// Fixed value, for embedding callers and tests.
    Fixed(Option<String>),
}

impl OptOutSignal {
    /// Signal backed by the environment variable `var`.
    #[must_use]
    pub fn env(var: impl Into<String>) -> Self {
        Self::Env(var.into())
    }

    /// Current raw value of the signal.
    #[must_use]
    pub fn value(&self) -> Option<String> {
        match self {
            Self::Env(var) => std::env::var(var).ok(),
            Self::Fixed(value) => value.clone(),
        }
    }

    /// `true` only when the value is exactly `"1"`.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.value().as_deref() == Some(OPT_OUT_VALUE)
    }

    fn describe(&self) -> String {
        match self {
            Self::Env(var) => format!("{var}={OPT_OUT_VALUE}"),
            Self::Fixed(_) => "configured opt-out".to_owned(),
        }
    }
}

/// Console notice emitted for an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeCategory {
    /// Updates skipped because of the opt-out signal.
    OptOut,
    /// Data updated and marker written.
    Success,
    /// Something failed; the caller continues normally.
    Warning,
}

/// Terminal state of one [`UpdateOrchestrator::run_if_needed`] invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Opt-out signal set; nothing touched.
    OptedOut,
    /// Data directory or lock file could not be prepared.
    StorageUnavailable {
        /// Failure description.
        message: String,
    },
    /// Another invocation holds the update lock.
    Busy,
    /// Marker is within the threshold; nothing to do.
    Fresh,
    /// Update succeeded and the marker was written.
    Updated {
        /// The marker now on disk.
        marker: FreshnessMarker,
    },
    /// Update capability failed; marker unchanged.
    UpdateFailed {
        /// Failure description.
        message: String,
    },
    /// Update succeeded but the marker could not be written.
    MarkerWriteFailed {
        /// Failure description.
        message: String,
    },
}

impl RunOutcome {
    /// Notice category emitted for this outcome, if any.
    #[must_use]
    pub fn notice(&self) -> Option<NoticeCategory> {
        match self {
            Self::OptedOut => Some(NoticeCategory::OptOut),
            Self::Updated { .. } => Some(NoticeCategory::Success),
            Self::StorageUnavailable { .. }
            | Self::UpdateFailed { .. }
            | Self::MarkerWriteFailed { .. } => Some(NoticeCategory::Warning),
            Self::Busy | Self::Fresh => None,
        }
    }

    /// Whether the update capability was invoked.
    #[must_use]
    pub fn attempted_update(&self) -> bool {
        matches!(
            self,
            Self::Updated { .. } | Self::UpdateFailed { .. } | Self::MarkerWriteFailed { .. }
        )
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OptedOut => write!(f, "skipped: auto-update disabled"),
            Self::StorageUnavailable { message } => write!(f, "skipped: {message}"),
            Self::Busy => write!(f, "skipped: another update is in progress"),
            Self::Fresh => write!(f, "data is fresh"),
            Self::Updated { marker } => write!(f, "updated at {marker}"),
            Self::UpdateFailed { message } => write!(f, "update failed: {message}"),
            Self::MarkerWriteFailed { message } => {
                write!(f, "updated, but marker not recorded: {message}")
            }
        }
    }
}

/// Runs the update capability when the freshness marker is stale.
pub struct UpdateOrchestrator<U> {
    config: UpdateConfig,
    oracle: StalenessOracle,
    opt_out: OptOutSignal,
    updater: U,
}

impl<U: Updater> UpdateOrchestrator<U> {
    /// Orchestrator for `config`, reading the opt-out flag from the
    /// environment variable named in the config.
    pub fn new(config: UpdateConfig, updater: U) -> Self {
        let oracle = StalenessOracle::from_config(&config);
        let opt_out = OptOutSignal::env(config.opt_out_var.clone());
        Self {
            config,
            oracle,
            opt_out,
            updater,
        }
    }

    /// Replace the opt-out signal source.
    #[must_use]
    pub fn with_opt_out(mut self, opt_out: OptOutSignal) -> Self {
        self.opt_out = opt_out;
        self
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// The oracle consulted on each run.
    #[must_use]
    pub fn oracle(&self) -> &StalenessOracle {
        &self.oracle
    }

    /// Create the data directory and any missing ancestors.
    ///
    /// Idempotent; existing contents are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`FreshenError::Storage`] if the directory cannot be created.
    pub fn ensure_storage(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config.data_dir).map_err(|e| {
            FreshenError::Storage(format!(
                "cannot create data directory {}: {e}",
                self.config.data_dir.display()
            ))
        })
    }

    /// Update the cached data if the marker is stale.
    ///
    /// Never fails: every error is logged and mapped to a [`RunOutcome`].
    /// The only suspension point is the update capability, which is awaited
    /// without a timeout.
    pub async fn run_if_needed(&self) -> RunOutcome {
        if self.opt_out.is_set() {
            info!(
                notice = "opt_out",
                "auto-update skipped due to {}",
                self.opt_out.describe()
            );
            return RunOutcome::OptedOut;
        }

        if let Err(e) = self.ensure_storage() {
            warn!(notice = "warning", "auto-update skipped: {e}");
            return RunOutcome::StorageUnavailable {
                message: e.to_string(),
            };
        }

        let _guard = if self.config.lock.enabled {
            let lock = UpdateLock::new(
                self.config.lock_path(),
                Duration::from_secs(self.config.lock.stale_after_secs),
            );
            match lock.try_acquire() {
                Ok(LockAttempt::Acquired(guard)) => Some(guard),
                Ok(LockAttempt::Held) => {
                    debug!("update lock {} held elsewhere", lock.path().display());
                    return RunOutcome::Busy;
                }
                Err(e) => {
                    warn!(notice = "warning", "auto-update skipped: {e}");
                    return RunOutcome::StorageUnavailable {
                        message: e.to_string(),
                    };
                }
            }
        } else {
            None
        };

        let staleness = self.oracle.assess();
        if !staleness.is_stale() {
            debug!("cached data is {staleness}");
            return RunOutcome::Fresh;
        }
        debug!("cached data is {staleness}; updating");

        if let Err(e) = self.updater.update().await {
            warn!(notice = "warning", "automatic update failed: {e:#}");
            return RunOutcome::UpdateFailed {
                message: format!("{e:#}"),
            };
        }

        let marker = FreshnessMarker::now();
        if let Err(e) = marker.write(self.oracle.marker_path()) {
            warn!(
                notice = "warning",
                "data updated but freshness marker was not recorded: {e}"
            );
            return RunOutcome::MarkerWriteFailed {
                message: e.to_string(),
            };
        }

        info!(notice = "success", "data updated automatically");
        RunOutcome::Updated { marker }
    }
}
