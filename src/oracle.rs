//! Staleness oracle.
//!
//! Decides whether cached data needs refreshing by comparing the freshness
//! marker against the configured threshold. Never fails: any problem reading
//! the marker is reported as [`Staleness::Unknown`], which counts as stale.

use crate::config::UpdateConfig;
use crate::error::Result;
use crate::marker::{FreshnessMarker, now_epoch_millis};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Result of a staleness assessment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    /// Marker is no older than the threshold.
    Fresh {
        /// Milliseconds since the marker (negative for a marker in the future).
        age_ms: i64,
    },
    /// Marker is strictly older than the threshold.
    Stale {
        /// Milliseconds since the marker.
        age_ms: i64,
    },
    /// Marker missing or unreadable. Treated as stale.
    Unknown {
        /// Why the marker could not be used.
        reason: String,
    },
    /// Marker is an integer outside the representable time range.
    ///
    /// The elapsed time is undefined and every threshold comparison against
    /// it fails, so this counts as *not* stale. Known quirk, kept for
    /// compatibility with existing markers.
    Indeterminate {
        /// The raw marker value.
        raw: i64,
    },
}

impl Staleness {
    /// Whether an update should run.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. } | Self::Unknown { .. })
    }

    /// Elapsed milliseconds since the marker, when defined.
    #[must_use]
    pub fn age_ms(&self) -> Option<i64> {
        match self {
            Self::Fresh { age_ms } | Self::Stale { age_ms } => Some(*age_ms),
            Self::Unknown { .. } | Self::Indeterminate { .. } => None,
        }
    }
}

impl std::fmt::Display for Staleness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fresh { age_ms } => write!(f, "fresh (updated {}s ago)", age_ms / 1000),
            Self::Stale { age_ms } => write!(f, "stale (updated {}s ago)", age_ms / 1000),
            Self::Unknown { reason } => write!(f, "stale ({reason})"),
            Self::Indeterminate { raw } => {
                write!(f, "fresh (marker {raw} is not a valid time)")
            }
        }
    }
}

/// Reads the freshness marker and compares its age to a threshold.
#[derive(Debug, Clone)]
pub struct StalenessOracle {
    marker_path: PathBuf,
    threshold: Duration,
}

impl StalenessOracle {
    /// Oracle for the marker at `marker_path`.
    #[must_use]
    pub fn new(marker_path: impl Into<PathBuf>, threshold: Duration) -> Self {
        Self {
            marker_path: marker_path.into(),
            threshold,
        }
    }

    /// Oracle using the marker path and threshold from `config`.
    #[must_use]
    pub fn from_config(config: &UpdateConfig) -> Self {
        Self::new(config.marker_path(), config.threshold())
    }

    /// Path of the marker this oracle reads.
    #[must_use]
    pub fn marker_path(&self) -> &Path {
        &self.marker_path
    }

    /// Configured freshness threshold.
    #[must_use]
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Returns `true` if the cached data should be updated now.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.assess().is_stale()
    }

    /// Assess the marker against the current wall-clock time.
    #[must_use]
    pub fn assess(&self) -> Staleness {
        self.assess_at(now_epoch_millis())
    }

    /// Assess the marker against an explicit epoch-millisecond time.
    #[must_use]
    pub fn assess_at(&self, now_ms: i64) -> Staleness {
        self.classify(FreshnessMarker::read(&self.marker_path), now_ms)
    }

    /// Summarise the marker for display at the current time.
    #[must_use]
    pub fn status(&self) -> MarkerStatus {
        self.status_at(now_epoch_millis())
    }

    /// Summarise the marker for display at an explicit epoch-millisecond time.
    #[must_use]
    pub fn status_at(&self, now_ms: i64) -> MarkerStatus {
        let read = FreshnessMarker::read(&self.marker_path);
        let marker = read.as_ref().ok().copied().flatten();
        let staleness = self.classify(read, now_ms);

        MarkerStatus {
            marker_path: self.marker_path.clone(),
            last_updated_ms: marker.map(FreshnessMarker::epoch_millis),
            last_updated: marker.and_then(FreshnessMarker::to_datetime),
            age_secs: staleness.age_ms().map(|ms| ms / 1000),
            threshold_secs: self.threshold.as_secs(),
            stale: staleness.is_stale(),
            assessment: staleness.to_string(),
        }
    }

    fn classify(&self, read: Result<Option<FreshnessMarker>>, now_ms: i64) -> Staleness {
        let marker = match read {
            Ok(Some(marker)) => marker,
            Ok(None) => {
                return Staleness::Unknown {
                    reason: format!("no marker at {}", self.marker_path.display()),
                };
            }
            Err(e) => {
                debug!("treating unreadable marker as stale: {e}");
                return Staleness::Unknown {
                    reason: e.to_string(),
                };
            }
        };

        if !marker.is_valid_time() {
            debug!(
                raw = marker.epoch_millis(),
                "marker outside representable time range; elapsed time undefined"
            );
            return Staleness::Indeterminate {
                raw: marker.epoch_millis(),
            };
        }

        let age_ms = now_ms.saturating_sub(marker.epoch_millis());
        let threshold_ms = i64::try_from(self.threshold.as_millis()).unwrap_or(i64::MAX);
        if age_ms > threshold_ms {
            Staleness::Stale { age_ms }
        } else {
            Staleness::Fresh { age_ms }
        }
    }
}

/// Snapshot of the marker used by `freshen status`.
#[derive(Debug, Clone, Serialize)]
pub struct MarkerStatus {
    /// Marker file location.
    pub marker_path: PathBuf,
    /// Raw marker value, if one could be read.
    pub last_updated_ms: Option<i64>,
    /// Marker as a UTC timestamp, if representable.
    pub last_updated: Option<DateTime<Utc>>,
    /// Seconds since the last update, when defined.
    pub age_secs: Option<i64>,
    /// Configured freshness threshold.
    pub threshold_secs: u64,
    /// Whether the next run would update.
    pub stale: bool,
    /// Human-readable assessment.
    pub assessment: String,
}
