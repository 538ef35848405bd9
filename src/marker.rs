//! Freshness marker persistence.
//!
//! The marker is a plain text file holding one decimal epoch-millisecond
//! integer: the completion time of the most recent successful update. It is
//! overwritten on every success and never deleted here.

use crate::error::{FreshenError, Result};
use chrono::{DateTime, Utc};
use std::io::Write;
use std::num::IntErrorKind;
use std::path::Path;

/// Largest magnitude, in milliseconds, of a representable point in time.
///
/// Values beyond this (about 275,000 years from the epoch) parse as integers
/// but do not denote a valid time.
pub const MAX_TIME_VALUE_MS: i64 = 8_640_000_000_000_000;

/// A persisted "last successfully updated at" timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FreshnessMarker {
    epoch_ms: i64,
}

impl FreshnessMarker {
    /// Marker for an explicit epoch-millisecond time.
    #[must_use]
    pub fn from_epoch_millis(epoch_ms: i64) -> Self {
        Self { epoch_ms }
    }

    /// Marker for the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self::from_epoch_millis(now_epoch_millis())
    }

    /// Raw epoch-millisecond value.
    #[must_use]
    pub fn epoch_millis(self) -> i64 {
        self.epoch_ms
    }

    /// `true` when the value lies inside the representable time range.
    #[must_use]
    pub fn is_valid_time(self) -> bool {
        self.epoch_ms.checked_abs().is_some_and(|ms| ms <= MAX_TIME_VALUE_MS)
    }

    /// The marker as a UTC date-time, if chrono can represent it.
    #[must_use]
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        if !self.is_valid_time() {
            return None;
        }
        DateTime::<Utc>::from_timestamp_millis(self.epoch_ms)
    }

    /// Parse marker file content.
    ///
    /// Surrounding whitespace is ignored; anything else that is not a
    /// decimal integer is rejected. Integers too large for `i64` saturate,
    /// which keeps them outside the valid time range.
    ///
    /// # Errors
    ///
    /// Returns [`FreshenError::Marker`] when the content is not an integer.
    pub fn parse(content: &str) -> Result<Self> {
        let trimmed = content.trim();
        match trimmed.parse::<i64>() {
            Ok(ms) => Ok(Self::from_epoch_millis(ms)),
            Err(e) => match e.kind() {
                IntErrorKind::PosOverflow => Ok(Self::from_epoch_millis(i64::MAX)),
                IntErrorKind::NegOverflow => Ok(Self::from_epoch_millis(i64::MIN)),
                _ => Err(FreshenError::Marker(format!(
                    "invalid marker value {trimmed:?}: {e}"
                ))),
            },
        }
    }

    /// Read the marker at `path`. Returns `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error on any other I/O failure or when the content does not parse.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(FreshenError::Marker(format!(
                    "cannot read marker {}: {e}",
                    path.display()
                )));
            }
        };
        Self::parse(&content).map(Some)
    }

    /// Overwrite the marker at `path` with this value.
    ///
    /// Writes a uniquely named temporary file next to the marker and renames
    /// it into place, so readers see either the old or the new value and
    /// concurrent writers never share a temporary file. The parent directory
    /// must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be written or renamed.
    pub fn write(self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let prefix = match path.file_name() {
            Some(name) => format!("{}.", name.to_string_lossy()),
            None => ".marker.".to_owned(),
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| {
                FreshenError::Marker(format!(
                    "cannot create marker temp file in {}: {e}",
                    dir.display()
                ))
            })?;
        tmp.write_all(self.epoch_ms.to_string().as_bytes())
            .map_err(|e| {
                FreshenError::Marker(format!(
                    "cannot write marker temp file {}: {e}",
                    tmp.path().display()
                ))
            })?;
        tmp.persist(path).map_err(|e| {
            FreshenError::Marker(format!(
                "cannot finalize marker {}: {}",
                path.display(),
                e.error
            ))
        })?;
        Ok(())
    }
}

impl std::fmt::Display for FreshnessMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{} ms since epoch", self.epoch_ms),
        }
    }
}

/// Current epoch time in milliseconds.
#[must_use]
pub fn now_epoch_millis() -> i64 {
    match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(duration) => i64::try_from(duration.as_millis()).unwrap_or(i64::MAX),
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn parse_accepts_surrounding_whitespace() {
        let marker = FreshnessMarker::parse("  1706000000000\n").unwrap();
        assert_eq!(marker.epoch_millis(), 1_706_000_000_000);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(FreshnessMarker::parse("not-a-number").is_err());
        assert!(FreshnessMarker::parse("").is_err());
        assert!(FreshnessMarker::parse("17060000abc").is_err());
        assert!(FreshnessMarker::parse("1.5").is_err());
    }

    #[test]
    fn read_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let marker = FreshnessMarker::read(&dir.path().join(".lastupdate")).unwrap();
        assert!(marker.is_none());
    }

    #[test]
    fn read_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FreshnessMarker::read(dir.path()).is_err());
    }

    #[test]
    fn write_overwrites_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".lastupdate");

        FreshnessMarker::from_epoch_millis(1).write(&path).unwrap();
        FreshnessMarker::from_epoch_millis(42).write(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "42");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        assert_eq!(
            FreshnessMarker::read(&path).unwrap(),
            Some(FreshnessMarker::from_epoch_millis(42))
        );
    }

    #[test]
    fn write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join(".lastupdate");
        let result = FreshnessMarker::from_epoch_millis(1).write(&path);
        assert!(matches!(result, Err(FreshenError::Marker(_))));
    }

    #[test]
    fn concurrent_writers_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".lastupdate");
        let barrier = std::sync::Barrier::new(2);

        std::thread::scope(|scope| {
            for value in [111_i64, 222] {
                let (path, barrier) = (&path, &barrier);
                scope.spawn(move || {
                    for _ in 0..200 {
                        barrier.wait();
                        FreshnessMarker::from_epoch_millis(value)
                            .write(path)
                            .expect("concurrent marker write");
                    }
                });
            }
        });

        let marker = FreshnessMarker::read(&path).unwrap().unwrap();
        assert!([111, 222].contains(&marker.epoch_millis()));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn write_leaves_sibling_with_same_stem_alone() {
        let dir = tempfile::tempdir().unwrap();
        let sibling = dir.path().join("pokedex.tmp");
        std::fs::write(&sibling, "cached payload").unwrap();
        let path = dir.path().join("pokedex.stamp");

        FreshnessMarker::from_epoch_millis(7).write(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&sibling).unwrap(), "cached payload");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "7");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn write_marker_named_like_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.tmp");

        FreshnessMarker::from_epoch_millis(9).write(&path).unwrap();

        assert_eq!(
            FreshnessMarker::read(&path).unwrap(),
            Some(FreshnessMarker::from_epoch_millis(9))
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn parse_saturates_integers_beyond_i64() {
        let huge = FreshnessMarker::parse("10000000000000000000").unwrap();
        assert_eq!(huge.epoch_millis(), i64::MAX);
        assert!(!huge.is_valid_time());

        let tiny = FreshnessMarker::parse("-99999999999999999999999").unwrap();
        assert_eq!(tiny.epoch_millis(), i64::MIN);
        assert!(!tiny.is_valid_time());
    }

    #[test]
    fn valid_time_range_edges() {
        assert!(FreshnessMarker::from_epoch_millis(MAX_TIME_VALUE_MS).is_valid_time());
        assert!(FreshnessMarker::from_epoch_millis(-MAX_TIME_VALUE_MS).is_valid_time());
        assert!(!FreshnessMarker::from_epoch_millis(MAX_TIME_VALUE_MS + 1).is_valid_time());
        assert!(!FreshnessMarker::from_epoch_millis(i64::MIN).is_valid_time());
    }

    #[test]
    fn display_uses_rfc3339() {
        let marker = FreshnessMarker::from_epoch_millis(0);
        assert_eq!(marker.to_string(), "1970-01-01T00:00:00+00:00");
        let bogus = FreshnessMarker::from_epoch_millis(i64::MAX);
        assert_eq!(bogus.to_string(), format!("{} ms since epoch", i64::MAX));
    }

    #[test]
    fn now_is_after_2020() {
        assert!(now_epoch_millis() > 1_577_836_800_000);
    }
}
