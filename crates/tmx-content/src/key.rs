//! Object keys inside the content store
//!
//! Provides [`ObjectKey`], a validated, slash-separated key. Two namespaces
//! exist per interface:
//! - `migrations/<interface>/<name>`: migration payloads and the live artifact
//! - `backups/<interface>/<interface>_<label>_<timestamp>.<ext>`: snapshots

use crate::format::ContentFormat;
use crate::interface::Interface;
use chrono::{DateTime, Utc};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Timestamp layout embedded in backup names (`2025-08-27_143005`)
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H%M%S";

const MIGRATIONS_ROOT: &str = "migrations";
const BACKUPS_ROOT: &str = "backups";

/// Validated key addressing one blob in the content store
///
/// # Invariants
/// - At least one segment
/// - No empty, `.` or `..` segments
/// - No backslashes
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Key of a named artifact in an interface's migrations namespace
    ///
    /// # Errors
    /// Returns error if `name` is not a single valid segment
    pub fn migration(interface: Interface, name: &str) -> Result<Self, KeyError> {
        validate_segment(name)?;
        Ok(Self(format!("{MIGRATIONS_ROOT}/{interface}/{name}")))
    }

    /// Key of a backup snapshot taken at `taken_at`
    ///
    /// `attempt` disambiguates snapshots with the same label taken within
    /// the same second; attempt 0 carries no suffix.
    ///
    /// # Errors
    /// Returns error if `label` is not a valid segment
    pub fn backup(
        interface: Interface,
        label: &str,
        taken_at: DateTime<Utc>,
        format: ContentFormat,
        attempt: u32,
    ) -> Result<Self, KeyError> {
        validate_segment(label)?;
        let stamp = taken_at.format(BACKUP_TIMESTAMP_FORMAT);
        let suffix = if attempt == 0 {
            String::new()
        } else {
            format!("_{attempt}")
        };
        Ok(Self(format!(
            "{BACKUPS_ROOT}/{interface}/{interface}_{label}_{stamp}{suffix}.{ext}",
            ext = format.extension()
        )))
    }

    /// Prefix under which an interface's migration artifacts live
    #[inline]
    #[must_use]
    pub fn migrations_prefix(interface: Interface) -> String {
        format!("{MIGRATIONS_ROOT}/{interface}/")
    }

    /// Prefix under which an interface's backups live
    #[inline]
    #[must_use]
    pub fn backups_prefix(interface: Interface) -> String {
        format!("{BACKUPS_ROOT}/{interface}/")
    }

    /// Key as text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Final segment (the file name)
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(KeyError::Empty);
        }
        for segment in s.split('/') {
            validate_segment(segment)?;
        }
        Ok(Self(s.to_string()))
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn validate_segment(segment: &str) -> Result<(), KeyError> {
    if segment.is_empty() {
        return Err(KeyError::Empty);
    }
    if segment == "." || segment == ".." {
        return Err(KeyError::InvalidSegment(segment.to_string()));
    }
    if segment.contains('/') || segment.contains('\\') {
        return Err(KeyError::InvalidSegment(segment.to_string()));
    }
    Ok(())
}

/// Errors when building object keys
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// Empty key or segment
    #[error("empty key segment")]
    Empty,

    /// Segment would escape its namespace
    #[error("invalid key segment: '{0}'")]
    InvalidSegment(String),
}
