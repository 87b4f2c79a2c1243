//! UTC timestamp parsing and formatting.
//!
//! Every timestamp the sync core touches — `Task.created`/`updated`,
//! `github.last_synced`, the remote's `updatedAt` — is UTC. Z-suffixed
//! inputs are accepted on read, but output always uses the explicit
//! `+00:00` form so re-serialized frontmatter is stable.

use crate::error::{Result, SltasksError};
use chrono::{DateTime, SecondsFormat, Utc};

/// Parse an RFC3339 timestamp, accepting both `Z` and `+00:00` suffixes.
///
/// # Errors
///
/// Returns `ParseFailed` if `s` is not a valid RFC3339 timestamp.
pub fn parse_utc_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SltasksError::ParseFailed(format!("invalid timestamp '{s}': {e}")))
}

/// Format a UTC timestamp using the explicit `+00:00` offset form required
/// for written frontmatter (never `Z`).
#[must_use]
pub fn format_utc_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_z_suffix() {
        let dt = parse_utc_timestamp("2025-01-15T12:00:00Z").unwrap();
        assert_eq!(dt.timestamp(), 1_736_942_400);
    }

    #[test]
    fn accepts_explicit_offset() {
        let dt = parse_utc_timestamp("2025-01-15T12:00:00+00:00").unwrap();
        assert_eq!(dt.timestamp(), 1_736_942_400);
    }

    #[test]
    fn output_uses_explicit_offset_not_z() {
        let dt = parse_utc_timestamp("2025-01-15T12:00:00Z").unwrap();
        let formatted = format_utc_timestamp(dt);
        assert!(formatted.ends_with("+00:00"));
        assert!(!formatted.ends_with('Z'));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_utc_timestamp("not a date").is_err());
    }
}
