//! The canonical log record.
//!
//! A [`Record`] is constructed fresh per hit during hydration and is
//! immutable from the caller's point of view. The `id` is always the
//! backend-assigned identity; this crate never computes one.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Strict timestamp pattern: `YYYY-MM-DDThh:mm:ss.sssZ`, exactly three
/// fractional digits, literal `Z`. Non-lenient: any deviation is rejected,
/// never coerced.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// One structured log event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Backend-assigned identity, unique within one query result.
    pub id: String,
    /// Absolute instant, parsed under [`TIMESTAMP_FORMAT`].
    pub timestamp: DateTime<Utc>,
    /// Calendar date, parsed independently of `timestamp` and not
    /// required to be consistent with it.
    pub date: NaiveDate,
    /// Free-text origin identifier.
    pub source: Option<String>,
    /// Free-text payload.
    pub message: Option<String>,
    /// Free-text severity label.
    pub log_level: Option<String>,
    /// Free-text emitter identifier.
    pub logger: Option<String>,
    /// Free-text tenant/partner identifier.
    pub partner_id: Option<String>,
}

/// Parse a timestamp under the strict fixed pattern.
///
/// Returns `None` for anything that deviates even slightly: an extra
/// fractional digit, a wrong delimiter, a missing `Z`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    // The grammar is fixed-width (24 bytes). Guard the exact `.sssZ` tail
    // up front; the strptime pattern alone does not pin the fraction width.
    let bytes = raw.as_bytes();
    if bytes.len() != 24 || bytes[19] != b'.' || bytes[23] != b'Z' {
        return None;
    }
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parse an ISO calendar date (`YYYY-MM-DD`, zero-padded).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    if raw.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}
