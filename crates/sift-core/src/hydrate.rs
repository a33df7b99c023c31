//! Result hydration — one raw backend hit becomes one validated [`Record`].
//!
//! Hydration is a pure function of the hit's field map plus its backend id.
//! `timestamp` and `date` are required and strictly parsed; the free-text
//! fields are optional and copied verbatim. Nothing is reformatted,
//! defaulted, or coerced.

use serde_json::{Map, Value};

use crate::error::HydrationError;
use crate::record::{parse_date, parse_timestamp, Record};

/// What a batch does when one of its records fails to hydrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HydrationPolicy {
    /// The first malformed record fails the whole batch. Default: strict
    /// correctness over partial results.
    #[default]
    AbortOnFirst,
    /// Collect one error per failing record and keep going.
    CollectErrors,
}

/// Outcome of a batch hydration under [`HydrationPolicy::CollectErrors`].
///
/// Under `AbortOnFirst` the `failures` vector is always empty — the first
/// failure is returned as the error instead.
#[derive(Debug, Clone, Default)]
pub struct HydratedBatch {
    pub records: Vec<Record>,
    pub failures: Vec<HydrationError>,
}

/// Hydrate one raw hit into a [`Record`].
pub fn hydrate(fields: &Map<String, Value>, id: &str) -> Result<Record, HydrationError> {
    let raw_ts = required_str(fields, "timestamp", id)?;
    let timestamp = parse_timestamp(raw_ts).ok_or_else(|| HydrationError::MalformedField {
        field: "timestamp",
        id: id.to_string(),
        value: raw_ts.to_string(),
    })?;

    let raw_date = required_str(fields, "date", id)?;
    let date = parse_date(raw_date).ok_or_else(|| HydrationError::MalformedField {
        field: "date",
        id: id.to_string(),
        value: raw_date.to_string(),
    })?;

    Ok(Record {
        id: id.to_string(),
        timestamp,
        date,
        source: optional_str(fields, "source", id)?,
        message: optional_str(fields, "message", id)?,
        log_level: optional_str(fields, "loglevel", id)?,
        logger: optional_str(fields, "logger", id)?,
        partner_id: optional_str(fields, "partnerid", id)?,
    })
}

/// Hydrate a batch of `(fields, id)` pairs under the given policy.
pub fn hydrate_batch<'a, I>(hits: I, policy: HydrationPolicy) -> Result<HydratedBatch, HydrationError>
where
    I: IntoIterator<Item = (&'a Map<String, Value>, &'a str)>,
{
    let mut batch = HydratedBatch::default();
    for (fields, id) in hits {
        match hydrate(fields, id) {
            Ok(record) => batch.records.push(record),
            Err(err) => match policy {
                HydrationPolicy::AbortOnFirst => return Err(err),
                HydrationPolicy::CollectErrors => batch.failures.push(err),
            },
        }
    }
    Ok(batch)
}

fn required_str<'m>(
    fields: &'m Map<String, Value>,
    field: &'static str,
    id: &str,
) -> Result<&'m str, HydrationError> {
    match fields.get(field) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(HydrationError::MalformedField {
            field,
            id: id.to_string(),
            value: other.to_string(),
        }),
        None => Err(HydrationError::MissingField {
            field,
            id: id.to_string(),
        }),
    }
}

fn optional_str(
    fields: &Map<String, Value>,
    field: &'static str,
    id: &str,
) -> Result<Option<String>, HydrationError> {
    match fields.get(field) {
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Null) | None => Ok(None),
        Some(other) => Err(HydrationError::MalformedField {
            field,
            id: id.to_string(),
            value: other.to_string(),
        }),
    }
}
