//! Parse functions - validate a raw rate snapshot and flatten it into RateRow structs

use crate::ingestion::error::TransformError;
use crate::ingestion::types::{RateDocument, RateRow};
use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use tracing::info;

/// Keys that must be present in every snapshot, in reporting order
const REQUIRED_FIELDS: [&str; 5] = [
    "base_code",
    "time_last_update_utc",
    "time_next_update_utc",
    "time_last_update_unix",
    "time_next_update_unix",
];

/// Timestamp layout after the `"<Weekday>, "` prefix
const UTC_FORMAT: &str = "%d %b %Y %H:%M:%S %z";

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Flatten a raw snapshot into one row per target currency.
///
/// The whole document is validated before any row is built, so an error
/// never comes with a partial result. An absent or empty `conversion_rates`
/// yields an empty vector.
pub fn transform_rates(raw: &Value) -> Result<Vec<RateRow>, TransformError> {
    let document = parse_rate_document(raw)?;
    let rows = flatten(document);

    info!("Transformed {} currency rates rows", rows.len());

    Ok(rows)
}

/// Validate the raw JSON structure and type every field
pub fn parse_rate_document(raw: &Value) -> Result<RateDocument, TransformError> {
    let doc = raw.as_object().ok_or(TransformError::InvalidField {
        field: "<document>".to_string(),
        expected: "a JSON object",
    })?;

    for field in REQUIRED_FIELDS {
        if !doc.contains_key(field) {
            return Err(TransformError::MissingField(field));
        }
    }

    let base_code = string_field(doc, "base_code")?;
    if base_code.is_empty() {
        return Err(TransformError::InvalidField {
            field: "base_code".to_string(),
            expected: "a non-empty string",
        });
    }

    Ok(RateDocument {
        base_code,
        time_last_update_utc: timestamp_field(doc, "time_last_update_utc")?,
        time_next_update_utc: timestamp_field(doc, "time_next_update_utc")?,
        time_last_update_unix: integer_field(doc, "time_last_update_unix")?,
        time_next_update_unix: integer_field(doc, "time_next_update_unix")?,
        conversion_rates: conversion_rates(doc)?,
    })
}

fn flatten(document: RateDocument) -> Vec<RateRow> {
    let RateDocument {
        base_code,
        time_last_update_utc,
        time_next_update_utc,
        time_last_update_unix,
        time_next_update_unix,
        conversion_rates,
    } = document;

    conversion_rates
        .into_iter()
        .map(|(target_code, rate)| RateRow {
            base_code: base_code.clone(),
            target_code,
            rate,
            time_last_update_utc,
            time_next_update_utc,
            time_next_update_unix,
            time_last_update_unix,
        })
        .collect()
}

/// Parse `"Wed, 23 Jun 2025 10:00:00 +0000"`.
///
/// The weekday must be a valid abbreviation but is not checked against the
/// date; provider payloads are not consistent about it. Every field must be
/// separated by exactly one space.
pub fn parse_rate_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    let (weekday, rest) = value.split_once(", ")?;
    if !WEEKDAYS.iter().any(|day| day.eq_ignore_ascii_case(weekday)) {
        return None;
    }

    // chrono lets a format space match zero or more whitespace characters
    let tokens = rest.split(' ').collect::<Vec<_>>();
    let well_spaced = tokens
        .iter()
        .all(|token| !token.is_empty() && !token.contains(char::is_whitespace));
    if tokens.len() != UTC_FORMAT.split(' ').count() || !well_spaced {
        return None;
    }

    DateTime::parse_from_str(rest, UTC_FORMAT).ok()
}

/// Build an exact decimal from the JSON number literal
fn parse_rate(number: &Number) -> Option<Decimal> {
    let literal = number.to_string();
    Decimal::from_str_exact(&literal)
        .or_else(|_| Decimal::from_scientific(&literal))
        .ok()
}

fn string_field(doc: &Map<String, Value>, field: &'static str) -> Result<String, TransformError> {
    doc.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| TransformError::InvalidField {
            field: field.to_string(),
            expected: "a string",
        })
}

fn integer_field(doc: &Map<String, Value>, field: &'static str) -> Result<i64, TransformError> {
    doc.get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| TransformError::InvalidField {
            field: field.to_string(),
            expected: "an integer",
        })
}

fn timestamp_field(
    doc: &Map<String, Value>,
    field: &'static str,
) -> Result<DateTime<FixedOffset>, TransformError> {
    let value = string_field(doc, field)?;
    parse_rate_timestamp(&value).ok_or(TransformError::MalformedTimestamp { field, value })
}

fn conversion_rates(doc: &Map<String, Value>) -> Result<Vec<(String, Decimal)>, TransformError> {
    let rates = match doc.get("conversion_rates") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(rates)) => rates,
        Some(_) => {
            return Err(TransformError::InvalidField {
                field: "conversion_rates".to_string(),
                expected: "an object of currency code to rate",
            })
        }
    };

    rates
        .iter()
        .map(|(code, value)| {
            let rate = match value {
                Value::Number(number) => parse_rate(number),
                _ => None,
            };

            rate.map(|rate| (code.clone(), rate))
                .ok_or_else(|| TransformError::InvalidField {
                    field: format!("conversion_rates.{code}"),
                    expected: "a decimal with at most 28 fractional digits",
                })
        })
        .collect()
}
