//! PgRow → JSON value decoding.
//!
//! Rows are returned to callers as ordered column values. Each column is
//! decoded according to its PostgreSQL type; NULL becomes `null`. NUMERIC is
//! rendered as a string so no precision is lost, and INTERVAL uses the
//! server's default `postgres` output style. Types without a mapping fall
//! back to their UTF-8 payload, or to `\x`-prefixed hex when it is not text.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::types::{Oid, PgInterval, PgTimeTz};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use uuid::Uuid;

use crate::connector::Row;

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_MINUTE: i64 = 60 * MICROS_PER_SECOND;
const MICROS_PER_HOUR: i64 = 60 * MICROS_PER_MINUTE;

/// Decode every column of a row, in select-list order.
pub fn decode_row(row: &PgRow) -> Result<Row, sqlx::Error> {
    row.columns()
        .iter()
        .map(|col| decode_column(row, col.ordinal(), col.type_info().name()))
        .collect()
}

fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match type_name {
        "BOOL" => Value::from(row.try_get::<bool, _>(idx)?),
        "INT2" => Value::from(row.try_get::<i16, _>(idx)?),
        "INT4" => Value::from(row.try_get::<i32, _>(idx)?),
        "INT8" => Value::from(row.try_get::<i64, _>(idx)?),
        "OID" => Value::from(row.try_get::<Oid, _>(idx)?.0),
        "FLOAT4" => Value::from(row.try_get::<f32, _>(idx)?),
        "FLOAT8" => Value::from(row.try_get::<f64, _>(idx)?),
        "NUMERIC" => numeric_value(row.try_get::<Decimal, _>(idx)?),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => Value::from(row.try_get::<String, _>(idx)?),
        "BYTEA" => bytea_value(&row.try_get::<Vec<u8>, _>(idx)?),
        "TIMESTAMP" => Value::from(
            row.try_get::<NaiveDateTime, _>(idx)?
                .format("%Y-%m-%dT%H:%M:%S%.f")
                .to_string(),
        ),
        "TIMESTAMPTZ" => Value::from(row.try_get::<DateTime<Utc>, _>(idx)?.to_rfc3339()),
        "DATE" => Value::from(row.try_get::<NaiveDate, _>(idx)?.to_string()),
        "TIME" => Value::from(format_time(row.try_get::<NaiveTime, _>(idx)?)),
        "TIMETZ" => {
            let value = row.try_get::<PgTimeTz<NaiveTime, FixedOffset>, _>(idx)?;
            Value::from(format!("{}{}", format_time(value.time), value.offset))
        }
        "INTERVAL" => Value::from(format_interval(&row.try_get::<PgInterval, _>(idx)?)),
        "UUID" => Value::from(row.try_get::<Uuid, _>(idx)?.to_string()),
        "JSON" | "JSONB" => row.try_get::<Value, _>(idx)?,
        "BOOL[]" => Value::from(row.try_get::<Vec<Option<bool>>, _>(idx)?),
        "INT2[]" => Value::from(row.try_get::<Vec<Option<i16>>, _>(idx)?),
        "INT4[]" => Value::from(row.try_get::<Vec<Option<i32>>, _>(idx)?),
        "INT8[]" => Value::from(row.try_get::<Vec<Option<i64>>, _>(idx)?),
        "FLOAT8[]" => Value::from(row.try_get::<Vec<Option<f64>>, _>(idx)?),
        "TEXT[]" | "VARCHAR[]" | "CHAR[]" | "NAME[]" => {
            Value::from(row.try_get::<Vec<Option<String>>, _>(idx)?)
        }
        other => {
            // Enums and other text-like types carry their label as UTF-8.
            let raw = row.try_get_unchecked::<Vec<u8>, _>(idx)?;
            match String::from_utf8(raw) {
                Ok(text) => Value::from(text),
                Err(e) => {
                    tracing::debug!(
                        column = idx,
                        pg_type = other,
                        "Non-text payload for unmapped column type"
                    );
                    bytea_value(e.as_bytes())
                }
            }
        }
    };

    Ok(value)
}

/// NUMERIC keeps its declared scale: `12.50` stays `"12.50"`.
fn numeric_value(value: Decimal) -> Value {
    Value::from(value.to_string())
}

/// Same `\x` hex form PostgreSQL prints for `bytea`.
fn bytea_value(bytes: &[u8]) -> Value {
    Value::from(format!("\\x{}", hex::encode(bytes)))
}

fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M:%S%.f").to_string()
}

/// Render an interval the way PostgreSQL's `postgres` IntervalStyle does,
/// e.g. `1 year 2 mons 3 days 04:05:06.5`.
fn format_interval(interval: &PgInterval) -> String {
    let mut parts = Vec::new();
    let mut seen_negative = false;

    let years = interval.months / 12;
    let months = interval.months % 12;
    for (amount, unit) in [(years, "year"), (months, "mon"), (interval.days, "day")] {
        if amount == 0 {
            continue;
        }
        let sign = if seen_negative && amount > 0 { "+" } else { "" };
        let plural = if amount == 1 { "" } else { "s" };
        parts.push(format!("{sign}{amount} {unit}{plural}"));
        seen_negative |= amount < 0;
    }

    if interval.microseconds != 0 || parts.is_empty() {
        let micros = interval.microseconds;
        let sign = if micros < 0 {
            "-"
        } else if seen_negative {
            "+"
        } else {
            ""
        };
        let micros = micros.unsigned_abs();
        let hours = micros / MICROS_PER_HOUR as u64;
        let minutes = micros % MICROS_PER_HOUR as u64 / MICROS_PER_MINUTE as u64;
        let seconds = micros % MICROS_PER_MINUTE as u64 / MICROS_PER_SECOND as u64;
        let fraction = micros % MICROS_PER_SECOND as u64;

        let mut clock = format!("{sign}{hours:02}:{minutes:02}:{seconds:02}");
        if fraction != 0 {
            let digits = format!("{fraction:06}");
            clock.push('.');
            clock.push_str(digits.trim_end_matches('0'));
        }
        parts.push(clock);
    }

    parts.join(" ")
}
