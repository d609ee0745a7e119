//! Validation utilities for type mapping
//!
//! This module coerces incoming JSON values (query strings, request bodies) into the
//! canonical representation of a scalar attribute type.

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use serde_json::{Number, Value};
use thiserror::Error;

use crate::types::AttributeType;

/// A value could not be represented as the requested attribute type
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Expected a value of type '{expected}', got {found}")]
pub struct CoercionError {
    pub expected: AttributeType,
    pub found: String,
}

impl CoercionError {
    fn new(expected: AttributeType, value: &Value) -> Self {
        Self {
            expected,
            found: describe(value),
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => format!("string {:?}", s),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}

/// Coerce a value into the canonical JSON form of `ty`.
///
/// `null` is accepted for every type; requiredness is checked by the caller.
pub fn coerce_value(ty: AttributeType, value: &Value) -> Result<Value, CoercionError> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    let err = || CoercionError::new(ty, value);

    match ty {
        AttributeType::String
        | AttributeType::Text
        | AttributeType::RichText
        | AttributeType::Email
        | AttributeType::Password
        | AttributeType::Uid
        | AttributeType::Enumeration => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(err()),
        },
        AttributeType::Integer => {
            let n = as_integer(value).ok_or_else(err)?;
            if n < i32::MIN as i64 || n > i32::MAX as i64 {
                return Err(err());
            }
            Ok(Value::from(n))
        }
        AttributeType::BigInteger => as_integer(value).map(Value::from).ok_or_else(err),
        AttributeType::Float | AttributeType::Decimal => {
            let f = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }
            .ok_or_else(err)?;
            Number::from_f64(f).map(Value::Number).ok_or_else(err)
        }
        AttributeType::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(Value::Bool(false)),
                Some(1) => Ok(Value::Bool(true)),
                _ => Err(err()),
            },
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(Value::Bool(true)),
                "false" | "f" | "0" => Ok(Value::Bool(false)),
                _ => Err(err()),
            },
            _ => Err(err()),
        },
        AttributeType::Date => {
            let s = value.as_str().ok_or_else(err)?.trim();
            let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .or_else(|| {
                    DateTime::parse_from_rfc3339(s)
                        .ok()
                        .map(|dt| dt.with_timezone(&Utc).date_naive())
                })
                .ok_or_else(err)?;
            Ok(Value::String(date.format("%Y-%m-%d").to_string()))
        }
        AttributeType::Time => {
            let s = value.as_str().ok_or_else(err)?.trim();
            let time = NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .map_err(|_| err())?;
            Ok(Value::String(time.format("%H:%M:%S%.3f").to_string()))
        }
        AttributeType::DateTime | AttributeType::Timestamp => {
            let dt = match value {
                Value::String(s) => parse_datetime(s.trim()),
                Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
                _ => None,
            }
            .ok_or_else(err)?;
            Ok(Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)))
        }
        AttributeType::Json => Ok(value.clone()),
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Check if an attribute type can be used in a sort clause
pub fn is_sortable(ty: AttributeType) -> bool {
    !matches!(ty, AttributeType::Json | AttributeType::Password)
}

/// Check if an attribute type participates in free-text (`_q`) search
pub fn is_text_searchable(ty: AttributeType) -> bool {
    ty.is_string_like() && ty != AttributeType::Password
}
