//! Type mapping definitions
//!
//! This module provides the scalar attribute types a content-type schema can declare.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scalar attribute type of a content-type field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Text,
    RichText,
    Email,
    Password,
    Uid,
    Enumeration,
    Integer,
    BigInteger,
    Float,
    Decimal,
    Boolean,
    Date,
    Time,
    DateTime,
    Timestamp,
    Json,
}

/// Returned when a schema names a type this crate does not know
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown attribute type: {0}")]
pub struct UnknownAttributeType(pub String);

impl AttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::Text => "text",
            AttributeType::RichText => "richtext",
            AttributeType::Email => "email",
            AttributeType::Password => "password",
            AttributeType::Uid => "uid",
            AttributeType::Enumeration => "enumeration",
            AttributeType::Integer => "integer",
            AttributeType::BigInteger => "biginteger",
            AttributeType::Float => "float",
            AttributeType::Decimal => "decimal",
            AttributeType::Boolean => "boolean",
            AttributeType::Date => "date",
            AttributeType::Time => "time",
            AttributeType::DateTime => "datetime",
            AttributeType::Timestamp => "timestamp",
            AttributeType::Json => "json",
        }
    }

    /// Types whose values are stored as strings
    pub fn is_string_like(&self) -> bool {
        matches!(
            self,
            AttributeType::String
                | AttributeType::Text
                | AttributeType::RichText
                | AttributeType::Email
                | AttributeType::Password
                | AttributeType::Uid
                | AttributeType::Enumeration
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            AttributeType::Integer
                | AttributeType::BigInteger
                | AttributeType::Float
                | AttributeType::Decimal
        )
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            AttributeType::Date
                | AttributeType::Time
                | AttributeType::DateTime
                | AttributeType::Timestamp
        )
    }
}

impl FromStr for AttributeType {
    type Err = UnknownAttributeType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s.trim().to_ascii_lowercase().as_str() {
            "string" => AttributeType::String,
            "text" => AttributeType::Text,
            "richtext" => AttributeType::RichText,
            "email" => AttributeType::Email,
            "password" => AttributeType::Password,
            "uid" => AttributeType::Uid,
            "enumeration" => AttributeType::Enumeration,
            "integer" => AttributeType::Integer,
            "biginteger" => AttributeType::BigInteger,
            "float" => AttributeType::Float,
            "decimal" => AttributeType::Decimal,
            "boolean" => AttributeType::Boolean,
            "date" => AttributeType::Date,
            "time" => AttributeType::Time,
            "datetime" => AttributeType::DateTime,
            "timestamp" => AttributeType::Timestamp,
            "json" => AttributeType::Json,
            other => return Err(UnknownAttributeType(other.to_string())),
        };
        Ok(ty)
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
