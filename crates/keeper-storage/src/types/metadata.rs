//! Record metadata: a string-keyed map of scalar values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Metadata key holding the object-store location of a Binary record.
pub const FILE_URL_KEY: &str = "file_url";

/// A scalar metadata value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Number(f64),
    String(String),
}

pub type Metadata = BTreeMap<String, MetadataValue>;

#[derive(Debug, Error, PartialEq)]
pub enum InvalidMetadata {
    #[error("metadata key must not be empty")]
    EmptyKey,
    #[error("metadata value for {0:?} is not a finite number")]
    NonFinite(String),
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::String(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::String(s)
    }
}

impl From<f64> for MetadataValue {
    fn from(n: f64) -> Self {
        MetadataValue::Number(n)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        MetadataValue::Bool(b)
    }
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Number(n) => write!(f, "{n}"),
            MetadataValue::String(s) => f.write_str(s),
        }
    }
}

/// Reject metadata that would not survive a JSON round trip.
pub fn check_metadata(metadata: &Metadata) -> Result<(), InvalidMetadata> {
    for (key, value) in metadata {
        if key.is_empty() {
            return Err(InvalidMetadata::EmptyKey);
        }
        if let MetadataValue::Number(n) = value {
            if !n.is_finite() {
                return Err(InvalidMetadata::NonFinite(key.clone()));
            }
        }
    }
    Ok(())
}

/// Parse a `key=value` tag from the command line or a config file.
/// `true`/`false` become booleans, anything numeric becomes a number.
pub fn parse_tag(tag: &str) -> Option<(String, MetadataValue)> {
    let (key, raw) = tag.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let value = match raw {
        "true" => MetadataValue::Bool(true),
        "false" => MetadataValue::Bool(false),
        _ => match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => MetadataValue::Number(n),
            _ => MetadataValue::String(raw.to_string()),
        },
    };
    Some((key.to_string(), value))
}
