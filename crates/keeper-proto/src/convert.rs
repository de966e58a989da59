//! Conversions between wire messages and storage types.
//!
//! Both the client and the server go through these tables, so a new
//! [`SecretKind`] fails to compile here until it has a wire value.

use chrono::{DateTime, Utc};
use keeper_storage::{Metadata, MetadataValue as Scalar, SecretKind};
use std::collections::HashMap;

use crate::metadata_value::Kind;
use crate::{DataType, MetadataValue};

impl From<SecretKind> for DataType {
    fn from(kind: SecretKind) -> Self {
        match kind {
            SecretKind::LoginPassword => DataType::LoginPassword,
            SecretKind::Text => DataType::TextData,
            SecretKind::Binary => DataType::BinaryData,
            SecretKind::BankCard => DataType::BankCard,
        }
    }
}

/// Map a raw wire value to a kind. Unknown values and `UNSPECIFIED` yield `None`.
pub fn kind_from_wire(raw: i32) -> Option<SecretKind> {
    match DataType::try_from(raw).ok()? {
        DataType::Unspecified => None,
        DataType::LoginPassword => Some(SecretKind::LoginPassword),
        DataType::TextData => Some(SecretKind::Text),
        DataType::BinaryData => Some(SecretKind::Binary),
        DataType::BankCard => Some(SecretKind::BankCard),
    }
}

pub fn kind_to_wire(kind: SecretKind) -> i32 {
    DataType::from(kind) as i32
}

impl From<&Scalar> for MetadataValue {
    fn from(value: &Scalar) -> Self {
        let kind = match value {
            Scalar::String(s) => Kind::StringValue(s.clone()),
            Scalar::Number(n) => Kind::NumberValue(*n),
            Scalar::Bool(b) => Kind::BoolValue(*b),
        };
        MetadataValue { kind: Some(kind) }
    }
}

impl MetadataValue {
    /// `None` when the sender left the oneof unset.
    pub fn into_scalar(self) -> Option<Scalar> {
        Some(match self.kind? {
            Kind::StringValue(s) => Scalar::String(s),
            Kind::NumberValue(n) => Scalar::Number(n),
            Kind::BoolValue(b) => Scalar::Bool(b),
        })
    }
}

pub fn metadata_to_wire(metadata: &Metadata) -> HashMap<String, MetadataValue> {
    metadata
        .iter()
        .map(|(k, v)| (k.clone(), MetadataValue::from(v)))
        .collect()
}

/// Entries whose value is unset are dropped.
pub fn metadata_from_wire(wire: HashMap<String, MetadataValue>) -> Metadata {
    wire.into_iter()
        .filter_map(|(k, v)| v.into_scalar().map(|v| (k, v)))
        .collect()
}

pub fn to_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

pub fn from_micros(micros: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
}
