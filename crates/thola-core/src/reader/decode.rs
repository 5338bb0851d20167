// Value decoding
//
// Natural mapping from SNMP wire values: counters and timeticks become
// unsigned, integers and gauges signed, printable octet strings text.
// A declared decode then coerces the natural value and fails with
// `Decode` when it cannot.

use serde::Deserialize;
use strum::{Display, EnumString};
use thola_transport::snmp::SnmpValue;

use crate::error::CoreError;
use crate::value::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Decode {
    /// Keep the natural value.
    #[default]
    Auto,
    String,
    Int,
    Uint,
    Float,
    Bool,
    /// Raw bytes as contiguous lowercase hex.
    Hex,
    /// Raw bytes as a colon-separated MAC address.
    Mac,
    /// Float in `[0, 100]`.
    Percent,
    /// Per-mil value scaled to percent.
    Permille,
    /// Fraction in `[0, 1]` scaled to percent.
    Fraction,
}

impl Decode {
    pub fn snmp(self, value: &SnmpValue) -> Result<Value, CoreError> {
        match (self, value) {
            (Self::Hex, SnmpValue::OctetString(bytes) | SnmpValue::Opaque(bytes)) => {
                Ok(Value::String(hex(bytes)))
            }
            (Self::Mac, SnmpValue::OctetString(bytes)) => mac(bytes),
            _ => self.value(natural(value)?),
        }
    }

    pub fn value(self, value: Value) -> Result<Value, CoreError> {
        match self {
            Self::Auto => Ok(value),
            Self::String => Ok(Value::String(value.to_text())),
            Self::Int => value.as_i64().map(Value::Int),
            Self::Uint => value.as_u64().map(Value::Uint),
            Self::Float => value.as_f64().map(Value::Float),
            Self::Bool => value.as_bool().map(Value::Bool),
            Self::Hex => match value {
                Value::String(s) => Ok(Value::String(hex(s.as_bytes()))),
                Value::Binary(b) => Ok(Value::String(hex(&b))),
                other => Err(CoreError::decode(format!(
                    "cannot render {} as hex",
                    other.kind()
                ))),
            },
            Self::Mac => match value {
                Value::Binary(b) => mac(&b),
                Value::String(s) => mac(s.as_bytes()),
                other => Err(CoreError::decode(format!(
                    "cannot render {} as MAC address",
                    other.kind()
                ))),
            },
            Self::Percent => percent(value.as_f64()?, value),
            Self::Permille => percent(value.as_f64()? / 10.0, value),
            Self::Fraction => percent(value.as_f64()? * 100.0, value),
        }
    }
}

fn percent(scaled: f64, raw: Value) -> Result<Value, CoreError> {
    if (0.0..=100.0).contains(&scaled) {
        Ok(Value::Float(scaled))
    } else {
        Err(CoreError::decode(format!(
            "value {raw} is out of the percent range (scaled to {scaled})"
        )))
    }
}

/// The wire value as a typed value. Exceptions and `Null` are `NotFound`.
pub fn natural(value: &SnmpValue) -> Result<Value, CoreError> {
    Ok(match value {
        SnmpValue::Integer(v) => Value::Int(*v),
        SnmpValue::Gauge32(v) => Value::Int(i64::from(*v)),
        SnmpValue::Counter32(v) | SnmpValue::TimeTicks(v) => Value::Uint(u64::from(*v)),
        SnmpValue::Counter64(v) => Value::Uint(*v),
        SnmpValue::OctetString(bytes) => text_or_binary(bytes),
        SnmpValue::ObjectId(oid) => Value::String(oid.to_string()),
        SnmpValue::IpAddress([a, b, c, d]) => Value::String(format!("{a}.{b}.{c}.{d}")),
        SnmpValue::Opaque(bytes) => Value::Binary(bytes.clone()),
        SnmpValue::Null
        | SnmpValue::NoSuchObject
        | SnmpValue::NoSuchInstance
        | SnmpValue::EndOfMibView => {
            return Err(CoreError::not_found(format!(
                "{} value",
                value.type_name()
            )));
        }
    })
}

fn text_or_binary(bytes: &[u8]) -> Value {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    let trimmed = bytes.get(..end).unwrap_or_default();
    match std::str::from_utf8(trimmed) {
        Ok(s) if s.chars().all(|c| !c.is_control() || c.is_whitespace()) => {
            Value::String(s.to_owned())
        }
        _ => Value::Binary(bytes.to_vec()),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn mac(bytes: &[u8]) -> Result<Value, CoreError> {
    if bytes.is_empty() {
        return Err(CoreError::not_found("empty MAC address"));
    }
    Ok(Value::String(Value::Binary(bytes.to_vec()).to_text()))
}
