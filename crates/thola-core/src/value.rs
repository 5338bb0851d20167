// ── Typed scalar values ──
//
// What a reader produces. Conversions are explicit and fail with
// `CoreError::Decode` when they would lose information. Comparison is
// defined between numeric variants (int/unsigned/float), between strings,
// between booleans and between binaries; anything else is an error.

use std::cmp::Ordering;
use std::fmt;

use serde::{Serialize, Serializer};
use strum::Display;

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    String(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ValueKind {
    Int,
    Uint,
    Float,
    Bool,
    String,
    Binary,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Int(_) => ValueKind::Int,
            Self::Uint(_) => ValueKind::Uint,
            Self::Float(_) => ValueKind::Float,
            Self::Bool(_) => ValueKind::Bool,
            Self::String(_) => ValueKind::String,
            Self::Binary(_) => ValueKind::Binary,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Uint(_) | Self::Float(_))
    }

    /// `true` for empty strings and empty binaries.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::String(s) => s.is_empty(),
            Self::Binary(b) => b.is_empty(),
            _ => false,
        }
    }

    fn conversion(&self, to: ValueKind) -> CoreError {
        CoreError::decode(format!("cannot convert {} '{self}' to {to}", self.kind()))
    }

    // ── Conversions ──────────────────────────────────────────────────

    pub fn as_i64(&self) -> Result<i64, CoreError> {
        match self {
            Self::Int(v) => Ok(*v),
            Self::Uint(v) => i64::try_from(*v).map_err(|_| self.conversion(ValueKind::Int)),
            Self::Float(f) => float_to_i64(*f).ok_or_else(|| self.conversion(ValueKind::Int)),
            Self::String(s) => s
                .trim()
                .parse()
                .map_err(|_| self.conversion(ValueKind::Int)),
            _ => Err(self.conversion(ValueKind::Int)),
        }
    }

    pub fn as_u64(&self) -> Result<u64, CoreError> {
        match self {
            Self::Uint(v) => Ok(*v),
            Self::Int(v) => u64::try_from(*v).map_err(|_| self.conversion(ValueKind::Uint)),
            Self::Float(f) => float_to_i64(*f)
                .and_then(|v| u64::try_from(v).ok())
                .ok_or_else(|| self.conversion(ValueKind::Uint)),
            Self::String(s) => s
                .trim()
                .parse()
                .map_err(|_| self.conversion(ValueKind::Uint)),
            _ => Err(self.conversion(ValueKind::Uint)),
        }
    }

    #[allow(clippy::cast_precision_loss, clippy::as_conversions, clippy::cast_possible_truncation)]
    pub fn as_f64(&self) -> Result<f64, CoreError> {
        match self {
            Self::Float(f) => Ok(*f),
            Self::Int(v) => {
                let f = *v as f64;
                if f as i64 == *v {
                    Ok(f)
                } else {
                    Err(self.conversion(ValueKind::Float))
                }
            }
            Self::Uint(v) => {
                let f = *v as f64;
                if f as u64 == *v {
                    Ok(f)
                } else {
                    Err(self.conversion(ValueKind::Float))
                }
            }
            Self::String(s) => s
                .trim()
                .parse()
                .map_err(|_| self.conversion(ValueKind::Float)),
            _ => Err(self.conversion(ValueKind::Float)),
        }
    }

    pub fn as_bool(&self) -> Result<bool, CoreError> {
        match self {
            Self::Bool(b) => Ok(*b),
            Self::Int(1) | Self::Uint(1) => Ok(true),
            Self::Int(0) | Self::Uint(0) => Ok(false),
            Self::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(self.conversion(ValueKind::Bool)),
            },
            _ => Err(self.conversion(ValueKind::Bool)),
        }
    }

    /// Render as text. Binaries become colon-separated hex.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    // ── Comparison ───────────────────────────────────────────────────

    pub fn try_cmp(&self, other: &Value) -> Result<Ordering, CoreError> {
        let incompatible = || {
            CoreError::decode(format!(
                "cannot compare {} with {}",
                self.kind(),
                other.kind()
            ))
        };
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Ok(a.cmp(b)),
            (Self::Uint(a), Self::Uint(b)) => Ok(a.cmp(b)),
            (Self::Int(a), Self::Uint(b)) => Ok(i128::from(*a).cmp(&i128::from(*b))),
            (Self::Uint(a), Self::Int(b)) => Ok(i128::from(*a).cmp(&i128::from(*b))),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let (x, y) = (a.as_f64()?, b.as_f64()?);
                x.partial_cmp(&y).ok_or_else(incompatible)
            }
            (Self::String(a), Self::String(b)) => Ok(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Ok(a.cmp(b)),
            (Self::Binary(a), Self::Binary(b)) => Ok(a.cmp(b)),
            _ => Err(incompatible()),
        }
    }

    pub fn try_eq(&self, other: &Value) -> Result<bool, CoreError> {
        self.try_cmp(other).map(|o| o == Ordering::Equal)
    }

    // ── JSON bridge ──────────────────────────────────────────────────

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Int(v) => serde_json::Value::from(*v),
            Self::Uint(v) => serde_json::Value::from(*v),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::String(_) | Self::Binary(_) => serde_json::Value::String(self.to_string()),
        }
    }

    /// Build from a YAML scalar (constants in class files).
    pub fn from_yaml(raw: &serde_yaml::Value) -> Result<Self, CoreError> {
        match raw {
            serde_yaml::Value::Bool(b) => Ok(Self::Bool(*b)),
            serde_yaml::Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    Ok(Self::Uint(u))
                } else if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else {
                    n.as_f64()
                        .map(Self::Float)
                        .ok_or_else(|| CoreError::config(format!("unsupported number {n}")))
                }
            }
            serde_yaml::Value::String(s) => Ok(Self::String(s.clone())),
            other => Err(CoreError::config(format!(
                "constant must be a scalar, got {other:?}"
            ))),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions, clippy::cast_precision_loss)]
fn float_to_i64(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::String(s) => f.write_str(s),
            Self::Binary(bytes) => {
                let hex: Vec<String> = bytes.iter().map(|b| format!("{b:02x}")).collect();
                f.write_str(&hex.join(":"))
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn lossless_numeric_conversions() {
        assert_eq!(Value::Uint(42).as_i64().unwrap(), 42);
        assert_eq!(Value::Float(3.0).as_u64().unwrap(), 3);
        assert!(Value::Float(3.5).as_i64().is_err());
        assert!(Value::Int(-1).as_u64().is_err());
        assert!(Value::Uint(u64::MAX).as_i64().is_err());
        assert!(Value::Uint(u64::MAX - 1).as_f64().is_err());
        assert_eq!(Value::from("17 ").as_i64().unwrap(), 17);
        assert!(Value::from("seventeen").as_i64().is_err());
    }

    #[test]
    fn numeric_variants_compare_across_kinds() {
        assert_eq!(Value::Int(-1).try_cmp(&Value::Uint(0)).unwrap(), Ordering::Less);
        assert_eq!(Value::Uint(10).try_cmp(&Value::Float(9.5)).unwrap(), Ordering::Greater);
        assert!(Value::Float(2.0).try_eq(&Value::Int(2)).unwrap());
    }

    #[test]
    fn cross_kind_comparison_fails() {
        let err = Value::from("5").try_cmp(&Value::Int(5)).unwrap_err();
        assert!(matches!(err, CoreError::Decode(_)));
        assert!(Value::Bool(true).try_eq(&Value::Int(1)).is_err());
        assert!(Value::Float(f64::NAN).try_cmp(&Value::Float(1.0)).is_err());
    }

    #[test]
    fn binary_renders_as_hex() {
        let mac = Value::Binary(vec![0x00, 0x1b, 0x2c, 0xff]);
        assert_eq!(mac.to_string(), "00:1b:2c:ff");
        assert_eq!(mac.to_json(), serde_json::json!("00:1b:2c:ff"));
    }

    #[test]
    fn yaml_constants() {
        let raw: serde_yaml::Value = serde_yaml::from_str("Cisco").unwrap();
        assert_eq!(Value::from_yaml(&raw).unwrap(), Value::from("Cisco"));
        let raw: serde_yaml::Value = serde_yaml::from_str("-3").unwrap();
        assert_eq!(Value::from_yaml(&raw).unwrap(), Value::Int(-3));
        let raw: serde_yaml::Value = serde_yaml::from_str("[1]").unwrap();
        assert!(Value::from_yaml(&raw).is_err());
    }
}
