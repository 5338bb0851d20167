// Value transforms applied after a reader produced its raw value.

use indexmap::IndexMap;
use regex::Regex;

use crate::condition::Matcher;
use crate::error::CoreError;
use crate::value::Value;

#[derive(Debug, Clone)]
pub enum TransformOp {
    /// Replace matches (`$n` expands captures). Without a match the value
    /// passes through, unless `must_match` is set.
    RegexReplace {
        regex: Regex,
        replacement: String,
        must_match: bool,
    },
    /// Keep one capture group; no match is `NotFound`.
    RegexExtract { regex: Regex, group: usize },
    ToLower,
    ToUpper,
    Trim,
    /// Character range `[start, end)`, clamped to the text.
    Substring { start: usize, end: Option<usize> },
    ParseInt,
    ParseFloat,
    Multiply(f64),
    Divide(f64),
    AddPrefix(String),
    AddSuffix(String),
    Overwrite(Value),
    /// Look the text up in a table. Misses pass the text through or are `NotFound`.
    Map {
        values: IndexMap<String, Value>,
        passthrough: bool,
    },
    /// Drop values the matcher accepts.
    Filter(Matcher),
}

impl TransformOp {
    pub fn apply(&self, value: Value) -> Result<Value, CoreError> {
        match self {
            Self::RegexReplace {
                regex,
                replacement,
                must_match,
            } => {
                let text = value.to_text();
                if regex.is_match(&text) {
                    Ok(Value::String(
                        regex.replace_all(&text, replacement.as_str()).into_owned(),
                    ))
                } else if *must_match {
                    Err(CoreError::not_found(format!(
                        "'{text}' does not match /{}/",
                        regex.as_str()
                    )))
                } else {
                    Ok(value)
                }
            }
            Self::RegexExtract { regex, group } => {
                let text = value.to_text();
                regex
                    .captures(&text)
                    .and_then(|caps| caps.get(*group))
                    .map(|m| Value::String(m.as_str().to_owned()))
                    .ok_or_else(|| {
                        CoreError::not_found(format!("'{text}' does not match /{}/", regex.as_str()))
                    })
            }
            Self::ToLower => Ok(Value::String(value.to_text().to_lowercase())),
            Self::ToUpper => Ok(Value::String(value.to_text().to_uppercase())),
            Self::Trim => Ok(Value::String(value.to_text().trim().to_owned())),
            Self::Substring { start, end } => {
                let text = value.to_text();
                let count = text.chars().count();
                let end = end.unwrap_or(count).min(count);
                let start = (*start).min(end);
                Ok(Value::String(
                    text.chars().skip(start).take(end - start).collect(),
                ))
            }
            Self::ParseInt => value.as_i64().map(Value::Int),
            Self::ParseFloat => value.as_f64().map(Value::Float),
            Self::Multiply(factor) => multiply(&value, *factor),
            Self::Divide(divisor) => Ok(Value::Float(value.as_f64()? / divisor)),
            Self::AddPrefix(prefix) => Ok(Value::String(format!("{prefix}{value}"))),
            Self::AddSuffix(suffix) => Ok(Value::String(format!("{value}{suffix}"))),
            Self::Overwrite(constant) => Ok(constant.clone()),
            Self::Map {
                values,
                passthrough,
            } => {
                let key = value.to_text();
                match values.get(&key) {
                    Some(mapped) => Ok(mapped.clone()),
                    None if *passthrough => Ok(Value::String(key)),
                    None => Err(CoreError::not_found(format!("no mapping for '{key}'"))),
                }
            }
            Self::Filter(matcher) => {
                if matcher.matches(&value) {
                    Err(CoreError::not_found(format!("value '{value}' filtered out")))
                } else {
                    Ok(value)
                }
            }
        }
    }
}

/// Integers stay integers when the factor is integral.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn multiply(value: &Value, factor: f64) -> Result<Value, CoreError> {
    let integral = factor.fract() == 0.0 && factor.abs() < 9.0e15;
    match value {
        Value::Int(v) if integral => v
            .checked_mul(factor as i64)
            .map(Value::Int)
            .ok_or_else(|| CoreError::decode(format!("{v} * {factor} overflows"))),
        Value::Uint(v) if integral && factor >= 0.0 => v
            .checked_mul(factor as u64)
            .map(Value::Uint)
            .ok_or_else(|| CoreError::decode(format!("{v} * {factor} overflows"))),
        other => Ok(Value::Float(other.as_f64()? * factor)),
    }
}

/// Run every op in order.
pub fn apply_all(ops: &[TransformOp], value: Value) -> Result<Value, CoreError> {
    ops.iter().try_fold(value, |v, op| op.apply(v))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn replace(pattern: &str, replacement: &str, must_match: bool) -> TransformOp {
        TransformOp::RegexReplace {
            regex: Regex::new(pattern).unwrap(),
            replacement: replacement.into(),
            must_match,
        }
    }

    #[test]
    fn regex_replace_passes_through_without_match() {
        let op = replace(r"^cisco (\S+).*$", "$1", false);
        assert_eq!(
            op.apply(Value::from("cisco WS-C2960 rev 2")).unwrap(),
            Value::from("WS-C2960")
        );
        assert_eq!(op.apply(Value::from("juniper")).unwrap(), Value::from("juniper"));
        let strict = replace(r"^cisco (\S+).*$", "$1", true);
        assert!(strict.apply(Value::from("juniper")).unwrap_err().is_absent());
    }

    #[test]
    fn chain_of_ops() {
        let ops = [
            TransformOp::RegexExtract {
                regex: Regex::new(r"Version ([\d.()A-Za-z]+)").unwrap(),
                group: 1,
            },
            TransformOp::AddPrefix("v".into()),
            TransformOp::ToUpper,
        ];
        let out = apply_all(&ops, Value::from("IOS Software, Version 15.2(4)E7, RELEASE")).unwrap();
        assert_eq!(out, Value::from("V15.2(4)E7"));
    }

    #[test]
    fn arithmetic() {
        assert_eq!(TransformOp::Multiply(1024.0).apply(Value::Uint(2)).unwrap(), Value::Uint(2048));
        assert_eq!(TransformOp::Multiply(0.5).apply(Value::Int(3)).unwrap(), Value::Float(1.5));
        assert_eq!(TransformOp::Divide(10.0).apply(Value::Int(455)).unwrap(), Value::Float(45.5));
        assert!(TransformOp::ParseInt.apply(Value::from("n/a")).is_err());
    }

    #[test]
    fn map_and_filter() {
        let mut values = IndexMap::new();
        values.insert("1".to_owned(), Value::from("up"));
        values.insert("2".to_owned(), Value::from("down"));
        let strict = TransformOp::Map {
            values: values.clone(),
            passthrough: false,
        };
        assert_eq!(strict.apply(Value::Int(2)).unwrap(), Value::from("down"));
        assert!(strict.apply(Value::Int(7)).unwrap_err().is_absent());
        let lenient = TransformOp::Map {
            values,
            passthrough: true,
        };
        assert_eq!(lenient.apply(Value::Int(7)).unwrap(), Value::from("7"));

        let filter = TransformOp::Filter(Matcher::equals("unknown"));
        assert!(filter.apply(Value::from("Unknown")).unwrap_err().is_absent());
        assert_eq!(filter.apply(Value::from("fan1")).unwrap(), Value::from("fan1"));
    }

    #[test]
    fn substring_clamps() {
        let op = TransformOp::Substring {
            start: 2,
            end: Some(50),
        };
        assert_eq!(op.apply(Value::from("ÄÖÜabc")).unwrap(), Value::from("Üabc"));
    }
}
