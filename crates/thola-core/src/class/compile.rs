// Class definition → runtime readers and conditions.

use indexmap::IndexMap;
use regex::Regex;
use thola_transport::Oid;

use super::definition::{
    ColumnDef, ConditionDef, GroupReaderDef, HttpBodyDef, MatcherDef, OneOrMany, ReaderDef,
    TransformDef,
};
use crate::condition::{Condition, MatchKind, Matcher};
use crate::error::CoreError;
use crate::reader::{Column, GroupReader, Reader, TransformOp};
use crate::value::Value;

pub fn oid(raw: &str) -> Result<Oid, CoreError> {
    raw.parse()
        .map_err(|_| CoreError::config(format!("invalid OID '{raw}'")))
}

fn regex(pattern: &str) -> Result<Regex, CoreError> {
    Regex::new(pattern).map_err(|e| CoreError::config(format!("invalid regex '{pattern}': {e}")))
}

// ── Conditions ──────────────────────────────────────────────────────

pub fn condition(def: &ConditionDef) -> Result<Condition, CoreError> {
    Ok(match def {
        ConditionDef::Always => Condition::Always,
        ConditionDef::And(list) => Condition::And(list.iter().map(condition).collect::<Result<_, _>>()?),
        ConditionDef::Or(list) => Condition::Or(list.iter().map(condition).collect::<Result<_, _>>()?),
        ConditionDef::Not(inner) => Condition::Not(Box::new(condition(inner)?)),
        ConditionDef::Property { property, matches } => Condition::Property {
            property: *property,
            matcher: matcher(matches)?,
        },
        ConditionDef::SnmpGet { oid: raw, matches } => Condition::SnmpGet {
            oid: oid(raw)?,
            matcher: matcher(matches)?,
        },
        ConditionDef::HttpGet { path, matches } => Condition::HttpGet {
            path: path.clone(),
            matcher: matcher(matches)?,
        },
    })
}

pub fn matcher(def: &MatcherDef) -> Result<Matcher, CoreError> {
    let ranged = def.min.is_some() || def.max.is_some();
    let kinds = [
        def.equals.is_some(),
        def.contains.is_some(),
        def.starts_with.is_some(),
        def.regex.is_some(),
        def.one_of.is_some(),
        ranged,
    ]
    .iter()
    .filter(|set| **set)
    .count();
    if kinds != 1 {
        return Err(CoreError::config(format!(
            "a matcher needs exactly one of equals, contains, starts_with, regex, one_of or min/max (got {kinds})"
        )));
    }

    let case_sensitive = def.case_sensitive;
    if let Some(pattern) = &def.regex {
        return Matcher::regex(pattern, def.anchored, case_sensitive);
    }
    if ranged {
        return Matcher::range(def.min, def.max);
    }
    let kind = if let Some(s) = &def.equals {
        MatchKind::Equals(s.clone())
    } else if let Some(s) = &def.contains {
        MatchKind::Contains(s.clone())
    } else if let Some(s) = &def.starts_with {
        MatchKind::StartsWith(s.clone())
    } else {
        MatchKind::OneOf(def.one_of.clone().unwrap_or_default())
    };
    Ok(Matcher::new(kind, case_sensitive))
}

// ── Readers ─────────────────────────────────────────────────────────

/// A list of readers becomes `FirstNonEmpty`; a single one stays as is.
pub fn readers(def: OneOrMany<ReaderDef>) -> Result<Reader, CoreError> {
    let mut list = def
        .into_vec()
        .iter()
        .map(reader)
        .collect::<Result<Vec<_>, _>>()?;
    match list.len() {
        0 => Err(CoreError::config("empty reader list")),
        1 => Ok(list.remove(0)),
        _ => Ok(Reader::FirstNonEmpty(list)),
    }
}

pub fn reader(def: &ReaderDef) -> Result<Reader, CoreError> {
    let sources = usize::from(def.constant.is_some())
        + usize::from(def.snmp_get.is_some())
        + usize::from(def.http_body.is_some())
        + usize::from(def.first_non_empty.is_some());
    if sources != 1 {
        return Err(CoreError::config(format!(
            "a reader needs exactly one of constant, snmp_get, http_body or first_non_empty (got {sources})"
        )));
    }

    let mut base = if let Some(raw) = &def.constant {
        Reader::Constant(Value::from_yaml(raw)?)
    } else if let Some(get) = &def.snmp_get {
        Reader::Snmp {
            oid: oid(&get.oid)?,
            decode: get.decode,
        }
    } else if let Some(body) = &def.http_body {
        http_body(body)?
    } else {
        let nested = def
            .first_non_empty
            .iter()
            .flatten()
            .map(reader)
            .collect::<Result<Vec<_>, _>>()?;
        Reader::FirstNonEmpty(nested)
    };

    if !def.transform.is_empty() {
        base = Reader::Transform {
            inner: Box::new(base),
            ops: transforms(&def.transform)?,
        };
    }
    if let Some(gate) = &def.gate {
        base = Reader::Gated {
            gate: condition(gate)?,
            inner: Box::new(base),
        };
    }
    Ok(base)
}

fn http_body(def: &HttpBodyDef) -> Result<Reader, CoreError> {
    let compiled = def.regex.as_deref().map(regex).transpose()?;
    let group = match (&compiled, def.group) {
        (_, Some(group)) => group,
        (Some(r), None) if r.captures_len() > 1 => 1,
        _ => 0,
    };
    if let Some(r) = &compiled {
        if group >= r.captures_len() {
            return Err(CoreError::config(format!(
                "regex '{}' has no capture group {group}",
                r.as_str()
            )));
        }
    }
    Ok(Reader::HttpBody {
        path: def.path.clone(),
        regex: compiled,
        group,
        decode: def.decode,
    })
}

pub fn transforms(defs: &[TransformDef]) -> Result<Vec<TransformOp>, CoreError> {
    defs.iter().map(transform).collect()
}

fn transform(def: &TransformDef) -> Result<TransformOp, CoreError> {
    Ok(match def {
        TransformDef::RegexReplace {
            regex: pattern,
            replace,
            must_match,
        } => TransformOp::RegexReplace {
            regex: regex(pattern)?,
            replacement: replace.clone(),
            must_match: *must_match,
        },
        TransformDef::RegexExtract {
            regex: pattern,
            group,
        } => {
            let regex = regex(pattern)?;
            if *group >= regex.captures_len() {
                return Err(CoreError::config(format!(
                    "regex '{pattern}' has no capture group {group}"
                )));
            }
            TransformOp::RegexExtract {
                regex,
                group: *group,
            }
        }
        TransformDef::ToLower => TransformOp::ToLower,
        TransformDef::ToUpper => TransformOp::ToUpper,
        TransformDef::Trim => TransformOp::Trim,
        TransformDef::Substring { start, end } => {
            if end.is_some_and(|e| e < *start) {
                return Err(CoreError::config("substring end is before its start"));
            }
            TransformOp::Substring {
                start: *start,
                end: *end,
            }
        }
        TransformDef::ParseInt => TransformOp::ParseInt,
        TransformDef::ParseFloat => TransformOp::ParseFloat,
        TransformDef::Multiply(factor) => TransformOp::Multiply(*factor),
        TransformDef::Divide(divisor) => {
            if *divisor == 0.0 {
                return Err(CoreError::config("divide by zero"));
            }
            TransformOp::Divide(*divisor)
        }
        TransformDef::AddPrefix(s) => TransformOp::AddPrefix(s.clone()),
        TransformDef::AddSuffix(s) => TransformOp::AddSuffix(s.clone()),
        TransformDef::Overwrite(raw) => TransformOp::Overwrite(Value::from_yaml(raw)?),
        TransformDef::Map {
            values,
            passthrough,
        } => {
            let mut table = IndexMap::with_capacity(values.len());
            for (key, value) in values {
                table.insert(Value::from_yaml(key)?.to_text(), Value::from_yaml(value)?);
            }
            TransformOp::Map {
                values: table,
                passthrough: *passthrough,
            }
        }
        TransformDef::Filter(def) => TransformOp::Filter(matcher(def)?),
    })
}

// ── Tables ──────────────────────────────────────────────────────────

pub fn group_reader(def: &GroupReaderDef) -> Result<GroupReader, CoreError> {
    if def.values.is_empty() {
        return Err(CoreError::config("a table needs at least one column"));
    }
    if let Some(source) = &def.index_source {
        if !def.values.contains_key(source) {
            return Err(CoreError::config(format!(
                "index_source '{source}' is not one of the table's columns"
            )));
        }
    }
    let columns = def
        .values
        .iter()
        .map(|(name, col)| Ok((name.clone(), column(col)?)))
        .collect::<Result<IndexMap<_, _>, CoreError>>()?;
    Ok(GroupReader::new(columns, def.index_source.clone()))
}

fn column(def: &ColumnDef) -> Result<Column, CoreError> {
    Ok(Column {
        oid: oid(&def.oid)?,
        decode: def.decode,
        ops: transforms(&def.transform)?,
    })
}
