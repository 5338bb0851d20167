// ── Condition engine ──
//
// Boolean predicates over device observations, used as class match
// conditions and reader gates. Evaluation short-circuits; data the device
// does not have evaluates to `false`. Transport failures and
// cancellation propagate.

use futures::future::{BoxFuture, FutureExt};
use regex::{Regex, RegexBuilder};
use thola_transport::Oid;
use thola_transport::oid::{SYS_DESCR, SYS_OBJECT_ID};
use tracing::debug;

use crate::error::CoreError;
use crate::model::IdentifyProperty;
use crate::reader::{Decode, Scope};
use crate::value::Value;

// ── Matchers ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum MatchKind {
    Equals(String),
    Contains(String),
    StartsWith(String),
    Regex(Regex),
    /// Inclusive numeric range; a missing bound is open.
    Range { min: Option<f64>, max: Option<f64> },
    OneOf(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct Matcher {
    kind: MatchKind,
    case_sensitive: bool,
}

impl Matcher {
    pub fn new(kind: MatchKind, case_sensitive: bool) -> Self {
        Self {
            kind,
            case_sensitive,
        }
    }

    pub fn equals(text: impl Into<String>) -> Self {
        Self::new(MatchKind::Equals(text.into()), false)
    }

    pub fn one_of(values: Vec<String>) -> Self {
        Self::new(MatchKind::OneOf(values), false)
    }

    /// Compile a regex matcher. Anchored patterns must match the whole value.
    pub fn regex(pattern: &str, anchored: bool, case_sensitive: bool) -> Result<Self, CoreError> {
        let source = if anchored {
            format!("^(?:{pattern})$")
        } else {
            pattern.to_owned()
        };
        let regex = RegexBuilder::new(&source)
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|e| CoreError::config(format!("invalid regex '{pattern}': {e}")))?;
        Ok(Self::new(MatchKind::Regex(regex), case_sensitive))
    }

    pub fn range(min: Option<f64>, max: Option<f64>) -> Result<Self, CoreError> {
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(CoreError::config(format!(
                    "range minimum {lo} is above maximum {hi}"
                )));
            }
        }
        Ok(Self::new(MatchKind::Range { min, max }, false))
    }

    pub fn kind(&self) -> &MatchKind {
        &self.kind
    }

    pub fn matches(&self, value: &Value) -> bool {
        match &self.kind {
            MatchKind::Regex(regex) => regex.is_match(&value.to_text()),
            MatchKind::Range { min, max } => value.as_f64().is_ok_and(|x| {
                min.is_none_or(|lo| x >= lo) && max.is_none_or(|hi| x <= hi)
            }),
            MatchKind::Equals(expected) => self.fold(&value.to_text()) == self.fold(expected),
            MatchKind::Contains(needle) => {
                self.fold(&value.to_text()).contains(&self.fold(needle))
            }
            MatchKind::StartsWith(prefix) => {
                self.fold(&value.to_text()).starts_with(&self.fold(prefix))
            }
            MatchKind::OneOf(options) => {
                let text = self.fold(&value.to_text());
                options.iter().any(|o| self.fold(o) == text)
            }
        }
    }

    fn fold(&self, s: &str) -> String {
        if self.case_sensitive {
            s.to_owned()
        } else {
            s.to_lowercase()
        }
    }
}

// ── Conditions ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Condition {
    Always,
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    /// Read an identify property through the class in scope.
    Property {
        property: IdentifyProperty,
        matcher: Matcher,
    },
    SnmpGet { oid: Oid, matcher: Matcher },
    HttpGet { path: String, matcher: Matcher },
}

impl Condition {
    pub fn evaluate<'a>(&'a self, scope: Scope<'a>) -> BoxFuture<'a, Result<bool, CoreError>> {
        async move {
            match self {
                Self::Always => Ok(true),
                Self::And(all) => {
                    for condition in all {
                        if !condition.evaluate(scope).await? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                Self::Or(any) => {
                    for condition in any {
                        if condition.evaluate(scope).await? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                Self::Not(inner) => Ok(!inner.evaluate(scope).await?),
                Self::Property { property, matcher } => {
                    let Some(reader) = scope.class.identify_reader(*property) else {
                        return Ok(false);
                    };
                    absent_is_false(reader.get(scope).await.map(|v| matcher.matches(&v)))
                }
                Self::SnmpGet { oid, matcher } => {
                    let value = match scope.device.snmp_get(oid).await {
                        Ok(raw) => Decode::Auto.snmp(&raw),
                        Err(e) => Err(e),
                    };
                    absent_is_false(value.map(|v| matcher.matches(&v)))
                }
                Self::HttpGet { path, matcher } => match scope.device.http_get(path).await {
                    Ok(body) => Ok(matcher.matches(&Value::String(body.as_str().to_owned()))),
                    Err(CoreError::Cancelled) => Err(CoreError::Cancelled),
                    Err(e) => {
                        debug!(%path, error = %e, "http condition failed");
                        Ok(false)
                    }
                },
            }
        }
        .boxed()
    }

    /// OIDs this condition fetches directly, for batching.
    pub fn snmp_oids(&self) -> Vec<Oid> {
        let mut out = Vec::new();
        self.collect_oids(&mut out);
        out
    }

    fn collect_oids(&self, out: &mut Vec<Oid>) {
        match self {
            Self::And(list) | Self::Or(list) => list.iter().for_each(|c| c.collect_oids(out)),
            Self::Not(inner) => inner.collect_oids(out),
            Self::SnmpGet { oid, .. } => out.push(oid.clone()),
            Self::Always | Self::Property { .. } | Self::HttpGet { .. } => {}
        }
    }

    /// `true` if evaluating this condition fetches data beyond the
    /// system identity objects every device answers during probing.
    pub fn is_unique(&self) -> bool {
        match self {
            Self::And(list) | Self::Or(list) => list.iter().any(Self::is_unique),
            Self::Not(inner) => inner.is_unique(),
            Self::SnmpGet { oid, .. } => {
                let oid = oid.to_string();
                oid != SYS_OBJECT_ID && oid != SYS_DESCR
            }
            Self::HttpGet { .. } => true,
            Self::Always | Self::Property { .. } => false,
        }
    }
}

fn absent_is_false(result: Result<bool, CoreError>) -> Result<bool, CoreError> {
    match result {
        Err(e) if e.is_absent() => Ok(false),
        Err(CoreError::Decode(reason)) => {
            debug!(%reason, "condition value could not be decoded");
            Ok(false)
        }
        other => other,
    }
}
