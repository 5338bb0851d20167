// ── Class file schema ──
//
// Serde shapes of a device-class YAML file after inheritance has been
// applied. Unknown keys are rejected so typos in class files fail at
// load time.

use indexmap::IndexMap;
use serde::Deserialize;

use crate::model::{Component, IdentifyProperty};
use crate::reader::Decode;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassDef {
    pub name: String,
    #[serde(rename = "match", default)]
    pub matcher: Option<ConditionDef>,
    #[serde(default)]
    pub try_to_match_last: Option<bool>,
    #[serde(default)]
    pub config: ConfigDef,
    #[serde(default)]
    pub identify: IdentifyDef,
    /// Per component, metric or table name to its raw definition; the
    /// component's layout decides how each entry is parsed.
    #[serde(default)]
    pub components: IndexMap<Component, IndexMap<String, serde_yaml::Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigDef {
    #[serde(default)]
    pub snmp: SnmpConfigDef,
    /// `true` enables a component, `false` disables an inherited one.
    #[serde(default)]
    pub components: IndexMap<Component, bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnmpConfigDef {
    pub max_repetitions: Option<u32>,
    pub max_oids: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentifyDef {
    #[serde(default)]
    pub properties: IndexMap<IdentifyProperty, OneOrMany<ReaderDef>>,
}

/// A single definition, or a list tried in order.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(one) => vec![one],
            Self::Many(many) => many,
        }
    }
}

// ── Conditions ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum ConditionDef {
    Always,
    And(Vec<ConditionDef>),
    Or(Vec<ConditionDef>),
    Not(Box<ConditionDef>),
    Property {
        property: IdentifyProperty,
        matches: MatcherDef,
    },
    SnmpGet {
        oid: String,
        matches: MatcherDef,
    },
    HttpGet {
        path: String,
        matches: MatcherDef,
    },
}

/// Exactly one of the match kinds must be set (`min`/`max` together form one).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatcherDef {
    pub equals: Option<String>,
    pub contains: Option<String>,
    pub starts_with: Option<String>,
    pub regex: Option<String>,
    pub one_of: Option<Vec<String>>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default = "default_true")]
    pub anchored: bool,
}

fn default_true() -> bool {
    true
}

// ── Readers ─────────────────────────────────────────────────────────

/// One reader. Exactly one source (`constant`, `snmp_get`, `http_body`,
/// `first_non_empty`) must be given.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReaderDef {
    pub constant: Option<serde_yaml::Value>,
    pub snmp_get: Option<SnmpGetDef>,
    pub http_body: Option<HttpBodyDef>,
    pub first_non_empty: Option<Vec<ReaderDef>>,
    #[serde(default)]
    pub transform: Vec<TransformDef>,
    pub gate: Option<ConditionDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnmpGetDef {
    pub oid: String,
    #[serde(default)]
    pub decode: Decode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpBodyDef {
    pub path: String,
    pub regex: Option<String>,
    /// Capture group; defaults to 1 when the regex has one, else 0.
    pub group: Option<usize>,
    #[serde(default)]
    pub decode: Decode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum TransformDef {
    RegexReplace {
        regex: String,
        replace: String,
        #[serde(default)]
        must_match: bool,
    },
    RegexExtract {
        regex: String,
        #[serde(default = "default_group")]
        group: usize,
    },
    ToLower,
    ToUpper,
    Trim,
    Substring {
        #[serde(default)]
        start: usize,
        end: Option<usize>,
    },
    ParseInt,
    ParseFloat,
    Multiply(f64),
    Divide(f64),
    AddPrefix(String),
    AddSuffix(String),
    Overwrite(serde_yaml::Value),
    Map {
        values: IndexMap<serde_yaml::Value, serde_yaml::Value>,
        #[serde(default)]
        passthrough: bool,
    },
    Filter(MatcherDef),
}

fn default_group() -> usize {
    1
}

// ── Tables ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupReaderDef {
    pub values: IndexMap<String, ColumnDef>,
    pub index_source: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnDef {
    pub oid: String,
    #[serde(default)]
    pub decode: Decode,
    #[serde(default)]
    pub transform: Vec<TransformDef>,
}
