// ── Object identifiers ──
//
// Dotted numeric OIDs with SNMP lexicographic ordering. Parsing accepts
// an optional leading dot, display never emits one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// A numeric SNMP object identifier.
///
/// `Ord` compares arc by arc, which is the order agents return table
/// rows in (`1.3.6.1.2` < `1.3.6.1.10`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn new(arcs: Vec<u32>) -> Self {
        Self(arcs)
    }

    pub fn arcs(&self) -> &[u32] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `true` if `self` lies strictly below `root` in the tree.
    pub fn is_under(&self, root: &Oid) -> bool {
        self.0.len() > root.0.len() && self.0.starts_with(&root.0)
    }

    /// The arcs after `root`, e.g. the row index of a table column cell.
    pub fn suffix_after(&self, root: &Oid) -> Option<&[u32]> {
        if self.is_under(root) {
            self.0.get(root.0.len()..)
        } else {
            None
        }
    }

    /// Append arcs, producing a child OID.
    pub fn join(&self, suffix: &[u32]) -> Oid {
        let mut arcs = self.0.clone();
        arcs.extend_from_slice(suffix);
        Oid(arcs)
    }
}

impl FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('.');
        if trimmed.is_empty() {
            return Err(Error::InvalidOid(s.to_owned()));
        }
        trimmed
            .split('.')
            .map(|arc| arc.parse::<u32>().map_err(|_| Error::InvalidOid(s.to_owned())))
            .collect::<Result<Vec<_>, _>>()
            .map(Oid)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{arc}")?;
            first = false;
        }
        Ok(())
    }
}

impl Serialize for Oid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Oid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Index suffix rendered the way table rows are keyed (`"3"`, `"1.4"`).
pub fn index_string(arcs: &[u32]) -> String {
    arcs.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

// ── Well-known OIDs ─────────────────────────────────────────────────

/// SNMPv2-MIB::sysDescr.0
pub const SYS_DESCR: &str = "1.3.6.1.2.1.1.1.0";
/// SNMPv2-MIB::sysObjectID.0, the default probe OID.
pub const SYS_OBJECT_ID: &str = "1.3.6.1.2.1.1.2.0";

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_and_without_leading_dot() {
        let a: Oid = ".1.3.6.1.2.1.1.2.0".parse().unwrap();
        let b: Oid = "1.3.6.1.2.1.1.2.0".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "1.3.6.1.2.1.1.2.0");
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<Oid>().is_err());
        assert!("1.3.x.1".parse::<Oid>().is_err());
        assert!("1..3".parse::<Oid>().is_err());
    }

    #[test]
    fn orders_numerically_per_arc() {
        let small: Oid = "1.3.6.1.2".parse().unwrap();
        let large: Oid = "1.3.6.1.10".parse().unwrap();
        assert!(small < large);
        let parent: Oid = "1.3.6.1".parse().unwrap();
        assert!(parent < small);
    }

    #[test]
    fn suffix_after_root() {
        let column: Oid = "1.3.6.1.2.1.2.2.1.2".parse().unwrap();
        let cell: Oid = "1.3.6.1.2.1.2.2.1.2.14".parse().unwrap();
        assert_eq!(cell.suffix_after(&column), Some(&[14][..]));
        assert_eq!(column.suffix_after(&column), None);
        assert_eq!(index_string(&[1, 4]), "1.4");
    }
}
