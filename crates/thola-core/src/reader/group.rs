// Table readers
//
// Read a set of SNMP columns into rows keyed by index. Rows are the union
// of the indices seen across columns; a missing cell is absent, not zero.
// Filters run in a fixed order: index filters, the include-only
// projection, then value filters.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value as Json};
use thola_transport::Oid;
use tracing::debug;

use super::decode::Decode;
use super::transform::{TransformOp, apply_all};
use crate::condition::Matcher;
use crate::device::DeviceContext;
use crate::error::CoreError;
use crate::model::camel_case;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct Column {
    pub oid: Oid,
    pub decode: Decode,
    pub ops: Vec<TransformOp>,
}

#[derive(Debug, Clone)]
pub enum RowFilter {
    IndexInclude(Vec<Vec<u32>>),
    IndexExclude(Vec<Vec<u32>>),
    /// Keep only these attributes; the others are not fetched at all.
    IncludeOnly(Vec<String>),
    /// Drop the row when the attribute is present and matches.
    ValueDrop { attribute: String, matcher: Matcher },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub index: Vec<u32>,
    pub values: IndexMap<String, Value>,
}

impl Row {
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.values.get(attribute)
    }

    /// Render as a JSON object. Dotted attribute names nest, and each
    /// segment is converted to camelCase (`ethernet_like.dot3_stats_fcs_errors`
    /// becomes `{"ethernetLike": {"dot3StatsFcsErrors": …}}`).
    pub fn to_json_object(&self) -> JsonMap<String, Json> {
        let mut root = JsonMap::new();
        for (key, value) in &self.values {
            let mut segments: Vec<String> = key.split('.').map(camel_case).collect();
            let Some(leaf) = segments.pop() else {
                continue;
            };
            let mut node = &mut root;
            for segment in segments {
                let entry = node
                    .entry(segment)
                    .or_insert_with(|| Json::Object(JsonMap::new()));
                if !entry.is_object() {
                    *entry = Json::Object(JsonMap::new());
                }
                let Json::Object(next) = entry else {
                    unreachable!("entry was just coerced to an object");
                };
                node = next;
            }
            node.insert(leaf, value.to_json());
        }
        root
    }
}

#[derive(Debug, Clone, Default)]
pub struct GroupReader {
    columns: IndexMap<String, Column>,
    /// Column whose walk yields the row indices when gets replace walks.
    index_source: Option<String>,
}

impl GroupReader {
    pub fn new(columns: IndexMap<String, Column>, index_source: Option<String>) -> Self {
        Self {
            columns,
            index_source,
        }
    }

    pub fn columns(&self) -> &IndexMap<String, Column> {
        &self.columns
    }

    /// Read all rows. A table without any rows is `NotFound`.
    pub async fn read(
        &self,
        device: &DeviceContext,
        filters: &[RowFilter],
    ) -> Result<Vec<Row>, CoreError> {
        let projection: Option<BTreeSet<&str>> = filters
            .iter()
            .filter_map(|f| match f {
                RowFilter::IncludeOnly(keep) => Some(keep.iter().map(String::as_str).collect()),
                _ => None,
            })
            .reduce(|a: BTreeSet<&str>, b| a.intersection(&b).copied().collect());
        let wanted: Vec<(&String, &Column)> = self
            .columns
            .iter()
            .filter(|(name, _)| projection.as_ref().is_none_or(|p| p.contains(name.as_str())))
            .collect();

        let mut rows: BTreeMap<Vec<u32>, IndexMap<String, Value>> = BTreeMap::new();
        let by_gets = device.gets_instead_of_walk()
            && self
                .index_source
                .as_ref()
                .is_some_and(|s| self.columns.contains_key(s));

        if by_gets {
            let source = self
                .index_source
                .as_ref()
                .and_then(|s| self.columns.get_key_value(s))
                .ok_or_else(|| CoreError::Internal("index source vanished".into()))?;
            let source_cells = device.snmp_walk(&source.1.oid).await?;
            let indices: Vec<Vec<u32>> = source_cells
                .iter()
                .filter_map(|vb| vb.oid.suffix_after(&source.1.oid).map(<[u32]>::to_vec))
                .collect();
            debug!(rows = indices.len(), "table read with gets");
            for (name, column) in &wanted {
                let cells = if name.as_str() == source.0.as_str() {
                    source_cells.as_ref().clone()
                } else {
                    device.snmp_get_column(&column.oid, &indices).await?
                };
                insert_cells(&mut rows, name, column, &cells)?;
            }
            for index in indices {
                rows.entry(index).or_default();
            }
        } else {
            for (name, column) in &wanted {
                let cells = match device.snmp_walk(&column.oid).await {
                    Ok(cells) => cells,
                    Err(e) if e.is_absent() => continue,
                    Err(e) => return Err(e),
                };
                insert_cells(&mut rows, name, column, &cells)?;
            }
        }

        let mut out: Vec<Row> = rows
            .into_iter()
            .map(|(index, values)| Row { index, values })
            .collect();

        for filter in filters {
            match filter {
                RowFilter::IndexInclude(keep) => out.retain(|r| keep.contains(&r.index)),
                RowFilter::IndexExclude(drop) => out.retain(|r| !drop.contains(&r.index)),
                RowFilter::IncludeOnly(_) | RowFilter::ValueDrop { .. } => {}
            }
        }
        if let Some(keep) = &projection {
            for row in &mut out {
                row.values.retain(|k, _| keep.contains(k.as_str()));
            }
        }
        for filter in filters {
            if let RowFilter::ValueDrop { attribute, matcher } = filter {
                out.retain(|row| !row.get(attribute).is_some_and(|v| matcher.matches(v)));
            }
        }

        if out.is_empty() {
            return Err(CoreError::not_found("table has no rows"));
        }
        Ok(out)
    }
}

fn insert_cells(
    rows: &mut BTreeMap<Vec<u32>, IndexMap<String, Value>>,
    name: &str,
    column: &Column,
    cells: &[thola_transport::snmp::VarBind],
) -> Result<(), CoreError> {
    for vb in cells {
        let Some(index) = vb.oid.suffix_after(&column.oid) else {
            continue;
        };
        let value = column
            .decode
            .snmp(&vb.value)
            .and_then(|v| apply_all(&column.ops, v));
        match value {
            Ok(value) => {
                rows.entry(index.to_vec())
                    .or_default()
                    .insert(name.to_owned(), value);
            }
            // the row still exists, the cell is just absent
            Err(e) if e.is_absent() => {
                rows.entry(index.to_vec()).or_default();
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
