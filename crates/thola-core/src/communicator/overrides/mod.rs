// Code overrides for metrics a class file cannot express declaratively.
//
// Registered per class name at compile time. Lookup walks the class
// ancestry, so `cisco/ios` picks up the `cisco` set. A method returning
// `None` means "not overridden here".

mod cisco;
mod net_snmp;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use thola_transport::Oid;

use crate::class::ClassTree;
use crate::device::DeviceContext;
use crate::error::CoreError;
use crate::model::DiskStorage;
use crate::reader::{Column, Decode, GroupReader, Row, Scope};

#[async_trait]
pub trait ClassOverrides: Send + Sync {
    /// Memory usage in percent.
    async fn memory_usage(&self, _scope: Scope<'_>) -> Option<Result<f64, CoreError>> {
        None
    }

    async fn disk_storages(&self, _scope: Scope<'_>) -> Option<Result<Vec<DiskStorage>, CoreError>> {
        None
    }
}

#[derive(Default)]
pub struct OverrideRegistry {
    sets: HashMap<&'static str, Arc<dyn ClassOverrides>>,
}

impl std::fmt::Debug for OverrideRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.sets.keys().collect();
        names.sort();
        f.debug_struct("OverrideRegistry")
            .field("classes", &names)
            .finish()
    }
}

impl OverrideRegistry {
    /// The override sets compiled into the engine.
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        registry.register("cisco", Arc::new(cisco::CiscoOverrides));
        registry.register("net-snmp", Arc::new(net_snmp::NetSnmpOverrides));
        registry
    }

    pub fn register(&mut self, class: &'static str, set: Arc<dyn ClassOverrides>) {
        self.sets.insert(class, set);
    }

    /// Override sets applying to `class`, nearest class first.
    pub fn resolve(&self, tree: &ClassTree, class: &str) -> Vec<Arc<dyn ClassOverrides>> {
        tree.ancestry(class)
            .into_iter()
            .filter_map(|c| self.sets.get(c.name()).map(Arc::clone))
            .collect()
    }
}

// ── Helpers shared by the override sets ─────────────────────────────

fn oid(arcs: &[u32]) -> Oid {
    Oid::new(arcs.to_vec())
}

/// Walk a handful of columns with the table machinery, raw-decoded.
async fn walk_columns(
    device: &DeviceContext,
    columns: &[(&str, &[u32])],
) -> Result<Vec<Row>, CoreError> {
    let columns: IndexMap<String, Column> = columns
        .iter()
        .map(|(name, arcs)| {
            (
                (*name).to_owned(),
                Column {
                    oid: oid(arcs),
                    decode: Decode::Auto,
                    ops: Vec::new(),
                },
            )
        })
        .collect();
    GroupReader::new(columns, None).read(device, &[]).await
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn percent(part: u64, whole: u64) -> Result<f64, CoreError> {
    if whole == 0 {
        return Err(CoreError::not_found("total size is zero"));
    }
    Ok(part as f64 / whole as f64 * 100.0)
}
