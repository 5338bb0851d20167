// ── Device-class hierarchy ──
//
// Built once from class sources: parents are resolved before children,
// each child's definition is its parent's effective definition with the
// child's file merged on top. Stored as an arena, children ordered by
// name with `try_to_match_last` classes moved behind their siblings.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use super::compile;
use super::definition::{ClassDef, GroupReaderDef, OneOrMany, ReaderDef};
use super::loader::ClassSource;
use super::merge::{inheritable, merge_into};
use crate::condition::Condition;
use crate::device::DeviceContext;
use crate::error::CoreError;
use crate::model::{Component, IdentifyProperty};
use crate::reader::{GroupReader, Reader, Scope};

pub const ROOT_CLASS: &str = "generic";

/// Declarative readers of one component.
#[derive(Debug, Clone, Default)]
pub struct ComponentReaders {
    pub metrics: IndexMap<String, Reader>,
    pub tables: IndexMap<String, GroupReader>,
}

/// A resolved device class with inheritance applied.
#[derive(Debug)]
pub struct DeviceClass {
    name: String,
    matcher: Condition,
    try_to_match_last: bool,
    identify: IndexMap<IdentifyProperty, Reader>,
    components: IndexMap<Component, ComponentReaders>,
    enabled: BTreeSet<Component>,
    max_repetitions: Option<u32>,
    max_oids: Option<usize>,
    definition: serde_yaml::Value,
}

impl DeviceClass {
    fn compile(name: &str, effective: serde_yaml::Value) -> Result<Self, CoreError> {
        let context = |e: CoreError| match e {
            CoreError::Config { message } => {
                CoreError::config(format!("class '{name}': {message}"))
            }
            other => other,
        };
        let def: ClassDef = serde_yaml::from_value(effective.clone())
            .map_err(|e| CoreError::config(format!("class '{name}': {e}")))?;
        if def.name != name {
            return Err(CoreError::config(format!(
                "class file for '{name}' declares name '{}'",
                def.name
            )));
        }

        let matcher = match (&def.matcher, name == ROOT_CLASS) {
            (_, true) => Condition::Always,
            (Some(m), false) => compile::condition(m).map_err(context)?,
            (None, false) => {
                return Err(CoreError::config(format!(
                    "class '{name}' has no match condition"
                )));
            }
        };
        let try_to_match_last = def.try_to_match_last.unwrap_or_else(|| matcher.is_unique());

        let identify = def
            .identify
            .properties
            .into_iter()
            .map(|(property, readers)| Ok((property, compile::readers(readers)?)))
            .collect::<Result<IndexMap<_, _>, CoreError>>()
            .map_err(context)?;

        let mut components = IndexMap::new();
        for (component, entries) in def.components {
            let readers = component_readers(component, entries).map_err(context)?;
            components.insert(component, readers);
        }

        let enabled = def
            .config
            .components
            .iter()
            .filter(|(_, on)| **on)
            .map(|(component, _)| *component)
            .collect();

        Ok(Self {
            name: name.to_owned(),
            matcher,
            try_to_match_last,
            identify,
            components,
            enabled,
            max_repetitions: def.config.snmp.max_repetitions,
            max_oids: def.config.snmp.max_oids,
            definition: effective,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matcher(&self) -> &Condition {
        &self.matcher
    }

    pub fn try_to_match_last(&self) -> bool {
        self.try_to_match_last
    }

    pub fn identify_reader(&self, property: IdentifyProperty) -> Option<&Reader> {
        self.identify.get(&property)
    }

    pub fn components(&self, component: Component) -> Option<&ComponentReaders> {
        self.components.get(&component)
    }

    pub fn is_enabled(&self, component: Component) -> bool {
        self.enabled.contains(&component)
    }

    pub fn enabled_components(&self) -> impl Iterator<Item = Component> + '_ {
        self.enabled.iter().copied()
    }

    pub fn snmp_limits(&self) -> (Option<u32>, Option<usize>) {
        (self.max_repetitions, self.max_oids)
    }

    /// The effective YAML definition after inheritance.
    pub fn definition(&self) -> &serde_yaml::Value {
        &self.definition
    }
}

fn component_readers(
    component: Component,
    entries: IndexMap<String, serde_yaml::Value>,
) -> Result<ComponentReaders, CoreError> {
    let layout = component.layout();
    let mut readers = ComponentReaders::default();
    for (key, raw) in entries {
        let invalid = |e: serde_yaml::Error| CoreError::config(format!("{component}.{key}: {e}"));
        if layout.metrics.contains(&key.as_str()) {
            let def: OneOrMany<ReaderDef> = serde_yaml::from_value(raw).map_err(invalid)?;
            readers.metrics.insert(key, compile::readers(def)?);
        } else if layout.tables.contains(&key.as_str()) {
            let def: GroupReaderDef = serde_yaml::from_value(raw).map_err(invalid)?;
            readers.tables.insert(key, compile::group_reader(&def)?);
        } else {
            return Err(CoreError::config(format!(
                "'{key}' is not a metric or table of component {component}"
            )));
        }
    }
    Ok(readers)
}

// ── Tree ────────────────────────────────────────────────────────────

struct Node {
    class: Arc<DeviceClass>,
    parent: Option<usize>,
    children: Vec<usize>,
}

pub struct ClassTree {
    nodes: Vec<Node>,
    by_name: HashMap<String, usize>,
}

impl std::fmt::Debug for ClassTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassTree")
            .field("classes", &self.nodes.len())
            .finish()
    }
}

impl ClassTree {
    pub fn build(sources: &[ClassSource]) -> Result<Self, CoreError> {
        let mut raw: Vec<(String, serde_yaml::Value)> = Vec::new();
        for source in sources {
            let Some(name) = source.class_name() else {
                debug!(path = %source.path, "skipping non-class file");
                continue;
            };
            let value: serde_yaml::Value = serde_yaml::from_str(&source.contents)
                .map_err(|e| CoreError::config(format!("{}: {e}", source.path)))?;
            if raw.iter().any(|(n, _)| *n == name) {
                return Err(CoreError::config(format!("class '{name}' is defined twice")));
            }
            raw.push((name, value));
        }
        if !raw.iter().any(|(n, _)| n == ROOT_CLASS) {
            return Err(CoreError::config("the root class 'generic' is missing"));
        }

        // Parents first: generic, then by depth, then by name.
        raw.sort_by(|(a, _), (b, _)| {
            let depth = |n: &str| if n == ROOT_CLASS { 0 } else { n.matches('/').count() + 1 };
            depth(a).cmp(&depth(b)).then_with(|| a.cmp(b))
        });

        let mut tree = Self {
            nodes: Vec::with_capacity(raw.len()),
            by_name: HashMap::new(),
        };
        for (name, file) in raw {
            let (parent, effective) = if name == ROOT_CLASS {
                (None, file)
            } else {
                let parent_name = name.rsplit_once('/').map_or(ROOT_CLASS, |(p, _)| p);
                let parent = *tree.by_name.get(parent_name).ok_or_else(|| {
                    CoreError::config(format!(
                        "parent class '{parent_name}' of '{name}' is not defined"
                    ))
                })?;
                let mut effective = inheritable(tree.nodes[parent].class.definition());
                merge_into(&mut effective, file);
                (Some(parent), effective)
            };
            let class = Arc::new(DeviceClass::compile(&name, effective)?);
            let index = tree.nodes.len();
            tree.nodes.push(Node {
                class,
                parent,
                children: Vec::new(),
            });
            tree.by_name.insert(name, index);
            if let Some(parent) = parent {
                tree.nodes[parent].children.push(index);
            }
        }

        // Names arrive sorted; only the match-last partition remains.
        for i in 0..tree.nodes.len() {
            let mut children = std::mem::take(&mut tree.nodes[i].children);
            children.sort_by_key(|c| tree.nodes[*c].class.try_to_match_last());
            tree.nodes[i].children = children;
        }
        debug!(classes = tree.nodes.len(), "device classes loaded");
        Ok(tree)
    }

    pub fn builtin() -> Result<Self, CoreError> {
        Self::build(&super::loader::builtin())
    }

    pub fn root(&self) -> &Arc<DeviceClass> {
        // index 0 is the root, guaranteed by `build`
        &self.nodes[0].class
    }

    pub fn get(&self, name: &str) -> Option<&Arc<DeviceClass>> {
        self.by_name.get(name).map(|i| &self.nodes[*i].class)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.class.name())
    }

    pub fn parent_of(&self, name: &str) -> Option<&Arc<DeviceClass>> {
        let index = *self.by_name.get(name)?;
        self.nodes[index].parent.map(|p| &self.nodes[p].class)
    }

    /// The class and its ancestors, nearest first.
    pub fn ancestry(&self, name: &str) -> Vec<&Arc<DeviceClass>> {
        let mut out = Vec::new();
        let mut cursor = self.by_name.get(name).copied();
        while let Some(index) = cursor {
            out.push(&self.nodes[index].class);
            cursor = self.nodes[index].parent;
        }
        out
    }

    /// Children of `name` in evaluation order.
    pub fn children(&self, name: &str) -> Vec<&Arc<DeviceClass>> {
        self.by_name
            .get(name)
            .map(|i| {
                self.nodes[*i]
                    .children
                    .iter()
                    .map(|c| &self.nodes[*c].class)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Descend from the root to the most specific matching class.
    ///
    /// Each level batches the OIDs of its cheap child conditions into one
    /// round of gets; child conditions are evaluated in the scope of the
    /// parent class.
    pub async fn identify(&self, device: &DeviceContext) -> Result<Arc<DeviceClass>, CoreError> {
        let mut current = 0;
        loop {
            let node = &self.nodes[current];
            let cheap: Vec<_> = node
                .children
                .iter()
                .map(|c| &self.nodes[*c].class)
                .filter(|c| !c.try_to_match_last())
                .flat_map(|c| c.matcher().snmp_oids())
                .collect();
            device.prefetch(&cheap).await?;

            let scope = Scope::new(device, &node.class);
            let mut next = None;
            for child in &node.children {
                let class = &self.nodes[*child].class;
                let matched = class.matcher().evaluate(scope).await?;
                trace!(class = %class.name(), matched, "class match");
                if matched {
                    next = Some(*child);
                    break;
                }
            }
            match next {
                Some(child) => current = child,
                None => {
                    debug!(class = %node.class.name(), "identified");
                    return Ok(Arc::clone(&node.class));
                }
            }
        }
    }

    /// Re-check a cached class: `Some` if it still matches the device.
    pub async fn verify(
        &self,
        name: &str,
        device: &DeviceContext,
    ) -> Result<Option<Arc<DeviceClass>>, CoreError> {
        let Some(index) = self.by_name.get(name).copied() else {
            return Ok(None);
        };
        let node = &self.nodes[index];
        let Some(parent) = node.parent else {
            return Ok(Some(Arc::clone(&node.class)));
        };
        let scope = Scope::new(device, &self.nodes[parent].class);
        if node.class.matcher().evaluate(scope).await? {
            Ok(Some(Arc::clone(&node.class)))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sources(files: &[(&str, &str)]) -> Vec<ClassSource> {
        files.iter().map(|(p, c)| ClassSource::new(*p, *c)).collect()
    }

    const GENERIC: &str = "name: generic\nconfig:\n  components:\n    interfaces: true\n    cpu: true\n";

    #[test]
    fn builtin_classes_load() {
        let tree = ClassTree::builtin().unwrap();
        for name in ["generic", "cisco", "cisco/ios", "juniper", "net-snmp", "apc", "acme-packet"] {
            assert!(tree.get(name).is_some(), "missing class {name}");
        }
        assert_eq!(tree.parent_of("cisco/ios").unwrap().name(), "cisco");
        let ancestry: Vec<&str> = tree.ancestry("cisco/ios").iter().map(|c| c.name()).collect();
        assert_eq!(ancestry, ["cisco/ios", "cisco", "generic"]);
    }

    #[test]
    fn missing_parent_is_an_error() {
        let err = ClassTree::build(&sources(&[
            ("generic.yaml", GENERIC),
            ("generic/cisco/ios.yaml", "name: cisco/ios\nmatch: always\n"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("parent class 'cisco'"));
    }

    #[test]
    fn name_must_match_path() {
        let err = ClassTree::build(&sources(&[
            ("generic.yaml", GENERIC),
            ("generic/cisco.yaml", "name: juniper\nmatch: always\n"),
        ]))
        .unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[test]
    fn components_inherit_and_can_be_disabled() {
        let tree = ClassTree::build(&sources(&[
            ("generic.yaml", GENERIC),
            (
                "generic/ups.yaml",
                "name: ups\nmatch: always\nconfig:\n  components:\n    cpu: false\n    ups: true\n",
            ),
        ]))
        .unwrap();
        let ups = tree.get("ups").unwrap();
        let enabled: Vec<Component> = ups.enabled_components().collect();
        assert_eq!(enabled, [Component::Interfaces, Component::Ups]);
    }

    #[test]
    fn unique_classes_are_matched_last() {
        let tree = ClassTree::build(&sources(&[
            ("generic.yaml", GENERIC),
            (
                "generic/aaa.yaml",
                "name: aaa\nmatch:\n  snmp_get:\n    oid: 1.3.6.1.4.1.99.1.0\n    matches: { equals: x }\n",
            ),
            (
                "generic/bbb.yaml",
                "name: bbb\nmatch:\n  snmp_get:\n    oid: 1.3.6.1.2.1.1.2.0\n    matches: { starts_with: '1.3.6.1.4.1.5.' }\n",
            ),
        ]))
        .unwrap();
        let order: Vec<&str> = tree.children("generic").iter().map(|c| c.name()).collect();
        assert_eq!(order, ["bbb", "aaa"]);
        assert!(tree.get("aaa").unwrap().try_to_match_last());
    }

    #[tokio::test(start_paused = true)]
    async fn silent_device_costs_one_batched_timeout() {
        use thola_transport::snmp::testing::MockAgent;
        use thola_transport::snmp::{SessionOptions, SnmpClient, SnmpVersion};
        use tokio_util::sync::CancellationToken;

        let agent = MockAgent::builder().build();
        let target = MockAgent::target(SnmpVersion::V2c, "public", 161);
        let session = agent
            .connector()
            .connect(&target, SessionOptions::default())
            .await
            .unwrap();
        let device = DeviceContext::new(
            MockAgent::address(),
            Some(SnmpClient::new(session, target)),
            None,
            CancellationToken::new(),
        );

        let err = ClassTree::builtin().unwrap().identify(&device).await.unwrap_err();
        assert!(matches!(err, CoreError::Network(_)));
        assert_eq!(agent.queries(), 1);
    }
}
