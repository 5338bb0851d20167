// Class inheritance on the raw YAML tree: mappings merge key by key,
// everything else (scalars, sequences) is replaced by the child.

use serde_yaml::{Mapping, Value};

/// Keys that describe a class itself and are never inherited.
const OWN_KEYS: [&str; 3] = ["name", "match", "try_to_match_last"];

/// The parent's effective definition with its identity keys removed.
pub fn inheritable(parent: &Value) -> Value {
    match parent {
        Value::Mapping(map) => {
            let mut out = map.clone();
            for key in OWN_KEYS {
                out.remove(&Value::from(key));
            }
            Value::Mapping(out)
        }
        other => other.clone(),
    }
}

/// Merge `child` into `base`, child values winning.
pub fn merge_into(base: &mut Value, child: Value) {
    match (base, child) {
        (Value::Mapping(base_map), Value::Mapping(child_map)) => merge_maps(base_map, child_map),
        (base, child) => *base = child,
    }
}

fn merge_maps(base: &mut Mapping, child: Mapping) {
    for (key, value) in child {
        match base.get_mut(&key) {
            Some(existing) => merge_into(existing, value),
            None => {
                base.insert(key, value);
            }
        }
    }
}
