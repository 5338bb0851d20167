#![allow(clippy::unwrap_used)]

use std::collections::HashMap;

use pretty_assertions::assert_eq;
use thola_core::class::merge::{inheritable, merge_into};
use thola_core::class::{ClassSource, builtin};
use thola_core::model::Component;
use thola_core::{ClassTree, CoreError};

fn raw_definitions() -> HashMap<String, serde_yaml::Value> {
    builtin()
        .into_iter()
        .filter_map(|source| {
            let name = source.class_name()?;
            Some((name, serde_yaml::from_str(&source.contents).unwrap()))
        })
        .collect()
}

#[test]
fn effective_definitions_fold_the_ancestry() {
    let tree = ClassTree::builtin().unwrap();
    let raw = raw_definitions();
    assert_eq!(tree.len(), raw.len());

    for name in tree.names() {
        let mut path = tree.ancestry(name);
        path.reverse();

        let mut effective = raw[path[0].name()].clone();
        for class in &path[1..] {
            let mut next = inheritable(&effective);
            merge_into(&mut next, raw[class.name()].clone());
            effective = next;
        }
        assert_eq!(&effective, tree.get(name).unwrap().definition(), "{name}");
    }
}

#[test]
fn children_inherit_components_but_not_match_rules() {
    let tree = ClassTree::builtin().unwrap();
    let ios = tree.get("cisco/ios").unwrap();
    let cisco = tree.get("cisco").unwrap();

    assert!(ios.definition().get("match").is_some());
    assert_ne!(ios.definition().get("match"), cisco.definition().get("match"));
    assert_eq!(
        ios.is_enabled(Component::Interfaces),
        tree.root().is_enabled(Component::Interfaces)
    );
    assert_eq!(tree.parent_of("cisco/ios").unwrap().name(), "cisco");
    assert!(tree.parent_of("generic").is_none());
}

#[test]
fn match_last_classes_are_evaluated_after_their_siblings() {
    let tree = ClassTree::builtin().unwrap();
    for name in tree.names() {
        let order: Vec<bool> = tree
            .children(name)
            .iter()
            .map(|c| c.try_to_match_last())
            .collect();
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(order, sorted, "children of {name}");
    }
}

#[test]
fn orphans_and_duplicates_are_rejected() {
    let generic = ClassSource::new("generic.yaml", "name: generic\n");
    let orphan = ClassSource::new(
        "generic/acme/edge.yaml",
        "name: acme/edge\nmatch:\n  snmp_get:\n    oid: 1.3.6.1.2.1.1.1.0\n    matcher:\n      contains: edge\n",
    );

    let err = ClassTree::build(&[generic.clone(), orphan]).unwrap_err();
    assert!(matches!(err, CoreError::Config { .. }), "{err}");
    assert!(err.to_string().contains("acme"), "{err}");

    let missing_root = ClassTree::build(&[]).unwrap_err();
    assert!(missing_root.to_string().contains("generic"), "{missing_root}");

    let twice = ClassTree::build(&[generic, ClassSource::new("generic.yml", "name: generic\n")])
        .unwrap_err();
    assert!(twice.to_string().contains("defined twice"), "{twice}");
}
