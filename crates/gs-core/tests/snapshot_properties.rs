//! Property-based tests for environment snapshots.

use gs_core::{snapshot, Binding, Environment, NativeValue};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::any::Any;
use std::collections::BTreeSet;

#[derive(Debug)]
struct Opaque;

impl NativeValue for Opaque {
    fn type_name(&self) -> &str {
        "module"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
struct Counter(i64);

impl NativeValue for Counter {
    fn type_name(&self) -> &str {
        "counter"
    }

    fn snapshot(&self) -> Option<Value> {
        Some(json!({ "count": self.0 }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone)]
enum Kind {
    Data(i64),
    Capturable(i64),
    Opaque,
}

fn kind_strategy() -> impl Strategy<Value = Kind> {
    prop_oneof![
        any::<i64>().prop_map(Kind::Data),
        any::<i64>().prop_map(Kind::Capturable),
        Just(Kind::Opaque),
    ]
}

fn build(bindings: &[(String, Kind)]) -> Environment {
    let mut env = Environment::new();
    for (name, kind) in bindings {
        let binding = match kind {
            Kind::Data(n) => Binding::Data(json!(n)),
            Kind::Capturable(n) => Binding::native(Counter(*n)),
            Kind::Opaque => Binding::native(Opaque),
        };
        env.insert(name.clone(), binding);
    }
    env
}

proptest! {
    #[test]
    fn captured_and_unshelved_partition_the_environment(
        bindings in prop::collection::vec(("[a-z_][a-z0-9_]{0,8}", kind_strategy()), 0..24)
    ) {
        let env = build(&bindings);
        let snap = snapshot(&env);

        let captured: BTreeSet<_> = snap.captured.iter().cloned().collect();
        let unshelved: BTreeSet<_> = snap.unshelved.iter().cloned().collect();
        let names: BTreeSet<_> = env.names().map(str::to_string).collect();

        prop_assert_eq!(captured.len(), snap.captured.len());
        prop_assert_eq!(unshelved.len(), snap.unshelved.len());
        prop_assert!(captured.is_disjoint(&unshelved));
        prop_assert_eq!(&captured | &unshelved, names);
    }

    #[test]
    fn blob_holds_exactly_the_captured_values(
        bindings in prop::collection::vec(("[a-z]{1,6}", kind_strategy()), 0..16)
    ) {
        let env = build(&bindings);
        let snap = snapshot(&env);
        let values = snap.values().unwrap();

        let keys: Vec<_> = values.keys().cloned().collect();
        prop_assert_eq!(keys, snap.captured.clone());
        for name in &snap.unshelved {
            prop_assert!(matches!(env.get(name), Some(Binding::Native(_))));
        }
    }

    #[test]
    fn digest_is_deterministic(
        bindings in prop::collection::vec(("[a-z]{1,6}", kind_strategy()), 0..16)
    ) {
        let first = snapshot(&build(&bindings));
        let second = snapshot(&build(&bindings));
        prop_assert_eq!(first.digest(), second.digest());
        prop_assert_eq!(first.to_record().sha256, first.digest());
    }
}
