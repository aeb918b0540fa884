//! The process-wide multi-map macros use as a side channel (spec
//! "Macro Host Runtime" invocation context, GLOSSARY "Store") — e.g. to
//! register style rules collected across many macro invocations in a
//! single compile. Keyed by caller-chosen string, each key accumulates an
//! ordered list of values; nothing is ever removed during a build.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use pod_ast::Value;

#[derive(Debug, Default)]
pub struct Store {
    entries: RefCell<BTreeMap<String, Vec<Value>>>,
}

pub type SharedStore = Rc<Store>;

impl Store {
    pub fn new() -> SharedStore {
        Rc::new(Self::default())
    }

    pub fn push(&self, key: &str, value: Value) {
        self.entries
            .borrow_mut()
            .entry(key.to_string())
            .or_default()
            .push(value);
    }

    pub fn get(&self, key: &str) -> Vec<Value> {
        self.entries.borrow().get(key).cloned().unwrap_or_default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_values_per_key_in_insertion_order() {
        let store = Store::new();
        store.push("styles", Value::Str("a".into()));
        store.push("styles", Value::Str("b".into()));
        store.push("other", Value::Num(1.0));

        assert_eq!(
            store.get("styles"),
            vec![Value::Str("a".into()), Value::Str("b".into())]
        );
        assert_eq!(store.get("other"), vec![Value::Num(1.0)]);
        assert_eq!(store.get("missing"), Vec::<Value>::new());
    }

    #[test]
    fn keys_lists_every_populated_key() {
        let store = Store::new();
        store.push("a", Value::Null);
        store.push("b", Value::Null);
        let mut keys = store.keys();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }
}
