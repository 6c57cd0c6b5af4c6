//! A small key/value table used to evaluate `SelectAction` predicates.
//!
//! Mirrors `omni-action::AtomTable`'s single-mutex pattern, simplified: no
//! interning or refcounting, just names to values a caller can set before
//! `start` and a composite's select predicate can read during dispatch.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Process-wide variable store, guarded by a single mutex.
pub struct VariableTable {
    inner: Mutex<HashMap<String, String>>,
}

impl VariableTable {
    /// Creates an empty table.
    pub fn new() -> VariableTable {
        VariableTable {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Sets `key` to `value`, overwriting any previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.lock().insert(key.into(), value.into());
    }

    /// Reads the current value of `key`, if set.
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().get(key).cloned()
    }

    /// Removes `key`, returning its previous value if any.
    pub fn unset(&self, key: &str) -> Option<String> {
        self.inner.lock().remove(key)
    }
}

impl Default for VariableTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let table = VariableTable::new();
        table.set("chapter", "2");
        assert_eq!(table.get("chapter").as_deref(), Some("2"));
    }

    #[test]
    fn missing_key_returns_none() {
        let table = VariableTable::new();
        assert_eq!(table.get("nope"), None);
    }

    #[test]
    fn unset_removes_and_returns_previous_value() {
        let table = VariableTable::new();
        table.set("k", "v");
        assert_eq!(table.unset("k").as_deref(), Some("v"));
        assert_eq!(table.get("k"), None);
    }
}
