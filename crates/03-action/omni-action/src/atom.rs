//! Interned atom table: string keys become `Copy` handles so pointer-style
//! identity equality becomes cheap index equality.

use std::collections::HashMap;
use std::num::NonZeroU32;

use parking_lot::Mutex;

/// How a key is normalized before interning/lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LookupMode {
    /// Key is used as-is.
    Exact,
    /// Key is lowercased before interning/lookup.
    LowerCase,
    /// Key is uppercased before interning/lookup.
    UpperCase,
}

impl LookupMode {
    fn normalize(self, key: &str) -> String {
        match self {
            LookupMode::Exact => key.to_string(),
            LookupMode::LowerCase => key.to_lowercase(),
            LookupMode::UpperCase => key.to_uppercase(),
        }
    }
}

/// A handle to an interned string. Two atoms are equal iff they name the
/// same normalized string in the same table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Atom(NonZeroU32);

struct Entry {
    key: String,
    refcount: u32,
}

struct Inner {
    entries: Vec<Option<Entry>>,
    index: HashMap<String, u32>,
    free: Vec<u32>,
}

/// Process-wide interned string table, guarded by a single mutex.
pub struct AtomTable {
    inner: Mutex<Inner>,
}

impl AtomTable {
    /// Creates an empty table.
    pub fn new() -> AtomTable {
        AtomTable {
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                index: HashMap::new(),
                free: Vec::new(),
            }),
        }
    }

    /// Interns `key` under `mode`, bumping its refcount if already present.
    pub fn intern(&self, key: &str, mode: LookupMode) -> Atom {
        let normalized = mode.normalize(key);
        let mut inner = self.inner.lock();
        if let Some(&slot) = inner.index.get(&normalized) {
            let entry = inner.entries[slot as usize].as_mut().expect("indexed slot must be live");
            entry.refcount += 1;
            return Atom(NonZeroU32::new(slot + 1).expect("slot+1 is never zero"));
        }

        let slot = if let Some(slot) = inner.free.pop() {
            inner.entries[slot as usize] = Some(Entry {
                key: normalized.clone(),
                refcount: 1,
            });
            slot
        } else {
            let slot = inner.entries.len() as u32;
            inner.entries.push(Some(Entry {
                key: normalized.clone(),
                refcount: 1,
            }));
            slot
        };
        inner.index.insert(normalized, slot);
        Atom(NonZeroU32::new(slot + 1).expect("slot+1 is never zero"))
    }

    /// Resolves an atom back to its normalized string, if still live.
    pub fn resolve(&self, atom: Atom) -> Option<String> {
        let inner = self.inner.lock();
        let slot = atom.0.get() - 1;
        inner.entries.get(slot as usize)?.as_ref().map(|e| e.key.clone())
    }

    /// Drops one reference to `atom`, evicting it from the table once its
    /// refcount reaches zero.
    pub fn release(&self, atom: Atom) {
        let mut inner = self.inner.lock();
        let slot = atom.0.get() - 1;
        let Some(entry) = inner.entries.get_mut(slot as usize).and_then(|e| e.as_mut()) else {
            return;
        };
        entry.refcount -= 1;
        if entry.refcount == 0 {
            let key = entry.key.clone();
            inner.entries[slot as usize] = None;
            inner.index.remove(&key);
            inner.free.push(slot);
        }
    }

    /// Number of distinct strings currently interned.
    pub fn len(&self) -> usize {
        self.inner.lock().index.len()
    }

    /// Whether the table currently holds no strings.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AtomTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_same_mode_yields_equal_atoms() {
        let table = AtomTable::new();
        let a = table.intern("Foo", LookupMode::Exact);
        let b = table.intern("Foo", LookupMode::Exact);
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn lowercase_mode_normalizes_before_comparing() {
        let table = AtomTable::new();
        let a = table.intern("Foo", LookupMode::LowerCase);
        let b = table.intern("FOO", LookupMode::LowerCase);
        assert_eq!(a, b);
        assert_eq!(table.resolve(a).unwrap(), "foo");
    }

    #[test]
    fn different_modes_are_independent_namespaces() {
        let table = AtomTable::new();
        let exact = table.intern("Foo", LookupMode::Exact);
        let lower = table.intern("Foo", LookupMode::LowerCase);
        assert_ne!(exact, lower);
    }

    #[test]
    fn release_evicts_at_zero_refcount() {
        let table = AtomTable::new();
        let a = table.intern("bar", LookupMode::Exact);
        table.intern("bar", LookupMode::Exact);
        assert_eq!(table.len(), 1);
        table.release(a);
        assert_eq!(table.len(), 1, "one reference remains");
        let b = table.intern("bar", LookupMode::Exact);
        table.release(b);
        assert_eq!(table.resolve(a), None);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn evicted_slots_are_recycled() {
        let table = AtomTable::new();
        let a = table.intern("one", LookupMode::Exact);
        table.release(a);
        let b = table.intern("two", LookupMode::Exact);
        assert_eq!(table.len(), 1);
        assert_eq!(table.resolve(b).unwrap(), "two");
    }
}
