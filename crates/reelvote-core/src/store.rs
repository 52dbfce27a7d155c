use std::collections::BTreeMap;

use parking_lot::Mutex;

/// Keyed state owned by a persistence collaborator.
///
/// `update` is the only write path and must run the closure atomically with
/// respect to other calls on the same key: a missing entry is materialized as
/// `Default` first, and the closure's view is the committed value.
pub trait KeyValueStore<V>: Send + Sync {
    fn get(&self, key: &str) -> Option<V>;

    fn update<R>(&self, key: &str, f: impl FnOnce(&mut V) -> R) -> R;

    /// Copy of every entry, ordered by key.
    fn entries(&self) -> BTreeMap<String, V>;
}

/// Process-local store guarded by a single lock.
#[derive(Debug, Default)]
pub struct MemoryStore<V> {
    inner: Mutex<BTreeMap<String, V>>,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn from_entries(entries: BTreeMap<String, V>) -> Self {
        Self {
            inner: Mutex::new(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl<V> KeyValueStore<V> for MemoryStore<V>
where
    V: Clone + Default + Send,
{
    fn get(&self, key: &str) -> Option<V> {
        self.inner.lock().get(key).cloned()
    }

    fn update<R>(&self, key: &str, f: impl FnOnce(&mut V) -> R) -> R {
        let mut map = self.inner.lock();
        let value = map.entry(key.to_string()).or_default();
        f(value)
    }

    fn entries(&self) -> BTreeMap<String, V> {
        self.inner.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{sync::Arc, thread};

    #[test]
    fn update_materializes_default() {
        let store = MemoryStore::<u32>::new();
        assert_eq!(store.get("a"), None);
        let seen = store.update("a", |v| {
            *v += 5;
            *v
        });
        assert_eq!(seen, 5);
        assert_eq!(store.get("a"), Some(5));
    }

    #[test]
    fn concurrent_updates_are_serialized() {
        let store = Arc::new(MemoryStore::<u64>::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        store.update("counter", |v| *v += 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.get("counter"), Some(8_000));
    }

    #[test]
    fn entries_are_ordered_copies() {
        let store = MemoryStore::from_entries(BTreeMap::from([
            ("b".to_string(), 2u8),
            ("a".to_string(), 1u8),
        ]));
        let keys: Vec<_> = store.entries().into_keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(store.len(), 2);
    }
}
