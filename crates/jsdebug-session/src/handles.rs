//! Remote object handle cache.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

/// Last known JSON for each remote reference id.
///
/// Backed by a sharded map: a lookup only contends with writers of the same
/// shard, never with the whole table.
#[derive(Debug, Default)]
pub struct HandleTable {
    entries: DashMap<i64, Arc<Value>>,
}

impl HandleTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every entry; called whenever the debuggee resumes.
    pub fn reset(&self) {
        self.entries.clear();
    }

    /// Inserts or replaces one entry.
    pub fn put(&self, reference: i64, raw: impl Into<Arc<Value>>) {
        self.entries.insert(reference, raw.into());
    }

    pub fn put_all(&self, entries: impl IntoIterator<Item = (i64, Arc<Value>)>) {
        for (reference, raw) in entries {
            self.entries.insert(reference, raw);
        }
    }

    #[must_use]
    pub fn get(&self, reference: i64) -> Option<Arc<Value>> {
        self.entries
            .get(&reference)
            .map(|entry| Arc::clone(entry.value()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use serde_json::json;

    use super::*;

    #[test]
    fn put_then_get_returns_the_value() {
        let table = HandleTable::new();
        table.put(7, json!({ "handle": 7, "type": "object" }));
        assert_eq!(
            table.get(7).as_deref(),
            Some(&json!({ "handle": 7, "type": "object" }))
        );
        assert!(table.get(8).is_none());
    }

    #[test]
    fn reinsertion_replaces_the_whole_entry() {
        let table = HandleTable::new();
        table.put(1, json!({ "a": 1, "b": 2 }));
        table.put(1, json!({ "c": 3 }));
        assert_eq!(table.get(1).as_deref(), Some(&json!({ "c": 3 })));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn reset_forgets_every_handle() {
        let table = HandleTable::new();
        table.put_all((0..10).map(|handle| (handle, Arc::new(json!(handle)))));
        assert_eq!(table.len(), 10);
        table.reset();
        assert!(table.is_empty());
        assert!((0..10).all(|handle| table.get(handle).is_none()));
    }

    #[test]
    fn concurrent_writers_and_readers() {
        let table = Arc::new(HandleTable::new());
        let writers: Vec<_> = (0..4)
            .map(|worker| {
                let table = Arc::clone(&table);
                thread::spawn(move || {
                    for index in 0..250 {
                        let handle = worker * 1000 + index;
                        table.put(handle, json!(handle));
                        assert_eq!(table.get(handle).as_deref(), Some(&json!(handle)));
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(table.len(), 1000);
    }
}
