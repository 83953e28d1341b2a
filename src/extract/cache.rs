//! Bounded extraction cache keyed by `(path, mtime)`.
//!
//! A changed mtime produces a new key, so stale results are never served;
//! they just age out. Eviction is oldest-inserted-first.

use std::collections::{HashMap, VecDeque};

use super::Extracted;

pub(crate) type CacheKey = (String, u64);

pub(crate) struct ExtractionCache {
    capacity: usize,
    entries: HashMap<CacheKey, Extracted>,
    order: VecDeque<CacheKey>,
}

impl ExtractionCache {
    pub(crate) fn new(capacity: usize) -> Self {
        ExtractionCache {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub(crate) fn get(&self, key: &CacheKey) -> Option<Extracted> {
        self.entries.get(key).cloned()
    }

    pub(crate) fn insert(&mut self, key: CacheKey, value: Extracted) {
        if let Some(slot) = self.entries.get_mut(&key) {
            *slot = value;
            return;
        }
        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, value);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileMetadata;

    fn value(name: &str) -> Extracted {
        Extracted {
            content: format!("File: {}", name),
            metadata: FileMetadata {
                filename: name.to_string(),
                extension: ".txt".to_string(),
                size: 1,
                modified: 1,
                created: 1,
            },
        }
    }

    #[test]
    fn test_evicts_oldest_inserted() {
        let mut cache = ExtractionCache::new(2);
        cache.insert(("a".into(), 1), value("a"));
        cache.insert(("b".into(), 1), value("b"));
        cache.insert(("c".into(), 1), value("c"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&("a".into(), 1)).is_none());
        assert!(cache.get(&("b".into(), 1)).is_some());
        assert!(cache.get(&("c".into(), 1)).is_some());
    }

    #[test]
    fn test_reading_does_not_refresh_order() {
        let mut cache = ExtractionCache::new(2);
        cache.insert(("a".into(), 1), value("a"));
        cache.insert(("b".into(), 1), value("b"));
        assert!(cache.get(&("a".into(), 1)).is_some());
        cache.insert(("c".into(), 1), value("c"));
        assert!(cache.get(&("a".into(), 1)).is_none());
    }

    #[test]
    fn test_new_mtime_is_new_key() {
        let mut cache = ExtractionCache::new(10);
        cache.insert(("a".into(), 1), value("old"));
        assert!(cache.get(&("a".into(), 2)).is_none());
        cache.insert(("a".into(), 2), value("new"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_reinsert_same_key_keeps_size() {
        let mut cache = ExtractionCache::new(2);
        cache.insert(("a".into(), 1), value("a"));
        cache.insert(("a".into(), 1), value("a2"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&("a".into(), 1)).unwrap().content, "File: a2");
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
