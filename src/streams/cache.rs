// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use crate::{MapRandomState, create_map};
use std::{collections::HashMap, hash::Hash, mem};

/// Keeps derived streams (or anything else) alive across rounds of use.
///
/// A round starts with [`Cache::begin`] and ends with [`Cache::end`]. Entries read or written
/// during the round survive it; entries left untouched are handed to the eviction callback at
/// the end, which is where they get closed.
///
/// A cache is used by one writer at a time and rounds must not overlap.
pub struct Cache<K, V> {
    current: HashMap<K, V, MapRandomState>,
    previous: HashMap<K, V, MapRandomState>,
    evict: Box<dyn FnMut(K, V) + Send>,
}

impl<K: Eq + Hash, V> Cache<K, V> {
    pub fn new(evict: impl FnMut(K, V) + Send + 'static) -> Self {
        Self {
            current: create_map(),
            previous: create_map(),
            evict: Box::new(evict),
        }
    }

    /// Starts a round. Every existing entry becomes a candidate for eviction.
    pub fn begin(&mut self) {
        let stale = mem::replace(&mut self.current, create_map());
        self.previous.extend(stale);
    }

    /// Looks up an entry, keeping it for the current round.
    pub fn get(&mut self, key: &K) -> Option<&V>
    where
        K: Clone,
    {
        if !self.current.contains_key(key) {
            let value = self.previous.remove(key)?;
            self.current.insert(key.clone(), value);
        }
        self.current.get(key)
    }

    /// Stores an entry for the current round, evicting any older entry for the same key.
    pub fn set(&mut self, key: K, value: V) {
        let old = self
            .current
            .remove_entry(&key)
            .or_else(|| self.previous.remove_entry(&key));
        if let Some((key, old)) = old {
            (self.evict)(key, old);
        }
        self.current.insert(key, value);
    }

    /// Ends the round, evicting every entry that was not used since [`Cache::begin`].
    pub fn end(&mut self) {
        for (key, value) in self.previous.drain() {
            (self.evict)(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.current.len() + self.previous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn unused_entries_are_evicted() {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&evicted);
        let mut cache = Cache::new(move |k: &'static str, v: i32| sink.lock().push((k, v)));

        cache.begin();
        cache.set("a", 1);
        cache.set("b", 2);
        cache.end();
        assert!(evicted.lock().is_empty());

        cache.begin();
        assert_eq!(cache.get(&"a"), Some(&1));
        cache.end();
        assert_eq!(*evicted.lock(), [("b", 2)]);
        assert_eq!(cache.len(), 1);

        cache.begin();
        cache.set("a", 3);
        cache.end();
        assert_eq!(*evicted.lock(), [("b", 2), ("a", 1)]);
        assert_eq!(cache.get(&"a"), Some(&3));
    }
}
