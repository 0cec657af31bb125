// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{Key, Value, generic::Generic};
use crate::{ChangeError, MapRandomState, create_map, create_map_with_capacity};
use std::{collections::HashMap, fmt};

/// An unordered map from [`Key`] to [`Value`].
///
/// A key that maps to [`Value::Nil`] is absent: setting a key to `Nil` removes it, and reading a
/// missing key yields `Nil`. Maps accept path changes but not splices or moves.
#[derive(Clone, PartialEq)]
pub struct Map(HashMap<Key, Value, MapRandomState>);

impl Default for Map {
    fn default() -> Self {
        Self(create_map())
    }
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns a copy with `key` set to `value`, or removed if `value` is `Nil`.
    pub fn with(&self, key: impl Into<Key>, value: impl Into<Value>) -> Self {
        let mut map = self.clone();
        map.insert(key.into(), value.into());
        map
    }

    /// Entries in key order.
    pub fn entries(&self) -> Vec<(&Key, &Value)> {
        let mut entries: Vec<_> = self.0.iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        entries
    }

    fn insert(&mut self, key: Key, value: Value) {
        if value.is_nil() {
            self.0.remove(&key);
        } else {
            self.0.insert(key, value);
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Map
where
    K: Into<Key>,
    V: Into<Value>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let iter = iter.into_iter();
        let mut map = Self(create_map_with_capacity(iter.size_hint().0));
        for (k, v) in iter {
            map.insert(k.into(), v.into());
        }
        map
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}

impl Generic for Map {
    fn type_name(&self) -> &'static str {
        "Map"
    }

    fn get(&self, key: &Key) -> Result<Value, ChangeError> {
        Ok(self.0.get(key).cloned().unwrap_or_default())
    }

    fn set(&self, key: &Key, value: Value) -> Result<Value, ChangeError> {
        let mut map = self.clone();
        map.insert(key.clone(), value);
        Ok(Value::Map(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Change, Move, Replace, Splice, path};

    #[test]
    fn set_and_delete_keys() {
        let v = Value::from(Map::new().with("a", 1));
        let c = Change::path(path!["b"], Replace::new(Value::Nil, "x"));
        let v = v.apply(&c).unwrap();
        assert_eq!(v, Value::from(Map::new().with("a", 1).with("b", "x")));

        let c = Change::path(path!["a"], Replace::new(1, Value::Nil));
        assert_eq!(v.apply(&c).unwrap(), Value::from(Map::new().with("b", "x")));
    }

    #[test]
    fn nested_path_into_missing_key_fails() {
        let v = Value::from(Map::new());
        let c = Change::path(path!["a", "b"], Replace::new(Value::Nil, 1));
        assert_eq!(
            v.apply(&c).unwrap_err(),
            ChangeError::UnsupportedChange {
                change: "PathChange",
                value: "Nil"
            }
        );
    }

    #[test]
    fn maps_reject_splice_and_move() {
        let v = Value::from(Map::new().with("a", 1));
        assert_eq!(
            v.apply(&Splice::new(0, "", "x").into()).unwrap_err(),
            ChangeError::UnsupportedChange {
                change: "Splice",
                value: "Map"
            }
        );
        assert_eq!(
            v.apply(&Move::new(0, 1, 1).into()).unwrap_err(),
            ChangeError::UnsupportedChange {
                change: "Move",
                value: "Map"
            }
        );
    }

    #[test]
    fn debug_is_sorted() {
        let m = Map::new().with("b", 2).with("a", 1).with(0, true);
        assert_eq!(format!("{m:?}"), r#"{0: true, "a": 1, "b": 2}"#);
    }
}
