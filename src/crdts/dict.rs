// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{Container, ContainerChange, Rank};
use crate::{
    Change, ChangeError, CustomValue, Key, Value,
    types::{
        custom_eq,
        generic::{self, Generic},
    },
};
use std::{any::Any, collections::BTreeMap};

/// A map from keys to [`Container`]s.
///
/// Every write goes to a fresh [`Rank`], so concurrent writes to the same key never conflict:
/// both are kept, the one with the larger rank is visible, and either can later be reverted.
///
/// Methods that modify the dict return the [`Change`] that describes the modification together
/// with the modified dict. The change is what gets shared with other replicas.
///
/// ```rust
/// use convergent::{Value, crdts::Dict};
///
/// let dict = Dict::default();
/// let (set, dict) = dict.set("hello", "world");
/// assert_eq!(dict.get("hello"), Value::from("world"));
///
/// let dict = dict.apply_change(&set.revert()).unwrap();
/// assert_eq!(dict.get("hello"), Value::Nil);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dict {
    entries: BTreeMap<Key, Container>,
}

impl Dict {
    /// The visible value at `key`, or `Nil`.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        self.entries
            .get(&key.into())
            .map(Container::get)
            .unwrap_or_default()
    }

    pub fn container(&self, key: &Key) -> Option<&Container> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: impl Into<Key>) -> bool {
        !self.get(key).is_nil()
    }

    /// Keys with a visible value, in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &Key> + '_ {
        self.items().map(|(key, _)| key)
    }

    /// Entries with a visible value, in ascending key order.
    pub fn items(&self) -> impl Iterator<Item = (&Key, Value)> + '_ {
        self.entries
            .iter()
            .map(|(key, container)| (key, container.get()))
            .filter(|(_, value)| !value.is_nil())
    }

    pub fn len(&self) -> usize {
        self.items().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes `value` at `key` under a fresh rank, undeleting the entry if it was deleted.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> (Change, Dict) {
        let key = key.into();
        let current = self.entries.get(&key).cloned().unwrap_or_default();
        let mut edits = Vec::with_capacity(2);
        if current.deleted() > 0 {
            edits.push(ContainerChange::Delete {
                delta: -current.deleted(),
            });
        }
        edits.push(ContainerChange::Set {
            rank: Rank::new(),
            value: value.into(),
        });
        self.edit(key, edits)
    }

    /// Deletes the entry at `key`.
    pub fn delete(&self, key: impl Into<Key>) -> (Change, Dict) {
        self.edit(key.into(), vec![ContainerChange::Delete { delta: 1 }])
    }

    /// Applies `change` to the visible value at `key`.
    pub fn update(&self, key: impl Into<Key>, change: Change) -> Result<(Change, Dict), ChangeError> {
        let key = key.into();
        let container = self.entries.get(&key).ok_or(ChangeError::NoEffectiveValue)?;
        let rank = container
            .winning_rank()
            .ok_or(ChangeError::NoEffectiveValue)?;
        let edit = ContainerChange::Update { rank, change };
        let updated = container.with(&edit)?;
        let mut dict = self.clone();
        dict.entries.insert(key.clone(), updated);
        Ok((Change::path([key], Change::custom(edit)), dict))
    }

    /// Applies a change produced by this or another replica.
    pub fn apply_change(&self, change: &Change) -> Result<Dict, ChangeError> {
        let value = Value::custom(self.clone()).apply(change)?;
        value.as_custom::<Dict>().cloned().ok_or(ChangeError::WrongType {
            expected: "Dict",
            found: value.type_name(),
        })
    }

    // Container changes without an update never fail.
    fn edit(&self, key: Key, edits: Vec<ContainerChange>) -> (Change, Dict) {
        let mut container = self.entries.get(&key).cloned().unwrap_or_default();
        for edit in &edits {
            if let Ok(next) = container.with(edit) {
                container = next;
            }
        }
        let mut dict = self.clone();
        dict.entries.insert(key.clone(), container);
        let mut edits: Vec<Change> = edits.into_iter().map(Change::custom).collect();
        let inner = if edits.len() == 1 {
            edits.remove(0)
        } else {
            Change::set(edits)
        };
        (Change::path([key], inner), dict)
    }
}

impl Generic for Dict {
    fn type_name(&self) -> &'static str {
        "Dict"
    }

    fn get(&self, key: &Key) -> Result<Value, ChangeError> {
        Ok(Value::custom(
            self.entries.get(key).cloned().unwrap_or_default(),
        ))
    }

    fn set(&self, key: &Key, value: Value) -> Result<Value, ChangeError> {
        let mut dict = self.clone();
        match value {
            Value::Nil => {
                dict.entries.remove(key);
            }
            other => {
                let container =
                    other
                        .as_custom::<Container>()
                        .cloned()
                        .ok_or(ChangeError::WrongType {
                            expected: "Container",
                            found: other.type_name(),
                        })?;
                dict.entries.insert(key.clone(), container);
            }
        }
        Ok(Value::custom(dict))
    }
}

impl CustomValue for Dict {
    fn type_name(&self) -> &'static str {
        "Dict"
    }

    fn apply(&self, change: &Change) -> Result<Value, ChangeError> {
        generic::apply(self, change)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_value(&self, other: &dyn CustomValue) -> bool {
        custom_eq(self, other)
    }
}
