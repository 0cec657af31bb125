// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{Dict, OrdKey, Rank};
use crate::{
    Change, ChangeError, CustomValue, Key, Scalar, Value,
    types::{
        custom_eq,
        generic::{self, Generic},
    },
};
use std::any::Any;

const VALUES: &str = "values";
const ORDS: &str = "ords";

/// An ordered list built from two [`Dict`]s sharing the same [`Rank`] keys.
///
/// `values` holds the items and `ords` holds an [`OrdKey`] per item. The visible order is by
/// ord key, with ties broken by rank. Because positions are never stored as indices, concurrent
/// inserts, removes and moves always merge.
///
/// ```rust
/// use convergent::{Value, crdts::Seq};
///
/// let (insert, seq) = Seq::default()
///     .splice(0, 0, vec!["hello".into(), "world".into()])
///     .unwrap();
/// let (_, seq) = seq.insert(1, "new").unwrap();
/// assert_eq!(seq.items(), [Value::from("hello"), "new".into(), "world".into()]);
///
/// let seq = seq.apply_change(&insert.revert()).unwrap();
/// assert_eq!(seq.items(), [Value::from("new")]);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Seq {
    values: Dict,
    ords: Dict,
}

#[derive(Clone, Debug)]
struct Entry {
    ord: OrdKey,
    rank: Rank,
    value: Value,
}

fn ord_value(ord: &OrdKey) -> Value {
    Value::Atomic(Scalar::String(ord.to_string()))
}

fn parse_ord(value: &Value) -> Option<OrdKey> {
    match value {
        Value::Atomic(scalar) => scalar.as_str()?.parse().ok(),
        _ => None,
    }
}

impl Seq {
    pub fn values(&self) -> &Dict {
        &self.values
    }

    pub fn ords(&self) -> &Dict {
        &self.ords
    }

    fn entries(&self) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self
            .values
            .items()
            .filter_map(|(key, value)| {
                let Key::Rank(rank) = key else {
                    return None;
                };
                let ord = parse_ord(&self.ords.get(*rank))?;
                Some(Entry {
                    ord,
                    rank: *rank,
                    value,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.ord.cmp(&b.ord).then(a.rank.cmp(&b.rank)));
        entries
    }

    /// The visible items, in order.
    pub fn items(&self) -> Vec<Value> {
        self.entries().into_iter().map(|e| e.value).collect()
    }

    /// The ranks of the visible items, in order.
    pub fn ranks(&self) -> Vec<Rank> {
        self.entries().into_iter().map(|e| e.rank).collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.entries().into_iter().nth(index).map(|e| e.value)
    }

    /// Removes `remove` items at `offset` and inserts `insert` in their place.
    pub fn splice(
        &self,
        offset: usize,
        remove: usize,
        insert: Vec<Value>,
    ) -> Result<(Change, Seq), ChangeError> {
        let mut entries = self.entries();
        check_range(offset, remove, entries.len())?;
        let mut seq = self.clone();
        let mut changes = Vec::new();

        for entry in entries.drain(offset..offset + remove) {
            changes.push(seq.delete_rank(entry.rank));
        }

        let (ords, shifted) = ords_for(&entries, offset, insert.len());
        for (rank, ord) in shifted {
            changes.push(seq.set_ord(rank, &ord));
        }
        for (value, ord) in insert.into_iter().zip(ords) {
            let rank = Rank::new();
            let (change, values) = seq.values.set(rank, value);
            seq.values = values;
            changes.push(change.under(Key::from(VALUES)));
            changes.push(seq.set_ord(rank, &ord));
        }
        Ok((Change::set(changes), seq))
    }

    pub fn insert(&self, index: usize, value: impl Into<Value>) -> Result<(Change, Seq), ChangeError> {
        self.splice(index, 0, vec![value.into()])
    }

    pub fn remove(&self, index: usize) -> Result<(Change, Seq), ChangeError> {
        self.splice(index, 1, Vec::new())
    }

    /// Moves `[offset, offset + count)` by `distance` items.
    ///
    /// Only the ord keys of the moved items are rewritten, so concurrent updates to the moved
    /// values are unaffected.
    pub fn mv(
        &self,
        offset: usize,
        count: usize,
        distance: isize,
    ) -> Result<(Change, Seq), ChangeError> {
        let mut entries = self.entries();
        let len = entries.len();
        let out_of_bounds = ChangeError::OutOfBounds {
            offset,
            count,
            len,
        };
        check_range(offset, count, len)?;
        let target = offset
            .checked_add_signed(distance)
            .filter(|target| target + count <= len)
            .ok_or(out_of_bounds)?;

        let moved: Vec<Entry> = entries.drain(offset..offset + count).collect();
        let (ords, shifted) = ords_for(&entries, target, count);
        let mut seq = self.clone();
        let mut changes = Vec::new();
        for (rank, ord) in shifted {
            changes.push(seq.set_ord(rank, &ord));
        }
        for (entry, ord) in moved.iter().zip(ords) {
            changes.push(seq.set_ord(entry.rank, &ord));
        }
        Ok((Change::set(changes), seq))
    }

    /// Applies `change` to the item at `index`.
    pub fn update(&self, index: usize, change: Change) -> Result<(Change, Seq), ChangeError> {
        let len = self.len();
        let rank = self
            .ranks()
            .get(index)
            .copied()
            .ok_or(ChangeError::OutOfBounds {
                offset: index,
                count: 1,
                len,
            })?;
        let (change, values) = self.values.update(rank, change)?;
        let seq = Seq {
            values,
            ords: self.ords.clone(),
        };
        Ok((change.under(Key::from(VALUES)), seq))
    }

    /// Applies a change produced by this or another replica.
    pub fn apply_change(&self, change: &Change) -> Result<Seq, ChangeError> {
        let value = Value::custom(self.clone()).apply(change)?;
        value.as_custom::<Seq>().cloned().ok_or(ChangeError::WrongType {
            expected: "Seq",
            found: value.type_name(),
        })
    }

    fn delete_rank(&mut self, rank: Rank) -> Change {
        let (values_change, values) = self.values.delete(rank);
        let (ords_change, ords) = self.ords.delete(rank);
        self.values = values;
        self.ords = ords;
        Change::set([
            values_change.under(Key::from(VALUES)),
            ords_change.under(Key::from(ORDS)),
        ])
    }

    fn set_ord(&mut self, rank: Rank, ord: &OrdKey) -> Change {
        let (change, ords) = self.ords.set(rank, ord_value(ord));
        self.ords = ords;
        change.under(Key::from(ORDS))
    }
}

fn check_range(offset: usize, count: usize, len: usize) -> Result<(), ChangeError> {
    match offset.checked_add(count) {
        Some(end) if end <= len => Ok(()),
        _ => Err(ChangeError::OutOfBounds { offset, count, len }),
    }
}

/// Allocates `n` ord keys for the gap before `entries[at]`.
///
/// Concurrent inserts at the same place end up with equal ord keys. When the gap falls between
/// such twins there is no room, so the twins after the gap are re-keyed along with the new items
/// and returned as the second half.
fn ords_for(entries: &[Entry], at: usize, n: usize) -> (Vec<OrdKey>, Vec<(Rank, OrdKey)>) {
    let lower = match at.checked_sub(1) {
        Some(prev) => entries[prev].ord.clone(),
        None => OrdKey::zero(),
    };
    let twins = entries[at..]
        .iter()
        .take_while(|e| e.ord <= lower)
        .count();
    let upper = entries
        .get(at + twins)
        .map(|e| e.ord.clone())
        .unwrap_or_else(|| lower.next());
    let mut ords = lower.between(&upper, n + twins);
    let shifted = ords.split_off(n);
    let shifted = entries[at..at + twins]
        .iter()
        .map(|e| e.rank)
        .zip(shifted)
        .collect();
    (ords, shifted)
}

impl Generic for Seq {
    fn type_name(&self) -> &'static str {
        "Seq"
    }

    fn get(&self, key: &Key) -> Result<Value, ChangeError> {
        match key {
            Key::Name(name) if name == VALUES => Ok(Value::custom(self.values.clone())),
            Key::Name(name) if name == ORDS => Ok(Value::custom(self.ords.clone())),
            _ => Err(ChangeError::InvalidKey {
                key: key.clone(),
                value: "Seq",
            }),
        }
    }

    fn set(&self, key: &Key, value: Value) -> Result<Value, ChangeError> {
        let dict = value
            .as_custom::<Dict>()
            .cloned()
            .ok_or(ChangeError::WrongType {
                expected: "Dict",
                found: value.type_name(),
            })?;
        let mut seq = self.clone();
        match key {
            Key::Name(name) if name == VALUES => seq.values = dict,
            Key::Name(name) if name == ORDS => seq.ords = dict,
            _ => {
                return Err(ChangeError::InvalidKey {
                    key: key.clone(),
                    value: "Seq",
                });
            }
        }
        Ok(Value::custom(seq))
    }
}

impl CustomValue for Seq {
    fn type_name(&self) -> &'static str {
        "Seq"
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
