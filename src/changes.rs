// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! The change algebra.
//!
//! A [`Change`] describes an edit to a [`Value`]. Changes are plain data: applying one returns a
//! new value, [`Change::revert`] produces the inverse edit, and [`Change::merge`] transforms two
//! concurrent changes against each other so that both application orders converge.
//!
//! The absence of a change (the identity) is spelled `Option::<Change>::None` throughout.
use crate::{ChangeError, Key, Keys, Value};
use std::{any::Any, fmt, sync::Arc};

mod merge;
pub use merge::merge;

/// The result of merging two concurrent changes `l` and `r`: `(r', l')`, where `r'` is to be
/// applied after `l` and `l'` is to be applied after `r`.
pub type Merged = (Option<Change>, Option<Change>);

/// An edit to a [`Value`].
#[derive(Clone, Debug, PartialEq)]
pub enum Change {
    Replace(Replace),
    Splice(Splice),
    Move(Move),
    PathChange(PathChange),
    ChangeSet(ChangeSet),
    Custom(Arc<dyn CustomChange>),
}

/// Replaces a whole value.
#[derive(Clone, Debug, PartialEq)]
pub struct Replace {
    pub before: Value,
    pub after: Value,
}

/// Removes `before` from a collection at `offset` and inserts `after` in its place.
///
/// `before` and `after` are collections of the same kind as the target; either may be empty.
#[derive(Clone, Debug, PartialEq)]
pub struct Splice {
    pub offset: usize,
    pub before: Value,
    pub after: Value,
}

/// Shifts `[offset, offset + count)` of a collection by `distance` units.
///
/// A move with a negative distance is the same permutation as a positive-distance move of the
/// run it jumps over; see [`Move::normalized`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Move {
    pub offset: usize,
    pub count: usize,
    pub distance: isize,
}

/// Applies `change` to the descendant at `path`.
#[derive(Clone, Debug, PartialEq)]
pub struct PathChange {
    pub path: Keys,
    pub change: Box<Change>,
}

/// A sequence of changes applied in order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeSet(pub Vec<Change>);

/// A user-defined change that participates in the algebra.
///
/// The dispatcher calls [`CustomChange::merge`] when the custom change is on the left of a merge
/// and [`CustomChange::reverse_merge`] when it is on the right, so an implementation controls its
/// interaction with every other change kind. Both directions must honour the convergence
/// property of [`Change::merge`].
pub trait CustomChange: fmt::Debug + Send + Sync + 'static {
    /// The inverse of this change.
    fn revert(&self) -> Change;

    /// Merges with a concurrent `other`, where `self` is the left side. Returns
    /// `(other', self')`.
    fn merge(&self, other: &Change) -> Result<Merged, ChangeError>;

    /// Merges with a concurrent `other`, where `other` is the left side. Returns
    /// `(other', self')`.
    fn reverse_merge(&self, other: &Change) -> Result<Merged, ChangeError>;

    fn apply_to(&self, value: &Value) -> Result<Value, ChangeError>;

    /// Rewrites a path reference across this change.
    ///
    /// Returns `None` if the change never affects paths, in which case references pass through
    /// unchanged. Otherwise returns the updated path (`None` if it was invalidated) and the
    /// part of the change that lands at or below the path.
    fn merge_path(&self, path: &[Key]) -> Option<(Option<Keys>, Option<Change>)> {
        let _ = path;
        None
    }

    fn as_any(&self) -> &dyn Any;

    /// Compares with another custom change, which is usually done with [`custom_eq`].
    fn eq_change(&self, other: &dyn CustomChange) -> bool;
}

impl PartialEq for dyn CustomChange {
    fn eq(&self, other: &Self) -> bool {
        self.eq_change(other)
    }
}

/// Implements [`CustomChange::eq_change`] for types that are [`PartialEq`].
pub fn custom_eq<T>(this: &T, other: &dyn CustomChange) -> bool
where
    T: CustomChange + PartialEq,
{
    other.as_any().downcast_ref::<T>() == Some(this)
}

impl Replace {
    pub fn new(before: impl Into<Value>, after: impl Into<Value>) -> Self {
        Self {
            before: before.into(),
            after: after.into(),
        }
    }
}

impl Splice {
    pub fn new(offset: usize, before: impl Into<Value>, after: impl Into<Value>) -> Self {
        Self {
            offset,
            before: before.into(),
            after: after.into(),
        }
    }
}

impl Move {
    pub fn new(offset: usize, count: usize, distance: isize) -> Self {
        Self {
            offset,
            count,
            distance,
        }
    }

    /// A move that leaves every element in place.
    pub fn is_noop(&self) -> bool {
        self.count == 0 || self.distance == 0
    }

    /// Rewrites the move to have a non-negative distance.
    ///
    /// Moving `[o, o + c)` back by `d` is the same as moving `[o - d, o)` forward by `c`.
    pub fn normalized(&self) -> Move {
        if self.distance >= 0 {
            return *self;
        }
        let back = self.distance.unsigned_abs();
        Move {
            offset: self.offset.saturating_sub(back),
            count: back,
            distance: self.count as isize,
        }
    }

    pub fn revert(&self) -> Move {
        Move {
            offset: self.offset.saturating_add_signed(self.distance),
            count: self.count,
            distance: -self.distance,
        }
    }

    /// The position of the element at `index` after the move.
    pub fn map_index(&self, index: usize) -> usize {
        let m = self.normalized();
        let (o, c, d) = (m.offset, m.count, m.distance.unsigned_abs());
        if m.is_noop() || index < o || index >= o + c + d {
            index
        } else if index < o + c {
            index + d
        } else {
            index - c
        }
    }

    /// The position of the gap at `index` after the move.
    ///
    /// A gap sits between two elements. Gaps inside a moved run travel with it; at the edges of
    /// a run, `is_left` picks the element the gap sticks to: the one on its left when set, the
    /// one on its right otherwise.
    pub fn map_gap(&self, index: usize, is_left: bool) -> usize {
        let m = self.normalized();
        let (o, c, d) = (m.offset, m.count, m.distance.unsigned_abs());
        if m.is_noop() || index < o || index > o + c + d {
            index
        } else if index == o {
            if is_left { o } else { o + d }
        } else if index < o + c {
            index + d
        } else if index == o + c {
            if is_left { o + d + c } else { o }
        } else if index < o + c + d {
            index - c
        } else if is_left {
            o + d
        } else {
            index
        }
    }
}

impl PathChange {
    pub fn new(path: impl IntoIterator<Item = Key>, change: impl Into<Change>) -> Self {
        Self {
            path: path.into_iter().collect(),
            change: Box::new(change.into()),
        }
    }
}

impl ChangeSet {
    pub fn new(changes: impl IntoIterator<Item = Change>) -> Self {
        Self(changes.into_iter().collect())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Change>> for ChangeSet {
    fn from(value: Vec<Change>) -> Self {
        Self(value)
    }
}

macro_rules! impl_into_change {
    ($($t:ident),* $(,)?) => {
        $(
            impl From<$t> for Change {
                fn from(value: $t) -> Self {
                    Change::$t(value)
                }
            }
        )*
    };
}

impl_into_change!(Replace, Splice, Move, PathChange, ChangeSet);

impl Change {
    /// Wraps a change so it applies to the descendant at `path`.
    pub fn path(path: impl IntoIterator<Item = Key>, change: impl Into<Change>) -> Change {
        Change::PathChange(PathChange::new(path, change))
    }

    /// Groups changes that apply in order.
    pub fn set(changes: impl IntoIterator<Item = Change>) -> Change {
        Change::ChangeSet(ChangeSet::new(changes))
    }

    pub fn custom(change: impl CustomChange) -> Change {
        Change::Custom(Arc::new(change))
    }

    /// Downcasts a [`Change::Custom`] to its concrete type.
    pub fn as_custom<T: CustomChange>(&self) -> Option<&T> {
        match self {
            Change::Custom(c) => c.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// The name of the change kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Change::Replace(_) => "Replace",
            Change::Splice(_) => "Splice",
            Change::Move(_) => "Move",
            Change::PathChange(_) => "PathChange",
            Change::ChangeSet(_) => "ChangeSet",
            Change::Custom(_) => "Custom",
        }
    }

    /// The inverse change: applying `c` then `c.revert()` is the identity.
    pub fn revert(&self) -> Change {
        match self {
            Change::Replace(r) => Change::Replace(Replace {
                before: r.after.clone(),
                after: r.before.clone(),
            }),
            Change::Splice(s) => Change::Splice(Splice {
                offset: s.offset,
                before: s.after.clone(),
                after: s.before.clone(),
            }),
            Change::Move(m) => Change::Move(m.revert()),
            Change::PathChange(p) => Change::PathChange(PathChange {
                path: p.path.clone(),
                change: Box::new(p.change.revert()),
            }),
            Change::ChangeSet(set) => {
                Change::ChangeSet(ChangeSet(set.iter().rev().map(Change::revert).collect()))
            }
            Change::Custom(c) => c.revert(),
        }
    }

    /// Merges with a concurrent change `other` that applies to the same value.
    ///
    /// Returns `(other', self')` such that applying `self` then `other'` converges with applying
    /// `other` then `self'`. When both sides make incompatible edits to the same place, `self`
    /// wins.
    pub fn merge(&self, other: &Change) -> Result<Merged, ChangeError> {
        merge::merge_changes(self, other)
    }

    /// Like [`Change::merge`], but `other` is treated as the left side.
    ///
    /// Still returns `(other', self')`; only the priority on conflicts is reversed.
    pub fn reverse_merge(&self, other: &Change) -> Result<Merged, ChangeError> {
        let (own, theirs) = other.merge(self)?;
        Ok((theirs, own))
    }

    /// Normalizes the change without altering its effect: nested change sets are flattened,
    /// empty ones dropped and singletons unwrapped; nested path changes are collapsed and
    /// empty paths unwrapped.
    pub fn simplify(self) -> Option<Change> {
        match self {
            Change::ChangeSet(set) => {
                let mut flat = Vec::with_capacity(set.len());
                for change in set.0 {
                    match change.simplify() {
                        Some(Change::ChangeSet(inner)) => flat.extend(inner.0),
                        Some(change) => flat.push(change),
                        None => {}
                    }
                }
                match flat.len() {
                    0 => None,
                    1 => flat.pop(),
                    _ => Some(Change::ChangeSet(ChangeSet(flat))),
                }
            }
            Change::PathChange(p) => {
                let inner = p.change.simplify()?;
                if p.path.is_empty() {
                    return Some(inner);
                }
                match inner {
                    Change::PathChange(nested) => {
                        let mut path = p.path;
                        path.extend(nested.path);
                        Some(Change::PathChange(PathChange {
                            path,
                            change: nested.change,
                        }))
                    }
                    inner => Some(Change::PathChange(PathChange {
                        path: p.path,
                        change: Box::new(inner),
                    })),
                }
            }
            other => Some(other),
        }
    }

    /// Prepends `key` to the path of this change.
    pub(crate) fn under(self, key: Key) -> Change {
        match self {
            Change::PathChange(mut p) => {
                p.path.insert(0, key);
                Change::PathChange(p)
            }
            other => Change::PathChange(PathChange {
                path: std::iter::once(key).collect(),
                change: Box::new(other),
            }),
        }
    }
}

/// Wraps a list of changes that apply in order, avoiding a set for zero or one change.
pub(crate) fn sequence(mut changes: Vec<Change>) -> Option<Change> {
    match changes.len() {
        0 => None,
        1 => changes.pop(),
        _ => Some(Change::ChangeSet(ChangeSet(changes))),
    }
}

#[cfg(any(test, feature = "arbitrary"))]
pub mod test_util;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{array, path};

    #[test]
    fn revert_round_trips() {
        let base = array!["abc", 1, array![true]];
        let changes = [
            Change::path(path![0], Splice::new(1, "b", "XY")),
            Change::from(Move::new(0, 1, 2)),
            Change::from(Replace::new(base.clone(), "gone")),
            Change::set([
                Change::path(path![1], Replace::new(1, 2)),
                Change::from(Splice::new(0, array!["abc"], array![])),
            ]),
        ];
        for change in changes {
            let after = base.apply(&change).unwrap();
            assert_eq!(after.apply(&change.revert()).unwrap(), base, "{change:?}");
        }
    }

    #[test]
    fn negative_move_normalizes() {
        let m = Move::new(5, 2, -3);
        assert_eq!(m.normalized(), Move::new(2, 3, 2));
        assert_eq!(m.revert(), Move::new(2, 2, 3));
    }

    #[test]
    fn map_index_of_move() {
        // [a b c d e f] -> [a d e b c f]
        let m = Move::new(1, 2, 2);
        let mapped: Vec<_> = (0..6).map(|i| m.map_index(i)).collect();
        assert_eq!(mapped, [0, 3, 4, 1, 2, 5]);
        assert_eq!(
            (0..6).map(|i| m.revert().map_index(i)).collect::<Vec<_>>(),
            [0, 3, 4, 1, 2, 5]
        );
    }

    #[test]
    fn map_gap_sticks_to_its_neighbour() {
        // [a | b c | d e | f] -> [a d e b c f]
        let m = Move::new(1, 2, 2);
        assert_eq!(m.map_gap(1, true), 1);
        assert_eq!(m.map_gap(1, false), 3);
        assert_eq!(m.map_gap(3, true), 5);
        assert_eq!(m.map_gap(3, false), 1);
        assert_eq!(m.map_gap(5, true), 3);
        assert_eq!(m.map_gap(5, false), 5);
        assert_eq!(m.map_gap(2, false), 4);
        assert_eq!(m.map_gap(4, true), 2);
    }

    #[test]
    fn simplify_flattens() {
        let inner = Change::from(Replace::new(1, 2));
        let c = Change::set([
            Change::set([]),
            Change::path(path![], Change::set([inner.clone()])),
            Change::path(path!["a"], Change::path(path![0], inner.clone())),
        ]);
        assert_eq!(
            c.simplify(),
            Some(Change::set([
                inner.clone(),
                Change::path(path!["a", 0], inner)
            ]))
        );
        assert_eq!(Change::set([Change::set([])]).simplify(), None);
    }

    #[test]
    fn under_prefixes_paths() {
        let c = Change::path(path![1], Replace::new(1, 2)).under(Key::from("x"));
        assert_eq!(c, Change::path(path!["x", 1], Replace::new(1, 2)));
    }
}
