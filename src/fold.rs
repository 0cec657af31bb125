// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Holding back local-only changes from an upstream.
//!
//! A [`Folding`] is a list of changes ("folds") that exist only in a local view. The local value
//! is always the remote value with every fold applied on top. Changes made in the local view are
//! moved below the folds before they are sent upstream, and changes arriving from upstream are
//! moved above the folds before they are applied locally.
//!
//! ```rust
//! use convergent::{Splice, Value, fold::Foldable};
//!
//! let mut view = Foldable::new(Value::from("world"));
//! view.fold(Splice::new(0, "", "hello ").into()).unwrap();
//! assert_eq!(view.local(), &Value::from("hello world"));
//! assert_eq!(view.remote(), &Value::from("world"));
//!
//! // A local edit after the fold reaches the remote side without it.
//! let upstream = view.apply_folded(Splice::new(11, "", "!").into()).unwrap();
//! assert_eq!(upstream, Some(Splice::new(5, "", "!").into()));
//! assert_eq!(view.remote(), &Value::from("world!"));
//! ```
use crate::{Change, ChangeError, Value, changes::sequence};

/// An ordered list of local-only changes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Folding {
    folds: Vec<Change>,
}

impl Folding {
    pub fn new(folds: impl IntoIterator<Item = Change>) -> Self {
        Self {
            folds: folds.into_iter().collect(),
        }
    }

    pub fn folds(&self) -> &[Change] {
        &self.folds
    }

    pub fn len(&self) -> usize {
        self.folds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folds.is_empty()
    }

    /// Adds a fold on top of the existing ones.
    pub fn push(&mut self, change: Change) {
        self.folds.push(change);
    }

    /// Rebases a change made in the local view onto the remote value.
    ///
    /// Returns the folds rewritten to apply after the change, and the change as the remote side
    /// needs it. A fold that the change overwrites entirely is dropped.
    pub fn transform_local(&self, change: Change) -> Result<(Folding, Option<Change>), ChangeError> {
        let mut change = Some(change);
        let mut folds = Vec::with_capacity(self.folds.len());
        for fold in self.folds.iter().rev() {
            let Some(current) = change.as_ref() else {
                folds.push(fold.clone());
                continue;
            };
            // Both the undone fold and the change apply to the view with this fold in place.
            // The change is the left side so it wins where it overwrites the fold.
            let (undo, below) = current.merge(&fold.revert())?;
            if let Some(undo) = undo {
                folds.push(undo.revert());
            }
            change = below;
        }
        folds.reverse();
        Ok((Folding { folds }, change))
    }

    /// Rebases a change from the remote side onto the local view.
    ///
    /// Returns the folds rewritten to apply after the change, and the change as the local view
    /// needs it.
    pub fn transform_remote(&self, change: Change) -> Result<(Folding, Option<Change>), ChangeError> {
        rebase(self.folds.iter().cloned(), Some(change))
    }

    /// Drops `count` folds starting at `offset`.
    ///
    /// Returns the remaining folds and the change that removes the dropped folds' effect from
    /// the local view.
    pub fn unfold(&self, offset: usize, count: usize) -> Result<(Folding, Option<Change>), ChangeError> {
        let end = offset
            .checked_add(count)
            .filter(|end| *end <= self.folds.len())
            .ok_or(ChangeError::OutOfBounds {
                offset,
                count,
                len: self.folds.len(),
            })?;
        let undo = sequence(self.folds[offset..end].iter().rev().map(Change::revert).collect());
        let (later, undo) = rebase(self.folds[end..].iter().cloned(), undo)?;
        let mut folds = self.folds[..offset].to_vec();
        folds.extend(later.folds);
        Ok((Folding { folds }, undo))
    }
}

/// Moves `change`, which applies below `folds`, above them.
fn rebase(
    folds: impl Iterator<Item = Change>,
    mut change: Option<Change>,
) -> Result<(Folding, Option<Change>), ChangeError> {
    let mut rebased = Vec::new();
    for fold in folds {
        let Some(current) = change.as_ref() else {
            rebased.push(fold);
            continue;
        };
        let (above, fold) = fold.merge(current)?;
        rebased.extend(fold);
        change = above;
    }
    Ok((Folding { folds: rebased }, change))
}

/// A local value, the remote value it was derived from, and the folds between them.
#[derive(Clone, Debug, PartialEq)]
pub struct Foldable {
    local: Value,
    remote: Value,
    folding: Folding,
}

impl Foldable {
    /// Starts without folds, so both sides hold `value`.
    pub fn new(value: Value) -> Self {
        Self {
            local: value.clone(),
            remote: value,
            folding: Folding::default(),
        }
    }

    pub fn local(&self) -> &Value {
        &self.local
    }

    pub fn remote(&self) -> &Value {
        &self.remote
    }

    pub fn folding(&self) -> &Folding {
        &self.folding
    }

    /// Applies a change to the local view only, holding it back as a fold.
    pub fn fold(&mut self, change: Change) -> Result<(), ChangeError> {
        self.local = self.local.apply(&change)?;
        self.folding.push(change);
        Ok(())
    }

    /// Applies a change made in the local view. Returns what the remote side applied.
    pub fn apply_folded(&mut self, change: Change) -> Result<Option<Change>, ChangeError> {
        let local = self.local.apply(&change)?;
        let (folding, upstream) = self.folding.transform_local(change)?;
        self.remote = self.remote.apply_opt(upstream.as_ref())?;
        self.local = local;
        self.folding = folding;
        Ok(upstream)
    }

    /// Applies a change from the remote side. Returns what the local view applied.
    pub fn apply_unfolded(&mut self, change: Change) -> Result<Option<Change>, ChangeError> {
        let remote = self.remote.apply(&change)?;
        let (folding, downstream) = self.folding.transform_remote(change)?;
        self.local = self.local.apply_opt(downstream.as_ref())?;
        self.remote = remote;
        self.folding = folding;
        Ok(downstream)
    }

    /// Drops folds from the local view. Returns the change the local view applied.
    pub fn unfold(&mut self, offset: usize, count: usize) -> Result<Option<Change>, ChangeError> {
        let (folding, undo) = self.folding.unfold(offset, count)?;
        self.local = self.local.apply_opt(undo.as_ref())?;
        self.folding = folding;
        Ok(undo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Map, Replace, Splice, array, path};

    fn consistent(view: &Foldable) {
        let mut expected = view.remote().clone();
        for fold in view.folding().folds() {
            expected = expected.apply(fold).unwrap();
        }
        assert_eq!(&expected, view.local());
    }

    #[test]
    fn local_edits_skip_the_folds() {
        let mut view = Foldable::new("abc".into());
        view.fold(Splice::new(0, "", "X").into()).unwrap();
        let upstream = view.apply_folded(Splice::new(4, "", "Y").into()).unwrap();
        assert_eq!(upstream, Some(Splice::new(3, "", "Y").into()));
        assert_eq!(view.local(), &Value::from("XabcY"));
        assert_eq!(view.remote(), &Value::from("abcY"));
        consistent(&view);
    }

    #[test]
    fn remote_edits_land_above_the_folds() {
        let mut view = Foldable::new("abc".into());
        view.fold(Splice::new(0, "", "X").into()).unwrap();
        let local = view.apply_unfolded(Splice::new(1, "b", "B").into()).unwrap();
        assert_eq!(local, Some(Splice::new(2, "b", "B").into()));
        assert_eq!(view.local(), &Value::from("XaBc"));
        consistent(&view);
    }

    #[test]
    fn overwritten_folds_are_dropped() {
        let mut view = Foldable::new(Value::from(Map::new().with("k", 1)));
        view.fold(Change::path(path!["k"], Replace::new(1, 2))).unwrap();
        view.apply_folded(Change::path(path!["k"], Replace::new(2, 3)))
            .unwrap();
        assert!(view.folding().is_empty());
        assert_eq!(view.remote(), view.local());
        assert_eq!(view.local(), &Value::from(Map::new().with("k", 3)));
        consistent(&view);
    }

    #[test]
    fn unfolding_removes_a_segment() {
        let mut view = Foldable::new("abc".into());
        view.fold(Splice::new(0, "", "X").into()).unwrap();
        view.fold(Splice::new(4, "", "Y").into()).unwrap();
        let undo = view.unfold(0, 1).unwrap();
        assert_eq!(undo, Some(Splice::new(0, "X", "").into()));
        assert_eq!(view.local(), &Value::from("abcY"));
        assert_eq!(view.folding().folds(), [Change::from(Splice::new(3, "", "Y"))]);
        consistent(&view);

        assert_eq!(
            view.unfold(1, 1).unwrap_err(),
            ChangeError::OutOfBounds {
                offset: 1,
                count: 1,
                len: 1
            }
        );
    }

    #[test]
    fn mixed_traffic_stays_consistent() {
        let mut view = Foldable::new(array!["a", "b", "c"]);
        view.fold(Splice::new(1, array![], array!["local"]).into()).unwrap();
        view.apply_unfolded(Splice::new(0, array!["a"], array![]).into())
            .unwrap();
        view.apply_folded(Change::path(path![1], Replace::new("b", "B")))
            .unwrap();
        view.fold(Splice::new(0, array![], array!["first"]).into()).unwrap();
        view.apply_unfolded(Splice::new(1, array![], array!["d"]).into())
            .unwrap();
        consistent(&view);
        assert_eq!(view.remote(), &array!["B", "d", "c"]);

        view.unfold(0, 2).unwrap();
        assert_eq!(view.local(), view.remote());
    }
}
