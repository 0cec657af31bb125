// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! References that survive concurrent changes.
//!
//! A [`Path`] points at a descendant of a value, a [`Caret`] at a gap inside a collection, and a
//! [`Range`] at a span between two carets. Merging a reference with a change yields the
//! reference as seen after the change, or nothing if its target is gone.
use crate::{Change, ChangeError, Key, Keys, changes::sequence};
use std::fmt;

/// A path from a value to one of its descendants.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(Keys);

/// The outcome of merging a path with a change: the updated path, or `None` if the change
/// removed the target, and the part of the change that lands at or below the target.
pub type PathMerge = (Option<Path>, Option<Change>);

impl Path {
    pub fn new(keys: impl IntoIterator<Item = Key>) -> Self {
        Self(keys.into_iter().collect())
    }

    pub fn keys(&self) -> &[Key] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rewrites the path across `change`.
    ///
    /// ```rust
    /// use convergent::{Change, Splice, array, path, refs::Path};
    ///
    /// let p = Path::new(path![2, "name"]);
    /// let insert = Change::from(Splice::new(0, array![], array![1]));
    /// let (p, affected) = p.merge(&insert).unwrap();
    /// assert_eq!(p, Some(Path::new(path![3, "name"])));
    /// assert_eq!(affected, None);
    /// ```
    pub fn merge(&self, change: &Change) -> Result<PathMerge, ChangeError> {
        let (path, affected) = merge_keys(&self.0, change)?;
        Ok((path.map(Path), affected))
    }
}

impl From<Keys> for Path {
    fn from(value: Keys) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("/")?;
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

fn head_index(head: &Key) -> Result<usize, ChangeError> {
    head.as_index().ok_or_else(|| ChangeError::InvalidKey {
        key: head.clone(),
        value: "collection",
    })
}

fn with_head(head: usize, rest: &[Key]) -> Keys {
    std::iter::once(Key::Index(head))
        .chain(rest.iter().cloned())
        .collect()
}

fn merge_keys(path: &[Key], change: &Change) -> Result<(Option<Keys>, Option<Change>), ChangeError> {
    let unaffected = || Ok((Some(Keys::from(path)), None));
    let at_target = || Ok((Some(Keys::new()), Some(change.clone())));
    match change {
        Change::Replace(_) if path.is_empty() => at_target(),
        Change::Replace(_) => Ok((None, None)),
        Change::Splice(_) | Change::Move(_) if path.is_empty() => at_target(),
        Change::Splice(splice) => {
            let Some((head, rest)) = path.split_first() else {
                return at_target();
            };
            let index = head_index(head)?;
            let (before, after) = (splice.before.count()?, splice.after.count()?);
            if index < splice.offset {
                unaffected()
            } else if index < splice.offset + before {
                Ok((None, None))
            } else {
                Ok((Some(with_head(index + after - before, rest)), None))
            }
        }
        Change::Move(m) => {
            let Some((head, rest)) = path.split_first() else {
                return at_target();
            };
            let index = head_index(head)?;
            Ok((Some(with_head(m.map_index(index), rest)), None))
        }
        Change::PathChange(p) => {
            let common = p.path.len().min(path.len());
            if p.path[..common] != path[..common] {
                return unaffected();
            }
            if p.path.len() <= path.len() {
                let (rest, affected) = merge_keys(&path[common..], &p.change)?;
                let rest = rest.map(|rest| p.path.iter().cloned().chain(rest).collect());
                Ok((rest, affected))
            } else {
                let below = Change::path(p.path[common..].iter().cloned(), (*p.change).clone());
                Ok((Some(Keys::from(path)), Some(below)))
            }
        }
        Change::ChangeSet(set) => {
            let mut current = Keys::from(path);
            let mut affected = Vec::new();
            for change in set.iter() {
                match merge_keys(&current, change)? {
                    (Some(next), a) => {
                        current = next;
                        affected.extend(a);
                    }
                    (None, _) => return Ok((None, None)),
                }
            }
            Ok((Some(current), sequence(affected)))
        }
        Change::Custom(c) => match c.merge_path(path) {
            Some(merged) => Ok(merged),
            None if path.is_empty() => at_target(),
            None => unaffected(),
        },
    }
}

/// A position between two elements of the collection at `path`.
///
/// `is_left` picks the neighbour the caret sticks to when an edit happens exactly at its
/// position: with `is_left` set the caret stays after its left neighbour, otherwise it stays
/// before its right neighbour.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Caret {
    pub path: Path,
    pub index: usize,
    pub is_left: bool,
}

impl Caret {
    pub fn new(path: Path, index: usize, is_left: bool) -> Self {
        Self {
            path,
            index,
            is_left,
        }
    }

    /// Rewrites the caret across `change`. Returns `None` if the collection was replaced or
    /// removed.
    pub fn merge(&self, change: &Change) -> Result<(Option<Caret>, Option<Change>), ChangeError> {
        let (Some(path), affected) = self.path.merge(change)? else {
            return Ok((None, None));
        };
        let index = match &affected {
            Some(c) => map_caret(self.index, self.is_left, c)?,
            None => Some(self.index),
        };
        Ok((
            index.map(|index| Caret {
                path,
                index,
                is_left: self.is_left,
            }),
            affected,
        ))
    }
}

fn map_caret(index: usize, is_left: bool, change: &Change) -> Result<Option<usize>, ChangeError> {
    match change {
        Change::Replace(_) => Ok(None),
        Change::Splice(s) => {
            let (before, after) = (s.before.count()?, s.after.count()?);
            let end = s.offset + before;
            Ok(Some(if index < s.offset || (index == s.offset && is_left) {
                index
            } else if index < end || index == s.offset {
                if is_left { s.offset } else { s.offset + after }
            } else {
                index + after - before
            }))
        }
        Change::Move(m) => Ok(Some(m.map_gap(index, is_left))),
        Change::ChangeSet(set) => {
            let mut current = index;
            for change in set.iter() {
                match map_caret(current, is_left, change)? {
                    Some(next) => current = next,
                    None => return Ok(None),
                }
            }
            Ok(Some(current))
        }
        Change::PathChange(p) if p.path.is_empty() => map_caret(index, is_left, &p.change),
        Change::PathChange(_) | Change::Custom(_) => Ok(Some(index)),
    }
}

/// The span between two carets in the same collection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: Caret,
    pub end: Caret,
}

impl Range {
    pub fn new(start: Caret, end: Caret) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start.index == self.end.index
    }

    pub fn merge(&self, change: &Change) -> Result<(Option<Range>, Option<Change>), ChangeError> {
        let (Some(start), affected) = self.start.merge(change)? else {
            return Ok((None, None));
        };
        let (Some(mut end), _) = self.end.merge(change)? else {
            return Ok((None, None));
        };
        if !self.is_empty() && start.index == end.index {
            end.is_left = start.is_left;
        }
        Ok((Some(Range { start, end }), affected))
    }
}

/// Any reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ref {
    Path(Path),
    Caret(Caret),
    Range(Range),
    /// The target of the reference no longer exists.
    Invalid,
}

impl Ref {
    /// Rewrites the reference across `change`, returning it with the part of `change` that
    /// lands at or below it.
    pub fn merge(&self, change: &Change) -> Result<(Ref, Option<Change>), ChangeError> {
        Ok(match self {
            Ref::Path(p) => match p.merge(change)? {
                (Some(p), affected) => (Ref::Path(p), affected),
                (None, _) => (Ref::Invalid, None),
            },
            Ref::Caret(c) => match c.merge(change)? {
                (Some(c), affected) => (Ref::Caret(c), affected),
                (None, _) => (Ref::Invalid, None),
            },
            Ref::Range(r) => match r.merge(change)? {
                (Some(r), affected) => (Ref::Range(r), affected),
                (None, _) => (Ref::Invalid, None),
            },
            Ref::Invalid => (Ref::Invalid, None),
        })
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Ref::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Move, Replace, Splice, Value, array, changes::test_util::Concurrent, path};

    fn caret(index: usize, is_left: bool) -> Caret {
        Caret::new(Path::default(), index, is_left)
    }

    #[test]
    fn replace_invalidates_paths_below_it() {
        let p = Path::new(path![0, "a"]);
        let c = Change::path(path![0], Replace::new(1, 2));
        assert_eq!(p.merge(&c).unwrap(), (None, None));

        let c = Change::from(Replace::new(1, 2));
        assert_eq!(Path::default().merge(&c).unwrap(), (Some(Path::default()), Some(c)));
    }

    #[test]
    fn splices_shift_or_remove_the_head() {
        let p = Path::new(path![2]);
        let remove = Change::from(Splice::new(1, array![0, 0], array![]));
        assert_eq!(p.merge(&remove).unwrap(), (None, None));

        let before = Change::from(Splice::new(0, array![0, 0], array![1]));
        assert_eq!(p.merge(&before).unwrap().0, Some(Path::new(path![1])));

        let after = Change::from(Splice::new(3, array![], array![1]));
        assert_eq!(p.merge(&after).unwrap().0, Some(p.clone()));
    }

    #[test]
    fn moves_remap_the_head() {
        let p = Path::new(path![1, "x"]);
        let (p, _) = p.merge(&Move::new(1, 1, 2).into()).unwrap();
        assert_eq!(p, Some(Path::new(path![3, "x"])));
    }

    #[test]
    fn changes_below_are_affected() {
        let p = Path::new(path!["doc"]);
        let c = Change::path(path!["doc", 3], Replace::new(1, 2));
        assert_eq!(
            p.merge(&c).unwrap(),
            (Some(p.clone()), Some(Change::path(path![3], Replace::new(1, 2))))
        );

        let c = Change::path(path!["doc"], Splice::new(0, "", "x"));
        assert_eq!(
            p.merge(&c).unwrap(),
            (Some(p.clone()), Some(Splice::new(0, "", "x").into()))
        );

        let c = Change::path(path!["other"], Replace::new(1, 2));
        assert_eq!(p.merge(&c).unwrap(), (Some(p.clone()), None));
    }

    #[test]
    fn change_sets_thread_through_paths() {
        let p = Path::new(path!["list", 0]);
        let c = Change::set([
            Change::path(path!["list"], Splice::new(0, array![], array![1, 2])),
            Change::path(path!["list"], Move::new(0, 1, 2)),
        ]);
        assert_eq!(p.merge(&c).unwrap().0, Some(Path::new(path!["list", 1])));
    }

    #[test]
    fn caret_stickiness_at_inserts() {
        let insert = Change::from(Splice::new(2, "", "xy"));
        assert_eq!(caret(2, true).merge(&insert).unwrap().0, Some(caret(2, true)));
        assert_eq!(caret(2, false).merge(&insert).unwrap().0, Some(caret(4, false)));
        assert_eq!(caret(1, false).merge(&insert).unwrap().0, Some(caret(1, false)));
        assert_eq!(caret(3, true).merge(&insert).unwrap().0, Some(caret(5, true)));
    }

    #[test]
    fn caret_inside_a_removal_collapses() {
        let remove = Change::from(Splice::new(1, "bcd", "X"));
        assert_eq!(caret(2, true).merge(&remove).unwrap().0, Some(caret(1, true)));
        assert_eq!(caret(2, false).merge(&remove).unwrap().0, Some(caret(2, false)));
        assert_eq!(caret(4, true).merge(&remove).unwrap().0, Some(caret(2, true)));
        assert_eq!(caret(6, true).merge(&remove).unwrap().0, Some(caret(4, true)));
    }

    #[test]
    fn caret_follows_moves() {
        // "a|bc|de|f": move "bc" after "de".
        let m = Change::from(Move::new(1, 2, 2));
        assert_eq!(caret(3, true).merge(&m).unwrap().0, Some(caret(5, true)));
        assert_eq!(caret(3, false).merge(&m).unwrap().0, Some(caret(1, false)));
        assert_eq!(caret(2, true).merge(&m).unwrap().0, Some(caret(4, true)));
    }

    #[test]
    fn caret_in_nested_collection() {
        let c = Caret::new(Path::new(path!["text"]), 1, false);
        let edit = Change::path(path!["text"], Splice::new(0, "", "ab"));
        let (merged, affected) = c.merge(&edit).unwrap();
        assert_eq!(merged, Some(Caret::new(Path::new(path!["text"]), 3, false)));
        assert_eq!(affected, Some(Splice::new(0, "", "ab").into()));
    }

    #[test]
    fn collapsed_range_adopts_start_stickiness() {
        let r = Range::new(caret(1, false), caret(3, true));
        let remove = Change::from(Splice::new(1, "bc", ""));
        let (r, _) = r.merge(&remove).unwrap();
        let r = r.unwrap();
        assert!(r.is_empty());
        assert!(!r.end.is_left);
    }

    #[test]
    fn invalid_stays_invalid() {
        let c = Change::from(Replace::new(Value::Nil, 1));
        assert_eq!(Ref::Invalid.merge(&c).unwrap(), (Ref::Invalid, None));
        let r = Ref::Path(Path::new(path![0]));
        assert_eq!(r.merge(&c).unwrap(), (Ref::Invalid, None));
        let r = Ref::Caret(caret(0, true));
        assert_eq!(r.merge(&c).unwrap(), (Ref::Invalid, None));
    }

    /// The descendant of `value` at `path`, descending through arrays only.
    fn at(value: &Value, path: &Path) -> Option<Value> {
        let mut current = value;
        for key in path.keys() {
            match current {
                Value::Array(a) => current = a.get(key.as_index()?)?,
                _ => return None,
            }
        }
        Some(current.clone())
    }

    #[quickcheck]
    fn surviving_paths_point_at_their_element(c: Concurrent) -> bool {
        let Concurrent { base, left, .. } = c;
        let Value::Array(items) = &base else {
            return true;
        };
        let after = base.apply(&left).unwrap();
        (0..items.len()).all(|i| {
            let (merged, affected) = Path::new(path![i]).merge(&left).unwrap();
            match merged {
                Some(p) => at(&after, &p) == items[i].apply_opt(affected.as_ref()).ok(),
                None => true,
            }
        })
    }

    #[quickcheck]
    fn carets_stay_in_bounds_and_keep_their_neighbour(c: Concurrent) -> bool {
        let Concurrent { base, left, .. } = c;
        let Value::S8(text) = &base else {
            return true;
        };
        let old = text.as_str().as_bytes();
        let after = base.apply(&left).unwrap();
        let Value::S8(after) = &after else {
            return matches!(left, Change::Replace(_));
        };
        let new = after.as_str().as_bytes();
        // Where the sticky neighbour cannot have been removed, it is still next to the caret.
        let removed = match &left {
            Change::Splice(s) => s.offset..s.offset + s.before.count().unwrap(),
            Change::Move(_) => 0..0,
            _ => return carets_in_bounds(old.len(), new.len(), &left),
        };
        (0..=old.len()).all(|index| {
            [true, false].into_iter().all(|is_left| {
                let Some(moved) = caret(index, is_left).merge(&left).unwrap().0 else {
                    return false;
                };
                let (neighbour, moved_neighbour) = if is_left {
                    (index.checked_sub(1), moved.index.checked_sub(1))
                } else {
                    ((index < old.len()).then_some(index), Some(moved.index))
                };
                moved.index <= new.len()
                    && match neighbour {
                        Some(k) if !removed.contains(&k) => {
                            moved_neighbour.and_then(|m| new.get(m)) == Some(&old[k])
                        }
                        _ => true,
                    }
            })
        })
    }

    fn carets_in_bounds(old_len: usize, new_len: usize, change: &Change) -> bool {
        (0..=old_len).all(|index| {
            [true, false].into_iter().all(|is_left| {
                match caret(index, is_left).merge(change).unwrap().0 {
                    Some(c) => c.index <= new_len,
                    None => true,
                }
            })
        })
    }
}
