// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Applying structural changes to any keyed or ordered value.
//!
//! A type that implements [`Generic`] only needs to describe how to read and write a child by
//! key and, if it is ordered, how to slice and splice itself. [`apply`] then takes care of
//! descending path changes, splices and moves.
use super::{Collection, Key, Value, string::check_range};
use crate::{Change, ChangeError, Move};

/// Keyed and ordered access to a value.
///
/// Every method has a default that rejects the operation, so a type implements only what it
/// supports.
pub trait Generic {
    /// A short name used in error messages.
    fn type_name(&self) -> &'static str;

    /// Reads the child at `key`.
    fn get(&self, key: &Key) -> Result<Value, ChangeError> {
        let _ = key;
        Err(ChangeError::UnsupportedChange {
            change: "PathChange",
            value: self.type_name(),
        })
    }

    /// Returns a copy of `self` with the child at `key` replaced by `value`.
    fn set(&self, key: &Key, value: Value) -> Result<Value, ChangeError> {
        let _ = (key, value);
        Err(ChangeError::UnsupportedChange {
            change: "PathChange",
            value: self.type_name(),
        })
    }

    fn collection(&self) -> Option<&dyn Collection> {
        None
    }
}

/// Applies a change to a [`Generic`] value.
///
/// Handles `Replace`, non-empty `PathChange`, `Splice` and `Move`. Change sets and custom changes
/// are resolved by [`Value::apply`] before a type ever sees them, so they are rejected here.
pub fn apply<G>(g: &G, change: &Change) -> Result<Value, ChangeError>
where
    G: Generic + ?Sized,
{
    let unsupported = || ChangeError::UnsupportedChange {
        change: change.kind(),
        value: g.type_name(),
    };
    match change {
        Change::Replace(replace) => Ok(replace.after.clone()),
        Change::PathChange(p) => match p.path.split_first() {
            None => Err(unsupported()),
            Some((key, rest)) => {
                let child = g.get(key)?.apply_at(rest, &p.change)?;
                g.set(key, child)
            }
        },
        Change::Splice(splice) => {
            let collection = g.collection().ok_or_else(unsupported)?;
            let count = splice.before.count()?;
            collection.splice(splice.offset, count, &splice.after)
        }
        Change::Move(m) => {
            let collection = g.collection().ok_or_else(unsupported)?;
            apply_move(collection, m)
        }
        Change::ChangeSet(_) | Change::Custom(_) => Err(unsupported()),
    }
}

/// Cuts `[offset, offset + count)` and pastes it `distance` units away.
pub fn apply_move(collection: &dyn Collection, m: &Move) -> Result<Value, ChangeError> {
    let len = collection.count();
    if m.distance < 0 && m.distance.unsigned_abs() > m.offset {
        return Err(ChangeError::OutOfBounds {
            offset: m.offset,
            count: m.count,
            len,
        });
    }
    let m = m.normalized();
    let distance = m.distance.unsigned_abs();
    check_range(m.offset, m.count + distance, len)?;
    if m.is_noop() {
        return collection.slice(0, len);
    }
    let moved = collection.slice(m.offset, m.count)?;
    let rest = collection.splice(m.offset, m.count, &moved.slice(0, 0)?)?;
    rest.splice(m.offset + distance, 0, &moved)
}
