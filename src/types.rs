// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! The value model.
//!
//! A [`Value`] is an immutable tree. Applying a [`Change`] never mutates the value it is applied
//! to; it returns a new one. Collections ([`S8`], [`S16`], [`Array`] and [`Counter`]) are
//! addressed by offset and can be spliced and moved. Containers ([`Array`] and [`Map`]) are
//! addressed by [`Key`] and accept path changes into their children.
//!
//! Types outside of this module plug into the same algebra through [`CustomValue`], which is how
//! the [CRDTs](crate::crdts) are built.
use crate::{ChangeError, Change, PathChange, crdts::Rank};
use smallvec::SmallVec;
use std::{any::Any, fmt, sync::Arc};

mod array;
pub use array::Array;
mod counter;
pub use counter::Counter;
pub mod generic;
mod map;
pub use map::Map;
mod scalar;
pub use scalar::Scalar;
mod string;
pub use string::{S8, S16};

/// Addresses a child of a container value.
///
/// Arrays are addressed by [`Key::Index`], maps accept any key, and the CRDT dictionaries are
/// keyed by whatever their owner chooses (the [`Seq`](crate::crdts::Seq) uses [`Key::Rank`]).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum Key {
    Index(usize),
    Name(String),
    Rank(Rank),
}

/// A sequence of keys descending from a value into one of its (grand-)children.
pub type Keys = SmallVec<[Key; 4]>;

impl Key {
    /// Returns the index if this key is a [`Key::Index`].
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => Some(*i),
            Key::Name(_) | Key::Rank(_) => None,
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{i}"),
            Key::Name(name) => name.fmt(f),
            Key::Rank(rank) => rank.fmt(f),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{i}"),
            Key::Name(name) => f.write_str(name),
            Key::Rank(rank) => write!(f, "{rank}"),
        }
    }
}

impl From<usize> for Key {
    fn from(value: usize) -> Self {
        Key::Index(value)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Name(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Name(value)
    }
}

impl From<Rank> for Key {
    fn from(value: Rank) -> Self {
        Key::Rank(value)
    }
}

/// An ordered collection that can be sliced and spliced by offset.
///
/// Offsets and counts are in the collection's own unit: bytes for [`S8`], UTF-16 code units for
/// [`S16`], and elements for [`Array`].
pub trait Collection {
    /// The number of units in the collection.
    fn count(&self) -> usize;

    /// Returns the sub-collection `[offset, offset + count)` as a value of the same kind.
    fn slice(&self, offset: usize, count: usize) -> Result<Value, ChangeError>;

    /// Replaces `[offset, offset + count)` with the contents of `insert`, which must be a
    /// collection of the same kind.
    fn splice(&self, offset: usize, count: usize, insert: &Value) -> Result<Value, ChangeError>;
}

/// A user-defined value that participates in the change algebra.
///
/// Implementations receive every change that is not universal: `Replace`, `ChangeSet` and
/// custom changes are handled by [`Value::apply`] itself, so [`CustomValue::apply`] only sees
/// splices, moves and non-empty path changes. Most implementations forward those to
/// [`generic::apply`].
pub trait CustomValue: fmt::Debug + Send + Sync + 'static {
    /// A short name used in error messages.
    fn type_name(&self) -> &'static str;

    fn apply(&self, change: &Change) -> Result<Value, ChangeError>;

    /// The collection view of this value, if it is ordered and can be spliced.
    fn collection(&self) -> Option<&dyn Collection> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    /// Compares with another custom value, which is usually done with [`custom_eq`].
    fn eq_value(&self, other: &dyn CustomValue) -> bool;
}

impl PartialEq for dyn CustomValue {
    fn eq(&self, other: &Self) -> bool {
        self.eq_value(other)
    }
}

/// Implements [`CustomValue::eq_value`] for types that are [`PartialEq`].
pub fn custom_eq<T>(this: &T, other: &dyn CustomValue) -> bool
where
    T: CustomValue + PartialEq,
{
    other.as_any().downcast_ref::<T>() == Some(this)
}

/// An immutable value.
#[derive(Clone, Default, PartialEq)]
pub enum Value {
    /// The absent value. Deleting a map key sets it to `Nil`.
    #[default]
    Nil,
    /// An opaque payload that can only be replaced as a whole.
    Atomic(Scalar),
    S8(S8),
    S16(S16),
    Array(Array),
    Map(Map),
    Counter(Counter),
    Custom(Arc<dyn CustomValue>),
}

impl Value {
    /// A short name for the kind of value, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "Nil",
            Value::Atomic(_) => "Atomic",
            Value::S8(_) => "S8",
            Value::S16(_) => "S16",
            Value::Array(_) => "Array",
            Value::Map(_) => "Map",
            Value::Counter(_) => "Counter",
            Value::Custom(v) => v.type_name(),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Wraps a custom value.
    pub fn custom(value: impl CustomValue) -> Value {
        Value::Custom(Arc::new(value))
    }

    /// Downcasts a [`Value::Custom`] to its concrete type.
    pub fn as_custom<T: CustomValue>(&self) -> Option<&T> {
        match self {
            Value::Custom(v) => v.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// The collection view of this value, if any.
    pub fn collection(&self) -> Option<&dyn Collection> {
        match self {
            Value::S8(s) => Some(s),
            Value::S16(s) => Some(s),
            Value::Array(a) => Some(a),
            Value::Counter(c) => Some(c),
            Value::Custom(v) => v.collection(),
            Value::Nil | Value::Atomic(_) | Value::Map(_) => None,
        }
    }

    /// The number of units in a collection value.
    pub fn count(&self) -> Result<usize, ChangeError> {
        self.collection()
            .map(|c| c.count())
            .ok_or(ChangeError::UnsupportedChange {
                change: "Splice",
                value: self.type_name(),
            })
    }

    /// Slices a collection value.
    pub fn slice(&self, offset: usize, count: usize) -> Result<Value, ChangeError> {
        self.collection()
            .ok_or(ChangeError::UnsupportedChange {
                change: "Splice",
                value: self.type_name(),
            })?
            .slice(offset, count)
    }

    /// Splices a collection value.
    pub fn splice(&self, offset: usize, count: usize, insert: &Value) -> Result<Value, ChangeError> {
        self.collection()
            .ok_or(ChangeError::UnsupportedChange {
                change: "Splice",
                value: self.type_name(),
            })?
            .splice(offset, count, insert)
    }

    /// Appends another collection of the same kind.
    pub fn concat(&self, other: &Value) -> Result<Value, ChangeError> {
        let end = self.count()?;
        self.splice(end, 0, other)
    }

    /// Applies a change, returning the new value.
    pub fn apply(&self, change: &Change) -> Result<Value, ChangeError> {
        match change {
            Change::Replace(replace) => Ok(replace.after.clone()),
            Change::ChangeSet(set) => set.iter().try_fold(self.clone(), |v, c| v.apply(c)),
            Change::Custom(custom) => custom.apply_to(self),
            Change::PathChange(p) if p.path.is_empty() => self.apply(&p.change),
            Change::Splice(_) | Change::Move(_) | Change::PathChange(_) => match self {
                Value::S8(s) => generic::apply(s, change),
                Value::S16(s) => generic::apply(s, change),
                Value::Array(a) => generic::apply(a, change),
                Value::Map(m) => generic::apply(m, change),
                Value::Counter(c) => c.apply(change),
                Value::Custom(v) => v.apply(change),
                Value::Nil | Value::Atomic(_) => Err(ChangeError::UnsupportedChange {
                    change: change.kind(),
                    value: self.type_name(),
                }),
            },
        }
    }

    /// Applies an optional change. `None` leaves the value untouched.
    pub fn apply_opt(&self, change: Option<&Change>) -> Result<Value, ChangeError> {
        match change {
            Some(change) => self.apply(change),
            None => Ok(self.clone()),
        }
    }

    /// Applies a change to the descendant at `path`.
    pub fn apply_at(&self, path: &[Key], change: &Change) -> Result<Value, ChangeError> {
        if path.is_empty() {
            self.apply(change)
        } else {
            self.apply(&Change::PathChange(PathChange::new(
                path.iter().cloned(),
                change.clone(),
            )))
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Atomic(inner) => inner.fmt(f),
            Value::S8(inner) => inner.fmt(f),
            Value::S16(inner) => inner.fmt(f),
            Value::Array(inner) => inner.fmt(f),
            Value::Map(inner) => inner.fmt(f),
            Value::Counter(inner) => inner.fmt(f),
            Value::Custom(inner) => inner.fmt(f),
        }
    }
}

impl From<Scalar> for Value {
    fn from(value: Scalar) -> Self {
        Value::Atomic(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::S8(S8::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::S8(S8::from(value))
    }
}

impl From<S8> for Value {
    fn from(value: S8) -> Self {
        Value::S8(value)
    }
}

impl From<S16> for Value {
    fn from(value: S16) -> Self {
        Value::S16(value)
    }
}

impl From<Array> for Value {
    fn from(value: Array) -> Self {
        Value::Array(value)
    }
}

impl From<Map> for Value {
    fn from(value: Map) -> Self {
        Value::Map(value)
    }
}

impl From<Counter> for Value {
    fn from(value: Counter) -> Self {
        Value::Counter(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(Array::from(value))
    }
}

macro_rules! impl_from_atomic {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(value: $t) -> Self {
                    Value::Atomic(Scalar::from(value))
                }
            }
        )*
    };
}

impl_from_atomic!(f64, u64, i64, i32, bool);

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Nil, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Move, Replace, Splice, array, path};

    #[test]
    fn replace_applies_to_every_kind() {
        let values = [
            Value::Nil,
            Value::from(3),
            Value::from("x"),
            Value::Counter(Counter::new(5)),
            array![1, 2],
        ];
        for v in values {
            let c = Change::from(Replace::new(v.clone(), "after"));
            assert_eq!(v.apply(&c).unwrap(), Value::from("after"));
        }
    }

    #[test]
    fn atomic_values_only_accept_replace() {
        let v = Value::from(true);
        let err = v.apply(&Splice::new(0, "", "x").into()).unwrap_err();
        assert_eq!(
            err,
            ChangeError::UnsupportedChange {
                change: "Splice",
                value: "Atomic"
            }
        );
    }

    #[test]
    fn path_change_descends() {
        let v = array!["ab", array![1, 2]];
        let c = Change::path(path![1, 0], Replace::new(1, 10));
        assert_eq!(v.apply(&c).unwrap(), array!["ab", array![10, 2]]);

        let c = Change::path(path![0], Splice::new(1, "", "c"));
        assert_eq!(v.apply(&c).unwrap(), array!["acb", array![1, 2]]);
    }

    #[test]
    fn empty_path_change_is_transparent() {
        let v = Value::from("abc");
        let c = Change::path(path![], Move::new(0, 1, 2));
        assert_eq!(v.apply(&c).unwrap(), Value::from("bca"));
    }

    #[test]
    fn apply_at_matches_path_change() {
        let v = array![array!["x"]];
        let change = Change::from(Replace::new("x", "y"));
        assert_eq!(
            v.apply_at(&path![0, 0], &change).unwrap(),
            v.apply(&Change::path(path![0, 0], change)).unwrap()
        );
    }

    #[test]
    fn concat_appends() {
        let v = Value::from("ab").concat(&Value::from("cd")).unwrap();
        assert_eq!(v, Value::from("abcd"));
        assert!(Value::from(1).concat(&Value::from(2)).is_err());
    }

    #[test]
    fn key_display() {
        assert_eq!(Key::from(3).to_string(), "3");
        assert_eq!(Key::from("name").to_string(), "name");
        assert_eq!(format!("{:?}", Key::from("name")), "\"name\"");
    }
}
