// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{Collection, Value};
use crate::{Change, ChangeError, Splice};
use std::fmt;

/// A 32-bit counter.
///
/// A counter behaves as a zero-width collection: its only valid splice is at offset zero, and
/// splicing `before` out for `after` adds `after - before` to the count. Two increments are
/// therefore concurrent inserts at the same point, which commute.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Counter(i32);

impl Counter {
    pub fn new(value: i32) -> Self {
        Self(value)
    }

    pub fn get(&self) -> i32 {
        self.0
    }

    /// The change that adds `by` to a counter.
    pub fn increment(by: i32) -> Change {
        Change::Splice(Splice::new(0, Counter(0), Counter(by)))
    }

    pub(super) fn apply(&self, change: &Change) -> Result<Value, ChangeError> {
        match change {
            Change::Splice(splice) => {
                if splice.offset != 0 {
                    return Err(ChangeError::OutOfBounds {
                        offset: splice.offset,
                        count: 0,
                        len: 0,
                    });
                }
                let before = as_counter(&splice.before)?;
                let after = as_counter(&splice.after)?;
                Ok(Value::Counter(Counter(
                    self.0.wrapping_add(after.wrapping_sub(before)),
                )))
            }
            Change::Move(m) if m.offset == 0 && m.is_noop() => Ok(Value::Counter(*self)),
            Change::Move(m) => Err(ChangeError::OutOfBounds {
                offset: m.offset,
                count: m.count,
                len: 0,
            }),
            _ => Err(ChangeError::UnsupportedChange {
                change: change.kind(),
                value: "Counter",
            }),
        }
    }
}

fn as_counter(value: &Value) -> Result<i32, ChangeError> {
    match value {
        Value::Counter(c) => Ok(c.0),
        other => Err(ChangeError::MismatchedCollection {
            expected: "Counter",
            found: other.type_name(),
        }),
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<i32> for Counter {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl Collection for Counter {
    fn count(&self) -> usize {
        0
    }

    fn slice(&self, offset: usize, count: usize) -> Result<Value, ChangeError> {
        if offset == 0 && count == 0 {
            Ok(Value::Counter(Counter(0)))
        } else {
            Err(ChangeError::OutOfBounds {
                offset,
                count,
                len: 0,
            })
        }
    }

    fn splice(&self, offset: usize, count: usize, insert: &Value) -> Result<Value, ChangeError> {
        if offset != 0 || count != 0 {
            return Err(ChangeError::OutOfBounds {
                offset,
                count,
                len: 0,
            });
        }
        Ok(Value::Counter(Counter(self.0.wrapping_add(as_counter(insert)?))))
    }
}
