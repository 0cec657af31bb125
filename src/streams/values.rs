// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{Log, Stream};
use crate::{Change, ChangeError, Counter, Move, Replace, S8, S16, Scalar, Splice, Value};
use std::fmt;
use tracing::warn;

/// A Rust type that a [`ValueStream`] can materialize.
pub trait StreamValue: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Used in error messages.
    const TYPE_NAME: &'static str;

    /// Extracts the typed value, or `None` if `value` is of another kind.
    fn from_value(value: &Value) -> Option<Self>;

    fn to_value(&self) -> Value;
}

impl StreamValue for i64 {
    const TYPE_NAME: &'static str = "Int";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Atomic(scalar) => scalar.as_i64(),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        Value::Atomic(Scalar::I64(*self))
    }
}

impl StreamValue for bool {
    const TYPE_NAME: &'static str = "Bool";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Atomic(scalar) => scalar.as_bool(),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        Value::Atomic(Scalar::Bool(*self))
    }
}

impl StreamValue for S8 {
    const TYPE_NAME: &'static str = "S8";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::S8(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        Value::S8(self.clone())
    }
}

impl StreamValue for S16 {
    const TYPE_NAME: &'static str = "S16";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::S16(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        Value::S16(self.clone())
    }
}

impl StreamValue for Counter {
    const TYPE_NAME: &'static str = "Counter";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Counter(c) => Some(*c),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        Value::Counter(*self)
    }
}

/// A stream paired with the value it materializes.
///
/// Mutators append to the underlying stream and return the stream positioned after the change,
/// holding the updated value. Walking with [`ValueStream::next`] applies every change that
/// arrives; a change that turns the value into something else ends the stream.
///
/// ```rust
/// use convergent::{S8, streams::{Log, S8Stream}};
///
/// let root = S8Stream::new(S8::from("hello"), Log::new());
/// let edited = root.splice(0, 1, "J").unwrap();
/// assert_eq!(edited.value().as_str(), "Jello");
///
/// root.splice(5, 0, "!").unwrap();
/// assert_eq!(edited.latest().value().as_str(), "Jello!");
/// ```
#[derive(Clone, Debug)]
pub struct ValueStream<T, S = Log> {
    value: T,
    stream: S,
}

pub type IntStream<S = Log> = ValueStream<i64, S>;
pub type BoolStream<S = Log> = ValueStream<bool, S>;
pub type S8Stream<S = Log> = ValueStream<S8, S>;
pub type S16Stream<S = Log> = ValueStream<S16, S>;
pub type CounterStream<S = Log> = ValueStream<Counter, S>;

impl<T: StreamValue, S: Stream> ValueStream<T, S> {
    pub fn new(value: T, stream: S) -> Self {
        Self { value, stream }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    fn applied(&self, change: &Change) -> Result<T, ChangeError> {
        let value = self.value.to_value().apply(change)?;
        T::from_value(&value).ok_or(ChangeError::WrongType {
            expected: T::TYPE_NAME,
            found: value.type_name(),
        })
    }

    /// Appends an arbitrary change, which must keep the value's type.
    pub fn append(&self, change: Change) -> Result<Self, ChangeError> {
        let value = self.applied(&change)?;
        Ok(Self {
            value,
            stream: self.stream.append(change)?,
        })
    }

    /// Replaces the value.
    pub fn update(&self, value: T) -> Result<Self, ChangeError> {
        self.append(Replace::new(self.value.to_value(), value.to_value()).into())
    }

    pub fn next(&self) -> Option<(Self, Change)> {
        let (stream, change) = self.stream.next()?;
        match self.applied(&change) {
            Ok(value) => Some((Self { value, stream }, change)),
            Err(error) => {
                warn!(%error, ?change, "value stream ended");
                None
            }
        }
    }

    /// Follows the stream to its tail.
    pub fn latest(&self) -> Self {
        let mut current = self.clone();
        while let Some((next, _)) = current.next() {
            current = next;
        }
        current
    }
}

impl<S: Stream> ValueStream<S8, S> {
    /// Replaces `count` bytes at `offset` with `insert`.
    pub fn splice(&self, offset: usize, count: usize, insert: &str) -> Result<Self, ChangeError> {
        let before = self.value.to_value().slice(offset, count)?;
        self.append(Splice::new(offset, before, insert).into())
    }

    pub fn mv(&self, offset: usize, count: usize, distance: isize) -> Result<Self, ChangeError> {
        self.append(Move::new(offset, count, distance).into())
    }
}

impl<S: Stream> ValueStream<S16, S> {
    /// Replaces `count` code units at `offset` with `insert`.
    pub fn splice(&self, offset: usize, count: usize, insert: &str) -> Result<Self, ChangeError> {
        let before = self.value.to_value().slice(offset, count)?;
        self.append(Splice::new(offset, before, S16::from(insert)).into())
    }

    pub fn mv(&self, offset: usize, count: usize, distance: isize) -> Result<Self, ChangeError> {
        self.append(Move::new(offset, count, distance).into())
    }
}

impl<S: Stream> ValueStream<Counter, S> {
    pub fn increment(&self, by: i32) -> Result<Self, ChangeError> {
        self.append(Counter::increment(by))
    }
}
