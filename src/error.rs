// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use crate::Key;

/// Error returned when a change does not fit the value it is applied or merged against.
///
/// All of these are structural mismatches: they are fatal for the single `apply` or `merge` in
/// progress, and never leave a stream partially mutated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChangeError {
    /// The change kind is not accepted by the value kind (eg, a `Move` on a map).
    #[error("{change} cannot be applied to {value}")]
    UnsupportedChange {
        change: &'static str,
        value: &'static str,
    },

    /// A collection range reaches past the end of the collection.
    #[error("range {offset}..{offset}+{count} is out of bounds for length {len}")]
    OutOfBounds {
        offset: usize,
        count: usize,
        len: usize,
    },

    /// A byte offset into an [`S8`](crate::S8) splits a UTF-8 encoded character.
    #[error("byte offset {0} is not on a character boundary")]
    NotCharBoundary(usize),

    /// A collection was spliced with a collection of a different kind.
    #[error("expected a {expected} collection, found {found}")]
    MismatchedCollection {
        expected: &'static str,
        found: &'static str,
    },

    /// The key kind cannot address into the value (eg, a name into an array).
    #[error("key {key:?} cannot address into {value}")]
    InvalidKey { key: Key, value: &'static str },

    /// A change applied to a typed value produced a value of another type.
    #[error("expected a value of type {expected}, found {found}")]
    WrongType {
        expected: &'static str,
        found: &'static str,
    },

    /// A CRDT update was requested for an entry without a visible value.
    #[error("the entry has no effective value to update")]
    NoEffectiveValue,

    #[error(transparent)]
    OrdKey(#[from] OrdKeyError),
}

/// Error returned when parsing an encoded [`OrdKey`](crate::crdts::OrdKey).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrdKeyError {
    #[error("ordinal {0:?} is missing the ',' separator")]
    MissingSeparator(String),

    #[error("ordinal {0:?} has an invalid denominator exponent")]
    InvalidExponent(String),

    #[error("ordinal {0:?} has an invalid base62 numerator")]
    InvalidNumerator(String),
}
