// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # Convergent: Values, Changes, and Streams that Converge
//!
//! This crate provides a collaborative-editing substrate: an algebra of typed [`Value`]s and
//! composable [`Change`]s that can be concurrently produced, transformed against each other, and
//! replayed to a convergent state.
//!
//! The building blocks, bottom-up, are:
//!
//! - [`types`]: the value model. Strings indexed by byte ([`S8`]) or by UTF-16 code unit
//!   ([`S16`]), arrays, maps, counters, opaque atomic payloads, and user types that plug in
//!   through the [`CustomValue`] capability.
//! - [`changes`]: the change algebra. [`Replace`], [`Splice`], [`Move`], [`PathChange`] and
//!   [`ChangeSet`], plus the [`CustomChange`] capability. Every change can be applied, reverted
//!   and merged against a concurrent change (operational transform).
//! - [`refs`]: paths, carets and ranges that survive arbitrary concurrent changes.
//! - [`crdts`]: a dictionary, a sequence and an undo-aware container built on unique
//!   [`Rank`](crdts::Rank)s and densely ordered fractional [`OrdKey`](crdts::OrdKey)s.
//! - [`streams`]: an immutable, append-only log of changes that merges concurrent appends
//!   automatically, with branches, substreams, schedulers, and typed value streams.
//! - [`diff`] and [`fold`]: computing changes between two values and holding back local-only
//!   changes from an upstream.
//!
//! ## The OT diamond
//!
//! Every pair of changes `l` and `r` produced against the same value can be merged. Merging
//! returns `(r', l')` such that applying `l` then `r'` yields the same value as applying `r`
//! then `l'`:
//!
//! ```rust
//! use convergent::{Change, Splice, Value};
//!
//! let base = Value::from("Hello World");
//! let alice = Change::from(Splice::new(0, "", "OK "));
//! let bob = Change::from(Splice::new(6, "W", "w"));
//!
//! let (bob_after_alice, alice_after_bob) = alice.merge(&bob).unwrap();
//!
//! let left = base.apply(&alice).unwrap().apply_opt(bob_after_alice.as_ref()).unwrap();
//! let right = base.apply(&bob).unwrap().apply_opt(alice_after_bob.as_ref()).unwrap();
//! assert_eq!(left, right);
//! assert_eq!(left, Value::from("OK Hello world"));
//! ```
//!
//! ## Streams
//!
//! A [`Log`](streams::Log) is a node in a forward-linked list of changes. Appending to an older
//! node transforms the new change past everything appended since, so every holder of a node
//! observes the same converged tail:
//!
//! ```rust
//! use convergent::{Change, Splice, Value, streams::{self, Stream}};
//!
//! let root = streams::Log::new();
//! let a = root.append(Splice::new(0, "", "a").into()).unwrap();
//! let b = root.append(Splice::new(0, "", "b").into()).unwrap();
//!
//! let base = Value::from("");
//! let via_a = base.apply(&Splice::new(0, "", "a").into()).unwrap();
//! let (_, rest) = streams::latest(&a);
//! assert_eq!(via_a.apply_opt(rest.as_ref()).unwrap(), Value::from("ab"));
//! # let _ = b;
//! ```
//!
//! ## Error handling
//!
//! Applying or merging a change whose shape does not fit its target fails with a
//! [`ChangeError`]; nothing is silently ignored. References whose target disappears become
//! [`Ref::Invalid`](refs::Ref::Invalid) rather than erroring, and typed streams that observe a
//! change of the wrong type simply stop producing successors.
//!
//! ## Features
//!
//! - `json`: Enables exporting values to `serde_json::Value`. This feature is enabled by default.
//! - `serde`: Provides `serde` support for ranks, ordinals, keys and atomic payloads.
//! - `arbitrary`: Implements `quickcheck::Arbitrary` for values and concurrent changes, useful
//!   for property-based testing.
//! - `ulid`: Enables atomic values to hold ulids. This feature is enabled by default.
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

use ahash::RandomState;
use std::{
    hash::BuildHasher,
    sync::atomic::{AtomicBool, Ordering},
};

// Use a constant seed for hashing to make map iteration order reproducible in tests.
pub(crate) const DETERMINISTIC_HASHER: RandomState = RandomState::with_seeds(48, 1516, 23, 42);

pub mod changes;
pub use changes::{Change, ChangeSet, CustomChange, Move, PathChange, Replace, Splice};
pub mod crdts;
pub mod diff;
mod error;
pub use error::{ChangeError, OrdKeyError};
pub mod fold;
#[cfg(feature = "json")]
mod json;
/// Macros for building paths and values.
pub mod macros;
pub mod refs;
pub mod streams;
pub mod types;
pub use types::{
    Array, Collection, Counter, CustomValue, Key, Keys, Map, S8, S16, Scalar, Value,
};

static ENABLE_DETERMINISM: AtomicBool = AtomicBool::new(false);

/// Makes all data structures behave deterministically.
///
/// Hash seeds become constant and freshly allocated [`Rank`](crdts::Rank)s come from a
/// process-wide counter instead of the clock and the random number generator. This should only
/// be enabled for testing, since ranks produced by different processes will then collide.
#[doc(hidden)]
pub fn enable_determinism() {
    ENABLE_DETERMINISM.store(true, Ordering::Release);
}

/// Checks if determinism is enabled.
///
/// Should be used internally and for testing.
#[doc(hidden)]
pub fn determinism_enabled() -> bool {
    ENABLE_DETERMINISM.load(Ordering::Acquire)
}

/// Create a random state for a hashmap.
/// If `enable_determinism` has been used, this will return a deterministic
/// decidedly non-random RandomState, useful in tests.
#[inline]
fn make_random_state() -> RandomState {
    if determinism_enabled() {
        DETERMINISTIC_HASHER
    } else {
        RandomState::new()
    }
}

pub(crate) fn create_map<K, V>() -> std::collections::HashMap<K, V, MapRandomState> {
    std::collections::HashMap::with_hasher(MapRandomState::default())
}

pub(crate) fn create_map_with_capacity<K, V>(
    capacity: usize,
) -> std::collections::HashMap<K, V, MapRandomState> {
    std::collections::HashMap::with_capacity_and_hasher(capacity, MapRandomState::default())
}

/// This is a small wrapper around the ahash RandomState.
/// This allows us to easily switch to a non-random RandomState for use in tests.
#[derive(Clone)]
pub struct MapRandomState {
    inner: RandomState,
}

// Falls back on the regular ahash::RandomState except when 'enable_determinism' has been
// called, in which case a static only-for-test RandomState is used.
impl Default for MapRandomState {
    #[inline]
    fn default() -> Self {
        Self {
            inner: make_random_state(),
        }
    }
}

impl BuildHasher for MapRandomState {
    type Hasher = <RandomState as BuildHasher>::Hasher;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        self.inner.build_hasher()
    }
}

#[cfg(test)]
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
