// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # Convergent replicated types
//!
//! The types in this module are [custom values](crate::CustomValue) whose changes never conflict,
//! so every pair of concurrent changes merges into the same state regardless of order.
//!
//! - **[`Rank`]**: a globally unique, totally ordered identifier. Every write is tagged with one.
//!
//! - **[`OrdKey`]**: a dense fractional key. There is always another key between two distinct
//!   keys, which is what lets [`Seq`] insert anywhere without renumbering.
//!
//! - **[`Container`]**: one slot holding every value written to it. The value with the highest
//!   rank that has not been undone is visible. Undos and deletes are counters, so they commute.
//!
//! - **[`Dict`]**: a map from keys to containers.
//!
//! - **[`Seq`]**: an ordered list made of two dicts keyed by rank, one holding the items and one
//!   holding their ord keys.
//!
//! Undo is expressed by reverting the change that a mutation returned. Reverting a write to a
//! [`Dict`] raises the undo count of its rank instead of restoring an old value, so an undo that
//! races with a newer write never clobbers it.

mod container;
pub use container::{Container, ContainerChange};
mod dict;
pub use dict::Dict;
mod ord;
pub use ord::OrdKey;
mod rank;
pub use rank::Rank;
mod seq;
pub use seq::Seq;
