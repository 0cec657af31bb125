// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Computing the change between two values.
//!
//! ```rust
//! use convergent::{Value, diff::diff};
//!
//! let old = Value::from("Hello World");
//! let new = Value::from("OK Hello world");
//! let change = diff(&old, &new).unwrap();
//! assert_eq!(old.apply(&change).unwrap(), new);
//! ```
use crate::{Change, Key, Map, Replace, S16, Splice, Value, changes::sequence};
use dissimilar::Chunk;
use std::collections::BTreeSet;

/// Produces a change that turns `old` into `new`.
///
/// `differ` is the differ to use for children. Implementations that only handle some kinds of
/// values delegate the rest to [`StdDiffer`], passing themselves along so they still see every
/// nested value.
pub trait Differ {
    fn diff(&self, differ: &dyn Differ, old: &Value, new: &Value) -> Option<Change>;
}

/// The default differ.
///
/// Strings are diffed character by character into splices. Arrays of equal length and maps are
/// diffed child by child. Everything else is replaced wholesale.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdDiffer;

/// Diffs two values with [`StdDiffer`]. Returns `None` if they are equal.
pub fn diff(old: &Value, new: &Value) -> Option<Change> {
    StdDiffer.diff(&StdDiffer, old, new)
}

impl Differ for StdDiffer {
    fn diff(&self, differ: &dyn Differ, old: &Value, new: &Value) -> Option<Change> {
        if old == new {
            return None;
        }
        let replace = || Some(Change::from(Replace::new(old.clone(), new.clone())));
        match (old, new) {
            (Value::S8(a), Value::S8(b)) => {
                text_splices(a.as_str(), b.as_str(), str::len, |s| Value::from(s))
            }
            (Value::S16(a), Value::S16(b)) => {
                match (a.to_string_checked(), b.to_string_checked()) {
                    (Some(a), Some(b)) => text_splices(
                        &a,
                        &b,
                        |s| s.encode_utf16().count(),
                        |s| Value::S16(S16::from(s)),
                    ),
                    _ => replace(),
                }
            }
            (Value::Array(a), Value::Array(b)) if a.len() == b.len() => sequence(
                a.iter()
                    .zip(b.iter())
                    .enumerate()
                    .filter_map(|(i, (a, b))| {
                        let change = differ.diff(differ, a, b)?;
                        Some(Change::path([Key::Index(i)], change))
                    })
                    .collect(),
            ),
            (Value::Map(a), Value::Map(b)) => map_changes(differ, a, b),
            _ => replace(),
        }
    }
}

fn map_changes(differ: &dyn Differ, a: &Map, b: &Map) -> Option<Change> {
    let keys: BTreeSet<&Key> = a
        .entries()
        .into_iter()
        .chain(b.entries())
        .map(|(key, _)| key)
        .collect();
    let nil = Value::Nil;
    sequence(
        keys.into_iter()
            .filter_map(|key| {
                let old = a.get(key).unwrap_or(&nil);
                let new = b.get(key).unwrap_or(&nil);
                let change = differ.diff(differ, old, new)?;
                Some(Change::path([key.clone()], change))
            })
            .collect(),
    )
}

/// Turns a character diff into splices, measuring offsets with `len`.
fn text_splices(
    old: &str,
    new: &str,
    len: impl Fn(&str) -> usize,
    value: impl Fn(&str) -> Value,
) -> Option<Change> {
    let mut splices = Vec::new();
    let mut offset = 0;
    let (mut removed, mut inserted) = (String::new(), String::new());
    let mut flush = |offset: &mut usize, removed: &mut String, inserted: &mut String| {
        if removed.is_empty() && inserted.is_empty() {
            return;
        }
        splices.push(Change::from(Splice::new(*offset, value(removed), value(inserted))));
        *offset += len(inserted);
        removed.clear();
        inserted.clear();
    };
    for chunk in dissimilar::diff(old, new) {
        match chunk {
            Chunk::Equal(text) => {
                flush(&mut offset, &mut removed, &mut inserted);
                offset += len(text);
            }
            Chunk::Delete(text) => removed.push_str(text),
            Chunk::Insert(text) => inserted.push_str(text),
        }
    }
    flush(&mut offset, &mut removed, &mut inserted);
    sequence(splices)
}
