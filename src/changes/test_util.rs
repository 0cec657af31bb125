// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Generators for concurrent changes, for property-based testing.
use super::{Change, Move, Replace, Splice};
use crate::{Array, Value};
use quickcheck::{Arbitrary, Gen};

/// A value together with two changes made concurrently against it.
///
/// The value is either a short ASCII string or an array of such strings, and both changes are
/// valid for it, so any failure to merge or converge is a bug in the transform.
#[derive(Clone, Debug)]
pub struct Concurrent {
    pub base: Value,
    pub left: Change,
    pub right: Change,
}

impl Arbitrary for Concurrent {
    fn arbitrary(g: &mut Gen) -> Self {
        let base = if bool::arbitrary(g) {
            Value::from(text(g, "abcdefgh", 8))
        } else {
            let len = pick(g, 4);
            Value::from((0..len).map(|_| Value::from(text(g, "abc", 3))).collect::<Vec<_>>())
        };
        let left = change_for(g, &base, 2);
        let right = change_for(g, &base, 2);
        Self { base, left, right }
    }
}

/// A valid change for `value`, nested at most `depth` change sets deep.
pub fn change_for(g: &mut Gen, value: &Value, depth: usize) -> Change {
    if depth > 0 && u8::arbitrary(g) % 5 == 0 {
        let first = change_for(g, value, depth - 1);
        let Ok(mid) = value.apply(&first) else {
            return first;
        };
        let second = change_for(g, &mid, depth - 1);
        return Change::set([first, second]);
    }
    match value {
        Value::S8(s) => text_change(g, s.as_str()),
        Value::Array(a) => list_change(g, a),
        other => Change::from(Replace::new(other.clone(), Value::Nil)),
    }
}

fn pick(g: &mut Gen, max: usize) -> usize {
    usize::arbitrary(g) % (max + 1)
}

fn text(g: &mut Gen, alphabet: &str, max_len: usize) -> String {
    let chars: Vec<char> = alphabet.chars().collect();
    let len = pick(g, max_len);
    (0..len).map(|_| *g.choose(&chars).unwrap_or(&'a')).collect()
}

fn arbitrary_move(g: &mut Gen, len: usize) -> Move {
    let offset = pick(g, len);
    let count = pick(g, len - offset);
    let distance = if bool::arbitrary(g) {
        pick(g, len - offset - count) as isize
    } else {
        -(pick(g, offset) as isize)
    };
    Move::new(offset, count, distance)
}

fn text_change(g: &mut Gen, s: &str) -> Change {
    let len = s.len();
    match u8::arbitrary(g) % 4 {
        0 | 1 => {
            let offset = pick(g, len);
            let count = pick(g, len - offset);
            let after = text(g, "XYZ", 3);
            Change::from(Splice::new(offset, &s[offset..offset + count], after))
        }
        2 => Change::from(arbitrary_move(g, len)),
        _ => Change::from(Replace::new(s, text(g, "xyz", 3))),
    }
}

fn list_change(g: &mut Gen, a: &Array) -> Change {
    let len = a.len();
    match u8::arbitrary(g) % 5 {
        0 | 1 if len > 0 => {
            let index = pick(g, len - 1);
            let inner = change_for(g, &a[index], 0);
            Change::path([index.into()], inner)
        }
        0 | 1 | 2 => {
            let offset = pick(g, len);
            let count = pick(g, len - offset);
            let removed: Vec<Value> = a.iter().skip(offset).take(count).cloned().collect();
            let inserted: Vec<Value> = (0..pick(g, 2))
                .map(|_| Value::from(text(g, "XYZ", 2)))
                .collect();
            Change::from(Splice::new(offset, removed, inserted))
        }
        3 => Change::from(arbitrary_move(g, len)),
        _ => Change::from(Replace::new(a.clone(), Vec::<Value>::new())),
    }
}
