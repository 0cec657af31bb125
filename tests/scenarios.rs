//! End-to-end scenarios across values, references, CRDTs and streams.

use convergent::{
    Change, Move, Splice, Value, array,
    crdts::{Dict, OrdKey, Seq},
    refs::{Caret, Path},
    streams::{Branch, Log, Stream},
};

#[test]
fn concurrent_string_edits_converge() {
    let base = Value::from("Hello World");
    let a = Change::from(Splice::new(0, "", "OK "));
    let b = Change::from(Splice::new(6, "W", "w"));

    let (b_after_a, a_after_b) = a.merge(&b).unwrap();
    let peer_a = base
        .apply(&a)
        .and_then(|v| v.apply_opt(b_after_a.as_ref()))
        .unwrap();
    let peer_b = base
        .apply(&b)
        .and_then(|v| v.apply_opt(a_after_b.as_ref()))
        .unwrap();
    assert_eq!(peer_a, Value::from("OK Hello world"));
    assert_eq!(peer_a, peer_b);
}

#[test]
fn carets_migrate_with_inserts() {
    let base = array!["a", "b", "c"];
    let caret = Caret::new(Path::default(), 2, false);
    let insert = Change::from(Splice::new(0, array![], array!["x", "y"]));

    let (moved, _) = caret.merge(&insert).unwrap();
    assert_eq!(moved, Some(Caret::new(Path::default(), 4, false)));
    assert_eq!(base.apply(&insert).unwrap(), array!["x", "y", "a", "b", "c"]);
}

#[test]
fn dict_undo_and_redo() {
    let (c1, d1) = Dict::default().set("hello", "world");
    let (c2, d2) = d1.set("hello", "world2");
    assert_eq!(d2.get("hello"), Value::from("world2"));

    let undo_second = d2.apply_change(&c2.revert()).unwrap();
    assert_eq!(undo_second.get("hello"), Value::from("world"));

    let undo_first = d2.apply_change(&c1.revert()).unwrap();
    assert_eq!(undo_first.get("hello"), Value::from("world2"));

    let undo_both = undo_second.apply_change(&c1.revert()).unwrap();
    assert_eq!(undo_both.get("hello"), Value::Nil);
    assert!(!undo_both.contains_key("hello"));

    // Redo is the revert of the revert.
    let redo = undo_both.apply_change(&c1.revert().revert()).unwrap();
    assert_eq!(redo.get("hello"), Value::from("world"));
}

#[test]
fn seq_splice_round_trip() {
    let (c, s1) = Seq::default()
        .splice(0, 0, vec!["hello".into(), "new".into(), "world".into()])
        .unwrap();
    assert_eq!(
        s1.items(),
        [Value::from("hello"), "new".into(), "world".into()]
    );
    assert!(s1.apply_change(&c.revert()).unwrap().items().is_empty());
}

#[test]
fn branch_push_and_pull() {
    let up = Log::new();
    let down = Branch::new(up.clone());
    up.append(Move::new(2, 2, 2).into()).unwrap();
    assert!(down.next().is_none());

    down.pull().unwrap();
    let (_, change) = down.next().unwrap();
    assert_eq!(change, Move::new(2, 2, 2).into());
}

#[test]
fn ord_keys_stay_dense() {
    let mut left = OrdKey::zero();
    let right = left.next();
    for _ in 0..1000 {
        let mid = left.between(&right, 1).remove(0);
        assert_ne!(mid, left);
        assert_ne!(mid, right);
        assert!(left < mid && mid < right, "{left} < {mid} < {right}");
        left = mid;
    }
}
