// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Operational transform of concurrent changes.
//!
//! Every rule here maps a pair `(l, r)` of changes made against the same value to `(r', l')`
//! such that `v.apply(l).apply(r') == v.apply(r).apply(l')`. When the two sides cannot both be
//! honoured, the left side wins and the right side is reduced to whatever still makes sense
//! after it.
use super::{Change, ChangeSet, Merged, Move, PathChange, Replace, Splice, sequence};
use crate::{ChangeError, Key};
use tracing::debug;

/// Merges two optional concurrent changes. See [`Change::merge`].
pub fn merge(left: Option<&Change>, right: Option<&Change>) -> Result<Merged, ChangeError> {
    match (left, right) {
        (Some(l), Some(r)) => l.merge(r),
        (l, r) => Ok((r.cloned(), l.cloned())),
    }
}

pub(super) fn merge_changes(l: &Change, r: &Change) -> Result<Merged, ChangeError> {
    match (l, r) {
        (Change::ChangeSet(set), _) => merge_left_set(set, r),
        (_, Change::ChangeSet(set)) => merge_right_set(l, set),
        (Change::PathChange(p), _) if p.path.is_empty() => p.change.merge(r),
        (_, Change::PathChange(p)) if p.path.is_empty() => l.merge(&p.change),
        (Change::Custom(c), _) => c.merge(r),
        (_, Change::Custom(c)) => c.reverse_merge(l),
        (Change::Replace(lr), Change::Replace(rr)) => Ok((
            None,
            Some(Change::Replace(Replace {
                before: rr.after.clone(),
                after: lr.after.clone(),
            })),
        )),
        (Change::Replace(lr), _) => Ok((None, Some(absorb(lr, r)?))),
        (_, Change::Replace(rr)) => Ok((Some(absorb(rr, l)?), None)),
        (Change::Splice(ls), Change::Splice(rs)) => splice_splice(ls, rs),
        (Change::Splice(s), Change::Move(m)) => {
            let (s, m) = splice_move(s, m)?;
            Ok((m, s))
        }
        (Change::Move(m), Change::Splice(s)) => splice_move(s, m),
        (Change::Splice(s), Change::PathChange(p)) => {
            let (s, p) = splice_path(s, p)?;
            Ok((p, s))
        }
        (Change::PathChange(p), Change::Splice(s)) => splice_path(s, p),
        (Change::Move(lm), Change::Move(rm)) => Ok(move_move(lm, rm)),
        (Change::Move(m), Change::PathChange(p)) => {
            Ok((Some(path_through_move(p, m)?), Some(l.clone())))
        }
        (Change::PathChange(p), Change::Move(m)) => {
            Ok((Some(r.clone()), Some(path_through_move(p, m)?)))
        }
        (Change::PathChange(lp), Change::PathChange(rp)) => path_path(lp, rp),
    }
}

/// Threads `r` through the changes of `set`, which is the left side.
fn merge_left_set(set: &ChangeSet, r: &Change) -> Result<Merged, ChangeError> {
    let mut other = Some(r.clone());
    let mut own = Vec::with_capacity(set.len());
    for change in set.iter() {
        match &other {
            None => own.push(change.clone()),
            Some(o) => {
                let (o, c) = change.merge(o)?;
                own.extend(c);
                other = o;
            }
        }
    }
    Ok((other, sequence(own)))
}

/// Threads `l` through the changes of `set`, which is the right side.
fn merge_right_set(l: &Change, set: &ChangeSet) -> Result<Merged, ChangeError> {
    let mut own = Some(l.clone());
    let mut other = Vec::with_capacity(set.len());
    for change in set.iter() {
        match &own {
            None => other.push(change.clone()),
            Some(o) => {
                let (c, o) = o.merge(change)?;
                other.extend(c);
                own = o;
            }
        }
    }
    Ok((sequence(other), own))
}

/// A replace that runs after `other` replaces the value `other` produced.
fn absorb(replace: &Replace, other: &Change) -> Result<Change, ChangeError> {
    Ok(Change::Replace(Replace {
        before: replace.before.apply(other)?,
        after: replace.after.clone(),
    }))
}

fn grown(offset: usize, before: usize, after: usize) -> usize {
    offset + after - before
}

fn splice_splice(s: &Splice, o: &Splice) -> Result<Merged, ChangeError> {
    let (so, sbl, sal) = (s.offset, s.before.count()?, s.after.count()?);
    let (oo, obl, oal) = (o.offset, o.before.count()?, o.after.count()?);
    let (s_end, o_end) = (so + sbl, oo + obl);

    // Disjoint. Inserts at the same offset land with the left side first.
    if s_end <= oo {
        let o2 = Splice {
            offset: grown(oo, sbl, sal),
            before: o.before.clone(),
            after: o.after.clone(),
        };
        return Ok((Some(o2.into()), Some(s.clone().into())));
    }
    if o_end <= so {
        let s2 = Splice {
            offset: grown(so, obl, oal),
            before: s.before.clone(),
            after: s.after.clone(),
        };
        return Ok((Some(o.clone().into()), Some(s2.into())));
    }

    // One side's removal covers the other's: the outer splice absorbs the inner one.
    if so <= oo && o_end <= s_end {
        let s2 = Splice {
            offset: so,
            before: s.before.splice(oo - so, obl, &o.after)?,
            after: s.after.clone(),
        };
        return Ok((None, Some(s2.into())));
    }
    if oo <= so && s_end <= o_end {
        let o2 = Splice {
            offset: oo,
            before: o.before.splice(so - oo, sbl, &s.after)?,
            after: o.after.clone(),
        };
        return Ok((Some(o2.into()), None));
    }

    // Partial overlap: each side keeps only the part of its removal the other left behind.
    if so < oo {
        let s2 = Splice {
            offset: so,
            before: s.before.slice(0, oo - so)?,
            after: s.after.clone(),
        };
        let o2 = Splice {
            offset: so + sal,
            before: o.before.slice(s_end - oo, o_end - s_end)?,
            after: o.after.clone(),
        };
        Ok((Some(o2.into()), Some(s2.into())))
    } else {
        let s2 = Splice {
            offset: oo + oal,
            before: s.before.slice(o_end - so, s_end - o_end)?,
            after: s.after.clone(),
        };
        let o2 = Splice {
            offset: oo,
            before: o.before.slice(0, so - oo)?,
            after: o.after.clone(),
        };
        Ok((Some(o2.into()), Some(s2.into())))
    }
}

/// Merges a splice and a concurrent move. Returns `(splice', move')`, where `splice'` applies
/// after the move and `move'` after the splice.
fn splice_move(s: &Splice, m: &Move) -> Result<Merged, ChangeError> {
    let m = m.normalized();
    if m.is_noop() {
        return Ok((Some(s.clone().into()), None));
    }
    let (so, sbl, sal) = (s.offset, s.before.count()?, s.after.count()?);
    let s_end = so + sbl;
    let (mo, mc, md) = (m.offset, m.count, m.distance.unsigned_abs());
    let (b_start, end) = (mo + mc, mo + mc + md);
    let with_offset = |offset| {
        Change::Splice(Splice {
            offset,
            before: s.before.clone(),
            after: s.after.clone(),
        })
    };

    if s_end <= mo {
        let m2 = Move::new(grown(mo, sbl, sal), mc, md as isize);
        Ok((Some(s.clone().into()), Some(m2.into())))
    } else if so >= mo && s_end <= b_start {
        // Within the moved run.
        let m2 = Move::new(mo, grown(mc, sbl, sal), md as isize);
        Ok((Some(with_offset(so + md)), Some(m2.into())))
    } else if so >= b_start && s_end <= end {
        // Within the run the move jumps over.
        let m2 = Move::new(mo, mc, grown(md, sbl, sal) as isize);
        Ok((Some(with_offset(so - mc)), Some(m2.into())))
    } else if so >= end {
        Ok((Some(s.clone().into()), Some(m.into())))
    } else {
        debug!(?s, ?m, "splice straddles a move boundary");
        splice_across_move(s, &m)
    }
}

/// A splice whose removal crosses an edge of a normalized move's runs.
///
/// The move is narrowed to the elements the splice leaves behind, and the inserted elements
/// join the run the splice starts in. After the move the removed elements are no longer
/// contiguous, so the splice is cut into one piece per run it touches.
fn splice_across_move(s: &Splice, m: &Move) -> Result<Merged, ChangeError> {
    let (so, sbl, sal) = (s.offset, s.before.count()?, s.after.count()?);
    let s_end = so + sbl;
    let (mo, mc, md) = (m.offset, m.count, m.distance.unsigned_abs());
    let (b_start, end) = (mo + mc, mo + mc + md);
    let removed = |start: usize, stop: usize| stop.min(s_end).saturating_sub(start.max(so));
    let (moved, jumped) = (mc - removed(mo, b_start), md - removed(b_start, end));
    let m2 = if so < mo {
        Move::new(so + sal, moved, jumped as isize)
    } else if so < b_start {
        Move::new(mo, moved + sal, jumped as isize)
    } else {
        Move::new(mo, moved, (jumped + sal) as isize)
    };

    // Runs in the order the move leaves them: prefix, jumped, moved, suffix.
    let runs = [(0, mo), (b_start, end), (mo, b_start), (end, end.max(s_end))];
    let mut pieces = Vec::with_capacity(runs.len());
    let mut cursor = 0;
    for (start, stop) in runs {
        let (lo, hi) = (start.max(so), stop.min(s_end));
        if hi <= lo {
            cursor += stop - start;
            continue;
        }
        let after = if (start..stop).contains(&so) {
            s.after.clone()
        } else {
            s.after.slice(0, 0)?
        };
        let inserted = after.count()?;
        pieces.push(Change::Splice(Splice {
            offset: cursor + lo - start,
            before: s.before.slice(lo - so, hi - lo)?,
            after,
        }));
        cursor += stop - start + inserted - (hi - lo);
    }
    let m2 = (!m2.is_noop()).then(|| Change::Move(m2));
    Ok((sequence(pieces), m2))
}

/// Merges a splice and a concurrent path change. Returns `(splice', path')`.
fn splice_path(s: &Splice, p: &PathChange) -> Result<Merged, ChangeError> {
    let Some((head, rest)) = p.path.split_first() else {
        return Ok((Some(s.clone().into()), Some(p.clone().into())));
    };
    let index = head.as_index().ok_or_else(|| ChangeError::InvalidKey {
        key: head.clone(),
        value: s.before.type_name(),
    })?;
    let (so, sbl, sal) = (s.offset, s.before.count()?, s.after.count()?);
    if index < so {
        Ok((Some(s.clone().into()), Some(p.clone().into())))
    } else if index < so + sbl {
        // The element is being removed; fold the edit into what the splice removes.
        let mut path = p.path.clone();
        path[0] = Key::Index(index - so);
        let inner = Change::PathChange(PathChange {
            path,
            change: p.change.clone(),
        });
        let s2 = Splice {
            offset: so,
            before: s.before.apply(&inner)?,
            after: s.after.clone(),
        };
        Ok((Some(s2.into()), None))
    } else {
        let p2 = PathChange::new(
            std::iter::once(Key::Index(grown(index, sbl, sal))).chain(rest.iter().cloned()),
            (*p.change).clone(),
        );
        Ok((Some(s.clone().into()), Some(p2.into())))
    }
}

fn path_through_move(p: &PathChange, m: &Move) -> Result<Change, ChangeError> {
    let mut p = p.clone();
    if let Some(head) = p.path.first_mut() {
        let index = head.as_index().ok_or_else(|| ChangeError::InvalidKey {
            key: head.clone(),
            value: "collection",
        })?;
        *head = Key::Index(m.map_index(index));
    }
    Ok(Change::PathChange(p))
}

fn move_move(l: &Move, r: &Move) -> Merged {
    let (ln, rn) = (l.normalized(), r.normalized());
    if ln.is_noop() || rn.is_noop() {
        return (Some((*r).into()), Some((*l).into()));
    }
    if ln == rn {
        return (None, None);
    }
    let (lo, lc, ld) = (ln.offset, ln.count, ln.distance.unsigned_abs());
    let (ro, rc, rd) = (rn.offset, rn.count, rn.distance.unsigned_abs());
    let (l_end, r_end) = (lo + lc + ld, ro + rc + rd);
    let shifted = |m: Move, offset: usize| Change::Move(Move { offset, ..m });

    if l_end <= ro || r_end <= lo {
        (Some(rn.into()), Some(ln.into()))
    } else if ro >= lo && r_end <= lo + lc {
        (Some(shifted(rn, ro + ld)), Some(ln.into()))
    } else if ro >= lo + lc && r_end <= l_end {
        (Some(shifted(rn, ro - lc)), Some(ln.into()))
    } else if lo >= ro && l_end <= ro + rc {
        (Some(rn.into()), Some(shifted(ln, lo + rd)))
    } else if lo >= ro + rc && l_end <= r_end {
        (Some(rn.into()), Some(shifted(ln, lo - rc)))
    } else {
        debug!(?l, ?r, "overlapping moves, keeping the left one");
        (None, Some(Change::set([r.revert().into(), ln.into()])))
    }
}

fn path_path(l: &PathChange, r: &PathChange) -> Result<Merged, ChangeError> {
    let (Some((lh, lrest)), Some((rh, rrest))) = (l.path.split_first(), r.path.split_first())
    else {
        return Ok((Some(r.clone().into()), Some(l.clone().into())));
    };
    if lh != rh {
        return Ok((Some(r.clone().into()), Some(l.clone().into())));
    }
    let li = Change::PathChange(PathChange::new(lrest.iter().cloned(), (*l.change).clone()));
    let ri = Change::PathChange(PathChange::new(rrest.iter().cloned(), (*r.change).clone()));
    let (r2, l2) = li.merge(&ri)?;
    Ok((r2.map(|c| c.under(rh.clone())), l2.map(|c| c.under(lh.clone()))))
}
