// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::Rank;
use crate::{
    Change, ChangeError, CustomChange, CustomValue, Replace, Value,
    changes::{Merged, custom_eq as change_eq},
    types::custom_eq as value_eq,
};
use std::{any::Any, sync::Arc};

/// A single CRDT slot holding the values written to it under distinct ranks.
///
/// The visible value is the one written under the highest rank that has not been undone. A
/// container can also be deleted, which hides every value until it is undeleted again. Both
/// undos and deletes are counters, so concurrent undos, redos, deletes and undeletes commute.
///
/// Containers are modified exclusively through [`ContainerChange`]s and are usually found as
/// the entries of a [`Dict`](super::Dict).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Container {
    // Sorted by rank.
    slots: Arc<Vec<Slot>>,
    deleted: i32,
}

#[derive(Clone, Debug, PartialEq)]
struct Slot {
    rank: Rank,
    value: Value,
    undos: i32,
}

impl Container {
    /// The visible value, or `Nil` if there is none.
    pub fn get(&self) -> Value {
        self.winner()
            .map(|slot| slot.value.clone())
            .unwrap_or_default()
    }

    /// The rank of the visible value.
    pub fn winning_rank(&self) -> Option<Rank> {
        self.winner().map(|slot| slot.rank)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted > 0
    }

    /// How many deletes are outstanding.
    pub fn deleted(&self) -> i32 {
        self.deleted
    }

    /// Every rank ever written to this container, in ascending order.
    pub fn ranks(&self) -> impl Iterator<Item = Rank> + '_ {
        self.slots.iter().map(|slot| slot.rank)
    }

    fn winner(&self) -> Option<&Slot> {
        if self.is_deleted() {
            return None;
        }
        self.slots
            .iter()
            .rev()
            .find(|slot| slot.undos <= 0 && !slot.value.is_nil())
    }

    fn slot_mut(&mut self, rank: Rank) -> &mut Slot {
        let slots = Arc::make_mut(&mut self.slots);
        let index = match slots.binary_search_by(|slot| slot.rank.cmp(&rank)) {
            Ok(index) => index,
            Err(index) => {
                slots.insert(
                    index,
                    Slot {
                        rank,
                        value: Value::Nil,
                        undos: 0,
                    },
                );
                index
            }
        };
        &mut slots[index]
    }

    fn slot(&self, rank: Rank) -> Option<&Slot> {
        self.slots
            .binary_search_by(|slot| slot.rank.cmp(&rank))
            .ok()
            .map(|index| &self.slots[index])
    }

    pub(super) fn with(&self, change: &ContainerChange) -> Result<Container, ChangeError> {
        let mut next = self.clone();
        match change {
            ContainerChange::Set { rank, value } => next.slot_mut(*rank).value = value.clone(),
            ContainerChange::Undo { rank, delta } => next.slot_mut(*rank).undos += delta,
            ContainerChange::Delete { delta } => next.deleted += delta,
            ContainerChange::Update { rank, change } => {
                let current = self.slot(*rank).ok_or(ChangeError::NoEffectiveValue)?;
                let value = current.value.apply(change)?;
                next.slot_mut(*rank).value = value;
            }
        }
        Ok(next)
    }
}

impl CustomValue for Container {
    fn type_name(&self) -> &'static str {
        "Container"
    }

    fn apply(&self, change: &Change) -> Result<Value, ChangeError> {
        Err(ChangeError::UnsupportedChange {
            change: change.kind(),
            value: "Container",
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_value(&self, other: &dyn CustomValue) -> bool {
        value_eq(self, other)
    }
}

/// An edit to a [`Container`].
#[derive(Clone, Debug, PartialEq)]
pub enum ContainerChange {
    /// Writes `value` under a fresh `rank`.
    Set { rank: Rank, value: Value },
    /// Adds `delta` to the undo count of the value written under `rank`. A value is visible
    /// while its undo count is not positive.
    Undo { rank: Rank, delta: i32 },
    /// Adds `delta` to the delete count. The container is deleted while it is positive.
    Delete { delta: i32 },
    /// Applies `change` to the value written under `rank`.
    Update { rank: Rank, change: Change },
}

impl ContainerChange {
    fn merge_with(&self, other: &Change, self_is_left: bool) -> Result<Merged, ChangeError> {
        if let Change::Replace(replace) = other {
            // A replace of the whole container wins over any edit inside it.
            let absorbed = Replace {
                before: replace.before.apply(&Change::Custom(Arc::new(self.clone())))?,
                after: replace.after.clone(),
            };
            return Ok((Some(absorbed.into()), None));
        }
        let Some(theirs) = other.as_custom::<ContainerChange>() else {
            return Err(ChangeError::UnsupportedChange {
                change: other.kind(),
                value: "Container",
            });
        };
        match (self, theirs) {
            (
                ContainerChange::Update { rank, change: ours },
                ContainerChange::Update {
                    rank: their_rank,
                    change: their_change,
                },
            ) if rank == their_rank => {
                let (theirs, ours) = if self_is_left {
                    ours.merge(their_change)?
                } else {
                    ours.reverse_merge(their_change)?
                };
                let wrap = |change| {
                    Change::custom(ContainerChange::Update {
                        rank: *rank,
                        change,
                    })
                };
                Ok((theirs.map(wrap), ours.map(wrap)))
            }
            // Everything else touches independent counters or slots.
            _ => Ok((Some(other.clone()), Some(Change::custom(self.clone())))),
        }
    }
}

impl CustomChange for ContainerChange {
    fn revert(&self) -> Change {
        Change::custom(match self {
            ContainerChange::Set { rank, .. } => ContainerChange::Undo {
                rank: *rank,
                delta: 1,
            },
            ContainerChange::Undo { rank, delta } => ContainerChange::Undo {
                rank: *rank,
                delta: -delta,
            },
            ContainerChange::Delete { delta } => ContainerChange::Delete { delta: -delta },
            ContainerChange::Update { rank, change } => ContainerChange::Update {
                rank: *rank,
                change: change.revert(),
            },
        })
    }

    fn merge(&self, other: &Change) -> Result<Merged, ChangeError> {
        self.merge_with(other, true)
    }

    fn reverse_merge(&self, other: &Change) -> Result<Merged, ChangeError> {
        self.merge_with(other, false)
    }

    fn apply_to(&self, value: &Value) -> Result<Value, ChangeError> {
        let container = match value {
            Value::Nil => Container::default(),
            other => other
                .as_custom::<Container>()
                .cloned()
                .ok_or(ChangeError::WrongType {
                    expected: "Container",
                    found: other.type_name(),
                })?,
        };
        Ok(Value::custom(container.with(self)?))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_change(&self, other: &dyn CustomChange) -> bool {
        change_eq(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Splice;

    fn apply(container: &Container, change: &Change) -> Container {
        Value::custom(container.clone())
            .apply(change)
            .unwrap()
            .as_custom::<Container>()
            .cloned()
            .unwrap()
    }

    fn set(rank: Rank, value: impl Into<Value>) -> Change {
        Change::custom(ContainerChange::Set {
            rank,
            value: value.into(),
        })
    }

    #[test]
    fn highest_rank_wins() {
        let (r1, r2) = (Rank::from_parts(1, [0; 4]), Rank::from_parts(2, [0; 4]));
        let c = apply(&Container::default(), &set(r2, "two"));
        let c = apply(&c, &set(r1, "one"));
        assert_eq!(c.get(), Value::from("two"));
        assert_eq!(c.winning_rank(), Some(r2));
    }

    #[test]
    fn undo_reveals_the_previous_value() {
        let (r1, r2) = (Rank::from_parts(1, [0; 4]), Rank::from_parts(2, [0; 4]));
        let c = apply(&Container::default(), &set(r1, "one"));
        let second = set(r2, "two");
        let c = apply(&c, &second);
        let undone = apply(&c, &second.revert());
        assert_eq!(undone.get(), Value::from("one"));
        let redone = apply(&undone, &second.revert().revert());
        assert_eq!(redone.get(), Value::from("two"));
    }

    #[test]
    fn deletes_are_counted() {
        let c = apply(&Container::default(), &set(Rank::new(), 1));
        let delete = Change::custom(ContainerChange::Delete { delta: 1 });
        let twice = apply(&apply(&c, &delete), &delete);
        assert_eq!(twice.get(), Value::Nil);
        let once = apply(&twice, &delete.revert());
        assert_eq!(once.get(), Value::Nil);
        assert_eq!(apply(&once, &delete.revert()).get(), Value::from(1));
    }

    #[test]
    fn undo_before_set_leaves_a_placeholder() {
        let rank = Rank::new();
        let undo = Change::custom(ContainerChange::Undo { rank, delta: 1 });
        let c = apply(&Container::default(), &undo);
        assert_eq!(c.get(), Value::Nil);
        let c = apply(&c, &set(rank, "x"));
        assert_eq!(c.get(), Value::Nil);
    }

    #[test]
    fn concurrent_updates_merge_their_inner_changes() {
        let rank = Rank::new();
        let base = apply(&Container::default(), &set(rank, "ab"));
        let update = |change: Splice| {
            Change::custom(ContainerChange::Update {
                rank,
                change: change.into(),
            })
        };
        let l = update(Splice::new(0, "", "1"));
        let r = update(Splice::new(2, "", "2"));
        let (r2, l2) = l.merge(&r).unwrap();
        let left = apply(&apply(&base, &l), r2.as_ref().unwrap());
        let right = apply(&apply(&base, &r), l2.as_ref().unwrap());
        assert_eq!(left.get(), Value::from("1ab2"));
        assert_eq!(left, right);
    }

    #[test]
    fn update_without_value_fails() {
        let change = Change::custom(ContainerChange::Update {
            rank: Rank::new(),
            change: Replace::new(1, 2).into(),
        });
        assert_eq!(
            Value::custom(Container::default()).apply(&change),
            Err(ChangeError::NoEffectiveValue)
        );
    }

    #[test]
    fn replace_absorbs_container_changes() {
        let base = Value::custom(Container::default());
        let l = set(Rank::new(), 1);
        let r = Change::from(Replace::new(base.clone(), Value::Nil));
        let (r2, l2) = l.merge(&r).unwrap();
        assert_eq!(l2, None);
        let left = base.apply(&l).unwrap().apply_opt(r2.as_ref()).unwrap();
        assert_eq!(left, Value::Nil);
    }

    #[test]
    fn splices_do_not_merge_with_containers() {
        let l = set(Rank::new(), 1);
        let r = Change::from(Splice::new(0, "", "x"));
        assert!(l.merge(&r).is_err());
        assert!(r.merge(&l).is_err());
    }
}
