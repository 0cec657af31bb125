// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # Change streams
//!
//! A [`Log`] is an immutable node in a forward-linked list of changes. Every node has a single
//! successor slot that is filled exactly once. Appending to a node that already has successors
//! transforms the new change past all of them and appends it at the tail, so every holder of
//! any node eventually observes the same converged sequence by walking [`Stream::next`].
//!
//! Appending returns the node *right after* the appended change. Its successors are the changes
//! that were already in the log, transformed so that they apply after the new change:
//!
//! ```rust
//! use convergent::{Splice, Value, streams::{Log, Stream, latest}};
//!
//! let root = Log::new();
//! let alice = root.append(Splice::new(0, "", "a").into()).unwrap();
//! let bob = root.append(Splice::new(0, "", "b").into()).unwrap();
//!
//! let seen_by_alice = Value::from("a");
//! let seen_by_bob = Value::from("b");
//! let (_, to_alice) = latest(&alice);
//! let (_, to_bob) = latest(&bob);
//! assert_eq!(
//!     seen_by_alice.apply_opt(to_alice.as_ref()).unwrap(),
//!     seen_by_bob.apply_opt(to_bob.as_ref()).unwrap(),
//! );
//! ```
//!
//! On top of the log, this module provides [`Branch`]es with explicit push and pull,
//! [`Substream`]s scoped to a path, [`Transform`]s that rewrite changes in both directions, a
//! [`Cache`] for per-round reuse of derived streams, [`Scheduler`]s that control when listeners
//! run, and typed [value streams](ValueStream).
use crate::{Change, ChangeError, changes::sequence};
use parking_lot::Mutex;
use std::{
    fmt,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicU64, Ordering},
    },
};
use tracing::trace;

mod branch;
pub use branch::Branch;
mod cache;
pub use cache::Cache;
mod scheduler;
pub use scheduler::{AsyncScheduler, Scheduler, SyncScheduler, Task};
mod substream;
pub use substream::Substream;
mod transform;
pub use transform::{Rewrite, Transform};
mod values;
pub use values::{
    BoolStream, CounterStream, IntStream, S8Stream, S16Stream, StreamValue, ValueStream,
};

/// A callback invoked when the successor of the node it is registered on is realized.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Identifies a registered [`Listener`] so it can be removed again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

static NEXT_LISTENER: AtomicU64 = AtomicU64::new(0);

impl ListenerId {
    fn fresh() -> Self {
        Self(NEXT_LISTENER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A node in a log of changes.
pub trait Stream: Clone + Send + Sync + 'static {
    /// Appends a local change.
    ///
    /// The change is merged past every change already appended after this node, taking the
    /// right-hand side of [`Change::merge`], so changes already in the log win conflicts.
    /// Returns the node right after the appended change.
    fn append(&self, change: Change) -> Result<Self, ChangeError>;

    /// Appends a change that comes from an upstream.
    ///
    /// Like [`Stream::append`], but the appended change takes the left-hand side of the merge.
    fn reverse_append(&self, change: Change) -> Result<Self, ChangeError>;

    /// The next change and the node after it, if the successor has been realized.
    fn next(&self) -> Option<(Self, Change)>;

    /// Registers a listener that is notified when the successor of this node is realized.
    ///
    /// Registering on a node that already has a successor never fires.
    fn on(&self, listener: Listener) -> ListenerId;

    fn off(&self, id: ListenerId);

    /// Sends local changes upstream. Only meaningful for branches.
    fn push(&self) -> Result<(), ChangeError> {
        Ok(())
    }

    /// Fetches changes from upstream. Only meaningful for branches.
    fn pull(&self) -> Result<(), ChangeError> {
        Ok(())
    }
}

/// The basic [`Stream`]: a node of an in-memory log.
#[derive(Clone)]
pub struct Log {
    node: Arc<Node>,
}

struct Node {
    next: OnceLock<(Change, Log)>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    scheduler: Arc<dyn Scheduler>,
}

impl Log {
    /// Creates a new log that notifies listeners synchronously.
    pub fn new() -> Self {
        Self::with_scheduler(Arc::new(SyncScheduler))
    }

    /// Creates a new log whose listeners run through `scheduler`.
    pub fn with_scheduler(scheduler: Arc<dyn Scheduler>) -> Self {
        Self::node(OnceLock::new(), scheduler)
    }

    fn node(next: OnceLock<(Change, Log)>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            node: Arc::new(Node {
                next,
                listeners: Mutex::new(Vec::new()),
                scheduler,
            }),
        }
    }

    /// A node whose successor is already known.
    fn realized(change: Change, next: Log) -> Self {
        let scheduler = Arc::clone(&next.node.scheduler);
        Self::node(OnceLock::from((change, next)), scheduler)
    }

    /// Whether two handles refer to the same node.
    pub fn ptr_eq(&self, other: &Log) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    fn append_with(&self, change: Change, reverse: bool) -> Result<Log, ChangeError> {
        let mut node = self.clone();
        let mut change = Some(change);
        // What every change already in the log looks like after `change`.
        let mut parallel = Vec::new();
        let tail = loop {
            if let Some((existing, next)) = node.node.next.get() {
                let (ours, theirs) = match &change {
                    Some(ours) if reverse => existing.reverse_merge(ours)?,
                    Some(ours) => existing.merge(ours)?,
                    None => (None, Some(existing.clone())),
                };
                change = ours;
                parallel.push(theirs);
                node = next.clone();
                continue;
            }
            let Some(change) = &change else {
                break node;
            };
            let tail = Log::with_scheduler(Arc::clone(&node.node.scheduler));
            if node.node.next.set((change.clone(), tail.clone())).is_err() {
                // Lost a race against another append on the same node.
                continue;
            }
            trace!(?change, reverse, "realized append");
            node.notify();
            break tail;
        };
        Ok(parallel
            .into_iter()
            .rev()
            .fold(tail, |next, change| match change {
                Some(change) => Log::realized(change, next),
                None => next,
            }))
    }

    fn notify(&self) {
        let listeners: Vec<Listener> = self
            .node
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            self.node.scheduler.schedule(Box::new(move || listener()));
        }
    }
}

impl Default for Log {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node.next.get() {
            Some((change, _)) => f.debug_tuple("Log").field(change).finish(),
            None => f.write_str("Log(tail)"),
        }
    }
}

impl Stream for Log {
    fn append(&self, change: Change) -> Result<Self, ChangeError> {
        self.append_with(change, false)
    }

    fn reverse_append(&self, change: Change) -> Result<Self, ChangeError> {
        self.append_with(change, true)
    }

    fn next(&self) -> Option<(Self, Change)> {
        self.node
            .next
            .get()
            .map(|(change, next)| (next.clone(), change.clone()))
    }

    fn on(&self, listener: Listener) -> ListenerId {
        let id = ListenerId::fresh();
        self.node.listeners.lock().push((id, listener));
        id
    }

    fn off(&self, id: ListenerId) {
        self.node.listeners.lock().retain(|(other, _)| *other != id);
    }
}

// Long logs would otherwise overflow the stack with recursive drops.
impl Drop for Node {
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some((_, log)) = next {
            match Arc::try_unwrap(log.node) {
                Ok(mut node) => next = node.next.take(),
                Err(_) => break,
            }
        }
    }
}

/// Walks to the tail of `stream`, returning the tail and every change on the way combined.
pub fn latest<S: Stream>(stream: &S) -> (S, Option<Change>) {
    let mut current = stream.clone();
    let mut changes = Vec::new();
    while let Some((next, change)) = current.next() {
        changes.push(change);
        current = next;
    }
    (current, sequence(changes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Splice, Value, changes::test_util::Concurrent};
    use std::sync::atomic::AtomicUsize;

    fn converged(base: &Value, stream: &Log, seen: &Change) -> Value {
        let (_, rest) = latest(stream);
        base.apply(seen)
            .and_then(|v| v.apply_opt(rest.as_ref()))
            .unwrap()
    }

    #[test]
    fn siblings_converge() {
        crate::init_tracing();
        let base = Value::from("Hello World");
        let root = Log::new();
        let a = Change::from(Splice::new(0, "", "OK "));
        let b = Change::from(Splice::new(6, "W", "w"));
        let sa = root.append(a.clone()).unwrap();
        let sb = root.append(b.clone()).unwrap();
        assert_eq!(converged(&base, &sa, &a), Value::from("OK Hello world"));
        assert_eq!(converged(&base, &sb, &b), Value::from("OK Hello world"));

        let (tail_a, _) = latest(&sa);
        let (tail_b, _) = latest(&sb);
        assert!(tail_a.ptr_eq(&tail_b));
    }

    #[test]
    fn earlier_appends_win_ties() {
        let root = Log::new();
        root.append(Splice::new(0, "", "a").into()).unwrap();
        root.append(Splice::new(0, "", "b").into()).unwrap();
        let (_, all) = latest(&root);
        let value = Value::from("").apply_opt(all.as_ref()).unwrap();
        assert_eq!(value, Value::from("ab"));

        let root = Log::new();
        root.append(Splice::new(0, "", "a").into()).unwrap();
        root.reverse_append(Splice::new(0, "", "b").into()).unwrap();
        let (_, all) = latest(&root);
        let value = Value::from("").apply_opt(all.as_ref()).unwrap();
        assert_eq!(value, Value::from("ba"));
    }

    #[test]
    fn failed_appends_leave_the_log_untouched() {
        let root = Log::new();
        root.append(Splice::new(0, "", "a").into()).unwrap();
        // Maps cannot be spliced, so this fails to merge with the splice above.
        let invalid = Change::from(Splice::new(0, crate::Map::new(), crate::Map::new()));
        assert!(root.append(invalid).is_err());
        let (_, all) = latest(&root);
        assert_eq!(all, Some(Change::from(Splice::new(0, "", "a"))));
    }

    #[test]
    fn listeners_fire_once_and_can_be_removed() {
        let root = Log::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = root.on(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let next = root.append(Splice::new(0, "", "a").into()).unwrap();
        root.append(Splice::new(0, "", "b").into()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let counter = Arc::clone(&calls);
        let id2 = next.on(Arc::new(move || {
            counter.fetch_add(10, Ordering::SeqCst);
        }));
        next.off(id2);
        root.off(id);
        next.append(Splice::new(0, "", "c").into()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn long_logs_drop_without_overflow() {
        let mut log = Log::new();
        let root = log.clone();
        for i in 0..100_000 {
            log = log.append(crate::Counter::increment(i % 3)).unwrap();
        }
        drop(root);
        drop(log);
    }

    #[quickcheck]
    fn concurrent_appends_converge(c: Concurrent) -> bool {
        let root = Log::new();
        let left = root.append(c.left.clone()).unwrap();
        let right = root.append(c.right.clone()).unwrap();
        let (_, after_left) = latest(&left);
        let (_, after_right) = latest(&right);
        let l = c.base.apply(&c.left).and_then(|v| v.apply_opt(after_left.as_ref()));
        let r = c.base.apply(&c.right).and_then(|v| v.apply_opt(after_right.as_ref()));
        l.is_ok() && l == r
    }
}
