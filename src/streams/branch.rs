// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{Listener, ListenerId, Log, Stream};
use crate::{Change, ChangeError};
use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tracing::debug;

/// A local log that exchanges changes with an upstream only when asked to.
///
/// Local appends stay local until [`Stream::push`]; upstream appends stay invisible until
/// [`Stream::pull`]. Every node of a branch shares the same bookkeeping, so pushing or pulling
/// through any of them affects the whole branch.
///
/// ```rust
/// use convergent::{Move, streams::{Branch, Log, Stream}};
///
/// let up = Log::new();
/// let down = Branch::new(up.clone());
/// up.append(Move::new(2, 2, 2).into()).unwrap();
/// assert!(down.next().is_none());
///
/// down.pull().unwrap();
/// let (_, change) = down.next().unwrap();
/// assert_eq!(change, Move::new(2, 2, 2).into());
/// ```
#[derive(Clone)]
pub struct Branch<S> {
    local: Log,
    shared: Arc<Shared<S>>,
}

struct Shared<S> {
    state: Mutex<State<S>>,
    merging: AtomicBool,
}

struct State<S> {
    // The upstream node after the last change exchanged.
    up: S,
    // The local node after the last change exchanged.
    down: Log,
}

impl<S: Stream> Branch<S> {
    pub fn new(upstream: S) -> Self {
        let local = Log::new();
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    up: upstream,
                    down: local.clone(),
                }),
                merging: AtomicBool::new(false),
            }),
            local,
        }
    }

    /// The local log underneath this branch node.
    pub fn log(&self) -> &Log {
        &self.local
    }

    fn with_local(&self, local: Log) -> Self {
        Self {
            local,
            shared: Arc::clone(&self.shared),
        }
    }

    // Listeners may push or pull from within an exchange; those nested calls are skipped.
    fn exchange(&self, f: impl FnOnce(&mut State<S>) -> Result<usize, ChangeError>) -> Result<(), ChangeError> {
        if self.shared.merging.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let result = f(&mut self.shared.state.lock());
        self.shared.merging.store(false, Ordering::Release);
        result.map(|_| ())
    }
}

impl<S: Stream> Stream for Branch<S> {
    fn append(&self, change: Change) -> Result<Self, ChangeError> {
        Ok(self.with_local(self.local.append(change)?))
    }

    fn reverse_append(&self, change: Change) -> Result<Self, ChangeError> {
        Ok(self.with_local(self.local.reverse_append(change)?))
    }

    fn next(&self) -> Option<(Self, Change)> {
        let (local, change) = self.local.next()?;
        Some((self.with_local(local), change))
    }

    fn on(&self, listener: Listener) -> ListenerId {
        self.local.on(listener)
    }

    fn off(&self, id: ListenerId) {
        self.local.off(id)
    }

    fn push(&self) -> Result<(), ChangeError> {
        self.exchange(|state| {
            let mut pushed = 0;
            while let Some((down, change)) = state.down.next() {
                state.up = state.up.append(change)?;
                state.down = down;
                pushed += 1;
            }
            debug!(pushed, "pushed branch changes");
            Ok(pushed)
        })
    }

    fn pull(&self) -> Result<(), ChangeError> {
        self.exchange(|state| {
            let mut pulled = 0;
            while let Some((up, change)) = state.up.next() {
                state.down = state.down.reverse_append(change)?;
                state.up = up;
                pulled += 1;
            }
            debug!(pulled, "pulled upstream changes");
            Ok(pulled)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Splice, Value, streams::latest};

    fn replay(base: &str, stream: &impl Stream) -> Value {
        let (_, all) = latest(stream);
        Value::from(base).apply_opt(all.as_ref()).unwrap()
    }

    #[test]
    fn push_then_pull_converges() {
        crate::init_tracing();
        let up = Log::new();
        let down = Branch::new(up.clone());

        down.append(Splice::new(0, "", "local ").into()).unwrap();
        up.append(Splice::new(0, "", "remote ").into()).unwrap();
        assert_eq!(replay("", &up), Value::from("remote "));
        assert_eq!(replay("", &down), Value::from("local "));

        down.push().unwrap();
        down.pull().unwrap();
        assert_eq!(replay("", &up), replay("", &down));
        // Upstream changes win ties on both sides.
        assert_eq!(replay("", &down), Value::from("remote local "));
    }

    #[test]
    fn exchanges_are_idempotent() {
        let up = Log::new();
        let down = Branch::new(up.clone());
        let next = down.append(Splice::new(0, "", "a").into()).unwrap();
        next.push().unwrap();
        down.push().unwrap();
        down.pull().unwrap();
        assert_eq!(replay("", &up), Value::from("a"));
        assert_eq!(replay("", &down), Value::from("a"));
    }

    #[test]
    fn listeners_can_push_without_recursing() {
        let up = Log::new();
        let down = Branch::new(up.clone());
        let pusher = down.clone();
        down.on(Arc::new(move || {
            pusher.push().unwrap();
        }));
        down.append(Splice::new(0, "", "a").into()).unwrap();
        assert_eq!(replay("", &up), Value::from("a"));
    }
}
