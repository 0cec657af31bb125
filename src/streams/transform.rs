// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{Listener, ListenerId, Stream};
use crate::{Change, ChangeError};
use std::{fmt, sync::Arc};

/// Rewrites a change on its way through a [`Transform`].
pub type Rewrite = Arc<dyn Fn(Change) -> Change + Send + Sync>;

/// Wraps a stream, rewriting appended changes with `on_append` before they reach the parent and
/// changes read from the parent with `on_next`.
#[derive(Clone)]
pub struct Transform<S> {
    parent: S,
    on_append: Rewrite,
    on_next: Rewrite,
}

impl<S: Stream> Transform<S> {
    pub fn new(parent: S, on_append: Rewrite, on_next: Rewrite) -> Self {
        Self {
            parent,
            on_append,
            on_next,
        }
    }

    pub fn parent(&self) -> &S {
        &self.parent
    }

    fn wrap(&self, parent: S) -> Self {
        Self {
            parent,
            on_append: Arc::clone(&self.on_append),
            on_next: Arc::clone(&self.on_next),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Transform<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}

impl<S: Stream> Stream for Transform<S> {
    fn append(&self, change: Change) -> Result<Self, ChangeError> {
        Ok(self.wrap(self.parent.append((self.on_append)(change))?))
    }

    fn reverse_append(&self, change: Change) -> Result<Self, ChangeError> {
        Ok(self.wrap(self.parent.reverse_append((self.on_append)(change))?))
    }

    fn next(&self) -> Option<(Self, Change)> {
        let (parent, change) = self.parent.next()?;
        Some((self.wrap(parent), (self.on_next)(change)))
    }

    fn on(&self, listener: Listener) -> ListenerId {
        self.parent.on(listener)
    }

    fn off(&self, id: ListenerId) {
        self.parent.off(id)
    }

    fn push(&self) -> Result<(), ChangeError> {
        self.parent.push()
    }

    fn pull(&self) -> Result<(), ChangeError> {
        self.parent.pull()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Key, streams::Log};

    #[test]
    fn rewrites_both_directions() {
        let parent = Log::new();
        // Appends land under "doc"; reading strips the wrapper again.
        let t = Transform::new(
            parent.clone(),
            Arc::new(|c: Change| c.under(Key::from("doc"))),
            Arc::new(|c: Change| match c {
                Change::PathChange(p) => *p.change,
                other => other,
            }),
        );
        let change = Change::from(crate::Replace::new(1, 2));
        t.append(change.clone()).unwrap();

        let (_, raw) = parent.next().unwrap();
        assert_eq!(raw, Change::path([Key::from("doc")], change.clone()));
        let (_, seen) = t.next().unwrap();
        assert_eq!(seen, change);
    }
}
