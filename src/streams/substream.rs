// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{Listener, ListenerId, Stream};
use crate::{Change, ChangeError, Key, refs::Path};
use tracing::warn;

/// A view of the part of a parent stream below a path.
///
/// Appends are wrapped in a path change before they reach the parent. Walking the substream
/// skips parent changes that do not touch the path and follows the path as it moves, for
/// instance when elements are inserted before it. Once the target is removed or replaced from
/// above, the substream has no further successors.
///
/// ```rust
/// use convergent::{Change, Replace, Splice, path, streams::{Log, Stream, Substream}};
///
/// let parent = Log::new();
/// let item = Substream::new(parent.clone(), path![1]);
/// parent.append(Change::path(path![0], Replace::new(1, 2))).unwrap();
/// parent.append(Change::path(path![1], Replace::new(3, 4))).unwrap();
///
/// let (_, change) = item.next().unwrap();
/// assert_eq!(change, Replace::new(3, 4).into());
/// ```
#[derive(Clone, Debug)]
pub struct Substream<S> {
    parent: S,
    path: Path,
}

impl<S: Stream> Substream<S> {
    pub fn new(parent: S, path: impl IntoIterator<Item = Key>) -> Self {
        Self {
            parent,
            path: Path::new(path),
        }
    }

    /// Where this substream currently points in its parent.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parent(&self) -> &S {
        &self.parent
    }

    fn scoped(&self, change: Change) -> Change {
        Change::path(self.path.keys().iter().cloned(), change)
    }
}

impl<S: Stream> Stream for Substream<S> {
    fn append(&self, change: Change) -> Result<Self, ChangeError> {
        Ok(Self {
            parent: self.parent.append(self.scoped(change))?,
            path: self.path.clone(),
        })
    }

    fn reverse_append(&self, change: Change) -> Result<Self, ChangeError> {
        Ok(Self {
            parent: self.parent.reverse_append(self.scoped(change))?,
            path: self.path.clone(),
        })
    }

    fn next(&self) -> Option<(Self, Change)> {
        let mut parent = self.parent.clone();
        let mut path = self.path.clone();
        loop {
            let (next, change) = parent.next()?;
            let (moved, affected) = match path.merge(&change) {
                Ok(merged) => merged,
                Err(error) => {
                    warn!(%error, ?path, "substream cannot follow its parent");
                    return None;
                }
            };
            // The target is gone.
            let moved = moved?;
            parent = next;
            path = moved;
            if let Some(affected) = affected {
                return Some((Self { parent, path }, affected));
            }
        }
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
