// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use crate::determinism_enabled;
use chrono::Utc;
use std::{
    fmt,
    sync::atomic::{AtomicI64, Ordering},
};

static LAST_EPOCH: AtomicI64 = AtomicI64::new(i64::MIN);
static DETERMINISTIC_EPOCH: AtomicI64 = AtomicI64::new(0);

/// A globally unique, totally ordered identifier.
///
/// Ranks order first by their epoch, which is the wall-clock time of creation in nanoseconds,
/// and then by a random nonce. Epochs handed out by one process never go backwards, so a rank
/// created after another in the same process is always greater.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub struct Rank {
    epoch: i64,
    nonce: [i64; 4],
}

impl Rank {
    /// Allocates a fresh rank.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        if determinism_enabled() {
            let epoch = DETERMINISTIC_EPOCH.fetch_add(1, Ordering::Relaxed);
            return Self {
                epoch,
                nonce: [0; 4],
            };
        }
        let now = Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_else(|| Utc::now().timestamp_micros());
        Self {
            epoch: monotonic(now),
            nonce: rand::random(),
        }
    }

    pub const fn from_parts(epoch: i64, nonce: [i64; 4]) -> Self {
        Self { epoch, nonce }
    }

    pub fn epoch(&self) -> i64 {
        self.epoch
    }

    pub fn nonce(&self) -> [i64; 4] {
        self.nonce
    }
}

/// Returns the larger of `now` and one past the last epoch handed out.
fn monotonic(now: i64) -> i64 {
    let next = |last: i64| now.max(last.saturating_add(1));
    let (Ok(last) | Err(last)) =
        LAST_EPOCH.fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| Some(next(last)));
    next(last)
}

impl fmt::Debug for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}.{:x}", self.epoch, self.nonce[0])
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.nonce;
        write!(f, "{:x}.{a:x}{b:x}{c:x}{d:x}", self.epoch)
    }
}
