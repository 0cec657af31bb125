// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use parking_lot::{Condvar, Mutex};
use std::{collections::VecDeque, sync::Arc, thread};
use tracing::debug;

/// A listener notification waiting to run.
pub type Task = Box<dyn FnOnce() + Send>;

/// Decides when listener notifications run.
pub trait Scheduler: Send + Sync + 'static {
    fn schedule(&self, task: Task);
}

/// Runs every notification immediately, on the appending thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct SyncScheduler;

impl Scheduler for SyncScheduler {
    fn schedule(&self, task: Task) {
        task()
    }
}

/// Queues notifications until they are drained with [`AsyncScheduler::run`] or by a worker
/// running [`AsyncScheduler::run_forever`].
///
/// Tasks run in the order they were scheduled.
#[derive(Default)]
pub struct AsyncScheduler {
    queue: Mutex<Queue>,
    ready: Condvar,
}

#[derive(Default)]
struct Queue {
    tasks: VecDeque<Task>,
    closed: bool,
}

impl AsyncScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of queued tasks.
    pub fn pending(&self) -> usize {
        self.queue.lock().tasks.len()
    }

    /// Runs up to `n` queued tasks without waiting for more, returning how many ran.
    ///
    /// Tasks scheduled while running count towards `n`.
    pub fn run(&self, n: usize) -> usize {
        let mut ran = 0;
        while ran < n {
            let Some(task) = self.queue.lock().tasks.pop_front() else {
                break;
            };
            task();
            ran += 1;
        }
        ran
    }

    /// Runs tasks as they arrive until the scheduler is closed and drained.
    pub fn run_forever(&self) {
        debug!("scheduler loop started");
        loop {
            let task = {
                let mut queue = self.queue.lock();
                loop {
                    if let Some(task) = queue.tasks.pop_front() {
                        break Some(task);
                    }
                    if queue.closed {
                        break None;
                    }
                    self.ready.wait(&mut queue);
                }
            };
            match task {
                Some(task) => task(),
                None => break,
            }
        }
        debug!("scheduler loop stopped");
    }

    /// Runs [`AsyncScheduler::run_forever`] on a dedicated thread.
    pub fn spawn(self: &Arc<Self>) -> thread::JoinHandle<()> {
        let scheduler = Arc::clone(self);
        thread::spawn(move || scheduler.run_forever())
    }

    /// Stops [`AsyncScheduler::run_forever`] once the queue is drained.
    pub fn close(&self) {
        self.queue.lock().closed = true;
        self.ready.notify_all();
    }
}

impl Scheduler for AsyncScheduler {
    fn schedule(&self, task: Task) {
        self.queue.lock().tasks.push_back(task);
        self.ready.notify_one();
    }
}
