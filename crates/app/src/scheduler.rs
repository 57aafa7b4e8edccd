//! Cooperative scheduler: one consumer loop, many thread-safe producers.
//!
//! Every publication, every delayed job and every bus command is executed
//! by whoever drains the [`Scheduler`] (the manager loop). Producers hold a
//! [`SchedulerHandle`], which may be cloned freely and used from any
//! context: tokio tasks, input watcher threads, driver interrupt threads.
//! Enqueueing never blocks and never needs a runtime.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::Instant;

use boneio_domain::id::RelayId;
use boneio_domain::message::StateMessage;

/// Unit of work executed on the cooperative loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    /// Send a prepared message.
    Publish(StateMessage),
    /// Read the live state of a relay and publish it.
    SendState(RelayId),
    /// Apply an inbound bus command.
    Command { topic: String, payload: String },
    /// The bus (re)connected: republish unit status and every relay state.
    Announce,
}

#[derive(Debug)]
struct Entry {
    delay: Option<Duration>,
    task: Task,
}

/// Create a scheduler and its first handle.
#[must_use]
pub fn channel() -> (Scheduler, SchedulerHandle) {
    let (tx, rx) = mpsc::unbounded_channel();
    let scheduler = Scheduler {
        rx,
        ready: VecDeque::new(),
        delayed: BinaryHeap::new(),
        seq: 0,
        closed: false,
    };
    (scheduler, SchedulerHandle { tx })
}

/// Thread-safe producer side of the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<Entry>,
}

impl SchedulerHandle {
    /// Run `task` on the loop as soon as possible, after anything already queued.
    pub fn call_soon(&self, task: Task) {
        self.enqueue(Entry { delay: None, task });
    }

    /// Run `task` on the loop once `delay` has elapsed.
    pub fn call_later(&self, delay: Duration, task: Task) {
        self.enqueue(Entry {
            delay: Some(delay),
            task,
        });
    }

    fn enqueue(&self, entry: Entry) {
        if let Err(err) = self.tx.send(entry) {
            tracing::debug!(task = ?err.0.task, "scheduler stopped, task dropped");
        }
    }
}

#[derive(Debug)]
struct Delayed {
    due: Instant,
    seq: u64,
    task: Task,
}

impl PartialEq for Delayed {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Delayed {}

impl PartialOrd for Delayed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Delayed {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .cmp(&other.due)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Consumer side of the scheduler. Owned by the single loop.
#[derive(Debug)]
pub struct Scheduler {
    rx: mpsc::UnboundedReceiver<Entry>,
    ready: VecDeque<Task>,
    delayed: BinaryHeap<Reverse<Delayed>>,
    seq: u64,
    closed: bool,
}

impl Scheduler {
    /// Wait for the next runnable task.
    ///
    /// Immediate tasks run in enqueue order; delayed tasks run once due, in
    /// due order. Returns `None` once every handle is gone and nothing is
    /// left to run.
    pub async fn next(&mut self) -> Option<Task> {
        loop {
            self.drain_channel();
            self.release_due(Instant::now());
            if let Some(task) = self.ready.pop_front() {
                return Some(task);
            }

            let due = self.delayed.peek().map(|Reverse(delayed)| delayed.due);
            match (due, self.closed) {
                (None, true) => return None,
                (None, false) => {
                    let entry = self.rx.recv().await;
                    self.admit(entry);
                }
                (Some(due), true) => tokio::time::sleep_until(due).await,
                (Some(due), false) => {
                    tokio::select! {
                        entry = self.rx.recv() => self.admit(entry),
                        () = tokio::time::sleep_until(due) => {}
                    }
                }
            }
        }
    }

    /// Return a task that is runnable right now, without waiting.
    pub fn try_next(&mut self) -> Option<Task> {
        self.drain_channel();
        self.release_due(Instant::now());
        self.ready.pop_front()
    }

    /// Admit everything already enqueued, in enqueue order.
    fn drain_channel(&mut self) {
        while !self.closed {
            match self.rx.try_recv() {
                Ok(entry) => self.admit(Some(entry)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.closed = true,
            }
        }
    }

    fn admit(&mut self, entry: Option<Entry>) {
        let Some(Entry { delay, task }) = entry else {
            self.closed = true;
            return;
        };
        match delay {
            None => self.ready.push_back(task),
            Some(delay) => {
                self.seq += 1;
                self.delayed.push(Reverse(Delayed {
                    due: Instant::now() + delay,
                    seq: self.seq,
                    task,
                }));
            }
        }
    }

    fn release_due(&mut self, now: Instant) {
        while self
            .delayed
            .peek()
            .is_some_and(|Reverse(delayed)| delayed.due <= now)
        {
            if let Some(Reverse(delayed)) = self.delayed.pop() {
                self.ready.push_back(delayed.task);
            }
        }
    }
}
