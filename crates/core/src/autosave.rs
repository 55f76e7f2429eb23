//! Debounce timer and single-slot write queue for the autosave partition.

use crate::clock::Tick;
use chrono::{DateTime, Utc};

/// An encoded snapshot waiting to be written.
#[derive(Debug, Clone)]
pub struct PendingWrite {
    /// Graph revision the snapshot was taken at
    pub revision: u64,
    /// `last_modified` written into the snapshot
    pub stamp: DateTime<Utc>,
    pub bytes: Vec<u8>,
}

/// Coalesces bursts of edits into one write.
///
/// Every mutation pushes the deadline out by the debounce window. Once due,
/// the caller encodes a snapshot and enqueues it. The queue holds at most
/// one snapshot: enqueueing while one is already waiting replaces it, and
/// [`AutosaveQueue::take_next`] hands out nothing while a write is in flight.
#[derive(Debug)]
pub struct AutosaveQueue {
    debounce_ms: u64,
    deadline: Option<Tick>,
    queued: Option<PendingWrite>,
    in_flight: bool,
}

impl AutosaveQueue {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            debounce_ms,
            deadline: None,
            queued: None,
            in_flight: false,
        }
    }

    /// Arm the timer, or push it back if already armed.
    pub fn arm(&mut self, now: Tick) {
        self.deadline = Some(now.after(self.debounce_ms));
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Tick> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_due(&self, now: Tick) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Put a snapshot in the slot. Returns the older snapshot it superseded, if any.
    pub fn enqueue(&mut self, write: PendingWrite) -> Option<PendingWrite> {
        let superseded = self.queued.replace(write);
        if let Some(old) = &superseded {
            log::debug!("autosave of revision {} superseded", old.revision);
        }
        superseded
    }

    pub fn has_queued(&self) -> bool {
        self.queued.is_some()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Take the queued snapshot and mark it in flight. `None` if the slot is
    /// empty or another write has not finished.
    pub fn take_next(&mut self) -> Option<PendingWrite> {
        if self.in_flight {
            return None;
        }
        let write = self.queued.take()?;
        self.in_flight = true;
        Some(write)
    }

    /// Mark the in-flight write as finished, successfully or not.
    pub fn finish(&mut self) {
        self.in_flight = false;
    }

    /// Take the queued snapshot along with a guard that holds the slot until
    /// the write resolves. If the guard is dropped before
    /// [`InFlight::complete`], the slot is released and the timer re-armed
    /// at `retry_at`, so an abandoned write is retried on the next cycle.
    pub fn start_write(&mut self, retry_at: Tick) -> Option<(PendingWrite, InFlight<'_>)> {
        let write = self.take_next()?;
        let guard = InFlight {
            queue: self,
            retry_at,
            completed: false,
        };
        Some((write, guard))
    }

    /// Drop the timer and any queued snapshot. An in-flight write is not affected.
    pub fn cancel(&mut self) {
        self.deadline = None;
        if let Some(dropped) = self.queued.take() {
            log::debug!("dropped queued autosave of revision {}", dropped.revision);
        }
    }

    /// True while a write is armed, queued, or in flight.
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some() || self.queued.is_some() || self.in_flight
    }
}

/// A write handed out by [`AutosaveQueue::start_write`].
#[must_use = "dropping the guard abandons the write"]
pub struct InFlight<'a> {
    queue: &'a mut AutosaveQueue,
    retry_at: Tick,
    completed: bool,
}

impl InFlight<'_> {
    /// The store answered, successfully or not.
    pub fn complete(mut self) {
        self.completed = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.queue.finish();
        if !self.completed {
            log::warn!("autosave write abandoned before it finished, retrying");
            self.queue.arm(self.retry_at);
        }
    }
}
