//! Polled task schedule replacing fire-and-forget timers.
//!
//! Deferred work is stored as (fire-time, owner, payload) entries and
//! drained once per tick against the simulation clock. Cancellation is
//! removal by owner handle, which cleanly drops pending timers when their
//! owning entity is disposed.

use std::time::Duration;

/// Handle identifying the owner of scheduled tasks for cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Creates a new owner handle with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the handle.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

#[derive(Clone, Debug)]
struct Task<T> {
    fire_at: Duration,
    sequence: u64,
    owner: OwnerId,
    payload: T,
}

/// Scheduled-task list polled once per tick.
///
/// Entries that share a fire time drain in insertion order so replays stay
/// deterministic.
#[derive(Clone, Debug)]
pub struct Schedule<T> {
    tasks: Vec<Task<T>>,
    next_sequence: u64,
}

impl<T> Schedule<T> {
    /// Creates an empty schedule.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tasks: Vec::new(),
            next_sequence: 0,
        }
    }

    /// Queues a task to fire once the clock reaches `fire_at`.
    pub fn insert(&mut self, fire_at: Duration, owner: OwnerId, payload: T) {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.tasks.push(Task {
            fire_at,
            sequence,
            owner,
            payload,
        });
    }

    /// Drops every task queued by the provided owner, returning the count.
    pub fn cancel_owner(&mut self, owner: OwnerId) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.owner != owner);
        before - self.tasks.len()
    }

    /// Removes and returns every task due at `now`, ordered by fire time.
    #[must_use]
    pub fn drain_due(&mut self, now: Duration) -> Vec<T> {
        let mut due: Vec<Task<T>> = Vec::new();
        let mut index = 0;
        while index < self.tasks.len() {
            if self.tasks[index].fire_at <= now {
                due.push(self.tasks.swap_remove(index));
            } else {
                index += 1;
            }
        }
        due.sort_by_key(|task| (task.fire_at, task.sequence));
        due.into_iter().map(|task| task.payload).collect()
    }

    /// Fire time of the earliest pending task, if any.
    #[must_use]
    pub fn next_fire(&self) -> Option<Duration> {
        self.tasks.iter().map(|task| task.fire_at).min()
    }

    /// Number of pending tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Reports whether no tasks are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<T> Default for Schedule<T> {
    fn default() -> Self {
        Self::new()
    }
}
