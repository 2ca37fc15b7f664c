//! Clock/scheduler seam.
//!
//! Queues never sleep. They hand a [`Timer`] to a [`Scheduler`] and get it back through
//! [`QueueRegistry::fire`](crate::QueueRegistry::fire) once its deadline has passed, on the
//! same thread that performs every other mutation.

use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

use toastq_types::{GroupKey, MessageId};

/// Handle of a scheduled timer. Unique per scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub u64);

/// What a timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Removes the toast.
    Dismiss,
    /// Decrements the seconds-left counter.
    CountdownTick,
}

/// A pending callback, addressed to one toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    /// Group of the target toast.
    pub group: GroupKey,
    /// Target toast.
    pub message: MessageId,
    /// Action to run.
    pub kind: TimerKind,
}

/// A timer whose deadline has passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredTimer {
    /// Handle returned by [`Scheduler::schedule`].
    pub handle: TimerHandle,
    /// The timer itself.
    pub timer: Timer,
}

/// Delayed-callback provider.
pub trait Scheduler {
    /// Arranges for `timer` to be delivered after `delay`.
    fn schedule(&mut self, timer: Timer, delay: Duration) -> TimerHandle;

    /// Prevents delivery of a pending timer. No-op for fired or unknown handles.
    fn cancel(&mut self, handle: TimerHandle);

    /// Called when a fired timer is applied, so the scheduler can drop its bookkeeping.
    fn fired(&mut self, _handle: TimerHandle) {}
}

/// Virtual-clock scheduler. Time only moves when [`ManualScheduler::pop_due`] or
/// [`ManualScheduler::set_now`] is called.
///
/// Timers with equal deadlines are delivered in the order they were scheduled.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    next_handle: u64,
    pending: BTreeMap<(Duration, TimerHandle), Timer>,
    deadlines: HashMap<TimerHandle, Duration>,
}

impl ManualScheduler {
    /// Creates a scheduler with its clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Number of timers still pending.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Pops the earliest timer due at or before `until`, moving the clock to its deadline.
    pub fn pop_due(&mut self, until: Duration) -> Option<FiredTimer> {
        let (&(deadline, handle), _) = self.pending.first_key_value()?;
        if deadline > until {
            return None;
        }

        let timer = self.pending.remove(&(deadline, handle))?;
        self.deadlines.remove(&handle);
        self.now = self.now.max(deadline);
        Some(FiredTimer { handle, timer })
    }

    /// Moves the clock forward to `now`. Never moves it backwards.
    pub fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, timer: Timer, delay: Duration) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;

        let deadline = self.now.saturating_add(delay);
        self.pending.insert((deadline, handle), timer);
        self.deadlines.insert(handle, deadline);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(deadline) = self.deadlines.remove(&handle) {
            self.pending.remove(&(deadline, handle));
        }
    }
}
