use crate::scheduler::{Scheduler, TimerHandle, TimerKind};

/// Timers owned by one toast.
///
/// A handle leaves the set either when its timer fires ([`TimerSet::take`]) or when the
/// whole set is released ([`TimerSet::cancel_all`]); each handle is cancelled at most once.
#[derive(Debug, Default)]
pub struct TimerSet {
    handles: Vec<(TimerHandle, TimerKind)>,
}

impl TimerSet {
    /// Records ownership of a scheduled timer.
    pub fn insert(&mut self, handle: TimerHandle, kind: TimerKind) {
        self.handles.push((handle, kind));
    }

    /// Removes a fired handle. `None` means the handle is not owned here (cancelled or stale).
    pub fn take(&mut self, handle: TimerHandle) -> Option<TimerKind> {
        let index = self.handles.iter().position(|(h, _)| *h == handle)?;
        Some(self.handles.swap_remove(index).1)
    }

    /// Cancels every owned timer, leaving the set empty. Returns how many were cancelled.
    pub fn cancel_all<S: Scheduler + ?Sized>(&mut self, scheduler: &mut S) -> usize {
        let count = self.handles.len();
        for (handle, _) in self.handles.drain(..) {
            scheduler.cancel(handle);
        }
        count
    }

    /// Number of live timers.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns `true` when no timer is live.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
