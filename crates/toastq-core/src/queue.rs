use toastq_types::{CloseReason, GroupKey, MessageId, Severity, ViewOrder};
use tracing::debug;

use crate::{
    countdown::TICK_INTERVAL,
    message::Message,
    sanitize::Trusted,
    scheduler::{FiredTimer, Scheduler, Timer, TimerKind},
};

/// Result of a click on a toast body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// No such toast in the group.
    Missing,
    /// The toast is `click_to_close`; nothing changed.
    Ignored,
    /// Timers cancelled and countdown frozen; the next click closes it.
    Stopped,
    /// The toast was removed.
    Closed,
}

/// Ordered, capacity-bounded toasts of one display group.
///
/// Insertion order is arrival order. Every removal path (delete, eviction, destroy-all,
/// expiry) cancels the toast's timers and runs its close callback exactly once.
#[derive(Debug)]
pub struct MessageQueue {
    group: GroupKey,
    messages: Vec<Message>,
    capacity: Option<usize>,
    unique_only: bool,
}

impl MessageQueue {
    /// Creates an empty, unbounded queue.
    pub fn new(group: GroupKey, unique_only: bool) -> Self {
        Self {
            group,
            messages: Vec::new(),
            capacity: None,
            unique_only,
        }
    }

    /// Sets the initial capacity of an empty queue. `Some(0)` is treated as unbounded.
    pub fn with_capacity(mut self, capacity: Option<usize>) -> Self {
        self.capacity = capacity.filter(|n| *n > 0);
        self
    }

    pub fn group(&self) -> &GroupKey {
        &self.group
    }

    /// Maximum number of toasts, `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn unique_only(&self) -> bool {
        self.unique_only
    }

    pub fn set_unique_only(&mut self, unique_only: bool) {
        self.unique_only = unique_only;
    }

    /// Changes the capacity and evicts the oldest toasts that no longer fit.
    /// `Some(0)` is treated as unbounded.
    pub fn set_capacity<S: Scheduler + ?Sized>(&mut self, capacity: Option<usize>, scheduler: &mut S) {
        self.capacity = capacity.filter(|n| *n > 0);
        self.cut_messages(scheduler);
    }

    /// Toasts in insertion order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Toasts in the requested order. Never reorders the queue itself.
    pub fn messages_in(&self, order: ViewOrder) -> Vec<&Message> {
        match order {
            ViewOrder::Insertion => self.messages.iter().collect(),
            ViewOrder::Reverse => self.messages.iter().rev().collect(),
        }
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id() == id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Newest live toast with the same text, severity and title.
    pub fn find_duplicate(
        &self,
        text: &Trusted,
        severity: Option<Severity>,
        title: Option<&str>,
    ) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.matches(text, severity, title))
    }

    /// Accepts a toast, or returns `None` when uniqueness rejects it.
    ///
    /// A rejected toast is dropped without running any callback.
    pub fn add_message<S: Scheduler + ?Sized>(
        &mut self,
        message: Message,
        scheduler: &mut S,
    ) -> Option<&Message> {
        if self.unique_only
            && let Some(existing) =
                self.find_duplicate(message.text(), message.severity(), message.title())
        {
            debug!(group = %self.group, existing = %existing.id(), "duplicate toast rejected");
            return None;
        }

        let id = message.id();
        self.messages.push(message);
        self.cut_messages(scheduler);

        let group = self.group.clone();
        let message = self.messages.last_mut()?;
        message.open();

        if let Some(ttl) = message.ttl().duration() {
            let dismiss = scheduler.schedule(
                Timer {
                    group: group.clone(),
                    message: id,
                    kind: TimerKind::Dismiss,
                },
                ttl,
            );
            message.timers.insert(dismiss, TimerKind::Dismiss);

            let tick = scheduler.schedule(
                Timer {
                    group: group.clone(),
                    message: id,
                    kind: TimerKind::CountdownTick,
                },
                TICK_INTERVAL,
            );
            message.timers.insert(tick, TimerKind::CountdownTick);
        }

        debug!(group = %group, %id, ttl_ms = message.ttl().as_millis(), "toast accepted");
        Some(&*message)
    }

    /// Removes a toast. Returns `false`, changing nothing, when it is not in the queue.
    pub fn delete_message<S: Scheduler + ?Sized>(
        &mut self,
        id: MessageId,
        reason: CloseReason,
        scheduler: &mut S,
    ) -> bool {
        let Some(index) = self.position(id) else {
            debug!(group = %self.group, %id, ?reason, "delete of absent toast ignored");
            return false;
        };

        let mut message = self.messages.remove(index);
        message.set_closing();
        message.close(reason, scheduler);
        true
    }

    /// Removes every toast, newest first. Returns how many were removed.
    pub fn destroy_all_messages<S: Scheduler + ?Sized>(&mut self, scheduler: &mut S) -> usize {
        let mut removed = 0;
        while let Some(mut message) = self.messages.pop() {
            message.close(CloseReason::Destroyed, scheduler);
            removed += 1;
        }
        removed
    }

    /// Evicts the oldest toasts while the queue is over capacity.
    pub fn cut_messages<S: Scheduler + ?Sized>(&mut self, scheduler: &mut S) -> usize {
        let Some(capacity) = self.capacity else {
            return 0;
        };

        let excess = self.messages.len().saturating_sub(capacity);
        if excess == 0 {
            return 0;
        }

        let evicted: Vec<Message> = self.messages.drain(..excess).collect();
        debug!(group = %self.group, excess, capacity, "evicting oldest toasts");
        for mut message in evicted {
            message.close(CloseReason::Evicted, scheduler);
        }
        excess
    }

    /// Handles a click on a toast body.
    ///
    /// The first click cancels the toast's timers and freezes its countdown; a second
    /// click removes it. `click_to_close` toasts ignore clicks.
    pub fn click<S: Scheduler + ?Sized>(&mut self, id: MessageId, scheduler: &mut S) -> ClickOutcome {
        let Some(index) = self.position(id) else {
            return ClickOutcome::Missing;
        };

        let message = &mut self.messages[index];
        if message.flags().click_to_close {
            return ClickOutcome::Ignored;
        }

        message.timers.cancel_all(scheduler);
        if let Some(countdown) = message.countdown_mut() {
            countdown.stop();
        }

        if message.is_closing() {
            self.delete_message(id, CloseReason::Dismissed, scheduler);
            ClickOutcome::Closed
        } else {
            message.set_closing();
            ClickOutcome::Stopped
        }
    }

    /// Applies a fired timer. Timers for absent toasts, or whose handle the toast no
    /// longer owns, are ignored.
    pub fn fire<S: Scheduler + ?Sized>(&mut self, fired: FiredTimer, scheduler: &mut S) {
        let id = fired.timer.message;
        let Some(index) = self.position(id) else {
            debug!(group = %self.group, %id, "timer for absent toast ignored");
            return;
        };

        let Some(kind) = self.messages[index].timers.take(fired.handle) else {
            debug!(group = %self.group, %id, handle = fired.handle.0, "stale timer ignored");
            return;
        };

        match kind {
            TimerKind::Dismiss => {
                self.delete_message(id, CloseReason::Expired, scheduler);
            }
            TimerKind::CountdownTick => self.tick(index, scheduler),
        }
    }

    fn tick<S: Scheduler + ?Sized>(&mut self, index: usize, scheduler: &mut S) {
        let message = &mut self.messages[index];
        let id = message.id();
        let Some(countdown) = message.countdown_mut() else {
            return;
        };

        if countdown.tick() {
            let handle = scheduler.schedule(
                Timer {
                    group: self.group.clone(),
                    message: id,
                    kind: TimerKind::CountdownTick,
                },
                TICK_INTERVAL,
            );
            message.timers.insert(handle, TimerKind::CountdownTick);
        }
    }

    fn position(&self, id: MessageId) -> Option<usize> {
        self.messages.iter().position(|m| m.id() == id)
    }
}
