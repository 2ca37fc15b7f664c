use std::{collections::HashMap, time::Duration};

use toastq_types::{CloseReason, GroupKey, MessageId, ViewOrder};
use tracing::{debug, info};

use crate::{
    config::NotifierConfig,
    message::{Message, NewMessage},
    queue::{ClickOutcome, MessageQueue},
    sanitize::{HtmlSanitizer, Sanitizer},
    scheduler::{FiredTimer, ManualScheduler, Scheduler},
};

/// Maps display groups to their [`MessageQueue`], creating queues on first use.
///
/// The registry owns the scheduler, so every mutation, including fired timers delivered
/// through [`QueueRegistry::fire`], goes through `&mut self` on one thread.
pub struct QueueRegistry<S: Scheduler> {
    config: NotifierConfig,
    scheduler: S,
    sanitizer: Box<dyn Sanitizer>,
    queues: HashMap<GroupKey, MessageQueue>,
    next_id: u64,
}

impl<S: Scheduler> QueueRegistry<S> {
    /// Creates a registry with default settings and HTML sanitization.
    pub fn new(scheduler: S) -> Self {
        Self::with_config(NotifierConfig::default(), scheduler, HtmlSanitizer)
    }

    pub fn with_config(
        config: NotifierConfig,
        scheduler: S,
        sanitizer: impl Sanitizer + 'static,
    ) -> Self {
        Self {
            config,
            scheduler,
            sanitizer: Box::new(sanitizer),
            queues: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Returns the queue of `group`, creating it if needed.
    pub fn get_queue(&mut self, group: &GroupKey) -> &mut MessageQueue {
        queue_entry(&mut self.queues, &self.config, group)
    }

    /// Returns the queue of `group` without creating it.
    pub fn queue(&self, group: &GroupKey) -> Option<&MessageQueue> {
        self.queues.get(group)
    }

    /// Sets the capacity of `group` and evicts what no longer fits. Safe to call again
    /// with a different capacity.
    pub fn init_queue(&mut self, group: &GroupKey, capacity: Option<usize>) -> &mut MessageQueue {
        let queue = queue_entry(&mut self.queues, &self.config, group);
        queue.set_capacity(capacity, &mut self.scheduler);
        info!(group = %group, limit = ?queue.capacity(), "queue initialized");
        queue
    }

    /// Toasts of `group` in insertion order.
    pub fn get_all_messages(&mut self, group: &GroupKey) -> &[Message] {
        self.get_queue(group).messages()
    }

    /// Toasts of `group` in the configured read-back order.
    pub fn ordered_messages(&mut self, group: &GroupKey) -> Vec<&Message> {
        let order = if self.config.reverse_order {
            ViewOrder::Reverse
        } else {
            ViewOrder::Insertion
        };
        self.get_queue(group).messages_in(order)
    }

    /// Removes every toast of `group`. The queue stays registered.
    pub fn destroy_all_messages(&mut self, group: &GroupKey) -> usize {
        let queue = queue_entry(&mut self.queues, &self.config, group);
        let removed = queue.destroy_all_messages(&mut self.scheduler);
        info!(group = %group, removed, "destroyed all toasts");
        removed
    }

    /// Routes a submission to its group. Returns `None` when it is a duplicate.
    pub fn add_message(&mut self, submission: NewMessage) -> Option<&Message> {
        let group = submission.group.clone();
        let ttl = self
            .config
            .resolve_ttl(submission.ttl, submission.severity);
        let flags = submission
            .flags
            .unwrap_or_else(|| self.config.default_flags());
        let text = self.sanitizer.sanitize(&submission.text);

        let id = MessageId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);

        let message = Message::accept(id, submission, text, ttl, flags);
        let queue = queue_entry(&mut self.queues, &self.config, &group);
        queue.add_message(message, &mut self.scheduler)
    }

    /// Removes a toast on request. Returns `false` if it was already gone.
    pub fn delete_message(&mut self, group: &GroupKey, id: MessageId) -> bool {
        let queue = queue_entry(&mut self.queues, &self.config, group);
        queue.delete_message(id, CloseReason::Dismissed, &mut self.scheduler)
    }

    /// Handles a click on a toast body; see [`MessageQueue::click`].
    pub fn click(&mut self, group: &GroupKey, id: MessageId) -> ClickOutcome {
        let queue = queue_entry(&mut self.queues, &self.config, group);
        queue.click(id, &mut self.scheduler)
    }

    /// Applies a timer handed back by the scheduler.
    pub fn fire(&mut self, fired: FiredTimer) {
        self.scheduler.fired(fired.handle);
        let Some(queue) = self.queues.get_mut(&fired.timer.group) else {
            debug!(group = %fired.timer.group, "timer for unknown group ignored");
            return;
        };
        queue.fire(fired, &mut self.scheduler);
    }

    /// Registered groups, in no particular order.
    pub fn groups(&self) -> impl Iterator<Item = &GroupKey> {
        self.queues.keys()
    }

    /// Destroys every toast in every group and forgets all queues.
    pub fn reset(&mut self) {
        for (group, mut queue) in self.queues.drain() {
            let removed = queue.destroy_all_messages(&mut self.scheduler);
            debug!(group = %group, removed, "queue dropped on reset");
        }
    }
}

impl QueueRegistry<ManualScheduler> {
    /// Moves the virtual clock forward by `by`, applying every timer that comes due.
    /// Returns the number of timers applied.
    pub fn advance(&mut self, by: Duration) -> usize {
        let until = self.scheduler.now().saturating_add(by);
        let mut applied = 0;
        while let Some(fired) = self.scheduler.pop_due(until) {
            self.fire(fired);
            applied += 1;
        }
        self.scheduler.set_now(until);
        applied
    }
}

impl<S: Scheduler + std::fmt::Debug> std::fmt::Debug for QueueRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueRegistry")
            .field("config", &self.config)
            .field("scheduler", &self.scheduler)
            .field("queues", &self.queues)
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

fn queue_entry<'a>(
    queues: &'a mut HashMap<GroupKey, MessageQueue>,
    config: &NotifierConfig,
    group: &GroupKey,
) -> &'a mut MessageQueue {
    queues.entry(group.clone()).or_insert_with(|| {
        debug!(group = %group, "creating queue");
        MessageQueue::new(group.clone(), config.only_unique)
            .with_capacity(config.default_capacity())
    })
}
