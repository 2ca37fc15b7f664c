//! Per-group toast queues with capacity limits, duplicate filtering and countdown-driven
//! auto-dismiss.
//!
//! [`QueueRegistry`] owns one [`MessageQueue`] per display group and a [`Scheduler`].
//! Nothing here sleeps or spawns: timers are handed to the scheduler and applied when it
//! gives them back through [`QueueRegistry::fire`]. [`ManualScheduler`] drives the engine
//! on a virtual clock; `toastq-runtime` drives it with tokio.

mod config;
mod countdown;
mod message;
mod queue;
mod registry;
mod sanitize;
mod scheduler;
mod timers;

pub use config::{
    ConfigError, NotifierConfig, SeverityTtl, capacity_from_limit, default_config_path,
};
pub use countdown::{Countdown, CountdownState, TICK_INTERVAL};
pub use message::{CloseCallback, Message, NewMessage, OpenCallback};
pub use queue::{ClickOutcome, MessageQueue};
pub use registry::QueueRegistry;
pub use sanitize::{HtmlSanitizer, PassthroughSanitizer, Sanitizer, Trusted};
pub use scheduler::{FiredTimer, ManualScheduler, Scheduler, Timer, TimerHandle, TimerKind};
pub use timers::TimerSet;
pub use toastq_types::{
    CloseReason, DEFAULT_GROUP, DisplayFlags, GroupKey, MessageId, Severity, ToastEvent,
    ToastSnapshot, Ttl, ViewOrder,
};
