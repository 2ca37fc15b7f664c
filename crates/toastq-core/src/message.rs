use std::fmt;

use toastq_types::{CloseReason, DisplayFlags, GroupKey, MessageId, Severity, ToastSnapshot, Ttl};
use tracing::debug;

use crate::{
    countdown::{Countdown, CountdownState},
    sanitize::Trusted,
    scheduler::Scheduler,
    timers::TimerSet,
};

/// Runs once, right after a toast is accepted.
pub type OpenCallback = Box<dyn FnOnce() + Send>;

/// Runs once, when a toast leaves its queue for any reason.
pub type CloseCallback = Box<dyn FnOnce(CloseReason) + Send>;

type CloseObserver = Box<dyn FnOnce(MessageId, CloseReason) + Send>;

/// A toast submission.
///
/// `ttl` and `flags` left as `None` are filled from the registry's
/// [`NotifierConfig`](crate::NotifierConfig).
pub struct NewMessage {
    /// Raw text, sanitized on acceptance.
    pub text: String,
    /// Severity, if any.
    pub severity: Option<Severity>,
    /// Optional title.
    pub title: Option<String>,
    /// Explicit TTL; `None` uses the per-severity default.
    pub ttl: Option<Ttl>,
    /// Target group.
    pub group: GroupKey,
    /// Explicit flags; `None` uses the configured defaults.
    pub flags: Option<DisplayFlags>,
    on_open: Option<OpenCallback>,
    on_close: Option<CloseCallback>,
    close_observer: Option<CloseObserver>,
}

impl NewMessage {
    /// A toast without severity in the default group.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            severity: None,
            title: None,
            ttl: None,
            group: GroupKey::default(),
            flags: None,
            on_open: None,
            on_close: None,
            close_observer: None,
        }
    }

    /// A toast of the given severity.
    pub fn with_severity(severity: Severity, text: impl Into<String>) -> Self {
        Self::new(text).severity(severity)
    }

    /// Shortcut for [`Severity::Success`].
    pub fn success(text: impl Into<String>) -> Self {
        Self::with_severity(Severity::Success, text)
    }

    /// Shortcut for [`Severity::Error`].
    pub fn error(text: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, text)
    }

    /// Shortcut for [`Severity::Info`].
    pub fn info(text: impl Into<String>) -> Self {
        Self::with_severity(Severity::Info, text)
    }

    /// Shortcut for [`Severity::Warning`].
    pub fn warning(text: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, text)
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn ttl(mut self, ttl: impl Into<Ttl>) -> Self {
        self.ttl = Some(ttl.into());
        self
    }

    /// Sets the TTL from raw milliseconds; see [`Ttl::from_millis`].
    pub fn ttl_millis(mut self, millis: f64) -> Self {
        self.ttl = Some(Ttl::from_millis(millis));
        self
    }

    pub fn group(mut self, group: impl Into<GroupKey>) -> Self {
        self.group = group.into();
        self
    }

    pub fn flags(mut self, flags: DisplayFlags) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn on_open(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_open = Some(Box::new(callback));
        self
    }

    pub fn on_close(mut self, callback: impl FnOnce(CloseReason) + Send + 'static) -> Self {
        self.on_close = Some(Box::new(callback));
        self
    }

    /// Adds a close observer that also receives the toast id. It runs after the caller's
    /// close callback, on every removal path.
    pub fn observe_close(
        mut self,
        observer: impl FnOnce(MessageId, CloseReason) + Send + 'static,
    ) -> Self {
        self.close_observer = Some(Box::new(observer));
        self
    }
}

impl fmt::Debug for NewMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewMessage")
            .field("text", &self.text)
            .field("severity", &self.severity)
            .field("title", &self.title)
            .field("ttl", &self.ttl)
            .field("group", &self.group)
            .field("flags", &self.flags)
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("close_observer", &self.close_observer.is_some())
            .finish()
    }
}

/// A toast living in a [`MessageQueue`](crate::MessageQueue).
pub struct Message {
    id: MessageId,
    group: GroupKey,
    severity: Option<Severity>,
    title: Option<String>,
    text: Trusted,
    flags: DisplayFlags,
    ttl: Ttl,
    countdown: Option<Countdown>,
    pub(crate) timers: TimerSet,
    on_open: Option<OpenCallback>,
    on_close: Option<CloseCallback>,
    closing: bool,
}

impl Message {
    pub(crate) fn accept(
        id: MessageId,
        submission: NewMessage,
        text: Trusted,
        ttl: Ttl,
        flags: DisplayFlags,
    ) -> Self {
        let on_close = match (submission.on_close, submission.close_observer) {
            (user, Some(observer)) => Some(Box::new(move |reason| {
                if let Some(user) = user {
                    user(reason);
                }
                observer(id, reason);
            }) as CloseCallback),
            (user, None) => user,
        };

        Self {
            id,
            group: submission.group,
            severity: submission.severity,
            title: submission.title,
            text,
            flags,
            ttl,
            countdown: ttl.duration().map(Countdown::new),
            timers: TimerSet::default(),
            on_open: submission.on_open,
            on_close,
            closing: false,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn group(&self) -> &GroupKey {
        &self.group
    }

    pub fn severity(&self) -> Option<Severity> {
        self.severity
    }

    /// Explicit title only.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Explicit title, falling back to the severity's default title.
    pub fn display_title(&self) -> Option<&str> {
        self.title
            .as_deref()
            .or_else(|| self.severity.map(Severity::default_title))
    }

    pub fn text(&self) -> &Trusted {
        &self.text
    }

    pub fn flags(&self) -> DisplayFlags {
        self.flags
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    /// Seconds left, for toasts with a TTL. Keeps the fractional part of the TTL.
    pub fn countdown(&self) -> Option<f64> {
        self.countdown.as_ref().map(Countdown::remaining)
    }

    pub fn countdown_state(&self) -> Option<CountdownState> {
        self.countdown.as_ref().map(Countdown::state)
    }

    /// Whether a renderer should draw the counter.
    pub fn show_countdown(&self) -> bool {
        !self.flags.disable_countdown && self.ttl.is_positive()
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    /// Number of timers still owned.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn snapshot(&self) -> ToastSnapshot {
        ToastSnapshot {
            id: self.id,
            group: self.group.clone(),
            severity: self.severity,
            title: self.display_title().map(ToOwned::to_owned),
            text: self.text.as_str().to_string(),
            countdown: self.countdown(),
            show_countdown: self.show_countdown(),
            flags: self.flags,
            closing: self.closing,
        }
    }

    pub(crate) fn matches(
        &self,
        text: &Trusted,
        severity: Option<Severity>,
        title: Option<&str>,
    ) -> bool {
        self.text == *text && self.severity == severity && self.title.as_deref() == title
    }

    pub(crate) fn countdown_mut(&mut self) -> Option<&mut Countdown> {
        self.countdown.as_mut()
    }

    pub(crate) fn set_closing(&mut self) {
        self.closing = true;
    }

    pub(crate) fn open(&mut self) {
        if let Some(on_open) = self.on_open.take() {
            on_open();
        }
    }

    /// Releases timers and runs the close callback. Runs at most once per toast.
    pub(crate) fn close<S: Scheduler + ?Sized>(&mut self, reason: CloseReason, scheduler: &mut S) {
        self.closing = true;
        let cancelled = self.timers.cancel_all(scheduler);
        debug!(id = %self.id, group = %self.group, ?reason, cancelled, "toast closed");

        if let Some(on_close) = self.on_close.take() {
            on_close(reason);
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("group", &self.group)
            .field("severity", &self.severity)
            .field("title", &self.title)
            .field("text", &self.text)
            .field("ttl", &self.ttl)
            .field("countdown", &self.countdown)
            .field("timers", &self.timers)
            .field("closing", &self.closing)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn close_observer_runs_after_caller_callback() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (a, b, c) = (log.clone(), log.clone(), log.clone());

        let submission = NewMessage::info("hi")
            .on_open(move || a.lock().unwrap().push("open".to_string()))
            .on_close(move |_| b.lock().unwrap().push("close".to_string()))
            .observe_close(move |id, reason| {
                c.lock().unwrap().push(format!("observed {id} {reason:?}"))
            });

        let mut message = Message::accept(
            MessageId(4),
            submission,
            Trusted::new_unchecked("hi".into()),
            Ttl::Never,
            DisplayFlags::default(),
        );
        message.open();
        message.close(CloseReason::Dismissed, &mut crate::ManualScheduler::new());
        message.close(CloseReason::Expired, &mut crate::ManualScheduler::new());

        assert_eq!(
            *log.lock().unwrap(),
            vec!["open", "close", "observed 4 Dismissed"]
        );
    }

    #[test]
    fn display_title_falls_back_to_severity() {
        let message = Message::accept(
            MessageId(1),
            NewMessage::warning("disk almost full"),
            Trusted::new_unchecked("disk almost full".into()),
            Ttl::Never,
            DisplayFlags::default(),
        );
        assert_eq!(message.title(), None);
        assert_eq!(message.display_title(), Some("Warning"));
        assert!(!message.show_countdown());
        assert_eq!(message.countdown(), None);
    }
}
