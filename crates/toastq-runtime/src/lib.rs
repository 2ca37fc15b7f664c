use std::{collections::HashMap, time::Duration};

use thiserror::Error;
use toastq_core::{
    ClickOutcome, FiredTimer, HtmlSanitizer, NewMessage, NotifierConfig, QueueRegistry, Sanitizer,
    Scheduler, Timer, TimerHandle,
};
use toastq_types::{GroupKey, MessageId, ToastEvent, ToastSnapshot, ViewOrder};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

/// Configuration for [`ToastService`].
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Queue behaviour and submission defaults.
    pub notifier: NotifierConfig,
    /// Capacity of the command channel.
    pub command_capacity: usize,
    /// Capacity of the lifecycle event channel.
    pub event_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            notifier: NotifierConfig::default(),
            command_capacity: 64,
            event_capacity: 256,
        }
    }
}

/// Errors produced by [`ToastService`] calls.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The runtime task has exited and no longer accepts commands.
    #[error("toast runtime stopped")]
    Stopped,
}

/// Scheduler backed by tokio timers.
///
/// Each timer is a spawned task sleeping until its deadline, then sending the timer back
/// to the runtime loop. Cancelling aborts the task.
#[derive(Debug)]
pub struct TokioScheduler {
    next_handle: u64,
    tasks: HashMap<TimerHandle, AbortHandle>,
    fired: mpsc::UnboundedSender<FiredTimer>,
}

impl TokioScheduler {
    /// Creates a scheduler and the receiver its timers fire into.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FiredTimer>) {
        let (fired, receiver) = mpsc::unbounded_channel();
        let scheduler = Self {
            next_handle: 0,
            tasks: HashMap::new(),
            fired,
        };
        (scheduler, receiver)
    }

    /// Number of timers not yet fired or cancelled.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, timer: Timer, delay: Duration) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);

        let fired = self.fired.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if fired.send(FiredTimer { handle, timer }).is_err() {
                debug!(handle = handle.0, "runtime gone; dropping fired timer");
            }
        });
        self.tasks.insert(handle, task.abort_handle());
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(task) = self.tasks.remove(&handle) {
            task.abort();
        }
    }

    fn fired(&mut self, handle: TimerHandle) {
        self.tasks.remove(&handle);
    }
}

enum Command {
    Add {
        message: NewMessage,
        reply: oneshot::Sender<Option<MessageId>>,
    },
    Delete {
        group: GroupKey,
        id: MessageId,
        reply: oneshot::Sender<bool>,
    },
    Click {
        group: GroupKey,
        id: MessageId,
        reply: oneshot::Sender<ClickOutcome>,
    },
    DestroyAll {
        group: GroupKey,
        reply: oneshot::Sender<usize>,
    },
    InitQueue {
        group: GroupKey,
        capacity: Option<usize>,
        reply: oneshot::Sender<()>,
    },
    Messages {
        group: GroupKey,
        order: Option<ViewOrder>,
        reply: oneshot::Sender<Vec<ToastSnapshot>>,
    },
    Shutdown,
}

/// Handle to a running toast runtime.
///
/// The runtime is a single task that owns the [`QueueRegistry`]; commands sent through
/// this handle and fired timers are applied one at a time in that task.
#[derive(Debug, Clone)]
pub struct ToastService {
    commands: mpsc::Sender<Command>,
}

impl ToastService {
    /// Spawns the runtime with HTML sanitization.
    ///
    /// Returns the handle, the lifecycle event receiver and the runtime task.
    /// Must be called from within a tokio runtime.
    pub fn start(cfg: RuntimeConfig) -> (Self, mpsc::Receiver<ToastEvent>, JoinHandle<()>) {
        Self::start_with_sanitizer(cfg, HtmlSanitizer)
    }

    /// Spawns the runtime with a custom sanitizer.
    pub fn start_with_sanitizer(
        cfg: RuntimeConfig,
        sanitizer: impl Sanitizer + 'static,
    ) -> (Self, mpsc::Receiver<ToastEvent>, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(cfg.command_capacity.max(1));
        let (event_tx, event_rx) = mpsc::channel(cfg.event_capacity.max(1));
        let (scheduler, fired_rx) = TokioScheduler::new();

        let registry = QueueRegistry::with_config(cfg.notifier, scheduler, sanitizer);

        let events = EventSink { sender: event_tx };
        let task = tokio::spawn(run(registry, command_rx, fired_rx, events));
        info!("toast runtime started");

        (
            Self {
                commands: command_tx,
            },
            event_rx,
            task,
        )
    }

    /// Submits a toast. `Ok(None)` means it was rejected as a duplicate.
    pub async fn add(&self, message: NewMessage) -> Result<Option<MessageId>, ServiceError> {
        self.request(|reply| Command::Add { message, reply }).await
    }

    /// Removes a toast. `Ok(false)` if it was already gone.
    pub async fn delete(&self, group: GroupKey, id: MessageId) -> Result<bool, ServiceError> {
        self.request(|reply| Command::Delete { group, id, reply }).await
    }

    /// Forwards a click on a toast body.
    pub async fn click(
        &self,
        group: GroupKey,
        id: MessageId,
    ) -> Result<ClickOutcome, ServiceError> {
        self.request(|reply| Command::Click { group, id, reply }).await
    }

    /// Removes every toast of a group. Returns how many were removed.
    pub async fn destroy_all(&self, group: GroupKey) -> Result<usize, ServiceError> {
        self.request(|reply| Command::DestroyAll { group, reply }).await
    }

    /// Sets a group's capacity, evicting what no longer fits.
    pub async fn init_queue(
        &self,
        group: GroupKey,
        capacity: Option<usize>,
    ) -> Result<(), ServiceError> {
        self.request(|reply| Command::InitQueue {
            group,
            capacity,
            reply,
        })
        .await
    }

    /// Snapshot of a group in the configured read-back order.
    pub async fn messages(&self, group: GroupKey) -> Result<Vec<ToastSnapshot>, ServiceError> {
        self.request(|reply| Command::Messages {
            group,
            order: None,
            reply,
        })
        .await
    }

    /// Snapshot of a group in an explicit order.
    pub async fn messages_in(
        &self,
        group: GroupKey,
        order: ViewOrder,
    ) -> Result<Vec<ToastSnapshot>, ServiceError> {
        self.request(|reply| Command::Messages {
            group,
            order: Some(order),
            reply,
        })
        .await
    }

    /// Asks the runtime to destroy every toast and exit.
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| ServiceError::Stopped)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| ServiceError::Stopped)?;
        response.await.map_err(|_| ServiceError::Stopped)
    }
}

#[derive(Debug, Clone)]
struct EventSink {
    sender: mpsc::Sender<ToastEvent>,
}

impl EventSink {
    fn send(&self, event: ToastEvent) {
        debug!(?event, "sending toast event");
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("event queue full; dropping toast event"),
            Err(TrySendError::Closed(_)) => debug!("event receiver dropped"),
        }
    }
}

async fn run(
    mut registry: QueueRegistry<TokioScheduler>,
    mut commands: mpsc::Receiver<Command>,
    mut fired: mpsc::UnboundedReceiver<FiredTimer>,
    events: EventSink,
) {
    loop {
        tokio::select! {
            Some(timer) = fired.recv() => registry.fire(timer),
            command = commands.recv() => match command {
                Some(Command::Shutdown) | None => break,
                Some(command) => handle(&mut registry, command, &events),
            },
        }
    }

    registry.reset();
    info!("toast runtime stopped");
}

fn handle(registry: &mut QueueRegistry<TokioScheduler>, command: Command, events: &EventSink) {
    match command {
        Command::Add { message, reply } => {
            let group = message.group.clone();
            let sink = events.clone();
            let message = message.observe_close(move |id, reason| {
                sink.send(ToastEvent::Closed { id, group, reason })
            });

            let accepted = registry.add_message(message).map(|m| m.snapshot());
            let id = accepted.as_ref().map(|snapshot| snapshot.id);
            if let Some(snapshot) = accepted {
                events.send(ToastEvent::Opened {
                    snapshot: Box::new(snapshot),
                });
            }
            let _ = reply.send(id);
        }
        Command::Delete { group, id, reply } => {
            let _ = reply.send(registry.delete_message(&group, id));
        }
        Command::Click { group, id, reply } => {
            let _ = reply.send(registry.click(&group, id));
        }
        Command::DestroyAll { group, reply } => {
            let _ = reply.send(registry.destroy_all_messages(&group));
        }
        Command::InitQueue {
            group,
            capacity,
            reply,
        } => {
            registry.init_queue(&group, capacity);
            let _ = reply.send(());
        }
        Command::Messages {
            group,
            order,
            reply,
        } => {
            let snapshots = match order {
                Some(order) => registry
                    .get_queue(&group)
                    .messages_in(order)
                    .into_iter()
                    .map(|m| m.snapshot())
                    .collect(),
                None => registry
                    .ordered_messages(&group)
                    .into_iter()
                    .map(|m| m.snapshot())
                    .collect(),
            };
            let _ = reply.send(snapshots);
        }
        Command::Shutdown => {}
    }
}

#[cfg(test)]
mod tests {
    use toastq_core::Severity;
    use toastq_types::CloseReason;

    use super::*;

    fn start() -> (ToastService, mpsc::Receiver<ToastEvent>, JoinHandle<()>) {
        ToastService::start(RuntimeConfig::default())
    }

    async fn next_event(rx: &mut mpsc::Receiver<ToastEvent>) -> ToastEvent {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    async fn assert_no_event(rx: &mut mpsc::Receiver<ToastEvent>) {
        let maybe_event = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(maybe_event.is_err(), "unexpected event was emitted");
    }

    #[tokio::test]
    async fn add_emits_opened_event() {
        let (service, mut rx, _task) = start();

        let id = service
            .add(NewMessage::success("<b>saved</b>").title("Files"))
            .await
            .unwrap()
            .unwrap();

        match next_event(&mut rx).await {
            ToastEvent::Opened { snapshot } => {
                assert_eq!(snapshot.id, id);
                assert_eq!(snapshot.severity, Some(Severity::Success));
                assert_eq!(snapshot.title.as_deref(), Some("Files"));
                assert_eq!(snapshot.text, "<b>saved</b>");
                assert_eq!(snapshot.countdown, None);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_emits_closed_expired_event() {
        let (service, mut rx, _task) = start();

        let id = service
            .add(NewMessage::info("expires").ttl(Duration::from_millis(20)))
            .await
            .unwrap()
            .unwrap();
        let _ = next_event(&mut rx).await;

        match next_event(&mut rx).await {
            ToastEvent::Closed {
                id: event_id,
                group,
                reason,
            } => {
                assert_eq!(event_id, id);
                assert!(group.is_default());
                assert_eq!(reason, CloseReason::Expired);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        assert!(service.messages(GroupKey::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_closes_once() {
        let (service, mut rx, _task) = start();

        let id = service
            .add(NewMessage::info("bye").ttl(Duration::from_millis(200)))
            .await
            .unwrap()
            .unwrap();
        let _ = next_event(&mut rx).await;

        assert!(service.delete(GroupKey::default(), id).await.unwrap());
        assert!(!service.delete(GroupKey::default(), id).await.unwrap());

        match next_event(&mut rx).await {
            ToastEvent::Closed { reason, .. } => assert_eq!(reason, CloseReason::Dismissed),
            other => panic!("unexpected event: {other:?}"),
        }

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_no_event(&mut rx).await;
    }

    #[tokio::test]
    async fn duplicate_is_rejected_silently() {
        let (service, mut rx, _task) = start();

        assert!(service.add(NewMessage::error("boom")).await.unwrap().is_some());
        let _ = next_event(&mut rx).await;

        assert!(service.add(NewMessage::error("boom")).await.unwrap().is_none());
        assert_no_event(&mut rx).await;
    }

    #[tokio::test]
    async fn eviction_emits_closed_evicted_event() {
        let (service, mut rx, _task) = start();
        let group = GroupKey::new("status");
        service.init_queue(group.clone(), Some(1)).await.unwrap();

        let first = service
            .add(NewMessage::info("first").group(group.clone()))
            .await
            .unwrap()
            .unwrap();
        let _ = next_event(&mut rx).await;
        service
            .add(NewMessage::info("second").group(group.clone()))
            .await
            .unwrap()
            .unwrap();

        match next_event(&mut rx).await {
            ToastEvent::Closed { id, reason, .. } => {
                assert_eq!(id, first);
                assert_eq!(reason, CloseReason::Evicted);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(next_event(&mut rx).await, ToastEvent::Opened { .. }));
        assert_eq!(service.messages(group).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn messages_follow_configured_order() {
        let cfg = RuntimeConfig {
            notifier: NotifierConfig {
                reverse_order: true,
                ..NotifierConfig::default()
            },
            ..RuntimeConfig::default()
        };
        let (service, _rx, _task) = ToastService::start(cfg);

        for text in ["a", "b", "c"] {
            service.add(NewMessage::info(text)).await.unwrap();
        }

        let texts = |snapshots: Vec<ToastSnapshot>| {
            snapshots.into_iter().map(|s| s.text).collect::<Vec<_>>()
        };
        assert_eq!(
            texts(service.messages(GroupKey::default()).await.unwrap()),
            vec!["c", "b", "a"]
        );
        assert_eq!(
            texts(
                service
                    .messages_in(GroupKey::default(), ViewOrder::Insertion)
                    .await
                    .unwrap()
            ),
            vec!["a", "b", "c"]
        );
    }

    #[tokio::test]
    async fn click_holds_toast_past_its_ttl() {
        let (service, mut rx, _task) = start();

        let id = service
            .add(NewMessage::warning("hold me").ttl(Duration::from_millis(200)))
            .await
            .unwrap()
            .unwrap();
        let _ = next_event(&mut rx).await;

        assert_eq!(
            service.click(GroupKey::default(), id).await.unwrap(),
            ClickOutcome::Stopped
        );
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_no_event(&mut rx).await;

        let snapshots = service.messages(GroupKey::default()).await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert!(snapshots[0].closing);

        assert_eq!(
            service.click(GroupKey::default(), id).await.unwrap(),
            ClickOutcome::Closed
        );
        match next_event(&mut rx).await {
            ToastEvent::Closed { reason, .. } => assert_eq!(reason, CloseReason::Dismissed),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn shutdown_destroys_toasts_and_stops_runtime() {
        let (service, mut rx, task) = start();

        service.add(NewMessage::info("left over")).await.unwrap();
        let _ = next_event(&mut rx).await;

        service.shutdown().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();

        match next_event(&mut rx).await {
            ToastEvent::Closed { reason, .. } => assert_eq!(reason, CloseReason::Destroyed),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(
            service.add(NewMessage::info("late")).await,
            Err(ServiceError::Stopped)
        ));
    }

    #[tokio::test]
    async fn scheduler_forgets_fired_and_cancelled_timers() {
        let (mut scheduler, mut fired) = TokioScheduler::new();
        let timer = Timer {
            group: GroupKey::default(),
            message: MessageId(1),
            kind: toastq_core::TimerKind::Dismiss,
        };

        let cancelled = scheduler.schedule(timer.clone(), Duration::from_millis(10));
        let kept = scheduler.schedule(timer, Duration::from_millis(20));
        scheduler.cancel(cancelled);
        assert_eq!(scheduler.pending(), 1);

        let delivered = tokio::time::timeout(Duration::from_secs(1), fired.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivered.handle, kept);

        scheduler.fired(delivered.handle);
        assert_eq!(scheduler.pending(), 0);
    }
}
