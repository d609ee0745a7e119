//! Signal manager: queue hand-off and subscriber dispatch
//!
//! `emit` only enqueues. A dispatch task owned by the manager drains the queue in order
//! and runs every matching subscriber, isolating their failures from the emitter.

use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};

use crate::event::{EventKind, LifecycleEvent};
use crate::pattern::UidPattern;
use crate::types::EventCallback;

pub use config::SignalConfig;

/// Identifier of a registered subscriber
pub type CallbackId = u64;

struct Subscription {
    id: CallbackId,
    pattern: UidPattern,
    kind: Option<EventKind>,
    callback: EventCallback,
    consecutive_failures: AtomicU32,
}

impl Subscription {
    fn accepts(&self, event: &LifecycleEvent) -> bool {
        self.pattern.matches(&event.uid) && self.kind.map_or(true, |kind| kind == event.kind)
    }
}

#[derive(Default)]
struct Counters {
    emitted: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    removed: AtomicU64,
}

/// Snapshot of dispatch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalStats {
    pub emitted: u64,
    pub delivered: u64,
    pub failed: u64,
    pub removed: u64,
}

struct Registry {
    config: SignalConfig,
    subscriptions: RwLock<Vec<Arc<Subscription>>>,
    next_id: AtomicU64,
    counters: Counters,
}

impl Registry {
    fn matching(&self, event: &LifecycleEvent) -> Vec<Arc<Subscription>> {
        self.subscriptions
            .read()
            .map(|subs| subs.iter().filter(|s| s.accepts(event)).cloned().collect())
            .unwrap_or_default()
    }

    fn remove(&self, id: CallbackId) -> bool {
        match self.subscriptions.write() {
            Ok(mut subs) => {
                let before = subs.len();
                subs.retain(|s| s.id != id);
                subs.len() != before
            }
            Err(_) => false,
        }
    }

    async fn dispatch(&self, event: LifecycleEvent) {
        let timeout = Duration::from_secs(self.config.callback_timeout_seconds);

        for subscription in self.matching(&event) {
            let mut task = tokio::spawn((subscription.callback)(event.clone()));
            let outcome = match tokio::time::timeout(timeout, &mut task).await {
                Ok(Ok(Ok(()))) => Ok(()),
                Ok(Ok(Err(e))) => Err(format!("{:#}", e)),
                Ok(Err(join_error)) => Err(format!("handler panicked: {}", join_error)),
                Err(_) => {
                    task.abort();
                    Err(format!("handler timed out after {:?}", timeout))
                }
            };

            match outcome {
                Ok(()) => {
                    subscription.consecutive_failures.store(0, Ordering::Relaxed);
                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(reason) => self.record_failure(&subscription, &event, reason),
            }
        }
    }

    fn record_failure(&self, subscription: &Subscription, event: &LifecycleEvent, reason: String) {
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        let failures = subscription
            .consecutive_failures
            .fetch_add(1, Ordering::Relaxed)
            + 1;

        tracing::warn!(
            callback_id = subscription.id,
            event = event.event_name(),
            uid = %event.uid,
            failures,
            "lifecycle subscriber failed: {}",
            reason
        );

        if self.config.remove_failing_callbacks
            && failures >= self.config.max_consecutive_failures
            && self.remove(subscription.id)
        {
            self.counters.removed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                callback_id = subscription.id,
                "removing lifecycle subscriber after {} consecutive failures",
                failures
            );
        }
    }
}

enum Message {
    Event(LifecycleEvent),
    Flush(oneshot::Sender<()>),
}

async fn dispatch_loop(registry: Arc<Registry>, mut receiver: mpsc::UnboundedReceiver<Message>) {
    while let Some(message) = receiver.recv().await {
        match message {
            Message::Event(event) => {
                debug_log!(event = event.event_name(), uid = %event.uid, "dispatching lifecycle event");
                registry.dispatch(event).await;
            }
            Message::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    tracing::debug!("signal dispatch loop stopped");
}

/// Handle to a registered subscriber
#[derive(Clone)]
pub struct CallbackHandle {
    id: CallbackId,
    registry: Arc<Registry>,
}

impl std::fmt::Debug for CallbackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackHandle").field("id", &self.id).finish()
    }
}

impl CallbackHandle {
    pub fn id(&self) -> CallbackId {
        self.id
    }

    /// Remove the subscriber; returns false if it was already gone
    pub fn unsubscribe(&self) -> bool {
        self.registry.remove(self.id)
    }
}

/// Signal manager for lifecycle event notifications
pub struct SignalManager {
    registry: Arc<Registry>,
    sender: mpsc::UnboundedSender<Message>,
}

impl std::fmt::Debug for SignalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalManager")
            .field("callback_count", &self.callback_count())
            .field("stats", &self.stats())
            .finish()
    }
}

impl SignalManager {
    /// Create a manager and spawn its dispatch task.
    ///
    /// Must be called from within a Tokio runtime. The task stops once the manager
    /// is dropped and the queue has drained.
    pub fn new(config: SignalConfig) -> Self {
        let registry = Arc::new(Registry {
            config,
            subscriptions: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            counters: Counters::default(),
        });
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(dispatch_loop(registry.clone(), receiver));

        Self { registry, sender }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.registry.config
    }

    /// Subscribe to events whose uid matches `pattern`, optionally restricted to one kind
    pub fn subscribe<P, F, Fut>(
        &self,
        pattern: P,
        kind: Option<EventKind>,
        handler: F,
    ) -> anyhow::Result<CallbackHandle>
    where
        P: Into<UidPattern>,
        F: Fn(LifecycleEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let callback: EventCallback = Arc::new(move |event| handler(event).boxed());

        let mut subs = self
            .registry
            .subscriptions
            .write()
            .map_err(|_| anyhow::anyhow!("subscriber registry lock poisoned"))?;

        if subs.len() >= self.registry.config.max_callbacks {
            anyhow::bail!(
                "cannot register more than {} lifecycle subscribers",
                self.registry.config.max_callbacks
            );
        }

        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let pattern = pattern.into();
        debug_log!(callback_id = id, pattern = %pattern, "registering lifecycle subscriber");

        subs.push(Arc::new(Subscription {
            id,
            pattern,
            kind,
            callback,
            consecutive_failures: AtomicU32::new(0),
        }));

        Ok(CallbackHandle {
            id,
            registry: self.registry.clone(),
        })
    }

    /// Add a callback receiving every event
    pub fn add_callback<F, Fut>(&self, handler: F) -> anyhow::Result<CallbackHandle>
    where
        F: Fn(LifecycleEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.subscribe(UidPattern::Any, None, handler)
    }

    pub fn unsubscribe(&self, id: CallbackId) -> bool {
        self.registry.remove(id)
    }

    /// Enqueue an event for dispatch; never blocks and never fails the caller
    pub fn emit(&self, event: LifecycleEvent) {
        self.registry.counters.emitted.fetch_add(1, Ordering::Relaxed);
        if self.sender.send(Message::Event(event)).is_err() {
            tracing::warn!("signal dispatch loop is not running; lifecycle event dropped");
        }
    }

    /// Wait until every event emitted before this call has been dispatched
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.sender.send(Message::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Clear all callbacks
    pub fn clear_callbacks(&self) {
        if let Ok(mut subs) = self.registry.subscriptions.write() {
            subs.clear();
        }
    }

    /// Get number of registered callbacks
    pub fn callback_count(&self) -> usize {
        self.registry
            .subscriptions
            .read()
            .map(|s| s.len())
            .unwrap_or(0)
    }

    pub fn stats(&self) -> SignalStats {
        let counters = &self.registry.counters;
        SignalStats {
            emitted: counters.emitted.load(Ordering::Relaxed),
            delivered: counters.delivered.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            removed: counters.removed.load(Ordering::Relaxed),
        }
    }
}
