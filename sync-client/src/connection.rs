//! ConnectionManager - connectivity tracking and the deferred write queue.
//!
//! The manager owns the believed reachability of the backend, a FIFO of
//! operations waiting for connectivity, the listener list and the single
//! reconnection timer.
//!
//! # Architecture
//!
//! State transitions come from the pure state machine in sync-core; this
//! module interprets the resulting actions (notify, timers, drain).
//!
//! ```text
//! set_connected / probe ─→ ConnectionState::on_event ─→ [Action]
//!                                                          ↓
//!                              listeners, retry timer, drain loop
//! ```
//!
//! There is no global instance. Construct one at startup and hand clones
//! to whoever needs it; clones share state.
//!
//! # Example
//!
//! ```ignore
//! let manager = ConnectionManager::new(probe, RetryPolicy::default(), false);
//! manager.add_listener(|up| println!("backend reachable: {up}"));
//! manager.queue_operation(|| async { backend.ping().await }).await;
//! manager.set_connected(true).await; // drains the queue
//! ```

use crate::backend::HealthProbe;
use async_trait::async_trait;
use bastion_sync_core::{Action, ConnectionState, Event, OperationQueue, RetryPolicy};
use bastion_sync_types::BackendError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A deferred unit of work, run (possibly several times) until it
/// succeeds or fails with a non-connectivity error.
///
/// Any `Fn() -> impl Future<Output = Result<(), BackendError>>` closure
/// is an operation.
#[async_trait]
pub trait Operation: Send + Sync {
    /// Run the operation once.
    async fn run(&self) -> Result<(), BackendError>;
}

#[async_trait]
impl<F, Fut> Operation for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BackendError>> + Send + 'static,
{
    async fn run(&self) -> Result<(), BackendError> {
        (self)().await
    }
}

/// Handle returned by [`ConnectionManager::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(bool) + Send + Sync>;

/// Tracks backend reachability and runs queued operations while reachable.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    probe: Arc<dyn HealthProbe>,
    shared: Mutex<Shared>,
}

struct Shared {
    state: ConnectionState,
    queue: OperationQueue<Arc<dyn Operation>>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
    retry_timer: Option<JoinHandle<()>>,
    /// Bumped whenever a timer is scheduled; a firing timer only acts if
    /// it is still the latest one.
    timer_generation: u64,
    draining: bool,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let shared = self.shared.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = shared.retry_timer.take() {
            timer.abort();
        }
    }
}

/// Puts the in-flight operation back and releases the drain slot if a
/// drain future is dropped mid-await.
struct DrainGuard<'a> {
    shared: &'a Mutex<Shared>,
    in_flight: Option<Arc<dyn Operation>>,
    armed: bool,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(op) = self.in_flight.take() {
            shared.queue.requeue(op);
        }
        shared.draining = false;
    }
}

impl ConnectionManager {
    /// Create a manager.
    ///
    /// `probe` is consulted by reconnection attempts; `initially_connected`
    /// sets the starting belief without notifying anyone.
    pub fn new(probe: Arc<dyn HealthProbe>, policy: RetryPolicy, initially_connected: bool) -> Self {
        let state = if initially_connected {
            ConnectionState::connected(policy)
        } else {
            ConnectionState::new(policy)
        };
        Self {
            inner: Arc::new(Inner {
                probe,
                shared: Mutex::new(Shared {
                    state,
                    queue: OperationQueue::new(),
                    listeners: Vec::new(),
                    next_listener: 1,
                    retry_timer: None,
                    timer_generation: 0,
                    draining: false,
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a listener. It is called right away with the current state,
    /// then on every transition, in registration order.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let (id, connected) = {
            let mut shared = self.lock();
            let id = ListenerId(shared.next_listener);
            shared.next_listener += 1;
            shared.listeners.push((id, listener.clone()));
            (id, shared.state.is_connected())
        };
        listener(connected);
        id
    }

    /// Unregister a listener. Unknown ids are ignored.
    pub fn remove_listener(&self, id: ListenerId) {
        self.lock().listeners.retain(|(lid, _)| *lid != id);
    }

    /// Whether the backend is believed reachable.
    pub fn is_connected(&self) -> bool {
        self.lock().state.is_connected()
    }

    /// Consecutive failed reconnection attempts since the last success.
    pub fn retry_count(&self) -> u32 {
        self.lock().state.retry_count()
    }

    /// Operations waiting in the queue (excluding one currently running).
    pub fn pending_operations(&self) -> usize {
        self.lock().queue.len()
    }

    /// Whether a reconnection attempt is scheduled.
    pub fn retry_scheduled(&self) -> bool {
        self.lock().retry_timer.is_some()
    }

    /// Assert the backend is (un)reachable.
    ///
    /// Repeating the current value does nothing. Going up notifies
    /// listeners and then drains the queue; this returns once that drain
    /// finishes, or right away if another drain is already running. Going
    /// down notifies listeners and schedules a reconnection attempt.
    pub async fn set_connected(&self, connected: bool) {
        self.handle(Event::ConnectivityChanged { connected }).await;
    }

    /// Add an operation to the queue; if connected, drain now.
    pub async fn queue_operation<O>(&self, op: O)
    where
        O: Operation + 'static,
    {
        let connected = {
            let mut shared = self.lock();
            shared.queue.enqueue(Arc::new(op));
            tracing::debug!(pending = shared.queue.len(), "operation queued");
            shared.state.is_connected()
        };
        if connected {
            self.drain().await;
        }
    }

    /// Run the health probe once and act on the result. Returns the
    /// resulting connectivity.
    pub async fn probe_now(&self) -> bool {
        let event = match self.inner.probe.probe().await {
            Ok(()) => Event::ProbeSucceeded,
            Err(e) => {
                tracing::debug!("Probe failed: {}", e);
                if self.is_connected() {
                    Event::ConnectivityChanged { connected: false }
                } else {
                    Event::ProbeFailed
                }
            }
        };
        self.handle(event).await;
        self.is_connected()
    }

    /// Restart the reconnection cycle from attempt 1. Only acts while
    /// disconnected; needed once automatic retries are exhausted.
    pub async fn retry_now(&self) {
        self.handle(Event::RetryRequested).await;
    }

    /// Feed an event to the state machine and carry out its actions.
    fn handle(&self, event: Event) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let (actions, listeners) = {
                let mut shared = self.lock();
                let (state, actions) = shared.state.on_event(event);
                shared.state = state;
                let listeners: Vec<Listener> = if actions
                    .iter()
                    .any(|a| matches!(a, Action::Notify { .. }))
                {
                    shared.listeners.iter().map(|(_, l)| l.clone()).collect()
                } else {
                    Vec::new()
                };
                (actions, listeners)
            };

            for action in actions {
                match action {
                    Action::Notify { connected } => {
                        tracing::info!(connected, "Backend connectivity changed");
                        for listener in &listeners {
                            listener(connected);
                        }
                    }
                    Action::CancelRetryTimer => self.cancel_retry_timer(),
                    Action::StartRetryTimer { attempt, delay } => {
                        self.start_retry_timer(attempt, delay)
                    }
                    Action::DrainQueue => self.drain().await,
                    Action::RetriesExhausted { attempts } => {
                        tracing::warn!(
                            "Backend still unreachable after {} attempts; waiting for an external trigger",
                            attempts
                        );
                    }
                }
            }
        })
    }

    fn cancel_retry_timer(&self) {
        if let Some(timer) = self.lock().retry_timer.take() {
            timer.abort();
        }
    }

    fn start_retry_timer(&self, attempt: u32, delay: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime; reconnection attempt {} not scheduled", attempt);
            return;
        };

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let mut shared = self.lock();
        shared.timer_generation += 1;
        let generation = shared.timer_generation;
        if let Some(previous) = shared.retry_timer.take() {
            previous.abort();
        }

        tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "reconnection scheduled");
        let timer = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let manager = ConnectionManager { inner };
            {
                let mut shared = manager.lock();
                if shared.timer_generation != generation {
                    return;
                }
                // Release our own handle; from here on nothing may abort us.
                shared.retry_timer = None;
            }

            let event = match manager.inner.probe.probe().await {
                Ok(()) => Event::ProbeSucceeded,
                Err(e) => {
                    tracing::debug!("Reconnection attempt {} failed: {}", attempt, e);
                    Event::ProbeFailed
                }
            };
            manager.handle(event).await;
        });
        shared.retry_timer = Some(timer);
    }

    /// Run queued operations in order while connected.
    ///
    /// Only one drain runs at a time; a second caller returns immediately
    /// and its operation is picked up by the active loop.
    async fn drain(&self) {
        {
            let mut shared = self.lock();
            if shared.draining {
                return;
            }
            shared.draining = true;
        }

        let mut guard = DrainGuard {
            shared: &self.inner.shared,
            in_flight: None,
            armed: true,
        };

        loop {
            let op = {
                let mut shared = self.lock();
                let next = if shared.state.is_connected() {
                    shared.queue.dequeue()
                } else {
                    None
                };
                match next {
                    Some(op) => op,
                    None => {
                        // Cleared under the same lock as the emptiness check
                        // so a concurrent enqueue either is seen here or
                        // starts its own drain.
                        shared.draining = false;
                        guard.armed = false;
                        return;
                    }
                }
            };

            guard.in_flight = Some(op.clone());
            let result = op.run().await;
            guard.in_flight = None;

            match result {
                Ok(()) => {
                    self.lock().queue.complete();
                }
                Err(e) if e.is_connectivity() => {
                    self.lock().queue.requeue(op);
                    tracing::warn!("Operation hit a connectivity error, pausing queue: {}", e);
                    self.handle(Event::ConnectivityChanged { connected: false })
                        .await;
                }
                Err(e) => {
                    self.lock().queue.complete();
                    tracing::warn!("Dropping failed operation: {}", e);
                }
            }
        }
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.lock();
        f.debug_struct("ConnectionManager")
            .field("connected", &shared.state.is_connected())
            .field("retry_count", &shared.state.retry_count())
            .field("pending_operations", &shared.queue.len())
            .field("listeners", &shared.listeners.len())
            .field("retry_scheduled", &shared.retry_timer.is_some())
            .finish()
    }
}
