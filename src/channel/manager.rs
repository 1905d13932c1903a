//! Channel Connection Manager
//!
//! Owns the lifecycle of the single connection to the stream channel:
//! connect, detect drops, reconnect with backoff, and hand every inbound
//! frame to the codec and router in arrival order.
//!
//! All work happens on one supervisor task. The task owns the transport
//! connection and the reconnect timer, so there is never more than one of
//! either. [`ChannelManager::stop`] flips the state to `Closed` under the
//! same lock the supervisor holds while dispatching, which guarantees that
//! no store action runs after `stop` returns.
//!
//! ```text
//! Disconnected --start--> Connecting --established--> Open
//!                              ^    \                   |
//!                    timer     |     `--failure--.      | drop / error
//!                              |                 v      v
//!                              `------------ Reconnecting
//!
//! any state except Closed --stop--> Closed
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::backoff::{Backoff, BackoffConfig};
use super::endpoint::{ChannelUrl, PageLocation};
use super::error::{ChannelError, ChannelResult, TransportError};
use super::messages::{decode_frame, Frame};
use super::router::{Dispatch, Router};
use super::state::ConnectionState;
use super::transport::{Connection, Transport};
use crate::store::StreamStore;

/// Configuration for the connection manager
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// How long a single connect attempt may take (ms)
    pub connect_timeout_ms: u64,
    /// Reconnect backoff policy
    pub backoff: BackoffConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 2000,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Snapshot of channel activity
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChannelStats {
    pub connect_attempts: u64,
    pub connections_opened: u64,
    pub messages_received: u64,
    pub events_dispatched: u64,
    pub events_ignored: u64,
    pub decode_failures: u64,
    pub last_opened_at: Option<DateTime<Utc>>,
}

impl fmt::Display for ChannelStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempts={}, opened={}, received={}, dispatched={}, ignored={}, decode_failures={}",
            self.connect_attempts,
            self.connections_opened,
            self.messages_received,
            self.events_dispatched,
            self.events_ignored,
            self.decode_failures
        )
    }
}

#[derive(Debug, Default)]
struct Counters {
    connect_attempts: AtomicU64,
    connections_opened: AtomicU64,
    messages_received: AtomicU64,
    events_dispatched: AtomicU64,
    events_ignored: AtomicU64,
    decode_failures: AtomicU64,
}

/// Manages the live-update connection for one stream
///
/// Dropping the manager tears the channel down.
pub struct ChannelManager {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    config: ManagerConfig,
    page: PageLocation,
    store: Arc<dyn StreamStore>,
    transport: Arc<dyn Transport>,
    router: Router,
    /// Authoritative state; held while dispatching
    state: Mutex<ConnectionState>,
    /// Published copy of `state` for observers
    state_tx: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
    counters: Counters,
    last_opened_at: Mutex<Option<DateTime<Utc>>>,
    channel_url: Mutex<Option<ChannelUrl>>,
}

/// Result of one connect attempt
enum Attempt {
    Connected(Box<dyn Connection>, String),
    Failed(TransportError),
    Cancelled,
}

/// Why a connection stopped delivering frames
enum Ended {
    Dropped,
    Cancelled,
}

impl ChannelManager {
    /// Create a manager with the base protocol router
    pub fn new(
        config: ManagerConfig,
        page: PageLocation,
        store: Arc<dyn StreamStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let router = Router::new(Arc::clone(&store));
        Self::with_router(config, page, store, transport, router)
    }

    /// Create a manager with a custom router
    pub fn with_router(
        config: ManagerConfig,
        page: PageLocation,
        store: Arc<dyn StreamStore>,
        transport: Arc<dyn Transport>,
        router: Router,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            shared: Arc::new(Shared {
                config,
                page,
                store,
                transport,
                router,
                state: Mutex::new(ConnectionState::Disconnected),
                state_tx,
                cancel: CancellationToken::new(),
                counters: Counters::default(),
                last_opened_at: Mutex::new(None),
                channel_url: Mutex::new(None),
            }),
            task: Mutex::new(None),
        }
    }

    /// Start connecting
    ///
    /// Calling this while the channel is already running is a no-op. After
    /// [`stop`](Self::stop) the channel cannot be restarted.
    pub fn start(&self) -> ChannelResult<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            ChannelError::InvalidOperation("start() requires a tokio runtime".to_string())
        })?;

        let mut task = lock(&self.task);

        match self.shared.state() {
            ConnectionState::Closed => {
                return Err(ChannelError::InvalidOperation(
                    "channel has been closed".to_string(),
                ));
            }
            ConnectionState::Disconnected => {}
            _ => return Ok(()),
        }

        if !self.shared.transition(ConnectionState::Connecting) {
            // stop() won the race
            return Err(ChannelError::InvalidOperation(
                "channel has been closed".to_string(),
            ));
        }

        let shared = Arc::clone(&self.shared);
        *task = Some(runtime.spawn(supervise(shared)));
        Ok(())
    }

    /// Tear the channel down
    ///
    /// Cancels any pending reconnect and the open connection. Once this
    /// returns no further events are dispatched. Idempotent.
    pub fn stop(&self) {
        {
            let mut state = lock(&self.shared.state);
            if *state == ConnectionState::Closed {
                return;
            }
            *state = ConnectionState::Closed;
            self.shared.state_tx.send_replace(ConnectionState::Closed);
        }
        self.shared.cancel.cancel();
        tracing::info!(page = %self.shared.page.host, "Live channel closed");
    }

    /// Tear the channel down and wait for the connection to be released
    pub async fn shutdown(&self) {
        self.stop();
        let handle = lock(&self.task).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Channel supervisor task failed");
            }
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    /// Watch state changes
    ///
    /// Intermediate states may be coalesced if the receiver lags.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// URL of the most recent connect attempt
    pub fn channel_url(&self) -> Option<ChannelUrl> {
        lock(&self.shared.channel_url).clone()
    }

    /// Activity counters
    pub fn stats(&self) -> ChannelStats {
        let c = &self.shared.counters;
        ChannelStats {
            connect_attempts: c.connect_attempts.load(Ordering::Relaxed),
            connections_opened: c.connections_opened.load(Ordering::Relaxed),
            messages_received: c.messages_received.load(Ordering::Relaxed),
            events_dispatched: c.events_dispatched.load(Ordering::Relaxed),
            events_ignored: c.events_ignored.load(Ordering::Relaxed),
            decode_failures: c.decode_failures.load(Ordering::Relaxed),
            last_opened_at: *lock(&self.shared.last_opened_at),
        }
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Supervisor loop: entered in `Connecting`, exits on teardown or when the
/// attempt limit is exhausted.
async fn supervise(shared: Arc<Shared>) {
    let mut backoff = Backoff::new(shared.config.backoff.clone());

    loop {
        match shared.connect().await {
            Attempt::Cancelled => return,
            Attempt::Connected(mut conn, connection_id) => {
                if !shared.transition(ConnectionState::Open) {
                    conn.close().await;
                    return;
                }
                backoff.reset();
                shared.record_open();

                let ended = shared.pump(conn.as_mut(), &connection_id).await;
                if let Ended::Cancelled = ended {
                    conn.close().await;
                    return;
                }
            }
            Attempt::Failed(e) => {
                tracing::warn!(
                    error = %e,
                    attempt = backoff.attempts() + 1,
                    "Stream channel connect failed"
                );
            }
        }

        if !shared.transition(ConnectionState::Reconnecting) {
            return;
        }

        if backoff.exhausted() {
            tracing::error!(
                attempts = backoff.attempts(),
                "Giving up on stream channel until restarted"
            );
            shared.transition(ConnectionState::Disconnected);
            return;
        }

        let delay = backoff.next_delay();
        tracing::info!(
            delay_ms = delay.as_millis() as u64,
            attempt = backoff.attempts(),
            "Reconnecting to stream channel"
        );

        tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        if !shared.transition(ConnectionState::Connecting) {
            return;
        }
    }
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    /// Move to `next` unless the channel has been closed
    fn transition(&self, next: ConnectionState) -> bool {
        let mut state = lock(&self.state);
        let current = *state;
        if current.is_terminal() {
            return false;
        }
        if !current.can_transition_to(next) {
            tracing::warn!(from = %current, to = %next, "Unexpected state transition");
        }
        *state = next;
        self.state_tx.send_replace(next);
        tracing::debug!(from = %current, to = %next, "Channel state changed");
        true
    }

    async fn connect(&self) -> Attempt {
        // The stream is read once per attempt
        let url = ChannelUrl::for_stream(&self.page, &self.store.stream_name());
        let url_str = url.to_string();
        *lock(&self.channel_url) = Some(url);

        let connection_id = Uuid::new_v4().to_string();
        self.counters.connect_attempts.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(connection_id = %connection_id, url = %url_str, "Connecting");

        let timeout_ms = self.config.connect_timeout_ms;
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Attempt::Cancelled,
            result = tokio::time::timeout(
                Duration::from_millis(timeout_ms),
                self.transport.connect(&url_str),
            ) => result,
        };

        match result {
            Ok(Ok(conn)) => {
                tracing::info!(connection_id = %connection_id, url = %url_str, "Stream channel open");
                Attempt::Connected(conn, connection_id)
            }
            Ok(Err(e)) => Attempt::Failed(e),
            Err(_) => Attempt::Failed(TransportError::Timeout(timeout_ms)),
        }
    }

    /// Deliver frames until the connection drops or the channel is closed
    async fn pump(&self, conn: &mut dyn Connection, connection_id: &str) -> Ended {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ended::Cancelled,
                next = conn.recv() => next,
            };

            match next {
                Some(Ok(frame)) => {
                    if !self.deliver(&frame) {
                        return Ended::Cancelled;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(connection_id = %connection_id, error = %e, "Stream channel error");
                    return Ended::Dropped;
                }
                None => {
                    tracing::info!(connection_id = %connection_id, "Stream channel closed by server");
                    return Ended::Dropped;
                }
            }
        }
    }

    /// Decode and route one frame. Returns false if the channel was closed.
    fn deliver(&self, frame: &Frame) -> bool {
        // Held across decoding and routing so stop() cannot complete
        // mid-dispatch. Handlers must not call back into the manager.
        let state = lock(&self.state);
        if *state != ConnectionState::Open {
            return false;
        }

        self.counters.messages_received.fetch_add(1, Ordering::Relaxed);

        let event = match decode_frame(frame) {
            Ok(event) => event,
            Err(e) => {
                self.counters.decode_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "Dropping undecodable channel message");
                return true;
            }
        };

        match self.router.route(&event) {
            Dispatch::Handled => {
                self.counters.events_dispatched.fetch_add(1, Ordering::Relaxed);
            }
            Dispatch::Unrecognized => {
                self.counters.events_ignored.fetch_add(1, Ordering::Relaxed);
            }
        }
        drop(state);
        true
    }

    fn record_open(&self) {
        self.counters.connections_opened.fetch_add(1, Ordering::Relaxed);
        *lock(&self.last_opened_at) = Some(Utc::now());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
