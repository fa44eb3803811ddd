//! Session lifecycle and reconnection.
//!
//! The [`SessionBuilder`] provides a fluent API for configuring the session.
//! The [`Session`] drives the lifecycle:
//!
//! ```text
//! Disconnected ─► Connecting ─► Handshaking ─► Registering ─► Open
//!       ▲              │ refused: wait, retry                   │
//!       │              ▼                                        │ connection lost
//!       │         (loop until connected or deinit)              ▼
//!       └──────────────────── Closing ◄── deinit ───────── Disconnected ─► Connecting ...
//! ```
//!
//! # Example
//!
//! ```ignore
//! use edge_pt_client::Session;
//!
//! #[tokio::main]
//! async fn main() -> edge_pt_client::Result<()> {
//!     let session = Session::builder("unix:///tmp/edge.sock".parse()?, "my-translator").build();
//!     session.init().await?;
//!
//!     let device = session.device("thermometer-1");
//!     device.create_float("3303/0/5700", 21.5)?;
//!     device.register().await?;
//!
//!     session.deinit().await
//! }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::connection::{Connection, ConnectionConfig};
use crate::control::{close_handshake, open_handshake, DEFAULT_START_GRACE};
use crate::error::{EdgeError, Result};
use crate::resource::Device;
use crate::rpc::EventBus;
use crate::transport::{self, Endpoint};

/// Default pause between connection attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// RPC method registering the translator name.
const REGISTER_TRANSLATOR_METHOD: &str = "protocol_translator_register";

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No transport.
    Disconnected,
    /// Opening the transport, retrying on refusal.
    Connecting,
    /// Running READY / ACCEPT / START.
    Handshaking,
    /// Registering the translator name.
    Registering,
    /// Ready for device traffic.
    Open,
    /// Running STOP / FINISH.
    Closing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Handshaking => "handshaking",
            SessionState::Registering => "registering",
            SessionState::Open => "open",
            SessionState::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Everything a session needs to (re)connect.
#[derive(Debug, Clone)]
struct SessionConfig {
    endpoint: Endpoint,
    name: String,
    connection: ConnectionConfig,
    reconnect_delay: Duration,
    start_grace: Duration,
    auto_reconnect: bool,
}

/// Builder for configuring and creating a [`Session`].
pub struct SessionBuilder {
    config: SessionConfig,
}

impl SessionBuilder {
    /// Create a builder for a translator called `name` at `endpoint`.
    pub fn new(endpoint: Endpoint, name: impl Into<String>) -> Self {
        Self {
            config: SessionConfig {
                endpoint,
                name: name.into(),
                connection: ConnectionConfig::default(),
                reconnect_delay: DEFAULT_RECONNECT_DELAY,
                start_grace: DEFAULT_START_GRACE,
                auto_reconnect: true,
            },
        }
    }

    /// Set the per-call RPC timeout.
    ///
    /// Default: 10 seconds
    pub fn rpc_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection.rpc_timeout = timeout;
        self
    }

    /// Set the control reply timeout.
    ///
    /// Default: 10 seconds
    pub fn control_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection.control_timeout = timeout;
        self
    }

    /// Set the pause between connection attempts.
    ///
    /// Default: 1 second
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    /// Set the pause after START before registering.
    ///
    /// Default: 200 ms
    pub fn start_grace(mut self, grace: Duration) -> Self {
        self.config.start_grace = grace;
        self
    }

    /// Set the largest accepted inbound frame payload.
    ///
    /// Default: 16 MiB
    pub fn max_frame_size(mut self, max: u32) -> Self {
        self.config.connection.max_frame_size = max;
        self
    }

    /// Set the writer channel capacity.
    ///
    /// Default: 1024
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.connection.writer.channel_capacity = capacity;
        self
    }

    /// Reconnect automatically when an open connection is lost.
    ///
    /// Default: true
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.config.auto_reconnect = enabled;
        self
    }

    /// Build the session. Nothing connects until [`Session::init`].
    pub fn build(self) -> Session {
        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        Session {
            inner: Arc::new(SessionInner {
                config: self.config,
                state_tx,
                connection: RwLock::new(None),
                events: EventBus::new(),
                shutdown: Mutex::new(CancellationToken::new()),
                supervisor: Mutex::new(None),
                registered: AtomicBool::new(false),
            }),
        }
    }
}

/// A protocol translator session with the gateway.
///
/// Cheap to clone; clones share the connection and state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    state_tx: watch::Sender<SessionState>,
    connection: RwLock<Option<Arc<Connection>>>,
    /// Outlives individual connections, so device listeners survive reconnects.
    events: EventBus,
    shutdown: Mutex<CancellationToken>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    registered: AtomicBool,
}

impl Session {
    /// Create a session builder.
    pub fn builder(endpoint: Endpoint, name: impl Into<String>) -> SessionBuilder {
        SessionBuilder::new(endpoint, name)
    }

    /// Translator name.
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.inner.state_tx.borrow()
    }

    /// Subscribe to state changes.
    ///
    /// Devices are not re-registered automatically after a reconnect; watch
    /// for `Open` to do it.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state_tx.subscribe()
    }

    /// Whether the translator name is registered on the current connection.
    pub fn is_registered(&self) -> bool {
        self.inner.registered.load(Ordering::Acquire)
    }

    /// Event bus carrying push notifications for this session's devices.
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Connect, handshake and register the translator name.
    ///
    /// Refused connections are retried every `reconnect_delay` without
    /// limit; wrap the call in a timeout for bounded retry. Once open, a
    /// background task watches the connection and re-establishes it when
    /// `auto_reconnect` is set.
    ///
    /// # Errors
    ///
    /// - `ProtocolViolation` if the handshake replies are wrong
    /// - `Timeout` / `Rpc` if registration fails
    /// - `Cancelled` if [`deinit`](Self::deinit) runs meanwhile
    /// - `NotOpen` if another `init` or `deinit` is in progress
    pub async fn init(&self) -> Result<()> {
        // Claim and token swap happen under one lock so deinit always sees
        // the token of the init it races with.
        let token = {
            let mut shutdown = self.inner.shutdown.lock();
            let claimed = self.inner.state_tx.send_if_modified(|state| {
                if *state == SessionState::Disconnected {
                    *state = SessionState::Connecting;
                    true
                } else {
                    false
                }
            });
            if !claimed {
                drop(shutdown);
                return match self.state() {
                    SessionState::Open => Ok(()),
                    state => Err(EdgeError::NotOpen(state)),
                };
            }
            let token = CancellationToken::new();
            *shutdown = token.clone();
            token
        };

        let conn = match self.inner.establish(&token).await {
            Ok(conn) => conn,
            Err(e) => {
                // A concurrent deinit owns the state once it reaches Closing.
                self.inner.state_tx.send_if_modified(|state| {
                    let in_progress = matches!(
                        state,
                        SessionState::Connecting
                            | SessionState::Handshaking
                            | SessionState::Registering
                    );
                    if in_progress {
                        *state = SessionState::Disconnected;
                    }
                    in_progress
                });
                return Err(e);
            }
        };

        let handle = tokio::spawn(supervise(self.inner.clone(), conn, token));
        if let Some(old) = self.inner.supervisor.lock().replace(handle) {
            old.abort();
        }
        Ok(())
    }

    /// Run STOP / FINISH and release the transport.
    ///
    /// Stops background reconnection and rejects calls still pending with
    /// `ConnectionClosed`. A no-op when already disconnected.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if the gateway answers STOP with anything
    /// but FINISH. The session then stays `Closing` and `deinit` may be
    /// retried.
    pub async fn deinit(&self) -> Result<()> {
        self.inner.shutdown.lock().cancel();
        let supervisor = self.inner.supervisor.lock().take();
        if let Some(handle) = supervisor {
            let _ = handle.await;
        }

        let conn = self.inner.connection.write().take();
        let Some(conn) = conn else {
            // An init that claimed the session after our cancel owns the state.
            let shutdown = self.inner.shutdown.lock();
            if shutdown.is_cancelled() && self.state() != SessionState::Disconnected {
                self.inner.set_state(SessionState::Disconnected);
            }
            return Ok(());
        };

        self.inner.set_state(SessionState::Closing);
        if conn.is_open() {
            if let Err(e) = close_handshake(&conn).await {
                tracing::error!(error = %e, "close handshake failed");
                *self.inner.connection.write() = Some(conn);
                return Err(e);
            }
        }

        conn.close();
        self.inner.registered.store(false, Ordering::Release);
        self.inner.set_state(SessionState::Disconnected);
        Ok(())
    }

    /// Call `method` on the gateway.
    ///
    /// # Errors
    ///
    /// Fails fast with `NotOpen` unless the session is open.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let conn = self.open_connection()?;
        conn.call(method, params).await
    }

    /// Create a device bound to this session.
    pub fn device(&self, device_id: impl Into<String>) -> Device {
        Device::new(device_id, self.clone())
    }

    /// Ids of calls waiting for a response on the current connection.
    pub fn pending_ids(&self) -> Vec<u64> {
        self.inner
            .connection
            .read()
            .as_ref()
            .map(|conn| conn.pending_ids())
            .unwrap_or_default()
    }

    /// Fail with `NotOpen` unless the session is open.
    pub(crate) fn ensure_open(&self) -> Result<()> {
        match self.state() {
            SessionState::Open => Ok(()),
            state => Err(EdgeError::NotOpen(state)),
        }
    }

    fn open_connection(&self) -> Result<Arc<Connection>> {
        self.ensure_open()?;
        self.inner
            .connection
            .read()
            .clone()
            .ok_or(EdgeError::NotOpen(SessionState::Disconnected))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.inner.config.name)
            .field("endpoint", &self.inner.config.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

impl SessionInner {
    fn set_state(&self, state: SessionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            tracing::info!(from = %previous, to = %state, "session state changed");
        }
    }

    /// Connect until a transport is up, then handshake and register.
    async fn establish(&self, token: &CancellationToken) -> Result<Arc<Connection>> {
        let endpoint = &self.config.endpoint;
        loop {
            if token.is_cancelled() {
                return Err(EdgeError::Cancelled);
            }
            self.set_state(SessionState::Connecting);

            let connected = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(EdgeError::Cancelled),
                connected = transport::connect(endpoint) => connected,
            };
            let stream = match connected {
                Ok(stream) => stream,
                Err(e) if e.is_connect_failure() => {
                    tracing::warn!(
                        %endpoint,
                        error = %e,
                        retry_in = ?self.config.reconnect_delay,
                        "connect failed"
                    );
                    tokio::select! {
                        _ = token.cancelled() => return Err(EdgeError::Cancelled),
                        _ = tokio::time::sleep(self.config.reconnect_delay) => continue,
                    }
                }
                Err(e) => return Err(e),
            };
            tracing::info!(%endpoint, "connected");

            let conn = Arc::new(Connection::start(
                stream,
                self.events.clone(),
                self.config.connection.clone(),
            ));
            let opened = tokio::select! {
                biased;
                _ = token.cancelled() => Err(EdgeError::Cancelled),
                opened = self.open(&conn) => opened,
            };
            if let Err(e) = opened {
                conn.close();
                return Err(e);
            }

            let shutdown = self.shutdown.lock();
            if token.is_cancelled() {
                drop(shutdown);
                conn.close();
                return Err(EdgeError::Cancelled);
            }
            *self.connection.write() = Some(conn.clone());
            self.set_state(SessionState::Open);
            return Ok(conn);
        }
    }

    async fn open(&self, conn: &Connection) -> Result<()> {
        self.set_state(SessionState::Handshaking);
        open_handshake(conn, self.config.start_grace).await?;

        self.set_state(SessionState::Registering);
        conn.call(
            REGISTER_TRANSLATOR_METHOD,
            json!({ "name": self.config.name }),
        )
        .await?;
        self.registered.store(true, Ordering::Release);
        tracing::info!(name = %self.config.name, "translator registered");
        Ok(())
    }
}

/// Watch the open connection and re-establish it when it drops.
///
/// Without `auto_reconnect` the session just moves to `Disconnected`.
async fn supervise(inner: Arc<SessionInner>, mut conn: Arc<Connection>, token: CancellationToken) {
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = conn.closed() => {}
        }
        if token.is_cancelled() {
            return;
        }

        tracing::warn!(reconnect = inner.config.auto_reconnect, "connection lost");
        {
            // Held across both transitions so no init can claim the session
            // while the supervisor is about to reconnect it.
            let _shutdown = inner.shutdown.lock();
            inner.connection.write().take();
            inner.registered.store(false, Ordering::Release);
            inner.set_state(SessionState::Disconnected);
            if !inner.config.auto_reconnect {
                return;
            }
            inner.set_state(SessionState::Connecting);
        }

        conn = loop {
            match inner.establish(&token).await {
                Ok(conn) => break conn,
                Err(EdgeError::Cancelled) => return,
                Err(e) => {
                    tracing::error!(error = %e, "reconnect failed");
                    inner.set_state(SessionState::Connecting);
                    tokio::select! {
                        _ = token.cancelled() => return,
                        _ = tokio::time::sleep(inner.config.reconnect_delay) => {}
                    }
                }
            }
        };
        tracing::info!("reconnected");
    }
}
