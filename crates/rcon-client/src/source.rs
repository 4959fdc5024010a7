//! Source RCON protocol engine.
//!
//! TCP, request/response. Authentication is a type-3 packet answered by a
//! type-2 packet echoing the request id (`-1` means rejected credentials).
//! Responses carry no fragmentation marker, so every `execute` sends the
//! command packet followed immediately by an empty terminator request: the
//! server answers in order, and the terminator echo proves that no fragment
//! of the command's response is still outstanding.
//!
//! All mutable engine state — session machine, correlation table, id
//! counter — sits behind one mutex, never held across an await. A spawned
//! reader task feeds received bytes through the [`Framer`] and dispatches
//! framed packets; each pending request pairs a oneshot resolver with a
//! timeout on the awaiting side.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::BytesMut;
use rcon_core::session::IllegalTransition;
use rcon_core::{ClientConfig, ConnectionState, RconError, Session};
use rcon_proto::source::{self, Framer, Packet};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, lookup_host};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error};

use crate::event::{ClientEvent, EventBus};

/// Request ids wrap back to 1 after this value, so 0 never occurs and `-1`
/// stays reserved as the server's failed-auth marker.
const MAX_REQUEST_ID: i32 = 1_000_000;

/// Monotonic request id allocator.
#[derive(Debug)]
struct RequestIdCounter {
    next: i32,
}

impl RequestIdCounter {
    fn new() -> Self {
        Self { next: 1 }
    }

    fn next(&mut self) -> i32 {
        let id = self.next;
        self.next = if id >= MAX_REQUEST_ID { 1 } else { id + 1 };
        id
    }
}

/// Resolves a waiter with the response bytes or the failure.
type Resolver = oneshot::Sender<Result<Vec<u8>, RconError>>;

/// One in-flight `execute`.
struct Inflight {
    /// Id of the terminator request whose echo completes this entry.
    terminator_id: i32,
    /// Body fragments in arrival order.
    fragments: Vec<Vec<u8>>,
    /// Completion/rejection side of the waiter.
    resolver: Resolver,
}

/// Mutable engine state; one critical section covers all of it.
struct EngineState {
    session: Session,
    ids: RequestIdCounter,
    /// The single in-flight authentication, id plus waiter. At most one
    /// auth is ever outstanding: `connect` is gated on `Disconnected`, so
    /// an inbound `-1` can only belong to this entry.
    auth: Option<(i32, Resolver)>,
    /// In-flight commands by `command_id`.
    pending: HashMap<i32, Inflight>,
    /// Secondary lookup: `terminator_id` back to `command_id`.
    by_terminator: HashMap<i32, i32>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            session: Session::new(),
            ids: RequestIdCounter::new(),
            auth: None,
            pending: HashMap::new(),
            by_terminator: HashMap::new(),
        }
    }
}

/// State shared between the client surface and the reader task.
struct Shared {
    state: Mutex<EngineState>,
    events: EventBus,
    debug: bool,
    /// Set while a deliberate `disconnect` runs, so the dying reader does
    /// not report it as a fault.
    teardown: AtomicBool,
}

impl Shared {
    fn new(debug: bool) -> Self {
        Self {
            state: Mutex::new(EngineState::new()),
            events: EventBus::default(),
            debug,
            teardown: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Transition where the caller handles rejection (API gating).
    fn try_transition(&self, next: ConnectionState) -> Result<(), IllegalTransition> {
        let change = self.lock().session.transition(next)?;
        self.events.emit(ClientEvent::StateChange { new: change.new, old: change.old });
        Ok(())
    }

    /// Transition that is legal by construction on its call path.
    fn transition(&self, next: ConnectionState) {
        let result = { self.lock().session.transition(next) };
        match result {
            Ok(change) => {
                self.events.emit(ClientEvent::StateChange { new: change.new, old: change.old });
            },
            Err(illegal) => {
                debug_assert!(false, "engine bug: {illegal}");
                error!(%illegal, "attempted illegal state transition");
            },
        }
    }

    /// Fail every in-flight entry and empty the correlation table.
    fn fail_all(&self, err: &RconError) {
        let resolvers: Vec<Resolver> = {
            let mut st = self.lock();
            st.by_terminator.clear();
            let auth = st.auth.take().map(|(_, resolver)| resolver);
            let pending = std::mem::take(&mut st.pending);
            auth.into_iter().chain(pending.into_values().map(|entry| entry.resolver)).collect()
        };
        for resolver in resolvers {
            let _ = resolver.send(Err(err.clone()));
        }
    }

    /// Asynchronous fault from the reader: emit the error, fail everything,
    /// leave the session in `Error` until the caller disconnects.
    fn fault(&self, err: RconError) {
        if self.teardown.load(Ordering::SeqCst) {
            return;
        }
        // A concurrent teardown may already have left the lifecycle; the
        // fault is then moot.
        let change = { self.lock().session.transition(ConnectionState::Error) };
        let Ok(change) = change else {
            return;
        };
        error!(%err, "source session fault");
        self.events.emit(ClientEvent::Error(err.clone()));
        self.events.emit(ClientEvent::StateChange { new: change.new, old: change.old });
        self.fail_all(&err);
        self.events.emit(ClientEvent::Close { had_error: true });
    }
}

/// Source RCON client.
///
/// One TCP stream per connected lifetime, created by [`SourceClient::connect`]
/// and destroyed by [`SourceClient::disconnect`] (or a fault). The client
/// itself is not meant to be shared across schedulers without external
/// synchronisation, but `execute` takes `&self` so callers may hold it in an
/// `Arc` and disconnect from another task.
pub struct SourceClient {
    config: ClientConfig,
    shared: Arc<Shared>,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl SourceClient {
    /// Create a client in `Disconnected`; no I/O happens until `connect`.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let shared = Arc::new(Shared::new(config.debug));
        Self { config, shared, writer: tokio::sync::Mutex::new(None), reader: Mutex::new(None) }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.lock().session.state()
    }

    /// Whether `execute` is currently admissible.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.shared.lock().session.is_authenticated()
    }

    /// Number of in-flight `execute` calls.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.shared.lock().pending.len()
    }

    /// Register an event subscriber.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ClientEvent> {
        self.shared.events.subscribe()
    }

    /// Connect and authenticate.
    ///
    /// On success the session is `Authenticated`. On any failure the
    /// session is torn down to `Disconnected` before the error is returned;
    /// a rejected password is **not** retried.
    ///
    /// # Errors
    ///
    /// `ConnectionFailed`, `Timeout`, `AuthFailed`, or `SocketError`.
    pub async fn connect(&self) -> Result<(), RconError> {
        self.shared.try_transition(ConnectionState::Connecting).map_err(|illegal| {
            RconError::ConnectionFailed(format!("connect refused: client is {}", illegal.from))
        })?;

        match self.connect_inner().await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.disconnect().await;
                Err(err)
            },
        }
    }

    async fn connect_inner(&self) -> Result<(), RconError> {
        let addr = self.resolve().await?;

        let stream = timeout(self.config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| RconError::Timeout {
                operation: "connect",
                after: self.config.connect_timeout,
            })?
            .map_err(|err| RconError::ConnectionFailed(err.to_string()))?;
        let _ = stream.set_nodelay(true);

        self.shared.transition(ConnectionState::Connected);
        self.shared.transition(ConnectionState::Authenticating);

        let (read_half, write_half) = stream.into_split();
        *self.writer.lock().await = Some(write_half);

        let (auth_id, rx) = {
            let mut st = self.shared.lock();
            let auth_id = st.ids.next();
            let (tx, rx) = oneshot::channel();
            st.auth = Some((auth_id, tx));
            (auth_id, rx)
        };

        let handle =
            tokio::spawn(run_reader(Arc::clone(&self.shared), read_half, self.config.clone()));
        *self.reader.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        let auth_packet =
            Packet::new(auth_id, source::AUTH, self.config.password.clone().into_bytes());
        self.send_packet(&auth_packet).await?;

        let verdict = timeout(self.config.connect_timeout, rx)
            .await
            .map_err(|_| {
                self.shared.lock().auth = None;
                RconError::Timeout {
                    operation: "authentication",
                    after: self.config.connect_timeout,
                }
            })?
            .map_err(|_| {
                RconError::ConnectionFailed("connection closed during authentication".to_string())
            })?;
        verdict?;

        // The reader may have faulted between the verdict and now; only a
        // session still authenticating can complete the handshake.
        let change = { self.shared.lock().session.transition(ConnectionState::Authenticated) };
        let Ok(change) = change else {
            return Err(RconError::ConnectionFailed(
                "connection closed during authentication".to_string(),
            ));
        };
        self.shared.events.emit(ClientEvent::StateChange { new: change.new, old: change.old });
        self.shared.events.emit(ClientEvent::Authenticated);
        Ok(())
    }

    /// Resolve the configured endpoint, honouring the IPv4 restriction.
    async fn resolve(&self) -> Result<SocketAddr, RconError> {
        let mut addrs = lookup_host((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|err| RconError::ConnectionFailed(format!("resolution failed: {err}")))?;

        let selected = if self.config.force_ipv4 {
            addrs.find(SocketAddr::is_ipv4)
        } else {
            addrs.next()
        };

        selected.ok_or_else(|| {
            RconError::ConnectionFailed(format!(
                "no usable address for {}:{}",
                self.config.host, self.config.port
            ))
        })
    }

    /// Execute a command and return the complete, reassembled response.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` outside the authenticated state (the transport is
    /// not touched), `Timeout` when the response does not complete within
    /// `io_timeout`, `SocketError`/`InvalidPacket` on send problems, and
    /// `CommandFailed` wrapping the cause when the session dies while the
    /// command is in flight.
    pub async fn execute(&self, command: &str) -> Result<String, RconError> {
        let (command_id, terminator_id, rx) = {
            let mut st = self.shared.lock();
            if !st.session.is_authenticated() {
                return Err(RconError::NotAuthenticated { state: st.session.state() });
            }

            let command_id = st.ids.next();
            let terminator_id = st.ids.next();
            let (tx, rx) = oneshot::channel();
            st.pending.insert(command_id, Inflight {
                terminator_id,
                fragments: Vec::new(),
                resolver: tx,
            });
            st.by_terminator.insert(terminator_id, command_id);
            (command_id, terminator_id, rx)
        };

        let command_packet = Packet::new(command_id, source::EXEC_COMMAND, command.as_bytes());
        let terminator_packet = Packet::new(terminator_id, source::RESPONSE_VALUE, Vec::new());

        if let Err(err) = self.send_packet(&command_packet).await {
            self.remove_entry(command_id);
            return Err(err);
        }
        if let Err(err) = self.send_packet(&terminator_packet).await {
            self.remove_entry(command_id);
            return Err(err);
        }

        match timeout(self.config.io_timeout, rx).await {
            Err(_) => {
                self.remove_entry(command_id);
                Err(RconError::Timeout { operation: "command", after: self.config.io_timeout })
            },
            Ok(Err(_)) => {
                // Resolver dropped without a verdict; treat as a closed
                // connection surfacing mid-command.
                self.remove_entry(command_id);
                Err(RconError::ConnectionFailed("connection closed".to_string())
                    .into_command_failure())
            },
            Ok(Ok(verdict)) => verdict
                .map(|bytes| self.config.payload_encoding.decode(&bytes))
                .map_err(RconError::into_command_failure),
        }
    }

    /// Tear the session down.
    ///
    /// Stops the reader, fails every in-flight entry with a
    /// connection-closed error, destroys the stream and settles in
    /// `Disconnected`. Never fails and is idempotent.
    pub async fn disconnect(&self) {
        let prior = self.state();
        if prior == ConnectionState::Disconnected {
            return;
        }
        self.shared.teardown.store(true, Ordering::SeqCst);

        let reader = self.reader.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = reader {
            handle.abort();
        }

        self.shared.fail_all(&RconError::ConnectionFailed("Connection closed".to_string()));

        if let Some(mut stream) = self.writer.lock().await.take() {
            let _ = stream.shutdown().await;
        }

        self.shared.transition(ConnectionState::Disconnected);
        // A faulted session already reported its close; one socket lifetime
        // gets exactly one close event.
        if prior != ConnectionState::Error {
            self.shared.events.emit(ClientEvent::Close { had_error: false });
        }
        self.shared.events.emit(ClientEvent::Disconnected);
        self.shared.teardown.store(false, Ordering::SeqCst);
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), RconError> {
        let bytes = packet.to_bytes()?;

        let mut writer = self.writer.lock().await;
        let Some(stream) = writer.as_mut() else {
            return Err(RconError::ConnectionFailed("not connected".to_string()));
        };

        if self.shared.debug {
            debug!(id = packet.id, kind = packet.kind, len = packet.body.len(), "sending packet");
        }
        stream
            .write_all(&bytes)
            .await
            .map_err(|err| RconError::SocketError(err.to_string()))?;
        Ok(())
    }

    fn remove_entry(&self, command_id: i32) {
        let mut st = self.shared.lock();
        if let Some(entry) = st.pending.remove(&command_id) {
            st.by_terminator.remove(&entry.terminator_id);
        }
    }
}

/// Reader task: bytes from the stream, through the framer, into the
/// dispatcher. The inactivity timer only runs while a response is owed so
/// a quiescent authenticated session is not torn down.
async fn run_reader(shared: Arc<Shared>, mut read_half: OwnedReadHalf, config: ClientConfig) {
    let mut framer = Framer::new();
    let mut buf = BytesMut::with_capacity(4096);

    loop {
        let awaiting_response = {
            let st = shared.lock();
            st.auth.is_some() || !st.pending.is_empty()
        };

        let read = if awaiting_response {
            match timeout(config.io_timeout, read_half.read_buf(&mut buf)).await {
                Ok(read) => read,
                Err(_) => {
                    shared.fault(RconError::Timeout {
                        operation: "socket inactivity",
                        after: config.io_timeout,
                    });
                    return;
                },
            }
        } else {
            read_half.read_buf(&mut buf).await
        };

        match read {
            Ok(0) => {
                shared.fault(RconError::ConnectionFailed(
                    "connection closed by server".to_string(),
                ));
                return;
            },
            Ok(_) => {
                framer.extend(&buf);
                buf.clear();
                loop {
                    match framer.next_packet() {
                        Ok(Some(packet)) => dispatch(&shared, packet),
                        Ok(None) => break,
                        Err(err) => {
                            // Desync: the framer discarded its buffer; the
                            // stream itself stays up.
                            debug!(%err, "discarded desynchronised receive buffer");
                            break;
                        },
                    }
                }
            },
            Err(err) => {
                shared.fault(RconError::SocketError(err.to_string()));
                return;
            },
        }
    }
}

/// Route one framed packet according to session state.
fn dispatch(shared: &Shared, packet: Packet) {
    if shared.debug {
        debug!(id = packet.id, kind = packet.kind, len = packet.body.len(), "received packet");
    }

    let mut st = shared.lock();
    match st.session.state() {
        ConnectionState::Authenticating => {
            // `-1` on any packet while authenticating means rejected
            // credentials, regardless of kind.
            if packet.id == -1 {
                if let Some((_, resolver)) = st.auth.take() {
                    let _ = resolver.send(Err(RconError::AuthFailed));
                }
                return;
            }
            // Servers may send an empty type-0 response ahead of the auth
            // echo; it carries no verdict.
            if packet.kind == source::RESPONSE_VALUE {
                return;
            }
            let matches_auth = st.auth.as_ref().is_some_and(|&(auth_id, _)| auth_id == packet.id);
            if matches_auth && packet.kind == source::EXEC_COMMAND {
                if let Some((_, resolver)) = st.auth.take() {
                    let _ = resolver.send(Ok(Vec::new()));
                }
            }
        },
        ConnectionState::Authenticated => {
            if let Some(entry) = st.pending.get_mut(&packet.id) {
                entry.fragments.push(packet.body);
                return;
            }
            if let Some(&command_id) = st.by_terminator.get(&packet.id) {
                st.by_terminator.remove(&packet.id);
                if let Some(entry) = st.pending.remove(&command_id) {
                    let response = entry.fragments.concat();
                    let _ = entry.resolver.send(Ok(response));
                }
                return;
            }
            debug!(id = packet.id, "dropping packet with no matching request");
        },
        _ => {
            debug!(id = packet.id, "dropping packet outside an active session");
        },
    }
}
