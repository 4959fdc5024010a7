//! BattlEye RCON protocol engine.
//!
//! UDP. Every packet is a self-contained checksummed datagram; commands and
//! responses correlate through an 8-bit wrapping sequence number, the
//! server pushes messages asynchronously (each must be acknowledged), and
//! an empty command every 45 seconds keeps the authenticated session alive
//! on the server. Responses too large for one datagram arrive as indexed
//! pieces and are reassembled before the waiter resolves.
//!
//! The command timeout reuses `connect_timeout`; this protocol has no
//! separate I/O timer. Invalid datagrams are dropped without ceremony —
//! a shared UDP port legitimately sees unrelated traffic.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rcon_core::session::IllegalTransition;
use rcon_core::{ClientConfig, ConnectionState, PayloadEncoding, RconError, Session};
use rcon_proto::battleye::{self, Payload};
use tokio::net::{UdpSocket, lookup_host};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::event::{ClientEvent, EventBus};

/// Interval between keep-alive packets while authenticated. The server
/// drops sessions that stay silent longer than this.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(45);

/// Wrapping 8-bit sequence counter, shared by commands and heartbeats.
#[derive(Debug, Default)]
struct SequenceCounter {
    next: u8,
}

impl SequenceCounter {
    /// The sequence the next [`SequenceCounter::next`] call will issue.
    fn peek(&self) -> u8 {
        self.next
    }

    fn next(&mut self) -> u8 {
        let seq = self.next;
        self.next = seq.wrapping_add(1);
        seq
    }
}

/// Resolves a waiter with the response bytes or the failure.
type Resolver = oneshot::Sender<Result<Vec<u8>, RconError>>;

/// One in-flight `execute`.
struct Inflight {
    /// Pieces of a segmented response, by piece index. Empty until the
    /// first `CommandPart` arrives; single-datagram responses never touch
    /// it.
    parts: Vec<Option<Vec<u8>>>,
    /// Completion/rejection side of the waiter.
    resolver: Resolver,
}

impl Inflight {
    fn new(resolver: Resolver) -> Self {
        Self { parts: Vec::new(), resolver }
    }
}

/// Mutable engine state; one critical section covers all of it.
struct EngineState {
    session: Session,
    seqs: SequenceCounter,
    /// Waiter for the single in-flight login.
    auth: Option<Resolver>,
    /// In-flight commands by sequence number. At most one live entry per
    /// sequence value; heartbeats never register here.
    pending: HashMap<u8, Inflight>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            session: Session::new(),
            seqs: SequenceCounter::default(),
            auth: None,
            pending: HashMap::new(),
        }
    }
}

/// State shared between the client surface, reader and heartbeat tasks.
struct Shared {
    state: Mutex<EngineState>,
    events: EventBus,
    encoding: PayloadEncoding,
    debug: bool,
    /// Set while a deliberate `disconnect` runs, so the dying reader does
    /// not report it as a fault.
    teardown: AtomicBool,
}

impl Shared {
    fn new(encoding: PayloadEncoding, debug: bool) -> Self {
        Self {
            state: Mutex::new(EngineState::new()),
            events: EventBus::default(),
            encoding,
            debug,
            teardown: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_transition(&self, next: ConnectionState) -> Result<(), IllegalTransition> {
        let change = self.lock().session.transition(next)?;
        self.events.emit(ClientEvent::StateChange { new: change.new, old: change.old });
        Ok(())
    }

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
            let auth = st.auth.take();
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
        error!(%err, "battleye session fault");
        self.events.emit(ClientEvent::Error(err.clone()));
        self.events.emit(ClientEvent::StateChange { new: change.new, old: change.old });
        self.fail_all(&err);
        self.events.emit(ClientEvent::Close { had_error: true });
    }
}

/// BattlEye RCON client.
///
/// One UDP socket per connected lifetime, created by
/// [`BattlEyeClient::connect`] and destroyed by
/// [`BattlEyeClient::disconnect`] (or a fault). Concurrent `execute` calls
/// are fine as long as fewer than 256 are live at once; an exhausted
/// sequence window surfaces as command timeouts, not rejections.
pub struct BattlEyeClient {
    config: ClientConfig,
    shared: Arc<Shared>,
    socket: Mutex<Option<Arc<UdpSocket>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl BattlEyeClient {
    /// Create a client in `Disconnected`; no I/O happens until `connect`.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let shared = Arc::new(Shared::new(config.payload_encoding, config.debug));
        Self { config, shared, socket: Mutex::new(None), tasks: Mutex::new(Vec::new()) }
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

    /// Connect the socket and log in.
    ///
    /// On success the session is `Authenticated` and the heartbeat is
    /// running. On any failure the session is torn down to `Disconnected`
    /// before the error is returned; a rejected password is **not**
    /// retried.
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

        let bind_addr: SocketAddr = if addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|err| RconError::ConnectionFailed(err.to_string()))?;
        socket
            .connect(addr)
            .await
            .map_err(|err| RconError::ConnectionFailed(err.to_string()))?;
        let socket = Arc::new(socket);
        *self.socket.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&socket));

        self.shared.transition(ConnectionState::Connected);
        self.shared.transition(ConnectionState::Authenticating);

        let (tx, rx) = oneshot::channel();
        self.shared.lock().auth = Some(tx);

        let reader = tokio::spawn(run_reader(Arc::clone(&self.shared), Arc::clone(&socket)));
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner).push(reader);

        let login = battleye::build(&battleye::login_payload(self.config.password.as_bytes()));
        socket.send(&login).await.map_err(|err| RconError::SocketError(err.to_string()))?;

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

        let heartbeat = tokio::spawn(run_heartbeat(Arc::clone(&self.shared), socket));
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner).push(heartbeat);

        Ok(())
    }

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

    /// Execute a command and return the response.
    ///
    /// The command timeout equals `connect_timeout` — this protocol has no
    /// separate I/O timer. A wrapped sequence number whose slot is still
    /// occupied surfaces as a timeout (backpressure, not rejection).
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` outside the authenticated state (the transport is
    /// not touched), `Timeout` when no matching response arrives,
    /// `SocketError` on send problems, and `CommandFailed` wrapping the
    /// cause when the session dies while the command is in flight.
    pub async fn execute(&self, command: &str) -> Result<String, RconError> {
        let io_timeout = self.config.connect_timeout;

        let slot = {
            let mut st = self.shared.lock();
            if !st.session.is_authenticated() {
                return Err(RconError::NotAuthenticated { state: st.session.state() });
            }
            let seq = st.seqs.next();
            if st.pending.contains_key(&seq) {
                None
            } else {
                let (tx, rx) = oneshot::channel();
                st.pending.insert(seq, Inflight::new(tx));
                Some((seq, rx))
            }
        };

        // Sequence window exhausted: the slot's previous occupant is still
        // live, and issuing a duplicate would make its reply ambiguous.
        let Some((seq, rx)) = slot else {
            tokio::time::sleep(io_timeout).await;
            return Err(RconError::Timeout { operation: "command", after: io_timeout });
        };

        let datagram = battleye::build(&battleye::command_payload(seq, command.as_bytes()));
        if let Err(err) = self.send(&datagram).await {
            self.shared.lock().pending.remove(&seq);
            return Err(err);
        }
        if self.shared.debug {
            debug!(seq, len = command.len(), "sent command");
        }

        match timeout(io_timeout, rx).await {
            Err(_) => {
                self.shared.lock().pending.remove(&seq);
                Err(RconError::Timeout { operation: "command", after: io_timeout })
            },
            Ok(Err(_)) => {
                self.shared.lock().pending.remove(&seq);
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
    /// Stops the heartbeat and reader, fails every in-flight entry with a
    /// connection-closed error, closes the socket and settles in
    /// `Disconnected`. Never fails and is idempotent.
    pub async fn disconnect(&self) {
        let prior = self.state();
        if prior == ConnectionState::Disconnected {
            return;
        }
        self.shared.teardown.store(true, Ordering::SeqCst);

        let tasks: Vec<JoinHandle<()>> =
            self.tasks.lock().unwrap_or_else(PoisonError::into_inner).drain(..).collect();
        for handle in tasks {
            handle.abort();
        }

        self.shared.fail_all(&RconError::ConnectionFailed("Connection closed".to_string()));

        *self.socket.lock().unwrap_or_else(PoisonError::into_inner) = None;

        self.shared.transition(ConnectionState::Disconnected);
        // A faulted session already reported its close; one socket lifetime
        // gets exactly one close event.
        if prior != ConnectionState::Error {
            self.shared.events.emit(ClientEvent::Close { had_error: false });
        }
        self.shared.events.emit(ClientEvent::Disconnected);
        self.shared.teardown.store(false, Ordering::SeqCst);
    }

    async fn send(&self, datagram: &[u8]) -> Result<(), RconError> {
        let socket = self.socket.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let Some(socket) = socket else {
            return Err(RconError::ConnectionFailed("not connected".to_string()));
        };
        socket.send(datagram).await.map_err(|err| RconError::SocketError(err.to_string()))?;
        Ok(())
    }
}

/// Reader task: datagrams from the socket into the dispatcher, sending any
/// ack the dispatcher asks for.
async fn run_reader(shared: Arc<Shared>, socket: Arc<UdpSocket>) {
    let mut buf = [0u8; 4096];
    loop {
        match socket.recv(&mut buf).await {
            Ok(len) => {
                if let Some(ack) = dispatch(&shared, &buf[..len]) {
                    // Acks are unconditional and idempotent: if the server
                    // resends a message it did not see acknowledged, it is
                    // simply acked again.
                    if let Err(err) = socket.send(&ack).await {
                        warn!(%err, "failed to acknowledge server message");
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

/// Validate and route one datagram. Returns the ack to transmit, if any.
fn dispatch(shared: &Shared, datagram: &[u8]) -> Option<Vec<u8>> {
    let payload = match battleye::parse(datagram) {
        Ok(payload) => payload,
        Err(err) => {
            if shared.debug {
                debug!(%err, len = datagram.len(), "dropping invalid datagram");
            }
            return None;
        },
    };

    let message = match Payload::parse(payload) {
        Ok(message) => message,
        Err(err) => {
            if shared.debug {
                debug!(%err, "dropping unrecognised payload");
            }
            return None;
        },
    };

    match message {
        Payload::Login { result } => {
            let resolver = { shared.lock().auth.take() };
            if let Some(resolver) = resolver {
                let verdict = if result == battleye::LOGIN_OK {
                    Ok(Vec::new())
                } else {
                    Err(RconError::AuthFailed)
                };
                let _ = resolver.send(verdict);
            }
            None
        },
        Payload::Command { seq, body } => {
            let entry = { shared.lock().pending.remove(&seq) };
            if let Some(entry) = entry {
                let _ = entry.resolver.send(Ok(body.to_vec()));
            } else if shared.debug {
                // Heartbeat replies and late responses land here.
                debug!(seq, "dropping command response with no waiter");
            }
            None
        },
        Payload::CommandPart { seq, total, index, body } => {
            let completed = {
                let mut st = shared.lock();
                let Some(entry) = st.pending.get_mut(&seq) else {
                    if shared.debug {
                        debug!(seq, "dropping response piece with no waiter");
                    }
                    return None;
                };
                if entry.parts.is_empty() {
                    entry.parts.resize_with(usize::from(total), || None);
                }
                if let Some(slot) = entry.parts.get_mut(usize::from(index)) {
                    *slot = Some(body.to_vec());
                } else if shared.debug {
                    debug!(seq, total, index, "dropping response piece outside its window");
                }
                let done = !entry.parts.is_empty() && entry.parts.iter().all(Option::is_some);
                if done { st.pending.remove(&seq) } else { None }
            };
            if let Some(entry) = completed {
                let response: Vec<u8> = entry.parts.into_iter().flatten().flatten().collect();
                let _ = entry.resolver.send(Ok(response));
            }
            None
        },
        Payload::ServerMessage { seq, body } => {
            let text = shared.encoding.decode(body);
            shared.events.emit(ClientEvent::ServerMessage(text));
            Some(battleye::build(&battleye::ack_payload(seq)))
        },
    }
}

/// Heartbeat task: an empty command at a fixed cadence, fire-and-forget.
///
/// Registering heartbeats in the correlation table would leak entries
/// whenever the empty reply is dropped, so they are never correlated; send
/// errors are logged and swallowed.
async fn run_heartbeat(shared: Arc<Shared>, socket: Arc<UdpSocket>) {
    loop {
        tokio::time::sleep(HEARTBEAT_INTERVAL).await;

        let seq = {
            let mut st = shared.lock();
            if !st.session.is_authenticated() {
                return;
            }
            // Never issue a sequence a live command still owns: the echo
            // would resolve that command with the heartbeat's empty body.
            // The pending command's own traffic keeps the session alive,
            // so this beat can be skipped.
            if st.pending.contains_key(&st.seqs.peek()) {
                continue;
            }
            st.seqs.next()
        };

        let datagram = battleye::build(&battleye::command_payload(seq, &[]));
        if let Err(err) = socket.send(&datagram).await {
            warn!(%err, seq, "heartbeat send failed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn shared_in(state: ConnectionState) -> Shared {
        let shared = Shared::new(PayloadEncoding::Utf8, false);
        {
            let mut st = shared.lock();
            for next in [
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Authenticating,
                ConnectionState::Authenticated,
            ] {
                if st.session.state() == state {
                    break;
                }
                st.session.transition(next).unwrap();
            }
        }
        assert_eq!(shared.lock().session.state(), state);
        shared
    }

    #[test]
    fn sequence_wraps_at_255() {
        let mut seqs = SequenceCounter { next: 254 };
        assert_eq!(seqs.next(), 254);
        assert_eq!(seqs.next(), 255);
        assert_eq!(seqs.next(), 0);
        assert_eq!(seqs.next(), 1);
    }

    #[test]
    fn sequence_peek_does_not_advance() {
        let mut seqs = SequenceCounter::default();
        assert_eq!(seqs.peek(), 0);
        assert_eq!(seqs.peek(), 0);
        assert_eq!(seqs.next(), 0);
        assert_eq!(seqs.peek(), 1);
    }

    #[test]
    fn login_success_resolves_waiter() {
        let shared = shared_in(ConnectionState::Authenticating);
        let (tx, mut rx) = oneshot::channel();
        shared.lock().auth = Some(tx);

        let datagram = battleye::build(&[battleye::LOGIN, battleye::LOGIN_OK]);
        assert_eq!(dispatch(&shared, &datagram), None);
        assert!(matches!(rx.try_recv(), Ok(Ok(_))));
    }

    #[test]
    fn login_rejection_fails_waiter() {
        let shared = shared_in(ConnectionState::Authenticating);
        let (tx, mut rx) = oneshot::channel();
        shared.lock().auth = Some(tx);

        let datagram = battleye::build(&[battleye::LOGIN, 0x00]);
        dispatch(&shared, &datagram);
        assert!(matches!(rx.try_recv(), Ok(Err(RconError::AuthFailed))));
    }

    #[test]
    fn command_response_resolves_matching_sequence() {
        let shared = shared_in(ConnectionState::Authenticated);
        let (tx, mut rx) = oneshot::channel();
        shared.lock().pending.insert(7, Inflight::new(tx));

        let datagram = battleye::build(&battleye::command_payload(7, b"0 players"));
        dispatch(&shared, &datagram);

        assert_eq!(rx.try_recv().unwrap().unwrap(), b"0 players");
        assert!(shared.lock().pending.is_empty());
    }

    #[test]
    fn segmented_response_reassembles_out_of_order() {
        let shared = shared_in(ConnectionState::Authenticated);
        let (tx, mut rx) = oneshot::channel();
        shared.lock().pending.insert(4, Inflight::new(tx));

        let pieces: [(u8, &[u8]); 3] = [(2, b"beta"), (0, b"alpha"), (1, b"-")];
        for (index, body) in pieces {
            let datagram = battleye::build(&battleye::command_part_payload(4, 3, index, body));
            dispatch(&shared, &datagram);
        }

        assert_eq!(rx.try_recv().unwrap().unwrap(), b"alpha-beta");
        assert!(shared.lock().pending.is_empty());
    }

    #[test]
    fn incomplete_segmented_response_keeps_waiting() {
        let shared = shared_in(ConnectionState::Authenticated);
        let (tx, mut rx) = oneshot::channel();
        shared.lock().pending.insert(4, Inflight::new(tx));

        let datagram = battleye::build(&battleye::command_part_payload(4, 2, 0, b"half"));
        dispatch(&shared, &datagram);

        assert!(rx.try_recv().is_err());
        assert_eq!(shared.lock().pending.len(), 1);
    }

    #[test]
    fn server_message_is_acked_and_emitted() {
        let shared = shared_in(ConnectionState::Authenticated);
        let mut events = shared.events.subscribe();

        let mut payload = vec![battleye::SERVER_MESSAGE, 42];
        payload.extend_from_slice(b"player connected");
        let ack = dispatch(&shared, &battleye::build(&payload));

        assert_eq!(ack, Some(battleye::build(&battleye::ack_payload(42))));
        match events.try_recv() {
            Ok(ClientEvent::ServerMessage(text)) => assert_eq!(text, "player connected"),
            other => unreachable!("expected server message event, got {other:?}"),
        }
    }

    #[test]
    fn repeated_server_message_is_acked_again() {
        let shared = shared_in(ConnectionState::Authenticated);
        let datagram = battleye::build(&[battleye::SERVER_MESSAGE, 9, b'x']);

        assert!(dispatch(&shared, &datagram).is_some());
        assert!(dispatch(&shared, &datagram).is_some());
    }

    #[test]
    fn corrupt_datagrams_are_dropped_silently() {
        let shared = shared_in(ConnectionState::Authenticated);
        let (tx, mut rx) = oneshot::channel();
        shared.lock().pending.insert(0, Inflight::new(tx));

        let mut datagram = battleye::build(&battleye::command_payload(0, b"response"));
        datagram[8] ^= 0xFF;

        assert_eq!(dispatch(&shared, &datagram), None);
        // The waiter is untouched.
        assert!(rx.try_recv().is_err());
        assert_eq!(shared.lock().pending.len(), 1);
    }

    #[test]
    fn unrelated_traffic_is_dropped() {
        let shared = shared_in(ConnectionState::Authenticated);
        assert_eq!(dispatch(&shared, b"GET / HTTP/1.1\r\n"), None);
        assert_eq!(dispatch(&shared, &[]), None);
    }

    #[test]
    fn fail_all_clears_auth_and_pending() {
        let shared = shared_in(ConnectionState::Authenticated);
        let (tx_a, mut rx_a) = oneshot::channel();
        let (tx_b, mut rx_b) = oneshot::channel();
        {
            let mut st = shared.lock();
            st.pending.insert(0, Inflight::new(tx_a));
            st.pending.insert(1, Inflight::new(tx_b));
        }

        shared.fail_all(&RconError::ConnectionFailed("Connection closed".to_string()));

        assert!(matches!(rx_a.try_recv(), Ok(Err(RconError::ConnectionFailed(_)))));
        assert!(matches!(rx_b.try_recv(), Ok(Err(RconError::ConnectionFailed(_)))));
        assert_eq!(shared.lock().pending.len(), 0);
    }

    #[test]
    fn heartbeat_payload_shape() {
        // Fire-and-forget keep-alive: a command with an empty body.
        let datagram = battleye::build(&battleye::command_payload(3, &[]));
        let payload = battleye::parse(&datagram).unwrap();
        assert_eq!(Payload::parse(payload).unwrap(), Payload::Command { seq: 3, body: b"" });
    }
}
