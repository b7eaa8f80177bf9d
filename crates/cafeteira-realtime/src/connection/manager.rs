//! Connection manager: one background task owns the socket.
//!
//! ```text
//! Disconnected --connect (authenticated)--> Connecting --opened--> Open
//! Connecting/Open --abnormal close (authenticated)--> Reconnecting --delay--> Connecting
//! any --disconnect / session cleared / shutdown--> Disconnected
//! Open --close frame from device--> Disconnected
//! ```
//!
//! Consumers observe the state through a watch channel, transitions through
//! a [`ConnectionEvent`] broadcast, and receive decoded messages through a
//! broadcast channel. Commands reach the task over an
//! mpsc channel, so the public handle never blocks.

use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cafeteira_core::config::RealtimeConfig;
use cafeteira_core::session::{Session, SessionStore};

use crate::message::serializer::{deserialize_inbound, serialize_outbound};
use crate::message::types::{InboundMessage, OutboundMessage};

use super::policy::ReconnectPolicy;
use super::state::{ConnectionEvent, ConnectionState};
use super::transport::{Connector, FrameSink, Transport};

/// Requests from the handle to the connection task.
#[derive(Debug)]
enum Command {
    Connect,
    Disconnect,
    Send(String),
}

/// Handle to the realtime connection.
///
/// At most one socket exists per manager. Dropping the manager cancels the
/// task.
#[derive(Debug)]
pub struct ConnectionManager {
    /// Command channel to the task.
    commands: mpsc::UnboundedSender<Command>,
    /// Current state.
    state_rx: watch::Receiver<ConnectionState>,
    /// Decoded inbound messages.
    inbound_tx: broadcast::Sender<InboundMessage>,
    /// Lifecycle transitions.
    events_tx: broadcast::Sender<ConnectionEvent>,
    /// Stops the task.
    shutdown: CancellationToken,
    /// The connection task.
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Spawn the connection task. The socket is not opened until
    /// [`connect`](Self::connect) is called.
    pub fn spawn(connector: Arc<dyn Connector>, session: SessionStore, config: &RealtimeConfig) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (inbound_tx, _) = broadcast::channel(config.channel_buffer_size.max(1));
        let (events_tx, _) = broadcast::channel(EVENT_BUFFER);
        let shutdown = CancellationToken::new();

        let worker = Worker {
            connector,
            session,
            policy: ReconnectPolicy::from_config(config),
            state_tx,
            inbound_tx: inbound_tx.clone(),
            events_tx: events_tx.clone(),
            commands: command_rx,
            shutdown: shutdown.clone(),
            attempts: 0,
        };
        let task = tokio::spawn(worker.run());

        Self {
            commands,
            state_rx,
            inbound_tx,
            events_tx,
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }

    /// Request a connection. No-op unless currently disconnected, and
    /// ignored while no session is installed.
    pub fn connect(&self) {
        let _ = self.commands.send(Command::Connect);
    }

    /// Close the socket and cancel any pending reconnect.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    /// Send a message if the socket is open. Returns `false` (and drops the
    /// message) otherwise; nothing is queued.
    pub fn send(&self, message: &OutboundMessage) -> bool {
        if !self.state().is_open() {
            debug!(kind = message.kind(), state = %self.state(), "Dropping outbound message, socket not open");
            return false;
        }
        match serialize_outbound(message) {
            Ok(text) => self.commands.send(Command::Send(text)).is_ok(),
            Err(e) => {
                warn!(kind = message.kind(), error = %e, "Failed to serialize outbound message");
                false
            }
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Subscribe to decoded inbound messages.
    pub fn subscribe(&self) -> broadcast::Receiver<InboundMessage> {
        self.inbound_tx.subscribe()
    }

    /// Subscribe to lifecycle transitions.
    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events_tx.subscribe()
    }

    /// Stop the task, closing the socket, and wait for it to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Capacity of the lifecycle event channel.
const EVENT_BUFFER: usize = 16;

/// Where the task goes next.
enum Phase {
    Idle,
    Connecting,
    Open(Transport),
    Waiting,
    Stopped,
}

/// State owned by the connection task.
struct Worker {
    connector: Arc<dyn Connector>,
    session: SessionStore,
    policy: ReconnectPolicy,
    state_tx: watch::Sender<ConnectionState>,
    inbound_tx: broadcast::Sender<InboundMessage>,
    events_tx: broadcast::Sender<ConnectionEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    shutdown: CancellationToken,
    /// Consecutive reconnect attempts since the last successful open.
    attempts: u32,
}

impl Worker {
    async fn run(mut self) {
        let mut session_rx = self.session.subscribe();
        let mut phase = Phase::Idle;

        loop {
            phase = match phase {
                Phase::Idle => self.idle().await,
                Phase::Connecting => self.connecting(&mut session_rx).await,
                Phase::Open(transport) => self.open(transport, &mut session_rx).await,
                Phase::Waiting => self.waiting(&mut session_rx).await,
                Phase::Stopped => break,
            };
        }

        self.set_state(ConnectionState::Disconnected);
        debug!("Realtime connection task stopped");
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Realtime state changed");
        }
    }

    fn emit(&self, event: ConnectionEvent) {
        let _ = self.events_tx.send(event);
    }

    /// Abnormal close: retry while the session lasts.
    fn after_abnormal_close(&self, event: ConnectionEvent) -> Phase {
        if self.session.is_authenticated() {
            self.emit(event);
            Phase::Waiting
        } else {
            self.emit(ConnectionEvent::Closed);
            Phase::Idle
        }
    }

    /// Orderly close: no reconnect.
    fn closed(&self) -> Phase {
        self.emit(ConnectionEvent::Closed);
        Phase::Idle
    }

    async fn idle(&mut self) -> Phase {
        self.set_state(ConnectionState::Disconnected);
        self.attempts = 0;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return Phase::Stopped,
                command = self.commands.recv() => match command {
                    Some(Command::Connect) => {
                        if self.session.is_authenticated() {
                            return Phase::Connecting;
                        }
                        debug!("Connect ignored, no session");
                    }
                    Some(Command::Send(_)) => debug!("Dropping outbound frame, socket not open"),
                    Some(Command::Disconnect) => {}
                    None => return Phase::Stopped,
                },
            }
        }
    }

    async fn connecting(&mut self, session_rx: &mut watch::Receiver<Option<Session>>) -> Phase {
        self.set_state(ConnectionState::Connecting);
        session_rx.borrow_and_update();

        let connector = self.connector.clone();
        let connect = connector.connect();
        tokio::pin!(connect);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return Phase::Stopped,
                command = self.commands.recv() => match command {
                    Some(Command::Disconnect) => {
                        info!("Realtime connect aborted");
                        return Phase::Idle;
                    }
                    Some(Command::Connect) => debug!("Connect ignored, attempt in progress"),
                    Some(Command::Send(_)) => debug!("Dropping outbound frame, socket not open"),
                    None => return Phase::Stopped,
                },
                changed = session_rx.changed() => {
                    if changed.is_err() || session_rx.borrow_and_update().is_none() {
                        info!("Session ended, realtime connect aborted");
                        return Phase::Idle;
                    }
                }
                result = &mut connect => {
                    return match result {
                        Ok(transport) => Phase::Open(transport),
                        Err(e) => {
                            warn!(error = %e, "Realtime connection failed");
                            self.after_abnormal_close(ConnectionEvent::OpenFailed)
                        }
                    };
                }
            }
        }
    }

    async fn open(&mut self, transport: Transport, session_rx: &mut watch::Receiver<Option<Session>>) -> Phase {
        let Transport { mut sink, mut stream } = transport;
        self.set_state(ConnectionState::Open);
        self.emit(ConnectionEvent::Opened);
        self.attempts = 0;
        session_rx.borrow_and_update();
        info!("Realtime connection open");

        if let Some(session) = self.session.current() {
            let auth = OutboundMessage::Auth {
                username: session.username.clone(),
                role: session.role.as_str().to_string(),
            };
            match serialize_outbound(&auth) {
                Ok(text) => {
                    if let Err(e) = sink.send(Message::text(text)).await {
                        warn!(error = %e, "Failed to send auth frame");
                        return self.after_abnormal_close(ConnectionEvent::Lost);
                    }
                }
                Err(e) => warn!(error = %e, "Failed to serialize auth frame"),
            }
        }

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    close(&mut sink).await;
                    return Phase::Stopped;
                }
                command = self.commands.recv() => match command {
                    Some(Command::Send(text)) => {
                        if let Err(e) = sink.send(Message::text(text)).await {
                            warn!(error = %e, "Realtime send failed");
                            return self.after_abnormal_close(ConnectionEvent::Lost);
                        }
                    }
                    Some(Command::Connect) => debug!("Connect ignored, already open"),
                    Some(Command::Disconnect) => {
                        close(&mut sink).await;
                        info!("Realtime connection closed");
                        return self.closed();
                    }
                    None => {
                        close(&mut sink).await;
                        return Phase::Stopped;
                    }
                },
                changed = session_rx.changed() => {
                    if changed.is_err() || session_rx.borrow_and_update().is_none() {
                        close(&mut sink).await;
                        info!("Session ended, realtime connection closed");
                        return self.closed();
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.dispatch(text.as_str()),
                    Some(Ok(Message::Close(frame))) => {
                        info!(frame = ?frame, "Realtime connection closed by device");
                        return self.closed();
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Realtime connection lost");
                        return self.after_abnormal_close(ConnectionEvent::Lost);
                    }
                    None => {
                        warn!("Realtime stream ended without close frame");
                        return self.after_abnormal_close(ConnectionEvent::Lost);
                    }
                },
            }
        }
    }

    async fn waiting(&mut self, session_rx: &mut watch::Receiver<Option<Session>>) -> Phase {
        self.set_state(ConnectionState::Reconnecting);
        session_rx.borrow_and_update();
        self.attempts += 1;

        if self.policy.exceeds_cap(self.attempts) {
            warn!(
                attempt = self.attempts,
                max_attempts = self.policy.max_attempts,
                "Reconnect attempts past configured maximum, retrying anyway"
            );
        } else {
            info!(
                attempt = self.attempts,
                max_attempts = self.policy.max_attempts,
                delay_ms = self.policy.delay.as_millis() as u64,
                "Scheduling realtime reconnect"
            );
        }

        let timer = tokio::time::sleep(self.policy.delay);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return Phase::Stopped,
                command = self.commands.recv() => match command {
                    Some(Command::Disconnect) => {
                        info!("Pending reconnect cancelled");
                        return Phase::Idle;
                    }
                    Some(Command::Connect) => debug!("Connect ignored, reconnect pending"),
                    Some(Command::Send(_)) => debug!("Dropping outbound frame, socket not open"),
                    None => return Phase::Stopped,
                },
                changed = session_rx.changed() => {
                    if changed.is_err() || session_rx.borrow_and_update().is_none() {
                        info!("Session ended, pending reconnect cancelled");
                        return Phase::Idle;
                    }
                }
                _ = &mut timer => {
                    return if self.session.is_authenticated() {
                        Phase::Connecting
                    } else {
                        Phase::Idle
                    };
                }
            }
        }
    }

    fn dispatch(&self, text: &str) {
        match deserialize_inbound(text) {
            Ok(message) => {
                if let InboundMessage::Unknown { kind } = &message {
                    debug!(kind = %kind, "Unrecognised realtime message type");
                }
                let _ = self.inbound_tx.send(message);
            }
            Err(e) => warn!(error = %e, "Dropping realtime frame"),
        }
    }
}

async fn close(sink: &mut FrameSink) {
    let _ = sink.send(Message::Close(None)).await;
    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::channel::mpsc as fmpsc;
    use tokio::time::Instant;
    use tokio_tungstenite::tungstenite::Error as WsError;

    use cafeteira_core::error::AppError;
    use cafeteira_core::session::Role;
    use cafeteira_core::AppResult;

    use super::*;

    /// Device side of an in-memory socket.
    struct Peer {
        to_client: fmpsc::UnboundedSender<Result<Message, WsError>>,
        from_client: fmpsc::UnboundedReceiver<Message>,
    }

    impl Peer {
        fn push(&self, text: &str) {
            self.to_client
                .unbounded_send(Ok(Message::text(text.to_string())))
                .unwrap();
        }

        async fn next_text(&mut self) -> String {
            match self.from_client.next().await {
                Some(Message::Text(text)) => text.as_str().to_string(),
                other => panic!("expected text frame, got {other:?}"),
            }
        }
    }

    struct MemoryConnector {
        attempts: AtomicUsize,
        refuse: AtomicBool,
        peers: tokio::sync::mpsc::UnboundedSender<Peer>,
    }

    #[async_trait]
    impl Connector for MemoryConnector {
        async fn connect(&self) -> AppResult<Transport> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.refuse.load(Ordering::SeqCst) {
                return Err(AppError::transport("connection refused"));
            }
            let (client_tx, from_client) = fmpsc::unbounded::<Message>();
            let (to_client, client_rx) = fmpsc::unbounded::<Result<Message, WsError>>();
            let _ = self.peers.send(Peer { to_client, from_client });
            Ok(Transport::new(
                client_tx.sink_map_err(|_| WsError::ConnectionClosed),
                client_rx,
            ))
        }
    }

    struct Harness {
        manager: ConnectionManager,
        connector: Arc<MemoryConnector>,
        peers: tokio::sync::mpsc::UnboundedReceiver<Peer>,
        session: SessionStore,
        state: watch::Receiver<ConnectionState>,
    }

    impl Harness {
        fn new(logged_in: bool) -> Self {
            let (peers_tx, peers) = tokio::sync::mpsc::unbounded_channel();
            let connector = Arc::new(MemoryConnector {
                attempts: AtomicUsize::new(0),
                refuse: AtomicBool::new(false),
                peers: peers_tx,
            });
            let session = SessionStore::new();
            if logged_in {
                session.set(Session::new("admin", Role::Admin, 0));
            }
            let manager = ConnectionManager::spawn(connector.clone(), session.clone(), &RealtimeConfig::default());
            let state = manager.watch_state();
            Self {
                manager,
                connector,
                peers,
                session,
                state,
            }
        }

        fn attempts(&self) -> usize {
            self.connector.attempts.load(Ordering::SeqCst)
        }

        async fn reach(&mut self, want: ConnectionState) {
            self.state.wait_for(|s| *s == want).await.unwrap();
        }

        async fn open(&mut self) -> Peer {
            self.manager.connect();
            let peer = self.peers.recv().await.unwrap();
            self.reach(ConnectionState::Open).await;
            peer
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_without_session_stays_disconnected() {
        let h = Harness::new(false);
        h.manager.connect();
        settle().await;
        assert_eq!(h.manager.state(), ConnectionState::Disconnected);
        assert_eq!(h.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_sends_auth_frame() {
        let mut h = Harness::new(true);
        let mut peer = h.open().await;

        let frame: serde_json::Value = serde_json::from_str(&peer.next_text().await).unwrap();
        assert_eq!(frame["type"], "auth");
        assert_eq!(frame["data"]["username"], "admin");
        assert_eq!(frame["data"]["role"], "Admin");
        assert!(frame["timestamp"].as_i64().unwrap() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_only_while_open() {
        let mut h = Harness::new(true);
        assert!(!h.manager.send(&OutboundMessage::GetStatus));

        let mut peer = h.open().await;
        let _auth = peer.next_text().await;
        assert!(h.manager.send(&OutboundMessage::GetStatus));
        let frame: serde_json::Value = serde_json::from_str(&peer.next_text().await).unwrap();
        assert_eq!(frame["type"], "get_status");
    }

    #[tokio::test(start_paused = true)]
    async fn test_abnormal_close_schedules_exactly_one_reconnect() {
        let mut h = Harness::new(true);
        let peer = h.open().await;

        drop(peer);
        h.reach(ConnectionState::Reconnecting).await;
        let lost_at = Instant::now();
        assert_eq!(h.attempts(), 1);

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(h.attempts(), 1);

        let _peer = h.peers.recv().await.unwrap();
        assert!(lost_at.elapsed() >= Duration::from_millis(5_000));
        h.reach(ConnectionState::Open).await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_connect_keeps_retrying_past_declared_cap() {
        let mut h = Harness::new(true);
        h.connector.refuse.store(true, Ordering::SeqCst);
        h.manager.connect();
        h.reach(ConnectionState::Reconnecting).await;

        tokio::time::sleep(Duration::from_millis(5_000 * 12 + 100)).await;
        assert_eq!(h.attempts(), 13);
        assert_eq!(h.manager.state(), ConnectionState::Reconnecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_close_does_not_reconnect() {
        let mut h = Harness::new(true);
        let peer = h.open().await;

        peer.to_client.unbounded_send(Ok(Message::Close(None))).unwrap();
        h.reach(ConnectionState::Disconnected).await;

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.attempts(), 1);
        assert_eq!(h.manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_while_reconnecting_cancels_timer() {
        let mut h = Harness::new(true);
        h.connector.refuse.store(true, Ordering::SeqCst);
        h.manager.connect();
        h.reach(ConnectionState::Reconnecting).await;

        h.manager.disconnect();
        h.reach(ConnectionState::Disconnected).await;

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_closes_open_socket() {
        let mut h = Harness::new(true);
        let mut peer = h.open().await;
        let _auth = peer.next_text().await;

        h.session.clear();
        h.reach(ConnectionState::Disconnected).await;
        assert!(matches!(peer.from_client.next().await, Some(Message::Close(_))));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abnormal_close_after_logout_does_not_reconnect() {
        let mut h = Harness::new(true);
        h.connector.refuse.store(true, Ordering::SeqCst);
        h.manager.connect();
        h.reach(ConnectionState::Reconnecting).await;

        h.session.clear();
        h.reach(ConnectionState::Disconnected).await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_while_open_is_noop() {
        let mut h = Harness::new(true);
        let _peer = h.open().await;

        h.manager.connect();
        h.manager.connect();
        settle().await;
        assert_eq!(h.attempts(), 1);
        assert_eq!(h.manager.state(), ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_frames_are_dropped() {
        let mut h = Harness::new(true);
        let mut inbound = h.manager.subscribe();
        let peer = h.open().await;

        peer.push("not json");
        peer.push(r#"{"type":"system_status","data":"oops"}"#);
        peer.push(r#"{"type":"firmware_update","data":{}}"#);
        peer.push(r#"{"type":"coffee_served","data":{"userName":"Ana"}}"#);

        assert_eq!(
            inbound.recv().await.unwrap(),
            InboundMessage::Unknown {
                kind: "firmware_update".into()
            }
        );
        let InboundMessage::CoffeeServed(served) = inbound.recv().await.unwrap() else {
            panic!("expected coffee_served");
        };
        assert_eq!(served.user_name, "Ana");
        assert_eq!(h.manager.state(), ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_task() {
        let mut h = Harness::new(true);
        let mut peer = h.open().await;
        let _auth = peer.next_text().await;

        h.manager.shutdown().await;
        assert_eq!(h.manager.state(), ConnectionState::Disconnected);
        assert!(matches!(peer.from_client.next().await, Some(Message::Close(_))));
        assert!(!h.manager.send(&OutboundMessage::GetUsers));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_connect_reports_open_failed_each_attempt() {
        let mut h = Harness::new(true);
        let mut events = h.manager.events();
        h.connector.refuse.store(true, Ordering::SeqCst);
        h.manager.connect();

        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::OpenFailed);
        h.reach(ConnectionState::Reconnecting).await;

        tokio::time::sleep(Duration::from_millis(5_000 + 100)).await;
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::OpenFailed);
        assert_eq!(h.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_follow_open_lost_and_clean_close() {
        let mut h = Harness::new(true);
        let mut events = h.manager.events();

        let peer = h.open().await;
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Opened);
        drop(peer);
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Lost);

        tokio::time::sleep(Duration::from_millis(5_000 + 100)).await;
        let peer = h.peers.recv().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Opened);
        peer.to_client.unbounded_send(Ok(Message::Close(None))).unwrap();
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Closed);
        h.reach(ConnectionState::Disconnected).await;
    }
}
