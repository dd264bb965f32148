//! The protocol entry state machine.
//!
//! One entry manages one logical peer relationship: it owns the live
//! connection (when there is one), initiates and answers heartbeats,
//! frames outgoing messages and routes incoming frames. The state
//! machine runs as a spawned task holding all session state
//! exclusively; callers interact through an [`EntryHandle`].

use codec::{
    heartbeat_reply_image, heartbeat_request_image, make_package_image, CodecError, Frame,
    MessageSet, ParsingEngine, PkgContentType,
};
use network::{
    connect, next_connection_id, Connection, NetworkError, NoopStats, TimerWatchdog,
    DEFAULT_CONNECT_TIMEOUT,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::cfg::EntryCfg;
use crate::consumer::MessageConsumer;
use crate::error::{DisconnectReason, SendError};

/// Connection phase of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Connecting,
    /// Connected; the opening heartbeat exchange is still outstanding.
    AwaitingFirstHeartbeat,
    Steady,
    ReconnectPending,
}

impl Phase {
    /// Whether outgoing application messages are permitted.
    pub fn permits_send(self) -> bool {
        matches!(self, Phase::Steady | Phase::AwaitingFirstHeartbeat)
    }
}

enum Command<P> {
    Send(P),
    Shutdown,
}

const COMMAND_QUEUE_DEPTH: usize = 64;

/// Sending/observation facade over a spawned entry task.
pub struct EntryHandle<P: MessageSet> {
    command_tx: mpsc::Sender<Command<P>>,
    phase_rx: watch::Receiver<Phase>,
}

impl<P: MessageSet> Clone for EntryHandle<P> {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
            phase_rx: self.phase_rx.clone(),
        }
    }
}

impl<P: MessageSet> EntryHandle<P> {
    /// The entry's current phase.
    pub fn phase(&self) -> Phase {
        *self.phase_rx.borrow()
    }

    /// A watch over phase transitions, for waiting on state changes.
    pub fn phase_watch(&self) -> watch::Receiver<Phase> {
        self.phase_rx.clone()
    }

    /// Hand a message to the entry for transmission.
    ///
    /// Permitted while `Steady` or `AwaitingFirstHeartbeat`; in any
    /// other phase the message is rejected immediately and handed back.
    /// Messages are never queued across reconnects.
    pub async fn send(&self, message: P) -> Result<(), SendError<P>> {
        if !self.phase().permits_send() {
            return Err(SendError::NotConnected { message });
        }

        self.command_tx
            .send(Command::Send(message))
            .await
            .map_err(|rejected| match rejected.0 {
                Command::Send(message) => SendError::Closed { message },
                Command::Shutdown => unreachable!("send only enqueues Command::Send"),
            })
    }

    /// Ask the entry to terminate. Idempotent.
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(Command::Shutdown).await;
    }
}

/// Spawn a client entry: connects to the configured endpoint and keeps
/// reconnecting until explicitly shut down.
pub fn spawn_client<P, C, E>(cfg: EntryCfg, engine: E, consumer: C) -> EntryHandle<P>
where
    P: MessageSet,
    C: MessageConsumer<P>,
    E: ParsingEngine,
{
    let (entry, handle) = Entry::new(cfg, engine, consumer);
    tokio::spawn(entry.run_client());
    handle
}

/// Spawn an entry around an already-accepted socket.
///
/// The entry serves this one socket; when the session ends the entry
/// terminates. Its "reconnect" is the next accept on the listening
/// side.
pub fn spawn_accepted<P, C, E, IO>(
    io: IO,
    peer: impl Into<String>,
    cfg: EntryCfg,
    engine: E,
    consumer: C,
) -> EntryHandle<P>
where
    P: MessageSet,
    C: MessageConsumer<P>,
    E: ParsingEngine,
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (entry, handle) = Entry::new(cfg, engine, consumer);
    tokio::spawn(entry.run_accepted(io, peer.into()));
    handle
}

enum SessionEnd {
    Shutdown,
    Disconnected(DisconnectReason),
}

struct Entry<P: MessageSet, C, E> {
    cfg: EntryCfg,
    engine: E,
    consumer: C,
    command_rx: mpsc::Receiver<Command<P>>,
    phase_tx: watch::Sender<Phase>,
    phase: Phase,
}

impl<P, C, E> Entry<P, C, E>
where
    P: MessageSet,
    C: MessageConsumer<P>,
    E: ParsingEngine,
{
    fn new(cfg: EntryCfg, engine: E, consumer: C) -> (Self, EntryHandle<P>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (phase_tx, phase_rx) = watch::channel(Phase::Disconnected);

        let entry = Self {
            cfg,
            engine,
            consumer,
            command_rx,
            phase_tx,
            phase: Phase::Disconnected,
        };
        let handle = EntryHandle {
            command_tx,
            phase_rx,
        };
        (entry, handle)
    }

    async fn run_client(mut self) {
        loop {
            self.set_phase(Phase::Connecting).await;

            let stream = match connect(&self.cfg.endpoint, DEFAULT_CONNECT_TIMEOUT).await {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(
                        host = %self.cfg.endpoint.host,
                        port = self.cfg.endpoint.port,
                        error = %err,
                        "connect attempt failed"
                    );
                    self.set_phase(Phase::ReconnectPending).await;
                    if !self.wait_for_reconnect().await {
                        break;
                    }
                    continue;
                }
            };

            let connection = Connection::new(
                stream,
                next_connection_id(),
                self.cfg.connection_cfg(),
            );

            match self.run_session(connection).await {
                SessionEnd::Shutdown => break,
                SessionEnd::Disconnected(reason) => {
                    self.consumer.on_disconnect(reason).await;
                    self.set_phase(Phase::ReconnectPending).await;
                    if !self.wait_for_reconnect().await {
                        break;
                    }
                }
            }
        }

        self.set_phase(Phase::Disconnected).await;
    }

    async fn run_accepted<IO>(mut self, io: IO, peer: String)
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let connection = Connection::with_parts(
            io,
            next_connection_id(),
            self.cfg.connection_cfg(),
            peer,
            NoopStats,
            TimerWatchdog::new(),
        );

        if let SessionEnd::Disconnected(reason) = self.run_session(connection).await {
            self.consumer.on_disconnect(reason).await;
        }
        self.set_phase(Phase::Disconnected).await;
    }

    /// Sleep out the reconnect pause, servicing commands meanwhile.
    ///
    /// Returns false when the entry must terminate instead of
    /// reconnecting.
    async fn wait_for_reconnect(&mut self) -> bool {
        let deadline = Instant::now() + self.cfg.reconnect_timeout();

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return true,
                command = self.command_rx.recv() => match command {
                    Some(Command::Send(_)) => {
                        // Raced a disconnect; the handle re-checks the
                        // phase on every send, so just drop it here.
                        warn!("dropping outgoing message: entry is not connected");
                    }
                    Some(Command::Shutdown) | None => return false,
                },
            }
        }
    }

    async fn run_session<IO>(&mut self, mut connection: Connection<IO>) -> SessionEnd
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send,
    {
        info!(
            peer = connection.peer(),
            cid = connection.id(),
            "connection established, awaiting first heartbeat"
        );
        self.set_phase(Phase::AwaitingFirstHeartbeat).await;

        // Probe the peer right away; steady-state probing is scheduled
        // below, independent of application traffic.
        if let Err(err) = connection.write_frame(heartbeat_request_image()).await {
            error!(
                peer = connection.peer(),
                cid = connection.id(),
                error = %err,
                "failed to send opening heartbeat request"
            );
            connection.shutdown().await;
            return SessionEnd::Disconnected(DisconnectReason::IoError);
        }

        let initiate_after = self.cfg.initiate_heartbeat_timeout();
        let await_reply = self.cfg.await_heartbeat_reply_timeout();

        let mut next_heartbeat_at = Instant::now() + initiate_after;
        let mut reply_deadline: Option<Instant> = Some(Instant::now() + await_reply);

        loop {
            // Copied out so the disabled branch below holds no borrow.
            let armed_deadline = reply_deadline.unwrap_or_else(Instant::now);

            tokio::select! {
                frame = connection.read_frame() => match frame {
                    Ok(frame) => {
                        if let Err(reason) = self
                            .handle_frame(&mut connection, frame, &mut reply_deadline)
                            .await
                        {
                            connection.shutdown().await;
                            return SessionEnd::Disconnected(reason);
                        }
                    }
                    Err(err) => {
                        let reason = disconnect_reason_for_read(&err);
                        match err {
                            NetworkError::PeerClosed => info!(
                                peer = connection.peer(),
                                cid = connection.id(),
                                "peer closed the connection"
                            ),
                            err => error!(
                                peer = connection.peer(),
                                cid = connection.id(),
                                error = %err,
                                "failed read operation"
                            ),
                        }
                        connection.shutdown().await;
                        return SessionEnd::Disconnected(reason);
                    }
                },

                _ = tokio::time::sleep_until(next_heartbeat_at) => {
                    trace!(
                        peer = connection.peer(),
                        cid = connection.id(),
                        "initiating heartbeat request"
                    );
                    if let Err(err) = connection.write_frame(heartbeat_request_image()).await {
                        error!(
                            peer = connection.peer(),
                            cid = connection.id(),
                            error = %err,
                            "failed to send heartbeat request"
                        );
                        connection.shutdown().await;
                        return SessionEnd::Disconnected(DisconnectReason::IoError);
                    }
                    reply_deadline.get_or_insert_with(|| Instant::now() + await_reply);
                    next_heartbeat_at += initiate_after;
                },

                _ = tokio::time::sleep_until(armed_deadline), if reply_deadline.is_some() => {
                    error!(
                        peer = connection.peer(),
                        cid = connection.id(),
                        timeout_msec = self.cfg.await_heartbeat_reply_timeout_msec,
                        "no reply to heartbeat"
                    );
                    connection.shutdown().await;
                    return SessionEnd::Disconnected(DisconnectReason::HeartbeatReplyTimeout);
                },

                command = self.command_rx.recv() => match command {
                    Some(Command::Send(message)) => {
                        let image = match make_package_image(&message) {
                            Ok(image) => image,
                            Err(err) => {
                                error!(
                                    peer = connection.peer(),
                                    cid = connection.id(),
                                    error = %err,
                                    "failed to encode outgoing message, dropping it"
                                );
                                continue;
                            }
                        };
                        if let Err(err) = connection.write_frame(image).await {
                            error!(
                                peer = connection.peer(),
                                cid = connection.id(),
                                error = %err,
                                "failed write operation"
                            );
                            connection.shutdown().await;
                            return SessionEnd::Disconnected(DisconnectReason::IoError);
                        }
                    }
                    Some(Command::Shutdown) | None => {
                        info!(
                            peer = connection.peer(),
                            cid = connection.id(),
                            "terminating entry"
                        );
                        connection.shutdown().await;
                        return SessionEnd::Shutdown;
                    }
                },
            }
        }
    }

    /// Route one incoming frame. An error return tears the session down.
    async fn handle_frame<IO>(
        &mut self,
        connection: &mut Connection<IO>,
        frame: Frame,
        reply_deadline: &mut Option<Instant>,
    ) -> Result<(), DisconnectReason>
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let header = frame.header;

        match header.content_type() {
            Ok(PkgContentType::HeartbeatRequest) => {
                check_heartbeat_body(connection, &frame, "heartbeat request")?;

                trace!(
                    peer = connection.peer(),
                    cid = connection.id(),
                    "heartbeat request package came, sending reply"
                );
                if let Err(err) = connection.write_frame(heartbeat_reply_image()).await {
                    error!(
                        peer = connection.peer(),
                        cid = connection.id(),
                        error = %err,
                        "failed to send heartbeat reply"
                    );
                    return Err(DisconnectReason::IoError);
                }

                // A request from a peer that treats this side as the
                // initiator also proves the opening exchange.
                if self.phase == Phase::AwaitingFirstHeartbeat {
                    *reply_deadline = None;
                    self.set_phase(Phase::Steady).await;
                }
                Ok(())
            }

            Ok(PkgContentType::HeartbeatReply) => {
                check_heartbeat_body(connection, &frame, "heartbeat reply")?;

                trace!(
                    peer = connection.peer(),
                    cid = connection.id(),
                    "heartbeat reply package came"
                );
                *reply_deadline = None;
                if self.phase == Phase::AwaitingFirstHeartbeat {
                    self.set_phase(Phase::Steady).await;
                }
                Ok(())
            }

            Ok(PkgContentType::Message) => {
                let tag = header.content_specific_value;
                match self.engine.parse::<P>(tag, &frame.body) {
                    Ok(envelope) => {
                        self.consumer.on_message(envelope).await;
                        Ok(())
                    }
                    Err(CodecError::UnknownMessageTag { tag }) => {
                        error!(
                            peer = connection.peer(),
                            cid = connection.id(),
                            tag,
                            "unrecognized message type"
                        );
                        Err(DisconnectReason::UnknownMessageTag)
                    }
                    Err(err) => {
                        error!(
                            peer = connection.peer(),
                            cid = connection.id(),
                            tag,
                            error = %err,
                            "failed to parse message package"
                        );
                        Err(DisconnectReason::ParseFailure)
                    }
                }
            }

            Err(_) => {
                error!(
                    peer = connection.peer(),
                    cid = connection.id(),
                    content_type = header.content_type,
                    "unknown package content type"
                );
                Err(DisconnectReason::UnknownContentType)
            }
        }
    }

    async fn set_phase(&mut self, phase: Phase) {
        if self.phase == phase {
            return;
        }
        debug!(from = ?self.phase, to = ?phase, "entry phase change");
        self.phase = phase;
        let _ = self.phase_tx.send(phase);
        self.consumer.on_phase_change(phase).await;
    }
}

fn check_heartbeat_body<IO, S, W>(
    connection: &Connection<IO, S, W>,
    frame: &Frame,
    pkg_type_name: &str,
) -> Result<(), DisconnectReason>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send,
    S: network::StatsDriver,
    W: network::OperationWatchdog,
{
    let header = frame.header;
    if header.content_size != 0 || header.attached_binary_size != 0 {
        error!(
            peer = connection.peer(),
            cid = connection.id(),
            pkg_type = pkg_type_name,
            content_size = header.content_size,
            attached_binary_size = header.attached_binary_size,
            "heartbeat package with nonzero content"
        );
        return Err(DisconnectReason::InvalidHeartbeatPackage);
    }
    Ok(())
}

fn disconnect_reason_for_read(err: &NetworkError) -> DisconnectReason {
    match err {
        NetworkError::Framing(_) => DisconnectReason::InvalidPackage,
        NetworkError::PeerClosed => DisconnectReason::PeerClosed,
        _ => DisconnectReason::IoError,
    }
}
