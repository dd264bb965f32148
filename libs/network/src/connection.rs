//! Async connection core.
//!
//! A [`Connection`] owns exactly one socket for its lifetime and
//! exposes read-a-frame / write-a-frame operations on top of it.
//! Partial reads are buffered across suspensions; small writes take a
//! synchronous fast path that never suspends the caller; large writes
//! go through the asynchronous path bounded by the write watchdog.
//!
//! The connection surfaces every failure to its owner and never
//! reconnects itself - that policy lives one layer up.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use bytes::Bytes;
use codec::{Frame, FrameInput};
use tokio::io::{AsyncRead, AsyncWrite, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, error, trace};

use crate::config::ConnectionCfg;
use crate::error::{NetworkError, Result};
use crate::stats::{NoopStats, StatsDriver};
use crate::watchdog::{NoopWatchdog, OperationWatchdog, TimerWatchdog};

/// Process-unique identifier of a connection object.
pub type ConnectionId = u64;

// Intentional process-wide state: connection ids must be unique across
// every entry and acceptor in the process.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Allocate the next process-unique connection id.
pub fn next_connection_id() -> ConnectionId {
    CONNECTION_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Writes strictly below this size are attempted inline, without a
/// scheduler round-trip; heartbeats and small control frames stay on
/// the fast path.
pub const SYNC_WRITE_THRESHOLD: usize = 64 * 1024;

/// One socket, framed.
///
/// Generic over the IO stream (tests run over in-memory duplex pipes),
/// the stats driver and the write watchdog; the no-op variants of the
/// latter two compile down to nothing.
pub struct Connection<IO = TcpStream, S = NoopStats, W = TimerWatchdog> {
    io: IO,
    id: ConnectionId,
    peer: String,
    cfg: ConnectionCfg,
    input: FrameInput,
    stats: S,
    watchdog: W,
}

impl Connection<TcpStream, NoopStats, TimerWatchdog> {
    /// Wrap a connected socket with the default drivers.
    pub fn new(stream: TcpStream, id: ConnectionId, cfg: ConnectionCfg) -> Self {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "<unknown>".to_string());
        Self::with_parts(stream, id, cfg, peer, NoopStats, TimerWatchdog::new())
    }
}

impl<IO, S, W> Connection<IO, S, W>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send,
    S: StatsDriver,
    W: OperationWatchdog,
{
    /// Fully parameterized constructor.
    pub fn with_parts(
        io: IO,
        id: ConnectionId,
        cfg: ConnectionCfg,
        peer: String,
        stats: S,
        watchdog: W,
    ) -> Self {
        debug!(peer = %peer, cid = id, "create new connection instance");
        let input = FrameInput::with_capacity(cfg.max_valid_package_size, cfg.input_buffer_size);
        Self {
            io,
            id,
            peer,
            cfg,
            input,
            stats,
            watchdog,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// A remote endpoint string (like `ip:port`).
    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn cfg(&self) -> &ConnectionCfg {
        &self.cfg
    }

    pub fn stats(&self) -> &S {
        &self.stats
    }

    /// Read the next complete frame.
    ///
    /// Suspends until header and body are fully received; partial data
    /// stays buffered across suspensions and cancellations. A frame
    /// that would exceed `max_valid_package_size` (or a malformed
    /// header) is a [`NetworkError::Framing`] violation; the owner must
    /// tear the connection down.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.input.next_frame()? {
                trace!(
                    peer = %self.peer,
                    cid = self.id,
                    content_type = frame.header.content_type,
                    content_size = frame.header.content_size,
                    "frame received"
                );
                return Ok(frame);
            }

            self.input.buffer_mut().reserve(self.cfg.input_buffer_size);
            let read = self
                .io
                .read_buf(self.input.buffer_mut())
                .await
                .map_err(|err| NetworkError::io("read", err))?;

            if read == 0 {
                return Err(NetworkError::PeerClosed);
            }
            self.stats.bytes_received(read);
        }
    }

    /// Write one frame image to the socket.
    ///
    /// Writes below [`SYNC_WRITE_THRESHOLD`] are attempted inline and,
    /// when the socket takes them in full, complete without suspending
    /// the caller. Anything else goes through the asynchronous path,
    /// watched with a timeout proportional to the remaining size.
    /// Writes are serialized: this method holds `&mut self` for the
    /// whole transfer, so a second write queues behind the first.
    pub async fn write_frame(&mut self, bytes: Bytes) -> Result<()> {
        let mut written = 0;

        if bytes.len() < SYNC_WRITE_THRESHOLD {
            self.stats.sync_write_started(bytes.len());

            while written < bytes.len() {
                match poll_write_now(&mut self.io, &bytes[written..]) {
                    Some(Ok(0)) => {
                        return Err(NetworkError::io(
                            "write",
                            std::io::Error::from(std::io::ErrorKind::WriteZero),
                        ))
                    }
                    Some(Ok(count)) => written += count,
                    Some(Err(err)) => return Err(NetworkError::io("write", err)),
                    None => break,
                }
            }

            if written == bytes.len() {
                trace!(peer = %self.peer, cid = self.id, bytes = written, "sync write complete");
                self.stats.sync_write_finished(written);
                return Ok(());
            }

            // The socket would block; hand the tail to the async path.
            self.stats.hit_would_block(bytes.len() - written);
        }

        self.write_async(bytes, written).await
    }

    async fn write_async(&mut self, bytes: Bytes, already_written: usize) -> Result<()> {
        let remaining = bytes.len() - already_written;
        let timeout = self.cfg.write_timeout_for(remaining);

        self.stats.async_write_started(remaining);
        trace!(
            peer = %self.peer,
            cid = self.id,
            bytes = remaining,
            timeout_ms = timeout.as_millis() as u64,
            "starting async write operation"
        );

        let (fired_tx, fired_rx) = tokio::sync::oneshot::channel();
        let epochs = self.watchdog.epoch_handle();
        self.watchdog.start(
            timeout,
            Box::new(move |armed| {
                // A newer operation may already own the watchdog; only a
                // firing for the live epoch is allowed to act.
                if epochs.current() == armed {
                    let _ = fired_tx.send(armed);
                }
            }),
        );

        let expired = async move {
            match fired_rx.await {
                Ok(key) => key,
                // Sender dropped: watchdog canceled, inert, or suppressed.
                Err(_) => std::future::pending().await,
            }
        };

        let result = tokio::select! {
            write = self.io.write_all(&bytes[already_written..]) => {
                self.watchdog.cancel();
                write.map_err(|err| NetworkError::io("write", err))
            }
            _ = expired => {
                error!(
                    peer = %self.peer,
                    cid = self.id,
                    timeout_ms = timeout.as_millis() as u64,
                    "write operation timed out"
                );
                Err(NetworkError::timeout("write", timeout.as_millis() as u64))
            }
        };

        if result.is_ok() {
            self.stats.async_write_finished(remaining);
            self.io
                .flush()
                .await
                .map_err(|err| NetworkError::io("flush", err))?;
        }
        result
    }

    /// Gracefully shut the socket down.
    ///
    /// Dropping the connection tears everything down as well - pending
    /// read, pending write and watchdog in one step.
    pub async fn shutdown(&mut self) {
        self.watchdog.cancel();
        if let Err(err) = self.io.shutdown().await {
            debug!(peer = %self.peer, cid = self.id, error = %err, "error shutting down socket");
        }
        debug!(peer = %self.peer, cid = self.id, "connection shut down");
    }
}

/// Attempt a single non-suspending write.
///
/// Returns `None` when the socket is not ready to take any bytes.
fn poll_write_now<IO: AsyncWrite + Unpin>(
    io: &mut IO,
    buf: &[u8],
) -> Option<std::io::Result<usize>> {
    let waker = futures::task::noop_waker();
    let mut cx = Context::from_waker(&waker);

    match Pin::new(io).poll_write(&mut cx, buf) {
        Poll::Ready(result) => Some(result),
        Poll::Pending => None,
    }
}
