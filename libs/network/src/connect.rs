//! Connector and acceptor: resolve-and-connect, bind-and-accept.
//!
//! Both paths hand out raw sockets with the configured options already
//! applied; framing and protocol policy live elsewhere.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{debug, info, warn};

use crate::config::{EndpointCfg, IpVersion, SocketOptions};
use crate::error::{NetworkError, Result};
use crate::resolve::try_make_addr;

/// Connect timeout applied when the caller has no tighter budget.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolve an endpoint to a socket address.
///
/// Literal IPs, `localhost`/`ip6-localhost` aliases and local interface
/// names are handled directly; anything else falls through to a DNS
/// lookup filtered by the endpoint's preferred IP version.
pub async fn resolve_endpoint(endpoint: &EndpointCfg) -> Result<SocketAddr> {
    if let Ok(addr) = try_make_addr(&endpoint.host) {
        return Ok(SocketAddr::new(addr, endpoint.port));
    }

    let candidates: Vec<SocketAddr> =
        tokio::net::lookup_host((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(|err| NetworkError::resolution(&endpoint.host, err.to_string()))?
            .collect();

    let preferred = |addr: &&SocketAddr| match endpoint.ip_version {
        IpVersion::V4 => matches!(addr.ip(), IpAddr::V4(_)),
        IpVersion::V6 => matches!(addr.ip(), IpAddr::V6(_)),
    };

    candidates
        .iter()
        .find(preferred)
        .or_else(|| candidates.first())
        .copied()
        .ok_or_else(|| NetworkError::resolution(&endpoint.host, "name resolved to no addresses"))
}

/// Resolve the endpoint and connect, applying socket options before the
/// socket is handed back.
pub async fn connect(endpoint: &EndpointCfg, connect_timeout: Duration) -> Result<TcpStream> {
    let addr = resolve_endpoint(endpoint).await?;
    let options = &endpoint.socket_options;

    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }
    .map_err(|err| NetworkError::io("socket", err))?;
    apply_presocket_options(&socket, options);

    let stream = tokio::time::timeout(connect_timeout, socket.connect(addr))
        .await
        .map_err(|_| NetworkError::timeout("connect", connect_timeout.as_millis() as u64))?
        .map_err(|err| NetworkError::connect_error("failed to connect", Some(addr), err))?;

    apply_stream_options(&stream, options);
    info!(peer = %addr, "connected");
    Ok(stream)
}

/// Listens on an endpoint and accepts connections until dropped.
///
/// Each accepted socket has options applied identically to the connect
/// path before being handed to the caller.
pub struct Acceptor {
    listener: TcpListener,
    options: SocketOptions,
    local_addr: SocketAddr,
}

impl Acceptor {
    pub async fn bind(endpoint: &EndpointCfg) -> Result<Self> {
        let addr = SocketAddr::new(try_make_addr(&endpoint.host)?, endpoint.port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|err| NetworkError::io("bind", err))?;
        let local_addr = listener
            .local_addr()
            .map_err(|err| NetworkError::io("local_addr", err))?;

        info!(%local_addr, "listening");
        Ok(Self {
            listener,
            options: endpoint.socket_options.clone(),
            local_addr,
        })
    }

    /// The bound address; useful when the endpoint asked for port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(|err| NetworkError::io("accept", err))?;

        apply_stream_options(&stream, &self.options);
        apply_sockref_options(&stream, &self.options);
        debug!(peer = %peer, "accepted connection");
        Ok((stream, peer))
    }
}

fn apply_presocket_options(socket: &TcpSocket, options: &SocketOptions) {
    if let Some(keep_alive) = options.keep_alive {
        if let Err(err) = socket.set_keepalive(keep_alive) {
            warn!(error = %err, "failed to set SO_KEEPALIVE");
        }
    }
    if let Some(size) = options.receive_buffer_size {
        if let Err(err) = socket.set_recv_buffer_size(size) {
            warn!(error = %err, "failed to set SO_RCVBUF");
        }
    }
    if let Some(size) = options.send_buffer_size {
        if let Err(err) = socket.set_send_buffer_size(size) {
            warn!(error = %err, "failed to set SO_SNDBUF");
        }
    }
}

fn apply_stream_options(stream: &TcpStream, options: &SocketOptions) {
    if let Some(no_delay) = options.no_delay {
        if let Err(err) = stream.set_nodelay(no_delay) {
            warn!(error = %err, "failed to set TCP_NODELAY");
        }
    }
    if let Some(secs) = options.linger_secs {
        if let Err(err) = stream.set_linger(Some(Duration::from_secs(secs))) {
            warn!(error = %err, "failed to set SO_LINGER");
        }
    }
}

/// Options the accept path cannot set through tokio's surface.
fn apply_sockref_options(stream: &TcpStream, options: &SocketOptions) {
    let sock = socket2::SockRef::from(stream);

    if let Some(keep_alive) = options.keep_alive {
        if let Err(err) = sock.set_keepalive(keep_alive) {
            warn!(error = %err, "failed to set SO_KEEPALIVE");
        }
    }
    if let Some(size) = options.receive_buffer_size {
        if let Err(err) = sock.set_recv_buffer_size(size as usize) {
            warn!(error = %err, "failed to set SO_RCVBUF");
        }
    }
    if let Some(size) = options.send_buffer_size {
        if let Err(err) = sock.set_send_buffer_size(size as usize) {
            warn!(error = %err, "failed to set SO_SNDBUF");
        }
    }
}
