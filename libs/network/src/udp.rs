//! UDP multicast receiver.
//!
//! A simple sibling of the TCP path: joins a multicast group and
//! delivers raw datagrams to a handler. No framing, no heartbeat, no
//! reconnect.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{error, info, trace, warn};

use crate::error::{NetworkError, Result};
use crate::resolve::try_make_addr;

/// Largest datagram the receiver hands to the handler.
const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// UDP multicast receiver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UdpReceiverCfg {
    /// Multicast group to join.
    pub multicast_address: Ipv4Addr,
    pub port: u16,
    /// Local interface (name or address) to join the group on; unset
    /// means any interface.
    pub interface: Option<String>,
    pub receive_buffer_size: Option<u32>,
}

impl Default for UdpReceiverCfg {
    fn default() -> Self {
        Self {
            multicast_address: Ipv4Addr::UNSPECIFIED,
            port: 0,
            interface: None,
            receive_buffer_size: None,
        }
    }
}

/// Receives datagrams from a multicast group and delegates them, as raw
/// bytes plus sender address, to a handler.
pub struct UdpReceiver {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    listener: Option<JoinHandle<()>>,
}

impl UdpReceiver {
    /// Bind the receiving socket and join the configured group.
    pub async fn bind(cfg: &UdpReceiverCfg) -> Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, cfg.port))
            .await
            .map_err(|err| NetworkError::io("bind", err))?;

        if let Some(size) = cfg.receive_buffer_size {
            let sock = socket2::SockRef::from(&socket);
            if let Err(err) = sock.set_recv_buffer_size(size as usize) {
                warn!(error = %err, "failed to set SO_RCVBUF");
            }
        }

        let local_iface = match &cfg.interface {
            Some(iface) => match try_make_addr(iface)? {
                IpAddr::V4(addr) => addr,
                IpAddr::V6(addr) => {
                    return Err(NetworkError::configuration(format!(
                        "interface '{iface}' resolved to IPv6 address {addr}, \
                         expected IPv4 for multicast join"
                    )))
                }
            },
            None => Ipv4Addr::UNSPECIFIED,
        };

        if !cfg.multicast_address.is_unspecified() {
            socket
                .join_multicast_v4(cfg.multicast_address, local_iface)
                .map_err(|err| NetworkError::io("join_multicast", err))?;
        }

        let local_addr = socket
            .local_addr()
            .map_err(|err| NetworkError::io("local_addr", err))?;

        info!(
            multicast = %cfg.multicast_address,
            %local_addr,
            "udp receiver bound"
        );

        Ok(Self {
            socket: Arc::new(socket),
            local_addr,
            listener: None,
        })
    }

    /// The bound address; useful when the configuration asked for port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start the receive loop, delivering each datagram to `handler`.
    ///
    /// A duplicate start is ignored.
    pub fn start_listening<H>(&mut self, mut handler: H)
    where
        H: FnMut(Bytes, SocketAddr) + Send + 'static,
    {
        if self.listener.is_some() {
            warn!("duplicate start listening for udp: ignored");
            return;
        }

        info!("start listening for udp");
        let socket = self.socket.clone();

        self.listener = Some(tokio::spawn(async move {
            let mut storage = vec![0u8; MAX_DATAGRAM_SIZE];
            loop {
                match socket.recv_from(&mut storage).await {
                    Ok((length, sender)) => {
                        trace!(bytes = length, sender = %sender, "received datagram");
                        handler(Bytes::copy_from_slice(&storage[..length]), sender);
                    }
                    Err(err) => {
                        error!(error = %err, "failed receive operation, stop listening");
                        break;
                    }
                }
            }
        }));
    }

    /// Cancel the receive loop.
    ///
    /// An unexpected stop (no loop running) is ignored.
    pub fn stop_listening(&mut self) {
        match self.listener.take() {
            Some(listener) => {
                info!("cancel receive operations");
                listener.abort();
            }
            None => warn!("unexpected stop listening for udp: ignored"),
        }
    }
}

impl Drop for UdpReceiver {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}
