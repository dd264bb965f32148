//! # Conduit Transport Layer
//!
//! Socket-facing infrastructure for the Conduit messaging stack: the
//! async connection core multiplexing frame reads/writes over one
//! socket, the connector/acceptor pair producing configured sockets,
//! the epoch-keyed operation watchdog, IO statistics hooks and the UDP
//! multicast receiver.
//!
//! Policy lives one layer up: a [`Connection`] never reconnects and
//! never interprets message bodies - it moves frames.

pub mod config;
pub mod connect;
pub mod connection;
pub mod error;
pub mod resolve;
pub mod stats;
pub mod udp;
pub mod watchdog;

pub use config::{ConnectionCfg, EndpointCfg, IpVersion, SocketOptions};
pub use connect::{connect, Acceptor, DEFAULT_CONNECT_TIMEOUT};
pub use connection::{next_connection_id, Connection, ConnectionId, SYNC_WRITE_THRESHOLD};
pub use error::{NetworkError, Result};
pub use resolve::{network_iface_to_addr, try_make_addr};
pub use stats::{NoopStats, StatsDriver};
pub use udp::{UdpReceiver, UdpReceiverCfg};
pub use watchdog::{EpochHandle, EpochKey, NoopWatchdog, OperationWatchdog, TimerWatchdog};
