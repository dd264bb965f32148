//! Vocabulary of configuration types for the transport layer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// TCP socket options applied on both the connect and the accept path.
///
/// Unset fields leave the OS default untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketOptions {
    pub no_delay: Option<bool>,
    pub keep_alive: Option<bool>,
    pub linger_secs: Option<u64>,
    pub receive_buffer_size: Option<u32>,
    pub send_buffer_size: Option<u32>,
}

impl SocketOptions {
    /// Tells if no option is set at all.
    pub fn is_empty(&self) -> bool {
        self.no_delay.is_none()
            && self.keep_alive.is_none()
            && self.linger_secs.is_none()
            && self.receive_buffer_size.is_none()
            && self.send_buffer_size.is_none()
    }
}

/// Preferred IP version when a hostname resolves to several addresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    #[default]
    V4,
    V6,
}

/// A TCP endpoint: the server endpoint for an acceptor, the remote
/// endpoint for a connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointCfg {
    /// Literal IP, `localhost`/`ip6-localhost` alias, local interface
    /// name, or a DNS hostname.
    pub host: String,
    pub port: u16,
    pub ip_version: IpVersion,
    pub socket_options: SocketOptions,
}

impl Default for EndpointCfg {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 0,
            ip_version: IpVersion::default(),
            socket_options: SocketOptions::default(),
        }
    }
}

impl EndpointCfg {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }
}

/// Default read-buffer size a connection allocates up front.
pub const DEFAULT_INPUT_BUFFER_SIZE: usize = 256 * 1024;

/// Default write-timeout budget per megabyte of outgoing data.
pub const DEFAULT_WRITE_TIMEOUT_PER_1MB: Duration = Duration::from_secs(1);

/// Default upper bound on a single package's announced body size.
pub const DEFAULT_MAX_VALID_PACKAGE_SIZE: u32 = 100 * 1024 * 1024;

/// Connection tuning parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionCfg {
    /// The read operation from the socket is supplied with a buffer of
    /// this size by default.
    pub input_buffer_size: usize,
    /// Time budget granted to an asynchronous write, per started
    /// megabyte of data.
    pub write_timeout_per_1mb: Duration,
    /// Packages announcing a larger body are a protocol violation.
    pub max_valid_package_size: u32,
}

impl Default for ConnectionCfg {
    fn default() -> Self {
        Self {
            input_buffer_size: DEFAULT_INPUT_BUFFER_SIZE,
            write_timeout_per_1mb: DEFAULT_WRITE_TIMEOUT_PER_1MB,
            max_valid_package_size: DEFAULT_MAX_VALID_PACKAGE_SIZE,
        }
    }
}

impl ConnectionCfg {
    /// Timeout for writing a buffer of a given size:
    /// `write_timeout_per_1mb` per started megabyte.
    pub fn write_timeout_for(&self, buffer_size_bytes: usize) -> Duration {
        const SIZE_1MB: usize = 1024 * 1024;

        if buffer_size_bytes <= SIZE_1MB {
            self.write_timeout_per_1mb
        } else {
            let megabytes = (buffer_size_bytes + SIZE_1MB - 1) / SIZE_1MB;
            self.write_timeout_per_1mb * megabytes as u32
        }
    }
}
