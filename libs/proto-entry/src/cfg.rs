//! Entry configuration.

use network::{ConnectionCfg, EndpointCfg};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_RECONNECT_TIMEOUT_MSEC: u64 = 10_000;
pub const DEFAULT_INITIATE_HEARTBEAT_TIMEOUT_MSEC: u64 = 10_000;
pub const DEFAULT_AWAIT_HEARTBEAT_REPLY_TIMEOUT_MSEC: u64 = 20_000;
pub const DEFAULT_MAX_VALID_PACKAGE_SIZE: u32 = 100 * 1024 * 1024;
pub const DEFAULT_INPUT_BUFFER_SIZE: usize = 256 * 1024;
pub const DEFAULT_WRITE_TIMEOUT_PER_1MB_MSEC: u64 = 1_000;

/// Full configuration of a protocol entry.
///
/// Every field except `endpoint` has a documented default and is
/// independently overridable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryCfg {
    /// The server endpoint for an accepted entry, the remote endpoint
    /// for a client entry.
    pub endpoint: EndpointCfg,

    /// Pause between a lost connection and the next connect attempt
    /// (client entries only).
    #[serde(default = "default_reconnect_timeout_msec")]
    pub reconnect_timeout_msec: u64,

    /// Period of heartbeat request initiation, independent of traffic.
    #[serde(default = "default_initiate_heartbeat_timeout_msec")]
    pub initiate_heartbeat_timeout_msec: u64,

    /// How long to wait for a heartbeat reply before the peer is
    /// declared unresponsive.
    #[serde(default = "default_await_heartbeat_reply_timeout_msec")]
    pub await_heartbeat_reply_timeout_msec: u64,

    /// Packages announcing a larger body terminate the connection.
    #[serde(default = "default_max_valid_package_size")]
    pub max_valid_package_size: u32,

    /// Read operations are supplied with a buffer of this size.
    #[serde(default = "default_input_buffer_size")]
    pub input_buffer_size: usize,

    /// Write timeout budget per started megabyte of outgoing data.
    #[serde(default = "default_write_timeout_per_1mb_msec")]
    pub write_timeout_per_1mb_msec: u64,
}

fn default_reconnect_timeout_msec() -> u64 {
    DEFAULT_RECONNECT_TIMEOUT_MSEC
}
fn default_initiate_heartbeat_timeout_msec() -> u64 {
    DEFAULT_INITIATE_HEARTBEAT_TIMEOUT_MSEC
}
fn default_await_heartbeat_reply_timeout_msec() -> u64 {
    DEFAULT_AWAIT_HEARTBEAT_REPLY_TIMEOUT_MSEC
}
fn default_max_valid_package_size() -> u32 {
    DEFAULT_MAX_VALID_PACKAGE_SIZE
}
fn default_input_buffer_size() -> usize {
    DEFAULT_INPUT_BUFFER_SIZE
}
fn default_write_timeout_per_1mb_msec() -> u64 {
    DEFAULT_WRITE_TIMEOUT_PER_1MB_MSEC
}

impl EntryCfg {
    pub fn new(endpoint: EndpointCfg) -> Self {
        Self {
            endpoint,
            reconnect_timeout_msec: DEFAULT_RECONNECT_TIMEOUT_MSEC,
            initiate_heartbeat_timeout_msec: DEFAULT_INITIATE_HEARTBEAT_TIMEOUT_MSEC,
            await_heartbeat_reply_timeout_msec: DEFAULT_AWAIT_HEARTBEAT_REPLY_TIMEOUT_MSEC,
            max_valid_package_size: DEFAULT_MAX_VALID_PACKAGE_SIZE,
            input_buffer_size: DEFAULT_INPUT_BUFFER_SIZE,
            write_timeout_per_1mb_msec: DEFAULT_WRITE_TIMEOUT_PER_1MB_MSEC,
        }
    }

    /// Load the configuration from its JSON representation.
    ///
    /// Shape errors are surfaced synchronously and are not retried.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::from)
    }

    /// Parameters for the underlying connection object.
    pub fn connection_cfg(&self) -> ConnectionCfg {
        ConnectionCfg {
            input_buffer_size: self.input_buffer_size,
            write_timeout_per_1mb: Duration::from_millis(self.write_timeout_per_1mb_msec),
            max_valid_package_size: self.max_valid_package_size,
        }
    }

    pub fn reconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.reconnect_timeout_msec)
    }

    pub fn initiate_heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.initiate_heartbeat_timeout_msec)
    }

    pub fn await_heartbeat_reply_timeout(&self) -> Duration {
        Duration::from_millis(self.await_heartbeat_reply_timeout_msec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_only_json_gets_all_defaults() {
        let cfg = EntryCfg::from_json_str(
            r#"{ "endpoint": { "host": "localhost", "port": 4100 } }"#,
        )
        .expect("valid config");

        assert_eq!(cfg.endpoint.host, "localhost");
        assert_eq!(cfg.endpoint.port, 4100);
        assert_eq!(cfg.reconnect_timeout_msec, DEFAULT_RECONNECT_TIMEOUT_MSEC);
        assert_eq!(
            cfg.initiate_heartbeat_timeout_msec,
            DEFAULT_INITIATE_HEARTBEAT_TIMEOUT_MSEC
        );
        assert_eq!(
            cfg.await_heartbeat_reply_timeout_msec,
            DEFAULT_AWAIT_HEARTBEAT_REPLY_TIMEOUT_MSEC
        );
        assert_eq!(cfg.max_valid_package_size, DEFAULT_MAX_VALID_PACKAGE_SIZE);
        assert_eq!(cfg.input_buffer_size, DEFAULT_INPUT_BUFFER_SIZE);
        assert_eq!(
            cfg.write_timeout_per_1mb_msec,
            DEFAULT_WRITE_TIMEOUT_PER_1MB_MSEC
        );
    }

    #[test]
    fn fields_are_independently_overridable() {
        let cfg = EntryCfg::from_json_str(
            r#"{
                "endpoint": {
                    "host": "10.1.2.3",
                    "port": 4100,
                    "socket_options": { "no_delay": true, "linger_secs": 2 }
                },
                "initiate_heartbeat_timeout_msec": 500,
                "max_valid_package_size": 4096
            }"#,
        )
        .expect("valid config");

        assert_eq!(cfg.initiate_heartbeat_timeout_msec, 500);
        assert_eq!(cfg.max_valid_package_size, 4096);
        assert_eq!(cfg.reconnect_timeout_msec, DEFAULT_RECONNECT_TIMEOUT_MSEC);
        assert_eq!(cfg.endpoint.socket_options.no_delay, Some(true));
        assert_eq!(cfg.endpoint.socket_options.linger_secs, Some(2));
    }

    #[test]
    fn missing_endpoint_is_a_config_error() {
        assert!(EntryCfg::from_json_str(r#"{ "reconnect_timeout_msec": 5 }"#).is_err());
    }

    #[test]
    fn connection_cfg_is_derived_from_entry_cfg() {
        let mut cfg = EntryCfg::new(EndpointCfg::new("localhost", 1));
        cfg.input_buffer_size = 1024;
        cfg.write_timeout_per_1mb_msec = 250;
        cfg.max_valid_package_size = 2048;

        let conn_cfg = cfg.connection_cfg();
        assert_eq!(conn_cfg.input_buffer_size, 1024);
        assert_eq!(conn_cfg.write_timeout_per_1mb, Duration::from_millis(250));
        assert_eq!(conn_cfg.max_valid_package_size, 2048);
    }
}
