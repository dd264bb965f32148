//! # Conduit Protocol Entry
//!
//! The top-level orchestrator of one peer relationship: owns a
//! connection, drives connect/reconnect, runs the heartbeat protocol,
//! frames outgoing messages and feeds incoming frames through the
//! parsing engine to a user-supplied message consumer.
//!
//! An entry runs as a spawned task; the caller keeps an
//! [`EntryHandle`] for sending messages and observing the connection
//! phase. Client entries ([`spawn_client`]) reconnect forever; accepted
//! entries ([`spawn_accepted`]) serve one socket produced by an
//! [`network::Acceptor`] and end with it.

pub mod cfg;
pub mod consumer;
pub mod entry;
pub mod error;

pub use cfg::EntryCfg;
pub use consumer::MessageConsumer;
pub use entry::{spawn_accepted, spawn_client, EntryHandle, Phase};
pub use error::{ConfigError, DisconnectReason, SendError};
