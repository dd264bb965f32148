//! Shared fixtures for the end-to-end tests: the ping-pong test
//! protocol and a recording message consumer.

use async_trait::async_trait;
use codec::Envelope;
use proto_entry::{DisconnectReason, MessageConsumer, Phase};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    pub seq: u64,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pong {
    pub seq: u64,
}

codec::message_set! {
    #[derive(Debug, Clone, PartialEq)]
    pub enum PingPong {
        1 => Ping(Ping),
        2 => Pong(Pong),
    }
}

/// Everything a recording consumer observes, in order.
#[derive(Debug, PartialEq)]
pub enum Observed {
    Message(PingPong),
    Phase(Phase),
    Disconnect(DisconnectReason),
}

pub struct Recorder {
    events: mpsc::UnboundedSender<Observed>,
}

impl Recorder {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Observed>) {
        let (events, observed) = mpsc::unbounded_channel();
        (Self { events }, observed)
    }
}

#[async_trait]
impl MessageConsumer<PingPong> for Recorder {
    async fn on_message(&mut self, envelope: Envelope<PingPong>) {
        let _ = self.events.send(Observed::Message(envelope.into_message()));
    }

    async fn on_phase_change(&mut self, phase: Phase) {
        let _ = self.events.send(Observed::Phase(phase));
    }

    async fn on_disconnect(&mut self, reason: DisconnectReason) {
        let _ = self.events.send(Observed::Disconnect(reason));
    }
}

/// Install the test tracing subscriber; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Wait until a phase watch reports the wanted phase.
pub async fn wait_for_phase(
    phases: &mut tokio::sync::watch::Receiver<Phase>,
    wanted: Phase,
) {
    while *phases.borrow() != wanted {
        phases
            .changed()
            .await
            .expect("entry task ended before reaching the wanted phase");
    }
}
