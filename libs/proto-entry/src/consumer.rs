//! The consumer side of an entry.

use async_trait::async_trait;
use codec::{Envelope, MessageSet};

use crate::entry::Phase;
use crate::error::DisconnectReason;

/// User-supplied sink for everything an entry produces.
///
/// Messages arrive in receive order for the connection they came from.
/// The phase and disconnect hooks default to no-ops so a consumer that
/// only cares about messages implements one method.
#[async_trait]
pub trait MessageConsumer<P: MessageSet>: Send + 'static {
    /// A message frame was parsed and is handed over.
    async fn on_message(&mut self, envelope: Envelope<P>);

    /// The entry moved to a new phase.
    async fn on_phase_change(&mut self, _phase: Phase) {}

    /// The live connection was lost or torn down.
    async fn on_disconnect(&mut self, _reason: DisconnectReason) {}
}
