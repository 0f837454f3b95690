//! Message transport seam.
//!
//! The broker side (topic subscription, partition assignment, redelivery
//! policy) is external. This crate consumes delivered messages and
//! acknowledges them through the `Acknowledger` capability.

pub mod channel;

pub use channel::{ChannelAcknowledger, ChannelTransport};

use async_trait::async_trait;
use bytes::Bytes;

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Delivery failed: {0}")]
    Deliver(String),

    #[error("Acknowledge failed: {0}")]
    Acknowledge(String),
}

/// Opaque per-delivery correlation token.
///
/// Carries no semantics beyond "acknowledge this one delivery". Each
/// delivery gets its own handle, including redeliveries of the same
/// command.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageHandle {
    delivery_tag: u64,
}

impl MessageHandle {
    /// Wrap a transport-assigned delivery tag.
    pub fn new(delivery_tag: u64) -> Self {
        Self { delivery_tag }
    }

    /// The transport-assigned delivery tag.
    pub fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }
}

/// A message as delivered by the transport.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    /// Correlation handle for acknowledgment.
    pub handle: MessageHandle,
    /// Serialized command envelope.
    pub body: Bytes,
}

/// Transport acknowledge capability.
///
/// Invoked by the orchestrator's completion path exactly once per
/// accepted delivery, after the dispatch entry is removed.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Acknowledge one delivered message.
    async fn acknowledge(&self, handle: MessageHandle) -> Result<()>;
}
