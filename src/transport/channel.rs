//! In-process channel transport.
//!
//! Delivers messages over tokio mpsc channels within a single process,
//! assigning monotonically increasing delivery tags. Acknowledgments are
//! forwarded onto their own channel so embedding code (and tests) can
//! observe them. Ideal for local development and testing without a
//! broker.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::debug;

use super::{Acknowledger, InboundMessage, MessageHandle, Result, TransportError};
use crate::config::TransportConfig;

/// In-process message transport.
///
/// The receiver returned by the constructor is handed to
/// `Orchestrator::run`; dropping all `ChannelTransport` clones of the
/// sender stops the consumer.
pub struct ChannelTransport {
    sender: mpsc::Sender<InboundMessage>,
    next_tag: AtomicU64,
}

impl ChannelTransport {
    /// Create a transport with the given inbound channel capacity.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<InboundMessage>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (
            Self {
                sender,
                next_tag: AtomicU64::new(1),
            },
            receiver,
        )
    }

    /// Create a transport sized from configuration.
    pub fn from_config(config: &TransportConfig) -> (Self, mpsc::Receiver<InboundMessage>) {
        Self::new(config.channel_capacity)
    }

    /// Deliver a message body, assigning it a fresh delivery tag.
    ///
    /// Redelivery of a command is expressed by delivering the same body
    /// again; each delivery gets its own handle.
    pub async fn deliver(&self, body: Bytes) -> Result<MessageHandle> {
        let handle = MessageHandle::new(self.next_tag.fetch_add(1, Ordering::Relaxed));
        let message = InboundMessage {
            handle: handle.clone(),
            body,
        };
        self.sender
            .send(message)
            .await
            .map_err(|e| TransportError::Deliver(e.to_string()))?;
        debug!(
            delivery_tag = handle.delivery_tag(),
            "Delivered message to channel"
        );
        Ok(handle)
    }
}

/// Acknowledger that forwards acknowledged handles onto a channel.
pub struct ChannelAcknowledger {
    acks: mpsc::Sender<MessageHandle>,
}

impl ChannelAcknowledger {
    /// Create an acknowledger; the receiver sees every acknowledged handle.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<MessageHandle>) {
        let (acks, receiver) = mpsc::channel(capacity);
        (Self { acks }, receiver)
    }

    /// Create an acknowledger sized from configuration.
    pub fn from_config(config: &TransportConfig) -> (Self, mpsc::Receiver<MessageHandle>) {
        Self::new(config.ack_capacity)
    }
}

#[async_trait]
impl Acknowledger for ChannelAcknowledger {
    async fn acknowledge(&self, handle: MessageHandle) -> Result<()> {
        debug!(
            delivery_tag = handle.delivery_tag(),
            "Acknowledging delivery"
        );
        self.acks
            .send(handle)
            .await
            .map_err(|e| TransportError::Acknowledge(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delivery_tags_are_unique_and_increasing() {
        let (transport, mut inbound) = ChannelTransport::new(8);

        let first = transport.deliver(Bytes::from_static(b"a")).await.unwrap();
        let second = transport.deliver(Bytes::from_static(b"b")).await.unwrap();
        assert!(second.delivery_tag() > first.delivery_tag());

        let received = inbound.recv().await.unwrap();
        assert_eq!(received.handle, first);
        assert_eq!(received.body, Bytes::from_static(b"a"));
    }

    #[tokio::test]
    async fn test_acknowledgments_are_observable() {
        let (acknowledger, mut acks) = ChannelAcknowledger::new(8);

        let handle = MessageHandle::new(42);
        acknowledger.acknowledge(handle.clone()).await.unwrap();

        assert_eq!(acks.recv().await.unwrap(), handle);
    }

    #[tokio::test]
    async fn test_acknowledge_fails_when_receiver_dropped() {
        let (acknowledger, acks) = ChannelAcknowledger::new(8);
        drop(acks);

        let result = acknowledger.acknowledge(MessageHandle::new(1)).await;
        assert!(matches!(result, Err(TransportError::Acknowledge(_))));
    }
}
