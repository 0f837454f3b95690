//! Wire envelope for inbound commands.
//!
//! The transport delivers an opaque body; this module frames it as a
//! command identity, a type code, and a payload. Resolving the type code
//! to a concrete command type is the executor's type-registry concern.

use bytes::Bytes;
use prost::Message;
use uuid::Uuid;

/// Errors produced while decoding an inbound message body.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Failed to decode command record: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Command id is not a valid UUID: {0}")]
    BadCommandId(#[from] uuid::Error),
}

/// Command envelope as carried on the wire.
#[derive(Clone, PartialEq, Message)]
pub struct CommandRecord {
    /// Command identity (UUID bytes); the deduplication key.
    #[prost(bytes = "vec", tag = "1")]
    pub command_id: Vec<u8>,
    /// Type code resolved by the executor's type registry.
    #[prost(string, tag = "2")]
    pub type_code: String,
    /// Serialized command payload.
    #[prost(bytes = "vec", tag = "3")]
    pub payload: Vec<u8>,
}

/// A decoded command: unique identity plus an opaque payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    /// Unique command identity; the deduplication key.
    pub id: Uuid,
    /// Type code for handler resolution.
    pub type_code: String,
    /// Serialized payload, deserialized behind the executor seam.
    pub payload: Bytes,
}

impl Command {
    /// Encode to the wire representation.
    pub fn encode(&self) -> Bytes {
        let record = CommandRecord {
            command_id: self.id.as_bytes().to_vec(),
            type_code: self.type_code.clone(),
            payload: self.payload.to_vec(),
        };
        record.encode_to_vec().into()
    }
}

/// Decode a transport message body into a `Command`.
pub fn decode_command(body: &[u8]) -> Result<Command, CodecError> {
    let record = CommandRecord::decode(body)?;
    let id = Uuid::from_slice(&record.command_id)?;
    Ok(Command {
        id,
        type_code: record.type_code,
        payload: record.payload.into(),
    })
}
