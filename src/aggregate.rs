//! Aggregate root seam.
//!
//! Aggregates are consistency-boundary domain entities. Until committed,
//! their state changes exist only as pending sourcing events; the root id
//! carried by the first pending event identifies the aggregate.

use std::any::Any;

use prost_types::Any as ProtoAny;
use uuid::Uuid;

/// A fact describing a state change to an aggregate.
///
/// Carries the root id it applies to and an opaque serialized body.
/// Persisting event history belongs to the storage layer, not this crate.
#[derive(Clone, Debug, PartialEq)]
pub struct SourcingEvent {
    /// Aggregate root this event applies to.
    pub root: Uuid,
    /// Position within the aggregate's event stream.
    pub sequence: u32,
    /// Serialized event body.
    pub payload: ProtoAny,
}

impl SourcingEvent {
    /// Create an event for `root` at `sequence` with an empty body.
    pub fn new(root: Uuid, sequence: u32) -> Self {
        Self {
            root,
            sequence,
            payload: ProtoAny::default(),
        }
    }
}

/// A domain aggregate root.
///
/// Implementations expose their uncommitted sourcing events; the
/// execution context derives the tracking identity from the first of
/// them and collects them after a successful handler run.
pub trait AggregateRoot: Send + Sync + 'static {
    /// Uncommitted events produced since the aggregate was loaded or created.
    fn pending_events(&self) -> &[SourcingEvent];

    /// Upcast for typed lookup.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for typed lookup.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Derive the tracking id of an aggregate from its first pending event.
///
/// `None` means the aggregate cannot be keyed and is unsupported for
/// tracking.
pub(crate) fn root_id(aggregate: &dyn AggregateRoot) -> Option<Uuid> {
    aggregate.pending_events().first().map(|event| event.root)
}
