//! Per-command execution scratch space.
//!
//! An `ExecutionContext` gives a command handler controlled, tracked
//! access to the aggregates it reads or creates, and the single path to
//! signal completion back to the orchestrator.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::warn;
use uuid::Uuid;

use crate::aggregate::{self, AggregateRoot};
use crate::repository::{Repository, StorageError};
use crate::transport::MessageHandle;

/// Errors surfaced by execution-context operations.
///
/// All variants are raised synchronously by the call that detected them
/// and are handled by the executor/handler layer; the context never
/// swallows them.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// A required identifier was absent (nil UUID).
    #[error("Required identifier is absent")]
    InvalidArgument,

    /// A strict lookup found no such aggregate, tracked or stored.
    #[error("No aggregate found for {id}")]
    NotFound { id: Uuid },

    /// The aggregate exposes no pending sourcing event, so no root id
    /// can be derived and it cannot be tracked.
    #[error("Aggregate has no pending sourcing event; its root id cannot be derived")]
    UnsupportedAggregate,

    /// The aggregate tracked under this id has a different type.
    #[error("Aggregate {id} is tracked as a different type")]
    WrongType { id: Uuid },

    /// Storage failure, fatal to the current command execution.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Notice sent when a command execution signals completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionNotice {
    /// Identity of the completed command.
    pub command_id: Uuid,
}

/// Per-command execution scratch space.
///
/// Tracks every aggregate the execution touches and carries the one
/// completion signal tying the finished command back to its originating
/// message. A context is exclusively owned by the execution it was
/// created for and discarded afterwards; `clear` supports reuse instead
/// of discarding.
pub struct ExecutionContext {
    repository: Arc<dyn Repository>,
    tracked: HashMap<Uuid, Box<dyn AggregateRoot>>,
    handle: MessageHandle,
    completion: Option<oneshot::Sender<CompletionNotice>>,
    stall_watch: bool,
}

impl ExecutionContext {
    /// Create a context bound to one delivered message.
    ///
    /// The receiving half of `completion` belongs to the orchestrator,
    /// which releases the dispatch entry and acknowledges the message
    /// once the notice arrives.
    pub fn new(
        repository: Arc<dyn Repository>,
        handle: MessageHandle,
        completion: oneshot::Sender<CompletionNotice>,
    ) -> Self {
        Self {
            repository,
            tracked: HashMap::new(),
            handle,
            completion: Some(completion),
            stall_watch: true,
        }
    }

    /// Register a newly created aggregate for tracking.
    ///
    /// The tracking id is derived from the aggregate's first pending
    /// sourcing event. When that id is already tracked the existing
    /// entry wins and the new aggregate is dropped.
    pub fn add(&mut self, aggregate: Box<dyn AggregateRoot>) -> Result<Uuid, ContextError> {
        let id =
            aggregate::root_id(aggregate.as_ref()).ok_or(ContextError::UnsupportedAggregate)?;
        if id.is_nil() {
            return Err(ContextError::InvalidArgument);
        }
        self.tracked.entry(id).or_insert(aggregate);
        Ok(id)
    }

    /// Fetch the tracked aggregate of type `T` for `id`, loading it from
    /// the repository when not yet tracked. A successful load is tracked
    /// as a side effect.
    pub async fn get<T: AggregateRoot>(&mut self, id: Uuid) -> Result<&mut T, ContextError> {
        match self.lookup(id).await? {
            Some(aggregate) => Ok(aggregate),
            None => Err(ContextError::NotFound { id }),
        }
    }

    /// As `get`, but an aggregate present neither in the tracked map nor
    /// in the repository yields `Ok(None)` instead of failing. Storage
    /// and type errors still fail.
    pub async fn get_or_default<T: AggregateRoot>(
        &mut self,
        id: Uuid,
    ) -> Result<Option<&mut T>, ContextError> {
        self.lookup(id).await
    }

    async fn lookup<T: AggregateRoot>(
        &mut self,
        id: Uuid,
    ) -> Result<Option<&mut T>, ContextError> {
        if id.is_nil() {
            return Err(ContextError::InvalidArgument);
        }
        let slot = match self.tracked.entry(id) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => match self.repository.load(id).await? {
                Some(aggregate) => slot.insert(aggregate),
                None => return Ok(None),
            },
        };
        match slot.as_any_mut().downcast_mut::<T>() {
            Some(aggregate) => Ok(Some(aggregate)),
            None => Err(ContextError::WrongType { id }),
        }
    }

    /// Point-in-time snapshot of every aggregate touched so far, used to
    /// collect events for persistence after a successful handler run.
    pub fn tracked_roots(&self) -> Vec<&dyn AggregateRoot> {
        self.tracked.values().map(|a| a.as_ref()).collect()
    }

    /// Drop all tracked aggregates, resetting the context for reuse.
    pub fn clear(&mut self) {
        self.tracked.clear();
    }

    /// Handle of the message this execution originated from.
    pub fn message_handle(&self) -> &MessageHandle {
        &self.handle
    }

    /// Whether an upstream stuck-command watchdog should consider this
    /// execution when scanning long-pending dispatches.
    pub fn stall_watch(&self) -> bool {
        self.stall_watch
    }

    /// Opt this execution in or out of stuck-command watching. Has no
    /// effect on deduplication or aggregate tracking.
    pub fn set_stall_watch(&mut self, enabled: bool) {
        self.stall_watch = enabled;
    }

    /// Signal that the command finished, on success and failure alike.
    ///
    /// Sends the completion notice that lets the orchestrator release
    /// the dispatch entry and acknowledge the originating message. Must
    /// be invoked exactly once per execution; a repeat call is a logged
    /// no-op and cannot re-acknowledge.
    pub fn on_command_executed(&mut self, command_id: Uuid) {
        match self.completion.take() {
            Some(sender) => {
                if sender.send(CompletionNotice { command_id }).is_err() {
                    warn!(%command_id, "Completion notice dropped; orchestrator no longer listening");
                }
            }
            None => warn!(%command_id, "Completion already signaled for this execution"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use async_trait::async_trait;

    use super::*;
    use crate::aggregate::SourcingEvent;
    use crate::repository::{MemoryRepository, StorageError};

    struct Order {
        events: Vec<SourcingEvent>,
    }

    impl Order {
        fn with_root(root: Uuid) -> Self {
            Self {
                events: vec![SourcingEvent::new(root, 0)],
            }
        }

        fn without_events() -> Self {
            Self { events: vec![] }
        }
    }

    impl AggregateRoot for Order {
        fn pending_events(&self) -> &[SourcingEvent] {
            &self.events
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct Invoice {
        events: Vec<SourcingEvent>,
    }

    impl AggregateRoot for Invoice {
        fn pending_events(&self) -> &[SourcingEvent] {
            &self.events
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct BrokenRepository;

    #[async_trait]
    impl Repository for BrokenRepository {
        async fn load(
            &self,
            _id: Uuid,
        ) -> crate::repository::Result<Option<Box<dyn AggregateRoot>>> {
            Err(StorageError::Backend("connection reset".to_string()))
        }
    }

    fn context_with(repository: Arc<dyn Repository>) -> ExecutionContext {
        let (sender, _receiver) = oneshot::channel();
        ExecutionContext::new(repository, MessageHandle::new(1), sender)
    }

    #[tokio::test]
    async fn test_add_without_pending_events_is_unsupported() {
        let mut ctx = context_with(Arc::new(MemoryRepository::new()));

        let result = ctx.add(Box::new(Order::without_events()));
        assert!(matches!(result, Err(ContextError::UnsupportedAggregate)));
        assert!(ctx.tracked_roots().is_empty());
    }

    #[tokio::test]
    async fn test_add_with_nil_root_is_invalid() {
        let mut ctx = context_with(Arc::new(MemoryRepository::new()));

        let result = ctx.add(Box::new(Order::with_root(Uuid::nil())));
        assert!(matches!(result, Err(ContextError::InvalidArgument)));
    }

    #[tokio::test]
    async fn test_add_keeps_existing_entry_on_same_root() {
        let mut ctx = context_with(Arc::new(MemoryRepository::new()));
        let root = Uuid::new_v4();

        let mut first = Order::with_root(root);
        first.events.push(SourcingEvent::new(root, 1));
        ctx.add(Box::new(first)).unwrap();
        ctx.add(Box::new(Order::with_root(root))).unwrap();

        let roots = ctx.tracked_roots();
        assert_eq!(roots.len(), 1);
        // The first registration survived; the duplicate was dropped.
        assert_eq!(roots[0].pending_events().len(), 2);
    }

    #[tokio::test]
    async fn test_get_with_nil_id_is_invalid() {
        let mut ctx = context_with(Arc::new(MemoryRepository::new()));

        let result = ctx.get::<Order>(Uuid::nil()).await;
        assert!(matches!(result, Err(ContextError::InvalidArgument)));
    }

    #[tokio::test]
    async fn test_get_missing_everywhere_is_not_found() {
        let mut ctx = context_with(Arc::new(MemoryRepository::new()));
        let id = Uuid::new_v4();

        let result = ctx.get::<Order>(id).await;
        assert!(matches!(result, Err(ContextError::NotFound { id: e }) if e == id));
    }

    #[tokio::test]
    async fn test_get_or_default_missing_everywhere_is_absent() {
        let mut ctx = context_with(Arc::new(MemoryRepository::new()));

        let result = ctx.get_or_default::<Order>(Uuid::new_v4()).await.unwrap();
        assert!(result.is_none());
        assert!(ctx.tracked_roots().is_empty());
    }

    #[tokio::test]
    async fn test_load_tracks_aggregate_once() {
        let repository = MemoryRepository::new();
        let id = Uuid::new_v4();
        repository
            .insert(id, move || Box::new(Order::with_root(id)))
            .await;
        let mut ctx = context_with(Arc::new(repository));

        ctx.get::<Order>(id).await.unwrap();
        ctx.get_or_default::<Order>(id).await.unwrap().unwrap();

        assert_eq!(ctx.tracked_roots().len(), 1);
    }

    #[tokio::test]
    async fn test_get_serves_tracked_entry_without_reloading() {
        let repository = MemoryRepository::new();
        let id = Uuid::new_v4();
        repository
            .insert(id, move || Box::new(Order::with_root(id)))
            .await;
        let mut ctx = context_with(Arc::new(repository.clone()));

        ctx.get::<Order>(id).await.unwrap();
        // Gone from storage, but still tracked in this context.
        repository.remove(id).await;
        assert!(ctx.get::<Order>(id).await.is_ok());
    }

    #[tokio::test]
    async fn test_get_with_wrong_type_is_explicit_mismatch() {
        let mut ctx = context_with(Arc::new(MemoryRepository::new()));
        let root = Uuid::new_v4();
        ctx.add(Box::new(Order::with_root(root))).unwrap();

        let result = ctx.get::<Invoice>(root).await;
        assert!(matches!(result, Err(ContextError::WrongType { id }) if id == root));
    }

    #[tokio::test]
    async fn test_storage_failure_propagates() {
        let mut ctx = context_with(Arc::new(BrokenRepository));

        let result = ctx.get_or_default::<Order>(Uuid::new_v4()).await;
        assert!(matches!(result, Err(ContextError::Storage(_))));
    }

    #[tokio::test]
    async fn test_clear_empties_tracked_snapshot() {
        let mut ctx = context_with(Arc::new(MemoryRepository::new()));
        ctx.add(Box::new(Order::with_root(Uuid::new_v4()))).unwrap();
        assert_eq!(ctx.tracked_roots().len(), 1);

        ctx.clear();
        assert!(ctx.tracked_roots().is_empty());
    }

    #[tokio::test]
    async fn test_stall_watch_defaults_on_and_toggles() {
        let mut ctx = context_with(Arc::new(MemoryRepository::new()));
        assert!(ctx.stall_watch());

        ctx.set_stall_watch(false);
        assert!(!ctx.stall_watch());
        assert_eq!(ctx.message_handle(), &MessageHandle::new(1));
    }

    #[tokio::test]
    async fn test_completion_notice_reaches_receiver_once() {
        let (sender, receiver) = oneshot::channel();
        let mut ctx = ExecutionContext::new(
            Arc::new(MemoryRepository::new()),
            MessageHandle::new(3),
            sender,
        );
        let command_id = Uuid::new_v4();

        ctx.on_command_executed(command_id);
        // Second signal is a no-op; the channel is already consumed.
        ctx.on_command_executed(command_id);

        assert_eq!(receiver.await.unwrap(), CompletionNotice { command_id });
    }
}
