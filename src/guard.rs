//! In-flight command deduplication.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::transport::MessageHandle;

/// Registry of in-flight command executions.
///
/// Maps each executing command identity to the acknowledgment handle of
/// the delivery that started it. Under at-least-once delivery the same
/// command may arrive again while a prior delivery is still executing;
/// `try_begin` refuses the duplicate so exactly one execution runs at a
/// time per identity.
///
/// An entry whose execution never signals completion stays forever and
/// blocks redelivery of that identity. That is a contract violation of
/// the executor, not something this registry recovers from.
#[derive(Default)]
pub struct DispatchGuard {
    entries: Mutex<HashMap<Uuid, MessageHandle>>,
}

impl DispatchGuard {
    /// Create an empty guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `command_id` for execution.
    ///
    /// Inserts `command_id → handle` if absent and returns `true`; the
    /// caller must proceed to execute. Returns `false` when an execution
    /// of this identity is already in flight — the delivery is a
    /// duplicate to discard silently, not an error.
    pub async fn try_begin(&self, command_id: Uuid, handle: MessageHandle) -> bool {
        match self.entries.lock().await.entry(command_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(handle);
                true
            }
        }
    }

    /// Release `command_id` and recover its acknowledgment handle.
    ///
    /// Returns `None` when no entry is pending, which means completion
    /// was signaled without a matching begin; callers log that as a
    /// logic error.
    pub async fn try_complete(&self, command_id: Uuid) -> Option<MessageHandle> {
        self.entries.lock().await.remove(&command_id)
    }

    /// Number of executions currently in flight.
    pub async fn pending_count(&self) -> usize {
        self.entries.lock().await.len()
    }
}
