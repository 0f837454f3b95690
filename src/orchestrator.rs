//! Inbound message orchestration.
//!
//! Glues a raw transport message to the dispatch guard, a fresh
//! execution context, and the command executor, then acknowledges the
//! message once that command's execution signals completion.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::codec;
use crate::context::ExecutionContext;
use crate::executor::CommandExecutor;
use crate::guard::DispatchGuard;
use crate::repository::Repository;
use crate::transport::{Acknowledger, InboundMessage};

/// Outcome of processing one delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Command executed and its completion was processed.
    Executed,
    /// An execution of this identity was already in flight; the
    /// delivery was dropped without side effects.
    DuplicateDropped,
    /// Body could not be decoded; acknowledged to stop redelivery.
    DecodeError,
    /// Executor returned an error; completion was still processed.
    ExecutorFailed,
    /// Execution finished without signaling completion; its dispatch
    /// entry is now permanently stuck.
    CompletionMissing,
}

/// Receives raw messages and drives command execution.
///
/// Owns the `DispatchGuard` for its whole life; there is no ambient
/// shared state. Dropping the transport's sending half stops `run`.
pub struct Orchestrator {
    guard: DispatchGuard,
    repository: Arc<dyn Repository>,
    executor: Arc<dyn CommandExecutor>,
    acknowledger: Arc<dyn Acknowledger>,
}

impl Orchestrator {
    /// Create an orchestrator over the three collaborator seams.
    pub fn new(
        repository: Arc<dyn Repository>,
        executor: Arc<dyn CommandExecutor>,
        acknowledger: Arc<dyn Acknowledger>,
    ) -> Self {
        Self {
            guard: DispatchGuard::new(),
            repository,
            executor,
            acknowledger,
        }
    }

    /// The guard tracking in-flight executions, for watchdog inspection.
    pub fn guard(&self) -> &DispatchGuard {
        &self.guard
    }

    /// Process one delivered message end to end.
    pub async fn handle_message(&self, message: InboundMessage) -> DispatchOutcome {
        let command = match codec::decode_command(&message.body) {
            Ok(command) => command,
            Err(e) => {
                error!(error = %e, "Failed to decode inbound command; acknowledging poison message");
                if let Err(e) = self.acknowledger.acknowledge(message.handle).await {
                    error!(error = %e, "Failed to acknowledge undecodable message");
                }
                return DispatchOutcome::DecodeError;
            }
        };

        if !self.guard.try_begin(command.id, message.handle.clone()).await {
            debug!(
                command_id = %command.id,
                "Duplicate delivery while execution in flight; dropped"
            );
            return DispatchOutcome::DuplicateDropped;
        }

        let (completion, completed) = oneshot::channel();
        let mut context =
            ExecutionContext::new(Arc::clone(&self.repository), message.handle, completion);

        let executed = self.executor.execute(command.clone(), &mut context).await;
        // Drop the context first: if completion was never signaled, the
        // closed channel reports the violation instead of hanging here.
        drop(context);

        if let Err(e) = &executed {
            error!(command_id = %command.id, error = %e, "Command executor reported failure");
        }

        match completed.await {
            Ok(notice) => {
                match self.guard.try_complete(notice.command_id).await {
                    Some(handle) => {
                        if let Err(e) = self.acknowledger.acknowledge(handle).await {
                            error!(
                                command_id = %notice.command_id,
                                error = %e,
                                "Failed to acknowledge completed command"
                            );
                        }
                    }
                    None => {
                        error!(
                            command_id = %notice.command_id,
                            "Completion signaled without a matching begin"
                        );
                    }
                }
                if executed.is_ok() {
                    DispatchOutcome::Executed
                } else {
                    DispatchOutcome::ExecutorFailed
                }
            }
            Err(_) => {
                error!(
                    command_id = %command.id,
                    "Execution finished without signaling completion; its dispatch entry is permanently stuck"
                );
                DispatchOutcome::CompletionMissing
            }
        }
    }

    /// Consume messages until the transport closes its sending half.
    ///
    /// Each message is handled on its own task; distinct command
    /// identities execute fully in parallel with no ordering between
    /// them.
    pub async fn run(self: Arc<Self>, mut inbound: mpsc::Receiver<InboundMessage>) {
        info!("Command consumer started");
        while let Some(message) = inbound.recv().await {
            let orchestrator = Arc::clone(&self);
            tokio::spawn(async move {
                orchestrator.handle_message(message).await;
            });
        }
        info!("Transport channel closed; command consumer stopping");
    }
}
