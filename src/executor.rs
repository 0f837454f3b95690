//! Command execution seam.
//!
//! Locating and invoking the handler for a decoded command is external
//! to this crate. The one hard contract: whatever executes a command
//! must route it to `ExecutionContext::on_command_executed` exactly once
//! before returning, on every outcome including handler failure. An
//! execution that never signals completion permanently leaks its
//! dispatch entry and blocks redelivery of that command identity.

use async_trait::async_trait;

use crate::codec::Command;
use crate::context::ExecutionContext;

/// Boxed error surfaced by command execution.
pub type ExecutorError = Box<dyn std::error::Error + Send + Sync>;

/// Executes a typed command against its handler.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Execute `command`, reading and mutating aggregates through
    /// `context`.
    ///
    /// Errors describe handler failures; they do not excuse the
    /// completion contract above.
    async fn execute(
        &self,
        command: Command,
        context: &mut ExecutionContext,
    ) -> Result<(), ExecutorError>;
}
