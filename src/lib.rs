//! Inflight - inbound command dispatch core.
//!
//! Receives serialized commands off an at-least-once message transport,
//! guarantees at-most-one concurrent execution per command identity,
//! tracks the aggregates each execution touches, and acknowledges the
//! originating message once that execution signals completion.

pub mod aggregate;
pub mod bootstrap;
pub mod codec;
pub mod config;
pub mod context;
pub mod executor;
pub mod guard;
pub mod orchestrator;
pub mod repository;
pub mod transport;

pub use codec::Command;
pub use context::{CompletionNotice, ContextError, ExecutionContext};
pub use executor::CommandExecutor;
pub use guard::DispatchGuard;
pub use orchestrator::{DispatchOutcome, Orchestrator};
