//! # Crucible: Conversational Code Execution Core
//!
//! Crucible lets a conversation produce small programs and run them against a
//! local compiler toolchain while observers follow progress live.
//!
//! ## Components
//!
//! - **Execution engine** ([`executor`]): compiles and runs a program in an
//!   ephemeral, exclusively-owned workspace under a wall-clock cap, capturing
//!   every fault into an immutable-once-terminal [`executor::ExecutionRecord`].
//! - **Event bus** ([`event_bus`]): per-execution publish/subscribe with
//!   registration-order delivery and replay-on-join for finished executions.
//! - **Sessions** ([`session`]): per-conversation history and artifacts with
//!   single-writer-per-session serialization.
//! - **Chat router** ([`chat`]): the intent-routing state machine deciding,
//!   per message, between rerunning the stored artifact, running supplied
//!   code, generating code, and conversing.
//! - **Generation provider** ([`provider`]): the external classify /
//!   generate / chat collaborator behind a mockable trait, shipped with an
//!   OpenAI chat-completion implementation.
//! - **System** ([`system`]): the facade transports build on.
//!
//! ## Control flow
//!
//! ```text
//! message → ChatRouter → Session
//!                      ↘ Executor → EventBus → subscribers
//! ```
//!
//! Transports (HTTP, WebSocket, CLI) and presentation are deliberately out of
//! scope; everything here is transport-agnostic.

pub mod chat;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod executor;
pub mod provider;
pub mod session;
pub mod system;

pub use chat::{ChatResponse, ChatRouter, ResponseKind, RunStatus};
pub use config::{ChatConfig, ExecutorConfig, GenerationConfig, SecretConfig, SystemConfig};
pub use error::*;
pub use event_bus::{EventBus, EventSubscription, ExecutionEvent, SubscriptionId};
pub use executor::{ExecutionId, ExecutionRecord, ExecutionStatus, ExecutionStore, Executor};
pub use session::{Role, Session, SessionStore, Turn};
pub use system::System;
