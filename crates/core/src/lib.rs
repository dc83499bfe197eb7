//! Core logic of the assistant: conversation turns, response streaming,
//! script extraction, speech queues and persistence.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

pub mod decompose;
pub mod dialect;
mod error;
pub mod executor;
mod model_client;
pub mod segmenter;
mod session;
pub mod session_log;
pub mod settings;
pub mod token;
pub mod transcript;
pub mod voice;

pub use error::CompletionError;
pub use model_client::{CompletionStream, ModelClient, RetryPolicy};
pub use session::{
    ConversationSession, SessionBuilder, SessionStatus, StopHandle,
    TurnOutcome, TurnReport,
};
