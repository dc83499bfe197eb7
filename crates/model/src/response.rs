use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};

use crate::provider::ModelProviderError;

/// A streamed completion, delivered as a sequence of events.
///
/// Providers implement this by hand on top of their transport; the session
/// only ever drives it through `poll_next_event`.
pub trait ModelResponse: Sized + Send + 'static {
    /// The error type reported while streaming.
    type Error: ModelProviderError;

    /// Polls for the next event of the completion.
    ///
    /// Resolves to `Ok(Some(_))` for every delta and for the final
    /// [`ModelResponseEvent::Completed`], and to `Ok(None)` once the stream
    /// is exhausted. An `Err` ends the stream; later polls must yield
    /// `Ok(None)`.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>>;
}

/// The reason why a model response has finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFinishReason {
    /// The model ended its answer on its own.
    Stop,
    /// The output was truncated by the token limit.
    Length,
}

/// One step of a streamed completion.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelResponseEvent {
    /// No more text follows.
    Completed(ModelFinishReason),
    /// A piece of the assistant's text.
    MessageDelta(String),
}
