use scenechat_model::{ErrorKind, ModelProviderError};
use thiserror::Error;

/// An error that ended a completion.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// The request could not be opened, possibly after several attempts.
    #[error("request failed after {attempts} attempt(s): {error}")]
    Request {
        /// How many times the request was sent.
        attempts: u32,
        /// The error of the last attempt.
        error: Box<dyn ModelProviderError>,
    },
    /// The response broke off after fragments had been delivered.
    #[error("response stream broke off: {0}")]
    Stream(Box<dyn ModelProviderError>),
}

impl CompletionError {
    /// Returns the kind of the underlying provider error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Request { error, .. } | Self::Stream(error) => error.kind(),
        }
    }

    /// Returns how many requests were sent before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Request { attempts, .. } => *attempts,
            Self::Stream(_) => 1,
        }
    }
}
