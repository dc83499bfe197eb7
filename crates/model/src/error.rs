use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The credentials were rejected.
    Authentication,
    /// The provider refused the request payload.
    MalformedRequest,
    /// The model provider is rate limited.
    RateLimitExceeded,
    /// The request or the stream timed out.
    Timeout,
    /// The connection could not be established or was dropped.
    Connection,
    /// The service is temporarily unavailable.
    ServerUnavailable,
    /// The service reported an unclassified server-side error.
    Api,
    /// Any other errors.
    Other,
}

impl ErrorKind {
    /// Returns `true` if a request failing with this kind may succeed when
    /// it is sent again later.
    #[inline]
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimitExceeded
                | ErrorKind::Timeout
                | ErrorKind::Connection
                | ErrorKind::ServerUnavailable
                | ErrorKind::Api
        )
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Authentication => "authentication failed",
            ErrorKind::MalformedRequest => "malformed request",
            ErrorKind::RateLimitExceeded => "rate limit exceeded",
            ErrorKind::Timeout => "timed out",
            ErrorKind::Connection => "connection error",
            ErrorKind::ServerUnavailable => "service unavailable",
            ErrorKind::Api => "API error",
            ErrorKind::Other => "error",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_kinds() {
        assert!(ErrorKind::RateLimitExceeded.is_transient());
        assert!(ErrorKind::Timeout.is_transient());
        assert!(ErrorKind::Connection.is_transient());
        assert!(ErrorKind::ServerUnavailable.is_transient());
        assert!(ErrorKind::Api.is_transient());

        assert!(!ErrorKind::Authentication.is_transient());
        assert!(!ErrorKind::MalformedRequest.is_transient());
        assert!(!ErrorKind::Other.is_transient());
    }
}
