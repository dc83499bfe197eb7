use std::error::Error;

use crate::error::ErrorKind;
use crate::request::ModelRequest;
use crate::response::ModelResponse;

/// An error reported by a completion service, classified by [`ErrorKind`]
/// so callers can tell retryable failures from permanent ones.
pub trait ModelProviderError: Error + Send + Sync + 'static {
    /// Returns how this failure is classified.
    fn kind(&self) -> ErrorKind;
}

/// A completion service the session can send chat requests to.
///
/// The session keeps one provider inside a type-erased client and calls it
/// again for every retry, so a request must not depend on anything left
/// over from the previous one.
pub trait ModelProvider: Send + Sync {
    /// Failures reported by this service.
    type Error: ModelProviderError;

    /// The stream a successful request yields.
    type Response: ModelResponse<Error = Self::Error>;

    /// Opens a streaming completion for `req`.
    ///
    /// The returned future resolves once the service has accepted the
    /// request; the content itself is delivered by the response.
    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;
}
