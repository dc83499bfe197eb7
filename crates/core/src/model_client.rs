mod retry;

use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::task::{Context, Poll, ready};

use scenechat_model::{
    ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
    ModelResponseEvent,
};
use tracing::Instrument;

pub use retry::RetryPolicy;

use crate::error::CompletionError;

type BoxedError = Box<dyn ModelProviderError>;
type BoxedResponse = Pin<Box<dyn FragmentSource>>;
type OpenResult = Result<BoxedResponse, BoxedError>;
type BoxedOpenFuture = Pin<Box<dyn Future<Output = OpenResult> + Send>>;
type HandlerFn = Arc<dyn Fn(ModelRequest) -> BoxedOpenFuture + Send + Sync>;

/// A response reduced to its text fragments.
trait FragmentSource: Send {
    fn poll_next_fragment(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<String>, BoxedError>>;
}

impl<R: ModelResponse> FragmentSource for R {
    fn poll_next_fragment(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<String>, BoxedError>> {
        loop {
            match ready!(self.as_mut().poll_next_event(cx)) {
                Ok(Some(ModelResponseEvent::MessageDelta(delta))) => {
                    return Poll::Ready(Ok(Some(delta)));
                }
                Ok(Some(ModelResponseEvent::Completed(reason))) => {
                    trace!("finished with reason: {reason:?}");
                }
                Ok(None) => return Poll::Ready(Ok(None)),
                Err(err) => return Poll::Ready(Err(Box::new(err))),
            }
        }
    }
}

/// A wrapper around a model provider that retries failed requests and
/// provides a type-erased interface for the session.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
    retry_policy: RetryPolicy,
}

impl ModelClient {
    /// Wraps `provider` with the default retry policy.
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {req:?}");
                    match fut.await {
                        Ok(resp) => Ok(Box::pin(resp) as BoxedResponse),
                        Err(err) => {
                            debug!("request failed: {err}");
                            Err(Box::new(err) as BoxedError)
                        }
                    }
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self {
            handler_fn,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    #[inline]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Sends a request and waits for its first fragment.
    ///
    /// Transient failures up to that point are retried according to the
    /// retry policy. Once a stream is returned, no request is sent again.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. Dropping the future abandons the pending
    /// attempt and any scheduled retry.
    pub async fn open(
        &self,
        req: &ModelRequest,
    ) -> Result<CompletionStream, CompletionError> {
        let attempts = AtomicU32::new(0);
        let max_attempts = self.retry_policy.max_attempts.max(1);

        let operation = || {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            let fut = self.try_open(req.clone());
            async move {
                fut.await.map_err(|err| {
                    if err.kind().is_transient() && attempt < max_attempts {
                        warn!("attempt {attempt} failed, will retry: {err}");
                        backoff::Error::transient(err)
                    } else {
                        backoff::Error::permanent(err)
                    }
                })
            }
        };

        backoff::future::retry(self.retry_policy.backoff(), operation)
            .await
            .map_err(|error| CompletionError::Request {
                attempts: attempts.load(Ordering::Relaxed),
                error,
            })
    }

    fn try_open(
        &self,
        req: ModelRequest,
    ) -> impl Future<Output = Result<CompletionStream, BoxedError>> + Send + 'static
    {
        let fut = (self.handler_fn)(req);
        async move {
            let mut response = fut.await?;
            let first =
                poll_fn(|cx| response.as_mut().poll_next_fragment(cx)).await?;
            Ok(CompletionStream {
                response: first.is_some().then_some(response),
                first,
            })
        }
    }
}

/// The text fragments of an opened completion, in arrival order.
///
/// Dropping the stream closes the underlying response.
pub struct CompletionStream {
    response: Option<BoxedResponse>,
    first: Option<String>,
}

impl CompletionStream {
    /// Returns the next fragment, or `None` once the response has ended.
    ///
    /// After the end or an error, every further call returns `Ok(None)`.
    pub async fn next_fragment(
        &mut self,
    ) -> Result<Option<String>, CompletionError> {
        if let Some(first) = self.first.take() {
            return Ok(Some(first));
        }
        let Some(response) = self.response.as_mut() else {
            return Ok(None);
        };
        match poll_fn(|cx| response.as_mut().poll_next_fragment(cx)).await {
            Ok(Some(fragment)) => Ok(Some(fragment)),
            Ok(None) => {
                trace!("response ended");
                self.response = None;
                Ok(None)
            }
            Err(err) => {
                error!("response broke off: {err}");
                self.response = None;
                Err(CompletionError::Stream(err))
            }
        }
    }
}

impl std::fmt::Debug for CompletionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionStream")
            .field("finished", &self.response.is_none())
            .finish_non_exhaustive()
    }
}
