//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use scenechat_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[derive(Debug)]
pub struct TestModelResponse {
    events: VecDeque<PresetEvent>,
    completed: bool,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();

        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;

            return match this.events.pop_front() {
                Some(PresetEvent::MessageDelta(msg)) => {
                    Poll::Ready(Ok(Some(ModelResponseEvent::MessageDelta(msg))))
                }
                Some(PresetEvent::Error(kind)) => {
                    this.events.clear();
                    this.completed = true;
                    Poll::Ready(Err(Error {
                        message: "preset stream error",
                        kind,
                    }))
                }
                None if !this.completed => {
                    this.completed = true;
                    Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                        ModelFinishReason::Stop,
                    ))))
                }
                // In case this method is called after completion.
                None => Poll::Ready(Ok(None)),
            };
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}

#[derive(Default)]
struct Script {
    responses: VecDeque<PresetResponse>,
    requests: Vec<ModelRequest>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the script, which is how the
/// model should respond to the incoming requests in order. A preset with
/// failures answers the first attempts with errors and is only consumed by
/// the attempt that succeeds. If the script runs out, an error is returned.
///
/// Clones share the same script, so a test can keep one clone to inspect
/// the received requests after handing the other to a client.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.lock().responses.push_back(preset);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns how many requests have been sent, failed ones included.
    #[inline]
    pub fn attempts(&self) -> usize {
        self.lock().requests.len()
    }

    /// Returns all requests received so far.
    #[inline]
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl Debug for TestModelProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestModelProvider")
            .field("attempts", &self.attempts())
            .finish_non_exhaustive()
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let mut script = self.lock();
        script.requests.push(req.clone());

        let result = 'blk: {
            let Some(preset) = script.responses.front_mut() else {
                break 'blk Err(Error {
                    message: "no enough steps",
                    kind: ErrorKind::Other,
                });
            };
            match preset.failures {
                Some(0) => {}
                Some(remaining) => {
                    preset.failures = (remaining > 1).then(|| remaining - 1);
                }
                None => {
                    let events = script
                        .responses
                        .pop_front()
                        .map(|preset| preset.events)
                        .unwrap_or_default();
                    break 'blk Ok(TestModelResponse {
                        events: events.into(),
                        completed: false,
                        delay: self.delay.unwrap_or(Duration::from_millis(1)),
                        sleep: None,
                    });
                }
            }
            Err(Error {
                message: "preset failure",
                kind: preset.failure_kind,
            })
        };
        ready(result)
    }
}
