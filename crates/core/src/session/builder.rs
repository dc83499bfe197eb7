use std::path::PathBuf;
use std::sync::Arc;

use scenechat_model::ModelProvider;

use super::{ConversationSession, SessionStatus, StopHandle};
use crate::dialect::ScriptDialect;
use crate::executor::ScriptExecutor;
use crate::model_client::{ModelClient, RetryPolicy};
use crate::segmenter::DEFAULT_TERMINATORS;
use crate::settings::Settings;
use crate::token::{BpeTokenCounter, HeuristicTokenCounter, TokenCounter};
use crate::transcript::DEFAULT_MAX_PROMPT_TOKENS;
use crate::voice::VoicePipeline;

/// [`ConversationSession`] builder.
pub struct SessionBuilder {
    pub(crate) model_client: ModelClient,
    pub(crate) model: Option<String>,
    pub(crate) settings: Settings,
    pub(crate) dialect: ScriptDialect,
    pub(crate) token_counter: Option<Arc<dyn TokenCounter>>,
    pub(crate) max_prompt_tokens: usize,
    pub(crate) terminators: String,
    pub(crate) executor: Option<Box<dyn ScriptExecutor>>,
    pub(crate) voice: Option<VoicePipeline>,
    pub(crate) log_root: Option<PathBuf>,
    pub(crate) stop_handle: StopHandle,
    pub(crate) on_transcript: Option<Box<dyn Fn(&str) + Send + Sync>>,
    pub(crate) on_status: Option<Box<dyn Fn(&SessionStatus) + Send + Sync>>,
}

impl SessionBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            model: None,
            settings: Settings::default(),
            dialect: ScriptDialect::default(),
            token_counter: None,
            max_prompt_tokens: DEFAULT_MAX_PROMPT_TOKENS,
            terminators: DEFAULT_TERMINATORS.to_owned(),
            executor: None,
            voice: None,
            log_root: None,
            stop_handle: StopHandle::default(),
            on_transcript: None,
            on_status: None,
        }
    }

    /// Replaces the retry policy of completion requests.
    #[inline]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.model_client = self.model_client.with_retry_policy(retry_policy);
        self
    }

    /// Requests a specific model instead of the provider's default.
    #[inline]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the sampling, voice and language settings.
    #[inline]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the initial script dialect.
    #[inline]
    pub fn with_dialect(mut self, dialect: ScriptDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Sets the counter used for prompt budgeting and usage reports.
    ///
    /// Defaults to the `cl100k_base` encoding.
    #[inline]
    pub fn with_token_counter(
        mut self,
        counter: impl TokenCounter + 'static,
    ) -> Self {
        self.token_counter = Some(Arc::new(counter));
        self
    }

    /// Sets the prompt size above which old messages are evicted.
    #[inline]
    pub fn with_max_prompt_tokens(mut self, max_prompt_tokens: usize) -> Self {
        self.max_prompt_tokens = max_prompt_tokens;
        self
    }

    /// Sets the characters that end a spoken sentence.
    #[inline]
    pub fn with_sentence_terminators(
        mut self,
        terminators: impl Into<String>,
    ) -> Self {
        self.terminators = terminators.into();
        self
    }

    /// Sets the executor that runs generated scripts.
    #[inline]
    pub fn with_executor(
        mut self,
        executor: impl ScriptExecutor + 'static,
    ) -> Self {
        self.executor = Some(Box::new(executor));
        self
    }

    /// Speaks responses through `voice`.
    #[inline]
    pub fn with_voice(mut self, voice: VoicePipeline) -> Self {
        self.voice = Some(voice);
        self
    }

    /// Persists each session under `log_root`.
    #[inline]
    pub fn with_log_root(mut self, log_root: impl Into<PathBuf>) -> Self {
        self.log_root = Some(log_root.into());
        self
    }

    /// Uses an existing stop handle, so that it can be captured by
    /// callbacks before the session exists.
    #[inline]
    pub fn with_stop_handle(mut self, stop_handle: StopHandle) -> Self {
        self.stop_handle = stop_handle;
        self
    }

    /// Attaches a callback receiving the accumulated response text each
    /// time a fragment arrives.
    #[inline]
    pub fn on_transcript(
        mut self,
        on_transcript: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.on_transcript = Some(Box::new(on_transcript));
        self
    }

    /// Attaches a callback receiving status changes.
    #[inline]
    pub fn on_status(
        mut self,
        on_status: impl Fn(&SessionStatus) + Send + Sync + 'static,
    ) -> Self {
        self.on_status = Some(Box::new(on_status));
        self
    }

    /// Builds the session.
    pub fn build(mut self) -> ConversationSession {
        let token_counter: Arc<dyn TokenCounter> =
            match self.token_counter.take() {
                Some(counter) => counter,
                None => match BpeTokenCounter::cl100k() {
                    Ok(counter) => Arc::new(counter),
                    Err(err) => {
                        warn!("using approximate token counts: {err:#}");
                        Arc::new(HeuristicTokenCounter::default())
                    }
                },
            };
        ConversationSession::from_builder(self, token_counter)
    }
}
