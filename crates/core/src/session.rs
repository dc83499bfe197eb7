mod builder;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Local;
use scenechat_model::{ModelMessage, ModelRequest, Role};

pub use builder::SessionBuilder;

use crate::decompose::{Decomposed, decompose};
use crate::dialect::ScriptDialect;
use crate::error::CompletionError;
use crate::executor::{ExecutionFailure, ExecutionResult, ScriptExecutor};
use crate::model_client::ModelClient;
use crate::segmenter::SentenceSegmenter;
use crate::session_log::{SessionLog, session_id};
use crate::settings::Settings;
use crate::token::TokenCounter;
use crate::transcript::{Transcript, shrink};
use crate::voice::{VoicePipeline, VoiceTask};

/// A cloneable handle that stops the turn in progress.
///
/// The stop takes effect before the next fragment is consumed. Every new
/// turn clears it.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Creates a handle that is not yet attached to a session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the current turn to stop.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns `true` if a stop was requested during the current turn.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// What a completed turn produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReport {
    /// The full response text.
    pub text: String,
    /// The response without its code blocks.
    pub comment: String,
    /// Code blocks of the active dialect.
    pub code_list: Vec<String>,
    /// Tokens sent with the request.
    pub prompt_tokens: usize,
    /// Tokens in the response.
    pub completion_tokens: usize,
    /// Tokens used by the session so far.
    pub total_tokens: usize,
}

/// How a turn ended.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The response arrived in full.
    Completed(TurnReport),
    /// The turn was stopped through a [`StopHandle`].
    Cancelled,
    /// The completion service failed.
    Failed(CompletionError),
}

/// Status changes reported to the front end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// A response is being streamed.
    Streaming,
    /// The response arrived in full.
    Completed(TurnReport),
    /// The turn was stopped.
    Stopped,
    /// The turn failed with the given message.
    Failed(String),
    /// A fresh session was started.
    NewSession,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Streaming => f.write_str("Streaming..."),
            Self::Completed(report) => write!(
                f,
                "Completed ({} prompt + {} completion = {} tokens, total {})",
                report.prompt_tokens,
                report.completion_tokens,
                report.prompt_tokens + report.completion_tokens,
                report.total_tokens
            ),
            Self::Stopped => f.write_str("Stopped"),
            Self::Failed(message) => write!(f, "Failed: {message}"),
            Self::NewSession => f.write_str("New session"),
        }
    }
}

enum StreamEnd {
    Finished,
    Stopped,
}

/// A conversation with the completion service that turns responses into
/// speech and runnable scripts.
///
/// The session owns the transcript; every operation takes `&mut self`, so
/// turns never overlap.
pub struct ConversationSession {
    model_client: ModelClient,
    model: Option<String>,
    settings: Settings,
    token_counter: Arc<dyn TokenCounter>,
    max_prompt_tokens: usize,
    terminators: String,
    executor: Option<Box<dyn ScriptExecutor>>,
    voice: Option<VoicePipeline>,
    log_root: Option<PathBuf>,
    stop_handle: StopHandle,
    on_transcript: Option<Box<dyn Fn(&str) + Send + Sync>>,
    on_status: Option<Box<dyn Fn(&SessionStatus) + Send + Sync>>,

    id: String,
    log: Option<SessionLog>,
    dialect: ScriptDialect,
    transcript: Transcript,
    code_list: Vec<String>,
    total_tokens: usize,
    last_failure: Option<ExecutionFailure>,
    fix_enabled: bool,
}

impl ConversationSession {
    fn from_builder(
        builder: SessionBuilder,
        token_counter: Arc<dyn TokenCounter>,
    ) -> Self {
        let SessionBuilder {
            model_client,
            model,
            settings,
            dialect,
            token_counter: _,
            max_prompt_tokens,
            terminators,
            executor,
            voice,
            log_root,
            stop_handle,
            on_transcript,
            on_status,
        } = builder;

        let id = session_id(Local::now());
        let log = log_root.as_deref().map(|root| SessionLog::new(root, &id));
        let transcript =
            Transcript::new(dialect.system_prompt(&settings.language));
        debug!("started session {id}");
        Self {
            model_client,
            model,
            settings,
            token_counter,
            max_prompt_tokens,
            terminators,
            executor,
            voice,
            log_root,
            stop_handle,
            on_transcript,
            on_status,
            id,
            log,
            dialect,
            transcript,
            code_list: vec![],
            total_tokens: 0,
            last_failure: None,
            fix_enabled: false,
        }
    }

    /// Returns the session identifier.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns where this session is persisted, if anywhere.
    #[inline]
    pub fn log_dir(&self) -> Option<&Path> {
        self.log.as_ref().map(SessionLog::dir)
    }

    /// Returns the transcript.
    #[inline]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Returns the code blocks of the last completed response.
    #[inline]
    pub fn code_list(&self) -> &[String] {
        &self.code_list
    }

    /// Returns the tokens used since the session started.
    #[inline]
    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    /// Returns the active script dialect.
    #[inline]
    pub fn dialect(&self) -> ScriptDialect {
        self.dialect
    }

    /// Returns the current settings.
    #[inline]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replaces the settings used by subsequent turns.
    ///
    /// A new answer language takes effect in the system message right away.
    pub fn set_settings(&mut self, settings: Settings) {
        if settings.language != self.settings.language {
            info!("answers will be written in {}", settings.language);
            self.transcript.set_system_prompt(
                self.dialect.system_prompt(&settings.language),
            );
        }
        self.settings = settings;
    }

    /// Returns the requested model, or `None` for the provider's default.
    #[inline]
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Switches the model used by subsequent turns.
    pub fn set_model(&mut self, model: Option<String>) {
        info!("switched model to {model:?}");
        self.model = model;
    }

    /// Returns the last recorded execution failure.
    #[inline]
    pub fn last_failure(&self) -> Option<&ExecutionFailure> {
        self.last_failure.as_ref()
    }

    /// Returns `true` if [`send_fix`](Self::send_fix) would send a request.
    #[inline]
    pub fn fix_enabled(&self) -> bool {
        self.fix_enabled && self.last_failure.is_some()
    }

    /// Returns a handle that stops the turn in progress.
    #[inline]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }

    /// Sends a question and streams the answer.
    ///
    /// Returns `None` without doing anything if `question` is blank.
    pub async fn send(&mut self, question: &str) -> Option<TurnOutcome> {
        let question = question.trim();
        if question.is_empty() {
            return None;
        }
        let prompt =
            self.dialect.user_prompt(question, &self.settings.language);
        self.transcript.push(ModelMessage::User(prompt));
        Some(self.run_turn().await)
    }

    /// Discards the last response and asks for a new one.
    ///
    /// Returns `None` if there is nothing to regenerate.
    pub async fn regenerate(&mut self) -> Option<TurnOutcome> {
        if self.transcript.len() < 2 {
            return None;
        }
        if self.transcript.last_role() == Role::Assistant {
            self.transcript.pop();
        }
        if self.transcript.last_role() != Role::User {
            warn!("no question to regenerate an answer for");
            return None;
        }
        Some(self.run_turn().await)
    }

    /// Asks the model to repair the script that failed last.
    ///
    /// Returns `None` unless the last execution failed.
    pub async fn send_fix(&mut self) -> Option<TurnOutcome> {
        if !self.fix_enabled() {
            return None;
        }
        let failure = self.last_failure.as_ref()?;
        let prompt = self.dialect.fix_prompt(failure, &self.settings.language);
        self.transcript.push(ModelMessage::User(prompt));
        Some(self.run_turn().await)
    }

    /// Removes the last question and its answer.
    ///
    /// Returns `false` if the transcript holds no exchange.
    pub fn delete_last_exchange(&mut self) -> bool {
        if self.transcript.len() < 3 {
            return false;
        }
        self.transcript.pop();
        self.transcript.pop();
        self.persist_transcript();
        true
    }

    /// Switches the script dialect, keeping the history.
    pub fn switch_dialect(&mut self, dialect: ScriptDialect) {
        if dialect == self.dialect {
            return;
        }
        info!("switched to {dialect}");
        self.dialect = dialect;
        self.transcript
            .set_system_prompt(dialect.system_prompt(&self.settings.language));
    }

    /// Starts over with an empty transcript and a new log directory.
    pub fn new_session(&mut self) {
        self.id = session_id(Local::now());
        self.log = self
            .log_root
            .as_deref()
            .map(|root| SessionLog::new(root, &self.id));
        let system_prompt = self.dialect.system_prompt(&self.settings.language);
        self.transcript = Transcript::new(system_prompt);
        self.code_list.clear();
        self.total_tokens = 0;
        self.last_failure = None;
        self.fix_enabled = false;
        debug!("started session {}", self.id);
        self.emit_status(SessionStatus::NewSession);
    }

    /// Runs the code block at `index` of the last response.
    ///
    /// Returns `None` if there is no such block.
    pub async fn execute(&mut self, index: usize) -> Option<ExecutionResult> {
        let code = self.code_list.get(index)?.clone();
        Some(self.execute_code(&code).await)
    }

    /// Runs arbitrary code in the active dialect, such as an edited block.
    ///
    /// A failure is recorded and enables [`send_fix`](Self::send_fix).
    pub async fn execute_code(&mut self, code: &str) -> ExecutionResult {
        let result = match &self.executor {
            Some(executor) => executor.execute(code, self.dialect).await,
            None => Err(ExecutionFailure::new(
                "ExecutorUnavailable",
                "",
                "no script executor is configured",
            )),
        };
        match &result {
            Ok(()) => {
                self.last_failure = None;
                self.fix_enabled = false;
            }
            Err(failure) => {
                info!("script failed: {failure}");
                self.last_failure = Some(failure.clone());
                self.fix_enabled = true;
            }
        }
        result
    }

    /// Writes the code block at `index` to the log directory.
    pub fn export_script(&self, index: usize) -> Option<PathBuf> {
        let code = self.code_list.get(index)?;
        let log = self.log.as_ref()?;
        match log.write_script(index, code, self.dialect, Local::now()) {
            Ok(path) => Some(path),
            Err(err) => {
                warn!("failed to export script: {err:#}");
                None
            }
        }
    }

    /// Waits up to `timeout` for queued speech, then ends the session.
    ///
    /// Returns `false` if speech was cut off.
    pub async fn shutdown(self, timeout: Duration) -> bool {
        match self.voice {
            Some(voice) => voice.shutdown(timeout).await,
            None => true,
        }
    }

    async fn run_turn(&mut self) -> TurnOutcome {
        self.stop_handle.reset();
        self.fix_enabled = false;
        self.emit_status(SessionStatus::Streaming);

        let prompt_tokens = shrink(
            &mut self.transcript,
            self.max_prompt_tokens,
            &*self.token_counter,
        );
        self.total_tokens += prompt_tokens;

        let req = ModelRequest {
            messages: self.transcript.messages().to_vec(),
            model: self.model.clone(),
            sampling: self.settings.completion,
        };
        let mut text = String::new();
        let mut segmenter =
            SentenceSegmenter::with_terminators(&self.terminators);
        let streamed = self.stream(&req, &mut text, &mut segmenter).await;

        match streamed {
            Ok(StreamEnd::Finished) => {
                self.complete_turn(text, segmenter, prompt_tokens)
            }
            Ok(StreamEnd::Stopped) => {
                info!("turn stopped after {} bytes", text.len());
                self.transcript.push(ModelMessage::Assistant(text));
                self.emit_status(SessionStatus::Stopped);
                TurnOutcome::Cancelled
            }
            Err(err) => {
                error!("turn failed: {err}");
                self.transcript.push(ModelMessage::Assistant(String::new()));
                self.emit_status(SessionStatus::Failed(err.to_string()));
                TurnOutcome::Failed(err)
            }
        }
    }

    async fn stream(
        &self,
        req: &ModelRequest,
        text: &mut String,
        segmenter: &mut SentenceSegmenter,
    ) -> Result<StreamEnd, CompletionError> {
        let mut stream = self.model_client.open(req).await?;
        loop {
            if self.stop_handle.is_stopped() {
                return Ok(StreamEnd::Stopped);
            }
            let Some(fragment) = stream.next_fragment().await? else {
                return Ok(StreamEnd::Finished);
            };
            text.push_str(&fragment);
            if let Some(on_transcript) = &self.on_transcript {
                on_transcript(text.as_str());
            }
            for sentence in segmenter.push_str(&fragment) {
                self.speak(sentence);
            }
        }
    }

    fn complete_turn(
        &mut self,
        text: String,
        mut segmenter: SentenceSegmenter,
        prompt_tokens: usize,
    ) -> TurnOutcome {
        if let Some(sentence) = segmenter.finish() {
            self.speak(sentence);
        }
        let completion_tokens = self.token_counter.count(&text);
        self.total_tokens += completion_tokens;

        let Decomposed { comment, code_list } = decompose(&text, self.dialect);
        self.transcript.push(ModelMessage::Assistant(text.clone()));
        self.code_list = code_list.clone();
        self.persist_transcript();
        self.persist_scripts();

        let report = TurnReport {
            text,
            comment,
            code_list,
            prompt_tokens,
            completion_tokens,
            total_tokens: self.total_tokens,
        };
        self.emit_status(SessionStatus::Completed(report.clone()));
        TurnOutcome::Completed(report)
    }

    fn speak(&self, text: String) {
        let Some(voice) = &self.voice else {
            return;
        };
        let task = VoiceTask {
            text,
            params: self.settings.voice,
        };
        if !voice.enqueue(task) {
            warn!("voice workers are gone, sentence dropped");
        }
    }

    fn emit_status(&self, status: SessionStatus) {
        trace!("status: {status}");
        if let Some(on_status) = &self.on_status {
            on_status(&status);
        }
    }

    fn persist_transcript(&self) {
        let Some(log) = &self.log else {
            return;
        };
        if let Err(err) = log.write_transcript(self.transcript.messages()) {
            warn!("failed to save the transcript: {err:#}");
        }
    }

    fn persist_scripts(&self) {
        let Some(log) = &self.log else {
            return;
        };
        if let Err(err) =
            log.write_scripts(&self.code_list, self.dialect, Local::now())
        {
            warn!("failed to save scripts: {err:#}");
        }
    }
}

impl fmt::Debug for ConversationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationSession")
            .field("id", &self.id)
            .field("dialect", &self.dialect)
            .field("messages", &self.transcript.len())
            .field("total_tokens", &self.total_tokens)
            .finish_non_exhaustive()
    }
}
