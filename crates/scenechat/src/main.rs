//! A terminal front end for the assistant.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use scenechat::core::dialect::ScriptDialect;
use scenechat::core::settings::{Settings, SettingsStore};
use scenechat::core::voice::VoicePipeline;
use scenechat::core::{
    ConversationSession, SessionBuilder, SessionStatus, StopHandle,
    TurnOutcome,
};
use scenechat::host::{
    CommandAudioPlayer, InterpreterCommand, ProcessScriptExecutor,
};
use scenechat_openai_model::{OpenAIConfigBuilder, OpenAIProvider};
use scenechat_speech::{HttpSpeechSynthesizer, SpeechConfig};
use tokio::io::{self, AsyncBufReadExt};

const BAR_CHAR: &str = "▎";

const HELP: &str = "\
Ask anything, or use a command:
  /run [n]      run code block n of the last answer (default 0)
  /fix          ask for a fix of the script that failed last
  /code         show the code blocks of the last answer
  /save [n]     export code block n to the session log
  /regen        answer the last question again
  /delete       remove the last question and answer
  /dialect <d>  switch to `python` or `mel`
  /codeblocks [on|off]
                keep code blocks in finished answers (default off)
  /model [name] show or switch the model (`default` for the provider's)
  /settings [key value]
                show settings, or change one of them
  /new          start a new session
  /quit         exit
Press Ctrl-C to stop an answer, or at the prompt to exit.";

enum Command<'a> {
    Ask(&'a str),
    Run(usize),
    Fix,
    Code,
    Save(usize),
    Regenerate,
    Delete,
    Dialect(ScriptDialect),
    Codeblocks(Option<bool>),
    Model(Option<&'a str>),
    Settings(Option<(&'a str, &'a str)>),
    New,
    Help,
    Quit,
    Invalid(String),
}

fn parse_command(line: &str) -> Command<'_> {
    if !line.starts_with('/') {
        return Command::Ask(line);
    }
    let (name, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(name, rest)| (name, rest.trim()));
    let arg = rest.split_whitespace().next();
    let index = || match arg {
        Some(arg) => arg
            .parse::<usize>()
            .map_err(|_| format!("not an index: {arg}")),
        None => Ok(0),
    };
    let command = match name {
        "/run" => index().map(Command::Run),
        "/fix" => Ok(Command::Fix),
        "/code" => Ok(Command::Code),
        "/save" => index().map(Command::Save),
        "/regen" => Ok(Command::Regenerate),
        "/delete" => Ok(Command::Delete),
        "/dialect" => arg
            .unwrap_or_default()
            .parse::<ScriptDialect>()
            .map(Command::Dialect)
            .map_err(|err| format!("{err}")),
        "/codeblocks" => match arg {
            None => Ok(Command::Codeblocks(None)),
            Some("on") => Ok(Command::Codeblocks(Some(true))),
            Some("off") => Ok(Command::Codeblocks(Some(false))),
            Some(arg) => Err(format!("expected `on` or `off`, got {arg}")),
        },
        "/model" => Ok(Command::Model(arg)),
        "/settings" => match rest.split_once(char::is_whitespace) {
            Some((key, value)) => Ok(Command::Settings(Some((key, value)))),
            None if rest.is_empty() => Ok(Command::Settings(None)),
            None => Err(format!("missing a value for {rest}")),
        },
        "/new" => Ok(Command::New),
        "/help" => Ok(Command::Help),
        "/quit" | "/exit" => Ok(Command::Quit),
        _ => Err(format!("unknown command: {name}")),
    };
    command.unwrap_or_else(Command::Invalid)
}

/// Draws streamed answers and status changes.
///
/// The answer is drawn live while it streams and redrawn once it is
/// complete, without its code blocks unless those are kept.
struct Renderer {
    spinner_style: ProgressStyle,
    answer_style: ProgressStyle,
    leave_codeblocks: AtomicBool,
    state: Mutex<RenderState>,
}

#[derive(Default)]
struct RenderState {
    spinner: Option<ProgressBar>,
    answer: Option<ProgressBar>,
}

impl Renderer {
    fn new() -> Self {
        let spinner_style = ProgressStyle::with_template("{spinner} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        let answer_style = ProgressStyle::with_template("{msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        Self {
            spinner_style,
            answer_style,
            leave_codeblocks: AtomicBool::new(false),
            state: Mutex::default(),
        }
    }

    fn leave_codeblocks(&self) -> bool {
        self.leave_codeblocks.load(Ordering::Relaxed)
    }

    fn set_leave_codeblocks(&self, leave: bool) {
        self.leave_codeblocks.store(leave, Ordering::Relaxed);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RenderState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn on_transcript(&self, text: &str) {
        let mut state = self.lock();
        if let Some(spinner) = state.spinner.take() {
            spinner.finish_and_clear();
        }
        let answer = state.answer.get_or_insert_with(|| {
            let answer = ProgressBar::new_spinner();
            answer.set_style(self.answer_style.clone());
            answer
        });
        answer.set_message(answer_text(text));
    }

    fn on_status(&self, status: &SessionStatus) {
        let mut state = self.lock();
        if let Some(spinner) = state.spinner.take() {
            spinner.finish_and_clear();
        }
        let answer = state.answer.take();
        match status {
            SessionStatus::Streaming => {
                let spinner = ProgressBar::new_spinner();
                spinner.set_style(self.spinner_style.clone());
                spinner.set_message("🤔 Thinking...");
                spinner.enable_steady_tick(Duration::from_millis(100));
                state.spinner = Some(spinner);
            }
            SessionStatus::Completed(report) => {
                if let Some(answer) = answer {
                    answer.finish_and_clear();
                }
                let shown = if self.leave_codeblocks() {
                    &report.text
                } else {
                    &report.comment
                };
                if !shown.is_empty() {
                    println!("{}", answer_text(shown));
                }
                println!("{}", status.dimmed());
            }
            SessionStatus::NewSession => println!("{}", status.dimmed()),
            SessionStatus::Stopped => {
                if let Some(answer) = answer {
                    answer.abandon();
                }
                println!("{}", "⏹  Stopped".yellow());
            }
            SessionStatus::Failed(message) => {
                if let Some(answer) = answer {
                    answer.abandon();
                }
                println!("{} {}", "✗".bright_red(), message.bright_red());
            }
        }
    }
}

fn answer_text(text: &str) -> String {
    format!("{}🤖 {}", BAR_CHAR.bright_cyan(), text.bright_white())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Ok(api_key) = env::var("OPENAI_API_KEY") else {
        eprintln!("OPENAI_API_KEY environment variable is not set");
        return Ok(());
    };
    let mut config = OpenAIConfigBuilder::with_api_key(api_key);
    if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
        config = config.with_base_url(base_url);
    }
    if let Ok(model) = env::var("OPENAI_MODEL") {
        config = config.with_model(model);
    }
    let model_provider = OpenAIProvider::new(config.build());

    let app_dir = dirs::config_dir()
        .map(|dir| dir.join("scenechat"))
        .unwrap_or_else(|| PathBuf::from(".scenechat"));
    let settings_store = SettingsStore::at_path(app_dir.join("settings.json"));
    let settings = settings_store.load_or_default();
    if let Err(err) = settings_store.save(&settings) {
        warn!("failed to save settings: {err:#}");
    }
    let log_root = dirs::data_dir()
        .map(|dir| dir.join("scenechat").join("logs"))
        .unwrap_or_else(|| app_dir.join("logs"));

    let mut executor = ProcessScriptExecutor::new();
    if let Some(python) = env::var_os("SCENECHAT_PYTHON") {
        let python = InterpreterCommand::new(python, ["-c"]);
        executor = executor.with_python(python);
    }

    let stop_handle = StopHandle::new();
    let renderer = Arc::new(Renderer::new());
    let mut builder = SessionBuilder::with_model_provider(model_provider)
        .with_settings(settings)
        .with_executor(executor)
        .with_log_root(log_root)
        .with_stop_handle(stop_handle.clone())
        .on_transcript({
            let renderer = Arc::clone(&renderer);
            move |text| renderer.on_transcript(text)
        })
        .on_status({
            let renderer = Arc::clone(&renderer);
            move |status| renderer.on_status(status)
        });
    if let Ok(speech_url) = env::var("SCENECHAT_SPEECH_URL") {
        let config = SpeechConfig::new(env::temp_dir().join("scenechat-voice"))
            .with_base_url(speech_url);
        builder = builder.with_voice(VoicePipeline::spawn(
            HttpSpeechSynthesizer::new(config),
            CommandAudioPlayer::default(),
        ));
    }
    let mut session = builder.build();

    // Stops a running answer; at the prompt the loop below exits instead.
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            stop_handle.stop();
        }
    });

    println!("{}", HELP.dimmed());
    loop {
        print!("\n{} > ", session.dialect().bright_green());
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = read_line() => line,
            _ = tokio::signal::ctrl_c() => {
                println!();
                None
            }
        };
        let Some(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_command(line) {
            Command::Ask(question) => {
                if let Some(outcome) = session.send(question).await {
                    show_outcome(&outcome);
                }
            }
            Command::Run(index) => run_script(&mut session, index).await,
            Command::Fix => match session.send_fix().await {
                Some(outcome) => show_outcome(&outcome),
                None => println!("No failed script to fix."),
            },
            Command::Code => show_code(&session),
            Command::Save(index) => match session.export_script(index) {
                Some(path) => println!("Saved to {}", path.display()),
                None => println!("Nothing was saved."),
            },
            Command::Regenerate => match session.regenerate().await {
                Some(outcome) => show_outcome(&outcome),
                None => println!("Nothing to regenerate."),
            },
            Command::Delete => {
                if !session.delete_last_exchange() {
                    println!("Nothing to delete.");
                }
            }
            Command::Dialect(dialect) => {
                session.switch_dialect(dialect);
                println!("Scripts will be written in {dialect}.");
            }
            Command::Codeblocks(None) => {
                let leave = renderer.leave_codeblocks();
                println!(
                    "Code blocks in answers: {}",
                    if leave { "on" } else { "off" }
                );
            }
            Command::Codeblocks(Some(leave)) => {
                renderer.set_leave_codeblocks(leave);
                let action = if leave { "kept in" } else { "hidden from" };
                println!("Code blocks will be {action} finished answers.");
            }
            Command::Model(None) => {
                let model = session.model().unwrap_or("provider default");
                println!("Model: {model}");
            }
            Command::Model(Some(model)) => {
                let model = (model != "default").then(|| model.to_owned());
                session.set_model(model);
            }
            Command::Settings(None) => {
                println!("{}", session.settings());
                println!(
                    "{}",
                    "Change one with /settings <key> <value>.".dimmed()
                );
            }
            Command::Settings(Some((key, value))) => {
                update_setting(&mut session, &settings_store, key, value);
            }
            Command::New => session.new_session(),
            Command::Help => println!("{}", HELP.dimmed()),
            Command::Quit => break,
            Command::Invalid(message) => println!("{}", message.bright_red()),
        }
    }

    if !session.shutdown(Duration::from_secs(10)).await {
        warn!("queued speech was cut off");
    }
    Ok(())
}

fn show_outcome(outcome: &TurnOutcome) {
    let TurnOutcome::Completed(report) = outcome else {
        return;
    };
    for (index, code) in report.code_list.iter().enumerate() {
        let first_line = code.lines().next().unwrap_or_default().trim();
        println!(
            "{}📜 [{index}] {} ({} lines)",
            BAR_CHAR.bright_yellow(),
            first_line.bright_white(),
            code.lines().count()
        );
    }
    if !report.code_list.is_empty() {
        println!("{}", "Run a script with /run <n>.".dimmed());
    }
}

fn update_setting(
    session: &mut ConversationSession,
    store: &SettingsStore,
    key: &str,
    value: &str,
) {
    let mut settings = session.settings().clone();
    if let Err(err) = settings.set(key, value) {
        println!("{}", format!("{err:#}").bright_red());
        println!("Known settings: {}", Settings::KEYS.join(", ").dimmed());
        return;
    }
    let settings = settings.sanitized();
    if let Err(err) = store.save(&settings) {
        warn!("failed to save settings: {err:#}");
    }
    session.set_settings(settings);
}

fn show_code(session: &ConversationSession) {
    if session.code_list().is_empty() {
        println!("The last answer has no code.");
        return;
    }
    let tag = session.dialect().fence_tag();
    for (index, code) in session.code_list().iter().enumerate() {
        println!("{}", format!("[{index}] ```{tag}").bright_yellow());
        for line in code.lines() {
            println!("{}{}", BAR_CHAR.bright_yellow(), line);
        }
    }
}

async fn run_script(session: &mut ConversationSession, index: usize) {
    match session.execute(index).await {
        None => println!("There is no code block {index}."),
        Some(Ok(())) => println!("{} Script ran successfully.", "✓".green()),
        Some(Err(failure)) => {
            println!("{} {}", "✗".bright_red(), failure.bright_red());
            println!("{}", "Send /fix to ask for a correction.".dimmed());
        }
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
