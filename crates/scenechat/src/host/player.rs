use std::ffi::OsString;

use anyhow::Context;
use async_trait::async_trait;
use scenechat_core::voice::{AudioPlayer, AudioTask};
use tokio::process::Command;

/// Plays audio files with a command-line player, one process per file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandAudioPlayer {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandAudioPlayer {
    /// Creates a player running `program` with `args` before the file path.
    pub fn new<I, S>(program: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for CommandAudioPlayer {
    fn default() -> Self {
        match std::env::consts::OS {
            "macos" => Self::new("afplay", Vec::<OsString>::new()),
            "windows" => Self::new(
                "powershell",
                [
                    "-NoProfile",
                    "-Command",
                    "(New-Object Media.SoundPlayer $args[0]).PlaySync()",
                ],
            ),
            _ => Self::new("aplay", ["-q"]),
        }
    }
}

#[async_trait]
impl AudioPlayer for CommandAudioPlayer {
    async fn play(&self, audio: &AudioTask) -> anyhow::Result<()> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(&audio.path)
            .kill_on_drop(true)
            .status()
            .await
            .with_context(|| {
                format!("run player: {}", self.program.to_string_lossy())
            })?;
        anyhow::ensure!(status.success(), "player exited with {status}");
        Ok(())
    }
}
