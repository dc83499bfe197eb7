//! Per-session files: the transcript and the scripts it produced.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Local};
use scenechat_model::ModelMessage;

use crate::dialect::ScriptDialect;

/// Returns the identifier of a session started at `now`.
pub fn session_id(now: DateTime<Local>) -> String {
    now.format("session_%y%m%d_%H%M%S").to_string()
}

/// The log directory of one session.
#[derive(Clone, Debug)]
pub struct SessionLog {
    dir: PathBuf,
}

impl SessionLog {
    /// Places the log of `session_id` under `root`. Nothing is written
    /// until the first save.
    pub fn new(root: &Path, session_id: &str) -> Self {
        Self {
            dir: root.join(session_id),
        }
    }

    /// Returns the session's log directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes the transcript as pretty-printed JSON to `messages.json`.
    pub fn write_transcript(
        &self,
        messages: &[ModelMessage],
    ) -> anyhow::Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.dir.join("messages.json");
        let json = serde_json::to_string_pretty(messages)
            .context("encode transcript JSON")?;
        std::fs::write(&path, json)
            .with_context(|| format!("write transcript: {}", path.display()))?;
        Ok(path)
    }

    /// Writes one script file, named after `now` and `index`.
    pub fn write_script(
        &self,
        index: usize,
        code: &str,
        dialect: ScriptDialect,
        now: DateTime<Local>,
    ) -> anyhow::Result<PathBuf> {
        self.ensure_dir()?;
        let name = format!(
            "script_{}_{index:02}.{}",
            now.format("%H%M%S"),
            dialect.extension()
        );
        let path = self.dir.join(name);
        std::fs::write(&path, code)
            .with_context(|| format!("write script: {}", path.display()))?;
        Ok(path)
    }

    /// Writes every script of a response, numbered in order.
    pub fn write_scripts(
        &self,
        code_list: &[String],
        dialect: ScriptDialect,
        now: DateTime<Local>,
    ) -> anyhow::Result<Vec<PathBuf>> {
        code_list
            .iter()
            .enumerate()
            .map(|(index, code)| self.write_script(index, code, dialect, now))
            .collect()
    }

    fn ensure_dir(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir).with_context(|| {
            format!("create log directory: {}", self.dir.display())
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 12, 5, 7).unwrap()
    }

    #[test]
    fn test_session_id() {
        assert_eq!(session_id(noon()), "session_240309_120507");
    }

    #[test]
    fn test_writes_files() {
        let root = tempfile::tempdir().unwrap();
        let log = SessionLog::new(root.path(), "session_x");
        assert!(!log.dir().exists());

        let messages = vec![
            ModelMessage::System("sys".to_owned()),
            ModelMessage::User("hi".to_owned()),
        ];
        let path = log.write_transcript(&messages).unwrap();
        let back: Vec<ModelMessage> =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap())
                .unwrap();
        assert_eq!(back, messages);

        let paths = log
            .write_scripts(
                &["print(1)".to_owned(), "print(2)".to_owned()],
                ScriptDialect::Python,
                noon(),
            )
            .unwrap();
        assert_eq!(
            paths,
            [
                root.path().join("session_x/script_120507_00.py"),
                root.path().join("session_x/script_120507_01.py"),
            ]
        );
        assert_eq!(std::fs::read_to_string(&paths[1]).unwrap(), "print(2)");
    }
}
