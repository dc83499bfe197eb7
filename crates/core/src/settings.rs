//! User-adjustable sampling, voice and language settings, stored as JSON.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use scenechat_model::SamplingOptions;
use serde::{Deserialize, Serialize};

use crate::voice::VoiceParams;

/// The language answers are written in unless configured otherwise.
///
/// The default voice and sentence terminators are tuned for it.
pub const DEFAULT_LANGUAGE: &str = "Japanese";

/// Settings that persist across sessions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Sampling options sent with every completion request.
    pub completion: SamplingOptions,
    /// The voice sentences are spoken with.
    pub voice: VoiceParams,
    /// The language the model is asked to answer in.
    pub language: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            completion: SamplingOptions::default(),
            voice: VoiceParams::default(),
            language: DEFAULT_LANGUAGE.to_owned(),
        }
    }
}

impl Settings {
    /// Names accepted by [`set`](Self::set), in display order.
    pub const KEYS: [&'static str; 11] = [
        "temperature",
        "top_p",
        "presence_penalty",
        "frequency_penalty",
        "speaker_id",
        "speed",
        "pitch",
        "intonation",
        "volume",
        "post_phoneme_length",
        "language",
    ];

    /// Clamps every value into the range the services accept.
    pub fn sanitized(mut self) -> Self {
        let completion = &mut self.completion;
        completion.temperature = completion.temperature.clamp(0.0, 2.0);
        completion.top_p = completion.top_p.clamp(0.0, 1.0);
        completion.presence_penalty =
            completion.presence_penalty.clamp(-2.0, 2.0);
        completion.frequency_penalty =
            completion.frequency_penalty.clamp(-2.0, 2.0);

        let voice = &mut self.voice;
        voice.speed = voice.speed.clamp(0.5, 2.0);
        voice.pitch = voice.pitch.clamp(-0.15, 0.15);
        voice.intonation = voice.intonation.clamp(0.0, 2.0);
        voice.volume = voice.volume.clamp(0.0, 2.0);
        voice.post_phoneme_length = voice.post_phoneme_length.clamp(0.0, 1.5);

        let language = self.language.trim();
        self.language = if language.is_empty() {
            DEFAULT_LANGUAGE.to_owned()
        } else {
            language.to_owned()
        };
        self
    }

    /// Parses `value` into the setting named `key`.
    ///
    /// Values are not clamped; call [`sanitized`](Self::sanitized) after.
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let value = value.trim();
        let number = || {
            value
                .parse::<f32>()
                .with_context(|| format!("`{value}` is not a number"))
        };
        match key {
            "temperature" => self.completion.temperature = number()?,
            "top_p" => self.completion.top_p = number()?,
            "presence_penalty" => self.completion.presence_penalty = number()?,
            "frequency_penalty" => {
                self.completion.frequency_penalty = number()?;
            }
            "speaker_id" | "speakerid" => {
                self.voice.speaker_id = value
                    .parse()
                    .with_context(|| format!("`{value}` is not a speaker id"))?;
            }
            "speed" => self.voice.speed = number()?,
            "pitch" => self.voice.pitch = number()?,
            "intonation" => self.voice.intonation = number()?,
            "volume" => self.voice.volume = number()?,
            "post_phoneme_length" | "post" => {
                self.voice.post_phoneme_length = number()?;
            }
            "language" => self.language = value.to_owned(),
            _ => bail!("unknown setting `{key}`"),
        }
        Ok(())
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let completion = &self.completion;
        let voice = &self.voice;
        writeln!(f, "temperature = {}", completion.temperature)?;
        writeln!(f, "top_p = {}", completion.top_p)?;
        writeln!(f, "presence_penalty = {}", completion.presence_penalty)?;
        writeln!(f, "frequency_penalty = {}", completion.frequency_penalty)?;
        writeln!(f, "speaker_id = {}", voice.speaker_id)?;
        writeln!(f, "speed = {}", voice.speed)?;
        writeln!(f, "pitch = {}", voice.pitch)?;
        writeln!(f, "intonation = {}", voice.intonation)?;
        writeln!(f, "volume = {}", voice.volume)?;
        writeln!(f, "post_phoneme_length = {}", voice.post_phoneme_length)?;
        write!(f, "language = {}", self.language)
    }
}

/// Reads and writes [`Settings`] at a fixed path.
#[derive(Clone, Debug)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Creates a store for the file at `path`.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the settings file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the settings, failing if the file is missing or malformed.
    pub fn load(&self) -> anyhow::Result<Settings> {
        let bytes = std::fs::read(&self.path).with_context(|| {
            format!("read settings: {}", self.path.display())
        })?;
        let settings: Settings =
            serde_json::from_slice(&bytes).context("decode settings JSON")?;
        Ok(settings.sanitized())
    }

    /// Reads the settings, falling back to the defaults on any failure.
    pub fn load_or_default(&self) -> Settings {
        match self.load() {
            Ok(settings) => settings,
            Err(err) => {
                info!("using default settings: {err:#}");
                Settings::default()
            }
        }
    }

    /// Writes the settings to a temporary file and moves it into place.
    pub fn save(&self, settings: &Settings) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(settings)
            .context("encode settings JSON")?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("create settings directory: {}", parent.display())
            })?;
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("write temp: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path).with_context(|| {
            format!("replace file: {}", self.path.display())
        })?;
        Ok(())
    }
}
