//! Speech synthesis through a local HTTP engine exposing the
//! `audio_query` / `synthesis` endpoint pair.

#[macro_use]
extern crate tracing;

mod config;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Url};
use scenechat_core::voice::{
    AudioTask, SpeechSynthesizer, VoiceParams, VoiceTask,
};
use serde_json::Value;
use uuid::Uuid;

pub use config::SpeechConfig;

/// Synthesizes sentences into WAV files with a speech engine.
#[derive(Clone, Debug)]
pub struct HttpSpeechSynthesizer {
    client: Client,
    config: SpeechConfig,
}

impl HttpSpeechSynthesizer {
    /// Creates a synthesizer talking to the engine described by `config`.
    pub fn new(config: SpeechConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|err| {
                warn!("falling back to a default HTTP client: {err}");
                Client::new()
            });
        Self { client, config }
    }

    fn endpoint(
        &self,
        name: &str,
        params: &[(&str, &str)],
    ) -> anyhow::Result<Url> {
        let url = format!("{}/{name}", self.config.base_url);
        Url::parse_with_params(&url, params)
            .with_context(|| format!("invalid engine URL: {url}"))
    }

    async fn audio_query(
        &self,
        text: &str,
        speaker: &str,
    ) -> anyhow::Result<Value> {
        let url = self
            .endpoint("audio_query", &[("text", text), ("speaker", speaker)])?;
        let resp = self
            .client
            .post(url)
            .send()
            .await
            .context("send audio query")?
            .error_for_status()
            .context("audio query rejected")?;
        resp.json().await.context("decode audio query")
    }

    async fn synthesis(
        &self,
        query: &Value,
        speaker: &str,
    ) -> anyhow::Result<Vec<u8>> {
        let url = self.endpoint("synthesis", &[("speaker", speaker)])?;
        let resp = self
            .client
            .post(url)
            .json(query)
            .send()
            .await
            .context("send synthesis request")?
            .error_for_status()
            .context("synthesis rejected")?;
        let wav = resp.bytes().await.context("receive synthesized audio")?;
        Ok(wav.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(&self, task: &VoiceTask) -> anyhow::Result<AudioTask> {
        let speaker = task.params.speaker_id.to_string();
        let mut query = self.audio_query(&task.text, &speaker).await?;
        apply_params(&mut query, &task.params)?;
        let wav = self.synthesis(&query, &speaker).await?;

        let dir = &self.config.output_dir;
        tokio::fs::create_dir_all(dir).await.with_context(|| {
            format!("create audio directory: {}", dir.display())
        })?;
        let path = dir.join(format!("{}.wav", Uuid::new_v4()));
        tokio::fs::write(&path, &wav)
            .await
            .with_context(|| format!("write audio: {}", path.display()))?;
        trace!("wrote {} bytes to {}", wav.len(), path.display());

        Ok(AudioTask {
            path,
            delete_after_play: true,
        })
    }
}

/// Overrides the engine's defaults with the user's voice settings.
fn apply_params(query: &mut Value, params: &VoiceParams) -> anyhow::Result<()> {
    let Some(fields) = query.as_object_mut() else {
        anyhow::bail!("audio query is not a JSON object");
    };
    for (name, value) in [
        ("volumeScale", params.volume),
        ("speedScale", params.speed),
        ("pitchScale", params.pitch),
        ("intonationScale", params.intonation),
        ("postPhonemeLength", params.post_phoneme_length),
    ] {
        fields.insert(name.to_owned(), scalar(value));
    }
    Ok(())
}

/// Converts through the shortest decimal form so `1.1f32` stays `1.1`.
fn scalar(value: f32) -> Value {
    let value = value.to_string().parse().unwrap_or(f64::from(value));
    Value::from(value)
}
