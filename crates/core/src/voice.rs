//! Background speech: a synthesis worker turns sentences into audio files
//! and a playback worker plays them, both strictly in arrival order.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Voice parameters passed to the speech synthesizer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceParams {
    /// The synthesizer's voice identifier.
    #[serde(alias = "speakerid")]
    pub speaker_id: u32,
    /// Speaking rate multiplier.
    pub speed: f32,
    /// Pitch offset.
    pub pitch: f32,
    /// Intonation multiplier.
    pub intonation: f32,
    /// Volume multiplier.
    pub volume: f32,
    /// Silence appended after the sentence, in seconds.
    #[serde(alias = "post")]
    pub post_phoneme_length: f32,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            speaker_id: 47,
            speed: 1.1,
            pitch: 0.0,
            intonation: 1.0,
            volume: 1.0,
            post_phoneme_length: 0.1,
        }
    }
}

/// A sentence waiting to be synthesized.
#[derive(Clone, Debug, PartialEq)]
pub struct VoiceTask {
    /// The sentence to speak.
    pub text: String,
    /// The voice to speak it with.
    pub params: VoiceParams,
}

/// Synthesized audio waiting to be played.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioTask {
    /// The audio file.
    pub path: PathBuf,
    /// Whether the file is removed once played.
    pub delete_after_play: bool,
}

/// Turns text into an audio file.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync + 'static {
    /// Synthesizes `task`, returning where the audio was written.
    async fn synthesize(&self, task: &VoiceTask) -> anyhow::Result<AudioTask>;
}

/// Plays audio files to completion.
#[async_trait]
pub trait AudioPlayer: Send + Sync + 'static {
    /// Plays `audio`, returning once playback has finished.
    async fn play(&self, audio: &AudioTask) -> anyhow::Result<()>;
}

/// The two speech workers and the queue feeding them.
///
/// Dropping the pipeline closes the queue; the workers then finish the
/// queued speech in the background.
#[derive(Debug)]
pub struct VoicePipeline {
    voice_tx: Option<UnboundedSender<VoiceTask>>,
    synthesis: JoinHandle<()>,
    playback: JoinHandle<()>,
}

impl VoicePipeline {
    /// Spawns the synthesis and playback workers on the current runtime.
    pub fn spawn<S, P>(synthesizer: S, player: P) -> Self
    where
        S: SpeechSynthesizer,
        P: AudioPlayer,
    {
        let (voice_tx, voice_rx) = mpsc::unbounded_channel();
        let (audio_tx, audio_rx) = mpsc::unbounded_channel();
        let synthesis = tokio::spawn(
            run_synthesis(synthesizer, voice_rx, audio_tx)
                .instrument(debug_span!("voice synthesis")),
        );
        let playback = tokio::spawn(
            run_playback(player, audio_rx)
                .instrument(debug_span!("voice playback")),
        );
        Self {
            voice_tx: Some(voice_tx),
            synthesis,
            playback,
        }
    }

    /// Queues a sentence, returning `false` if the workers are gone.
    pub fn enqueue(&self, task: VoiceTask) -> bool {
        let Some(voice_tx) = &self.voice_tx else {
            return false;
        };
        voice_tx.send(task).is_ok()
    }

    /// Closes the queue and waits up to `timeout` for the queued speech to
    /// finish, returning `true` if both workers ended in time.
    ///
    /// Workers still running at the deadline are aborted.
    pub async fn shutdown(mut self, timeout: Duration) -> bool {
        drop(self.voice_tx.take());
        let drained = async {
            if let Err(err) = (&mut self.synthesis).await {
                warn!("synthesis worker ended abnormally: {err}");
            }
            if let Err(err) = (&mut self.playback).await {
                warn!("playback worker ended abnormally: {err}");
            }
        };
        let result = tokio::time::timeout(timeout, drained).await;
        match result {
            Ok(()) => true,
            Err(_) => {
                warn!("voice workers did not finish in {timeout:?}");
                self.abort_workers();
                false
            }
        }
    }

    /// Stops both workers immediately, discarding queued speech.
    pub fn abort(mut self) {
        drop(self.voice_tx.take());
        self.abort_workers();
    }

    fn abort_workers(&self) {
        self.synthesis.abort();
        self.playback.abort();
    }
}

async fn run_synthesis<S: SpeechSynthesizer>(
    synthesizer: S,
    mut voice_rx: UnboundedReceiver<VoiceTask>,
    audio_tx: UnboundedSender<AudioTask>,
) {
    debug!("started");
    while let Some(task) = voice_rx.recv().await {
        trace!("synthesizing {:?}", task.text);
        let audio = match synthesizer.synthesize(&task).await {
            Ok(audio) => audio,
            Err(err) => {
                warn!("dropped sentence {:?}: {err:#}", task.text);
                continue;
            }
        };
        if audio_tx.send(audio).is_err() {
            warn!("playback worker is gone");
            break;
        }
    }
    debug!("will terminate");
}

async fn run_playback<P: AudioPlayer>(
    player: P,
    mut audio_rx: UnboundedReceiver<AudioTask>,
) {
    debug!("started");
    while let Some(audio) = audio_rx.recv().await {
        trace!("playing {}", audio.path.display());
        if let Err(err) = player.play(&audio).await {
            warn!("failed to play {}: {err:#}", audio.path.display());
        }
        if audio.delete_after_play {
            if let Err(err) = tokio::fs::remove_file(&audio.path).await {
                warn!("failed to remove {}: {err}", audio.path.display());
            }
        }
    }
    debug!("will terminate");
}
