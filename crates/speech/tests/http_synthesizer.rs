use scenechat_core::voice::{SpeechSynthesizer, VoiceParams, VoiceTask};
use scenechat_speech::{HttpSpeechSynthesizer, SpeechConfig};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn task(text: &str) -> VoiceTask {
    VoiceTask {
        text: text.to_owned(),
        params: VoiceParams {
            speaker_id: 3,
            speed: 1.5,
            ..Default::default()
        },
    }
}

#[tokio::test]
async fn test_synthesizes_to_file() {
    let server = MockServer::start().await;
    let output = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/audio_query"))
        .and(query_param("text", "Hello."))
        .and(query_param("speaker", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accent_phrases": [],
            "speedScale": 1.0,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/synthesis"))
        .and(query_param("speaker", "3"))
        .and(body_partial_json(json!({
            "accent_phrases": [],
            "speedScale": 1.5,
            "volumeScale": 1.0,
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(b"RIFF....WAVE".to_vec(), "audio/wav"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let synthesizer = HttpSpeechSynthesizer::new(
        SpeechConfig::new(output.path().join("voice"))
            .with_base_url(server.uri()),
    );
    let audio = synthesizer.synthesize(&task("Hello.")).await.unwrap();

    assert!(audio.delete_after_play);
    let voice_dir = output.path().join("voice");
    assert_eq!(audio.path.parent(), Some(voice_dir.as_path()));
    assert_eq!(
        audio.path.extension().and_then(|ext| ext.to_str()),
        Some("wav")
    );
    assert_eq!(std::fs::read(&audio.path).unwrap(), b"RIFF....WAVE");
}

#[tokio::test]
async fn test_engine_error() {
    let server = MockServer::start().await;
    let output = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .and(path("/audio_query"))
        .respond_with(ResponseTemplate::new(422))
        .mount(&server)
        .await;

    let synthesizer = HttpSpeechSynthesizer::new(
        SpeechConfig::new(output.path()).with_base_url(server.uri()),
    );
    let err = synthesizer.synthesize(&task("Hello.")).await.unwrap_err();
    assert!(format!("{err:#}").contains("audio query rejected"));
    assert_eq!(std::fs::read_dir(output.path()).unwrap().count(), 0);
}
