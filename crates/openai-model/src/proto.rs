use scenechat_model::{ModelMessage, ModelRequest};
use serde::{Deserialize, Serialize};

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Choice {
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
}

/// An error object embedded in the event stream.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub r#type: Option<String>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    // `ModelMessage` already serializes as `{"role", "content"}`.
    messages: Vec<ModelMessage>,
    temperature: f32,
    top_p: f32,
    presence_penalty: f32,
    frequency_penalty: f32,
    stream: bool,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(
    req: &ModelRequest,
    config: &OpenAIConfig,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: req.model.clone().unwrap_or_else(|| config.model.clone()),
        messages: req.messages.clone(),
        temperature: req.sampling.temperature,
        top_p: req.sampling.top_p,
        presence_penalty: req.sampling.presence_penalty,
        frequency_penalty: req.sampling.frequency_penalty,
        stream: true,
    }
}

#[cfg(test)]
mod tests {
    use scenechat_model::SamplingOptions;
    use serde_json::json;

    use super::*;
    use crate::OpenAIConfigBuilder;

    #[test]
    fn test_create_request() {
        let request = ModelRequest {
            messages: vec![
                ModelMessage::System("Write scripts.".to_owned()),
                ModelMessage::User("Make a cube".to_owned()),
            ],
            model: None,
            sampling: SamplingOptions {
                temperature: 0.5,
                top_p: 1.0,
                presence_penalty: 0.0,
                frequency_penalty: 0.25,
            },
        };
        let config = OpenAIConfigBuilder::with_api_key("xxx")
            .with_model("custom")
            .build();
        let payload =
            serde_json::to_value(create_request(&request, &config)).unwrap();
        assert_eq!(
            payload,
            json!({
                "model": "custom",
                "messages": [
                    {"role": "system", "content": "Write scripts."},
                    {"role": "user", "content": "Make a cube"},
                ],
                "temperature": 0.5,
                "top_p": 1.0,
                "presence_penalty": 0.0,
                "frequency_penalty": 0.25,
                "stream": true,
            })
        );
    }

    #[test]
    fn test_request_model_override() {
        let request = ModelRequest {
            model: Some("gpt-4o".to_owned()),
            ..Default::default()
        };
        let config = OpenAIConfigBuilder::with_api_key("xxx").build();
        assert_eq!(create_request(&request, &config).model, "gpt-4o");
    }
}
