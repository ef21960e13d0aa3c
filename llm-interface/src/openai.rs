use crate::{
    retry_after_secs, status_error, transport_error, LlmProvider, VoiceProvider, REQUEST_TIMEOUT,
};
use async_trait::async_trait;
use netia_core::{CoreError, LlmConfig, LlmError};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
const PROVIDER: &str = "openai";

/// OpenAI chat completions plus the speech and transcription endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    tts_model: String,
    transcription_model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, CoreError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: OPENAI_API_URL.to_string(),
            model: model.into(),
            max_tokens: 200,
            temperature: 0.7,
            tts_model: "tts-1".to_string(),
            transcription_model: "whisper-1".to_string(),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, CoreError> {
        let mut provider = Self::new(config.api_key.clone(), config.model())?
            .with_generation(config.max_tokens, config.temperature)
            .with_audio_models(&config.tts_model, &config.transcription_model);
        if let Some(base_url) = &config.base_url {
            provider = provider.with_base_url(base_url);
        }
        Ok(provider)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_generation(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn with_audio_models(mut self, tts_model: &str, transcription_model: &str) -> Self {
        self.tts_model = tts_model.to_string();
        self.transcription_model = transcription_model.to_string();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn check(&self, response: reqwest::Response, model: &str) -> Result<reqwest::Response, CoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let retry_after = retry_after_secs(response.headers());
        let body = response.text().await.unwrap_or_default();
        tracing::warn!("OpenAI request failed with {}: {}", status, body);
        Err(status_error(PROVIDER, model, status, retry_after, &body))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, CoreError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        let response = self.check(response, &self.model).await?;

        let body: ChatResponse = response.json().await.map_err(|_| {
            CoreError::Llm(LlmError::InvalidResponseFormat {
                provider: PROVIDER.to_string(),
            })
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                CoreError::Llm(LlmError::EmptyResponse {
                    provider: PROVIDER.to_string(),
                })
            })
    }
}

#[async_trait]
impl VoiceProvider for OpenAiProvider {
    async fn synthesize_speech(&self, text: &str, voice: &str) -> Result<Vec<u8>, CoreError> {
        let request = SpeechRequest {
            model: &self.tts_model,
            voice,
            input: text,
        };
        let response = self
            .client
            .post(self.endpoint("audio/speech"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        let response = self.check(response, &self.tts_model).await?;

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(CoreError::Llm(LlmError::EmptyResponse {
                provider: PROVIDER.to_string(),
            }));
        }
        Ok(bytes.to_vec())
    }

    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<String, CoreError> {
        let part = Part::bytes(audio)
            .file_name(file_name.to_string())
            .mime_str(audio_mime(file_name))?;
        let form = Form::new()
            .part("file", part)
            .text("model", self.transcription_model.clone())
            .text("language", "en");

        let response = self
            .client
            .post(self.endpoint("audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        let response = self.check(response, &self.transcription_model).await?;

        let body: TranscriptionResponse = response.json().await.map_err(|_| {
            CoreError::Llm(LlmError::InvalidResponseFormat {
                provider: PROVIDER.to_string(),
            })
        })?;
        Ok(body.text.trim().to_string())
    }
}

fn audio_mime(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "mp3" | "mpeg" | "mpga" => "audio/mpeg",
        "m4a" | "mp4" => "audio/mp4",
        "ogg" | "oga" => "audio/ogg",
        "webm" => "audio/webm",
        "flac" => "audio/flac",
        _ => "audio/wav",
    }
}
