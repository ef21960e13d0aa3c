pub mod claude;
pub mod openai;
pub mod responder;
pub mod voice;

pub use claude::ClaudeProvider;
pub use openai::OpenAiProvider;
pub use responder::ResponseGenerator;
pub use voice::{VoiceAssistant, VoiceFailure, VoiceReply};

use async_trait::async_trait;
use netia_core::{CoreError, LlmConfig, LlmError, LlmProviderKind};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;

pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A chat-completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// One system instruction plus one user turn; returns the completion text.
    async fn complete(&self, system: &str, user: &str) -> Result<String, CoreError>;
}

/// Speech synthesis and transcription backend.
#[async_trait]
pub trait VoiceProvider: Send + Sync {
    /// Returns encoded audio (MP3) for `text`.
    async fn synthesize_speech(&self, text: &str, voice: &str) -> Result<Vec<u8>, CoreError>;

    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<String, CoreError>;
}

/// Builds the completion provider selected in configuration.
pub fn provider_from_config(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, CoreError> {
    let provider: Arc<dyn LlmProvider> = match config.provider {
        LlmProviderKind::OpenAi => Arc::new(OpenAiProvider::from_config(config)?),
        LlmProviderKind::Claude => Arc::new(ClaudeProvider::from_config(config)?),
    };
    tracing::info!(
        "Using {} completion provider with model {}",
        provider.name(),
        config.model()
    );
    Ok(provider)
}

/// Maps a non-success HTTP status from an LLM API onto the error taxonomy.
pub(crate) fn status_error(
    provider: &str,
    model: &str,
    status: StatusCode,
    retry_after: Option<u64>,
    body: &str,
) -> CoreError {
    let provider = provider.to_string();
    let error = match status.as_u16() {
        401 => LlmError::InvalidApiKey { provider },
        403 => LlmError::AuthenticationFailed { provider },
        404 => LlmError::ModelNotAvailable {
            model: model.to_string(),
        },
        402 => LlmError::InsufficientCredits { provider },
        429 if body.contains("insufficient_quota") => LlmError::InsufficientCredits { provider },
        429 => LlmError::RateLimitExceeded {
            provider,
            retry_after: retry_after.unwrap_or(60),
        },
        400 | 422 => LlmError::InvalidPrompt {
            reason: netia_core::truncate_text(body, 200),
        },
        408 => LlmError::RequestTimeout { provider },
        500..=599 => LlmError::ServiceUnavailable { provider },
        code => {
            return CoreError::RequestFailed {
                message: format!("{} returned HTTP {}", provider, code),
                status_code: Some(code),
            }
        }
    };
    CoreError::Llm(error)
}

/// Transport failures: timeouts get their own variant, the rest stay network errors.
pub(crate) fn transport_error(provider: &str, error: reqwest::Error) -> CoreError {
    if error.is_timeout() {
        CoreError::Llm(LlmError::RequestTimeout {
            provider: provider.to_string(),
        })
    } else {
        CoreError::Network(error)
    }
}

pub(crate) fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .map(|secs| secs.ceil() as u64)
}
