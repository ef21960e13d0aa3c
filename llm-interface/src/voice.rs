use crate::{LlmProvider, VoiceProvider};
use netia_core::{CoreError, ErrorExt};
use std::sync::Arc;

pub const VOICE_FALLBACK_RESPONSE: &str = "I apologize, but I couldn't process your request right now. Please try again or visit our website for assistance.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceReply {
    pub transcription: String,
    pub text: String,
    pub audio: Vec<u8>,
}

/// A failed exchange, with whatever was transcribed before the failing step.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct VoiceFailure {
    pub transcription: Option<String>,
    #[source]
    pub error: CoreError,
}

impl VoiceFailure {
    fn before_transcription(error: CoreError) -> Self {
        Self {
            transcription: None,
            error,
        }
    }
}

/// Transcribe, answer, speak.
pub struct VoiceAssistant {
    llm: Arc<dyn LlmProvider>,
    speech: Arc<dyn VoiceProvider>,
    voice: String,
}

impl VoiceAssistant {
    pub fn new(llm: Arc<dyn LlmProvider>, speech: Arc<dyn VoiceProvider>) -> Self {
        Self {
            llm,
            speech,
            voice: "alloy".to_string(),
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    /// Runs one voice exchange. Transcription and synthesis errors propagate;
    /// a failed completion is replaced by a spoken apology. A synthesis
    /// failure still carries the transcription.
    pub async fn process_voice_message(
        &self,
        audio: Vec<u8>,
        file_name: &str,
        context: &str,
    ) -> Result<VoiceReply, VoiceFailure> {
        if audio.is_empty() {
            return Err(VoiceFailure::before_transcription(CoreError::InvalidInput {
                message: "audio clip is empty".to_string(),
            }));
        }

        let transcription = self
            .speech
            .transcribe(audio, file_name)
            .await
            .map_err(VoiceFailure::before_transcription)?;
        if transcription.trim().is_empty() {
            return Err(VoiceFailure::before_transcription(CoreError::InvalidInput {
                message: "no speech detected in audio clip".to_string(),
            }));
        }
        tracing::info!("Transcribed {} characters from {}", transcription.len(), file_name);

        let text = match self
            .llm
            .complete(&voice_system_prompt(context), &transcription)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                e.log_warn();
                VOICE_FALLBACK_RESPONSE.to_string()
            }
        };

        let audio = match self.speech.synthesize_speech(&text, &self.voice).await {
            Ok(audio) => audio,
            Err(error) => {
                return Err(VoiceFailure {
                    transcription: Some(transcription),
                    error,
                })
            }
        };
        Ok(VoiceReply {
            transcription,
            text,
            audio,
        })
    }
}

pub fn voice_system_prompt(context: &str) -> String {
    format!(
        "You are Netia, an AI receptionist with natural voice capabilities. You are:
- Professional and friendly in tone
- Available 24/7
- Capable of handling voice conversations naturally
- Focused on providing helpful responses

Context: {context}

Respond naturally as if you're having a voice conversation. \
Keep responses conversational and appropriate for voice delivery."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use netia_core::LlmError;
    use std::sync::Mutex;

    struct FakeLlm {
        fail: bool,
    }

    #[async_trait]
    impl LlmProvider for FakeLlm {
        fn name(&self) -> &str {
            "fake"
        }

        async fn complete(&self, system: &str, user: &str) -> Result<String, CoreError> {
            assert!(system.contains("Context: dental clinic"));
            if self.fail {
                return Err(CoreError::Llm(LlmError::ServiceUnavailable {
                    provider: "fake".to_string(),
                }));
            }
            Ok(format!("You said: {user}"))
        }
    }

    #[derive(Default)]
    struct FakeSpeech {
        spoken: Mutex<Vec<(String, String)>>,
        fail_synthesis: bool,
    }

    #[async_trait]
    impl VoiceProvider for FakeSpeech {
        async fn synthesize_speech(&self, text: &str, voice: &str) -> Result<Vec<u8>, CoreError> {
            if self.fail_synthesis {
                return Err(CoreError::Llm(LlmError::ServiceUnavailable {
                    provider: "fake-tts".to_string(),
                }));
            }
            self.spoken
                .lock()
                .unwrap()
                .push((text.to_string(), voice.to_string()));
            Ok(text.as_bytes().to_vec())
        }

        async fn transcribe(&self, audio: Vec<u8>, _file_name: &str) -> Result<String, CoreError> {
            Ok(String::from_utf8_lossy(&audio).to_string())
        }
    }

    #[tokio::test]
    async fn test_voice_round_trip() {
        let speech = Arc::new(FakeSpeech::default());
        let assistant =
            VoiceAssistant::new(Arc::new(FakeLlm { fail: false }), speech.clone()).with_voice("nova");

        let reply = assistant
            .process_voice_message(b"book a cleaning".to_vec(), "clip.wav", "dental clinic")
            .await
            .unwrap();

        assert_eq!(reply.transcription, "book a cleaning");
        assert_eq!(reply.text, "You said: book a cleaning");
        assert_eq!(reply.audio, b"You said: book a cleaning".to_vec());
        assert_eq!(speech.spoken.lock().unwrap()[0].1, "nova");
    }

    #[tokio::test]
    async fn test_completion_failure_speaks_apology() {
        let speech = Arc::new(FakeSpeech::default());
        let assistant = VoiceAssistant::new(Arc::new(FakeLlm { fail: true }), speech);
        let reply = assistant
            .process_voice_message(b"hello".to_vec(), "clip.wav", "dental clinic")
            .await
            .unwrap();
        assert_eq!(reply.text, VOICE_FALLBACK_RESPONSE);
    }

    #[tokio::test]
    async fn test_empty_audio_is_rejected() {
        let assistant = VoiceAssistant::new(
            Arc::new(FakeLlm { fail: false }),
            Arc::new(FakeSpeech::default()),
        );
        let err = assistant
            .process_voice_message(Vec::new(), "clip.wav", "dental clinic")
            .await
            .unwrap_err();
        assert!(matches!(err.error, CoreError::InvalidInput { .. }));
        assert_eq!(err.transcription, None);

        let err = assistant
            .process_voice_message(b"   ".to_vec(), "clip.wav", "dental clinic")
            .await
            .unwrap_err();
        assert!(matches!(err.error, CoreError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_synthesis_failure_keeps_transcription() {
        let speech = Arc::new(FakeSpeech {
            fail_synthesis: true,
            ..FakeSpeech::default()
        });
        let assistant = VoiceAssistant::new(Arc::new(FakeLlm { fail: false }), speech);

        let err = assistant
            .process_voice_message(b"are you open sunday".to_vec(), "clip.wav", "dental clinic")
            .await
            .unwrap_err();
        assert_eq!(err.transcription.as_deref(), Some("are you open sunday"));
        assert!(matches!(
            err.error,
            CoreError::Llm(LlmError::ServiceUnavailable { .. })
        ));
    }
}
