use async_trait::async_trait;
use serde_json::json;

use reelforge_core::OpenAiSpeechConfig;
use reelforge_encode::wav;

use crate::backend::{Speech, SpeechBackend};
use crate::error::BackendError;

/// OpenAI-compatible `/v1/audio/speech` endpoint, asked for WAV output.
pub struct OpenAiSpeech {
    client: reqwest::Client,
    config: OpenAiSpeechConfig,
}

impl OpenAiSpeech {
    pub fn new(client: reqwest::Client, config: OpenAiSpeechConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl SpeechBackend for OpenAiSpeech {
    fn name(&self) -> &str {
        "openai-tts"
    }

    fn cache_tag(&self) -> String {
        format!(
            "openai_tts|{}|{}|{}",
            self.config.base_url, self.config.model, self.config.voice
        )
    }

    async fn synthesize(&self, text: &str) -> Result<Speech, BackendError> {
        let api_key = std::env::var(&self.config.api_key_env)
            .map_err(|_| BackendError::missing_credentials(&self.config.api_key_env))?;

        let base = self.config.base_url.trim_end_matches('/');
        let url = format!("{}/v1/audio/speech", base);
        let body = json!({
            "model": self.config.model,
            "input": text,
            "voice": self.config.voice,
            "response_format": "wav",
        });

        let res = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status, &text));
        }

        let bytes = res.bytes().await?.to_vec();
        let duration = wav::duration_from_bytes(&bytes)
            .ok_or_else(|| BackendError::permanent("OpenAI TTS returned a non-WAV body"))?;

        Ok(Speech {
            bytes,
            duration,
            extension: "wav",
        })
    }
}
