//! Text-to-speech client.

use crate::voice::VoiceError;

/// Synthesizes speech from text over an HTTP API.
pub struct TextToSpeech {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    voice: String,
}

impl TextToSpeech {
    #[must_use]
    pub fn new(base_url: String, api_key: String, model: String, voice: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            model,
            voice,
        }
    }

    /// Synthesize `text` into WAV audio bytes.
    ///
    /// # Errors
    ///
    /// Returns `VoiceError::Tts` on API errors and `VoiceError::Http` on
    /// transport failures.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, VoiceError> {
        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": self.model,
                "voice": self.voice,
                "input": text,
                "response_format": "wav",
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::Tts(format!("API error {status}: {body}")));
        }

        Ok(response.bytes().await?.to_vec())
    }
}
