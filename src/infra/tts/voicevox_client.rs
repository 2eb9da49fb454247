// =============================================================================
// VOICEVOX CLIENT - speech-engine HTTP integration
// =============================================================================
//
// Implements the `SpeechSynthesizer` trait against a VOICEVOX-compatible
// engine (https://voicevox.github.io/voicevox_engine/api/). The engine owns
// the voice models and pronunciation dictionary; this client only drives its
// two-step synthesis protocol:
//
// 1. `POST /audio_query?text=...&speaker=<style>` builds an engine-side
//    synthesis query for the text.
// 2. `POST /synthesis?speaker=<style>` with that query renders the WAV.
//
// The numeric `speaker` style id selects the voice/timbre and is fixed once
// at startup.

use crate::core::speech::SpeechSynthesizer;
use async_trait::async_trait;
use reqwest::Client;
use std::error::Error;

pub const DEFAULT_ENGINE_URL: &str = "http://127.0.0.1:50021";

pub struct VoicevoxClient {
    client: Client,
    base_url: String,
    style_id: u32,
}

impl VoicevoxClient {
    pub fn new(base_url: impl Into<String>, style_id: u32) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            style_id,
        }
    }

    /// Readiness probe. The engine answers `GET /version` once its models and
    /// dictionary are loaded; callers treat a failure here as fatal at
    /// startup.
    pub async fn version(&self) -> Result<String, Box<dyn Error + Send + Sync>> {
        let response = self
            .client
            .get(format!("{}/version", self.base_url))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(format!("VOICEVOX engine error: {}", response.status()).into());
        }

        let version: String = response.json().await?;
        Ok(version)
    }
}

#[async_trait]
impl SpeechSynthesizer for VoicevoxClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>> {
        let speaker = self.style_id.to_string();

        let response = self
            .client
            .post(format!("{}/audio_query", self.base_url))
            .query(&[("text", text), ("speaker", speaker.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("VOICEVOX audio_query failed: {} - {}", status, body).into());
        }

        // The query document is engine-internal; pass it back untouched.
        let query: serde_json::Value = response.json().await?;

        let response = self
            .client
            .post(format!("{}/synthesis", self.base_url))
            .query(&[("speaker", speaker.as_str())])
            .json(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("VOICEVOX synthesis failed: {} - {}", status, body).into());
        }

        let wav = response.bytes().await?;
        tracing::debug!(
            bytes = wav.len(),
            chars = text.chars().count(),
            "VOICEVOX synthesis complete"
        );
        Ok(wav.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_base_url() {
        let client = VoicevoxClient::new("http://localhost:50021/", 3);

        assert_eq!(client.base_url, "http://localhost:50021");
        assert_eq!(client.style_id, 3);
    }

    #[test]
    fn test_default_engine_url_has_no_trailing_slash() {
        let client = VoicevoxClient::new(DEFAULT_ENGINE_URL, 0);

        assert_eq!(client.base_url, DEFAULT_ENGINE_URL);
    }
}
