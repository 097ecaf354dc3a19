use super::tts_repository::{SynthesisError, TtsRepository};
use crate::domain::playback::PlaybackSettings;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::time::{Duration, Instant};

const SPEECH_MODEL: &str = "kokoro";
const RESPONSE_FORMAT: &str = "mp3";

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

/// OpenAI-compatible speech endpoint (`POST {endpoint}/audio/speech`)
pub struct HttpTtsRepository {
    client: reqwest::Client,
}

impl HttpTtsRepository {
    pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client })
    }

    fn url(endpoint: &str, path: &str) -> String {
        format!("{}/{}", endpoint.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl TtsRepository for HttpTtsRepository {
    async fn synthesize(&self, text: &str, settings: &PlaybackSettings) -> Result<Bytes, SynthesisError> {
        let start_time = Instant::now();
        let request = SpeechRequest {
            model: SPEECH_MODEL,
            voice: &settings.voice_id,
            input: text,
            response_format: RESPONSE_FORMAT,
        };

        tracing::debug!(
            endpoint = %settings.endpoint,
            voice = %settings.voice_id,
            text_length = text.len(),
            "Calling speech synthesis API"
        );

        let response = self
            .client
            .post(Self::url(&settings.endpoint, "audio/speech"))
            .bearer_auth(&settings.credential)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, endpoint = %settings.endpoint, "Speech synthesis request failed");
                SynthesisError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "Speech synthesis API returned an error");
            return Err(SynthesisError::Service {
                status: status.as_u16(),
            });
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::Network(e.to_string()))?;

        if audio.is_empty() {
            return Err(SynthesisError::EmptyResponse);
        }

        tracing::info!(
            voice = %settings.voice_id,
            latency_ms = start_time.elapsed().as_millis(),
            characters_count = text.chars().count(),
            audio_size_bytes = audio.len(),
            "TTS synthesis completed"
        );

        Ok(audio)
    }

    async fn check_connection(&self, settings: &PlaybackSettings) -> Result<(), SynthesisError> {
        let response = self
            .client
            .get(Self::url(&settings.endpoint, "audio/voices"))
            .bearer_auth(&settings.credential)
            .send()
            .await
            .map_err(|e| SynthesisError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SynthesisError::Service {
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}
