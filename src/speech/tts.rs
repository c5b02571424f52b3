//! Text-to-speech through the Volcengine (ByteDance openspeech) HTTP API

use crate::llm::client::transport_error;
use crate::{DeskpalError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Status code the service reports for a successful synthesis
const SUCCESS_CODE: i64 = 3000;

/// Turns reply text into an encoded audio file
pub trait SpeechSynthesizer: Send + Sync {
    /// Returns the encoded audio (WAV by default)
    fn synthesize(&self, text: &str, timeout: Duration) -> Result<Vec<u8>>;
}

/// Configuration for speech synthesis
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub endpoint: String,
    pub app_id: String,
    pub token: String,
    pub cluster: String,
    pub uid: String,
    pub voice_type: String,
    /// Audio container requested from the service, also used as file extension
    pub encoding: String,
    pub speed_ratio: f32,
    pub timeout_secs: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://openspeech.bytedance.com/api/v1/tts".to_string(),
            app_id: String::new(),
            token: String::new(),
            cluster: "volcano_tts".to_string(),
            uid: "deskpal".to_string(),
            voice_type: "zh_female_wanwanxiaohe_moon_bigtts".to_string(),
            encoding: "wav".to_string(),
            speed_ratio: 1.0,
            timeout_secs: 30,
        }
    }
}

impl SynthesisConfig {
    pub fn new(app_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            token: token.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Request body for one synthesis call
    pub fn request_body(&self, text: &str, request_id: &str) -> Value {
        json!({
            "app": {
                "appid": self.app_id,
                "token": self.token,
                "cluster": self.cluster,
            },
            "user": { "uid": self.uid },
            "audio": {
                "voice_type": self.voice_type,
                "encoding": self.encoding,
                "speed_ratio": self.speed_ratio,
            },
            "request": {
                "reqid": request_id,
                "text": text,
                "operation": "query",
            }
        })
    }
}

#[derive(Deserialize)]
struct SynthesisResponse {
    code: Option<i64>,
    message: Option<String>,
    data: Option<String>,
}

/// Decode the base64 audio carried in a synthesis response
pub fn parse_synthesis(payload: &str) -> Result<Vec<u8>> {
    let response: SynthesisResponse = serde_json::from_str(payload)
        .map_err(|e| DeskpalError::MalformedResponse(format!("Invalid synthesis JSON: {}", e)))?;

    if let Some(code) = response.code {
        if code != SUCCESS_CODE {
            return Err(DeskpalError::SynthesisError(format!(
                "code {}: {}",
                code,
                response.message.unwrap_or_default()
            )));
        }
    }

    let data = response
        .data
        .ok_or_else(|| DeskpalError::MalformedResponse("Synthesis response has no data".into()))?;
    BASE64
        .decode(data.trim())
        .map_err(|e| DeskpalError::MalformedResponse(format!("Invalid base64 audio: {}", e)))
}

/// Blocking client for the Volcengine TTS endpoint
pub struct VolcengineSynthesizer {
    http: Client,
    config: SynthesisConfig,
}

impl VolcengineSynthesizer {
    pub fn new(config: SynthesisConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DeskpalError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }
}

impl SpeechSynthesizer for VolcengineSynthesizer {
    fn synthesize(&self, text: &str, timeout: Duration) -> Result<Vec<u8>> {
        let request_id = Uuid::new_v4().to_string();
        debug!("Synthesis request {} ({} chars)", request_id, text.chars().count());

        let response = self
            .http
            .post(&self.config.endpoint)
            // The service expects a semicolon after the scheme
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer; {}", self.config.token),
            )
            .timeout(timeout)
            .json(&self.config.request_body(text, &request_id))
            .send()
            .map_err(|e| transport_error(e, timeout))?;

        let status = response.status();
        let body = response.text().map_err(|e| transport_error(e, timeout))?;
        if !status.is_success() {
            warn!("Synthesis request returned HTTP {}", status);
            return Err(DeskpalError::SynthesisError(format!(
                "HTTP {}: {}",
                status,
                body.trim()
            )));
        }

        parse_synthesis(&body)
    }
}
