//! Application configuration
//!
//! Loaded once at startup from `deskpal.toml`. Every section has defaults, so
//! an empty or missing file is valid; credentials are usually supplied through
//! the environment instead of the file.

use super::orchestrator::FailedTurnPolicy;
use crate::audio::CaptureConfig;
use crate::llm::ChatConfig;
use crate::messages::HistoryPolicy;
use crate::speech::{RecognitionConfig, SynthesisConfig};
use crate::{DeskpalError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "DESKPAL_CONFIG";

const CONFIG_FILE_NAME: &str = "deskpal.toml";

/// Background job execution settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Number of worker threads
    pub workers: usize,
    /// Jobs that may wait for a worker before submissions are refused
    pub queue_capacity: usize,
    /// Upper bound on one interaction, 0 disables the limit
    pub task_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 16,
            task_timeout_secs: 120,
        }
    }
}

impl DispatchConfig {
    pub fn task_timeout(&self) -> Option<Duration> {
        (self.task_timeout_secs > 0).then(|| Duration::from_secs(self.task_timeout_secs))
    }
}

/// Window settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub title: String,
    pub width: f32,
    pub height: f32,
    pub always_on_top: bool,
    /// Closing the window minimises it; the Quit button exits
    pub minimize_on_close: bool,
    /// Prepended to replies produced by a voice interaction
    pub voice_reply_prefix: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            title: "Deskpal".to_string(),
            width: 450.0,
            height: 600.0,
            always_on_top: true,
            minimize_on_close: true,
            voice_reply_prefix: "[voice reply] ".to_string(),
        }
    }
}

/// Complete application configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// What happens to the user turn when a chat request fails
    pub failed_turn_policy: FailedTurnPolicy,
    /// Where synthesized replies are written (platform data dir when unset)
    pub output_dir: Option<PathBuf>,
    pub chat: ChatConfig,
    pub recognition: RecognitionConfig,
    pub synthesis: SynthesisConfig,
    pub capture: CaptureConfig,
    pub history: HistoryPolicy,
    pub dispatch: DispatchConfig,
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load from the default location and apply environment overrides
    ///
    /// `DESKPAL_CONFIG` must point at an existing file when set; the platform
    /// config file is optional.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::load_from(Path::new(&path))?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_from(&path)?,
                _ => {
                    info!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// `<platform config dir>/deskpal/deskpal.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("deskpal").join(CONFIG_FILE_NAME))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        info!("Loading config from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| {
            DeskpalError::ConfigError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| DeskpalError::ConfigError(format!("Invalid config: {}", e)))
    }

    /// Fill credentials from environment-style lookups
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let overrides: [(&str, &mut String); 4] = [
            ("DESKPAL_CHAT_API_KEY", &mut self.chat.api_key),
            ("DESKPAL_STT_API_KEY", &mut self.recognition.api_key),
            ("DESKPAL_TTS_APP_ID", &mut self.synthesis.app_id),
            ("DESKPAL_TTS_TOKEN", &mut self.synthesis.token),
        ];
        for (key, slot) in overrides {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                debug!("{} taken from environment", key);
                *slot = value;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(DeskpalError::ConfigError(msg.to_string()));

        if !self.chat.base_url.starts_with("http") {
            return invalid("chat.base_url must be an http(s) URL");
        }
        if self.chat.model.trim().is_empty() {
            return invalid("chat.model must not be empty");
        }
        if self.chat.timeout_secs == 0 {
            return invalid("chat.timeout_secs must be greater than 0");
        }
        if !self.capture.duration_secs.is_finite() || self.capture.duration_secs <= 0.0 {
            return invalid("capture.duration_secs must be a positive number");
        }
        if self.capture.sample_rate == 0 {
            return invalid("capture.sample_rate must be greater than 0");
        }
        if self.dispatch.workers == 0 {
            return invalid("dispatch.workers must be greater than 0");
        }
        if self.dispatch.queue_capacity == 0 {
            return invalid("dispatch.queue_capacity must be greater than 0");
        }
        if self.ui.width <= 0.0 || self.ui.height <= 0.0 {
            return invalid("ui.width and ui.height must be positive");
        }
        Ok(())
    }

    /// Directory for synthesized audio files
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("deskpal")
                .join("replies")
        })
    }

    /// Names of credentials that are still empty
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.chat.api_key.is_empty() {
            missing.push("DESKPAL_CHAT_API_KEY");
        }
        if self.synthesis.app_id.is_empty() {
            missing.push("DESKPAL_TTS_APP_ID");
        }
        if self.synthesis.token.is_empty() {
            missing.push("DESKPAL_TTS_TOKEN");
        }
        missing
    }

    pub fn with_chat(mut self, chat: ChatConfig) -> Self {
        self.chat = chat;
        self
    }

    pub fn with_history(mut self, history: HistoryPolicy) -> Self {
        self.history = history;
        self
    }

    pub fn with_failed_turn_policy(mut self, policy: FailedTurnPolicy) -> Self {
        self.failed_turn_policy = policy;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.chat.model, "deepseek-chat");
        assert_eq!(config.capture.sample_rate, 16000);
        assert_eq!(config.dispatch.workers, 4);
        assert_eq!(config.dispatch.task_timeout(), Some(Duration::from_secs(120)));
        assert_eq!(config.ui.width, 450.0);
        assert_eq!(config.failed_turn_policy, FailedTurnPolicy::Rollback);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = AppConfig::from_toml(
            r#"
failed_turn_policy = "keep"

[chat]
model = "deepseek-reasoner"

[history]
max_turns = 10

[dispatch]
task_timeout_secs = 0
"#,
        )
        .unwrap();

        assert_eq!(config.failed_turn_policy, FailedTurnPolicy::Keep);
        assert_eq!(config.chat.model, "deepseek-reasoner");
        assert_eq!(config.chat.base_url, "https://api.deepseek.com");
        assert_eq!(config.history.max_turns, Some(10));
        assert_eq!(config.dispatch.task_timeout(), None);
        assert_eq!(config.synthesis.cluster, "volcano_tts");
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            AppConfig::from_toml("[chat\nmodel = 1"),
            Err(DeskpalError::ConfigError(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DESKPAL_CHAT_API_KEY", "sk-test"),
            ("DESKPAL_TTS_TOKEN", "tok"),
            ("DESKPAL_TTS_APP_ID", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.chat.api_key, "sk-test");
        assert_eq!(config.synthesis.token, "tok");
        assert_eq!(config.synthesis.app_id, "");
        assert_eq!(config.missing_credentials(), vec!["DESKPAL_TTS_APP_ID"]);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.dispatch.workers = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.capture.duration_secs = 0.0;
        assert!(config.validate().is_err());

        let config = AppConfig::default().with_chat(ChatConfig::new("ftp://example", "k"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deskpal.toml");
        std::fs::write(&path, "[ui]\ntitle = \"Pal\"\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.ui.title, "Pal");
        assert!(AppConfig::load_from(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_output_dir_override() {
        let config = AppConfig::default().with_output_dir("/tmp/replies");
        assert_eq!(config.output_dir(), PathBuf::from("/tmp/replies"));
    }
}
