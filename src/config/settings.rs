//! Settings for the chat endpoint, turn-taking and the console client,
//! persisted as TOML.
//!
//! Every section is `#[serde(default)]`, so a `settings.toml` only needs the
//! keys that differ from the defaults.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// ChatProvider
// ---------------------------------------------------------------------------

/// Selects the wire format spoken to the chat endpoint.
///
/// | Variant            | Request                         | Reply field                    |
/// |--------------------|---------------------------------|--------------------------------|
/// | `Relay`            | `POST {base_url}/chat`          | `reply`                        |
/// | `OpenAiCompatible` | `POST {base_url}/v1/chat/completions` | `choices[0].message.content` |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ChatProvider {
    /// The conversation relay backend: `{"message": …}` in, `{"reply": …}` out.
    Relay,
    /// Any OpenAI-compatible REST API (OpenAI, Groq, Ollama, LM Studio …).
    OpenAiCompatible,
}

impl Default for ChatProvider {
    fn default() -> Self {
        Self::Relay
    }
}

// ---------------------------------------------------------------------------
// HistoryConfig
// ---------------------------------------------------------------------------

/// Rolling history sent along with each message (OpenAI-compatible only).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of previous exchanges kept in the rolling window.
    pub window_size: usize,
    /// Seconds of inactivity after which the window is cleared.
    pub reset_silence_secs: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window_size: 6,
            reset_silence_secs: 300,
        }
    }
}

// ---------------------------------------------------------------------------
// ChatConfig
// ---------------------------------------------------------------------------

/// Settings for the remote chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Which wire format to use.
    pub provider: ChatProvider,
    /// Base URL of the endpoint, without a trailing slash.
    pub base_url: String,
    /// API key; `None` or empty means no `Authorization` header.
    pub api_key: Option<String>,
    /// Model identifier (OpenAI-compatible provider only).
    pub model: String,
    /// Sampling temperature (OpenAI-compatible provider only).
    pub temperature: f32,
    /// Maximum seconds to wait for a reply before giving up.
    pub timeout_secs: u64,
    /// System prompt sent ahead of the conversation (OpenAI-compatible only).
    pub system_prompt: String,
    /// Assistant text used when a successful response carries no reply.
    /// `None` turns such responses into an error instead.
    #[serde(default)]
    pub fallback_reply: Option<String>,
    /// Rolling history window.
    pub history: HistoryConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: ChatProvider::default(),
            base_url: "http://localhost:5000/api".into(),
            api_key: None,
            model: "gpt-4o-mini".into(),
            temperature: 0.7,
            timeout_secs: 30,
            system_prompt: "You are a friendly English communication trainer. \
                            Keep replies short and conversational, and gently \
                            correct mistakes in what the user says."
                .into(),
            fallback_reply: Some("Sorry, I didn't get that.".into()),
            history: HistoryConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// ConversationConfig
// ---------------------------------------------------------------------------

/// Turn-taking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Quiet interval after the last transcript change before the utterance
    /// is considered finished.
    pub silence_threshold_ms: u64,
    /// Delay before the single automatic retry after a rate-limit.
    pub backoff_secs: u64,
    /// Locale handed to the capture source and the output sink.
    pub locale: String,
    /// Re-arm capture automatically when playback of a reply completes.
    pub auto_resume: bool,
}

impl ConversationConfig {
    pub fn silence_threshold(&self) -> Duration {
        Duration::from_millis(self.silence_threshold_ms)
    }

    pub fn backoff_delay(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            silence_threshold_ms: 3_000,
            backoff_secs: 30,
            locale: "en-US".into(),
            auto_resume: true,
        }
    }
}

// ---------------------------------------------------------------------------
// ConsoleConfig
// ---------------------------------------------------------------------------

/// Terminal client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Speaking rate used to estimate how long a reply takes to play.
    pub words_per_minute: u32,
    /// Prefix every printed turn with its local time.
    pub show_timestamps: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            words_per_minute: 170,
            show_timestamps: true,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use speakflow::config::AppConfig;
///
/// let mut config = AppConfig::load()?;
/// config.conversation.backoff_secs = 60;
/// config.save()?;
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub chat: ChatConfig,
    pub conversation: ConversationConfig,
    pub console: ConsoleConfig,
}

impl AppConfig {
    /// Load `settings.toml` from [`AppPaths`]; a missing file yields the
    /// defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("config: {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    /// Write `settings.toml` to [`AppPaths`], creating the directory.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let raw = toml::to_string_pretty(self).context("serialising settings")?;
        std::fs::write(path, raw).with_context(|| format!("writing {}", path.display()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn settings_in(dir: &tempfile::TempDir) -> std::path::PathBuf {
        AppPaths::in_dir(dir.path()).settings_file
    }

    #[test]
    fn defaults_survive_a_save_and_load() {
        let dir = tempdir().unwrap();
        let path = settings_in(&dir);

        AppConfig::default().save_to(&path).unwrap();
        let loaded = AppConfig::load_from(&path).unwrap();

        assert_eq!(loaded.chat.provider, ChatProvider::Relay);
        assert_eq!(loaded.chat.base_url, "http://localhost:5000/api");
        assert_eq!(
            loaded.chat.fallback_reply.as_deref(),
            Some("Sorry, I didn't get that.")
        );
        assert_eq!(loaded.chat.history.window_size, 6);
        assert_eq!(loaded.conversation.silence_threshold_ms, 3_000);
        assert_eq!(loaded.console.words_per_minute, 170);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load_from(&settings_in(&dir)).unwrap();

        assert_eq!(config.chat.provider, ChatProvider::Relay);
        assert_eq!(config.conversation.silence_threshold_ms, 3_000);
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert!(cfg.chat.api_key.is_none());
        assert_eq!(cfg.chat.timeout_secs, 30);
        assert_eq!(cfg.conversation.silence_threshold(), Duration::from_secs(3));
        assert_eq!(cfg.conversation.backoff_delay(), Duration::from_secs(30));
        assert_eq!(cfg.conversation.locale, "en-US");
        assert!(cfg.conversation.auto_resume);
        assert!(cfg.console.show_timestamps);
    }

    #[test]
    fn modified_values_are_persisted() {
        let dir = tempdir().unwrap();
        let path = settings_in(&dir);

        let mut cfg = AppConfig::default();
        cfg.chat.provider = ChatProvider::OpenAiCompatible;
        cfg.chat.base_url = "https://api.openai.com".into();
        cfg.chat.api_key = Some("sk-test".into());
        cfg.chat.fallback_reply = None;
        cfg.conversation.backoff_secs = 60;
        cfg.conversation.locale = "en-GB".into();
        cfg.console.show_timestamps = false;
        cfg.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.chat.provider, ChatProvider::OpenAiCompatible);
        assert_eq!(loaded.chat.api_key.as_deref(), Some("sk-test"));
        assert!(loaded.chat.fallback_reply.is_none());
        assert_eq!(loaded.conversation.backoff_secs, 60);
        assert_eq!(loaded.conversation.locale, "en-GB");
        assert!(!loaded.console.show_timestamps);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = settings_in(&dir);
        std::fs::write(&path, "[conversation]\nsilence_threshold_ms = 1500\n").unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.conversation.silence_threshold_ms, 1_500);
        assert_eq!(loaded.conversation.backoff_secs, 30);
        assert_eq!(loaded.chat.base_url, "http://localhost:5000/api");
    }

    #[test]
    fn wrong_type_is_rejected_with_path() {
        let dir = tempdir().unwrap();
        let path = settings_in(&dir);
        std::fs::write(&path, "[chat]\nbase_url = 42\n").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(format!("{err}").starts_with("parsing "), "{err}");
    }
}
