use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Openrouter,
    Ollama,
    Openai,
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::Openrouter => write!(f, "openrouter"),
            LlmProvider::Ollama => write!(f, "ollama"),
            LlmProvider::Openai => write!(f, "openai"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: default_model(),
            base_url: String::new(),
            api_key: String::new(),
            max_tokens: default_max_tokens(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl LlmConfig {
    /// Returns the effective base_url: if the stored value is empty,
    /// fall back to the canonical URL for the configured provider.
    pub fn effective_base_url(&self) -> &str {
        if !self.base_url.is_empty() {
            return self.base_url.trim_end_matches('/');
        }
        match self.provider {
            LlmProvider::Openrouter => "https://openrouter.ai/api/v1",
            LlmProvider::Ollama => "http://localhost:11434/v1",
            LlmProvider::Openai => "https://api.openai.com/v1",
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub replies: RepliesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
    /// Public URL registered with `setWebhook` at startup, if set.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_url: default_telegram_api_url(),
            webhook_url: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

/// Fixed texts the dispatcher answers with.
#[derive(Debug, Deserialize, Clone)]
pub struct RepliesConfig {
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_about")]
    pub about: String,
    #[serde(default = "default_apology")]
    pub apology: String,
    #[serde(default = "default_inline_title")]
    pub inline_title: String,
    #[serde(default = "default_inline_description")]
    pub inline_description: String,
    #[serde(default = "default_inline_message")]
    pub inline_message: String,
}

impl Default for RepliesConfig {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            about: default_about(),
            apology: default_apology(),
            inline_title: default_inline_title(),
            inline_description: default_inline_description(),
            inline_message: default_inline_message(),
        }
    }
}

fn default_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_system_prompt() -> String {
    "You are Florence, a highly knowledgeable teacher on every subject. \
     Help people gain a deeper understanding on any topic."
        .to_string()
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_greeting() -> String {
    "Hello! I'm Florence. How may I assist you today?".to_string()
}

fn default_about() -> String {
    "Florence is your educational assistant. Ask me anything about any subject \
     and I'll help you understand it."
        .to_string()
}

fn default_apology() -> String {
    "I'm sorry, I'm having trouble processing your request right now.".to_string()
}

fn default_inline_title() -> String {
    "Ask Florence".to_string()
}

fn default_inline_description() -> String {
    "Open a private chat with Florence to get an answer.".to_string()
}

fn default_inline_message() -> String {
    "Florence answers questions in private chat. Send your question there!".to_string()
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist, then apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Overlay credentials and port from the environment. `lookup` is
    /// `std::env::var` in production.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("bot_token").or_else(|| non_empty("TELEGRAM_BOT_TOKEN")) {
            self.telegram.bot_token = token;
        }
        if let Some(key) = non_empty("LLM_API_KEY") {
            self.llm.api_key = key;
        }
        if let Some(port) = non_empty("PORT") {
            let host = self
                .server
                .listen_addr
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            self.server.listen_addr = format!("{}:{}", host, port.trim());
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!(
                "Telegram bot token is not set (use [telegram] bot_token or the bot_token environment variable)"
            );
        }
        if self.llm.model.trim().is_empty() {
            anyhow::bail!("[llm] model must not be empty");
        }
        Ok(())
    }
}
