use serde::Deserialize;
use std::env;

pub const DEFAULT_LLM_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_LLM_MAX_TOKENS: u32 = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Deserialize)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Values from .env only fill variables the process doesn't already have
        let _ = dotenv::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from defaults plus whatever `lookup` returns for the
    /// known environment variables
    pub fn from_lookup<F>(lookup: F) -> Result<Self, config::ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("llm.api_url", DEFAULT_LLM_API_URL)?
            .set_default("llm.model", DEFAULT_LLM_MODEL)?
            .set_default("llm.max_tokens", DEFAULT_LLM_MAX_TOKENS)?
            .set_default("logging.level", "info")?;

        if let Some(host) = lookup("HOST") {
            builder = builder.set_override("server.host", host)?;
        }

        if let Some(port) = lookup("PORT") {
            builder = builder.set_override("server.port", port.parse::<u16>().unwrap_or(3000))?;
        }

        if let Some(api_url) = lookup("LLM_API_URL") {
            builder = builder.set_override("llm.api_url", api_url)?;
        }

        if let Some(api_key) = lookup("LLM_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            builder = builder.set_override("llm.api_key", Some(api_key))?;
        }

        if let Some(model) = lookup("LLM_MODEL") {
            builder = builder.set_override("llm.model", model)?;
        }

        if let Some(max_tokens) = lookup("LLM_MAX_TOKENS") {
            builder = builder.set_override(
                "llm.max_tokens",
                max_tokens.parse::<u32>().unwrap_or(DEFAULT_LLM_MAX_TOKENS),
            )?;
        }

        if let Some(log_level) = lookup("RUST_LOG") {
            builder = builder.set_override("logging.level", log_level)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
