use anyhow::{bail, Context, Result};

pub const DEFAULT_OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo-0613";
pub const DEFAULT_BATCH_SIZE: usize = 5;

#[derive(Debug, Clone)]
pub struct Config {
    // OpenAI
    pub openai_api_key: String,
    pub openai_api_url: String,
    pub openai_model: String,

    // Persistence
    pub batch_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let batch_size = match std::env::var("TRANSLATE_BATCH_SIZE") {
            Ok(v) => v
                .parse()
                .with_context(|| format!("TRANSLATE_BATCH_SIZE is not a number: '{}'", v))?,
            Err(_) => DEFAULT_BATCH_SIZE,
        };
        if batch_size == 0 {
            bail!("TRANSLATE_BATCH_SIZE must be at least 1");
        }

        Ok(Self {
            openai_api_key: std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?,
            openai_api_url: std::env::var("OPENAI_API_URL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_API_URL.to_string()),
            openai_model: std::env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string()),
            batch_size,
        })
    }
}
