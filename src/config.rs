use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::util::{env_flag, is_local_endpoint_url};

pub const API_URL_ENV: &str = "SECTIONGEN_API_URL";
pub const API_KEY_ENV: &str = "SECTIONGEN_API_KEY";
pub const REASSEMBLE_RECORDS_ENV: &str = "SECTIONGEN_REASSEMBLE_RECORDS";
pub const EXCERPT_CHARS_ENV: &str = "SECTIONGEN_EXCERPT_CHARS";

const DEFAULT_API_URL: &str = "http://localhost:3000/api/chat/stream";
pub const DEFAULT_EXCERPT_CHARS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_url: String,
    pub api_key: Option<String>,
    /// Carry an unterminated trailing line into the next read instead of dropping it.
    pub reassemble_split_records: bool,
    pub excerpt_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            reassemble_split_records: false,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let api_url = std::env::var(API_URL_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty());
        let excerpt_chars = std::env::var(EXCERPT_CHARS_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .map(|v| v.clamp(16, 1000))
            .unwrap_or(DEFAULT_EXCERPT_CHARS);

        Ok(Self {
            api_url,
            api_key,
            reassemble_split_records: env_flag(REASSEMBLE_RECORDS_ENV, false),
            excerpt_chars,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            bail!(
                "Invalid {API_URL_ENV} '{}': expected http:// or https:// URL",
                self.api_url
            );
        }

        if !self.is_local_endpoint() && self.api_key.is_none() {
            bail!(
                "{API_KEY_ENV} is required for remote endpoint '{}'",
                self.api_url
            );
        }

        Ok(())
    }

    pub fn is_local_endpoint(&self) -> bool {
        is_local_endpoint_url(&self.api_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScopedEnv, ENV_LOCK};

    #[test]
    fn test_load_defaults_to_local_endpoint() {
        let _env_lock = ENV_LOCK.blocking_lock();
        let _env = ScopedEnv::clean();

        let config = Config::load().expect("config should load");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(config.api_key.is_none());
        assert!(!config.reassemble_split_records);
        assert_eq!(config.excerpt_chars, DEFAULT_EXCERPT_CHARS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_reads_overrides_and_clamps_excerpt() {
        let _env_lock = ENV_LOCK.blocking_lock();
        let env = ScopedEnv::clean();
        env.set(API_URL_ENV, "https://shop.example.com/api/chat/stream");
        env.set(API_KEY_ENV, "secret");
        env.set(REASSEMBLE_RECORDS_ENV, "yes");
        env.set(EXCERPT_CHARS_ENV, "4");

        let config = Config::load().expect("config should load");
        assert_eq!(config.api_url, "https://shop.example.com/api/chat/stream");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert!(config.reassemble_split_records);
        assert_eq!(config.excerpt_chars, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_api_key_is_treated_as_missing() {
        let _env_lock = ENV_LOCK.blocking_lock();
        let env = ScopedEnv::clean();
        env.set(API_URL_ENV, "https://shop.example.com/api/chat/stream");
        env.set(API_KEY_ENV, "   ");

        let config = Config::load().expect("config should load");
        assert!(config.api_key.is_none());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unparseable_excerpt_width_falls_back_to_default() {
        let _env_lock = ENV_LOCK.blocking_lock();
        let env = ScopedEnv::clean();
        env.set(EXCERPT_CHARS_ENV, "wide");

        let config = Config::load().expect("config should load");
        assert_eq!(config.excerpt_chars, DEFAULT_EXCERPT_CHARS);
    }
}
