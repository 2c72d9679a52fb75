use std::{env, fmt::Display, str::FromStr, time::Duration};

use clap::ValueEnum;
use tracing::{error, info, warn};
use wordwave_storage::RemoteConfig;

use crate::assistant::chat::{self, ChatConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// SQLite database under the data directory
    Local,
    /// Hosted backend configured through SUPABASE_* variables
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_key: Option<String>,
    pub webhook_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub base_url: String,
    pub version: String,
}

impl Config {
    pub fn load() -> Self {
        let config = Self {
            environment: try_load("WORDWAVE_ENV", Environment::Development),
            supabase_url: optional("SUPABASE_URL").unwrap_or_default(),
            supabase_anon_key: optional("SUPABASE_ANON_KEY").unwrap_or_default(),
            supabase_service_key: optional("SUPABASE_SERVICE_ROLE_KEY"),
            webhook_url: optional("WORDWAVE_WEBHOOK_URL"),
            openai_api_key: optional("OPENAI_API_KEY"),
            openai_base_url: try_load("OPENAI_BASE_URL", chat::DEFAULT_BASE_URL.to_string()),
            openai_model: try_load("OPENAI_MODEL", chat::DEFAULT_MODEL.to_string()),
            base_url: try_load("WORDWAVE_BASE_URL", "http://localhost:3000".to_string()),
            version: try_load("WORDWAVE_VERSION", env!("CARGO_PKG_VERSION").to_string()),
        };

        if config.environment == Environment::Development {
            for missing in config.missing_backend_settings() {
                error!("Missing required environment variable: {missing}");
            }
        }
        config
    }

    pub fn missing_backend_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.supabase_url.is_empty() {
            missing.push("SUPABASE_URL");
        }
        if self.supabase_anon_key.is_empty() {
            missing.push("SUPABASE_ANON_KEY");
        }
        missing
    }

    pub fn remote(&self, timeout: Duration) -> RemoteConfig {
        RemoteConfig {
            base_url: self.supabase_url.clone(),
            anon_key: self.supabase_anon_key.clone(),
            service_key: self.supabase_service_key.clone(),
            timeout,
        }
    }

    pub fn chat(&self) -> ChatConfig {
        ChatConfig {
            api_key: self.openai_api_key.clone(),
            base_url: self.openai_base_url.clone(),
            model: self.openai_model.clone(),
        }
    }
}

/// Defaults used by tests and local runs without any environment.
impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Test,
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_service_key: None,
            webhook_url: None,
            openai_api_key: None,
            openai_base_url: chat::DEFAULT_BASE_URL.to_string(),
            openai_model: chat::DEFAULT_MODEL.to_string(),
            base_url: "http://localhost:3000".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

fn optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => {
            warn!("Environment variable {key} not found");
            None
        }
    }
}

fn try_load<T: FromStr>(key: &str, default: T) -> T
where
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value: {e}, using default");
            default
        }),
        Err(_) => {
            info!("{key} not set, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_names() {
        assert_eq!("Production".parse(), Ok(Environment::Production));
        assert_eq!("dev".parse(), Ok(Environment::Development));
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn reports_missing_backend_settings() {
        let mut config = Config::default();
        assert_eq!(
            config.missing_backend_settings(),
            vec!["SUPABASE_URL", "SUPABASE_ANON_KEY"]
        );

        config.supabase_url = "https://x.supabase.co".into();
        config.supabase_anon_key = "anon".into();
        assert!(config.missing_backend_settings().is_empty());
        assert_eq!(config.remote(Duration::from_secs(5)).anon_key, "anon");
    }
}
