use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub provider_api_url: String,
    pub price_api_url: String,
    pub fx_api_url: String,
    /// Reference fiat currency all portfolio P/L is reported in.
    pub reference_currency: String,
    /// Upper bound on any single price/FX feed request.
    pub feed_timeout_ms: u64,
    /// Shared secret for webhook signature checks; unsigned webhooks are
    /// accepted when unset.
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let provider_api_url = env_map
            .get("PROVIDER_API_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("PROVIDER_API_URL".to_string()))?;

        let price_api_url = env_map
            .get("PRICE_API_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("PRICE_API_URL".to_string()))?;

        let fx_api_url = env_map
            .get("FX_API_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("FX_API_URL".to_string()))?;

        let reference_currency = env_map
            .get("REFERENCE_CURRENCY")
            .cloned()
            .unwrap_or_else(|| "AUD".to_string());
        if reference_currency.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "REFERENCE_CURRENCY".to_string(),
                "must not be empty".to_string(),
            ));
        }

        let feed_timeout_ms = env_map
            .get("FEED_TIMEOUT_MS")
            .map(|s| s.as_str())
            .unwrap_or("5000")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "FEED_TIMEOUT_MS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?;

        let webhook_secret = env_map
            .get("WEBHOOK_SECRET")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Config {
            port,
            database_path,
            provider_api_url,
            price_api_url,
            fx_api_url,
            reference_currency,
            feed_timeout_ms,
            webhook_secret,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map.insert(
            "PROVIDER_API_URL".to_string(),
            "https://provider.example".to_string(),
        );
        map.insert(
            "PRICE_API_URL".to_string(),
            "https://prices.example".to_string(),
        );
        map.insert("FX_API_URL".to_string(), "https://fx.example".to_string());
        map
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.reference_currency, "AUD");
        assert_eq!(config.feed_timeout_ms, 5000);
        assert!(config.webhook_secret.is_none());
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        match Config::from_env_map(env_map) {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_missing_provider_api_url() {
        let mut env_map = setup_required_env();
        env_map.remove("PROVIDER_API_URL");
        match Config::from_env_map(env_map) {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "PROVIDER_API_URL"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_missing_feed_urls() {
        for key in ["PRICE_API_URL", "FX_API_URL"] {
            let mut env_map = setup_required_env();
            env_map.remove(key);
            match Config::from_env_map(env_map) {
                Err(ConfigError::MissingEnv(s)) => assert_eq!(s, key),
                _ => panic!("Expected MissingEnv error"),
            }
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_feed_timeout() {
        let mut env_map = setup_required_env();
        env_map.insert("FEED_TIMEOUT_MS".to_string(), "soon".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "FEED_TIMEOUT_MS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_blank_webhook_secret_treated_as_unset() {
        let mut env_map = setup_required_env();
        env_map.insert("WEBHOOK_SECRET".to_string(), "   ".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert!(config.webhook_secret.is_none());
    }
}
