use std::path::PathBuf;

use axum::http::HeaderMap;
use log::{info, warn};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Request headers through which a client can bring its own credentials.
pub const API_KEY_HEADER: &str = "x-gemini-api-key";
pub const MODEL_HEADER: &str = "x-gemini-model";

/// Server-side configuration, loaded once at startup from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub api_key: Option<String>,
    pub model: String,
    pub rules_dir: PathBuf,
}

impl ServerConfig {
    /// Read configuration from the process environment. A `.env` file is
    /// honoured when present; every variable has a usable default except the
    /// API key, which may also arrive per request via headers.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("PORT is not a valid port number, using {}", DEFAULT_PORT);
                DEFAULT_PORT
            }),
            Err(_) => DEFAULT_PORT,
        };

        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.is_empty());
        if api_key.is_some() {
            info!("GEMINI_API_KEY loaded from environment");
        } else {
            warn!("GEMINI_API_KEY not set; clients must supply their own key");
        }

        let model = std::env::var("GEMINI_MODEL")
            .ok()
            .filter(|model| !model.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let rules_dir = std::env::var("RULES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("rules"));

        Self {
            port,
            api_key,
            model,
            rules_dir,
        }
    }
}

/// Per-request credential overrides taken from headers. A caller-supplied
/// key/model wins over the server environment.
#[derive(Debug, Clone, Default)]
pub struct RequestOverrides {
    pub api_key: Option<String>,
    pub model: Option<String>,
}

impl RequestOverrides {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Self {
            api_key: read(API_KEY_HEADER),
            model: read(MODEL_HEADER),
        }
    }

    /// Resolve the effective key and model for one request.
    pub fn resolve<'a>(&'a self, config: &'a ServerConfig) -> (Option<&'a str>, &'a str) {
        let key = self
            .api_key
            .as_deref()
            .or(config.api_key.as_deref());
        let model = self.model.as_deref().unwrap_or(&config.model);
        (key, model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config_with_key() -> ServerConfig {
        ServerConfig {
            port: DEFAULT_PORT,
            api_key: Some("server-key".to_string()),
            model: DEFAULT_MODEL.to_string(),
            rules_dir: PathBuf::from("rules"),
        }
    }

    #[test]
    fn header_overrides_win_over_environment() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("client-key"));
        headers.insert(MODEL_HEADER, HeaderValue::from_static("gemini-2.5-pro"));

        let overrides = RequestOverrides::from_headers(&headers);
        let config = config_with_key();
        let (key, model) = overrides.resolve(&config);
        assert_eq!(key, Some("client-key"));
        assert_eq!(model, "gemini-2.5-pro");
    }

    #[test]
    fn missing_headers_fall_back_to_server_config() {
        let overrides = RequestOverrides::from_headers(&HeaderMap::new());
        let config = config_with_key();
        let (key, model) = overrides.resolve(&config);
        assert_eq!(key, Some("server-key"));
        assert_eq!(model, DEFAULT_MODEL);
    }

    #[test]
    fn empty_header_values_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static(""));
        let overrides = RequestOverrides::from_headers(&headers);
        assert!(overrides.api_key.is_none());
    }
}
