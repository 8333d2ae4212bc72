//! Shared HTTP plumbing for the OpenWeather endpoints.

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use skycast_core::{ApiConfig, ReqwestErrorExt};

use crate::types::WeatherError;

const USER_AGENT: &str = concat!("Skycast/", env!("CARGO_PKG_VERSION"));
const MAX_ERROR_BODY: usize = 200;

/// Connection details shared by the geocoder and the weather provider.
#[derive(Debug, Clone)]
pub struct ApiEndpoint {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
}

impl ApiEndpoint {
    pub fn new(base_url: &str, api_key: &str, config: &ApiConfig) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Build from config, failing when no API key is available.
    pub fn from_config(config: &ApiConfig) -> Result<Self, WeatherError> {
        let api_key = config
            .resolved_api_key()
            .ok_or(WeatherError::InvalidApiKey)?;
        Self::new(&config.base_url, &api_key, config)
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `path` with `query` plus the API key and decode the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, WeatherError> {
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        handle_response(response).await
    }
}

/// Map status codes onto `WeatherError` and decode successful bodies.
pub(crate) async fn handle_response<T: DeserializeOwned>(
    response: Response,
) -> Result<T, WeatherError> {
    let status = response.status();

    if status.is_success() {
        let body = response
            .text()
            .await
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;
        return serde_json::from_str(&body)
            .map_err(|e| WeatherError::Parse(format!("JSON parse error: {}", e)));
    }

    match status {
        StatusCode::UNAUTHORIZED => Err(WeatherError::InvalidApiKey),
        StatusCode::NOT_FOUND => {
            let text = response.text().await.unwrap_or_default();
            Err(WeatherError::LocationNotFound(truncate_body(&text)))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            Err(WeatherError::RateLimited(retry_after))
        }
        _ => {
            let text = response.text().await.unwrap_or_default();
            Err(WeatherError::Api {
                status: status.as_u16(),
                message: truncate_body(&text),
            })
        }
    }
}

fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("short"), "short");
        let long = "x".repeat(300);
        let truncated = truncate_body(&long);
        assert_eq!(truncated.len(), MAX_ERROR_BODY + 3);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let mut config = ApiConfig::default();
        config.api_key = Some("   ".to_string());
        // Only meaningful when the environment does not supply a key either.
        if std::env::var(skycast_core::API_KEY_ENV).is_err() {
            assert!(matches!(
                ApiEndpoint::from_config(&config),
                Err(WeatherError::InvalidApiKey)
            ));
        }
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let endpoint =
            ApiEndpoint::new("http://localhost:1234/", "key", &ApiConfig::default()).unwrap();
        assert_eq!(endpoint.url("/geo/1.0/direct"), "http://localhost:1234/geo/1.0/direct");
    }
}
