//! Forward geocoding: turn free text ("San Mateo") into candidate places.
//! Uses the OpenWeather direct geocoding endpoint.

use async_trait::async_trait;
use skycast_core::ApiConfig;
use tracing::instrument;

use crate::http::ApiEndpoint;
use crate::types::{Location, WeatherError};

const DIRECT_GEOCODING_PATH: &str = "/geo/1.0/direct";

/// Resolves a search string to an ordered list of candidate locations.
///
/// An empty list is a successful answer, not an error.
#[async_trait]
pub trait GeocodingClient: Send + Sync {
    async fn lookup(&self, query: &str) -> Result<Vec<Location>, WeatherError>;
}

#[derive(Debug, Clone)]
pub struct OpenWeatherGeocoder {
    endpoint: ApiEndpoint,
    limit: u32,
}

impl OpenWeatherGeocoder {
    pub fn new(endpoint: ApiEndpoint, limit: u32) -> Self {
        Self { endpoint, limit }
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, WeatherError> {
        Ok(Self::new(ApiEndpoint::from_config(config)?, config.geocode_limit))
    }
}

#[async_trait]
impl GeocodingClient for OpenWeatherGeocoder {
    #[instrument(skip(self), level = "info")]
    async fn lookup(&self, query: &str) -> Result<Vec<Location>, WeatherError> {
        let locations: Vec<Location> = self
            .endpoint
            .get_json(
                DIRECT_GEOCODING_PATH,
                &[("q", query.to_string()), ("limit", self.limit.to_string())],
            )
            .await?;

        tracing::debug!("Geocoding '{}' returned {} candidates", query, locations.len());
        Ok(locations)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn geocoder(server: &MockServer) -> OpenWeatherGeocoder {
        let endpoint = ApiEndpoint::new(&server.uri(), "test_key", &ApiConfig::default()).unwrap();
        OpenWeatherGeocoder::new(endpoint, 10)
    }

    #[tokio::test]
    async fn test_lookup_returns_candidates() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .and(query_param("q", "San Mateo"))
            .and(query_param("limit", "10"))
            .and(query_param("appid", "test_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "San Mateo", "lat": 37.563, "lon": -122.3255, "country": "US", "state": "California"},
                {"name": "San Mateo", "lat": 40.45, "lon": -3.65, "country": "ES"}
            ])))
            .mount(&mock_server)
            .await;

        let locations = geocoder(&mock_server).lookup("San Mateo").await.unwrap();

        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0].state.as_deref(), Some("California"));
        assert_eq!(locations[1].country, "ES");
        assert_eq!(locations[1].state, None);
    }

    #[tokio::test]
    async fn test_lookup_empty_result_is_ok() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&mock_server)
            .await;

        let locations = geocoder(&mock_server).lookup("Nowhereville").await.unwrap();
        assert!(locations.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_invalid_key() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "cod": 401,
                "message": "Invalid API key."
            })))
            .mount(&mock_server)
            .await;

        let result = geocoder(&mock_server).lookup("Paris").await;
        assert!(matches!(result, Err(WeatherError::InvalidApiKey)));
    }

    #[tokio::test]
    async fn test_lookup_malformed_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let result = geocoder(&mock_server).lookup("Paris").await;
        assert!(matches!(result, Err(WeatherError::Parse(_))));
    }
}
