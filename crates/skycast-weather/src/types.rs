use serde::{Deserialize, Serialize};
use skycast_core::NetworkError;

const ICON_URL_BASE: &str = "https://openweathermap.org/img/wn";

/// A place returned by a city search.
///
/// Two locations are interchangeable when every field matches; there is no
/// separate identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub state: Option<String>,
}

impl Location {
    /// A nameless location for raw device coordinates.
    pub fn from_coordinates(latitude: f64, longitude: f64) -> Self {
        Self {
            name: String::new(),
            latitude,
            longitude,
            country: String::new(),
            state: None,
        }
    }

    /// "Name, State, Country" as shown in a result list (state omitted when absent).
    pub fn display_label(&self) -> String {
        let mut label = self.name.clone();
        for part in [self.state.as_deref(), Some(self.country.as_str())]
            .into_iter()
            .flatten()
            .filter(|p| !p.is_empty())
        {
            if !label.is_empty() {
                label.push_str(", ");
            }
            label.push_str(part);
        }
        label
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    #[serde(alias = "log")]
    pub lon: f64,
}

/// One entry of the conditions list ("Rain" / "light rain" / icon "10n").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub id: i32,
    pub category: String,
    pub description: String,
    pub icon_key: String,
}

impl Condition {
    pub fn icon_url(&self) -> String {
        format!("{}/{}@2x.png", ICON_URL_BASE, self.icon_key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MainMetrics {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub pressure: i32,
    pub humidity: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
    pub direction_degrees: i32,
}

/// Current conditions for one place. Only the latest one is ever displayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub coordinates: Coordinates,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub main: MainMetrics,
    #[serde(default)]
    pub visibility: i32,
    pub wind: Wind,
    #[serde(default)]
    pub cloud_cover_percent: i32,
    #[serde(default)]
    pub display_name: String,
}

impl WeatherSnapshot {
    /// The condition shown next to the temperature, if the API sent any.
    pub fn primary_condition(&self) -> Option<&Condition> {
        self.conditions.first()
    }

    /// Temperature rounded for display.
    pub fn rounded_temp(&self) -> i64 {
        self.main.temp.round() as i64
    }
}

/// Errors from the geocoding and weather clients and the snapshot cache.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Not found: {0}")]
    LocationNotFound(String),

    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Network(e) => e.user_message(),
            Self::InvalidApiKey => "Weather API key is invalid. Check settings.",
            Self::LocationNotFound(_) => "Location not found. Check and try again.",
            Self::RateLimited(_) => "Too many requests. Please wait a moment.",
            Self::Api { status, .. } if *status >= 500 => {
                "Weather service unavailable. Please try again later."
            }
            Self::Api { .. } | Self::Parse(_) => "Weather service error. Please try again.",
            Self::Cache(_) => "Weather data may be outdated.",
        }
    }

    /// Whether trying the same request again could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_transient(),
            Self::RateLimited(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<WeatherError> for skycast_core::AppError {
    fn from(err: WeatherError) -> Self {
        use skycast_core::WeatherError as Shell;

        match err {
            WeatherError::Network(e) => Self::Network(e),
            WeatherError::InvalidApiKey => Self::Weather(Shell::InvalidApiKey),
            WeatherError::LocationNotFound(what) => Self::Weather(Shell::LocationNotFound(what)),
            WeatherError::RateLimited(_) => Self::Weather(Shell::ServiceUnavailable),
            WeatherError::Api { status, .. } if status >= 500 => {
                Self::Weather(Shell::ServiceUnavailable)
            }
            WeatherError::Api { status, message } => {
                Self::Weather(Shell::ApiError(format!("{status}: {message}")))
            }
            WeatherError::Parse(msg) => Self::Weather(Shell::ApiError(msg)),
            WeatherError::Cache(msg) => Self::Weather(Shell::CacheError(msg)),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    fn san_francisco() -> Location {
        Location {
            name: "San Francisco".to_string(),
            latitude: 37.7749,
            longitude: -122.4194,
            country: "US".to_string(),
            state: Some("California".to_string()),
        }
    }

    #[test]
    fn test_location_label_with_state() {
        assert_eq!(san_francisco().display_label(), "San Francisco, California, US");
    }

    #[test]
    fn test_location_label_without_state() {
        let mut loc = san_francisco();
        loc.name = "Paris".to_string();
        loc.state = None;
        loc.country = "FR".to_string();
        assert_eq!(loc.display_label(), "Paris, FR");
    }

    #[test]
    fn test_device_location_is_nameless() {
        let loc = Location::from_coordinates(1.5, -2.5);
        assert_eq!(loc.name, "");
        assert_eq!(loc.country, "");
        assert_eq!(loc.state, None);
        assert_eq!(loc.display_label(), "");
    }

    #[test]
    fn test_location_structural_equality() {
        assert_eq!(san_francisco(), san_francisco());
        let mut other = san_francisco();
        other.state = None;
        assert_ne!(san_francisco(), other);
    }

    #[test]
    fn test_location_reads_geocoding_json() {
        let json = serde_json::json!({
            "name": "San Mateo",
            "local_names": {"en": "San Mateo"},
            "lat": 37.563,
            "lon": -122.3255,
            "country": "US",
            "state": "California"
        });
        let loc: Location = serde_json::from_value(json).unwrap();
        assert_eq!(loc.name, "San Mateo");
        assert_eq!(loc.latitude, 37.563);
        assert_eq!(loc.state.as_deref(), Some("California"));
    }

    #[test]
    fn test_location_state_may_be_missing() {
        let json = serde_json::json!({"name": "Tokyo", "lat": 35.68, "lon": 139.76, "country": "JP"});
        let loc: Location = serde_json::from_value(json).unwrap();
        assert_eq!(loc.state, None);
    }

    #[test]
    fn test_condition_icon_url() {
        let condition = Condition {
            id: 500,
            category: "Rain".to_string(),
            description: "light rain".to_string(),
            icon_key: "10n".to_string(),
        };
        assert_eq!(
            condition.icon_url(),
            "https://openweathermap.org/img/wn/10n@2x.png"
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(WeatherError::RateLimited(30).is_retryable());
        assert!(WeatherError::Network(NetworkError::Timeout).is_retryable());
        assert!(!WeatherError::InvalidApiKey.is_retryable());
        assert!(!WeatherError::Parse("bad".into()).is_retryable());
    }

    #[test]
    fn test_conversion_into_app_error() {
        let app: skycast_core::AppError = WeatherError::InvalidApiKey.into();
        assert_eq!(app.user_message(), "Weather API key is invalid. Check settings.");

        let app: skycast_core::AppError = WeatherError::Network(NetworkError::Timeout).into();
        assert!(matches!(app, skycast_core::AppError::Network(NetworkError::Timeout)));
    }
}
