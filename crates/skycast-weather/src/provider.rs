use async_trait::async_trait;
use serde::Deserialize;
use skycast_core::{ApiConfig, Units};
use tracing::instrument;

use crate::http::ApiEndpoint;
use crate::types::{
    Condition, Coordinates, MainMetrics, WeatherError, WeatherSnapshot, Wind,
};

const CURRENT_WEATHER_PATH: &str = "/data/2.5/weather";

/// Fetches current conditions for a coordinate pair.
#[async_trait]
pub trait WeatherClient: Send + Sync {
    async fn fetch(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot, WeatherError>;
}

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    endpoint: ApiEndpoint,
    units: Units,
}

impl OpenWeatherProvider {
    pub fn new(endpoint: ApiEndpoint, units: Units) -> Self {
        Self { endpoint, units }
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, WeatherError> {
        Ok(Self::new(ApiEndpoint::from_config(config)?, config.units))
    }
}

#[async_trait]
impl WeatherClient for OpenWeatherProvider {
    #[instrument(skip(self), level = "info")]
    async fn fetch(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot, WeatherError> {
        let parsed: OwCurrentResponse = self
            .endpoint
            .get_json(
                CURRENT_WEATHER_PATH,
                &[
                    ("lat", lat.to_string()),
                    ("lon", lon.to_string()),
                    ("units", self.units.as_query().to_string()),
                ],
            )
            .await?;

        Ok(parsed.into())
    }
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    // Accept the misspelled key too.
    #[serde(alias = "log")]
    lon: f64,
    lat: f64,
}

#[derive(Debug, Deserialize)]
struct OwCondition {
    id: i32,
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    pressure: i32,
    humidity: i32,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
    #[serde(default)]
    deg: i32,
}

#[derive(Debug, Default, Deserialize)]
struct OwClouds {
    all: i32,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    coord: OwCoord,
    #[serde(default)]
    weather: Vec<OwCondition>,
    main: OwMain,
    #[serde(default)]
    visibility: i32,
    wind: OwWind,
    #[serde(default)]
    clouds: OwClouds,
    #[serde(default)]
    name: String,
}

impl From<OwCurrentResponse> for WeatherSnapshot {
    fn from(ow: OwCurrentResponse) -> Self {
        Self {
            coordinates: Coordinates {
                lat: ow.coord.lat,
                lon: ow.coord.lon,
            },
            conditions: ow
                .weather
                .into_iter()
                .map(|c| Condition {
                    id: c.id,
                    category: c.main,
                    description: c.description,
                    icon_key: c.icon,
                })
                .collect(),
            main: MainMetrics {
                temp: ow.main.temp,
                feels_like: ow.main.feels_like,
                temp_min: ow.main.temp_min,
                temp_max: ow.main.temp_max,
                pressure: ow.main.pressure,
                humidity: ow.main.humidity,
            },
            visibility: ow.visibility,
            wind: Wind {
                speed: ow.wind.speed,
                direction_degrees: ow.wind.deg,
            },
            cloud_cover_percent: ow.clouds.all,
            display_name: ow.name,
        }
    }
}
