//! Weather data for Skycast
//!
//! City search and current conditions via the OpenWeather API, plus a
//! single-snapshot cache of the last displayed result.

pub mod cache;
pub mod geocode;
pub mod http;
pub mod provider;
pub mod repository;
pub mod types;

pub use cache::{FileWeatherCache, MemoryWeatherCache, WeatherCache};
pub use geocode::{GeocodingClient, OpenWeatherGeocoder};
pub use http::ApiEndpoint;
pub use provider::{OpenWeatherProvider, WeatherClient};
pub use repository::CachingWeatherClient;
pub use types::*;
