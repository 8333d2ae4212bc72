use async_trait::async_trait;

use crate::cache::WeatherCache;
use crate::provider::WeatherClient;
use crate::types::{WeatherError, WeatherSnapshot};

/// Weather client that records every successful fetch in a cache.
///
/// A failed save is logged and does not fail the fetch.
pub struct CachingWeatherClient<C, S> {
    inner: C,
    cache: S,
}

impl<C: WeatherClient, S: WeatherCache> CachingWeatherClient<C, S> {
    pub fn new(inner: C, cache: S) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &S {
        &self.cache
    }
}

#[async_trait]
impl<C: WeatherClient, S: WeatherCache> WeatherClient for CachingWeatherClient<C, S> {
    async fn fetch(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot, WeatherError> {
        let weather = self.inner.fetch(lat, lon).await?;

        if let Err(e) = self.cache.save(&weather) {
            tracing::warn!("Failed to cache weather for '{}': {}", weather.display_name, e);
        }

        Ok(weather)
    }
}
