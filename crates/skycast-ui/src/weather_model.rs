//! Search/select coordinator behind the weather screen.
//!
//! Two independent pipelines drive four observable values:
//!
//! - query text → debounced geocoding lookup → `candidates` (list shown)
//! - selected location → debounced weather fetch → `current_weather` (list hidden)
//!
//! Client failures are logged and handed to the optional error observer;
//! they never change the observable state and never stop a pipeline.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use skycast_core::SearchConfig;
use skycast_weather::{
    GeocodingClient, Location, WeatherCache, WeatherClient, WeatherError, WeatherSnapshot,
};
use tokio_util::sync::CancellationToken;

use crate::observable::Observable;
use crate::pipeline::{BoxRequest, Pipeline};

/// Debounce window used when none is configured.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Which pipeline produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    Query,
    Selection,
}

/// A client failure absorbed by one of the pipelines.
#[derive(Debug, Clone)]
pub struct PipelineError {
    pub pipeline: PipelineKind,
    pub error: WeatherError,
}

pub type ErrorObserver = Arc<dyn Fn(&PipelineError) + Send + Sync>;

#[derive(Clone)]
pub struct ViewModelOptions {
    pub debounce: Duration,
    pub on_error: Option<ErrorObserver>,
    /// Cancelling this token shuts the view model down, as `shutdown()` does.
    pub shutdown: Option<CancellationToken>,
}

impl Default for ViewModelOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            on_error: None,
            shutdown: None,
        }
    }
}

impl ViewModelOptions {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            debounce: config.debounce(),
            ..Self::default()
        }
    }

    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn on_error(mut self, observer: impl Fn(&PipelineError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(observer));
        self
    }
}

/// Point-in-time copy of the four observable values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinatorState {
    pub query_text: String,
    pub candidates: Vec<Location>,
    pub candidates_visible: bool,
    pub current_weather: Option<WeatherSnapshot>,
}

/// The four observable values plus the guard that keeps multi-value
/// updates and shutdown from interleaving.
#[derive(Clone)]
struct Outputs {
    query_text: Observable<String>,
    candidates: Observable<Vec<Location>>,
    candidates_visible: Observable<bool>,
    current_weather: Observable<Option<WeatherSnapshot>>,
    gate: Arc<Mutex<()>>,
    shutdown: CancellationToken,
}

impl Outputs {
    fn new(initial_weather: Option<WeatherSnapshot>, shutdown: CancellationToken) -> Self {
        Self {
            query_text: Observable::new(String::new()),
            candidates: Observable::new(Vec::new()),
            candidates_visible: Observable::new(false),
            current_weather: Observable::new(initial_weather),
            gate: Arc::new(Mutex::new(())),
            shutdown,
        }
    }

    /// Run `update` unless shut down. Returns whether it ran.
    fn update(&self, update: impl FnOnce(&Self)) -> bool {
        let _gate = self.gate.lock();
        if self.shutdown.is_cancelled() {
            return false;
        }
        update(self);
        true
    }

    /// Cancel the pipelines and end every subscription. Returns `false` if
    /// already closed.
    fn close(&self) -> bool {
        let _gate = self.gate.lock();
        self.shutdown.cancel();
        if self.query_text.is_closed() {
            return false;
        }
        self.query_text.close();
        self.candidates.close();
        self.candidates_visible.close();
        self.current_weather.close();
        true
    }
}

pub struct WeatherViewModel {
    outputs: Outputs,
    query: Pipeline<String>,
    selection: Pipeline<Location>,
}

impl WeatherViewModel {
    /// Build the coordinator and start both pipelines.
    ///
    /// `cache` is read once; a stored snapshot becomes the initial weather
    /// without any network call. Must be called inside a tokio runtime.
    pub fn new(
        geocoder: Arc<dyn GeocodingClient>,
        weather: Arc<dyn WeatherClient>,
        cache: &dyn WeatherCache,
        options: ViewModelOptions,
    ) -> Self {
        let initial_weather = cache.load();
        if let Some(cached) = &initial_weather {
            tracing::info!("Starting with cached weather for '{}'", cached.display_name);
        }

        let shutdown = match &options.shutdown {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let outputs = Outputs::new(initial_weather, shutdown.clone());

        let query = {
            let outputs = outputs.clone();
            let on_error = options.on_error.clone();

            Pipeline::spawn(
                "query",
                options.debounce,
                shutdown.clone(),
                move |text: String| -> BoxRequest<Result<Vec<Location>, WeatherError>> {
                    let geocoder = Arc::clone(&geocoder);
                    Box::pin(async move {
                        if text.is_empty() {
                            return Ok(Vec::new());
                        }
                        geocoder.lookup(&text).await
                    })
                },
                move |result| match result {
                    Ok(found) => {
                        tracing::debug!("Search returned {} candidates", found.len());
                        outputs.update(|o| {
                            o.candidates.publish(found);
                            o.candidates_visible.publish(true);
                        });
                    }
                    Err(error) => report(on_error.as_ref(), PipelineKind::Query, error),
                },
            )
        };

        let selection = {
            let outputs = outputs.clone();
            let on_error = options.on_error.clone();

            Pipeline::spawn(
                "selection",
                options.debounce,
                shutdown.clone(),
                move |location: Location| -> BoxRequest<Result<WeatherSnapshot, WeatherError>> {
                    let weather = Arc::clone(&weather);
                    Box::pin(async move { weather.fetch(location.latitude, location.longitude).await })
                },
                move |result| match result {
                    Ok(snapshot) => {
                        tracing::debug!("Weather updated for '{}'", snapshot.display_name);
                        outputs.update(|o| {
                            o.current_weather.publish(Some(snapshot));
                            o.candidates_visible.publish(false);
                        });
                    }
                    Err(error) => report(on_error.as_ref(), PipelineKind::Selection, error),
                },
            )
        };

        // An outside cancellation closes the observables too.
        {
            let outputs = outputs.clone();
            tokio::spawn(async move {
                outputs.shutdown.cancelled().await;
                if outputs.close() {
                    tracing::info!("Weather view model shut down");
                }
            });
        }

        Self {
            outputs,
            query,
            selection,
        }
    }

    /// Record the search text and schedule a lookup for it.
    pub fn set_query_text(&self, text: impl Into<String>) {
        let text = text.into();
        if self
            .outputs
            .update(|o| {
                o.query_text.publish(text.clone());
            })
        {
            self.query.send(text);
        }
    }

    /// Schedule a weather fetch for `location`.
    pub fn select_location(&self, location: Location) {
        if self.outputs.shutdown.is_cancelled() {
            return;
        }
        self.selection.send(location);
    }

    /// Schedule a weather fetch for raw device coordinates.
    pub fn use_device_location(&self, latitude: f64, longitude: f64) {
        self.select_location(Location::from_coordinates(latitude, longitude));
    }

    pub fn query_text(&self) -> &Observable<String> {
        &self.outputs.query_text
    }

    pub fn candidates(&self) -> &Observable<Vec<Location>> {
        &self.outputs.candidates
    }

    pub fn candidates_visible(&self) -> &Observable<bool> {
        &self.outputs.candidates_visible
    }

    pub fn current_weather(&self) -> &Observable<Option<WeatherSnapshot>> {
        &self.outputs.current_weather
    }

    /// Consistent copy of the four values; never observes half of an update.
    pub fn snapshot(&self) -> CoordinatorState {
        let _gate = self.outputs.gate.lock();
        CoordinatorState {
            query_text: self.outputs.query_text.get(),
            candidates: self.outputs.candidates.get(),
            candidates_visible: self.outputs.candidates_visible.get(),
            current_weather: self.outputs.current_weather.get(),
        }
    }

    /// True until shutdown, as long as both pipeline tasks are alive.
    pub fn is_running(&self) -> bool {
        !self.outputs.shutdown.is_cancelled()
            && !self.query.is_finished()
            && !self.selection.is_finished()
    }

    /// Stop both pipelines and end every subscription.
    ///
    /// No observable value changes after this returns. Safe to call twice.
    pub fn shutdown(&self) {
        if self.outputs.close() {
            tracing::info!("Weather view model shut down");
        }
    }
}

impl Drop for WeatherViewModel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn report(observer: Option<&ErrorObserver>, pipeline: PipelineKind, error: WeatherError) {
    tracing::warn!(?pipeline, "Weather request failed: {}", error);
    if let Some(observer) = observer {
        observer(&PipelineError { pipeline, error });
    }
}
