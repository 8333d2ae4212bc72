//! Reactive state for the Skycast weather screen.

pub mod observable;
mod pipeline;
pub mod weather_model;

pub use observable::{Observable, Subscription};
pub use weather_model::{
    CoordinatorState, ErrorObserver, PipelineError, PipelineKind, ViewModelOptions,
    WeatherViewModel, DEFAULT_DEBOUNCE,
};
