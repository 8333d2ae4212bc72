use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use skycast_core::{App, AppError, Config, Units, API_KEY_ENV};
use skycast_ui::{PipelineError, Subscription, ViewModelOptions, WeatherViewModel};
use skycast_weather::{
    CachingWeatherClient, FileWeatherCache, Location, MemoryWeatherCache, OpenWeatherGeocoder,
    OpenWeatherProvider, WeatherCache, WeatherSnapshot,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const USAGE: &str = "\
Usage:
  skycast <city>             search for a city and show the weather for the first match
  skycast --here <lat> <lon> show the weather at a coordinate
  skycast                    show the last weather that was looked up";

enum Command {
    Cached,
    Search(String),
    Here { latitude: f64, longitude: f64 },
    Help,
}

impl Command {
    fn parse(args: &[String]) -> Result<Self> {
        match args {
            [] => Ok(Self::Cached),
            [flag] if flag == "-h" || flag == "--help" => Ok(Self::Help),
            [flag, lat, lon] if flag == "--here" => Ok(Self::Here {
                latitude: lat
                    .parse()
                    .with_context(|| format!("Invalid latitude: {lat}"))?,
                longitude: lon
                    .parse()
                    .with_context(|| format!("Invalid longitude: {lon}"))?,
            }),
            [flag, ..] if flag == "--here" => bail!("--here takes a latitude and a longitude\n\n{USAGE}"),
            words => Ok(Self::Search(words.join(" "))),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize core
    skycast_core::init()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;
    if let Command::Help = command {
        println!("{USAGE}");
        return Ok(());
    }

    let app = App::new().context("Failed to load configuration")?;
    tracing::info!("Skycast started");

    let result = tokio::select! {
        result = run(app.config(), app.shutdown_token(), command) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
            Ok(())
        }
    };

    // Graceful shutdown
    app.shutdown();
    result
}

async fn run(config: &Config, shutdown: CancellationToken, command: Command) -> Result<()> {
    if !config.cache.enabled {
        return run_with_cache(config, shutdown, command, MemoryWeatherCache::new()).await;
    }

    let cache = FileWeatherCache::from_config(config);
    if let Command::Cached = command {
        match cache.load() {
            Some(weather) => {
                print_weather(&weather, config.api.units);
                if let Some(saved_at) = cache.saved_at() {
                    let note = if cache.is_stale() { " (may be outdated)" } else { "" };
                    println!("  Saved {saved_at}{note}");
                }
            }
            None => println!("No saved weather yet.\n\n{USAGE}"),
        }
        return Ok(());
    }

    run_with_cache(config, shutdown, command, cache).await
}

async fn run_with_cache<S: WeatherCache + 'static>(
    config: &Config,
    shutdown: CancellationToken,
    command: Command,
    cache: S,
) -> Result<()> {
    let geocoder = OpenWeatherGeocoder::from_config(&config.api)
        .with_context(|| format!("Set {API_KEY_ENV} or api.api_key in the config file"))?;
    let provider = OpenWeatherProvider::from_config(&config.api)
        .with_context(|| format!("Set {API_KEY_ENV} or api.api_key in the config file"))?;
    let weather = Arc::new(CachingWeatherClient::new(provider, cache));

    let (error_tx, mut errors) = mpsc::unbounded_channel();
    let options = ViewModelOptions::from_config(&config.search)
        .with_shutdown(shutdown)
        .on_error(move |e: &PipelineError| {
            // The receiver only goes away once we have stopped listening.
            let _ = error_tx.send(e.clone());
        });
    let view_model = WeatherViewModel::new(
        Arc::new(geocoder),
        weather.clone(),
        weather.cache(),
        options,
    );

    let limit = config.search.debounce() + config.api.timeout() + Duration::from_secs(1);
    let result = match command {
        Command::Search(city) => {
            let mut visible = view_model.candidates_visible().subscribe();
            view_model.set_query_text(city.as_str());
            wait_for(&mut visible, &mut errors, limit, |shown| *shown).await?;

            let candidates = view_model.candidates().get();
            match candidates.first() {
                Some(first) => {
                    for (i, location) in candidates.iter().enumerate() {
                        println!("{:>2}. {}", i + 1, location.display_label());
                    }
                    println!();
                    show_weather(&view_model, first.clone(), &mut errors, limit, config.api.units)
                        .await
                }
                None => {
                    println!("No places match '{city}'.");
                    Ok(())
                }
            }
        }
        Command::Here {
            latitude,
            longitude,
        } => {
            show_weather(
                &view_model,
                Location::from_coordinates(latitude, longitude),
                &mut errors,
                limit,
                config.api.units,
            )
            .await
        }
        Command::Cached | Command::Help => Ok(()),
    };

    view_model.shutdown();
    result
}

async fn show_weather(
    view_model: &WeatherViewModel,
    location: Location,
    errors: &mut mpsc::UnboundedReceiver<PipelineError>,
    limit: Duration,
    units: Units,
) -> Result<()> {
    let mut updates = view_model.current_weather().subscribe();
    // Skip the replayed value; only a fresh fetch counts.
    updates.try_next();

    view_model.select_location(location);
    let weather = wait_for(&mut updates, errors, limit, Option::is_some).await?;
    if let Some(weather) = weather {
        print_weather(&weather, units);
    }
    Ok(())
}

/// Wait until `updates` yields a value accepted by `done`, failing on the
/// first reported pipeline error or after `limit`.
async fn wait_for<T>(
    updates: &mut Subscription<T>,
    errors: &mut mpsc::UnboundedReceiver<PipelineError>,
    limit: Duration,
    done: impl Fn(&T) -> bool,
) -> Result<T> {
    let wait = async {
        loop {
            tokio::select! {
                value = updates.next() => match value {
                    Some(value) if done(&value) => return Ok(value),
                    Some(_) => continue,
                    None => bail!("Weather view model stopped"),
                },
                Some(failure) = errors.recv() => {
                    tracing::debug!(pipeline = ?failure.pipeline, "Request failed");
                    return Err(anyhow!(failure_message(failure)));
                }
            }
        }
    };

    tokio::time::timeout(limit, wait)
        .await
        .context("Timed out waiting for the weather service")?
}

fn failure_message(failure: PipelineError) -> String {
    let retry = failure.error.is_retryable();
    let message = AppError::from(failure.error).user_message();
    if retry {
        format!("{message} Try again in a moment.")
    } else {
        message.to_string()
    }
}

fn print_weather(weather: &WeatherSnapshot, units: Units) {
    let name = if weather.display_name.is_empty() {
        format!("{:.2}, {:.2}", weather.coordinates.lat, weather.coordinates.lon)
    } else {
        weather.display_name.clone()
    };
    let suffix = units.temperature_suffix();
    let wind_unit = match units {
        Units::Imperial => "mph",
        Units::Metric | Units::Standard => "m/s",
    };

    println!("{name}");
    if let Some(condition) = weather.primary_condition() {
        println!("  {} ({})", condition.category, condition.description);
    }
    println!(
        "  {}{suffix}, feels like {}{suffix} (low {}{suffix}, high {}{suffix})",
        weather.rounded_temp(),
        weather.main.feels_like.round(),
        weather.main.temp_min.round(),
        weather.main.temp_max.round(),
    );
    println!(
        "  Humidity {}%, pressure {} hPa, clouds {}%",
        weather.main.humidity, weather.main.pressure, weather.cloud_cover_percent
    );
    println!(
        "  Wind {:.1} {wind_unit} from {}\u{b0}, visibility {} m",
        weather.wind.speed, weather.wind.direction_degrees, weather.visibility
    );
}
