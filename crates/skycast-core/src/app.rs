use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::Config;

/// Application state and lifecycle manager.
///
/// Owns the loaded configuration and the root shutdown token. Long-lived
/// components (view models, background tasks) run on child tokens so one
/// `shutdown()` stops all of them.
pub struct App {
    config: Config,
    shutdown: CancellationToken,
}

impl App {
    /// Create a new application instance from the on-disk configuration
    pub fn new() -> Result<Self> {
        let (config, _) = Config::load_validated()?;
        Ok(Self::with_config(config))
    }

    /// Create an application around an already-built configuration
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Token cancelled when the application shuts down.
    ///
    /// Cancelling the returned token does not affect the application.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Cancel every token handed out by `shutdown_token`.
    pub fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        tracing::info!("Shutting down application");
        self.shutdown.cancel();
    }
}
