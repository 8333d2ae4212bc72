//! Centralized error types for Skycast.
//!
//! - Typed errors for every layer (network, config, weather lookups)
//! - User-friendly messages suitable for display
//! - Full context preserved for logging

use thiserror::Error;

/// Top-level application error type.
///
/// Use `user_message()` to get a display-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Weather service error: {0}")]
    Weather(#[from] WeatherError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Weather(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => {
                "Unable to connect. Check your internet connection."
            }
            NetworkError::Timeout => "The request timed out. Please try again.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The server is experiencing issues. Please try again later."
            }
            NetworkError::ServerError { .. } => "The request failed. Please try again.",
            NetworkError::InvalidResponse(_) => {
                "Received an unexpected response. Please try again."
            }
        }
    }

    /// Transient failures worth trying again later.
    pub fn is_transient(&self) -> bool {
        match self {
            NetworkError::Timeout | NetworkError::ConnectionFailed(_) => true,
            NetworkError::ServerError { status, .. } => *status >= 500,
            NetworkError::InvalidResponse(_) => false,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::MissingSetting(_) => "A required setting is missing. Check your settings.",
        }
    }
}

/// Weather lookup failures as seen by the application shell.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Location not found: {0}")]
    LocationNotFound(String),

    #[error("Weather API error: {0}")]
    ApiError(String),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Service unavailable")]
    ServiceUnavailable,

    #[error("Cache error: {0}")]
    CacheError(String),
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::LocationNotFound(_) => "Location not found. Check and try again.",
            WeatherError::ApiError(_) => "Weather service error. Please try again.",
            WeatherError::InvalidApiKey => "Weather API key is invalid. Check settings.",
            WeatherError::ServiceUnavailable => {
                "Weather service unavailable. Please try again later."
            }
            WeatherError::CacheError(_) => "Weather data may be outdated.",
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_connect() {
            NetworkError::ConnectionFailed(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_are_non_empty() {
        let messages = [
            NetworkError::Timeout.user_message(),
            NetworkError::ConnectionFailed("reset".into()).user_message(),
            ConfigError::Invalid("test".into()).user_message(),
            WeatherError::ServiceUnavailable.user_message(),
            WeatherError::InvalidApiKey.user_message(),
        ];

        for message in messages {
            assert!(!message.is_empty());
        }
    }

    #[test]
    fn test_app_error_conversion() {
        let app_err: AppError = NetworkError::Timeout.into();
        assert!(matches!(app_err, AppError::Network(NetworkError::Timeout)));
    }

    #[test]
    fn test_user_message_propagation() {
        let app_err = AppError::Weather(WeatherError::InvalidApiKey);
        assert_eq!(
            app_err.user_message(),
            "Weather API key is invalid. Check settings."
        );
    }

    #[test]
    fn test_server_error_message_depends_on_status() {
        let server = NetworkError::ServerError {
            status: 503,
            message: "down".into(),
        };
        let client = NetworkError::ServerError {
            status: 400,
            message: "bad".into(),
        };
        assert!(server.user_message().contains("later"));
        assert!(!client.user_message().contains("later"));
        assert!(server.is_transient());
        assert!(!client.is_transient());
    }
}
