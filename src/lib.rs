use std::time::Duration;
use thiserror::Error;

pub mod config;
pub mod dom;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod render;
pub mod response;
pub mod server;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use crate::config::{ErrorFormat, ScraperConfig};
pub use service::{ScrapeError, ScrapeMode, ScrapeService};
pub use types::ProductOffer;

/// The `ScraperError` enum represents the errors that can occur while fetching, parsing or rendering output.
#[derive(Error, Debug)]
pub enum ScraperError {
    /// Represents an error that occurs during an HTTP request.
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// Represents an error raised while layering configuration sources.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ::config::ConfigError),
    /// Represents a configuration that loaded but cannot be used.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// Represents an error raised by a page renderer.
    #[error("Render failed: {0}")]
    RenderError(String),
    /// Represents an error while writing CSV output.
    #[error("CSV output failed: {0}")]
    CsvError(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A type alias for `Result` with the `ScraperError` error type.
pub type Result<T> = std::result::Result<T, ScraperError>;

// Constants

/// The default timeout duration for HTTP requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// The default pause between the homepage warm-up and the target request.
pub const DEFAULT_WARMUP_PAUSE: Duration = Duration::from_millis(500);
/// The default bounds of the randomized delay between user-agent attempts.
pub const DEFAULT_RETRY_DELAY_MIN: Duration = Duration::from_millis(1000);
pub const DEFAULT_RETRY_DELAY_MAX: Duration = Duration::from_millis(3000);
/// The number of characters of page HTML kept in diagnostics.
pub const DEFAULT_PREVIEW_LEN: usize = 500;
