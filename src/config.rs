use crate::{Result, ScraperError};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// The prefix of environment variables that override configuration values.
pub const ENV_PREFIX: &str = "OFFERSCRAPE";

/// The user agents tried, in order, until one is let through.
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// How failed scrapes are reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorFormat {
    /// A downloadable diagnostic CSV with status 200.
    #[default]
    Csv,
    /// A JSON error body with a matching HTTP status.
    Json,
}

/// The `ScraperConfig` struct holds the configuration settings for the scraper application.
/// It includes the HTTP timeout, the user-agent rotation and its delays, the accepted sites and output naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// The timeout for a single HTTP request, in seconds.
    pub timeout_secs: u64,
    /// The user agents tried in sequence.
    pub user_agents: Vec<String>,
    /// The lower bound of the random delay between attempts, in milliseconds.
    pub retry_delay_min_ms: u64,
    /// The upper bound of the random delay between attempts, in milliseconds.
    pub retry_delay_max_ms: u64,
    /// Whether to visit the site's homepage before the target page.
    pub warmup: bool,
    /// The pause between the homepage visit and the target request, in milliseconds.
    pub warmup_pause_ms: u64,
    /// Hosts accepted as scrape targets. Subdomains are accepted too; an empty list accepts any host.
    pub allowed_domains: Vec<String>,
    /// The label used for placeholder names, e.g. "Cigar 3".
    pub item_label: String,
    /// The download name of a successful scrape.
    pub csv_filename: String,
    /// How failures are reported.
    pub error_format: ErrorFormat,
    /// The address the HTTP server binds to.
    pub bind_addr: String,
    /// Names at or above this many characters are discarded.
    pub max_name_len: usize,
    /// Brands at or above this many characters are discarded.
    pub max_brand_len: usize,
    /// The number of characters of page HTML kept in diagnostics.
    pub preview_len: usize,
}

impl Default for ScraperConfig {
    /// Provides default values for the `ScraperConfig` struct.
    ///
    /// # Returns
    ///
    /// A `ScraperConfig` instance with default settings.
    fn default() -> Self {
        Self {
            timeout_secs: crate::DEFAULT_TIMEOUT.as_secs(),
            user_agents: DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect(),
            retry_delay_min_ms: crate::DEFAULT_RETRY_DELAY_MIN.as_millis() as u64,
            retry_delay_max_ms: crate::DEFAULT_RETRY_DELAY_MAX.as_millis() as u64,
            warmup: true,
            warmup_pause_ms: crate::DEFAULT_WARMUP_PAUSE.as_millis() as u64,
            allowed_domains: vec![String::from("cigarpage.com")],
            item_label: String::from("Cigar"),
            csv_filename: String::from("cigar-offers.csv"),
            error_format: ErrorFormat::Csv,
            bind_addr: String::from("127.0.0.1:3000"),
            max_name_len: 200,
            max_brand_len: 100,
            preview_len: crate::DEFAULT_PREVIEW_LEN,
        }
    }
}

impl ScraperConfig {
    /// Loads the configuration by layering the defaults, an optional TOML file and
    /// `OFFERSCRAPE_*` environment variables, in that order.
    ///
    /// # Arguments
    ///
    /// * `path` - An optional configuration file. When given it must exist.
    ///
    /// # Returns
    ///
    /// A `Result` containing the validated configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("user_agents")
                    .with_list_parse_key("allowed_domains")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the scraper cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.user_agents.iter().all(|ua| ua.trim().is_empty()) {
            return Err(ScraperError::InvalidConfig(
                "at least one user agent is required".to_string(),
            ));
        }
        if self.retry_delay_min_ms > self.retry_delay_max_ms {
            return Err(ScraperError::InvalidConfig(format!(
                "retry_delay_min_ms ({}) is greater than retry_delay_max_ms ({})",
                self.retry_delay_min_ms, self.retry_delay_max_ms
            )));
        }
        if !is_download_name(&self.csv_filename) {
            return Err(ScraperError::InvalidConfig(format!(
                "csv_filename {:?} cannot be used as a download name",
                self.csv_filename
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ScraperError::InvalidConfig(
                "timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn warmup_pause(&self) -> Duration {
        Duration::from_millis(self.warmup_pause_ms)
    }

    /// The site named in user-facing messages: the first allowed domain, or a generic phrase.
    pub fn site_label(&self) -> &str {
        self.allowed_domains
            .first()
            .map(String::as_str)
            .unwrap_or("e-commerce")
    }
}

/// A name that fits in a quoted `Content-Disposition` filename: printable ASCII, no quotes or path separators.
fn is_download_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name
            .chars()
            .all(|c| (c.is_ascii_graphic() || c == ' ') && !matches!(c, '"' | '\\' | '/'))
}
