use crate::dom::DomExtractor;
use crate::export::html_preview;
use crate::extract::PatternExtractor;
use crate::fetch::{AttemptReport, FetchError, PageFetcher};
use crate::render::{HttpRenderer, PageRenderer};
use crate::{ProductOffer, Result, ScraperConfig, ScraperError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};
use url::Url;

/// How the page is retrieved and read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeMode {
    /// Plain HTTP with user-agent rotation, then regular-expression extraction.
    #[default]
    Pattern,
    /// The page renderer, then CSS-selector extraction over the rendered markup.
    Rendered,
}

/// The ways a single scrape can end without offers.
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// The target was missing, malformed or on a site that is not allowed.
    #[error("{0}")]
    InvalidUrl(String),
    /// Every user agent was turned away.
    #[error("{url} could not be reached: all {} attempts failed", .attempts.len())]
    Blocked {
        url: Url,
        attempts: Vec<AttemptReport>,
    },
    /// The page loaded but nothing on it looked like an offer.
    #[error("no offers found on {url}")]
    NoOffers { url: Url, html_preview: String },
    #[error(transparent)]
    Failed(#[from] ScraperError),
}

/// The `ScrapeService` struct runs one scrape request end to end: validation,
/// retrieval and extraction. It holds no per-request state and can be shared.
pub struct ScrapeService {
    config: ScraperConfig,
    fetcher: PageFetcher,
    renderer: Arc<dyn PageRenderer>,
    patterns: PatternExtractor,
    dom: DomExtractor,
}

impl ScrapeService {
    /// Creates a new `ScrapeService` that renders pages over plain HTTP.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration settings for the scraper.
    pub fn new(config: ScraperConfig) -> Result<Self> {
        config.validate()?;

        let renderer = Arc::new(HttpRenderer::new(&config)?);
        let fetcher = PageFetcher::new(config.clone())?;
        let patterns = PatternExtractor::from_config(&config);

        Ok(Self {
            config,
            fetcher,
            renderer,
            patterns,
            dom: DomExtractor::default(),
        })
    }

    /// Replaces the renderer used in `ScrapeMode::Rendered`.
    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    /// Checks that `raw` is an http(s) URL on one of the allowed sites.
    pub fn validate_url(&self, raw: &str) -> std::result::Result<Url, ScrapeError> {
        let invalid = || {
            ScrapeError::InvalidUrl(format!(
                "Please provide a valid {} URL",
                self.config.site_label()
            ))
        };

        let raw = raw.trim();
        if raw.is_empty() {
            return Err(invalid());
        }

        let url = Url::parse(raw).map_err(|_| invalid())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid());
        }

        let host = url.host_str().ok_or_else(invalid)?.to_ascii_lowercase();
        if self.config.allowed_domains.is_empty() {
            return Ok(url);
        }

        let allowed = self.config.allowed_domains.iter().any(|domain| {
            let domain = domain.trim().trim_start_matches('.').to_ascii_lowercase();
            host == domain || host.ends_with(&format!(".{}", domain))
        });

        if allowed {
            Ok(url)
        } else {
            Err(invalid())
        }
    }

    /// Scrapes the page at `raw_url`.
    ///
    /// # Returns
    ///
    /// The offers found, in page order, or the reason there are none.
    #[instrument(skip(self))]
    pub async fn scrape(
        &self,
        raw_url: &str,
        mode: ScrapeMode,
    ) -> std::result::Result<Vec<ProductOffer>, ScrapeError> {
        let url = self.validate_url(raw_url)?;

        let (html, offers) = match mode {
            ScrapeMode::Pattern => {
                let page = self.fetcher.fetch(&url).await.map_err(|e| match e {
                    FetchError::Exhausted(attempts) => ScrapeError::Blocked {
                        url: url.clone(),
                        attempts,
                    },
                })?;
                let offers = self.patterns.extract(&page.html);
                (page.html, offers)
            }
            ScrapeMode::Rendered => {
                let html = self.renderer.render(&url).await?;
                let offers = self.dom.extract(&html, &url);
                (html, offers)
            }
        };

        if offers.is_empty() {
            warn!("No offers found on {}", url);
            return Err(ScrapeError::NoOffers {
                url,
                html_preview: html_preview(&html, self.config.preview_len),
            });
        }

        info!("Extracted {} offers from {}", offers.len(), url);
        Ok(offers)
    }
}
