use crate::{Result, ScraperConfig, ScraperError};
use rand::Rng;
use reqwest::{Client, Response, StatusCode};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

const SEARCH_REFERER: &str = "https://www.google.com/";

/// Which of the two requests in an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    Homepage,
    Target,
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStage::Homepage => write!(f, "homepage"),
            FetchStage::Target => write!(f, "target page"),
        }
    }
}

/// Why an attempt was given up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The server answered 403.
    Blocked,
    /// Any other non-success status.
    Status(u16),
    /// The request never produced a response.
    Network(String),
    /// A success status with nothing in the body.
    EmptyBody,
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Blocked => write!(f, "403 Forbidden"),
            AttemptOutcome::Status(code) => write!(f, "HTTP {}", code),
            AttemptOutcome::Network(message) => write!(f, "network error: {}", message),
            AttemptOutcome::EmptyBody => write!(f, "empty response body"),
        }
    }
}

/// One failed user-agent attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptReport {
    pub user_agent: String,
    pub stage: FetchStage,
    pub outcome: AttemptOutcome,
}

impl AttemptReport {
    pub fn is_blocked(&self) -> bool {
        self.outcome == AttemptOutcome::Blocked
    }
}

impl fmt::Display for AttemptReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} with User-Agent: {}",
            self.stage, self.outcome, self.user_agent
        )
    }
}

/// A page that was let through, with the attempts that were turned away before it.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: Url,
    pub user_agent: String,
    pub html: String,
    pub attempts: Vec<AttemptReport>,
}

#[derive(Error, Debug)]
pub enum FetchError {
    /// Every configured user agent was turned away.
    #[error("all {} attempts failed", .0.len())]
    Exhausted(Vec<AttemptReport>),
}

/// The `PageFetcher` struct retrieves a page by walking the configured user agents in order
/// until one of them gets through.
pub struct PageFetcher {
    /// The HTTP client used for making requests.
    client: Client,
    /// The configuration settings for the scraper.
    config: ScraperConfig,
}

impl PageFetcher {
    /// Creates a new `PageFetcher` with the given configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration settings for the scraper.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `PageFetcher` instance, or an error if the client could not be created.
    pub fn new(config: ScraperConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(ScraperError::RequestError)?;

        Ok(Self { client, config })
    }

    /// Fetches the page at `url`, trying each user agent in turn.
    ///
    /// Attempts are strictly sequential. Between two attempts the fetcher sleeps for a
    /// random delay drawn from the configured bounds.
    ///
    /// # Arguments
    ///
    /// * `url` - The page to fetch.
    ///
    /// # Returns
    ///
    /// The first page that came back with a non-empty success response, or every failed attempt.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch(&self, url: &Url) -> std::result::Result<FetchedPage, FetchError> {
        let origin = origin_of(url);
        let mut attempts = Vec::new();

        let user_agents = self
            .config
            .user_agents
            .iter()
            .filter(|ua| !ua.trim().is_empty());

        for (i, user_agent) in user_agents.enumerate() {
            if i > 0 {
                let delay = self.retry_delay();
                debug!("Waiting {:?} before the next attempt", delay);
                sleep(delay).await;
            }

            match self.attempt(url, &origin, user_agent).await {
                Ok(html) => {
                    info!("Target URL accessible with User-Agent: {}", user_agent);
                    return Ok(FetchedPage {
                        url: url.clone(),
                        user_agent: user_agent.clone(),
                        html,
                        attempts,
                    });
                }
                Err(report) => {
                    warn!("{}", report);
                    attempts.push(report);
                }
            }
        }

        Err(FetchError::Exhausted(attempts))
    }

    /// Runs a single attempt: the optional homepage visit, then the target page.
    async fn attempt(
        &self,
        url: &Url,
        origin: &Url,
        user_agent: &str,
    ) -> std::result::Result<String, AttemptReport> {
        let fail = |stage, outcome| AttemptReport {
            user_agent: user_agent.to_string(),
            stage,
            outcome,
        };

        let (fetch_site, referer) = if self.config.warmup {
            let response = self
                .get(origin, user_agent, "none", SEARCH_REFERER)
                .await
                .map_err(|e| fail(FetchStage::Homepage, AttemptOutcome::Network(e.to_string())))?;

            if let Some(outcome) = classify(response.status()) {
                return Err(fail(FetchStage::Homepage, outcome));
            }
            debug!("Homepage accessible with User-Agent: {}", user_agent);

            sleep(self.config.warmup_pause()).await;
            ("same-origin", origin.as_str())
        } else {
            ("none", SEARCH_REFERER)
        };

        let response = self
            .get(url, user_agent, fetch_site, referer)
            .await
            .map_err(|e| fail(FetchStage::Target, AttemptOutcome::Network(e.to_string())))?;

        if let Some(outcome) = classify(response.status()) {
            return Err(fail(FetchStage::Target, outcome));
        }

        let html = response
            .text()
            .await
            .map_err(|e| fail(FetchStage::Target, AttemptOutcome::Network(e.to_string())))?;

        if html.trim().is_empty() {
            return Err(fail(FetchStage::Target, AttemptOutcome::EmptyBody));
        }

        Ok(html)
    }

    /// Sends a GET with the full browser header set.
    async fn get(
        &self,
        url: &Url,
        user_agent: &str,
        fetch_site: &str,
        referer: &str,
    ) -> reqwest::Result<Response> {
        debug!("GET {} (Sec-Fetch-Site: {})", url, fetch_site);

        self.client
            .get(url.as_str())
            .header("User-Agent", user_agent)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9,en;q=0.8")
            .header("Accept-Encoding", "gzip, deflate, br")
            .header("Connection", "keep-alive")
            .header("Upgrade-Insecure-Requests", "1")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", fetch_site)
            .header("Sec-Fetch-User", "?1")
            .header("Cache-Control", "max-age=0")
            .header("DNT", "1")
            .header("Referer", referer)
            .header("sec-ch-ua", r#""Not_A Brand";v="8", "Chromium";v="120", "Microsoft Edge";v="120""#)
            .header("sec-ch-ua-mobile", "?0")
            .header("sec-ch-ua-platform", r#""Windows""#)
            .send()
            .await
    }

    fn retry_delay(&self) -> Duration {
        let min = self.config.retry_delay_min_ms;
        let max = self.config.retry_delay_max_ms.max(min);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

/// The site root of `url`, used for the warm-up visit and as the referer of the target request.
pub fn origin_of(url: &Url) -> Url {
    let mut origin = url.clone();
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);
    origin
}

/// Maps a response status to the reason an attempt failed, or `None` on success.
fn classify(status: StatusCode) -> Option<AttemptOutcome> {
    if status.is_success() {
        None
    } else if status == StatusCode::FORBIDDEN {
        Some(AttemptOutcome::Blocked)
    } else {
        Some(AttemptOutcome::Status(status.as_u16()))
    }
}
