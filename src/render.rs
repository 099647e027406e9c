use crate::{Result, ScraperConfig, ScraperError};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

/// Produces the markup of a page as a browser would see it.
///
/// Implementations may drive a headless browser; the scraper only needs the final HTML.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &Url) -> Result<String>;
}

/// A renderer that loads the page with a single plain GET and no script execution.
pub struct HttpRenderer {
    client: Client,
    user_agent: String,
}

impl HttpRenderer {
    /// Creates a new `HttpRenderer` that identifies itself with the first configured user agent.
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let user_agent = config
            .user_agents
            .iter()
            .find(|ua| !ua.trim().is_empty())
            .cloned()
            .ok_or_else(|| ScraperError::InvalidConfig("no user agent configured".to_string()))?;

        let client = Client::builder()
            .user_agent(&user_agent)
            .timeout(config.timeout())
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;

        Ok(Self { client, user_agent })
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    #[instrument(skip_all, fields(url = %url))]
    async fn render(&self, url: &Url) -> Result<String> {
        debug!("Loading page with User-Agent: {}", self.user_agent);

        let response = self
            .client
            .get(url.as_str())
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::RenderError(format!(
                "{} answered with status {}",
                url, status
            )));
        }

        Ok(response.text().await?)
    }
}
