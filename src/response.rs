use crate::export::{offers_to_csv, DiagnosticReport, ReportKind};
use crate::fetch::AttemptReport;
use crate::{ErrorFormat, ProductOffer, ScrapeError, ScraperConfig};
use reqwest::StatusCode;
use serde_json::json;
use tracing::error;

/// Advice attached to a blocked scrape.
pub const BLOCKED_SUGGESTIONS: &[&str] = &[
    "The website may have implemented advanced bot detection",
    "Try accessing the site manually in your browser first",
    "Consider using a different approach or contacting the website owners",
    "This is a common issue with modern e-commerce sites",
];

const FAILED_MESSAGE: &str = "Failed to scrape the page. Please try again.";

/// A finished scrape, ready to be written to a file or an HTTP response.
#[derive(Debug, Clone)]
pub struct ScrapeResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    /// Set when the body is meant to be downloaded.
    pub filename: Option<String>,
    pub body: String,
    /// The number of offers in the body; zero for every failure.
    pub offers: usize,
}

impl ScrapeResponse {
    pub fn csv(filename: impl Into<String>, body: String) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: "text/csv",
            filename: Some(filename.into()),
            body,
            offers: 0,
        }
    }

    pub fn json(status: StatusCode, value: serde_json::Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            filename: None,
            body: value.to_string(),
            offers: 0,
        }
    }

    /// Builds the response for the outcome of scraping `target`.
    pub fn from_result(
        result: std::result::Result<Vec<ProductOffer>, ScrapeError>,
        target: &str,
        config: &ScraperConfig,
    ) -> Self {
        match result {
            Ok(offers) => match offers_to_csv(&offers) {
                Ok(body) => Self {
                    offers: offers.len(),
                    ..Self::csv(config.csv_filename.clone(), body)
                },
                Err(e) => Self::from_error(ScrapeError::Failed(e), target, config),
            },
            Err(e) => Self::from_error(e, target, config),
        }
    }

    /// Describes a failed scrape in the configured error format.
    ///
    /// An invalid URL is always answered with a 400 JSON body; there is nothing to report on.
    pub fn from_error(err: ScrapeError, target: &str, config: &ScraperConfig) -> Self {
        let format = config.error_format;

        match err {
            ScrapeError::InvalidUrl(message) => {
                Self::json(StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            ScrapeError::Blocked { url, attempts } => {
                let site = if config.allowed_domains.is_empty() {
                    url.host_str().unwrap_or(config.site_label())
                } else {
                    config.site_label()
                };
                let message = format!(
                    "Unable to access {}. The website is actively blocking automated requests.",
                    site
                );
                let details = blocked_details(&attempts);

                match format {
                    ErrorFormat::Json => Self::json(
                        StatusCode::FORBIDDEN,
                        json!({
                            "error": message,
                            "details": details,
                            "suggestions": BLOCKED_SUGGESTIONS,
                        }),
                    ),
                    ErrorFormat::Csv => Self::report(
                        DiagnosticReport::new(ReportKind::Blocked, message, url.as_str())
                            .with_details(details)
                            .with_attempts(&attempts)
                            .with_suggestions(BLOCKED_SUGGESTIONS.iter().copied()),
                        config,
                    ),
                }
            }
            ScrapeError::NoOffers { url, html_preview } => {
                let message = format!(
                    "No {} offers found on this page. The page structure may have changed or the content is not accessible.",
                    config.item_label.to_lowercase()
                );
                let suggestion = format!(
                    "Try a different {} URL or check if the page requires authentication.",
                    config.site_label()
                );

                match format {
                    ErrorFormat::Json => Self::json(
                        StatusCode::NOT_FOUND,
                        json!({
                            "error": message,
                            "suggestion": suggestion,
                            "htmlPreview": html_preview,
                        }),
                    ),
                    ErrorFormat::Csv => Self::report(
                        DiagnosticReport::new(ReportKind::NoOffers, message, url.as_str())
                            .with_suggestions([suggestion])
                            .with_html_preview(html_preview),
                        config,
                    ),
                }
            }
            ScrapeError::Failed(e) => {
                error!("Scraping error: {}", e);
                let details = e.to_string();

                match format {
                    ErrorFormat::Json => Self::json(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json!({ "error": FAILED_MESSAGE, "details": details }),
                    ),
                    ErrorFormat::Csv => Self::report(
                        DiagnosticReport::new(ReportKind::Error, FAILED_MESSAGE, target)
                            .with_details(details),
                        config,
                    ),
                }
            }
        }
    }

    pub fn is_offers(&self) -> bool {
        self.offers > 0
    }

    fn report(report: DiagnosticReport, config: &ScraperConfig) -> Self {
        match report.to_csv() {
            Ok(body) => Self::csv(report.filename(), body),
            Err(e) => {
                error!("Could not render {}: {}", report.filename(), e);
                Self::from_error(
                    ScrapeError::Failed(e),
                    &report.target_url,
                    &ScraperConfig {
                        error_format: ErrorFormat::Json,
                        ..config.clone()
                    },
                )
            }
        }
    }
}

/// Summarizes why every attempt failed.
fn blocked_details(attempts: &[AttemptReport]) -> String {
    let blocked = attempts.iter().filter(|a| a.is_blocked()).count();

    if attempts.is_empty() {
        "No user agents were tried".to_string()
    } else if blocked == attempts.len() {
        "All user agents and approaches were blocked (403 Forbidden)".to_string()
    } else {
        format!(
            "{} of {} attempts were blocked (403 Forbidden); the others failed",
            blocked,
            attempts.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{AttemptOutcome, FetchStage};
    use url::Url;

    fn attempt(outcome: AttemptOutcome) -> AttemptReport {
        AttemptReport {
            user_agent: "agent".to_string(),
            stage: FetchStage::Target,
            outcome,
        }
    }

    fn json_config() -> ScraperConfig {
        ScraperConfig {
            error_format: ErrorFormat::Json,
            ..Default::default()
        }
    }

    fn blocked() -> ScrapeError {
        ScrapeError::Blocked {
            url: Url::parse("https://www.cigarpage.com/deals").unwrap(),
            attempts: vec![attempt(AttemptOutcome::Blocked), attempt(AttemptOutcome::Blocked)],
        }
    }

    #[test]
    fn test_offers_become_csv_download() {
        let config = ScraperConfig::default();
        let response = ScrapeResponse::from_result(
            Ok(vec![ProductOffer::new("Toro", "Brand", "$5")]),
            "https://www.cigarpage.com/",
            &config,
        );

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.content_type, "text/csv");
        assert_eq!(response.filename.as_deref(), Some("cigar-offers.csv"));
        assert_eq!(response.offers, 1);
        assert!(response.is_offers());
    }

    #[test]
    fn test_invalid_url_is_json_in_both_formats() {
        for config in [ScraperConfig::default(), json_config()] {
            let response = ScrapeResponse::from_error(
                ScrapeError::InvalidUrl("Please provide a valid cigarpage.com URL".to_string()),
                "",
                &config,
            );
            assert_eq!(response.status, StatusCode::BAD_REQUEST);
            let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
            assert_eq!(body["error"], "Please provide a valid cigarpage.com URL");
        }
    }

    #[test]
    fn test_blocked_as_json() {
        let response = ScrapeResponse::from_error(blocked(), "", &json_config());

        assert_eq!(response.status, StatusCode::FORBIDDEN);
        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(
            body["details"],
            "All user agents and approaches were blocked (403 Forbidden)"
        );
        assert_eq!(body["suggestions"].as_array().unwrap().len(), 4);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Unable to access cigarpage.com."));
    }

    #[test]
    fn test_blocked_names_host_when_any_site_is_allowed() {
        let config = ScraperConfig {
            allowed_domains: Vec::new(),
            ..json_config()
        };
        let response = ScrapeResponse::from_error(blocked(), "", &config);

        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Unable to access www.cigarpage.com."));
    }

    #[test]
    fn test_blocked_as_status_csv() {
        let response = ScrapeResponse::from_error(blocked(), "", &ScraperConfig::default());

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.filename.as_deref(), Some("scraping-status.csv"));
        assert!(response.body.contains("target page 403 Forbidden with User-Agent: agent"));
        assert!(!response.is_offers());
    }

    #[test]
    fn test_no_offers_as_json_and_csv() {
        let no_offers = || ScrapeError::NoOffers {
            url: Url::parse("https://www.cigarpage.com/").unwrap(),
            html_preview: "<html>...".to_string(),
        };

        let json = ScrapeResponse::from_error(no_offers(), "", &json_config());
        assert_eq!(json.status, StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_str(&json.body).unwrap();
        assert_eq!(body["htmlPreview"], "<html>...");
        assert!(body["error"].as_str().unwrap().starts_with("No cigar offers found"));

        let csv = ScrapeResponse::from_error(no_offers(), "", &ScraperConfig::default());
        assert_eq!(csv.filename.as_deref(), Some("parsing-results.csv"));
        assert!(csv.body.contains("HTML Preview"));
    }

    #[test]
    fn test_failure_as_error_report() {
        let err = ScrapeError::Failed(crate::ScraperError::RenderError("boom".to_string()));
        let response = ScrapeResponse::from_error(err, "https://www.cigarpage.com/x", &ScraperConfig::default());

        assert_eq!(response.filename.as_deref(), Some("error-report.csv"));
        assert!(response.body.contains("Render failed: boom"));
        assert!(response.body.contains("https://www.cigarpage.com/x"));
    }

    #[test]
    fn test_blocked_details_mixed() {
        let attempts = vec![
            attempt(AttemptOutcome::Blocked),
            attempt(AttemptOutcome::Status(500)),
        ];
        assert_eq!(
            blocked_details(&attempts),
            "1 of 2 attempts were blocked (403 Forbidden); the others failed"
        );
    }
}
