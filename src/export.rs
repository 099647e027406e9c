//! CSV rendering of offers and of the diagnostic reports returned when a scrape fails.

use crate::{ProductOffer, Result, ScraperError};
use csv::{QuoteStyle, Terminator, Writer, WriterBuilder};
use std::io;

/// Column titles of the offer CSV, in output order.
pub const OFFER_HEADERS: [&str; 9] = [
    "Name",
    "Brand",
    "Price",
    "Original Price",
    "Discount",
    "Rating",
    "Review Count",
    "Image URL",
    "Product URL",
];

/// Renders offers as CSV text. Every field is quoted.
pub fn offers_to_csv(offers: &[ProductOffer]) -> Result<String> {
    let mut writer = csv_writer();
    writer.write_record(OFFER_HEADERS)?;

    for offer in offers {
        writer.write_record([
            offer.name.as_str(),
            offer.brand.as_str(),
            offer.price.as_str(),
            offer.original_price.as_deref().unwrap_or(""),
            offer.discount.as_deref().unwrap_or(""),
            offer.rating.as_deref().unwrap_or(""),
            offer.review_count.as_deref().unwrap_or(""),
            offer.image_url.as_deref().unwrap_or(""),
            offer.url.as_deref().unwrap_or(""),
        ])?;
    }

    finish(writer)
}

/// The first `len` characters of `html`, followed by `...`.
pub fn html_preview(html: &str, len: usize) -> String {
    let mut preview: String = html.chars().take(len).collect();
    preview.push_str("...");
    preview
}

/// The kind of failure a diagnostic report describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// Every attempt to reach the page was turned away.
    Blocked,
    /// The page loaded but no offers were found in it.
    NoOffers,
    /// Anything else.
    Error,
}

impl ReportKind {
    /// The download name clients use to tell the report kinds apart.
    pub fn filename(&self) -> &'static str {
        match self {
            ReportKind::Blocked => "scraping-status.csv",
            ReportKind::NoOffers => "parsing-results.csv",
            ReportKind::Error => "error-report.csv",
        }
    }

    fn status(&self) -> &'static str {
        match self {
            ReportKind::Blocked => "Blocked",
            ReportKind::NoOffers => "No offers found",
            ReportKind::Error => "Error",
        }
    }
}

/// A two-column `Field,Value` CSV explaining why a scrape produced no offers.
#[derive(Debug, Clone)]
pub struct DiagnosticReport {
    pub kind: ReportKind,
    pub message: String,
    pub details: Option<String>,
    pub target_url: String,
    pub attempts: Vec<String>,
    pub suggestions: Vec<String>,
    pub html_preview: Option<String>,
}

impl DiagnosticReport {
    pub fn new(kind: ReportKind, message: impl Into<String>, target_url: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
            target_url: target_url.into(),
            attempts: Vec::new(),
            suggestions: Vec::new(),
            html_preview: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_attempts(mut self, attempts: impl IntoIterator<Item = impl ToString>) -> Self {
        self.attempts = attempts.into_iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_suggestions(mut self, suggestions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.suggestions = suggestions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_html_preview(mut self, preview: impl Into<String>) -> Self {
        self.html_preview = Some(preview.into());
        self
    }

    pub fn filename(&self) -> &'static str {
        self.kind.filename()
    }

    /// Renders the report, stamped with the current time.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv_writer();
        writer.write_record(["Field", "Value"])?;
        writer.write_record(["Status", self.kind.status()])?;
        writer.write_record(["Message", self.message.as_str()])?;
        if let Some(details) = &self.details {
            writer.write_record(["Details", details.as_str()])?;
        }
        writer.write_record(["Target URL", self.target_url.as_str()])?;
        writer.write_record(["Generated At", chrono::Utc::now().to_rfc3339().as_str()])?;

        for (i, attempt) in self.attempts.iter().enumerate() {
            writer.write_record([format!("Attempt {}", i + 1).as_str(), attempt.as_str()])?;
        }
        for (i, suggestion) in self.suggestions.iter().enumerate() {
            writer.write_record([format!("Suggestion {}", i + 1).as_str(), suggestion.as_str()])?;
        }
        if let Some(preview) = &self.html_preview {
            writer.write_record(["HTML Preview", preview.as_str()])?;
        }

        finish(writer)
    }
}

fn csv_writer() -> Writer<Vec<u8>> {
    WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

fn finish(writer: Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| ScraperError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| ScraperError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offer_csv_quotes_every_field() {
        let mut offer = ProductOffer::new(r#"Rocky Patel "Vintage" 1990"#, "Rocky Patel", "$99.95");
        offer.url = Some("https://www.cigarpage.com/rp-vintage.html".to_string());

        let csv = offers_to_csv(&[offer]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(r#""Name","Brand","Price","Original Price""#));
        assert_eq!(
            lines[1],
            r#""Rocky Patel ""Vintage"" 1990","Rocky Patel","$99.95","","","","","","https://www.cigarpage.com/rp-vintage.html""#
        );
    }

    #[test]
    fn test_offer_csv_keeps_commas_and_newlines_inside_fields() {
        let offer = ProductOffer::new("Box of 20, Toro", "Brand\nName", "$1,299.00");
        let csv = offers_to_csv(&[offer]).unwrap();

        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let record = reader.records().next().unwrap().unwrap();

        assert_eq!(&record[0], "Box of 20, Toro");
        assert_eq!(&record[1], "Brand\nName");
        assert_eq!(&record[2], "$1,299.00");
    }

    #[test]
    fn test_empty_offer_list_is_header_only() {
        let csv = offers_to_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn test_preview_is_char_safe() {
        assert_eq!(html_preview("héllo world", 5), "héllo...");
        assert_eq!(html_preview("ab", 500), "ab...");
    }

    #[test]
    fn test_report_rows() {
        let report = DiagnosticReport::new(ReportKind::Blocked, "Unable to access", "https://x.test/a")
            .with_details("All user agents were blocked")
            .with_attempts(["first", "second"])
            .with_suggestions(["Try again later"]);

        let csv = report.to_csv().unwrap();
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let rows: Vec<(String, String)> = reader
            .records()
            .map(|r| {
                let r = r.unwrap();
                (r[0].to_string(), r[1].to_string())
            })
            .collect();

        assert_eq!(report.filename(), "scraping-status.csv");
        assert_eq!(rows[0], ("Status".to_string(), "Blocked".to_string()));
        assert!(rows.contains(&("Attempt 2".to_string(), "second".to_string())));
        assert!(rows.contains(&("Suggestion 1".to_string(), "Try again later".to_string())));
        assert!(rows.iter().any(|(field, _)| field == "Generated At"));
        assert!(!rows.iter().any(|(field, _)| field == "HTML Preview"));
    }

    #[test]
    fn test_report_filenames() {
        assert_eq!(ReportKind::NoOffers.filename(), "parsing-results.csv");
        assert_eq!(ReportKind::Error.filename(), "error-report.csv");
    }
}
