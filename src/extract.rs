use crate::{ProductOffer, ScraperConfig};
use regex::Regex;
use tracing::{debug, instrument};

/// Patterns for product names, most specific first.
pub const NAME_PATTERNS: &[&str] = &[
    r#"(?i)<h[1-6][^>]*class="[^"]*title[^"]*"[^>]*>([^<]+)</h[1-6]>"#,
    r#"(?i)<h[1-6][^>]*class="[^"]*name[^"]*"[^>]*>([^<]+)</h[1-6]>"#,
    r#"(?i)<h[1-6][^>]*>([^<]+)</h[1-6]>"#,
];

/// Patterns for prices, most specific first.
pub const PRICE_PATTERNS: &[&str] = &[
    r#"(?i)<span[^>]*class="[^"]*price[^"]*"[^>]*>([^<]+)</span>"#,
    r#"(?i)<div[^>]*class="[^"]*price[^"]*"[^>]*>([^<]+)</div>"#,
    r#"(?i)<span[^>]*>(\$[0-9,]+\.?[0-9]*)</span>"#,
];

/// Patterns for brands, most specific first.
pub const BRAND_PATTERNS: &[&str] = &[
    r#"(?i)<span[^>]*class="[^"]*brand[^"]*"[^>]*>([^<]+)</span>"#,
    r#"(?i)<div[^>]*class="[^"]*brand[^"]*"[^>]*>([^<]+)</div>"#,
];

pub const PRICE_PLACEHOLDER: &str = "Price not available";
pub const BRAND_PLACEHOLDER: &str = "Brand not available";

/// The raw text fragments found for each field, before they are paired up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub names: Vec<String>,
    pub prices: Vec<String>,
    pub brands: Vec<String>,
}

impl ExtractedFields {
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.prices.is_empty() && self.brands.is_empty()
    }

    /// Pairs the fragments up by position. Missing values are filled with placeholders,
    /// so the number of offers is the length of the longest list.
    pub fn into_offers(self, item_label: &str) -> Vec<ProductOffer> {
        let count = self
            .names
            .len()
            .max(self.prices.len())
            .max(self.brands.len());

        let mut names = self.names.into_iter();
        let mut prices = self.prices.into_iter();
        let mut brands = self.brands.into_iter();

        (0..count)
            .map(|i| {
                ProductOffer::new(
                    names
                        .next()
                        .unwrap_or_else(|| format!("{} {}", item_label, i + 1)),
                    brands
                        .next()
                        .unwrap_or_else(|| BRAND_PLACEHOLDER.to_string()),
                    prices
                        .next()
                        .unwrap_or_else(|| PRICE_PLACEHOLDER.to_string()),
                )
            })
            .collect()
    }
}

/// The `PatternExtractor` struct pulls name, price and brand fragments out of raw HTML
/// with ordered lists of regular expressions.
///
/// Each pattern must capture the text in group 1. Within a field the first pattern that
/// yields anything after filtering wins; later patterns are not consulted.
pub struct PatternExtractor {
    name_patterns: Vec<Regex>,
    price_patterns: Vec<Regex>,
    brand_patterns: Vec<Regex>,
    item_label: String,
    max_name_len: usize,
    max_brand_len: usize,
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new(NAME_PATTERNS, PRICE_PATTERNS, BRAND_PATTERNS)
    }
}

impl PatternExtractor {
    /// Creates a new `PatternExtractor` from pattern sources. Patterns that fail to compile are skipped.
    ///
    /// # Arguments
    ///
    /// * `name_patterns` - Patterns for product names.
    /// * `price_patterns` - Patterns for prices.
    /// * `brand_patterns` - Patterns for brands.
    pub fn new(
        name_patterns: impl IntoIterator<Item = impl AsRef<str>>,
        price_patterns: impl IntoIterator<Item = impl AsRef<str>>,
        brand_patterns: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Self {
        let defaults = ScraperConfig::default();

        Self {
            name_patterns: compile(name_patterns),
            price_patterns: compile(price_patterns),
            brand_patterns: compile(brand_patterns),
            item_label: defaults.item_label,
            max_name_len: defaults.max_name_len,
            max_brand_len: defaults.max_brand_len,
        }
    }

    /// The default patterns with the label and length limits taken from `config`.
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self {
            item_label: config.item_label.clone(),
            max_name_len: config.max_name_len,
            max_brand_len: config.max_brand_len,
            ..Self::default()
        }
    }

    /// Extracts offers from the given HTML string.
    ///
    /// # Returns
    ///
    /// One offer per position in the longest fragment list; empty when nothing matched at all.
    #[instrument(skip(self, html), fields(html_length = html.len()))]
    pub fn extract(&self, html: &str) -> Vec<ProductOffer> {
        self.extract_fields(html).into_offers(&self.item_label)
    }

    /// Collects the filtered fragments for each field without pairing them.
    pub fn extract_fields(&self, html: &str) -> ExtractedFields {
        let names = first_match(&self.name_patterns, html, |name| {
            name.chars().count() < self.max_name_len
        });
        let prices = first_match(&self.price_patterns, html, |price| price.contains('$'));
        let brands = first_match(&self.brand_patterns, html, |brand| {
            brand.chars().count() < self.max_brand_len
        });

        debug!(
            names = names.len(),
            prices = prices.len(),
            brands = brands.len(),
            "Extracted fragments"
        );

        ExtractedFields {
            names,
            prices,
            brands,
        }
    }
}

fn compile(patterns: impl IntoIterator<Item = impl AsRef<str>>) -> Vec<Regex> {
    patterns
        .into_iter()
        .filter_map(|p| Regex::new(p.as_ref()).ok())
        .collect()
}

/// Returns the trimmed, non-empty captures of the first pattern that leaves anything after `keep`.
fn first_match(patterns: &[Regex], html: &str, keep: impl Fn(&str) -> bool) -> Vec<String> {
    for pattern in patterns {
        let values: Vec<String> = pattern
            .captures_iter(html)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|value| !value.is_empty() && keep(value))
            .map(str::to_string)
            .collect();

        if !values.is_empty() {
            debug!("Pattern {} matched {} values", pattern.as_str(), values.len());
            return values;
        }
    }

    Vec::new()
}
