use serde::{Deserialize, Serialize};

/// A single product listing pulled out of a page.
///
/// `name`, `brand` and `price` are always set, possibly to placeholder text when the
/// page did not expose them. The remaining fields are only filled by extractors that
/// can see them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductOffer {
    pub name: String,
    pub brand: String,
    pub price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_count: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// The product page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ProductOffer {
    pub fn new(name: impl Into<String>, brand: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            brand: brand.into(),
            price: price.into(),
            original_price: None,
            discount: None,
            rating: None,
            review_count: None,
            image_url: None,
            url: None,
        }
    }
}
