use crate::ProductOffer;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use tracing::{debug, instrument};
use url::Url;

/// The parts of a product card the `DomExtractor` looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfferField {
    Name,
    Brand,
    Price,
    OriginalPrice,
    Discount,
    Rating,
    ReviewCount,
    Image,
    Link,
}

/// The `DomExtractor` struct walks a rendered page for product cards and reads each
/// field from the first matching descendant.
pub struct DomExtractor {
    /// Selectors for the elements treated as product cards.
    card_selectors: Vec<Selector>,
    /// A map of offer fields to the selector used inside a card.
    field_selectors: HashMap<OfferField, Selector>,
}

impl Default for DomExtractor {
    /// Provides the selectors used against storefront listing pages.
    fn default() -> Self {
        let card_selectors = [r#"[class*="product"], [class*="item"], [class*="card"]"#];

        let field_selectors = [
            (OfferField::Name, r#"h1, h2, h3, h4, [class*="title"], [class*="name"]"#),
            (OfferField::Brand, r#"[class*="brand"], [class*="manufacturer"]"#),
            (OfferField::Price, r#"[class*="price"], [class*="cost"]"#),
            (OfferField::OriginalPrice, r#"[class*="original"], [class*="old"], [class*="was"]"#),
            (OfferField::Discount, r#"[class*="discount"], [class*="sale"], [class*="save"]"#),
            (OfferField::Rating, r#"[class*="rating"], [class*="stars"]"#),
            (OfferField::ReviewCount, r#"[class*="review"], [class*="count"]"#),
            (OfferField::Image, "img"),
            (OfferField::Link, "a"),
        ];

        Self::new(card_selectors, field_selectors)
    }
}

impl DomExtractor {
    /// Creates a new `DomExtractor` with the given card and field selectors.
    ///
    /// # Arguments
    ///
    /// * `card_selectors` - CSS selectors for the product card elements.
    /// * `field_selectors` - Pairs of offer fields and the CSS selector used to find them inside a card.
    ///
    /// Selectors that fail to parse are dropped.
    pub fn new(
        card_selectors: impl IntoIterator<Item = impl AsRef<str>>,
        field_selectors: impl IntoIterator<Item = (OfferField, impl AsRef<str>)>,
    ) -> Self {
        let card_selectors = card_selectors
            .into_iter()
            .filter_map(|s| Selector::parse(s.as_ref()).ok())
            .collect();

        let field_selectors = field_selectors
            .into_iter()
            .filter_map(|(field, sel)| {
                Selector::parse(sel.as_ref())
                    .ok()
                    .map(|selector| (field, selector))
            })
            .collect();

        Self {
            card_selectors,
            field_selectors,
        }
    }

    /// Extracts offers from a rendered page.
    ///
    /// # Arguments
    ///
    /// * `html` - The page markup.
    /// * `page_url` - The URL the page was loaded from, used to resolve relative links.
    ///
    /// # Returns
    ///
    /// One offer per card that has both a name and a price, in document order.
    #[instrument(skip_all, fields(html_length = html.len(), page = %page_url))]
    pub fn extract(&self, html: &str, page_url: &Url) -> Vec<ProductOffer> {
        let document = Html::parse_document(html);
        let mut offers = Vec::new();

        for selector in &self.card_selectors {
            for card in document.select(selector) {
                if let Some(offer) = self.extract_card(card, page_url) {
                    offers.push(offer);
                }
            }
        }

        debug!("Found {} offers", offers.len());
        offers
    }

    fn extract_card(&self, card: ElementRef<'_>, page_url: &Url) -> Option<ProductOffer> {
        let name = self.text(card, OfferField::Name)?;
        let price = self.text(card, OfferField::Price)?;

        Some(ProductOffer {
            name,
            brand: self.text(card, OfferField::Brand).unwrap_or_default(),
            price,
            original_price: self.text(card, OfferField::OriginalPrice),
            discount: self.text(card, OfferField::Discount),
            rating: self.text(card, OfferField::Rating),
            review_count: self.text(card, OfferField::ReviewCount),
            image_url: self
                .first(card, OfferField::Image)
                .and_then(|img| {
                    img.value()
                        .attr("src")
                        .filter(|src| !src.trim().is_empty())
                        .or_else(|| img.value().attr("data-src"))
                })
                .and_then(|src| resolve(page_url, src)),
            url: self
                .first(card, OfferField::Link)
                .and_then(|link| link.value().attr("href"))
                .and_then(|href| resolve(page_url, href)),
        })
    }

    fn first<'a>(&self, card: ElementRef<'a>, field: OfferField) -> Option<ElementRef<'a>> {
        let selector = self.field_selectors.get(&field)?;
        card.select(selector).next()
    }

    /// The whitespace-normalized text of the first match for `field`, if non-empty.
    fn text(&self, card: ElementRef<'_>, field: OfferField) -> Option<String> {
        let element = self.first(card, field)?;
        let text = element
            .text()
            .flat_map(str::split_whitespace)
            .collect::<Vec<_>>()
            .join(" ");

        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

fn resolve(base: &Url, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    base.join(reference).ok().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> Url {
        Url::parse("https://www.cigarpage.com/samplers/").unwrap()
    }

    /// Tests extraction of a full product card with relative links.
    #[test]
    fn test_card_extraction() {
        let html = r#"
            <ul>
                <li class="product-tile">
                    <a href="/cigars/my-father-le-bijou.html">
                        <img data-src="/media/le-bijou.jpg">
                    </a>
                    <h3>My Father
                        Le Bijou 1922</h3>
                    <div class="brand">My Father</div>
                    <span class="price">$9.40</span>
                    <span class="was">$11.00</span>
                    <span class="rating">4.8</span>
                </li>
            </ul>
        "#;

        let offers = DomExtractor::default().extract(html, &page_url());

        assert_eq!(offers.len(), 1);
        let offer = &offers[0];
        assert_eq!(offer.name, "My Father Le Bijou 1922");
        assert_eq!(offer.brand, "My Father");
        assert_eq!(offer.price, "$9.40");
        assert_eq!(offer.original_price.as_deref(), Some("$11.00"));
        assert_eq!(offer.rating.as_deref(), Some("4.8"));
        assert_eq!(offer.discount, None);
        assert_eq!(
            offer.image_url.as_deref(),
            Some("https://www.cigarpage.com/media/le-bijou.jpg")
        );
        assert_eq!(
            offer.url.as_deref(),
            Some("https://www.cigarpage.com/cigars/my-father-le-bijou.html")
        );
    }

    /// Tests that cards without a price are skipped.
    #[test]
    fn test_cards_need_name_and_price() {
        let html = r#"
            <div class="card"><h2>Newsletter</h2><p>Sign up</p></div>
            <div class="card"><span class="price">$3.00</span></div>
        "#;

        let offers = DomExtractor::default().extract(html, &page_url());
        assert!(offers.is_empty());
    }

    /// Tests custom selectors and that an unparsable selector is ignored.
    #[test]
    fn test_custom_selectors() {
        let extractor = DomExtractor::new(
            vec!["article.offer", "[[broken"],
            vec![
                (OfferField::Name, ".label"),
                (OfferField::Price, ".amount"),
            ],
        );

        let html = r#"<article class="offer"><b class="label">Sampler</b><i class="amount">$40</i></article>"#;
        let offers = extractor.extract(html, &page_url());

        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].name, "Sampler");
        assert_eq!(offers[0].brand, "");
        assert_eq!(offers[0].image_url, None);
    }

    /// Tests that text split across lines and nested tags reads as one line.
    #[test]
    fn test_text_whitespace_is_collapsed() {
        let html = "<div class=\"product\">\n  <h3>\n    Arturo Fuente\n    <em>Hemingway</em>\n  </h3>\n  <span class=\"price\"> $8.50 </span>\n</div>";

        let offers = DomExtractor::default().extract(html, &page_url());

        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].name, "Arturo Fuente Hemingway");
        assert_eq!(offers[0].price, "$8.50");
    }
}
