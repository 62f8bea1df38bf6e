//! Amazon product-page scraper.

use std::sync::LazyLock;

use async_trait::async_trait;
use pricewatch_core::Product;
use scraper::{Html, Selector};

use crate::error::ScraperError;
use crate::fetch::HttpFetcher;
use crate::gateway::ProductScraper;
use crate::html::{
    attr, document_title, find_meta_content, first, first_list, looks_like_robot_check,
    normalize_price_text, selectors, table_rows, text_content,
};

/// Containers that hold the buy-box price, most specific first.
static CORE_PRICE: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    selectors(&[
        "#corePriceDisplay_desktop_feature_div",
        "#corePrice_feature_div",
        "#apex_desktop",
    ])
});

/// Legacy price elements still served on some listings.
static PRICEBLOCK: LazyLock<Vec<Selector>> =
    LazyLock::new(|| selectors(&["span#priceblock_dealprice", "span#priceblock_ourprice"]));

static TECH_SPEC_TABLES: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    selectors(&[
        "table#productDetails_techSpec_section_1",
        "table#productDetails_detailBullets_sections1",
    ])
});

static OFFSCREEN_PRICE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.a-offscreen").expect("valid selector"));
static PRICE_WHOLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.a-price-whole").expect("valid selector"));
static PRICE_FRACTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.a-price-fraction").expect("valid selector"));
static PRODUCT_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span#productTitle").expect("valid selector"));
static LANDING_IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img#landingImage").expect("valid selector"));
static FEATURE_BULLETS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#feature-bullets").expect("valid selector"));

pub struct AmazonScraper {
    fetcher: HttpFetcher,
}

impl AmazonScraper {
    #[must_use]
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }

    async fn fetch_page(&self, url: &str) -> Result<String, ScraperError> {
        let html = self.fetcher.fetch_html(url).await?;
        if looks_like_robot_check(&html) {
            return Err(ScraperError::Blocked {
                url: url.to_owned(),
            });
        }
        Ok(html)
    }
}

#[async_trait]
impl ProductScraper for AmazonScraper {
    fn vendor(&self) -> &'static str {
        "amazon"
    }

    async fn scrape_price(&self, url: &str) -> Result<String, ScraperError> {
        let html = self.fetch_page(url).await?;
        extract_price(&html).ok_or_else(|| ScraperError::MissingField {
            field: "price",
            url: url.to_owned(),
        })
    }

    async fn scrape_product_details(&self, url: &str) -> Result<Product, ScraperError> {
        let html = self.fetch_page(url).await?;
        extract_details(&html, url)
    }
}

/// Buy-box price of an Amazon product page as a plain decimal string.
///
/// Tries the accessible `a-offscreen` price inside the core price block,
/// then the visible whole/fraction pair, then the legacy `priceblock_*`
/// elements.
pub(crate) fn extract_price(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let root = doc.root_element();
    let scope = CORE_PRICE
        .iter()
        .find_map(|selector| first(root, selector))
        .unwrap_or(root);

    if let Some(price) = scope
        .select(&OFFSCREEN_PRICE)
        .find_map(|el| normalize_price_text(&text_content(el)))
    {
        return Some(price);
    }

    if let Some(whole) =
        first(scope, &PRICE_WHOLE).and_then(|el| normalize_price_text(&text_content(el)))
    {
        let fraction = first(scope, &PRICE_FRACTION)
            .map(text_content)
            .filter(|f| !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()));
        return Some(match fraction {
            Some(f) if !whole.contains('.') => format!("{whole}.{f}"),
            _ => whole,
        });
    }

    PRICEBLOCK.iter().find_map(|selector| {
        first(root, selector).and_then(|el| normalize_price_text(&text_content(el)))
    })
}

/// Descriptive fields of an Amazon product page.
///
/// # Errors
///
/// Returns [`ScraperError::MissingField`] when no product title can be found.
/// A missing image or specification list is not an error; the product is
/// returned incomplete.
pub(crate) fn extract_details(html: &str, url: &str) -> Result<Product, ScraperError> {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    let product_name = first(root, &PRODUCT_TITLE)
        .map(text_content)
        .filter(|t| !t.is_empty())
        .or_else(|| find_meta_content(&doc, "property", "og:title"))
        .or_else(|| document_title(&doc))
        .ok_or_else(|| ScraperError::MissingField {
            field: "product title",
            url: url.to_owned(),
        })?;

    let image_url = first(root, &LANDING_IMAGE)
        .and_then(|img| attr(img, "data-old-hires").or_else(|| attr(img, "src")))
        .or_else(|| find_meta_content(&doc, "property", "og:image"))
        .unwrap_or_default();

    let mut specifications = first(root, &FEATURE_BULLETS)
        .map(first_list)
        .unwrap_or_default();
    if specifications.is_empty() {
        specifications = TECH_SPEC_TABLES
            .iter()
            .filter_map(|selector| first(root, selector))
            .map(table_rows)
            .find(|rows| !rows.is_empty())
            .unwrap_or_default();
    }

    Ok(Product {
        product_name,
        image_url,
        specifications,
        ..Product::new(url)
    })
}

#[cfg(test)]
#[path = "amazon_test.rs"]
mod tests;
