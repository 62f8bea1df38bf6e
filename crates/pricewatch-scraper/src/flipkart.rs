//! Flipkart product-page scraper.
//!
//! Flipkart ships obfuscated, frequently rotated class names. Each field is
//! looked up through a short list of known class selectors and then through a
//! markup-independent fallback (JSON-LD or Open Graph).

use std::sync::LazyLock;

use async_trait::async_trait;
use pricewatch_core::Product;
use regex::Regex;
use scraper::{Html, Selector};

use crate::error::ScraperError;
use crate::fetch::HttpFetcher;
use crate::gateway::ProductScraper;
use crate::html::{
    document_title, find_meta_content, list_items, looks_like_robot_check, normalize_price_text,
    selectors, table_rows, text_content,
};

static PRICE: LazyLock<Vec<Selector>> =
    LazyLock::new(|| selectors(&["div.Nx9bqj", "div._30jeq3"]));
static TITLE: LazyLock<Vec<Selector>> =
    LazyLock::new(|| selectors(&["span.VU-ZEz", "span.B_NuCI"]));
static HIGHLIGHTS: LazyLock<Vec<Selector>> =
    LazyLock::new(|| selectors(&["div.xFVion", "div._2418kt"]));
static SPEC_TABLES: LazyLock<Vec<Selector>> =
    LazyLock::new(|| selectors(&["table._0ZhAN9", "table._14cfVK"]));

static JSON_LD_PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""price"\s*:\s*"?([0-9][0-9,]*(?:\.[0-9]+)?)"?"#).expect("valid regex")
});

pub struct FlipkartScraper {
    fetcher: HttpFetcher,
}

impl FlipkartScraper {
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
impl ProductScraper for FlipkartScraper {
    fn vendor(&self) -> &'static str {
        "flipkart"
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

fn first_text(doc: &Html, candidates: &[Selector]) -> Option<String> {
    candidates.iter().find_map(|selector| {
        doc.select(selector).map(text_content).find(|t| !t.is_empty())
    })
}

/// Selling price of a Flipkart product page as a plain decimal string.
pub(crate) fn extract_price(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    first_text(&doc, &PRICE)
        .and_then(|raw| normalize_price_text(&raw))
        .or_else(|| {
            JSON_LD_PRICE_RE
                .captures(html)
                .and_then(|c| c.get(1))
                .and_then(|m| normalize_price_text(m.as_str()))
        })
}

/// Descriptive fields of a Flipkart product page.
///
/// # Errors
///
/// Returns [`ScraperError::MissingField`] when no product title can be found.
pub(crate) fn extract_details(html: &str, url: &str) -> Result<Product, ScraperError> {
    let doc = Html::parse_document(html);

    let product_name = first_text(&doc, &TITLE)
        .or_else(|| find_meta_content(&doc, "property", "og:title"))
        .or_else(|| document_title(&doc))
        .ok_or_else(|| ScraperError::MissingField {
            field: "product title",
            url: url.to_owned(),
        })?;

    let image_url = find_meta_content(&doc, "property", "og:image")
        .or_else(|| find_meta_content(&doc, "name", "twitter:image"))
        .unwrap_or_default();

    let mut specifications: Vec<String> = SPEC_TABLES
        .iter()
        .flat_map(|selector| doc.select(selector))
        .flat_map(table_rows)
        .collect();
    if specifications.is_empty() {
        specifications = HIGHLIGHTS
            .iter()
            .flat_map(|selector| doc.select(selector))
            .flat_map(list_items)
            .collect();
    }

    Ok(Product {
        product_name,
        image_url,
        specifications,
        ..Product::new(url)
    })
}
