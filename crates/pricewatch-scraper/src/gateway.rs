use async_trait::async_trait;
use pricewatch_core::Product;

use crate::error::ScraperError;

/// A vendor-specific scraper for product pages.
///
/// Implementations do not decide whether a URL belongs to them; vendor
/// selection happens in the caller.
#[async_trait]
pub trait ProductScraper: Send + Sync {
    /// Short vendor name used in log fields.
    fn vendor(&self) -> &'static str;

    /// Current displayed price as a decimal-parseable string.
    async fn scrape_price(&self, url: &str) -> Result<String, ScraperError>;

    /// Descriptive fields for the product at `url`.
    ///
    /// The returned product has `product_url` set to `url` and an empty
    /// `price_history`; min/max are left unset.
    async fn scrape_product_details(&self, url: &str) -> Result<Product, ScraperError>;
}
