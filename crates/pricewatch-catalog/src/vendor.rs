//! URL-substring dispatch from product URLs to vendor scrapers.

use std::sync::Arc;

use pricewatch_scraper::{AmazonScraper, FlipkartScraper, HttpFetcher, ProductScraper};

/// Ordered `{substring -> scraper}` table. The first entry whose substring
/// occurs in the URL wins.
#[derive(Clone, Default)]
pub struct VendorTable {
    entries: Vec<(String, Arc<dyn ProductScraper>)>,
}

impl std::fmt::Debug for VendorTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.entries
                    .iter()
                    .map(|(needle, scraper)| (needle.as_str(), scraper.vendor())),
            )
            .finish()
    }
}

impl VendorTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The production table: Flipkart, then Amazon, sharing one fetcher.
    #[must_use]
    pub fn standard(fetcher: HttpFetcher) -> Self {
        Self::new()
            .register("flipkart", Arc::new(FlipkartScraper::new(fetcher.clone())))
            .register("amazon", Arc::new(AmazonScraper::new(fetcher)))
    }

    /// Appends an entry. Earlier entries take precedence.
    #[must_use]
    pub fn register(
        mut self,
        needle: impl Into<String>,
        scraper: Arc<dyn ProductScraper>,
    ) -> Self {
        self.entries.push((needle.into(), scraper));
        self
    }

    /// Scraper for `product_url`, or `None` for an unsupported vendor.
    #[must_use]
    pub fn resolve(&self, product_url: &str) -> Option<&Arc<dyn ProductScraper>> {
        self.entries
            .iter()
            .find(|(needle, _)| product_url.contains(needle.as_str()))
            .map(|(_, scraper)| scraper)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
