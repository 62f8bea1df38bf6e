use pricewatch_core::PriceParseError;
use pricewatch_db::StoreError;
use pricewatch_scraper::ScraperError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("product not found: {product_url}")]
    NotFound { product_url: String },

    #[error("store error: {0}")]
    Store(#[source] StoreError),

    #[error("scrape failed for {product_url}: {source}")]
    Scrape {
        product_url: String,
        #[source]
        source: ScraperError,
    },

    #[error("scraped price \"{raw}\" for {product_url} is not a decimal: {source}")]
    Parse {
        product_url: String,
        raw: String,
        #[source]
        source: PriceParseError,
    },

    #[error("no scraper registered for {product_url}")]
    UnsupportedVendor { product_url: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { product_url } => CatalogError::NotFound { product_url },
            other => CatalogError::Store(other),
        }
    }
}

impl CatalogError {
    /// `true` for failures tied to a single product.
    ///
    /// Bulk passes consult this for errors raised by their cursor: a decode
    /// failure skips one document, while a transport failure ends the run.
    /// Failures while handling a product that was read are always skipped.
    #[must_use]
    pub fn is_per_item(&self) -> bool {
        match self {
            CatalogError::NotFound { .. }
            | CatalogError::Scrape { .. }
            | CatalogError::Parse { .. }
            | CatalogError::UnsupportedVendor { .. } => true,
            CatalogError::Store(e) => {
                matches!(e, StoreError::Write { .. } | StoreError::Decode { .. })
            }
            CatalogError::Cancelled => false,
        }
    }
}
