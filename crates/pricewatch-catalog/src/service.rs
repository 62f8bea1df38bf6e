//! History-preserving upsert, price refresh, and repair over a
//! [`ProductStore`].

use std::future::Future;

use futures::StreamExt;
use pricewatch_core::{parse_price, Price, Product};
use pricewatch_db::{ProductStore, ProductStream, StoreError};
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use crate::error::CatalogError;
use crate::vendor::VendorTable;

/// Counts from one bulk pass. `scanned == updated + skipped` for a run that
/// was not cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub scanned: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Catalog operations for one user's product collection.
///
/// Holds no mutable state; every call reads and writes through the store.
#[derive(Debug, Clone)]
pub struct CatalogService<S> {
    store: S,
    vendors: VendorTable,
}

/// Runs `fut` unless `cancel` fires first.
async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, CatalogError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(CatalogError::Cancelled),
        out = fut => Ok(out),
    }
}

impl<S: ProductStore> CatalogService<S> {
    pub fn new(store: S, vendors: VendorTable) -> Self {
        Self { store, vendors }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn vendors(&self) -> &VendorTable {
        &self.vendors
    }

    /// Writes the descriptive fields of `product`. Price history and min/max
    /// already stored under its URL are kept; a new URL starts from the
    /// product's own price data. Returns the product as stored.
    ///
    /// # Errors
    ///
    /// Write and read-back failures are returned unchanged.
    pub async fn upsert_product(&self, product: Product) -> Result<Product, CatalogError> {
        self.upsert_and_read(&product, &CancellationToken::new()).await
    }

    /// # Errors
    ///
    /// [`CatalogError::NotFound`] when the URL is not tracked.
    pub async fn get_product(&self, product_url: &str) -> Result<Product, CatalogError> {
        Ok(self.store.find_by_url(product_url).await?)
    }

    /// Records `value` as observed now and folds it into min/max, in one
    /// store write. Returns the updated product.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NotFound`] when the URL is not tracked; write
    /// failures are surfaced.
    pub async fn add_price(
        &self,
        product_url: &str,
        value: Decimal,
    ) -> Result<Product, CatalogError> {
        Ok(self
            .store
            .record_price(product_url, &Price::now(value))
            .await?)
    }

    /// Scrapes and records the current price of every tracked product.
    ///
    /// Any failure while handling one product, including store errors, is
    /// logged and skipped. Undecodable documents are skipped the same way.
    ///
    /// # Errors
    ///
    /// [`CatalogError::Cancelled`] when `cancel` fires; store transport
    /// failures while opening or advancing the scan.
    pub async fn refresh_prices(
        &self,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, CatalogError> {
        let mut stream = until_cancelled(cancel, self.store.scan()).await??;
        self.run_pass(&mut stream, cancel, "price refresh", |product| async move {
            let price = self.refresh_one(&product.product_url, cancel).await?;
            tracing::debug!(
                product_url = %product.product_url,
                price = %price.value,
                "price recorded"
            );
            Ok::<(), CatalogError>(())
        })
        .await
    }

    /// Refreshes a single tracked product and returns the recorded price.
    ///
    /// # Errors
    ///
    /// Every failure is surfaced, including [`CatalogError::UnsupportedVendor`].
    pub async fn refresh_product(
        &self,
        product_url: &str,
        cancel: &CancellationToken,
    ) -> Result<Price, CatalogError> {
        until_cancelled(cancel, self.store.find_by_url(product_url)).await??;
        self.refresh_one(product_url, cancel).await
    }

    /// Re-scrapes descriptive fields for products missing a name, image, or
    /// specifications, and upserts them with history preserved.
    ///
    /// # Errors
    ///
    /// Same as [`CatalogService::refresh_prices`].
    pub async fn repair_incomplete(
        &self,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, CatalogError> {
        let mut stream = until_cancelled(cancel, self.store.scan_incomplete()).await??;
        self.run_pass(&mut stream, cancel, "repair", |product| async move {
            let details = self.scrape_details(&product.product_url, cancel).await?;
            until_cancelled(cancel, self.store.upsert(&details)).await??;
            if !details.is_complete() {
                tracing::debug!(
                    product_url = %details.product_url,
                    "product still incomplete after repair"
                );
            }
            Ok::<(), CatalogError>(())
        })
        .await
    }

    /// Scrapes descriptive fields for `product_url` and upserts them. An
    /// already tracked product keeps its price history.
    ///
    /// # Errors
    ///
    /// Every failure is surfaced.
    pub async fn ingest(
        &self,
        product_url: &str,
        cancel: &CancellationToken,
    ) -> Result<Product, CatalogError> {
        let details = self.scrape_details(product_url, cancel).await?;
        self.upsert_and_read(&details, cancel).await
    }

    async fn upsert_and_read(
        &self,
        product: &Product,
        cancel: &CancellationToken,
    ) -> Result<Product, CatalogError> {
        until_cancelled(cancel, self.store.upsert(product)).await??;
        Ok(until_cancelled(cancel, self.store.find_by_url(&product.product_url)).await??)
    }

    async fn scrape_details(
        &self,
        product_url: &str,
        cancel: &CancellationToken,
    ) -> Result<Product, CatalogError> {
        let scraper = self.vendors.resolve(product_url).ok_or_else(|| {
            CatalogError::UnsupportedVendor {
                product_url: product_url.to_string(),
            }
        })?;
        let mut details = until_cancelled(cancel, scraper.scrape_product_details(product_url))
            .await?
            .map_err(|source| CatalogError::Scrape {
                product_url: product_url.to_string(),
                source,
            })?;
        // Keyed on the requested URL, not the scraper's echo.
        details.product_url = product_url.to_string();
        Ok(details)
    }

    async fn refresh_one(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Price, CatalogError> {
        let scraper = self
            .vendors
            .resolve(url)
            .ok_or_else(|| CatalogError::UnsupportedVendor {
                product_url: url.to_string(),
            })?;

        let raw = until_cancelled(cancel, scraper.scrape_price(url))
            .await?
            .map_err(|source| CatalogError::Scrape {
                product_url: url.to_string(),
                source,
            })?;
        let value = parse_price(&raw).map_err(|source| CatalogError::Parse {
            product_url: url.to_string(),
            raw: raw.clone(),
            source,
        })?;

        let price = Price::now(value);
        until_cancelled(cancel, self.store.record_price(url, &price)).await??;
        Ok(price)
    }

    /// Drives `stream` to the end, applying `step` to each product.
    ///
    /// Every failure from `step` other than cancellation is counted and
    /// logged. Errors from the cursor end the pass unless they are tied to
    /// one document.
    async fn run_pass<F, Fut>(
        &self,
        stream: &mut ProductStream,
        cancel: &CancellationToken,
        pass: &'static str,
        step: F,
    ) -> Result<RunSummary, CatalogError>
    where
        F: Fn(Product) -> Fut,
        Fut: Future<Output = Result<(), CatalogError>>,
    {
        let mut summary = RunSummary::default();

        loop {
            if cancel.is_cancelled() {
                tracing::info!(
                    pass,
                    scanned = summary.scanned,
                    updated = summary.updated,
                    skipped = summary.skipped,
                    "pass cancelled"
                );
                return Err(CatalogError::Cancelled);
            }

            let Some(item) = until_cancelled(cancel, stream.next()).await? else {
                break;
            };
            summary.scanned += 1;

            let product = match item {
                Ok(product) => product,
                Err(e) => {
                    let product_url = match &e {
                        StoreError::Decode { product_url, .. } => product_url.clone(),
                        _ => String::new(),
                    };
                    let e = CatalogError::from(e);
                    if !e.is_per_item() {
                        return Err(e);
                    }
                    summary.skipped += 1;
                    tracing::warn!(
                        pass,
                        product_url = %product_url,
                        error = %e,
                        "skipping product"
                    );
                    continue;
                }
            };

            let product_url = product.product_url.clone();
            match step(product).await {
                Ok(()) => summary.updated += 1,
                Err(CatalogError::Cancelled) => {
                    tracing::info!(pass, product_url = %product_url, "pass cancelled mid-item");
                    return Err(CatalogError::Cancelled);
                }
                Err(e) => {
                    summary.skipped += 1;
                    tracing::warn!(
                        pass,
                        product_url = %product_url,
                        error = %e,
                        "skipping product"
                    );
                }
            }
        }

        tracing::info!(
            pass,
            scanned = summary.scanned,
            updated = summary.updated,
            skipped = summary.skipped,
            "pass complete"
        );
        Ok(summary)
    }
}
