//! In-process [`ProductStore`] with the same observable semantics as the
//! Mongo adapter.
//!
//! Products are held in their persisted [`ProductDocument`] shape, so the `0`
//! sentinel, `f64` prices, and millisecond timestamps apply here too. Every
//! write happens under one lock, which gives `upsert` and `record_price` the
//! same atomicity as their single-document Mongo updates. Scans iterate in
//! insertion order over a snapshot taken when the scan starts.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::StreamExt;
use pricewatch_core::{Price, Product};
use rust_decimal::Decimal;

use crate::document::{decimal_to_wire, PriceDocument, ProductDocument};
use crate::store::{ProductStore, ProductStream};
use crate::StoreError;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    docs: Arc<Mutex<Vec<ProductDocument>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Raw persisted documents, in insertion order.
    #[must_use]
    pub fn documents(&self) -> Vec<ProductDocument> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ProductDocument>> {
        self.docs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Applies `apply` to the stored document under the lock and returns the
    /// document as left by it.
    fn update_existing<F>(&self, product_url: &str, apply: F) -> Result<ProductDocument, StoreError>
    where
        F: FnOnce(&mut ProductDocument) -> Result<(), StoreError>,
    {
        let mut docs = self.lock();
        let doc = docs
            .iter_mut()
            .find(|d| d.product_url == product_url)
            .ok_or_else(|| StoreError::NotFound {
                product_url: product_url.to_string(),
            })?;
        apply(doc)?;
        Ok(doc.clone())
    }

    fn snapshot<P>(&self, keep: P) -> ProductStream
    where
        P: Fn(&Product) -> bool,
    {
        let items: Vec<Result<Product, StoreError>> = self
            .lock()
            .iter()
            .cloned()
            .map(Product::try_from)
            .filter(|r| r.as_ref().map_or(true, &keep))
            .collect();
        futures::stream::iter(items).boxed()
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn find_by_url(&self, product_url: &str) -> Result<Product, StoreError> {
        let doc = self
            .lock()
            .iter()
            .find(|d| d.product_url == product_url)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                product_url: product_url.to_string(),
            })?;
        Product::try_from(doc)
    }

    async fn upsert(&self, product: &Product) -> Result<(), StoreError> {
        let incoming = ProductDocument::from(product);
        let mut docs = self.lock();
        match docs
            .iter_mut()
            .find(|d| d.product_url == product.product_url)
        {
            Some(existing) => existing.update_descriptive(incoming),
            None => docs.push(incoming),
        }
        Ok(())
    }

    async fn append_price(&self, product_url: &str, price: &Price) -> Result<(), StoreError> {
        let entry = PriceDocument::from(price);
        self.update_existing(product_url, |doc| {
            doc.price_history.push(entry);
            Ok(())
        })?;
        Ok(())
    }

    async fn update_aggregates(
        &self,
        product_url: &str,
        min_price: Option<Decimal>,
        max_price: Option<Decimal>,
    ) -> Result<(), StoreError> {
        self.update_existing(product_url, |doc| {
            doc.min_price = decimal_to_wire(min_price);
            doc.max_price = decimal_to_wire(max_price);
            Ok(())
        })?;
        Ok(())
    }

    async fn record_price(&self, product_url: &str, price: &Price) -> Result<Product, StoreError> {
        let updated = self.update_existing(product_url, |doc| doc.record(price))?;
        Product::try_from(updated)
    }

    async fn scan(&self) -> Result<ProductStream, StoreError> {
        Ok(self.snapshot(|_| true))
    }

    async fn scan_incomplete(&self) -> Result<ProductStream, StoreError> {
        Ok(self.snapshot(|p| !p.is_complete()))
    }
}
