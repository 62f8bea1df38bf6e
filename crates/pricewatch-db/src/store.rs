//! The store contract the catalog service is written against.

use async_trait::async_trait;
use futures::stream::BoxStream;
use pricewatch_core::{Price, Product};
use rust_decimal::Decimal;

use crate::StoreError;

/// Lazy, finite, non-restartable sequence of products from one scan.
///
/// Decode and transport failures surface as `Err` items on the advance that
/// hit them; the stream may keep yielding after a decode failure.
pub type ProductStream = BoxStream<'static, Result<Product, StoreError>>;

/// Per-user product collection, keyed by `product_url`.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Point lookup.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when no document has this URL; anything else
    /// is a transport or decode failure.
    async fn find_by_url(&self, product_url: &str) -> Result<Product, StoreError>;

    /// Writes the descriptive fields of `product`, inserting it when absent.
    ///
    /// `price_history`, `min_price` and `max_price` are only written on
    /// insert. An existing document keeps its stored price data, including
    /// appends that landed after the caller last read it.
    async fn upsert(&self, product: &Product) -> Result<(), StoreError>;

    /// Appends `price` to the product's `price_history`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when no document has this URL.
    async fn append_price(&self, product_url: &str, price: &Price) -> Result<(), StoreError>;

    /// Replaces `min_price`/`max_price`. `None` is written as the sentinel.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when no document has this URL.
    async fn update_aggregates(
        &self,
        product_url: &str,
        min_price: Option<Decimal>,
        max_price: Option<Decimal>,
    ) -> Result<(), StoreError>;

    /// Appends `price` and folds it into `min_price`/`max_price` in ONE
    /// atomic update. The bounds are computed from the stored values at
    /// write time, so concurrent recorders never overwrite each other's
    /// extremes. Returns the product as stored after the update.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when no document has this URL.
    async fn record_price(&self, product_url: &str, price: &Price) -> Result<Product, StoreError>;

    /// Every product in the collection.
    async fn scan(&self) -> Result<ProductStream, StoreError>;

    /// Products with an empty or absent name, image, or specification list.
    async fn scan_incomplete(&self) -> Result<ProductStream, StoreError>;
}
