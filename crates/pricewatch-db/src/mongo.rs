//! MongoDB-backed [`ProductStore`].
//!
//! One collection per user inside a shared database; the collection carries a
//! unique index on `product_url`.

use async_trait::async_trait;
use bson::{doc, Document};
use futures::{StreamExt, TryStreamExt};
use mongodb::options::{IndexOptions, ReturnDocument, UpdateModifications};
use mongodb::{Collection, IndexModel};
use pricewatch_core::{Price, Product};
use rust_decimal::Decimal;

use crate::document::{
    decimal_to_wire, decode_product, encode_price, encode_product, PRICE_FIELDS,
};
use crate::store::{ProductStore, ProductStream};
use crate::StoreError;

/// Name of the unique index on `product_url`.
pub const PRODUCT_URL_INDEX: &str = "product_url_unique";

/// Filter matching any product whose name, image, or specifications are
/// empty or absent.
#[must_use]
pub fn incomplete_filter() -> Document {
    doc! {
        "$or": [
            { "product_name": "" },
            { "product_name": { "$exists": false } },
            { "image_url": "" },
            { "image_url": { "$exists": false } },
            { "specifications": { "$size": 0 } },
            { "specifications": { "$exists": false } },
        ]
    }
}

fn url_filter(product_url: &str) -> Document {
    doc! { "product_url": product_url }
}

/// Splits an encoded product into an update that rewrites the descriptive
/// fields and only seeds price data on insert.
fn descriptive_upsert(mut fields: Document) -> Document {
    let mut on_insert = Document::new();
    for key in PRICE_FIELDS {
        if let Some(value) = fields.remove(key) {
            on_insert.insert(key, value);
        }
    }
    doc! { "$set": fields, "$setOnInsert": on_insert }
}

/// Update pipeline that appends `entry` and folds `value` into the stored
/// bounds in the same write. A missing or zero bound takes `value`.
fn record_pipeline(entry: bson::Bson, value: f64) -> Vec<Document> {
    let unset = |field: &str| doc! { "$eq": [{ "$ifNull": [field, 0.0] }, 0.0] };
    vec![doc! {
        "$set": {
            "price_history": {
                "$concatArrays": [
                    { "$ifNull": ["$price_history", []] },
                    [{ "$literal": entry }],
                ]
            },
            "min_price": {
                "$cond": [
                    { "$or": [unset("$min_price"), { "$lt": [value, "$min_price"] }] },
                    value,
                    "$min_price",
                ]
            },
            "max_price": {
                "$cond": [
                    { "$or": [unset("$max_price"), { "$gt": [value, "$max_price"] }] },
                    value,
                    "$max_price",
                ]
            },
        }
    }]
}

/// Handle to one user's product collection.
///
/// Cheap to clone; clones share the driver's connection pool.
#[derive(Debug, Clone)]
pub struct MongoStore {
    collection: Collection<Document>,
}

impl MongoStore {
    #[must_use]
    pub fn new(collection: Collection<Document>) -> Self {
        Self { collection }
    }

    #[must_use]
    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    /// Creates the unique `product_url` index if it does not already exist.
    ///
    /// # Errors
    ///
    /// Returns the driver error, e.g. when existing documents already violate
    /// uniqueness.
    pub async fn ensure_indexes(&self) -> Result<(), mongodb::error::Error> {
        let model = IndexModel::builder()
            .keys(doc! { "product_url": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name(PRODUCT_URL_INDEX.to_string())
                    .build(),
            )
            .build();
        self.collection.create_index(model).await?;
        Ok(())
    }

    async fn scan_with(&self, filter: Document) -> Result<ProductStream, StoreError> {
        let cursor = self.collection.find(filter).await?;
        Ok(cursor
            .map_err(StoreError::from)
            .and_then(|raw| async move { decode_product(raw) })
            .boxed())
    }

    async fn update_existing(
        &self,
        product_url: &str,
        update: impl Into<UpdateModifications>,
    ) -> Result<(), StoreError> {
        let result = self
            .collection
            .update_one(url_filter(product_url), update)
            .await
            .map_err(|source| StoreError::Write {
                product_url: product_url.to_string(),
                source,
            })?;

        if result.matched_count == 0 {
            return Err(StoreError::NotFound {
                product_url: product_url.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProductStore for MongoStore {
    async fn find_by_url(&self, product_url: &str) -> Result<Product, StoreError> {
        match self.collection.find_one(url_filter(product_url)).await? {
            Some(raw) => decode_product(raw),
            None => Err(StoreError::NotFound {
                product_url: product_url.to_string(),
            }),
        }
    }

    async fn upsert(&self, product: &Product) -> Result<(), StoreError> {
        let update = descriptive_upsert(encode_product(product)?);
        self.collection
            .update_one(url_filter(&product.product_url), update)
            .upsert(true)
            .await
            .map_err(|source| StoreError::Write {
                product_url: product.product_url.clone(),
                source,
            })?;
        Ok(())
    }

    async fn append_price(&self, product_url: &str, price: &Price) -> Result<(), StoreError> {
        let entry = encode_price(product_url, price)?;
        self.update_existing(product_url, doc! { "$push": { "price_history": entry } })
            .await
    }

    async fn update_aggregates(
        &self,
        product_url: &str,
        min_price: Option<Decimal>,
        max_price: Option<Decimal>,
    ) -> Result<(), StoreError> {
        self.update_existing(
            product_url,
            doc! {
                "$set": {
                    "min_price": decimal_to_wire(min_price),
                    "max_price": decimal_to_wire(max_price),
                }
            },
        )
        .await
    }

    async fn record_price(&self, product_url: &str, price: &Price) -> Result<Product, StoreError> {
        let entry = encode_price(product_url, price)?;
        let pipeline = record_pipeline(entry, decimal_to_wire(Some(price.value)));
        let updated = self
            .collection
            .find_one_and_update(url_filter(product_url), pipeline)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| StoreError::Write {
                product_url: product_url.to_string(),
                source,
            })?;

        match updated {
            Some(raw) => decode_product(raw),
            None => Err(StoreError::NotFound {
                product_url: product_url.to_string(),
            }),
        }
    }

    async fn scan(&self) -> Result<ProductStream, StoreError> {
        self.scan_with(doc! {}).await
    }

    async fn scan_incomplete(&self) -> Result<ProductStream, StoreError> {
        self.scan_with(incomplete_filter()).await
    }
}
