//! Persisted document shape for a tracked product.
//!
//! Field names here are the wire contract shared with every other writer of
//! the collection. Prices are stored as BSON doubles, timestamps as BSON
//! datetimes, and `0` in `min_price`/`max_price` means "no price yet".

use chrono::{DateTime, SubsecRound, Utc};
use pricewatch_core::{next_bounds, Price, Product};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::StoreError;

/// Fields written only when a product document is first inserted.
pub const PRICE_FIELDS: [&str; 3] = ["price_history", "min_price", "max_price"];

/// One `price_history` entry as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceDocument {
    pub value: f64,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
}

/// A product document as stored in a user's collection.
///
/// Older writers left descriptive fields absent or `null`, so every field
/// other than `product_url` decodes to its empty value in that case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDocument {
    pub product_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub product_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub specifications: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub price_history: Vec<PriceDocument>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub min_price: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub max_price: f64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl From<&Price> for PriceDocument {
    /// BSON datetimes carry milliseconds, so finer precision is dropped here.
    fn from(price: &Price) -> Self {
        Self {
            value: decimal_to_wire(Some(price.value)),
            timestamp: price.timestamp.trunc_subsecs(3),
        }
    }
}

impl ProductDocument {
    /// Appends `price` and folds it into the stored bounds.
    ///
    /// # Errors
    ///
    /// [`StoreError::Decode`] when the stored bounds are negative or not finite.
    pub fn record(&mut self, price: &Price) -> Result<(), StoreError> {
        let min = wire_to_decimal(&self.product_url, "min_price", self.min_price)?;
        let max = wire_to_decimal(&self.product_url, "max_price", self.max_price)?;
        let (min, max) =
            next_bounds(sentinel_to_option(min), sentinel_to_option(max), price.value);

        self.price_history.push(PriceDocument::from(price));
        self.min_price = decimal_to_wire(Some(min));
        self.max_price = decimal_to_wire(Some(max));
        Ok(())
    }

    /// Takes the descriptive fields of `incoming`, keeping stored price data.
    pub fn update_descriptive(&mut self, incoming: ProductDocument) {
        self.product_name = incoming.product_name;
        self.image_url = incoming.image_url;
        self.specifications = incoming.specifications;
    }
}

impl From<&Product> for ProductDocument {
    fn from(product: &Product) -> Self {
        Self {
            product_url: product.product_url.clone(),
            product_name: product.product_name.clone(),
            image_url: product.image_url.clone(),
            specifications: product.specifications.clone(),
            price_history: product.price_history.iter().map(PriceDocument::from).collect(),
            min_price: decimal_to_wire(product.min_price),
            max_price: decimal_to_wire(product.max_price),
        }
    }
}

impl TryFrom<ProductDocument> for Product {
    type Error = StoreError;

    fn try_from(doc: ProductDocument) -> Result<Self, Self::Error> {
        let url = doc.product_url;

        let price_history = doc
            .price_history
            .into_iter()
            .map(|p| {
                let value = wire_to_decimal(&url, "price_history.value", p.value)?;
                Ok(Price {
                    value,
                    timestamp: p.timestamp,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let min_price = sentinel_to_option(wire_to_decimal(&url, "min_price", doc.min_price)?);
        let max_price = sentinel_to_option(wire_to_decimal(&url, "max_price", doc.max_price)?);

        Ok(Product {
            product_url: url,
            product_name: doc.product_name,
            image_url: doc.image_url,
            specifications: doc.specifications,
            price_history,
            min_price,
            max_price,
        })
    }
}

/// Decodes a raw BSON document into a domain [`Product`].
///
/// # Errors
///
/// Returns [`StoreError::Decode`] when the document does not match the
/// persisted shape or carries a negative or non-finite price.
pub fn decode_product(raw: bson::Document) -> Result<Product, StoreError> {
    let product_url = raw
        .get_str("product_url")
        .map_or_else(|_| "<unknown>".to_string(), str::to_string);

    let doc: ProductDocument =
        bson::from_document(raw).map_err(|e| StoreError::Decode {
            product_url: product_url.clone(),
            reason: e.to_string(),
        })?;

    Product::try_from(doc)
}

/// Encodes a domain [`Product`] into the persisted document shape.
///
/// # Errors
///
/// Returns [`StoreError::Decode`] if serialization fails.
pub fn encode_product(product: &Product) -> Result<bson::Document, StoreError> {
    bson::to_document(&ProductDocument::from(product)).map_err(|e| StoreError::Decode {
        product_url: product.product_url.clone(),
        reason: e.to_string(),
    })
}

/// Encodes a single price for a `$push` onto `price_history`.
///
/// # Errors
///
/// Returns [`StoreError::Decode`] if serialization fails.
pub fn encode_price(product_url: &str, price: &Price) -> Result<bson::Bson, StoreError> {
    bson::to_bson(&PriceDocument::from(price)).map_err(|e| StoreError::Decode {
        product_url: product_url.to_string(),
        reason: e.to_string(),
    })
}

/// `None` is written as the `0` sentinel.
#[must_use]
pub fn decimal_to_wire(value: Option<Decimal>) -> f64 {
    value.and_then(|v| v.to_f64()).unwrap_or(0.0)
}

fn wire_to_decimal(product_url: &str, field: &str, value: f64) -> Result<Decimal, StoreError> {
    if !value.is_finite() || value < 0.0 {
        return Err(StoreError::Decode {
            product_url: product_url.to_string(),
            reason: format!("{field} must be a non-negative number, got {value}"),
        });
    }
    Decimal::from_f64(value).ok_or_else(|| StoreError::Decode {
        product_url: product_url.to_string(),
        reason: format!("{field} {value} is out of decimal range"),
    })
}

fn sentinel_to_option(value: Decimal) -> Option<Decimal> {
    if value.is_zero() {
        None
    } else {
        Some(value)
    }
}
