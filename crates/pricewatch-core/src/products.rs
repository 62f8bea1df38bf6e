use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::pricing::next_bounds;

/// One observed price for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub value: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Price {
    /// A price observed right now, at the millisecond precision the store
    /// keeps.
    #[must_use]
    pub fn now(value: Decimal) -> Self {
        Self {
            value,
            timestamp: Utc::now().trunc_subsecs(3),
        }
    }
}

/// A tracked product page in a user's catalog.
///
/// `product_url` is the key. Empty descriptive fields mean the product was
/// ingested incomplete and is a candidate for the repair pass.
///
/// `min_price`/`max_price` are `None` until the first price is observed. The
/// persisted document encodes `None` as `0`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Product {
    pub product_url: String,
    pub product_name: String,
    pub image_url: String,
    pub specifications: Vec<String>,
    /// Append-only, ascending by timestamp.
    pub price_history: Vec<Price>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

impl Product {
    /// An empty product shell for `product_url`: no description, no prices.
    #[must_use]
    pub fn new(product_url: impl Into<String>) -> Self {
        Self {
            product_url: product_url.into(),
            ..Self::default()
        }
    }

    /// `true` when name, image, and at least one specification are present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.product_name.is_empty()
            && !self.image_url.is_empty()
            && !self.specifications.is_empty()
    }

    /// Most recently appended price, if any.
    #[must_use]
    pub fn latest_price(&self) -> Option<&Price> {
        self.price_history.last()
    }

    /// Appends `price` and folds it into the aggregates.
    pub fn record(&mut self, price: Price) {
        let (min, max) = next_bounds(self.min_price, self.max_price, price.value);
        self.min_price = Some(min);
        self.max_price = Some(max);
        self.price_history.push(price);
    }
}
