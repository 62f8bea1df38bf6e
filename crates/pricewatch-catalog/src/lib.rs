//! Catalog service: keeps a user's tracked products in sync with their
//! vendor pages.
//!
//! - [`CatalogService::upsert_product`] writes descriptive fields without
//!   touching accumulated price history.
//! - [`CatalogService::refresh_prices`] scrapes every product's price through
//!   the [`VendorTable`] and records it together with the new min/max.
//! - [`CatalogService::repair_incomplete`] re-scrapes products that were
//!   ingested without a name, image, or specifications.
//!
//! Bulk passes skip per-item failures and stop on cancellation.

pub mod error;
pub mod service;
pub mod vendor;

pub use error::CatalogError;
pub use service::{CatalogService, RunSummary};
pub use vendor::VendorTable;
