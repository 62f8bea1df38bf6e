use thiserror::Error;

/// Connection settings for the backing document store.
#[derive(Clone)]
pub struct StoreConfig {
    pub uri: String,
    pub database_name: String,
    pub max_pool_size: u32,
    pub connect_timeout_secs: u64,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("uri", &"[redacted]")
            .field("database_name", &self.database_name)
            .field("max_pool_size", &self.max_pool_size)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl StoreConfig {
    #[must_use]
    pub fn from_app_config(config: &pricewatch_core::AppConfig) -> Self {
        Self {
            uri: config.mongo_uri.clone(),
            database_name: config.database_name.clone(),
            max_pool_size: config.db_max_pool_size,
            connect_timeout_secs: config.db_connect_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid collection name \"{name}\": {reason}")]
    InvalidCollection { name: String, reason: String },

    /// Connect, ping, or index creation failed while opening a session.
    #[error("store unreachable: {0}")]
    Connectivity(#[source] mongodb::error::Error),

    #[error("product not found: {product_url}")]
    NotFound { product_url: String },

    #[error("cannot decode product document {product_url}: {reason}")]
    Decode { product_url: String, reason: String },

    #[error("write rejected for {product_url}: {source}")]
    Write {
        product_url: String,
        #[source]
        source: mongodb::error::Error,
    },

    #[error(transparent)]
    Transport(#[from] mongodb::error::Error),
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub mod document;
pub mod memory;
pub mod mongo;
pub mod session;
pub mod store;

pub use document::{PriceDocument, ProductDocument};
pub use memory::MemoryStore;
pub use mongo::{incomplete_filter, MongoStore};
pub use session::Session;
pub use store::{ProductStore, ProductStream};
