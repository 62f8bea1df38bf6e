//! Store session lifecycle: connect, verify liveness, assert indexes, release.

use std::time::Duration;

use bson::{doc, Document};
use mongodb::options::ClientOptions;
use mongodb::Client;

use crate::mongo::MongoStore;
use crate::{StoreConfig, StoreError};

const APP_NAME: &str = "pricewatch";

/// An open connection scoped to one user's collection.
///
/// Call [`Session::close`] on every exit path. Closing twice is a no-op.
pub struct Session {
    client: Option<Client>,
    store: MongoStore,
    user: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("open", &self.client.is_some())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Connects, pings the database, and ensures the unique `product_url`
    /// index exists on the user's collection.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidCollection`] if `user` cannot name a collection.
    /// - [`StoreError::Connectivity`] if the URI is invalid, the server does
    ///   not answer the ping, or index creation fails.
    pub async fn open(config: &StoreConfig, user: &str) -> Result<Self, StoreError> {
        validate_collection_name(user)?;

        let mut options = ClientOptions::parse(config.uri.as_str())
            .await
            .map_err(StoreError::Connectivity)?;
        let timeout = Duration::from_secs(config.connect_timeout_secs);
        options.app_name = Some(APP_NAME.to_string());
        options.max_pool_size = Some(config.max_pool_size);
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);

        let client = Client::with_options(options).map_err(StoreError::Connectivity)?;
        let database = client.database(&config.database_name);

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(StoreError::Connectivity)?;

        let store = MongoStore::new(database.collection::<Document>(user));
        store
            .ensure_indexes()
            .await
            .map_err(StoreError::Connectivity)?;

        tracing::info!(
            database = %config.database_name,
            collection = %user,
            "store session opened"
        );

        Ok(Self {
            client: Some(client),
            store,
            user: user.to_string(),
        })
    }

    /// The user's product collection.
    #[must_use]
    pub fn store(&self) -> &MongoStore {
        &self.store
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.client.is_some()
    }

    /// Releases the connection pool. Idempotent.
    pub async fn close(&mut self) {
        if let Some(client) = self.client.take() {
            client.shutdown().await;
            tracing::info!(collection = %self.user, "store session closed");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.client.is_some() {
            tracing::warn!(
                collection = %self.user,
                "store session dropped without close; connections released lazily"
            );
        }
    }
}

/// Rejects names MongoDB will not accept as a collection.
fn validate_collection_name(name: &str) -> Result<(), StoreError> {
    let reason = if name.trim().is_empty() {
        Some("must not be empty")
    } else if name.contains('$') {
        Some("must not contain '$'")
    } else if name.contains('\0') {
        Some("must not contain NUL")
    } else if name.starts_with("system.") {
        Some("must not start with \"system.\"")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StoreError::InvalidCollection {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}
