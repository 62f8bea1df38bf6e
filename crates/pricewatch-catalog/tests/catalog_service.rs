//! Behavioral tests for `CatalogService` against the in-memory store.
//!
//! Vendor scrapers are replaced by scripted fakes that record every URL they
//! are asked about, so dispatch and skip behavior can be asserted directly.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::TryStreamExt;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use pricewatch_catalog::{CatalogError, CatalogService, RunSummary, VendorTable};
use pricewatch_core::{Price, Product};
use pricewatch_db::{MemoryStore, ProductStore, ProductStream, StoreError};
use pricewatch_scraper::{ProductScraper, ScraperError};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const AMAZON_URL: &str = "https://www.amazon.in/dp/B0KETTLE";
const AMAZON_URL_2: &str = "https://www.amazon.in/dp/B0TOASTER";
const FLIPKART_URL: &str = "https://www.flipkart.com/acme-phone/p/itm1";
const OTHER_URL: &str = "https://example.com/p";

/// Scraper whose answers are scripted per URL. Unscripted URLs fail with
/// [`ScraperError::Blocked`].
#[derive(Default)]
struct FakeScraper {
    vendor: &'static str,
    prices: Mutex<HashMap<String, String>>,
    details: Mutex<HashMap<String, Product>>,
    price_calls: Mutex<Vec<String>>,
    detail_calls: Mutex<Vec<String>>,
    /// When set, `scrape_price` cancels this token and never completes.
    cancel_on_price: Option<CancellationToken>,
}

impl FakeScraper {
    fn new(vendor: &'static str) -> Arc<Self> {
        Arc::new(Self {
            vendor,
            ..Self::default()
        })
    }

    fn cancelling(vendor: &'static str, token: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            vendor,
            cancel_on_price: Some(token),
            ..Self::default()
        })
    }

    fn set_price(&self, url: &str, raw: &str) {
        self.prices
            .lock()
            .unwrap()
            .insert(url.to_string(), raw.to_string());
    }

    fn set_details(&self, url: &str, product: Product) {
        self.details
            .lock()
            .unwrap()
            .insert(url.to_string(), product);
    }

    fn price_calls(&self) -> Vec<String> {
        self.price_calls.lock().unwrap().clone()
    }

    fn detail_calls(&self) -> Vec<String> {
        self.detail_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProductScraper for FakeScraper {
    fn vendor(&self) -> &'static str {
        self.vendor
    }

    async fn scrape_price(&self, url: &str) -> Result<String, ScraperError> {
        self.price_calls.lock().unwrap().push(url.to_string());
        if let Some(token) = &self.cancel_on_price {
            token.cancel();
            std::future::pending::<()>().await;
        }
        self.prices
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| ScraperError::Blocked {
                url: url.to_string(),
            })
    }

    async fn scrape_product_details(&self, url: &str) -> Result<Product, ScraperError> {
        self.detail_calls.lock().unwrap().push(url.to_string());
        self.details
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| ScraperError::MissingField {
                field: "product title",
                url: url.to_string(),
            })
    }
}

/// Scraper that commits a competing price through the store while its own
/// scrape is in flight, as a second refresher would.
struct RacingScraper {
    store: MemoryStore,
    competing: Decimal,
    answer: &'static str,
}

#[async_trait]
impl ProductScraper for RacingScraper {
    fn vendor(&self) -> &'static str {
        "amazon"
    }

    async fn scrape_price(&self, url: &str) -> Result<String, ScraperError> {
        self.store
            .record_price(url, &Price::now(self.competing))
            .await
            .unwrap();
        Ok(self.answer.to_string())
    }

    async fn scrape_product_details(&self, url: &str) -> Result<Product, ScraperError> {
        Err(ScraperError::Blocked {
            url: url.to_string(),
        })
    }
}

/// Delegates to a [`MemoryStore`], optionally failing writes for one URL or
/// recording a competing price just before each upsert lands.
#[derive(Default)]
struct HookedStore {
    inner: MemoryStore,
    failing: Option<(String, fn(&str) -> StoreError)>,
    price_before_upsert: Option<Decimal>,
}

impl HookedStore {
    fn failing(inner: MemoryStore, url: &str, fail: fn(&str) -> StoreError) -> Self {
        Self {
            inner,
            failing: Some((url.to_string(), fail)),
            ..Self::default()
        }
    }

    fn interleaving(inner: MemoryStore, competing: Decimal) -> Self {
        Self {
            inner,
            price_before_upsert: Some(competing),
            ..Self::default()
        }
    }

    fn check(&self, product_url: &str) -> Result<(), StoreError> {
        match &self.failing {
            Some((url, fail)) if url == product_url => Err(fail(product_url)),
            _ => Ok(()),
        }
    }
}

fn rejected(product_url: &str) -> StoreError {
    StoreError::Write {
        product_url: product_url.to_string(),
        source: std::io::Error::other("document failed validation").into(),
    }
}

fn connection_reset(_product_url: &str) -> StoreError {
    StoreError::Transport(std::io::Error::other("connection reset").into())
}

#[async_trait]
impl ProductStore for HookedStore {
    async fn find_by_url(&self, product_url: &str) -> Result<Product, StoreError> {
        self.inner.find_by_url(product_url).await
    }

    async fn upsert(&self, product: &Product) -> Result<(), StoreError> {
        self.check(&product.product_url)?;
        if let Some(value) = self.price_before_upsert {
            match self
                .inner
                .record_price(&product.product_url, &Price::now(value))
                .await
            {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        self.inner.upsert(product).await
    }

    async fn append_price(&self, product_url: &str, price: &Price) -> Result<(), StoreError> {
        self.check(product_url)?;
        self.inner.append_price(product_url, price).await
    }

    async fn update_aggregates(
        &self,
        product_url: &str,
        min_price: Option<Decimal>,
        max_price: Option<Decimal>,
    ) -> Result<(), StoreError> {
        self.check(product_url)?;
        self.inner
            .update_aggregates(product_url, min_price, max_price)
            .await
    }

    async fn record_price(&self, product_url: &str, price: &Price) -> Result<Product, StoreError> {
        self.check(product_url)?;
        self.inner.record_price(product_url, price).await
    }

    async fn scan(&self) -> Result<ProductStream, StoreError> {
        self.inner.scan().await
    }

    async fn scan_incomplete(&self) -> Result<ProductStream, StoreError> {
        self.inner.scan_incomplete().await
    }
}

struct Harness {
    store: MemoryStore,
    amazon: Arc<FakeScraper>,
    flipkart: Arc<FakeScraper>,
    service: CatalogService<MemoryStore>,
}

fn harness() -> Harness {
    harness_with(FakeScraper::new("flipkart"), FakeScraper::new("amazon"))
}

fn harness_with(flipkart: Arc<FakeScraper>, amazon: Arc<FakeScraper>) -> Harness {
    let store = MemoryStore::new();
    let vendors = VendorTable::new()
        .register("flipkart", Arc::clone(&flipkart) as Arc<dyn ProductScraper>)
        .register("amazon", Arc::clone(&amazon) as Arc<dyn ProductScraper>);
    Harness {
        service: CatalogService::new(store.clone(), vendors),
        store,
        amazon,
        flipkart,
    }
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn described(url: &str, name: &str) -> Product {
    Product {
        product_url: url.to_string(),
        product_name: name.to_string(),
        image_url: format!("https://img.example/{name}.jpg"),
        specifications: vec![format!("{name} spec")],
        ..Product::default()
    }
}

fn with_history(url: &str, values: &[&str]) -> Product {
    let mut product = described(url, "seeded");
    for (i, v) in values.iter().enumerate() {
        product.record(Price {
            value: dec(v),
            timestamp: t(i64::try_from(i).unwrap()),
        });
    }
    product
}

fn values(product: &Product) -> Vec<Decimal> {
    product.price_history.iter().map(|p| p.value).collect()
}

async fn all_products(store: &MemoryStore) -> Vec<Product> {
    store.scan().await.unwrap().try_collect().await.unwrap()
}

// ---------------------------------------------------------------------------
// Upsert protocol
// ---------------------------------------------------------------------------

#[tokio::test]
async fn new_product_is_stored_with_empty_history_and_sentinel_aggregates() {
    let h = harness();

    h.service
        .upsert_product(described("https://amazon.x/p/1", "A"))
        .await
        .unwrap();

    let docs = h.store.documents();
    assert_eq!(docs.len(), 1);
    assert!(docs[0].price_history.is_empty());
    assert!(docs[0].min_price == 0.0 && docs[0].max_price == 0.0);
}

#[tokio::test]
async fn reingest_replaces_description_but_keeps_history() {
    let h = harness();
    let url = "https://amazon.x/p/1";
    h.service.upsert_product(described(url, "A")).await.unwrap();
    h.store
        .append_price(
            url,
            &Price {
                value: dec("100"),
                timestamp: t(1),
            },
        )
        .await
        .unwrap();

    let written = h.service.upsert_product(described(url, "A2")).await.unwrap();

    let stored = h.service.get_product(url).await.unwrap();
    assert_eq!(stored, written);
    assert_eq!(stored.product_name, "A2");
    assert_eq!(stored.image_url, "https://img.example/A2.jpg");
    assert_eq!(
        stored.price_history,
        vec![Price {
            value: dec("100"),
            timestamp: t(1)
        }]
    );
}

#[tokio::test]
async fn repeated_reupserts_never_touch_price_state() {
    let h = harness();
    let seeded = with_history(AMAZON_URL, &["100", "80"]);
    h.store.upsert(&seeded).await.unwrap();

    for name in ["B", "C", "D", "E"] {
        let mut incoming = described(AMAZON_URL, name);
        // Incoming history and aggregates are ignored for a tracked URL.
        incoming.record(Price::now(dec("1")));
        h.service.upsert_product(incoming).await.unwrap();
    }

    let stored = h.service.get_product(AMAZON_URL).await.unwrap();
    assert_eq!(stored.product_name, "E");
    assert_eq!(stored.price_history, seeded.price_history);
    assert_eq!(stored.min_price, Some(dec("80")));
    assert_eq!(stored.max_price, Some(dec("100")));
}

#[tokio::test]
async fn reupsert_keeps_a_price_recorded_while_it_was_in_flight() {
    let inner = MemoryStore::new();
    inner
        .upsert(&with_history(AMAZON_URL, &["100"]))
        .await
        .unwrap();
    let service = CatalogService::new(
        HookedStore::interleaving(inner.clone(), dec("55")),
        VendorTable::new(),
    );

    let written = service
        .upsert_product(described(AMAZON_URL, "K2"))
        .await
        .unwrap();

    let stored = inner.find_by_url(AMAZON_URL).await.unwrap();
    assert_eq!(written, stored);
    assert_eq!(stored.product_name, "K2");
    assert_eq!(values(&stored), vec![dec("100"), dec("55")]);
    assert_eq!(stored.min_price, Some(dec("55")));
    assert_eq!(stored.max_price, Some(dec("100")));
}

#[tokio::test]
async fn back_to_back_upserts_leave_identical_documents() {
    let h = harness();
    let product = described(AMAZON_URL, "Kettle");

    h.service.upsert_product(product.clone()).await.unwrap();
    let once = h.store.documents();
    h.service.upsert_product(product).await.unwrap();

    assert_eq!(h.store.documents(), once);
    assert_eq!(h.store.len(), 1);
}

#[tokio::test]
async fn get_product_surfaces_not_found() {
    let h = harness();
    let err = h.service.get_product(AMAZON_URL).await.unwrap_err();
    assert!(matches!(err, CatalogError::NotFound { .. }), "got {err:?}");
}

// ---------------------------------------------------------------------------
// add_price
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_price_appends_and_maintains_aggregates() {
    let h = harness();
    h.service
        .upsert_product(described(AMAZON_URL, "Kettle"))
        .await
        .unwrap();

    h.service.add_price(AMAZON_URL, dec("500")).await.unwrap();
    let returned = h.service.add_price(AMAZON_URL, dec("450")).await.unwrap();

    let stored = h.service.get_product(AMAZON_URL).await.unwrap();
    assert_eq!(values(&stored), vec![dec("500"), dec("450")]);
    assert_eq!(stored.min_price, Some(dec("450")));
    assert_eq!(stored.max_price, Some(dec("500")));
    assert_eq!(values(&returned), values(&stored));
}

#[tokio::test]
async fn add_price_to_untracked_url_is_not_found() {
    let h = harness();
    let err = h.service.add_price(AMAZON_URL, dec("1")).await.unwrap_err();
    assert!(matches!(err, CatalogError::NotFound { .. }), "got {err:?}");
    assert!(h.store.is_empty());
}

// ---------------------------------------------------------------------------
// Refresh pipeline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refresh_appends_price_and_widens_max() {
    let h = harness();
    let seeded = with_history(AMAZON_URL, &["100", "80"]);
    h.store.upsert(&seeded).await.unwrap();
    h.amazon.set_price(AMAZON_URL, "120");

    let summary = h
        .service
        .refresh_prices(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        summary,
        RunSummary {
            scanned: 1,
            updated: 1,
            skipped: 0
        }
    );
    let stored = h.service.get_product(AMAZON_URL).await.unwrap();
    assert_eq!(values(&stored), vec![dec("100"), dec("80"), dec("120")]);
    assert_eq!(stored.min_price, Some(dec("80")));
    assert_eq!(stored.max_price, Some(dec("120")));
    assert!(stored.price_history[2].timestamp >= stored.price_history[1].timestamp);
}

#[tokio::test]
async fn first_observation_collapses_sentinel_to_price() {
    let h = harness();
    h.service
        .upsert_product(described(AMAZON_URL, "Kettle"))
        .await
        .unwrap();
    h.amazon.set_price(AMAZON_URL, "50");

    h.service
        .refresh_prices(&CancellationToken::new())
        .await
        .unwrap();

    let stored = h.service.get_product(AMAZON_URL).await.unwrap();
    assert_eq!(stored.min_price, Some(dec("50")));
    assert_eq!(stored.max_price, Some(dec("50")));
    assert_eq!(values(&stored), vec![dec("50")]);
}

#[tokio::test]
async fn unsupported_vendor_is_skipped_without_scraping() {
    let h = harness();
    h.service
        .upsert_product(described(OTHER_URL, "Widget"))
        .await
        .unwrap();

    let summary = h
        .service
        .refresh_prices(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert!(h.amazon.price_calls().is_empty());
    assert!(h.flipkart.price_calls().is_empty());
    let stored = h.service.get_product(OTHER_URL).await.unwrap();
    assert!(stored.price_history.is_empty());
}

#[tokio::test]
async fn parse_failure_skips_item_and_pipeline_continues() {
    let h = harness();
    h.service
        .upsert_product(described(AMAZON_URL, "Kettle"))
        .await
        .unwrap();
    h.service
        .upsert_product(described(AMAZON_URL_2, "Toaster"))
        .await
        .unwrap();
    h.amazon.set_price(AMAZON_URL, "not-a-number");
    h.amazon.set_price(AMAZON_URL_2, "42");

    let summary = h
        .service
        .refresh_prices(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        summary,
        RunSummary {
            scanned: 2,
            updated: 1,
            skipped: 1
        }
    );
    let first = h.service.get_product(AMAZON_URL).await.unwrap();
    assert!(first.price_history.is_empty());
    assert_eq!(first.min_price, None);
    let second = h.service.get_product(AMAZON_URL_2).await.unwrap();
    assert_eq!(values(&second), vec![dec("42")]);
}

#[tokio::test]
async fn scrape_failure_skips_item_and_pipeline_continues() {
    let h = harness();
    h.service
        .upsert_product(described(FLIPKART_URL, "Phone"))
        .await
        .unwrap();
    h.service
        .upsert_product(described(AMAZON_URL, "Kettle"))
        .await
        .unwrap();
    // Flipkart has no scripted price and fails with a robot check.
    h.amazon.set_price(AMAZON_URL, "999");

    let summary = h
        .service
        .refresh_prices(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.updated, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(h.flipkart.price_calls(), vec![FLIPKART_URL]);
    let kettle = h.service.get_product(AMAZON_URL).await.unwrap();
    assert_eq!(values(&kettle), vec![dec("999")]);
}

#[tokio::test]
async fn each_url_is_dispatched_to_exactly_its_vendor() {
    let h = harness();
    for url in [FLIPKART_URL, AMAZON_URL, OTHER_URL] {
        h.service.upsert_product(described(url, "p")).await.unwrap();
    }
    h.flipkart.set_price(FLIPKART_URL, "10");
    h.amazon.set_price(AMAZON_URL, "20");

    h.service
        .refresh_prices(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(h.flipkart.price_calls(), vec![FLIPKART_URL]);
    assert_eq!(h.amazon.price_calls(), vec![AMAZON_URL]);
}

#[tokio::test]
async fn repeated_refreshes_only_extend_history() {
    let h = harness();
    h.service
        .upsert_product(described(AMAZON_URL, "Kettle"))
        .await
        .unwrap();

    let mut previous: Vec<Price> = Vec::new();
    for raw in ["30", "10", "20"] {
        h.amazon.set_price(AMAZON_URL, raw);
        h.service
            .refresh_prices(&CancellationToken::new())
            .await
            .unwrap();

        let stored = h.service.get_product(AMAZON_URL).await.unwrap();
        assert_eq!(stored.price_history.len(), previous.len() + 1);
        assert_eq!(stored.price_history[..previous.len()], previous[..]);

        let min = stored.price_history.iter().map(|p| p.value).min();
        let max = stored.price_history.iter().map(|p| p.value).max();
        assert_eq!(stored.min_price, min);
        assert_eq!(stored.max_price, max);
        previous = stored.price_history;
    }

    assert_eq!(
        values(&h.service.get_product(AMAZON_URL).await.unwrap()),
        vec![dec("30"), dec("10"), dec("20")]
    );
}

#[tokio::test]
async fn rejected_write_is_skipped_during_refresh() {
    let amazon = FakeScraper::new("amazon");
    amazon.set_price(AMAZON_URL, "10");
    amazon.set_price(AMAZON_URL_2, "20");
    let inner = MemoryStore::new();
    inner.upsert(&described(AMAZON_URL, "Kettle")).await.unwrap();
    inner
        .upsert(&described(AMAZON_URL_2, "Toaster"))
        .await
        .unwrap();

    let service = CatalogService::new(
        HookedStore::failing(inner.clone(), AMAZON_URL, rejected),
        VendorTable::new().register("amazon", amazon as Arc<dyn ProductScraper>),
    );

    let summary = service
        .refresh_prices(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.updated, 1);
    assert_eq!(summary.skipped, 1);
    let toaster = inner.find_by_url(AMAZON_URL_2).await.unwrap();
    assert_eq!(values(&toaster), vec![dec("20")]);
}

#[tokio::test]
async fn store_transport_failure_is_skipped_during_refresh() {
    let amazon = FakeScraper::new("amazon");
    amazon.set_price(AMAZON_URL, "10");
    amazon.set_price(AMAZON_URL_2, "20");
    let inner = MemoryStore::new();
    inner.upsert(&described(AMAZON_URL, "Kettle")).await.unwrap();
    inner
        .upsert(&described(AMAZON_URL_2, "Toaster"))
        .await
        .unwrap();
    let service = CatalogService::new(
        HookedStore::failing(inner.clone(), AMAZON_URL, connection_reset),
        VendorTable::new().register("amazon", amazon as Arc<dyn ProductScraper>),
    );

    let summary = service
        .refresh_prices(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        summary,
        RunSummary {
            scanned: 2,
            updated: 1,
            skipped: 1
        }
    );
    let toaster = inner.find_by_url(AMAZON_URL_2).await.unwrap();
    assert_eq!(values(&toaster), vec![dec("20")]);
}

#[tokio::test]
async fn concurrent_refresh_cannot_narrow_the_bounds() {
    let store = MemoryStore::new();
    store
        .upsert(&with_history(AMAZON_URL, &["100", "80"]))
        .await
        .unwrap();
    let racing = Arc::new(RacingScraper {
        store: store.clone(),
        competing: dec("120"),
        answer: "110",
    });
    let service = CatalogService::new(
        store.clone(),
        VendorTable::new().register("amazon", racing as Arc<dyn ProductScraper>),
    );

    service
        .refresh_prices(&CancellationToken::new())
        .await
        .unwrap();

    let stored = store.find_by_url(AMAZON_URL).await.unwrap();
    assert_eq!(
        values(&stored),
        vec![dec("100"), dec("80"), dec("120"), dec("110")]
    );
    assert_eq!(stored.min_price, Some(dec("80")));
    assert_eq!(stored.max_price, Some(dec("120")));
}

#[tokio::test]
async fn undecodable_document_is_skipped_during_refresh() {
    let h = harness();
    let mut broken = described(AMAZON_URL, "Kettle");
    broken.min_price = Some(dec("-5"));
    h.store.upsert(&broken).await.unwrap();
    h.service
        .upsert_product(described(AMAZON_URL_2, "Toaster"))
        .await
        .unwrap();
    h.amazon.set_price(AMAZON_URL, "10");
    h.amazon.set_price(AMAZON_URL_2, "20");

    let summary = h
        .service
        .refresh_prices(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        summary,
        RunSummary {
            scanned: 2,
            updated: 1,
            skipped: 1
        }
    );
    assert_eq!(h.amazon.price_calls(), vec![AMAZON_URL_2]);
}

#[tokio::test]
async fn refresh_product_surfaces_every_failure() {
    let h = harness();
    let cancel = CancellationToken::new();
    h.service
        .upsert_product(described(OTHER_URL, "Widget"))
        .await
        .unwrap();
    h.service
        .upsert_product(described(AMAZON_URL, "Kettle"))
        .await
        .unwrap();
    h.amazon.set_price(AMAZON_URL, "abc");

    let err = h
        .service
        .refresh_product(OTHER_URL, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::UnsupportedVendor { .. }), "got {err:?}");

    let err = h
        .service
        .refresh_product(AMAZON_URL, &cancel)
        .await
        .unwrap_err();
    assert!(
        matches!(err, CatalogError::Parse { ref raw, .. } if raw == "abc"),
        "got {err:?}"
    );

    let err = h
        .service
        .refresh_product(FLIPKART_URL, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::NotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn refresh_product_records_and_returns_price() {
    let h = harness();
    h.service
        .upsert_product(described(FLIPKART_URL, "Phone"))
        .await
        .unwrap();
    h.flipkart.set_price(FLIPKART_URL, "17999");

    let price = h
        .service
        .refresh_product(FLIPKART_URL, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(price.value, dec("17999"));
    let stored = h.service.get_product(FLIPKART_URL).await.unwrap();
    assert_eq!(stored.latest_price(), Some(&price));
}

// ---------------------------------------------------------------------------
// Repair pass
// ---------------------------------------------------------------------------

#[tokio::test]
async fn repair_fills_incomplete_products_and_keeps_history() {
    let h = harness();
    let mut shell = Product::new(AMAZON_URL);
    shell.record(Price {
        value: dec("700"),
        timestamp: t(0),
    });
    h.store.upsert(&shell).await.unwrap();
    h.store
        .upsert(&described(FLIPKART_URL, "Complete"))
        .await
        .unwrap();
    h.amazon.set_details(AMAZON_URL, described(AMAZON_URL, "Kettle"));

    let summary = h
        .service
        .repair_incomplete(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        summary,
        RunSummary {
            scanned: 1,
            updated: 1,
            skipped: 0
        }
    );
    assert!(h.flipkart.detail_calls().is_empty());
    let repaired = h.service.get_product(AMAZON_URL).await.unwrap();
    assert!(repaired.is_complete());
    assert_eq!(repaired.product_name, "Kettle");
    assert_eq!(repaired.price_history, shell.price_history);
    assert_eq!(repaired.min_price, Some(dec("700")));
}

#[tokio::test]
async fn repair_skips_failures_and_finishes_the_scan() {
    let h = harness();
    for url in [OTHER_URL, FLIPKART_URL, AMAZON_URL] {
        h.store.upsert(&Product::new(url)).await.unwrap();
    }
    // Flipkart details are unscripted and fail.
    h.amazon.set_details(AMAZON_URL, described(AMAZON_URL, "Kettle"));

    let summary = h
        .service
        .repair_incomplete(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        summary,
        RunSummary {
            scanned: 3,
            updated: 1,
            skipped: 2
        }
    );
    assert_eq!(h.flipkart.detail_calls(), vec![FLIPKART_URL]);
    let incomplete: Vec<String> = all_products(&h.store)
        .await
        .into_iter()
        .filter(|p| !p.is_complete())
        .map(|p| p.product_url)
        .collect();
    assert_eq!(incomplete, vec![OTHER_URL, FLIPKART_URL]);
}

#[tokio::test]
async fn store_failure_during_repair_skips_only_that_product() {
    let amazon = FakeScraper::new("amazon");
    amazon.set_details(AMAZON_URL, described(AMAZON_URL, "Kettle"));
    amazon.set_details(AMAZON_URL_2, described(AMAZON_URL_2, "Toaster"));
    let inner = MemoryStore::new();
    inner.upsert(&Product::new(AMAZON_URL)).await.unwrap();
    inner.upsert(&Product::new(AMAZON_URL_2)).await.unwrap();
    let service = CatalogService::new(
        HookedStore::failing(inner.clone(), AMAZON_URL, connection_reset),
        VendorTable::new().register("amazon", amazon as Arc<dyn ProductScraper>),
    );

    let summary = service
        .repair_incomplete(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        summary,
        RunSummary {
            scanned: 2,
            updated: 1,
            skipped: 1
        }
    );
    assert!(!inner.find_by_url(AMAZON_URL).await.unwrap().is_complete());
    assert!(inner.find_by_url(AMAZON_URL_2).await.unwrap().is_complete());
}

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ingest_scrapes_details_for_a_new_url() {
    let h = harness();
    let canonical = "https://www.flipkart.com/canonical/p/itm1";
    h.flipkart
        .set_details(FLIPKART_URL, described(canonical, "Phone"));

    let product = h
        .service
        .ingest(FLIPKART_URL, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(product.product_url, FLIPKART_URL);
    assert_eq!(product.product_name, "Phone");
    assert_eq!(h.store.len(), 1);
    assert!(h.service.get_product(canonical).await.is_err());
}

#[tokio::test]
async fn ingest_of_tracked_url_keeps_history() {
    let h = harness();
    let seeded = with_history(AMAZON_URL, &["250"]);
    h.store.upsert(&seeded).await.unwrap();
    h.amazon.set_details(AMAZON_URL, described(AMAZON_URL, "Renamed"));

    let product = h
        .service
        .ingest(AMAZON_URL, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(product.product_name, "Renamed");
    assert_eq!(product.price_history, seeded.price_history);
    assert_eq!(h.service.get_product(AMAZON_URL).await.unwrap(), product);
}

#[tokio::test]
async fn ingest_of_unsupported_vendor_writes_nothing() {
    let h = harness();
    let err = h
        .service
        .ingest(OTHER_URL, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::UnsupportedVendor { .. }), "got {err:?}");
    assert!(h.store.is_empty());
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancelled_token_stops_refresh_before_any_scrape() {
    let h = harness();
    h.service
        .upsert_product(described(AMAZON_URL, "Kettle"))
        .await
        .unwrap();
    h.amazon.set_price(AMAZON_URL, "10");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h.service.refresh_prices(&cancel).await.unwrap_err();

    assert!(matches!(err, CatalogError::Cancelled), "got {err:?}");
    assert!(h.amazon.price_calls().is_empty());
}

#[tokio::test]
async fn cancellation_mid_scrape_keeps_committed_work() {
    let cancel = CancellationToken::new();
    let h = harness_with(
        FakeScraper::cancelling("flipkart", cancel.clone()),
        FakeScraper::new("amazon"),
    );
    h.service
        .upsert_product(described(AMAZON_URL, "Kettle"))
        .await
        .unwrap();
    h.service
        .upsert_product(described(FLIPKART_URL, "Phone"))
        .await
        .unwrap();
    h.service
        .upsert_product(described(AMAZON_URL_2, "Toaster"))
        .await
        .unwrap();
    h.amazon.set_price(AMAZON_URL, "10");
    h.amazon.set_price(AMAZON_URL_2, "20");

    let err = h.service.refresh_prices(&cancel).await.unwrap_err();

    assert!(matches!(err, CatalogError::Cancelled), "got {err:?}");
    assert_eq!(h.amazon.price_calls(), vec![AMAZON_URL]);
    let kettle = h.service.get_product(AMAZON_URL).await.unwrap();
    assert_eq!(values(&kettle), vec![dec("10")]);
    let toaster = h.service.get_product(AMAZON_URL_2).await.unwrap();
    assert!(toaster.price_history.is_empty());
}

#[tokio::test]
async fn cancelled_token_stops_repair() {
    let h = harness();
    h.store.upsert(&Product::new(AMAZON_URL)).await.unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h.service.repair_incomplete(&cancel).await.unwrap_err();

    assert!(matches!(err, CatalogError::Cancelled), "got {err:?}");
    assert!(h.amazon.detail_calls().is_empty());
}
