pub mod amazon;
pub mod error;
pub mod fetch;
pub mod flipkart;
pub mod gateway;
pub(crate) mod html;
pub(crate) mod rate_limit;

pub use amazon::AmazonScraper;
pub use error::ScraperError;
pub use fetch::HttpFetcher;
pub use flipkart::FlipkartScraper;
pub use gateway::ProductScraper;
