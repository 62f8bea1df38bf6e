use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by {domain} (retry after {retry_after_secs}s)")]
    RateLimited {
        domain: String,
        retry_after_secs: u64,
    },

    #[error("product page not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("request to {url} was answered with a robot check")]
    Blocked { url: String },

    #[error("could not find {field} on {url}")]
    MissingField { field: &'static str, url: String },

    #[error("invalid product URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },
}
