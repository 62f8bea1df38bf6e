//! Shared HTTP client for product-page fetches.

use std::time::Duration;

use reqwest::Client;

use crate::error::ScraperError;
use crate::rate_limit::retry_with_backoff;

/// Fetches product pages as HTML text.
///
/// Non-2xx responses become typed errors. Transient errors (429, 5xx,
/// network failures) are retried with exponential backoff up to
/// `max_retries` additional attempts.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    backoff_base_secs: u64,
}

impl HttpFetcher {
    /// Builds a fetcher with the given request timeout, `User-Agent`, and
    /// retry policy. Set `max_retries` to `0` to disable retries.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_secs: u64,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            max_retries,
            backoff_base_secs,
        })
    }

    /// Builds a fetcher from the application's scraper settings.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the client cannot be constructed.
    pub fn from_app_config(config: &pricewatch_core::AppConfig) -> Result<Self, ScraperError> {
        Self::new(
            config.scraper_request_timeout_secs,
            &config.scraper_user_agent,
            config.scraper_max_retries,
            config.scraper_retry_backoff_base_secs,
        )
    }

    /// GETs `url` and returns the response body.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::InvalidUrl`]: `url` is not an absolute http(s) URL.
    /// - [`ScraperError::RateLimited`]: HTTP 429 after all retries.
    /// - [`ScraperError::NotFound`]: HTTP 404 (not retried).
    /// - [`ScraperError::UnexpectedStatus`]: any other non-2xx status.
    /// - [`ScraperError::Http`]: network or TLS failure after all retries.
    pub async fn fetch_html(&self, url: &str) -> Result<String, ScraperError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| ScraperError::InvalidUrl {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ScraperError::InvalidUrl {
                url: url.to_owned(),
                reason: format!("unsupported scheme \"{}\"", parsed.scheme()),
            });
        }

        retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            let url = url.to_owned();
            async move {
                let response = self
                    .client
                    .get(&url)
                    .header(
                        reqwest::header::ACCEPT,
                        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                    )
                    .header(reqwest::header::ACCEPT_LANGUAGE, "en-IN,en;q=0.9")
                    .header(reqwest::header::CACHE_CONTROL, "no-cache")
                    .send()
                    .await?;
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(60);
                    return Err(ScraperError::RateLimited {
                        domain: extract_domain(&url),
                        retry_after_secs,
                    });
                }

                if status == reqwest::StatusCode::NOT_FOUND {
                    return Err(ScraperError::NotFound { url });
                }

                if !status.is_success() {
                    return Err(ScraperError::UnexpectedStatus {
                        status: status.as_u16(),
                        url,
                    });
                }

                Ok(response.text().await?)
            }
        })
        .await
    }
}

/// Hostname of `url` for error messages; the whole string if it won't parse.
pub(crate) fn extract_domain(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| url.to_owned())
}
