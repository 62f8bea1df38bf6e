#[derive(Clone)]
pub struct AppConfig {
    pub mongo_uri: String,
    pub database_name: String,
    /// Default user collection when the CLI is not given `--user`.
    pub default_user: Option<String>,
    pub log_level: String,
    pub db_max_pool_size: u32,
    pub db_connect_timeout_secs: u64,
    pub scraper_request_timeout_secs: u64,
    pub scraper_user_agent: String,
    pub scraper_max_retries: u32,
    pub scraper_retry_backoff_base_secs: u64,
    /// Six-field cron expression used by the `watch` command.
    pub refresh_schedule: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("log_level", &self.log_level)
            .field("mongo_uri", &"[redacted]")
            .field("database_name", &self.database_name)
            .field("default_user", &self.default_user)
            .field("db_max_pool_size", &self.db_max_pool_size)
            .field("db_connect_timeout_secs", &self.db_connect_timeout_secs)
            .field(
                "scraper_request_timeout_secs",
                &self.scraper_request_timeout_secs,
            )
            .field("scraper_user_agent", &self.scraper_user_agent)
            .field("scraper_max_retries", &self.scraper_max_retries)
            .field(
                "scraper_retry_backoff_base_secs",
                &self.scraper_retry_backoff_base_secs,
            )
            .field("refresh_schedule", &self.refresh_schedule)
            .finish()
    }
}
