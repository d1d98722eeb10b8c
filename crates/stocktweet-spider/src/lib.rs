pub mod archive;
pub mod backfill;
pub mod config;
pub mod db;
pub mod error;
pub mod record;
pub mod sentiment;
pub mod stock;
pub mod stream;
pub mod tweet;
pub mod twitter;

pub(crate) mod tui;

pub use error::{Error, Result};

/// Shortcut for required API elements.
pub mod http {
    pub use dotenv::var;
    pub use reqwest::Client as HttpClient;
    pub use tokio_postgres::Client as PgClient;
}

/// Default reqwest client; Yahoo Finance rejects requests without a user agent.
pub(crate) fn std_client_build() -> Result<http::HttpClient> {
    let user_agent = http::var("USER_AGENT").unwrap_or_else(|_| "stocktweet/0.1".to_string());
    reqwest::ClientBuilder::new()
        .user_agent(user_agent)
        .build()
        .map_err(Error::from)
}

/// Formats the elapsed time of `time` for trace/debug output.
pub(crate) fn time_elapsed(time: std::time::Instant) -> String {
    use colored::Colorize;
    format!("elapsed time: {} ms", time.elapsed().as_millis())
        .truecolor(255, 135, 0)
        .to_string()
}
