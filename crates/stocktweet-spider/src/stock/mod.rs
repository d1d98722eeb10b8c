use crate::record::Record;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Price data collected from the Yahoo Finance API; inspiration from Python's [yfinance] library.
///
/// [yfinance]: https://github.com/ranaroussi/yfinance/
pub mod yahoo_finance;

pub use yahoo_finance::YahooFinance;

pub const STOCK_TABLE: &str = "stock";
pub const PRICE_TABLE: &str = "stock_price";

/// Daily close of a ticker; `timestamp` is midnight UTC of the trading day.
#[derive(Clone, Debug, PartialEq)]
pub struct Price {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

impl Price {
    /// Row of `stock_price`.
    pub fn record(&self, ticker: &str) -> Record {
        Record::new()
            .with("ticker", ticker)
            .with("timestamp", self.timestamp)
            .with("price", self.close)
    }
}

/// Row of `stock`.
pub fn stock_record(ticker: &str, name: &str) -> Record {
    Record::new().with("ticker", ticker).with("name", name)
}

/// Source of daily price history.
#[async_trait]
pub trait PriceHistory: Send + Sync {
    /// Daily closes of `ticker` over `range` (e.g. `1y`, `10d`), oldest first.
    async fn daily_closes(&self, ticker: &str, range: &str) -> Result<Vec<Price>>;
}
