use super::{Price, PriceHistory};
use crate::http::*;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, trace};

// scrape
// ----------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct YahooFinance {
    http_client: HttpClient,
}

impl YahooFinance {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http_client: crate::std_client_build()?,
        })
    }
}

#[async_trait]
impl PriceHistory for YahooFinance {
    async fn daily_closes(&self, ticker: &str, range: &str) -> Result<Vec<Price>> {
        let time = std::time::Instant::now();
        let url = format!(
            "https://query1.finance.yahoo.com/v8/finance/chart/{ticker}?range={range}&interval=1d"
        );

        // fetch raw http response
        let response = self.http_client.get(url).send().await.map_err(|err| {
            error!("failed to fetch Yahoo Finance prices for [{ticker}], error({err})");
            Error::Connection(format!("Yahoo Finance unreachable, error({err})"))
        })?;

        // deserialize the response to JSON
        let price_response: PriceResponse = response.json().await.map_err(|err| {
            error!("failed to parse Yahoo Finance prices for [{ticker}], error({err})");
            err
        })?;

        let prices = price_response.daily_closes(ticker)?;
        debug!(
            "[{ticker}] {} daily closes fetched. {}",
            prices.len(),
            crate::time_elapsed(time)
        );
        Ok(prices)
    }
}

// de
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PriceResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    // days without trades come back as null
    #[serde(default)]
    close: Vec<Option<f64>>,
}

impl PriceResponse {
    fn daily_closes(self, ticker: &str) -> Result<Vec<Price>> {
        if let Some(err) = self.chart.error {
            return Err(Error::Transform(format!(
                "Yahoo Finance error for [{ticker}]: {} ({})",
                err.description, err.code
            )));
        }

        let Some(base) = self.chart.result.and_then(|r| r.into_iter().next()) else {
            return Err(Error::Transform(format!(
                "no results found for [{ticker}] within http response"
            )));
        };
        let closes = base
            .indicators
            .quote
            .into_iter()
            .next()
            .map(|quote| quote.close)
            .unwrap_or_default();

        trace!("price results found; transforming price data for [{ticker}]");
        Ok(base
            .timestamp
            .iter()
            .zip(closes)
            .filter_map(|(timestamp, close)| {
                let day = chrono::DateTime::from_timestamp(*timestamp, 0)?.date_naive();
                Some(Price {
                    timestamp: day.and_hms_opt(0, 0, 0)?.and_utc(),
                    close: close?,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const CHART: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"currency": "USD", "symbol": "URA"},
                "timestamp": [1654090200, 1654176600, 1654263000],
                "indicators": {
                    "quote": [{"close": [23.459999084472656, null, 24.1]}],
                    "adjclose": [{"adjclose": [22.9, null, 23.5]}]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn nulls_are_skipped_and_days_truncated() {
        let response: PriceResponse = serde_json::from_str(CHART).unwrap();
        let prices = response.daily_closes("URA").unwrap();

        assert_eq!(prices.len(), 2);
        assert_eq!(
            prices[0].timestamp,
            Utc.with_ymd_and_hms(2022, 6, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(prices[0].close, 23.459999084472656);
        assert_eq!(
            prices[1].timestamp,
            Utc.with_ymd_and_hms(2022, 6, 3, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn chart_error_is_reported() {
        let raw = r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#;
        let response: PriceResponse = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            response.daily_closes("XXXX"),
            Err(Error::Transform(_))
        ));
    }

    #[tokio::test]
    #[ignore = "calls the Yahoo Finance API"]
    async fn fetch_ura() {
        let prices = YahooFinance::new()
            .unwrap()
            .daily_closes("URA", "10d")
            .await
            .unwrap();
        assert!(!prices.is_empty());
    }
}
