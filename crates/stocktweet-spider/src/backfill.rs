//! Bounded historical loads into the batch database, funneled through the same
//! [`Upsert`] executor as the stream.

use crate::archive::{self, Archive};
use crate::db::{Upsert, UpsertRequest};
use crate::sentiment::Classify;
use crate::stock::{self, PriceHistory, PRICE_TABLE, STOCK_TABLE};
use crate::tweet::{Tweet, BATCH_TABLE, TWEET_KEY};
use crate::twitter::TweetSearch;
use crate::Result;
use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

/// The standard search API reaches back seven days; today is searched as well.
pub const SEARCH_DAYS: u64 = 8;

/// Rows written by a backfill; `inserted` excludes rows that were already stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BackfillStats {
    pub fetched: u64,
    pub inserted: u64,
}

// stocks
// ----------------------------------------------------------------------------

/// Inserts `(ticker, name)` into `stock` and its daily closes over `range` into
/// `stock_price`, keyed on `(ticker, timestamp)`.
pub async fn backfill_stock(
    store: &dyn Upsert,
    prices: &dyn PriceHistory,
    ticker: &str,
    name: &str,
    range: &str,
    tui: bool,
) -> Result<BackfillStats> {
    let time = std::time::Instant::now();

    let request = UpsertRequest::new(
        STOCK_TABLE,
        ["ticker"],
        vec![stock::stock_record(ticker, name)],
    )?;
    let mut inserted = store.upsert(request).await?;

    info!("fetching Yahoo Finance prices for [{ticker}] {name} ...");
    let pb = crate::tui::spinner(format!("fetching prices for [{ticker}] {name} ..."), tui);
    let closes = prices.daily_closes(ticker, range).await;
    pb.finish_and_clear();
    let closes = closes?;
    let fetched = closes.len() as u64;
    if closes.is_empty() {
        warn!("no prices found for [{ticker}] over {range}");
    } else {
        let records = closes.iter().map(|price| price.record(ticker)).collect();
        let request = UpsertRequest::new(PRICE_TABLE, ["ticker", "timestamp"], records)?;
        inserted += store.upsert(request).await.map_err(|err| {
            error!("failed to insert price data for [{ticker}] {name}, error({err})");
            err
        })?;
    }

    debug!(
        "[{ticker}] {name} priceset inserted. {}",
        crate::time_elapsed(time)
    );
    Ok(BackfillStats { fetched, inserted })
}

// tweets
// ----------------------------------------------------------------------------

pub struct TweetBackfill<'a> {
    pub search: &'a dyn TweetSearch,
    pub archive: &'a dyn Archive,
    pub store: &'a dyn Upsert,
    pub classifier: &'a dyn Classify,
}

impl TweetBackfill<'_> {
    /// For each of the last [`SEARCH_DAYS`] days up to `today`, oldest first: searches
    /// `count` tweets matching `query` created before that day and archives them raw. The
    /// classified rows of all days are then merged into `tweet` in one request.
    pub async fn run(
        &self,
        query: &str,
        count: usize,
        today: NaiveDate,
        tui: bool,
    ) -> Result<BackfillStats> {
        let time = std::time::Instant::now();
        let pb = crate::tui::progress(SEARCH_DAYS, "days", tui);
        let mut records = Vec::new();
        let mut fetched = 0;

        for offset in (0..SEARCH_DAYS).rev() {
            let day = today - chrono::Duration::days(offset as i64);
            pb.set_message(day.to_string());

            let statuses = self.search.search(query, count, day).await.map_err(|err| {
                error!("failed to search tweets until {day}, error({err})");
                err
            })?;
            fetched += statuses.len() as u64;
            archive::archive_day(self.archive, day, &statuses).await?;

            for status in statuses {
                match Tweet::from_value(status).and_then(|t| t.batch_record(self.classifier)) {
                    Ok(record) => records.push(record),
                    Err(err) => error!("skipping tweet until {day}, error({err})"),
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        if records.is_empty() {
            warn!("no tweets found for \"{query}\"");
            return Ok(BackfillStats { fetched, inserted: 0 });
        }

        let request = UpsertRequest::new(BATCH_TABLE, [TWEET_KEY], records)?;
        let inserted = self.store.upsert(request).await?;

        info!(
            fetched,
            inserted,
            "tweets backfilled. {}",
            crate::time_elapsed(time)
        );
        Ok(BackfillStats { fetched, inserted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::record::Value;
    use crate::sentiment::LexiconClassifier;
    use crate::stock::Price;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    struct FixedPrices;

    #[async_trait]
    impl PriceHistory for FixedPrices {
        async fn daily_closes(&self, _ticker: &str, _range: &str) -> Result<Vec<Price>> {
            Ok((1..=3)
                .map(|d| Price {
                    timestamp: Utc.with_ymd_and_hms(2022, 6, d, 0, 0, 0).unwrap(),
                    close: 20.0 + d as f64,
                })
                .collect())
        }
    }

    /// A daily status, one shared by every day, and one without an id.
    #[derive(Default)]
    struct DailySearch(Mutex<Vec<NaiveDate>>);

    #[async_trait]
    impl TweetSearch for DailySearch {
        async fn search(
            &self,
            _query: &str,
            _count: usize,
            until: NaiveDate,
        ) -> Result<Vec<serde_json::Value>> {
            self.0.lock().await.push(until);
            let id = until.format("%Y%m%d").to_string().parse::<i64>().unwrap();
            Ok(vec![
                json!({"id": id, "text": "uranium rally", "user": {"name": "Jane"}}),
                json!({"id": 1, "text": "uranium is bad", "created_at": "Wed Jun 01 17:02:11 +0000 2022"}),
                json!({"text": "missing id"}),
            ])
        }
    }

    #[derive(Default)]
    struct MemoryArchive(Mutex<HashMap<String, Vec<u8>>>);

    #[async_trait]
    impl Archive for MemoryArchive {
        async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
            self.0.lock().await.insert(key.to_string(), body);
            Ok(())
        }
    }

    #[tokio::test]
    async fn rerunning_stock_backfill_keeps_one_stock_row() {
        let store = MemoryStore::new();

        let first = backfill_stock(&store, &FixedPrices, "URA", "Uranium ETF", "1y", false)
            .await
            .unwrap();
        let second = backfill_stock(&store, &FixedPrices, "URA", "Uranium ETF", "1y", false)
            .await
            .unwrap();

        assert_eq!(first, BackfillStats { fetched: 3, inserted: 4 });
        assert_eq!(second, BackfillStats { fetched: 3, inserted: 0 });
        assert_eq!(store.count("stock").await, 1);
        assert_eq!(store.count("stock_price").await, 3);

        let rows = store.rows("stock_price").await;
        assert_eq!(rows[0].get("ticker"), Some(&Value::from("URA")));
        assert_eq!(rows[0].get("price"), Some(&Value::Float(21.0)));
    }

    #[tokio::test]
    async fn tweets_are_searched_oldest_first_and_archived_per_day() {
        let search = DailySearch::default();
        let archive = MemoryArchive::default();
        let store = MemoryStore::new();
        let backfill = TweetBackfill {
            search: &search,
            archive: &archive,
            store: &store,
            classifier: &LexiconClassifier,
        };

        let today = NaiveDate::from_ymd_opt(2022, 6, 8).unwrap();
        let stats = backfill.run("uranium", 100, today, false).await.unwrap();

        let days = search.0.lock().await.clone();
        assert_eq!(days.len(), 8);
        assert_eq!(days[0], NaiveDate::from_ymd_opt(2022, 6, 1).unwrap());
        assert_eq!(days[7], today);

        let archived = archive.0.lock().await;
        assert_eq!(archived.len(), 8);
        let raw: Vec<serde_json::Value> =
            serde_json::from_slice(&archived["2022-06-01_raw_tweets.json"]).unwrap();
        assert_eq!(raw.len(), 3);

        // 8 distinct daily ids plus the shared one
        assert_eq!(stats, BackfillStats { fetched: 24, inserted: 9 });
        assert_eq!(store.count("tweet").await, 9);

        let rows = store.rows("tweet").await;
        let first = &rows[0];
        assert_eq!(first.get("twitter_id"), Some(&Value::Int(20220601)));
        assert_eq!(first.get("username"), Some(&Value::from("Jane")));
        assert_eq!(first.get("sentiment"), Some(&Value::from("positive")));
    }
}
