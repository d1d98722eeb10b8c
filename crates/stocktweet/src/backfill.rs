use crate::cli::Endpoint;
use dotenv::var;
use std::path::PathBuf;
use stocktweet_spider::archive::{Archive, LocalArchive, S3Archive};
use stocktweet_spider::backfill::{backfill_stock, TweetBackfill};
use stocktweet_spider::config::{self, CredentialProvider, DbTargets};
use stocktweet_spider::db::PgStore;
use stocktweet_spider::sentiment::LexiconClassifier;
use stocktweet_spider::stock::YahooFinance;
use stocktweet_spider::twitter::TwitterClient;
use tracing::{debug, info};

const DEFAULT_BUCKET: &str = "stock-twitter-s3";

#[derive(Debug)]
pub(crate) struct Jobs {
    pub ticker: String,
    pub name: String,
    pub query: String,
    pub count: usize,
    pub archive_dir: Option<PathBuf>,
}

/// Run the requested backfills against the batch DB.
pub(crate) async fn run(
    secrets: &dyn CredentialProvider,
    endpoints: Option<Vec<Endpoint>>,
    jobs: Jobs,
    tui: bool,
) -> anyhow::Result<()> {
    let targets = DbTargets::from_env()?;
    let store = PgStore::new(&targets.batch_creds(secrets).await?);

    // if no endpoints provided, backfill all
    let endpoints = endpoints.unwrap_or_else(|| vec![Endpoint::Stocks, Endpoint::Tweets]);
    for endpoint in endpoints {
        let time = std::time::Instant::now();
        match endpoint {
            Endpoint::Stocks => {
                let prices = YahooFinance::new()?;
                let stats =
                    backfill_stock(&store, &prices, &jobs.ticker, &jobs.name, "1y", tui).await?;
                info!(
                    "[{}] {} prices fetched, {} rows inserted",
                    jobs.ticker, stats.fetched, stats.inserted
                );
            }
            Endpoint::Tweets => {
                let search = TwitterClient::new(config::twitter_creds(secrets).await?)?;
                let archive: Box<dyn Archive> = match &jobs.archive_dir {
                    Some(dir) => Box::new(LocalArchive::new(dir)),
                    None => {
                        let bucket =
                            var("ARCHIVE_BUCKET").unwrap_or_else(|_| DEFAULT_BUCKET.to_string());
                        Box::new(S3Archive::new(bucket).await)
                    }
                };

                let backfill = TweetBackfill {
                    search: &search,
                    archive: archive.as_ref(),
                    store: &store,
                    classifier: &LexiconClassifier,
                };
                let today = chrono::Utc::now().date_naive();
                let stats = backfill.run(&jobs.query, jobs.count, today, tui).await?;
                info!(
                    "\"{}\": {} tweets fetched, {} rows inserted",
                    jobs.query, stats.fetched, stats.inserted
                );
            }
        }
        debug!("{endpoint:?} backfilled, time elapsed: {:?}", time.elapsed());
    }

    Ok(())
}
