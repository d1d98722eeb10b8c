use crate::cli::Table;
use anyhow::Context;
use stocktweet_spider::config::{CredentialProvider, DbTargets};
use stocktweet_spider::db::{schema, PgStore};
use tracing::info;

/// Drops and creates `tables`; all of them when none are given.
pub(crate) async fn run(
    secrets: &dyn CredentialProvider,
    tables: Option<Vec<Table>>,
) -> anyhow::Result<()> {
    let tables = tables.unwrap_or_else(|| vec![Table::Stocks, Table::Tweets, Table::Stream]);
    let targets = DbTargets::from_env()?;

    // the batch login is only resolved when a batch table is requested
    let batch = if tables.iter().any(|t| matches!(t, Table::Stocks | Table::Tweets)) {
        Some(PgStore::new(&targets.batch_creds(secrets).await?))
    } else {
        None
    };
    let stream = PgStore::new(&targets.stream_creds());

    for table in tables {
        match table {
            Table::Stream => schema::init_tweet_stream_table(&stream).await?,
            Table::Stocks | Table::Tweets => {
                let batch = batch.as_ref().context("batch database not configured")?;
                if table == Table::Stocks {
                    schema::init_stock_tables(batch).await?
                } else {
                    schema::init_tweet_table(batch).await?
                }
            }
        }
    }

    info!("setup complete");
    Ok(())
}
