//! Table definitions for the batch and stream databases.
//!
//! Setup drops and recreates each table; it is meant for first runs and resets.

use super::PgStore;
use crate::Result;
use tracing::info;

/// `stock` holds one row per ticker; `stock_price` its daily closes.
pub const CREATE_STOCK_TABLES: &str = "
    DROP TABLE IF EXISTS stock_price, stock;

    CREATE TABLE stock (
        ticker TEXT,
        name TEXT,
        PRIMARY KEY (ticker)
    );

    CREATE TABLE stock_price (
        ticker TEXT NOT NULL,
        timestamp TIMESTAMP NOT NULL,
        price NUMERIC(10, 2),
        PRIMARY KEY (ticker, timestamp),
        CONSTRAINT fk_stock
            FOREIGN KEY (ticker)
            REFERENCES stock (ticker)
    );
";

/// `tweet` is filled by the backfill job.
pub const CREATE_TWEET_TABLE: &str = "
    DROP TABLE IF EXISTS tweet;

    CREATE TABLE tweet (
        id SERIAL,
        twitter_id BIGINT UNIQUE,
        username TEXT,
        text TEXT,
        created_at TIMESTAMP,
        sentiment TEXT,
        PRIMARY KEY (id)
    );
";

/// `tweet_stream` is filled by the stream consumer.
pub const CREATE_TWEET_STREAM_TABLE: &str = "
    DROP TABLE IF EXISTS tweet_stream;

    CREATE TABLE tweet_stream (
        id SERIAL,
        twitter_id BIGINT UNIQUE,
        username TEXT,
        text TEXT,
        created_at TIMESTAMP,
        verified_user BOOLEAN,
        followers INTEGER,
        sentiment TEXT,
        PRIMARY KEY (id)
    );
";

/// Recreates `stock` and `stock_price` in the batch DB.
pub async fn init_stock_tables(batch: &PgStore) -> Result<()> {
    batch.batch_execute(CREATE_STOCK_TABLES).await?;
    info!("stock and stock_price tables created");
    Ok(())
}

/// Recreates `tweet` in the batch DB.
pub async fn init_tweet_table(batch: &PgStore) -> Result<()> {
    batch.batch_execute(CREATE_TWEET_TABLE).await?;
    info!("tweet table created");
    Ok(())
}

/// Recreates `tweet_stream` in the stream DB.
pub async fn init_tweet_stream_table(stream: &PgStore) -> Result<()> {
    stream.batch_execute(CREATE_TWEET_STREAM_TABLE).await?;
    info!("tweet_stream table created");
    Ok(())
}
