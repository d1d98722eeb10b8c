//! Raw-tweet archive: one JSON array blob per day, keyed `YYYY-MM-DD_raw_tweets.json`.

use crate::{Error, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::{debug, error, trace};

/// Archive key of the raw tweets of `day`.
pub fn daily_key(day: NaiveDate) -> String {
    format!("{}_raw_tweets.json", day.format("%Y-%m-%d"))
}

/// Write-once blob storage; writing an existing key replaces it.
#[async_trait]
pub trait Archive: Send + Sync {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()>;
}

/// Serializes `statuses` as one JSON array and stores it under the key of `day`.
pub async fn archive_day(
    archive: &dyn Archive,
    day: NaiveDate,
    statuses: &[serde_json::Value],
) -> Result<String> {
    let key = daily_key(day);
    let body = serde_json::to_vec(statuses)?;
    trace!("archiving {} statuses ({} bytes) as {key}", statuses.len(), body.len());
    archive.put(&key, body).await?;
    Ok(key)
}

// s3
// ----------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct S3Archive {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Archive {
    /// Uses the default AWS credential chain and region.
    pub async fn new(bucket: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::with_client(aws_sdk_s3::Client::new(&config), bucket)
    }

    pub fn with_client(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl Archive for S3Archive {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/json")
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| {
                error!("failed to put s3://{}/{key}, error({err})", self.bucket);
                Error::Archive(format!("s3 put_object failed for {key}: {err}"))
            })?;

        debug!("archived s3://{}/{key}", self.bucket);
        Ok(())
    }
}

// local
// ----------------------------------------------------------------------------

/// Archive in a directory on disk, created on first write.
#[derive(Clone, Debug)]
pub struct LocalArchive {
    dir: PathBuf,
}

impl LocalArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

#[async_trait]
impl Archive for LocalArchive {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        trace!("checking directory path: {:?}", self.dir);
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path(key);
        tokio::fs::write(&path, body).await.map_err(|err| {
            error!("failed to write {path:?}, error({err})");
            Error::Archive(format!("failed to write {}: {err}", path.display()))
        })?;

        debug!("archived {path:?}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_format() {
        let day = NaiveDate::from_ymd_opt(2022, 6, 1).unwrap();
        assert_eq!(daily_key(day), "2022-06-01_raw_tweets.json");
    }

    #[tokio::test]
    async fn local_archive_writes_a_json_array() {
        let dir = std::env::temp_dir().join(format!("stocktweet-{}", uuid::Uuid::new_v4()));
        let archive = LocalArchive::new(&dir);
        let day = NaiveDate::from_ymd_opt(2022, 6, 1).unwrap();

        let statuses = vec![json!({"id": 1, "text": "a"}), json!({"id": 2, "text": "b"})];
        let key = archive_day(&archive, day, &statuses).await.unwrap();

        let written = tokio::fs::read(archive.path(&key)).await.unwrap();
        let decoded: Vec<serde_json::Value> = serde_json::from_slice(&written).unwrap();
        assert_eq!(decoded, statuses);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
