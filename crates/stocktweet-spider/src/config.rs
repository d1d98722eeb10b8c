//! Credentials and runtime settings.
//!
//! Secrets (database login, Twitter keys) are resolved by name through a
//! [`CredentialProvider`]; everything else is read from the environment (and `.env`),
//! falling back to the defaults of the docker-compose deployment.

use crate::http::var;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace};

/// Parameter names of the batch DB login.
pub const DB_USER: &str = "stock_twitter_db_user";
pub const DB_PASSWORD: &str = "stock_twitter_db_password";

/// Parameter names of the Twitter API keys.
pub const TWITTER_API_KEY: &str = "twitter_api_key";
pub const TWITTER_API_SECRET: &str = "twitter_api_secret";
pub const TWITTER_ACCESS_TOKEN: &str = "twitter_access_token";
pub const TWITTER_ACCESS_SECRET: &str = "twitter_access_secret";

// credentials
// ----------------------------------------------------------------------------

/// Connection parameters of a Postgres database.
#[derive(Clone, PartialEq, Eq)]
pub struct DbParams {
    pub host: String,
    pub port: u16,
    pub db: String,
    pub user: String,
    pub password: String,
}

impl DbParams {
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.db)
            .user(&self.user)
            .password(&self.password)
            .connect_timeout(Duration::from_secs(10));
        config
    }
}

impl fmt::Debug for DbParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db", &self.db)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// OAuth 1.0a keys of the Twitter API.
#[derive(Clone, PartialEq, Eq)]
pub struct TwitterParams {
    pub api_key: String,
    pub api_secret: String,
    pub access_token: String,
    pub access_secret: String,
}

impl fmt::Debug for TwitterParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitterParams")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .field("access_token", &"***")
            .field("access_secret", &"***")
            .finish()
    }
}

/// Resolves named secrets.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Values of `names`; names that do not exist are absent from the map.
    async fn parameters(&self, names: &[&str]) -> Result<HashMap<String, String>>;
}

/// Secrets from environment variables; `twitter_api_key` is read from `TWITTER_API_KEY`.
#[derive(Clone, Debug, Default)]
pub struct EnvCredentials;

#[async_trait]
impl CredentialProvider for EnvCredentials {
    async fn parameters(&self, names: &[&str]) -> Result<HashMap<String, String>> {
        Ok(names
            .iter()
            .filter_map(|name| {
                var(name.to_uppercase())
                    .ok()
                    .map(|value| (name.to_string(), value))
            })
            .collect())
    }
}

/// Secrets from the AWS SSM parameter store, decrypted.
#[derive(Clone, Debug)]
pub struct SsmCredentials {
    client: aws_sdk_ssm::Client,
}

impl SsmCredentials {
    /// Uses the default AWS credential chain and region (`AWS_REGION`, profile, or IMDS).
    pub async fn new() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self {
            client: aws_sdk_ssm::Client::new(&config),
        }
    }

    pub fn with_client(client: aws_sdk_ssm::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CredentialProvider for SsmCredentials {
    async fn parameters(&self, names: &[&str]) -> Result<HashMap<String, String>> {
        trace!("fetching {} parameters from SSM", names.len());
        let output = self
            .client
            .get_parameters()
            .set_names(Some(names.iter().map(|n| n.to_string()).collect()))
            .with_decryption(true)
            .send()
            .await
            .map_err(|err| Error::Auth(format!("failed to fetch SSM parameters, error({err})")))?;

        let parameters: HashMap<String, String> = output
            .parameters()
            .iter()
            .filter_map(|p| Some((p.name()?.to_string(), p.value()?.to_string())))
            .collect();
        debug!("{}/{} SSM parameters resolved", parameters.len(), names.len());
        Ok(parameters)
    }
}

fn take(params: &mut HashMap<String, String>, name: &str) -> Result<String> {
    params
        .remove(name)
        .ok_or_else(|| Error::Auth(format!("secret {name} could not be resolved")))
}

/// Where each database lives; the login of the batch DB is a secret, the stream DB is the
/// local docker-compose container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DbTargets {
    pub batch_host: String,
    pub batch_port: u16,
    pub batch_db: String,
    pub stream: DbParams,
}

impl DbTargets {
    /// | variable | default |
    /// |---|---|
    /// | `BATCH_DB_HOST` | `localhost` |
    /// | `BATCH_DB_PORT` | `5432` |
    /// | `BATCH_DB_NAME` | `postgres` |
    /// | `STREAM_DB_HOST` | `postgres` |
    /// | `STREAM_DB_PORT` | `5432` |
    /// | `STREAM_DB_NAME` | `postgres` |
    /// | `STREAM_DB_USER` | `admin` |
    /// | `STREAM_DB_PASSWORD` | `admin` |
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            batch_host: var_or("BATCH_DB_HOST", "localhost"),
            batch_port: parse_var("BATCH_DB_PORT", 5432)?,
            batch_db: var_or("BATCH_DB_NAME", "postgres"),
            stream: DbParams {
                host: var_or("STREAM_DB_HOST", "postgres"),
                port: parse_var("STREAM_DB_PORT", 5432)?,
                db: var_or("STREAM_DB_NAME", "postgres"),
                user: var_or("STREAM_DB_USER", "admin"),
                password: var_or("STREAM_DB_PASSWORD", "admin"),
            },
        })
    }

    /// Batch DB parameters, with the login resolved through `provider`.
    pub async fn batch_creds(&self, provider: &dyn CredentialProvider) -> Result<DbParams> {
        let mut params = provider.parameters(&[DB_USER, DB_PASSWORD]).await?;
        Ok(DbParams {
            host: self.batch_host.clone(),
            port: self.batch_port,
            db: self.batch_db.clone(),
            user: take(&mut params, DB_USER)?,
            password: take(&mut params, DB_PASSWORD)?,
        })
    }

    pub fn stream_creds(&self) -> DbParams {
        self.stream.clone()
    }
}

/// Twitter keys resolved through `provider`.
pub async fn twitter_creds(provider: &dyn CredentialProvider) -> Result<TwitterParams> {
    let mut params = provider
        .parameters(&[
            TWITTER_API_KEY,
            TWITTER_API_SECRET,
            TWITTER_ACCESS_TOKEN,
            TWITTER_ACCESS_SECRET,
        ])
        .await?;
    Ok(TwitterParams {
        api_key: take(&mut params, TWITTER_API_KEY)?,
        api_secret: take(&mut params, TWITTER_API_SECRET)?,
        access_token: take(&mut params, TWITTER_ACCESS_TOKEN)?,
        access_secret: take(&mut params, TWITTER_ACCESS_SECRET)?,
    })
}

// broker
// ----------------------------------------------------------------------------

/// Kafka settings of the tweet topic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    pub topic: String,
    pub group_id: String,
    /// Where a consumer group without committed offsets starts (`latest` | `earliest`).
    pub offset_reset: String,
    /// Offsets are committed in the background on this interval, not per record.
    pub commit_interval: Duration,
    /// Upper bound of records handled per poll.
    pub max_poll_records: usize,
    /// Upper bound of bytes per fetch request.
    pub fetch_max_bytes: usize,
    /// How long a poll keeps collecting after its first record.
    pub poll_linger: Duration,
    /// Local delivery timeout of a published message.
    pub message_timeout: Duration,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: "kafka:9093".to_string(),
            topic: "TWEET_STREAM".to_string(),
            group_id: "tweet-stream-consumer".to_string(),
            offset_reset: "latest".to_string(),
            commit_interval: Duration::from_millis(5000),
            max_poll_records: 100,
            fetch_max_bytes: 1_048_576,
            poll_linger: Duration::from_millis(250),
            message_timeout: Duration::from_secs(5),
        }
    }
}

impl KafkaConfig {
    /// Reads `KAFKA_BROKERS`, `KAFKA_TOPIC`, `KAFKA_GROUP_ID`, `KAFKA_OFFSET_RESET`,
    /// `KAFKA_COMMIT_INTERVAL_MS`, `KAFKA_MAX_POLL_RECORDS`, `KAFKA_FETCH_MAX_BYTES` and
    /// `KAFKA_POLL_LINGER_MS`, keeping the [`Default`] of anything unset.
    pub fn from_env() -> Result<Self> {
        let default = Self::default();
        Ok(Self {
            bootstrap_servers: var_or("KAFKA_BROKERS", &default.bootstrap_servers),
            topic: var_or("KAFKA_TOPIC", &default.topic),
            group_id: var_or("KAFKA_GROUP_ID", &default.group_id),
            offset_reset: var_or("KAFKA_OFFSET_RESET", &default.offset_reset),
            commit_interval: Duration::from_millis(parse_var(
                "KAFKA_COMMIT_INTERVAL_MS",
                default.commit_interval.as_millis() as u64,
            )?),
            max_poll_records: parse_var("KAFKA_MAX_POLL_RECORDS", default.max_poll_records)?,
            fetch_max_bytes: parse_var("KAFKA_FETCH_MAX_BYTES", default.fetch_max_bytes)?,
            poll_linger: Duration::from_millis(parse_var(
                "KAFKA_POLL_LINGER_MS",
                default.poll_linger.as_millis() as u64,
            )?),
            message_timeout: default.message_timeout,
        })
    }
}

// helpers
// ----------------------------------------------------------------------------

fn var_or(name: &str, default: &str) -> String {
    var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|err| Error::Config(format!("{name}={raw:?} is invalid, error({err})"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(HashMap<String, String>);

    #[async_trait]
    impl CredentialProvider for Fixed {
        async fn parameters(&self, names: &[&str]) -> Result<HashMap<String, String>> {
            Ok(names
                .iter()
                .filter_map(|n| self.0.get(*n).map(|v| (n.to_string(), v.clone())))
                .collect())
        }
    }

    fn targets() -> DbTargets {
        DbTargets {
            batch_host: "db.internal".to_string(),
            batch_port: 5432,
            batch_db: "postgres".to_string(),
            stream: DbParams {
                host: "postgres".to_string(),
                port: 5432,
                db: "postgres".to_string(),
                user: "admin".to_string(),
                password: "admin".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn batch_creds_from_provider() {
        let provider = Fixed(HashMap::from([
            (DB_USER.to_string(), "reader".to_string()),
            (DB_PASSWORD.to_string(), "hunter2".to_string()),
        ]));

        let creds = targets().batch_creds(&provider).await.unwrap();
        assert_eq!(creds.user, "reader");
        assert_eq!(creds.host, "db.internal");
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[tokio::test]
    async fn missing_secret_is_auth_error() {
        let provider = Fixed(HashMap::from([(
            TWITTER_API_KEY.to_string(),
            "key".to_string(),
        )]));

        let result = twitter_creds(&provider).await;
        assert!(matches!(result, Err(Error::Auth(_))));
    }

    #[test]
    fn kafka_defaults() {
        let config = KafkaConfig::default();
        assert_eq!(config.topic, "TWEET_STREAM");
        assert_eq!(config.commit_interval, Duration::from_secs(5));
        assert_eq!(config.max_poll_records, 100);
    }
}
