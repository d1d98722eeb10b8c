//! Thin Twitter API v1.1 client: OAuth 1.0a signing, the filtered status stream, and the
//! standard search endpoint.
//!
//! <https://developer.twitter.com/en/docs/authentication/oauth-1-0a/creating-a-signature>

use crate::config::TwitterParams;
use crate::http::*;
use crate::stream::producer::RawFeed;
use crate::{Error, Result};
use async_trait::async_trait;
use backon::{BackoffBuilder, ExponentialBuilder};
use base64::prelude::{Engine, BASE64_STANDARD};
use bytes::Bytes;
use chrono::NaiveDate;
use futures::{Stream, StreamExt};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha1::Sha1;
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

const FILTER_URL: &str = "https://stream.twitter.com/1.1/statuses/filter.json";
const SEARCH_URL: &str = "https://api.twitter.com/1.1/search/tweets.json";
const SEARCH_PAGE_SIZE: usize = 100;
const MAX_RECONNECTS: usize = 8;

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

// client
// ----------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct TwitterClient {
    http_client: HttpClient,
    keys: TwitterParams,
}

impl TwitterClient {
    pub fn new(keys: TwitterParams) -> Result<Self> {
        Ok(Self {
            http_client: crate::std_client_build()?,
            keys,
        })
    }

    /// Opens the filtered stream of statuses matching any of `track`, in English.
    pub async fn filter(&self, track: &[String]) -> Result<ByteStream> {
        let params = vec![
            ("track".to_string(), track.join(",")),
            ("language".to_string(), "en".to_string()),
            ("stall_warnings".to_string(), "true".to_string()),
        ];
        let authorization = self.authorization("POST", FILTER_URL, &params)?;

        debug!("connecting to the filtered stream, track({})", track.join(","));
        let response = self
            .http_client
            .post(FILTER_URL)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .form(&params)
            .send()
            .await
            .map_err(|err| Error::Connection(format!("failed to reach Twitter, error({err})")))?;
        let response = check_status(response)?;

        info!("connected to the filtered stream");
        Ok(Box::pin(response.bytes_stream()))
    }

    /// One page of `search/tweets`; statuses are returned as raw JSON.
    async fn search_page(
        &self,
        query: &str,
        count: usize,
        until: NaiveDate,
        max_id: Option<i64>,
    ) -> Result<Vec<serde_json::Value>> {
        let mut params = vec![
            ("count".to_string(), count.to_string()),
            ("lang".to_string(), "en".to_string()),
            ("q".to_string(), query.to_string()),
            ("until".to_string(), until.format("%Y-%m-%d").to_string()),
        ];
        if let Some(max_id) = max_id {
            params.push(("max_id".to_string(), max_id.to_string()));
        }
        let authorization = self.authorization("GET", SEARCH_URL, &params)?;

        let response = self
            .http_client
            .get(SEARCH_URL)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .query(&params)
            .send()
            .await
            .map_err(|err| Error::Connection(format!("failed to reach Twitter, error({err})")))?;
        let page: SearchResponse = check_status(response)?.json().await?;
        Ok(page.statuses)
    }

    fn authorization(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
    ) -> Result<String> {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp();
        oauth_header(&self.keys, method, url, params, &nonce, timestamp)
    }
}

/// Searches recent tweets.
#[async_trait]
pub trait TweetSearch: Send + Sync {
    /// Up to `count` raw statuses matching `query` created before `until`, newest first.
    async fn search(
        &self,
        query: &str,
        count: usize,
        until: NaiveDate,
    ) -> Result<Vec<serde_json::Value>>;
}

#[async_trait]
impl TweetSearch for TwitterClient {
    async fn search(
        &self,
        query: &str,
        count: usize,
        until: NaiveDate,
    ) -> Result<Vec<serde_json::Value>> {
        let mut statuses = Vec::with_capacity(count);
        let mut max_id = None;

        // page backwards through the results with max_id
        while statuses.len() < count {
            let size = SEARCH_PAGE_SIZE.min(count - statuses.len());
            let page = self.search_page(query, size, until, max_id).await?;
            let oldest = page
                .iter()
                .filter_map(|status| status.get("id").and_then(serde_json::Value::as_i64))
                .min();
            trace!("search page of {} statuses, until({until})", page.len());

            statuses.extend(page);
            match oldest {
                Some(id) if Some(id - 1) != max_id => max_id = Some(id - 1),
                _ => break,
            }
        }

        statuses.truncate(count);
        Ok(statuses)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    statuses: Vec<serde_json::Value>,
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    match status.as_u16() {
        401 | 403 => {
            error!("Twitter rejected the credentials, status({status})");
            Err(Error::Auth(format!("Twitter responded {status}")))
        }
        _ if !status.is_success() => Err(Error::Connection(format!(
            "Twitter responded {status} for {}",
            response.url()
        ))),
        _ => Ok(response),
    }
}

// stream feed
// ----------------------------------------------------------------------------

/// The filtered stream as a [`RawFeed`]: one payload per status, keep-alive newlines
/// dropped. A dropped connection is reopened with exponential backoff.
pub struct TwitterFeed {
    client: TwitterClient,
    track: Vec<String>,
    stream: Option<ByteStream>,
    buffer: Vec<u8>,
    pending: VecDeque<Vec<u8>>,
}

impl TwitterFeed {
    pub fn new(client: TwitterClient, track: Vec<String>) -> Self {
        Self {
            client,
            track,
            stream: None,
            buffer: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    async fn reconnect(&mut self) -> Result<ByteStream> {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(60))
            .with_max_times(MAX_RECONNECTS)
            .with_jitter()
            .build();
        self.buffer.clear();

        let mut last = None;
        for (attempt, delay) in std::iter::once(Duration::ZERO).chain(backoff).enumerate() {
            if attempt > 0 {
                warn!(attempt, "reconnecting to the filtered stream in {delay:?}");
                tokio::time::sleep(delay).await;
            }
            match self.client.filter(&self.track).await {
                Ok(stream) => return Ok(stream),
                Err(err @ Error::Auth(_)) => return Err(err),
                Err(err) => {
                    error!("failed to open the filtered stream, error({err})");
                    last = Some(err);
                }
            }
        }

        Err(last.unwrap_or_else(|| {
            Error::Connection("failed to open the filtered stream".to_string())
        }))
    }
}

#[async_trait]
impl RawFeed for TwitterFeed {
    async fn next(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Ok(Some(message));
            }

            if self.stream.is_none() {
                self.stream = Some(self.reconnect().await?);
            }
            let Some(stream) = self.stream.as_mut() else {
                continue;
            };

            match stream.next().await {
                Some(Ok(chunk)) => {
                    self.buffer.extend_from_slice(&chunk);
                    self.pending.extend(split_messages(&mut self.buffer));
                }
                Some(Err(err)) => {
                    warn!("filtered stream interrupted, error({err})");
                    self.stream = None;
                }
                None => {
                    warn!("filtered stream closed by Twitter");
                    self.stream = None;
                }
            }
        }
    }
}

/// Drains the complete `\r\n`-delimited messages from `buffer`, leaving any trailing
/// partial message in place. Blank keep-alive lines are dropped.
pub fn split_messages(buffer: &mut Vec<u8>) -> Vec<Vec<u8>> {
    let mut messages = Vec::new();
    let mut start = 0;

    while let Some(end) = buffer[start..]
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|i| start + i)
    {
        let message = buffer[start..end].trim_ascii();
        if !message.is_empty() {
            messages.push(message.to_vec());
        }
        start = end + 2;
    }

    buffer.drain(..start);
    messages
}

// signing
// ----------------------------------------------------------------------------

fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// HMAC-SHA1 signature over the method, the base URL and the sorted, percent-encoded
/// parameters (request and `oauth_*` alike).
fn signature(
    keys: &TwitterParams,
    method: &str,
    url: &str,
    params: &[(String, String)],
) -> Result<String> {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    encoded.sort();
    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let base = format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(url),
        encode(&param_string)
    );
    let key = format!(
        "{}&{}",
        encode(&keys.api_secret),
        encode(&keys.access_secret)
    );

    let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(key.as_bytes())
        .map_err(|err| Error::Auth(format!("invalid signing key, error({err})")))?;
    mac.update(base.as_bytes());
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

/// The `Authorization` header value of a request with `params`.
fn oauth_header(
    keys: &TwitterParams,
    method: &str,
    url: &str,
    params: &[(String, String)],
    nonce: &str,
    timestamp: i64,
) -> Result<String> {
    let mut oauth = vec![
        ("oauth_consumer_key".to_string(), keys.api_key.clone()),
        ("oauth_nonce".to_string(), nonce.to_string()),
        ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
        ("oauth_timestamp".to_string(), timestamp.to_string()),
        ("oauth_token".to_string(), keys.access_token.clone()),
        ("oauth_version".to_string(), "1.0".to_string()),
    ];

    let all: Vec<(String, String)> = params.iter().chain(oauth.iter()).cloned().collect();
    oauth.push((
        "oauth_signature".to_string(),
        signature(keys, method, url, &all)?,
    ));
    oauth.sort();

    let fields = oauth
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("OAuth {fields}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> TwitterParams {
        TwitterParams {
            api_key: "xvz1evFS4wEEPTGEFPHBog".to_string(),
            api_secret: "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw".to_string(),
            access_token: "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb".to_string(),
            access_secret: "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE".to_string(),
        }
    }

    fn params() -> Vec<(String, String)> {
        vec![
            ("include_entities".to_string(), "true".to_string()),
            (
                "status".to_string(),
                "Hello Ladies + Gentlemen, a signed OAuth request!".to_string(),
            ),
        ]
    }

    #[test]
    fn documented_signature() {
        let header = oauth_header(
            &keys(),
            "post",
            "https://api.twitter.com/1.1/statuses/update.json",
            &params(),
            "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg",
            1318622958,
        )
        .unwrap();

        assert!(header.starts_with("OAuth oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\", "));
        assert!(header.contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\""));
        assert!(header.contains("oauth_timestamp=\"1318622958\""));
        assert!(!header.contains("include_entities"));
    }

    #[test]
    fn split_keeps_partial_tail() {
        let mut buffer = b"{\"id\":1}\r\n\r\n{\"id\":2}\r\n{\"id\"".to_vec();
        let messages = split_messages(&mut buffer);

        assert_eq!(messages, vec![b"{\"id\":1}".to_vec(), b"{\"id\":2}".to_vec()]);
        assert_eq!(buffer, b"{\"id\"".to_vec());

        buffer.extend_from_slice(b":3}\r\n");
        assert_eq!(split_messages(&mut buffer), vec![b"{\"id\":3}".to_vec()]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn keep_alives_only() {
        let mut buffer = b"\r\n\r\n".to_vec();
        assert!(split_messages(&mut buffer).is_empty());
        assert!(buffer.is_empty());
    }
}
