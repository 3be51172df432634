use crate::aggregator::PageSource;
use crate::backoff::{run_with_backoff, AttemptOutcome, BackoffPolicy, Sleeper};
use crate::config::{DivisionConfig, FetcherConfig};
use crate::error::{FetcherError, Result};
use crate::rank::RankLookup;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Raw response as seen by the fetcher
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Parsed `Retry-After` header, if the server sent one
    pub retry_after: Option<Duration>,
    pub body: String,
}

/// Minimal HTTP GET seam so retry behavior can be tested without a network
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, query: &[(String, String)]) -> anyhow::Result<HttpResponse>;
}

/// reqwest-backed transport
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with a per-call timeout and default headers
    pub fn new(timeout: Duration, headers: HeaderMap) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .user_agent(concat!("fixture-fetcher/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// Transport carrying the RapidAPI authentication headers
    pub fn for_upstream(config: &FetcherConfig) -> Result<Self> {
        let api_key = config.get_api_key()?;
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-rapidapi-key"),
            HeaderValue::from_str(&api_key).map_err(|e| {
                FetcherError::config(format!("invalid API key header: {e}"))
            })?,
        );
        headers.insert(
            HeaderName::from_static("x-rapidapi-host"),
            HeaderValue::from_str(&config.upstream.host).map_err(|e| {
                FetcherError::config(format!("invalid API host header: {e}"))
            })?,
        );

        Self::new(config.http_timeout(), headers)
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, query: &[(String, String)]) -> anyhow::Result<HttpResponse> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {url}"))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| parse_retry_after(value, Utc::now()));

        let body = response.text().await.context("Failed to read response body")?;

        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// Parse a `Retry-After` header: delta seconds or an HTTP date
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

/// Classify a response into exactly one outcome
pub fn classify(url: &str, response: HttpResponse) -> AttemptOutcome<Value> {
    match response.status {
        200 => match serde_json::from_str::<Value>(&response.body) {
            Ok(payload) => AttemptOutcome::Success(payload),
            Err(e) => AttemptOutcome::Failure(format!("unparseable body from {url}: {e}")),
        },
        429 => AttemptOutcome::RateLimited(response.retry_after),
        status => AttemptOutcome::Failure(format!("status {status} from {url}")),
    }
}

/// GET returning parsed JSON, with bounded backoff on 429.
///
/// Never returns an error: any unrecoverable condition yields `None`.
pub struct JsonFetcher {
    transport: Arc<dyn HttpTransport>,
    policy: BackoffPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl JsonFetcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        policy: BackoffPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            transport,
            policy,
            sleeper,
        }
    }

    pub async fn fetch_json(&self, url: &str, query: &[(String, String)]) -> Option<Value> {
        let result = run_with_backoff(&self.policy, self.sleeper.as_ref(), |attempt| {
            self.attempt(url, query, attempt)
        })
        .await;

        if result.is_none() {
            warn!("No data from {}", url);
        }
        result
    }

    async fn attempt(
        &self,
        url: &str,
        query: &[(String, String)],
        attempt: u32,
    ) -> AttemptOutcome<Value> {
        debug!("GET {} (attempt {})", url, attempt);
        match self.transport.get(url, query).await {
            Ok(response) => {
                let outcome = classify(url, response);
                if let AttemptOutcome::Failure(reason) = &outcome {
                    warn!("Request failed: {}", reason);
                }
                outcome
            }
            Err(e) => {
                warn!("Transport error for {}: {:#}", url, e);
                AttemptOutcome::Failure(e.to_string())
            }
        }
    }
}

/// Client for the upstream tennis API: fixture pages and player lookups
pub struct UpstreamClient {
    fetcher: JsonFetcher,
    base_url: String,
    page_size: u32,
    include: String,
    rank_lookup_templates: Vec<String>,
}

impl UpstreamClient {
    pub fn new(config: &FetcherConfig, fetcher: JsonFetcher) -> Self {
        Self {
            fetcher,
            base_url: config.upstream.base_url.trim_end_matches('/').to_string(),
            page_size: config.upstream.page_size,
            include: config.upstream.include.clone(),
            rank_lookup_templates: config.upstream.rank_lookup_templates.clone(),
        }
    }

    /// Fixture list URL for one division and day
    pub fn fixtures_url(&self, division: &str, date: NaiveDate) -> String {
        format!("{}/tennis/v2/{}/fixtures/{}", self.base_url, division, date.format("%Y-%m-%d"))
    }

    fn fill_template(&self, template: &str, division: &str, participant_id: &str) -> String {
        template
            .replace("{base}", &self.base_url)
            .replace("{division}", division)
            .replace("{id}", &urlencoding::encode(participant_id))
    }
}

/// Records of a page payload: `{ "data": [...] }`, or a bare array
pub fn page_records(payload: Value) -> Vec<Value> {
    match payload {
        Value::Array(records) => records,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(records)) => records,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

#[async_trait::async_trait]
impl PageSource for UpstreamClient {
    fn page_size(&self) -> u32 {
        self.page_size
    }

    async fn fetch_page(
        &self,
        division: &DivisionConfig,
        date: NaiveDate,
        page: u32,
    ) -> Option<Vec<Value>> {
        let url = self.fixtures_url(&division.key, date);
        let query = vec![
            ("page".to_string(), page.to_string()),
            ("pageSize".to_string(), self.page_size.to_string()),
            ("include".to_string(), self.include.clone()),
        ];

        let payload = self.fetcher.fetch_json(&url, &query).await?;
        let records = page_records(payload);
        info!("Fetched {} {} records for {} (page {})", records.len(), division.key, date, page);
        Some(records)
    }
}

#[async_trait::async_trait]
impl RankLookup for UpstreamClient {
    async fn lookup(&self, division: &str, participant_id: &str) -> Option<Value> {
        for template in &self.rank_lookup_templates {
            let url = self.fill_template(template, division, participant_id);
            if let Some(payload) = self.fetcher.fetch_json(&url, &[]).await {
                debug!("Rank lookup for {} answered by {}", participant_id, url);
                return Some(payload);
            }
        }
        None
    }
}
