//! Blocking HTTP access with bounded retries.
//!
//! Transport and sleeping sit behind the [`HttpClient`] and [`Sleeper`] traits
//! so that the backoff schedule can be exercised without a network or a clock.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Characters Gerrit prepends to every JSON body to defeat script inclusion.
pub const GERRIT_PREFIX_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    /// Raw `Link` header, used for GitHub pagination.
    pub link: Option<String>,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            link: None,
        }
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connection(String),
}

pub trait HttpClient {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, TransportError>;
}

impl<T: HttpClient + ?Sized> HttpClient for &T {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, TransportError> {
        (**self).get(url, headers)
    }
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

impl<T: Sleeper + ?Sized> Sleeper for &T {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// ureq-backed client. Status codes are returned to the caller rather than
/// turned into errors.
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::config::Config::builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self { agent }
    }
}

fn classify(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(t) => TransportError::Timeout(t.to_string()),
        other => TransportError::Connection(other.to_string()),
    }
}

impl HttpClient for UreqClient {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, TransportError> {
        let mut req = self.agent.get(url);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        let response = req.call().map_err(classify)?;

        let status = response.status().as_u16();
        let link = response
            .headers()
            .get("link")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.into_body().read_to_string().map_err(classify)?;

        Ok(HttpResponse { status, body, link })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Delay before the retry following attempt 0; doubled for each later attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_seconds: default_timeout_seconds(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Backoff after a failed attempt. Attempts are numbered from 0, so the
    /// default schedule is 1s, 2s, 4s, ...
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("gave up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: TransportError,
    },
    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

pub struct Fetcher<C, S = ThreadSleeper> {
    client: C,
    sleeper: S,
    policy: RetryPolicy,
}

impl<C: HttpClient> Fetcher<C, ThreadSleeper> {
    pub fn new(client: C, policy: RetryPolicy) -> Self {
        Self::with_sleeper(client, ThreadSleeper, policy)
    }
}

impl<C: HttpClient, S: Sleeper> Fetcher<C, S> {
    pub fn with_sleeper(client: C, sleeper: S, policy: RetryPolicy) -> Self {
        Self {
            client,
            sleeper,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// GET `url` and return the body of a 200 response.
    ///
    /// Transport failures are retried with exponential backoff; any other
    /// status ends the request at once.
    pub fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let attempts = self.policy.max_retries.max(1);
        let mut attempt = 0;
        loop {
            match self.client.get(url, &[]) {
                Ok(response) if response.status == 200 => return Ok(response.body),
                Ok(response) => {
                    warn!(url, status = response.status, "failed to fetch data");
                    return Err(FetchError::Status {
                        url: url.to_string(),
                        status: response.status,
                    });
                }
                Err(err) if attempt + 1 < attempts => {
                    warn!(
                        url,
                        error = %err,
                        "error fetching data, retrying ({}/{})",
                        attempt + 1,
                        attempts
                    );
                    self.sleeper.sleep(self.policy.delay_for_attempt(attempt));
                    attempt += 1;
                }
                Err(err) => {
                    warn!(url, error = %err, "max retries reached");
                    return Err(FetchError::RetriesExhausted {
                        url: url.to_string(),
                        attempts,
                        last: err,
                    });
                }
            }
        }
    }

    /// Fetch a Gerrit JSON document, dropping its anti-XSSI prefix.
    pub fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        debug!(url, "fetching");
        let body = self.fetch_text(url)?;
        serde_json::from_str(strip_gerrit_prefix(&body)).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

pub fn strip_gerrit_prefix(body: &str) -> &str {
    match body.char_indices().nth(GERRIT_PREFIX_LEN) {
        Some((idx, _)) => &body[idx..],
        None => "",
    }
}
