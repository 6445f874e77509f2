//! Outbound HTTP shared by tenant discovery and the identity platform
//!
//! Requests go out through [`HttpClient::send`], which applies the client's
//! [`RetryPolicy`], or [`HttpClient::send_once`]. OAuth token requests must use
//! `send_once`: replaying a refresh-token grant can rotate the token twice and
//! the device-code poll loop already paces itself.

use std::time::Duration;

use reqwest::{Client as ReqwestClient, RequestBuilder, Response};
use tracing::{debug, trace};
use workbridge_domain::{ConnectionError, Result};

use crate::errors::InfraError;

const USER_AGENT: &str = concat!("workbridge/", env!("CARGO_PKG_VERSION"));
const MAX_BACKOFF_DOUBLINGS: u32 = 6;

/// How many times a request may be put on the wire
///
/// Only connect failures, timeouts and 5xx answers are repeated. Delays double
/// from `base_backoff` on every retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    base_backoff: Duration,
}

impl RetryPolicy {
    pub const SINGLE: Self = Self { attempts: 1, base_backoff: Duration::ZERO };

    pub fn new(attempts: u32, base_backoff: Duration) -> Self {
        Self { attempts: attempts.max(1), base_backoff }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Pause after failed attempt number `attempt` (1-based).
    fn delay_after(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(MAX_BACKOFF_DOUBLINGS);
        self.base_backoff.saturating_mul(1 << doublings)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200))
    }
}

fn is_transient(outcome: &reqwest::Result<Response>) -> bool {
    match outcome {
        Ok(response) => response.status().is_server_error(),
        Err(error) => error.is_timeout() || error.is_connect(),
    }
}

fn transport_error(error: reqwest::Error) -> ConnectionError {
    InfraError::from(error).into()
}

/// reqwest client plus the default retry policy for idempotent calls
#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: ReqwestClient,
    policy: RetryPolicy,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn get<U: reqwest::IntoUrl>(&self, url: U) -> RequestBuilder {
        self.inner.get(url)
    }

    pub fn post<U: reqwest::IntoUrl>(&self, url: U) -> RequestBuilder {
        self.inner.post(url)
    }

    /// Send with the client's retry policy.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response> {
        self.send_with(request, self.policy).await
    }

    /// Send exactly once, whatever the client's policy says.
    pub async fn send_once(&self, request: RequestBuilder) -> Result<Response> {
        self.send_with(request, RetryPolicy::SINGLE).await
    }

    /// Send under an explicit policy. Requests whose body cannot be replayed
    /// go out once.
    pub async fn send_with(&self, request: RequestBuilder, policy: RetryPolicy) -> Result<Response> {
        let mut original = Some(request);

        for attempt in 1..=policy.attempts {
            let replay = original.as_ref().and_then(RequestBuilder::try_clone);
            let (builder, last) = match replay {
                Some(copy) if attempt < policy.attempts => (copy, false),
                _ => match original.take() {
                    Some(request) => (request, true),
                    None => break,
                },
            };

            let request = builder.build().map_err(transport_error)?;
            let method = request.method().clone();
            let url = request.url().clone();
            trace!(%method, %url, attempt, "sending request");

            let outcome = self.inner.execute(request).await;
            if last || !is_transient(&outcome) {
                return outcome.map_err(transport_error);
            }

            let delay = policy.delay_after(attempt);
            match &outcome {
                Ok(response) => debug!(%method, %url, attempt, status = %response.status(), ?delay, "server error, retrying"),
                Err(error) => debug!(%method, %url, attempt, %error, ?delay, "transport failure, retrying"),
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        Err(ConnectionError::Internal("request was never sent".into()))
    }
}

/// Builder for [`HttpClient`]
///
/// System proxy settings are honoured unless [`bypass_proxy`](Self::bypass_proxy)
/// is set.
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    policy: RetryPolicy,
    user_agent: String,
    bypass_proxy: bool,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            policy: RetryPolicy::default(),
            user_agent: USER_AGENT.to_string(),
            bypass_proxy: false,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Total attempts per `send`, the first one included.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.policy = RetryPolicy::new(attempts, self.policy.base_backoff);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.policy = RetryPolicy::new(self.policy.attempts, backoff);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Connect directly even when `HTTPS_PROXY` and friends are set.
    pub fn bypass_proxy(mut self) -> Self {
        self.bypass_proxy = true;
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).user_agent(self.user_agent);
        if self.bypass_proxy {
            builder = builder.no_proxy();
        }
        let inner = builder.build().map_err(transport_error)?;
        Ok(HttpClient { inner, policy: self.policy })
    }
}
