//! Shared HTTP transport for the read-only connectors.
//!
//! Every outbound request goes through [`HttpFetcher::get_json`], which applies
//! a per-request timeout, retries transient failures (transport errors, 429,
//! 5xx) with exponential backoff, and trips a circuit breaker after repeated
//! failures so a dead remote host stops costing a full retry cycle per call.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::FetchError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub timeout: Duration,
    /// Total attempts per call, the first one included.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each further attempt.
    pub base_delay: Duration,
    /// Consecutive failed calls before the circuit opens.
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * (1 << (attempt - 1).min(16))
    }
}

/// Appends `segments` to `base`, percent-encoding each one, so a stored name
/// can never add path segments or start a query string.
pub fn endpoint(base: &str, segments: &[&str]) -> Result<Url, FetchError> {
    let mut url = Url::parse(base).map_err(|e| FetchError::InvalidUrl(format!("{base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| FetchError::InvalidUrl(format!("{base}: cannot take a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Closed { failures: u32 },
    Open { until: Instant },
    /// One trial call is out; everyone else fails fast until it reports back
    /// or `until` passes (the trial's caller was dropped).
    Trial { until: Instant },
}

struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    phase: Mutex<Phase>,
}

impl CircuitBreaker {
    fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            phase: Mutex::new(Phase::Closed { failures: 0 }),
        }
    }

    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fails fast while open. Once the cooldown has elapsed a single trial call
    /// is let through; its outcome decides whether the circuit closes or reopens.
    fn check(&self) -> Result<(), FetchError> {
        let mut phase = self.phase();
        let now = Instant::now();
        match *phase {
            Phase::Closed { .. } => Ok(()),
            Phase::Open { until } | Phase::Trial { until } if now < until => {
                Err(FetchError::CircuitOpen)
            }
            _ => {
                *phase = Phase::Trial {
                    until: now + self.cooldown,
                };
                Ok(())
            }
        }
    }

    fn record_success(&self) {
        *self.phase() = Phase::Closed { failures: 0 };
    }

    fn record_failure(&self) {
        let mut phase = self.phase();
        *phase = match *phase {
            Phase::Closed { failures } if failures + 1 < self.threshold => Phase::Closed {
                failures: failures + 1,
            },
            _ => Phase::Open {
                until: Instant::now() + self.cooldown,
            },
        };
    }
}

/// One per remote host. Holds the pooled `reqwest::Client` and that host's
/// circuit breaker state.
pub struct HttpFetcher {
    name: &'static str,
    client: Client,
    policy: RetryPolicy,
    breaker: CircuitBreaker,
}

impl HttpFetcher {
    pub fn new(name: &'static str, policy: RetryPolicy) -> Self {
        Self {
            name,
            client: Client::new(),
            breaker: CircuitBreaker::new(policy.failure_threshold, policy.cooldown),
            policy,
        }
    }

    /// Sends the request produced by `build` and deserializes a 2xx JSON body.
    ///
    /// `build` is invoked once per attempt. Non-retryable statuses (4xx other
    /// than 429) are returned immediately as [`FetchError::Status`] and do not
    /// count against the circuit breaker, since the host did answer.
    pub async fn get_json<T, F>(&self, build: F) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        self.get_json_with_headers(build).await.map(|(body, _)| body)
    }

    /// Like [`HttpFetcher::get_json`], also handing back the response headers
    /// (pagination links live there).
    pub async fn get_json_with_headers<T, F>(&self, build: F) -> Result<(T, HeaderMap), FetchError>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        self.breaker.check()?;

        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let error = match build(&self.client).timeout(self.policy.timeout).send().await {
                Err(e) => FetchError::from(e),
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        warn!("{} returned {}", self.name, status);
                        FetchError::Status {
                            status: status.as_u16(),
                        }
                    } else if !status.is_success() {
                        self.breaker.record_success();
                        return Err(FetchError::Status {
                            status: status.as_u16(),
                        });
                    } else {
                        let headers = response.headers().clone();
                        match response.bytes().await {
                            Ok(body) => {
                                self.breaker.record_success();
                                debug!("{} request succeeded ({} bytes)", self.name, body.len());
                                return Ok((serde_json::from_slice(&body)?, headers));
                            }
                            Err(e) => FetchError::from(e),
                        }
                    }
                }
            };

            if attempt >= attempts {
                self.breaker.record_failure();
                return Err(if attempts > 1 {
                    FetchError::Exhausted {
                        attempts,
                        last: Box::new(error),
                    }
                } else {
                    error
                });
            }

            let delay = self.policy.backoff(attempt);
            warn!(
                "{} request attempt {} failed ({}), retrying after {}ms...",
                self.name,
                attempt,
                error,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
