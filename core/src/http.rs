use crate::error::{PostureError, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_RETRIES: u32 = 5;
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("posture/", env!("CARGO_PKG_VERSION"));

/// Exponential backoff: retry `n` (zero based) waits `initial_delay * 2^n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_RETRIES,
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
        }
    }

    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
        }
    }

    pub fn delay_for(&self, retry: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Outcome of one attempt inside [`retry_with_backoff`].
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    /// Transient failure; `status` is absent for connection faults.
    Retry { status: Option<u16> },
}

/// Runs `attempt` until it finishes, fails permanently, or the retry budget
/// is spent. The caller keeps its concurrency slot for the whole backoff.
pub async fn retry_with_backoff<T, F, Fut>(
    service: &str,
    policy: &RetryPolicy,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Attempt<T>>>,
{
    let mut retries = 0;
    let mut last_status = None;

    loop {
        match attempt().await? {
            Attempt::Done(value) => return Ok(value),
            Attempt::Retry { status } => {
                if status.is_some() {
                    last_status = status;
                }
                if retries >= policy.max_retries {
                    return Err(PostureError::MaxRetriesReached {
                        service: service.to_string(),
                        last_status,
                    });
                }
                let delay = policy.delay_for(retries);
                warn!(
                    service,
                    status = ?status,
                    retry = retries + 1,
                    delay_ms = delay.as_millis() as u64,
                    "transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
                retries += 1;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    service: String,
    retry: RetryPolicy,
    headers: Vec<(String, String)>,
}

impl HttpClient {
    pub fn new(service: &str) -> Result<Self> {
        Self::with_timeout(service, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(service: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PostureError::Config {
                message: format!("failed to build HTTP client for {}: {}", service, e),
            })?;

        Ok(Self {
            client,
            service: service.to_string(),
            retry: RetryPolicy::none(),
            headers: Vec::new(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// GET `url` and decode a JSON body.
    ///
    /// 200 decodes, 429/403 and connection faults are retried per the
    /// policy, 404 maps to [`PostureError::NotFound`] with `context`, and any
    /// other status fails immediately.
    pub async fn get_json<T>(&self, url: &str, query: &[(&str, String)], context: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        retry_with_backoff(&self.service, &self.retry, || async move {
            let mut request = self.client.get(url).query(query);
            for (name, value) in &self.headers {
                request = request.header(name.as_str(), value.as_str());
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) if e.is_connect() || e.is_timeout() || e.is_request() => {
                    debug!(service = %self.service, error = %e, "connection fault");
                    return Ok(Attempt::Retry { status: None });
                }
                Err(e) => {
                    return Err(PostureError::Transport {
                        service: self.service.clone(),
                        source: e,
                    })
                }
            };

            match response.status() {
                StatusCode::OK => {
                    let body = response.json::<T>().await.map_err(|e| PostureError::Decode {
                        service: self.service.clone(),
                        message: e.to_string(),
                    })?;
                    Ok(Attempt::Done(body))
                }
                status @ (StatusCode::TOO_MANY_REQUESTS | StatusCode::FORBIDDEN) => {
                    Ok(Attempt::Retry {
                        status: Some(status.as_u16()),
                    })
                }
                StatusCode::NOT_FOUND => Err(PostureError::NotFound {
                    context: context.to_string(),
                }),
                status => Err(PostureError::UnexpectedStatus {
                    service: self.service.clone(),
                    status: status.as_u16(),
                }),
            }
        })
        .await
    }
}
