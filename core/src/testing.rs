//! In-memory authorities for unit tests.

use crate::authority::{ExploitAuthority, SeverityAuthority};
use crate::error::{PostureError, Result};
use crate::http::{retry_with_backoff, Attempt, RetryPolicy};
use crate::types::{CvssVersion, ExploitRecord, SeverityRecord, Technology};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub(crate) struct FakeSeverity {
    records: HashMap<String, SeverityRecord>,
    not_found: HashSet<String>,
    rate_limited: HashMap<String, usize>,
    technologies: HashMap<String, Vec<String>>,
    technology_errors: HashMap<String, u16>,
    latency: Duration,
    calls: AtomicUsize,
    attempts: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeSeverity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, cve_id: &str, score: f64, kev: bool) -> Self {
        let severity = match score {
            s if s >= 9.0 => "CRITICAL",
            s if s >= 7.0 => "HIGH",
            s if s >= 4.0 => "MEDIUM",
            _ => "LOW",
        };
        self.records.insert(
            cve_id.to_string(),
            SeverityRecord {
                cvss_base_score: score,
                cvss_version: CvssVersion::V31,
                cvss_severity: severity.to_string(),
                cisa_kev: kev,
            },
        );
        self
    }

    pub fn not_found(mut self, cve_id: &str) -> Self {
        self.not_found.insert(cve_id.to_string());
        self
    }

    /// Answers 429 `times` times before serving the record.
    pub fn rate_limited(mut self, cve_id: &str, times: usize) -> Self {
        self.rate_limited.insert(cve_id.to_string(), times);
        self
    }

    pub fn with_technology(mut self, product: &str, cve_ids: &[&str]) -> Self {
        self.technologies.insert(
            product.to_string(),
            cve_ids.iter().map(|id| id.to_string()).collect(),
        );
        self
    }

    pub fn technology_status(mut self, product: &str, status: u16) -> Self {
        self.technology_errors.insert(product.to_string(), status);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn attempt(&self, cve_id: &str) -> Attempt<Option<SeverityRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut attempts = self.attempts.lock().unwrap();
        let seen = attempts.entry(cve_id.to_string()).or_default();
        *seen += 1;

        if self.rate_limited.get(cve_id).is_some_and(|limit| *seen <= *limit) {
            return Attempt::Retry { status: Some(429) };
        }
        Attempt::Done(self.records.get(cve_id).cloned())
    }
}

#[async_trait]
impl SeverityAuthority for FakeSeverity {
    fn name(&self) -> &'static str {
        "fake-nvd"
    }

    async fn severity(&self, cve_id: &str) -> Result<Option<SeverityRecord>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;

        let result = if self.not_found.contains(cve_id) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(PostureError::NotFound {
                context: format!("CVE ID {}", cve_id),
            })
        } else {
            retry_with_backoff("fake-nvd", &RetryPolicy::default(), || async move {
                Ok(self.attempt(cve_id))
            })
            .await
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn technology_cves(&self, technology: &Technology) -> Result<Vec<String>> {
        if let Some(status) = self.technology_errors.get(&technology.product) {
            return Err(match status {
                404 => PostureError::NotFound {
                    context: format!(
                        "product {} and version {}",
                        technology.product, technology.version
                    ),
                },
                429 | 403 => PostureError::MaxRetriesReached {
                    service: "fake-nvd".to_string(),
                    last_status: Some(*status),
                },
                other => PostureError::UnexpectedStatus {
                    service: "fake-nvd".to_string(),
                    status: *other,
                },
            });
        }
        Ok(self
            .technologies
            .get(&technology.product)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub(crate) struct FakeExploit {
    records: HashMap<String, ExploitRecord>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl FakeExploit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, cve_id: &str, epss: f64) -> Self {
        self.records.insert(
            cve_id.to_string(),
            ExploitRecord {
                epss,
                percentile: (epss * 100.0) as u8,
            },
        );
        self
    }

    pub fn failing(mut self, cve_id: &str) -> Self {
        self.failing.insert(cve_id.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExploitAuthority for FakeExploit {
    fn name(&self) -> &'static str {
        "fake-epss"
    }

    async fn exploit_probability(&self, cve_id: &str) -> Result<Option<ExploitRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(cve_id) {
            return Err(PostureError::UnexpectedStatus {
                service: "fake-epss".to_string(),
                status: 503,
            });
        }
        Ok(self.records.get(cve_id).cloned())
    }
}
