use crate::authority::{ExploitAuthority, SeverityAuthority};
use crate::classifier::classify;
use crate::config::Config;
use crate::epss::EpssClient;
use crate::error::{PostureError, Result};
use crate::nvd::NvdClient;
use crate::types::{CvePriorityResult, Thresholds};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

static CVE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^CVE-\d{4}-\d{4,}$").expect("CVE id pattern is valid"));
const DEFAULT_MAX_WORKERS: usize = 40;
const DEFAULT_PACING: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrioritizeOptions {
    pub thresholds: Thresholds,
    pub max_workers: usize,
    /// Delay each worker waits before its lookups.
    pub pacing: Duration,
}

impl Default for PrioritizeOptions {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            max_workers: DEFAULT_MAX_WORKERS,
            pacing: DEFAULT_PACING,
        }
    }
}

impl PrioritizeOptions {
    pub fn with_thresholds(mut self, cvss: f64, epss: f64) -> Self {
        self.thresholds = Thresholds::new(cvss, epss);
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    fn validate(&self) -> Result<()> {
        let mut errors = self.thresholds.validate();
        if self.max_workers == 0 {
            errors.push("max_workers must be greater than zero".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PostureError::validation(errors.join("; ")))
        }
    }
}

/// Canonical form of one CVE id: trimmed and upper-cased. `None` for blank
/// input or anything that is not a CVE id.
pub fn normalize_cve_id(raw: &str) -> Option<String> {
    let id = raw.trim().to_uppercase();
    CVE_ID.is_match(&id).then_some(id)
}

/// Trims, upper-cases and de-duplicates CVE ids. Blank entries are skipped;
/// anything that is not a CVE id fails the whole batch.
pub fn normalize_cve_ids<I, S>(cve_ids: I) -> Result<BTreeSet<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized = BTreeSet::new();
    for raw in cve_ids {
        let raw = raw.as_ref();
        if raw.trim().is_empty() {
            continue;
        }
        let id = normalize_cve_id(raw)
            .ok_or_else(|| PostureError::validation(format!("'{}' is not a CVE identifier", raw)))?;
        normalized.insert(id);
    }
    Ok(normalized)
}

/// Fans CVE ids out over a bounded worker pool, merges NVD severity with
/// EPSS probability and classifies each one.
#[derive(Clone)]
pub struct Prioritizer {
    severity: Arc<dyn SeverityAuthority>,
    exploit: Arc<dyn ExploitAuthority>,
    options: PrioritizeOptions,
}

impl Prioritizer {
    pub fn new(severity: Arc<dyn SeverityAuthority>, exploit: Arc<dyn ExploitAuthority>) -> Self {
        Self {
            severity,
            exploit,
            options: PrioritizeOptions::default(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let nvd = NvdClient::new(&config.nvd)?;
        let epss = EpssClient::new(&config.epss)?;
        let options = PrioritizeOptions {
            thresholds: config.prioritizer.thresholds(),
            max_workers: config.prioritizer.max_workers,
            pacing: config.prioritizer.pacing(),
        };
        Ok(Self::new(Arc::new(nvd), Arc::new(epss)).with_options(options))
    }

    pub fn with_options(mut self, options: PrioritizeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PrioritizeOptions {
        &self.options
    }

    pub fn severity_authority(&self) -> &Arc<dyn SeverityAuthority> {
        &self.severity
    }

    pub async fn prioritize<I, S>(&self, cve_ids: I) -> Result<BTreeMap<String, CvePriorityResult>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.prioritize_with(cve_ids, &self.options).await
    }

    /// Only CVEs for which both lookups produced usable data appear in the
    /// result; every other id is dropped without failing the batch.
    pub async fn prioritize_with<I, S>(
        &self,
        cve_ids: I,
        options: &PrioritizeOptions,
    ) -> Result<BTreeMap<String, CvePriorityResult>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        options.validate()?;
        let cve_ids = normalize_cve_ids(cve_ids)?;
        if cve_ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        let start = Instant::now();
        let requested = cve_ids.len();
        info!(
            requested,
            max_workers = options.max_workers,
            "prioritizing CVEs"
        );

        let semaphore = Arc::new(Semaphore::new(options.max_workers));
        let mut workers = JoinSet::new();

        for cve_id in cve_ids {
            let semaphore = Arc::clone(&semaphore);
            let severity = Arc::clone(&self.severity);
            let exploit = Arc::clone(&self.exploit);
            let thresholds = options.thresholds;
            let pacing = options.pacing;

            workers.spawn(async move {
                // The permit is held through pacing and any backoff.
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return None;
                };
                evaluate(cve_id, severity.as_ref(), exploit.as_ref(), &thresholds, pacing).await
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Some(result)) => {
                    results.insert(result.cve_id.clone(), result);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "prioritization worker failed"),
            }
        }

        info!(
            requested,
            prioritized = results.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "prioritization finished"
        );
        Ok(results)
    }
}

async fn evaluate(
    cve_id: String,
    severity: &dyn SeverityAuthority,
    exploit: &dyn ExploitAuthority,
    thresholds: &Thresholds,
    pacing: Duration,
) -> Option<CvePriorityResult> {
    tokio::time::sleep(pacing).await;

    let nvd = match severity.severity(&cve_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            debug!(cve_id = %cve_id, source = severity.name(), "no severity data, dropping");
            return None;
        }
        Err(e) => {
            debug!(cve_id = %cve_id, source = severity.name(), error = %e, "severity lookup failed, dropping");
            return None;
        }
    };

    let epss = match exploit.exploit_probability(&cve_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            debug!(cve_id = %cve_id, source = exploit.name(), "no exploit data, dropping");
            return None;
        }
        Err(e) => {
            debug!(cve_id = %cve_id, source = exploit.name(), error = %e, "exploit lookup failed, dropping");
            return None;
        }
    };

    if !(0.0..=10.0).contains(&nvd.cvss_base_score) {
        debug!(cve_id = %cve_id, score = nvd.cvss_base_score, "CVSS score out of range, dropping");
        return None;
    }

    let priority = classify(nvd.cisa_kev, nvd.cvss_base_score, epss.epss, thresholds);
    debug!(cve_id = %cve_id, priority = %priority, "classified");

    Some(CvePriorityResult {
        cve_id,
        priority,
        epss: epss.epss,
        percentile: epss.percentile,
        cvss_base_score: nvd.cvss_base_score,
        cvss_version: nvd.cvss_version,
        cvss_severity: nvd.cvss_severity,
        cisa_kev: nvd.cisa_kev,
    })
}
