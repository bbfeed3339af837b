use crate::hosts::CERT_NOT_TRUSTED;
use crate::types::{CvePriorityResult, HostCheckResult, Priority, Protocol, Thresholds};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PrioritySummary {
    pub priority_1_plus: usize,
    pub priority_1: usize,
    pub priority_2: usize,
    pub priority_3: usize,
    pub priority_4: usize,
}

impl PrioritySummary {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a CvePriorityResult>) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.add(result.priority);
        }
        summary
    }

    pub fn add(&mut self, priority: Priority) {
        match priority {
            Priority::P1Plus => self.priority_1_plus += 1,
            Priority::P1 => self.priority_1 += 1,
            Priority::P2 => self.priority_2 += 1,
            Priority::P3 => self.priority_3 += 1,
            Priority::P4 => self.priority_4 += 1,
        }
    }

    pub fn count(&self, priority: Priority) -> usize {
        match priority {
            Priority::P1Plus => self.priority_1_plus,
            Priority::P1 => self.priority_1,
            Priority::P2 => self.priority_2,
            Priority::P3 => self.priority_3,
            Priority::P4 => self.priority_4,
        }
    }

    pub fn total(&self) -> usize {
        Priority::ALL.iter().map(|p| self.count(*p)).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrioritizationReport {
    pub timestamp: DateTime<Utc>,

    pub elapsed: u64,

    pub thresholds: Thresholds,

    pub requested: usize,

    pub summary: PrioritySummary,

    pub results: BTreeMap<String, CvePriorityResult>,

    /// Requested CVEs with no result.
    pub dropped: Vec<String>,
}

impl PrioritizationReport {
    pub fn new(
        requested: &BTreeSet<String>,
        results: BTreeMap<String, CvePriorityResult>,
        thresholds: Thresholds,
        elapsed: u64,
    ) -> Self {
        let dropped = requested
            .iter()
            .filter(|id| !results.contains_key(*id))
            .cloned()
            .collect();

        Self {
            timestamp: Utc::now(),
            elapsed,
            thresholds,
            requested: requested.len(),
            summary: PrioritySummary::from_results(results.values()),
            results,
            dropped,
        }
    }

    /// Results ordered most urgent first, then by CVE id.
    pub fn by_priority(&self) -> Vec<&CvePriorityResult> {
        let mut ordered: Vec<&CvePriorityResult> = self.results.values().collect();
        ordered.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.cve_id.cmp(&b.cve_id)));
        ordered
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HostSummary {
    pub secure: usize,
    pub not_secure: usize,
    pub untrusted: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostCheckReport {
    pub timestamp: DateTime<Utc>,

    pub elapsed: u64,

    pub summary: HostSummary,

    pub results: BTreeMap<String, HostCheckResult>,
}

impl HostCheckReport {
    pub fn new(results: BTreeMap<String, HostCheckResult>, elapsed: u64) -> Self {
        let mut summary = HostSummary::default();
        for result in results.values() {
            if result.error.is_some() {
                summary.errors += 1;
            } else if result.is_secure() {
                summary.secure += 1;
            } else if result.protocol == Protocol::Https
                && result.description.as_deref() == Some(CERT_NOT_TRUSTED)
            {
                summary.untrusted += 1;
            } else {
                summary.not_secure += 1;
            }
        }

        Self {
            timestamp: Utc::now(),
            elapsed,
            summary,
            results,
        }
    }

    pub fn all_secure(&self) -> bool {
        !self.results.is_empty() && self.summary.secure == self.results.len()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosts::{NOT_SECURE, SECURE};
    use crate::types::CvssVersion;

    fn result(id: &str, priority: Priority) -> CvePriorityResult {
        CvePriorityResult {
            cve_id: id.to_string(),
            priority,
            epss: 0.1,
            percentile: 10,
            cvss_base_score: 5.0,
            cvss_version: CvssVersion::V31,
            cvss_severity: "MEDIUM".to_string(),
            cisa_kev: false,
        }
    }

    #[test]
    fn prioritization_report_lists_dropped_ids() {
        let requested: BTreeSet<String> = ["CVE-2023-0001", "CVE-2023-0002", "CVE-2023-0003"]
            .into_iter()
            .map(String::from)
            .collect();
        let mut results = BTreeMap::new();
        results.insert("CVE-2023-0001".to_string(), result("CVE-2023-0001", Priority::P4));
        results.insert("CVE-2023-0003".to_string(), result("CVE-2023-0003", Priority::P1Plus));

        let report = PrioritizationReport::new(&requested, results, Thresholds::default(), 12);

        assert_eq!(report.requested, 3);
        assert_eq!(report.dropped, vec!["CVE-2023-0002".to_string()]);
        assert_eq!(report.summary.priority_1_plus, 1);
        assert_eq!(report.summary.priority_4, 1);
        assert_eq!(report.summary.total(), 2);
        assert_eq!(report.by_priority()[0].cve_id, "CVE-2023-0003");
    }

    #[test]
    fn report_json_uses_priority_labels() {
        let requested: BTreeSet<String> = ["CVE-2021-44228".to_string()].into_iter().collect();
        let mut results = BTreeMap::new();
        results.insert("CVE-2021-44228".to_string(), result("CVE-2021-44228", Priority::P1Plus));

        let report = PrioritizationReport::new(&requested, results, Thresholds::default(), 0);
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["results"]["CVE-2021-44228"]["priority"], "Priority 1+");
        assert_eq!(json["dropped"], serde_json::json!([]));
    }

    #[test]
    fn host_summary_counts_each_verdict() {
        let mut results = BTreeMap::new();
        for (host, result) in [
            ("a", HostCheckResult::described("a", Protocol::Https, SECURE)),
            ("b", HostCheckResult::described("b", Protocol::Https, CERT_NOT_TRUSTED)),
            ("c", HostCheckResult::described("c", Protocol::Http, NOT_SECURE)),
            (
                "d",
                HostCheckResult::failed("d", Protocol::Undefined, "The website could not be resolved".to_string(), None),
            ),
        ] {
            results.insert(host.to_string(), result);
        }

        let report = HostCheckReport::new(results, 5);
        assert_eq!(
            report.summary,
            HostSummary {
                secure: 1,
                not_secure: 1,
                untrusted: 1,
                errors: 1
            }
        );
        assert!(!report.all_secure());
    }
}
