use crate::config::NvdConfig;
use crate::http::HttpClient;
use crate::types::{CvssVersion, SeverityRecord, Technology};
use crate::Result;
use serde::Deserialize;
use tracing::debug;

const SERVICE: &str = "NVD";

/// Client for the NVD 2.0 CVE API: severity scores and CISA KEV membership.
#[derive(Debug, Clone)]
pub struct NvdClient {
    client: HttpClient,
    base_url: String,
    results_per_page: usize,
}

impl NvdClient {
    pub fn new(config: &NvdConfig) -> Result<Self> {
        let mut client = HttpClient::with_timeout(SERVICE, config.request_timeout())?
            .with_retry(config.retry_policy());
        if let Some(key) = config.api_key.as_deref() {
            client = client.with_header("apiKey", key);
        }

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            results_per_page: config.results_per_page.max(1),
        })
    }

    /// Severity data for one CVE. `Ok(None)` when NVD has the id but no
    /// usable CVSS metrics yet.
    pub async fn lookup_cve(&self, cve_id: &str) -> Result<Option<SeverityRecord>> {
        let response: NvdResponse = self
            .client
            .get_json(
                &self.base_url,
                &[("cveId", cve_id.to_string())],
                &format!("CVE ID {}", cve_id),
            )
            .await?;

        if response.total_results == 0 {
            debug!(cve_id, "not found in NVD");
            return Ok(None);
        }

        let record = response
            .vulnerabilities
            .iter()
            .find_map(|v| v.cve.severity_record());
        if record.is_none() {
            let status = response
                .vulnerabilities
                .first()
                .and_then(|v| v.cve.vuln_status.as_deref())
                .unwrap_or("unknown");
            debug!(cve_id, vuln_status = status, "no CVSS metrics in NVD");
        }
        Ok(record)
    }

    /// Every CVE id NVD associates with the technology's CPE, across all
    /// result pages.
    pub async fn technology_cves(&self, technology: &Technology) -> Result<Vec<String>> {
        let match_string = technology.cpe_match_string();
        let context = format!(
            "product {} and version {}",
            technology.product, technology.version
        );

        let mut cve_ids = Vec::new();
        let mut start_index = 0usize;
        loop {
            let page: NvdResponse = self
                .client
                .get_json(
                    &self.base_url,
                    &[
                        ("virtualMatchString", match_string.clone()),
                        ("resultsPerPage", self.results_per_page.to_string()),
                        ("startIndex", start_index.to_string()),
                    ],
                    &context,
                )
                .await?;

            let fetched = page.vulnerabilities.len();
            cve_ids.extend(page.vulnerabilities.into_iter().map(|v| v.cve.id));
            start_index += fetched;

            debug!(
                cpe = %match_string,
                fetched,
                total = page.total_results,
                "fetched NVD page"
            );
            if fetched == 0 || start_index >= page.total_results {
                break;
            }
        }

        Ok(cve_ids)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NvdResponse {
    #[serde(default)]
    total_results: usize,
    #[serde(default)]
    vulnerabilities: Vec<NvdVulnerability>,
}

#[derive(Debug, Deserialize)]
struct NvdVulnerability {
    cve: NvdCve,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NvdCve {
    id: String,
    #[serde(default)]
    vuln_status: Option<String>,
    #[serde(default)]
    cisa_exploit_add: Option<String>,
    #[serde(default)]
    metrics: NvdMetrics,
}

#[derive(Debug, Default, Deserialize)]
struct NvdMetrics {
    #[serde(rename = "cvssMetricV31", default)]
    v31: Vec<CvssMetric>,
    #[serde(rename = "cvssMetricV30", default)]
    v30: Vec<CvssMetric>,
    #[serde(rename = "cvssMetricV2", default)]
    v2: Vec<CvssMetric>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CvssMetric {
    cvss_data: CvssData,
    /// v2 metrics carry the severity here instead of in `cvssData`.
    #[serde(default)]
    base_severity: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CvssData {
    base_score: f64,
    #[serde(default)]
    base_severity: Option<String>,
}

impl NvdCve {
    fn severity_record(&self) -> Option<SeverityRecord> {
        let (version, metric) = [
            (CvssVersion::V31, &self.metrics.v31),
            (CvssVersion::V30, &self.metrics.v30),
            (CvssVersion::V2, &self.metrics.v2),
        ]
        .into_iter()
        .find_map(|(version, metrics)| metrics.first().map(|m| (version, m)))?;

        let severity = metric
            .cvss_data
            .base_severity
            .clone()
            .or_else(|| metric.base_severity.clone())?;

        Some(SeverityRecord {
            cvss_base_score: metric.cvss_data.base_score,
            cvss_version: version,
            cvss_severity: severity,
            cisa_kev: self.cisa_exploit_add.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> NvdResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn prefers_cvss_31_and_reads_kev() {
        let response = parse(
            r#"{
                "totalResults": 1,
                "vulnerabilities": [{
                    "cve": {
                        "id": "CVE-2021-44228",
                        "cisaExploitAdd": "2021-12-10",
                        "metrics": {
                            "cvssMetricV31": [{"cvssData": {"baseScore": 10.0, "baseSeverity": "CRITICAL"}}],
                            "cvssMetricV2": [{"cvssData": {"baseScore": 9.3}, "baseSeverity": "HIGH"}]
                        }
                    }
                }]
            }"#,
        );

        let record = response.vulnerabilities[0].cve.severity_record().unwrap();
        assert_eq!(record.cvss_version, CvssVersion::V31);
        assert_eq!(record.cvss_base_score, 10.0);
        assert_eq!(record.cvss_severity, "CRITICAL");
        assert!(record.cisa_kev);
    }

    #[test]
    fn v2_severity_falls_back_to_metric_level() {
        let response = parse(
            r#"{
                "totalResults": 1,
                "vulnerabilities": [{
                    "cve": {
                        "id": "CVE-2008-0166",
                        "metrics": {
                            "cvssMetricV2": [{"cvssData": {"baseScore": 7.8}, "baseSeverity": "HIGH"}]
                        }
                    }
                }]
            }"#,
        );

        let record = response.vulnerabilities[0].cve.severity_record().unwrap();
        assert_eq!(record.cvss_version, CvssVersion::V2);
        assert_eq!(record.cvss_severity, "HIGH");
        assert!(!record.cisa_kev);
    }

    #[test]
    fn awaiting_analysis_has_no_record() {
        let response = parse(
            r#"{
                "totalResults": 1,
                "vulnerabilities": [{
                    "cve": {"id": "CVE-2024-99999", "vulnStatus": "Awaiting Analysis", "metrics": {}}
                }]
            }"#,
        );

        assert!(response.vulnerabilities[0].cve.severity_record().is_none());
    }
}
