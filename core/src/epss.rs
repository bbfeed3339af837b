use crate::config::EpssConfig;
use crate::http::HttpClient;
use crate::types::{ExploitRecord, Numeric};
use crate::Result;
use serde::Deserialize;

const SERVICE: &str = "EPSS";

/// Client for the FIRST EPSS API. It publishes no rate limit, so requests
/// are made once without retry.
#[derive(Debug, Clone)]
pub struct EpssClient {
    client: HttpClient,
    base_url: String,
}

impl EpssClient {
    pub fn new(config: &EpssConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::with_timeout(SERVICE, config.request_timeout())?,
            base_url: config.base_url.clone(),
        })
    }

    /// `Ok(None)` when EPSS has no score for the id (`total == 0`) or the
    /// score it returned is unusable.
    pub async fn lookup_cve(&self, cve_id: &str) -> Result<Option<ExploitRecord>> {
        let response: EpssResponse = self
            .client
            .get_json(
                &self.base_url,
                &[("cve", cve_id.to_string())],
                &format!("CVE ID {}", cve_id),
            )
            .await?;

        Ok(response.record())
    }
}

#[derive(Debug, Deserialize)]
struct EpssResponse {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    data: Vec<EpssEntry>,
}

#[derive(Debug, Deserialize)]
struct EpssEntry {
    epss: Numeric,
    percentile: Numeric,
}

impl EpssResponse {
    fn record(&self) -> Option<ExploitRecord> {
        if self.total == 0 {
            return None;
        }
        let entry = self.data.first()?;
        let epss = entry.epss.value().filter(|e| (0.0..=1.0).contains(e))?;
        let percentile = entry.percentile.value().filter(|p| (0.0..=1.0).contains(p))?;

        Some(ExploitRecord {
            epss,
            percentile: (percentile * 100.0) as u8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_percentile() {
        let response: EpssResponse = serde_json::from_str(
            r#"{"status": "OK", "total": 1, "data": [{"cve": "CVE-2021-44228", "epss": "0.974410000", "percentile": "0.999750000"}]}"#,
        )
        .unwrap();

        let record = response.record().unwrap();
        assert!((record.epss - 0.97441).abs() < 1e-9);
        assert_eq!(record.percentile, 99);
    }

    #[test]
    fn zero_total_is_unavailable() {
        let response: EpssResponse =
            serde_json::from_str(r#"{"status": "OK", "total": 0, "data": []}"#).unwrap();
        assert!(response.record().is_none());
    }

    #[test]
    fn out_of_range_score_is_unavailable() {
        let response: EpssResponse = serde_json::from_str(
            r#"{"total": 1, "data": [{"epss": "1.7", "percentile": "0.5"}]}"#,
        )
        .unwrap();
        assert!(response.record().is_none());
    }
}
