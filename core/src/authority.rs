use crate::epss::EpssClient;
use crate::error::Result;
use crate::nvd::NvdClient;
use crate::types::{ExploitRecord, SeverityRecord, Technology};
use async_trait::async_trait;

/// Source of CVSS severity and CISA KEV membership.
#[async_trait]
pub trait SeverityAuthority: Send + Sync {
    fn name(&self) -> &'static str;

    async fn severity(&self, cve_id: &str) -> Result<Option<SeverityRecord>>;

    /// CVE ids affecting a technology.
    async fn technology_cves(&self, technology: &Technology) -> Result<Vec<String>>;
}

/// Source of exploit-probability scores.
#[async_trait]
pub trait ExploitAuthority: Send + Sync {
    fn name(&self) -> &'static str;

    async fn exploit_probability(&self, cve_id: &str) -> Result<Option<ExploitRecord>>;
}

#[async_trait]
impl SeverityAuthority for NvdClient {
    fn name(&self) -> &'static str {
        "NVD"
    }

    async fn severity(&self, cve_id: &str) -> Result<Option<SeverityRecord>> {
        self.lookup_cve(cve_id).await
    }

    async fn technology_cves(&self, technology: &Technology) -> Result<Vec<String>> {
        NvdClient::technology_cves(self, technology).await
    }
}

#[async_trait]
impl ExploitAuthority for EpssClient {
    fn name(&self) -> &'static str {
        "EPSS"
    }

    async fn exploit_probability(&self, cve_id: &str) -> Result<Option<ExploitRecord>> {
        self.lookup_cve(cve_id).await
    }
}
