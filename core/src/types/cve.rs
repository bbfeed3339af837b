use serde::{Deserialize, Serialize};

use super::priority::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CvssVersion {
    #[serde(rename = "CVSS 3.1")]
    V31,
    #[serde(rename = "CVSS 3.0")]
    V30,
    #[serde(rename = "CVSS 2.0")]
    V2,
}

impl std::fmt::Display for CvssVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CvssVersion::V31 => write!(f, "CVSS 3.1"),
            CvssVersion::V30 => write!(f, "CVSS 3.0"),
            CvssVersion::V2 => write!(f, "CVSS 2.0"),
        }
    }
}

/// What the severity authority knows about one CVE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityRecord {
    pub cvss_base_score: f64,
    pub cvss_version: CvssVersion,
    pub cvss_severity: String,
    pub cisa_kev: bool,
}

/// What the exploit-probability authority knows about one CVE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExploitRecord {
    pub epss: f64,
    /// Percentile scaled to 0..=100.
    pub percentile: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvePriorityResult {
    pub cve_id: String,
    pub priority: Priority,
    pub epss: f64,
    pub percentile: u8,
    pub cvss_base_score: f64,
    pub cvss_version: CvssVersion,
    pub cvss_severity: String,
    pub cisa_kev: bool,
}
