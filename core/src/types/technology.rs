use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::cve::CvePriorityResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technology {
    pub product: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
}

impl Technology {
    pub fn new(product: &str, version: &str, vendor: Option<&str>) -> Self {
        Self {
            product: product.to_string(),
            version: version.to_string(),
            vendor: vendor.map(str::to_string),
        }
    }

    /// CPE 2.3 match string used for technology lookups; a missing vendor
    /// matches any vendor.
    pub fn cpe_match_string(&self) -> String {
        let vendor = self
            .vendor
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or("*");
        format!(
            "cpe:2.3:*:{}:{}:{}",
            vendor,
            self.product.trim(),
            self.version.trim()
        )
    }
}

/// Structured reason a lookup produced no data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "error")]
pub enum LookupFailure {
    #[serde(rename = "not found")]
    NotFound { context: String },
    #[serde(rename = "max retries reached")]
    MaxRetries { last_status_code: Option<u16> },
    #[serde(rename = "unexpected status")]
    UnexpectedStatus { status_code: u16 },
    #[serde(rename = "transport")]
    Transport { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnologyVulnerabilityResult {
    pub product: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    pub vulnerabilities: BTreeMap<String, CvePriorityResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<LookupFailure>,
}

impl TechnologyVulnerabilityResult {
    pub fn empty(technology: &Technology) -> Self {
        Self {
            product: technology.product.clone(),
            version: technology.version.clone(),
            vendor: technology.vendor.clone(),
            vulnerabilities: BTreeMap::new(),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpe_uses_wildcard_without_vendor() {
        assert_eq!(
            Technology::new("http_server", "2.4.49", Some("apache")).cpe_match_string(),
            "cpe:2.3:*:apache:http_server:2.4.49"
        );
        assert_eq!(
            Technology::new("nginx", "1.18.0", None).cpe_match_string(),
            "cpe:2.3:*:*:nginx:1.18.0"
        );
        assert_eq!(
            Technology::new("nginx", "1.18.0", Some("  ")).cpe_match_string(),
            "cpe:2.3:*:*:nginx:1.18.0"
        );
    }

    #[test]
    fn failures_serialize_with_error_tag() {
        let json = serde_json::to_value(LookupFailure::MaxRetries {
            last_status_code: Some(429),
        })
        .unwrap();
        assert_eq!(json["error"], "max retries reached");
        assert_eq!(json["last_status_code"], 429);

        let json = serde_json::to_value(LookupFailure::NotFound {
            context: "product nginx 1.0".to_string(),
        })
        .unwrap();
        assert_eq!(json["error"], "not found");
        assert_eq!(json["context"], "product nginx 1.0");
    }
}
