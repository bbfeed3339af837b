//! Merges CVE prioritization into saved port/service scan output.
//!
//! The input is the JSON produced by nmap version detection with the
//! `vulners` script (`host -> ports[] -> scripts[] -> data{cpe -> children}`).
//! Running the scanner is left to the caller.

use crate::error::{PostureError, Result};
use crate::prioritizer::{normalize_cve_id, Prioritizer};
use crate::types::{CvePriorityResult, Numeric};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

const UNKNOWN: &str = "Unknown";
const VULNERS_SCRIPT: &str = "vulners";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScannedHost {
    #[serde(default)]
    pub ports: Vec<ScannedPort>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScannedPort {
    #[serde(default)]
    pub portid: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub service: Option<ScannedService>,
    #[serde(default)]
    pub scripts: Vec<ScriptOutput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScannedService {
    pub name: Option<String>,
    pub product: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptOutput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub data: Option<BTreeMap<String, CpeFindings>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CpeFindings {
    #[serde(default)]
    pub children: Vec<VulnersEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VulnersEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub cvss: Option<Numeric>,
    #[serde(default)]
    pub is_exploit: bool,
}

/// Hosts keyed by address.
pub type NetworkScan = BTreeMap<String, ScannedHost>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub product: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortVulnerability {
    pub cvss: Option<f64>,
    pub is_exploit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_details: Option<CvePriorityResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortVulnerabilities {
    pub protocol: String,
    pub service: ServiceInfo,
    pub vulnerabilities: BTreeMap<String, PortVulnerability>,
}

/// host -> port id -> findings
pub type NetworkVulnerabilities = BTreeMap<String, BTreeMap<String, PortVulnerabilities>>;

/// Parses saved scan JSON. Top-level entries without a `ports` list (scan
/// statistics, runtime info) are skipped.
pub fn parse_scan(content: &str) -> Result<NetworkScan> {
    let raw: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(content).map_err(|e| PostureError::validation(format!("invalid scan output: {}", e)))?;

    let mut scan = NetworkScan::new();
    for (host, value) in raw {
        if value.get("ports").is_none() {
            debug!(entry = %host, "skipping non-host scan entry");
            continue;
        }
        let parsed: ScannedHost = serde_json::from_value(value).map_err(|e| {
            PostureError::validation(format!("invalid scan output for host {}: {}", host, e))
        })?;
        scan.insert(host, parsed);
    }
    Ok(scan)
}

/// Keeps the CVE findings of the `vulners` script for every port, keyed by
/// the canonical CVE id. Ids that are not CVE ids are skipped.
pub fn extract_vulnerabilities(scan: &NetworkScan) -> NetworkVulnerabilities {
    scan.iter()
        .map(|(host, scanned)| {
            let ports: BTreeMap<String, PortVulnerabilities> = scanned
                .ports
                .iter()
                .map(|port| (port.portid.clone().unwrap_or_else(|| UNKNOWN.to_string()), port_findings(port)))
                .collect();
            (host.clone(), ports)
        })
        .collect()
}

fn port_findings(port: &ScannedPort) -> PortVulnerabilities {
    let field = |value: Option<&String>| value.cloned().unwrap_or_else(|| UNKNOWN.to_string());
    let service = port.service.as_ref();

    let vulnerabilities = port
        .scripts
        .iter()
        .filter(|script| script.name.as_deref() == Some(VULNERS_SCRIPT))
        .filter_map(|script| script.data.as_ref())
        .flat_map(|data| data.values())
        .flat_map(|findings| findings.children.iter())
        .filter(|entry| entry.kind == "cve")
        .filter_map(|entry| {
            let Some(cve_id) = normalize_cve_id(&entry.id) else {
                debug!(id = %entry.id, "skipping malformed CVE id in scan output");
                return None;
            };
            Some((
                cve_id,
                PortVulnerability {
                    cvss: entry.cvss.as_ref().and_then(Numeric::value),
                    is_exploit: entry.is_exploit,
                    priority_details: None,
                },
            ))
        })
        .collect();

    PortVulnerabilities {
        protocol: field(port.protocol.as_ref()),
        service: ServiceInfo {
            name: field(service.and_then(|s| s.name.as_ref())),
            product: field(service.and_then(|s| s.product.as_ref())),
            version: field(service.and_then(|s| s.version.as_ref())),
        },
        vulnerabilities,
    }
}

/// Prioritizes each port's CVEs and attaches the details in place. CVEs the
/// engine dropped keep `priority_details` unset.
pub async fn prioritize_findings(prioritizer: &Prioritizer, findings: &mut NetworkVulnerabilities) -> Result<()> {
    for (host, ports) in findings.iter_mut() {
        for (port_id, port) in ports.iter_mut() {
            if port.vulnerabilities.is_empty() {
                continue;
            }

            let details = prioritizer.prioritize(port.vulnerabilities.keys()).await?;
            info!(
                host = %host,
                port = %port_id,
                cves = port.vulnerabilities.len(),
                prioritized = details.len(),
                "port prioritized"
            );

            for (cve_id, result) in details {
                if let Some(entry) = port.vulnerabilities.get_mut(&cve_id) {
                    entry.priority_details = Some(result);
                }
            }
        }
    }
    Ok(())
}

pub async fn scan_network(prioritizer: &Prioritizer, scan: &NetworkScan) -> Result<NetworkVulnerabilities> {
    let mut findings = extract_vulnerabilities(scan);
    prioritize_findings(prioritizer, &mut findings).await?;
    Ok(findings)
}
