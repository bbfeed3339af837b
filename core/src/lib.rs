//! Posture Core Library
//!
//! HTTPS/TLS host validation and CVE prioritization from NVD severity,
//! EPSS exploit probability and CISA KEV membership.

pub mod types;
pub mod error;
pub mod config;
pub mod http;
pub mod authority;
pub mod nvd;
pub mod epss;
pub mod classifier;
pub mod prioritizer;
pub mod technology;
pub mod network;
pub mod fault;
pub mod tls;
pub mod hosts;
pub mod report;

#[cfg(test)]
pub(crate) mod testing;

pub use types::*;
pub use error::{PostureError, Result};
pub use config::{Config, EpssConfig, HostsConfig, NvdConfig, PrioritizerConfig};
pub use http::{HttpClient, RetryPolicy};
pub use authority::{ExploitAuthority, SeverityAuthority};
pub use nvd::NvdClient;
pub use epss::EpssClient;
pub use classifier::classify;
pub use prioritizer::{normalize_cve_id, normalize_cve_ids, PrioritizeOptions, Prioritizer};
pub use technology::{scan_technologies, TechnologyScanner};
pub use network::{parse_scan, scan_network, NetworkScan, NetworkVulnerabilities};
pub use fault::{CertificateFault, HostFault};
pub use tls::{matches_host, RustlsProbe, TlsProbe};
pub use hosts::{HostChecker, HttpReachability, ReachabilityProbe};
pub use report::{HostCheckReport, PrioritizationReport, PrioritySummary};
