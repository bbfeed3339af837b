pub mod cve;
pub mod host;
pub mod numeric;
pub mod priority;
pub mod technology;

pub use cve::{CvePriorityResult, CvssVersion, ExploitRecord, SeverityRecord};
pub use host::{CertificateInfo, HostCheckResult, Protocol};
pub use numeric::Numeric;
pub use priority::{Priority, Thresholds};
pub use technology::{LookupFailure, Technology, TechnologyVulnerabilityResult};
