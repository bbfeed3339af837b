use crate::error::{PostureError, Result};
use crate::http::RetryPolicy;
use crate::types::Thresholds;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const NVD_BASE_URL: &str = "https://services.nvd.nist.gov/rest/json/cves/2.0";
pub const EPSS_BASE_URL: &str = "https://api.first.org/data/v1/epss";
pub const NVD_API_KEY_ENV: &str = "POSTURE_NVD_API_KEY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub nvd: NvdConfig,
    pub epss: EpssConfig,
    pub prioritizer: PrioritizerConfig,
    pub hosts: HostsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NvdConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub results_per_page: usize,
    pub request_timeout_secs: u64,
}

impl Default for NvdConfig {
    fn default() -> Self {
        Self {
            base_url: NVD_BASE_URL.to_string(),
            api_key: None,
            max_retries: 5,
            initial_backoff_ms: 1000,
            results_per_page: 2000,
            request_timeout_secs: 30,
        }
    }
}

impl NvdConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.initial_backoff_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EpssConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for EpssConfig {
    fn default() -> Self {
        Self {
            base_url: EPSS_BASE_URL.to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl EpssConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrioritizerConfig {
    pub cvss_threshold: f64,
    pub epss_threshold: f64,
    /// NVD allows 50 requests per rolling 30 seconds; 40 paced workers stay
    /// under it with room for latency.
    pub max_workers: usize,
    pub pacing_ms: u64,
}

impl Default for PrioritizerConfig {
    fn default() -> Self {
        let thresholds = Thresholds::default();
        Self {
            cvss_threshold: thresholds.cvss,
            epss_threshold: thresholds.epss,
            max_workers: 40,
            pacing_ms: 1000,
        }
    }
}

impl PrioritizerConfig {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds::new(self.cvss_threshold, self.epss_threshold)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostsConfig {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub handshake_timeout_secs: u64,
    /// Report a certificate issued for another name as a verification
    /// failure instead of an untrusted-certificate verdict.
    pub strict_hostname: bool,
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            read_timeout_secs: 60,
            handshake_timeout_secs: 10,
            strict_hostname: false,
        }
    }
}

impl HostsConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PostureError::ConfigNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content, path)
    }

    pub fn from_yaml(content: &str, file: &Path) -> Result<Self> {
        let config: Config = if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| {
                let (line, column) = e
                    .location()
                    .map(|l| (l.line(), l.column()))
                    .unwrap_or((0, 0));
                PostureError::YamlSyntaxError {
                    file: file.to_path_buf(),
                    line,
                    column,
                    message: e.to_string(),
                }
            })?
        };

        let errors = config.validate();
        if !errors.is_empty() {
            return Err(PostureError::InvalidConfig {
                file: file.to_path_buf(),
                errors,
            });
        }

        Ok(config)
    }

    /// Fills the NVD API key from the environment when the file left it unset.
    pub fn with_env_overrides(mut self) -> Self {
        if self.nvd.api_key.is_none() {
            self.nvd.api_key = std::env::var(NVD_API_KEY_ENV)
                .ok()
                .filter(|k| !k.trim().is_empty());
        }
        self
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (name, value) in [("nvd.base_url", &self.nvd.base_url), ("epss.base_url", &self.epss.base_url)] {
            if let Err(e) = url::Url::parse(value) {
                errors.push(format!("{} '{}' is not a valid URL: {}", name, value, e));
            }
        }
        if self.nvd.results_per_page == 0 {
            errors.push("nvd.results_per_page must be greater than zero".to_string());
        }
        if self.nvd.request_timeout_secs == 0 || self.epss.request_timeout_secs == 0 {
            errors.push("request timeouts must be greater than zero".to_string());
        }

        errors.extend(
            self.prioritizer
                .thresholds()
                .validate()
                .into_iter()
                .map(|e| format!("prioritizer: {}", e)),
        );
        if self.prioritizer.max_workers == 0 {
            errors.push("prioritizer.max_workers must be greater than zero".to_string());
        }

        if self.hosts.connect_timeout_secs == 0
            || self.hosts.read_timeout_secs == 0
            || self.hosts.handshake_timeout_secs == 0
        {
            errors.push("hosts timeouts must be greater than zero".to_string());
        }

        errors
    }
}
