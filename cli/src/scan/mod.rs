use anyhow::{Context, Result};
use posture_core::{
    normalize_cve_ids, parse_scan, scan_network, scan_technologies, Config, HostCheckReport, HostChecker,
    NetworkVulnerabilities, PrioritizationReport, Prioritizer, Technology, TechnologyVulnerabilityResult,
};
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// Effective configuration: file values, then environment, then flags.
pub struct Settings {
    pub config: Config,
}

impl Settings {
    pub fn load(path: Option<&Path>, nvd_api_key: Option<String>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        }
        .with_env_overrides();

        if let Some(key) = nvd_api_key.filter(|k| !k.trim().is_empty()) {
            config.nvd.api_key = Some(key);
        }
        debug!(
            config_file = ?path,
            nvd_api_key = config.nvd.api_key.is_some(),
            "configuration loaded"
        );

        Ok(Self { config })
    }

    pub fn with_prioritizer_overrides(&self, cvss: Option<f64>, epss: Option<f64>, workers: Option<usize>) -> Config {
        let mut config = self.config.clone();
        if let Some(cvss) = cvss {
            config.prioritizer.cvss_threshold = cvss;
        }
        if let Some(epss) = epss {
            config.prioritizer.epss_threshold = epss;
        }
        if let Some(workers) = workers {
            config.prioritizer.max_workers = workers;
        }
        config
    }
}

pub async fn run_hosts(config: &Config, hosts: &[String]) -> Result<HostCheckReport> {
    let start = Instant::now();
    let checker = HostChecker::from_config(&config.hosts)?;
    let results = checker.check_hosts(hosts).await;
    Ok(HostCheckReport::new(results, start.elapsed().as_millis() as u64))
}

pub async fn run_prioritize(config: &Config, cve_ids: &[String]) -> Result<PrioritizationReport> {
    let start = Instant::now();
    let requested = normalize_cve_ids(cve_ids)?;
    let prioritizer = Prioritizer::from_config(config)?;
    let results = prioritizer.prioritize(&requested).await?;

    Ok(PrioritizationReport::new(
        &requested,
        results,
        prioritizer.options().thresholds,
        start.elapsed().as_millis() as u64,
    ))
}

pub async fn run_technology(config: &Config, technologies: &[Technology]) -> Result<Vec<TechnologyVulnerabilityResult>> {
    let prioritizer = Prioritizer::from_config(config)?;
    Ok(scan_technologies(&prioritizer, technologies).await?)
}

pub fn read_technologies(path: &Path) -> Result<Vec<Technology>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid technology list in {}", path.display()))
}

pub async fn run_network(config: &Config, path: &Path) -> Result<NetworkVulnerabilities> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let scan = parse_scan(&content)?;
    let prioritizer = Prioritizer::from_config(config)?;
    Ok(scan_network(&prioritizer, &scan).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn flags_override_file_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "prioritizer:\n  cvss_threshold: 7.0\n  max_workers: 8").unwrap();

        let settings = Settings::load(Some(file.path()), Some("flag-key".to_string())).unwrap();
        assert_eq!(settings.config.nvd.api_key.as_deref(), Some("flag-key"));

        let config = settings.with_prioritizer_overrides(None, Some(0.5), Some(2));
        assert_eq!(config.prioritizer.cvss_threshold, 7.0);
        assert_eq!(config.prioritizer.epss_threshold, 0.5);
        assert_eq!(config.prioritizer.max_workers, 2);
    }

    #[test]
    fn reads_technology_lists() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"product": "http_server", "version": "2.4.49", "vendor": "apache"}}, {{"product": "nginx", "version": "1.25.3"}}]"#
        )
        .unwrap();

        let technologies = read_technologies(file.path()).unwrap();
        assert_eq!(technologies.len(), 2);
        assert_eq!(technologies[0].vendor.as_deref(), Some("apache"));
        assert!(technologies[1].vendor.is_none());
    }

    #[tokio::test]
    async fn invalid_cve_id_is_a_caller_error() {
        let err = run_prioritize(&Config::default(), &["not-a-cve".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not-a-cve"));
    }
}
