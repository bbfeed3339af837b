use crate::error::{PostureError, Result};
use crate::prioritizer::Prioritizer;
use crate::types::{Technology, TechnologyVulnerabilityResult};
use tracing::{info, warn};

/// Looks up the CVEs affecting each technology and prioritizes them.
pub struct TechnologyScanner<'a> {
    prioritizer: &'a Prioritizer,
}

impl<'a> TechnologyScanner<'a> {
    pub fn new(prioritizer: &'a Prioritizer) -> Self {
        Self { prioritizer }
    }

    /// One result per technology, in input order. A failed lookup is kept on
    /// that technology's `error`; a technology without product or version
    /// rejects the whole batch before any request is made.
    pub async fn scan(&self, technologies: &[Technology]) -> Result<Vec<TechnologyVulnerabilityResult>> {
        for technology in technologies {
            validate(technology)?;
        }

        let authority = self.prioritizer.severity_authority();
        let mut results = Vec::with_capacity(technologies.len());

        for technology in technologies {
            let mut result = TechnologyVulnerabilityResult::empty(technology);

            let cve_ids = match authority.technology_cves(technology).await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(
                        product = %technology.product,
                        version = %technology.version,
                        error = %e,
                        "technology lookup failed"
                    );
                    result.error = Some(e.to_failure());
                    results.push(result);
                    continue;
                }
            };

            info!(
                product = %technology.product,
                version = %technology.version,
                cves = cve_ids.len(),
                "technology CVEs found"
            );

            if !cve_ids.is_empty() {
                result.vulnerabilities = self.prioritizer.prioritize(&cve_ids).await?;
            }
            results.push(result);
        }

        Ok(results)
    }
}

fn validate(technology: &Technology) -> Result<()> {
    if technology.product.trim().is_empty() {
        return Err(PostureError::validation("technology product must not be empty"));
    }
    if technology.version.trim().is_empty() {
        return Err(PostureError::validation(format!(
            "technology '{}' has no version",
            technology.product
        )));
    }
    Ok(())
}

pub async fn scan_technologies(
    prioritizer: &Prioritizer,
    technologies: &[Technology],
) -> Result<Vec<TechnologyVulnerabilityResult>> {
    TechnologyScanner::new(prioritizer).scan(technologies).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeExploit, FakeSeverity};
    use crate::types::{LookupFailure, Priority};
    use std::sync::Arc;

    fn prioritizer(severity: FakeSeverity, exploit: FakeExploit) -> Prioritizer {
        Prioritizer::new(Arc::new(severity), Arc::new(exploit))
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_input_order_and_records_failures() {
        let prioritizer = prioritizer(
            FakeSeverity::new()
                .with("CVE-2021-41773", 7.5, true)
                .with("CVE-2021-42013", 9.8, false)
                .with_technology("http_server", &["CVE-2021-41773", "CVE-2021-42013"])
                .technology_status("tomcat", 429)
                .technology_status("jetty", 404),
            FakeExploit::new()
                .with("CVE-2021-41773", 0.97)
                .with("CVE-2021-42013", 0.1),
        );

        let technologies = vec![
            Technology::new("tomcat", "9.0.0", Some("apache")),
            Technology::new("http_server", "2.4.49", Some("apache")),
            Technology::new("jetty", "1.0", None),
            Technology::new("nginx", "1.25.3", None),
        ];
        let results = scan_technologies(&prioritizer, &technologies).await.unwrap();

        let products: Vec<&str> = results.iter().map(|r| r.product.as_str()).collect();
        assert_eq!(products, vec!["tomcat", "http_server", "jetty", "nginx"]);

        assert_eq!(
            results[0].error,
            Some(LookupFailure::MaxRetries {
                last_status_code: Some(429)
            })
        );
        assert!(results[0].vulnerabilities.is_empty());

        let apache = &results[1];
        assert!(apache.error.is_none());
        assert_eq!(apache.vulnerabilities["CVE-2021-41773"].priority, Priority::P1Plus);
        assert_eq!(apache.vulnerabilities["CVE-2021-42013"].priority, Priority::P2);

        assert!(matches!(results[2].error, Some(LookupFailure::NotFound { .. })));

        assert!(results[3].error.is_none());
        assert!(results[3].vulnerabilities.is_empty());
    }

    #[tokio::test]
    async fn missing_version_is_a_validation_fault() {
        let prioritizer = prioritizer(FakeSeverity::new(), FakeExploit::new());
        let err = scan_technologies(
            &prioritizer,
            &[
                Technology::new("nginx", "1.25.3", None),
                Technology::new("openssl", " ", None),
            ],
        )
        .await
        .unwrap_err();
        assert!(err.is_validation());
    }
}
