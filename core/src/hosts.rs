use crate::config::HostsConfig;
use crate::error::{PostureError, Result};
use crate::fault::HostFault;
use crate::tls::{certificate_matches, RustlsProbe, TlsProbe};
use crate::types::{HostCheckResult, Protocol};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::{Host, Url};

pub const SECURE: &str = "Secure connection";
pub const NOT_SECURE: &str = "Not secure connection";
pub const CERT_NOT_TRUSTED: &str = "Not secure connection (Certificate not trusted)";

const HTTPS_PORT: u16 = 443;

/// A host as requested by the caller: the URL to fetch and the endpoint the
/// certificate probe connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub url: Url,
    pub host: String,
    pub port: u16,
}

/// Inputs without a scheme are treated as https. The probe endpoint comes
/// from the input as written, falling back to the https form for bare
/// domains (`example.com`, `localhost:8443`).
pub fn parse_target(site: &str) -> std::result::Result<Target, HostFault> {
    let site = site.trim();
    let invalid = |e: url::ParseError| HostFault::Unresolvable {
        raw: format!("invalid URL '{}': {}", site, e),
    };

    let url = if site.contains("://") {
        Url::parse(site).map_err(invalid)?
    } else {
        Url::parse(&format!("https://{}", site)).map_err(invalid)?
    };

    let endpoint = Url::parse(site)
        .ok()
        .filter(|u| u.host().is_some())
        .unwrap_or_else(|| url.clone());

    let host = match endpoint.host() {
        Some(Host::Domain(domain)) => domain.to_string(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        None => {
            return Err(HostFault::Unresolvable {
                raw: format!("no host in '{}'", site),
            })
        }
    };

    Ok(Target {
        url,
        host,
        port: endpoint.port().unwrap_or(HTTPS_PORT),
    })
}

/// Fetches a URL and reports where it finally landed.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn final_url(&self, url: &Url) -> std::result::Result<Url, HostFault>;
}

/// Follows redirects with certificate verification off; trust is judged by
/// the TLS probe afterwards.
#[derive(Debug, Clone)]
pub struct HttpReachability {
    client: reqwest::Client,
}

impl HttpReachability {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .user_agent(concat!("posture/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PostureError::Config {
                message: format!("failed to build reachability client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ReachabilityProbe for HttpReachability {
    async fn final_url(&self, url: &Url) -> std::result::Result<Url, HostFault> {
        let host = url.host_str().unwrap_or_default();
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| HostFault::from_request(&e, host))?;

        debug!(url = %url, status = response.status().as_u16(), landed = %response.url(), "reachability response");
        Ok(response.url().clone())
    }
}

/// Classifies hosts by effective protocol and certificate trust.
#[derive(Clone)]
pub struct HostChecker {
    reachability: Arc<dyn ReachabilityProbe>,
    tls: Arc<dyn TlsProbe>,
}

impl HostChecker {
    pub fn new(reachability: Arc<dyn ReachabilityProbe>, tls: Arc<dyn TlsProbe>) -> Self {
        Self { reachability, tls }
    }

    pub fn from_config(config: &HostsConfig) -> Result<Self> {
        let reachability = HttpReachability::new(config.connect_timeout(), config.read_timeout())?;
        let tls = RustlsProbe::new(config.handshake_timeout()).with_strict_names(config.strict_hostname);
        Ok(Self::new(Arc::new(reachability), Arc::new(tls)))
    }

    /// One entry per distinct input, keyed by the input exactly as given.
    /// Hosts are checked one after another.
    pub async fn check_hosts<I, S>(&self, hosts: I) -> BTreeMap<String, HostCheckResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut results = BTreeMap::new();
        for site in hosts {
            let site = site.as_ref();
            if results.contains_key(site) {
                continue;
            }
            let result = self.check_host(site).await;
            results.insert(site.to_string(), result);
        }
        results
    }

    /// Never fails: faults are folded into the result.
    pub async fn check_host(&self, site: &str) -> HostCheckResult {
        let result = match self.verdict(site).await {
            Ok(result) => result,
            Err(fault) => HostCheckResult::failed(
                site,
                fault.protocol(),
                fault.to_string(),
                fault.raw().map(str::to_string),
            ),
        };

        info!(
            host = %site,
            protocol = %result.protocol,
            description = result.description.as_deref().unwrap_or_default(),
            error = result.error.as_deref().unwrap_or_default(),
            "host checked"
        );
        result
    }

    async fn verdict(&self, site: &str) -> std::result::Result<HostCheckResult, HostFault> {
        let target = parse_target(site)?;
        let landed = self.reachability.final_url(&target.url).await?;

        if landed.scheme() != "https" {
            return Ok(HostCheckResult::described(site, Protocol::Http, NOT_SECURE));
        }

        let certificate = self.tls.certificate(&target.host, target.port).await?;
        let description = if certificate_matches(&certificate, &target.host) {
            SECURE
        } else {
            CERT_NOT_TRUSTED
        };
        Ok(HostCheckResult::described(site, Protocol::Https, description))
    }
}
