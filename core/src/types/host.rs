use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
    Undefined,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Https => write!(f, "https"),
            Protocol::Undefined => write!(f, "undefined"),
        }
    }
}

/// Verdict for one requested host. Exactly one of `description` and
/// `error` is set; an `undefined` protocol always carries an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCheckResult {
    pub host: String,
    pub protocol: Protocol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Underlying error text, kept for diagnostics when `error` is a
    /// normalized category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_error: Option<String>,
}

impl HostCheckResult {
    pub fn described(host: &str, protocol: Protocol, description: &str) -> Self {
        Self {
            host: host.to_string(),
            protocol,
            description: Some(description.to_string()),
            error: None,
            raw_error: None,
        }
    }

    pub fn failed(host: &str, protocol: Protocol, error: String, raw_error: Option<String>) -> Self {
        Self {
            host: host.to_string(),
            protocol,
            description: None,
            error: Some(error),
            raw_error,
        }
    }

    pub fn is_secure(&self) -> bool {
        self.protocol == Protocol::Https && self.description.as_deref() == Some(crate::hosts::SECURE)
    }
}

/// Names a served certificate claims to be valid for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateInfo {
    pub subject_alt_names: Vec<(String, String)>,
}

impl CertificateInfo {
    pub fn from_dns_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            subject_alt_names: names
                .into_iter()
                .map(|n| ("DNS".to_string(), n.into()))
                .collect(),
        }
    }

    pub fn dns_names(&self) -> impl Iterator<Item = &str> {
        self.subject_alt_names
            .iter()
            .filter(|(kind, _)| kind == "DNS")
            .map(|(_, value)| value.as_str())
    }
}
