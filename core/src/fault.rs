use crate::tls::{is_name_mismatch, is_self_signed};
use crate::types::Protocol;
use rustls::pki_types::CertificateDer;
use rustls::CertificateError;
use std::error::Error as StdError;
use std::io;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CertificateFault {
    #[error("The certificate has expired")]
    Expired,

    #[error("Self signed certificate")]
    SelfSigned,

    #[error("There is a self-signed certificate in the certificate chain")]
    SelfSignedInChain,

    #[error("Hostname mismatch, certificate is not valid for '{host}'")]
    HostnameMismatch { host: String },

    #[error("The certificate is not trusted")]
    Untrusted,
}

/// Why a host check produced no verdict. The display text is the stable,
/// user-facing message; `raw` keeps the underlying error for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostFault {
    #[error("The website could not be resolved")]
    Unresolvable { raw: String },

    #[error("The host is refusing the connection")]
    Refused { raw: String },

    #[error("The operation has timed out, possibly due to network issues or the server being unavailable")]
    TimedOut { raw: String },

    #[error("Certificate verification failed: {fault}")]
    Certificate { fault: CertificateFault, raw: String },

    #[error("The TLS handshake failed")]
    Handshake { raw: String },

    #[error("There was a problem with the HTTP communication.")]
    Protocol { raw: String },

    #[error("The connection to the host failed")]
    Connection { raw: String },

    #[error("Failed to establish connection")]
    NoPeerCertificate,
}

impl HostFault {
    /// TLS-level faults happen after the scheme is known to be https.
    pub fn protocol(&self) -> Protocol {
        match self {
            HostFault::Certificate { .. } | HostFault::Handshake { .. } | HostFault::NoPeerCertificate => {
                Protocol::Https
            }
            _ => Protocol::Undefined,
        }
    }

    pub fn raw(&self) -> Option<&str> {
        match self {
            HostFault::Unresolvable { raw }
            | HostFault::Refused { raw }
            | HostFault::TimedOut { raw }
            | HostFault::Certificate { raw, .. }
            | HostFault::Handshake { raw }
            | HostFault::Protocol { raw }
            | HostFault::Connection { raw } => Some(raw),
            HostFault::NoPeerCertificate => None,
        }
    }

    /// Normalizes a failure from the reachability request.
    pub fn from_request(error: &reqwest::Error, host: &str) -> Self {
        let raw = render_chain(error);
        if error.is_timeout() {
            return HostFault::TimedOut { raw };
        }
        if let Some(fault) = classify_chain(error, host, &[], &raw) {
            return fault;
        }
        if error.is_connect() {
            HostFault::Connection { raw }
        } else {
            HostFault::Protocol { raw }
        }
    }

    /// Normalizes a failure from the TLS probe. `presented` is the chain the
    /// server sent before verification failed, if any.
    pub fn from_io(error: &io::Error, host: &str, presented: &[CertificateDer<'_>]) -> Self {
        let raw = render_chain(error);
        if let Some(fault) = classify_chain(error, host, presented, &raw) {
            return fault;
        }
        match error.kind() {
            io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                HostFault::Connection { raw }
            }
            _ => HostFault::Protocol { raw },
        }
    }
}

fn classify_chain(
    error: &(dyn StdError + 'static),
    host: &str,
    presented: &[CertificateDer<'_>],
    raw: &str,
) -> Option<HostFault> {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(tls) = err.downcast_ref::<rustls::Error>() {
            return Some(from_tls(tls, host, presented, raw));
        }

        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            // io::Error::source skips the wrapped error itself
            if let Some(tls) = io_err.get_ref().and_then(|inner| inner.downcast_ref::<rustls::Error>()) {
                return Some(from_tls(tls, host, presented, raw));
            }
            match io_err.kind() {
                io::ErrorKind::ConnectionRefused => return Some(HostFault::Refused { raw: raw.to_string() }),
                io::ErrorKind::TimedOut => return Some(HostFault::TimedOut { raw: raw.to_string() }),
                _ => {}
            }
        }

        if is_resolution_failure(&err.to_string()) {
            return Some(HostFault::Unresolvable { raw: raw.to_string() });
        }

        current = err.source();
    }
    None
}

fn is_resolution_failure(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    [
        "dns error",
        "failed to lookup address",
        "name or service not known",
        "nodename nor servname",
        "no such host",
    ]
    .iter()
    .any(|needle| message.contains(needle))
}

fn from_tls(error: &rustls::Error, host: &str, presented: &[CertificateDer<'_>], raw: &str) -> HostFault {
    match error {
        rustls::Error::InvalidCertificate(cert) => HostFault::Certificate {
            fault: certificate_fault(cert, host, presented),
            raw: raw.to_string(),
        },
        rustls::Error::NoCertificatesPresented => HostFault::NoPeerCertificate,
        _ => HostFault::Handshake { raw: raw.to_string() },
    }
}

fn certificate_fault(error: &CertificateError, host: &str, presented: &[CertificateDer<'_>]) -> CertificateFault {
    if is_name_mismatch(error) {
        return CertificateFault::HostnameMismatch { host: host.to_string() };
    }
    match error {
        CertificateError::Expired | CertificateError::ExpiredContext { .. } => CertificateFault::Expired,
        CertificateError::UnknownIssuer => untrusted_chain(presented),
        _ => CertificateFault::Untrusted,
    }
}

fn untrusted_chain(presented: &[CertificateDer<'_>]) -> CertificateFault {
    let Some((leaf, rest)) = presented.split_first() else {
        return CertificateFault::Untrusted;
    };
    if rest.iter().any(|cert| is_self_signed(cert)) {
        CertificateFault::SelfSignedInChain
    } else if is_self_signed(leaf) {
        CertificateFault::SelfSigned
    } else {
        CertificateFault::Untrusted
    }
}

fn render_chain(error: &(dyn StdError + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut current = error.source();
    while let Some(err) = current {
        let message = err.to_string();
        if !rendered.contains(&message) {
            rendered.push_str(": ");
            rendered.push_str(&message);
        }
        current = err.source();
    }
    rendered
}
