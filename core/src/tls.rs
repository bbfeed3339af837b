use crate::fault::HostFault;
use crate::types::CertificateInfo;
use async_trait::async_trait;
use glob::{MatchOptions, Pattern};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;
use x509_parser::prelude::*;

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const HTTPS_PORT: u16 = 443;

/// Opens a verified TLS session to a host and reports the names its
/// certificate is valid for.
#[async_trait]
pub trait TlsProbe: Send + Sync {
    async fn certificate(&self, host: &str, port: u16) -> Result<CertificateInfo, HostFault>;
}

/// Matches a requested host against one SAN DNS entry. Labels are compared
/// one by one with case-insensitive shell-style patterns, so `*` covers
/// exactly one label.
pub fn matches_host(pattern: &str, host: &str) -> bool {
    let pattern_labels: Vec<&str> = pattern.trim_end_matches('.').split('.').collect();
    let host_labels: Vec<&str> = host.trim_end_matches('.').split('.').collect();
    if pattern_labels.len() != host_labels.len() {
        return false;
    }

    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    pattern_labels.iter().zip(&host_labels).all(|(pattern, label)| {
        !label.is_empty()
            && Pattern::new(pattern)
                .map(|p| p.matches_with(label, options))
                .unwrap_or(false)
    })
}

pub fn certificate_matches(info: &CertificateInfo, host: &str) -> bool {
    info.dns_names().any(|name| matches_host(name, host))
}

/// SAN DNS entries of a DER certificate.
pub fn san_dns_names(der: &[u8]) -> Result<Vec<String>, X509Error> {
    let (_, cert) = X509Certificate::from_der(der).map_err(|e| match e {
        x509_parser::nom::Err::Error(e) | x509_parser::nom::Err::Failure(e) => e,
        x509_parser::nom::Err::Incomplete(_) => X509Error::InvalidCertificate,
    })?;

    Ok(cert
        .extensions()
        .iter()
        .filter_map(|ext| match ext.parsed_extension() {
            ParsedExtension::SubjectAlternativeName(san) => Some(san),
            _ => None,
        })
        .flat_map(|san| san.general_names.iter())
        .filter_map(|name| match name {
            GeneralName::DNSName(dns) => Some(dns.to_string()),
            _ => None,
        })
        .collect())
}

pub fn is_self_signed(der: &[u8]) -> bool {
    X509Certificate::from_der(der)
        .map(|(_, cert)| cert.subject() == cert.issuer())
        .unwrap_or(false)
}

pub(crate) fn is_name_mismatch(error: &CertificateError) -> bool {
    matches!(
        error,
        CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. }
    )
}

type PresentedChain = Arc<Mutex<Vec<CertificateDer<'static>>>>;

/// Delegates to webpki and keeps a copy of whatever chain the server
/// presented, so a rejected chain can still be inspected.
///
/// Unless `strict_names` is set, a chain that is trusted but issued for
/// another name is accepted here; the caller decides the match with
/// [`matches_host`].
#[derive(Debug)]
struct RecordingVerifier {
    inner: Arc<WebPkiServerVerifier>,
    presented: PresentedChain,
    strict_names: bool,
}

impl ServerCertVerifier for RecordingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if let Ok(mut presented) = self.presented.lock() {
            presented.clear();
            presented.push(end_entity.clone().into_owned());
            presented.extend(intermediates.iter().map(|c| c.clone().into_owned()));
        }

        match self
            .inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
        {
            Err(rustls::Error::InvalidCertificate(ref e)) if !self.strict_names && is_name_mismatch(e) => {
                Ok(ServerCertVerified::assertion())
            }
            other => other,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// [`TlsProbe`] backed by rustls with the Mozilla root store.
#[derive(Debug, Clone)]
pub struct RustlsProbe {
    roots: Arc<RootCertStore>,
    provider: Arc<CryptoProvider>,
    handshake_timeout: Duration,
    strict_names: bool,
}

impl Default for RustlsProbe {
    fn default() -> Self {
        Self::new(DEFAULT_HANDSHAKE_TIMEOUT)
    }
}

impl RustlsProbe {
    pub fn new(handshake_timeout: Duration) -> Self {
        let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self::with_roots(roots, handshake_timeout)
    }

    pub fn with_roots(roots: RootCertStore, handshake_timeout: Duration) -> Self {
        Self {
            roots: Arc::new(roots),
            provider: Arc::new(rustls::crypto::ring::default_provider()),
            handshake_timeout,
            strict_names: false,
        }
    }

    /// Fail the handshake when the certificate is not issued for the host.
    pub fn with_strict_names(mut self, strict: bool) -> Self {
        self.strict_names = strict;
        self
    }

    fn connector(&self, presented: PresentedChain) -> Result<TlsConnector, HostFault> {
        let handshake = |e: &dyn std::fmt::Display| HostFault::Handshake { raw: e.to_string() };

        let inner = WebPkiServerVerifier::builder_with_provider(Arc::clone(&self.roots), Arc::clone(&self.provider))
            .build()
            .map_err(|e| handshake(&e))?;
        let verifier = RecordingVerifier {
            inner,
            presented,
            strict_names: self.strict_names,
        };

        let config = ClientConfig::builder_with_provider(Arc::clone(&self.provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| handshake(&e))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_no_client_auth();

        Ok(TlsConnector::from(Arc::new(config)))
    }

    async fn exchange(&self, host: &str, port: u16) -> Result<Vec<CertificateDer<'static>>, HostFault> {
        let presented: PresentedChain = Arc::default();
        let connector = self.connector(Arc::clone(&presented))?;
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| HostFault::Connection { raw: e.to_string() })?;

        let fail = |e: io::Error| {
            let chain = presented.lock().map(|c| c.clone()).unwrap_or_default();
            HostFault::from_io(&e, host, &chain)
        };

        let tcp = TcpStream::connect((host, port)).await.map_err(fail)?;
        let mut stream = connector.connect(server_name, tcp).await.map_err(fail)?;

        stream
            .write_all(head_request(host, port).as_bytes())
            .await
            .map_err(fail)?;
        stream.flush().await.map_err(fail)?;

        let mut status_line = [0u8; 16];
        match stream.read(&mut status_line).await {
            Ok(0) => {}
            Ok(n) if !status_line[..n].starts_with(b"HTTP/") => {
                return Err(HostFault::Protocol {
                    raw: format!("unexpected response: {}", String::from_utf8_lossy(&status_line[..n])),
                })
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {}
            Err(e) => return Err(fail(e)),
        }

        Ok(stream
            .get_ref()
            .1
            .peer_certificates()
            .map(|chain| chain.to_vec())
            .unwrap_or_default())
    }
}

#[async_trait]
impl TlsProbe for RustlsProbe {
    async fn certificate(&self, host: &str, port: u16) -> Result<CertificateInfo, HostFault> {
        let chain = match tokio::time::timeout(self.handshake_timeout, self.exchange(host, port)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(HostFault::TimedOut {
                    raw: format!(
                        "TLS handshake with {}:{} did not finish within {:?}",
                        host, port, self.handshake_timeout
                    ),
                })
            }
        };

        let leaf = chain.first().ok_or(HostFault::NoPeerCertificate)?;
        let names = san_dns_names(leaf).map_err(|e| HostFault::Handshake {
            raw: format!("unreadable peer certificate: {}", e),
        })?;
        debug!(host, port, names = ?names, "peer certificate names");

        Ok(CertificateInfo::from_dns_names(names))
    }
}

fn head_request(host: &str, port: u16) -> String {
    let host = if host.contains(':') {
        format!("[{}]", host)
    } else {
        host.to_string()
    };
    let authority = if port == HTTPS_PORT {
        host
    } else {
        format!("{}:{}", host, port)
    };
    format!(
        "HEAD / HTTP/1.1\r\nHost: {}\r\nUser-Agent: posture/{}\r\nConnection: close\r\n\r\n",
        authority,
        env!("CARGO_PKG_VERSION")
    )
}
