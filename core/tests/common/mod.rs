#![allow(dead_code)]

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{RootCertStore, ServerConfig};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

pub const CA: &[u8] = include_bytes!("../fixtures/ca.der");
pub const LOCALHOST: (&[u8], &[u8]) = (
    include_bytes!("../fixtures/localhost.der"),
    include_bytes!("../fixtures/localhost.key.der"),
);
pub const WRONG_NAME: (&[u8], &[u8]) = (
    include_bytes!("../fixtures/wrong.der"),
    include_bytes!("../fixtures/wrong.key.der"),
);
pub const EXPIRED: (&[u8], &[u8]) = (
    include_bytes!("../fixtures/expired.der"),
    include_bytes!("../fixtures/expired.key.der"),
);
pub const SELF_SIGNED: (&[u8], &[u8]) = (
    include_bytes!("../fixtures/selfsigned.der"),
    include_bytes!("../fixtures/selfsigned.key.der"),
);

/// One canned HTTP response.
#[derive(Debug, Clone)]
pub struct Canned {
    pub status: u16,
    pub body: String,
}

impl Canned {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

/// Loopback HTTP server answering each connection with the next canned
/// response (the last one repeats) and recording request lines.
pub struct CannedServer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl CannedServer {
    pub async fn start(responses: Vec<Canned>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        tokio::spawn(async move {
            let mut served = 0usize;
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let canned = responses[served.min(responses.len() - 1)].clone();
                served += 1;

                let head = read_head(&mut socket).await;
                seen.lock().unwrap().push(head.lines().next().unwrap_or_default().to_string());
                write_response(&mut socket, &canned).await;
            }
        });

        Self { addr, requests }
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Loopback HTTPS server presenting `chain` and answering every request
/// with an empty 200.
pub async fn start_tls_server(chain: &[&[u8]], key: &[u8]) -> SocketAddr {
    let certs: Vec<CertificateDer<'static>> = chain.iter().map(|der| CertificateDer::from(der.to_vec())).collect();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.to_vec()));

    let config = ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                // Clients that reject the certificate abort the handshake.
                if let Ok(mut stream) = acceptor.accept(socket).await {
                    read_head(&mut stream).await;
                    write_response(&mut stream, &Canned::json(200, "")).await;
                }
            });
        }
    });

    addr
}

pub fn test_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    roots.add(CertificateDer::from(CA.to_vec())).unwrap();
    roots
}

async fn read_head<S: AsyncRead + Unpin>(socket: &mut S) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

async fn write_response<S: AsyncWrite + Unpin>(socket: &mut S, canned: &Canned) {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        canned.status,
        reason(canned.status),
        canned.body.len(),
        canned.body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        _ => "Error",
    }
}
