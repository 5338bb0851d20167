// ── HTTP device sessions ──
//
// Finds a reachable port (HTTPS ports first, then HTTP), then wraps a
// `reqwest::Client` with base-URL construction and optional basic auth.
// The TCP reachability check closes its socket immediately.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

use crate::error::Error;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// TLS verification mode.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (devices mostly ship self-signed ones).
    #[default]
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("thola/", env!("CARGO_PKG_VERSION")));

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

/// Ports and credentials to try against a device.
#[derive(Debug, Clone, Default)]
pub struct HttpCredentials {
    pub https_ports: Vec<u16>,
    pub http_ports: Vec<u16>,
    pub username: Option<String>,
    pub password: Option<SecretString>,
}

impl HttpCredentials {
    pub fn has_ports(&self) -> bool {
        !self.https_ports.is_empty() || !self.http_ports.is_empty()
    }
}

/// The scheme/port combination that accepted a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpEndpoint {
    pub https: bool,
    pub port: u16,
}

/// HTTP session against one device.
pub struct HttpClient {
    http: reqwest::Client,
    base_url: Url,
    endpoint: HttpEndpoint,
    auth: Option<(String, SecretString)>,
}

impl HttpClient {
    /// Probe the candidate ports and bind to the first one that accepts TCP.
    pub async fn connect(
        address: IpAddr,
        credentials: &HttpCredentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let candidates = credentials
            .https_ports
            .iter()
            .map(|&port| HttpEndpoint { https: true, port })
            .chain(
                credentials
                    .http_ports
                    .iter()
                    .map(|&port| HttpEndpoint { https: false, port }),
            );

        let mut tried = Vec::new();
        for endpoint in candidates {
            let socket = SocketAddr::new(address, endpoint.port);
            let reachable = matches!(
                tokio::time::timeout(transport.timeout, TcpStream::connect(socket)).await,
                Ok(Ok(_))
            );
            debug!(%socket, https = endpoint.https, reachable, "http port check");
            if reachable {
                let scheme = if endpoint.https { "https" } else { "http" };
                let base_url = Url::parse(&format!("{scheme}://{socket}/"))?;
                return Self::with_endpoint(base_url, endpoint, credentials, transport);
            }
            tried.push(endpoint.port.to_string());
        }

        Err(Error::NoHttpPort {
            address: address.to_string(),
            tried: tried.join(", "),
        })
    }

    /// Bind to a known base URL without port probing.
    pub fn from_base_url(
        base_url: Url,
        credentials: &HttpCredentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let endpoint = HttpEndpoint {
            https: base_url.scheme() == "https",
            port: base_url.port_or_known_default().unwrap_or(80),
        };
        Self::with_endpoint(base_url, endpoint, credentials, transport)
    }

    fn with_endpoint(
        base_url: Url,
        endpoint: HttpEndpoint,
        credentials: &HttpCredentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let auth = credentials.username.clone().map(|user| {
            let pass = credentials
                .password
                .clone()
                .unwrap_or_else(|| SecretString::from(String::new()));
            (user, pass)
        });
        Ok(Self {
            http: transport.build_client()?,
            base_url,
            endpoint,
            auth,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint(&self) -> HttpEndpoint {
        self.endpoint
    }

    pub fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn send(&self, path: &str) -> Result<reqwest::Response, Error> {
        let url = self.url(path)?;
        debug!("GET {}", url);

        let mut request = self.http.get(url.clone());
        if let Some((user, pass)) = &self.auth {
            request = request.basic_auth(user, Some(pass.expose_secret()));
        }
        let resp = request.send().await.map_err(Error::Http)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp)
    }

    /// GET a path relative to the device base URL and return the body.
    pub async fn get_text(&self, path: &str) -> Result<String, Error> {
        self.send(path).await?.text().await.map_err(Error::Http)
    }

    /// GET a path and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.send(path).await?.json().await.map_err(Error::Http)
    }
}
