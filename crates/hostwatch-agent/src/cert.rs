//! Certificate expiry checks for local files and remote TLS endpoints.

use crate::context::AgentContext;
use crate::inspector::parse_ssl_certificate_paths;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use hostwatch_alert::rules::cert_expiration::{CertExpirationRule, CertExpiry};
use rustls::pki_types::ServerName;
use rustls::{CertificateError, ClientConfig};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio_rustls::TlsConnector;
use x509_parser::pem::Pem;
use x509_parser::prelude::*;

const DEFAULT_TLS_PORT: u16 = 443;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_WALK_DEPTH: usize = 8;
const MAX_WALK_ENTRIES: usize = 20_000;

/// Expiry of the leaf certificate in a PEM (first `CERTIFICATE` block) or
/// DER encoded file.
pub fn cert_not_after(bytes: &[u8]) -> Result<DateTime<Utc>> {
    let is_pem = bytes
        .windows(b"-----BEGIN".len())
        .any(|w| w == b"-----BEGIN");

    let timestamp = if is_pem {
        let pem = Pem::iter_from_buffer(bytes)
            .filter_map(|p| p.ok())
            .find(|p| p.label == "CERTIFICATE")
            .context("no CERTIFICATE block in PEM data")?;
        let cert = pem
            .parse_x509()
            .map_err(|e| anyhow!("failed to parse X.509 certificate: {e}"))?;
        cert.validity().not_after.timestamp()
    } else {
        let (_, cert) = X509Certificate::from_der(bytes)
            .map_err(|e| anyhow!("failed to parse X.509 certificate: {e}"))?;
        cert.validity().not_after.timestamp()
    };

    DateTime::from_timestamp(timestamp, 0).context("certificate expiry out of range")
}

/// Whole days until `not_after`. Any certificate at or past its expiry is
/// negative, even within the first day.
pub fn days_left(not_after: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let days = (not_after - now).num_days();
    if not_after <= now {
        days.min(-1)
    } else {
        days
    }
}

/// Directory to start walking from: the components before the first one
/// containing a glob metacharacter.
pub fn glob_base(pattern: &str) -> PathBuf {
    let mut base = PathBuf::new();
    for component in Path::new(pattern).components() {
        if let Component::Normal(part) = component {
            if part.to_string_lossy().contains(['*', '?', '[', '{']) {
                break;
            }
        }
        base.push(component);
    }
    base
}

/// Files matching `pattern` within a bounded walk of its base directory.
pub fn expand_glob(pattern: &str) -> Vec<PathBuf> {
    let base = glob_base(pattern);
    if base.is_file() {
        return if glob_match::glob_match(pattern, &base.to_string_lossy()) {
            vec![base]
        } else {
            Vec::new()
        };
    }

    let mut matches = Vec::new();
    let mut stack = vec![(base, 0usize)];
    let mut visited = 0;

    while let Some((dir, depth)) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
                continue;
            }
        };
        for entry in entries.flatten() {
            visited += 1;
            if visited > MAX_WALK_ENTRIES {
                tracing::warn!(pattern, "Certificate glob walk truncated");
                return matches;
            }
            let path = entry.path();
            // file_type() does not follow symlinks, so directory loops are skipped
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                if depth < MAX_WALK_DEPTH {
                    stack.push((path, depth + 1));
                }
            } else if path.is_file() && glob_match::glob_match(pattern, &path.to_string_lossy()) {
                matches.push(path);
            }
        }
    }

    matches.sort();
    matches
}

/// `host` or `host:port`.
pub fn parse_domain(raw: &str) -> Result<(String, u16)> {
    let raw = raw.trim();
    match raw.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => Ok((host.to_string(), port.parse()?)),
        _ if raw.is_empty() => Err(anyhow!("empty domain")),
        _ => Ok((raw.to_string(), DEFAULT_TLS_PORT)),
    }
}

fn is_expired_error(err: &std::io::Error) -> bool {
    err.get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
        .is_some_and(|e| {
            matches!(
                e,
                rustls::Error::InvalidCertificate(
                    CertificateError::Expired | CertificateError::ExpiredContext { .. }
                )
            )
        })
}

/// Days until the peer certificate of `host:port` expires. A certificate
/// rejected as already expired is reported as `-1`.
pub async fn check_remote(host: &str, port: u16, timeout: Duration) -> Result<i64> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));

    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| anyhow!("invalid domain name {host}: {e}"))?;

    let tcp = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| anyhow!("connection timed out after {}s", timeout.as_secs()))?
        .with_context(|| format!("TCP connection to {host}:{port} failed"))?;

    let tls = match tokio::time::timeout(timeout, connector.connect(server_name, tcp)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) if is_expired_error(&e) => return Ok(-1),
        Ok(Err(e)) => return Err(anyhow!("TLS handshake with {host}:{port} failed: {e}")),
        Err(_) => return Err(anyhow!("TLS handshake timed out")),
    };

    let (_io, conn) = tls.into_inner();
    let leaf = conn
        .peer_certificates()
        .and_then(|certs| certs.first())
        .ok_or_else(|| anyhow!("no peer certificates"))?;
    let not_after = cert_not_after(leaf.as_ref())?;
    Ok(days_left(not_after, Utc::now()))
}

pub struct CertChecker {
    ctx: AgentContext,
    rule: CertExpirationRule,
}

impl CertChecker {
    pub fn new(ctx: AgentContext) -> Self {
        let rule = CertExpirationRule::new(ctx.config.cert_min_days);
        Self { ctx, rule }
    }

    pub async fn run(self) {
        let hours = self.ctx.config.cert_check_interval_hours.max(1);
        tracing::info!(
            interval_hours = hours,
            domains = self.ctx.config.cert_check_domains.len(),
            globs = self.ctx.config.cert_globs.len(),
            "Certificate checker started"
        );

        let mut tick = tokio::time::interval(Duration::from_secs(hours * 3600));
        loop {
            tick.tick().await;
            if let Err(e) = self.tick(Utc::now()).await {
                tracing::error!(error = %e, "Certificate check cycle failed");
            }
        }
    }

    /// Candidate certificate files from globs and proxy discovery.
    pub async fn local_sources(&self) -> Result<Vec<PathBuf>> {
        let globs = self.ctx.config.cert_globs.clone();
        let mut files: BTreeSet<PathBuf> = tokio::task::spawn_blocking(move || {
            globs.iter().flat_map(|g| expand_glob(g)).collect()
        })
        .await?;

        if self.ctx.config.cert_discover_proxy {
            if let Some(dump) = self.ctx.inspector.proxy_config_dump().await {
                files.extend(parse_ssl_certificate_paths(&dump).into_iter().map(PathBuf::from));
            }
        }
        Ok(files.into_iter().collect())
    }

    pub async fn collect(&self, now: DateTime<Utc>) -> Result<Vec<CertExpiry>> {
        let mut results = Vec::new();

        for path in self.local_sources().await? {
            let parsed = match tokio::fs::read(&path).await {
                Ok(bytes) => cert_not_after(&bytes),
                Err(e) => Err(e.into()),
            };
            match parsed {
                Ok(not_after) => results.push(CertExpiry {
                    source: path.display().to_string(),
                    days_left: days_left(not_after, now),
                }),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Cannot read certificate"),
            }
        }

        let mut set = JoinSet::new();
        for raw in &self.ctx.config.cert_check_domains {
            let (host, port) = match parse_domain(raw) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!(domain = %raw, error = %e, "Ignoring invalid domain");
                    continue;
                }
            };
            set.spawn(async move {
                let result = check_remote(&host, port, CONNECT_TIMEOUT).await;
                (format!("{host}:{port}"), result)
            });
        }
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((source, Ok(days_left))) => results.push(CertExpiry { source, days_left }),
                Ok((source, Err(e))) => {
                    tracing::warn!(domain = %source, error = %e, "Certificate check failed")
                }
                Err(e) => tracing::warn!(error = %e, "Certificate check task failed"),
            }
        }

        Ok(results)
    }

    pub async fn tick(&self, now: DateTime<Utc>) -> Result<()> {
        let certs = self.collect(now).await?;
        tracing::info!(checked = certs.len(), "Certificate check complete");
        if let Some(event) = self.rule.evaluate(&certs, now) {
            self.ctx.alert_event(&event).await;
        }
        Ok(())
    }
}
