//! Followers for the web-access and authentication logs.

use crate::context::AgentContext;
use chrono::{DateTime, Duration, Utc};
use hostwatch_alert::bruteforce::BruteForceTracker;
use hostwatch_common::types::{Notification, Severity};
use regex::{Regex, RegexSet};
use std::io::SeekFrom;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};

const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(500);

/// Identity of the file behind a path, used to spot rotation.
#[cfg(unix)]
fn file_id(meta: &std::fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.ino()
}

#[cfg(not(unix))]
fn file_id(_meta: &std::fs::Metadata) -> u64 {
    0
}

/// `tail -F` over one file: reads appended lines, starts over when the
/// file is truncated and reopens it when the path points to a new file.
pub struct LogFollower {
    path: PathBuf,
    reader: BufReader<File>,
    id: u64,
    pos: u64,
    partial: Vec<u8>,
}

impl LogFollower {
    /// Opens `path`, positioned at its end unless `from_start`. Returns
    /// `None` when the file does not exist.
    pub async fn open(path: impl AsRef<Path>, from_start: bool) -> std::io::Result<Option<Self>> {
        let path = path.as_ref().to_path_buf();
        let mut file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let meta = file.metadata().await?;
        let pos = if from_start {
            0
        } else {
            file.seek(SeekFrom::End(0)).await?
        };
        Ok(Some(Self {
            path,
            reader: BufReader::new(file),
            id: file_id(&meta),
            pos,
            partial: Vec::new(),
        }))
    }

    /// Next complete line if one is available now, without waiting. Bytes
    /// that are not valid UTF-8 are replaced rather than rejected.
    pub async fn try_next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            let n = self.reader.read_until(b'\n', &mut self.partial).await?;
            if n > 0 {
                self.pos += n as u64;
                if self.partial.ends_with(b"\n") {
                    let raw = std::mem::take(&mut self.partial);
                    let line = String::from_utf8_lossy(&raw);
                    return Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()));
                }
                // Writer is mid-line; keep the fragment for the next read
                continue;
            }

            if !self.check_rotation().await? {
                return Ok(None);
            }
        }
    }

    /// Waits until a complete line is appended.
    pub async fn next_line(&mut self) -> std::io::Result<String> {
        loop {
            if let Some(line) = self.try_next_line().await? {
                return Ok(line);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Handles truncation and replacement at EOF. Returns `true` when the
    /// reader was repositioned and more data may be available.
    async fn check_rotation(&mut self) -> std::io::Result<bool> {
        let meta = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta,
            // Rotated away and not recreated yet
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };

        if file_id(&meta) != self.id {
            let file = File::open(&self.path).await?;
            let meta = file.metadata().await?;
            tracing::info!(path = %self.path.display(), "Log file replaced, reopening");
            self.reader = BufReader::new(file);
            self.id = file_id(&meta);
            self.pos = 0;
            self.partial.clear();
            return Ok(true);
        }

        if meta.len() < self.pos {
            tracing::info!(path = %self.path.display(), "Log file truncated, reading from start");
            self.reader.seek(SeekFrom::Start(0)).await?;
            self.pos = 0;
            self.partial.clear();
            return Ok(true);
        }

        Ok(false)
    }
}

/// One parsed web-access request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessEntry {
    pub ip: String,
    pub path: String,
}

/// Quoted custom format:
/// `"$remote_addr" "$time_local" "$request" "$status" ...`
static ACCESS_QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^"([^"\s]+)"\s+"[^"]*"\s+"[A-Z]+\s+([^"\s]+)[^"]*""#).expect("valid regex")
});

/// Combined format:
/// `$remote_addr - $remote_user [$time_local] "$request" $status $bytes "$referer" "$ua"`
static ACCESS_COMBINED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\S+)\s+\S+\s+\S+\s+\[[^\]]+\]\s+"[A-Z]+\s+(\S+)[^"]*"\s+\d{3}"#)
        .expect("valid regex")
});

/// Scanner probe signatures matched against the request path.
const SCAN_SIGNATURES: &[(&str, &str)] = &[
    (".env", r"(?i)/\.env(\.[a-z0-9_-]+)?($|[/?#])"),
    (".git", r"(?i)/\.git(/|$)"),
    ("wp-admin", r"(?i)/wp-(admin|login\.php)"),
    ("xmlrpc", r"(?i)/xmlrpc\.php"),
    ("id_rsa", r"(?i)id_(rsa|dsa|ecdsa|ed25519)"),
    ("phpmyadmin", r"(?i)/(phpmyadmin|pma|myadmin)(/|$)"),
    ("aws credentials", r"(?i)/\.aws/"),
    ("path traversal", r"(?i)(\.\./|%2e%2e%2f)"),
    ("/etc/passwd", r"(?i)/etc/passwd"),
    ("cgi-bin", r"(?i)/cgi-bin/"),
    ("phpunit", r"(?i)/vendor/phpunit/"),
    ("actuator", r"(?i)/actuator(/|$)"),
    ("backup archive", r"(?i)/(backup|db|dump|site)\.(sql|zip|tar\.gz)($|\?)"),
    (".DS_Store", r"(?i)/\.ds_store$"),
];

static SCAN_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(SCAN_SIGNATURES.iter().map(|(_, pattern)| *pattern)).expect("valid regex")
});

pub fn parse_access_line(line: &str) -> Option<AccessEntry> {
    let caps = ACCESS_QUOTED
        .captures(line)
        .or_else(|| ACCESS_COMBINED.captures(line))?;
    Some(AccessEntry {
        ip: caps.get(1)?.as_str().to_string(),
        path: caps.get(2)?.as_str().to_string(),
    })
}

/// Name of the first signature the path matches.
pub fn match_signature(path: &str) -> Option<&'static str> {
    SCAN_SET
        .matches(path)
        .into_iter()
        .next()
        .map(|i| SCAN_SIGNATURES[i].0)
}

static AUTH_FAILURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(Failed password|Failed publickey|Invalid user|authentication failure|Connection closed by invalid user)",
    )
    .expect("valid regex")
});

static AUTH_SOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\bfrom\s+|\brhost=)([0-9A-Fa-f][0-9A-Fa-f:.]*)").expect("valid regex")
});

/// Source IP of a failed or invalid login attempt.
pub fn parse_auth_failure(line: &str) -> Option<IpAddr> {
    if !AUTH_FAILURE.is_match(line) {
        return None;
    }
    AUTH_SOURCE
        .captures_iter(line)
        .filter_map(|c| c.get(1))
        .find_map(|m| m.as_str().trim_end_matches(['.', ':']).parse().ok())
}

pub struct AccessWatcher {
    ctx: AgentContext,
}

impl AccessWatcher {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    /// Returns `true` when an alert was delivered.
    pub async fn handle_line(&self, line: &str, now: DateTime<Utc>) -> bool {
        let Some(entry) = parse_access_line(line) else {
            return false;
        };
        let Some(signature) = match_signature(&entry.path) else {
            return false;
        };

        tracing::debug!(ip = %entry.ip, path = %entry.path, signature, "Scanner request");
        let notification = Notification::new(
            Severity::Warning.icon(),
            "Suspicious web request",
            vec![
                format!("Source: {}", entry.ip),
                format!("Path: {}", entry.path),
                format!("Signature: {signature}"),
            ],
        );
        self.ctx
            .alert_at(&format!("web_scan:{}", entry.ip), &notification, now)
            .await
    }
}

pub struct AuthWatcher {
    ctx: AgentContext,
    tracker: BruteForceTracker,
    window_min: u64,
}

impl AuthWatcher {
    pub fn new(ctx: AgentContext) -> Self {
        let window_min = ctx.config.auth_fail_window_min.max(1);
        let tracker = BruteForceTracker::new(
            Duration::minutes(window_min as i64),
            ctx.config.auth_fail_count,
        );
        Self {
            ctx,
            tracker,
            window_min,
        }
    }

    /// Returns `true` when an alert was delivered.
    pub async fn handle_line(&mut self, line: &str, now: DateTime<Utc>) -> bool {
        let Some(ip) = parse_auth_failure(line) else {
            return false;
        };
        let ip = ip.to_string();
        let Some(count) = self.tracker.record(&ip, now) else {
            return false;
        };

        let notification = Notification::new(
            Severity::Critical.icon(),
            "Brute-force login attempts",
            vec![
                format!("Source: {ip}"),
                format!("Failures: {count} in {} min", self.window_min),
            ],
        );
        self.ctx
            .alert_at(&format!("bruteforce:{ip}"), &notification, now)
            .await
    }
}

pub async fn run_access_watcher(ctx: AgentContext) {
    let path = ctx.config.access_log_path.clone();
    let Some(mut follower) = open_or_exit(&path).await else {
        return;
    };
    let watcher = AccessWatcher::new(ctx);
    tracing::info!(path = %path, "Access log watcher started");
    loop {
        match follower.next_line().await {
            Ok(line) => {
                watcher.handle_line(&line, Utc::now()).await;
            }
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Access log read failed");
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
}

pub async fn run_auth_watcher(ctx: AgentContext) {
    let path = ctx.config.auth_log_path.clone();
    let Some(mut follower) = open_or_exit(&path).await else {
        return;
    };
    let mut watcher = AuthWatcher::new(ctx);
    tracing::info!(path = %path, "Auth log watcher started");
    loop {
        match follower.next_line().await {
            Ok(line) => {
                watcher.handle_line(&line, Utc::now()).await;
            }
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Auth log read failed");
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
}

async fn open_or_exit(path: &str) -> Option<LogFollower> {
    match LogFollower::open(path, false).await {
        Ok(Some(follower)) => Some(follower),
        Ok(None) => {
            tracing::info!(path, "Log file not found, watcher not started");
            None
        }
        Err(e) => {
            tracing::warn!(path, error = %e, "Cannot open log file, watcher not started");
            None
        }
    }
}
