//! Narrow interface over OS inspection commands so that detection logic can
//! run against a fake in tests.

use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::process::Output;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};
use tokio::process::Command;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Outbound path the kernel picks for a destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteInfo {
    pub interface: Option<String>,
    pub gateway: Option<String>,
    pub source: Option<String>,
}

impl std::fmt::Display for RouteInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "dev {} via {} src {}",
            self.interface.as_deref().unwrap_or("-"),
            self.gateway.as_deref().unwrap_or("direct"),
            self.source.as_deref().unwrap_or("-"),
        )
    }
}

#[async_trait]
pub trait SystemInspector: Send + Sync {
    /// Route towards `destination`, `None` when it cannot be determined.
    async fn route(&self, destination: &str) -> Option<RouteInfo>;

    /// Whether a service unit is enabled to start at boot.
    async fn service_enabled(&self, name: &str) -> bool;

    async fn service_active(&self, name: &str) -> bool;

    /// Whether a process with this exact name is running.
    async fn process_running(&self, name: &str) -> bool;

    /// Full running configuration of the reverse proxy, if one is installed.
    async fn proxy_config_dump(&self) -> Option<String>;

    /// One ICMP echo; the round-trip time in milliseconds on success.
    async fn icmp_ping(&self, host: &str, timeout: Duration) -> Option<f64>;
}

/// Parses `ip route get` output, e.g.
/// `1.1.1.1 via 192.168.1.1 dev eth0 src 192.168.1.10 uid 0`.
pub fn parse_route(output: &str) -> Option<RouteInfo> {
    let line = output.lines().find(|l| !l.trim().is_empty())?;
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let after = |keyword: &str| {
        tokens
            .iter()
            .position(|t| *t == keyword)
            .and_then(|i| tokens.get(i + 1))
            .map(|s| s.to_string())
    };

    let route = RouteInfo {
        interface: after("dev"),
        gateway: after("via"),
        source: after("src"),
    };
    (route != RouteInfo::default()).then_some(route)
}

static SSL_CERTIFICATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*ssl_certificate\s+([^;\s]+)\s*;").expect("valid regex")
});

static PING_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time[=<]\s*([0-9]+(?:\.[0-9]+)?)\s*ms").expect("valid regex"));

/// Certificate paths named by `ssl_certificate` directives. Paths built
/// from variables are skipped.
pub fn parse_ssl_certificate_paths(config: &str) -> Vec<String> {
    let paths: BTreeSet<String> = SSL_CERTIFICATE
        .captures_iter(config)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim_matches(|ch| ch == '"' || ch == '\'').to_string())
        .filter(|p| !p.contains('$') && !p.is_empty())
        .collect();
    paths.into_iter().collect()
}

/// RTT in milliseconds from `ping` output (`time=12.3 ms`).
pub fn parse_ping_time(output: &str) -> Option<f64> {
    PING_TIME
        .captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Inspector backed by `ip`, `systemctl`, `nginx`, `ping` and the sysinfo
/// process table.
pub struct OsInspector {
    system: Arc<Mutex<System>>,
}

impl OsInspector {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new_with_specifics(
                RefreshKind::nothing(),
            ))),
        }
    }
}

impl Default for OsInspector {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_command(program: &str, args: &[&str], timeout: Duration) -> Option<Output> {
    let child = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output();
    match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => Some(output),
        Ok(Err(e)) => {
            tracing::debug!(program, error = %e, "Command failed to start");
            None
        }
        Err(_) => {
            tracing::warn!(program, timeout_secs = timeout.as_secs(), "Command timed out");
            None
        }
    }
}

#[async_trait]
impl SystemInspector for OsInspector {
    async fn route(&self, destination: &str) -> Option<RouteInfo> {
        let output = run_command("ip", &["route", "get", destination], COMMAND_TIMEOUT).await?;
        if !output.status.success() {
            return None;
        }
        parse_route(&String::from_utf8_lossy(&output.stdout))
    }

    async fn service_enabled(&self, name: &str) -> bool {
        run_command("systemctl", &["is-enabled", "--quiet", name], COMMAND_TIMEOUT)
            .await
            .is_some_and(|o| o.status.success())
    }

    async fn service_active(&self, name: &str) -> bool {
        run_command("systemctl", &["is-active", "--quiet", name], COMMAND_TIMEOUT)
            .await
            .is_some_and(|o| o.status.success())
    }

    async fn process_running(&self, name: &str) -> bool {
        let system = self.system.clone();
        let name = name.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let mut system = system.lock().unwrap_or_else(|p| p.into_inner());
            system.refresh_processes_specifics(
                ProcessesToUpdate::All,
                true,
                ProcessRefreshKind::nothing(),
            );
            let found = system.processes_by_exact_name(OsStr::new(&name)).next().is_some();
            found
        })
        .await;
        match result {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(error = %e, "Process lookup task failed");
                false
            }
        }
    }

    async fn proxy_config_dump(&self) -> Option<String> {
        let output = run_command("nginx", &["-T"], COMMAND_TIMEOUT).await?;
        if !output.status.success() {
            tracing::debug!(status = %output.status, "nginx -T failed");
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn icmp_ping(&self, host: &str, timeout: Duration) -> Option<f64> {
        let wait_secs = timeout.as_secs().max(1).to_string();
        let output = run_command(
            "ping",
            &["-n", "-c", "1", "-W", &wait_secs, host],
            timeout + Duration::from_secs(1),
        )
        .await?;
        if !output.status.success() {
            return None;
        }
        parse_ping_time(&String::from_utf8_lossy(&output.stdout))
    }
}
