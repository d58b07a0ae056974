use anyhow::Result;
use hostwatch_agent::cert::CertChecker;
use hostwatch_agent::config::AgentConfig;
use hostwatch_agent::context::AgentContext;
use hostwatch_agent::daily::DailySchedule;
use hostwatch_agent::inspector::OsInspector;
use hostwatch_agent::logwatch::{run_access_watcher, run_auth_watcher};
use hostwatch_agent::metrics::MetricsTask;
use hostwatch_agent::probe::NetworkProbe;
use hostwatch_agent::scheduler::supervise;
use hostwatch_common::host::HostIdentity;
use hostwatch_common::types::Notification;
use hostwatch_notify::channels::log::LogChannel;
use hostwatch_notify::channels::telegram::TelegramChannel;
use hostwatch_notify::manager::NotificationManager;
use hostwatch_notify::NotificationChannel;
use hostwatch_storage::StateStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing_subscriber::EnvFilter;

fn build_channel(config: &AgentConfig) -> Result<Box<dyn NotificationChannel>> {
    if !config.telegram_enabled() {
        tracing::warn!("Telegram bot token or chat id missing, notifications go to the log only");
        return Ok(Box::new(LogChannel));
    }
    let channel = TelegramChannel::new(
        &config.telegram_api_base,
        &config.telegram_bot_token,
        &config.telegram_chat_id,
        Duration::from_secs(config.send_timeout_sec.max(1)),
    )?;
    Ok(Box::new(channel))
}

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|e| anyhow::anyhow!("Failed to install default CryptoProvider: {e:?}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("hostwatch=info".parse()?))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/agent.toml".to_string());

    let config = AgentConfig::load(&config_path)?;
    DailySchedule::parse(&config.daily_report_time)?;

    let host = HostIdentity::detect();
    tracing::info!(
        host = %host.hostname,
        ip = %host.display_ip(),
        config = %config_path,
        "hostwatch-agent starting"
    );

    let store = Arc::new(StateStore::load(&config.state_path, config.cooldown_sec));
    tracing::info!(
        path = %store.path().display(),
        cooldown_secs = store.cooldown_secs(),
        "State store ready"
    );

    let notifier = NotificationManager::new(
        build_channel(&config)?,
        Duration::from_millis(config.send_min_interval_ms),
    )
    .with_host(host);
    tracing::info!(
        channel = notifier.channel().channel_name(),
        min_interval_ms = config.send_min_interval_ms,
        "Notification channel ready"
    );

    let ctx = AgentContext::new(
        Arc::new(config),
        store,
        Arc::new(notifier),
        Arc::new(OsInspector::new()),
    );

    let startup = Notification::new(
        "🚀",
        "hostwatch started",
        vec![format!("Version: {}", env!("CARGO_PKG_VERSION"))],
    );
    ctx.alert("startup", &startup).await;

    let handles = vec![
        supervise("metrics", {
            let ctx = ctx.clone();
            move || MetricsTask::new(ctx.clone()).run()
        }),
        supervise("probe", {
            let ctx = ctx.clone();
            move || NetworkProbe::new(ctx.clone()).run()
        }),
        supervise("cert", {
            let ctx = ctx.clone();
            move || CertChecker::new(ctx.clone()).run()
        }),
        supervise("access_log", {
            let ctx = ctx.clone();
            move || run_access_watcher(ctx.clone())
        }),
        supervise("auth_log", {
            let ctx = ctx.clone();
            move || run_auth_watcher(ctx.clone())
        }),
    ];

    signal::ctrl_c().await?;
    tracing::info!("Shutting down gracefully");

    for handle in &handles {
        handle.abort();
    }
    if let Err(e) = ctx.store.persist_now() {
        tracing::error!(error = %e, "Failed to persist state on shutdown");
    }

    Ok(())
}
