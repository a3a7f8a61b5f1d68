use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use winauthenticator::config::AuthenticatorConfig;
use winauthenticator::identity::{LoginRequest, ProfileOutcome, WinAuthenticator};
use winauthenticator::platform::DefaultPlatform;

/// Runs one login -> profile load -> profile unload cycle for WINAUTH_USER, to
/// check privileges and configuration on a hub host.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let cfg = AuthenticatorConfig::from_env()?;
    let username = std::env::var("WINAUTH_USER").context("WINAUTH_USER is not set")?;
    let password = std::env::var("WINAUTH_PASSWORD").unwrap_or_default();
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "winauth",
        "winauth-check starting: RUST_LOG='{}', user='{}', open_sessions={}, groups={:?}",
        rust_log, username, cfg.open_sessions, cfg.group_whitelist
    );

    let auth = WinAuthenticator::new(cfg, DefaultPlatform::default())?;
    let user = auth.authenticate(LoginRequest::new(username, password)).await?.into_user();
    auth.add_user(&user).await?;

    let loaded = auth.pre_spawn_start(&user).await?;
    info!(target: "winauth", "pre-start: {:?}", loaded);
    let unloaded = auth.post_spawn_stop(&user).await?;
    info!(target: "winauth", "post-stop: {:?}", unloaded);

    if matches!(loaded, ProfileOutcome::Failed) || matches!(unloaded, ProfileOutcome::Failed) {
        warn!(target: "winauth", "profile handling is now disabled; check SeRestorePrivilege/SeBackupPrivilege");
    }
    info!(target: "winauth", "done: open_sessions={}", auth.open_sessions());
    Ok(())
}
