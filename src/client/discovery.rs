// src/client/discovery.rs

//! Locate-or-spawn discovery for the on-demand service
//!
//! One direct connect is attempted first. When nothing answers, the current
//! executable is respawned detached as `service run` and polled until its
//! `Ping` answers. The spawned service is never waited on; it owns its own
//! idle shutdown.

use super::{proc, Client};
use crate::config::{format_duration, DiscoveryConfig};
use crate::error::{Error, Result};
use std::process::Stdio;
use std::time::{Duration, Instant};

/// Budget for the readiness `Ping` during the retry loop
const PING_BUDGET: Duration = Duration::from_secs(2);

/// Return a connected client, starting an on-demand service if needed
pub async fn get_client(cfg: &DiscoveryConfig) -> Result<Client> {
    let base_url = format!("http://{}:{}", cfg.address, cfg.port);

    if let Ok(client) = Client::connect(&base_url, cfg.retry_delay).await {
        tracing::info!(address = %base_url, "connected to existing service instance");
        return Ok(client);
    }

    tracing::info!(address = %base_url, "no service found, starting on-demand instance");
    spawn_service(cfg)?;

    wait_for_server(&base_url, cfg).await
}

/// Check whether a service answers at `base_url`
pub async fn is_server_running(base_url: &str) -> bool {
    match Client::connect(base_url, Duration::from_secs(1)).await {
        Ok(client) => client.ping_with_timeout(Duration::from_secs(1)).await.is_ok(),
        Err(_) => false,
    }
}

/// Spawn the current executable as a detached service process
fn spawn_service(cfg: &DiscoveryConfig) -> Result<()> {
    let exe = std::env::current_exe()?;
    let exe = std::fs::canonicalize(&exe).unwrap_or(exe);

    let mut command = std::process::Command::new(exe);
    command
        .args([
            "service",
            "run",
            "--port",
            &cfg.port.to_string(),
            "--bind",
            &cfg.address,
            "--idle-timeout",
            &format_duration(cfg.idle_timeout),
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    proc::detach(&mut command);

    let child = command
        .spawn()
        .map_err(|err| Error::ServerUnreachable(format!("failed to start service: {}", err)))?;

    tracing::info!(
        pid = child.id(),
        idle_timeout = %format_duration(cfg.idle_timeout),
        "started on-demand service"
    );

    // The child runs independently and is responsible for its own shutdown.
    Ok(())
}

/// Poll until the spawned service answers a `Ping`
async fn wait_for_server(base_url: &str, cfg: &DiscoveryConfig) -> Result<Client> {
    let deadline = Instant::now() + cfg.start_timeout;

    for _ in 0..cfg.connection_retry {
        if Instant::now() > deadline {
            return Err(Error::ServerUnreachable(
                "timeout waiting for service to start".to_string(),
            ));
        }

        tokio::time::sleep(cfg.retry_delay).await;

        if let Ok(client) = Client::connect(base_url, cfg.retry_delay * 2).await {
            if client.ping_with_timeout(PING_BUDGET).await.is_ok() {
                return Ok(client);
            }
        }
    }

    Err(Error::ServerUnreachable(format!(
        "failed to connect after {} retries",
        cfg.connection_retry
    )))
}
