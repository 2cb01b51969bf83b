// src/autoupdate/scheduler.rs

//! Auto-update scheduler: periodic sweeps over every installed module
//!
//! The scheduler runs inside the service. On start it sweeps immediately if
//! a check is due, then re-evaluates every minute. A sweep lists the
//! installed modules over RPC, re-resolves each one in its own scratch
//! directory, and either reports or applies newer versions. A failing
//! module never aborts the sweep.

use super::ConfigStore;
use crate::client::Client;
use crate::config::AppDirs;
use crate::error::{Error, Result};
use crate::install::{InstallHandlers, Installer};
use crate::version;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How often the loop re-evaluates whether a check is due
const TICK: Duration = Duration::from_secs(60);

/// Dial budget for the loopback RPC connection
const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of checking a single module
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub name: String,
    pub previous_version: String,
    pub new_version: String,
    pub updated: bool,
    pub error: Option<String>,
}

/// Aggregate result of one sweep
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub modules_checked: usize,
    pub updates_found: usize,
    pub updates_applied: usize,
    pub results: Vec<UpdateOutcome>,
}

/// Periodic update checker
pub struct Scheduler {
    dirs: AppDirs,
    address: String,
    store: ConfigStore,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// `address` is the base URL of the service to sweep against
    /// (the service passes its own loopback address).
    pub fn new(dirs: AppDirs, address: String) -> Self {
        let store = ConfigStore::open(dirs.autoupdate_config_path());
        Self {
            dirs,
            address,
            store,
            handle: Mutex::new(None),
        }
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.store
    }

    /// Launch the background loop; `cancel` stops it
    pub fn start(self: std::sync::Arc<Self>, cancel: CancellationToken) {
        let scheduler = std::sync::Arc::clone(&self);
        let handle = tokio::spawn(async move {
            scheduler.run(cancel).await;
        });

        if let Ok(mut slot) = self.handle.lock() {
            *slot = Some(handle);
        }
        tracing::info!("auto-update scheduler started");
    }

    /// Wait for the background loop to finish after cancellation
    pub async fn stop(&self) {
        let handle = self.handle.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        tracing::info!("auto-update scheduler stopped");
    }

    async fn run(&self, cancel: CancellationToken) {
        // Sweep immediately when a check is already due.
        if self.store.should_check() {
            self.perform_check(&cancel).await;
        }

        let mut ticker = tokio::time::interval(TICK);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {
                    let _ = self.store.reload();
                    if self.store.should_check() {
                        self.perform_check(&cancel).await;
                    }
                }
            }
        }
    }

    async fn perform_check(&self, cancel: &CancellationToken) {
        tracing::info!("starting auto-update check");

        match self.sweep_with_cancel(None, cancel).await {
            Ok(report) => {
                tracing::info!(
                    modules = report.modules_checked,
                    updates_found = report.updates_found,
                    updates_applied = report.updates_applied,
                    "auto-update check completed"
                );
                if let Err(err) = self.store.record_check(report.updates_applied as u64) {
                    tracing::error!(error = %err, "failed to record check");
                }
            }
            Err(Error::Cancelled) => {}
            Err(err) => {
                tracing::error!(error = %err, "auto-update check failed");
            }
        }
    }

    /// Perform one sweep immediately and record it.
    ///
    /// Used by `auto-update now`; requires a reachable service.
    pub async fn run_once(&self) -> Result<CheckReport> {
        let report = self.sweep(None).await?;
        self.store.record_check(report.updates_applied as u64)?;
        Ok(report)
    }

    /// Sweep all installed modules, applying updates unless notify-only.
    ///
    /// `apply_override` forces the apply decision regardless of the
    /// configured `notify_only` flag (used by `monitor --update`); it does
    /// not touch the persisted statistics.
    pub async fn sweep(&self, apply_override: Option<bool>) -> Result<CheckReport> {
        self.sweep_with_cancel(apply_override, &CancellationToken::new())
            .await
    }

    async fn sweep_with_cancel(
        &self,
        apply_override: Option<bool>,
        cancel: &CancellationToken,
    ) -> Result<CheckReport> {
        let config = self.store.get();
        let apply = apply_override.unwrap_or(!config.notify_only);

        let client = Client::connect(&self.address, DIAL_TIMEOUT).await?;

        let listed = client.list_modules(0, 0, "").await?;
        let mut report = CheckReport {
            modules_checked: listed.modules.len(),
            ..Default::default()
        };

        for module in &listed.modules {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let outcome = self
                .check_module(&client, &module.name, &module.version, apply, cancel)
                .await;

            if outcome.error.is_none() && version::is_newer(&outcome.new_version, &outcome.previous_version)
            {
                report.updates_found += 1;
                if outcome.updated {
                    report.updates_applied += 1;
                }
            }
            report.results.push(outcome);
        }

        Ok(report)
    }

    /// Re-resolve one module and optionally apply a newer version
    async fn check_module(
        &self,
        client: &Client,
        name: &str,
        installed_version: &str,
        apply: bool,
        cancel: &CancellationToken,
    ) -> UpdateOutcome {
        let mut outcome = UpdateOutcome {
            name: name.to_string(),
            previous_version: installed_version.to_string(),
            new_version: String::new(),
            updated: false,
            error: None,
        };

        let resolved = self.resolve_latest(name, cancel).await;
        let latest = match resolved {
            Ok(version) => version,
            Err(err) => {
                outcome.error = Some(err.to_string());
                return outcome;
            }
        };
        outcome.new_version = latest.clone();

        if !version::is_newer(&latest, installed_version) {
            return outcome; // already up to date
        }

        tracing::info!(
            module = name,
            current = installed_version,
            latest = %latest,
            "update available"
        );

        if !apply {
            return outcome;
        }

        // Re-enter the install pipeline; its commit goes through the same
        // RPC surface this sweep reads from.
        let installer = Installer::new(self.dirs.clone()).with_cancel(cancel.clone());
        match installer
            .install(name, &InstallHandlers::silent(), client)
            .await
        {
            Ok(record) => {
                outcome.updated = true;
                outcome.new_version = record.version.clone();
                tracing::info!(
                    module = name,
                    from = installed_version,
                    to = %record.version,
                    "module updated"
                );
            }
            Err(err) => {
                outcome.error = Some(format!("failed to install update: {}", err));
            }
        }

        outcome
    }

    /// Resolve the latest version of `name` in a dedicated scratch directory
    async fn resolve_latest(&self, name: &str, cancel: &CancellationToken) -> Result<String> {
        let scratch = self.dirs.scratch_dir("autoupdate-")?;
        let toolchain = crate::module::Toolchain::new(
            crate::install::TOOLCHAIN,
            scratch.path(),
            cancel.clone(),
        );
        let resolver = crate::module::Resolver::new(&toolchain);
        let resolution = resolver.resolve(name, &|_: &str, _: &str| {}).await?;
        Ok(resolution.version)
    }
}
