// src/commands/mod.rs

//! CLI command implementations
//!
//! Every command acquires an RPC handle through client discovery, which
//! starts the on-demand service when nothing is listening. Install and
//! update run the pipeline locally and commit through the service.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use glix::autoupdate::{ConfigStore, Scheduler};
use glix::build::binary;
use glix::config::{format_duration, parse_duration};
use glix::module::normalize_with_version;
use glix::{
    AppDirs, DiscoveryConfig, InstallHandlers, Installer, ModuleRecord, ServerConfig,
};
use std::time::Duration;

fn service_base_url(cfg: &DiscoveryConfig) -> String {
    format!("http://{}:{}", cfg.address, cfg.port)
}

fn format_timestamp(timestamp_unix_nano: i64) -> String {
    if timestamp_unix_nano <= 0 {
        return String::new();
    }
    DateTime::<Utc>::from_timestamp_nanos(timestamp_unix_nano)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

// =============================================================================
// install / remove / update
// =============================================================================

pub async fn cmd_install(input: &str) -> Result<()> {
    let dirs = AppDirs::resolve()?;
    dirs.ensure()?;

    let client = glix::get_client(&DiscoveryConfig::default())
        .await
        .context("failed to connect to service")?;

    println!("Installing module: {}", input);

    let installer = Installer::new(dirs);
    let record = installer
        .install(input, &InstallHandlers::plain(), &client)
        .await?;

    println!();
    println!("Show report using: glix report {}", record.name);
    Ok(())
}

pub async fn cmd_remove(input: &str) -> Result<()> {
    let (name, version_token) = normalize_with_version(input)?;
    let version = if version_token == "latest" {
        String::new()
    } else {
        version_token
    };

    let dirs = AppDirs::resolve()?;
    println!("Removing module: {}", name);

    // Remove the installed binary first; a missing binary is not an error.
    let base = name.rsplit('/').next().unwrap_or(&name);
    let binary_path = dirs.bin_dir.join(binary::binary_name(base));
    match std::fs::remove_file(&binary_path) {
        Ok(()) => println!("Binary removed: {}", binary_path.display()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            println!("Binary {} not found at {}", base, binary_path.display());
        }
        Err(err) => return Err(err).context("failed to remove binary"),
    }

    let client = glix::get_client(&DiscoveryConfig::default())
        .await
        .context("failed to connect to service")?;

    let response = client.remove(&name, &version).await?;
    if !response.success {
        bail!("{}", response.error_message);
    }

    println!("Module {} removed successfully", name);
    Ok(())
}

pub async fn cmd_update(input: &str) -> Result<()> {
    let (name, _) = normalize_with_version(input)?;

    let dirs = AppDirs::resolve()?;
    dirs.ensure()?;

    let cfg = DiscoveryConfig::default();
    let client = glix::get_client(&cfg)
        .await
        .context("failed to connect to service")?;

    let stored = client.get_module(&name, "").await?;
    let Some(module) = stored.module.filter(|_| stored.found) else {
        bail!("module not installed: {}", name);
    };

    println!("Checking {} for updates...", name);

    let scratch = dirs.scratch_dir("update-")?;
    let toolchain = glix::Toolchain::new(
        glix::install::TOOLCHAIN,
        scratch.path(),
        tokio_util::sync::CancellationToken::new(),
    );
    let resolver = glix::Resolver::new(&toolchain);
    let resolution = resolver.resolve(&name, &|_: &str, _: &str| {}).await?;
    drop(scratch);

    if !glix::version::is_newer(&resolution.version, &module.version) {
        println!(
            "Module {} is already up to date ({})",
            name, module.version
        );
        return Ok(());
    }

    println!(
        "Updating {} from {} to {}",
        name, module.version, resolution.version
    );

    let installer = Installer::new(dirs);
    installer
        .install(&name, &InstallHandlers::plain(), &client)
        .await?;
    Ok(())
}

// =============================================================================
// monitor / list / report
// =============================================================================

pub async fn cmd_monitor(apply: bool) -> Result<()> {
    let dirs = AppDirs::resolve()?;
    dirs.ensure()?;

    let cfg = DiscoveryConfig::default();
    let _client = glix::get_client(&cfg)
        .await
        .context("failed to connect to service")?;

    let scheduler = Scheduler::new(dirs, service_base_url(&cfg));
    let report = scheduler.sweep(Some(apply)).await?;

    if report.modules_checked == 0 {
        println!("No modules installed");
        return Ok(());
    }

    println!();
    println!("Checked {} module(s)", report.modules_checked);

    for outcome in &report.results {
        match (&outcome.error, outcome.updated) {
            (Some(error), _) => {
                println!("  {} {} - check failed: {}", outcome.name, outcome.previous_version, error);
            }
            (None, true) => {
                println!(
                    "  {} {} -> {} (updated)",
                    outcome.name, outcome.previous_version, outcome.new_version
                );
            }
            (None, false)
                if glix::version::is_newer(&outcome.new_version, &outcome.previous_version) =>
            {
                println!(
                    "  {} {} -> {} available",
                    outcome.name, outcome.previous_version, outcome.new_version
                );
            }
            _ => {
                println!("  {} {} (up to date)", outcome.name, outcome.previous_version);
            }
        }
    }

    println!();
    println!(
        "Updates found: {}, applied: {}",
        report.updates_found, report.updates_applied
    );
    Ok(())
}

pub async fn cmd_list(limit: i32, offset: i32, filter: &str) -> Result<()> {
    let client = glix::get_client(&DiscoveryConfig::default())
        .await
        .context("failed to connect to service")?;

    let response = client.list_modules(limit, offset, filter).await?;

    if response.modules.is_empty() {
        println!("No modules installed");
        if !filter.is_empty() {
            println!("(filter: {:?})", filter);
        }
        return Ok(());
    }

    println!();
    println!("Installed modules ({}):", response.total_count);
    println!();

    for module in &response.modules {
        println!("  {}@{}", module.name, module.version);
        let installed_at = format_timestamp(module.timestamp_unix_nano);
        if !installed_at.is_empty() {
            println!(
                "    Installed: {} | Dependencies: {}",
                installed_at,
                module.dependencies.len()
            );
        }
    }
    println!();

    if limit > 0 && response.total_count > response.modules.len() as i64 {
        println!(
            "Showing {} of {} modules",
            response.modules.len(),
            response.total_count
        );
    }
    Ok(())
}

pub async fn cmd_report(input: &str, version: &str, json: bool) -> Result<()> {
    let (name, _) = normalize_with_version(input)?;

    let client = glix::get_client(&DiscoveryConfig::default())
        .await
        .context("failed to connect to service")?;

    let response = client.get_module(&name, version).await?;
    let Some(module) = response.module.filter(|_| response.found) else {
        if version.is_empty() {
            bail!("module not found: {}", name);
        }
        bail!("module not found: {}@{}", name, version);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&module)?);
        return Ok(());
    }

    print_module_report(&module);

    let deps = client.get_dependencies(&name, version).await?;
    if let Some(deps) = deps.dependencies.filter(|_| deps.found) {
        if !deps.dependencies.is_empty() {
            println!();
            println!("Dependencies ({}):", deps.dependencies.len());
            for dep in &deps.dependencies {
                println!("  {}@{}", dep.name, dep.version);
            }
        }
    }
    Ok(())
}

fn print_module_report(module: &ModuleRecord) {
    println!();
    println!("Module:    {}", module.name);
    println!("Version:   {}", module.version);
    if !module.hash.is_empty() {
        println!("Hash:      {}", module.hash);
    }
    let installed_at = format_timestamp(module.timestamp_unix_nano);
    if !installed_at.is_empty() {
        println!("Installed: {}", installed_at);
    }
    if !module.versions.is_empty() {
        let shown: Vec<&str> = module.versions.iter().take(5).map(String::as_str).collect();
        let suffix = if module.versions.len() > 5 { ", ..." } else { "" };
        println!("Versions:  {}{}", shown.join(", "), suffix);
    }
}

// =============================================================================
// service
// =============================================================================

pub async fn cmd_service_run(port: u16, bind: &str, idle_timeout: &str) -> Result<()> {
    let dirs = AppDirs::resolve()?;
    dirs.ensure()?;

    let idle = parse_duration(idle_timeout)?;
    let idle = if idle.is_zero() { None } else { Some(idle) };

    let config = ServerConfig::new(&dirs)
        .with_port(port)
        .with_bind_address(bind)
        .with_idle_timeout(idle);

    let server = glix::Server::bind(config, &dirs).await?;
    server.serve().await?;
    Ok(())
}

pub async fn cmd_service_status() -> Result<()> {
    let cfg = DiscoveryConfig::default();
    let base_url = service_base_url(&cfg);

    match glix::Client::connect(&base_url, Duration::from_secs(2)).await {
        Ok(client) => {
            let status = client.get_status().await?;
            println!("Service status");
            println!("  Running:   {}", status.running);
            println!("  Namespace: {}", status.namespace);
            println!("  Address:   {}", status.address);
            println!("  Database:  {}", status.database_path);
            println!("  Uptime:    {}s", status.uptime_seconds);
            println!("  Modules:   {}", status.module_count);
        }
        Err(_) => {
            println!("Service is not running at {}", base_url);
        }
    }
    Ok(())
}

// =============================================================================
// auto-update
// =============================================================================

fn open_config_store() -> Result<ConfigStore> {
    let dirs = AppDirs::resolve()?;
    dirs.ensure()?;
    Ok(ConfigStore::open(dirs.autoupdate_config_path()))
}

pub fn cmd_autoupdate_status() -> Result<()> {
    let store = open_config_store()?;
    let config = store.get();

    println!("Auto-Update Status");
    println!("==================");
    println!();
    if config.enabled {
        println!("Status:        ENABLED");
    } else {
        println!("Status:        DISABLED");
    }
    println!("Interval:      {}", format_duration(config.interval()));
    if config.notify_only {
        println!("Mode:          Notify only (no auto-install)");
    } else {
        println!("Mode:          Auto-install updates");
    }

    println!();
    println!("Statistics");
    println!("----------");
    match config.last_check {
        None => println!("Last check:    Never"),
        Some(at) => println!("Last check:    {}", at.to_rfc3339()),
    }
    match config.last_update {
        None => println!("Last update:   Never"),
        Some(at) => println!("Last update:   {}", at.to_rfc3339()),
    }
    println!("Total checks:  {}", config.checked_count);
    println!("Total updates: {}", config.updated_count);

    if config.enabled {
        if let Some(last) = config.last_check {
            let next = last + chrono::Duration::from_std(config.interval()).unwrap_or_default();
            if next > Utc::now() {
                println!();
                println!("Next check:    {}", next.to_rfc3339());
            } else {
                println!();
                println!("Next check:    due now");
            }
        }
    }
    Ok(())
}

pub fn cmd_autoupdate_enable() -> Result<()> {
    let store = open_config_store()?;
    store.set_enabled(true)?;
    println!("Auto-update enabled");
    println!("Interval: {}", format_duration(store.get().interval()));
    Ok(())
}

pub fn cmd_autoupdate_disable() -> Result<()> {
    let store = open_config_store()?;
    store.set_enabled(false)?;
    println!("Auto-update disabled");
    Ok(())
}

pub async fn cmd_autoupdate_now() -> Result<()> {
    let dirs = AppDirs::resolve()?;
    dirs.ensure()?;

    let cfg = DiscoveryConfig::default();
    let _client = glix::get_client(&cfg)
        .await
        .context("failed to connect to service")?;

    println!("Running update check...");

    let scheduler = Scheduler::new(dirs, service_base_url(&cfg));
    let report = scheduler.run_once().await?;

    println!(
        "Checked {} module(s): {} update(s) found, {} applied",
        report.modules_checked, report.updates_found, report.updates_applied
    );
    for outcome in report.results.iter().filter(|o| o.error.is_some()) {
        println!(
            "  {}: {}",
            outcome.name,
            outcome.error.as_deref().unwrap_or_default()
        );
    }
    Ok(())
}

pub fn cmd_autoupdate_config(
    interval: Option<&str>,
    notify_only: bool,
    no_notify_only: bool,
) -> Result<()> {
    let store = open_config_store()?;
    let mut changed = false;

    if let Some(interval) = interval {
        let duration = parse_duration(interval)?;
        store.set_interval(duration)?;
        println!("Interval set to {}", format_duration(duration));
        changed = true;
    }
    if notify_only {
        store.set_notify_only(true)?;
        println!("Mode set to notify-only");
        changed = true;
    }
    if no_notify_only {
        store.set_notify_only(false)?;
        println!("Mode set to auto-install");
        changed = true;
    }

    if !changed {
        println!("Nothing to configure; see 'glix auto-update config --help'");
    }
    Ok(())
}
