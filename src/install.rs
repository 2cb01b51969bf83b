// src/install.rs

//! Install pipeline: resolve, build, and commit one module
//!
//! The pipeline glues the resolver and the build driver, emitting a progress
//! phase per step: `init`, `versions`, `download`, `check`, `discover` (when
//! discovery is triggered), `deps`, `build`, `store`, `done`. Committing the
//! final record goes through the [`ModuleSink`] seam, so one-shot CLI
//! invocations and the auto-update scheduler both funnel their writes
//! through the service.

use crate::api::{DependenciesRecord, ModuleRecord};
use crate::build::BuildDriver;
use crate::config::AppDirs;
use crate::error::{Error, Result};
use crate::exec::{self, OutputHandler};
use crate::module::{Resolver, Toolchain};
use crate::store;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default per-module resolution budget
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Name of the external build toolchain binary
pub const TOOLCHAIN: &str = "go";

/// Called once per pipeline phase with `(phase, message)`
pub type ProgressHandler = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Progress and build-output callbacks for one install
#[derive(Clone)]
pub struct InstallHandlers {
    pub progress: ProgressHandler,
    pub output: OutputHandler,
}

impl InstallHandlers {
    /// Plain-text handlers: `[phase] message` traces plus raw build output
    pub fn plain() -> Self {
        Self {
            progress: Arc::new(|phase, message| println!("[{}] {}", phase, message)),
            output: exec::passthrough_handler(),
        }
    }

    /// Handlers that swallow everything
    pub fn silent() -> Self {
        Self {
            progress: Arc::new(|_, _| {}),
            output: exec::silent_handler(),
        }
    }
}

/// Where committed records go; implemented by the RPC client
#[async_trait]
pub trait ModuleSink: Send + Sync {
    async fn store_module(
        &self,
        module: &ModuleRecord,
        dependencies: &DependenciesRecord,
    ) -> Result<()>;
}

/// Orchestrates one install from user input to committed record
pub struct Installer {
    dirs: AppDirs,
    program: String,
    cancel: CancellationToken,
    resolve_timeout: Duration,
}

impl Installer {
    pub fn new(dirs: AppDirs) -> Self {
        Self {
            dirs,
            program: TOOLCHAIN.to_string(),
            cancel: CancellationToken::new(),
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_toolchain(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    /// Run the full pipeline for `input`, returning the committed record.
    ///
    /// The per-install scratch directory is released on every exit path.
    pub async fn install(
        &self,
        input: &str,
        handlers: &InstallHandlers,
        sink: &dyn ModuleSink,
    ) -> Result<ModuleRecord> {
        let progress = &handlers.progress;
        progress("init", "Preparing installation");

        self.dirs.ensure()?;
        let scratch = self.dirs.scratch_dir("install-")?;
        let toolchain = Toolchain::new(&self.program, scratch.path(), self.cancel.clone());
        toolchain.verify().await?;

        let resolver = Resolver::new(&toolchain);
        let emit = |phase: &str, message: &str| progress(phase, message);

        let resolution = tokio::time::timeout(
            self.resolve_timeout,
            resolver.resolve(input, &emit),
        )
        .await
        .map_err(|_| {
            Error::Transient(format!(
                "resolving {} timed out after {}s",
                input,
                self.resolve_timeout.as_secs()
            ))
        })??;

        progress(
            "deps",
            &format!("Collecting dependencies of {}", resolution.canonical),
        );
        let dependencies = resolver.extract_dependencies(&resolution).await?;

        progress(
            "build",
            &format!("Installing {}@{}", resolution.canonical, resolution.version),
        );
        let driver = BuildDriver::new(&toolchain, &self.dirs);
        driver.install(&resolution, &handlers.output).await?;

        let record = ModuleRecord {
            name: resolution.canonical.clone(),
            version: resolution.version.clone(),
            versions: resolution.versions.clone(),
            dependencies: dependencies.clone(),
            hash: resolution.hash.clone(),
            timestamp_unix_nano: store::next_timestamp_nanos(),
        };
        let deps_record = DependenciesRecord { dependencies };

        progress("store", "Saving to database...");
        sink.store_module(&record, &deps_record).await?;

        progress(
            "done",
            &format!(
                "Module {} installed successfully at version {}",
                record.name, record.version
            ),
        );
        Ok(record)
    }
}
