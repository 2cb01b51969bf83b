// src/module/mod.rs

//! Module resolution: turning user input into an installable command path
//!
//! The pieces compose bottom-up: the path normalizer canonicalizes raw user
//! input, the version probe asks the build toolchain what versions exist,
//! the entry-point discoverer hunts for command packages under a module
//! root, and the resolver drives all three into a [`Resolution`].

pub mod discovery;
pub mod path;
pub mod probe;
pub mod resolver;

pub use discovery::parse_release_config;
pub use path::{normalize, normalize_with_version};
pub use probe::VersionInfo;
pub use resolver::{Resolver, MAX_PREFIX_WALK};

use crate::error::{Error, Result};
use crate::exec::{self, OutputHandler};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Name given to the synthetic module manifest in scratch directories, so
/// the toolchain operates there without touching user state. Filtered out of
/// dependency listings.
pub const SYNTHETIC_MODULE: &str = "glixscratch";

/// The outcome of resolving user input
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Installable command path
    pub canonical: String,
    /// Module root the canonical path lives under (equal to `canonical`
    /// when the root itself is installable)
    pub root_module: String,
    /// Concrete chosen version
    pub version: String,
    /// Known versions, newest first
    pub versions: Vec<String>,
    /// Hex SHA-256 of `<canonical>@<version>`
    pub hash: String,
}

/// Wrapper around the external build toolchain (`go`), scoped to a scratch
/// working directory and a cancellation token.
pub struct Toolchain {
    program: String,
    workdir: PathBuf,
    cancel: CancellationToken,
}

#[derive(Debug, Deserialize)]
struct DownloadInfo {
    #[serde(rename = "Dir", default)]
    dir: String,
    #[serde(rename = "Error", default)]
    error: Option<String>,
}

impl Toolchain {
    pub fn new(
        program: impl Into<String>,
        workdir: impl Into<PathBuf>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            program: program.into(),
            workdir: workdir.into(),
            cancel,
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run the toolchain in the scratch directory, capturing output
    pub(crate) async fn run(&self, args: &[&str]) -> Result<std::process::Output> {
        exec::run_capture(&self.cancel, &self.program, args, Some(&self.workdir), &[]).await
    }

    /// Check the toolchain binary is runnable at all.
    ///
    /// A non-zero exit (usage output) is fine; only a spawn failure counts.
    pub async fn verify(&self) -> Result<()> {
        match exec::run_capture(&self.cancel, &self.program, &[], None, &[]).await {
            Ok(_) => Ok(()),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(_) => Err(Error::Config(format!(
                "failed to run toolchain binary {:?}",
                self.program
            ))),
        }
    }

    /// Write the synthetic module manifest into the scratch directory
    pub async fn mod_init(&self, name: &str) -> Result<()> {
        let output = self.run(&["mod", "init", name]).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::Internal(format!(
                "failed to initialize scratch module: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    /// Fetch a module into the scratch module (`go get <module@version>`)
    pub async fn get(&self, module_at_version: &str) -> Result<()> {
        let output = self.run(&["get", module_at_version]).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::NotFound(format!(
                "module source for {}: {}",
                module_at_version,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    /// Download a module's source into the cache and return its directory
    pub async fn download(&self, module_at_version: &str) -> Result<PathBuf> {
        let output = self.run(&["mod", "download", "-json", module_at_version]).await?;
        let info: DownloadInfo = serde_json::from_slice(&output.stdout).map_err(|_| {
            Error::NotFound(format!("module source for {}", module_at_version))
        })?;
        if let Some(message) = info.error {
            return Err(Error::NotFound(format!(
                "module source for {}: {}",
                module_at_version, message
            )));
        }
        if info.dir.is_empty() {
            return Err(Error::NotFound(format!(
                "module source for {}",
                module_at_version
            )));
        }
        Ok(PathBuf::from(info.dir))
    }

    /// Lines of `go list -m all` for the scratch module
    pub async fn list_all_modules(&self) -> Result<Vec<String>> {
        let output = self.run(&["list", "-m", "all"]).await?;
        if !output.status.success() {
            return Err(Error::Internal(format!(
                "module listing failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|line| line.to_string())
            .collect())
    }

    /// Whether `path` denotes a command (the ecosystem's "main" package)
    pub async fn is_main_package(&self, path: &str) -> bool {
        #[derive(Deserialize)]
        struct PackageName {
            #[serde(rename = "Name", default)]
            name: String,
        }

        let Ok(output) = self.run(&["list", "-json", path]).await else {
            return false;
        };
        if !output.status.success() {
            return false;
        }
        serde_json::from_slice::<PackageName>(&output.stdout)
            .map(|pkg| pkg.name == "main")
            .unwrap_or(false)
    }

    /// Run the toolchain's install verb with the output directory overridden
    /// to `gobin`, streaming each output line to the handler.
    pub async fn install_streaming(
        &self,
        module_at_version: &str,
        gobin: &Path,
        handler: Option<OutputHandler>,
    ) -> Result<()> {
        std::fs::create_dir_all(gobin)?;

        let envs = [("GOBIN".to_string(), gobin.display().to_string())];
        let (status, stderr) = exec::run_streaming(
            &self.cancel,
            &self.program,
            &["install", module_at_version],
            Some(&self.workdir),
            &envs,
            handler,
        )
        .await?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::BuildFailed {
                message: format!(
                    "{} install {} exited with {}",
                    self.program, module_at_version, status
                ),
                stderr,
            })
        }
    }
}
