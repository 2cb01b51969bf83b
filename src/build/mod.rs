// src/build/mod.rs

//! Build driver: turn a resolution into a binary in the user bin directory
//!
//! Two paths exist. When the module's source tree carries a release-builder
//! configuration, the release path builds a snapshot with the release
//! builder and places the platform binary manually. Otherwise the native
//! path drives the toolchain's install verb with the output directory
//! overridden. Both stream their output line by line.

pub mod binary;
pub mod release;

use crate::config::AppDirs;
use crate::error::Result;
use crate::exec::{OutputHandler, OutputStream};
use crate::module::{discovery, Resolution, Toolchain};

/// Drives the native or release-builder toolchain for one install
pub struct BuildDriver<'a> {
    toolchain: &'a Toolchain,
    dirs: &'a AppDirs,
}

impl<'a> BuildDriver<'a> {
    pub fn new(toolchain: &'a Toolchain, dirs: &'a AppDirs) -> Self {
        Self { toolchain, dirs }
    }

    /// Build and place the binary for `resolution`.
    ///
    /// Output lines go to `handler` tagged with their stream; failures
    /// surface as `BuildFailed` carrying the accumulated stderr.
    pub async fn install(&self, resolution: &Resolution, handler: &OutputHandler) -> Result<()> {
        let source_dir = self
            .toolchain
            .download(&format!("{}@{}", resolution.root_module, resolution.version))
            .await?;

        if let Some(config_path) = discovery::find_release_config(&source_dir) {
            handler(
                OutputStream::Stdout,
                &format!("Found release config: {}", config_path.display()),
            );
            return self
                .install_via_release_builder(&source_dir, resolution, handler)
                .await;
        }

        self.install_native(resolution, handler).await
    }

    /// Native path: the toolchain's install verb with `GOBIN` overridden
    async fn install_native(&self, resolution: &Resolution, handler: &OutputHandler) -> Result<()> {
        let target = format!("{}@{}", resolution.canonical, resolution.version);
        self.toolchain
            .install_streaming(&target, &self.dirs.bin_dir, Some(handler.clone()))
            .await
    }
}
