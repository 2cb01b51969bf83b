// src/build/release.rs

//! Release-builder path: build a snapshot with goreleaser
//!
//! The module cache is read-only, so the source tree is copied into a fresh
//! scratch directory first. The builder is installed on demand when it is
//! not already on `PATH`.

use super::{binary, BuildDriver};
use crate::error::{Error, Result};
use crate::exec::{self, OutputHandler, OutputStream};
use crate::module::Resolution;
use std::path::Path;

/// Name of the release-builder executable
pub const RELEASE_BUILDER: &str = "goreleaser";

/// Canonical module path used to install the release builder on demand
pub const RELEASE_BUILDER_MODULE: &str = "github.com/goreleaser/goreleaser/v2@latest";

/// Environment variable the builder config may expand to the repo owner
const OWNER_ENV: &str = "GITHUB_OWNER";

impl BuildDriver<'_> {
    /// Build `resolution` with the release builder and place the binary
    pub(super) async fn install_via_release_builder(
        &self,
        source_dir: &Path,
        resolution: &Resolution,
        handler: &OutputHandler,
    ) -> Result<()> {
        self.ensure_release_builder(handler).await?;

        // The cache tree is read-only; build from a writable copy.
        let scratch = self.dirs.scratch_dir("build-")?;
        let build_dir = scratch.path().join("build");
        copy_dir(source_dir, &build_dir)?;

        handler(OutputStream::Stdout, "Building with GoReleaser...");

        let mut envs = Vec::new();
        if let Some(owner) = owner_segment(&resolution.canonical) {
            envs.push((OWNER_ENV.to_string(), owner.to_string()));
        }

        let (status, stderr) = exec::run_streaming(
            self.toolchain.cancel_token(),
            RELEASE_BUILDER,
            &["build", "--snapshot", "--clean"],
            Some(&build_dir),
            &envs,
            Some(handler.clone()),
        )
        .await?;

        if !status.success() {
            return Err(Error::BuildFailed {
                message: format!("{} build exited with {}", RELEASE_BUILDER, status),
                stderr,
            });
        }

        handler(OutputStream::Stdout, "Build completed successfully");

        let dist_dir = build_dir.join("dist");
        let built = binary::find_built_binary(&dist_dir)?;
        let built_name = built
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        handler(OutputStream::Stdout, &format!("Found binary: {}", built_name));

        let base_name = resolution
            .canonical
            .rsplit('/')
            .next()
            .unwrap_or(&resolution.canonical);
        let dest = binary::place_binary(&built, &self.dirs.bin_dir, base_name)?;
        handler(
            OutputStream::Stdout,
            &format!("Binary installed to: {}", dest.display()),
        );

        Ok(())
    }

    /// Install the release builder via the toolchain when it is not on PATH
    async fn ensure_release_builder(&self, handler: &OutputHandler) -> Result<()> {
        let probe = exec::run_capture(
            self.toolchain.cancel_token(),
            RELEASE_BUILDER,
            &["--version"],
            None,
            &[],
        )
        .await;
        if let Ok(output) = probe {
            if output.status.success() {
                return Ok(());
            }
        }

        handler(OutputStream::Stdout, "GoReleaser not found, installing...");
        self.toolchain
            .install_streaming(RELEASE_BUILDER_MODULE, &self.dirs.bin_dir, Some(handler.clone()))
            .await
    }
}

/// The repository owner: second-to-last `/`-segment of the canonical path
fn owner_segment(canonical: &str) -> Option<&str> {
    let segments: Vec<&str> = canonical.split('/').collect();
    if segments.len() >= 2 {
        Some(segments[segments.len() - 2])
    } else {
        None
    }
}

/// Recursively copy a directory tree
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;

    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            copy_dir(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }

    Ok(())
}
