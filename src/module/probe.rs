// src/module/probe.rs

//! Version probe: ask the toolchain what versions exist for a path

use super::Toolchain;
use crate::error::{Error, Result};
use crate::version;
use serde::Deserialize;

/// Versions known upstream for a module path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersionInfo {
    /// Ordered newest to oldest
    pub versions: Vec<String>,
    /// The version `@latest` currently resolves to (may be a pseudo-version)
    pub concrete: String,
}

/// Shape of `go list -m -versions -json` output
#[derive(Debug, Deserialize)]
struct ListModuleResponse {
    #[serde(rename = "Path", default)]
    #[allow(dead_code)]
    path: String,
    #[serde(rename = "Version", default)]
    version: String,
    #[serde(rename = "Versions", default)]
    versions: Vec<String>,
}

impl Toolchain {
    /// Enumerate the known versions of `path`.
    ///
    /// A non-empty list is sorted strictly descending by the ecosystem's
    /// version order, ties broken by lexicographic descending. An empty list
    /// with a concrete snapshot version becomes a one-element list. Any
    /// toolchain failure is `NotFound`, without retry.
    pub async fn probe_versions(&self, path: &str) -> Result<VersionInfo> {
        let target = format!("{}@latest", path);
        let output = self.run(&["list", "-m", "-versions", "-json", &target]).await?;

        if !output.status.success() {
            return Err(Error::NotFound(format!("no versions for module {}", path)));
        }

        let resp: ListModuleResponse = serde_json::from_slice(&output.stdout)
            .map_err(|_| Error::NotFound(format!("no versions for module {}", path)))?;

        let mut versions = resp.versions;
        if !versions.is_empty() {
            version::sort_descending(&mut versions);
            let concrete = if resp.version.is_empty() {
                versions[0].clone()
            } else {
                resp.version
            };
            return Ok(VersionInfo { versions, concrete });
        }

        // Untagged modules report a single pseudo-version.
        if !resp.version.is_empty() {
            return Ok(VersionInfo {
                versions: vec![resp.version.clone()],
                concrete: resp.version,
            });
        }

        Err(Error::NotFound(format!("no versions for module {}", path)))
    }
}
