// src/module/resolver.rs

//! Module resolver: compose the normalizer, probe, and discoverer
//!
//! Resolution walks path prefixes against the upstream version index, falls
//! back to entry-point discovery for repository-root inputs, validates that
//! the result is actually installable, and pins a concrete version.

use super::{path, Resolution, Toolchain, SYNTHETIC_MODULE};
use crate::api::DependencyRecord;
use crate::error::{Error, Result};
use crate::hash::sha256_hex;
use std::collections::HashSet;

/// Maximum number of prefix-walk probe attempts
pub const MAX_PREFIX_WALK: usize = 5;

/// Resolves user input into an installable `(canonical, version)` pair
pub struct Resolver<'a> {
    toolchain: &'a Toolchain,
}

impl<'a> Resolver<'a> {
    pub fn new(toolchain: &'a Toolchain) -> Self {
        Self { toolchain }
    }

    /// Resolve `input` into a [`Resolution`].
    ///
    /// `progress` receives `(phase, message)` pairs as the resolver moves
    /// through its stages.
    pub async fn resolve<P>(&self, input: &str, progress: &P) -> Result<Resolution>
    where
        P: Fn(&str, &str) + Sync + ?Sized,
    {
        let (original, version_token) = path::normalize_with_version(input)?;

        self.toolchain.mod_init(SYNTHETIC_MODULE).await?;

        progress("versions", &format!("Resolving versions for {}", original));

        // Phase A: walk prefixes until the version index answers.
        let mut canonical = original.clone();
        let mut probe_path = original.clone();
        let mut resolved: Option<(String, super::VersionInfo)> = None;

        for _ in 0..MAX_PREFIX_WALK {
            match self.toolchain.probe_versions(&probe_path).await {
                Ok(info) => {
                    resolved = Some((probe_path.clone(), info));
                    break;
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(_) => match probe_path.rfind('/') {
                    Some(idx) => probe_path.truncate(idx),
                    None => break,
                },
            }
        }

        // Phase B: entry-point discovery, only for inputs that look like a
        // repository root rather than a deep import path.
        if resolved.is_none() && phase_b_eligible(&original) {
            progress(
                "discover",
                &format!("Path {} not found, searching for installable commands", original),
            );
            let (candidates, found) = self.toolchain.discover_entry_points(&original).await;
            if found {
                let candidate = candidates[0].clone();
                if let Ok(info) = self.toolchain.probe_versions(&candidate).await {
                    canonical = candidate;
                    resolved = Some((original.clone(), info));
                }
            }
        }

        let (root_module, info) = resolved.ok_or_else(|| Error::Unresolvable(original.clone()))?;

        // Fetch the module source; this also validates it exists.
        progress("download", &format!("Downloading {}", canonical));
        self.toolchain.get(&format!("{}@latest", canonical)).await?;

        // Confirm the canonical path denotes a command, falling back to
        // discovery under the module root when it does not.
        progress("check", &format!("Checking {} is installable", canonical));
        if !self.toolchain.is_main_package(&canonical).await {
            progress(
                "discover",
                &format!("{} has no command package, searching under {}", canonical, root_module),
            );
            let (candidates, found) = self.toolchain.discover_entry_points(&root_module).await;
            if found {
                canonical = candidates[0].clone();
            } else {
                return Err(Error::NotInstallable(canonical));
            }
        }

        // Pin the version.
        let version = if version_token == "latest" {
            info.versions
                .first()
                .cloned()
                .unwrap_or_else(|| info.concrete.clone())
        } else {
            version_token
        };
        if !info.versions.is_empty() && !info.versions.iter().any(|v| v == &version) {
            return Err(Error::UnknownVersion {
                module: canonical,
                version,
            });
        }

        let hash = sha256_hex(&format!("{}@{}", canonical, version));

        Ok(Resolution {
            canonical,
            root_module,
            version,
            versions: info.versions,
            hash,
        })
    }

    /// Enumerate the transitive dependency list of a resolved module.
    ///
    /// The resolved module is fetched at its pinned version into the scratch
    /// module, then every distinct name the toolchain enumerates (excluding
    /// the module itself and the synthetic module) is probed into a
    /// [`DependencyRecord`]. Names whose probe fails are skipped.
    pub async fn extract_dependencies(
        &self,
        resolution: &Resolution,
    ) -> Result<Vec<DependencyRecord>> {
        self.toolchain
            .get(&format!("{}@{}", resolution.canonical, resolution.version))
            .await?;

        let lines = self.toolchain.list_all_modules().await?;

        let mut seen = HashSet::new();
        let mut dependencies = Vec::new();

        for line in lines {
            let Some(name) = line.split_whitespace().next() else {
                continue;
            };
            if name == SYNTHETIC_MODULE || name == resolution.canonical {
                continue;
            }
            if !seen.insert(name.to_string()) {
                continue;
            }
            if let Ok(dep) = self.dependency(name).await {
                dependencies.push(dep);
            }
        }

        Ok(dependencies)
    }

    async fn dependency(&self, name: &str) -> Result<DependencyRecord> {
        let info = self.toolchain.probe_versions(name).await?;
        let version = info
            .versions
            .first()
            .cloned()
            .unwrap_or_else(|| info.concrete.clone());

        Ok(DependencyRecord {
            name: name.to_string(),
            hash: sha256_hex(&format!("{}@{}", name, version)),
            version,
            versions: info.versions,
            dependencies: Vec::new(),
        })
    }
}

/// Discovery only triggers for inputs that plausibly name a repository
/// root: few path segments, or an explicit command subtree.
fn phase_b_eligible(path: &str) -> bool {
    path.matches('/').count() <= 2 || path.contains("/cmd/") || path.contains("/cli/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_b_eligibility() {
        assert!(phase_b_eligible("github.com/owner/tool"));
        assert!(phase_b_eligible("github.com/owner"));
        assert!(!phase_b_eligible("github.com/owner/tool/internal/deep/path"));
        assert!(phase_b_eligible("github.com/owner/tool/cmd/sub/deep"));
        assert!(phase_b_eligible("github.com/owner/tool/cli/sub/deep"));
    }
}
