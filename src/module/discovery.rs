// src/module/discovery.rs

//! Entry-point discoverer: locate installable commands under a module root
//!
//! Three strategies run in order and their results are unioned, duplicates
//! removed preserving first-seen order: command packages under `cmd/...`,
//! command packages under `cli/...`, and `main:` directives in the module's
//! release-builder configuration. A failing strategy contributes nothing.

use super::Toolchain;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Release-builder configuration file names, checked in order
pub const RELEASE_CONFIG_NAMES: &[&str] = &[".goreleaser.yaml", ".goreleaser.yml"];

#[derive(Debug, Deserialize)]
struct PackageInfo {
    #[serde(rename = "ImportPath", default)]
    import_path: String,
    #[serde(rename = "Name", default)]
    name: String,
}

impl Toolchain {
    /// Find installable command paths under `root`.
    ///
    /// Returns the candidate list and whether anything was found. Never
    /// fails: network or parse errors in one strategy leave the others
    /// untouched.
    pub async fn discover_entry_points(&self, root: &str) -> (Vec<String>, bool) {
        let mut candidates = Vec::new();

        candidates.extend(self.discover_from_subtree(root, "cmd").await);
        candidates.extend(self.discover_from_subtree(root, "cli").await);
        candidates.extend(self.discover_from_release_config(root).await);

        let mut seen = HashSet::new();
        let unique: Vec<String> = candidates
            .into_iter()
            .filter(|path| seen.insert(path.clone()))
            .collect();

        let found = !unique.is_empty();
        (unique, found)
    }

    /// Command packages under `<root>/<subdir>/...`
    async fn discover_from_subtree(&self, root: &str, subdir: &str) -> Vec<String> {
        let pattern = format!("{}/{}/...", root, subdir);
        let Ok(output) = self.run(&["list", "-json", &pattern]).await else {
            return Vec::new();
        };
        if !output.status.success() {
            return Vec::new();
        }

        // The toolchain emits one JSON object per package, concatenated.
        let mut paths = Vec::new();
        let stream = serde_json::Deserializer::from_slice(&output.stdout);
        for pkg in stream.into_iter::<PackageInfo>() {
            let Ok(pkg) = pkg else { break };
            if pkg.name == "main" && !pkg.import_path.is_empty() {
                paths.push(pkg.import_path);
            }
        }
        paths
    }

    /// `main:` directives from the release-builder config of the downloaded
    /// source tree
    async fn discover_from_release_config(&self, root: &str) -> Vec<String> {
        let Ok(module_dir) = self.download(&format!("{}@latest", root)).await else {
            return Vec::new();
        };

        for name in RELEASE_CONFIG_NAMES {
            let config_path = module_dir.join(name);
            if let Ok(content) = std::fs::read_to_string(&config_path) {
                return parse_release_config(&content, root);
            }
        }
        Vec::new()
    }
}

/// Find the release-builder configuration file in a source tree, if any
pub fn find_release_config(dir: &Path) -> Option<std::path::PathBuf> {
    RELEASE_CONFIG_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Extract entry-point paths from release-builder config content.
///
/// Scans lines for `main:` directives; each value is stripped of quotes and
/// a leading `./`, then joined to `root` with `/` separators.
pub fn parse_release_config(content: &str, root: &str) -> Vec<String> {
    let mut paths = Vec::new();

    for line in content.lines() {
        let line = line.trim().trim_start_matches("- ").trim_start();
        let Some(value) = line.strip_prefix("main:") else {
            continue;
        };

        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        let value = value.strip_prefix("./").unwrap_or(value);
        let value = value.replace('\\', "/");
        let value = value.trim_matches('/');

        if value.is_empty() || value == "." {
            paths.push(root.to_string());
        } else {
            paths.push(format!("{}/{}", root, value));
        }
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_release_config_basic() {
        let content = "\
builds:
  - id: tool
    main: ./cmd/tool
    binary: tool
";
        assert_eq!(
            parse_release_config(content, "github.com/owner/tool"),
            vec!["github.com/owner/tool/cmd/tool"]
        );
    }

    #[test]
    fn test_parse_release_config_inline_list_item() {
        let content = "\
builds:
  - main: ./cmd/app
";
        assert_eq!(
            parse_release_config(content, "example.org/owner/app"),
            vec!["example.org/owner/app/cmd/app"]
        );
    }

    #[test]
    fn test_parse_release_config_quotes_and_dot() {
        let content = "\
builds:
  - main: \"./cmd/one\"
  - main: '.'
  - main: .
";
        assert_eq!(
            parse_release_config(content, "example.org/o/r"),
            vec!["example.org/o/r/cmd/one", "example.org/o/r", "example.org/o/r"]
        );
    }

    #[test]
    fn test_parse_release_config_backslashes() {
        let content = "main: .\\cmd\\tool\n";
        assert_eq!(
            parse_release_config(content, "example.org/o/r"),
            vec!["example.org/o/r/cmd/tool"]
        );
    }

    #[test]
    fn test_parse_release_config_ignores_other_lines() {
        let content = "\
project_name: tool
before:
  hooks:
    - go mod tidy
archives:
  - format: tar.gz
";
        assert!(parse_release_config(content, "example.org/o/r").is_empty());
    }

    #[test]
    fn test_find_release_config() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_release_config(dir.path()).is_none());

        std::fs::write(dir.path().join(".goreleaser.yml"), "builds:\n").unwrap();
        let found = find_release_config(dir.path()).unwrap();
        assert!(found.ends_with(".goreleaser.yml"));

        // The .yaml spelling takes precedence when both exist.
        std::fs::write(dir.path().join(".goreleaser.yaml"), "builds:\n").unwrap();
        let found = find_release_config(dir.path()).unwrap();
        assert!(found.ends_with(".goreleaser.yaml"));
    }
}
