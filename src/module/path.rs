// src/module/path.rs

//! Path normalizer: canonicalize user input into a module path
//!
//! Accepts plain module paths, repository URLs (`https://`, `http://`,
//! `git://`, `ssh://`), and SSH-style refs (`user@host:a/b`). Normalization
//! is idempotent, and a trailing `@<version>` is split off separately.

use crate::error::{Error, Result};

/// Prefixes stripped from the front of user input, first match wins
const STRIP_PREFIXES: &[&str] = &["https://", "http://", "git://", "ssh://", "www."];

/// Archive suffix removed from the end of repository paths
const ARCHIVE_SUFFIX: &str = ".git";

/// Canonicalize `input` into a module path.
///
/// Rules, in order: strip the first matching scheme prefix; if the remainder
/// still contains both `:` and `@`, keep the substring after the first `:`
/// and replace `\` with `/`; remove a trailing `.git`; trim surrounding `/`.
/// An input that normalizes to nothing is `InvalidInput`.
pub fn normalize(input: &str) -> Result<String> {
    let mut path = input.trim().to_string();

    for prefix in STRIP_PREFIXES {
        if let Some(rest) = path.strip_prefix(prefix) {
            path = rest.to_string();
            break;
        }
    }

    // SSH-style refs: user@host:a/b
    if path.contains(':') && path.contains('@') {
        if let Some((_, rest)) = path.split_once(':') {
            path = rest.replace('\\', "/");
        }
    }

    if let Some(rest) = path.strip_suffix(ARCHIVE_SUFFIX) {
        path = rest.to_string();
    }

    let path = path.trim_matches('/');
    if path.is_empty() {
        return Err(Error::InvalidInput(format!(
            "module path {:?} normalizes to nothing",
            input
        )));
    }
    Ok(path.to_string())
}

/// Normalize `input` and split off the trailing `@<version>` token.
///
/// Returns `(path, version)`, where the version defaults to `"latest"`.
pub fn normalize_with_version(input: &str) -> Result<(String, String)> {
    let normalized = normalize(input)?;
    match normalized.split_once('@') {
        Some((path, version)) if !path.is_empty() => {
            let version = if version.is_empty() {
                "latest".to_string()
            } else {
                version.to_string()
            };
            Ok((path.to_string(), version))
        }
        _ => Ok((normalized, "latest".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_path_passes_through() {
        assert_eq!(normalize("github.com/owner/tool").unwrap(), "github.com/owner/tool");
    }

    #[test]
    fn test_scheme_prefixes_are_stripped() {
        for scheme in ["https", "http", "git", "ssh"] {
            let input = format!("{}://github.com/owner/tool", scheme);
            assert_eq!(normalize(&input).unwrap(), "github.com/owner/tool");
        }
    }

    #[test]
    fn test_www_prefix_is_stripped() {
        assert_eq!(normalize("www.github.com/owner/tool").unwrap(), "github.com/owner/tool");
    }

    #[test]
    fn test_archive_suffix_is_removed() {
        assert_eq!(
            normalize("https://github.com/owner/tool.git").unwrap(),
            "github.com/owner/tool"
        );
        assert_eq!(normalize("github.com/owner/tool.git").unwrap(), "github.com/owner/tool");
    }

    #[test]
    fn test_ssh_style_ref() {
        assert_eq!(normalize("git@github.com:owner/tool.git").unwrap(), "owner/tool");
        assert_eq!(normalize("user@host:a\\b").unwrap(), "a/b");
    }

    #[test]
    fn test_surrounding_slashes_are_trimmed() {
        assert_eq!(normalize("/github.com/owner/tool/").unwrap(), "github.com/owner/tool");
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(matches!(normalize(""), Err(Error::InvalidInput(_))));
        assert!(matches!(normalize("///"), Err(Error::InvalidInput(_))));
        assert!(matches!(normalize("https://"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for input in [
            "github.com/owner/tool",
            "https://github.com/owner/tool.git",
            "git@github.com:owner/tool.git",
            "/github.com/owner/tool/",
            "www.github.com/owner/tool",
        ] {
            let once = normalize(input).unwrap();
            let twice = normalize(&once).unwrap();
            assert_eq!(once, twice, "normalize not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_version_split() {
        assert_eq!(
            normalize_with_version("github.com/owner/tool@v1.2.3").unwrap(),
            ("github.com/owner/tool".to_string(), "v1.2.3".to_string())
        );
        assert_eq!(
            normalize_with_version("github.com/owner/tool").unwrap(),
            ("github.com/owner/tool".to_string(), "latest".to_string())
        );
        assert_eq!(
            normalize_with_version("github.com/owner/tool@latest").unwrap(),
            ("github.com/owner/tool".to_string(), "latest".to_string())
        );
    }

    #[test]
    fn test_version_split_after_url_normalization() {
        assert_eq!(
            normalize_with_version("https://github.com/owner/tool.git@v2.0.0").unwrap(),
            ("github.com/owner/tool".to_string(), "v2.0.0".to_string())
        );
    }
}
