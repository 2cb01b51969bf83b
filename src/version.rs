// src/version.rs

//! Module version ordering
//!
//! Versions in the ecosystem are `v`-prefixed semver tags plus pseudo-version
//! strings (`v0.0.0-20240101000000-abcdef012345`) for untagged commits.
//! Comparison normalizes both sides by prepending `v` when absent, prefers
//! the semantic ordering when both sides parse, and falls back to byte-wise
//! comparison of the normalized strings otherwise. Equal strings compare
//! equal before any parsing is attempted.

use semver::Version;
use std::cmp::Ordering;

/// Prepend `v` when absent; empty strings are returned unchanged
pub fn normalize(version: &str) -> String {
    if version.is_empty() || version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{}", version)
    }
}

/// Parse the semver part of a normalized version, if it has one
fn parse(version: &str) -> Option<Version> {
    Version::parse(version.trim_start_matches('v')).ok()
}

/// Compare two version strings under the ecosystem ordering
pub fn compare(a: &str, b: &str) -> Ordering {
    let na = normalize(a);
    let nb = normalize(b);

    if na == nb {
        return Ordering::Equal;
    }

    match (parse(&na), parse(&nb)) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        // Pseudo-versions and other non-semver strings compare byte-wise.
        _ => na.cmp(&nb),
    }
}

/// True when `candidate` is strictly newer than `installed`
pub fn is_newer(candidate: &str, installed: &str) -> bool {
    compare(candidate, installed) == Ordering::Greater
}

/// Sort versions strictly descending (newest first), ties broken by
/// lexicographic descending on the raw strings
pub fn sort_descending(versions: &mut [String]) {
    versions.sort_by(|a, b| compare(b, a).then_with(|| b.cmp(a)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("1.2.3"), "v1.2.3");
        assert_eq!(normalize("v1.2.3"), "v1.2.3");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_semver_ordering() {
        assert!(is_newer("v2.0.0", "v1.9.9"));
        assert!(is_newer("v1.9.9", "v1.0.0"));
        assert!(is_newer("v1.10.0", "v1.9.0"));
        assert!(!is_newer("v1.0.0", "v1.0.0"));
        assert!(!is_newer("v1.0.0", "v2.0.0"));
    }

    #[test]
    fn test_missing_prefix_is_normalized() {
        assert_eq!(compare("1.0.0", "v1.0.0"), Ordering::Equal);
        assert!(is_newer("2.0.0", "v1.0.0"));
    }

    #[test]
    fn test_pseudo_version_chain() {
        // Semantic ordering beats lexicographic where both apply;
        // pseudo-versions compare lexicographically.
        assert!(is_newer("v1.0.0", "v0.0.0-20240101000000-abcdef012345"));
        assert!(is_newer(
            "v0.0.0-20240201000000-abcdef012345",
            "v0.0.0-20240101000000-abcdef012345"
        ));
    }

    #[test]
    fn test_lexicographic_fallback_limit() {
        // Both sides fail semver parsing, so the byte-wise fallback applies
        // and "v10" sorts below "v9". This pins the documented limit of the
        // fallback rule rather than a desirable property.
        assert!(is_newer("v9", "v10"));
    }

    #[test]
    fn test_sort_descending() {
        let mut versions = vec![
            "v1.0.0".to_string(),
            "v2.0.0".to_string(),
            "v1.9.9".to_string(),
            "v0.0.0-20240101000000-abcdef012345".to_string(),
        ];
        sort_descending(&mut versions);
        assert_eq!(
            versions,
            vec![
                "v2.0.0",
                "v1.9.9",
                "v1.0.0",
                "v0.0.0-20240101000000-abcdef012345"
            ]
        );
    }
}
