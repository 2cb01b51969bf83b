// tests/resolver_test.rs

//! Resolver laws that hold without any network: normalizer algebra,
//! version ordering, and the bounded prefix walk (driven by a stub
//! toolchain that records its invocations).

use glix::module::{normalize, normalize_with_version, Resolver, Toolchain};
use glix::version;
use glix::Error;
use std::cmp::Ordering;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Normalizer laws
// =============================================================================

#[test]
fn normalize_is_idempotent() {
    let inputs = [
        "github.com/owner/tool",
        "https://github.com/owner/tool.git",
        "git@github.com:owner/tool.git",
        "ssh://github.com/owner/tool",
        "/github.com/owner/tool/",
    ];
    for input in inputs {
        let once = normalize(input).unwrap();
        assert_eq!(normalize(&once).unwrap(), once);
    }
}

#[test]
fn normalize_strips_every_scheme() {
    let bare = normalize("github.com/owner/tool").unwrap();
    for scheme in ["https", "http", "git", "ssh"] {
        let with_scheme = normalize(&format!("{}://github.com/owner/tool", scheme)).unwrap();
        assert_eq!(with_scheme, bare);
    }
}

#[test]
fn normalize_strips_archive_suffix() {
    assert_eq!(
        normalize("github.com/owner/tool.git").unwrap(),
        normalize("github.com/owner/tool").unwrap()
    );
}

#[test]
fn version_token_defaults_to_latest() {
    let (path, version) = normalize_with_version("github.com/owner/tool").unwrap();
    assert_eq!(path, "github.com/owner/tool");
    assert_eq!(version, "latest");

    let (path, version) = normalize_with_version("github.com/owner/tool@v1.5.0").unwrap();
    assert_eq!(path, "github.com/owner/tool");
    assert_eq!(version, "v1.5.0");
}

#[test]
fn empty_inputs_are_invalid() {
    for input in ["", "   ", "///", "https://"] {
        assert!(matches!(normalize(input), Err(Error::InvalidInput(_))));
    }
}

// =============================================================================
// Version-order rule
// =============================================================================

#[test]
fn version_order_chain() {
    // Semantic beats lexicographic where both apply; pseudo-versions
    // compare lexicographically.
    let chain = [
        "v2.0.0",
        "v1.9.9",
        "v1.0.0",
        "v0.0.0-20240101000000-abcdef012345",
    ];
    for pair in chain.windows(2) {
        assert!(
            version::is_newer(pair[0], pair[1]),
            "{} should be newer than {}",
            pair[0],
            pair[1]
        );
        assert!(!version::is_newer(pair[1], pair[0]));
    }
}

#[test]
fn version_equality_ignores_missing_prefix() {
    assert_eq!(version::compare("1.2.3", "v1.2.3"), Ordering::Equal);
    assert!(!version::is_newer("1.2.3", "v1.2.3"));
}

// =============================================================================
// Prefix-walk bound, via a stub toolchain
// =============================================================================

/// Write a stub `go` that accepts `mod init`, fails everything else, and
/// appends each invocation to a log file.
fn write_stub_toolchain(dir: &std::path::Path, log: &std::path::Path) -> std::path::PathBuf {
    let stub = dir.join("go-stub");
    let script = format!(
        "#!/bin/sh\necho \"$@\" >> \"{}\"\ncase \"$1\" in\n  mod) exit 0 ;;\nesac\nexit 1\n",
        log.display()
    );
    std::fs::write(&stub, script).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    stub
}

#[cfg(unix)]
#[tokio::test]
async fn prefix_walk_stops_after_five_probes() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("invocations.log");
    let stub = write_stub_toolchain(dir.path(), &log);

    let workdir = dir.path().join("scratch");
    std::fs::create_dir_all(&workdir).unwrap();

    let toolchain = Toolchain::new(
        stub.to_string_lossy().into_owned(),
        &workdir,
        CancellationToken::new(),
    );
    let resolver = Resolver::new(&toolchain);

    // Deep path: more droppable segments than the walk allows, and not
    // eligible for entry-point discovery.
    let input = "example.com/a/b/c/d/e/f/g";
    let result = resolver.resolve(input, &|_: &str, _: &str| {}).await;
    assert!(matches!(result, Err(Error::Unresolvable(_))));

    let logged = std::fs::read_to_string(&log).unwrap();
    let probes = logged
        .lines()
        .filter(|line| line.starts_with("list -m -versions"))
        .count();
    assert_eq!(probes, 5, "prefix walk must stop after 5 probe attempts:\n{}", logged);
}

#[cfg(unix)]
#[tokio::test]
async fn shallow_unresolvable_path_attempts_discovery() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("invocations.log");
    let stub = write_stub_toolchain(dir.path(), &log);

    let workdir = dir.path().join("scratch");
    std::fs::create_dir_all(&workdir).unwrap();

    let toolchain = Toolchain::new(
        stub.to_string_lossy().into_owned(),
        &workdir,
        CancellationToken::new(),
    );
    let resolver = Resolver::new(&toolchain);

    // Two slashes: repository-root shaped, so discovery should be tried
    // after the walk fails.
    let result = resolver
        .resolve("example.com/owner/tool", &|_: &str, _: &str| {})
        .await;
    assert!(matches!(result, Err(Error::Unresolvable(_))));

    let logged = std::fs::read_to_string(&log).unwrap();
    assert!(
        logged.lines().any(|line| line.contains("/cmd/...")),
        "discovery should probe the cmd subtree:\n{}",
        logged
    );
    assert!(
        logged.lines().any(|line| line.contains("/cli/...")),
        "discovery should probe the cli subtree:\n{}",
        logged
    );
}
