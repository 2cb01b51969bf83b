// src/build/binary.rs

//! Locating and placing built binaries
//!
//! The release builder writes artifacts under `dist/` with platform-tagged
//! names. Matching uses the ecosystem's OS/arch naming, so the host triple
//! is mapped (`x86_64` -> `amd64`, `aarch64` -> `arm64`).

use crate::error::{Error, Result};
use glob::Pattern;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extensions that are never binaries (checksums, archives, docs)
const SKIP_EXTENSIONS: &[&str] = &["txt", "md", "tar", "gz", "zip"];

/// Host OS in the ecosystem's naming
pub fn go_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// Host architecture in the ecosystem's naming
pub fn go_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}

/// The binary file name for a command, with `.exe` appended on Windows
pub fn binary_name(base: &str) -> String {
    if cfg!(windows) && !base.ends_with(".exe") {
        format!("{}.exe", base)
    } else {
        base.to_string()
    }
}

/// Find the built binary for the host platform under `dist_dir`.
///
/// Matches `*_<os>_<arch>*` file names first; on Windows any `.exe` is also
/// accepted, on Unix any executable file with no extension.
pub fn find_built_binary(dist_dir: &Path) -> Result<PathBuf> {
    let patterns: Vec<Pattern> = [
        format!("*_{}_{}*", go_os(), go_arch()),
        format!("*_{}_{}_*", go_os(), go_arch()),
    ]
    .iter()
    .filter_map(|p| Pattern::new(p).ok())
    .collect();

    for entry in WalkDir::new(dist_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();

        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase());
        if let Some(ext) = &extension {
            if SKIP_EXTENSIONS.contains(&ext.as_str()) {
                continue;
            }
        }

        let file_name = entry.file_name().to_string_lossy();
        if patterns.iter().any(|p| p.matches(&file_name)) {
            return Ok(path.to_path_buf());
        }

        if cfg!(windows) && extension.as_deref() == Some("exe") {
            return Ok(path.to_path_buf());
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if extension.is_none() {
                if let Ok(metadata) = entry.metadata() {
                    if metadata.permissions().mode() & 0o111 != 0 {
                        return Ok(path.to_path_buf());
                    }
                }
            }
        }
    }

    Err(Error::BuildFailed {
        message: format!(
            "no binary found for {}/{} in {}",
            go_os(),
            go_arch(),
            dist_dir.display()
        ),
        stderr: String::new(),
    })
}

/// Copy `src` into `bin_dir` as `<base>[.exe]`, executable on Unix
pub fn place_binary(src: &Path, bin_dir: &Path, base: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(bin_dir)?;

    let dest = bin_dir.join(binary_name(base));
    std::fs::copy(src, &dest)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(0o755))?;
    }

    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn make_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_arch_mapping() {
        // The mapping covers the host this test runs on.
        assert!(!go_os().is_empty());
        assert!(!go_arch().is_empty());
        assert_ne!(go_arch(), "x86_64");
        assert_ne!(go_os(), "macos");
    }

    #[test]
    fn test_find_platform_tagged_binary() {
        let dist = tempfile::tempdir().unwrap();
        std::fs::write(dist.path().join("checksums.txt"), "sums").unwrap();
        std::fs::write(dist.path().join("tool.tar.gz"), "archive").unwrap();

        let name = format!("tool_{}_{}", go_os(), go_arch());
        let binary_path = dist.path().join(&name);
        std::fs::write(&binary_path, "elf").unwrap();

        let found = find_built_binary(dist.path()).unwrap();
        assert_eq!(found, binary_path);
    }

    #[cfg(unix)]
    #[test]
    fn test_find_binary_in_nested_platform_dir() {
        let dist = tempfile::tempdir().unwrap();
        let nested = dist
            .path()
            .join(format!("tool_{}_{}_v1", go_os(), go_arch()));
        std::fs::create_dir_all(&nested).unwrap();

        let binary_path = nested.join("tool");
        std::fs::write(&binary_path, "elf").unwrap();
        #[cfg(unix)]
        make_executable(&binary_path);

        let found = find_built_binary(dist.path()).unwrap();
        assert_eq!(found, binary_path);
    }

    #[test]
    fn test_no_binary_is_build_failed() {
        let dist = tempfile::tempdir().unwrap();
        std::fs::write(dist.path().join("README.md"), "docs").unwrap();
        assert!(matches!(
            find_built_binary(dist.path()),
            Err(Error::BuildFailed { .. })
        ));
    }

    #[test]
    fn test_place_binary() {
        let src_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("built");
        std::fs::write(&src, "elf").unwrap();

        let bin_dir = tempfile::tempdir().unwrap();
        let dest = place_binary(&src, bin_dir.path(), "tool").unwrap();

        assert!(dest.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"elf");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&dest).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }
}
