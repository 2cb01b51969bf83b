// src/hash.rs

//! SHA-256 helpers for module identity
//!
//! Two encodings are used: the hex digest of `<module>@<version>` stored on
//! every record, and the raw 32-byte digest of the module name that keys the
//! modules bucket (one entry per module regardless of version).

use sha2::{Digest, Sha256};

/// Compute the SHA-256 of `data` as a lowercase hex string
pub fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Raw 32-byte SHA-256 of a module name, used as the modules-bucket key
pub fn module_key(name: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_value() {
        assert_eq!(
            sha256_hex("hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_module_key_is_raw_digest() {
        let key = module_key("example.com/owner/tool");
        assert_eq!(key.len(), 32);
        // The hex rendering of the raw key matches the hex digest.
        let hex: String = key.iter().map(|b| format!("{:02x}", b)).collect();
        assert_eq!(hex, sha256_hex("example.com/owner/tool"));
    }

    #[test]
    fn test_distinct_names_distinct_keys() {
        assert_ne!(module_key("a/b"), module_key("a/c"));
    }
}
