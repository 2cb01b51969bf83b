// src/api.rs

//! Wire and record schemas for the glix RPC surface
//!
//! These types travel in two places: as JSON bodies on the localhost RPC
//! boundary and as serialized values inside the metadata store. Field names
//! are part of the contract and must stay stable.

use serde::{Deserialize, Serialize};

/// An installed module: the unit stored, listed, and updated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Canonical module path
    pub name: String,
    /// Installed version
    pub version: String,
    /// Known versions, newest first
    #[serde(default)]
    pub versions: Vec<String>,
    /// Top-level dependencies captured at install time
    #[serde(default)]
    pub dependencies: Vec<DependencyRecord>,
    /// Hex SHA-256 of `<name>@<version>`
    #[serde(default)]
    pub hash: String,
    /// Install time, nanoseconds since the Unix epoch
    #[serde(default)]
    pub timestamp_unix_nano: i64,
}

/// A dependency of a module; may nest recursively (tree-shaped)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default)]
    pub hash: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyRecord>,
}

/// The separately-stored dependency list of a module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependenciesRecord {
    #[serde(default)]
    pub dependencies: Vec<DependencyRecord>,
}

// =============================================================================
// Request / response pairs (one per service method)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreModuleRequest {
    pub module: ModuleRecord,
    #[serde(default)]
    pub dependencies: DependenciesRecord,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreModuleResponse {
    pub success: bool,
    #[serde(default)]
    pub error_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveRequest {
    pub module_path: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoveResponse {
    pub success: bool,
    #[serde(default)]
    pub error_message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListModulesRequest {
    /// Maximum number of records to return; 0 means unlimited
    #[serde(default)]
    pub limit: i32,
    #[serde(default)]
    pub offset: i32,
    /// Case-insensitive (ASCII) substring filter on the name
    #[serde(default)]
    pub name_filter: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListModulesResponse {
    #[serde(default)]
    pub modules: Vec<ModuleRecord>,
    /// Count after filtering, before pagination
    #[serde(default)]
    pub total_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetModuleRequest {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetModuleResponse {
    #[serde(default)]
    pub module: Option<ModuleRecord>,
    pub found: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetDependenciesResponse {
    #[serde(default)]
    pub dependencies: Option<DependenciesRecord>,
    pub found: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerStatus {
    pub running: bool,
    pub namespace: String,
    pub database_path: String,
    pub address: String,
    pub uptime_seconds: i64,
    pub module_count: i64,
}

/// Empty message, used by `Ping`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Empty {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_field_names_are_stable() {
        let record = ModuleRecord {
            name: "example.com/owner/tool".to_string(),
            version: "v1.2.3".to_string(),
            versions: vec!["v1.2.3".to_string(), "v1.0.0".to_string()],
            dependencies: vec![DependencyRecord {
                name: "example.com/dep".to_string(),
                version: "v0.5.0".to_string(),
                ..Default::default()
            }],
            hash: "abc123".to_string(),
            timestamp_unix_nano: 1_700_000_000_000_000_000,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["name"], "example.com/owner/tool");
        assert_eq!(json["timestamp_unix_nano"], 1_700_000_000_000_000_000i64);
        assert_eq!(json["dependencies"][0]["name"], "example.com/dep");
    }

    #[test]
    fn test_missing_fields_default() {
        let record: ModuleRecord =
            serde_json::from_str(r#"{"name":"a/b","version":"v1.0.0"}"#).unwrap();
        assert!(record.versions.is_empty());
        assert!(record.dependencies.is_empty());
        assert_eq!(record.timestamp_unix_nano, 0);
    }

    #[test]
    fn test_nested_dependencies_round_trip() {
        let dep = DependencyRecord {
            name: "a/b".to_string(),
            version: "v1.0.0".to_string(),
            dependencies: vec![DependencyRecord {
                name: "c/d".to_string(),
                version: "v2.0.0".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let json = serde_json::to_string(&dep).unwrap();
        let parsed: DependencyRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, dep);
    }
}
