// src/server/handlers.rs

//! RPC handlers for the GlixService surface
//!
//! One POST route per method, JSON bodies per the wire schema. Domain
//! failures travel inside the response (`success`/`error_message`, `found`
//! flags) rather than as transport errors, so clients always get a typed
//! reply. Store access runs on the blocking pool.

use super::{middleware, ServiceState};
use crate::api::*;
use crate::error::Error;
use crate::store;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;

type SharedState = Arc<ServiceState>;

/// Build the service router with the interceptor chain applied
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/glix.v1.GlixService/StoreModule", post(store_module))
        .route("/glix.v1.GlixService/Remove", post(remove))
        .route("/glix.v1.GlixService/ListModules", post(list_modules))
        .route("/glix.v1.GlixService/GetModule", post(get_module))
        .route("/glix.v1.GlixService/GetDependencies", post(get_dependencies))
        .route("/glix.v1.GlixService/GetStatus", post(get_status))
        .route("/glix.v1.GlixService/Ping", post(ping))
        .layer(middleware::panic_shield())
        .layer(axum::middleware::from_fn(middleware::logging))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::activity,
        ))
        .with_state(state)
}

async fn store_module(
    State(state): State<SharedState>,
    Json(request): Json<StoreModuleRequest>,
) -> Json<StoreModuleResponse> {
    let mut module = request.module;
    let dependencies = request.dependencies;

    tracing::info!(module = %module.name, version = %module.version, "store module request");

    if module.name.is_empty() {
        return Json(StoreModuleResponse {
            success: false,
            error_message: "module name is required".to_string(),
        });
    }
    if module.timestamp_unix_nano == 0 {
        module.timestamp_unix_nano = store::next_timestamp_nanos();
    }

    let storage = state.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        storage.upsert_module(&module)?;
        storage.upsert_dependencies(&module.name, &dependencies)
    })
    .await;

    Json(match flatten(result) {
        Ok(()) => StoreModuleResponse {
            success: true,
            error_message: String::new(),
        },
        Err(err) => StoreModuleResponse {
            success: false,
            error_message: format!("failed to store module: {}", err),
        },
    })
}

async fn remove(
    State(state): State<SharedState>,
    Json(request): Json<RemoveRequest>,
) -> Json<RemoveResponse> {
    tracing::info!(module = %request.module_path, version = %request.version, "remove request");

    let storage = state.store.clone();
    let name = request.module_path.clone();
    let version = request.version.clone();

    let result = tokio::task::spawn_blocking(move || {
        if version.is_empty() {
            // No version given: look the module up first so a missing record
            // reports as not found rather than as a delete failure.
            storage.get_module(&name)?;
        }
        storage.delete_module(&name)
    })
    .await;

    Json(match flatten(result) {
        Ok(()) => RemoveResponse {
            success: true,
            error_message: String::new(),
        },
        Err(Error::NotFound(_)) => RemoveResponse {
            success: false,
            error_message: format!("module not found: {}", request.module_path),
        },
        Err(err) => RemoveResponse {
            success: false,
            error_message: format!("failed to delete module: {}", err),
        },
    })
}

async fn list_modules(
    State(state): State<SharedState>,
    Json(request): Json<ListModulesRequest>,
) -> Json<ListModulesResponse> {
    tracing::debug!(
        limit = request.limit,
        offset = request.offset,
        filter = %request.name_filter,
        "list modules request"
    );

    let storage = state.store.clone();
    let modules = match flatten(tokio::task::spawn_blocking(move || storage.list_modules()).await) {
        Ok(modules) => modules,
        Err(err) => {
            tracing::error!(error = %err, "failed to list modules");
            return Json(ListModulesResponse::default());
        }
    };

    let filtered: Vec<ModuleRecord> = modules
        .into_iter()
        .filter(|m| {
            request.name_filter.is_empty()
                || contains_ignore_ascii_case(&m.name, &request.name_filter)
        })
        .collect();
    let total_count = filtered.len() as i64;

    let offset = request.offset.max(0) as usize;
    let mut page: Vec<ModuleRecord> = filtered.into_iter().skip(offset).collect();
    if request.limit > 0 {
        page.truncate(request.limit as usize);
    }

    Json(ListModulesResponse {
        modules: page,
        total_count,
    })
}

async fn get_module(
    State(state): State<SharedState>,
    Json(request): Json<GetModuleRequest>,
) -> Json<GetModuleResponse> {
    tracing::debug!(name = %request.name, version = %request.version, "get module request");

    let storage = state.store.clone();
    let name = request.name.clone();
    let result = flatten(tokio::task::spawn_blocking(move || storage.get_module(&name)).await);

    Json(match result {
        Ok(module) => {
            // Latest-wins storage holds one version; an explicit version
            // request only matches that one.
            if !request.version.is_empty() && module.version != request.version {
                GetModuleResponse {
                    module: None,
                    found: false,
                }
            } else {
                GetModuleResponse {
                    module: Some(module),
                    found: true,
                }
            }
        }
        Err(_) => GetModuleResponse {
            module: None,
            found: false,
        },
    })
}

async fn get_dependencies(
    State(state): State<SharedState>,
    Json(request): Json<GetModuleRequest>,
) -> Json<GetDependenciesResponse> {
    tracing::debug!(name = %request.name, "get dependencies request");

    let storage = state.store.clone();
    let name = request.name.clone();
    let result =
        flatten(tokio::task::spawn_blocking(move || storage.get_dependencies(&name)).await);

    Json(match result {
        Ok(dependencies) => GetDependenciesResponse {
            dependencies: Some(dependencies),
            found: true,
        },
        Err(_) => GetDependenciesResponse {
            dependencies: None,
            found: false,
        },
    })
}

async fn get_status(State(state): State<SharedState>) -> Json<ServerStatus> {
    let storage = state.store.clone();
    let module_count =
        flatten(tokio::task::spawn_blocking(move || storage.count_modules()).await).unwrap_or(0);

    Json(ServerStatus {
        running: state.is_running(),
        namespace: state.config.namespace.clone(),
        database_path: state.config.database_path.display().to_string(),
        address: state.address.clone(),
        uptime_seconds: state.uptime_seconds(),
        module_count,
    })
}

async fn ping() -> Json<Empty> {
    Json(Empty {})
}

/// Collapse a spawn_blocking result into the inner store result
fn flatten<T>(result: Result<crate::Result<T>, tokio::task::JoinError>) -> crate::Result<T> {
    match result {
        Ok(inner) => inner,
        Err(join) => Err(Error::Internal(format!("task join error: {}", join))),
    }
}

/// ASCII-bicase substring match; non-ASCII bytes compare equal-by-byte
fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() {
        return true;
    }
    if needle.len() > haystack.len() {
        return false;
    }
    haystack
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_ignore_ascii_case() {
        assert!(contains_ignore_ascii_case("github.com/Owner/Tool", "owner"));
        assert!(contains_ignore_ascii_case("github.com/owner/tool", "OWNER"));
        assert!(contains_ignore_ascii_case("abc", ""));
        assert!(!contains_ignore_ascii_case("abc", "abcd"));
        assert!(!contains_ignore_ascii_case("github.com/owner", "other"));
        // Non-ASCII bytes only match exactly.
        assert!(contains_ignore_ascii_case("módulo", "ódul"));
        assert!(!contains_ignore_ascii_case("módulo", "Ódul"));
    }
}
