// tests/server_test.rs

//! End-to-end tests of the RPC surface: a real service bound to an
//! ephemeral port, exercised through the typed client.

use glix::store::next_timestamp_nanos;
use glix::{
    AppDirs, Client, DependenciesRecord, DependencyRecord, ModuleRecord, Server, ServerConfig,
};
use std::time::Duration;
use tempfile::TempDir;

struct TestService {
    _data_dir: TempDir,
    base_url: String,
    cancel: tokio_util::sync::CancellationToken,
    handle: tokio::task::JoinHandle<glix::Result<()>>,
}

impl TestService {
    async fn start() -> Self {
        let data_dir = tempfile::tempdir().unwrap();
        let dirs = AppDirs::for_data_dir(data_dir.path());

        let config = ServerConfig::new(&dirs)
            .with_bind_address("127.0.0.1")
            .with_port(0);

        let server = Server::bind(config, &dirs).await.unwrap();
        let addr = server.local_addr().unwrap();
        let cancel = server.cancel_token();

        let handle = tokio::spawn(server.serve());

        Self {
            _data_dir: data_dir,
            base_url: format!("http://127.0.0.1:{}", addr.port()),
            cancel,
            handle,
        }
    }

    async fn client(&self) -> Client {
        // The listener is already bound, so one connect attempt suffices.
        Client::connect(&self.base_url, Duration::from_secs(2))
            .await
            .expect("service should be reachable")
    }

    async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

fn record(name: &str, version: &str) -> ModuleRecord {
    ModuleRecord {
        name: name.to_string(),
        version: version.to_string(),
        versions: vec![version.to_string()],
        hash: glix::hash::sha256_hex(&format!("{}@{}", name, version)),
        timestamp_unix_nano: next_timestamp_nanos(),
        ..Default::default()
    }
}

fn deps(names: &[&str]) -> DependenciesRecord {
    DependenciesRecord {
        dependencies: names
            .iter()
            .map(|name| DependencyRecord {
                name: name.to_string(),
                version: "v1.0.0".to_string(),
                ..Default::default()
            })
            .collect(),
    }
}

#[tokio::test]
async fn ping_and_status() {
    let service = TestService::start().await;
    let client = service.client().await;

    client.ping().await.unwrap();

    let status = client.get_status().await.unwrap();
    assert!(status.running);
    assert!(!status.namespace.is_empty());
    assert_eq!(status.module_count, 0);
    assert!(status.database_path.ends_with("glix.db"));

    service.stop().await;
}

#[tokio::test]
async fn store_get_list_remove_cycle() {
    let service = TestService::start().await;
    let client = service.client().await;

    let module = record("github.com/test/tool", "v1.0.0");
    client
        .store_module(&module, &deps(&["github.com/dep/a"]))
        .await
        .unwrap();

    let fetched = client.get_module(&module.name, "").await.unwrap();
    assert!(fetched.found);
    assert_eq!(fetched.module.unwrap().version, "v1.0.0");

    // Version-qualified lookups only match the stored version.
    let mismatch = client.get_module(&module.name, "v9.9.9").await.unwrap();
    assert!(!mismatch.found);

    let dependencies = client.get_dependencies(&module.name, "").await.unwrap();
    assert!(dependencies.found);
    assert_eq!(dependencies.dependencies.unwrap().dependencies.len(), 1);

    let listed = client.list_modules(0, 0, "").await.unwrap();
    assert_eq!(listed.total_count, 1);
    assert_eq!(listed.modules.len(), 1);

    let removed = client.remove(&module.name, "").await.unwrap();
    assert!(removed.success);

    let after = client.get_module(&module.name, "").await.unwrap();
    assert!(!after.found);
    let deps_after = client.get_dependencies(&module.name, "").await.unwrap();
    assert!(!deps_after.found);

    service.stop().await;
}

#[tokio::test]
async fn latest_wins_over_rpc() {
    let service = TestService::start().await;
    let client = service.client().await;

    client
        .store_module(&record("github.com/test/tool", "v1.0.0"), &deps(&[]))
        .await
        .unwrap();
    client
        .store_module(&record("github.com/test/tool", "v1.1.0"), &deps(&[]))
        .await
        .unwrap();

    let status = client.get_status().await.unwrap();
    assert_eq!(status.module_count, 1);

    let listed = client.list_modules(0, 0, "").await.unwrap();
    assert_eq!(listed.total_count, 1);
    assert_eq!(listed.modules[0].version, "v1.1.0");

    service.stop().await;
}

#[tokio::test]
async fn list_filter_and_pagination() {
    let service = TestService::start().await;
    let client = service.client().await;

    for name in [
        "github.com/alpha/one",
        "github.com/Alpha/two",
        "github.com/beta/three",
        "gitlab.com/alpha/four",
    ] {
        client
            .store_module(&record(name, "v1.0.0"), &deps(&[]))
            .await
            .unwrap();
    }

    // Case-insensitive substring filter; total reflects the filtered count.
    let filtered = client.list_modules(0, 0, "ALPHA").await.unwrap();
    assert_eq!(filtered.total_count, 3);

    // Pagination applies after filtering; newest first.
    let page = client.list_modules(2, 0, "alpha").await.unwrap();
    assert_eq!(page.total_count, 3);
    assert_eq!(page.modules.len(), 2);
    assert_eq!(page.modules[0].name, "gitlab.com/alpha/four");

    let next_page = client.list_modules(2, 2, "alpha").await.unwrap();
    assert_eq!(next_page.modules.len(), 1);
    assert_eq!(next_page.modules[0].name, "github.com/alpha/one");

    // Offset past the end yields an empty page, not an error.
    let empty = client.list_modules(2, 10, "alpha").await.unwrap();
    assert!(empty.modules.is_empty());
    assert_eq!(empty.total_count, 3);

    service.stop().await;
}

#[tokio::test]
async fn remove_missing_module_reports_failure() {
    let service = TestService::start().await;
    let client = service.client().await;

    let response = client.remove("github.com/absent/tool", "").await.unwrap();
    assert!(!response.success);
    assert!(response.error_message.contains("not found"));

    service.stop().await;
}

#[tokio::test]
async fn server_side_timestamp_stamping() {
    let service = TestService::start().await;
    let client = service.client().await;

    // A record arriving without a timestamp gets one at the upsert site.
    let mut module = record("github.com/test/tool", "v1.0.0");
    module.timestamp_unix_nano = 0;
    client.store_module(&module, &deps(&[])).await.unwrap();

    let fetched = client.get_module(&module.name, "").await.unwrap();
    assert!(fetched.module.unwrap().timestamp_unix_nano > 0);

    service.stop().await;
}

#[tokio::test]
async fn graceful_stop_is_idempotent() {
    let service = TestService::start().await;
    let client = service.client().await;
    client.ping().await.unwrap();

    // Cancelling twice must not wedge the shutdown.
    service.cancel.cancel();
    service.cancel.cancel();
    let result = service.handle.await.unwrap();
    assert!(result.is_ok());

    // The listener is gone afterwards.
    assert!(Client::connect(&service.base_url, Duration::from_millis(300))
        .await
        .is_err());
}
