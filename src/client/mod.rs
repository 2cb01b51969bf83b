// src/client/mod.rs

//! RPC client for the glix service

pub mod discovery;
mod proc;

pub use discovery::{get_client, is_server_running};

use crate::api::*;
use crate::error::{Error, Result};
use crate::install::ModuleSink;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Typed client over the localhost RPC surface
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    /// Connect to the service at `base_url` (e.g. `http://localhost:9742`),
    /// verifying liveness with a `Ping` bounded by `dial_timeout`.
    pub async fn connect(base_url: &str, dial_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(dial_timeout)
            .build()?;

        let client = Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        };
        client.ping_with_timeout(dial_timeout).await?;
        Ok(client)
    }

    pub fn address(&self) -> &str {
        &self.base_url
    }

    async fn call<Req, Resp>(
        &self,
        method: &str,
        request: &Req,
        timeout: Option<Duration>,
    ) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/glix.v1.GlixService/{}", self.base_url, method);
        let mut builder = self.http.post(&url).json(request);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| Error::Transient(format!("{} call failed: {}", method, err)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Internal(format!(
                "{} returned status {}",
                method, status
            )));
        }

        Ok(response.json().await?)
    }

    /// Liveness check
    pub async fn ping(&self) -> Result<()> {
        let _: Empty = self.call("Ping", &Empty {}, None).await?;
        Ok(())
    }

    /// Liveness check with an explicit budget
    pub async fn ping_with_timeout(&self, timeout: Duration) -> Result<()> {
        let _: Empty = self.call("Ping", &Empty {}, Some(timeout)).await?;
        Ok(())
    }

    pub async fn get_status(&self) -> Result<ServerStatus> {
        self.call("GetStatus", &Empty {}, None).await
    }

    /// Upsert a module record along with its dependencies record
    pub async fn store_module(
        &self,
        module: &ModuleRecord,
        dependencies: &DependenciesRecord,
    ) -> Result<()> {
        let response: StoreModuleResponse = self
            .call(
                "StoreModule",
                &StoreModuleRequest {
                    module: module.clone(),
                    dependencies: dependencies.clone(),
                },
                None,
            )
            .await?;

        if response.success {
            Ok(())
        } else {
            Err(Error::Internal(format!(
                "failed to store module: {}",
                response.error_message
            )))
        }
    }

    pub async fn remove(&self, module_path: &str, version: &str) -> Result<RemoveResponse> {
        self.call(
            "Remove",
            &RemoveRequest {
                module_path: module_path.to_string(),
                version: version.to_string(),
            },
            None,
        )
        .await
    }

    pub async fn list_modules(
        &self,
        limit: i32,
        offset: i32,
        name_filter: &str,
    ) -> Result<ListModulesResponse> {
        self.call(
            "ListModules",
            &ListModulesRequest {
                limit,
                offset,
                name_filter: name_filter.to_string(),
            },
            None,
        )
        .await
    }

    pub async fn get_module(&self, name: &str, version: &str) -> Result<GetModuleResponse> {
        self.call(
            "GetModule",
            &GetModuleRequest {
                name: name.to_string(),
                version: version.to_string(),
            },
            None,
        )
        .await
    }

    pub async fn get_dependencies(
        &self,
        name: &str,
        version: &str,
    ) -> Result<GetDependenciesResponse> {
        self.call(
            "GetDependencies",
            &GetModuleRequest {
                name: name.to_string(),
                version: version.to_string(),
            },
            None,
        )
        .await
    }
}

#[async_trait]
impl ModuleSink for Client {
    async fn store_module(
        &self,
        module: &ModuleRecord,
        dependencies: &DependenciesRecord,
    ) -> crate::Result<()> {
        Client::store_module(self, module, dependencies).await
    }
}
