//! RPC-facing operations: params in, provider calls, JSON out.

use crate::apis::provider::{ProviderClient, RepositoryProvider};
use crate::communication::rpc::{InvalidParams, RpcServer};
use crate::config::Config;
use crate::context::{build_context, DEFAULT_MAX_CONTEXT_CHARS};
use crate::models::{Credential, ProviderKind, RepositoryRef};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Package version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Deserialize)]
struct CallParams {
    provider: String,
    #[serde(default)]
    credential: Option<Credential>,
    #[serde(default)]
    repository: Option<RepositoryRef>,
    #[serde(default)]
    path: String,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    paths: Vec<String>,
    #[serde(default)]
    max_chars: Option<usize>,
}

impl CallParams {
    fn parse(params: Value) -> Result<Self> {
        serde_json::from_value(params).map_err(|e| InvalidParams(e.to_string()).into())
    }

    fn kind(&self) -> Result<ProviderKind> {
        self.provider
            .parse()
            .map_err(|e: String| InvalidParams(e).into())
    }

    fn repository(&self) -> Result<&RepositoryRef> {
        self.repository
            .as_ref()
            .ok_or_else(|| InvalidParams("Missing repository parameter".to_string()).into())
    }

    fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    fn query(&self) -> Result<&str> {
        self.query
            .as_deref()
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| InvalidParams("Missing query parameter".to_string()).into())
    }
}

/// Owns the runtime that drives provider calls for the synchronous RPC handlers.
pub struct Gateway {
    config: Config,
    runtime: Runtime,
}

impl Gateway {
    pub fn new(config: Config) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;
        Ok(Self { config, runtime })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Client for the requested provider, using the request's credential or the
    /// configured one.
    fn client(&self, params: &CallParams) -> Result<ProviderClient> {
        let kind = params.kind()?;
        let credential = params
            .credential
            .clone()
            .or_else(|| self.config.credential(kind))
            .ok_or_else(|| InvalidParams(format!("No credential configured for {}", kind)))?;
        let client = ProviderClient::new(kind, &credential, &self.config.client_options(kind))?;
        Ok(client)
    }

    pub fn test_connection(&self, params: Value) -> Result<Value> {
        let params = CallParams::parse(params)?;
        let client = self.client(&params)?;
        let outcome = self.runtime.block_on(client.verify_credentials());
        Ok(match outcome {
            Ok(()) => json!({ "connected": true }),
            Err(err) => json!({
                "connected": false,
                "reason": err.kind(),
                "message": err.to_string(),
            }),
        })
    }

    pub fn list_repositories(&self, params: Value) -> Result<Value> {
        let params = CallParams::parse(params)?;
        let client = self.client(&params)?;
        let repositories = self.runtime.block_on(client.list_repositories());
        Ok(json!({ "repositories": repositories }))
    }

    pub fn get_repository_info(&self, params: Value) -> Result<Value> {
        let params = CallParams::parse(params)?;
        let client = self.client(&params)?;
        let info = self
            .runtime
            .block_on(client.get_repository_info(params.repository()?))?;
        Ok(serde_json::to_value(info)?)
    }

    pub fn get_file_content(&self, params: Value) -> Result<Value> {
        let params = CallParams::parse(params)?;
        if params.path.trim_matches('/').is_empty() {
            return Err(InvalidParams("Missing path parameter".to_string()).into());
        }
        let client = self.client(&params)?;
        let file = self.runtime.block_on(client.get_file_content(
            params.repository()?,
            &params.path,
            params.branch(),
        ))?;
        Ok(serde_json::to_value(file)?)
    }

    pub fn get_directory_contents(&self, params: Value) -> Result<Value> {
        let params = CallParams::parse(params)?;
        let client = self.client(&params)?;
        let entries = self.runtime.block_on(client.get_directory_contents(
            params.repository()?,
            &params.path,
            params.branch(),
        ));
        Ok(json!({ "entries": entries }))
    }

    pub fn search_repository(&self, params: Value) -> Result<Value> {
        let params = CallParams::parse(params)?;
        let client = self.client(&params)?;
        let repo = params.repository()?;
        let query = params.query()?;
        let timeout = self.config.search_timeout();

        let hits = self.runtime.block_on(async {
            let cancel = CancellationToken::new();
            let deadline = timeout.map(|limit| {
                let token = cancel.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(limit).await;
                    debug!(?limit, "search deadline reached");
                    token.cancel();
                })
            });

            let hits = client
                .search_repository_cancellable(repo, query, params.branch(), &cancel)
                .await;

            if let Some(handle) = deadline {
                handle.abort();
            }
            hits
        });

        Ok(json!({ "hits": hits, "count": hits.len() }))
    }

    /// Fetch `paths` and render them as prompt context. Files that cannot be
    /// fetched or are not text are reported under `skipped`.
    pub fn build_context(&self, params: Value) -> Result<Value> {
        let params = CallParams::parse(params)?;
        if params.paths.is_empty() {
            return Err(InvalidParams("Missing paths parameter".to_string()).into());
        }
        let client = self.client(&params)?;
        let repo = params.repository()?;

        let results = self.runtime.block_on(futures::future::join_all(
            params
                .paths
                .iter()
                .map(|path| client.get_file_content(repo, path, params.branch())),
        ));

        let mut files = Vec::new();
        let mut skipped = Vec::new();
        for (path, result) in params.paths.iter().zip(results) {
            match result {
                Ok(file) if !file.is_text() => {
                    skipped.push(json!({ "path": path, "reason": "binary" }))
                }
                Ok(file) => files.push(file),
                Err(err) => skipped.push(json!({ "path": path, "reason": err.kind() })),
            }
        }

        let context = build_context(
            &files,
            params.max_chars.unwrap_or(DEFAULT_MAX_CONTEXT_CHARS),
        );
        Ok(json!({
            "context": context,
            "files": files.iter().map(|f| f.path.as_str()).collect::<Vec<_>>(),
            "skipped": skipped,
        }))
    }

    pub fn list_providers(&self) -> Value {
        let providers: Vec<Value> = ProviderKind::ALL
            .iter()
            .map(|kind| {
                json!({
                    "provider": kind.as_str(),
                    "base_url": self.config.client_options(*kind).base_url,
                    "default_ref": kind.default_ref(),
                    "configured": self.config.credential(*kind).is_some(),
                })
            })
            .collect();
        json!({ "providers": providers })
    }

    /// Register every repository method on `server`.
    pub fn register(self: Arc<Self>, server: &mut RpcServer) {
        let gateway = self.clone();
        server.register_method("test_connection", move |params| {
            gateway.test_connection(params)
        });

        let gateway = self.clone();
        server.register_method("list_repositories", move |params| {
            gateway.list_repositories(params)
        });

        let gateway = self.clone();
        server.register_method("get_repository_info", move |params| {
            gateway.get_repository_info(params)
        });

        let gateway = self.clone();
        server.register_method("get_file_content", move |params| {
            gateway.get_file_content(params)
        });

        let gateway = self.clone();
        server.register_method("get_directory_contents", move |params| {
            gateway.get_directory_contents(params)
        });

        let gateway = self.clone();
        server.register_method("search_repository", move |params| {
            gateway.search_repository(params)
        });

        let gateway = self.clone();
        server.register_method("build_context", move |params| {
            gateway.build_context(params)
        });

        let gateway = self;
        server.register_method("list_providers", move |_| Ok(gateway.list_providers()));

        // Expose the backend version to the host
        server.register_method("get_version", move |_| Ok(json!({ "version": VERSION })));

        info!(methods = server.method_names().len(), "registered repository methods");
    }
}
