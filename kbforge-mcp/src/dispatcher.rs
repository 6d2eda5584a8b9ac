//! Dispatches JSON-RPC `tools/call` requests to the global or per-KB tool
//! set.

use kbforge_config::RetrievalConfig;
use kbforge_core::error::KbError;
use kbforge_core::types::{KbType, KnowledgeBase, QueryResult};
use kbforge_storage::SqlitePool;
use kbforge_tenancy::{EngineCache, EngineDeps, KbEngine, KbRegistry, SearchOverrides};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::args::{opt_bool, opt_usize, require_str};
use crate::protocol::{JsonRpcRequest, JsonRpcResponse, INVALID_PARAMS, METHOD_NOT_FOUND};
use crate::tools::{global_tools, per_kb_tools};

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

pub struct Dispatcher {
    registry: Arc<KbRegistry>,
    cache: Arc<EngineCache<KbEngine>>,
    pool: SqlitePool,
    deps: EngineDeps,
    retrieval_config: RetrievalConfig,
    default_embed_dim: usize,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        registry: Arc<KbRegistry>,
        cache: Arc<EngineCache<KbEngine>>,
        pool: SqlitePool,
        deps: EngineDeps,
        retrieval_config: RetrievalConfig,
        default_embed_dim: usize,
    ) -> Self {
        Self {
            registry,
            cache,
            pool,
            deps,
            retrieval_config,
            default_embed_dim,
        }
    }

    /// Handles a request against the global `/mcp` endpoint.
    #[tracing::instrument(skip(self, req), fields(method = %req.method))]
    pub async fn handle_global(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        let id = req.id.clone();
        match req.method.as_str() {
            "initialize" => JsonRpcResponse::ok(id, initialize_result()),
            "tools/list" => JsonRpcResponse::ok(id, json!({ "tools": global_tools() })),
            "tools/call" => self.dispatch_global_call(id, req.params).await,
            other => JsonRpcResponse::err(id, METHOD_NOT_FOUND, format!("unknown method '{other}'")),
        }
    }

    /// Handles a request against the per-KB `/mcp/kb/{slug}` endpoint.
    /// Returns [`KbError::NotFound`] (mapped to HTTP 404 by the caller) if
    /// `slug` names no knowledge base.
    #[tracing::instrument(skip(self, req), fields(kb = %slug, method = %req.method))]
    pub async fn handle_for_kb(&self, slug: &str, req: JsonRpcRequest) -> Result<JsonRpcResponse, KbError> {
        let id = req.id.clone();
        let response = match req.method.as_str() {
            "initialize" => JsonRpcResponse::ok(id, initialize_result()),
            "tools/list" => JsonRpcResponse::ok(id, json!({ "tools": per_kb_tools() })),
            "tools/call" => {
                let kb = self.registry.get_by_slug(slug).await?;
                self.dispatch_kb_call(id, kb, req.params).await
            }
            other => JsonRpcResponse::err(id, METHOD_NOT_FOUND, format!("unknown method '{other}'")),
        };
        Ok(response)
    }

    async fn dispatch_global_call(&self, id: Value, params: Value) -> JsonRpcResponse {
        let call: ToolCallParams = match serde_json::from_value(params) {
            Ok(c) => c,
            Err(e) => return JsonRpcResponse::err(id, INVALID_PARAMS, format!("malformed tools/call params: {e}")),
        };

        let result = match call.name.as_str() {
            "list_knowledge_bases" => self.list_knowledge_bases(None).await,
            "list_knowledge_bases_by_type" => self.list_knowledge_bases_by_type(&call.arguments).await,
            "create_knowledge_base" => self.create_knowledge_base(&call.arguments).await,
            "get_kb_stats" => self.get_kb_stats(&call.arguments).await,
            "list_documents" => self.list_documents(&call.arguments).await,
            "search_knowledge_base" => self.search_knowledge_base(&call.arguments).await,
            other => return JsonRpcResponse::err(id, METHOD_NOT_FOUND, format!("unknown tool '{other}'")),
        };

        Self::to_response(id, result)
    }

    async fn dispatch_kb_call(&self, id: Value, kb: KnowledgeBase, params: Value) -> JsonRpcResponse {
        let call: ToolCallParams = match serde_json::from_value(params) {
            Ok(c) => c,
            Err(e) => return JsonRpcResponse::err(id, INVALID_PARAMS, format!("malformed tools/call params: {e}")),
        };

        let result = match call.name.as_str() {
            "search" => self.run_search(&kb, &call.arguments).await.map(|r| serde_json::to_value(r).unwrap_or(Value::Null)),
            "get_stats" => self.stats_for(&kb).await,
            "list_documents" => self.documents_for(&kb).await,
            other => return JsonRpcResponse::err(id, METHOD_NOT_FOUND, format!("unknown tool '{other}'")),
        };

        Self::to_response(id, result)
    }

    fn to_response(id: Value, result: Result<Value, KbError>) -> JsonRpcResponse {
        match result {
            Ok(value) => JsonRpcResponse::ok(id, value),
            Err(e) => {
                let code = e.jsonrpc_code();
                // Internal/storage failures may carry file paths or driver
                // internals; everything else (bad input, provider outages)
                // is safe to echo back verbatim.
                let message = match e {
                    KbError::Internal { .. } | KbError::StorageError { .. } => {
                        tracing::error!(error = %e, "internal error handling tools/call");
                        "internal error".to_string()
                    }
                    other => other.to_string(),
                };
                JsonRpcResponse::err(id, code, message)
            }
        }
    }

    async fn list_knowledge_bases(&self, kb_type: Option<KbType>) -> Result<Value, KbError> {
        let kbs = self.registry.list(kb_type).await?;
        Ok(serde_json::to_value(kbs).unwrap_or(Value::Null))
    }

    async fn list_knowledge_bases_by_type(&self, args: &Value) -> Result<Value, KbError> {
        let kb_type: KbType = require_str(args, "kb_type")?.parse()?;
        self.list_knowledge_bases(Some(kb_type)).await
    }

    async fn create_knowledge_base(&self, args: &Value) -> Result<Value, KbError> {
        let name = require_str(args, "name")?;
        let kb_type = match crate::args::opt_str(args, "kb_type") {
            Some(s) => s.parse()?,
            None => KbType::default(),
        };
        let description = crate::args::opt_str(args, "description");
        let kb = self
            .registry
            .create(&name, kb_type, description, std::collections::HashMap::new(), self.default_embed_dim)
            .await?;
        Ok(serde_json::to_value(kb).unwrap_or(Value::Null))
    }

    async fn get_kb_stats(&self, args: &Value) -> Result<Value, KbError> {
        let kb = self.registry.get_by_name(&require_str(args, "kb_name")?).await?;
        self.stats_for(&kb).await
    }

    async fn stats_for(&self, kb: &KnowledgeBase) -> Result<Value, KbError> {
        let engine = self.engine_for(kb).await?;
        let stats = engine.store.stats().await?;
        Ok(serde_json::to_value(stats).unwrap_or(Value::Null))
    }

    async fn list_documents(&self, args: &Value) -> Result<Value, KbError> {
        let kb = self.registry.get_by_name(&require_str(args, "kb_name")?).await?;
        self.documents_for(&kb).await
    }

    async fn documents_for(&self, kb: &KnowledgeBase) -> Result<Value, KbError> {
        let engine = self.engine_for(kb).await?;
        let docs = engine.store.list_documents().await?;
        Ok(serde_json::to_value(docs).unwrap_or(Value::Null))
    }

    async fn search_knowledge_base(&self, args: &Value) -> Result<Value, KbError> {
        let kb = self.registry.get_by_name(&require_str(args, "kb_name")?).await?;
        let result = self.run_search(&kb, args).await?;
        Ok(serde_json::to_value(result).unwrap_or(Value::Null))
    }

    async fn run_search(&self, kb: &KnowledgeBase, args: &Value) -> Result<QueryResult, KbError> {
        let query = require_str(args, "query")?;
        let engine = self.engine_for(kb).await?;
        let overrides = SearchOverrides {
            top_k: opt_usize(args, "top_k"),
            use_hybrid: opt_bool(args, "use_hybrid"),
            use_rerank: opt_bool(args, "use_rerank"),
            use_agentic: opt_bool(args, "use_agentic"),
        };
        engine.answer(&query, &overrides).await
    }

    async fn engine_for(&self, kb: &KnowledgeBase) -> Result<Arc<KbEngine>, KbError> {
        let pool = self.pool.clone();
        let kb_owned = kb.clone();
        let deps = self.deps.clone();
        let retrieval = self.retrieval_config.for_kb_type(kb.kb_type);
        self.cache
            .get_or_construct(&kb.slug, move || KbEngine::build(pool, kb_owned, deps, retrieval))
            .await
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "serverInfo": { "name": "kbforge", "version": env!("CARGO_PKG_VERSION") },
    })
}
