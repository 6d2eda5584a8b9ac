//! Tool schemas advertised by `tools/list`.

use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

fn schema(name: &'static str, description: &'static str, properties: Value, required: &[&str]) -> ToolSchema {
    ToolSchema {
        name,
        description,
        input_schema: json!({
            "type": "object",
            "properties": properties,
            "required": required,
        }),
    }
}

/// Tools exposed on the global `/mcp` endpoint.
#[must_use]
pub fn global_tools() -> Vec<ToolSchema> {
    vec![
        schema("list_knowledge_bases", "List every knowledge base.", json!({}), &[]),
        schema(
            "list_knowledge_bases_by_type",
            "List knowledge bases of one kb_type.",
            json!({ "kb_type": { "type": "string" } }),
            &["kb_type"],
        ),
        schema(
            "create_knowledge_base",
            "Create a new knowledge base.",
            json!({
                "name": { "type": "string" },
                "kb_type": { "type": "string" },
                "description": { "type": "string" },
            }),
            &["name"],
        ),
        schema(
            "get_kb_stats",
            "Return document/chunk counts for a knowledge base.",
            json!({ "kb_name": { "type": "string" } }),
            &["kb_name"],
        ),
        schema(
            "list_documents",
            "List the documents ingested into a knowledge base.",
            json!({ "kb_name": { "type": "string" } }),
            &["kb_name"],
        ),
        search_tool_schema("search_knowledge_base", true),
    ]
}

/// Tools exposed on the per-KB `/mcp/kb/{slug}` endpoint.
/// The KB is resolved from the URL; these tools never take a `kb_name` arg.
#[must_use]
pub fn per_kb_tools() -> Vec<ToolSchema> {
    vec![
        search_tool_schema("search", false),
        schema("get_stats", "Return document/chunk counts for this knowledge base.", json!({}), &[]),
        schema("list_documents", "List the documents ingested into this knowledge base.", json!({}), &[]),
    ]
}

fn search_tool_schema(name: &'static str, global: bool) -> ToolSchema {
    let mut properties = json!({
        "query": { "type": "string" },
        "top_k": { "type": "integer" },
        "use_hybrid": { "type": "boolean" },
        "use_rerank": { "type": "boolean" },
        "use_agentic": { "type": "boolean" },
    });
    let mut required = vec!["query"];
    if global {
        properties["kb_name"] = json!({ "type": "string" });
        required.insert(0, "kb_name");
    }
    schema(name, "Search a knowledge base and synthesize a grounded answer.", properties, &required)
}
