//! Documentation search tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::collaborators::DocSearch;
use crate::error::Result;
use crate::tool::{DocSearchParams, Tool, ToolContext, ToolResult};

/// Tool that keyword-searches the AWS documentation.
#[derive(Clone)]
pub struct SearchDocsTool {
    docs: Arc<dyn DocSearch>,
}

impl SearchDocsTool {
    pub fn new(docs: Arc<dyn DocSearch>) -> Self {
        Self { docs }
    }
}

#[async_trait]
impl Tool for SearchDocsTool {
    fn name(&self) -> &str {
        "search_aws_docs"
    }

    fn description(&self) -> &str {
        "Search the AWS documentation. Returns the top matching pages with a link and short summary."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Keywords to search for"
                },
                "limit": {
                    "type": "integer",
                    "description": "Number of results (default 5, max 10)",
                    "default": 5
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        if ctx.is_cancelled() {
            return Ok(ToolResult::error("Operation cancelled"));
        }

        let params = match DocSearchParams::try_from(params) {
            Ok(p) => p,
            Err(e) => return Ok(e.into()),
        };

        let hits = self.docs.search(&params.query, params.limit).await?;
        if hits.is_empty() {
            return Ok(ToolResult::text(format!(
                "No documentation found for '{}'",
                params.query
            )));
        }

        let output = hits
            .iter()
            .take(params.limit)
            .enumerate()
            .map(|(i, hit)| {
                if hit.summary.is_empty() {
                    format!("{}. {}\n   {}", i + 1, hit.title, hit.url)
                } else {
                    format!("{}. {}\n   {}\n   {}", i + 1, hit.title, hit.url, hit.summary)
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(ToolResult::text(output))
    }
}
