//! Resource discovery tools.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{cluster_property, resource_properties};
use crate::collaborators::{Resource, ResourceQuery};
use crate::error::Result;
use crate::tool::{
    DEFAULT_MAX_OUTPUT_SIZE, ListResourceTypesParams, QueryResourcesParams, ResourceDetailParams,
    Tool, ToolContext, ToolResult,
};

/// Room left under the registry's output cap for the header and footer lines.
const QUERY_OUTPUT_HEADROOM: usize = 1024;

fn summarize(resource: &Resource) -> Value {
    let mut summary = json!({ "id": resource.id });
    if let Some(name) = &resource.name {
        summary["name"] = json!(name);
    }
    if let Some(arn) = &resource.arn {
        summary["arn"] = json!(arn);
    }
    if !resource.tags.is_empty() {
        summary["tags"] = json!(resource.tags);
    }
    summary
}

// ─────────────────────────────────────────────────────────────────────────────
// List Resource Types Tool
// ─────────────────────────────────────────────────────────────────────────────

/// Tool that lists the resource categories of a service.
#[derive(Clone)]
pub struct ListResourceTypesTool {
    resources: Arc<dyn ResourceQuery>,
}

impl ListResourceTypesTool {
    pub fn new(resources: Arc<dyn ResourceQuery>) -> Self {
        Self { resources }
    }
}

#[async_trait]
impl Tool for ListResourceTypesTool {
    fn name(&self) -> &str {
        "list_resource_types"
    }

    fn description(&self) -> &str {
        "List the resource types available for an AWS service. Use this to find the resource_type value the other tools expect."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "service": {
                    "type": "string",
                    "description": "AWS service key, e.g. \"ec2\", \"lambda\", \"ecs\""
                }
            },
            "required": ["service"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        if ctx.is_cancelled() {
            return Ok(ToolResult::error("Operation cancelled"));
        }

        let params = match ListResourceTypesParams::try_from(params) {
            Ok(p) => p,
            Err(e) => return Ok(e.into()),
        };

        let types = self.resources.resource_types(&params.service).await?;
        if types.is_empty() {
            return Ok(ToolResult::error(format!(
                "No resource types found for service '{}'",
                params.service
            )));
        }

        let mut out = format!("Resource types for {}:\n", params.service);
        for t in &types {
            out.push_str("- ");
            out.push_str(t);
            out.push('\n');
        }
        Ok(ToolResult::text(out))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Query Resources Tool
// ─────────────────────────────────────────────────────────────────────────────

/// Tool that lists resources of one type, filtered and paged.
///
/// Output is a summary line followed by one compact JSON object per
/// resource. Rows stop once the byte budget is spent, and the summary counts
/// only the rows actually listed, so the result never reaches the registry's
/// truncation.
#[derive(Clone)]
pub struct QueryResourcesTool {
    resources: Arc<dyn ResourceQuery>,
    max_output_bytes: usize,
}

impl QueryResourcesTool {
    pub fn new(resources: Arc<dyn ResourceQuery>) -> Self {
        Self {
            resources,
            max_output_bytes: DEFAULT_MAX_OUTPUT_SIZE - QUERY_OUTPUT_HEADROOM,
        }
    }

    /// Set the byte budget for listed rows.
    pub fn with_output_budget(mut self, max_output_bytes: usize) -> Self {
        self.max_output_bytes = max_output_bytes;
        self
    }
}

#[async_trait]
impl Tool for QueryResourcesTool {
    fn name(&self) -> &str {
        "query_resources"
    }

    fn description(&self) -> &str {
        "List resources of one type in a region. Returns id, name, ARN and tags for each. Filters are case-insensitive substring matches on id, name, arn, or a tag key."
    }

    fn parameters(&self) -> Value {
        let mut properties = resource_properties();
        properties.insert(
            "filters".to_string(),
            json!({
                "type": "object",
                "description": "Field to substring, e.g. {\"name\": \"prod\", \"team\": \"payments\"}. Keys other than id, name and arn match tag values.",
                "additionalProperties": { "type": "string" }
            }),
        );
        properties.insert(
            "limit".to_string(),
            json!({
                "type": "integer",
                "description": "Maximum resources to return (default 100, max 2000)",
                "default": 100
            }),
        );
        properties.insert(
            "offset".to_string(),
            json!({
                "type": "integer",
                "description": "Number of matching resources to skip",
                "default": 0
            }),
        );
        json!({
            "type": "object",
            "properties": properties,
            "required": ["service", "resource_type", "region"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        if ctx.is_cancelled() {
            return Ok(ToolResult::error("Operation cancelled"));
        }

        let params = match QueryResourcesParams::try_from(params) {
            Ok(p) => p,
            Err(e) => return Ok(e.into()),
        };

        let all = self
            .resources
            .list(&params.service, &params.resource_type, &params.scope)
            .await?;

        let matching: Vec<&Resource> = all
            .iter()
            .filter(|r| {
                params
                    .filters
                    .iter()
                    .all(|(field, needle)| r.matches_filter(field, needle))
            })
            .collect();
        let total = matching.len();

        let requested = total.saturating_sub(params.offset).min(params.limit);
        let mut rows = Vec::with_capacity(requested);
        let mut used = 0usize;
        for resource in matching.into_iter().skip(params.offset).take(params.limit) {
            let row = serde_json::to_string(&summarize(resource))?;
            if used + row.len() + 1 > self.max_output_bytes {
                break;
            }
            used += row.len() + 1;
            rows.push(row);
        }
        let shown = rows.len();

        tracing::debug!(
            service = %params.service,
            resource_type = %params.resource_type,
            listed = all.len(),
            matching = total,
            returned = shown,
            "Queried resources"
        );

        let mut out = format!(
            "{}/{} in {}: showing {} of {}",
            params.service, params.resource_type, params.scope.region, shown, total
        );
        if params.offset > 0 {
            out.push_str(&format!(" (offset {})", params.offset));
        }
        out.push('\n');
        for row in &rows {
            out.push_str(row);
            out.push('\n');
        }
        if shown < requested {
            out.push_str(&format!(
                "[Output capped at {} resources; continue with offset {} or narrow the filters]\n",
                shown,
                params.offset + shown
            ));
        }

        Ok(ToolResult::text(out))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Get Resource Detail Tool
// ─────────────────────────────────────────────────────────────────────────────

/// Tool that fetches the full detail of one resource.
#[derive(Clone)]
pub struct GetResourceDetailTool {
    resources: Arc<dyn ResourceQuery>,
}

impl GetResourceDetailTool {
    pub fn new(resources: Arc<dyn ResourceQuery>) -> Self {
        Self { resources }
    }
}

#[async_trait]
impl Tool for GetResourceDetailTool {
    fn name(&self) -> &str {
        "get_resource_detail"
    }

    fn description(&self) -> &str {
        "Fetch the full configuration of one resource by id or ARN."
    }

    fn parameters(&self) -> Value {
        let mut properties = resource_properties();
        properties.insert(
            "id".to_string(),
            json!({
                "type": "string",
                "description": "Resource id, name or ARN as shown by query_resources"
            }),
        );
        properties.insert("cluster".to_string(), cluster_property());
        json!({
            "type": "object",
            "properties": properties,
            "required": ["service", "resource_type", "id", "region"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        if ctx.is_cancelled() {
            return Ok(ToolResult::error("Operation cancelled"));
        }

        let params = match ResourceDetailParams::try_from(params) {
            Ok(p) => p,
            Err(e) => return Ok(e.into()),
        };

        let resource = self
            .resources
            .get(
                &params.service,
                &params.resource_type,
                &params.id,
                &params.scope,
            )
            .await?;

        Ok(ToolResult::json(serde_json::to_value(&resource)?))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
