//! Log tailing tool.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use serde_json::{Value, json};

use super::{cluster_property, resource_properties};
use crate::collaborators::{LogQuery, LogSearch, ResourceQuery};
use crate::error::Result;
use crate::resolver::{LogResolverRegistry, LogTarget};
use crate::tool::{TailLogsParams, Tool, ToolContext, ToolResult};

/// Longest log message kept per line.
pub const MAX_LOG_LINE_CHARS: usize = 500;

fn truncate_line(message: &str) -> String {
    let message = message.trim_end();
    match message.char_indices().nth(MAX_LOG_LINE_CHARS) {
        Some((cut, _)) => format!("{}...", &message[..cut]),
        None => message.to_string(),
    }
}

/// Tool that fetches recent log lines for a resource.
#[derive(Clone)]
pub struct TailLogsTool {
    resources: Arc<dyn ResourceQuery>,
    logs: Arc<dyn LogSearch>,
    resolvers: LogResolverRegistry,
}

impl TailLogsTool {
    pub fn new(
        resources: Arc<dyn ResourceQuery>,
        logs: Arc<dyn LogSearch>,
        resolvers: LogResolverRegistry,
    ) -> Self {
        Self {
            resources,
            logs,
            resolvers,
        }
    }
}

#[async_trait]
impl Tool for TailLogsTool {
    fn name(&self) -> &str {
        "tail_logs"
    }

    fn description(&self) -> &str {
        "Fetch recent CloudWatch log lines for a resource. The log group is found from the resource; supported types are Lambda functions, RDS instances, CodeBuild projects, Step Functions state machines, and ECS services and tasks."
    }

    fn parameters(&self) -> Value {
        let mut properties = resource_properties();
        properties.insert(
            "id".to_string(),
            json!({
                "type": "string",
                "description": "Resource id or name"
            }),
        );
        properties.insert("cluster".to_string(), cluster_property());
        properties.insert(
            "filter".to_string(),
            json!({
                "type": "string",
                "description": "CloudWatch filter pattern, e.g. \"ERROR\" or \"?timeout ?Timeout\""
            }),
        );
        properties.insert(
            "since_minutes".to_string(),
            json!({
                "type": "integer",
                "description": "How far back to search (default 60, max 1440)",
                "default": 60
            }),
        );
        properties.insert(
            "limit".to_string(),
            json!({
                "type": "integer",
                "description": "Maximum lines to return (default 100, max 500)",
                "default": 100
            }),
        );
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

        let params = match TailLogsParams::try_from(params) {
            Ok(p) => p,
            Err(e) => return Ok(e.into()),
        };

        let target = LogTarget {
            service: &params.service,
            resource_type: &params.resource_type,
            id: &params.id,
            scope: &params.scope,
        };
        let log_group = self
            .resolvers
            .resolve(&target, self.resources.as_ref())
            .await?;

        if ctx.is_cancelled() {
            return Ok(ToolResult::error("Operation cancelled"));
        }

        let end_time = Utc::now();
        let query = LogQuery {
            log_group: log_group.clone(),
            start_time: end_time - TimeDelta::minutes(params.since_minutes),
            end_time,
            filter_pattern: params.filter.clone(),
            limit: params.limit,
            scope: params.scope.clone(),
        };
        let events = self.logs.search(&query).await?;

        if events.is_empty() {
            return Ok(ToolResult::text(format!(
                "No log events in {} in the last {} minutes",
                log_group, params.since_minutes
            )));
        }

        let shown = events.len().min(params.limit);
        let mut out = format!(
            "{} log lines from {} (last {} minutes)\n",
            shown, log_group, params.since_minutes
        );
        for event in events.iter().take(params.limit) {
            out.push_str(&event.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true));
            out.push(' ');
            out.push_str(&truncate_line(&event.message));
            out.push('\n');
        }
        Ok(ToolResult::text(out))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
