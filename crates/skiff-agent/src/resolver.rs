//! Log destination resolution.
//!
//! Maps a `(service, resource_type)` pair to the strategy that finds the
//! CloudWatch log group for one resource. Some groups follow from the id
//! alone; others are read from the resource detail, and ECS needs a second
//! lookup of the task definition.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::collaborators::{QueryScope, ResourceQuery};
use crate::error::{AgentError, Result};

/// The resource whose logs are wanted.
#[derive(Debug, Clone)]
pub struct LogTarget<'a> {
    pub service: &'a str,
    pub resource_type: &'a str,
    pub id: &'a str,
    pub scope: &'a QueryScope,
}

/// Finds the log group for one kind of resource.
#[async_trait]
pub trait LogDestinationStrategy: Send + Sync {
    async fn resolve(&self, target: &LogTarget<'_>, resources: &dyn ResourceQuery)
    -> Result<String>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Strategies
// ─────────────────────────────────────────────────────────────────────────────

/// Log group derived from the id by a `{id}` template.
#[derive(Debug, Clone)]
pub struct TemplateStrategy {
    template: &'static str,
}

impl TemplateStrategy {
    pub fn new(template: &'static str) -> Self {
        Self { template }
    }

    fn render(&self, id: &str) -> String {
        self.template.replace("{id}", id)
    }
}

#[async_trait]
impl LogDestinationStrategy for TemplateStrategy {
    async fn resolve(
        &self,
        target: &LogTarget<'_>,
        _resources: &dyn ResourceQuery,
    ) -> Result<String> {
        Ok(self.render(target.id))
    }
}

/// Log group read from a field of the resource detail.
#[derive(Debug, Clone)]
pub struct DetailFieldStrategy {
    /// JSON pointer into the raw payload.
    pointer: &'static str,
    /// The field holds a log group ARN rather than a name.
    arn: bool,
    /// Template used when the field is absent.
    fallback: Option<TemplateStrategy>,
}

impl DetailFieldStrategy {
    pub fn new(pointer: &'static str) -> Self {
        Self {
            pointer,
            arn: false,
            fallback: None,
        }
    }

    /// Treat the field as a log group ARN.
    pub fn arn(mut self) -> Self {
        self.arn = true;
        self
    }

    pub fn with_fallback(mut self, template: &'static str) -> Self {
        self.fallback = Some(TemplateStrategy::new(template));
        self
    }
}

#[async_trait]
impl LogDestinationStrategy for DetailFieldStrategy {
    async fn resolve(
        &self,
        target: &LogTarget<'_>,
        resources: &dyn ResourceQuery,
    ) -> Result<String> {
        let detail = resources
            .get(target.service, target.resource_type, target.id, target.scope)
            .await?;

        let found = non_empty_str(&detail.raw, self.pointer).and_then(|value| {
            if self.arn {
                log_group_from_arn(value)
            } else {
                Some(value.to_string())
            }
        });

        match (found, &self.fallback) {
            (Some(group), _) => Ok(group),
            (None, Some(fallback)) => Ok(fallback.render(target.id)),
            (None, None) => Err(AgentError::collaborator(format!(
                "{}/{} {} has no log group configured",
                target.service, target.resource_type, target.id
            ))),
        }
    }
}

/// ECS services and tasks: read the task definition from the detail, fetch
/// it, and take the first container's `awslogs-group` option.
#[derive(Debug, Clone, Default)]
pub struct EcsTaskDefinitionStrategy;

impl EcsTaskDefinitionStrategy {
    const TASK_DEFINITION_POINTERS: &'static [&'static str] =
        &["/taskDefinitionArn", "/taskDefinition"];
    const LOG_GROUP_POINTER: &'static str =
        "/containerDefinitions/0/logConfiguration/options/awslogs-group";
}

#[async_trait]
impl LogDestinationStrategy for EcsTaskDefinitionStrategy {
    async fn resolve(
        &self,
        target: &LogTarget<'_>,
        resources: &dyn ResourceQuery,
    ) -> Result<String> {
        let detail = resources
            .get(target.service, target.resource_type, target.id, target.scope)
            .await?;

        let task_definition = Self::TASK_DEFINITION_POINTERS
            .iter()
            .find_map(|p| non_empty_str(&detail.raw, p))
            .ok_or_else(|| {
                AgentError::collaborator(format!(
                    "{}/{} {} has no task definition",
                    target.service, target.resource_type, target.id
                ))
            })?;

        tracing::debug!(task_definition, "Looking up task definition for log group");
        let definition = resources
            .get(target.service, "task-definitions", task_definition, target.scope)
            .await?;

        non_empty_str(&definition.raw, Self::LOG_GROUP_POINTER)
            .map(str::to_string)
            .ok_or_else(|| {
                AgentError::collaborator(format!(
                    "Task definition {} does not use the awslogs driver",
                    task_definition
                ))
            })
    }
}

fn non_empty_str<'v>(value: &'v Value, pointer: &str) -> Option<&'v str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Extract the group name from
/// `arn:aws:logs:<region>:<account>:log-group:<name>[:*]`.
pub fn log_group_from_arn(arn: &str) -> Option<String> {
    let (_, rest) = arn.split_once(":log-group:")?;
    let name = rest.strip_suffix(":*").unwrap_or(rest);
    (!name.is_empty()).then(|| name.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Strategies keyed by `(service, resource_type)`.
#[derive(Clone, Default)]
pub struct LogResolverRegistry {
    strategies: BTreeMap<(String, String), Arc<dyn LogDestinationStrategy>>,
}

impl LogResolverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in strategies.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("lambda", "functions", TemplateStrategy::new("/aws/lambda/{id}"));
        registry.register(
            "rds",
            "instances",
            TemplateStrategy::new("/aws/rds/instance/{id}/error"),
        );
        registry.register(
            "codebuild",
            "projects",
            DetailFieldStrategy::new("/logsConfig/cloudWatchLogs/groupName")
                .with_fallback("/aws/codebuild/{id}"),
        );
        registry.register(
            "stepfunctions",
            "state-machines",
            DetailFieldStrategy::new(
                "/loggingConfiguration/destinations/0/cloudWatchLogsLogGroup/logGroupArn",
            )
            .arn(),
        );
        registry.register("ecs", "services", EcsTaskDefinitionStrategy);
        registry.register("ecs", "tasks", EcsTaskDefinitionStrategy);
        registry
    }

    /// Register a strategy, replacing any existing one for the key.
    pub fn register<S: LogDestinationStrategy + 'static>(
        &mut self,
        service: impl Into<String>,
        resource_type: impl Into<String>,
        strategy: S,
    ) {
        self.strategies
            .insert((service.into(), resource_type.into()), Arc::new(strategy));
    }

    /// Supported `service/type` keys, sorted.
    pub fn supported(&self) -> Vec<String> {
        self.strategies
            .keys()
            .map(|(service, resource_type)| format!("{}/{}", service, resource_type))
            .collect()
    }

    pub fn is_supported(&self, service: &str, resource_type: &str) -> bool {
        self.strategies
            .contains_key(&(service.to_string(), resource_type.to_string()))
    }

    /// Resolve the log group for a resource.
    pub async fn resolve(
        &self,
        target: &LogTarget<'_>,
        resources: &dyn ResourceQuery,
    ) -> Result<String> {
        let strategy = self
            .strategies
            .get(&(target.service.to_string(), target.resource_type.to_string()))
            .ok_or_else(|| AgentError::UnsupportedLogSource {
                service: target.service.to_string(),
                resource_type: target.resource_type.to_string(),
                supported: self.supported(),
            })?;

        let group = strategy.resolve(target, resources).await?;
        tracing::debug!(
            service = target.service,
            resource_type = target.resource_type,
            id = target.id,
            log_group = %group,
            "Resolved log destination"
        );
        Ok(group)
    }
}

impl std::fmt::Debug for LogResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogResolverRegistry")
            .field("supported", &self.supported())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::Resource;
    use crate::collaborators::fakes::FakeResources;
    use serde_json::json;

    async fn resolve(
        registry: &LogResolverRegistry,
        resources: &FakeResources,
        service: &str,
        resource_type: &str,
        id: &str,
    ) -> Result<String> {
        let scope = QueryScope::new("us-east-1").with_cluster("prod");
        let target = LogTarget {
            service,
            resource_type,
            id,
            scope: &scope,
        };
        registry.resolve(&target, resources).await
    }

    #[test]
    fn test_log_group_from_arn() {
        assert_eq!(
            log_group_from_arn("arn:aws:logs:us-east-1:123:log-group:/aws/vendedlogs/states/x:*"),
            Some("/aws/vendedlogs/states/x".to_string())
        );
        assert_eq!(
            log_group_from_arn("arn:aws:logs:us-east-1:123:log-group:plain"),
            Some("plain".to_string())
        );
        assert_eq!(log_group_from_arn("arn:aws:s3:::bucket"), None);
    }

    #[test]
    fn test_supported_sorted() {
        let registry = LogResolverRegistry::with_defaults();
        let supported = registry.supported();
        let mut sorted = supported.clone();
        sorted.sort();
        assert_eq!(supported, sorted);
        assert_eq!(supported.len(), 6);
        assert!(registry.is_supported("lambda", "functions"));
    }

    #[tokio::test]
    async fn test_derived_groups_make_no_calls() {
        let registry = LogResolverRegistry::with_defaults();
        let resources = FakeResources::default();

        assert_eq!(
            resolve(&registry, &resources, "lambda", "functions", "checkout")
                .await
                .unwrap(),
            "/aws/lambda/checkout"
        );
        assert_eq!(
            resolve(&registry, &resources, "rds", "instances", "orders-db")
                .await
                .unwrap(),
            "/aws/rds/instance/orders-db/error"
        );
        assert!(resources.calls().is_empty());
    }

    #[tokio::test]
    async fn test_codebuild_field_and_fallback() {
        let registry = LogResolverRegistry::with_defaults();
        let resources = FakeResources::default().with_resources(
            "codebuild",
            "projects",
            vec![
                Resource::new("custom").with_raw(json!({
                    "logsConfig": {"cloudWatchLogs": {"groupName": "/team/builds"}}
                })),
                Resource::new("plain").with_raw(json!({})),
            ],
        );

        assert_eq!(
            resolve(&registry, &resources, "codebuild", "projects", "custom")
                .await
                .unwrap(),
            "/team/builds"
        );
        assert_eq!(
            resolve(&registry, &resources, "codebuild", "projects", "plain")
                .await
                .unwrap(),
            "/aws/codebuild/plain"
        );
    }

    #[tokio::test]
    async fn test_state_machine_arn() {
        let registry = LogResolverRegistry::with_defaults();
        let resources = FakeResources::default().with_resources(
            "stepfunctions",
            "state-machines",
            vec![
                Resource::new("orders").with_raw(json!({
                    "loggingConfiguration": {"destinations": [{
                        "cloudWatchLogsLogGroup": {
                            "logGroupArn": "arn:aws:logs:us-east-1:1:log-group:/sfn/orders:*"
                        }
                    }]}
                })),
                Resource::new("quiet").with_raw(json!({"loggingConfiguration": {"level": "OFF"}})),
            ],
        );

        assert_eq!(
            resolve(&registry, &resources, "stepfunctions", "state-machines", "orders")
                .await
                .unwrap(),
            "/sfn/orders"
        );
        let err = resolve(&registry, &resources, "stepfunctions", "state-machines", "quiet")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no log group configured"));
    }

    #[tokio::test]
    async fn test_ecs_secondary_lookup() {
        let registry = LogResolverRegistry::with_defaults();
        let td_arn = "arn:aws:ecs:us-east-1:1:task-definition/web:7";
        let resources = FakeResources::default()
            .with_resources(
                "ecs",
                "services",
                vec![Resource::new("web").with_raw(json!({"taskDefinition": td_arn}))],
            )
            .with_resources(
                "ecs",
                "tasks",
                vec![Resource::new("abc123").with_raw(json!({"taskDefinitionArn": td_arn}))],
            )
            .with_resources(
                "ecs",
                "task-definitions",
                vec![Resource::new("web:7").with_arn(td_arn).with_raw(json!({
                    "containerDefinitions": [{
                        "logConfiguration": {
                            "logDriver": "awslogs",
                            "options": {"awslogs-group": "/ecs/web"}
                        }
                    }]
                }))],
            );

        assert_eq!(
            resolve(&registry, &resources, "ecs", "services", "web")
                .await
                .unwrap(),
            "/ecs/web"
        );
        assert_eq!(
            resolve(&registry, &resources, "ecs", "tasks", "abc123")
                .await
                .unwrap(),
            "/ecs/web"
        );
        assert_eq!(
            resources.calls(),
            vec![
                "get ecs/services/web".to_string(),
                format!("get ecs/task-definitions/{td_arn}"),
                "get ecs/tasks/abc123".to_string(),
                format!("get ecs/task-definitions/{td_arn}"),
            ]
        );
    }

    #[tokio::test]
    async fn test_unsupported_lists_supported_set() {
        let registry = LogResolverRegistry::with_defaults();
        let err = resolve(&registry, &FakeResources::default(), "s3", "buckets", "logs")
            .await
            .unwrap_err();
        match err {
            AgentError::UnsupportedLogSource { supported, .. } => {
                assert_eq!(
                    supported,
                    vec![
                        "codebuild/projects",
                        "ecs/services",
                        "ecs/tasks",
                        "lambda/functions",
                        "rds/instances",
                        "stepfunctions/state-machines",
                    ]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
