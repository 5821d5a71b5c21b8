//! Built-in tools for the assistant.
//!
//! Every tool is read-only:
//! - Resource discovery (list types, query listings, fetch detail)
//! - Log tailing through the log destination resolver
//! - Documentation search

mod docs;
mod logs;
mod resources;

use serde_json::{Value, json};

use crate::collaborators::Collaborators;
use crate::resolver::LogResolverRegistry;
use crate::tool::ToolRegistry;

// Resource tools
pub use resources::{GetResourceDetailTool, ListResourceTypesTool, QueryResourcesTool};

// Log tool
pub use logs::{MAX_LOG_LINE_CHARS, TailLogsTool};

// Docs tool
pub use docs::SearchDocsTool;

/// Register the five built-in tools.
pub fn register_builtin_tools(
    registry: &mut ToolRegistry,
    collaborators: &Collaborators,
    resolvers: LogResolverRegistry,
) {
    registry.register(ListResourceTypesTool::new(collaborators.resources.clone()));
    registry.register(QueryResourcesTool::new(collaborators.resources.clone()));
    registry.register(GetResourceDetailTool::new(collaborators.resources.clone()));
    registry.register(TailLogsTool::new(
        collaborators.resources.clone(),
        collaborators.logs.clone(),
        resolvers,
    ));
    registry.register(SearchDocsTool::new(collaborators.docs.clone()));
}

/// A registry holding the built-in tools and default log resolvers.
pub fn builtin_registry(collaborators: &Collaborators) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    register_builtin_tools(&mut registry, collaborators, LogResolverRegistry::with_defaults());
    registry
}

/// Schema properties shared by tools that address one resource type.
fn resource_properties() -> serde_json::Map<String, Value> {
    let properties = json!({
        "service": {
            "type": "string",
            "description": "AWS service key, e.g. \"ec2\", \"lambda\", \"ecs\""
        },
        "resource_type": {
            "type": "string",
            "description": "Resource category within the service, e.g. \"instances\", \"functions\""
        },
        "region": {
            "type": "string",
            "description": "AWS region, e.g. \"us-east-1\""
        },
        "profile": {
            "type": "string",
            "description": "Named AWS profile. Defaults to the active profile."
        }
    });
    match properties {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

fn cluster_property() -> Value {
    json!({
        "type": "string",
        "description": "ECS cluster name. Required for ecs services and tasks."
    })
}
