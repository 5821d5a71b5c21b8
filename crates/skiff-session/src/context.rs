//! Snapshot of what the operator was viewing when a session began.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which kind of view the session was opened from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextMode {
    /// A single resource's detail view.
    #[default]
    Single,
    /// A listing of resources.
    List,
    /// A side-by-side comparison of two resources.
    Diff,
}

/// Identity of one resource, used for diff views.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub service: String,
    pub resource_type: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

impl ResourceRef {
    /// Create a reference from service, type and id.
    pub fn new(
        service: impl Into<String>,
        resource_type: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            resource_type: resource_type.into(),
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// View snapshot attached to a session at creation and never changed after.
///
/// Every field except `mode` is optional; absent fields are omitted from the
/// session file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub mode: ContextMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_text: Option<String>,
    /// View toggles such as "show deleted" keyed by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub toggles: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_left: Option<ResourceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_right: Option<ResourceRef>,
}

impl Context {
    /// Context for a single resource.
    pub fn single(
        service: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            mode: ContextMode::Single,
            service: Some(service.into()),
            resource_type: Some(resource_type.into()),
            resource_id: Some(resource_id.into()),
            ..Default::default()
        }
    }

    /// Context for a resource listing.
    pub fn list(service: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            mode: ContextMode::List,
            service: Some(service.into()),
            resource_type: Some(resource_type.into()),
            ..Default::default()
        }
    }

    /// Context for comparing two resources.
    pub fn diff(left: ResourceRef, right: ResourceRef) -> Self {
        Self {
            mode: ContextMode::Diff,
            service: Some(left.service.clone()),
            resource_type: Some(left.resource_type.clone()),
            diff_left: Some(left),
            diff_right: Some(right),
            ..Default::default()
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = Some(cluster.into());
        self
    }

    pub fn with_resource_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = Some(name.into());
        self
    }

    pub fn with_resource_arn(mut self, arn: impl Into<String>) -> Self {
        self.resource_arn = Some(arn.into());
        self
    }

    pub fn with_log_group(mut self, log_group: impl Into<String>) -> Self {
        self.log_group = Some(log_group.into());
        self
    }

    pub fn with_filter_text(mut self, filter: impl Into<String>) -> Self {
        self.filter_text = Some(filter.into());
        self
    }

    pub fn with_toggle(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.toggles.insert(name.into(), enabled);
        self
    }

    /// Render the context as a short preamble for the system prompt.
    pub fn describe(&self) -> String {
        let mut lines = Vec::new();
        match self.mode {
            ContextMode::Single => lines.push("The user is viewing a single resource.".to_string()),
            ContextMode::List => lines.push("The user is viewing a resource listing.".to_string()),
            ContextMode::Diff => lines.push("The user is comparing two resources.".to_string()),
        }

        let fields = [
            ("Service", &self.service),
            ("Resource type", &self.resource_type),
            ("Resource id", &self.resource_id),
            ("Resource name", &self.resource_name),
            ("Resource ARN", &self.resource_arn),
            ("Region", &self.region),
            ("Profile", &self.profile),
            ("Cluster", &self.cluster),
            ("Log group", &self.log_group),
            ("Filter", &self.filter_text),
        ];
        for (label, value) in fields {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                lines.push(format!("{}: {}", label, value));
            }
        }

        for (side, reference) in [("Left", &self.diff_left), ("Right", &self.diff_right)] {
            if let Some(r) = reference {
                lines.push(format!(
                    "{}: {}/{} {}",
                    side, r.service, r.resource_type, r.id
                ));
            }
        }

        let enabled: Vec<&str> = self
            .toggles
            .iter()
            .filter(|(_, on)| **on)
            .map(|(name, _)| name.as_str())
            .collect();
        if !enabled.is_empty() {
            lines.push(format!("Enabled toggles: {}", enabled.join(", ")));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_serialization_omits_empty_fields() {
        let ctx = Context::list("ec2", "instances").with_region("us-east-1");
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["mode"], "list");
        assert_eq!(json["region"], "us-east-1");
        assert!(json.get("cluster").is_none());
        assert!(json.get("toggles").is_none());
    }

    #[test]
    fn test_context_deserializes_sparse_document() {
        let ctx: Context = serde_json::from_str(r#"{"service": "s3"}"#).unwrap();
        assert_eq!(ctx.mode, ContextMode::Single);
        assert_eq!(ctx.service.as_deref(), Some("s3"));
    }

    #[test]
    fn test_describe() {
        let ctx = Context::single("ecs", "services", "web")
            .with_cluster("prod")
            .with_toggle("show_stopped", true)
            .with_toggle("wide", false);
        let text = ctx.describe();
        assert!(text.contains("single resource"));
        assert!(text.contains("Cluster: prod"));
        assert!(text.contains("Enabled toggles: show_stopped"));
        assert!(!text.contains("wide"));
    }

    #[test]
    fn test_diff_context() {
        let ctx = Context::diff(
            ResourceRef::new("lambda", "functions", "a"),
            ResourceRef::new("lambda", "functions", "b").with_region("eu-west-1"),
        );
        assert_eq!(ctx.mode, ContextMode::Diff);
        assert!(ctx.describe().contains("Right: lambda/functions b"));
    }
}
