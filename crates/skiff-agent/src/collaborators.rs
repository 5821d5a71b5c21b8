//! Read-only collaborators the tools query.
//!
//! The host application owns the per-service AWS wrappers; this crate only
//! sees them through [`ResourceQuery`], [`LogSearch`] and [`DocSearch`].
//! [`HttpDocSearch`] is the one implementation shipped here.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{AgentError, Result};

/// Resource types whose API calls are scoped by a cluster name.
const CLUSTER_SCOPED: &[(&str, &str)] = &[("ecs", "services"), ("ecs", "tasks")];

/// Whether `service/resource_type` needs a cluster to be looked up.
pub fn requires_cluster(service: &str, resource_type: &str) -> bool {
    CLUSTER_SCOPED
        .iter()
        .any(|(s, t)| *s == service && *t == resource_type)
}

// ─────────────────────────────────────────────────────────────────────────────
// Resources
// ─────────────────────────────────────────────────────────────────────────────

/// Where a query runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryScope {
    pub region: String,
    pub profile: Option<String>,
    /// Required for cluster-scoped types, see [`requires_cluster`].
    pub cluster: Option<String>,
}

impl QueryScope {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Default::default()
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = Some(cluster.into());
        self
    }
}

/// One resource as returned by the resource collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Full service payload, as the AWS API returned it.
    #[serde(default)]
    pub raw: Value,
}

impl Resource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_arn(mut self, arn: impl Into<String>) -> Self {
        self.arn = Some(arn.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = raw;
        self
    }

    /// Case-insensitive substring match of one filter.
    ///
    /// `id`, `name` and `arn` match those fields; any other key matches the
    /// value of the tag with that key. `needle` must already be lowercase.
    pub fn matches_filter(&self, field: &str, needle: &str) -> bool {
        let hit = |haystack: &str| haystack.to_lowercase().contains(needle);
        match field {
            "id" => hit(&self.id),
            "name" => self.name.as_deref().is_some_and(hit),
            "arn" => self.arn.as_deref().is_some_and(hit),
            key => self
                .tags
                .iter()
                .any(|(k, v)| k.eq_ignore_ascii_case(key) && hit(v)),
        }
    }
}

/// Lists and describes resources.
#[async_trait]
pub trait ResourceQuery: Send + Sync {
    /// Resource categories known for a service, empty when the service is
    /// unknown.
    async fn resource_types(&self, service: &str) -> Result<Vec<String>>;

    /// Every resource of one type in scope.
    async fn list(
        &self,
        service: &str,
        resource_type: &str,
        scope: &QueryScope,
    ) -> Result<Vec<Resource>>;

    /// Full detail for one resource.
    async fn get(
        &self,
        service: &str,
        resource_type: &str,
        id: &str,
        scope: &QueryScope,
    ) -> Result<Resource>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Logs
// ─────────────────────────────────────────────────────────────────────────────

/// A bounded log search over one log group.
#[derive(Debug, Clone, PartialEq)]
pub struct LogQuery {
    pub log_group: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub filter_pattern: Option<String>,
    pub limit: usize,
    pub scope: QueryScope,
}

/// One log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
}

/// Searches log groups.
#[async_trait]
pub trait LogSearch: Send + Sync {
    /// Matching events, oldest first.
    async fn search(&self, query: &LogQuery) -> Result<Vec<LogEvent>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Documentation
// ─────────────────────────────────────────────────────────────────────────────

/// A ranked documentation hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocHit {
    pub title: String,
    pub url: String,
    pub summary: String,
}

/// Keyword search over documentation.
#[async_trait]
pub trait DocSearch: Send + Sync {
    /// Best hits first, at most `limit`.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<DocHit>>;
}

/// Public AWS documentation search endpoint.
pub const DEFAULT_DOCS_ENDPOINT: &str = "https://proxy.search.docs.aws.amazon.com/search";

/// Configuration for [`HttpDocSearch`].
#[derive(Debug, Clone)]
pub struct DocSearchConfig {
    pub endpoint: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for DocSearchConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_DOCS_ENDPOINT.to_string(),
            timeout: Duration::from_secs(15),
            user_agent: format!("skiff/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// [`DocSearch`] over the AWS documentation search endpoint.
#[derive(Debug, Clone)]
pub struct HttpDocSearch {
    client: Client,
    config: DocSearchConfig,
}

#[derive(Debug, Deserialize)]
struct SuggestionsResponse {
    #[serde(default)]
    suggestions: Vec<Suggestion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Suggestion {
    text_excerpt_suggestion: Option<TextExcerpt>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextExcerpt {
    #[serde(default)]
    link: String,
    #[serde(default)]
    title: String,
    summary: Option<String>,
    suggestion_body: Option<String>,
}

impl HttpDocSearch {
    /// Create a client with the default endpoint.
    pub fn new() -> Result<Self> {
        Self::with_config(DocSearchConfig::default())
    }

    pub fn with_config(config: DocSearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| AgentError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn request_body(query: &str) -> Value {
        json!({
            "textQuery": { "input": query },
            "contextAttributes": [{ "key": "domain", "value": "docs.aws.amazon.com" }],
            "acceptSuggestionBody": "RawText",
            "locales": ["en_us"]
        })
    }

    fn parse_hits(body: SuggestionsResponse, limit: usize) -> Vec<DocHit> {
        body.suggestions
            .into_iter()
            .filter_map(|s| s.text_excerpt_suggestion)
            .filter(|e| !e.link.is_empty())
            .map(|e| DocHit {
                title: if e.title.is_empty() {
                    e.link.clone()
                } else {
                    e.title
                },
                summary: e.summary.or(e.suggestion_body).unwrap_or_default(),
                url: e.link,
            })
            .take(limit)
            .collect()
    }
}

#[async_trait]
impl DocSearch for HttpDocSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<DocHit>> {
        tracing::debug!(query, limit, "Searching documentation");

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&Self::request_body(query))
            .send()
            .await
            .map_err(|e| AgentError::collaborator(format!("Documentation search failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AgentError::collaborator(format!(
                "Documentation search error: {}",
                response.status()
            )));
        }

        let body: SuggestionsResponse = response.json().await.map_err(|e| {
            AgentError::collaborator(format!("Failed to parse documentation response: {}", e))
        })?;

        Ok(Self::parse_hits(body, limit))
    }
}

/// The collaborators the built-in tools share.
#[derive(Clone)]
pub struct Collaborators {
    pub resources: Arc<dyn ResourceQuery>,
    pub logs: Arc<dyn LogSearch>,
    pub docs: Arc<dyn DocSearch>,
}

impl Collaborators {
    pub fn new(
        resources: Arc<dyn ResourceQuery>,
        logs: Arc<dyn LogSearch>,
        docs: Arc<dyn DocSearch>,
    ) -> Self {
        Self {
            resources,
            logs,
            docs,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fakes (for testing)
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory collaborators that record their calls.
#[cfg(test)]
pub mod fakes {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    pub struct FakeResources {
        pub types: BTreeMap<String, Vec<String>>,
        pub resources: BTreeMap<(String, String), Vec<Resource>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeResources {
        pub fn with_types(mut self, service: &str, types: &[&str]) -> Self {
            self.types.insert(
                service.to_string(),
                types.iter().map(|t| t.to_string()).collect(),
            );
            self
        }

        pub fn with_resources(
            mut self,
            service: &str,
            resource_type: &str,
            resources: Vec<Resource>,
        ) -> Self {
            self.resources
                .insert((service.to_string(), resource_type.to_string()), resources);
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ResourceQuery for FakeResources {
        async fn resource_types(&self, service: &str) -> Result<Vec<String>> {
            self.calls.lock().unwrap().push(format!("types {service}"));
            Ok(self.types.get(service).cloned().unwrap_or_default())
        }

        async fn list(
            &self,
            service: &str,
            resource_type: &str,
            _scope: &QueryScope,
        ) -> Result<Vec<Resource>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("list {service}/{resource_type}"));
            Ok(self
                .resources
                .get(&(service.to_string(), resource_type.to_string()))
                .cloned()
                .unwrap_or_default())
        }

        async fn get(
            &self,
            service: &str,
            resource_type: &str,
            id: &str,
            _scope: &QueryScope,
        ) -> Result<Resource> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("get {service}/{resource_type}/{id}"));
            self.resources
                .get(&(service.to_string(), resource_type.to_string()))
                .and_then(|list| {
                    list.iter()
                        .find(|r| r.id == id || r.arn.as_deref() == Some(id))
                })
                .cloned()
                .ok_or_else(|| AgentError::collaborator(format!("{resource_type} {id} not found")))
        }
    }

    #[derive(Debug, Default)]
    pub struct FakeLogs {
        pub events: Vec<LogEvent>,
        pub queries: Mutex<Vec<LogQuery>>,
    }

    impl FakeLogs {
        pub fn with_events(events: Vec<LogEvent>) -> Self {
            Self {
                events,
                ..Default::default()
            }
        }

        pub fn queries(&self) -> Vec<LogQuery> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LogSearch for FakeLogs {
        async fn search(&self, query: &LogQuery) -> Result<Vec<LogEvent>> {
            self.queries.lock().unwrap().push(query.clone());
            Ok(self.events.iter().take(query.limit).cloned().collect())
        }
    }

    #[derive(Debug, Default)]
    pub struct FakeDocs {
        pub hits: Vec<DocHit>,
    }

    #[async_trait]
    impl DocSearch for FakeDocs {
        async fn search(&self, _query: &str, limit: usize) -> Result<Vec<DocHit>> {
            Ok(self.hits.iter().take(limit).cloned().collect())
        }
    }

    /// Collaborators with empty fakes.
    pub fn empty() -> Collaborators {
        Collaborators::new(
            Arc::new(FakeResources::default()),
            Arc::new(FakeLogs::default()),
            Arc::new(FakeDocs::default()),
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_cluster() {
        assert!(requires_cluster("ecs", "services"));
        assert!(requires_cluster("ecs", "tasks"));
        assert!(!requires_cluster("ecs", "clusters"));
        assert!(!requires_cluster("lambda", "functions"));
    }

    #[test]
    fn test_matches_filter() {
        let r = Resource::new("i-0abc")
            .with_name("Web-Prod")
            .with_arn("arn:aws:ec2:us-east-1:1:instance/i-0abc")
            .with_tag("Environment", "Production");

        assert!(r.matches_filter("id", "0ab"));
        assert!(r.matches_filter("name", "web"));
        assert!(r.matches_filter("arn", "us-east-1"));
        assert!(r.matches_filter("environment", "prod"));
        assert!(!r.matches_filter("environment", "staging"));
        assert!(!r.matches_filter("owner", "prod"));
    }

    #[test]
    fn test_parse_doc_hits() {
        let body: SuggestionsResponse = serde_json::from_value(json!({
            "suggestions": [
                {"textExcerptSuggestion": {
                    "link": "https://docs.aws.amazon.com/lambda/latest/dg/timeouts.html",
                    "title": "Configuring timeouts",
                    "summary": "Set the function timeout."
                }},
                {"textExcerptSuggestion": {
                    "link": "https://docs.aws.amazon.com/lambda/latest/dg/memory.html",
                    "title": "",
                    "suggestionBody": "Memory and CPU."
                }},
                {"textExcerptSuggestion": {"link": "", "title": "dropped"}},
                {"other": {}}
            ]
        }))
        .unwrap();

        let hits = HttpDocSearch::parse_hits(body, 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Configuring timeouts");
        assert_eq!(hits[0].summary, "Set the function timeout.");
        assert_eq!(hits[1].title, hits[1].url);
        assert_eq!(hits[1].summary, "Memory and CPU.");
    }

    #[test]
    fn test_doc_request_body() {
        let body = HttpDocSearch::request_body("ecs exec");
        assert_eq!(body["textQuery"]["input"], "ecs exec");
        assert_eq!(body["locales"][0], "en_us");
    }

    #[test]
    fn test_http_doc_search_builds() {
        let search = HttpDocSearch::new().unwrap();
        assert_eq!(search.config.endpoint, DEFAULT_DOCS_ENDPOINT);
    }
}
