//! Tool capability interface and registry
//!
//! Each tool exposes a name, a description, and a single text-in/text-out
//! `invoke`. The registry is an explicit, ordered collection handed to the
//! generation client, which decides when to call what.

use crate::config::RETRIEVAL_TOP_K;
use crate::gemini::GeminiClient;
use crate::retrieval::VectorIndexClient;
use crate::store::ConversationStore;
use crate::Result;
use std::sync::Arc;
use tracing::info;

/// Visible separator between concatenated retrieval passages.
pub const PASSAGE_SEPARATOR: &str = "\n---\n";

/// A single capability offered to the generation client.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    async fn invoke(&self, query: &str) -> Result<String>;
}

/// Ordered collection of registered tools.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn list(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Similarity search over the deployment's vector index namespace.
pub struct RetrievalTool {
    gemini: Arc<GeminiClient>,
    index: Arc<VectorIndexClient>,
    namespace: String,
}

impl RetrievalTool {
    pub fn new(
        gemini: Arc<GeminiClient>,
        index: Arc<VectorIndexClient>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            gemini,
            index,
            namespace: namespace.into(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for RetrievalTool {
    fn name(&self) -> &'static str {
        "vector_database"
    }

    fn description(&self) -> &'static str {
        "Retrieve reference passages relevant to a query via similarity search"
    }

    async fn invoke(&self, query: &str) -> Result<String> {
        let vector = self.gemini.embed(query).await?;
        let passages = self
            .index
            .query(&vector, &self.namespace, RETRIEVAL_TOP_K)
            .await?;

        info!(
            namespace = %self.namespace,
            passages = passages.len(),
            "Retrieval tool invoked"
        );
        Ok(join_passages(&passages))
    }
}

/// Concatenate passages with the visible separator.
pub fn join_passages(passages: &[String]) -> String {
    if passages.is_empty() {
        return "No relevant passages found.".to_string();
    }
    passages.join(PASSAGE_SEPARATOR)
}

/// Read back prior feedback rows from the conversation store.
pub struct InsightsTool {
    store: Arc<ConversationStore>,
}

impl InsightsTool {
    pub fn new(store: Arc<ConversationStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for InsightsTool {
    fn name(&self) -> &'static str {
        "insights"
    }

    fn description(&self) -> &'static str {
        "Gain insights from feedback left in previous chats"
    }

    async fn invoke(&self, _query: &str) -> Result<String> {
        let insights = self.store.list_insights(20).await?;
        if insights.is_empty() {
            return Ok("No feedback has been stored yet.".to_string());
        }
        Ok(insights.join("\n"))
    }
}

/// Persist a feedback string offered by the user.
pub struct FeedbackTool {
    store: Arc<ConversationStore>,
}

impl FeedbackTool {
    pub fn new(store: Arc<ConversationStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for FeedbackTool {
    fn name(&self) -> &'static str {
        "feedback"
    }

    fn description(&self) -> &'static str {
        "Store feedback data for later review"
    }

    async fn invoke(&self, query: &str) -> Result<String> {
        self.store.insert_feedback(query).await?;
        Ok("Feedback stored.".to_string())
    }
}
