pub mod chat;
pub mod webhook;

pub use chat::{ChatClient, ChatConfig};
pub use webhook::{AiSearch, AiSearchOutcome, RetryPolicy};

pub const ASSISTANT_UNAVAILABLE: &str =
    "Failed to communicate with AI assistant. Please try again later.";

/// The two AI collaborators. The search webhook is optional.
#[derive(Clone)]
pub struct Assistant {
    pub search: Option<AiSearch>,
    pub chat: ChatClient,
}

impl Assistant {
    pub async fn ai_search(&self, query: &str) -> AiSearchOutcome {
        match &self.search {
            Some(search) => search.search(query).await,
            None => AiSearchOutcome::Failed("AI search is not configured".to_string()),
        }
    }
}
