pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;

/// A single selectable result offered in reply to an inline query.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineArticle {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Text posted into the chat when the user picks the article.
    pub message_text: String,
}

/// Outbound side of the messaging provider.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;

    async fn answer_inline_query(&self, query_id: &str, results: Vec<InlineArticle>) -> Result<()>;
}
