use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    InlineQueryId, InlineQueryResult, InlineQueryResultArticle, InputMessageContent,
    InputMessageContentText,
};
use tracing::{debug, info, warn};

use crate::config::TelegramConfig;
use crate::platform::{InlineArticle, Messenger};

/// Telegram rejects `sendMessage` text longer than this many characters.
const MAX_MESSAGE_CHARS: usize = 4096;

/// Cut `text` to at most `max_chars` characters, ending on a char boundary.
fn truncate_message(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Telegram Bot API transport for outbound replies.
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let api_url: reqwest::Url = config
            .api_url
            .parse()
            .with_context(|| format!("Invalid Telegram API URL: {}", config.api_url))?;
        Ok(Self {
            bot: Bot::new(&config.bot_token).set_api_url(api_url),
        })
    }

    /// Point Telegram's push delivery at `url` (`setWebhook`).
    pub async fn register_webhook(&self, url: &str) -> Result<()> {
        let url: reqwest::Url = url
            .parse()
            .with_context(|| format!("Invalid webhook URL: {}", url))?;
        self.bot
            .set_webhook(url)
            .await
            .context("setWebhook request failed")?;
        info!("Telegram webhook registered");
        Ok(())
    }
}

fn to_telegram_result(article: InlineArticle) -> InlineQueryResult {
    let content =
        InputMessageContent::Text(InputMessageContentText::new(article.message_text));
    let mut result = InlineQueryResultArticle::new(article.id, article.title, content);
    result.description = Some(article.description);
    InlineQueryResult::Article(result)
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let body = truncate_message(text, MAX_MESSAGE_CHARS);
        if body.len() < text.len() {
            warn!(
                "Reply to chat {} exceeds {} characters, truncating",
                chat_id, MAX_MESSAGE_CHARS
            );
        }
        debug!("sendMessage to chat {} ({} bytes)", chat_id, body.len());
        self.bot
            .send_message(ChatId(chat_id), body)
            .await
            .with_context(|| format!("sendMessage to chat {} failed", chat_id))?;
        Ok(())
    }

    async fn answer_inline_query(&self, query_id: &str, results: Vec<InlineArticle>) -> Result<()> {
        debug!(
            "answerInlineQuery {} with {} result(s)",
            query_id,
            results.len()
        );
        let results: Vec<InlineQueryResult> = results.into_iter().map(to_telegram_result).collect();
        self.bot
            .answer_inline_query(InlineQueryId(query_id.to_string()), results)
            .await
            .with_context(|| format!("answerInlineQuery {} failed", query_id))?;
        Ok(())
    }
}
