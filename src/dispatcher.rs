use std::sync::Arc;

use tracing::{info, warn};

use crate::config::RepliesConfig;
use crate::llm::Completion;
use crate::platform::{InlineArticle, Messenger};
use crate::update::Update;

const INLINE_PLACEHOLDER_ID: &str = "florence-placeholder";

/// Which text was chosen for a message reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Greeting,
    About,
    Completion,
    Apology,
}

/// What the dispatcher did with one update.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Replied {
        chat_id: i64,
        reply: ReplyKind,
        delivered: bool,
    },
    InlineAnswered {
        query_id: String,
        delivered: bool,
    },
    Ignored {
        kind: String,
    },
}

enum Command {
    Start,
    About,
}

/// `/start` and `/start@SomeBot` both match; anything else is a prompt.
fn parse_command(text: &str) -> Option<Command> {
    let word = text.trim();
    let name = word.split_once('@').map(|(cmd, _)| cmd).unwrap_or(word);
    match name {
        "/start" => Some(Command::Start),
        "/about" => Some(Command::About),
        _ => None,
    }
}

/// Routes each update to exactly one outbound call.
pub struct Dispatcher {
    messenger: Arc<dyn Messenger>,
    completion: Arc<dyn Completion>,
    replies: RepliesConfig,
}

impl Dispatcher {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        completion: Arc<dyn Completion>,
        replies: RepliesConfig,
    ) -> Self {
        Self {
            messenger,
            completion,
            replies,
        }
    }

    pub async fn dispatch(&self, update: Update) -> Outcome {
        match update {
            Update::Message { chat_id, text } => self.handle_message(chat_id, &text).await,
            Update::InlineQuery { id, query } => self.handle_inline_query(id, &query).await,
            Update::Ignored { kind } => {
                info!("Ignoring update of type {}", kind);
                Outcome::Ignored { kind }
            }
        }
    }

    async fn handle_message(&self, chat_id: i64, text: &str) -> Outcome {
        info!("Message from chat {} ({} chars)", chat_id, text.len());

        let (reply, body) = match parse_command(text) {
            Some(Command::Start) => (ReplyKind::Greeting, self.replies.greeting.clone()),
            Some(Command::About) => (ReplyKind::About, self.replies.about.clone()),
            None => match self.completion.complete(text).await {
                Ok(answer) => (ReplyKind::Completion, answer),
                Err(e) => {
                    warn!("Completion failed for chat {}: {:#}", chat_id, e);
                    (ReplyKind::Apology, self.replies.apology.clone())
                }
            },
        };

        let delivered = match self.messenger.send_message(chat_id, &body).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to deliver reply to chat {}: {:#}", chat_id, e);
                false
            }
        };

        Outcome::Replied {
            chat_id,
            reply,
            delivered,
        }
    }

    async fn handle_inline_query(&self, query_id: String, query: &str) -> Outcome {
        info!("Inline query {} ({} chars)", query_id, query.len());

        let placeholder = InlineArticle {
            id: INLINE_PLACEHOLDER_ID.to_string(),
            title: self.replies.inline_title.clone(),
            description: self.replies.inline_description.clone(),
            message_text: self.replies.inline_message.clone(),
        };

        let delivered = match self
            .messenger
            .answer_inline_query(&query_id, vec![placeholder])
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to answer inline query {}: {:#}", query_id, e);
                false
            }
        };

        Outcome::InlineAnswered {
            query_id,
            delivered,
        }
    }
}
