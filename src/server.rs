use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::dispatcher::{Dispatcher, Outcome};
use crate::error::RelayError;
use crate::update::Update;

/// Shared application state
pub struct AppState {
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/webhook", post(webhook))
        .with_state(state)
}

async fn home() -> &'static str {
    "You are Home."
}

async fn webhook(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, RelayError> {
    let update = Update::from_slice(&body)?;
    debug!("Webhook delivered {}", update.kind());

    let body = match state.dispatcher.dispatch(update).await {
        Outcome::Ignored { kind } => json!({"status": "ignored", "update_type": kind}),
        Outcome::Replied {
            chat_id,
            reply,
            delivered,
        } => {
            debug!("Replied to chat {} with {:?} (delivered: {})", chat_id, reply, delivered);
            json!({"status": "ok"})
        }
        Outcome::InlineAnswered {
            query_id,
            delivered,
        } => {
            debug!("Answered inline query {} (delivered: {})", query_id, delivered);
            json!({"status": "ok"})
        }
    };
    Ok(Json(body))
}

/// Serve the webhook on `listen_addr` until Ctrl-C.
pub async fn serve(listen_addr: &str, state: Arc<AppState>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {listen_addr}"))?;

    info!("Listening on {}", listen_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepliesConfig;
    use crate::dispatcher::tests::{RecordingMessenger, ScriptedCompletion, Sent};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn app(
        messenger: &Arc<RecordingMessenger>,
        completion: &Arc<ScriptedCompletion>,
    ) -> Router {
        let dispatcher = Dispatcher::new(
            messenger.clone(),
            completion.clone(),
            RepliesConfig::default(),
        );
        router(Arc::new(AppState::new(dispatcher)))
    }

    async fn post_webhook(app: Router, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_home_is_alive() {
        let messenger = Arc::new(RecordingMessenger::default());
        let completion = Arc::new(ScriptedCompletion::answering("unused"));
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();

        let response = app(&messenger, &completion).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"You are Home.");
    }

    #[tokio::test]
    async fn test_start_scenario() {
        let messenger = Arc::new(RecordingMessenger::default());
        let completion = Arc::new(ScriptedCompletion::answering("unused"));

        let (status, body) = post_webhook(
            app(&messenger, &completion),
            r#"{"message":{"chat":{"id":42},"text":"/start"}}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
        assert_eq!(
            messenger.sent(),
            vec![Sent::Message {
                chat_id: 42,
                text: "Hello! I'm Florence. How may I assist you today?".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_completion_failure_scenario() {
        let messenger = Arc::new(RecordingMessenger::default());
        let completion = Arc::new(ScriptedCompletion::failing());

        let (status, _) = post_webhook(
            app(&messenger, &completion),
            r#"{"message":{"chat":{"id":7},"text":"What is 2+2?"}}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            messenger.sent(),
            vec![Sent::Message {
                chat_id: 7,
                text: "I'm sorry, I'm having trouble processing your request right now."
                    .to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_unrecognized_update_reports_ignored() {
        let messenger = Arc::new(RecordingMessenger::default());
        let completion = Arc::new(ScriptedCompletion::answering("unused"));

        let (status, body) = post_webhook(
            app(&messenger, &completion),
            r#"{"update_id":1,"channel_post":{"chat":{"id":1},"text":"news"}}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"status": "ignored", "update_type": "channel_post"})
        );
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_missing_chat_is_bad_request() {
        let messenger = Arc::new(RecordingMessenger::default());
        let completion = Arc::new(ScriptedCompletion::answering("unused"));

        let (status, body) =
            post_webhook(app(&messenger, &completion), r#"{"message":{"text":"hi"}}"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert!(body["message"]
            .as_str()
            .unwrap()
            .starts_with("invalid payload"));
        assert!(messenger.sent().is_empty());
        assert!(completion.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let messenger = Arc::new(RecordingMessenger::default());
        let completion = Arc::new(ScriptedCompletion::answering("unused"));

        let (status, body) = post_webhook(app(&messenger, &completion), "{not json").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_delivery_failure_still_ok() {
        let messenger = Arc::new(RecordingMessenger {
            fail: true,
            ..Default::default()
        });
        let completion = Arc::new(ScriptedCompletion::answering("unused"));

        let (status, body) = post_webhook(
            app(&messenger, &completion),
            r#"{"inline_query":{"id":"q","query":"x"}}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }
}
