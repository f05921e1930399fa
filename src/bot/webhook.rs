//! Webhook transport: an axum server receiving Telegram updates.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use super::BotContext;
use crate::config::BotConfig;
use crate::notify::{NotifyError, TelegramClient, Update};

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Clone)]
struct WebhookState {
    ctx: Arc<BotContext>,
    secret: Option<String>,
}

/// Build the webhook router: `POST {path}` for updates, `GET /health`.
pub fn create_router(ctx: Arc<BotContext>, path: &str, secret: Option<String>) -> Router {
    Router::new()
        .route(path, post(receive_update))
        .route("/health", get(health))
        .with_state(WebhookState { ctx, secret })
}

async fn health() -> &'static str {
    "ok"
}

async fn receive_update(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> StatusCode {
    if let Some(expected) = &state.secret {
        let given = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if given != Some(expected.as_str()) {
            warn!("Rejected update {} with a bad secret token", update.update_id);
            return StatusCode::UNAUTHORIZED;
        }
    }

    let ctx = state.ctx.clone();
    tokio::spawn(async move {
        ctx.handle_update(update).await;
    });
    StatusCode::OK
}

/// Point the bot's webhook at `url` unless it already is.
///
/// A configured secret is always (re)sent since `getWebhookInfo` does not
/// report it.
pub async fn ensure_webhook(
    client: &TelegramClient,
    url: &str,
    secret: Option<&str>,
) -> Result<(), NotifyError> {
    let info = client.get_webhook_info().await?;
    if info.pending_update_count > 0 {
        info!("{} update(s) pending delivery", info.pending_update_count);
    }
    if info.url == url && secret.is_none() {
        info!("Webhook already set to {}", url);
        return Ok(());
    }

    client.set_webhook(url, secret).await?;
    info!("Webhook set to {} (was '{}')", url, info.url);
    Ok(())
}

/// Register the webhook and serve on `0.0.0.0:{port}` until Ctrl+C, then
/// remove the webhook.
pub async fn serve_webhook(ctx: Arc<BotContext>, config: &BotConfig) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    serve_webhook_with(ctx, config, listener, shutdown_signal()).await
}

/// Register the webhook and serve on `listener` until `shutdown` resolves.
///
/// A failed registration is logged and the server starts anyway, so the
/// schedule keeps running while Telegram is unreachable.
pub async fn serve_webhook_with<F>(
    ctx: Arc<BotContext>,
    config: &BotConfig,
    listener: TcpListener,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let url = config.webhook_url()?;
    if let Err(e) = ensure_webhook(ctx.client(), &url, config.webhook_secret.as_deref()).await {
        error!("Failed to set webhook to {}: {}", url, e);
    }

    let app = create_router(
        ctx.clone(),
        &config.webhook_path,
        config.webhook_secret.clone(),
    );

    info!("Listening for updates on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped; removing webhook");
    if let Err(e) = ctx.client().delete_webhook().await {
        warn!("Failed to remove webhook: {}", e);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::test_support::{context, context_at, CountingSource};
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    const SCAN_UPDATE: &str =
        r#"{"update_id": 5, "message": {"message_id": 3, "chat": {"id": 42}, "text": "/scan"}}"#;

    fn router(secret: Option<&str>) -> (Router, Arc<CountingSource>) {
        let source = Arc::new(CountingSource::default());
        let app = create_router(
            context(source.clone()),
            "/webhook",
            secret.map(str::to_string),
        );
        (app, source)
    }

    fn post_update(body: &str, secret: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json");
        if let Some(secret) = secret {
            builder = builder.header(SECRET_HEADER, secret);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = router(None);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_update_accepted_and_dispatched() {
        let (app, source) = router(None);
        let response = app.oneshot(post_update(SCAN_UPDATE, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        for _ in 0..50 {
            if source.fetches.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_secret_token_enforced() {
        let (app, source) = router(Some("s3cret"));

        let rejected = app
            .clone()
            .oneshot(post_update(SCAN_UPDATE, Some("wrong")))
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);

        let missing = app
            .clone()
            .oneshot(post_update(SCAN_UPDATE, None))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);

        let accepted = app
            .oneshot(post_update(SCAN_UPDATE, Some("s3cret")))
            .await
            .unwrap();
        assert_eq!(accepted.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_update_rejected() {
        let (app, _) = router(None);
        let response = app
            .oneshot(post_update(r#"{"not": "an update"}"#, None))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_server_starts_when_webhook_registration_fails() {
        let deleted = Arc::new(AtomicUsize::new(0));
        let api = Router::new()
            .route(
                "/bottesttoken/getWebhookInfo",
                get(|| async {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(serde_json::json!({
                            "ok": false,
                            "error_code": 500,
                            "description": "Internal Server Error"
                        })),
                    )
                }),
            )
            .route(
                "/bottesttoken/deleteWebhook",
                get({
                    let deleted = deleted.clone();
                    move || async move {
                        deleted.fetch_add(1, Ordering::SeqCst);
                        Json(serde_json::json!({"ok": true, "result": true}))
                    }
                }),
            );
        let api_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_addr = api_listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(api_listener, api).await.unwrap();
        });

        let ctx = context_at(
            &format!("http://{}", api_addr),
            Arc::new(CountingSource::default()),
        );
        let config = BotConfig {
            public_domain: Some("bot.example.app".to_string()),
            ..BotConfig::default()
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            serve_webhook_with(ctx, &config, listener, async {
                let _ = stopped.await;
            })
            .await
        });

        let body = reqwest::get(format!("http://{}/health", addr))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ok");

        stop.send(()).unwrap();
        server.await.unwrap().unwrap();
        assert_eq!(deleted.load(Ordering::SeqCst), 1);
    }
}
