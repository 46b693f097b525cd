use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
};
use axum_server::{Handle, Server};
use serde::Deserialize;
use tokio::sync::{Mutex, oneshot};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use gitvault_common::error::Error;

/// Structure to hold the final result from the OAuth redirect callback.
#[derive(Debug, Clone)]
pub struct CallbackResult {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Query string we expect from the authorization endpoint redirect:
/// ?code=xxx&state=... (or ?error=...&error_description=... on denial).
#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Shared state for the Axum callback route.
#[derive(Clone)]
struct CallbackServerState {
    /// Once we receive the redirect, we send it through `done_tx`.
    done_tx: Arc<Mutex<Option<oneshot::Sender<CallbackResult>>>>,
}

/// Starts a loopback HTTP listener for the OAuth redirect. Pass port 0 to
/// bind an ephemeral port; the actual port is returned. Exactly one
/// callback request is awaited; the shutdown sender tears the listener
/// down without leaking state.
pub async fn start_callback_server(
    port: u16,
) -> Result<(u16, oneshot::Receiver<CallbackResult>, oneshot::Sender<()>), Error> {
    let (done_tx, done_rx) = oneshot::channel::<CallbackResult>();
    let done_tx = Arc::new(Mutex::new(Some(done_tx)));

    let state = CallbackServerState { done_tx };

    let app = Router::new()
        .route("/", get(handle_callback))
        .route("/callback", get(handle_callback))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let (shutdown_send, shutdown_recv) = oneshot::channel::<()>();
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let handle = Handle::new();
    let handle_clone = handle.clone();

    tokio::spawn(async move {
        let _ = shutdown_recv.await;
        handle_clone.graceful_shutdown(None);
    });

    let server = Server::bind(addr)
        .handle(handle.clone())
        .serve(app.into_make_service());

    tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Callback server error: {}", e);
        }
    });

    let bound = handle
        .listening()
        .await
        .ok_or_else(|| Error::Auth("failed to bind OAuth callback listener".to_string()))?;
    info!("OAuth callback server listening on http://{}", bound);

    Ok((bound.port(), done_rx, shutdown_send))
}

async fn handle_callback(
    State(state): State<CallbackServerState>,
    Query(query): Query<AuthQuery>,
) -> (StatusCode, Html<String>) {
    let result = CallbackResult {
        code: query.code.clone(),
        state: query.state.clone(),
        error: query.error.clone(),
        error_description: query.error_description.clone(),
    };

    if let Some(tx) = state.done_tx.lock().await.take() {
        let _ = tx.send(result);
    }

    if let Some(err) = query.error.as_ref() {
        let desc = query.error_description.clone().unwrap_or_default();
        let msg = format!("<h2>Authentication Failed</h2><p>{}</p><p>{}</p>", err, desc);
        return (StatusCode::OK, Html(msg));
    }

    if query.code.is_some() {
        // A snippet that tries to auto-close the browser tab:
        let success = r#"
<h2>Authentication Successful</h2>
<p>You may now return to the terminal. You can close this window.</p>
<script>
  window.onload = function() {
      window.open('about:blank', '_self');
      window.close();
  };
</script>
"#;
        return (StatusCode::OK, Html(success.to_string()));
    }

    let msg = "<h2>Missing 'code' query param</h2><p>Check logs or try again.</p>";
    (StatusCode::OK, Html(msg.to_string()))
}
