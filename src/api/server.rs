//! API server lifecycle: bind → spawn background task → return a handle
//! with a shutdown channel.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::api::router::api_router;
use crate::core_state::CoreState;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind API server on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("Failed to read bound address: {0}")]
    LocalAddr(std::io::Error),
}

/// Handle to a running API server.
pub struct ApiServer {
    pub addr: SocketAddr,
    pub started_at: DateTime<Utc>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ApiServer {
    /// Ask the server to stop accepting connections. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }

    /// Wait for the server task to finish.
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            tracing::error!("API server task failed: {e}");
        }
    }
}

/// Bind `addr` (port 0 picks an ephemeral port) and serve the full router
/// in a background task.
pub async fn start_api_server(
    core: Arc<CoreState>,
    addr: SocketAddr,
) -> Result<ApiServer, ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

    let app = api_router(core);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("API server error: {e}");
        }
        tracing::info!("API server stopped");
    });

    Ok(ApiServer {
        addr,
        started_at: Utc::now(),
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures_util::StreamExt;
    use serde_json::{json, Value};
    use tokio_tungstenite::tungstenite::Message;

    use crate::auth::register_user;
    use crate::config::AppConfig;
    use crate::models::enums::Role;

    async fn start(dir: &tempfile::TempDir) -> ApiServer {
        let core = CoreState::new(AppConfig {
            db_path: dir.path().join("server.db"),
            password_iterations: 5,
            ..AppConfig::default()
        })
        .unwrap();
        let conn = core.open_db().unwrap();
        register_user(&conn, None, "ops@clinic.test", "Ops", Role::Operator, "pw", 5).unwrap();
        drop(conn);

        start_api_server(Arc::new(core), SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("server should start")
    }

    #[tokio::test]
    async fn start_and_stop_server() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = start(&dir).await;
        assert!(server.addr.port() > 0);

        let resp = reqwest::get(format!("http://{}/api/health", server.addr))
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        let resp = reqwest::get(format!("http://{}/api/patients", server.addr))
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

        server.shutdown();
        server.shutdown();
        tokio::time::timeout(Duration::from_secs(5), server.wait())
            .await
            .expect("server should stop");
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = start(&dir).await;
        let core = CoreState::new(AppConfig {
            db_path: dir.path().join("other.db"),
            ..AppConfig::default()
        })
        .unwrap();
        let second = start_api_server(Arc::new(core), first.addr).await;
        assert!(matches!(second, Err(ServerError::Bind { .. })));
        first.shutdown();
    }

    #[tokio::test]
    async fn change_feed_streams_mutations() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = start(&dir).await;
        let base = format!("http://{}", server.addr);
        let client = reqwest::Client::new();

        let login: Value = client
            .post(format!("{base}/api/auth/login"))
            .json(&json!({ "email": "ops@clinic.test", "password": "pw" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let token = login["token"].as_str().unwrap().to_string();

        let ticket: Value = client
            .post(format!("{base}/api/auth/ws-ticket"))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let ticket = ticket["ticket"].as_str().unwrap();

        let (mut ws, _) = tokio_tungstenite::connect_async(format!(
            "ws://{}/ws/changes?ticket={ticket}",
            server.addr
        ))
        .await
        .unwrap();

        let next_json = |msg: Message| -> Value {
            match msg {
                Message::Text(text) => serde_json::from_str(&text).unwrap(),
                other => panic!("unexpected frame: {other:?}"),
            }
        };

        let welcome = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(next_json(welcome)["type"], "welcome");

        let doctor: Value = client
            .post(format!("{base}/api/doctors"))
            .bearer_auth(&token)
            .json(&json!({ "name": "Dr. Sari", "email": "sari@clinic.test", "password": "pw" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let mut collections = Vec::new();
        for _ in 0..2 {
            let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            let event = next_json(frame);
            assert_eq!(event["type"], "change");
            assert_eq!(event["action"], "create");
            assert_eq!(event["documentId"], doctor["id"]);
            collections.push(event["collection"].as_str().unwrap().to_string());
        }
        assert_eq!(collections, vec!["users", "doctors"]);

        // Tickets are single use.
        let reuse = tokio_tungstenite::connect_async(format!(
            "ws://{}/ws/changes?ticket={ticket}",
            server.addr
        ))
        .await;
        assert!(reuse.is_err());

        server.shutdown();
    }
}
