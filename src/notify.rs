//! Outbound webhook for schedule creation.
//!
//! Delivery is best effort: one POST, bounded by a timeout, never retried.
//! Failures are logged and dropped so the originating mutation still succeeds.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::config::AppConfig;
use crate::models::enums::{ChangeAction, Collection, Role};

/// Fields never forwarded to the webhook.
const SENSITIVE_FIELDS: &[&str] = &["password", "passwordHash"];

/// Who triggered the notification.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: String,
    pub role: Role,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub action: ChangeAction,
    pub collection: Collection,
    pub document_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_data: Option<Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    pub source: String,
    pub environment: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP client setup failed: {0}")]
    Client(String),
    #[error("Webhook request failed: {0}")]
    Request(String),
    #[error("Webhook returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Drop sensitive keys from a JSON object. Non-objects pass through.
pub fn sanitize(mut data: Value) -> Value {
    if let Value::Object(map) = &mut data {
        for field in SENSITIVE_FIELDS {
            map.remove(*field);
        }
    }
    data
}

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Option<String>,
    source: String,
    environment: String,
}

impl WebhookNotifier {
    pub fn new(config: &AppConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.webhook_timeout_secs))
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;

        Ok(Self {
            client,
            url: config.webhook_url.clone(),
            source: config.source.clone(),
            environment: config.environment.clone(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    /// Build the envelope, sanitizing both snapshots.
    pub fn payload(
        &self,
        action: ChangeAction,
        collection: Collection,
        document_id: impl Into<String>,
        data: Option<Value>,
        previous_data: Option<Value>,
        actor: Option<&Actor>,
    ) -> WebhookPayload {
        WebhookPayload {
            action,
            collection,
            document_id: document_id.into(),
            data: data.map(sanitize),
            previous_data: previous_data.map(sanitize),
            timestamp: Utc::now(),
            user_id: actor.map(|a| a.id.clone()),
            user_role: actor.map(|a| a.role),
            user_name: actor.map(|a| a.name.clone()),
            source: self.source.clone(),
            environment: self.environment.clone(),
        }
    }

    /// Send and report the outcome.
    pub async fn send(&self, payload: &WebhookPayload) -> Result<(), NotifyError> {
        let Some(url) = self.url.as_deref() else {
            return Ok(());
        };

        let response = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(
            action = %payload.action,
            collection = %payload.collection,
            document_id = %payload.document_id,
            "Webhook notification delivered"
        );
        Ok(())
    }

    /// Send, logging and discarding any failure.
    pub async fn notify(&self, payload: WebhookPayload) {
        if !self.is_enabled() {
            return;
        }
        if let Err(e) = self.send(&payload).await {
            tracing::warn!(
                error = %e,
                collection = %payload.collection,
                document_id = %payload.document_id,
                "Webhook notification failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};

    type Captured = Arc<Mutex<Vec<Value>>>;

    async fn spawn_receiver(status: StatusCode) -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/hook",
                post(
                    move |State(store): State<Captured>, Json(body): Json<Value>| async move {
                        store.lock().unwrap().push(body);
                        status
                    },
                ),
            )
            .with_state(captured.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/hook"), captured)
    }

    fn notifier_for(url: Option<String>) -> WebhookNotifier {
        let config = AppConfig {
            webhook_url: url,
            webhook_timeout_secs: 2,
            ..AppConfig::default()
        };
        WebhookNotifier::new(&config).unwrap()
    }

    fn actor() -> Actor {
        Actor {
            id: "op-1".into(),
            role: Role::Operator,
            name: "Ops".into(),
        }
    }

    #[test]
    fn sanitize_strips_password_fields() {
        let cleaned = sanitize(serde_json::json!({
            "name": "Dr. Sari",
            "password": "hunter2",
            "passwordHash": "x",
        }));
        assert_eq!(cleaned, serde_json::json!({"name": "Dr. Sari"}));
    }

    #[test]
    fn payload_carries_source_and_actor() {
        let notifier = notifier_for(None);
        let payload = notifier.payload(
            ChangeAction::Create,
            Collection::MedicationSchedules,
            "sched-1",
            Some(serde_json::json!({"medicationName": "Metformin", "password": "p"})),
            None,
            Some(&actor()),
        );
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["action"], "create");
        assert_eq!(json["collection"], "medication_schedules");
        assert_eq!(json["documentId"], "sched-1");
        assert_eq!(json["source"], "BeomMed System");
        assert_eq!(json["environment"], "development");
        assert_eq!(json["userRole"], "operator");
        assert!(json["data"].get("password").is_none());
        assert!(json.get("previousData").is_none());
    }

    #[tokio::test]
    async fn disabled_notifier_sends_nothing() {
        let notifier = notifier_for(None);
        assert!(!notifier.is_enabled());
        let payload = notifier.payload(
            ChangeAction::Create,
            Collection::MedicationSchedules,
            "x",
            None,
            None,
            None,
        );
        assert!(notifier.send(&payload).await.is_ok());
    }

    #[tokio::test]
    async fn delivers_json_envelope() {
        let (url, captured) = spawn_receiver(StatusCode::OK).await;
        let notifier = notifier_for(Some(url));
        let payload = notifier.payload(
            ChangeAction::Create,
            Collection::MedicationSchedules,
            "sched-9",
            Some(serde_json::json!({"dosage": "500mg"})),
            None,
            Some(&actor()),
        );
        notifier.send(&payload).await.unwrap();

        let bodies = captured.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["documentId"], "sched-9");
        assert_eq!(bodies[0]["data"]["dosage"], "500mg");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error_but_notify_swallows_it() {
        let (url, captured) = spawn_receiver(StatusCode::INTERNAL_SERVER_ERROR).await;
        let notifier = notifier_for(Some(url));
        let payload = notifier.payload(
            ChangeAction::Create,
            Collection::MedicationSchedules,
            "sched-2",
            None,
            None,
            None,
        );
        let err = notifier.send(&payload).await.unwrap_err();
        assert!(matches!(err, NotifyError::Status { status: 500, .. }));

        notifier.notify(payload).await;
        assert_eq!(captured.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_swallowed() {
        let notifier = notifier_for(Some("http://127.0.0.1:9/unreachable".into()));
        let payload = notifier.payload(
            ChangeAction::Create,
            Collection::MedicationSchedules,
            "sched-3",
            None,
            None,
            None,
        );
        notifier.notify(payload).await;
    }
}
