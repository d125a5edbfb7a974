//! Shared application state.
//!
//! `CoreState` is built once at startup, wrapped in `Arc`, and shared by
//! every HTTP handler. It owns the configuration, the live sessions, the
//! change feed and the webhook client. Database connections are opened per
//! request.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use crate::changes::ChangeFeed;
use crate::config::AppConfig;
use crate::db;
use crate::models::enums::{ChangeAction, Collection};
use crate::models::User;
use crate::notify::{NotifyError, WebhookNotifier};

/// Live login sessions keyed by the SHA-256 hash of the bearer token.
pub type SessionMap = HashMap<[u8; 32], User>;

pub struct CoreState {
    pub config: AppConfig,
    sessions: RwLock<SessionMap>,
    changes: ChangeFeed,
    notifier: WebhookNotifier,
}

impl CoreState {
    pub fn new(config: AppConfig) -> Result<Self, CoreError> {
        let notifier = WebhookNotifier::new(&config)?;
        if !notifier.is_enabled() {
            tracing::info!("No webhook URL configured; schedule notifications disabled");
        }
        Ok(Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            changes: ChangeFeed::new(),
            notifier,
        })
    }

    /// Open a fresh connection to the configured database.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.config.db_path).map_err(CoreError::Database)
    }

    pub fn db_path(&self) -> PathBuf {
        self.config.db_path.clone()
    }

    pub fn read_sessions(&self) -> Result<RwLockReadGuard<'_, SessionMap>, CoreError> {
        self.sessions.read().map_err(|_| CoreError::LockPoisoned)
    }

    pub fn write_sessions(&self) -> Result<RwLockWriteGuard<'_, SessionMap>, CoreError> {
        self.sessions.write().map_err(|_| CoreError::LockPoisoned)
    }

    pub fn changes(&self) -> &ChangeFeed {
        &self.changes
    }

    /// Shorthand for publishing one committed mutation.
    pub fn publish(&self, collection: Collection, action: ChangeAction, document_id: Uuid) {
        self.changes.publish(collection, action, document_id);
    }

    pub fn notifier(&self) -> &WebhookNotifier {
        &self.notifier
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Notifier setup failed: {0}")]
    Notifier(#[from] NotifyError),
}
