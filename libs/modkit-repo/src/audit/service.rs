use std::sync::Arc;

use chrono::Utc;
use sea_orm::ActiveValue::Set;
use serde::Serialize;
use uuid::Uuid;

use super::entry::{self, AuditAction, AuditEntry};
use crate::error::Result;
use crate::session::Session;

/// Append-only writer for business-level audit records.
///
/// Unlike repository mutations, entries are persisted immediately and
/// failures propagate: an audit record must never be dropped silently.
/// When the scope has an open unit of work the entry is written inside it.
#[derive(Clone)]
pub struct AuditService {
    session: Arc<Session>,
}

impl AuditService {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Records `action` on `table`, with `payload` serialized to JSON if given.
    ///
    /// # Errors
    /// `RepoError::Serialization` if the payload cannot be serialized, storage
    /// errors otherwise.
    pub async fn log<P>(
        &self,
        action: AuditAction,
        table: &str,
        payload: Option<&P>,
    ) -> Result<AuditEntry>
    where
        P: Serialize + ?Sized,
    {
        let action_data = payload.map(serde_json::to_string).transpose()?;
        let security = self.session.security();

        let am = entry::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            action: Set(action),
            audit_date: Set(Utc::now()),
            user_id: Set(self.session.resolve_actor(None)),
            user_name: Set(security.actor_name().map(ToOwned::to_owned)),
            table_name: Set(table.to_owned()),
            action_data: Set(action_data),
        };

        let state = self.session.lock().await;
        let runner = state.runner(self.session.conn());
        let entry = self
            .session
            .cancellable(async { Ok(runner.insert(am).await?) })
            .await?;

        tracing::debug!(table, ?action, entry_id = %entry.id, "audit entry recorded");
        Ok(entry)
    }

    /// # Errors
    /// See [`log`](Self::log).
    pub async fn log_create<P: Serialize + ?Sized>(
        &self,
        table: &str,
        payload: Option<&P>,
    ) -> Result<AuditEntry> {
        self.log(AuditAction::Create, table, payload).await
    }

    /// # Errors
    /// See [`log`](Self::log).
    pub async fn log_update<P: Serialize + ?Sized>(
        &self,
        table: &str,
        payload: Option<&P>,
    ) -> Result<AuditEntry> {
        self.log(AuditAction::Update, table, payload).await
    }

    /// # Errors
    /// See [`log`](Self::log).
    pub async fn log_delete<P: Serialize + ?Sized>(
        &self,
        table: &str,
        payload: Option<&P>,
    ) -> Result<AuditEntry> {
        self.log(AuditAction::Delete, table, payload).await
    }

    /// # Errors
    /// See [`log`](Self::log).
    pub async fn log_restore<P: Serialize + ?Sized>(
        &self,
        table: &str,
        payload: Option<&P>,
    ) -> Result<AuditEntry> {
        self.log(AuditAction::Restore, table, payload).await
    }
}
