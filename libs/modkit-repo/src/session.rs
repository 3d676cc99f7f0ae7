//! State shared by one manager and every repository it hands out.
//!
//! A session owns the scope's transaction handle and the list of staged
//! changes. Repositories only stage and flush; opening and closing the unit of
//! work is reserved to the manager.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use modkit_security::SecurityContext;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityName, EntityTrait, IntoActiveModel, TransactionTrait,
};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::error::{RepoError, Result};
use crate::runner::SeaOrmRunner;
use crate::schema::Schema;
use crate::tx_config::TxConfig;

/// Storage primitive a staged change maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChangeKind {
    Insert,
    Update,
    Delete,
}

type ApplyFuture<'a> = Pin<Box<dyn Future<Output = std::result::Result<(), DbErr>> + Send + 'a>>;

/// A change waiting for the next flush.
pub(crate) trait StagedChange: Send + Sync {
    fn table(&self) -> String;

    fn apply<'a>(&'a self, tx: &'a DatabaseTransaction) -> ApplyFuture<'a>;
}

/// Slot receiving the row returned by storage once a staged change is applied.
pub(crate) type Outcome<M> = Arc<parking_lot::Mutex<Option<M>>>;

pub(crate) struct Staged<A: ActiveModelTrait> {
    kind: ChangeKind,
    model: A,
    outcome: Outcome<<A::Entity as EntityTrait>::Model>,
}

impl<A: ActiveModelTrait> Staged<A> {
    pub(crate) fn new(kind: ChangeKind, model: A) -> (Self, Outcome<<A::Entity as EntityTrait>::Model>) {
        let outcome: Outcome<_> = Arc::default();
        let staged = Self {
            kind,
            model,
            outcome: Arc::clone(&outcome),
        };
        (staged, outcome)
    }
}

impl<A> StagedChange for Staged<A>
where
    A: ActiveModelTrait + ActiveModelBehavior + Send + Sync + 'static,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A> + Sync,
{
    fn table(&self) -> String {
        A::Entity::default().table_name().to_owned()
    }

    fn apply<'a>(&'a self, tx: &'a DatabaseTransaction) -> ApplyFuture<'a> {
        Box::pin(async move {
            let stored = match self.kind {
                ChangeKind::Insert => Some(self.model.clone().insert(tx).await?),
                ChangeKind::Update => Some(self.model.clone().update(tx).await?),
                ChangeKind::Delete => {
                    let res = self.model.clone().delete(tx).await?;
                    if res.rows_affected == 0 {
                        return Err(DbErr::RecordNotFound(format!(
                            "no '{}' row matched the delete",
                            self.table()
                        )));
                    }
                    None
                }
            };
            *self.outcome.lock() = stored;
            Ok(())
        })
    }
}

#[derive(Default)]
pub(crate) struct SessionState {
    tx: Option<DatabaseTransaction>,
    pending: Vec<Box<dyn StagedChange>>,
}

impl SessionState {
    pub(crate) fn runner<'a>(&'a self, conn: &'a DatabaseConnection) -> SeaOrmRunner<'a> {
        match &self.tx {
            Some(tx) => SeaOrmRunner::Tx(tx),
            None => SeaOrmRunner::Conn(conn),
        }
    }

    pub(crate) fn has_transaction(&self) -> bool {
        self.tx.is_some()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn stage(&mut self, change: Box<dyn StagedChange>) {
        self.pending.push(change);
    }

    /// Drops every change staged after `mark`.
    pub(crate) fn unstage_from(&mut self, mark: usize) {
        self.pending.truncate(mark);
    }
}

pub(crate) struct Session {
    conn: DatabaseConnection,
    schema: Arc<Schema>,
    security: SecurityContext,
    privileged_role: String,
    cancel: CancellationToken,
    state: Mutex<SessionState>,
}

impl Session {
    pub(crate) fn new(
        conn: DatabaseConnection,
        schema: Arc<Schema>,
        security: SecurityContext,
        privileged_role: String,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            conn,
            schema,
            security,
            privileged_role,
            cancel,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub(crate) fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub(crate) fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn security(&self) -> &SecurityContext {
        &self.security
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }

    /// Acting user for a batch: the explicit override, else the ambient subject.
    pub(crate) fn resolve_actor(&self, acting_user: Option<&str>) -> Option<String> {
        acting_user
            .or_else(|| Some(self.security.subject_id()).filter(|s| !s.is_empty()))
            .map(ToOwned::to_owned)
    }

    pub(crate) fn is_privileged(&self) -> bool {
        self.security.is_in_role(&self.privileged_role)
    }

    /// Races `work` against the scope's cancellation token.
    ///
    /// When cancelled, `work` is dropped before completion; any storage
    /// transaction it opened rolls back on drop.
    pub(crate) async fn cancellable<T, F>(&self, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(RepoError::Cancelled),
            res = work => res,
        }
    }

    /// Applies every staged change atomically.
    ///
    /// Outside a unit of work the changes run in an implicit transaction;
    /// inside one they run in a savepoint so a failed flush leaves the outer
    /// transaction usable. On failure nothing is written and the changes stay
    /// staged.
    pub(crate) async fn flush(&self, state: &mut SessionState) -> Result<usize> {
        if state.pending.is_empty() {
            return Ok(0);
        }
        let count = state.pending.len();
        let in_transaction = state.tx.is_some();
        let pending = &state.pending;
        let outer = state.tx.as_ref();

        let tx = self
            .cancellable(async {
                Ok(match outer {
                    Some(outer) => outer.begin().await?,
                    None => self.conn.begin().await?,
                })
            })
            .await?;
        if let Err(err) = self.cancellable(apply_staged(pending, &tx)).await {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "failed to roll back flush");
            }
            return Err(err);
        }
        // COMMIT is not raced against cancellation: once sent it may be durable.
        tx.commit().await?;

        state.pending.clear();
        tracing::debug!(count, in_transaction, "flushed staged changes");
        Ok(count)
    }

    pub(crate) async fn begin(&self, config: TxConfig) -> Result<()> {
        let mut state = self.lock().await;
        if state.tx.is_some() {
            return Err(RepoError::TransactionAlreadyOpen);
        }
        let tx = self
            .cancellable(async {
                Ok(self
                    .conn
                    .begin_with_config(config.isolation_level(), config.sea_access_mode())
                    .await?)
            })
            .await?;
        state.tx = Some(tx);
        Ok(())
    }

    /// Flushes staged changes and commits. The handle is released whatever the outcome.
    ///
    /// Cancellation can interrupt applying the staged changes, never the COMMIT.
    pub(crate) async fn commit(&self) -> Result<usize> {
        let mut state = self.lock().await;
        let tx = state.tx.take().ok_or(RepoError::NoActiveTransaction)?;
        let count = state.pending.len();
        let pending = &state.pending;

        if let Err(err) = self.cancellable(apply_staged(pending, &tx)).await {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "failed to roll back unit of work");
            }
            return Err(err);
        }
        tx.commit().await?;

        state.pending.clear();
        Ok(count)
    }

    /// Rolls back and discards staged changes. The handle is released whatever the outcome.
    pub(crate) async fn rollback(&self) -> Result<()> {
        let mut state = self.lock().await;
        let tx = state.tx.take().ok_or(RepoError::NoActiveTransaction)?;
        state.pending.clear();
        self.cancellable(async move { Ok(tx.rollback().await?) })
            .await
    }

    pub(crate) async fn save_changes(&self) -> Result<usize> {
        let mut state = self.lock().await;
        self.flush(&mut state).await
    }

    pub(crate) async fn discard_changes(&self) -> usize {
        let mut state = self.lock().await;
        let dropped = state.pending.len();
        state.pending.clear();
        dropped
    }
}

async fn apply_staged(pending: &[Box<dyn StagedChange>], tx: &DatabaseTransaction) -> Result<()> {
    for change in pending {
        change.apply(tx).await?;
    }
    Ok(())
}
