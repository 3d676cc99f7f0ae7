//! Generic CRUD and audit engine for one entity type.
//!
//! Mutations follow a log-and-continue contract: a storage failure during
//! `add`, `update`, `soft_delete` or `restore` is logged with the entity table
//! and operation, and the call returns the entities as they were passed in.
//! Callers needing a durability guarantee must re-query or flush explicitly
//! through [`RepositoryManager::save_changes`](crate::RepositoryManager::save_changes).
//! `hard_delete` reports failure as `false`.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::IntoCondition;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, DbErr, IntoActiveModel, Iterable, Order,
    PrimaryKeyToColumn, PrimaryKeyTrait, Select, TryIntoModel,
};

use crate::audit::AuditStamps;
use crate::entity::{Lifecycle, ManagedEntity};
use crate::error::{RepoError, Result};
use crate::query::ScopedQuery;
use crate::session::{ChangeKind, Outcome, Session, Staged};

/// Per-call options of a mutating repository operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    acting_user: Option<String>,
    persist_immediately: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            acting_user: None,
            persist_immediately: true,
        }
    }
}

impl WriteOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp the batch with `user` instead of the ambient subject.
    #[must_use]
    pub fn acting_as(mut self, user: impl Into<String>) -> Self {
        self.acting_user = Some(user.into());
        self
    }

    /// Stage only; the caller flushes later via `save_changes` or `commit`.
    #[must_use]
    pub fn deferred(mut self) -> Self {
        self.persist_immediately = false;
        self
    }

    #[must_use]
    pub fn acting_user(&self) -> Option<&str> {
        self.acting_user.as_deref()
    }

    #[must_use]
    pub fn persist_immediately(&self) -> bool {
        self.persist_immediately
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Add,
    Update,
    SoftDelete,
    Restore,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::SoftDelete => "soft_delete",
            Self::Restore => "restore",
        }
    }

    fn change_kind(self) -> ChangeKind {
        match self {
            Self::Add => ChangeKind::Insert,
            Self::Update | Self::SoftDelete | Self::Restore => ChangeKind::Update,
        }
    }
}

/// Repository for entities of type `E`, bound to one manager's scope.
///
/// Obtained through [`RepositoryManager::repository`](crate::RepositoryManager::repository).
/// All operations are batch-first; the `_one` forms wrap a single entity.
pub struct RepositoryContext<E: ManagedEntity> {
    session: Arc<Session>,
    table: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E> RepositoryContext<E>
where
    E: ManagedEntity,
    E::Model: IntoActiveModel<E::ActiveModel> + Sync,
    E::ActiveModel: ActiveModelBehavior + TryIntoModel<E::Model> + Send + Sync + 'static,
{
    pub(crate) fn new(session: Arc<Session>, table: String) -> Self {
        Self {
            session,
            table,
            _entity: PhantomData,
        }
    }

    /// Table the repository writes to.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Query over every row visible to the scope's tenant.
    pub fn as_queryable(&self) -> ScopedQuery<E> {
        self.scoped(E::find())
    }

    /// Query ignoring the tenant filter.
    ///
    /// The bypass is only granted to contexts holding the privileged role;
    /// for everyone else this is the regular tenant-scoped query.
    pub fn all_tenants(&self) -> ScopedQuery<E> {
        if self.session.is_privileged() {
            tracing::debug!(entity = %self.table, "tenant filter bypassed for privileged context");
            ScopedQuery::new(E::find(), Arc::clone(&self.session))
        } else {
            self.as_queryable()
        }
    }

    pub fn get_all<F: IntoCondition>(&self, filter: F) -> ScopedQuery<E> {
        self.as_queryable().filter(filter)
    }

    /// Filtered query ordered by the given keys, in the order supplied.
    pub fn get_all_ordered<F, I>(&self, filter: F, order: I) -> ScopedQuery<E>
    where
        F: IntoCondition,
        I: IntoIterator<Item = (E::Column, Order)>,
    {
        order
            .into_iter()
            .fold(self.get_all(filter), |query, (col, ord)| query.order_by(col, ord))
    }

    /// # Errors
    /// Propagates storage errors.
    pub async fn fetch_all<F: IntoCondition>(&self, filter: F) -> Result<Vec<E::Model>> {
        self.get_all(filter).all().await
    }

    /// Point lookup by primary key; a tuple for composite keys.
    ///
    /// Rows hidden by the tenant filter are reported as absent.
    ///
    /// # Errors
    /// Propagates storage errors. Absence is `Ok(None)`.
    pub async fn get_by_id<K>(&self, id: K) -> Result<Option<E::Model>>
    where
        K: Into<<E::PrimaryKey as PrimaryKeyTrait>::ValueType>,
    {
        self.scoped(E::find_by_id(id)).one().await
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Stamps `created_*` and inserts. Returns the stored rows (with generated
    /// keys) when flushed, the stamped entities when deferred, or the input
    /// unchanged on failure.
    pub async fn add(&self, entities: Vec<E::Model>, opts: WriteOptions) -> Vec<E::Model> {
        self.mutate(entities, &opts, Operation::Add).await
    }

    pub async fn add_one(&self, entity: E::Model, opts: WriteOptions) -> E::Model {
        self.mutate_one(entity, &opts, Operation::Add).await
    }

    /// Stamps `modified_*` and writes every column.
    pub async fn update(&self, entities: Vec<E::Model>, opts: WriteOptions) -> Vec<E::Model> {
        self.mutate(entities, &opts, Operation::Update).await
    }

    pub async fn update_one(&self, entity: E::Model, opts: WriteOptions) -> E::Model {
        self.mutate_one(entity, &opts, Operation::Update).await
    }

    /// Active -> Deleted for audited entities; sets only the flag for
    /// flag-only entities; does nothing for permanent ones.
    pub async fn soft_delete(&self, entities: Vec<E::Model>, opts: WriteOptions) -> Vec<E::Model> {
        self.mutate(entities, &opts, Operation::SoftDelete).await
    }

    pub async fn soft_delete_one(&self, entity: E::Model, opts: WriteOptions) -> E::Model {
        self.mutate_one(entity, &opts, Operation::SoftDelete).await
    }

    /// Inverse of [`soft_delete`](Self::soft_delete).
    pub async fn restore(&self, entities: Vec<E::Model>, opts: WriteOptions) -> Vec<E::Model> {
        self.mutate(entities, &opts, Operation::Restore).await
    }

    pub async fn restore_one(&self, entity: E::Model, opts: WriteOptions) -> E::Model {
        self.mutate_one(entity, &opts, Operation::Restore).await
    }

    /// Removes the rows, bypassing the soft-delete lifecycle.
    ///
    /// Returns `false` if storage rejected the delete or a row did not exist.
    /// A deferred delete returns `true` once staged.
    pub async fn hard_delete(&self, entities: Vec<E::Model>, persist_immediately: bool) -> bool {
        let count = entities.len();
        let mut state = self.session.lock().await;
        let mark = state.pending_len();
        for entity in entities {
            let (staged, _) = Staged::new(ChangeKind::Delete, entity.into_active_model());
            state.stage(Box::new(staged));
        }
        if !persist_immediately {
            return true;
        }
        match self.session.flush(&mut state).await {
            Ok(_) => true,
            Err(err) => {
                state.unstage_from(mark);
                tracing::error!(
                    entity = %self.table,
                    operation = "hard_delete",
                    count,
                    error = %err,
                    "failed to delete entities"
                );
                false
            }
        }
    }

    pub async fn hard_delete_one(&self, entity: E::Model, persist_immediately: bool) -> bool {
        self.hard_delete(vec![entity], persist_immediately).await
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn scoped(&self, select: Select<E>) -> ScopedQuery<E> {
        let filter = self
            .session
            .schema()
            .descriptor::<E>()
            .and_then(|d| d.tenant_filter());
        let select = match filter {
            Some(filter) => sea_orm::QueryFilter::filter(
                select,
                filter.condition(self.session.security().tenant_id()),
            ),
            None => select,
        };
        ScopedQuery::new(select, Arc::clone(&self.session))
    }

    async fn mutate_one(&self, entity: E::Model, opts: &WriteOptions, op: Operation) -> E::Model {
        let fallback = entity.clone();
        self.mutate(vec![entity], opts, op)
            .await
            .pop()
            .unwrap_or(fallback)
    }

    async fn mutate(&self, entities: Vec<E::Model>, opts: &WriteOptions, op: Operation) -> Vec<E::Model> {
        if entities.is_empty() {
            return entities;
        }
        if matches!(op, Operation::SoftDelete | Operation::Restore)
            && matches!(E::lifecycle(), Lifecycle::Permanent)
        {
            tracing::warn!(
                entity = %self.table,
                operation = op.name(),
                "entity has no soft-delete column; nothing to do"
            );
            return entities;
        }

        let actor = self.session.resolve_actor(opts.acting_user());
        let prepared = entities
            .iter()
            .map(|entity| prepare::<E>(entity, op, actor.as_deref()))
            .collect::<std::result::Result<Vec<_>, DbErr>>();
        let prepared = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                self.log_failure(op, entities.len(), &RepoError::Db(err));
                return entities;
            }
        };

        let mut state = self.session.lock().await;
        let mark = state.pending_len();
        let mut staged_rows: Vec<(E::Model, Outcome<E::Model>)> = Vec::with_capacity(prepared.len());
        for (stamped, am) in prepared {
            let (staged, outcome) = Staged::new(op.change_kind(), am);
            state.stage(Box::new(staged));
            staged_rows.push((stamped, outcome));
        }

        if !opts.persist_immediately() {
            tracing::debug!(entity = %self.table, operation = op.name(), count = staged_rows.len(), "changes staged");
            return staged_rows.into_iter().map(|(stamped, _)| stamped).collect();
        }

        match self.session.flush(&mut state).await {
            Ok(_) => staged_rows
                .into_iter()
                .map(|(stamped, outcome)| outcome.lock().take().unwrap_or(stamped))
                .collect(),
            Err(err) => {
                state.unstage_from(mark);
                self.log_failure(op, entities.len(), &err);
                entities
            }
        }
    }

    fn log_failure(&self, op: Operation, count: usize, err: &RepoError) {
        tracing::error!(
            entity = %self.table,
            operation = op.name(),
            count,
            error = %err,
            "failed to persist entities; changes were not saved"
        );
    }
}

/// Stamps one entity for `op` and builds the active model to stage.
///
/// Returns the stamped model alongside it, so deferred callers see the
/// metadata before anything reaches storage.
fn prepare<E>(
    model: &E::Model,
    op: Operation,
    actor: Option<&str>,
) -> std::result::Result<(E::Model, E::ActiveModel), DbErr>
where
    E: ManagedEntity,
    E::Model: IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: TryIntoModel<E::Model>,
{
    // Every column is written: updates are full-row, inserts carry caller-supplied keys.
    let mut am = model.clone().into_active_model().reset_all();

    match E::lifecycle() {
        Lifecycle::Audited(cols) => {
            let mut stamps = AuditStamps::read(model, &cols)?;
            let now = Utc::now();
            match op {
                Operation::Add => stamps.mark_created(actor, now),
                Operation::Update => stamps.mark_modified(actor, now),
                Operation::SoftDelete => stamps.mark_deleted(actor, now),
                Operation::Restore => stamps.mark_restored(actor, now),
            }
            stamps.write(&mut am, &cols)?;
        }
        Lifecycle::DeletedFlag(col) => match op {
            Operation::SoftDelete => am.try_set(col, true.into())?,
            Operation::Restore => am.try_set(col, false.into())?,
            Operation::Add | Operation::Update => {}
        },
        Lifecycle::Permanent => {}
    }

    let stamped = am.clone().try_into_model()?;

    if op == Operation::Add && <E::PrimaryKey as PrimaryKeyTrait>::auto_increment() {
        for key in E::PrimaryKey::iter() {
            am.not_set(key.into_column());
        }
    }

    Ok((stamped, am))
}
