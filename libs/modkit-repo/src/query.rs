//! Composable, tenant-scoped queries.

use std::sync::Arc;

use sea_orm::sea_query::IntoCondition;
use sea_orm::{
    ColumnTrait, EntityTrait, IntoSimpleExpr, Order, QueryFilter, QueryOrder, QuerySelect, Select,
};

use crate::entity::ManagedEntity;
use crate::error::Result;
use crate::session::Session;

/// Which rows to return with respect to the soft-delete flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletedFilter {
    /// Active and soft-deleted rows alike.
    #[default]
    All,
    OnlyActive,
    OnlyDeleted,
}

/// A query over `E` carrying the scope it executes in.
///
/// The tenant predicate is attached when the query is created by a
/// repository, so every refinement below narrows an already scoped set.
/// Execution runs inside the scope's open transaction, if any.
#[must_use]
pub struct ScopedQuery<E: EntityTrait> {
    select: Select<E>,
    session: Arc<Session>,
}

impl<E> ScopedQuery<E>
where
    E: ManagedEntity,
    E::Model: Sync,
{
    pub(crate) fn new(select: Select<E>, session: Arc<Session>) -> Self {
        Self { select, session }
    }

    /// Add an additional filter. Filters combine with AND.
    pub fn filter<F: IntoCondition>(mut self, filter: F) -> Self {
        self.select = QueryFilter::filter(self.select, filter);
        self
    }

    /// Orderings apply in call order.
    pub fn order_by<C: IntoSimpleExpr>(mut self, col: C, order: Order) -> Self {
        self.select = QueryOrder::order_by(self.select, col, order);
        self
    }

    pub fn order_by_asc<C: IntoSimpleExpr>(self, col: C) -> Self {
        self.order_by(col, Order::Asc)
    }

    pub fn order_by_desc<C: IntoSimpleExpr>(self, col: C) -> Self {
        self.order_by(col, Order::Desc)
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.select = QuerySelect::limit(self.select, limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.select = QuerySelect::offset(self.select, offset);
        self
    }

    /// Restrict by soft-delete state. A no-op for entities without a soft-delete column.
    pub fn deleted(self, filter: DeletedFilter) -> Self {
        let Some(col) = E::lifecycle().deleted_col() else {
            return self;
        };
        match filter {
            DeletedFilter::All => self,
            DeletedFilter::OnlyActive => self.filter(col.eq(false)),
            DeletedFilter::OnlyDeleted => self.filter(col.eq(true)),
        }
    }

    /// Unwrap into the underlying `SeaORM` select, tenant predicate included.
    pub fn into_select(self) -> Select<E> {
        self.select
    }

    /// Execute and return all matching rows.
    ///
    /// # Errors
    /// Propagates storage errors; `RepoError::Cancelled` if the scope is cancelled.
    pub async fn all(self) -> Result<Vec<E::Model>> {
        let Self { select, session } = self;
        let state = session.lock().await;
        let runner = state.runner(session.conn());
        session
            .cancellable(async { Ok(runner.all(select).await?) })
            .await
    }

    /// Execute and return the first matching row.
    ///
    /// # Errors
    /// Propagates storage errors; `RepoError::Cancelled` if the scope is cancelled.
    pub async fn one(self) -> Result<Option<E::Model>> {
        let Self { select, session } = self;
        let state = session.lock().await;
        let runner = state.runner(session.conn());
        session
            .cancellable(async { Ok(runner.one(select).await?) })
            .await
    }

    /// Count matching rows.
    ///
    /// # Errors
    /// Propagates storage errors; `RepoError::Cancelled` if the scope is cancelled.
    pub async fn count(self) -> Result<u64> {
        let Self { select, session } = self;
        let state = session.lock().await;
        let runner = state.runner(session.conn());
        session
            .cancellable(async { Ok(runner.count(select).await?) })
            .await
    }
}
