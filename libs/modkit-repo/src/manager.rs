//! Per-scope repository registry and unit-of-work coordinator.

use std::any::{Any, TypeId, type_name};
use std::sync::Arc;

use dashmap::DashMap;
use modkit_security::{SecurityContext, roles};
use sea_orm::{ActiveModelBehavior, DatabaseConnection, IntoActiveModel, TryIntoModel};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::audit::AuditService;
use crate::config::RepoConfig;
use crate::entity::ManagedEntity;
use crate::error::{RepoError, Result};
use crate::repository::RepositoryContext;
use crate::schema::Schema;
use crate::session::Session;
use crate::tx_config::TxConfig;

pub struct RepositoryManagerBuilder {
    conn: DatabaseConnection,
    schema: Arc<Schema>,
    security: SecurityContext,
    privileged_role: String,
    tx_defaults: TxConfig,
    cancel: CancellationToken,
}

impl RepositoryManagerBuilder {
    /// Apply the privileged role and transaction defaults from configuration.
    #[must_use]
    pub fn config(mut self, config: &RepoConfig) -> Self {
        self.privileged_role.clone_from(&config.privileged_role);
        self.tx_defaults = config.transaction;
        self
    }

    /// Role allowed to run cross-tenant queries. Defaults to `SystemAdmin`.
    #[must_use]
    pub fn privileged_role(mut self, role: impl Into<String>) -> Self {
        self.privileged_role = role.into();
        self
    }

    /// Isolation and access mode used by [`RepositoryManager::begin_transaction`].
    #[must_use]
    pub fn tx_defaults(mut self, config: TxConfig) -> Self {
        self.tx_defaults = config;
        self
    }

    /// Token cancelling every storage round trip of the scope.
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn build(self) -> RepositoryManager {
        RepositoryManager {
            session: Arc::new(Session::new(
                self.conn,
                self.schema,
                self.security,
                self.privileged_role,
                self.cancel,
            )),
            tx_defaults: self.tx_defaults,
            repositories: DashMap::new(),
        }
    }
}

/// Owns one scope (typically one request): its identity, its transaction
/// handle and the repositories created within it.
///
/// A manager is meant to be driven by one logical operation at a time. It is
/// cheap to create; drop it at the end of the scope. Dropping it with an open
/// transaction rolls the transaction back.
pub struct RepositoryManager {
    session: Arc<Session>,
    tx_defaults: TxConfig,
    repositories: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl RepositoryManager {
    #[must_use]
    pub fn builder(
        conn: DatabaseConnection,
        schema: Arc<Schema>,
        security: SecurityContext,
    ) -> RepositoryManagerBuilder {
        RepositoryManagerBuilder {
            conn,
            schema,
            security,
            privileged_role: roles::SYSTEM_ADMIN.to_owned(),
            tx_defaults: TxConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn new(conn: DatabaseConnection, schema: Arc<Schema>, security: SecurityContext) -> Self {
        Self::builder(conn, schema, security).build()
    }

    #[must_use]
    pub fn security_context(&self) -> &SecurityContext {
        self.session.security()
    }

    /// Repository for `E`, created on first access and reused for the rest of the scope.
    ///
    /// # Errors
    /// `RepoError::NotRegistered` if `E` was not registered in the schema.
    pub fn repository<E>(&self) -> Result<Arc<RepositoryContext<E>>>
    where
        E: ManagedEntity,
        E::Model: IntoActiveModel<E::ActiveModel> + Sync,
        E::ActiveModel: ActiveModelBehavior + TryIntoModel<E::Model> + Send + Sync + 'static,
    {
        let descriptor = self
            .session
            .schema()
            .descriptor::<E>()
            .ok_or(RepoError::NotRegistered(type_name::<E>()))?;

        let cached = self
            .repositories
            .entry(TypeId::of::<E>())
            .or_insert_with(|| {
                Arc::new(RepositoryContext::<E>::new(
                    Arc::clone(&self.session),
                    descriptor.table().to_owned(),
                )) as Arc<dyn Any + Send + Sync>
            })
            .value()
            .clone();

        cached
            .downcast::<RepositoryContext<E>>()
            .map_err(|_| RepoError::NotRegistered(type_name::<E>()))
    }

    /// Writer for business-level audit entries of this scope.
    #[must_use]
    pub fn audit(&self) -> AuditService {
        AuditService::new(Arc::clone(&self.session))
    }

    /// Opens the scope's unit of work with the configured defaults.
    ///
    /// # Errors
    /// `RepoError::TransactionAlreadyOpen` if one is already open.
    pub async fn begin_transaction(&self) -> Result<()> {
        self.begin_transaction_with(self.tx_defaults).await
    }

    /// # Errors
    /// `RepoError::TransactionAlreadyOpen` if one is already open.
    #[instrument(skip(self), level = "debug")]
    pub async fn begin_transaction_with(&self, config: TxConfig) -> Result<()> {
        self.session.begin(config).await?;
        tracing::debug!("transaction started");
        Ok(())
    }

    /// Flushes staged changes and commits. Returns the number of changes flushed.
    ///
    /// The transaction handle is released even when the commit fails, in
    /// which case everything done in the unit of work is rolled back and the
    /// staged changes remain for a retry.
    ///
    /// # Errors
    /// `RepoError::NoActiveTransaction` without a preceding `begin_transaction`.
    #[instrument(skip(self), level = "debug")]
    pub async fn commit(&self) -> Result<usize> {
        let flushed = self.session.commit().await?;
        tracing::debug!(flushed, "transaction committed");
        Ok(flushed)
    }

    /// Rolls back the unit of work and discards staged changes.
    ///
    /// # Errors
    /// `RepoError::NoActiveTransaction` without a preceding `begin_transaction`.
    #[instrument(skip(self), level = "debug")]
    pub async fn rollback(&self) -> Result<()> {
        self.session.rollback().await?;
        tracing::debug!("transaction rolled back");
        Ok(())
    }

    /// Flushes staged changes, inside the unit of work if one is open,
    /// otherwise in an implicit transaction. Returns the number flushed.
    ///
    /// # Errors
    /// Storage errors; the changes stay staged.
    pub async fn save_changes(&self) -> Result<usize> {
        self.session.save_changes().await
    }

    /// Drops staged changes that were not flushed yet. Returns how many were dropped.
    pub async fn discard_changes(&self) -> usize {
        self.session.discard_changes().await
    }

    pub async fn pending_changes(&self) -> usize {
        self.session.lock().await.pending_len()
    }

    pub async fn has_transaction(&self) -> bool {
        self.session.lock().await.has_transaction()
    }
}
