//! Audit metadata carried by fully audited entities and its state machine.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::ValueType;
use sea_orm::{ActiveModelTrait, DbErr, EntityTrait, IdenStatic, ModelTrait, Value};
use serde::{Deserialize, Serialize};

use crate::entity::AuditColumns;

/// Persisted soft-delete state. A restore is recorded as metadata on `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditState {
    Active,
    Deleted,
}

/// Snapshot of the nine audit columns of one row.
///
/// Transitions keep the invariant that a deleted row has no restore stamp and
/// a restored row has no delete stamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStamps {
    pub created_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_by: Option<String>,
    pub modified_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub restored_by: Option<String>,
    pub restored_at: Option<DateTime<Utc>>,
}

impl AuditStamps {
    #[must_use]
    pub fn state(&self) -> AuditState {
        if self.is_deleted {
            AuditState::Deleted
        } else {
            AuditState::Active
        }
    }

    /// `true` if the row went through at least one delete/restore cycle.
    #[must_use]
    pub fn was_restored(&self) -> bool {
        !self.is_deleted && self.restored_at.is_some()
    }

    /// Starts a fresh history: every stamp other than `created_*` is cleared.
    pub fn mark_created(&mut self, actor: Option<&str>, at: DateTime<Utc>) {
        *self = Self {
            created_by: actor.map(ToOwned::to_owned),
            created_at: Some(at),
            ..Self::default()
        };
    }

    pub fn mark_modified(&mut self, actor: Option<&str>, at: DateTime<Utc>) {
        self.modified_by = actor.map(ToOwned::to_owned);
        self.modified_at = Some(at);
    }

    /// Active -> Deleted. Applying it to an already deleted row overwrites the delete stamp.
    pub fn mark_deleted(&mut self, actor: Option<&str>, at: DateTime<Utc>) {
        self.deleted_by = actor.map(ToOwned::to_owned);
        self.deleted_at = Some(at);
        self.is_deleted = true;
        self.restored_by = None;
        self.restored_at = None;
    }

    /// Deleted -> Active, recording who restored the row.
    pub fn mark_restored(&mut self, actor: Option<&str>, at: DateTime<Utc>) {
        self.restored_by = actor.map(ToOwned::to_owned);
        self.restored_at = Some(at);
        self.is_deleted = false;
        self.deleted_by = None;
        self.deleted_at = None;
    }

    /// Reads the stamps of `model` through the declared columns.
    ///
    /// # Errors
    /// Returns `DbErr::Type` if a column holds a value of an unexpected type.
    pub fn read<M: ModelTrait>(
        model: &M,
        cols: &AuditColumns<<M::Entity as EntityTrait>::Column>,
    ) -> Result<Self, DbErr> {
        Ok(Self {
            created_by: column_value(model, cols.created_by)?,
            created_at: column_value(model, cols.created_at)?,
            modified_by: column_value(model, cols.modified_by)?,
            modified_at: column_value(model, cols.modified_at)?,
            deleted_by: column_value(model, cols.deleted_by)?,
            deleted_at: column_value(model, cols.deleted_at)?,
            is_deleted: column_value(model, cols.is_deleted)?,
            restored_by: column_value(model, cols.restored_by)?,
            restored_at: column_value(model, cols.restored_at)?,
        })
    }

    /// Writes every stamp into `am`, marking the columns as set.
    ///
    /// # Errors
    /// Returns `DbErr::Type` if the active model rejects a value.
    pub fn write<A: ActiveModelTrait>(
        &self,
        am: &mut A,
        cols: &AuditColumns<<A::Entity as EntityTrait>::Column>,
    ) -> Result<(), DbErr> {
        am.try_set(cols.created_by, self.created_by.clone().into())?;
        am.try_set(cols.created_at, self.created_at.into())?;
        am.try_set(cols.modified_by, self.modified_by.clone().into())?;
        am.try_set(cols.modified_at, self.modified_at.into())?;
        am.try_set(cols.deleted_by, self.deleted_by.clone().into())?;
        am.try_set(cols.deleted_at, self.deleted_at.into())?;
        am.try_set(cols.is_deleted, self.is_deleted.into())?;
        am.try_set(cols.restored_by, self.restored_by.clone().into())?;
        am.try_set(cols.restored_at, self.restored_at.into())?;
        Ok(())
    }
}

fn column_value<M: ModelTrait, V: ValueType>(
    model: &M,
    col: <M::Entity as EntityTrait>::Column,
) -> Result<V, DbErr> {
    let value: Value = model.get(col);
    V::try_from(value)
        .map_err(|_| DbErr::Type(format!("unexpected value type in column '{}'", col.as_str())))
}
