//! Tenant row-visibility predicates.
//!
//! A predicate is built once per entity type when the type is registered in
//! the [`Schema`](crate::Schema) and reused for every query afterwards. No
//! query path of the repository can skip it except the explicit privileged
//! bypass.

use std::fmt;
use std::sync::Arc;

use sea_orm::sea_query::ColumnType;
use sea_orm::{ColumnTrait, Condition, IdenStatic};
use serde::{Deserialize, Serialize};

use crate::entity::ManagedEntity;
use crate::error::{RepoError, Result};

/// How rows without a tenant are treated for a request that has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantVisibility {
    /// A tenant sees only its own rows; tenant-less requests see only shared rows.
    #[default]
    Strict,
    /// A tenant additionally sees shared (tenant-less) rows.
    IncludeShared,
}

type Predicate = dyn Fn(Option<&str>) -> Condition + Send + Sync;

/// Prebuilt visibility predicate for one entity type.
#[derive(Clone)]
pub struct TenantFilter {
    entity: String,
    column: String,
    predicate: Arc<Predicate>,
}

impl TenantFilter {
    /// Condition selecting the rows visible to `tenant`. Empty tenants count as none.
    #[must_use]
    pub fn condition(&self, tenant: Option<&str>) -> Condition {
        (self.predicate)(tenant.filter(|t| !t.is_empty()))
    }

    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }
}

impl fmt::Debug for TenantFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantFilter")
            .field("entity", &self.entity)
            .field("column", &self.column)
            .finish_non_exhaustive()
    }
}

pub struct TenantFilterBuilder;

impl TenantFilterBuilder {
    /// Builds the visibility predicate for `E`.
    ///
    /// Returns `Ok(None)` for entities without a tenant column.
    ///
    /// # Errors
    /// `RepoError::Registration` if the declared tenant column is not a nullable
    /// string column. An unscoped tenant-sensitive entity must never be registered.
    pub fn build<E: ManagedEntity>(visibility: TenantVisibility) -> Result<Option<TenantFilter>> {
        let Some(col) = E::tenant_col() else {
            return Ok(None);
        };
        let entity = E::default().table_name().to_owned();
        let column = col.as_str().to_owned();
        let def = col.def();

        if !is_string_type(def.get_column_type()) {
            return Err(RepoError::registration(
                &entity,
                format!("tenant column '{column}' must be a string column"),
            ));
        }
        if !def.is_null() {
            return Err(RepoError::registration(
                &entity,
                format!("tenant column '{column}' must be nullable"),
            ));
        }

        let predicate: Arc<Predicate> = Arc::new(move |tenant: Option<&str>| match tenant {
            None => Condition::all().add(col.is_null()),
            Some(t) => match visibility {
                TenantVisibility::Strict => Condition::all().add(col.eq(t)),
                TenantVisibility::IncludeShared => {
                    Condition::any().add(col.eq(t)).add(col.is_null())
                }
            },
        });

        tracing::debug!(%entity, %column, ?visibility, "tenant filter built");

        Ok(Some(TenantFilter {
            entity,
            column,
            predicate,
        }))
    }
}

pub(crate) fn is_string_type(ty: &ColumnType) -> bool {
    matches!(
        ty,
        ColumnType::String(_) | ColumnType::Text | ColumnType::Char(_)
    )
}
