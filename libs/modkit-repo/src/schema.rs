//! Startup-time registry of managed entity types.
//!
//! Registration validates what an entity declares about itself against its
//! column definitions and prebuilds the tenant predicate. Misconfiguration
//! aborts registration instead of degrading into an unscoped entity.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use sea_orm::sea_query::ColumnType;
use sea_orm::{ColumnTrait, IdenStatic};

use crate::entity::{Lifecycle, LifecycleKind, ManagedEntity};
use crate::error::{RepoError, Result};
use crate::tenant::{TenantFilter, TenantFilterBuilder, TenantVisibility, is_string_type};

/// What the registry knows about one entity type.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    table: String,
    lifecycle: LifecycleKind,
    tenant_filter: Option<TenantFilter>,
}

impl EntityDescriptor {
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn lifecycle(&self) -> LifecycleKind {
        self.lifecycle
    }

    #[must_use]
    pub fn tenant_filter(&self) -> Option<&TenantFilter> {
        self.tenant_filter.as_ref()
    }
}

#[derive(Debug, Default)]
pub struct SchemaBuilder {
    visibility: TenantVisibility,
    entities: HashMap<TypeId, EntityDescriptor>,
}

impl SchemaBuilder {
    /// Visibility rule baked into tenant predicates. Must be set before registering entities.
    #[must_use]
    pub fn tenant_visibility(mut self, visibility: TenantVisibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Registers `E`, validating its declared capabilities.
    ///
    /// # Errors
    /// `RepoError::Registration` if `E` is already registered, if an audit or
    /// soft-delete column has the wrong type or nullability, or if the tenant
    /// column is not a nullable string.
    pub fn register<E: ManagedEntity>(mut self) -> Result<Self> {
        let table = E::default().table_name().to_owned();
        let type_id = TypeId::of::<E>();
        if self.entities.contains_key(&type_id) {
            return Err(RepoError::registration(&table, "entity is already registered"));
        }

        validate_lifecycle::<E>(&table)?;
        let tenant_filter = TenantFilterBuilder::build::<E>(self.visibility)?;

        tracing::debug!(
            entity = %table,
            lifecycle = ?E::lifecycle().kind(),
            tenant_scoped = tenant_filter.is_some(),
            "entity registered"
        );

        self.entities.insert(
            type_id,
            EntityDescriptor {
                table,
                lifecycle: E::lifecycle().kind(),
                tenant_filter,
            },
        );
        Ok(self)
    }

    #[must_use]
    pub fn build(self) -> Arc<Schema> {
        Arc::new(Schema {
            visibility: self.visibility,
            entities: self.entities,
        })
    }
}

/// Immutable set of registered entity types, shared by every manager of the application.
#[derive(Debug)]
pub struct Schema {
    visibility: TenantVisibility,
    entities: HashMap<TypeId, EntityDescriptor>,
}

impl Schema {
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    #[must_use]
    pub fn descriptor<E: ManagedEntity>(&self) -> Option<&EntityDescriptor> {
        self.entities.get(&TypeId::of::<E>())
    }

    #[must_use]
    pub fn is_registered<E: ManagedEntity>(&self) -> bool {
        self.entities.contains_key(&TypeId::of::<E>())
    }

    #[must_use]
    pub fn tenant_visibility(&self) -> TenantVisibility {
        self.visibility
    }

    /// Number of registered entity types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

fn validate_lifecycle<E: ManagedEntity>(table: &str) -> Result<()> {
    match E::lifecycle() {
        Lifecycle::Audited(cols) => {
            for (name, col) in cols.actors() {
                expect_column::<E>(table, name, col, is_string_type, "a nullable string")?;
            }
            for (name, col) in cols.timestamps() {
                expect_column::<E>(
                    table,
                    name,
                    col,
                    |ty| matches!(ty, ColumnType::TimestampWithTimeZone),
                    "a nullable UTC timestamp",
                )?;
            }
            expect_flag::<E>(table, cols.is_deleted)
        }
        Lifecycle::DeletedFlag(col) => expect_flag::<E>(table, col),
        Lifecycle::Permanent => Ok(()),
    }
}

fn expect_column<E: ManagedEntity>(
    table: &str,
    role: &str,
    col: E::Column,
    type_ok: fn(&ColumnType) -> bool,
    expected: &str,
) -> Result<()> {
    let def = col.def();
    if type_ok(def.get_column_type()) && def.is_null() {
        Ok(())
    } else {
        Err(RepoError::registration(
            table,
            format!("{role} column '{}' must be {expected}", col.as_str()),
        ))
    }
}

fn expect_flag<E: ManagedEntity>(table: &str, col: E::Column) -> Result<()> {
    if matches!(col.def().get_column_type(), ColumnType::Boolean) {
        Ok(())
    } else {
        Err(RepoError::registration(
            table,
            format!("soft-delete column '{}' must be boolean", col.as_str()),
        ))
    }
}
