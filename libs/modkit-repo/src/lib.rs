#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! # modkit-repo
//!
//! Auditable, tenant-scoped repositories over `SeaORM`.
//!
//! - [`ManagedEntity`] / `#[derive(Managed)]` declare what an entity supports:
//!   full audit stamps, a bare soft-delete flag, or neither; and whether rows
//!   belong to a tenant.
//! - [`Schema`] validates those declarations at startup and prebuilds the
//!   tenant predicate of every entity.
//! - [`RepositoryManager`] owns one scope: its [`SecurityContext`](modkit_security::SecurityContext),
//!   its unit-of-work transaction and one [`RepositoryContext`] per entity type.
//! - [`AuditService`] appends business-level audit records.
//!
//! ```ignore
//! let schema = config.schema_builder()
//!     .register::<document::Entity>()?
//!     .build();
//! let manager = RepositoryManager::builder(conn, schema, ctx).config(&config).build();
//!
//! let docs = manager.repository::<document::Entity>()?;
//! manager.begin_transaction().await?;
//! let saved = docs.add(vec![doc], WriteOptions::new()).await;
//! manager.commit().await?;
//! ```

pub mod audit;
pub mod config;
pub mod entity;
pub mod error;
pub mod manager;
pub mod query;
pub mod repository;
mod runner;
pub mod schema;
mod session;
pub mod tenant;
pub mod tx_config;

pub use audit::{AuditAction, AuditEntry, AuditService, AuditStamps, AuditState};
pub use config::RepoConfig;
pub use entity::{AuditColumns, Lifecycle, LifecycleKind, ManagedEntity};
pub use error::{RepoError, Result};
pub use manager::{RepositoryManager, RepositoryManagerBuilder};
pub use modkit_repo_macros::Managed;
pub use query::{DeletedFilter, ScopedQuery};
pub use repository::{RepositoryContext, WriteOptions};
pub use schema::{EntityDescriptor, Schema, SchemaBuilder};
pub use tenant::{TenantFilter, TenantFilterBuilder, TenantVisibility};
pub use tx_config::{TxAccessMode, TxConfig, TxIsolationLevel};
