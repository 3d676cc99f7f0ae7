//! Capability declarations for entities managed by a repository.
//!
//! The repository never inspects models at runtime to find out whether a type
//! supports soft delete or tenant scoping. Each entity states its capabilities
//! once through [`ManagedEntity`] (usually via `#[derive(Managed)]`), and the
//! schema registry validates them against the column definitions at startup.

use sea_orm::EntityTrait;

/// The nine audit columns of a fully audited entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditColumns<C> {
    pub created_by: C,
    pub created_at: C,
    pub modified_by: C,
    pub modified_at: C,
    pub deleted_by: C,
    pub deleted_at: C,
    pub is_deleted: C,
    pub restored_by: C,
    pub restored_at: C,
}

impl<C: Copy> AuditColumns<C> {
    /// Actor columns, each paired with its name for diagnostics.
    pub(crate) fn actors(&self) -> [(&'static str, C); 4] {
        [
            ("created_by", self.created_by),
            ("modified_by", self.modified_by),
            ("deleted_by", self.deleted_by),
            ("restored_by", self.restored_by),
        ]
    }

    pub(crate) fn timestamps(&self) -> [(&'static str, C); 4] {
        [
            ("created_at", self.created_at),
            ("modified_at", self.modified_at),
            ("deleted_at", self.deleted_at),
            ("restored_at", self.restored_at),
        ]
    }
}

/// How an entity behaves under `soft_delete` / `restore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle<C> {
    /// Full audit contract: every transition is stamped with actor and time.
    Audited(AuditColumns<C>),
    /// Binary soft delete only: the flag column is toggled, nothing else.
    DeletedFlag(C),
    /// No soft-delete capability. Rows only leave storage through a hard delete.
    Permanent,
}

impl<C: Copy> Lifecycle<C> {
    /// Column carrying the soft-delete flag, if any.
    #[must_use]
    pub fn deleted_col(&self) -> Option<C> {
        match self {
            Self::Audited(cols) => Some(cols.is_deleted),
            Self::DeletedFlag(col) => Some(*col),
            Self::Permanent => None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> LifecycleKind {
        match self {
            Self::Audited(_) => LifecycleKind::Audited,
            Self::DeletedFlag(_) => LifecycleKind::DeletedFlag,
            Self::Permanent => LifecycleKind::Permanent,
        }
    }
}

/// Column-free view of [`Lifecycle`], stored in type-erased schema descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleKind {
    Audited,
    DeletedFlag,
    Permanent,
}

/// An entity that may be handled by a `RepositoryContext`.
///
/// Do not implement by hand unless the derive cannot express the mapping.
pub trait ManagedEntity: EntityTrait {
    /// Soft-delete / audit capability of the entity.
    fn lifecycle() -> Lifecycle<Self::Column>;

    /// Nullable tenant-identifier column, `None` for global entities.
    fn tenant_col() -> Option<Self::Column>;
}
