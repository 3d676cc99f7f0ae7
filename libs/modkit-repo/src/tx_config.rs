//! Transaction configuration types for `RepositoryManager`.
//!
//! Application services choose isolation and access mode without importing
//! `SeaORM` types; the conversion happens internally when the manager opens
//! its transaction.

use serde::{Deserialize, Serialize};

/// Transaction isolation level.
///
/// # Backend Notes
///
/// - **`PostgreSQL`**: Supports all levels. `RepeatableRead` actually uses
///   snapshot isolation.
/// - **`SQLite`**: Always serializable; the driver logs and ignores the setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxIsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// Transaction access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxAccessMode {
    ReadOnly,
    #[default]
    ReadWrite,
}

/// Configuration for an explicit unit-of-work transaction.
///
/// `None` fields fall back to the database defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TxConfig {
    pub isolation: Option<TxIsolationLevel>,
    pub access_mode: Option<TxAccessMode>,
}

impl TxConfig {
    #[must_use]
    pub fn with_isolation(isolation: TxIsolationLevel) -> Self {
        Self {
            isolation: Some(isolation),
            access_mode: None,
        }
    }

    #[must_use]
    pub fn read_only() -> Self {
        Self {
            isolation: None,
            access_mode: Some(TxAccessMode::ReadOnly),
        }
    }

    #[must_use]
    pub fn serializable() -> Self {
        Self::with_isolation(TxIsolationLevel::Serializable)
    }

    pub(crate) fn isolation_level(self) -> Option<IsolationLevel> {
        self.isolation.map(Into::into)
    }

    pub(crate) fn sea_access_mode(self) -> Option<AccessMode> {
        self.access_mode.map(Into::into)
    }
}

// ============================================================================
// SeaORM conversions
// ============================================================================

use sea_orm::{AccessMode, IsolationLevel};

impl From<TxIsolationLevel> for IsolationLevel {
    fn from(level: TxIsolationLevel) -> Self {
        match level {
            TxIsolationLevel::ReadUncommitted => IsolationLevel::ReadUncommitted,
            TxIsolationLevel::ReadCommitted => IsolationLevel::ReadCommitted,
            TxIsolationLevel::RepeatableRead => IsolationLevel::RepeatableRead,
            TxIsolationLevel::Serializable => IsolationLevel::Serializable,
        }
    }
}

impl From<TxAccessMode> for AccessMode {
    fn from(mode: TxAccessMode) -> Self {
        match mode {
            TxAccessMode::ReadOnly => AccessMode::ReadOnly,
            TxAccessMode::ReadWrite => AccessMode::ReadWrite,
        }
    }
}
