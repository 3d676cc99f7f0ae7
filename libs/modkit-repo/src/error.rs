use sea_orm::DbErr;
use thiserror::Error;

/// Errors surfaced by the repository layer.
///
/// Storage failures during `add`/`update`/`soft_delete`/`restore` never reach
/// the caller as this type; they are logged and absorbed at the repository
/// boundary. Everything else propagates.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("a transaction is already open for this repository manager")]
    TransactionAlreadyOpen,

    #[error("no active transaction: begin_transaction must be called first")]
    NoActiveTransaction,

    #[error("entity '{0}' is not registered in the repository schema")]
    NotRegistered(&'static str),

    #[error("cannot register entity '{entity}': {reason}")]
    Registration { entity: String, reason: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to serialize audit payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error(transparent)]
    Db(#[from] DbErr),
}

impl RepoError {
    pub(crate) fn registration(entity: &str, reason: impl Into<String>) -> Self {
        Self::Registration {
            entity: entity.to_owned(),
            reason: reason.into(),
        }
    }
}

impl From<figment::Error> for RepoError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, RepoError>;
