//! Executes statements against whichever handle a session currently holds.
//!
//! Queries issued while a unit of work is open must see its uncommitted
//! writes, so they run on the transaction; otherwise on the pooled connection.

use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, IntoActiveModel, PaginatorTrait, Select,
};

#[derive(Clone, Copy)]
pub(crate) enum SeaOrmRunner<'a> {
    Conn(&'a DatabaseConnection),
    Tx(&'a DatabaseTransaction),
}

impl SeaOrmRunner<'_> {
    pub(crate) async fn all<E: EntityTrait>(self, select: Select<E>) -> Result<Vec<E::Model>, DbErr> {
        match self {
            Self::Conn(conn) => select.all(conn).await,
            Self::Tx(tx) => select.all(tx).await,
        }
    }

    pub(crate) async fn one<E: EntityTrait>(self, select: Select<E>) -> Result<Option<E::Model>, DbErr> {
        match self {
            Self::Conn(conn) => select.one(conn).await,
            Self::Tx(tx) => select.one(tx).await,
        }
    }

    pub(crate) async fn count<E>(self, select: Select<E>) -> Result<u64, DbErr>
    where
        E: EntityTrait,
        E::Model: Sync,
    {
        match self {
            Self::Conn(conn) => select.count(conn).await,
            Self::Tx(tx) => select.count(tx).await,
        }
    }

    pub(crate) async fn insert<A>(self, am: A) -> Result<<A::Entity as EntityTrait>::Model, DbErr>
    where
        A: ActiveModelTrait + ActiveModelBehavior + Send + 'static,
        <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    {
        match self {
            Self::Conn(conn) => am.insert(conn).await,
            Self::Tx(tx) => am.insert(tx).await,
        }
    }
}
