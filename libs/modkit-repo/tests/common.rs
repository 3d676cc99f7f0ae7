#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(dead_code)]

use std::sync::Arc;

use modkit_repo::audit::migrations::Migrator;
use modkit_repo::{RepositoryManager, Schema, SchemaBuilder};
use modkit_security::SecurityContext;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait};
use sea_orm_migration::MigratorTrait;

/// Fully audited, tenant-scoped entity.
pub mod document {
    use modkit_repo::Managed;
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Managed)]
    #[sea_orm(table_name = "documents")]
    #[managed(audited, tenant_col = "tenant_id")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        #[sea_orm(unique)]
        pub name: String,
        pub tenant_id: Option<String>,
        pub created_by: Option<String>,
        pub created_at: Option<DateTimeUtc>,
        pub modified_by: Option<String>,
        pub modified_at: Option<DateTimeUtc>,
        pub deleted_by: Option<String>,
        pub deleted_at: Option<DateTimeUtc>,
        pub is_deleted: bool,
        pub restored_by: Option<String>,
        pub restored_at: Option<DateTimeUtc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Entity with a bare soft-delete flag and no tenant.
pub mod tag {
    use modkit_repo::Managed;
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Managed)]
    #[sea_orm(table_name = "tags")]
    #[managed(deleted_col = "is_deleted", no_tenant)]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub label: String,
        pub is_deleted: bool,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Permanent entity with a composite key.
pub mod membership {
    use modkit_repo::Managed;
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Managed)]
    #[sea_orm(table_name = "memberships")]
    #[managed(permanent, no_tenant)]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub group_id: String,
        #[sea_orm(primary_key, auto_increment = false)]
        pub user_id: String,
        pub role: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub async fn setup_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opts).await.expect("connect to sqlite");

    create_table(&db, document::Entity).await;
    create_table(&db, tag::Entity).await;
    create_table(&db, membership::Entity).await;
    Migrator::up(&db, None).await.expect("audit migrations");
    db
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) {
    let backend = db.get_database_backend();
    let stmt = sea_orm::Schema::new(backend).create_table_from_entity(entity);
    db.execute(backend.build(&stmt)).await.expect("create table");
}

pub fn schema_builder() -> SchemaBuilder {
    Schema::builder()
        .register::<document::Entity>()
        .unwrap()
        .register::<tag::Entity>()
        .unwrap()
        .register::<membership::Entity>()
        .unwrap()
}

pub fn schema() -> Arc<Schema> {
    schema_builder().build()
}

pub fn ctx(subject: &str, tenant: Option<&str>) -> SecurityContext {
    let builder = SecurityContext::builder()
        .subject_id(subject)
        .display_name(format!("User {subject}"));
    match tenant {
        Some(t) => builder.tenant_id(t).build(),
        None => builder.build(),
    }
}

pub fn manager(db: &DatabaseConnection, ctx: SecurityContext) -> RepositoryManager {
    RepositoryManager::new(db.clone(), schema(), ctx)
}

pub fn new_document(name: &str, tenant: Option<&str>) -> document::Model {
    document::Model {
        id: 0,
        name: name.to_owned(),
        tenant_id: tenant.map(ToOwned::to_owned),
        created_by: None,
        created_at: None,
        modified_by: None,
        modified_at: None,
        deleted_by: None,
        deleted_at: None,
        is_deleted: false,
        restored_by: None,
        restored_at: None,
    }
}

pub fn new_tag(label: &str) -> tag::Model {
    tag::Model {
        id: 0,
        label: label.to_owned(),
        is_deleted: false,
    }
}

/// Reads a document bypassing repositories and tenant filters.
pub async fn raw_document(db: &DatabaseConnection, id: i32) -> Option<document::Model> {
    document::Entity::find_by_id(id).one(db).await.unwrap()
}

pub async fn raw_document_count(db: &DatabaseConnection) -> usize {
    document::Entity::find().all(db).await.unwrap().len()
}
