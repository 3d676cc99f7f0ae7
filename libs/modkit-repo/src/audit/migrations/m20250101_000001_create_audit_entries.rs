use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuditEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuditEntries::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AuditEntries::Action).string().not_null())
                    .col(
                        ColumnDef::new(AuditEntries::AuditDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AuditEntries::UserId).string())
                    .col(ColumnDef::new(AuditEntries::UserName).string())
                    .col(ColumnDef::new(AuditEntries::TableName).string().not_null())
                    .col(ColumnDef::new(AuditEntries::ActionData).text())
                    .to_owned(),
            )
            .await?;

        for (name, col) in [
            ("idx_audit_entries_user_id", AuditEntries::UserId),
            ("idx_audit_entries_table_name", AuditEntries::TableName),
            ("idx_audit_entries_audit_date", AuditEntries::AuditDate),
        ] {
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name(name)
                        .table(AuditEntries::Table)
                        .col(col)
                        .to_owned(),
                )
                .await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuditEntries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AuditEntries {
    Table,
    Id,
    Action,
    AuditDate,
    UserId,
    UserName,
    TableName,
    ActionData,
}
