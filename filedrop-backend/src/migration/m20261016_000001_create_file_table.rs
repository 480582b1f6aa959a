use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(File::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(File::FileId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(File::OriginalName).string().not_null())
                    .col(ColumnDef::new(File::SizeBytes).big_integer().not_null())
                    .col(ColumnDef::new(File::MimeType).string().not_null())
                    .col(ColumnDef::new(File::Content).binary().not_null())
                    .col(
                        ColumnDef::new(File::UploadedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(File::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // listing is always newest-first
        manager
            .create_index(
                Index::create()
                    .name("idx_file_uploaded_at")
                    .table(File::Table)
                    .col(File::UploadedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_file_uploaded_at")
                    .table(File::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(File::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum File {
    Table,
    FileId,
    OriginalName,
    SizeBytes,
    MimeType,
    Content,
    UploadedAt,
    ExpiresAt,
}
