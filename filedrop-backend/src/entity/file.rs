use chrono::{DateTime, Utc};
use sea_orm::{
    entity::prelude::*, FromQueryResult, QueryOrder, QuerySelect, SelectModel, Selector,
};

/// One uploaded file. `content` holds the gzip-compressed bytes, `size_bytes`
/// the uncompressed length.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "file")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub file_id: String,
    pub original_name: String,
    pub size_bytes: i64,
    pub mime_type: String,
    #[sea_orm(column_type = "VarBinary(StringLen::Max)")]
    pub content: Vec<u8>,
    pub uploaded_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, FromQueryResult)]
pub struct ModelNoContent {
    pub file_id: String,
    pub original_name: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Every file's metadata, newest upload first, without touching the content column.
pub fn summary_list() -> Selector<SelectModel<ModelNoContent>> {
    Entity::find()
        .select_only()
        .columns([
            Column::FileId,
            Column::OriginalName,
            Column::SizeBytes,
            Column::MimeType,
            Column::UploadedAt,
            Column::ExpiresAt,
        ])
        .order_by_desc(Column::UploadedAt)
        .order_by_asc(Column::FileId)
        .into_model::<ModelNoContent>()
}
