//! Durable storage of uploaded files, keyed by [FileId].
//!
//! The store knows nothing about expiry beyond [IdentityStore::delete_expired];
//! deciding whether a record may be served is the controller's job.

use std::future::Future;
use std::io::{Read, Write};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use filedrop_shared::error::FileError;
use filedrop_shared::file::{FileId, FileRecord, FileSummary};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, SqlErr,
};
use tracing::{debug, error};

use crate::entity::file;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Inserts a new record, failing with [FileError::DuplicateKey] if the id is taken.
    async fn create(&self, record: &FileRecord) -> Result<(), FileError>;

    /// Returns the record whether or not it has expired.
    async fn find_by_id(&self, file_id: &FileId) -> Result<Option<FileRecord>, FileError>;

    /// Removing an id that isn't there is [FileError::NotFound].
    async fn delete_by_id(&self, file_id: &FileId) -> Result<(), FileError>;

    /// Metadata for every record, newest upload first.
    async fn list_all(&self) -> Result<Vec<FileSummary>, FileError>;

    /// Removes every record with `expires_at <= now`, returning how many went.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, FileError>;

    /// Checks the backing storage is reachable.
    async fn ping(&self) -> Result<(), FileError>;
}

/// [IdentityStore] on a sea-orm connection pool. Content is gzipped at rest.
#[derive(Clone, Debug)]
pub struct SqlStore {
    conn: DatabaseConnection,
    timeout: Duration,
}

impl SqlStore {
    pub fn new(conn: DatabaseConnection, timeout: Duration) -> Self {
        Self { conn, timeout }
    }

    /// Bounds a database call by the store timeout.
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, DbErr>
    where
        F: Future<Output = Result<T, DbErr>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(DbErr::Custom(format!(
                "{} timed out after {}ms",
                op,
                self.timeout.as_millis()
            ))),
        }
    }
}

fn compress(data: &[u8]) -> Result<Vec<u8>, FileError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn decompress(data: &[u8]) -> Result<Vec<u8>, FileError> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}

fn stored_id(raw: &str) -> Result<FileId, FileError> {
    FileId::parse(raw)
        .ok_or_else(|| FileError::StorageUnavailable(format!("corrupt file id in store: {}", raw)))
}

impl TryFrom<file::Model> for FileRecord {
    type Error = FileError;

    fn try_from(model: file::Model) -> Result<Self, Self::Error> {
        let content = decompress(&model.content)?;
        if content.len() as i64 != model.size_bytes {
            return Err(FileError::StorageUnavailable(format!(
                "stored size {} does not match content length {} for {}",
                model.size_bytes,
                content.len(),
                model.file_id
            )));
        }
        Ok(FileRecord {
            file_id: stored_id(&model.file_id)?,
            original_name: model.original_name,
            size_bytes: content.len() as u64,
            mime_type: model.mime_type,
            content,
            uploaded_at: model.uploaded_at,
            expires_at: model.expires_at,
        })
    }
}

impl TryFrom<file::ModelNoContent> for FileSummary {
    type Error = FileError;

    fn try_from(row: file::ModelNoContent) -> Result<Self, Self::Error> {
        Ok(FileSummary {
            file_id: stored_id(&row.file_id)?,
            original_name: row.original_name,
            size_bytes: row.size_bytes.max(0) as u64,
            mime_type: row.mime_type,
            uploaded_at: row.uploaded_at,
            expires_at: row.expires_at,
        })
    }
}

#[async_trait]
impl IdentityStore for SqlStore {
    async fn create(&self, record: &FileRecord) -> Result<(), FileError> {
        let model = file::ActiveModel {
            file_id: Set(record.file_id.to_string()),
            original_name: Set(record.original_name.clone()),
            size_bytes: Set(record.size_bytes as i64),
            mime_type: Set(record.mime_type.clone()),
            content: Set(compress(&record.content)?),
            uploaded_at: Set(record.uploaded_at),
            expires_at: Set(record.expires_at),
        };

        match self
            .bounded(
                "create",
                file::Entity::insert(model).exec_without_returning(&self.conn),
            )
            .await
        {
            Ok(_) => {
                debug!("Stored file {} ({} bytes)", record.file_id, record.size_bytes);
                Ok(())
            }
            Err(err) => match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    Err(FileError::DuplicateKey(record.file_id.to_string()))
                }
                _ => {
                    error!("Failed to store file {}: {:?}", record.file_id, err);
                    Err(err.into())
                }
            },
        }
    }

    async fn find_by_id(&self, file_id: &FileId) -> Result<Option<FileRecord>, FileError> {
        let model = self
            .bounded(
                "find_by_id",
                file::Entity::find_by_id(file_id.to_string()).one(&self.conn),
            )
            .await?;
        model.map(FileRecord::try_from).transpose()
    }

    async fn delete_by_id(&self, file_id: &FileId) -> Result<(), FileError> {
        let res = self
            .bounded(
                "delete_by_id",
                file::Entity::delete_by_id(file_id.to_string()).exec(&self.conn),
            )
            .await?;
        match res.rows_affected {
            0 => Err(FileError::NotFound(file_id.to_string())),
            _ => {
                debug!("Deleted file {}", file_id);
                Ok(())
            }
        }
    }

    async fn list_all(&self) -> Result<Vec<FileSummary>, FileError> {
        let rows = self
            .bounded("list_all", file::summary_list().all(&self.conn))
            .await?;
        rows.into_iter().map(FileSummary::try_from).collect()
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, FileError> {
        let res = self
            .bounded(
                "delete_expired",
                file::Entity::delete_many()
                    .filter(file::Column::ExpiresAt.lte(now))
                    .exec(&self.conn),
            )
            .await?;
        Ok(res.rows_affected)
    }

    async fn ping(&self) -> Result<(), FileError> {
        self.bounded("ping", self.conn.ping()).await?;
        Ok(())
    }
}
