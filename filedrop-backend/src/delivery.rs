//! Upload intake, expiry enforcement and response framing.
//!
//! Every retrieval re-checks expiry: a record whose `expires_at` has passed is
//! deleted on the spot and reported as [FileError::Expired]. Later lookups of
//! the same id then see [FileError::NotFound].

use std::sync::Arc;

use chrono::TimeDelta;
use filedrop_shared::error::FileError;
use filedrop_shared::file::{FileId, FileRecord, FileSummary, NewFile};
use filedrop_shared::status::HealthResponse;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::store::IdentityStore;

pub const DEFAULT_TTL_SECS: u64 = 86_400;
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;
/// How many identifiers an upload may burn through on collisions.
pub const MAX_ID_ATTEMPTS: usize = 5;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Characters `encodeURIComponent` leaves alone.
const FILENAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Clone, Debug)]
pub struct DeliveryConfig {
    pub ttl: TimeDelta,
    pub max_upload_bytes: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            ttl: TimeDelta::seconds(DEFAULT_TTL_SECS as i64),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetrievalMode {
    /// Render in the browser with the stored content type.
    View,
    /// Force a save dialog.
    Download,
}

/// A file body with the headers it should be served with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedFile {
    pub content_type: String,
    pub content_disposition: String,
    pub content_length: Option<u64>,
    pub body: Vec<u8>,
}

impl FramedFile {
    pub fn new(record: FileRecord, mode: RetrievalMode) -> Self {
        match mode {
            RetrievalMode::View => Self {
                content_disposition: content_disposition("inline", &record.original_name),
                content_type: record.mime_type,
                content_length: None,
                body: record.content,
            },
            RetrievalMode::Download => Self {
                content_disposition: content_disposition("attachment", &record.original_name),
                content_type: OCTET_STREAM.to_string(),
                content_length: Some(record.size_bytes),
                body: record.content,
            },
        }
    }
}

/// eg `inline; filename="my%20report.pdf"`
pub fn content_disposition(disposition: &str, filename: &str) -> String {
    format!(
        "{}; filename=\"{}\"",
        disposition,
        utf8_percent_encode(filename, FILENAME_ENCODE_SET)
    )
}

pub struct DeliveryController {
    store: Arc<dyn IdentityStore>,
    clock: Arc<dyn Clock>,
    config: DeliveryConfig,
}

impl DeliveryController {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        clock: Arc<dyn Clock>,
        config: DeliveryConfig,
    ) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Stores an upload under a freshly generated id.
    pub async fn upload(&self, upload: NewFile) -> Result<FileRecord, FileError> {
        let size = upload.size_bytes();
        if size > self.config.max_upload_bytes {
            debug!(
                "Rejecting upload of {} bytes, limit is {}",
                size, self.config.max_upload_bytes
            );
            return Err(FileError::PayloadTooLarge {
                size,
                limit: self.config.max_upload_bytes,
            });
        }

        let mut record = FileRecord::new(
            FileId::generate(),
            upload,
            self.clock.now(),
            self.config.ttl,
        );

        for attempt in 1..=MAX_ID_ATTEMPTS {
            match self.store.create(&record).await {
                Ok(()) => {
                    info!(
                        file_id = %record.file_id,
                        size = record.size_bytes,
                        mime_type = %record.mime_type,
                        "file uploaded"
                    );
                    return Ok(record);
                }
                Err(FileError::DuplicateKey(id)) => {
                    warn!(attempt, file_id = %id, "file id collision, generating another");
                    record.file_id = FileId::generate();
                }
                Err(err) => return Err(err),
            }
        }

        error!(
            "Could not allocate a unique file id after {} attempts",
            MAX_ID_ATTEMPTS
        );
        Err(FileError::StorageUnavailable(format!(
            "could not allocate a unique file id after {} attempts",
            MAX_ID_ATTEMPTS
        )))
    }

    /// Loads an unexpired file and frames it for `mode`.
    pub async fn retrieve(
        &self,
        file_id: &str,
        mode: RetrievalMode,
    ) -> Result<FramedFile, FileError> {
        let record = self.find_active(file_id).await?;
        debug!("Serving file {} as {:?}", record.file_id, mode);
        Ok(FramedFile::new(record, mode))
    }

    /// Metadata of an unexpired file.
    pub async fn metadata(&self, file_id: &str) -> Result<FileSummary, FileError> {
        Ok(self.find_active(file_id).await?.summary())
    }

    /// Every stored file, expired or not, newest first.
    pub async fn list_all(&self) -> Result<Vec<FileSummary>, FileError> {
        self.store.list_all().await
    }

    pub async fn remove(&self, file_id: &str) -> Result<(), FileError> {
        let file_id =
            FileId::parse(file_id).ok_or_else(|| FileError::NotFound(file_id.to_string()))?;
        self.store.delete_by_id(&file_id).await?;
        info!(file_id = %file_id, "file deleted");
        Ok(())
    }

    /// Deletes everything that has expired as of now.
    pub async fn sweep_expired(&self) -> Result<u64, FileError> {
        self.store.delete_expired(self.clock.now()).await
    }

    /// Storage reachability, stamped with the current time.
    pub async fn health(&self) -> HealthResponse {
        let database_ok = match self.store.ping().await {
            Ok(()) => true,
            Err(err) => {
                warn!("health check failed: {}", err);
                false
            }
        };
        HealthResponse::new(self.clock.now(), database_ok)
    }

    async fn find_active(&self, raw_id: &str) -> Result<FileRecord, FileError> {
        let file_id =
            FileId::parse(raw_id).ok_or_else(|| FileError::NotFound(raw_id.to_string()))?;

        let record = self
            .store
            .find_by_id(&file_id)
            .await?
            .ok_or_else(|| FileError::NotFound(file_id.to_string()))?;

        if record.is_expired_at(self.clock.now()) {
            match self.store.delete_by_id(&file_id).await {
                Ok(()) => info!(file_id = %file_id, "expired file removed"),
                // someone else got there first
                Err(FileError::NotFound(_)) => {}
                Err(err) => warn!(file_id = %file_id, "failed to remove expired file: {}", err),
            }
            return Err(FileError::Expired(file_id.to_string()));
        }

        Ok(record)
    }
}
