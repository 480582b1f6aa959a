use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Number of random bytes in a [FileId], 128 bits.
pub const FILE_ID_BYTES: usize = 16;

/// Opaque identifier for an uploaded file, lowercase hex.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// Draws a fresh identifier from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; FILE_ID_BYTES];
        rand::rng().fill(&mut bytes);
        Self(bytes.iter().map(|b| format!("{:02x}", b)).collect())
    }

    /// Accepts only strings this type could have generated.
    pub fn parse(input: &str) -> Option<Self> {
        let valid = input.len() == FILE_ID_BYTES * 2
            && input
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        valid.then(|| Self(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An upload as received from the client, before it has an identity.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub original_name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
}

impl NewFile {
    pub fn new(original_name: String, mime_type: String, content: Vec<u8>) -> Self {
        Self {
            original_name,
            mime_type,
            content,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.content.len() as u64
    }
}

/// A stored file: metadata plus the raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub file_id: FileId,
    pub original_name: String,
    /// Always the length of `content`.
    pub size_bytes: u64,
    pub mime_type: String,
    pub content: Vec<u8>,
    pub uploaded_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn new(
        file_id: FileId,
        upload: NewFile,
        uploaded_at: DateTime<Utc>,
        ttl: TimeDelta,
    ) -> Self {
        let expires_at = uploaded_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            file_id,
            size_bytes: upload.size_bytes(),
            original_name: upload.original_name,
            mime_type: upload.mime_type,
            content: upload.content,
            uploaded_at,
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn summary(&self) -> FileSummary {
        FileSummary {
            file_id: self.file_id.clone(),
            original_name: self.original_name.clone(),
            size_bytes: self.size_bytes,
            mime_type: self.mime_type.clone(),
            uploaded_at: self.uploaded_at,
            expires_at: self.expires_at,
        }
    }
}

/// Metadata-only view of a [FileRecord].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub file_id: FileId,
    pub original_name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// File metadata as the API returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileView {
    pub file_id: FileId,
    pub view_url: String,
    pub download_url: String,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl FileView {
    /// `base_url` is scheme and host, eg `http://localhost:8189`.
    pub fn new(summary: FileSummary, base_url: &str) -> Self {
        Self {
            view_url: format!("{}/api/files/view/{}", base_url, summary.file_id),
            download_url: format!("{}/api/files/download/{}", base_url, summary.file_id),
            file_id: summary.file_id,
            name: summary.original_name,
            size: summary.size_bytes,
            mime_type: summary.mime_type,
            uploaded_at: summary.uploaded_at,
            expires_at: summary.expires_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(flatten)]
    pub file: FileView,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileResponse {
    pub success: bool,
    pub file: FileView,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileListResponse {
    pub success: bool,
    pub files: Vec<FileView>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
