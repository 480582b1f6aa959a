use std::fmt;

/// Everything that can go wrong in the file lifecycle.
#[derive(Debug)]
pub enum FileError {
    /// The upload carried no file field at all. A zero-byte file is not this.
    EmptyPayload,
    PayloadTooLarge {
        size: u64,
        limit: u64,
    },
    NotFound(String),
    /// The record existed but its TTL has run out.
    Expired(String),
    /// Identifier collision on insert, retried by the controller.
    DuplicateKey(String),
    StorageUnavailable(String),
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::EmptyPayload => write!(f, "No file uploaded"),
            FileError::PayloadTooLarge { size, limit } => write!(
                f,
                "File of {} bytes exceeds the upload limit of {} bytes",
                size, limit
            ),
            FileError::NotFound(id) => write!(f, "File {} not found", id),
            FileError::Expired(id) => write!(f, "File {} has expired", id),
            FileError::DuplicateKey(id) => write!(f, "File id {} already exists", id),
            FileError::StorageUnavailable(detail) => write!(f, "Storage unavailable: {}", detail),
        }
    }
}

impl std::error::Error for FileError {}

impl From<sea_orm::DbErr> for FileError {
    fn from(err: sea_orm::DbErr) -> Self {
        FileError::StorageUnavailable(err.to_string())
    }
}

impl From<std::io::Error> for FileError {
    fn from(err: std::io::Error) -> Self {
        FileError::StorageUnavailable(err.to_string())
    }
}
