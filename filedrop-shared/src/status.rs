//! Bodies for the health check and the API index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// `OK` when storage answers, `DEGRADED` otherwise.
    pub status: String,
    pub timestamp: DateTime<Utc>,
    /// `connected` or `disconnected`.
    pub database: String,
}

impl HealthResponse {
    pub fn new(timestamp: DateTime<Utc>, database_ok: bool) -> Self {
        let (status, database) = match database_ok {
            true => ("OK", "connected"),
            false => ("DEGRADED", "disconnected"),
        };
        Self {
            status: status.to_string(),
            timestamp,
            database: database.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "OK"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoints {
    pub upload: String,
    pub list: String,
    pub metadata: String,
    pub view_file: String,
    pub download: String,
    pub delete: String,
    pub health: String,
}

/// What `GET /` answers with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ApiIndex {
    pub message: String,
    pub version: String,
    pub endpoints: ApiEndpoints,
    pub note: String,
}

impl ApiIndex {
    pub fn new(version: &str) -> Self {
        Self {
            message: "File Sharing API is running".to_string(),
            version: version.to_string(),
            endpoints: ApiEndpoints {
                upload: "POST /api/files/upload".to_string(),
                list: "GET /api/files".to_string(),
                metadata: "GET /api/files/{id}".to_string(),
                view_file: "GET /api/files/view/{id}".to_string(),
                download: "GET /api/files/download/{id}".to_string(),
                delete: "DELETE /api/files/{id}".to_string(),
                health: "GET /api/health".to_string(),
            },
            note: "Use multipart/form-data for file upload with field name \"file\"".to_string(),
        }
    }
}
