//! Typed results delivered to request callbacks.
//!
//! Scalar response fields stay strings, exactly as they arrive on the wire;
//! a missing field decodes as the empty string (this layer performs no
//! schema validation). Every response carries the correlation ID of the
//! request it answers.

use crate::file_key::{FileKey, FileMetadata};

#[derive(Debug, Clone)]
pub struct PingResponse {
    /// `"true"` when the server reports itself alive.
    pub server_active: String,
    pub request_id: String,
}

#[derive(Debug, Clone)]
pub struct GetRepoPackagesResponse {
    pub packages: Vec<String>,
    pub request_id: String,
}

#[derive(Debug, Clone)]
pub struct GetPackageFilesResponse {
    pub files: Vec<FileKey>,
    pub request_id: String,
}

#[derive(Debug, Clone)]
pub struct GetFileMetadataResponse {
    pub metadata: FileMetadata,
    pub request_id: String,
}

/// The file text itself arrives out of band, in the local save directory.
#[derive(Debug, Clone)]
pub struct GetFileTextResponse {
    pub request_id: String,
}

#[derive(Debug, Clone)]
pub struct CheckInResponse {
    pub success: String,
    pub request_id: String,
}

#[derive(Debug, Clone)]
pub struct CheckOutResponse {
    pub success: String,
    pub request_id: String,
}
