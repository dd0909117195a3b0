//! Comm layer for a remote code repository client.
//!
//! Turns a one-way, message-passing transport into an RPC-like
//! call/callback API. Every outbound request is tagged with a fresh
//! correlation ID, a one-shot callback is registered under that ID, and a
//! single background listener matches inbound messages back to their
//! callbacks and invokes each exactly once. The same transport and message
//! primitives also power the server end of the protocol, so a full
//! client/server pair can run in-process.
//!
//! # Example
//!
//! ```rust,ignore
//! use repo_comm::CommService;
//!
//! #[tokio::main]
//! async fn main() -> repo_comm::Result<()> {
//!     let service = CommService::new("localhost", 7890);
//!     service.start("localhost", 7790).await?;
//!
//!     let requests = service.requests()?;
//!     requests
//!         .ping(false, |response| {
//!             println!("server alive: {}", response.server_active);
//!         })
//!         .await?;
//!
//!     // ... later: graceful two-phase shutdown
//!     service.stop(|| println!("listener stopped")).await?;
//!     Ok(())
//! }
//! ```

pub mod checkin;
pub mod comm;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod file_key;
pub mod message;
pub mod server;
pub mod staging;

// Re-export commonly used types
pub use checkin::{check_in_folder, CheckInFolder};
pub use comm::dispatch::{correlation_id, DispatchTable, ResponseHandler};
pub use comm::requests::Requests;
pub use comm::responses::{
    CheckInResponse, CheckOutResponse, GetFileMetadataResponse, GetFileTextResponse,
    GetPackageFilesResponse, GetRepoPackagesResponse, PingResponse,
};
pub use comm::service::CommService;
pub use comm::transport::Transport;
pub use config::{CommConfig, PathsConfig};
pub use endpoint::Endpoint;
pub use error::{CommError, Result};
pub use file_key::{FileKey, FileMetadata};
pub use message::{commands, keys, prefixes, Message};
pub use server::{CommandHandler, RepoServer, RepoServerHandle};
