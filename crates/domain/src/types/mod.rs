//! Protocol state and wire types

pub mod auth;
pub mod pagination;
pub mod sync;
pub mod upload;

pub use auth::{AuthToken, Credentials, RefreshRequest, TokenPair};
pub use pagination::{Page, PageCursor, PaginationMeta};
pub use sync::{SyncCheckpoint, SyncDelta};
pub use upload::{
    ChunkUploadResponse, CompleteUploadRequest, MediaDescriptor, StartUploadRequest,
    StartUploadResponse, UploadProgress, UploadSession, UploadStatus, UploadType,
};
