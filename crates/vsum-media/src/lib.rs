//! Media acquisition and per-job working areas.
//!
//! This crate provides:
//! - `ResourceScope`, a job-scoped directory removed on every exit path
//! - `MediaHandle`, an idempotently releasable reference to downloaded media
//! - yt-dlp based audio download and metadata lookup
//! - staging and hand-off of uploaded media files

pub mod cookies;
pub mod download;
pub mod error;
pub mod handle;
pub mod info;
pub mod scope;
pub mod upload;

pub use download::{classify_failure, source_file_stem, YtDlpConfig, YtDlpSource};
pub use error::{MediaError, MediaResult};
pub use handle::MediaHandle;
pub use info::{parse_video_info, VideoInfo};
pub use scope::ResourceScope;
pub use upload::{staged_file_name, StagedUpload, UploadSource, UploadWriter};
