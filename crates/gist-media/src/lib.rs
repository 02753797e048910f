//! Video metadata, captions and media download via yt-dlp.
//!
//! This crate provides:
//! - `VideoInfoProvider` for metadata and native captions
//! - `MediaDownloader` strategies and an ordered `DownloaderChain`
//! - VTT caption parsing into timestamped transcripts
//! - Netscape cookie file validation for authenticated requests

pub mod captions;
pub mod config;
pub mod cookies;
pub mod download;
pub mod error;
pub mod metadata;
pub mod provider;
pub mod ytdlp;

pub use captions::parse_vtt;
pub use config::MediaConfig;
pub use cookies::CookieFile;
pub use download::{DownloadedMedia, DownloaderChain, MediaDownloader, YtDlpDownloader};
pub use error::{MediaError, MediaResult};
pub use metadata::VideoMetadata;
pub use provider::{VideoInfoProvider, YtDlpInfoProvider};
pub use ytdlp::YtDlp;
