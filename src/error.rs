use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GbifImageError {
    #[error("no rows with media metadata to fetch")]
    EmptyMetadata,

    #[error("invalid recompression quality {0}: expected 1..=100")]
    InvalidQuality(u8),

    #[error("GBIF request failed: {0}")]
    GbifHttp(String),

    #[error("GBIF returned status {status}: {message}")]
    GbifStatus { status: u16, message: String },

    #[error("media request failed: {0}")]
    MediaHttp(String),

    #[error("media host returned status {status}: {message}")]
    MediaStatus { status: u16, message: String },

    #[error("image processing failed: {0}")]
    Image(String),

    #[error("failed to read metadata table at {path}: {message}")]
    MetadataRead { path: String, message: String },

    #[error("csv error: {0}")]
    Csv(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
