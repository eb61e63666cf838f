use crate::core::export::ExportError;
use crate::core::video::{StoreError, VideoError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("Video error: {0}")]
    Video(#[from] VideoError),
    #[error("Failed to store frame {index}: {source}")]
    StoreFailed {
        index: u64,
        #[source]
        source: StoreError,
    },
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Video ended after capturing {captured}/{required} frames")]
    SourceExhausted { captured: u64, required: u64 },
    #[error("Video encoding failed")]
    EncodeFailed,
}
