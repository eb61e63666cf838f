use thiserror::Error;

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No video track found")]
    NoVideoTrack,
    #[error("Probe error: {0}")]
    Probe(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Encoder setup failed: {0}")]
    EncoderSetup(String),
    #[error("Encode error: {0}")]
    Encode(String),
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Document directory not available")]
    NoDocumentDirectory,
}
