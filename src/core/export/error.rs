use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Media library permission denied")]
    PermissionDenied,
    #[error("Media library access restricted")]
    Restricted,
    #[error("Media library permission not determined")]
    NotDetermined,
    #[error("Video file missing: {0}")]
    MissingFile(String),
}
