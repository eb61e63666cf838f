pub mod error;
pub mod library;

pub use error::ExportError;
pub use library::{export_video, Authorization, FolderLibrary, MediaLibrary};
