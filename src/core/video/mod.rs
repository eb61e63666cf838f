pub mod error;
pub mod file_store;
pub mod frame;
pub mod info;
pub mod reader;
pub mod writer;

pub use error::{StoreError, VideoError};
pub use file_store::{DiskFrameStore, FrameStore, MemoryFrameStore, DEFAULT_FRAMES_FOLDER};
pub use frame::{CameraIntrinsics, Frame, PixelFormat};
pub use info::VideoInfo;
pub use reader::{FrameSource, RawFrameReader, VideoReader};
pub use writer::{
    fit_to_canvas, presentation_time, FfmpegEncoder, FrameEncoder, MediaTime, VideoWriter,
    WriteHandle, WriterState, DEFAULT_TIME_SCALE,
};
