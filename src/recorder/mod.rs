//! 人物片段录制器 - 在视频中检测到目标类别后录制一段带标注的片段
//!
//! 流程：
//! 1. 逐帧解码 - 单线程顺序读取，录满后取消
//! 2. 门控状态机 - 首次检测到目标后锁定为录制状态
//! 3. 帧标注 - 绘制目标框和置信度，按序号存盘
//! 4. 编码导出 - 后台线程写出 mp4，再保存到媒体库

pub mod annotator;
pub mod config;
pub mod detector;
pub mod error;
pub mod font;
pub mod pipeline;
pub mod state_machine;

pub use annotator::{format_label, AspectFill, FrameAnnotator, PixelRect};
pub use config::{RecorderConfig, SampleVideo, StoreFailurePolicy};
pub use detector::{
    Detection, DetectionError, DetectionOptions, MockObjectDetector, NormalizedRect,
    ObjectDetector, PrecomputedDetector,
};
pub use error::RecorderError;
pub use pipeline::{
    CaptureSummary, DetectionRecorder, InferenceSlot, RecorderStats, RecordingOutcome,
};
pub use state_machine::{CaptureState, DetectionGate, GateAction};
