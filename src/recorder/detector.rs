use crate::core::video::{CameraIntrinsics, Frame};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// 单位坐标矩形，原点在左下角
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl NormalizedRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub bounding_box: NormalizedRect,
}

impl Detection {
    pub fn new(label: &str, confidence: f32, bounding_box: NormalizedRect) -> Self {
        Self {
            label: label.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            bounding_box,
        }
    }
}

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Inference already in flight")]
    Busy,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Detection file error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// 推理附加信息
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DetectionOptions {
    pub camera_intrinsics: Option<CameraIntrinsics>,
}

impl DetectionOptions {
    pub fn for_frame(frame: &Frame) -> Self {
        Self {
            camera_intrinsics: frame.camera_intrinsics,
        }
    }
}

/// 目标检测服务，模型本身不在本 crate 内
pub trait ObjectDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, DetectionError>;

    fn detect_with(
        &self,
        frame: &Frame,
        _options: &DetectionOptions,
    ) -> Result<Vec<Detection>, DetectionError> {
        self.detect(frame)
    }
}

type DetectionPattern = Box<dyn Fn(u64) -> Result<Vec<Detection>, DetectionError> + Send + Sync>;

pub struct MockObjectDetector {
    // 按帧号返回检测结果
    pattern: Option<DetectionPattern>,
}

impl MockObjectDetector {
    pub fn new() -> Self {
        Self { pattern: None }
    }

    pub fn with_pattern<F>(pattern: F) -> Self
    where
        F: Fn(u64) -> Vec<Detection> + Send + Sync + 'static,
    {
        Self {
            pattern: Some(Box::new(
                move |n| -> Result<Vec<Detection>, DetectionError> { Ok(pattern(n)) },
            )),
        }
    }

    pub fn with_results<F>(pattern: F) -> Self
    where
        F: Fn(u64) -> Result<Vec<Detection>, DetectionError> + Send + Sync + 'static,
    {
        Self {
            pattern: Some(Box::new(pattern)),
        }
    }

    /// 指定帧号出现一个居中的 `label`
    pub fn with_fixed_frames(label: &str, frames: Vec<u64>) -> Self {
        let label = label.to_string();
        Self::with_pattern(move |frame_num| {
            if frames.contains(&frame_num) {
                vec![Detection::new(
                    &label,
                    0.9,
                    NormalizedRect::new(0.25, 0.25, 0.5, 0.5),
                )]
            } else {
                Vec::new()
            }
        })
    }
}

impl Default for MockObjectDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectDetector for MockObjectDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, DetectionError> {
        match &self.pattern {
            Some(p) => p(frame.frame_number),
            None => Ok(Vec::new()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FrameDetections {
    frame: u64,
    #[serde(default)]
    detections: Vec<Detection>,
}

/// 从 JSON 读取离线推理结果：`[{"frame": 0, "detections": [...]}, ...]`
pub struct PrecomputedDetector {
    frames: HashMap<u64, Vec<Detection>>,
}

impl PrecomputedDetector {
    pub fn from_json_str(json: &str) -> Result<Self, DetectionError> {
        let entries: Vec<FrameDetections> = serde_json::from_str(json)?;
        let mut frames: HashMap<u64, Vec<Detection>> = HashMap::new();
        for entry in entries {
            frames.entry(entry.frame).or_default().extend(entry.detections);
        }
        Ok(Self { frames })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DetectionError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl ObjectDetector for PrecomputedDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, DetectionError> {
        Ok(self
            .frames
            .get(&frame.frame_number)
            .cloned()
            .unwrap_or_default())
    }
}
