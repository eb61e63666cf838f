use serde::{Deserialize, Serialize};

use super::error::VideoError;

/// 视频轨道信息，打开文件后即固定
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub fps: f32,
    pub width: u32,
    pub height: u32,
}

impl Default for VideoInfo {
    fn default() -> Self {
        Self {
            fps: 30.0,
            width: 640,
            height: 480,
        }
    }
}

impl VideoInfo {
    pub fn new(fps: f32, width: u32, height: u32) -> Result<Self, VideoError> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(VideoError::Probe(format!("invalid frame rate: {}", fps)));
        }
        if width == 0 || height == 0 {
            return Err(VideoError::InvalidDimensions { width, height });
        }
        Ok(Self { fps, width, height })
    }

    pub fn rounded_fps(&self) -> u32 {
        self.fps.round() as u32
    }

    /// 录制 `seconds` 秒需要的帧数
    pub fn required_frames(&self, seconds: u32) -> u64 {
        seconds as u64 * self.rounded_fps() as u64
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Parses ffprobe rationals such as `30000/1001` or `25`.
pub(crate) fn parse_frame_rate(value: &str) -> Option<f32> {
    match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 || num <= 0.0 {
                None
            } else {
                Some((num / den) as f32)
            }
        }
        None => value.trim().parse::<f32>().ok().filter(|v| *v > 0.0),
    }
}
