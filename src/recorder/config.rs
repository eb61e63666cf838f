use super::error::RecorderError;
use crate::core::video::{
    CameraIntrinsics, DiskFrameStore, StoreError, DEFAULT_FRAMES_FOLDER, DEFAULT_TIME_SCALE,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 帧写盘失败时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreFailurePolicy {
    /// 立即终止整个流程
    Abort,
    /// 记录日志后继续，编码时会在缺失的序号处失败
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub target_label: String,
    pub required_seconds: u32,
    pub time_scale: i32,
    pub documents_dir: Option<PathBuf>,
    pub frames_folder: String,
    pub output_file: String,
    pub box_color: [u8; 3],
    pub line_width: u32,
    pub store_failure: StoreFailurePolicy,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    /// 拍摄设备的内参，随每一帧交给检测服务
    pub camera_intrinsics: Option<CameraIntrinsics>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            target_label: "person".to_string(),
            required_seconds: 10,
            time_scale: DEFAULT_TIME_SCALE,
            documents_dir: None,
            frames_folder: DEFAULT_FRAMES_FOLDER.to_string(),
            output_file: "output.mp4".to_string(),
            box_color: [255, 0, 0],
            line_width: 4,
            store_failure: StoreFailurePolicy::Abort,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            camera_intrinsics: None,
        }
    }
}

impl RecorderConfig {
    pub fn short_clip() -> Self {
        Self {
            required_seconds: 3,
            ..Default::default()
        }
    }

    pub fn from_json5_str(text: &str) -> Result<Self, RecorderError> {
        let config: RecorderConfig =
            json5::from_str(text).map_err(|e| RecorderError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RecorderError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            RecorderError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json5_str(&text)
    }

    pub fn validate(&self) -> Result<(), RecorderError> {
        if self.target_label.is_empty() {
            return Err(RecorderError::Config("target_label is empty".to_string()));
        }
        if self.required_seconds == 0 {
            return Err(RecorderError::Config(
                "required_seconds must be positive".to_string(),
            ));
        }
        if self.time_scale <= 0 {
            return Err(RecorderError::Config(
                "time_scale must be positive".to_string(),
            ));
        }
        if self.output_file.is_empty() || self.frames_folder.is_empty() {
            return Err(RecorderError::Config(
                "output_file and frames_folder must be set".to_string(),
            ));
        }
        Ok(())
    }

    /// 未配置时使用当前工作目录
    pub fn documents_dir(&self) -> Option<PathBuf> {
        self.documents_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
    }

    pub fn output_path(&self) -> Result<PathBuf, RecorderError> {
        let dir = self
            .documents_dir()
            .ok_or(RecorderError::Store(StoreError::NoDocumentDirectory))?;
        Ok(dir.join(&self.output_file))
    }

    pub fn frame_store(&self) -> Result<DiskFrameStore, RecorderError> {
        Ok(DiskFrameStore::in_documents(
            self.documents_dir().as_deref(),
            &self.frames_folder,
        )?)
    }
}

/// 随应用打包的示例视频
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleVideo {
    OneByOne,
    HeadFemale,
    FaceWalkingAndPause,
    FaceWalking,
    People,
    PersonBicycleCar,
}

impl SampleVideo {
    pub const ALL: [SampleVideo; 6] = [
        SampleVideo::OneByOne,
        SampleVideo::HeadFemale,
        SampleVideo::FaceWalkingAndPause,
        SampleVideo::FaceWalking,
        SampleVideo::People,
        SampleVideo::PersonBicycleCar,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SampleVideo::OneByOne => "one-by-one-person-detection",
            SampleVideo::HeadFemale => "head-pose-face-detection-female-and-male",
            SampleVideo::FaceWalkingAndPause => "face-demographics-walking-and-pause",
            SampleVideo::FaceWalking => "face-demographics-walking",
            SampleVideo::People => "people-detection",
            SampleVideo::PersonBicycleCar => "person-bicycle-car-detection",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.mp4", self.name())
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RecorderConfig::default();
        assert_eq!(config.target_label, "person");
        assert_eq!(config.required_seconds, 10);
        assert_eq!(config.time_scale, 600);
        assert_eq!(config.store_failure, StoreFailurePolicy::Abort);
        assert!(config.validate().is_ok());
        assert_eq!(RecorderConfig::short_clip().required_seconds, 3);
    }

    #[test]
    fn test_from_json5_partial() {
        let config = RecorderConfig::from_json5_str(
            r#"{
                // 只覆盖部分字段
                target_label: 'car',
                required_seconds: 5,
                store_failure: 'skip',
                documents_dir: '/data/docs',
            }"#,
        )
        .unwrap();

        assert_eq!(config.target_label, "car");
        assert_eq!(config.required_seconds, 5);
        assert_eq!(config.store_failure, StoreFailurePolicy::Skip);
        assert_eq!(config.output_file, "output.mp4");
        assert_eq!(
            config.output_path().unwrap(),
            PathBuf::from("/data/docs/output.mp4")
        );
        assert_eq!(
            config.frame_store().unwrap().frame_path(1),
            PathBuf::from("/data/docs/RenderedImages/1.png")
        );
    }

    #[test]
    fn test_camera_intrinsics_from_json5() {
        let config = RecorderConfig::from_json5_str(
            "{ camera_intrinsics: [[500, 0, 320], [0, 500, 240], [0, 0, 1]] }",
        )
        .unwrap();
        assert_eq!(
            config.camera_intrinsics,
            Some([[500.0, 0.0, 320.0], [0.0, 500.0, 240.0], [0.0, 0.0, 1.0]])
        );
        assert_eq!(RecorderConfig::default().camera_intrinsics, None);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            RecorderConfig::from_json5_str("{ required_seconds: 0 }"),
            Err(RecorderError::Config(_))
        ));
        assert!(matches!(
            RecorderConfig::from_json5_str("{ time_scale: -1 }"),
            Err(RecorderError::Config(_))
        ));
        assert!(matches!(
            RecorderConfig::from_json5_str("not json"),
            Err(RecorderError::Config(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recorder.json5");
        std::fs::write(&path, "{ line_width: 2, box_color: [0, 255, 0] }").unwrap();

        let config = RecorderConfig::from_file(&path).unwrap();
        assert_eq!(config.line_width, 2);
        assert_eq!(config.box_color, [0, 255, 0]);
        assert!(RecorderConfig::from_file(dir.path().join("missing.json5")).is_err());
    }

    #[test]
    fn test_sample_videos() {
        assert_eq!(
            SampleVideo::OneByOne.file_name(),
            "one-by-one-person-detection.mp4"
        );
        assert_eq!(
            SampleVideo::from_name("people-detection"),
            Some(SampleVideo::People)
        );
        assert_eq!(SampleVideo::from_name("unknown"), None);
    }
}
