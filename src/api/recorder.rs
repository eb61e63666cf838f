//! 人物片段录制器

use crate::core::export::{FolderLibrary, MediaLibrary};
use crate::core::video::{FrameStore, VideoReader};
use crate::recorder::{
    DetectionRecorder, PrecomputedDetector, RecorderConfig, RecorderError, RecorderStats,
    SampleVideo,
};
use flutter_rust_bridge::frb;
use log::info;
use std::path::Path;
use std::sync::Arc;

/// 录制结果
#[derive(Debug, Clone)]
pub struct RecordingReport {
    pub output_path: String,
    pub exported_path: Option<String>,
    pub captured_frames: u64,
    pub fps: f32,
    pub width: u32,
    pub height: u32,
}

/// 检测到人物后录制 10 秒带标注的视频并导出
///
/// ```dart
/// final recorder = PersonClipRecorder.create(configJson5: null);
/// final report = await recorder.record(
///   videoPath: path, detectionsPath: jsonPath, libraryDir: libraryDir);
/// final stats = recorder.stats;
/// ```
#[frb(opaque)]
pub struct PersonClipRecorder {
    recorder: DetectionRecorder,
}

impl PersonClipRecorder {
    /// 创建录制器，`config_json5` 为空时使用默认配置
    #[frb(sync)]
    pub fn create(config_json5: Option<String>) -> Result<Self, RecorderError> {
        let config = match config_json5 {
            Some(text) => RecorderConfig::from_json5_str(&text)?,
            None => RecorderConfig::default(),
        };
        Self::from_config(config)
    }

    /// 只录 3 秒的预设
    #[frb(sync)]
    pub fn create_short_clip() -> Result<Self, RecorderError> {
        Self::from_config(RecorderConfig::short_clip())
    }

    fn from_config(config: RecorderConfig) -> Result<Self, RecorderError> {
        crate::init_logging();
        info!(
            "🎬 PersonClipRecorder: created, target '{}' for {}s",
            config.target_label, config.required_seconds
        );
        let recorder = DetectionRecorder::new(config)?.with_progress(|captured, required| {
            info!("Extracting {}/{}", captured, required);
        });
        Ok(Self { recorder })
    }

    /// 读取视频，按离线检测结果录制片段，写出 mp4 并保存到 `library_dir`
    #[frb]
    pub fn record(
        &self,
        video_path: String,
        detections_path: String,
        library_dir: Option<String>,
    ) -> Result<RecordingReport, RecorderError> {
        let config = self.recorder.config();
        let detector = PrecomputedDetector::from_file(&detections_path)
            .map_err(|e| RecorderError::Config(format!("{}: {}", detections_path, e)))?;

        let mut reader =
            VideoReader::open_with(&video_path, &config.ffprobe_path, &config.ffmpeg_path)?
                .with_camera_intrinsics(config.camera_intrinsics);
        reader.start_reading()?;

        let store: Arc<dyn FrameStore> = Arc::new(config.frame_store()?);
        let library = library_dir.map(FolderLibrary::new);
        let outcome = self.recorder.run(
            &mut reader,
            &detector,
            store,
            library.as_ref().map(|l| l as &dyn MediaLibrary),
        )?;

        Ok(RecordingReport {
            output_path: outcome.output.to_string_lossy().into_owned(),
            exported_path: outcome
                .exported
                .map(|p| p.to_string_lossy().into_owned()),
            captured_frames: outcome.captured_frames,
            fps: outcome.video_info.fps,
            width: outcome.video_info.width,
            height: outcome.video_info.height,
        })
    }

    /// 内置示例视频的名称
    #[frb(sync)]
    pub fn sample_videos() -> Vec<String> {
        SampleVideo::ALL.iter().map(|s| s.name().to_string()).collect()
    }

    /// 按名称录制 `samples_dir` 下的示例视频
    #[frb]
    pub fn record_sample(
        &self,
        sample_name: String,
        samples_dir: String,
        detections_path: String,
        library_dir: Option<String>,
    ) -> Result<RecordingReport, RecorderError> {
        let sample = SampleVideo::from_name(&sample_name)
            .ok_or_else(|| RecorderError::Config(format!("unknown sample video: {}", sample_name)))?;
        let video_path = Path::new(&samples_dir).join(sample.file_name());
        self.record(
            video_path.to_string_lossy().into_owned(),
            detections_path,
            library_dir,
        )
    }

    /// 获取录制统计
    #[frb(sync, getter)]
    pub fn stats(&self) -> RecorderStats {
        self.recorder.stats()
    }

    /// 重置统计
    #[frb(sync)]
    pub fn reset(&self) {
        self.recorder.reset()
    }
}

impl Drop for PersonClipRecorder {
    fn drop(&mut self) {
        info!("🗑️ PersonClipRecorder: released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::video::VideoError;

    #[test]
    fn test_create_with_defaults() {
        let recorder = PersonClipRecorder::create(None).unwrap();
        assert_eq!(recorder.stats(), RecorderStats::default());
    }

    #[test]
    fn test_create_rejects_bad_config() {
        assert!(PersonClipRecorder::create(Some("{ required_seconds: 0 }".to_string())).is_err());
    }

    #[test]
    fn test_create_short_clip() {
        let recorder = PersonClipRecorder::create_short_clip().unwrap();
        assert_eq!(recorder.recorder.config().required_seconds, 3);
    }

    #[test]
    fn test_sample_videos_listed() {
        let names = PersonClipRecorder::sample_videos();
        assert_eq!(names.len(), 6);
        assert!(names.contains(&"people-detection".to_string()));
    }

    #[test]
    fn test_record_unknown_sample() {
        let recorder = PersonClipRecorder::create(None).unwrap();
        let result = recorder.record_sample(
            "no-such-clip".to_string(),
            "/nonexistent".to_string(),
            "/nonexistent/detections.json".to_string(),
            None,
        );
        match result {
            Err(RecorderError::Config(msg)) => assert!(msg.contains("no-such-clip")),
            other => panic!("unexpected result: {:?}", other.map(|r| r.output_path)),
        }
    }

    #[test]
    fn test_record_missing_sample_file() {
        let dir = tempfile::tempdir().unwrap();
        let detections = dir.path().join("detections.json");
        std::fs::write(&detections, "[]").unwrap();

        let recorder = PersonClipRecorder::create(None).unwrap();
        let result = recorder.record_sample(
            "people-detection".to_string(),
            dir.path().to_string_lossy().into_owned(),
            detections.to_string_lossy().into_owned(),
            None,
        );
        assert!(matches!(
            result,
            Err(RecorderError::Video(VideoError::Io(_)))
        ));
    }

    #[test]
    fn test_record_missing_detections() {
        let recorder = PersonClipRecorder::create(None).unwrap();
        let result = recorder.record(
            "/nonexistent/video.mp4".to_string(),
            "/nonexistent/detections.json".to_string(),
            None,
        );
        assert!(matches!(result, Err(RecorderError::Config(_))));
    }
}
