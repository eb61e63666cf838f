use crate::core::export::{export_video, MediaLibrary};
use crate::core::video::{
    FfmpegEncoder, Frame, FrameEncoder, FrameSource, FrameStore, VideoError, VideoInfo,
    VideoWriter, WriteHandle,
};
use crate::recorder::annotator::FrameAnnotator;
use crate::recorder::config::{RecorderConfig, StoreFailurePolicy};
use crate::recorder::detector::{Detection, DetectionError, DetectionOptions, ObjectDetector};
use crate::recorder::error::RecorderError;
use crate::recorder::state_machine::DetectionGate;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// 推理占位标记，同一时刻只允许一帧在推理中
#[derive(Debug, Default)]
pub struct InferenceSlot {
    busy: AtomicBool,
}

pub struct SlotGuard<'a> {
    slot: &'a InferenceSlot,
}

impl InferenceSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<SlotGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SlotGuard { slot: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.slot.busy.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecorderStats {
    pub processed_frames: u64,
    pub captured_frames: u64,
    pub dropped_frames: u64,
    pub inference_failures: u64,
}

#[derive(Debug, Clone)]
pub struct CaptureSummary {
    pub video_info: VideoInfo,
    pub captured_frames: u64,
}

#[derive(Debug, Clone)]
pub struct RecordingOutcome {
    pub output: PathBuf,
    pub exported: Option<PathBuf>,
    pub captured_frames: u64,
    pub video_info: VideoInfo,
}

type ProgressFn = Box<dyn Fn(u64, u64) + Send + Sync>;

/// 读帧 -> 检测 -> 门控 -> 标注 -> 存盘，录满后编码导出
pub struct DetectionRecorder {
    config: RecorderConfig,
    annotator: FrameAnnotator,
    slot: InferenceSlot,
    stats: Arc<Mutex<RecorderStats>>,
    progress: Option<ProgressFn>,
}

impl DetectionRecorder {
    pub fn new(config: RecorderConfig) -> Result<Self, RecorderError> {
        config.validate()?;
        let annotator = FrameAnnotator::new(&config.target_label)
            .with_color(config.box_color)
            .with_line_width(config.line_width);
        Ok(Self {
            config,
            annotator,
            slot: InferenceSlot::new(),
            stats: Arc::new(Mutex::new(RecorderStats::default())),
            progress: None,
        })
    }

    /// `progress(captured, required)`
    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn stats(&self) -> RecorderStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn reset(&self) {
        if let Ok(mut stats) = self.stats.lock() {
            *stats = RecorderStats::default();
        }
    }

    fn update_stats(&self, f: impl FnOnce(&mut RecorderStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            f(&mut stats);
        }
    }

    /// 推理失败按无检测结果处理
    fn infer(&self, detector: &dyn ObjectDetector, frame: &Frame) -> Vec<Detection> {
        let result = match self.slot.try_acquire() {
            Some(_guard) => detector.detect_with(frame, &DetectionOptions::for_frame(frame)),
            None => Err(DetectionError::Busy),
        };
        match result {
            Ok(detections) => detections,
            Err(e) => {
                warn!("⚠️ Failed to perform detection on frame {}: {}", frame.frame_number, e);
                self.update_stats(|s| s.inference_failures += 1);
                Vec::new()
            }
        }
    }

    /// 解码并录制，录满后取消读取
    pub fn capture<S>(
        &self,
        source: &mut S,
        detector: &dyn ObjectDetector,
        store: &dyn FrameStore,
    ) -> Result<CaptureSummary, RecorderError>
    where
        S: FrameSource + ?Sized,
    {
        let info = source.video_info();
        let required = info.required_frames(self.config.required_seconds);
        if required == 0 {
            return Err(RecorderError::Config(format!(
                "frame rate {} too low to record",
                info.fps
            )));
        }

        let mut gate = DetectionGate::new(&self.config.target_label, required);
        info!(
            "🎬 Recording {} frames once '{}' appears",
            required, self.config.target_label
        );

        while let Some(item) = source.next() {
            let frame = match item {
                Ok(frame) => frame,
                Err(e) => {
                    error!("❌ Decode failed: {}", e);
                    source.cancel();
                    return Err(e.into());
                }
            };
            self.update_stats(|s| s.processed_frames += 1);

            let detections = self.infer(detector, &frame);
            if !gate.observe(&detections) {
                continue;
            }
            let Some(index) = gate.record_capture() else {
                break;
            };
            if index == 1 {
                info!("🎯 '{}' detected at frame {}", self.config.target_label, frame.frame_number);
            }

            let rendered = self.annotator.annotate(&frame, &detections, info.size());
            match store.put(index, &rendered) {
                Ok(()) => self.update_stats(|s| s.captured_frames += 1),
                Err(e) => match self.config.store_failure {
                    StoreFailurePolicy::Abort => {
                        error!("❌ Failed to store frame {}: {}", index, e);
                        source.cancel();
                        return Err(RecorderError::StoreFailed { index, source: e });
                    }
                    StoreFailurePolicy::Skip => {
                        warn!("⚠️ Failed to store frame {}, skipping: {}", index, e);
                        self.update_stats(|s| s.dropped_frames += 1);
                    }
                },
            }

            debug!("Extracting {}/{}", index, required);
            if let Some(progress) = &self.progress {
                progress(index, required);
            }

            if gate.is_complete() {
                source.cancel();
                break;
            }
        }

        if !gate.is_complete() {
            return Err(RecorderError::SourceExhausted {
                captured: gate.captured(),
                required,
            });
        }

        info!("✅ Captured {} frames", gate.captured());
        Ok(CaptureSummary {
            video_info: info,
            captured_frames: gate.captured(),
        })
    }

    /// 在独立线程编码，立即返回完成句柄
    pub fn encode_using<E, M>(
        &self,
        summary: &CaptureSummary,
        store: Arc<dyn FrameStore>,
        output: &Path,
        make_encoder: M,
    ) -> Result<WriteHandle, RecorderError>
    where
        E: FrameEncoder + 'static,
        M: FnOnce(&Path, &VideoInfo) -> Result<E, VideoError>,
    {
        let writer = VideoWriter::new(output, summary.video_info)?
            .with_time_scale(self.config.time_scale)
            .with_ffmpeg(&self.config.ffmpeg_path);
        let handle = writer.write_output_using(
            summary.captured_frames,
            move |index| store.get(index),
            make_encoder,
        )?;
        Ok(handle)
    }

    pub fn encode(
        &self,
        summary: &CaptureSummary,
        store: Arc<dyn FrameStore>,
        output: &Path,
    ) -> Result<WriteHandle, RecorderError> {
        let ffmpeg = self.config.ffmpeg_path.clone();
        let time_scale = self.config.time_scale;
        self.encode_using(summary, store, output, move |url, info| {
            FfmpegEncoder::spawn(&ffmpeg, url, info, time_scale)
        })
    }

    pub fn run<S>(
        &self,
        source: &mut S,
        detector: &dyn ObjectDetector,
        store: Arc<dyn FrameStore>,
        library: Option<&dyn MediaLibrary>,
    ) -> Result<RecordingOutcome, RecorderError>
    where
        S: FrameSource + ?Sized,
    {
        let ffmpeg = self.config.ffmpeg_path.clone();
        let time_scale = self.config.time_scale;
        self.run_using(source, detector, store, library, move |url, info| {
            FfmpegEncoder::spawn(&ffmpeg, url, info, time_scale)
        })
    }

    pub fn run_using<S, E, M>(
        &self,
        source: &mut S,
        detector: &dyn ObjectDetector,
        store: Arc<dyn FrameStore>,
        library: Option<&dyn MediaLibrary>,
        make_encoder: M,
    ) -> Result<RecordingOutcome, RecorderError>
    where
        S: FrameSource + ?Sized,
        E: FrameEncoder + 'static,
        M: FnOnce(&Path, &VideoInfo) -> Result<E, VideoError>,
    {
        let summary = self.capture(source, detector, store.as_ref())?;
        let output = self.config.output_path()?;

        let handle = self.encode_using(&summary, store, &output, make_encoder)?;
        if !handle.wait() {
            error!("❌ Failed to write {:?}", output);
            return Err(RecorderError::EncodeFailed);
        }

        let exported = match library {
            Some(library) => Some(export_video(library, &output)?),
            None => None,
        };

        Ok(RecordingOutcome {
            output,
            exported,
            captured_frames: summary.captured_frames,
            video_info: summary.video_info,
        })
    }
}
