//! 视频写出 - 将存储的帧按序编码为 mp4

use super::error::VideoError;
use super::info::VideoInfo;
use crossbeam_channel::{bounded, Receiver};
use image::{imageops, RgbImage, RgbaImage};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

pub const DEFAULT_TIME_SCALE: i32 = 600;

/// 有理时间：`value / timescale` 秒
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaTime {
    pub value: i64,
    pub timescale: i32,
}

impl MediaTime {
    pub const fn zero(timescale: i32) -> Self {
        Self {
            value: 0,
            timescale,
        }
    }

    pub fn seconds(&self) -> f64 {
        self.value as f64 / self.timescale as f64
    }
}

/// 第 `position` 帧（0 起始）的显示时间。
///
/// 每帧单独由序号计算，不做累加，所以非整数帧率下也不会漂移。
pub fn presentation_time(position: u64, fps: f32, timescale: i32) -> MediaTime {
    let ticks = position as f64 * timescale as f64 / fps as f64;
    MediaTime {
        value: ticks.round() as i64,
        timescale,
    }
}

/// 编码器后端
///
/// `FfmpegEncoder` 以恒定帧率接收原始帧，`append` 的时间戳只用于校验单调递增；
/// 输出轨道的时间刻度取自 `time_scale`，与 `presentation_time` 的刻度一致。
pub trait FrameEncoder: Send {
    fn is_ready_for_more_data(&mut self) -> bool;

    fn append(&mut self, canvas: &RgbImage, time: MediaTime) -> Result<(), VideoError>;

    /// 即使前面失败也会调用，用于冲刷并释放资源
    fn finish(self: Box<Self>) -> Result<(), VideoError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Idle,
    Writing,
    Finishing,
    Done { success: bool },
}

/// 编码完成信号，只会触发一次
pub struct WriteHandle {
    state: Arc<Mutex<WriterState>>,
    done: Receiver<bool>,
}

impl WriteHandle {
    pub fn state(&self) -> WriterState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(WriterState::Done { success: false })
    }

    /// 阻塞直到编码线程结束
    pub fn wait(self) -> bool {
        self.done.recv().unwrap_or(false)
    }

}

/// 等比缩放后居中绘制到编码画布，空白处为黑色
pub fn fit_to_canvas(image: &RgbaImage, width: u32, height: u32) -> RgbImage {
    let (src_w, src_h) = image.dimensions();
    let mut canvas = RgbImage::new(width, height);
    if src_w == 0 || src_h == 0 || width == 0 || height == 0 {
        return canvas;
    }

    let ratio = (width as f64 / src_w as f64).min(height as f64 / src_h as f64);
    let new_w = ((src_w as f64 * ratio).round() as u32).clamp(1, width);
    let new_h = ((src_h as f64 * ratio).round() as u32).clamp(1, height);
    let x = (width - new_w) / 2;
    let y = (height - new_h) / 2;

    let scaled;
    let source = if (new_w, new_h) == (src_w, src_h) {
        image
    } else {
        scaled = imageops::resize(image, new_w, new_h, imageops::FilterType::Triangle);
        &scaled
    };

    let row_bytes = width as usize * 3;
    canvas
        .par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(row, out)| {
            let row = row as u32;
            if row < y || row >= y + new_h {
                return;
            }
            for col in 0..new_w {
                let px = source.get_pixel(col, row - y).0;
                let alpha = px[3] as u16;
                let offset = ((x + col) * 3) as usize;
                // 预乘 alpha，透明处合成到黑底
                out[offset] = (px[0] as u16 * alpha / 255) as u8;
                out[offset + 1] = (px[1] as u16 * alpha / 255) as u8;
                out[offset + 2] = (px[2] as u16 * alpha / 255) as u8;
            }
        });

    canvas
}

pub struct VideoWriter {
    url: PathBuf,
    info: VideoInfo,
    time_scale: i32,
    ffmpeg: String,
}

impl VideoWriter {
    pub fn new(url: impl Into<PathBuf>, info: VideoInfo) -> Result<Self, VideoError> {
        if info.width == 0 || info.height == 0 {
            return Err(VideoError::InvalidDimensions {
                width: info.width,
                height: info.height,
            });
        }
        Ok(Self {
            url: url.into(),
            info,
            time_scale: DEFAULT_TIME_SCALE,
            ffmpeg: "ffmpeg".to_string(),
        })
    }

    pub fn with_time_scale(mut self, time_scale: i32) -> Self {
        self.time_scale = time_scale;
        self
    }

    pub fn with_ffmpeg(mut self, ffmpeg: &str) -> Self {
        self.ffmpeg = ffmpeg.to_string();
        self
    }

    pub fn url(&self) -> &Path {
        &self.url
    }

    /// 用 ffmpeg/H.264 写出 `frame_count` 帧，`frame_at` 以 1 起始的序号取帧
    pub fn write_output<F>(&self, frame_count: u64, frame_at: F) -> Result<WriteHandle, VideoError>
    where
        F: FnMut(u64) -> Option<RgbaImage> + Send + 'static,
    {
        let ffmpeg = self.ffmpeg.clone();
        let time_scale = self.time_scale;
        self.write_output_using(frame_count, frame_at, move |url, info| {
            FfmpegEncoder::spawn(&ffmpeg, url, info, time_scale)
        })
    }

    /// 回调版本，`complete` 恰好调用一次
    pub fn write_output_with<F, C>(
        &self,
        frame_count: u64,
        frame_at: F,
        complete: C,
    ) -> Result<(), VideoError>
    where
        F: FnMut(u64) -> Option<RgbaImage> + Send + 'static,
        C: FnOnce(bool) + Send + 'static,
    {
        let handle = self.write_output(frame_count, frame_at)?;
        thread::Builder::new()
            .name("video-writer-complete".to_string())
            .spawn(move || complete(handle.wait()))?;
        Ok(())
    }

    pub fn write_output_using<F, E, M>(
        &self,
        frame_count: u64,
        mut frame_at: F,
        make_encoder: M,
    ) -> Result<WriteHandle, VideoError>
    where
        F: FnMut(u64) -> Option<RgbaImage> + Send + 'static,
        E: FrameEncoder + 'static,
        M: FnOnce(&Path, &VideoInfo) -> Result<E, VideoError>,
    {
        if self.url.exists() {
            std::fs::remove_file(&self.url)?;
            debug!("Removed previous output {:?}", self.url);
        }

        let encoder: Box<dyn FrameEncoder> = Box::new(make_encoder(&self.url, &self.info)?);
        let state = Arc::new(Mutex::new(WriterState::Idle));
        let (tx, rx) = bounded(1);

        let info = self.info;
        let time_scale = self.time_scale;
        let thread_state = Arc::clone(&state);
        thread::Builder::new()
            .name("video-writer".to_string())
            .spawn(move || {
                let success = run_writer(
                    encoder,
                    frame_count,
                    &mut frame_at,
                    info,
                    time_scale,
                    &thread_state,
                );
                let _ = tx.send(success);
            })?;

        Ok(WriteHandle { state, done: rx })
    }
}

fn set_state(state: &Mutex<WriterState>, next: WriterState) {
    if let Ok(mut current) = state.lock() {
        *current = next;
    }
}

fn run_writer(
    mut encoder: Box<dyn FrameEncoder>,
    frame_count: u64,
    frame_at: &mut dyn FnMut(u64) -> Option<RgbaImage>,
    info: VideoInfo,
    time_scale: i32,
    state: &Mutex<WriterState>,
) -> bool {
    set_state(state, WriterState::Writing);
    info!("🎞️ Writing {} frames at {:.2}fps", frame_count, info.fps);

    let mut success = false;
    for position in 0..frame_count {
        if !encoder.is_ready_for_more_data() {
            warn!("⚠️ Encoder not ready for more data at frame {}", position + 1);
            success = false;
            break;
        }
        let Some(image) = frame_at(position + 1) else {
            warn!("⚠️ Stored frame {} missing, stopping", position + 1);
            success = false;
            break;
        };

        let canvas = fit_to_canvas(&image, info.width, info.height);
        let time = presentation_time(position, info.fps, time_scale);
        if let Err(e) = encoder.append(&canvas, time) {
            error!("❌ Failed to append frame {}: {}", position + 1, e);
            success = false;
            break;
        }
        success = true;
    }

    set_state(state, WriterState::Finishing);
    if let Err(e) = encoder.finish() {
        error!("❌ Failed to finish video: {}", e);
        success = false;
    }

    set_state(state, WriterState::Done { success });
    info!("🏁 Video writer done, success: {}", success);
    success
}

fn encode_args(url: &Path, info: &VideoInfo, time_scale: i32) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgb24".into(),
        "-s".into(),
        format!("{}x{}", info.width, info.height),
        "-framerate".into(),
        format!("{}", info.fps),
        "-i".into(),
        "-".into(),
        "-c:v".into(),
        "libx264".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-video_track_timescale".into(),
        time_scale.to_string(),
        "-movflags".into(),
        "+faststart".into(),
        "-f".into(),
        "mp4".into(),
        url.to_string_lossy().into_owned(),
    ]
}

/// rawvideo 管道 -> libx264 -> mp4
pub struct FfmpegEncoder {
    child: Child,
    stdin: Option<ChildStdin>,
    width: u32,
    height: u32,
    last_time: Option<MediaTime>,
}

impl FfmpegEncoder {
    pub fn spawn(
        ffmpeg: &str,
        url: &Path,
        info: &VideoInfo,
        time_scale: i32,
    ) -> Result<Self, VideoError> {
        // yuv420p 要求偶数尺寸
        if info.width % 2 != 0 || info.height % 2 != 0 {
            return Err(VideoError::EncoderSetup(format!(
                "H.264 output requires even dimensions, got {}x{}",
                info.width, info.height
            )));
        }

        let mut child = Command::new(ffmpeg)
            .args(encode_args(url, info, time_scale))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| VideoError::EncoderSetup(e.to_string()))?;
        let stdin = child.stdin.take();
        if stdin.is_none() {
            let _ = child.kill();
            return Err(VideoError::EncoderSetup(
                "failed to open ffmpeg stdin".to_string(),
            ));
        }

        Ok(Self {
            child,
            stdin,
            width: info.width,
            height: info.height,
            last_time: None,
        })
    }
}

impl FrameEncoder for FfmpegEncoder {
    fn is_ready_for_more_data(&mut self) -> bool {
        self.stdin.is_some() && matches!(self.child.try_wait(), Ok(None))
    }

    fn append(&mut self, canvas: &RgbImage, time: MediaTime) -> Result<(), VideoError> {
        if canvas.dimensions() != (self.width, self.height) {
            return Err(VideoError::Encode(format!(
                "canvas {}x{} does not match output {}x{}",
                canvas.width(),
                canvas.height(),
                self.width,
                self.height
            )));
        }
        if let Some(last) = self.last_time {
            if time.value <= last.value {
                return Err(VideoError::Encode(format!(
                    "non-increasing presentation time {} after {}",
                    time.value, last.value
                )));
            }
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| VideoError::Encode("encoder input closed".to_string()))?;
        stdin.write_all(canvas.as_raw())?;
        self.last_time = Some(time);
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<(), VideoError> {
        // 关闭 stdin 让 ffmpeg 冲刷
        drop(self.stdin.take());
        let status = self.child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(VideoError::Encode(format!("ffmpeg exited with {}", status)))
        }
    }
}
