//! 视频帧读取 - ffprobe 探测轨道 + ffmpeg 解码为 rawvideo

use super::error::VideoError;
use super::frame::{CameraIntrinsics, Frame, PixelFormat};
use super::info::{parse_frame_rate, VideoInfo};
use log::{debug, info, warn};
use serde::Deserialize;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

/// 单向、一次性的帧序列，支持提前取消
pub trait FrameSource: Iterator<Item = Result<Frame, VideoError>> {
    fn video_info(&self) -> VideoInfo;

    /// 取消后不再产出任何帧
    fn cancel(&mut self);

    fn is_cancelled(&self) -> bool;
}

/// 从任意字节流按固定帧长切出 rawvideo 帧
pub struct RawFrameReader<R: Read> {
    reader: Option<R>,
    info: VideoInfo,
    format: PixelFormat,
    frame_number: u64,
    cancelled: bool,
    camera_intrinsics: Option<CameraIntrinsics>,
}

impl<R: Read> RawFrameReader<R> {
    pub fn new(reader: R, info: VideoInfo, format: PixelFormat) -> Self {
        Self {
            reader: Some(reader),
            info,
            format,
            frame_number: 0,
            cancelled: false,
            camera_intrinsics: None,
        }
    }

    /// 每一帧都附带同一组相机内参
    pub fn with_camera_intrinsics(mut self, intrinsics: Option<CameraIntrinsics>) -> Self {
        self.camera_intrinsics = intrinsics;
        self
    }

    fn frame_bytes(&self) -> usize {
        self.info.width as usize * self.info.height as usize * self.format.bytes_per_pixel()
    }

    pub fn frames_read(&self) -> u64 {
        self.frame_number
    }
}

impl<R: Read> Iterator for RawFrameReader<R> {
    type Item = Result<Frame, VideoError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cancelled {
            return None;
        }
        let mut buffer = vec![0u8; self.frame_bytes()];
        let reader = self.reader.as_mut()?;

        match reader.read_exact(&mut buffer) {
            Ok(()) => {
                let timestamp_ms = (self.frame_number as f64 * 1000.0 / self.info.fps as f64) as u64;
                let frame = Frame::new(
                    self.info.width,
                    self.info.height,
                    buffer,
                    self.format,
                    timestamp_ms,
                    self.frame_number,
                )
                .with_camera_intrinsics(self.camera_intrinsics);
                self.frame_number += 1;
                Some(Ok(frame))
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!("Frame stream ended after {} frames", self.frame_number);
                self.reader = None;
                None
            }
            Err(e) => {
                self.reader = None;
                Some(Err(VideoError::Decode(e.to_string())))
            }
        }
    }
}

impl<R: Read> FrameSource for RawFrameReader<R> {
    fn video_info(&self) -> VideoInfo {
        self.info
    }

    fn cancel(&mut self) {
        self.cancelled = true;
        self.reader = None;
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
}

fn parse_probe_output(json: &str) -> Result<VideoInfo, VideoError> {
    let output: ProbeOutput =
        serde_json::from_str(json).map_err(|e| VideoError::Probe(e.to_string()))?;
    let stream = output.streams.into_iter().next().ok_or(VideoError::NoVideoTrack)?;

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .ok_or_else(|| VideoError::Probe("missing frame rate".to_string()))?;

    VideoInfo::new(fps, stream.width.unwrap_or(0), stream.height.unwrap_or(0))
}

fn probe_args(path: &Path) -> Vec<String> {
    vec![
        "-v".into(),
        "error".into(),
        "-select_streams".into(),
        "v:0".into(),
        "-show_entries".into(),
        "stream=width,height,avg_frame_rate,r_frame_rate".into(),
        "-of".into(),
        "json".into(),
        path.to_string_lossy().into_owned(),
    ]
}

fn decode_args(path: &Path, format: PixelFormat) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        // 探测到的是存储尺寸，旋转后宽高会互换
        "-noautorotate".into(),
        "-i".into(),
        path.to_string_lossy().into_owned(),
        "-map".into(),
        "0:v:0".into(),
        "-an".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        format.ffmpeg_name().into(),
        "-".into(),
    ]
}

/// 基于 ffmpeg 的视频读取器，只使用第一条视频轨
pub struct VideoReader {
    path: PathBuf,
    info: VideoInfo,
    ffmpeg: String,
    child: Option<Child>,
    frames: Option<RawFrameReader<ChildStdout>>,
    cancelled: bool,
    camera_intrinsics: Option<CameraIntrinsics>,
}

impl VideoReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VideoError> {
        Self::open_with(path, "ffprobe", "ffmpeg")
    }

    pub fn open_with(
        path: impl AsRef<Path>,
        ffprobe: &str,
        ffmpeg: &str,
    ) -> Result<Self, VideoError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(VideoError::Io(std::io::Error::new(
                ErrorKind::NotFound,
                format!("video not found: {}", path.display()),
            )));
        }

        let output = Command::new(ffprobe).args(probe_args(&path)).output()?;
        if !output.status.success() {
            return Err(VideoError::Probe(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        let info = parse_probe_output(&String::from_utf8_lossy(&output.stdout))?;
        info!(
            "📹 Opened {:?}: {}x{} @ {:.2}fps",
            path, info.width, info.height, info.fps
        );

        Ok(Self {
            path,
            info,
            ffmpeg: ffmpeg.to_string(),
            child: None,
            frames: None,
            cancelled: false,
            camera_intrinsics: None,
        })
    }

    pub fn with_camera_intrinsics(mut self, intrinsics: Option<CameraIntrinsics>) -> Self {
        self.camera_intrinsics = intrinsics;
        self
    }

    /// 开始解码；已在读取时先取消上一次
    pub fn start_reading(&mut self) -> Result<(), VideoError> {
        if self.frames.is_some() {
            debug!("Restarting extraction, cancelling previous reader");
            self.stop_child();
        }

        let mut child = Command::new(&self.ffmpeg)
            .args(decode_args(&self.path, PixelFormat::Bgra8))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VideoError::Decode("failed to capture ffmpeg stdout".to_string()))?;

        self.frames = Some(
            RawFrameReader::new(stdout, self.info, PixelFormat::Bgra8)
                .with_camera_intrinsics(self.camera_intrinsics),
        );
        self.child = Some(child);
        self.cancelled = false;
        Ok(())
    }

    fn stop_child(&mut self) {
        self.frames = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                debug!("ffmpeg already exited: {}", e);
            }
            let _ = child.wait();
        }
    }

    fn reap(&mut self) {
        self.frames = None;
        if let Some(mut child) = self.child.take() {
            match child.wait() {
                Ok(status) if !status.success() => {
                    warn!("⚠️ ffmpeg decoder exited with {}", status)
                }
                Err(e) => warn!("⚠️ Failed to wait for ffmpeg decoder: {}", e),
                _ => {}
            }
        }
    }
}

impl Iterator for VideoReader {
    type Item = Result<Frame, VideoError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cancelled {
            return None;
        }
        let item = self.frames.as_mut()?.next();
        if item.is_none() {
            self.reap();
        }
        item
    }
}

impl FrameSource for VideoReader {
    fn video_info(&self) -> VideoInfo {
        self.info
    }

    fn cancel(&mut self) {
        if self.frames.is_some() {
            info!("⏹️ Cancelling video reader");
        }
        self.cancelled = true;
        self.stop_child();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl Drop for VideoReader {
    fn drop(&mut self) {
        self.stop_child();
    }
}
