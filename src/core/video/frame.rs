use image::{imageops, RgbaImage};
use std::time::Duration;

/// 像素排列，每通道 8 bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 解码器输出格式
    Bgra8,
    Rgba8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        4
    }

    /// ffmpeg `-pix_fmt` 名称
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            PixelFormat::Bgra8 => "bgra",
            PixelFormat::Rgba8 => "rgba",
        }
    }
}

/// 相机内参矩阵（3x3，按行）
pub type CameraIntrinsics = [[f32; 3]; 3];

/// 帧数据结构
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub format: PixelFormat,
    pub timestamp: Duration,
    pub frame_number: u64,
    /// 随帧附带的相机内参，交给检测服务
    pub camera_intrinsics: Option<CameraIntrinsics>,
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        data: Vec<u8>,
        format: PixelFormat,
        timestamp_ms: u64,
        frame_number: u64,
    ) -> Self {
        Self {
            width,
            height,
            data,
            format,
            timestamp: Duration::from_millis(timestamp_ms),
            frame_number,
            camera_intrinsics: None,
        }
    }

    pub fn with_camera_intrinsics(mut self, intrinsics: Option<CameraIntrinsics>) -> Self {
        self.camera_intrinsics = intrinsics;
        self
    }

    pub fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    pub fn byte_len(&self) -> usize {
        self.pixel_count() * self.format.bytes_per_pixel()
    }

    /// 转成 RGBA 图像；数据长度与尺寸不符时返回 None
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        let data = match self.format {
            PixelFormat::Rgba8 => self.data.clone(),
            PixelFormat::Bgra8 => {
                let mut rgba = Vec::with_capacity(self.data.len());
                for chunk in self.data.chunks_exact(4) {
                    rgba.push(chunk[2]); // R
                    rgba.push(chunk[1]); // G
                    rgba.push(chunk[0]); // B
                    rgba.push(chunk[3]); // A
                }
                rgba
            }
        };
        RgbaImage::from_raw(self.width, self.height, data)
    }

    pub fn resize_to(&self, target_width: u32, target_height: u32) -> Option<Frame> {
        let img = self.to_rgba_image()?;
        let resized = imageops::resize(
            &img,
            target_width,
            target_height,
            imageops::FilterType::Triangle,
        );

        Some(Frame {
            width: target_width,
            height: target_height,
            data: resized.into_raw(),
            format: PixelFormat::Rgba8,
            timestamp: self.timestamp,
            frame_number: self.frame_number,
            camera_intrinsics: self.camera_intrinsics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let data = vec![255u8; 100 * 100 * 4];
        let frame = Frame::new(100, 100, data, PixelFormat::Bgra8, 1000, 30);

        assert_eq!(frame.width, 100);
        assert_eq!(frame.height, 100);
        assert_eq!(frame.pixel_count(), 10000);
        assert_eq!(frame.byte_len(), 40000);
        assert_eq!(frame.timestamp.as_millis(), 1000);
        assert_eq!(frame.frame_number, 30);
    }

    #[test]
    fn test_bgra_to_rgba_swaps_channels() {
        let frame = Frame::new(1, 1, vec![10, 20, 30, 255], PixelFormat::Bgra8, 0, 0);
        let img = frame.to_rgba_image().unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [30, 20, 10, 255]);
    }

    #[test]
    fn test_malformed_data_rejected() {
        let frame = Frame::new(4, 4, vec![0u8; 10], PixelFormat::Rgba8, 0, 0);
        assert!(frame.to_rgba_image().is_none());
        assert!(frame.resize_to(2, 2).is_none());
    }

    #[test]
    fn test_frame_resize() {
        let data = vec![255u8; 100 * 100 * 4];
        let frame = Frame::new(100, 100, data, PixelFormat::Bgra8, 0, 0);
        let resized = frame.resize_to(32, 32).unwrap();

        assert_eq!(resized.width, 32);
        assert_eq!(resized.height, 32);
        assert_eq!(resized.format, PixelFormat::Rgba8);
        assert_eq!(resized.data.len(), 32 * 32 * 4);
    }

    #[test]
    fn test_intrinsics_survive_resize() {
        let k = [[500.0, 0.0, 50.0], [0.0, 500.0, 50.0], [0.0, 0.0, 1.0]];
        let frame = Frame::new(100, 100, vec![0u8; 100 * 100 * 4], PixelFormat::Bgra8, 0, 0)
            .with_camera_intrinsics(Some(k));
        assert_eq!(frame.resize_to(10, 10).unwrap().camera_intrinsics, Some(k));
    }
}
