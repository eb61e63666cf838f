//! 帧标注 - 为目标类别绘制检测框和 "label 置信度" 文字

use super::detector::{Detection, NormalizedRect};
use super::font;
use crate::core::video::Frame;
use image::{imageops, Rgba, RgbaImage};
use log::error;

/// 检测框所在的坐标变换：宽度铺满输出，保持画面比例，垂直居中
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectFill {
    pub width: f32,
    pub height: f32,
    pub offset_y: f32,
}

/// 像素坐标矩形，原点在左上角
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl AspectFill {
    pub fn new(output_size: (u32, u32), frame_size: (u32, u32)) -> Self {
        let width = output_size.0 as f32;
        let height = if frame_size.0 == 0 {
            output_size.1 as f32
        } else {
            width * frame_size.1 as f32 / frame_size.0 as f32
        };
        let offset_y = (output_size.1 as f32 - height) / 2.0;
        Self {
            width,
            height,
            offset_y,
        }
    }

    /// 归一化框（左下原点）翻转到左上原点的像素坐标
    pub fn to_pixel_rect(&self, rect: &NormalizedRect) -> PixelRect {
        PixelRect {
            left: rect.x * self.width,
            top: self.height + self.offset_y - (rect.y + rect.height) * self.height,
            width: rect.width * self.width,
            height: rect.height * self.height,
        }
    }
}

pub fn format_label(label: &str, confidence: f32) -> String {
    format!("{} {:.1}", label, confidence * 100.0)
}

pub struct FrameAnnotator {
    target_label: String,
    color: Rgba<u8>,
    text_color: Rgba<u8>,
    line_width: u32,
    font_scale: u32,
}

impl FrameAnnotator {
    pub fn new(target_label: &str) -> Self {
        Self {
            target_label: target_label.to_string(),
            color: Rgba([255, 0, 0, 255]),
            text_color: Rgba([255, 255, 255, 255]),
            line_width: 4,
            font_scale: 2,
        }
    }

    pub fn with_color(mut self, rgb: [u8; 3]) -> Self {
        self.color = Rgba([rgb[0], rgb[1], rgb[2], 255]);
        self
    }

    pub fn with_line_width(mut self, line_width: u32) -> Self {
        self.line_width = line_width.max(1);
        self
    }

    pub fn target_label(&self) -> &str {
        &self.target_label
    }

    /// 总是重新渲染一遍，即使没有匹配的检测结果
    pub fn annotate(
        &self,
        frame: &Frame,
        detections: &[Detection],
        output_size: (u32, u32),
    ) -> RgbaImage {
        let (out_w, out_h) = output_size;
        let fill = AspectFill::new(output_size, (frame.width, frame.height));
        let Some(mut canvas) = render_base(frame, &fill, output_size) else {
            error!(
                "❌ Frame {} data does not match {}x{}",
                frame.frame_number, frame.width, frame.height
            );
            return RgbaImage::new(out_w, out_h);
        };

        for detection in detections {
            if detection.label != self.target_label {
                continue;
            }
            let rect = fill.to_pixel_rect(&detection.bounding_box);
            self.draw_box(&mut canvas, &rect);
            self.draw_caption(
                &mut canvas,
                &rect,
                &format_label(&detection.label, detection.confidence),
            );
        }

        canvas
    }

    fn draw_box(&self, canvas: &mut RgbaImage, rect: &PixelRect) {
        let left = rect.left.round() as i32;
        let top = rect.top.round() as i32;
        let right = (rect.left + rect.width).round() as i32;
        let bottom = (rect.top + rect.height).round() as i32;
        let half = (self.line_width / 2) as i32;

        for t in -half..(self.line_width as i32 - half) {
            // 上下边
            fill_rect(canvas, left - half, top + t, right + half, top + t, self.color);
            fill_rect(canvas, left - half, bottom + t, right + half, bottom + t, self.color);
            // 左右边
            fill_rect(canvas, left + t, top, left + t, bottom, self.color);
            fill_rect(canvas, right + t, top, right + t, bottom, self.color);
        }
    }

    fn draw_caption(&self, canvas: &mut RgbaImage, rect: &PixelRect, text: &str) {
        let padding = 2;
        let text_w = font::text_width(text, self.font_scale) as i32;
        let text_h = font::text_height(self.font_scale) as i32;
        let box_h = text_h + padding * 2;

        let x = rect.left.round() as i32 - (self.line_width / 2) as i32;
        let mut y = rect.top.round() as i32 - box_h;
        if y < 0 {
            y = rect.top.round() as i32;
        }

        fill_rect(canvas, x, y, x + text_w + padding * 2 - 1, y + box_h - 1, self.color);
        font::draw_text(canvas, x + padding, y + padding, text, self.text_color, self.font_scale);
    }
}

/// 画面按检测框同一个变换铺到输出上，上下多出的部分留空或裁掉
fn render_base(frame: &Frame, fill: &AspectFill, output_size: (u32, u32)) -> Option<RgbaImage> {
    if frame.width == 0 || frame.height == 0 {
        return None;
    }
    let fit = (
        (fill.width.round() as u32).max(1),
        (fill.height.round() as u32).max(1),
    );
    let scaled = if (frame.width, frame.height) == fit {
        frame.to_rgba_image()?
    } else {
        frame.resize_to(fit.0, fit.1)?.to_rgba_image()?
    };
    if scaled.dimensions() == output_size {
        return Some(scaled);
    }

    let mut canvas = RgbaImage::new(output_size.0, output_size.1);
    imageops::replace(&mut canvas, &scaled, 0, fill.offset_y.round() as i64);
    Some(canvas)
}

/// 闭区间填充，超出画布部分裁掉
fn fill_rect(canvas: &mut RgbaImage, left: i32, top: i32, right: i32, bottom: i32, color: Rgba<u8>) {
    let width = canvas.width() as i32;
    let height = canvas.height() as i32;
    if right < 0 || bottom < 0 || left >= width || top >= height {
        return;
    }
    let left = left.max(0);
    let top = top.max(0);
    let right = right.min(width - 1);
    let bottom = bottom.min(height - 1);

    for y in top..=bottom {
        for x in left..=right {
            canvas.put_pixel(x as u32, y as u32, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::video::PixelFormat;

    fn gray_frame(width: u32, height: u32) -> Frame {
        Frame::new(
            width,
            height,
            vec![128u8; (width * height * 4) as usize],
            PixelFormat::Bgra8,
            0,
            0,
        )
    }

    fn det(label: &str, rect: NormalizedRect) -> Detection {
        Detection::new(label, 0.875, rect)
    }

    #[test]
    fn test_format_label() {
        assert_eq!(format_label("person", 0.875), "person 87.5");
        assert_eq!(format_label("person", 1.0), "person 100.0");
        assert_eq!(format_label("person", 0.0), "person 0.0");
    }

    #[test]
    fn test_aspect_fill_identity_when_ratio_matches() {
        let fill = AspectFill::new((640, 480), (640, 480));
        assert_eq!(fill.height, 480.0);
        assert_eq!(fill.offset_y, 0.0);

        let rect = fill.to_pixel_rect(&NormalizedRect::new(0.25, 0.0, 0.5, 0.5));
        assert_eq!(rect.left, 160.0);
        assert_eq!(rect.width, 320.0);
        // 左下原点：y=0 的框落在画面下半部分
        assert_eq!(rect.top, 240.0);
        assert_eq!(rect.height, 240.0);
    }

    #[test]
    fn test_aspect_fill_centers_vertically() {
        // 16:9 画面放进 4:3 输出
        let fill = AspectFill::new((640, 480), (1280, 720));
        assert_eq!(fill.width, 640.0);
        assert_eq!(fill.height, 360.0);
        assert_eq!(fill.offset_y, 60.0);

        let rect = fill.to_pixel_rect(&NormalizedRect::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(rect.top, 60.0);
        assert_eq!(rect.height, 360.0);
    }

    #[test]
    fn test_no_matching_detection_is_pass_through() {
        let annotator = FrameAnnotator::new("person");
        let frame = gray_frame(16, 12);
        let detections = vec![det("dog", NormalizedRect::new(0.1, 0.1, 0.5, 0.5))];

        let rendered = annotator.annotate(&frame, &detections, (16, 12));
        assert_eq!(rendered.dimensions(), (16, 12));
        assert_eq!(rendered.as_raw(), frame.to_rgba_image().unwrap().as_raw());
    }

    #[test]
    fn test_target_detection_draws_box() {
        let annotator = FrameAnnotator::new("person").with_line_width(2);
        let frame = gray_frame(100, 100);
        let detections = vec![det("person", NormalizedRect::new(0.2, 0.2, 0.6, 0.6))];

        let rendered = annotator.annotate(&frame, &detections, (100, 100));
        // 框左边 x=20，纵向中点 y=50
        assert_eq!(rendered.get_pixel(20, 50).0, [255, 0, 0, 255]);
        // 框内部不变
        assert_eq!(rendered.get_pixel(50, 50).0, [128, 128, 128, 128]);
    }

    #[test]
    fn test_rendered_to_output_size() {
        let annotator = FrameAnnotator::new("person");
        let frame = gray_frame(32, 24);
        let rendered = annotator.annotate(&frame, &[], (64, 48));
        assert_eq!(rendered.dimensions(), (64, 48));
    }

    #[test]
    fn test_box_lines_up_with_content_when_letterboxed() {
        // 2:1 画面放进 1:1 输出：内容占 50..150 行
        let annotator = FrameAnnotator::new("person");
        let frame = gray_frame(200, 100);
        let detections = vec![det("person", NormalizedRect::new(0.0, 0.0, 1.0, 1.0))];
        let rendered = annotator.annotate(&frame, &detections, (200, 200));

        let red = [255, 0, 0, 255];
        let gray = [128, 128, 128, 128];
        let blank = [0, 0, 0, 0];
        assert_eq!(rendered.get_pixel(100, 10).0, blank);
        assert_eq!(rendered.get_pixel(100, 190).0, blank);
        assert_eq!(rendered.get_pixel(100, 55).0, gray);
        assert_eq!(rendered.get_pixel(100, 100).0, gray);
        assert_eq!(rendered.get_pixel(100, 145).0, gray);
        // 框的上下边正好在内容边缘
        assert_eq!(rendered.get_pixel(100, 50).0, red);
        assert_eq!(rendered.get_pixel(100, 150).0, red);
        assert_eq!(rendered.get_pixel(0, 100).0, red);
        assert_eq!(rendered.get_pixel(199, 100).0, red);
    }

    #[test]
    fn test_taller_frame_is_cropped_to_output() {
        let annotator = FrameAnnotator::new("person");
        let frame = gray_frame(20, 40);
        let rendered = annotator.annotate(&frame, &[], (20, 20));
        assert_eq!(rendered.dimensions(), (20, 20));
        assert!(rendered.pixels().all(|p| p.0 == [128, 128, 128, 128]));
    }

    #[test]
    fn test_malformed_frame_yields_blank_canvas() {
        let annotator = FrameAnnotator::new("person");
        let frame = Frame::new(10, 10, vec![0u8; 3], PixelFormat::Bgra8, 0, 0);
        let rendered = annotator.annotate(&frame, &[], (10, 10));
        assert!(rendered.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn test_box_near_edge_is_clipped() {
        let annotator = FrameAnnotator::new("person");
        let frame = gray_frame(20, 20);
        let detections = vec![det("person", NormalizedRect::new(0.9, 0.9, 0.5, 0.5))];
        let rendered = annotator.annotate(&frame, &detections, (20, 20));
        assert_eq!(rendered.dimensions(), (20, 20));
    }
}
