use serde::{Deserialize, Serialize};

use super::encoder::EncodedImage;
use super::error::CaptureError;

/// 视频元数据，加载视频时生成一次
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMeta {
    pub name: String,
    /// 秒
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

impl VideoMeta {
    pub fn new(name: impl Into<String>, duration: f64, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            duration,
            width,
            height,
        }
    }
}

/// 像素缓冲区（RGBA 交错排列）
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // RGBA 格式
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// 从渲染结果构建，校验数据长度
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self, CaptureError> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(CaptureError::InvalidBuffer {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self::new(width, height, data))
    }

    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(width, height, data)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn to_rgb(&self) -> Vec<u8> {
        let mut rgb = Vec::with_capacity(self.pixel_count() * 3);
        for chunk in self.data.chunks_exact(4) {
            rgb.push(chunk[0]); // R
            rgb.push(chunk[1]); // G
            rgb.push(chunk[2]); // B
        }
        rgb
    }
}

/// 已捕获的帧
///
/// `analysis` 和 `analysis_pending` 只由画廊在描述服务返回后修改。
#[derive(Debug, Clone)]
pub struct ExtractedFrame {
    pub id: String,
    pub timestamp: f64,
    pub image: EncodedImage,
    pub analysis: Option<String>,
    pub analysis_pending: bool,
}

impl ExtractedFrame {
    pub fn new(timestamp: f64, image: EncodedImage) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            image,
            analysis: None,
            analysis_pending: false,
        }
    }
}
