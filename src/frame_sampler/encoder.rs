//! 静帧编码

use image::{ImageOutputFormat, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use super::error::CaptureError;
use super::frame::PixelBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameEncoding {
    #[default]
    Png,
    Jpeg { quality: u8 },
}

/// 编码后的静帧
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl EncodedImage {
    pub fn png(data: Vec<u8>) -> Self {
        Self {
            mime_type: "image/png".to_string(),
            data,
        }
    }

    pub fn jpeg(data: Vec<u8>) -> Self {
        Self {
            mime_type: "image/jpeg".to_string(),
            data,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" => "jpg",
            _ => "png",
        }
    }
}

pub fn encode(buffer: &PixelBuffer, encoding: FrameEncoding) -> Result<EncodedImage, CaptureError> {
    let mut out = Cursor::new(Vec::new());

    match encoding {
        FrameEncoding::Png => {
            let img = RgbaImage::from_raw(buffer.width, buffer.height, buffer.data.clone())
                .ok_or_else(|| invalid(buffer))?;
            img.write_to(&mut out, ImageOutputFormat::Png)?;
            Ok(EncodedImage::png(out.into_inner()))
        }
        FrameEncoding::Jpeg { quality } => {
            // JPEG 不支持透明通道
            let img = RgbImage::from_raw(buffer.width, buffer.height, buffer.to_rgb())
                .ok_or_else(|| invalid(buffer))?;
            img.write_to(&mut out, ImageOutputFormat::Jpeg(quality.clamp(1, 100)))?;
            Ok(EncodedImage::jpeg(out.into_inner()))
        }
    }
}

fn invalid(buffer: &PixelBuffer) -> CaptureError {
    CaptureError::InvalidBuffer {
        width: buffer.width,
        height: buffer.height,
        expected: buffer.pixel_count() * 4,
        actual: buffer.data.len(),
    }
}
