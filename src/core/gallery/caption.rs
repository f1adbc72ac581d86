//! 画面描述：提示词选择与描述服务接口

use log::error;
use thiserror::Error;

use crate::frame_sampler::EncodedImage;

/// 描述服务调用失败时写入的文字
pub const ANALYSIS_FAILED: &str = "Failed to analyze image.";
/// 服务返回空内容时写入的文字
pub const ANALYSIS_EMPTY: &str = "No description generated.";

#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("Caption service unavailable: {0}")]
    Unavailable(String),
    #[error("Caption request failed: {0}")]
    Failed(String),
}

/// 外部描述服务（例如多模态模型）
pub trait FrameAnalyzer {
    fn describe(&self, image: &EncodedImage, prompt: &str) -> Result<String, CaptionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptionLanguage {
    #[default]
    En,
    ZhCn,
    ZhTw,
}

impl CaptionLanguage {
    /// 按区域标签推断，例如 `zh-CN`、`zh-Hant-TW`、`en-US`
    pub fn from_locale(locale: &str) -> Self {
        let lower = locale.to_lowercase();
        if !lower.contains("zh") {
            return CaptionLanguage::En;
        }
        if lower.contains("cn") || lower.contains("hans") {
            CaptionLanguage::ZhCn
        } else {
            CaptionLanguage::ZhTw
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            CaptionLanguage::En => "Describe this video frame in detail suitable for a caption.",
            CaptionLanguage::ZhCn => {
                "详细描述这个视频帧的内容，适合作为标题或说明文字，请用简体中文回答。"
            }
            CaptionLanguage::ZhTw => {
                "詳細描述這個視頻幀的內容，適合作為標題或說明文字，請用繁體中文回答。"
            }
        }
    }
}

/// 调用描述服务，失败或空内容替换为固定文字
pub fn describe_frame(
    analyzer: &dyn FrameAnalyzer,
    image: &EncodedImage,
    language: CaptionLanguage,
) -> String {
    match analyzer.describe(image, language.prompt()) {
        Ok(text) if text.trim().is_empty() => ANALYSIS_EMPTY.to_string(),
        Ok(text) => text,
        Err(e) => {
            error!("❌ Frame analysis failed: {}", e);
            ANALYSIS_FAILED.to_string()
        }
    }
}
