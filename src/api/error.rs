use serde::{Deserialize, Serialize};

use crate::core::config::ConfigError;
use crate::core::gallery::ExportError;
use crate::frame_sampler::CaptureError;

/// 跨 FFI 的错误类型，FRB 友好的设计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub error_type: String,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(error_type: &str, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn frame_not_found(id: &str) -> Self {
        Self::new("FrameNotFound", format!("未找到帧: {}", id))
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.error_type, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<CaptureError> for ApiError {
    fn from(e: CaptureError) -> Self {
        let error_type = match &e {
            CaptureError::InvalidBuffer { .. } => "InvalidBuffer",
            CaptureError::Encode(_) => "EncodeError",
            _ => "CaptureError",
        };
        Self::new(error_type, e.to_string())
    }
}

impl From<ExportError> for ApiError {
    fn from(e: ExportError) -> Self {
        let error_type = match &e {
            ExportError::NothingSelected => "NothingSelected",
            _ => "ExportError",
        };
        Self::new(error_type, e.to_string())
    }
}

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> Self {
        Self::new("ConfigError", e.to_string())
    }
}
