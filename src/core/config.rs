//! 采样配置，支持 JSON5 格式

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::frame_sampler::{BatchRequest, DriverConfig, FrameEncoding, SamplingMode};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON5 parse error: {0}")]
    Parse(#[from] json5::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureConfig {
    pub default_mode: SamplingMode,
    /// 含义取决于模式：秒数、帧数或候选间隔
    pub default_parameter: f64,
    pub seek_timeout_ms: u64,
    pub encoding: FrameEncoding,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            default_mode: SamplingMode::Interval,
            default_parameter: 2.0,
            seek_timeout_ms: 5000,
            encoding: FrameEncoding::Png,
        }
    }
}

impl CaptureConfig {
    pub fn from_json5(text: &str) -> Result<Self, ConfigError> {
        let config: CaptureConfig = json5::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json5(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.seek_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "seekTimeoutMs must be greater than 0".to_string(),
            ));
        }
        if !self.default_parameter.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "defaultParameter must be a finite number, got {}",
                self.default_parameter
            )));
        }
        if let FrameEncoding::Jpeg { quality } = self.encoding {
            if !(1..=100).contains(&quality) {
                return Err(ConfigError::Invalid(format!(
                    "jpeg quality must be within 1..=100, got {}",
                    quality
                )));
            }
        }
        Ok(())
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            seek_timeout: Duration::from_millis(self.seek_timeout_ms),
            encoding: self.encoding,
        }
    }

    pub fn default_request(&self) -> BatchRequest {
        BatchRequest::new(self.default_mode, self.default_parameter)
    }
}
