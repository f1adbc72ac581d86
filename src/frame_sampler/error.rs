use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("No video loaded")]
    NoVideoLoaded,
    #[error("Seek to {timestamp:.3}s failed: {reason}")]
    SeekFailed { timestamp: f64, reason: String },
    #[error("Seek did not complete within {0:?}")]
    SeekTimeout(Duration),
    #[error("Seek completion was dropped by the player")]
    SeekAbandoned,
    #[error("Render failed: {0}")]
    Render(String),
    #[error("Invalid pixel buffer: expected {expected} bytes for {width}x{height}, got {actual}")]
    InvalidBuffer {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("Image encoding error: {0}")]
    Encode(#[from] image::ImageError),
    #[error("Batch cancelled")]
    Cancelled,
    #[error("Player or renderer panicked: {0}")]
    CollaboratorPanicked(String),
}
