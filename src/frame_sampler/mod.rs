//! 视频帧采样器 - 按时间轴批量截取静帧
//!
//! 核心策略：
//! 1. 采样规划 - 按间隔、按数量或智能模式计算步长
//! 2. 帧差过滤 - 智能模式下与上一帧比较，变化不足的候选帧丢弃
//! 3. 驱动循环 - 定位 → 渲染 → 过滤 → 输出，同一时间只运行一个批量任务

pub mod diff_filter;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod planner;
pub mod source;
pub mod state_machine;

pub use diff_filter::{dissimilarity, is_distinct, SmartFilter, SMART_CHANGE_THRESHOLD};
pub use encoder::{EncodedImage, FrameEncoding};
pub use error::CaptureError;
pub use frame::{ExtractedFrame, PixelBuffer, VideoMeta};
pub use pipeline::{
    capture_now, BatchCaptureDriver, BatchOutcome, BatchReport, BatchRequest, CancelToken,
    DriverConfig, RejectReason,
};
pub use planner::{plan, SamplingMode, SamplingPlan};
pub use source::{
    BatchNotifier, FrameRenderer, FrameSink, ScriptedVideo, SeekCompletion, SeekSignal,
    VideoPlayer,
};
pub use state_machine::{BatchEvent, BatchPhase, BatchRunState, RunSnapshot};
