//! 批量采样会话 - 播放器与渲染由宿主回调提供

use flutter_rust_bridge::{frb, DartFnFuture};
use futures::executor::block_on;
use log::info;
use std::sync::{Mutex, PoisonError};
use std::thread;

use super::error::ApiError;
use super::gallery::FrameGallery;
use crate::core::config::CaptureConfig;
use crate::core::gallery::FrameStore;
use crate::frame_sampler::{
    BatchCaptureDriver, BatchNotifier, BatchOutcome, BatchRequest, CaptureError, ExtractedFrame,
    FrameRenderer, FrameSink, PixelBuffer, RejectReason, RunSnapshot, SamplingMode,
    SeekCompletion, VideoMeta, VideoPlayer,
};

pub(crate) type PauseFn = Box<dyn Fn() -> DartFnFuture<()> + Send + Sync>;
pub(crate) type SeekFn = Box<dyn Fn(f64) -> DartFnFuture<bool> + Send + Sync>;
pub(crate) type RenderFn = Box<dyn Fn(u32, u32) -> DartFnFuture<Vec<u8>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Completed,
    Aborted,
    Rejected,
}

/// 一次批量任务的结果
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub status: BatchStatus,
    pub mode: SamplingMode,
    pub step_size: f64,
    pub visited: u32,
    pub emitted: u32,
    /// 中止或拒绝的原因
    pub message: Option<String>,
}

impl BatchSummary {
    fn from_outcome(request: BatchRequest, outcome: &BatchOutcome) -> Self {
        let (status, message) = match outcome {
            BatchOutcome::Completed(_) => (BatchStatus::Completed, None),
            BatchOutcome::Aborted { error, .. } => (BatchStatus::Aborted, Some(error.to_string())),
            BatchOutcome::Rejected(RejectReason::NoVideoLoaded) => {
                (BatchStatus::Rejected, Some("No video loaded".to_string()))
            }
            BatchOutcome::Rejected(RejectReason::AlreadyRunning) => (
                BatchStatus::Rejected,
                Some("Another batch is running".to_string()),
            ),
        };

        match outcome.report() {
            Some(report) => Self {
                status,
                mode: report.mode,
                step_size: report.step_size,
                visited: report.visited as u32,
                emitted: report.emitted as u32,
                message,
            },
            None => Self {
                status,
                mode: request.mode,
                step_size: 0.0,
                visited: 0,
                emitted: 0,
                message,
            },
        }
    }
}

/// 宿主播放器：定位、暂停与截图都通过 Dart 回调完成
pub(crate) struct HostVideo {
    meta: Option<VideoMeta>,
    position: f64,
    pause: Option<PauseFn>,
    seek: Option<SeekFn>,
    render: RenderFn,
}

impl HostVideo {
    pub(crate) fn new(
        meta: Option<VideoMeta>,
        pause: PauseFn,
        seek: SeekFn,
        render: RenderFn,
    ) -> Self {
        Self {
            meta,
            position: 0.0,
            pause: Some(pause),
            seek: Some(seek),
            render,
        }
    }

    /// 只截取当前画面，不定位
    pub(crate) fn still(meta: Option<VideoMeta>, position: f64, render: RenderFn) -> Self {
        Self {
            meta,
            position,
            pause: None,
            seek: None,
            render,
        }
    }
}

impl VideoPlayer for HostVideo {
    fn meta(&self) -> Option<VideoMeta> {
        self.meta.clone()
    }

    fn current_time(&self) -> f64 {
        self.position
    }

    fn pause(&mut self) {
        if let Some(pause) = &self.pause {
            block_on(pause());
        }
    }

    fn seek_to(&mut self, timestamp: f64) -> SeekCompletion {
        self.position = timestamp;
        let Some(seek) = &self.seek else {
            return SeekCompletion::ready(timestamp);
        };

        let (signal, completion) = SeekCompletion::pending(timestamp);
        let seeked = seek(timestamp);
        thread::spawn(move || {
            if block_on(seeked) {
                signal.complete();
            } else {
                signal.fail("host rejected seek");
            }
        });
        completion
    }
}

impl FrameRenderer for HostVideo {
    fn render_current_frame(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<PixelBuffer, CaptureError> {
        let rgba = block_on((self.render)(width, height));
        PixelBuffer::from_rgba(width, height, rgba)
    }
}

/// 每输出一帧才锁一次画廊，批量运行期间宿主仍可读取
struct LockedStore<'a>(&'a Mutex<FrameStore>);

impl FrameSink for LockedStore<'_> {
    fn accept(&mut self, frame: ExtractedFrame) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .accept(frame);
    }
}

impl BatchNotifier for LockedStore<'_> {
    fn on_batch_finished(&mut self, outcome: &BatchOutcome) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_batch_finished(outcome);
    }
}

/// 批量采样会话 - 同一时间只运行一个批量任务
///
/// ```dart
/// final session = BatchSession.create();
/// final summary = await session.run(
///   gallery: gallery,
///   mode: SamplingMode.smart,
///   parameter: 1.0,
///   pause: () async => controller.pause(),
///   seek: (t) async { await controller.seekTo(t); return true; },
///   render: (w, h) async => await grabRgba(w, h),
/// );
/// ```
#[frb(opaque)]
pub struct BatchSession {
    driver: BatchCaptureDriver,
    default_request: BatchRequest,
}

impl BatchSession {
    #[frb(sync)]
    pub fn create() -> Self {
        Self::from_config(&CaptureConfig::default())
    }

    /// 使用 JSON5 配置创建，例如 `{ seekTimeoutMs: 3000, defaultMode: 'smart' }`
    #[frb(sync)]
    pub fn create_with_config(config: String) -> Result<Self, ApiError> {
        let config = CaptureConfig::from_json5(&config)?;
        Ok(Self::from_config(&config))
    }

    fn from_config(config: &CaptureConfig) -> Self {
        crate::init_logging();
        info!("🎛️ BatchSession: created");
        Self {
            driver: BatchCaptureDriver::with_config(config.driver_config()),
            default_request: config.default_request(),
        }
    }

    /// 运行一次批量采样，结果写入画廊。未指定的模式或参数取配置默认值。
    #[frb]
    pub fn run(
        &self,
        gallery: &FrameGallery,
        mode: Option<SamplingMode>,
        parameter: Option<f64>,
        pause: impl Fn() -> DartFnFuture<()> + Send + Sync + 'static,
        seek: impl Fn(f64) -> DartFnFuture<bool> + Send + Sync + 'static,
        render: impl Fn(u32, u32) -> DartFnFuture<Vec<u8>> + Send + Sync + 'static,
    ) -> BatchSummary {
        let mut media = HostVideo::new(
            gallery.meta(),
            Box::new(pause),
            Box::new(seek),
            Box::new(render),
        );
        let request = self.request(mode, parameter);
        self.run_with(gallery, request, &mut media)
    }

    pub(crate) fn run_with<M>(
        &self,
        gallery: &FrameGallery,
        request: BatchRequest,
        media: &mut M,
    ) -> BatchSummary
    where
        M: VideoPlayer + FrameRenderer + ?Sized,
    {
        let mut store = LockedStore(gallery.shared_store());
        let mut notifier = LockedStore(gallery.shared_store());
        let outcome = self.driver.run(request, media, &mut store, &mut notifier);
        BatchSummary::from_outcome(request, &outcome)
    }

    /// 截取宿主当前画面并加入画廊，返回帧 ID
    #[frb]
    pub fn capture_now(
        &self,
        gallery: &FrameGallery,
        position: f64,
        render: impl Fn(u32, u32) -> DartFnFuture<Vec<u8>> + Send + Sync + 'static,
    ) -> Result<String, ApiError> {
        let mut media = HostVideo::still(gallery.meta(), position, Box::new(render));
        self.capture_with(gallery, &mut media)
    }

    pub(crate) fn capture_with<M>(
        &self,
        gallery: &FrameGallery,
        media: &mut M,
    ) -> Result<String, ApiError>
    where
        M: VideoPlayer + FrameRenderer + ?Sized,
    {
        let frame = self.driver.capture_now(media)?;
        let id = frame.id.clone();
        gallery
            .shared_store()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add(frame);
        Ok(id)
    }

    /// 请求取消当前批量任务；没有任务在运行时返回 false
    #[frb(sync)]
    pub fn cancel(&self) -> bool {
        self.driver.cancel()
    }

    #[frb(sync, getter)]
    pub fn snapshot(&self) -> RunSnapshot {
        self.driver.snapshot()
    }

    #[frb(sync, getter)]
    pub fn is_running(&self) -> bool {
        self.driver.is_running()
    }

    fn request(&self, mode: Option<SamplingMode>, parameter: Option<f64>) -> BatchRequest {
        BatchRequest::new(
            mode.unwrap_or(self.default_request.mode),
            parameter.unwrap_or(self.default_request.parameter),
        )
    }
}

impl Drop for BatchSession {
    fn drop(&mut self) {
        info!("🗑️ BatchSession: released");
    }
}
