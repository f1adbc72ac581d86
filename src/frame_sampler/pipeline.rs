use log::{debug, error, info, warn};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::diff_filter::is_distinct;
use super::encoder::FrameEncoding;
use super::error::CaptureError;
use super::frame::{ExtractedFrame, VideoMeta};
use super::planner::{SamplingMode, SamplingPlan};
use super::source::{BatchNotifier, FrameRenderer, FrameSink, VideoPlayer};
use super::state_machine::{BatchEvent, BatchRunState, RunSnapshot};

#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// 单次定位的最长等待时间
    pub seek_timeout: Duration,
    pub encoding: FrameEncoding,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            seek_timeout: Duration::from_secs(5),
            encoding: FrameEncoding::Png,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchRequest {
    pub mode: SamplingMode,
    pub parameter: f64,
}

impl BatchRequest {
    pub fn new(mode: SamplingMode, parameter: f64) -> Self {
        Self { mode, parameter }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub mode: SamplingMode,
    pub step_size: f64,
    pub visited: usize,
    pub emitted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NoVideoLoaded,
    AlreadyRunning,
}

#[derive(Debug)]
pub enum BatchOutcome {
    /// 入口检查未通过，未修改任何状态
    Rejected(RejectReason),
    Completed(BatchReport),
    /// 已发出的帧仍然有效
    Aborted {
        report: BatchReport,
        error: CaptureError,
    },
}

impl BatchOutcome {
    pub fn report(&self) -> Option<&BatchReport> {
        match self {
            BatchOutcome::Rejected(_) => None,
            BatchOutcome::Completed(report) | BatchOutcome::Aborted { report, .. } => Some(report),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, BatchOutcome::Completed(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 批量采样驱动器：定位 → 渲染 →（智能模式下比较）→ 输出
///
/// 同一时间最多运行一个批量任务，第二个请求在入口处被拒绝。
pub struct BatchCaptureDriver {
    config: DriverConfig,
    state: Mutex<BatchRunState>,
}

impl BatchCaptureDriver {
    pub fn new() -> Self {
        Self::with_config(DriverConfig::default())
    }

    pub fn with_config(config: DriverConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BatchRunState::new()),
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.lock_state().snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.lock_state().running
    }

    /// 请求取消当前任务，在下一次循环开始时生效
    pub fn cancel(&self) -> bool {
        let requested = self.lock_state().request_cancel();
        if requested {
            info!("🛑 Batch cancel requested");
        }
        requested
    }

    pub fn run<M, S, N>(
        &self,
        request: BatchRequest,
        media: &mut M,
        sink: &mut S,
        notifier: &mut N,
    ) -> BatchOutcome
    where
        M: VideoPlayer + FrameRenderer + ?Sized,
        S: FrameSink + ?Sized,
        N: BatchNotifier + ?Sized,
    {
        let Some(meta) = media.meta() else {
            warn!("⚠️ Batch rejected: no video loaded");
            return BatchOutcome::Rejected(RejectReason::NoVideoLoaded);
        };

        let plan = SamplingPlan::new(request.mode, request.parameter, meta.duration);

        let Some(cancel) = self.lock_state().begin(plan.step_size) else {
            warn!("⚠️ Batch rejected: another batch is running");
            return BatchOutcome::Rejected(RejectReason::AlreadyRunning);
        };
        let mut guard = RunGuard {
            state: &self.state,
            settled: false,
        };

        info!(
            "🎬 Batch started: mode={:?} parameter={} step={:.3}s duration={:.2}s",
            plan.mode, request.parameter, plan.step_size, plan.total_duration
        );

        media.pause();

        let mut report = BatchReport {
            mode: plan.mode,
            step_size: plan.step_size,
            visited: 0,
            emitted: 0,
        };

        let sampled = panic::catch_unwind(AssertUnwindSafe(|| {
            self.sample(&plan, &meta, media, sink, &cancel, &mut report)
        }))
        .unwrap_or_else(|payload| {
            Err(CaptureError::CollaboratorPanicked(panic_message(&*payload)))
        });

        let outcome = match sampled {
            Ok(()) => {
                info!(
                    "✅ Batch completed: {} visited, {} emitted",
                    report.visited, report.emitted
                );
                BatchOutcome::Completed(report)
            }
            Err(error) => {
                error!(
                    "❌ Batch aborted after {} visits ({} emitted): {}",
                    report.visited, report.emitted, error
                );
                BatchOutcome::Aborted { report, error }
            }
        };

        // 播放头回到起点；完成信号在作用域结束时丢弃，不等待
        let _rewind = media.seek_to(0.0);

        guard.settle(if outcome.is_completed() {
            BatchEvent::Finish
        } else {
            BatchEvent::Fail
        });

        notifier.on_batch_finished(&outcome);
        outcome
    }

    fn sample<M, S>(
        &self,
        plan: &SamplingPlan,
        meta: &VideoMeta,
        media: &mut M,
        sink: &mut S,
        cancel: &CancelToken,
        report: &mut BatchReport,
    ) -> Result<(), CaptureError>
    where
        M: VideoPlayer + FrameRenderer + ?Sized,
        S: FrameSink + ?Sized,
    {
        let smart = plan.mode == SamplingMode::Smart;

        for timestamp in plan.timestamps() {
            if cancel.is_cancelled() {
                return Err(CaptureError::Cancelled);
            }
            self.lock_state().advance(timestamp);

            media.seek_to(timestamp).wait(self.config.seek_timeout)?;
            let buffer = media.render_current_frame(meta.width, meta.height)?;
            report.visited += 1;

            let accepted = !smart || is_distinct(self.lock_state().previous.as_ref(), &buffer);

            if accepted {
                let image = media.encode_image(&buffer, self.config.encoding)?;
                sink.accept(ExtractedFrame::new(timestamp, image));
                report.emitted += 1;
                debug!("📸 Frame captured at {:.2}s", timestamp);
            } else {
                debug!("⏭️ Frame at {:.2}s too similar, skipped", timestamp);
            }

            if smart {
                self.lock_state().previous = Some(buffer);
            }
        }

        Ok(())
    }

    /// 单帧截图：使用播放器当前位置，不定位，不影响批量状态
    pub fn capture_now<M>(&self, media: &mut M) -> Result<ExtractedFrame, CaptureError>
    where
        M: VideoPlayer + FrameRenderer + ?Sized,
    {
        capture_now(media, self.config.encoding)
    }

    fn lock_state(&self) -> MutexGuard<'_, BatchRunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BatchCaptureDriver {
    fn default() -> Self {
        Self::new()
    }
}

pub fn capture_now<M>(media: &mut M, encoding: FrameEncoding) -> Result<ExtractedFrame, CaptureError>
where
    M: VideoPlayer + FrameRenderer + ?Sized,
{
    let meta = media.meta().ok_or(CaptureError::NoVideoLoaded)?;
    let timestamp = media.current_time();
    let buffer = media.render_current_frame(meta.width, meta.height)?;
    let image = media.encode_image(&buffer, encoding)?;

    info!("📸 Snapshot captured at {:.2}s", timestamp);
    Ok(ExtractedFrame::new(timestamp, image))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// 无论正常结束还是 panic，都保证状态复位
struct RunGuard<'a> {
    state: &'a Mutex<BatchRunState>,
    settled: bool,
}

impl RunGuard<'_> {
    fn settle(&mut self, event: BatchEvent) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .settle(event);
        self.settled = true;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("⚠️ Batch interrupted, resetting run state");
            self.settle(BatchEvent::Fail);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_sampler::frame::PixelBuffer;
    use crate::frame_sampler::source::{ScriptedVideo, SeekCompletion, SeekSignal};
    use crate::frame_sampler::state_machine::BatchPhase;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::mpsc;
    use std::thread;

    #[derive(Default)]
    struct RecordingNotifier {
        finished: Vec<bool>,
    }

    impl BatchNotifier for RecordingNotifier {
        fn on_batch_finished(&mut self, outcome: &BatchOutcome) {
            self.finished.push(outcome.is_completed());
        }
    }

    fn gray(level: u8) -> PixelBuffer {
        PixelBuffer::filled(16, 16, [level, level, level, 255])
    }

    fn timestamps(frames: &[ExtractedFrame]) -> Vec<f64> {
        frames.iter().map(|f| f.timestamp).collect()
    }

    fn assert_reset(driver: &BatchCaptureDriver) {
        let snapshot = driver.snapshot();
        assert_eq!(snapshot.cursor_time, 0.0);
        assert!(!snapshot.running);
        assert_eq!(snapshot.phase, BatchPhase::Idle);
    }

    #[test]
    fn test_count_scenario() {
        let driver = BatchCaptureDriver::new();
        let mut video = ScriptedVideo::uniform(10.0);
        let mut frames = Vec::new();
        let mut notifier = RecordingNotifier::default();

        let outcome = driver.run(
            BatchRequest::new(SamplingMode::Count, 5.0),
            &mut video,
            &mut frames,
            &mut notifier,
        );

        assert!(outcome.is_completed());
        let report = outcome.report().unwrap();
        assert_eq!(report.step_size, 2.0);
        assert_eq!(report.visited, 5);
        assert_eq!(report.emitted, 5);
        assert_eq!(timestamps(&frames), vec![0.0, 2.0, 4.0, 6.0, 8.0]);
        assert_eq!(notifier.finished, vec![true]);
        assert_reset(&driver);
        assert_eq!(driver.snapshot().last_result, Some(BatchPhase::Completed));
    }

    #[test]
    fn test_interval_below_floor() {
        let driver = BatchCaptureDriver::new();
        let mut video = ScriptedVideo::uniform(6.0);
        let mut frames = Vec::new();

        let outcome = driver.run(
            BatchRequest::new(SamplingMode::Interval, 0.05),
            &mut video,
            &mut frames,
            &mut (),
        );

        assert!(outcome.is_completed());
        assert_eq!(outcome.report().unwrap().step_size, 0.1);
        assert_eq!(frames.len(), 60);
        assert_eq!(video.render_count(), 60);
    }

    #[test]
    fn test_smart_scenario_sliding_baseline() {
        let meta = VideoMeta::new("smart", 4.0, 16, 16);
        let mut video = ScriptedVideo::new(meta, |t| if t < 2.0 { gray(100) } else { gray(177) });
        let driver = BatchCaptureDriver::new();
        let mut frames = Vec::new();

        let outcome = driver.run(
            BatchRequest::new(SamplingMode::Smart, 1.0),
            &mut video,
            &mut frames,
            &mut (),
        );

        let report = outcome.report().unwrap();
        assert_eq!(report.visited, 4);
        assert_eq!(timestamps(&frames), vec![0.0, 2.0]);
        assert_reset(&driver);
    }

    #[test]
    fn test_smart_first_candidate_accepted() {
        let meta = VideoMeta::new("flat", 3.0, 16, 16);
        let mut video = ScriptedVideo::new(meta, |_| gray(0));
        let driver = BatchCaptureDriver::new();
        let mut frames = Vec::new();

        driver.run(
            BatchRequest::new(SamplingMode::Smart, 1.0),
            &mut video,
            &mut frames,
            &mut (),
        );

        assert_eq!(timestamps(&frames), vec![0.0]);
    }

    #[test]
    fn test_non_smart_accepts_identical_frames() {
        let meta = VideoMeta::new("flat", 3.0, 16, 16);
        let mut video = ScriptedVideo::new(meta, |_| gray(42));
        let driver = BatchCaptureDriver::new();
        let mut frames = Vec::new();

        driver.run(
            BatchRequest::new(SamplingMode::Interval, 1.0),
            &mut video,
            &mut frames,
            &mut (),
        );

        assert_eq!(frames.len(), 3);
    }

    #[test]
    fn test_pauses_and_rewinds_player() {
        let driver = BatchCaptureDriver::new();
        let mut video = ScriptedVideo::uniform(2.0);

        driver.run(
            BatchRequest::new(SamplingMode::Interval, 1.0),
            &mut video,
            &mut Vec::new(),
            &mut (),
        );

        assert!(video.is_paused());
        assert_eq!(video.seeks(), &[0.0, 1.0, 0.0]);
        assert_eq!(video.current_time(), 0.0);
    }

    #[test]
    fn test_rejects_without_video() {
        let driver = BatchCaptureDriver::new();
        let mut video = ScriptedVideo::empty();
        let mut notifier = RecordingNotifier::default();

        let outcome = driver.run(
            BatchRequest::new(SamplingMode::Interval, 1.0),
            &mut video,
            &mut Vec::new(),
            &mut notifier,
        );

        assert!(matches!(
            outcome,
            BatchOutcome::Rejected(RejectReason::NoVideoLoaded)
        ));
        assert!(video.seeks().is_empty());
        assert!(!video.is_paused());
        assert!(notifier.finished.is_empty());
        assert_eq!(driver.snapshot().last_result, None);
    }

    #[test]
    fn test_rejects_while_running() {
        let driver = Arc::new(BatchCaptureDriver::new());
        let (gate_tx, gate_rx) = mpsc::channel::<SeekSignal>();
        let mut video = ScriptedVideo::uniform(10.0).gated(gate_tx);

        let worker = Arc::clone(&driver);
        let handle = thread::spawn(move || {
            let mut frames = Vec::new();
            let outcome = worker.run(
                BatchRequest::new(SamplingMode::Count, 5.0),
                &mut video,
                &mut frames,
                &mut (),
            );
            (outcome, frames)
        });

        // 第一次定位挂起，任务处于 Running
        let first = gate_rx.recv().unwrap();
        let before = driver.snapshot();
        assert!(before.running);
        assert_eq!(before.phase, BatchPhase::Running);
        assert_eq!(before.step_size, 2.0);

        let mut other = ScriptedVideo::uniform(3.0);
        let mut other_frames = Vec::new();
        let mut notifier = RecordingNotifier::default();
        let rejected = driver.run(
            BatchRequest::new(SamplingMode::Interval, 0.5),
            &mut other,
            &mut other_frames,
            &mut notifier,
        );

        assert!(matches!(
            rejected,
            BatchOutcome::Rejected(RejectReason::AlreadyRunning)
        ));
        assert_eq!(driver.snapshot(), before);
        assert!(other.seeks().is_empty());
        assert!(other_frames.is_empty());
        assert!(notifier.finished.is_empty());

        first.complete();
        for _ in 0..4 {
            gate_rx.recv().unwrap().complete();
        }

        let (outcome, frames) = handle.join().unwrap();
        assert!(outcome.is_completed());
        assert_eq!(frames.len(), 5);
        assert_reset(&driver);
    }

    #[test]
    fn test_render_failure_aborts_and_keeps_emitted() {
        let driver = BatchCaptureDriver::new();
        let mut video = ScriptedVideo::uniform(10.0).fail_render_at(4.0);
        let mut frames = Vec::new();
        let mut notifier = RecordingNotifier::default();

        let outcome = driver.run(
            BatchRequest::new(SamplingMode::Count, 5.0),
            &mut video,
            &mut frames,
            &mut notifier,
        );

        match outcome {
            BatchOutcome::Aborted { report, error } => {
                assert_eq!(report.emitted, 2);
                assert!(matches!(error, CaptureError::Render(_)));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(timestamps(&frames), vec![0.0, 2.0]);
        assert_eq!(notifier.finished, vec![false]);
        assert_reset(&driver);
        assert_eq!(driver.snapshot().last_result, Some(BatchPhase::Aborted));

        // 失败后可以立即开始下一次
        let mut retry = ScriptedVideo::uniform(10.0);
        let outcome = driver.run(
            BatchRequest::new(SamplingMode::Count, 5.0),
            &mut retry,
            &mut Vec::new(),
            &mut (),
        );
        assert!(outcome.is_completed());
    }

    #[test]
    fn test_seek_failure_aborts() {
        let driver = BatchCaptureDriver::new();
        let mut video = ScriptedVideo::uniform(3.0).fail_seek_at(1.0);
        let mut frames = Vec::new();

        let outcome = driver.run(
            BatchRequest::new(SamplingMode::Interval, 1.0),
            &mut video,
            &mut frames,
            &mut (),
        );

        assert!(matches!(
            outcome,
            BatchOutcome::Aborted {
                error: CaptureError::SeekFailed { .. },
                ..
            }
        ));
        assert_eq!(frames.len(), 1);
        assert_reset(&driver);
    }

    #[test]
    fn test_seek_timeout_aborts() {
        let driver = BatchCaptureDriver::with_config(DriverConfig {
            seek_timeout: Duration::from_millis(20),
            ..Default::default()
        });
        let mut video = ScriptedVideo::uniform(3.0).stalled();
        let mut notifier = RecordingNotifier::default();

        let outcome = driver.run(
            BatchRequest::new(SamplingMode::Interval, 1.0),
            &mut video,
            &mut Vec::new(),
            &mut notifier,
        );

        assert!(matches!(
            outcome,
            BatchOutcome::Aborted {
                error: CaptureError::SeekTimeout(_),
                ..
            }
        ));
        assert_eq!(notifier.finished, vec![false]);
        assert_reset(&driver);
    }

    #[test]
    fn test_cancel_stops_at_next_iteration() {
        let driver = Arc::new(BatchCaptureDriver::new());
        let (gate_tx, gate_rx) = mpsc::channel::<SeekSignal>();
        let mut video = ScriptedVideo::uniform(10.0).gated(gate_tx);

        let worker = Arc::clone(&driver);
        let handle = thread::spawn(move || {
            let mut frames = Vec::new();
            let outcome = worker.run(
                BatchRequest::new(SamplingMode::Interval, 1.0),
                &mut video,
                &mut frames,
                &mut (),
            );
            (outcome, frames)
        });

        let first = gate_rx.recv().unwrap();
        assert!(driver.cancel());
        first.complete();

        let (outcome, frames) = handle.join().unwrap();
        assert!(matches!(
            outcome,
            BatchOutcome::Aborted {
                error: CaptureError::Cancelled,
                ..
            }
        ));
        assert_eq!(timestamps(&frames), vec![0.0]);
        assert_reset(&driver);
        assert!(!driver.cancel());
    }

    #[test]
    fn test_panicking_renderer_aborts_and_notifies() {
        let meta = VideoMeta::new("crash", 4.0, 16, 16);
        let mut video = ScriptedVideo::new(meta, |t| {
            if t >= 2.0 {
                panic!("decoder crashed");
            }
            gray(10)
        });
        let driver = BatchCaptureDriver::new();
        let mut frames = Vec::new();
        let mut notifier = RecordingNotifier::default();

        let outcome = driver.run(
            BatchRequest::new(SamplingMode::Interval, 1.0),
            &mut video,
            &mut frames,
            &mut notifier,
        );

        match outcome {
            BatchOutcome::Aborted {
                report,
                error: CaptureError::CollaboratorPanicked(msg),
            } => {
                assert_eq!(msg, "decoder crashed");
                assert_eq!(report.emitted, 2);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(timestamps(&frames), vec![0.0, 1.0]);
        assert_eq!(notifier.finished, vec![false]);
        assert_eq!(video.seeks().last(), Some(&0.0));
        assert_reset(&driver);
        assert_eq!(driver.snapshot().last_result, Some(BatchPhase::Aborted));
    }

    #[test]
    fn test_panicking_player_before_sampling_resets_state() {
        struct CrashingPlayer;

        impl VideoPlayer for CrashingPlayer {
            fn meta(&self) -> Option<VideoMeta> {
                Some(VideoMeta::new("crash", 4.0, 16, 16))
            }
            fn current_time(&self) -> f64 {
                0.0
            }
            fn pause(&mut self) {
                panic!("player gone");
            }
            fn seek_to(&mut self, timestamp: f64) -> SeekCompletion {
                SeekCompletion::ready(timestamp)
            }
        }

        impl FrameRenderer for CrashingPlayer {
            fn render_current_frame(
                &mut self,
                width: u32,
                height: u32,
            ) -> Result<PixelBuffer, CaptureError> {
                Ok(PixelBuffer::filled(width, height, [0, 0, 0, 255]))
            }
        }

        let driver = BatchCaptureDriver::new();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            driver.run(
                BatchRequest::new(SamplingMode::Interval, 1.0),
                &mut CrashingPlayer,
                &mut Vec::new(),
                &mut (),
            )
        }));

        assert!(result.is_err());
        assert_reset(&driver);
        assert_eq!(driver.snapshot().last_result, Some(BatchPhase::Aborted));
    }

    #[test]
    fn test_tiny_step_single_visit() {
        let driver = BatchCaptureDriver::new();
        let mut video = ScriptedVideo::uniform(1.0);
        let mut frames = Vec::new();

        let outcome = driver.run(
            BatchRequest::new(SamplingMode::Count, 100.0),
            &mut video,
            &mut frames,
            &mut (),
        );

        assert!(outcome.is_completed());
        assert_eq!(timestamps(&frames), vec![0.0]);
    }

    #[test]
    fn test_zero_duration_completes_without_visits() {
        let driver = BatchCaptureDriver::new();
        let mut video = ScriptedVideo::uniform(0.0);
        let mut notifier = RecordingNotifier::default();

        let outcome = driver.run(
            BatchRequest::new(SamplingMode::Count, 3.0),
            &mut video,
            &mut Vec::new(),
            &mut notifier,
        );

        assert!(outcome.is_completed());
        assert_eq!(outcome.report().unwrap().visited, 0);
        assert_eq!(notifier.finished, vec![true]);
    }

    #[test]
    fn test_capture_now_uses_current_position() {
        let driver = BatchCaptureDriver::new();
        let mut video = ScriptedVideo::uniform(10.0);
        video.set_position(3.25);

        let frame = driver.capture_now(&mut video).unwrap();

        assert_eq!(frame.timestamp, 3.25);
        assert_eq!(frame.image.mime_type, "image/png");
        assert!(video.seeks().is_empty());
        assert_eq!(driver.snapshot().last_result, None);
    }

    #[test]
    fn test_capture_now_requires_video() {
        let mut video = ScriptedVideo::empty();
        let result = capture_now(&mut video, FrameEncoding::Png);
        assert!(matches!(result, Err(CaptureError::NoVideoLoaded)));
    }

    #[test]
    fn test_jpeg_encoding_from_config() {
        let driver = BatchCaptureDriver::with_config(DriverConfig {
            encoding: FrameEncoding::Jpeg { quality: 80 },
            ..Default::default()
        });
        let mut video = ScriptedVideo::uniform(1.0);
        let mut frames = Vec::new();

        driver.run(
            BatchRequest::new(SamplingMode::Interval, 1.0),
            &mut video,
            &mut frames,
            &mut (),
        );

        assert_eq!(frames[0].image.extension(), "jpg");
    }
}
