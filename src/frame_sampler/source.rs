//! 批量采样所依赖的外部协作方
//!
//! 播放器负责定位与暂停，渲染器把当前画面读成像素缓冲区，
//! 接收端和通知方只接收结果。

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use super::encoder::{self, EncodedImage, FrameEncoding};
use super::error::CaptureError;
use super::frame::{ExtractedFrame, PixelBuffer, VideoMeta};
use super::pipeline::BatchOutcome;

pub trait VideoPlayer {
    /// 未加载视频时返回 None
    fn meta(&self) -> Option<VideoMeta>;

    fn current_time(&self) -> f64;

    fn pause(&mut self);

    /// 发起定位，返回完成信号
    fn seek_to(&mut self, timestamp: f64) -> SeekCompletion;
}

pub trait FrameRenderer {
    fn render_current_frame(&mut self, width: u32, height: u32)
        -> Result<PixelBuffer, CaptureError>;

    fn encode_image(
        &self,
        buffer: &PixelBuffer,
        encoding: FrameEncoding,
    ) -> Result<EncodedImage, CaptureError> {
        encoder::encode(buffer, encoding)
    }
}

pub trait FrameSink {
    fn accept(&mut self, frame: ExtractedFrame);
}

impl FrameSink for Vec<ExtractedFrame> {
    fn accept(&mut self, frame: ExtractedFrame) {
        self.push(frame);
    }
}

pub trait BatchNotifier {
    /// 每次完成或中止的批量任务恰好调用一次
    fn on_batch_finished(&mut self, outcome: &BatchOutcome);
}

impl BatchNotifier for () {
    fn on_batch_finished(&mut self, _outcome: &BatchOutcome) {}
}

/// 定位完成信号（接收端）
pub struct SeekCompletion {
    timestamp: f64,
    rx: Option<Receiver<Result<(), String>>>,
}

/// 定位完成信号（发送端），由播放器在定位结束时触发
pub struct SeekSignal {
    tx: Sender<Result<(), String>>,
}

impl SeekCompletion {
    /// 同步定位的播放器直接返回已完成的信号
    pub fn ready(timestamp: f64) -> Self {
        Self {
            timestamp,
            rx: None,
        }
    }

    pub fn pending(timestamp: f64) -> (SeekSignal, SeekCompletion) {
        let (tx, rx) = mpsc::channel();
        (
            SeekSignal { tx },
            SeekCompletion {
                timestamp,
                rx: Some(rx),
            },
        )
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// 阻塞等待定位完成，超时视为失败
    pub fn wait(self, timeout: Duration) -> Result<(), CaptureError> {
        let Some(rx) = self.rx else {
            return Ok(());
        };

        match rx.recv_timeout(timeout) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(CaptureError::SeekFailed {
                timestamp: self.timestamp,
                reason,
            }),
            Err(RecvTimeoutError::Timeout) => Err(CaptureError::SeekTimeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(CaptureError::SeekAbandoned),
        }
    }
}

impl SeekSignal {
    pub fn complete(self) {
        // 等待方可能已超时离开
        let _ = self.tx.send(Ok(()));
    }

    pub fn fail(self, reason: impl Into<String>) {
        let _ = self.tx.send(Err(reason.into()));
    }
}

/// 脚本化的视频源，按时间戳生成画面，用于测试和无界面环境
pub struct ScriptedVideo {
    meta: Option<VideoMeta>,
    position: f64,
    paused: bool,
    content: Box<dyn Fn(f64) -> PixelBuffer + Send>,
    seeks: Vec<f64>,
    renders: usize,
    fail_render_at: Option<f64>,
    fail_seek_at: Option<f64>,
    gate: Option<Sender<SeekSignal>>,
    _held: Option<Receiver<SeekSignal>>,
}

impl ScriptedVideo {
    pub fn new<F>(meta: VideoMeta, content: F) -> Self
    where
        F: Fn(f64) -> PixelBuffer + Send + 'static,
    {
        Self {
            meta: Some(meta),
            position: 0.0,
            paused: false,
            content: Box::new(content),
            seeks: Vec::new(),
            renders: 0,
            fail_render_at: None,
            fail_seek_at: None,
            gate: None,
            _held: None,
        }
    }

    /// 每秒换一种灰度的视频
    pub fn uniform(duration: f64) -> Self {
        Self::new(VideoMeta::new("scripted", duration, 16, 16), |t| {
            let level = ((t * 40.0) as u32 % 256) as u8;
            PixelBuffer::filled(16, 16, [level, level, level, 255])
        })
    }

    pub fn empty() -> Self {
        let mut video = Self::uniform(0.0);
        video.meta = None;
        video
    }

    pub fn fail_render_at(mut self, timestamp: f64) -> Self {
        self.fail_render_at = Some(timestamp);
        self
    }

    pub fn fail_seek_at(mut self, timestamp: f64) -> Self {
        self.fail_seek_at = Some(timestamp);
        self
    }

    /// 定位信号交给外部手动完成
    pub fn gated(mut self, gate: Sender<SeekSignal>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// 定位永不完成（信号被保留但不触发）
    pub fn stalled(mut self) -> Self {
        let (tx, rx) = mpsc::channel();
        self.gate = Some(tx);
        self._held = Some(rx);
        self
    }

    pub fn set_position(&mut self, timestamp: f64) {
        self.position = timestamp;
    }

    pub fn seeks(&self) -> &[f64] {
        &self.seeks
    }

    pub fn render_count(&self) -> usize {
        self.renders
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

impl VideoPlayer for ScriptedVideo {
    fn meta(&self) -> Option<VideoMeta> {
        self.meta.clone()
    }

    fn current_time(&self) -> f64 {
        self.position
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn seek_to(&mut self, timestamp: f64) -> SeekCompletion {
        self.position = timestamp;
        self.seeks.push(timestamp);

        if self.fail_seek_at == Some(timestamp) {
            let (signal, completion) = SeekCompletion::pending(timestamp);
            signal.fail("decoder error");
            return completion;
        }

        match &self.gate {
            Some(gate) => {
                let (signal, completion) = SeekCompletion::pending(timestamp);
                // 接收方已关闭时信号随之丢弃，等待方得到 SeekAbandoned
                let _ = gate.send(signal);
                completion
            }
            None => SeekCompletion::ready(timestamp),
        }
    }
}

impl FrameRenderer for ScriptedVideo {
    fn render_current_frame(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<PixelBuffer, CaptureError> {
        if self.fail_render_at == Some(self.position) {
            return Err(CaptureError::Render(format!(
                "canvas unavailable at {:.2}s",
                self.position
            )));
        }
        self.renders += 1;

        let frame = (self.content)(self.position);
        if frame.width != width || frame.height != height {
            return Err(CaptureError::Render(format!(
                "expected {}x{}, got {}x{}",
                width, height, frame.width, frame.height
            )));
        }
        Ok(frame)
    }
}
