use super::frame::PixelBuffer;
use super::pipeline::CancelToken;

/// 批量任务阶段：Idle → Running → {Completed | Aborted} → Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Idle,
    Running,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchEvent {
    Start,
    Finish,
    Fail,
    Settle,
}

impl BatchPhase {
    pub fn transition(self, event: BatchEvent) -> Option<BatchPhase> {
        match (self, event) {
            (BatchPhase::Idle, BatchEvent::Start) => Some(BatchPhase::Running),
            (BatchPhase::Running, BatchEvent::Finish) => Some(BatchPhase::Completed),
            (BatchPhase::Running, BatchEvent::Fail) => Some(BatchPhase::Aborted),
            (BatchPhase::Completed | BatchPhase::Aborted, BatchEvent::Settle) => {
                Some(BatchPhase::Idle)
            }
            _ => None,
        }
    }
}

/// 驱动器独占的运行状态
#[derive(Debug)]
pub struct BatchRunState {
    pub phase: BatchPhase,
    pub cursor_time: f64,
    pub step_size: f64,
    /// 仅智能模式使用，每访问一帧替换一次
    pub previous: Option<PixelBuffer>,
    pub running: bool,
    /// 最近一次结束时的阶段（Completed 或 Aborted）
    pub last_result: Option<BatchPhase>,
    cancel: CancelToken,
}

/// 运行状态的只读快照
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSnapshot {
    pub phase: BatchPhase,
    pub cursor_time: f64,
    pub step_size: f64,
    pub running: bool,
    pub last_result: Option<BatchPhase>,
}

impl BatchRunState {
    pub fn new() -> Self {
        Self {
            phase: BatchPhase::Idle,
            cursor_time: 0.0,
            step_size: 0.0,
            previous: None,
            running: false,
            last_result: None,
            cancel: CancelToken::new(),
        }
    }

    /// 进入 Running；已有任务在运行时返回 None 且不修改任何状态
    pub fn begin(&mut self, step_size: f64) -> Option<CancelToken> {
        let next = self.phase.transition(BatchEvent::Start)?;
        if self.running {
            return None;
        }

        self.phase = next;
        self.running = true;
        self.cursor_time = 0.0;
        self.step_size = step_size;
        self.previous = None;
        self.cancel = CancelToken::new();
        Some(self.cancel.clone())
    }

    pub fn advance(&mut self, timestamp: f64) {
        if timestamp > self.cursor_time {
            self.cursor_time = timestamp;
        }
    }

    /// 结束本次任务并回到 Idle。`event` 为 Finish 或 Fail。
    pub fn settle(&mut self, event: BatchEvent) {
        if let Some(end) = self.phase.transition(event) {
            self.last_result = Some(end);
            self.phase = end;
        }
        if let Some(idle) = self.phase.transition(BatchEvent::Settle) {
            self.phase = idle;
        }

        self.cursor_time = 0.0;
        self.previous = None;
        self.running = false;
    }

    pub fn request_cancel(&self) -> bool {
        if self.running {
            self.cancel.cancel();
        }
        self.running
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            phase: self.phase,
            cursor_time: self.cursor_time,
            step_size: self.step_size,
            running: self.running,
            last_result: self.last_result,
        }
    }
}

impl Default for BatchRunState {
    fn default() -> Self {
        Self::new()
    }
}
