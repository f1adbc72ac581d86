//! 播放控制辅助：倍速切换、逐帧步进、时间格式化

/// 逐帧步进的时长（秒）
pub const FRAME_STEP: f64 = 0.033;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackRate {
    Quarter,
    Half,
    #[default]
    Normal,
    OneAndHalf,
    Double,
}

impl PlaybackRate {
    pub fn next(self) -> Self {
        match self {
            PlaybackRate::Quarter => PlaybackRate::Half,
            PlaybackRate::Half => PlaybackRate::Normal,
            PlaybackRate::Normal => PlaybackRate::OneAndHalf,
            PlaybackRate::OneAndHalf => PlaybackRate::Double,
            PlaybackRate::Double => PlaybackRate::Quarter,
        }
    }

    pub fn factor(self) -> f64 {
        match self {
            PlaybackRate::Quarter => 0.25,
            PlaybackRate::Half => 0.5,
            PlaybackRate::Normal => 1.0,
            PlaybackRate::OneAndHalf => 1.5,
            PlaybackRate::Double => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Forward,
    Backward,
}

/// 逐帧步进后的位置，限制在 [0, duration]
pub fn step_frame(current: f64, duration: f64, direction: StepDirection) -> f64 {
    match direction {
        StepDirection::Forward => (current + FRAME_STEP).min(duration),
        StepDirection::Backward => (current - FRAME_STEP).max(0.0),
    }
}

/// 拆分为 (分, 秒, 百分之一秒)
pub fn timestamp_parts(seconds: f64) -> (u64, u64, u64) {
    let seconds = seconds.max(0.0);
    let mins = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    let centis = ((seconds % 1.0) * 100.0).floor() as u64;
    (mins, secs, centis)
}

/// `MM:SS.CC`
pub fn format_timestamp(seconds: f64) -> String {
    let (mins, secs, centis) = timestamp_parts(seconds);
    format!("{:02}:{:02}.{:02}", mins, secs, centis)
}
