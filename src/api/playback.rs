//! 播放控制辅助

use flutter_rust_bridge::frb;

use crate::core::playback::{self, PlaybackRate, StepDirection};

/// 下一档倍速，循环 0.25 → 0.5 → 1 → 1.5 → 2
#[frb(sync)]
pub fn next_playback_rate(rate: PlaybackRate) -> PlaybackRate {
    rate.next()
}

#[frb(sync)]
pub fn playback_rate_factor(rate: PlaybackRate) -> f64 {
    rate.factor()
}

/// 逐帧前进或后退后的位置
#[frb(sync)]
pub fn step_frame(current: f64, duration: f64, forward: bool) -> f64 {
    let direction = if forward {
        StepDirection::Forward
    } else {
        StepDirection::Backward
    };
    playback::step_frame(current, duration, direction)
}

/// `MM:SS.CC`
#[frb(sync)]
pub fn format_timestamp(seconds: f64) -> String {
    playback::format_timestamp(seconds)
}
