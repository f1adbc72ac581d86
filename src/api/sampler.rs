//! 采样规划与帧差过滤

use flutter_rust_bridge::frb;
use log::info;
use std::sync::{Mutex, PoisonError};

use super::error::ApiError;
use crate::frame_sampler::{dissimilarity, PixelBuffer, SamplingMode, SamplingPlan, SmartFilter};

/// 一次批量采样的时间表
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlanInfo {
    pub step_size: f64,
    pub timestamps: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerStats {
    pub offered: u64,
    pub accepted: u64,
}

/// 计算批量采样会访问的时间点
///
/// ```dart
/// final plan = planBatch(mode: SamplingMode.count, parameter: 5, totalDuration: 10);
/// // plan.timestamps == [0, 2, 4, 6, 8]
/// ```
#[frb(sync)]
pub fn plan_batch(mode: SamplingMode, parameter: f64, total_duration: f64) -> BatchPlanInfo {
    let plan = SamplingPlan::new(mode, parameter, total_duration);
    BatchPlanInfo {
        step_size: plan.step_size,
        timestamps: plan.timestamps().collect(),
    }
}

/// 模式循环：间隔 → 数量 → 智能 → 间隔
#[frb(sync)]
pub fn next_sampling_mode(mode: SamplingMode) -> SamplingMode {
    mode.next()
}

#[frb(sync)]
pub fn sampling_mode_label(mode: SamplingMode) -> String {
    mode.label().to_string()
}

/// 参数单位，例如 `s`、`pcs`
#[frb(sync)]
pub fn sampling_mode_unit(mode: SamplingMode) -> String {
    mode.unit().to_string()
}

/// 两帧 RGBA 数据的差异度，范围 [0, 1]
#[frb(sync)]
pub fn frame_dissimilarity(
    width: u32,
    height: u32,
    previous: Vec<u8>,
    current: Vec<u8>,
) -> Result<f32, ApiError> {
    let previous = PixelBuffer::from_rgba(width, height, previous)?;
    let current = PixelBuffer::from_rgba(width, height, current)?;
    Ok(dissimilarity(&previous, &current))
}

/// 智能采样过滤器 - 宿主自行渲染帧时使用
///
/// ```dart
/// final sampler = SmartSampler.create();
/// if (sampler.offer(width: w, height: h, rgba: pixels)) { keep(frame); }
/// ```
#[frb(opaque)]
pub struct SmartSampler {
    filter: Mutex<SmartFilter>,
}

impl SmartSampler {
    #[frb(sync)]
    pub fn create() -> Self {
        info!("🧠 SmartSampler: created");
        Self {
            filter: Mutex::new(SmartFilter::new()),
        }
    }

    /// 送入一帧，返回是否保留
    #[frb(sync)]
    pub fn offer(&self, width: u32, height: u32, rgba: Vec<u8>) -> Result<bool, ApiError> {
        let buffer = PixelBuffer::from_rgba(width, height, rgba)?;
        Ok(self
            .filter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .offer(buffer))
    }

    #[frb(sync, getter)]
    pub fn stats(&self) -> SamplerStats {
        let filter = self.filter.lock().unwrap_or_else(PoisonError::into_inner);
        SamplerStats {
            offered: filter.offered_count(),
            accepted: filter.accepted_count(),
        }
    }

    #[frb(sync)]
    pub fn reset(&self) {
        self.filter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset()
    }
}

impl Drop for SmartSampler {
    fn drop(&mut self) {
        info!("🗑️ SmartSampler: released");
    }
}
