use serde::{Deserialize, Serialize};

/// 固定间隔模式的最小步长（秒）
pub const MIN_INTERVAL_STEP: f64 = 0.1;
/// 智能模式的最小候选步长（秒）
pub const MIN_SMART_STEP: f64 = 0.2;
/// 步长低于该值时，首次访问后立即结束
pub const TERMINATION_STEP_FLOOR: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMode {
    /// 参数为两次采样之间的秒数
    #[default]
    Interval,
    /// 参数为目标帧数，均匀分布在整个时长上
    Count,
    /// 参数为候选采样间隔，实际保留的帧由差异过滤决定
    Smart,
}

impl SamplingMode {
    pub fn next(self) -> Self {
        match self {
            SamplingMode::Interval => SamplingMode::Count,
            SamplingMode::Count => SamplingMode::Smart,
            SamplingMode::Smart => SamplingMode::Interval,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SamplingMode::Interval => "Interval",
            SamplingMode::Count => "Count",
            SamplingMode::Smart => "Smart AI",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            SamplingMode::Interval => "s",
            SamplingMode::Count => "pcs",
            SamplingMode::Smart => "scan(s)",
        }
    }
}

/// 根据模式和参数计算步长
pub fn plan(mode: SamplingMode, parameter: f64, total_duration: f64) -> f64 {
    match mode {
        SamplingMode::Interval => MIN_INTERVAL_STEP.max(parameter),
        SamplingMode::Count => total_duration.max(0.0) / target_count(parameter) as f64,
        SamplingMode::Smart => MIN_SMART_STEP.max(parameter),
    }
}

fn target_count(parameter: f64) -> usize {
    // NaN 经 max 后回落到 1
    1f64.max(parameter.floor()) as usize
}

/// 一次批量采样的访问计划
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingPlan {
    pub mode: SamplingMode,
    pub step_size: f64,
    pub total_duration: f64,
    /// 计数模式下的访问上限，避免浮点误差多访问一次
    pub visit_limit: Option<usize>,
}

impl SamplingPlan {
    pub fn new(mode: SamplingMode, parameter: f64, total_duration: f64) -> Self {
        let total_duration = if total_duration.is_finite() {
            total_duration.max(0.0)
        } else {
            0.0
        };
        let visit_limit = match mode {
            SamplingMode::Count => Some(target_count(parameter)),
            _ => None,
        };

        Self {
            mode,
            step_size: plan(mode, parameter, total_duration),
            total_duration,
            visit_limit,
        }
    }

    /// 第 `index` 次访问的时间戳；计划已结束时返回 None
    pub fn visit_at(&self, index: usize) -> Option<f64> {
        if index > 0 && self.step_size < TERMINATION_STEP_FLOOR {
            return None;
        }
        if self.visit_limit.is_some_and(|limit| index >= limit) {
            return None;
        }

        let timestamp = index as f64 * self.step_size;
        (timestamp < self.total_duration).then_some(timestamp)
    }

    pub fn timestamps(&self) -> PlanCursor {
        PlanCursor {
            plan: *self,
            index: 0,
        }
    }

    pub fn terminates_after_first_visit(&self) -> bool {
        self.step_size < TERMINATION_STEP_FLOOR
    }
}

pub struct PlanCursor {
    plan: SamplingPlan,
    index: usize,
}

impl Iterator for PlanCursor {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let timestamp = self.plan.visit_at(self.index)?;
        self.index += 1;
        Some(timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_uses_parameter_above_floor() {
        for parameter in [0.1, 0.25, 1.0, 2.0, 7.5, 60.0] {
            assert_eq!(plan(SamplingMode::Interval, parameter, 100.0), parameter);
        }
    }

    #[test]
    fn test_interval_floor() {
        assert_eq!(plan(SamplingMode::Interval, 0.05, 6.0), 0.1);
        assert_eq!(plan(SamplingMode::Interval, 0.0, 6.0), 0.1);
        assert_eq!(plan(SamplingMode::Interval, -3.0, 6.0), 0.1);
        assert_eq!(plan(SamplingMode::Interval, f64::NAN, 6.0), 0.1);
    }

    #[test]
    fn test_count_step() {
        assert_eq!(plan(SamplingMode::Count, 5.0, 10.0), 2.0);
        assert_eq!(plan(SamplingMode::Count, 5.9, 10.0), 2.0);
        assert_eq!(plan(SamplingMode::Count, 0.0, 10.0), 10.0);
        assert_eq!(plan(SamplingMode::Count, -4.0, 10.0), 10.0);
    }

    #[test]
    fn test_smart_floor() {
        assert_eq!(plan(SamplingMode::Smart, 1.0, 4.0), 1.0);
        assert_eq!(plan(SamplingMode::Smart, 0.1, 4.0), 0.2);
    }

    #[test]
    fn test_count_visits_at_most_n() {
        for duration in [0.7, 1.0, 3.3, 10.0, 59.94, 123.456] {
            for parameter in [1.0, 2.0, 3.0, 6.0, 7.0, 13.0, 29.5] {
                let plan = SamplingPlan::new(SamplingMode::Count, parameter, duration);
                let visits: Vec<f64> = plan.timestamps().collect();
                assert!(visits.len() <= parameter.floor() as usize);
                assert!(visits.iter().all(|t| *t < duration));
            }
        }
    }

    #[test]
    fn test_count_scenario() {
        let plan = SamplingPlan::new(SamplingMode::Count, 5.0, 10.0);
        let visits: Vec<f64> = plan.timestamps().collect();
        assert_eq!(visits, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_interval_scenario_visits_sixty() {
        let plan = SamplingPlan::new(SamplingMode::Interval, 0.05, 6.0);
        assert_eq!(plan.step_size, 0.1);
        assert!(!plan.terminates_after_first_visit());
        assert_eq!(plan.timestamps().count(), 60);
    }

    #[test]
    fn test_tiny_step_terminates_after_first_visit() {
        // 1 秒内 100 帧 → 步长 0.01 < 0.05
        let plan = SamplingPlan::new(SamplingMode::Count, 100.0, 1.0);
        assert!(plan.terminates_after_first_visit());
        assert_eq!(plan.timestamps().collect::<Vec<_>>(), vec![0.0]);
    }

    #[test]
    fn test_zero_duration_has_no_visits() {
        for mode in [SamplingMode::Interval, SamplingMode::Count, SamplingMode::Smart] {
            let plan = SamplingPlan::new(mode, 1.0, 0.0);
            assert_eq!(plan.timestamps().count(), 0);
        }
    }

    #[test]
    fn test_non_finite_duration() {
        let plan = SamplingPlan::new(SamplingMode::Interval, 1.0, f64::NAN);
        assert_eq!(plan.timestamps().count(), 0);
    }

    #[test]
    fn test_timestamps_non_decreasing() {
        let plan = SamplingPlan::new(SamplingMode::Smart, 0.3, 9.0);
        let visits: Vec<f64> = plan.timestamps().collect();
        assert!(visits.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(visits.first(), Some(&0.0));
    }

    #[test]
    fn test_mode_cycle() {
        let mut mode = SamplingMode::Interval;
        mode = mode.next();
        assert_eq!(mode, SamplingMode::Count);
        mode = mode.next();
        assert_eq!(mode, SamplingMode::Smart);
        mode = mode.next();
        assert_eq!(mode, SamplingMode::Interval);
        assert_eq!(SamplingMode::Count.unit(), "pcs");
    }
}
