use super::frame::PixelBuffer;

/// 智能模式的变化阈值（固定策略常量）
pub const SMART_CHANGE_THRESHOLD: f32 = 0.15;

/// 每 16 字节取一个像素，即每 4 个像素采样 1 个
const SAMPLE_STRIDE: usize = 16;

/// 两帧之间的归一化差异度，范围 [0, 1]
///
/// 只比较采样像素的 R/G/B 通道，忽略 alpha。尺寸不同的帧视为完全不同。
pub fn dissimilarity(prev: &PixelBuffer, curr: &PixelBuffer) -> f32 {
    if prev.width != curr.width
        || prev.height != curr.height
        || prev.data.len() != curr.data.len()
    {
        return 1.0;
    }

    let mut diff = 0u64;
    let mut sampled = 0u64;

    for (a, b) in prev
        .data
        .chunks(SAMPLE_STRIDE)
        .zip(curr.data.chunks(SAMPLE_STRIDE))
    {
        if a.len() < 3 {
            break;
        }
        diff += a[..3]
            .iter()
            .zip(&b[..3])
            .map(|(x, y)| x.abs_diff(*y) as u64)
            .sum::<u64>();
        sampled += 1;
    }

    if sampled == 0 {
        return 0.0;
    }

    (diff as f64 / (sampled as f64 * 255.0 * 3.0)) as f32
}

/// 候选帧是否与上一次检查的帧明显不同。没有上一帧时直接接受。
pub fn is_distinct(previous: Option<&PixelBuffer>, current: &PixelBuffer) -> bool {
    match previous {
        None => true,
        Some(prev) => dissimilarity(prev, current) > SMART_CHANGE_THRESHOLD,
    }
}

/// 滑动基线过滤器：每一帧都与紧邻的上一帧比较，无论上一帧是否被保留
pub struct SmartFilter {
    previous: Option<PixelBuffer>,
    offered: u64,
    accepted: u64,
}

impl SmartFilter {
    pub fn new() -> Self {
        Self {
            previous: None,
            offered: 0,
            accepted: 0,
        }
    }

    pub fn offer(&mut self, buffer: PixelBuffer) -> bool {
        let keep = is_distinct(self.previous.as_ref(), &buffer);
        self.previous = Some(buffer);

        self.offered += 1;
        if keep {
            self.accepted += 1;
        }
        keep
    }

    pub fn offered_count(&self) -> u64 {
        self.offered
    }

    pub fn accepted_count(&self) -> u64 {
        self.accepted
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.offered = 0;
        self.accepted = 0;
    }
}

impl Default for SmartFilter {
    fn default() -> Self {
        Self::new()
    }
}
