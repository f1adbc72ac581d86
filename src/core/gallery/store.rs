//! 帧画廊：持有本次会话捕获的所有帧及选择状态

use log::info;
use std::collections::HashSet;

use crate::frame_sampler::{BatchNotifier, BatchOutcome, ExtractedFrame, FrameSink, VideoMeta};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameSortOrder {
    #[default]
    TimeAsc,
    TimeDesc,
}

/// 画廊的唯一持有者负责修改，其他组件只读
#[derive(Debug, Default)]
pub struct FrameStore {
    meta: Option<VideoMeta>,
    frames: Vec<ExtractedFrame>,
    selected: HashSet<String>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加载新视频，清空之前的帧与选择
    pub fn load_video(&mut self, meta: VideoMeta) {
        info!(
            "🎞️ Video loaded: {} ({:.2}s, {}x{})",
            meta.name, meta.duration, meta.width, meta.height
        );
        self.meta = Some(meta);
        self.frames.clear();
        self.selected.clear();
    }

    pub fn meta(&self) -> Option<&VideoMeta> {
        self.meta.as_ref()
    }

    pub fn add(&mut self, frame: ExtractedFrame) {
        self.frames.push(frame);
    }

    pub fn get(&self, id: &str) -> Option<&ExtractedFrame> {
        self.frames.iter().find(|f| f.id == id)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.frames.len();
        self.frames.retain(|f| f.id != id);
        self.selected.remove(id);
        self.frames.len() != before
    }

    pub fn remove_selected(&mut self) -> usize {
        if self.selected.is_empty() {
            return 0;
        }
        let before = self.frames.len();
        let selected = std::mem::take(&mut self.selected);
        self.frames.retain(|f| !selected.contains(&f.id));

        let removed = before - self.frames.len();
        info!("🗑️ Removed {} selected frames", removed);
        removed
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.selected.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[ExtractedFrame] {
        &self.frames
    }

    pub fn sorted(&self, order: FrameSortOrder) -> Vec<&ExtractedFrame> {
        let mut frames: Vec<&ExtractedFrame> = self.frames.iter().collect();
        frames.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        if order == FrameSortOrder::TimeDesc {
            frames.reverse();
        }
        frames
    }

    /// 切换选择状态，返回切换后是否选中；未知 ID 返回 false
    pub fn toggle_select(&mut self, id: &str) -> bool {
        if self.selected.remove(id) {
            return false;
        }
        if self.get(id).is_none() {
            return false;
        }
        self.selected.insert(id.to_string());
        true
    }

    /// 已全选时取消全选，否则全选
    pub fn toggle_select_all(&mut self) {
        if self.all_selected() {
            self.selected.clear();
        } else {
            self.selected = self.frames.iter().map(|f| f.id.clone()).collect();
        }
    }

    pub fn all_selected(&self) -> bool {
        self.selected.len() == self.frames.len()
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    /// 按画廊顺序返回选中的帧
    pub fn selected_frames(&self) -> Vec<&ExtractedFrame> {
        self.frames
            .iter()
            .filter(|f| self.selected.contains(&f.id))
            .collect()
    }

    pub fn begin_analysis(&mut self, id: &str) -> bool {
        match self.frames.iter_mut().find(|f| f.id == id) {
            Some(frame) => {
                frame.analysis_pending = true;
                true
            }
            None => false,
        }
    }

    pub fn finish_analysis(&mut self, id: &str, analysis: String) -> bool {
        match self.frames.iter_mut().find(|f| f.id == id) {
            Some(frame) => {
                frame.analysis_pending = false;
                frame.analysis = Some(analysis);
                true
            }
            None => false,
        }
    }
}

impl FrameSink for FrameStore {
    fn accept(&mut self, frame: ExtractedFrame) {
        self.add(frame);
    }
}

impl BatchNotifier for FrameStore {
    fn on_batch_finished(&mut self, outcome: &BatchOutcome) {
        if let Some(report) = outcome.report() {
            info!(
                "🧮 Batch finished: {} new frames, {} total",
                report.emitted,
                self.frames.len()
            );
        }
    }
}
