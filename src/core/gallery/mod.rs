//! 帧画廊 - 存放、选择、描述与导出捕获的帧

pub mod caption;
pub mod export;
pub mod store;

pub use caption::{
    describe_frame, CaptionError, CaptionLanguage, FrameAnalyzer, ANALYSIS_EMPTY, ANALYSIS_FAILED,
};
pub use export::{
    archive_file_name, default_archive_name, export_frames, export_selected, frame_file_name,
    write_archive, ExportError, ExportOptions,
};
pub use store::{FrameSortOrder, FrameStore};
