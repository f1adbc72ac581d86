//! 帧画廊

use flutter_rust_bridge::{frb, DartFnFuture};
use futures::executor::block_on;
use log::info;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::error::ApiError;
use crate::core::config::CaptureConfig;
use crate::core::gallery::{
    self, CaptionError, CaptionLanguage, ExportOptions, FrameAnalyzer, FrameSortOrder, FrameStore,
};
use crate::core::playback;
use crate::frame_sampler::{
    encoder, EncodedImage, ExtractedFrame, FrameEncoding, PixelBuffer, VideoMeta,
};

/// 画廊中一帧的展示信息
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryFrame {
    pub id: String,
    pub timestamp: f64,
    /// `MM:SS.CC`
    pub label: String,
    pub mime_type: String,
    pub data: Vec<u8>,
    pub analysis: Option<String>,
    pub analysis_pending: bool,
    pub selected: bool,
}

/// 宿主提供的描述服务：参数为图像字节、MIME 类型与提示词，失败时返回 None
struct HostAnalyzer<F>(F);

impl<F> FrameAnalyzer for HostAnalyzer<F>
where
    F: Fn(Vec<u8>, String, String) -> DartFnFuture<Option<String>>,
{
    fn describe(&self, image: &EncodedImage, prompt: &str) -> Result<String, CaptionError> {
        block_on((self.0)(
            image.data.clone(),
            image.mime_type.clone(),
            prompt.to_string(),
        ))
        .ok_or_else(|| CaptionError::Failed("host returned no description".to_string()))
    }
}

/// 帧画廊 - 保存捕获结果，支持多选、删除与打包导出
///
/// ```dart
/// final gallery = FrameGallery.create();
/// gallery.loadVideo(name: 'clip.mp4', duration: 10, width: 1920, height: 1080);
/// final id = gallery.addRgba(timestamp: 2.0, width: w, height: h, rgba: pixels);
/// gallery.toggleSelect(id: id);
/// final zip = gallery.exportSelected(includeManifest: false);
/// ```
#[frb(opaque)]
pub struct FrameGallery {
    store: Mutex<FrameStore>,
    encoding: FrameEncoding,
}

impl FrameGallery {
    #[frb(sync)]
    pub fn create() -> Self {
        crate::init_logging();
        info!("🖼️ FrameGallery: created");
        Self {
            store: Mutex::new(FrameStore::new()),
            encoding: FrameEncoding::default(),
        }
    }

    /// 使用 JSON5 配置创建，例如 `{ encoding: { jpeg: { quality: 80 } } }`
    #[frb(sync)]
    pub fn create_with_config(config: String) -> Result<Self, ApiError> {
        let config = CaptureConfig::from_json5(&config)?;
        let mut gallery = Self::create();
        gallery.encoding = config.encoding;
        Ok(gallery)
    }

    #[frb(sync)]
    pub fn load_video(&self, name: String, duration: f64, width: u32, height: u32) {
        self.store()
            .load_video(VideoMeta::new(name, duration, width, height));
    }

    /// 加入宿主已编码好的 PNG
    #[frb(sync)]
    pub fn add_png(&self, timestamp: f64, png: Vec<u8>) -> String {
        self.push(ExtractedFrame::new(timestamp, EncodedImage::png(png)))
    }

    /// 加入原始 RGBA 像素，按配置编码
    #[frb]
    pub fn add_rgba(
        &self,
        timestamp: f64,
        width: u32,
        height: u32,
        rgba: Vec<u8>,
    ) -> Result<String, ApiError> {
        let buffer = PixelBuffer::from_rgba(width, height, rgba)?;
        let image = encoder::encode(&buffer, self.encoding)?;
        Ok(self.push(ExtractedFrame::new(timestamp, image)))
    }

    #[frb(sync)]
    pub fn frames(&self, newest_first: bool) -> Vec<GalleryFrame> {
        let order = if newest_first {
            FrameSortOrder::TimeDesc
        } else {
            FrameSortOrder::TimeAsc
        };
        let store = self.store();
        store
            .sorted(order)
            .into_iter()
            .map(|frame| GalleryFrame {
                id: frame.id.clone(),
                timestamp: frame.timestamp,
                label: playback::format_timestamp(frame.timestamp),
                mime_type: frame.image.mime_type.clone(),
                data: frame.image.data.clone(),
                analysis: frame.analysis.clone(),
                analysis_pending: frame.analysis_pending,
                selected: store.is_selected(&frame.id),
            })
            .collect()
    }

    #[frb(sync, getter)]
    pub fn frame_count(&self) -> u32 {
        self.store().len() as u32
    }

    #[frb(sync, getter)]
    pub fn selected_count(&self) -> u32 {
        self.store().selected_count() as u32
    }

    /// 返回切换后的选中状态
    #[frb(sync)]
    pub fn toggle_select(&self, id: String) -> Result<bool, ApiError> {
        let mut store = self.store();
        if store.get(&id).is_none() {
            return Err(ApiError::frame_not_found(&id));
        }
        Ok(store.toggle_select(&id))
    }

    #[frb(sync)]
    pub fn toggle_select_all(&self) {
        self.store().toggle_select_all()
    }

    #[frb(sync)]
    pub fn delete_frame(&self, id: String) -> Result<(), ApiError> {
        if self.store().remove(&id) {
            Ok(())
        } else {
            Err(ApiError::frame_not_found(&id))
        }
    }

    /// 删除选中的帧，返回删除数量
    #[frb(sync)]
    pub fn delete_selected(&self) -> u32 {
        self.store().remove_selected() as u32
    }

    #[frb(sync)]
    pub fn clear(&self) {
        self.store().clear()
    }

    /// 宿主调用描述服务前标记为处理中
    #[frb(sync)]
    pub fn mark_analysis_pending(&self, id: String) -> Result<(), ApiError> {
        if self.store().begin_analysis(&id) {
            Ok(())
        } else {
            Err(ApiError::frame_not_found(&id))
        }
    }

    #[frb(sync)]
    pub fn set_analysis(&self, id: String, analysis: String) -> Result<(), ApiError> {
        let text = if analysis.trim().is_empty() {
            gallery::ANALYSIS_EMPTY.to_string()
        } else {
            analysis
        };
        if self.store().finish_analysis(&id, text) {
            Ok(())
        } else {
            Err(ApiError::frame_not_found(&id))
        }
    }

    /// 按区域标签返回描述提示词
    #[frb(sync)]
    pub fn caption_prompt(locale: String) -> String {
        CaptionLanguage::from_locale(&locale)
            .prompt()
            .to_string()
    }

    /// 为一帧生成描述。调用期间不持有画廊锁，宿主仍可读取列表。
    #[frb]
    pub fn analyze_frame(
        &self,
        id: String,
        locale: String,
        describe: impl Fn(Vec<u8>, String, String) -> DartFnFuture<Option<String>>
            + Send
            + Sync
            + 'static,
    ) -> Result<String, ApiError> {
        let language = CaptionLanguage::from_locale(&locale);
        self.analyze_with(&id, language, &HostAnalyzer(describe))
    }

    pub(crate) fn analyze_with(
        &self,
        id: &str,
        language: CaptionLanguage,
        analyzer: &dyn FrameAnalyzer,
    ) -> Result<String, ApiError> {
        let image = {
            let mut store = self.store();
            if !store.begin_analysis(id) {
                return Err(ApiError::frame_not_found(id));
            }
            let image = store.get(id).map(|f| f.image.clone());
            image
        };
        let image = image.ok_or_else(|| ApiError::frame_not_found(id))?;

        let text = gallery::describe_frame(analyzer, &image, language);
        if self.store().finish_analysis(id, text.clone()) {
            Ok(text)
        } else {
            // 描述期间帧已被删除
            Err(ApiError::frame_not_found(id))
        }
    }

    /// 打包选中的帧，返回 zip 字节
    #[frb]
    pub fn export_selected(&self, include_manifest: bool) -> Result<Vec<u8>, ApiError> {
        let store = self.store();
        Ok(gallery::export_selected(
            &store,
            ExportOptions { include_manifest },
        )?)
    }

    /// 打包选中的帧并写入文件，返回写入的字节数
    #[frb]
    pub fn save_archive(&self, path: String, include_manifest: bool) -> Result<u64, ApiError> {
        let store = self.store();
        let written = gallery::write_archive(&path, &store, ExportOptions { include_manifest })?;
        Ok(written as u64)
    }

    #[frb(sync)]
    pub fn archive_name() -> String {
        gallery::default_archive_name()
    }

    pub(crate) fn meta(&self) -> Option<VideoMeta> {
        self.store().meta().cloned()
    }

    pub(crate) fn shared_store(&self) -> &Mutex<FrameStore> {
        &self.store
    }

    fn push(&self, frame: ExtractedFrame) -> String {
        let id = frame.id.clone();
        self.store().add(frame);
        id
    }

    fn store(&self) -> MutexGuard<'_, FrameStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for FrameGallery {
    fn drop(&mut self) {
        info!("🗑️ FrameGallery: released");
    }
}
