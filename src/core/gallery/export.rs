//! 将选中的帧打包为 zip

use chrono::{Local, NaiveDate};
use log::info;
use serde::Serialize;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::Path;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::store::FrameStore;
use crate::core::playback::timestamp_parts;
use crate::frame_sampler::ExtractedFrame;

pub const ARCHIVE_FOLDER: &str = "extracted_frames";
pub const MANIFEST_NAME: &str = "manifest.json";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No frames selected")]
    NothingSelected,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    /// 额外写入 manifest.json（时间戳与描述）
    pub include_manifest: bool,
}

#[derive(Serialize)]
struct ManifestEntry<'a> {
    id: &'a str,
    timestamp: f64,
    file: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<&'a str>,
}

/// `frame_MM-SS-CC.<ext>`
pub fn frame_file_name(timestamp: f64, extension: &str) -> String {
    let (mins, secs, centis) = timestamp_parts(timestamp);
    format!("frame_{:02}-{:02}-{:02}.{}", mins, secs, centis, extension)
}

pub fn archive_file_name(date: NaiveDate) -> String {
    format!("frames_archive_{}.zip", date.format("%Y-%m-%d"))
}

pub fn default_archive_name() -> String {
    archive_file_name(Local::now().date_naive())
}

pub fn export_frames(
    frames: &[&ExtractedFrame],
    options: ExportOptions,
) -> Result<Vec<u8>, ExportError> {
    if frames.is_empty() {
        return Err(ExportError::NothingSelected);
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let file_options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.add_directory(format!("{}/", ARCHIVE_FOLDER), file_options)?;

    let mut used = HashSet::new();
    let mut entries = Vec::with_capacity(frames.len());

    for frame in frames {
        let name = unique_name(&mut used, frame.timestamp, frame.image.extension());
        zip.start_file(format!("{}/{}", ARCHIVE_FOLDER, name), file_options)?;
        zip.write_all(&frame.image.data)?;
        entries.push((frame, name));
    }

    if options.include_manifest {
        let manifest: Vec<ManifestEntry> = entries
            .iter()
            .map(|(frame, name)| ManifestEntry {
                id: &frame.id,
                timestamp: frame.timestamp,
                file: name,
                analysis: frame.analysis.as_deref(),
            })
            .collect();
        zip.start_file(format!("{}/{}", ARCHIVE_FOLDER, MANIFEST_NAME), file_options)?;
        zip.write_all(&serde_json::to_vec_pretty(&manifest)?)?;
    }

    let bytes = zip.finish()?.into_inner();
    info!(
        "📦 Archive built: {} frames, {} bytes",
        frames.len(),
        bytes.len()
    );
    Ok(bytes)
}

pub fn export_selected(store: &FrameStore, options: ExportOptions) -> Result<Vec<u8>, ExportError> {
    export_frames(&store.selected_frames(), options)
}

pub fn write_archive(
    path: impl AsRef<Path>,
    store: &FrameStore,
    options: ExportOptions,
) -> Result<usize, ExportError> {
    let bytes = export_selected(store, options)?;
    std::fs::write(path.as_ref(), &bytes)?;
    info!("💾 Archive written to {:?}", path.as_ref());
    Ok(bytes.len())
}

/// 同一百分之一秒内的帧追加 `_N` 后缀
fn unique_name(used: &mut HashSet<String>, timestamp: f64, extension: &str) -> String {
    let base = frame_file_name(timestamp, extension);
    if used.insert(base.clone()) {
        return base;
    }

    let stem = base.trim_end_matches(&format!(".{}", extension)).to_string();
    let mut n = 1;
    loop {
        let candidate = format!("{}_{}.{}", stem, n, extension);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
