//! QR bitmaps for export.
//!
//! Rendering runs on the blocking pool. [`render_batch`] resolves only after
//! every render task has finished, so a caller holding a [`RenderedBatch`]
//! knows exactly which codes are drawable and which are not.

use image::{GrayImage, ImageFormat, Luma};
use qrcode::{Color, QrCode};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Could not encode QR {hash}: {message}")]
    Encode { hash: String, message: String },

    #[error("Could not write QR image: {0}")]
    Write(String),

    #[error("QR render task failed: {0}")]
    Task(String),
}

/// Pixel geometry of one rendered code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Pixels per module.
    pub scale: u32,
    /// Light border, in modules.
    pub quiet_zone: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            scale: 8,
            quiet_zone: 4,
        }
    }
}

/// Stable lookup key for a hash's bitmap.
pub fn canvas_id(hash: &str) -> String {
    format!("pdf-qr-{hash}")
}

/// Anything that can hand out rendered bitmaps by canvas id.
pub trait QrBitmapSource {
    fn bitmap(&self, canvas_id: &str) -> Option<&GrayImage>;
}

#[derive(Debug, Default)]
pub struct RenderedBatch {
    bitmaps: HashMap<String, GrayImage>,
    failed: Vec<String>,
}

impl RenderedBatch {
    pub fn len(&self) -> usize {
        self.bitmaps.len()
    }

    /// Hashes whose render failed.
    pub fn failed(&self) -> &[String] {
        &self.failed
    }
}

impl QrBitmapSource for RenderedBatch {
    fn bitmap(&self, canvas_id: &str) -> Option<&GrayImage> {
        self.bitmaps.get(canvas_id)
    }
}

impl QrBitmapSource for HashMap<String, GrayImage> {
    fn bitmap(&self, canvas_id: &str) -> Option<&GrayImage> {
        self.get(canvas_id)
    }
}

/// Encode `value` and draw it as a black-on-white grayscale bitmap.
pub fn render_qr(value: &str, opts: RenderOptions) -> Result<GrayImage, RenderError> {
    let code = QrCode::new(value.as_bytes()).map_err(|e| RenderError::Encode {
        hash: value.to_string(),
        message: e.to_string(),
    })?;
    let width = code.width() as u32;
    let colors = code.to_colors();
    let scale = opts.scale.max(1);
    let side = (width + 2 * opts.quiet_zone) * scale;

    let mut img = GrayImage::from_pixel(side, side, Luma([255u8]));
    for (idx, color) in colors.iter().enumerate() {
        if *color != Color::Dark {
            continue;
        }
        let mx = idx as u32 % width + opts.quiet_zone;
        let my = idx as u32 / width + opts.quiet_zone;
        for dy in 0..scale {
            for dx in 0..scale {
                img.put_pixel(mx * scale + dx, my * scale + dy, Luma([0u8]));
            }
        }
    }
    Ok(img)
}

/// Render every hash's redirect URL concurrently and wait for all of them.
pub async fn render_batch(hashes: &[String], config: &AppConfig, opts: RenderOptions) -> RenderedBatch {
    let mut handles = Vec::with_capacity(hashes.len());
    for hash in hashes {
        let hash = hash.clone();
        let value = config.qr_value(&hash);
        let handle = tokio::task::spawn_blocking(move || render_qr(&value, opts));
        handles.push((hash, handle));
    }

    let mut batch = RenderedBatch::default();
    for (hash, handle) in handles {
        let outcome = handle
            .await
            .map_err(|e| RenderError::Task(e.to_string()))
            .and_then(|result| result);
        match outcome {
            Ok(img) => {
                batch.bitmaps.insert(canvas_id(&hash), img);
            }
            Err(e) => {
                warn!(hash = %hash, error = %e, "QR render failed");
                batch.failed.push(hash);
            }
        }
    }
    debug!(rendered = batch.len(), failed = batch.failed.len(), "QR batch rendered");
    batch
}

/// Write one hash's QR as a PNG.
pub fn render_png(hash: &str, config: &AppConfig, opts: RenderOptions, path: &Path) -> Result<(), RenderError> {
    let img = render_qr(&config.qr_value(hash), opts)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| RenderError::Write(e.to_string()))?;
    }
    img.save_with_format(path, ImageFormat::Png)
        .map_err(|e| RenderError::Write(e.to_string()))
}
