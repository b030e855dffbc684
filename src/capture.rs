//! Primary display capture and PNG persistence.

use crate::constants::FILE_NAME_FORMAT;
use chrono::{Local, NaiveDateTime};
use image::{ImageFormat, RgbaImage};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("No primary display found")]
    NoPrimaryDisplay,
    #[error("Screen capture failed: {0}")]
    Screen(String),
    #[error("Screen capture not supported in this build")]
    Unsupported,
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("Cannot write screenshot into '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Something that can grab the full bounds of the primary display.
///
/// Implementations must query the display size on every call.
pub trait ScreenSource {
    fn capture_primary(&self) -> Result<RgbaImage, CaptureError>;
}

/// The machine's real primary monitor.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrimaryMonitor;

#[cfg(feature = "xcap")]
impl ScreenSource for PrimaryMonitor {
    fn capture_primary(&self) -> Result<RgbaImage, CaptureError> {
        let monitors = xcap::Monitor::all().map_err(|e| CaptureError::Screen(e.to_string()))?;
        let monitor = monitors
            .into_iter()
            .find(|m| m.is_primary())
            .ok_or(CaptureError::NoPrimaryDisplay)?;
        debug!(
            name = monitor.name(),
            width = monitor.width(),
            height = monitor.height(),
            "Capturing primary monitor"
        );
        let captured = monitor
            .capture_image()
            .map_err(|e| CaptureError::Screen(e.to_string()))?;
        let (width, height) = (captured.width(), captured.height());
        RgbaImage::from_raw(width, height, captured.into_raw()).ok_or_else(|| {
            CaptureError::Screen(format!("pixel buffer does not match {width}x{height}"))
        })
    }
}

#[cfg(not(feature = "xcap"))]
impl ScreenSource for PrimaryMonitor {
    fn capture_primary(&self) -> Result<RgbaImage, CaptureError> {
        Err(CaptureError::Unsupported)
    }
}

/// File name for a capture taken at `at` (local wall-clock time).
pub fn file_name_at(at: NaiveDateTime) -> String {
    at.format(FILE_NAME_FORMAT).to_string()
}

/// Capture now and store the PNG in `dir`.
pub fn capture(dir: &Path, source: &impl ScreenSource) -> Result<PathBuf, CaptureError> {
    capture_at(dir, source, Local::now().naive_local())
}

/// Capture and store the PNG in `dir`, named after `at`.
///
/// A capture in the same second as an existing file replaces it.
pub fn capture_at(
    dir: &Path,
    source: &impl ScreenSource,
    at: NaiveDateTime,
) -> Result<PathBuf, CaptureError> {
    let image = source.capture_primary()?;
    let target = dir.join(file_name_at(at));
    write_png(&image, &target)?;
    debug!(path = ?target, width = image.width(), height = image.height(), "Screenshot saved");
    Ok(target)
}

/// Encode into a temp file next to `target`, then rename it into place so a
/// crash never leaves a truncated PNG under a capture name.
fn write_png(image: &RgbaImage, target: &Path) -> Result<(), CaptureError> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let write_err = |source| CaptureError::Write {
        path: parent.display().to_string(),
        source,
    };

    let mut temp = NamedTempFile::new_in(parent).map_err(write_err)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        image.write_to(&mut writer, ImageFormat::Png)?;
        writer.flush().map_err(write_err)?;
    }
    temp.persist(target).map_err(|e| write_err(e.error))?;
    Ok(())
}
