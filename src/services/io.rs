//! Image I/O operations service
//!
//! Keeps file access and codec calls out of the backends so every backend
//! reports decode and filesystem failures the same way.

use crate::error::{RemoverError, Result};
use image::{DynamicImage, ImageFormat};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Marker inserted before the extension of every output file
pub const OUTPUT_MARKER: &str = "_bg_removed";

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// The format is detected from content, not from the extension.
    ///
    /// # Errors
    /// - `RemoverError::Io` when the file cannot be read
    /// - `RemoverError::Decode` when the content is not a supported image
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();
        let data = std::fs::read(path_ref)
            .map_err(|e| RemoverError::file_io_error("read image file", path_ref, &e))?;

        image::load_from_memory(&data).map_err(|e| RemoverError::decode_error(path_ref, &e))
    }

    /// Encode an image as PNG at `path`, regardless of the path's extension
    ///
    /// # Errors
    /// - `RemoverError::Io` when the file cannot be created, encoded or flushed
    pub fn save_png<P: AsRef<Path>>(image: &DynamicImage, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        let file = File::create(path_ref)
            .map_err(|e| RemoverError::file_io_error("create output file", path_ref, &e))?;
        let mut writer = BufWriter::new(file);

        image
            .write_to(&mut writer, ImageFormat::Png)
            .map_err(|e| match e {
                image::ImageError::IoError(io) => {
                    RemoverError::file_io_error("write PNG data", path_ref, &io)
                },
                other => RemoverError::unexpected(format!(
                    "Failed to encode PNG '{}': {}",
                    path_ref.display(),
                    other
                )),
            })?;

        writer
            .flush()
            .map_err(|e| RemoverError::file_io_error("flush output file", path_ref, &e))
    }

    /// Derive the output path by inserting [`OUTPUT_MARKER`] before the final extension
    ///
    /// `shirt.jpg` becomes `shirt_bg_removed.jpg`; `shirt` becomes `shirt_bg_removed`.
    #[must_use]
    pub fn output_path_for<P: AsRef<Path>>(input: P) -> PathBuf {
        let input = input.as_ref();
        // Built as an OsString so non-UTF-8 names stay distinct
        let mut file_name = input
            .file_stem()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        file_name.push(OUTPUT_MARKER);
        if let Some(ext) = input.extension() {
            file_name.push(".");
            file_name.push(ext);
        }

        input.with_file_name(file_name)
    }
}
