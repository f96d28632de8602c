//! Deterministic fallback backend
//!
//! Keeps the central region of the image and makes the border transparent.
//! Used when no segmentation model can be acquired.

use super::Backend;
use crate::{
    config::RemovalOptions,
    error::Result,
    services::ImageIOService,
};
use image::{DynamicImage, RgbaImage};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Images narrower or shorter than this keep no pixels
pub const MIN_CROPPABLE_DIMENSION: u32 = 8;

/// Center-crop-to-transparent backend
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackBackend;

/// Retained rectangle as half-open ranges `[x0, x1) x [y0, y1)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetainedRegion {
    pub x0: u32,
    pub x1: u32,
    pub y0: u32,
    pub y1: u32,
}

impl RetainedRegion {
    /// Region for an image of the given size: inset `width/6` and `height/8` per side
    ///
    /// Below [`MIN_CROPPABLE_DIMENSION`] in either direction the region is empty.
    #[must_use]
    pub fn for_dimensions(width: u32, height: u32) -> Self {
        if width < MIN_CROPPABLE_DIMENSION || height < MIN_CROPPABLE_DIMENSION {
            return Self {
                x0: 0,
                x1: 0,
                y0: 0,
                y1: 0,
            };
        }
        let margin_x = width / 6;
        let margin_y = height / 8;
        Self {
            x0: margin_x,
            x1: width.saturating_sub(margin_x),
            y0: margin_y,
            y1: height.saturating_sub(margin_y),
        }
    }

    #[must_use]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }
}

impl FallbackBackend {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Apply the transform to a decoded image
    #[must_use]
    pub fn cut_out(image: &DynamicImage) -> RgbaImage {
        let source = image.to_rgba8();
        let (width, height) = source.dimensions();
        let region = RetainedRegion::for_dimensions(width, height);
        let mut canvas = RgbaImage::new(width, height);

        if region.is_empty() {
            return canvas;
        }

        for y in region.y0..region.y1 {
            for x in region.x0..region.x1 {
                canvas.put_pixel(x, y, *source.get_pixel(x, y));
            }
        }

        canvas
    }
}

impl Backend for FallbackBackend {
    fn name(&self) -> &str {
        "center_crop"
    }

    fn is_fallback(&self) -> bool {
        true
    }

    #[instrument(skip(self, _options), fields(input = %input.display()))]
    fn process(&self, input: &Path, _options: &RemovalOptions) -> Result<PathBuf> {
        let image = ImageIOService::load_image(input)?;
        let canvas = Self::cut_out(&image);

        let output_path = ImageIOService::output_path_for(input);
        ImageIOService::save_png(&DynamicImage::ImageRgba8(canvas), &output_path)?;

        debug!(output = %output_path.display(), "Fallback processing completed");
        Ok(output_path)
    }
}
