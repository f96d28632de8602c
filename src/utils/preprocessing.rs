//! Tensor preprocessing and mask postprocessing for segmentation models

use crate::{
    error::{RemoverError, Result},
    models::{MaskDecoding, PreprocessingConfig},
};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgba, RgbImage, RgbaImage};
use ndarray::Array4;

/// Image to tensor conversion
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Resize to the model's square input and normalize into an NCHW tensor
    #[must_use]
    pub fn preprocess_for_inference(
        image: &RgbImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Array4<f32> {
        let target_size = preprocessing_config.target_size;
        let resized = image::imageops::resize(
            image,
            target_size,
            target_size,
            image::imageops::FilterType::Triangle,
        );

        Self::canvas_to_tensor(&resized, preprocessing_config, target_size as usize)
    }

    /// Convert canvas to normalized tensor
    fn canvas_to_tensor(
        canvas: &RgbImage,
        preprocessing_config: &PreprocessingConfig,
        target_size: usize,
    ) -> Array4<f32> {
        let mut tensor = Array4::<f32>::zeros((1, 3, target_size, target_size));
        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;

        #[allow(clippy::indexing_slicing)]
        // Safe: tensor dimensions pre-allocated to match canvas size
        for (y, row) in canvas.rows().enumerate() {
            for (x, pixel) in row.enumerate() {
                for channel in 0..3 {
                    tensor[[0, channel, y, x]] =
                        (f32::from(pixel[channel]) / 255.0 - mean[channel]) / std[channel];
                }
            }
        }

        tensor
    }
}

/// Model output to mask conversion
pub struct MaskPostprocessor;

impl MaskPostprocessor {
    /// Decode an output tensor into a mask resized to `dimensions`
    ///
    /// # Errors
    /// - Output tensor is not `1 x C x H x W`
    /// - Class decoding requested on a single-channel output
    pub fn tensor_to_mask(
        tensor: &Array4<f32>,
        decoding: MaskDecoding,
        dimensions: (u32, u32),
    ) -> Result<GrayImage> {
        let (batch, channels, height, width) = tensor.dim();
        if batch != 1 || channels == 0 || height == 0 || width == 0 {
            return Err(RemoverError::unexpected(format!(
                "Invalid output tensor shape {:?}",
                tensor.shape()
            )));
        }

        let model_mask = match decoding {
            MaskDecoding::Saliency => Self::saliency_mask(tensor, width, height),
            MaskDecoding::ClassArgmax => {
                if channels < 2 {
                    return Err(RemoverError::unexpected(format!(
                        "Class decoding needs at least 2 channels, got {}",
                        channels
                    )));
                }
                Self::class_mask(tensor, width, height)
            },
        };

        let (target_width, target_height) = dimensions;
        if model_mask.dimensions() == dimensions {
            return Ok(model_mask);
        }
        Ok(image::imageops::resize(
            &model_mask,
            target_width,
            target_height,
            image::imageops::FilterType::Triangle,
        ))
    }

    fn saliency_mask(tensor: &Array4<f32>, width: usize, height: usize) -> GrayImage {
        let plane = tensor.slice(ndarray::s![0, 0, .., ..]);
        let (min, max) = plane
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = if (max - min).abs() > f32::EPSILON {
            max - min
        } else {
            1.0
        };

        ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
            let value = plane
                .get([y as usize, x as usize])
                .copied()
                .unwrap_or(min);
            Luma([(((value - min) / range).clamp(0.0, 1.0) * 255.0) as u8])
        })
    }

    fn class_mask(tensor: &Array4<f32>, width: usize, height: usize) -> GrayImage {
        let channels = tensor.dim().1;
        ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
            let (x, y) = (x as usize, y as usize);
            let mut best_class = 0;
            let mut best_score = f32::NEG_INFINITY;
            for class in 0..channels {
                let score = tensor
                    .get([0, class, y, x])
                    .copied()
                    .unwrap_or(f32::NEG_INFINITY);
                if score > best_score {
                    best_score = score;
                    best_class = class;
                }
            }
            Luma([if best_class == 0 { 0 } else { 255 }])
        })
    }

    /// Use `mask` as the alpha channel of `image`; zero-alpha pixels become fully transparent
    ///
    /// # Errors
    /// - Mask dimensions differ from the image
    pub fn apply_mask(image: &DynamicImage, mask: &GrayImage) -> Result<RgbaImage> {
        let rgba_image = image.to_rgba8();
        if rgba_image.dimensions() != mask.dimensions() {
            return Err(RemoverError::unexpected(format!(
                "Mask dimensions {:?} do not match image {:?}",
                mask.dimensions(),
                rgba_image.dimensions()
            )));
        }

        let (width, height) = rgba_image.dimensions();
        let mut result = RgbaImage::new(width, height);
        for (x, y, pixel) in rgba_image.enumerate_pixels() {
            let alpha = mask.get_pixel(x, y)[0];
            if alpha > 0 {
                result.put_pixel(x, y, Rgba([pixel[0], pixel[1], pixel[2], alpha]));
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(target_size: u32) -> PreprocessingConfig {
        PreprocessingConfig {
            target_size,
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [0.5, 0.5, 0.5],
        }
    }

    #[test]
    fn test_preprocess_shape_and_normalization() {
        let image = RgbImage::from_pixel(40, 20, image::Rgb([255, 0, 255]));
        let tensor = ImagePreprocessor::preprocess_for_inference(&image, &config(16));

        assert_eq!(tensor.dim(), (1, 3, 16, 16));
        assert!((tensor[[0, 0, 8, 8]] - 1.0).abs() < 0.02);
        assert!((tensor[[0, 1, 8, 8]] + 1.0).abs() < 0.02);
        assert!((tensor[[0, 2, 8, 8]] - 1.0).abs() < 0.02);
    }

    #[test]
    fn test_saliency_mask_is_min_max_normalized() {
        let mut tensor = Array4::<f32>::zeros((1, 1, 2, 2));
        tensor[[0, 0, 0, 0]] = -3.0;
        tensor[[0, 0, 1, 1]] = 5.0;

        let mask = MaskPostprocessor::tensor_to_mask(&tensor, MaskDecoding::Saliency, (2, 2))
            .unwrap();
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
        assert_eq!(mask.get_pixel(1, 1)[0], 255);
    }

    #[test]
    fn test_flat_saliency_map_does_not_divide_by_zero() {
        let tensor = Array4::<f32>::from_elem((1, 1, 3, 3), 0.7);
        let mask = MaskPostprocessor::tensor_to_mask(&tensor, MaskDecoding::Saliency, (3, 3))
            .unwrap();
        assert!(mask.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_class_mask_marks_non_background() {
        let mut tensor = Array4::<f32>::zeros((1, 4, 1, 2));
        tensor[[0, 0, 0, 0]] = 1.0; // background wins
        tensor[[0, 2, 0, 1]] = 1.0; // lower-body class wins

        let mask = MaskPostprocessor::tensor_to_mask(&tensor, MaskDecoding::ClassArgmax, (2, 1))
            .unwrap();
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
        assert_eq!(mask.get_pixel(1, 0)[0], 255);
    }

    #[test]
    fn test_mask_resized_to_source_dimensions() {
        let tensor = Array4::<f32>::from_elem((1, 2, 4, 4), 0.0);
        let mask = MaskPostprocessor::tensor_to_mask(&tensor, MaskDecoding::ClassArgmax, (10, 6))
            .unwrap();
        assert_eq!(mask.dimensions(), (10, 6));
    }

    #[test]
    fn test_invalid_tensor_shapes() {
        let tensor = Array4::<f32>::zeros((2, 1, 4, 4));
        assert!(MaskPostprocessor::tensor_to_mask(&tensor, MaskDecoding::Saliency, (4, 4)).is_err());

        let tensor = Array4::<f32>::zeros((1, 1, 4, 4));
        assert!(
            MaskPostprocessor::tensor_to_mask(&tensor, MaskDecoding::ClassArgmax, (4, 4)).is_err()
        );
    }

    #[test]
    fn test_apply_mask() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 1, image::Rgb([10, 20, 30])));
        let mut mask = GrayImage::new(2, 1);
        mask.put_pixel(1, 0, Luma([200]));

        let result = MaskPostprocessor::apply_mask(&image, &mask).unwrap();
        assert_eq!(result.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
        assert_eq!(result.get_pixel(1, 0), &Rgba([10, 20, 30, 200]));

        let wrong = GrayImage::new(3, 3);
        assert!(MaskPostprocessor::apply_mask(&image, &wrong).is_err());
    }
}
