//! Catalog of pretrained segmentation models understood by the delegated backend

use serde::Serialize;

/// How a model's output tensor becomes a foreground mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskDecoding {
    /// Single-channel saliency map, min-max normalized
    Saliency,
    /// Per-class logits; every non-background class is foreground
    ClassArgmax,
}

/// Preprocessing parameters for a model
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PreprocessingConfig {
    /// Square input edge in pixels
    pub target_size: u32,
    /// Per-channel mean (RGB, 0-1 range)
    pub normalization_mean: [f32; 3],
    /// Per-channel standard deviation (RGB, 0-1 range)
    pub normalization_std: [f32; 3],
}

/// Static description of a supported model
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelDescriptor {
    pub name: &'static str,
    pub preprocessing: PreprocessingConfig,
    pub decoding: MaskDecoding,
}

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

const fn imagenet(target_size: u32) -> PreprocessingConfig {
    PreprocessingConfig {
        target_size,
        normalization_mean: IMAGENET_MEAN,
        normalization_std: IMAGENET_STD,
    }
}

/// Models with known preprocessing and output layout
pub const KNOWN_MODELS: &[ModelDescriptor] = &[
    ModelDescriptor {
        name: "u2net_cloth_seg",
        preprocessing: imagenet(768),
        decoding: MaskDecoding::ClassArgmax,
    },
    ModelDescriptor {
        name: "u2net",
        preprocessing: imagenet(320),
        decoding: MaskDecoding::Saliency,
    },
    ModelDescriptor {
        name: "u2netp",
        preprocessing: imagenet(320),
        decoding: MaskDecoding::Saliency,
    },
    ModelDescriptor {
        name: "silueta",
        preprocessing: imagenet(320),
        decoding: MaskDecoding::Saliency,
    },
    ModelDescriptor {
        name: "isnet-general-use",
        preprocessing: PreprocessingConfig {
            target_size: 1024,
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [1.0, 1.0, 1.0],
        },
        decoding: MaskDecoding::Saliency,
    },
];

impl ModelDescriptor {
    /// Look up a model by name
    #[must_use]
    pub fn lookup(name: &str) -> Option<&'static ModelDescriptor> {
        KNOWN_MODELS.iter().find(|m| m.name == name)
    }

    /// File name the model is expected under in the model directory
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.onnx", self.name)
    }
}
