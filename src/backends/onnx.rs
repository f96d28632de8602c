//! ONNX Runtime session provider
//!
//! Resolves `<models_dir>/<model>.onnx`, builds an ONNX Runtime session with
//! the configured execution provider, and wraps it as a [`SegmentationSession`].

use crate::{
    config::{ExecutionProvider, RegistryConfig},
    error::{RemoverError, Result},
    inference::{SegmentationSession, SessionProvider},
    models::ModelDescriptor,
    utils::{ImagePreprocessor, MaskPostprocessor},
};
use image::{GrayImage, RgbImage};
use instant::Instant;
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Session provider backed by ONNX Runtime
#[derive(Debug, Clone)]
pub struct OnnxSessionProvider {
    models_dir: PathBuf,
    execution_provider: ExecutionProvider,
    intra_threads: usize,
}

impl OnnxSessionProvider {
    #[must_use]
    pub fn new(models_dir: PathBuf, execution_provider: ExecutionProvider) -> Self {
        Self {
            models_dir,
            execution_provider,
            intra_threads: 0,
        }
    }

    /// Build a provider from registry settings
    ///
    /// # Errors
    /// - Model directory cannot be determined
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        Ok(Self {
            models_dir: config.resolved_models_dir()?,
            execution_provider: config.execution_provider,
            intra_threads: config.intra_threads,
        })
    }

    #[must_use]
    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = threads;
        self
    }

    fn inference_error(stage: &str, e: &ort::Error) -> RemoverError {
        RemoverError::unexpected(format!("ONNX Runtime failed to {}: {}", stage, e))
    }

    fn build_session(&self, model_path: &std::path::Path) -> Result<Session> {
        let mut builder = Session::builder()
            .map_err(|e| Self::inference_error("create session builder", &e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| Self::inference_error("set optimization level", &e))?;

        let mut providers = Vec::new();
        if matches!(
            self.execution_provider,
            ExecutionProvider::Auto | ExecutionProvider::Cuda
        ) {
            let cuda = CUDAExecutionProvider::default();
            if OrtExecutionProvider::is_available(&cuda).unwrap_or(false) {
                info!("Using CUDA execution provider");
                providers.push(cuda.build());
            } else if self.execution_provider == ExecutionProvider::Cuda {
                warn!("CUDA execution provider requested but not available, falling back to CPU");
            }
        }
        if matches!(
            self.execution_provider,
            ExecutionProvider::Auto | ExecutionProvider::CoreMl
        ) {
            let coreml = CoreMLExecutionProvider::default();
            if OrtExecutionProvider::is_available(&coreml).unwrap_or(false) {
                info!("Using CoreML execution provider");
                providers.push(coreml.with_subgraphs(true).build());
            } else if self.execution_provider == ExecutionProvider::CoreMl {
                warn!("CoreML execution provider requested but not available, falling back to CPU");
            }
        }
        if !providers.is_empty() {
            builder = builder
                .with_execution_providers(providers)
                .map_err(|e| Self::inference_error("set execution providers", &e))?;
        }

        let intra_threads = if self.intra_threads > 0 {
            self.intra_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4)
        };

        builder
            .with_intra_threads(intra_threads)
            .map_err(|e| Self::inference_error("set intra threads", &e))?
            .commit_from_file(model_path)
            .map_err(|e| Self::inference_error("load model", &e))
    }
}

impl SessionProvider for OnnxSessionProvider {
    fn acquire(&self, model_name: &str) -> Result<Box<dyn SegmentationSession>> {
        let descriptor = ModelDescriptor::lookup(model_name).ok_or_else(|| {
            RemoverError::invalid_config(format!("Unknown segmentation model '{}'", model_name))
        })?;

        let model_path = self.models_dir.join(descriptor.file_name());
        if !model_path.is_file() {
            return Err(RemoverError::file_io_error(
                "open model file",
                &model_path,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        let load_start = Instant::now();
        let session = self.build_session(&model_path)?;
        info!(
            model = model_name,
            provider = %self.execution_provider,
            load_ms = load_start.elapsed().as_millis() as u64,
            "ONNX session created"
        );

        Ok(Box::new(OnnxSegmentationSession {
            session,
            descriptor,
        }))
    }

    fn runtime_name(&self) -> &'static str {
        "onnx"
    }
}

/// A live ONNX Runtime session for one model
pub struct OnnxSegmentationSession {
    session: Session,
    descriptor: &'static ModelDescriptor,
}

impl OnnxSegmentationSession {
    fn infer(&mut self, input: Array4<f32>) -> Result<Array4<f32>> {
        let input_value = Value::from_array(input).map_err(|e| {
            RemoverError::unexpected(format!("Failed to convert input tensor: {e}"))
        })?;

        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(|e| RemoverError::unexpected(format!("ONNX inference failed: {e}")))?;

        let keys: Vec<_> = outputs.keys().collect();
        let first_key = keys
            .first()
            .ok_or_else(|| RemoverError::unexpected("No output tensors found"))?;
        let output = outputs
            .get(first_key)
            .ok_or_else(|| RemoverError::unexpected("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| RemoverError::unexpected(format!("Failed to extract output tensor: {e}")))?;

        let shape = output.shape().to_vec();
        let [batch, channels, height, width] = shape.as_slice() else {
            return Err(RemoverError::unexpected(format!(
                "Expected 4D output tensor, got {}D",
                shape.len()
            )));
        };
        let data: Vec<f32> = output.iter().copied().collect();

        Array4::from_shape_vec((*batch, *channels, *height, *width), data)
            .map_err(|e| RemoverError::unexpected(format!("Failed to reshape output tensor: {e}")))
    }
}

impl SegmentationSession for OnnxSegmentationSession {
    fn predict_mask(&mut self, image: &RgbImage) -> Result<GrayImage> {
        let start = Instant::now();
        let input = ImagePreprocessor::preprocess_for_inference(image, &self.descriptor.preprocessing);
        let output = self.infer(input)?;
        let mask =
            MaskPostprocessor::tensor_to_mask(&output, self.descriptor.decoding, image.dimensions())?;

        debug!(
            model = self.descriptor.name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Mask predicted"
        );
        Ok(mask)
    }

    fn model_name(&self) -> &str {
        self.descriptor.name
    }
}
