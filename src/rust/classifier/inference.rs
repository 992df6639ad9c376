use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, error, info};
use ndarray::Array2;
use ort::session::Session;
use ort::value::Tensor;

use super::error::ClassifierError;
use crate::runtime::{create_session_builder, RuntimeConfig};

/// Boundary between the classification pipeline and the engine that
/// executes the model.
///
/// The pipeline hands over one normalized token sequence, which the adapter
/// feeds to the model as an `int32` tensor of shape `[1, L]`. It returns the
/// model's scores as `f32`, position `i` belonging to class index `i`, cut to
/// at most `class_count` values. It may return fewer when the model's output
/// is shorter.
///
/// Implementations must be shareable across threads. Test doubles implement
/// this trait directly to exercise the pipeline without a model file.
pub trait InferenceAdapter: Send + Sync + Debug {
    fn run(&self, tokens: &[i32], class_count: usize) -> Result<Vec<f32>, ClassifierError>;

    /// Path of the model artifact, if the adapter was loaded from one
    fn model_path(&self) -> Option<&Path> {
        None
    }
}

/// Runs a serialized ONNX model through ONNX Runtime.
///
/// The session sits behind a mutex, so concurrent requests sharing one
/// adapter take turns at the engine.
#[derive(Debug)]
pub struct OnnxAdapter {
    session: Mutex<Session>,
    model_path: PathBuf,
    input_name: String,
    output_name: String,
}

impl OnnxAdapter {
    /// Loads a model and checks that it exposes the named input and output.
    ///
    /// # Errors
    /// - `ModelLoad` if the model file does not exist
    /// - `ModelLoad` if ONNX Runtime cannot create a session for it
    /// - `ModelLoad` if the input or output tensor name is absent
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        input_name: &str,
        output_name: &str,
        runtime_config: &RuntimeConfig,
    ) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ClassifierError::ModelLoad(format!(
                "Model file not found: {}",
                path.display()
            )));
        }

        let session = create_session_builder(runtime_config)?
            .commit_from_file(path)
            .map_err(|e| {
                error!("Failed to load model {:?}: {}", path, e);
                ClassifierError::ModelLoad(format!("Failed to load model {}: {}", path.display(), e))
            })?;

        Self::validate_model(&session, input_name, output_name)?;
        info!("Model loaded and validated from {:?}", path);

        Ok(Self {
            session: Mutex::new(session),
            model_path: path.to_path_buf(),
            input_name: input_name.to_string(),
            output_name: output_name.to_string(),
        })
    }

    /// Validates that the model has the configured input and output tensors
    fn validate_model(session: &Session, input_name: &str, output_name: &str) -> Result<(), ClassifierError> {
        if !session.inputs.iter().any(|input| input.name == input_name) {
            let found: Vec<&str> = session.inputs.iter().map(|i| i.name.as_str()).collect();
            return Err(ClassifierError::ModelLoad(format!(
                "Model has no input named '{}' (found {:?})",
                input_name, found
            )));
        }
        if !session.outputs.iter().any(|output| output.name == output_name) {
            let found: Vec<&str> = session.outputs.iter().map(|o| o.name.as_str()).collect();
            return Err(ClassifierError::ModelLoad(format!(
                "Model has no output named '{}' (found {:?})",
                output_name, found
            )));
        }
        Ok(())
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }
}

impl InferenceAdapter for OnnxAdapter {
    fn run(&self, tokens: &[i32], class_count: usize) -> Result<Vec<f32>, ClassifierError> {
        let input_array = Array2::from_shape_vec((1, tokens.len()), tokens.to_vec())
            .map_err(|e| ClassifierError::Inference(format!("Failed to create input array: {}", e)))?;
        let input_tensor = Tensor::from_array(input_array)
            .map_err(|e| ClassifierError::Inference(format!("Failed to create input tensor: {}", e)))?;

        let mut input_tensors = HashMap::new();
        input_tensors.insert(self.input_name.as_str(), input_tensor);

        let session = self
            .session
            .lock()
            .map_err(|_| ClassifierError::Inference("Model session lock poisoned".into()))?;
        let outputs = session
            .run(input_tensors)
            .map_err(|e| ClassifierError::Inference(format!("Failed to run model: {}", e)))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            ClassifierError::Inference(format!("Model output '{}' missing from run result", self.output_name))
        })?;
        let scores = output.try_extract_tensor::<f32>().map_err(|e| {
            ClassifierError::Inference(format!(
                "Model output '{}' is not an f32 tensor: {}",
                self.output_name, e
            ))
        })?;

        debug!("Model returned {} scores (shape {:?})", scores.len(), scores.shape());
        Ok(scores.iter().copied().take(class_count).collect())
    }

    fn model_path(&self) -> Option<&Path> {
        Some(&self.model_path)
    }
}
