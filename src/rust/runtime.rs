use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::Result as OrtResult;
use serde::Deserialize;
use std::sync::OnceLock;

use crate::classifier::ClassifierError;

static INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Graph optimisation level applied when the session is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationLevel {
    Disable,
    Level1,
    Level2,
    #[default]
    Level3,
}

impl From<OptimizationLevel> for GraphOptimizationLevel {
    fn from(level: OptimizationLevel) -> Self {
        match level {
            OptimizationLevel::Disable => GraphOptimizationLevel::Disable,
            OptimizationLevel::Level1 => GraphOptimizationLevel::Level1,
            OptimizationLevel::Level2 => GraphOptimizationLevel::Level2,
            OptimizationLevel::Level3 => GraphOptimizationLevel::Level3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub inter_threads: usize,
    pub intra_threads: usize,
    pub optimization_level: OptimizationLevel,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            inter_threads: 0, // Let ONNX Runtime decide
            intra_threads: 0, // Let ONNX Runtime decide
            optimization_level: OptimizationLevel::Level3,
        }
    }
}

fn init_onnx_environment() -> OrtResult<()> {
    ort::init()
        .with_name("tinyclass")
        .commit()?;
    Ok(())
}

/// Initialises the process-wide ONNX Runtime environment once.
///
/// A failed initialisation is remembered and reported to every later caller.
pub fn ensure_initialized() -> Result<(), ClassifierError> {
    INIT.get_or_init(|| {
        init_onnx_environment().map_err(|e| {
            log::error!("Failed to initialize ONNX Runtime environment: {}", e);
            e.to_string()
        })
    })
    .clone()
    .map_err(ClassifierError::ModelLoad)
}

pub fn create_session_builder(config: &RuntimeConfig) -> Result<SessionBuilder, ClassifierError> {
    ensure_initialized()?;
    let mut builder = Session::builder()?;

    if config.inter_threads > 0 {
        builder = builder.with_inter_threads(config.inter_threads)?;
    }
    if config.intra_threads > 0 {
        builder = builder.with_intra_threads(config.intra_threads)?;
    }
    builder = builder.with_optimization_level(config.optimization_level.into())?;

    Ok(builder)
}
