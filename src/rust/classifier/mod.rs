use std::time::Duration;

mod error;
mod classifier;
pub mod builder;
pub mod inference;
pub mod report;
pub mod tokenizer;
pub mod utils;
pub mod vocab;

pub use error::ClassifierError;
pub use classifier::Classifier;
pub use builder::ClassifierBuilder;
pub use inference::{InferenceAdapter, OnnxAdapter};
pub use report::{format_summary, PerformanceRating};
pub use tokenizer::{Tokenization, WordTokenizer};
pub use utils::{pad_or_truncate, rank_scores};
pub use vocab::{load_resources, LabelMap, Vocabulary};

/// One label with the score the model gave it
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Position of the score in the model output, which is also the label map index
    pub index: usize,
    pub label: String,
    pub score: f32,
}

/// Wall-clock time spent in each stage of one classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageTimings {
    /// Tokenizing and padding the input
    pub preprocessing: Duration,
    /// Running the model
    pub inference: Duration,
    /// Decoding and ranking the scores
    pub postprocessing: Duration,
}

impl StageTimings {
    pub fn total(&self) -> Duration {
        self.preprocessing + self.inference + self.postprocessing
    }
}

/// Result of classifying one text
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Predictions sorted by descending score
    pub predictions: Vec<Prediction>,
    /// Present when the classifier records timings
    pub timings: Option<StageTimings>,
}

impl Classification {
    pub fn best(&self) -> Option<&Prediction> {
        self.predictions.first()
    }

    pub fn top_k(&self, k: usize) -> &[Prediction] {
        &self.predictions[..k.min(self.predictions.len())]
    }
}

/// Information about the current state and configuration of a classifier
#[derive(Debug, Clone)]
pub struct ClassifierInfo {
    /// Path to the model file, when loaded from disk
    pub model_path: Option<String>,
    /// Number of classes in the label map
    pub num_classes: usize,
    /// Labels in index order
    pub class_labels: Vec<String>,
    /// Number of vocabulary entries, when tokenizing with a word vocabulary
    pub vocabulary_size: Option<usize>,
    /// Fixed length of the token sequence fed to the model
    pub sequence_length: usize,
    pub input_name: String,
    pub output_name: String,
}
