//! A thread-safe text classifier that runs pre-trained ONNX models over
//! fixed-length word token sequences.
//!
//! A classifier is assembled from a vocabulary (`vocab.json`, word → id),
//! a label map (`labels.json`, class index → label) and a model. Input text
//! is lower-cased, split into words, mapped to ids, padded or truncated to
//! the model's sequence length, and the model's scores come back ranked.
//!
//! # Basic Usage
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use tinyclass::{Classifier, format_summary};
//!
//! // A directory holding model.onnx, vocab.json and labels.json
//! let classifier = Classifier::builder()
//!     .with_bundle("models/sentiment")?
//!     .build()?;
//!
//! let classification = classifier.classify("This is a great movie!")?;
//! println!(
//!     "{}",
//!     format_summary(&classification.predictions, "This is a great movie!", classification.timings.as_ref())
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Testing without a model
//!
//! The engine sits behind the [`InferenceAdapter`] trait, so any type that
//! produces scores can stand in for it:
//!
//! ```rust
//! # use std::sync::Arc;
//! use tinyclass::{Classifier, ClassifierError, InferenceAdapter, LabelMap, Vocabulary};
//!
//! #[derive(Debug)]
//! struct Fixed(Vec<f32>);
//!
//! impl InferenceAdapter for Fixed {
//!     fn run(&self, _tokens: &[i32], class_count: usize) -> Result<Vec<f32>, ClassifierError> {
//!         Ok(self.0.iter().copied().take(class_count).collect())
//!     }
//! }
//!
//! # fn main() -> Result<(), ClassifierError> {
//! let classifier = Classifier::builder()
//!     .with_vocabulary(Vocabulary::from_json_str(r#"{"good": 3, "<OOV>": 1}"#, "<OOV>")?)
//!     .with_labels(LabelMap::from_json_str(r#"{"0": "negative", "1": "positive"}"#)?)
//!     .with_adapter(Arc::new(Fixed(vec![0.2, 0.8])))
//!     .build()?;
//!
//! let (label, ranked) = classifier.predict("good good")?;
//! assert_eq!(label, "positive");
//! assert_eq!(ranked[1].label, "negative");
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod config;
pub mod model_store;
mod runtime;

pub use classifier::{
    format_summary, load_resources, pad_or_truncate, rank_scores, Classification, Classifier,
    ClassifierBuilder, ClassifierError, ClassifierInfo, InferenceAdapter, LabelMap, OnnxAdapter,
    PerformanceRating, Prediction, StageTimings, Tokenization, Vocabulary, WordTokenizer,
};
pub use config::{ClassifierConfig, SplitMode};
pub use model_store::{BundleManifest, ModelBundle, ModelStore, StoreError};
pub use runtime::{create_session_builder, OptimizationLevel, RuntimeConfig};

pub fn init_logger() {
    env_logger::init();
}
