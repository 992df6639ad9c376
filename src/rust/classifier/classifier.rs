use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, warn};

use super::error::ClassifierError;
use super::inference::InferenceAdapter;
use super::tokenizer::Tokenization;
use super::utils::{pad_or_truncate, rank_scores};
use super::vocab::LabelMap;
use super::{Classification, ClassifierInfo, Prediction, StageTimings};
use crate::config::ClassifierConfig;

/// A thread-safe text classifier that feeds fixed-length token sequences to
/// a pre-trained model and ranks the labels by score.
///
/// # Thread Safety
///
/// This type is `Send + Sync`. The label map and tokenizer are read-only after
/// construction, and the inference adapter serializes access to the engine.
/// Share one instance through `Arc`:
///
/// ```rust
/// # use std::sync::Arc;
/// # use tinyclass::{Classifier, ClassifierError, InferenceAdapter, LabelMap, Vocabulary};
/// # #[derive(Debug)]
/// # struct Fixed;
/// # impl InferenceAdapter for Fixed {
/// #     fn run(&self, _: &[i32], _: usize) -> Result<Vec<f32>, ClassifierError> {
/// #         Ok(vec![0.2, 0.8])
/// #     }
/// # }
/// # fn main() -> Result<(), ClassifierError> {
/// let classifier = Arc::new(Classifier::builder()
///     .with_vocabulary(Vocabulary::from_json_str(r#"{"good": 3, "<OOV>": 1}"#, "<OOV>")?)
///     .with_labels(LabelMap::from_labels(["negative", "positive"]))
///     .with_adapter(Arc::new(Fixed))
///     .build()?);
///
/// let shared = Arc::clone(&classifier);
/// std::thread::spawn(move || shared.predict("good movie").unwrap())
///     .join()
///     .unwrap();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Classifier {
    pub(crate) tokenization: Tokenization,
    pub(crate) labels: Arc<LabelMap>,
    pub(crate) adapter: Arc<dyn InferenceAdapter>,
    pub(crate) config: ClassifierConfig,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<Classifier>();
    }
};

impl Classifier {
    /// Creates a new ClassifierBuilder for fluent construction
    pub fn builder() -> super::builder::ClassifierBuilder {
        super::builder::ClassifierBuilder::new()
    }

    /// Returns information about the classifier's current state
    pub fn info(&self) -> ClassifierInfo {
        ClassifierInfo {
            model_path: self
                .adapter
                .model_path()
                .map(|path| path.to_string_lossy().to_string()),
            num_classes: self.labels.class_count(),
            class_labels: self.labels.labels().map(str::to_string).collect(),
            vocabulary_size: self.tokenization.vocabulary().map(|v| v.len()),
            sequence_length: self.config.sequence_length,
            input_name: self.config.input_name.clone(),
            output_name: self.config.output_name.clone(),
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Number of tokens the text produces before padding or truncation
    pub fn count_tokens(&self, text: &str) -> Result<usize, ClassifierError> {
        self.tokenization.encode(text).map(|tokens| tokens.len())
    }

    /// Classifies `text` and returns every label ranked by score.
    ///
    /// The text is tokenized, padded or truncated to the configured sequence
    /// length, run through the model, and the scores are paired with labels
    /// by position and sorted in descending order.
    ///
    /// # Errors
    /// - `Tokenizer` if a pre-trained tokenizer cannot encode the text
    /// - `Inference` if the model run fails or its output is unusable
    /// - `Inference` if `strict_output` is set and the model returns fewer
    ///   scores than there are labels
    pub fn classify(&self, text: &str) -> Result<Classification, ClassifierError> {
        let started = Instant::now();
        let tokens = self
            .tokenization
            .encode(text)
            .map_err(|e| self.log_failure(text, "tokenization", e))?;
        let word_count = tokens.len();
        let sequence = pad_or_truncate(tokens, self.config.sequence_length);
        let preprocessing = started.elapsed();

        let class_count = self.labels.class_count();
        let inference_started = Instant::now();
        let scores = self
            .adapter
            .run(&sequence, class_count)
            .map_err(|e| self.log_failure(text, "inference", e))?;
        let inference = inference_started.elapsed();

        if scores.len() < class_count {
            if self.config.strict_output {
                let err = ClassifierError::Inference(format!(
                    "Model returned {} scores for {} classes",
                    scores.len(),
                    class_count
                ));
                return Err(self.log_failure(text, "decoding", err));
            }
            warn!(
                "Model returned {} scores for {} classes, ranking only the scored labels",
                scores.len(),
                class_count
            );
        }

        let postprocessing_started = Instant::now();
        let predictions = rank_scores(&scores, &self.labels);
        let postprocessing = postprocessing_started.elapsed();

        let timings = StageTimings {
            preprocessing,
            inference,
            postprocessing,
        };
        debug!(
            "Classified {} words into {} predictions in {:.2?}",
            word_count,
            predictions.len(),
            timings.total()
        );

        Ok(Classification {
            predictions,
            timings: self.config.record_timings.then_some(timings),
        })
    }

    /// Predicts the class of the input text.
    ///
    /// # Returns
    /// A tuple containing:
    /// * The best label, or `"unknown"` when the model produced no scores
    /// * All predictions sorted by descending score
    pub fn predict(&self, text: &str) -> Result<(String, Vec<Prediction>), ClassifierError> {
        let classification = self.classify(text)?;
        let best = classification
            .best()
            .map(|prediction| prediction.label.clone())
            .unwrap_or_else(|| "unknown".to_string());
        Ok((best, classification.predictions))
    }

    /// Runs [`Classifier::classify`] on tokio's blocking pool, keeping the
    /// calling task free while the model runs.
    ///
    /// Requests are independent: several may be in flight at once, and each
    /// runs to completion.
    pub async fn classify_in_background(
        self: &Arc<Self>,
        text: impl Into<String>,
    ) -> Result<Classification, ClassifierError> {
        let classifier = Arc::clone(self);
        let text = text.into();
        tokio::task::spawn_blocking(move || classifier.classify(&text))
            .await
            .map_err(|e| ClassifierError::Inference(format!("Classification task failed: {}", e)))?
    }

    fn log_failure(&self, text: &str, stage: &str, err: ClassifierError) -> ClassifierError {
        const PREVIEW_CHARS: usize = 40;
        let preview: String = text.chars().take(PREVIEW_CHARS).collect();
        error!("Classification of {:?} failed during {}: {}", preview, stage, err);
        err
    }
}
