use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;

use super::classifier::Classifier;
use super::error::ClassifierError;
use super::inference::{InferenceAdapter, OnnxAdapter};
use super::tokenizer::{Tokenization, WordTokenizer};
use super::vocab::{LabelMap, Vocabulary};
use crate::config::ClassifierConfig;
use crate::model_store::ModelBundle;
use crate::runtime::RuntimeConfig;

/// Where the word vocabulary comes from
#[derive(Debug)]
enum VocabularySource {
    Loaded(Arc<Vocabulary>),
    File(PathBuf),
}

/// A builder for constructing a Classifier with a fluent interface.
///
/// Resources that depend on the configuration (the vocabulary file, which
/// needs the OOV token, and the model file, which needs the tensor names and
/// runtime settings) are loaded in [`ClassifierBuilder::build`], so
/// `with_config` may be called in any order.
#[derive(Default, Debug)]
pub struct ClassifierBuilder {
    config: ClassifierConfig,
    vocabulary: Option<VocabularySource>,
    pretrained: Option<Tokenization>,
    labels: Option<Arc<LabelMap>>,
    model_path: Option<PathBuf>,
    adapter: Option<Arc<dyn InferenceAdapter>>,
}

impl ClassifierBuilder {
    /// Creates a new empty ClassifierBuilder instance with default configuration
    ///
    /// # Example
    /// ```
    /// use tinyclass::ClassifierBuilder;
    ///
    /// let builder = ClassifierBuilder::new();
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ClassifierConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the runtime configuration for ONNX model execution
    ///
    /// # Example
    /// ```
    /// use tinyclass::{ClassifierBuilder, RuntimeConfig};
    ///
    /// let config = RuntimeConfig::default();
    /// let builder = ClassifierBuilder::new()
    ///     .with_runtime_config(config);
    /// ```
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.config.runtime = config;
        self
    }

    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = Some(VocabularySource::Loaded(Arc::new(vocabulary)));
        self
    }

    /// Reads the vocabulary JSON when the classifier is built.
    pub fn with_vocabulary_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.vocabulary = Some(VocabularySource::File(path.as_ref().to_path_buf()));
        self
    }

    /// Tokenizes with a pre-trained `tokenizer.json` instead of a word
    /// vocabulary. Takes precedence over any vocabulary.
    pub fn with_pretrained_tokenizer<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ClassifierError> {
        self.pretrained = Some(Tokenization::pretrained_from_file(path)?);
        Ok(self)
    }

    pub fn with_labels(mut self, labels: LabelMap) -> Self {
        self.labels = Some(Arc::new(labels));
        self
    }

    pub fn with_labels_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ClassifierError> {
        self.labels = Some(Arc::new(LabelMap::from_file(path)?));
        Ok(self)
    }

    /// Sets the ONNX model to run. The session is created in `build`.
    ///
    /// # Errors
    /// - `Build` if the path is empty or a model was already set
    /// - `ModelLoad` if the file does not exist
    pub fn with_model_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(ClassifierError::Build("Model path cannot be empty".to_string()));
        }
        if self.model_path.is_some() || self.adapter.is_some() {
            return Err(ClassifierError::Build("Model already set".to_string()));
        }
        if !path.exists() {
            return Err(ClassifierError::ModelLoad(format!("Model file not found: {}", path.display())));
        }
        self.model_path = Some(path.to_path_buf());
        Ok(self)
    }

    /// Uses an already constructed inference adapter, replacing any model file.
    pub fn with_adapter(mut self, adapter: Arc<dyn InferenceAdapter>) -> Self {
        self.model_path = None;
        self.adapter = Some(adapter);
        self
    }

    /// Configures model, labels and tokenizer from a bundle directory.
    ///
    /// # Errors
    /// - `ModelLoad` if the directory lacks the model or its metadata files
    /// - `Build` if a model was already set
    /// - `Resource`/`Parse` if the label map cannot be read
    pub fn with_bundle<P: AsRef<Path>>(self, dir: P) -> Result<Self, ClassifierError> {
        let bundle = ModelBundle::from_dir(dir)?;
        let builder = self
            .with_model_file(&bundle.model)?
            .with_labels_file(&bundle.labels)?;
        match (&bundle.vocabulary, &bundle.tokenizer) {
            (Some(vocabulary), _) => Ok(builder.with_vocabulary_file(vocabulary)),
            (None, Some(tokenizer)) => builder.with_pretrained_tokenizer(tokenizer),
            (None, None) => Err(ClassifierError::ModelLoad(format!(
                "Bundle {} has neither a vocabulary nor a tokenizer",
                bundle.dir.display()
            ))),
        }
    }

    /// Builds and returns the final Classifier instance
    ///
    /// # Errors
    /// - `Config` if the configuration is invalid
    /// - `Build` if no label map, tokenizer or model was provided, or the
    ///   label map is empty
    /// - `Resource`/`Parse` if the vocabulary file cannot be loaded
    /// - `ModelLoad` if the model cannot be loaded
    pub fn build(self) -> Result<Classifier, ClassifierError> {
        self.config.validate()?;

        let labels = self
            .labels
            .ok_or_else(|| ClassifierError::Build("A label map must be set".to_string()))?;
        if labels.is_empty() {
            return Err(ClassifierError::Build("Label map has no classes".to_string()));
        }

        let tokenization = match (self.pretrained, self.vocabulary) {
            (Some(pretrained), _) => pretrained,
            (None, Some(source)) => {
                let vocabulary = match source {
                    VocabularySource::Loaded(vocabulary) => vocabulary,
                    VocabularySource::File(path) => {
                        Arc::new(Vocabulary::from_file(&path, &self.config.oov_token)?)
                    }
                };
                Tokenization::Vocabulary(WordTokenizer::new(vocabulary, self.config.split_mode))
            }
            (None, None) => {
                return Err(ClassifierError::Build(
                    "A vocabulary or pre-trained tokenizer must be set".to_string(),
                ))
            }
        };

        let adapter: Arc<dyn InferenceAdapter> = match (self.adapter, self.model_path) {
            (Some(adapter), _) => adapter,
            (None, Some(path)) => Arc::new(OnnxAdapter::from_file(
                &path,
                &self.config.input_name,
                &self.config.output_name,
                &self.config.runtime,
            )?),
            (None, None) => {
                return Err(ClassifierError::Build("A model or inference adapter must be set".to_string()))
            }
        };

        info!(
            "Classifier ready: {} classes, sequence length {}",
            labels.class_count(),
            self.config.sequence_length
        );

        Ok(Classifier {
            tokenization,
            labels,
            adapter,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Uniform;

    impl InferenceAdapter for Uniform {
        fn run(&self, _tokens: &[i32], class_count: usize) -> Result<Vec<f32>, ClassifierError> {
            Ok(vec![1.0 / class_count as f32; class_count])
        }
    }

    fn vocabulary() -> Vocabulary {
        Vocabulary::from_json_str(r#"{"good": 3, "<OOV>": 1}"#, "<OOV>").unwrap()
    }

    #[test]
    fn test_requires_labels() {
        let result = ClassifierBuilder::new()
            .with_vocabulary(vocabulary())
            .with_adapter(Arc::new(Uniform))
            .build();
        assert!(matches!(result, Err(ClassifierError::Build(_))));
    }

    #[test]
    fn test_requires_non_empty_labels() {
        let result = ClassifierBuilder::new()
            .with_vocabulary(vocabulary())
            .with_labels(LabelMap::default())
            .with_adapter(Arc::new(Uniform))
            .build();
        assert!(matches!(result, Err(ClassifierError::Build(_))));
    }

    #[test]
    fn test_requires_tokenizer() {
        let result = ClassifierBuilder::new()
            .with_labels(LabelMap::from_labels(["a", "b"]))
            .with_adapter(Arc::new(Uniform))
            .build();
        assert!(matches!(result, Err(ClassifierError::Build(_))));
    }

    #[test]
    fn test_requires_model() {
        let result = ClassifierBuilder::new()
            .with_vocabulary(vocabulary())
            .with_labels(LabelMap::from_labels(["a", "b"]))
            .build();
        assert!(matches!(result, Err(ClassifierError::Build(_))));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = ClassifierConfig {
            sequence_length: 0,
            ..ClassifierConfig::default()
        };
        let result = ClassifierBuilder::new()
            .with_config(config)
            .with_vocabulary(vocabulary())
            .with_labels(LabelMap::from_labels(["a", "b"]))
            .with_adapter(Arc::new(Uniform))
            .build();
        assert!(matches!(result, Err(ClassifierError::Config(_))));
    }

    #[test]
    fn test_model_file_validation() {
        assert!(matches!(
            ClassifierBuilder::new().with_model_file(""),
            Err(ClassifierError::Build(_))
        ));
        assert!(matches!(
            ClassifierBuilder::new().with_model_file("/no/such/model.onnx"),
            Err(ClassifierError::ModelLoad(_))
        ));
    }

    #[test]
    fn test_vocabulary_file_uses_configured_oov_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.json");
        std::fs::write(&path, r#"{"good": 3, "[UNK]": 9}"#).unwrap();

        // with_config after with_vocabulary_file still applies
        let classifier = ClassifierBuilder::new()
            .with_vocabulary_file(&path)
            .with_config(ClassifierConfig {
                oov_token: "[UNK]".to_string(),
                ..ClassifierConfig::default()
            })
            .with_labels(LabelMap::from_labels(["a", "b"]))
            .with_adapter(Arc::new(Uniform))
            .build()
            .unwrap();
        assert_eq!(classifier.tokenization.encode("good bad").unwrap(), vec![3, 9]);
    }

    #[test]
    fn test_missing_vocabulary_file_fails_build() {
        let result = ClassifierBuilder::new()
            .with_vocabulary_file("/no/such/vocab.json")
            .with_labels(LabelMap::from_labels(["a", "b"]))
            .with_adapter(Arc::new(Uniform))
            .build();
        assert!(matches!(result, Err(ClassifierError::Resource { .. })));
    }
}
