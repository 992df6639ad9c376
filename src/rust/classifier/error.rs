use ort::Error as OrtError;
use std::io;
use std::path::PathBuf;

/// Represents the different types of errors that can occur in the text classifier.
///
/// Every error is terminal for the request that raised it. Nothing in the
/// pipeline retries, and no partial predictions are returned alongside an error.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// A resource file (JSON table, model, tokenizer) is missing or unreadable
    #[error("Resource error: failed to read {path:?}: {source}")]
    Resource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A resource was readable but not in the expected JSON shape
    #[error("Parse error in {resource}: {message}")]
    Parse { resource: String, message: String },
    /// The inference engine could not be initialised for the model
    #[error("Model load error: {0}")]
    ModelLoad(String),
    /// The engine ran but its output could not be turned into scores
    #[error("Inference error: {0}")]
    Inference(String),
    /// The pre-trained tokenizer failed to encode the input
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),
    /// Error occurred during the build phase
    #[error("Build error: {0}")]
    Build(String),
    /// A configuration file or value is invalid
    #[error("Config error: {0}")]
    Config(String),
}

impl ClassifierError {
    pub(crate) fn resource(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Resource {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(resource: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            resource: resource.into(),
            message: message.to_string(),
        }
    }
}

impl From<OrtError> for ClassifierError {
    fn from(err: OrtError) -> Self {
        ClassifierError::ModelLoad(err.to_string())
    }
}
