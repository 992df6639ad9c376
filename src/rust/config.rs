use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::classifier::ClassifierError;
use crate::runtime::RuntimeConfig;

/// Sequence length the bundled sentiment models were exported with.
pub const DEFAULT_SEQUENCE_LENGTH: usize = 30;
pub const DEFAULT_INPUT_NAME: &str = "input";
pub const DEFAULT_OUTPUT_NAME: &str = "output";
pub const DEFAULT_OOV_TOKEN: &str = "<OOV>";

/// How the word tokenizer finds word boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMode {
    /// Split on the space character only. Tabs and newlines stay inside words.
    #[default]
    SingleSpace,
    /// Split on any Unicode whitespace.
    Whitespace,
}

/// Settings for a classification pipeline.
///
/// Every field has a default, so a config file only needs the keys it changes:
///
/// ```
/// use tinyclass::ClassifierConfig;
///
/// let config = ClassifierConfig::from_json_str(r#"{ "sequence_length": 64 }"#).unwrap();
/// assert_eq!(config.sequence_length, 64);
/// assert_eq!(config.input_name, "input");
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Fixed number of token ids fed to the model
    pub sequence_length: usize,
    /// Name of the model's int32 input tensor
    pub input_name: String,
    /// Name of the model's f32 score tensor
    pub output_name: String,
    /// Vocabulary key reserved for out-of-vocabulary words
    pub oov_token: String,
    pub split_mode: SplitMode,
    /// Fail instead of warning when the model returns fewer scores than labels
    pub strict_output: bool,
    /// Record per-stage wall-clock durations for each request
    pub record_timings: bool,
    pub runtime: RuntimeConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            sequence_length: DEFAULT_SEQUENCE_LENGTH,
            input_name: DEFAULT_INPUT_NAME.to_string(),
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            oov_token: DEFAULT_OOV_TOKEN.to_string(),
            split_mode: SplitMode::default(),
            strict_output: false,
            record_timings: true,
            runtime: RuntimeConfig::default(),
        }
    }
}

impl ClassifierConfig {
    /// Reads a JSON config file. Missing keys fall back to their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| ClassifierError::resource(path, e))?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ClassifierError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ClassifierError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.sequence_length == 0 {
            return Err(ClassifierError::Config("sequence_length must be at least 1".into()));
        }
        if self.input_name.is_empty() || self.output_name.is_empty() {
            return Err(ClassifierError::Config("tensor names cannot be empty".into()));
        }
        Ok(())
    }
}
