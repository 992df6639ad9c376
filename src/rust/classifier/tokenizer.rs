use std::convert::TryFrom;
use std::path::Path;
use std::sync::Arc;

use log::{error, info};
use tokenizers::Tokenizer;

use super::error::ClassifierError;
use super::vocab::Vocabulary;
use crate::config::SplitMode;

/// Maps text to token ids with a word-level [`Vocabulary`].
///
/// Text is lower-cased and split into words; each word is looked up in the
/// vocabulary, with unknown words mapped to the out-of-vocabulary id. The
/// output has one id per word and is not padded.
#[derive(Debug, Clone)]
pub struct WordTokenizer {
    vocabulary: Arc<Vocabulary>,
    split_mode: SplitMode,
}

impl WordTokenizer {
    pub fn new(vocabulary: Arc<Vocabulary>, split_mode: SplitMode) -> Self {
        Self {
            vocabulary,
            split_mode,
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn split_mode(&self) -> SplitMode {
        self.split_mode
    }

    pub fn tokenize(&self, text: &str) -> Vec<i32> {
        tokenize(text, &self.vocabulary, self.split_mode)
    }
}

/// Tokenizes `text` against `vocabulary`.
///
/// With [`SplitMode::SingleSpace`] only the space character separates words:
/// runs of spaces collapse, but `"a\tb"` is a single word.
pub fn tokenize(text: &str, vocabulary: &Vocabulary, split_mode: SplitMode) -> Vec<i32> {
    let lowered = text.to_lowercase();
    match split_mode {
        SplitMode::SingleSpace => lowered
            .split(' ')
            .filter(|word| !word.is_empty())
            .map(|word| vocabulary.token_id(word))
            .collect(),
        SplitMode::Whitespace => lowered
            .split_whitespace()
            .map(|word| vocabulary.token_id(word))
            .collect(),
    }
}

/// The tokenizer a classifier feeds its model with.
#[derive(Debug, Clone)]
pub enum Tokenization {
    /// Word-level lookup in a JSON vocabulary
    Vocabulary(WordTokenizer),
    /// A pre-trained `tokenizer.json` shipped with the model
    Pretrained(Arc<Tokenizer>),
}

impl Tokenization {
    /// Loads a pre-trained tokenizer definition.
    pub fn pretrained_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ClassifierError::resource(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "tokenizer file not found"),
            ));
        }
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            error!("Failed to load tokenizer: {}", e);
            ClassifierError::Tokenizer(format!("Failed to load tokenizer: {}", e))
        })?;
        info!("Tokenizer loaded successfully from {:?}", path);
        Ok(Self::Pretrained(Arc::new(tokenizer)))
    }

    /// Converts text into unpadded token ids.
    ///
    /// # Errors
    /// - `Tokenizer` if the pre-trained tokenizer cannot encode the text
    /// - `Tokenizer` if a token id does not fit the model's int32 input
    pub fn encode(&self, text: &str) -> Result<Vec<i32>, ClassifierError> {
        match self {
            Self::Vocabulary(words) => Ok(words.tokenize(text)),
            Self::Pretrained(tokenizer) => {
                let encoding = tokenizer
                    .encode(text, false)
                    .map_err(|e| ClassifierError::Tokenizer(e.to_string()))?;
                encoding
                    .get_ids()
                    .iter()
                    .map(|&id| i32::try_from(id))
                    .collect::<Result<Vec<i32>, _>>()
                    .map_err(|_| ClassifierError::Tokenizer("Invalid token ID encountered".into()))
            }
        }
    }

    pub fn vocabulary(&self) -> Option<&Vocabulary> {
        match self {
            Self::Vocabulary(words) => Some(words.vocabulary()),
            Self::Pretrained(_) => None,
        }
    }
}
