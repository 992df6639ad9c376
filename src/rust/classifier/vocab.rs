use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use log::{debug, info, warn};

use super::error::ClassifierError;

/// Id used for unknown words when the vocabulary has no OOV entry.
pub const FALLBACK_OOV_ID: i32 = 1;

/// Label reported for a score position that has no label map entry.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Word to token id table, loaded once and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    ids: HashMap<String, i32>,
    oov_id: Option<i32>,
}

impl Vocabulary {
    /// Builds a vocabulary from an id table. `oov_token` names the reserved
    /// entry for out-of-vocabulary words; it does not have to be present.
    pub fn new(ids: HashMap<String, i32>, oov_token: &str) -> Self {
        let oov_id = ids.get(oov_token).copied();
        Self { ids, oov_id }
    }

    pub fn from_file<P: AsRef<Path>>(path: P, oov_token: &str) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| ClassifierError::resource(path, e))?;
        Self::parse(&bytes, &path.display().to_string(), oov_token)
    }

    pub fn from_json_str(json: &str, oov_token: &str) -> Result<Self, ClassifierError> {
        Self::from_json_slice(json.as_bytes(), oov_token)
    }

    pub fn from_json_slice(bytes: &[u8], oov_token: &str) -> Result<Self, ClassifierError> {
        Self::parse(bytes, "vocabulary", oov_token)
    }

    fn parse(bytes: &[u8], resource: &str, oov_token: &str) -> Result<Self, ClassifierError> {
        let ids: HashMap<String, i32> = serde_json::from_slice(bytes)
            .map_err(|e| ClassifierError::parse(resource, e))?;

        if let Some((word, id)) = ids.iter().find(|&(_, &id)| id < 0) {
            return Err(ClassifierError::parse(
                resource,
                format!("token '{}' has negative id {}", word, id),
            ));
        }

        let vocabulary = Self::new(ids, oov_token);
        if vocabulary.oov_id.is_none() {
            warn!(
                "Vocabulary {} has no '{}' entry, unknown words map to id {}",
                resource, oov_token, FALLBACK_OOV_ID
            );
        }
        Ok(vocabulary)
    }

    pub fn get(&self, word: &str) -> Option<i32> {
        self.ids.get(word).copied()
    }

    pub fn oov_id(&self) -> Option<i32> {
        self.oov_id
    }

    /// Id for `word`, falling back to the OOV id and then to [`FALLBACK_OOV_ID`].
    pub fn token_id(&self, word: &str) -> i32 {
        self.get(word)
            .or(self.oov_id)
            .unwrap_or(FALLBACK_OOV_ID)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Class index to label table. Position `i` of the model output belongs to
/// the label stored under index `i`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabelMap {
    labels: BTreeMap<usize, String>,
}

impl LabelMap {
    pub fn new(labels: BTreeMap<usize, String>) -> Self {
        Self { labels }
    }

    /// Assigns indices `0..n` in order.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).enumerate().collect(),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| ClassifierError::resource(path, e))?;
        Self::parse(&bytes, &path.display().to_string())
    }

    pub fn from_json_str(json: &str) -> Result<Self, ClassifierError> {
        Self::from_json_slice(json.as_bytes())
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ClassifierError> {
        Self::parse(bytes, "label map")
    }

    fn parse(bytes: &[u8], resource: &str) -> Result<Self, ClassifierError> {
        let raw: HashMap<String, String> = serde_json::from_slice(bytes)
            .map_err(|e| ClassifierError::parse(resource, e))?;

        let mut labels = BTreeMap::new();
        for (key, label) in raw {
            match key.parse::<usize>() {
                Ok(index) => {
                    labels.insert(index, label);
                }
                Err(_) => debug!("Skipping non-numeric label key '{}' in {}", key, resource),
            }
        }

        let map = Self { labels };
        if !map.is_contiguous() {
            warn!(
                "Label map {} has gaps, missing positions decode as '{}'",
                resource, UNKNOWN_LABEL
            );
        }
        Ok(map)
    }

    pub fn class_count(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(&index).map(String::as_str)
    }

    pub fn label_or_unknown(&self, index: usize) -> &str {
        self.label(index).unwrap_or(UNKNOWN_LABEL)
    }

    /// Labels in index order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.values().map(String::as_str)
    }

    /// True when the indices are exactly `0..class_count()`.
    pub fn is_contiguous(&self) -> bool {
        self.labels.keys().enumerate().all(|(expected, &index)| expected == index)
    }
}

/// Loads the label map and vocabulary that accompany a model.
pub fn load_resources<P: AsRef<Path>, Q: AsRef<Path>>(
    labels_path: P,
    vocab_path: Q,
    oov_token: &str,
) -> Result<(Vocabulary, LabelMap), ClassifierError> {
    let labels = LabelMap::from_file(labels_path)?;
    let vocabulary = Vocabulary::from_file(vocab_path, oov_token)?;
    info!(
        "Loaded vocabulary ({} tokens) and label map ({} classes)",
        vocabulary.len(),
        labels.class_count()
    );
    Ok((vocabulary, labels))
}
