use std::env;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::classifier::ClassifierError;

pub const MODEL_FILE: &str = "model.onnx";
pub const VOCABULARY_FILE: &str = "vocab.json";
pub const LABELS_FILE: &str = "labels.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Environment variable overriding the store location
pub const STORE_ENV: &str = "TINYCLASS_HOME";

/// The files of one model as laid out in a bundle directory.
///
/// A bundle holds `model.onnx` and `labels.json`, plus `vocab.json` for word
/// tokenization or `tokenizer.json` for a pre-trained tokenizer.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelBundle {
    pub dir: PathBuf,
    pub model: PathBuf,
    pub labels: PathBuf,
    pub vocabulary: Option<PathBuf>,
    pub tokenizer: Option<PathBuf>,
}

impl ModelBundle {
    /// Locates the bundle files in `dir`.
    ///
    /// # Errors
    /// `ModelLoad` if the model, the label map, or both tokenizer sources are missing.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, ClassifierError> {
        let dir = dir.as_ref();
        let existing = |name: &str| Some(dir.join(name)).filter(|path| path.is_file());

        let model = existing(MODEL_FILE).ok_or_else(|| {
            ClassifierError::ModelLoad(format!("No {} in {}", MODEL_FILE, dir.display()))
        })?;
        let labels = existing(LABELS_FILE).ok_or_else(|| {
            ClassifierError::ModelLoad(format!("No {} in {}", LABELS_FILE, dir.display()))
        })?;
        let vocabulary = existing(VOCABULARY_FILE);
        let tokenizer = existing(TOKENIZER_FILE);
        if vocabulary.is_none() && tokenizer.is_none() {
            return Err(ClassifierError::ModelLoad(format!(
                "No {} or {} in {}",
                VOCABULARY_FILE,
                TOKENIZER_FILE,
                dir.display()
            )));
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            model,
            labels,
            vocabulary,
            tokenizer,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Model not downloaded: {0}")]
    NotDownloaded(String),
    #[error("Download error: {0}")]
    Download(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("Invalid bundle or file name: {0:?}")]
    InvalidName(String),
    #[error("Hash mismatch: expected {expected}, got {actual} for {file}")]
    HashMismatch {
        file: String,
        expected: String,
        actual: String,
    },
}

/// One downloadable file of a bundle
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BundleFile {
    /// File name inside the bundle directory, e.g. `model.onnx`
    pub name: String,
    pub url: String,
    /// Lowercase hex SHA-256 of the file contents
    pub sha256: String,
}

/// Describes where the files of a named bundle are fetched from.
///
/// ```json
/// {
///   "name": "sentiment",
///   "files": [
///     { "name": "model.onnx", "url": "https://...", "sha256": "..." }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BundleManifest {
    pub name: String,
    pub files: Vec<BundleFile>,
}

impl BundleManifest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(json: &str) -> Result<Self, StoreError> {
        let manifest: Self = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Checks that the bundle name and every file name is a single plain
    /// path component, so that all files stay inside the bundle directory.
    pub fn validate(&self) -> Result<(), StoreError> {
        validate_name(&self.name)?;
        for file in &self.files {
            validate_name(&file.name)?;
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    let mut components = Path::new(name).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if single_normal && !name.contains(['/', '\\']) {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Keeps model bundles in per-name directories under one root.
#[derive(Clone, Debug)]
pub struct ModelStore {
    root: PathBuf,
    download_lock: Arc<Mutex<()>>,
}

impl ModelStore {
    /// Creates a new ModelStore at the default location
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::default_dir())
    }

    /// Returns the default store path
    pub fn default_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var(STORE_ENV) {
            return PathBuf::from(path).join("models");
        }

        // 2. Use platform-specific cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("tinyclass").join("models");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("tinyclass").join("models");
        }

        env::temp_dir().join("tinyclass").join("models")
    }

    pub fn new<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            download_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bundle_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn file_path(&self, bundle: &str, file: &str) -> PathBuf {
        self.bundle_dir(bundle).join(file)
    }

    pub fn is_downloaded(&self, manifest: &BundleManifest) -> bool {
        if manifest.validate().is_err() {
            return false;
        }
        manifest.files.iter().all(|file| {
            let path = self.file_path(&manifest.name, &file.name);
            log::debug!("  {:?} (exists: {})", path, path.exists());
            path.exists()
        })
    }

    /// Locates the downloaded bundle for use with `ClassifierBuilder::with_bundle`.
    pub fn bundle(&self, manifest: &BundleManifest) -> Result<ModelBundle, StoreError> {
        manifest.validate()?;
        if !self.is_downloaded(manifest) {
            return Err(StoreError::NotDownloaded(manifest.name.clone()));
        }
        ModelBundle::from_dir(self.bundle_dir(&manifest.name))
            .map_err(|e| StoreError::NotDownloaded(format!("{}: {}", manifest.name, e)))
    }

    fn verify_file(&self, path: &Path, expected_hash: &str) -> Result<bool, StoreError> {
        let bytes = fs::read(path)?;
        let hash = sha256_hex(&bytes);
        log::debug!("Verifying {:?}: calculated {}, expected {}", path, hash, expected_hash);
        Ok(hash.eq_ignore_ascii_case(expected_hash))
    }

    /// Checks every file of the bundle against its manifest hash.
    /// Missing files verify as `false`.
    pub fn verify(&self, manifest: &BundleManifest) -> Result<bool, StoreError> {
        manifest.validate()?;
        for file in &manifest.files {
            let path = self.file_path(&manifest.name, &file.name);
            if !path.exists() {
                log::info!("{:?} does not exist", path);
                return Ok(false);
            }
            if !self.verify_file(&path, &file.sha256)? {
                log::info!("{:?} failed hash verification", path);
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Downloads the files that are missing or fail verification.
    ///
    /// On failure, the bundle's files are removed so that no partial bundle
    /// is left behind.
    pub async fn download(&self, manifest: &BundleManifest) -> Result<(), StoreError> {
        let _lock = self.download_lock.lock().await;
        self.download_locked(manifest).await
    }

    /// Body of [`ModelStore::download`]; the caller holds `download_lock`.
    async fn download_locked(&self, manifest: &BundleManifest) -> Result<(), StoreError> {
        manifest.validate()?;
        let dir = self.bundle_dir(&manifest.name);
        log::info!("Preparing bundle '{}' at {:?}", manifest.name, dir);
        fs::create_dir_all(&dir)?;

        for file in &manifest.files {
            let path = self.file_path(&manifest.name, &file.name);
            if path.exists() && self.verify_file(&path, &file.sha256)? {
                log::info!("{} already present and verified", file.name);
                continue;
            }
            if let Err(e) = self.download_and_verify_file(file, &path).await {
                log::error!("Failed to fetch {}: {}", file.name, e);
                if let Err(cleanup) = self.remove(manifest) {
                    log::warn!(
                        "Failed to remove partial bundle '{}' after error: {}",
                        manifest.name,
                        cleanup
                    );
                }
                return Err(e);
            }
        }

        log::info!("Bundle '{}' ready to use", manifest.name);
        Ok(())
    }

    async fn download_and_verify_file(&self, file: &BundleFile, path: &Path) -> Result<(), StoreError> {
        log::info!("Downloading {} from {}", file.name, file.url);
        let response = reqwest::get(&file.url).await?.error_for_status()?;
        let bytes = response.bytes().await?;
        log::info!("Downloaded {} bytes", bytes.len());

        let hash = sha256_hex(&bytes);
        if !hash.eq_ignore_ascii_case(&file.sha256) {
            return Err(StoreError::HashMismatch {
                file: file.name.clone(),
                expected: file.sha256.clone(),
                actual: hash,
            });
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &bytes)?;
        Ok(())
    }

    pub fn remove(&self, manifest: &BundleManifest) -> Result<(), StoreError> {
        manifest.validate()?;
        for file in &manifest.files {
            let path = self.file_path(&manifest.name, &file.name);
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Downloads the bundle if absent, re-downloads it if verification fails,
    /// and returns its location.
    ///
    /// The whole check, remove and download sequence runs under the download
    /// lock, so concurrent callers never delete each other's files.
    pub async fn ensure_downloaded(&self, manifest: &BundleManifest) -> Result<ModelBundle, StoreError> {
        let _lock = self.download_lock.lock().await;
        if !self.verify(manifest)? {
            log::info!("Bundle '{}' missing or stale, downloading...", manifest.name);
            self.remove(manifest)?;
            self.download_locked(manifest).await?;
        }
        self.bundle(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest_for(files: &[(&str, &str)]) -> BundleManifest {
        BundleManifest {
            name: "sentiment".to_string(),
            files: files
                .iter()
                .map(|(name, contents)| BundleFile {
                    name: name.to_string(),
                    // Never fetched in these tests
                    url: format!("http://127.0.0.1:9/{}", name),
                    sha256: sha256_hex(contents.as_bytes()),
                })
                .collect(),
        }
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_default_dir() {
        env::set_var(STORE_ENV, "/tmp/tinyclass-test-home");
        let path = ModelStore::default_dir();
        assert_eq!(path, PathBuf::from("/tmp/tinyclass-test-home/models"));
        env::remove_var(STORE_ENV);

        let path = ModelStore::default_dir();
        assert!(path.ends_with("tinyclass/models"));
    }

    #[test]
    fn test_verify_detects_missing_and_corrupt_files() {
        let root = tempfile::tempdir().unwrap();
        let store = ModelStore::new(root.path()).unwrap();
        let manifest = manifest_for(&[("model.onnx", "weights"), ("labels.json", "{}")]);

        assert!(!store.is_downloaded(&manifest));
        assert!(!store.verify(&manifest).unwrap());

        fs::create_dir_all(store.bundle_dir("sentiment")).unwrap();
        fs::write(store.file_path("sentiment", "model.onnx"), "weights").unwrap();
        fs::write(store.file_path("sentiment", "labels.json"), "{}").unwrap();
        assert!(store.is_downloaded(&manifest));
        assert!(store.verify(&manifest).unwrap());

        fs::write(store.file_path("sentiment", "model.onnx"), "corrupted data").unwrap();
        assert!(!store.verify(&manifest).unwrap());

        store.remove(&manifest).unwrap();
        assert!(!store.is_downloaded(&manifest));
    }

    #[tokio::test]
    async fn test_verified_bundle_is_not_refetched() {
        let root = tempfile::tempdir().unwrap();
        let store = ModelStore::new(root.path()).unwrap();
        let manifest = manifest_for(&[
            ("model.onnx", "weights"),
            ("labels.json", r#"{"0": "a"}"#),
            ("vocab.json", r#"{"a": 2}"#),
        ]);
        fs::create_dir_all(store.bundle_dir("sentiment")).unwrap();
        fs::write(store.file_path("sentiment", "model.onnx"), "weights").unwrap();
        fs::write(store.file_path("sentiment", "labels.json"), r#"{"0": "a"}"#).unwrap();
        fs::write(store.file_path("sentiment", "vocab.json"), r#"{"a": 2}"#).unwrap();

        // The URLs are unreachable, so this only succeeds without fetching
        let bundle = store.ensure_downloaded(&manifest).await.unwrap();
        assert_eq!(bundle.model, store.file_path("sentiment", "model.onnx"));
        assert_eq!(bundle.vocabulary, Some(store.file_path("sentiment", "vocab.json")));
        assert!(bundle.tokenizer.is_none());
    }

    #[test]
    fn test_bundle_requires_download() {
        let root = tempfile::tempdir().unwrap();
        let store = ModelStore::new(root.path()).unwrap();
        let manifest = manifest_for(&[("model.onnx", "weights")]);
        assert!(matches!(store.bundle(&manifest), Err(StoreError::NotDownloaded(_))));
    }

    #[test]
    fn test_manifest_parsing() {
        let manifest = BundleManifest::from_json_str(
            r#"{"name": "news", "files": [{"name": "model.onnx", "url": "https://example.com/m", "sha256": "00"}]}"#,
        )
        .unwrap();
        assert_eq!(manifest.name, "news");
        assert_eq!(manifest.files[0].name, "model.onnx");
        assert!(matches!(
            BundleManifest::from_json_str(r#"{"name": "news"}"#),
            Err(StoreError::Manifest(_))
        ));
    }

    #[test]
    fn test_manifest_rejects_path_names() {
        for name in ["../escape", "a/b", "/etc/passwd", "..", ".", "", "a\\b"] {
            let mut manifest = manifest_for(&[("model.onnx", "weights")]);
            manifest.files[0].name = name.to_string();
            assert!(
                matches!(manifest.validate(), Err(StoreError::InvalidName(_))),
                "file name {:?} accepted",
                name
            );

            let mut manifest = manifest_for(&[("model.onnx", "weights")]);
            manifest.name = name.to_string();
            assert!(matches!(manifest.validate(), Err(StoreError::InvalidName(_))));
        }

        assert!(manifest_for(&[("model.onnx", "weights")]).validate().is_ok());
        assert!(matches!(
            BundleManifest::from_json_str(
                r#"{"name": "news", "files": [{"name": "../../x", "url": "https://example.com/x", "sha256": "00"}]}"#
            ),
            Err(StoreError::InvalidName(_))
        ));
    }

    #[test]
    fn test_bundle_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ModelBundle::from_dir(dir.path()),
            Err(ClassifierError::ModelLoad(_))
        ));

        fs::write(dir.path().join(MODEL_FILE), "weights").unwrap();
        fs::write(dir.path().join(LABELS_FILE), "{}").unwrap();
        assert!(matches!(
            ModelBundle::from_dir(dir.path()),
            Err(ClassifierError::ModelLoad(_))
        ));

        fs::write(dir.path().join(TOKENIZER_FILE), "{}").unwrap();
        let bundle = ModelBundle::from_dir(dir.path()).unwrap();
        assert!(bundle.vocabulary.is_none());
        assert_eq!(bundle.tokenizer, Some(dir.path().join(TOKENIZER_FILE)));
    }
}
