use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use tinyclass::{
    format_summary, BundleManifest, Classifier, ClassifierBuilder, ClassifierConfig, ModelStore, SplitMode,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Texts to classify. Reads one text per line from stdin when omitted
    texts: Vec<String>,

    /// Directory holding model.onnx, labels.json and vocab.json or tokenizer.json
    #[arg(short, long, conflicts_with = "manifest")]
    bundle: Option<PathBuf>,

    /// Bundle manifest to fetch into the model store
    #[arg(short, long)]
    manifest: Option<PathBuf>,

    /// Force a fresh download of the bundle files
    #[arg(short, long, requires = "manifest")]
    fresh: bool,

    /// ONNX model file, when not using a bundle
    #[arg(long)]
    model: Option<PathBuf>,

    /// Vocabulary JSON (word -> id)
    #[arg(long)]
    vocab: Option<PathBuf>,

    /// Label map JSON (class index -> label)
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Pre-trained tokenizer.json, used instead of a vocabulary
    #[arg(long)]
    tokenizer: Option<PathBuf>,

    /// JSON classifier configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the model's sequence length
    #[arg(long)]
    sequence_length: Option<usize>,

    /// Split words on any whitespace instead of spaces only
    #[arg(long)]
    whitespace: bool,

    /// Fail when the model returns fewer scores than labels
    #[arg(long)]
    strict: bool,
}

fn load_config(args: &Args) -> Result<ClassifierConfig> {
    let mut config = match &args.config {
        Some(path) => ClassifierConfig::from_file(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => ClassifierConfig::default(),
    };
    if let Some(length) = args.sequence_length {
        config.sequence_length = length;
    }
    if args.whitespace {
        config.split_mode = SplitMode::Whitespace;
    }
    if args.strict {
        config.strict_output = true;
    }
    Ok(config)
}

async fn resolve_bundle(manifest_path: &Path, fresh: bool) -> Result<PathBuf> {
    let manifest = BundleManifest::from_file(manifest_path)
        .with_context(|| format!("Failed to read manifest {:?}", manifest_path))?;
    let store = ModelStore::new_default()?;

    if fresh {
        info!("Fresh download requested - removing any existing bundle files...");
        store.remove(&manifest)?;
    }

    let bundle = store.ensure_downloaded(&manifest).await?;
    Ok(bundle.dir)
}

async fn build_classifier(args: &Args) -> Result<Classifier> {
    let mut builder = ClassifierBuilder::new().with_config(load_config(args)?);

    let bundle = match &args.manifest {
        Some(manifest) => Some(resolve_bundle(manifest, args.fresh).await?),
        None => args.bundle.clone(),
    };

    if let Some(dir) = bundle {
        builder = builder.with_bundle(&dir)?;
    } else {
        let (Some(model), Some(labels)) = (&args.model, &args.labels) else {
            bail!("Provide --bundle, --manifest, or both --model and --labels");
        };
        builder = builder.with_model_file(model)?.with_labels_file(labels)?;
        builder = match (&args.tokenizer, &args.vocab) {
            (Some(tokenizer), _) => builder.with_pretrained_tokenizer(tokenizer)?,
            (None, Some(vocab)) => builder.with_vocabulary_file(vocab),
            (None, None) => bail!("Provide --vocab or --tokenizer"),
        };
    }

    Ok(builder.build()?)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let start_time = Instant::now();
    info!("Building classifier...");
    let classifier = Arc::new(build_classifier(&args).await?);
    info!("=== Classifier Built Successfully (took {:.2?}) ===", start_time.elapsed());

    let texts = if args.texts.is_empty() {
        io::stdin().lock().lines().collect::<Result<Vec<_>, _>>()?
    } else {
        args.texts.clone()
    };

    let mut failures = 0;
    for text in &texts {
        match classifier.classify_in_background(text.as_str()).await {
            Ok(classification) => {
                println!(
                    "{}",
                    format_summary(&classification.predictions, text, classification.timings.as_ref())
                );
            }
            Err(e) => {
                failures += 1;
                eprintln!("Error classifying {:?}: {}", text, e);
            }
        }
    }

    info!("Classified {} texts in {:.2?}", texts.len(), start_time.elapsed());
    if failures > 0 {
        bail!("{} of {} classifications failed", failures, texts.len());
    }
    Ok(())
}
