use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use env_logger::{Builder, Env};
use tinyclass::{
    Classifier, ClassifierConfig, ClassifierError, InferenceAdapter, LabelMap, SplitMode, Vocabulary,
};

fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

/// Answers every request with the same scores and remembers the inputs
#[derive(Debug)]
struct ScriptedAdapter {
    scores: Vec<f32>,
    calls: AtomicUsize,
    last_input: Mutex<Vec<i32>>,
}

impl ScriptedAdapter {
    fn new(scores: Vec<f32>) -> Arc<Self> {
        Arc::new(Self {
            scores,
            calls: AtomicUsize::new(0),
            last_input: Mutex::new(Vec::new()),
        })
    }
}

impl InferenceAdapter for ScriptedAdapter {
    fn run(&self, tokens: &[i32], class_count: usize) -> Result<Vec<f32>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_input.lock().unwrap() = tokens.to_vec();
        Ok(self.scores.iter().copied().take(class_count).collect())
    }
}

#[derive(Debug)]
struct FailingAdapter;

impl InferenceAdapter for FailingAdapter {
    fn run(&self, _tokens: &[i32], _class_count: usize) -> Result<Vec<f32>, ClassifierError> {
        Err(ClassifierError::Inference("output tensor 'output' missing".into()))
    }
}

fn sentiment_classifier(adapter: Arc<dyn InferenceAdapter>, config: ClassifierConfig) -> Classifier {
    Classifier::builder()
        .with_config(config)
        .with_vocabulary(Vocabulary::from_json_str(r#"{"good": 3, "<OOV>": 1}"#, "<OOV>").unwrap())
        .with_labels(LabelMap::from_json_str(r#"{"0": "negative", "1": "positive"}"#).unwrap())
        .with_adapter(adapter)
        .build()
        .expect("Failed to create classifier")
}

fn config_with_length(sequence_length: usize) -> ClassifierConfig {
    ClassifierConfig {
        sequence_length,
        ..ClassifierConfig::default()
    }
}

#[test]
fn test_end_to_end_classification() -> Result<(), Box<dyn std::error::Error>> {
    init();
    let adapter = ScriptedAdapter::new(vec![0.2, 0.8]);
    let classifier = sentiment_classifier(adapter.clone(), config_with_length(5));

    let classification = classifier.classify("good good")?;

    assert_eq!(*adapter.last_input.lock().unwrap(), vec![3, 3, 0, 0, 0]);
    let ranked: Vec<(&str, f32)> = classification
        .predictions
        .iter()
        .map(|p| (p.label.as_str(), p.score))
        .collect();
    assert_eq!(ranked, vec![("positive", 0.8f32), ("negative", 0.2f32)]);
    assert!(classification.timings.is_some());
    Ok(())
}

#[test]
fn test_default_sequence_length_is_thirty() {
    let adapter = ScriptedAdapter::new(vec![0.5, 0.5]);
    let classifier = sentiment_classifier(adapter.clone(), ClassifierConfig::default());

    let long_text = "good ".repeat(45);
    classifier.classify(&long_text).unwrap();
    assert_eq!(*adapter.last_input.lock().unwrap(), vec![3; 30]);

    classifier.classify("Good unknown").unwrap();
    let input = adapter.last_input.lock().unwrap().clone();
    assert_eq!(input.len(), 30);
    assert_eq!(&input[..2], &[3, 1]);
    assert!(input[2..].iter().all(|&id| id == 0));
}

#[test]
fn test_empty_text_classifies_padding() {
    let adapter = ScriptedAdapter::new(vec![0.6, 0.4]);
    let classifier = sentiment_classifier(adapter.clone(), config_with_length(4));

    let (label, _) = classifier.predict("").unwrap();
    assert_eq!(label, "negative");
    assert_eq!(*adapter.last_input.lock().unwrap(), vec![0, 0, 0, 0]);
}

#[test]
fn test_whitespace_split_mode() {
    let adapter = ScriptedAdapter::new(vec![0.5, 0.5]);
    let config = ClassifierConfig {
        sequence_length: 4,
        split_mode: SplitMode::Whitespace,
        ..ClassifierConfig::default()
    };
    let classifier = sentiment_classifier(adapter.clone(), config);

    classifier.classify("good\tgood\nbad").unwrap();
    assert_eq!(*adapter.last_input.lock().unwrap(), vec![3, 3, 1, 0]);
}

#[test]
fn test_short_output_is_lenient_by_default() {
    let classifier = sentiment_classifier(ScriptedAdapter::new(vec![0.9]), config_with_length(5));
    let classification = classifier.classify("good").unwrap();
    assert_eq!(classification.predictions.len(), 1);
    assert_eq!(classification.predictions[0].label, "negative");
}

#[test]
fn test_short_output_fails_in_strict_mode() {
    let config = ClassifierConfig {
        strict_output: true,
        ..ClassifierConfig::default()
    };
    let classifier = sentiment_classifier(ScriptedAdapter::new(vec![0.9]), config);
    assert!(matches!(classifier.classify("good"), Err(ClassifierError::Inference(_))));
}

#[test]
fn test_inference_failure_returns_no_predictions() {
    init();
    let classifier = sentiment_classifier(Arc::new(FailingAdapter), ClassifierConfig::default());
    match classifier.predict("good") {
        Err(ClassifierError::Inference(message)) => assert!(message.contains("missing")),
        other => panic!("expected inference error, got {:?}", other),
    }
}

#[test]
fn test_timings_can_be_disabled() {
    let config = ClassifierConfig {
        record_timings: false,
        ..ClassifierConfig::default()
    };
    let classifier = sentiment_classifier(ScriptedAdapter::new(vec![0.1, 0.9]), config);
    assert!(classifier.classify("good").unwrap().timings.is_none());
}

#[test]
fn test_label_gaps_decode_as_unknown() {
    let classifier = Classifier::builder()
        .with_vocabulary(Vocabulary::from_json_str(r#"{"good": 3}"#, "<OOV>").unwrap())
        .with_labels(LabelMap::from_json_str(r#"{"0": "negative", "2": "positive"}"#).unwrap())
        .with_adapter(ScriptedAdapter::new(vec![0.1, 0.7, 0.2]))
        .build()
        .unwrap();

    // Two labels means two decoded positions: 0 and 1
    let classification = classifier.classify("good").unwrap();
    let labels: Vec<&str> = classification.predictions.iter().map(|p| p.label.as_str()).collect();
    assert_eq!(labels, vec!["Unknown", "negative"]);
}

#[test]
fn test_thread_safety() {
    let adapter = ScriptedAdapter::new(vec![0.3, 0.7]);
    let classifier = Arc::new(sentiment_classifier(adapter.clone(), ClassifierConfig::default()));
    let mut handles = vec![];

    for i in 0..4 {
        let classifier = Arc::clone(&classifier);
        handles.push(thread::spawn(move || {
            let text = format!("good text number {}", i);
            let (label, _) = classifier.predict(&text).unwrap();
            assert_eq!(label, "positive");
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_background_classification() {
    let classifier = Arc::new(sentiment_classifier(
        ScriptedAdapter::new(vec![0.25, 0.75]),
        ClassifierConfig::default(),
    ));

    let first = classifier.classify_in_background("good");
    let second = classifier.classify_in_background(String::from("not good"));
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.unwrap().best().unwrap().label, "positive");
    assert_eq!(second.unwrap().predictions.len(), 2);
}

#[test]
fn test_background_error_is_surfaced() {
    let classifier = Arc::new(sentiment_classifier(Arc::new(FailingAdapter), ClassifierConfig::default()));
    let result = tokio_test::block_on(classifier.classify_in_background("good"));
    assert!(matches!(result, Err(ClassifierError::Inference(_))));
}
