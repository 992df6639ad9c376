use super::vocab::LabelMap;
use super::Prediction;

/// Value written into unused positions of a token sequence.
pub const PAD_ID: i32 = 0;

/// Brings a token sequence to exactly `length` ids: right-pads with
/// [`PAD_ID`], or keeps the first `length` ids.
pub fn pad_or_truncate(mut tokens: Vec<i32>, length: usize) -> Vec<i32> {
    tokens.resize(length, PAD_ID);
    tokens
}

/// Pairs each score with the label at the same position, in index order.
///
/// Only `min(scores.len(), labels.class_count())` positions are decoded.
pub fn decode_scores(scores: &[f32], labels: &LabelMap) -> Vec<Prediction> {
    scores
        .iter()
        .take(labels.class_count())
        .enumerate()
        .map(|(index, &score)| Prediction {
            index,
            label: labels.label_or_unknown(index).to_string(),
            score,
        })
        .collect()
}

/// Sorts predictions by descending score. The sort is stable, so equal
/// scores keep their index order.
pub fn rank_predictions(mut predictions: Vec<Prediction>) -> Vec<Prediction> {
    predictions.sort_by(|a, b| b.score.total_cmp(&a.score));
    predictions
}

pub fn rank_scores(scores: &[f32], labels: &LabelMap) -> Vec<Prediction> {
    rank_predictions(decode_scores(scores, labels))
}
