use std::fmt::{self, Write};
use std::time::Duration;

use super::{Prediction, StageTimings};

const BAR_WIDTH: usize = 20;

/// Qualitative rating of end-to-end classification latency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceRating {
    /// Under 50 ms
    Excellent,
    /// Under 100 ms
    Good,
    NeedsOptimization,
}

impl PerformanceRating {
    pub fn from_duration(total: Duration) -> Self {
        match total.as_millis() {
            0..=49 => Self::Excellent,
            50..=99 => Self::Good,
            _ => Self::NeedsOptimization,
        }
    }
}

impl fmt::Display for PerformanceRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Excellent => write!(f, "Excellent (< 50 ms)"),
            Self::Good => write!(f, "Good (< 100 ms)"),
            Self::NeedsOptimization => write!(f, "Needs optimization (>= 100 ms)"),
        }
    }
}

fn bar(score: f32) -> String {
    let filled = (score.clamp(0.0, 1.0) * BAR_WIDTH as f32).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

fn share(part: Duration, total: Duration) -> f64 {
    if total.is_zero() {
        0.0
    } else {
        part.as_secs_f64() / total.as_secs_f64() * 100.0
    }
}

/// Renders ranked predictions as a plain-text summary.
///
/// `predictions` are expected in ranked order, best first. The timing section
/// is included only when `timings` is given.
pub fn format_summary(predictions: &[Prediction], text: &str, timings: Option<&StageTimings>) -> String {
    let mut out = String::new();
    let _ = write_summary(&mut out, predictions, text, timings);
    out
}

fn write_summary(
    out: &mut String,
    predictions: &[Prediction],
    text: &str,
    timings: Option<&StageTimings>,
) -> fmt::Result {
    writeln!(out, "Input: \"{}\"", text)?;

    match predictions.first() {
        Some(best) => writeln!(
            out,
            "Prediction: {} ({:.1}% confidence)",
            best.label,
            best.score * 100.0
        )?,
        None => writeln!(out, "Prediction: none")?,
    }

    if !predictions.is_empty() {
        let width = predictions
            .iter()
            .map(|p| p.label.chars().count())
            .max()
            .unwrap_or(0);
        writeln!(out)?;
        writeln!(out, "Scores:")?;
        for prediction in predictions {
            writeln!(
                out,
                "  {:<width$}  {}  {:>5.1}%",
                prediction.label,
                bar(prediction.score),
                prediction.score * 100.0,
                width = width
            )?;
        }
    }

    if let Some(timings) = timings {
        let total = timings.total();
        writeln!(out)?;
        writeln!(out, "Timing:")?;
        for (name, stage) in [
            ("Tokenize & pad", timings.preprocessing),
            ("Inference", timings.inference),
            ("Decode & rank", timings.postprocessing),
        ] {
            writeln!(
                out,
                "  {:<15} {:>8.2} ms ({:.1}%)",
                name,
                millis(stage),
                share(stage, total)
            )?;
        }
        writeln!(out, "  {:<15} {:>8.2} ms", "Total", millis(total))?;
        if total.is_zero() {
            writeln!(out, "  {:<15} n/a", "Throughput")?;
        } else {
            writeln!(
                out,
                "  {:<15} ~{:.0} classifications/sec",
                "Throughput",
                1.0 / total.as_secs_f64()
            )?;
        }
        writeln!(out, "  {:<15} {}", "Rating", PerformanceRating::from_duration(total))?;
    }

    Ok(())
}
