//! Windowed aggregation over run samples

use skillforge_types::{as_millis_f64, AggregateView, RunSample};

/// Default number of most recent samples an aggregate covers
pub const DEFAULT_WINDOW: usize = 500;

/// Summarize `samples` (oldest first) into an [`AggregateView`].
///
/// The 95th percentile is the element at `floor(0.95 * n)` of the ascending
/// elapsed times, clamped to the last element.
pub fn aggregate_samples(skill_id: &str, samples: &[RunSample]) -> AggregateView {
    if samples.is_empty() {
        return AggregateView::empty(skill_id);
    }

    let n = samples.len();
    let count = n as f64;

    let mut times: Vec<f64> = samples.iter().map(|s| as_millis_f64(s.elapsed)).collect();
    times.sort_by(|a, b| a.total_cmp(b));

    let failures = samples.iter().filter(|s| !s.success).count();
    let tokens_in: f64 = samples.iter().map(|s| s.tokens_in as f64).sum();
    let tokens_out: f64 = samples.iter().map(|s| s.tokens_out as f64).sum();
    let p95_index = (n * 95 / 100).min(n - 1);

    AggregateView {
        skill_id: skill_id.to_string(),
        mean_elapsed_ms: times.iter().sum::<f64>() / count,
        mean_tokens_in: tokens_in / count,
        mean_tokens_out: tokens_out / count,
        total_runs: n as u64,
        failure_rate: failures as f64 / count,
        p95_elapsed_ms: times[p95_index],
    }
}
