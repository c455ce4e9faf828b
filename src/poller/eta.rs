use std::time::Duration;

/// Linear estimate of the seconds left for a job that has reached
/// `percent` after running for `elapsed`.
///
/// Returns `None` while no progress has been reported, since no rate can
/// be derived yet. Percentages above 100 are treated as 100.
pub fn estimate_remaining(elapsed: Duration, percent: f64) -> Option<u64> {
    if percent.is_nan() || percent <= 0.0 {
        return None;
    }

    let percent = percent.min(100.0);
    let elapsed_ms = elapsed.as_millis() as f64;
    let remaining_ms = elapsed_ms * (100.0 - percent) / percent;

    Some((remaining_ms / 1000.0).round() as u64)
}
