/// Rough token count used for the tokens/second readout.
///
/// Counts whitespace-separated words. Appending text can only extend the last
/// word or start new ones, so the count never decreases while a response grows.
pub fn estimate_tokens(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// Tokens per second for `text` produced over `elapsed_secs`.
///
/// Returns `None` when the rate would be undefined: no elapsed time, or a
/// result that is not a finite non-negative number.
pub fn tokens_per_second(text: &str, elapsed_secs: f64) -> Option<f64> {
    if elapsed_secs.is_nan() || elapsed_secs <= 0.0 {
        return None;
    }
    let rate = estimate_tokens(text) as f64 / elapsed_secs;
    (rate.is_finite() && rate >= 0.0).then_some(rate)
}
