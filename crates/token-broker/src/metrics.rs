//! Token acquisition metrics
//!
//! - `token_cache_lookups_total` (counter): label `result` (`hit` | `miss`)
//! - `token_acquisitions_total` (counter): labels `path` (`silent` | `interactive`), `outcome`
//! - `token_acquisitions_joined_total` (counter): callers that joined an in-flight acquisition
//!
//! All calls are no-ops until the embedding application installs a recorder.

/// Record a cache lookup.
pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("token_cache_lookups_total", "result" => result).increment(1);
}

/// Record a settled provider call.
pub fn record_acquisition(path: &'static str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("token_acquisitions_total", "path" => path, "outcome" => outcome)
        .increment(1);
}

/// Record a caller that joined an acquisition already in flight.
pub fn record_joined() {
    metrics::counter!("token_acquisitions_joined_total").increment(1);
}
