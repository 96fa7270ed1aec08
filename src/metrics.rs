//! Metric names and one-time registration for the engine's counters.

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

pub const SEARCHES_TOTAL: &str = "nomadmatch_searches_total";
pub const SEARCH_FALLBACK_TOTAL: &str = "nomadmatch_search_fallback_total";
pub const SEARCH_SUPERSEDED_TOTAL: &str = "nomadmatch_search_superseded_total";
pub const TOGGLES_TOTAL: &str = "nomadmatch_toggles_total";
pub const TOGGLE_ROLLBACK_TOTAL: &str = "nomadmatch_toggle_rollback_total";

/// One-time metrics registration (so series show up on whatever exporter the
/// embedding application installs).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(SEARCHES_TOTAL, "Search pipeline runs.");
        describe_counter!(
            SEARCH_FALLBACK_TOTAL,
            "Searches served from the embedded catalog."
        );
        describe_counter!(
            SEARCH_SUPERSEDED_TOTAL,
            "Search responses discarded because a newer search was issued."
        );
        describe_counter!(TOGGLES_TOTAL, "Preference toggle transitions applied.");
        describe_counter!(
            TOGGLE_ROLLBACK_TOTAL,
            "Optimistic toggles rolled back after a remote failure."
        );
    });
}

pub fn incr(name: &'static str) {
    ensure_described();
    counter!(name).increment(1);
}
