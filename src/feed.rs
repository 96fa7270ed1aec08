//! # Feed Composer
//! Turns scored cities into the ordered, filtered sequence the feed renders.
//!
//! Ordering contract: every city meeting the requested climate ranks above
//! every city that does not, regardless of score; within each partition the
//! order is score-descending with ties keeping input order. There is no
//! secondary tie-break key, so the stable sort is load-bearing.
//!
//! The full ordered sequence is retained (the feed view shows only the first
//! `FEED_DISPLAY_LIMIT` entries) so Favorites/Premium views can reuse it
//! without re-querying.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::climate::meets_climate;
use crate::normalizer::CityRecord;
use crate::scoring::{self, UserPreferenceSet};

/// How many entries the feed view displays.
pub const FEED_DISPLAY_LIMIT: usize = 3;

/// CityRecord plus the derived, non-persisted ranking attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCity {
    pub city: CityRecord,
    pub display_score: u8,
    pub meets_climate: bool,
}

impl ScoredCity {
    /// Derive score and climate bucket for one city under the captured
    /// preferences, using the city's own raw similarity as the base.
    pub fn derive(city: CityRecord, prefs: &UserPreferenceSet) -> Self {
        let display_score = scoring::score(&city, prefs, city.raw_similarity);
        let meets = meets_climate(&city, prefs.climate);
        Self {
            city,
            display_score,
            meets_climate: meets,
        }
    }
}

/// Why a composed feed came out empty. The two empty cases carry different
/// user-facing messages and must not be collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedOutcome {
    /// At least one city survived filtering.
    Ranked,
    /// Nothing matched the search at all.
    NoMatches,
    /// Every match was hidden by the user's own skips.
    AllHidden,
}

/// One composed feed: the full ordered ranking (hidden cities removed) plus
/// the outcome classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub ranking: Vec<ScoredCity>,
    pub outcome: FeedOutcome,
}

impl Feed {
    /// The slice the feed view actually renders.
    pub fn visible(&self) -> &[ScoredCity] {
        let n = self.ranking.len().min(FEED_DISPLAY_LIMIT);
        &self.ranking[..n]
    }
}

/// Compose the feed from scored cities, the captured preferences, and the
/// hidden set.
pub fn compose(cities: Vec<ScoredCity>, prefs: &UserPreferenceSet, hidden: &HashSet<String>) -> Feed {
    let had_input = !cities.is_empty();

    // 1) Partition via the climate bucketer predicate.
    let mut good: Vec<ScoredCity> = Vec::with_capacity(cities.len());
    let mut bad: Vec<ScoredCity> = Vec::new();
    for sc in cities {
        if meets_climate(&sc.city, prefs.climate) {
            good.push(sc);
        } else {
            bad.push(sc);
        }
    }

    // 2) Score-descending within each partition; sort_by is stable, so
    //    equal scores keep their input order.
    good.sort_by(|a, b| b.display_score.cmp(&a.display_score));
    bad.sort_by(|a, b| b.display_score.cmp(&a.display_score));

    // 3) Good-climate cities always rank above any bad-climate city.
    good.extend(bad);

    // 4) Drop cities the user has disliked.
    let ranking: Vec<ScoredCity> = good
        .into_iter()
        .filter(|sc| !hidden.contains(&sc.city.name))
        .collect();

    let outcome = if !ranking.is_empty() {
        FeedOutcome::Ranked
    } else if had_input {
        FeedOutcome::AllHidden
    } else {
        FeedOutcome::NoMatches
    };

    Feed { ranking, outcome }
}
