//! # Scoring Engine
//! Pure, testable logic that maps `(city, preferences, relevance)` → a 0-100
//! match score. No I/O, suitable for unit tests and offline evaluation.
//!
//! The multipliers are deliberately multiplicative and aggressive on climate:
//! the retrieval layer's similarity is a coarse signal, and users weight
//! "will I actually enjoy the weather" far above semantic closeness, so this
//! is a re-ranking layer on top of retrieval, not a blend with it.

use serde::{Deserialize, Serialize};

use crate::climate::{climate_multiplier, Climate};
use crate::normalizer::CityRecord;

/// Budget tier from the questionnaire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Budget {
    Affordable,
    Moderate,
    Expensive,
}

impl Budget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Budget::Affordable => "affordable",
            Budget::Moderate => "moderate",
            Budget::Expensive => "expensive",
        }
    }
}

/// One submitted questionnaire. Captured immutably per ranking pass and kept
/// as `last_preferences` so dependent views reuse the same inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferenceSet {
    pub budget: Budget,
    pub climate: Climate,
    pub visa_needed: bool,
    /// Matching is order-insensitive; selection order is kept for display.
    pub vibes: Vec<String>,
}

impl UserPreferenceSet {
    pub fn new(budget: Budget, climate: Climate, visa_needed: bool, vibes: Vec<String>) -> Self {
        Self {
            budget,
            climate,
            visa_needed,
            vibes,
        }
    }
}

/// Score multiplier applied per matching requested vibe, compounding.
const VIBE_MULTIPLIER: f64 = 1.1;
/// Base score when the retrieval layer provided no relevance at all.
const DEFAULT_BASE: f64 = 50.0;

/// Compute the display score for one city.
///
/// `base_relevance` accepts both observed encodings: a [0,1] similarity
/// fraction or an already-scaled 0-100 percentage.
pub fn score(city: &CityRecord, prefs: &UserPreferenceSet, base_relevance: Option<f64>) -> u8 {
    // 1) Base: percentage as-is, fraction scaled up, default 50 when absent.
    let mut s = match base_relevance {
        Some(r) if r <= 1.0 => r * 100.0,
        Some(r) => r,
        None => DEFAULT_BASE,
    };

    // 2) Climate multiplier (dominant signal).
    s *= climate_multiplier(city, prefs.climate);

    // 3) Visa multiplier, only when the user asked for visa availability.
    //    Unknown availability behaves as "not available".
    if prefs.visa_needed {
        s *= if city.visa_available.is_available() {
            1.3
        } else {
            0.6
        };
    }

    // 4) Vibe multiplier: x1.1 per requested tag found in the city's vibe
    //    text, compounding (three matches → x1.1^3).
    let vibe_text = city.vibe_tags.join(", ").to_lowercase();
    for vibe in &prefs.vibes {
        let v = vibe.trim().to_lowercase();
        if !v.is_empty() && vibe_text.contains(&v) {
            s *= VIBE_MULTIPLIER;
        }
    }

    // 5) Clamp to [0, 100] and round to the nearest integer.
    s.clamp(0.0, 100.0).round() as u8
}
