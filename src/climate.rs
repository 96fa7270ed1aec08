//! # Climate Bucketer
//! Substring rules that decide whether a city matches a requested climate.
//!
//! The same matching tests feed two consumers: the scoring engine's climate
//! multiplier and the feed composer's partition gate. Both go through the
//! helpers below so the two can never drift apart.

use serde::{Deserialize, Serialize};

use crate::normalizer::CityRecord;

/// Requested climate from the questionnaire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Climate {
    Warm,
    Mild,
    Cool,
}

impl Climate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Climate::Warm => "warm",
            Climate::Mild => "mild",
            Climate::Cool => "cool",
        }
    }
}

/// Case-insensitive substring test against the summer-temperature label.
fn summer_has(city: &CityRecord, needles: &[&str]) -> bool {
    let s = city.summer_temp.to_ascii_lowercase();
    needles.iter().any(|n| s.contains(n))
}

/// Case-insensitive substring test against the region label.
fn region_has(city: &CityRecord, needle: &str) -> bool {
    city.region.to_ascii_lowercase().contains(needle)
}

/// True when the city's summer/region labels satisfy the requested climate.
///
/// Missing labels (empty or "N/A") simply fail the substring tests, so an
/// unlabeled city lands in the "does not meet" bucket.
pub fn meets_climate(city: &CityRecord, pref: Climate) -> bool {
    match pref {
        Climate::Warm => summer_has(city, &["warm", "hot"]) || region_has(city, "southern"),
        Climate::Mild => summer_has(city, &["mild"]) || region_has(city, "central"),
        Climate::Cool => summer_has(city, &["cool", "cold"]) || region_has(city, "northern"),
    }
}

/// Score multiplier for the climate step.
///
/// Climate is the dominant signal: it re-ranks aggressively on top of the
/// coarse retrieval similarity. The `warm` branch keeps a middle tier for
/// mild summers; `mild` and `cool` are binary.
pub fn climate_multiplier(city: &CityRecord, pref: Climate) -> f64 {
    match pref {
        Climate::Warm => {
            if meets_climate(city, Climate::Warm) {
                2.0
            } else if summer_has(city, &["mild"]) {
                0.8
            } else {
                0.3
            }
        }
        Climate::Mild => {
            if meets_climate(city, Climate::Mild) {
                1.5
            } else {
                0.5
            }
        }
        Climate::Cool => {
            if meets_climate(city, Climate::Cool) {
                1.5
            } else {
                0.5
            }
        }
    }
}
