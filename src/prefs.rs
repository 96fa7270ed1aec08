//! # Preference Store
//! In-memory mapping of city name → like/dislike, mirrored to/from the
//! backend. The backend is the source of truth on load; between sync points
//! the local store is authoritative (optimistic updates).
//!
//! The hidden set is always derived from the map, never mutated on its own,
//! so it cannot drift from the preferences that define it.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// A user's binary verdict on a city. Single-slot: a city is never liked and
/// disliked at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefAction {
    Like,
    Dislike,
}

impl PrefAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrefAction::Like => "like",
            PrefAction::Dislike => "dislike",
        }
    }
}

/// City name → action. Keys are the backend-delivered display names,
/// case-sensitive, with no canonicalization applied.
#[derive(Debug, Clone, Default)]
pub struct PreferenceStore {
    map: HashMap<String, PrefAction>,
}

impl PreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, city: &str) -> Option<PrefAction> {
        self.map.get(city).copied()
    }

    pub fn set(&mut self, city: impl Into<String>, action: PrefAction) {
        self.map.insert(city.into(), action);
    }

    /// Remove an entry; returns the action that was stored, if any.
    pub fn remove(&mut self, city: &str) -> Option<PrefAction> {
        self.map.remove(city)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Cities excluded from the feed: exactly the disliked subset,
    /// recomputed on every call.
    pub fn hidden_set(&self) -> HashSet<String> {
        self.map
            .iter()
            .filter(|(_, a)| **a == PrefAction::Dislike)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Liked city names, unordered; callers order them via the last ranking.
    pub fn liked(&self) -> HashSet<String> {
        self.map
            .iter()
            .filter(|(_, a)| **a == PrefAction::Like)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Replace the whole store from a backend listing (login / reload).
    pub fn replace_from_wire(&mut self, wire: PreferencesWire) {
        self.map = wire.into_map();
    }
}

/* ----------------------------
Wire shapes
---------------------------- */

/// One entry of the `{preferences: [...]}` listing shape. The action is a
/// plain string on the wire; unknown values are dropped with a warning.
#[derive(Debug, Clone, Deserialize)]
pub struct PreferenceEntryWire {
    pub city_name: String,
    pub action: String,
}

/// Both observed response shapes of `GET /preferences/cities`. Older
/// backends return `{likes: [...], dislikes: [...]}`; newer ones return
/// `{preferences: [{city_name, action}]}` (sometimes with the split lists
/// alongside, which the first variant absorbs).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PreferencesWire {
    Entries {
        preferences: Vec<PreferenceEntryWire>,
    },
    Split {
        #[serde(default)]
        likes: Vec<String>,
        #[serde(default)]
        dislikes: Vec<String>,
    },
}

impl PreferencesWire {
    fn into_map(self) -> HashMap<String, PrefAction> {
        let mut map = HashMap::new();
        match self {
            PreferencesWire::Entries { preferences } => {
                for e in preferences {
                    match e.action.as_str() {
                        "like" => {
                            map.insert(e.city_name, PrefAction::Like);
                        }
                        "dislike" => {
                            map.insert(e.city_name, PrefAction::Dislike);
                        }
                        other => {
                            warn!(action = other, city = %e.city_name, "unknown preference action, dropped");
                        }
                    }
                }
            }
            PreferencesWire::Split { likes, dislikes } => {
                for name in likes {
                    map.insert(name, PrefAction::Like);
                }
                // Dislikes win when a name appears in both lists.
                for name in dislikes {
                    map.insert(name, PrefAction::Dislike);
                }
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_slot_map() {
        let mut store = PreferenceStore::new();
        store.set("Lisbon", PrefAction::Like);
        store.set("Lisbon", PrefAction::Dislike);
        assert_eq!(store.get("Lisbon"), Some(PrefAction::Dislike));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn hidden_set_is_exactly_the_dislikes() {
        let mut store = PreferenceStore::new();
        store.set("Lisbon", PrefAction::Like);
        store.set("Berlin", PrefAction::Dislike);
        store.set("Prague", PrefAction::Dislike);
        let hidden = store.hidden_set();
        assert_eq!(hidden.len(), 2);
        assert!(hidden.contains("Berlin") && hidden.contains("Prague"));
        assert!(!hidden.contains("Lisbon"));

        store.remove("Berlin");
        assert_eq!(store.hidden_set().len(), 1);
    }

    #[test]
    fn keys_are_case_sensitive_verbatim() {
        let mut store = PreferenceStore::new();
        store.set("Lisbon", PrefAction::Dislike);
        assert_eq!(store.get("lisbon"), None);
        assert_eq!(store.get("Lisbon"), Some(PrefAction::Dislike));
    }

    #[test]
    fn entries_wire_shape_parses() {
        let wire: PreferencesWire = serde_json::from_str(
            r#"{"preferences":[{"city_name":"Lisbon","action":"like"},
                               {"city_name":"Berlin","action":"dislike"},
                               {"city_name":"Oslo","action":"meh"}]}"#,
        )
        .unwrap();
        let mut store = PreferenceStore::new();
        store.replace_from_wire(wire);
        assert_eq!(store.get("Lisbon"), Some(PrefAction::Like));
        assert_eq!(store.get("Berlin"), Some(PrefAction::Dislike));
        // Unknown action dropped.
        assert_eq!(store.get("Oslo"), None);
    }

    #[test]
    fn split_wire_shape_parses() {
        let wire: PreferencesWire = serde_json::from_str(
            r#"{"likes":["Lisbon","Porto"],"dislikes":["Berlin"]}"#,
        )
        .unwrap();
        let mut store = PreferenceStore::new();
        store.replace_from_wire(wire);
        assert_eq!(store.len(), 3);
        assert_eq!(store.get("Porto"), Some(PrefAction::Like));
        assert_eq!(store.hidden_set().len(), 1);
    }

    #[test]
    fn combined_response_prefers_entry_list() {
        // Some backend versions send all three keys; the entry list carries
        // the same data and must win.
        let wire: PreferencesWire = serde_json::from_str(
            r#"{"preferences":[{"city_name":"Lisbon","action":"like"}],
                "likes":["Lisbon"],"dislikes":[]}"#,
        )
        .unwrap();
        assert!(matches!(wire, PreferencesWire::Entries { .. }));
    }
}
