//! # Preference Toggle State Machine
//! Per-city states `unset` / `liked` / `disliked` and the transitions a
//! like/dislike press triggers. Pure planning logic lives here; the engine
//! orchestrates the optimistic apply, the remote call, and the rollback.
//!
//! Transition table (press × current state):
//! - unset    --like-->    liked     (remote: upsert like)
//! - unset    --dislike--> disliked  (remote: upsert dislike, hides city)
//! - liked    --like-->    unset     (remote: delete; re-press un-sets)
//! - disliked --dislike--> unset     (remote: delete; city may reappear)
//! - liked    --dislike--> disliked  (remote: upsert dislike, single call)
//! - disliked --like-->    liked     (remote: upsert like, single call)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::prefs::{PrefAction, PreferenceStore};

/// Local preference state of one city.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefState {
    #[default]
    Unset,
    Liked,
    Disliked,
}

impl PrefState {
    pub fn from_store(store: &PreferenceStore, city: &str) -> Self {
        match store.get(city) {
            Some(PrefAction::Like) => PrefState::Liked,
            Some(PrefAction::Dislike) => PrefState::Disliked,
            None => PrefState::Unset,
        }
    }
}

/// The remote persistence call a transition requires. Switching like↔dislike
/// is a single upsert, not delete-then-create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    Upsert(PrefAction),
    Delete,
}

/// A planned transition for one city.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub city: String,
    pub from: PrefState,
    pub to: PrefState,
    pub remote: RemoteOp,
}

/// Plan the transition a button press causes from the current state.
pub fn plan(city: &str, current: PrefState, pressed: PrefAction) -> Transition {
    let (to, remote) = match (current, pressed) {
        (PrefState::Unset, PrefAction::Like) => (PrefState::Liked, RemoteOp::Upsert(PrefAction::Like)),
        (PrefState::Unset, PrefAction::Dislike) => {
            (PrefState::Disliked, RemoteOp::Upsert(PrefAction::Dislike))
        }
        // Re-pressing the active action un-sets it.
        (PrefState::Liked, PrefAction::Like) | (PrefState::Disliked, PrefAction::Dislike) => {
            (PrefState::Unset, RemoteOp::Delete)
        }
        (PrefState::Liked, PrefAction::Dislike) => {
            (PrefState::Disliked, RemoteOp::Upsert(PrefAction::Dislike))
        }
        (PrefState::Disliked, PrefAction::Like) => {
            (PrefState::Liked, RemoteOp::Upsert(PrefAction::Like))
        }
    };
    Transition {
        city: city.to_string(),
        from: current,
        to,
        remote,
    }
}

/// Apply a state to the store (optimistic local write, or inverse replay).
pub fn apply(store: &mut PreferenceStore, city: &str, state: PrefState) {
    match state {
        PrefState::Unset => {
            store.remove(city);
        }
        PrefState::Liked => store.set(city, PrefAction::Like),
        PrefState::Disliked => store.set(city, PrefAction::Dislike),
    }
}

/// Token recorded while a transition's remote call is in flight. On failure
/// the engine replays `from` instead of leaving local and remote diverged;
/// the token's `to` lets it detect that a newer transition already overwrote
/// the city and skip the replay.
#[derive(Debug, Clone)]
pub struct PendingToggle {
    pub seq: u64,
    pub city: String,
    pub from: PrefState,
    pub to: PrefState,
    pub issued_at: DateTime<Utc>,
}

impl PendingToggle {
    pub fn new(seq: u64, t: &Transition) -> Self {
        Self {
            seq,
            city: t.city.clone(),
            from: t.from,
            to: t.to,
            issued_at: Utc::now(),
        }
    }

    /// Roll the store back to the pre-transition state, unless a newer write
    /// already moved the city elsewhere.
    pub fn rollback(&self, store: &mut PreferenceStore) -> bool {
        if PrefState::from_store(store, &self.city) != self.to {
            return false;
        }
        apply(store, &self.city, self.from);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_six_transitions() {
        let cases = [
            (PrefState::Unset, PrefAction::Like, PrefState::Liked, RemoteOp::Upsert(PrefAction::Like)),
            (PrefState::Unset, PrefAction::Dislike, PrefState::Disliked, RemoteOp::Upsert(PrefAction::Dislike)),
            (PrefState::Liked, PrefAction::Like, PrefState::Unset, RemoteOp::Delete),
            (PrefState::Disliked, PrefAction::Dislike, PrefState::Unset, RemoteOp::Delete),
            (PrefState::Liked, PrefAction::Dislike, PrefState::Disliked, RemoteOp::Upsert(PrefAction::Dislike)),
            (PrefState::Disliked, PrefAction::Like, PrefState::Liked, RemoteOp::Upsert(PrefAction::Like)),
        ];
        for (from, pressed, to, remote) in cases {
            let t = plan("Lisbon", from, pressed);
            assert_eq!(t.to, to, "{:?} --{:?}-->", from, pressed);
            assert_eq!(t.remote, remote);
        }
    }

    #[test]
    fn like_like_round_trips_to_unset() {
        let mut store = PreferenceStore::new();
        for pressed in [PrefAction::Like, PrefAction::Like] {
            let t = plan("Lisbon", PrefState::from_store(&store, "Lisbon"), pressed);
            apply(&mut store, "Lisbon", t.to);
        }
        assert_eq!(PrefState::from_store(&store, "Lisbon"), PrefState::Unset);

        for pressed in [PrefAction::Dislike, PrefAction::Dislike] {
            let t = plan("Berlin", PrefState::from_store(&store, "Berlin"), pressed);
            apply(&mut store, "Berlin", t.to);
        }
        assert_eq!(PrefState::from_store(&store, "Berlin"), PrefState::Unset);
        assert!(store.is_empty());
    }

    #[test]
    fn switch_is_single_upsert() {
        let mut store = PreferenceStore::new();
        apply(&mut store, "Lisbon", PrefState::Liked);
        let t = plan("Lisbon", PrefState::from_store(&store, "Lisbon"), PrefAction::Dislike);
        assert_eq!(t.remote, RemoteOp::Upsert(PrefAction::Dislike));
        apply(&mut store, "Lisbon", t.to);
        assert!(store.hidden_set().contains("Lisbon"));
    }

    #[test]
    fn rollback_restores_previous_state() {
        let mut store = PreferenceStore::new();
        let t = plan("Lisbon", PrefState::Unset, PrefAction::Dislike);
        apply(&mut store, "Lisbon", t.to);
        let pending = PendingToggle::new(1, &t);

        assert!(pending.rollback(&mut store));
        assert_eq!(PrefState::from_store(&store, "Lisbon"), PrefState::Unset);
    }

    #[test]
    fn rollback_skips_when_a_newer_write_won() {
        let mut store = PreferenceStore::new();
        let t = plan("Lisbon", PrefState::Unset, PrefAction::Dislike);
        apply(&mut store, "Lisbon", t.to);
        let pending = PendingToggle::new(1, &t);

        // A second toggle lands before the first one's failure comes back.
        apply(&mut store, "Lisbon", PrefState::Liked);
        assert!(!pending.rollback(&mut store));
        assert_eq!(PrefState::from_store(&store, "Lisbon"), PrefState::Liked);
    }
}
