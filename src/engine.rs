//! # Match Engine
//! The application-state object behind the UI: owns the preference store,
//! the session, and the last computed ranking, and funnels every mutation
//! through the search pipeline or the toggle transition function.
//!
//! Concurrency: callers may interleave searches, toggles, and view switches
//! freely. All shared state sits behind locks that are never held across an
//! await; outbound searches carry a monotonically increasing generation and
//! a response is discarded when a newer search was issued meanwhile.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{is_unauthorized, BackendApi};
use crate::config::EngineConfig;
use crate::fallback;
use crate::feed::{self, Feed, FeedOutcome, ScoredCity};
use crate::metrics;
use crate::normalizer::{self, CityRecord};
use crate::prefs::{PrefAction, PreferenceStore};
use crate::scoring::UserPreferenceSet;
use crate::session::{anon_hash, Session};
use crate::toggle::{self, PendingToggle, PrefState, RemoteOp};

/// Query sent for the premium visa/tax advice view.
const PREMIUM_QUERY: &str = "visa and tax guidance for digital nomads";

/// Which tab the user is looking at; decides what refreshes after a toggle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActiveView {
    #[default]
    Feed,
    Favorites,
}

/// What the renderer needs from one composed feed.
#[derive(Debug, Clone, Serialize)]
pub struct FeedSnapshot {
    /// The first [`feed::FEED_DISPLAY_LIMIT`] entries.
    pub visible: Vec<ScoredCity>,
    /// Length of the full retained ranking.
    pub total_ranked: usize,
    pub outcome: FeedOutcome,
    /// True when the embedded catalog substituted for live search.
    pub degraded: bool,
}

/// Result of one search pass.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Completed(FeedSnapshot),
    /// A newer search was issued while this one was in flight; its response
    /// was dropped and the newer one owns the feed.
    Superseded,
}

/// What a successful toggle refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewRefresh {
    FeedRecomposed,
    FavoritesReloaded,
}

#[derive(Debug, Clone)]
pub struct ToggleOutcome {
    pub city: String,
    pub from: PrefState,
    pub to: PrefState,
    pub refreshed: ViewRefresh,
}

/// Advice payload for the premium tab: normalized city records plus the
/// advisory text passed through verbatim.
#[derive(Debug, Clone)]
pub struct PremiumGuidance {
    pub cities: Vec<CityRecord>,
    pub advice: String,
}

/// Last ranking pass: captured preferences, the full scored set (recompose
/// input), and the composed feed.
struct Ranking {
    generation: u64,
    preferences: UserPreferenceSet,
    scored: Vec<ScoredCity>,
    feed: Feed,
    degraded: bool,
}

pub struct MatchEngine {
    cfg: EngineConfig,
    backend: Arc<dyn BackendApi>,
    prefs: RwLock<PreferenceStore>,
    session: RwLock<Session>,
    ranking: RwLock<Option<Ranking>>,
    active_view: RwLock<ActiveView>,
    search_gen: AtomicU64,
    toggle_seq: AtomicU64,
}

/// The semantic query string sent to the retrieval layer.
pub fn build_query(p: &UserPreferenceSet) -> String {
    let mut q = format!(
        "European city for nomads. Budget: {}, Climate: {}.",
        p.budget.as_str(),
        p.climate.as_str()
    );
    if p.visa_needed {
        q.push_str(" Needs digital nomad visa.");
    }
    q.push_str(&format!(" Vibes: {}", p.vibes.join(", ")));
    q
}

impl MatchEngine {
    pub fn new(cfg: EngineConfig, backend: Arc<dyn BackendApi>) -> Self {
        metrics::ensure_described();
        Self {
            cfg,
            backend,
            prefs: RwLock::new(PreferenceStore::new()),
            session: RwLock::new(Session::default()),
            ranking: RwLock::new(None),
            active_view: RwLock::new(ActiveView::default()),
            search_gen: AtomicU64::new(0),
            toggle_seq: AtomicU64::new(0),
        }
    }

    /* ----------------------------
    Search pipeline
    ---------------------------- */

    /// Run one search pass: query the backend, substitute the embedded
    /// catalog when the live result set is unusable, then normalize, score,
    /// and compose. Never fails: degraded mode covers backend errors.
    pub async fn run_search(&self, preferences: UserPreferenceSet) -> SearchOutcome {
        metrics::incr(metrics::SEARCHES_TOTAL);
        let generation = self.search_gen.fetch_add(1, Ordering::SeqCst) + 1;
        let query = build_query(&preferences);
        debug!(generation, query = %query, "search issued");

        let (raw, degraded) = match self.backend.query(&query, self.cfg.num_results).await {
            Ok(results) if results.len() >= self.cfg.min_live_results => (results, false),
            Ok(results) => {
                warn!(
                    live = results.len(),
                    min = self.cfg.min_live_results,
                    "too few live results, serving embedded catalog"
                );
                metrics::incr(metrics::SEARCH_FALLBACK_TOTAL);
                (fallback::catalog().to_vec(), true)
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "search failed, serving embedded catalog");
                metrics::incr(metrics::SEARCH_FALLBACK_TOTAL);
                (fallback::catalog().to_vec(), true)
            }
        };

        // A newer search may have been issued while this one was in flight.
        if self.search_gen.load(Ordering::SeqCst) != generation {
            debug!(generation, "stale search response dropped");
            metrics::incr(metrics::SEARCH_SUPERSEDED_TOTAL);
            return SearchOutcome::Superseded;
        }

        let scored: Vec<ScoredCity> = raw
            .iter()
            .map(|r| {
                let city = normalizer::normalize(&r.metadata, r.relevance());
                ScoredCity::derive(city, &preferences)
            })
            .collect();

        let hidden = self.read_prefs().hidden_set();
        let composed = feed::compose(scored.clone(), &preferences, &hidden);
        let ranking = Ranking {
            generation,
            preferences,
            scored,
            feed: composed,
            degraded,
        };
        let snapshot = snapshot_of(&ranking);

        {
            let mut guard = self.ranking.write().expect("ranking lock poisoned");
            // An even newer pass may have completed while composing.
            if guard.as_ref().is_some_and(|r| r.generation > generation) {
                metrics::incr(metrics::SEARCH_SUPERSEDED_TOTAL);
                return SearchOutcome::Superseded;
            }
            *guard = Some(ranking);
        }
        info!(
            generation,
            ranked = snapshot.total_ranked,
            degraded,
            outcome = ?snapshot.outcome,
            "search completed"
        );
        SearchOutcome::Completed(snapshot)
    }

    /// The current feed, if a search has completed.
    pub fn feed_snapshot(&self) -> Option<FeedSnapshot> {
        let guard = self.ranking.read().expect("ranking lock poisoned");
        guard.as_ref().map(snapshot_of)
    }

    /// Preferences captured by the last completed search, for dependent views.
    pub fn last_preferences(&self) -> Option<UserPreferenceSet> {
        let guard = self.ranking.read().expect("ranking lock poisoned");
        guard.as_ref().map(|r| r.preferences.clone())
    }

    /// Recompose the retained ranking against the current hidden set
    /// (after a toggle or a preference reload). No re-query, no re-score.
    pub fn recompose_feed(&self) -> Option<FeedSnapshot> {
        let hidden = self.read_prefs().hidden_set();
        let mut guard = self.ranking.write().expect("ranking lock poisoned");
        let r = guard.as_mut()?;
        r.feed = feed::compose(r.scored.clone(), &r.preferences, &hidden);
        Some(snapshot_of(r))
    }

    /// Liked cities in the order of the last composed ranking; reuses the
    /// retained sequence instead of re-querying.
    pub fn favorites(&self) -> Vec<ScoredCity> {
        let liked = self.read_prefs().liked();
        let guard = self.ranking.read().expect("ranking lock poisoned");
        match guard.as_ref() {
            Some(r) => r
                .feed
                .ranking
                .iter()
                .filter(|sc| liked.contains(&sc.city.name))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /* ----------------------------
    Preference toggling
    ---------------------------- */

    /// One like/dislike press: optimistic local transition, remote persist,
    /// inverse replay on failure, then refresh of whichever view is active.
    pub async fn toggle_city(&self, city: &str, pressed: PrefAction) -> Result<ToggleOutcome> {
        let Some(token) = self.token() else {
            bail!("sign in to save city preferences");
        };

        // Optimistic apply under the write lock, before the remote call.
        let transition = {
            let mut store = self.prefs.write().expect("prefs lock poisoned");
            let t = toggle::plan(city, PrefState::from_store(&store, city), pressed);
            toggle::apply(&mut store, city, t.to);
            t
        };
        let seq = self.toggle_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let pending = PendingToggle::new(seq, &transition);
        metrics::incr(metrics::TOGGLES_TOTAL);
        debug!(seq, city, from = ?transition.from, to = ?transition.to, "toggle applied locally");

        let remote = match transition.remote {
            RemoteOp::Upsert(action) => self.backend.set_preference(&token, city, action).await,
            RemoteOp::Delete => self.backend.delete_preference(&token, city).await,
        };

        if let Err(e) = remote {
            // Replay the inverse transition instead of leaving local state
            // silently diverged from the backend.
            let rolled_back = {
                let mut store = self.prefs.write().expect("prefs lock poisoned");
                pending.rollback(&mut store)
            };
            if rolled_back {
                metrics::incr(metrics::TOGGLE_ROLLBACK_TOTAL);
                warn!(seq, city, "preference save failed, local state rolled back");
            }
            if is_unauthorized(&e) {
                self.session.write().expect("session lock poisoned").clear();
                warn!("session token rejected, reverted to logged-out state");
            }
            return Err(e.context(format!("saving preference for {city}")));
        }

        let refreshed = match self.active_view() {
            ActiveView::Feed => {
                self.recompose_feed();
                ViewRefresh::FeedRecomposed
            }
            ActiveView::Favorites => {
                // Favorites mirrors the backend; reload it so the list
                // reflects what was actually persisted.
                if let Err(e) = self.load_preferences().await {
                    warn!(error = %format!("{e:#}"), "favorites reload failed, keeping local state");
                }
                ViewRefresh::FavoritesReloaded
            }
        };

        Ok(ToggleOutcome {
            city: transition.city,
            from: transition.from,
            to: transition.to,
            refreshed,
        })
    }

    /* ----------------------------
    Session & remote preference sync
    ---------------------------- */

    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        let token = self.backend.login(email, password).await.context("login")?;
        info!(user = %anon_hash(email), premium = token.is_premium, "logged in");
        self.session
            .write()
            .expect("session lock poisoned")
            .establish(email, token);
        self.sync_preferences_best_effort().await;
        Ok(())
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<()> {
        let token = self
            .backend
            .register(email, password)
            .await
            .context("register")?;
        info!(user = %anon_hash(email), "registered");
        self.session
            .write()
            .expect("session lock poisoned")
            .establish(email, token);
        self.sync_preferences_best_effort().await;
        Ok(())
    }

    /// Validate a stored token against `/auth/me`. Returns false (and stays
    /// logged out) when the backend rejects it; network errors propagate.
    pub async fn restore_session(&self, token: &str) -> Result<bool> {
        match self.backend.me(token).await {
            Ok(user) => {
                info!(user = %anon_hash(&user.email), premium = user.is_premium, "session restored");
                {
                    let mut s = self.session.write().expect("session lock poisoned");
                    s.email = Some(user.email);
                    s.is_premium = user.is_premium;
                    s.token = Some(token.to_string());
                }
                self.sync_preferences_best_effort().await;
                Ok(true)
            }
            Err(e) if is_unauthorized(&e) => {
                self.session.write().expect("session lock poisoned").clear();
                Ok(false)
            }
            Err(e) => Err(e.context("restore session")),
        }
    }

    /// Drop the session and the local preference mirror, then recompose so
    /// previously hidden cities become eligible again.
    pub fn logout(&self) {
        self.session.write().expect("session lock poisoned").clear();
        *self.prefs.write().expect("prefs lock poisoned") = PreferenceStore::new();
        self.recompose_feed();
        info!("logged out");
    }

    pub async fn upgrade(&self) -> Result<()> {
        let Some(token) = self.token() else {
            bail!("sign in before upgrading");
        };
        self.backend.upgrade(&token).await.context("upgrade")?;
        self.session
            .write()
            .expect("session lock poisoned")
            .is_premium = true;
        info!("account upgraded to premium");
        Ok(())
    }

    /// Reload the preference mirror from the backend (source of truth on
    /// load) and recompose the feed against the fresh hidden set.
    pub async fn load_preferences(&self) -> Result<()> {
        let Some(token) = self.token() else {
            bail!("sign in to load preferences");
        };
        let wire = match self.backend.list_preferences(&token).await {
            Ok(w) => w,
            Err(e) if is_unauthorized(&e) => {
                self.session.write().expect("session lock poisoned").clear();
                return Err(e.context("loading preferences"));
            }
            Err(e) => return Err(e.context("loading preferences")),
        };
        {
            let mut store = self.prefs.write().expect("prefs lock poisoned");
            store.replace_from_wire(wire);
            debug!(entries = store.len(), "preferences loaded");
        }
        self.recompose_feed();
        Ok(())
    }

    async fn sync_preferences_best_effort(&self) {
        if let Err(e) = self.load_preferences().await {
            warn!(error = %format!("{e:#}"), "preference sync failed, starting from an empty mirror");
        }
    }

    /* ----------------------------
    Premium & status
    ---------------------------- */

    /// Fetch the premium visa/tax guidance. Requires a premium session.
    pub async fn premium_guidance(&self) -> Result<PremiumGuidance> {
        let (token, is_premium) = {
            let s = self.session.read().expect("session lock poisoned");
            (s.token.clone(), s.is_premium)
        };
        let Some(token) = token else {
            bail!("sign in to access premium guidance");
        };
        if !is_premium {
            bail!("premium guidance requires an upgraded account");
        }
        let wire = match self
            .backend
            .premium_advice(&token, PREMIUM_QUERY, self.cfg.premium_num_results)
            .await
        {
            Err(e) if is_unauthorized(&e) => {
                self.session.write().expect("session lock poisoned").clear();
                return Err(e.context("premium guidance"));
            }
            other => other.context("premium guidance")?,
        };
        let cities = wire
            .results
            .iter()
            .map(|r| normalizer::normalize(&r.metadata, r.relevance()))
            .collect();
        Ok(PremiumGuidance {
            cities,
            advice: wire.advice,
        })
    }

    /// Backend reachability for the status indicator; any error reads as
    /// unhealthy.
    pub async fn health(&self) -> bool {
        self.backend.health().await.unwrap_or(false)
    }

    pub fn session_snapshot(&self) -> Session {
        self.session.read().expect("session lock poisoned").clone()
    }

    pub fn set_active_view(&self, view: ActiveView) {
        *self.active_view.write().expect("view lock poisoned") = view;
    }

    pub fn active_view(&self) -> ActiveView {
        *self.active_view.read().expect("view lock poisoned")
    }

    fn token(&self) -> Option<String> {
        self.session
            .read()
            .expect("session lock poisoned")
            .token
            .clone()
    }

    fn read_prefs(&self) -> std::sync::RwLockReadGuard<'_, PreferenceStore> {
        self.prefs.read().expect("prefs lock poisoned")
    }
}

fn snapshot_of(r: &Ranking) -> FeedSnapshot {
    FeedSnapshot {
        visible: r.feed.visible().to_vec(),
        total_ranked: r.feed.ranking.len(),
        outcome: r.feed.outcome,
        degraded: r.degraded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::climate::Climate;
    use crate::scoring::Budget;

    #[test]
    fn query_mentions_every_preference() {
        let p = UserPreferenceSet::new(
            Budget::Moderate,
            Climate::Warm,
            true,
            vec!["beach".into(), "nightlife".into()],
        );
        let q = build_query(&p);
        assert_eq!(
            q,
            "European city for nomads. Budget: moderate, Climate: warm. \
             Needs digital nomad visa. Vibes: beach, nightlife"
        );
    }

    #[test]
    fn query_without_visa_or_vibes() {
        let p = UserPreferenceSet::new(Budget::Affordable, Climate::Cool, false, Vec::new());
        let q = build_query(&p);
        assert!(!q.contains("visa"));
        assert!(q.ends_with("Vibes: "));
    }
}
