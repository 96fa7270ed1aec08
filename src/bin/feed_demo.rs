//! Demo that runs one questionnaire through the full pipeline against the
//! configured backend (or, with the backend down, the embedded catalog).

use std::sync::Arc;

use nomadmatch_engine::{
    Budget, Climate, EngineConfig, HttpBackend, MatchEngine, SearchOutcome, UserPreferenceSet,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cfg = EngineConfig::load();
    let engine = MatchEngine::new(cfg.clone(), Arc::new(HttpBackend::new(&cfg)));

    println!("backend healthy: {}", engine.health().await);

    let prefs = UserPreferenceSet::new(
        Budget::Moderate,
        Climate::Warm,
        true,
        vec!["beach".into(), "creative".into()],
    );

    match engine.run_search(prefs).await {
        SearchOutcome::Completed(snapshot) => {
            println!(
                "{} cities ranked ({}, degraded: {})",
                snapshot.total_ranked,
                format!("{:?}", snapshot.outcome).to_lowercase(),
                snapshot.degraded
            );
            for (i, sc) in snapshot.visible.iter().enumerate() {
                println!(
                    "#{} {} ({}): score {}, climate match: {}",
                    i + 1,
                    sc.city.name,
                    sc.city.country,
                    sc.display_score,
                    sc.meets_climate
                );
            }
        }
        SearchOutcome::Superseded => println!("search superseded"),
    }
}
