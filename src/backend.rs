//! # Backend Client
//! Thin REST client for the NomadMatch backend (search, auth, preferences,
//! premium advice). The trait keeps the engine testable: integration tests
//! substitute a mock without any HTTP in the loop.
//!
//! Every call has a bounded connect/request timeout, so a hung backend
//! surfaces as a typed error instead of an indefinite loading state.

use std::fmt;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::prefs::{PrefAction, PreferencesWire};

/// Marker error for 401/403 responses. Callers downcast to this to clear
/// the local session (expired/invalid token).
#[derive(Debug, Clone, Copy)]
pub struct Unauthorized;

impl fmt::Display for Unauthorized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "backend rejected the session token")
    }
}

impl std::error::Error for Unauthorized {}

/// True when an error chain contains an [`Unauthorized`] marker.
pub fn is_unauthorized(err: &anyhow::Error) -> bool {
    err.chain().any(|c| c.is::<Unauthorized>())
}

/* ----------------------------
Wire types
---------------------------- */

/// One search hit: free-form metadata plus the relevance under either of the
/// two observed keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawResult {
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub similarity_score: Option<f64>,
    #[serde(default)]
    pub score_pct: Option<f64>,
}

impl RawResult {
    pub fn relevance(&self) -> Option<f64> {
        self.similarity_score.or(self.score_pct)
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<RawResult>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    status: String,
}

/// Token issued by login/register.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthToken {
    pub access_token: String,
    #[serde(default)]
    pub is_premium: bool,
}

/// `GET /auth/me` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub email: String,
    #[serde(default)]
    pub is_premium: bool,
}

/// `POST /premium/advice` payload: city hits plus the advisory text from the
/// LLM pipeline (consumed verbatim, no parsing beyond this shape).
#[derive(Debug, Clone, Deserialize)]
pub struct PremiumAdviceWire {
    #[serde(default)]
    pub results: Vec<RawResult>,
    #[serde(default)]
    pub advice: String,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    num_results: u32,
}

#[derive(Serialize)]
struct CredentialsRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SetPreferenceRequest<'a> {
    city_name: &'a str,
    action: &'a str,
}

/* ----------------------------
Trait + HTTP implementation
---------------------------- */

/// Everything the engine needs from the backend.
#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn health(&self) -> Result<bool>;
    async fn query(&self, query: &str, num_results: u32) -> Result<Vec<RawResult>>;
    async fn login(&self, email: &str, password: &str) -> Result<AuthToken>;
    async fn register(&self, email: &str, password: &str) -> Result<AuthToken>;
    async fn me(&self, token: &str) -> Result<UserInfo>;
    async fn upgrade(&self, token: &str) -> Result<()>;
    async fn list_preferences(&self, token: &str) -> Result<PreferencesWire>;
    async fn set_preference(&self, token: &str, city: &str, action: PrefAction) -> Result<()>;
    async fn delete_preference(&self, token: &str, city: &str) -> Result<()>;
    async fn premium_advice(&self, token: &str, query: &str, num_results: u32)
        -> Result<PremiumAdviceWire>;
}

/// Reqwest-backed client against the configured base URL.
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(cfg: &EngineConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("nomadmatch-engine/0.1")
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url: cfg.api_base.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Map an HTTP status to the domain: 401/403 become the session marker,
/// other non-2xx become plain errors.
fn check_status(status: StatusCode, what: &str) -> Result<()> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(Unauthorized.into());
    }
    if !status.is_success() {
        bail!("{what} failed with status {status}");
    }
    Ok(())
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn health(&self) -> Result<bool> {
        let resp = self
            .http
            .get(self.url("/health"))
            .send()
            .await
            .context("GET /health")?;
        if !resp.status().is_success() {
            return Ok(false);
        }
        let body: HealthResponse = resp.json().await.context("decode /health")?;
        Ok(body.status == "healthy")
    }

    async fn query(&self, query: &str, num_results: u32) -> Result<Vec<RawResult>> {
        let resp = self
            .http
            .post(self.url("/query"))
            .json(&QueryRequest { query, num_results })
            .send()
            .await
            .context("POST /query")?;
        check_status(resp.status(), "search")?;
        let body: QueryResponse = resp.json().await.context("decode /query")?;
        Ok(body.results)
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthToken> {
        let resp = self
            .http
            .post(self.url("/auth/login"))
            .json(&CredentialsRequest { email, password })
            .send()
            .await
            .context("POST /auth/login")?;
        check_status(resp.status(), "login")?;
        resp.json().await.context("decode /auth/login")
    }

    async fn register(&self, email: &str, password: &str) -> Result<AuthToken> {
        let resp = self
            .http
            .post(self.url("/auth/register"))
            .json(&CredentialsRequest { email, password })
            .send()
            .await
            .context("POST /auth/register")?;
        check_status(resp.status(), "register")?;
        resp.json().await.context("decode /auth/register")
    }

    async fn me(&self, token: &str) -> Result<UserInfo> {
        let resp = self
            .http
            .get(self.url("/auth/me"))
            .bearer_auth(token)
            .send()
            .await
            .context("GET /auth/me")?;
        check_status(resp.status(), "me")?;
        resp.json().await.context("decode /auth/me")
    }

    async fn upgrade(&self, token: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.url("/auth/upgrade"))
            .bearer_auth(token)
            .send()
            .await
            .context("POST /auth/upgrade")?;
        check_status(resp.status(), "upgrade")
    }

    async fn list_preferences(&self, token: &str) -> Result<PreferencesWire> {
        let resp = self
            .http
            .get(self.url("/preferences/cities"))
            .bearer_auth(token)
            .send()
            .await
            .context("GET /preferences/cities")?;
        check_status(resp.status(), "list preferences")?;
        resp.json().await.context("decode /preferences/cities")
    }

    async fn set_preference(&self, token: &str, city: &str, action: PrefAction) -> Result<()> {
        let resp = self
            .http
            .post(self.url("/preferences/city"))
            .bearer_auth(token)
            .json(&SetPreferenceRequest {
                city_name: city,
                action: action.as_str(),
            })
            .send()
            .await
            .context("POST /preferences/city")?;
        check_status(resp.status(), "set preference")
    }

    async fn delete_preference(&self, token: &str, city: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(&format!("/preferences/city/{city}")))
            .bearer_auth(token)
            .send()
            .await
            .context("DELETE /preferences/city")?;
        check_status(resp.status(), "delete preference")
    }

    async fn premium_advice(
        &self,
        token: &str,
        query: &str,
        num_results: u32,
    ) -> Result<PremiumAdviceWire> {
        let resp = self
            .http
            .post(self.url("/premium/advice"))
            .bearer_auth(token)
            .json(&QueryRequest { query, num_results })
            .send()
            .await
            .context("POST /premium/advice")?;
        check_status(resp.status(), "premium advice")?;
        resp.json().await.context("decode /premium/advice")
    }
}
