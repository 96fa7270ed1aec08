//! # Session State
//! Logged-out / logged-in / premium state for the current user. Token
//! storage itself is the caller's concern (browser localStorage in the
//! original UI); the engine only holds the in-memory mirror.

use sha2::{Digest, Sha256};
use serde::Serialize;

use crate::backend::AuthToken;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Session {
    pub email: Option<String>,
    pub is_premium: bool,
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl Session {
    pub fn logged_in(&self) -> bool {
        self.token.is_some()
    }

    /// Establish a session from a fresh login/register token.
    pub fn establish(&mut self, email: &str, token: AuthToken) {
        self.email = Some(email.to_string());
        self.is_premium = token.is_premium;
        self.token = Some(token.access_token);
    }

    /// Drop everything; used on logout and on auth failure.
    pub fn clear(&mut self) {
        *self = Session::default();
    }
}

/// Short anonymized identifier for log lines. Emails are never logged raw.
pub fn anon_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn establish_and_clear() {
        let mut s = Session::default();
        assert!(!s.logged_in());

        s.establish(
            "nomad@example.test",
            AuthToken {
                access_token: "tok".into(),
                is_premium: true,
            },
        );
        assert!(s.logged_in());
        assert!(s.is_premium);

        s.clear();
        assert!(!s.logged_in());
        assert!(!s.is_premium);
        assert_eq!(s.email, None);
    }

    #[test]
    fn anon_hash_is_short_stable_and_distinct() {
        let a = anon_hash("nomad@example.test");
        let b = anon_hash("nomad@example.test");
        let c = anon_hash("other@example.test");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 12);
    }
}
