//! Cookie-backed session store.
//!
//! Sessions live server-side in a shared map keyed by a random UUID; the
//! cookie only carries that id plus an integrity tag derived from the
//! configured secret, so a client cannot mint or forge a session id it was
//! never handed. A session is created on first nonce request, gains a
//! `user` only after a successful login, and is removed on logout.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Per-session state the login flow reads and writes.
#[derive(Clone, Debug, Default)]
pub struct Session {
    /// Outstanding challenge; overwritten by each new issuance.
    pub nonce: Option<String>,
    /// Authenticated identity (attendee email); set only by login.
    pub user: Option<String>,
}

#[derive(Clone)]
pub struct SessionStore {
    cookie_name: String,
    secret: String,
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl SessionStore {
    pub fn new(cookie_name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            secret: secret.into(),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn tag(&self, id: &Uuid) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(id.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn session_id_from_headers(&self, headers: &HeaderMap) -> Option<Uuid> {
        for value in headers.get_all(header::COOKIE) {
            let Ok(cookies) = value.to_str() else {
                continue;
            };
            for pair in cookies.split(';') {
                let Some((name, value)) = pair.trim().split_once('=') else {
                    continue;
                };
                if name != self.cookie_name {
                    continue;
                }
                let Some((id_part, tag_part)) = value.split_once('.') else {
                    continue;
                };
                let Ok(id) = Uuid::parse_str(id_part) else {
                    continue;
                };
                if tag_part == self.tag(&id) {
                    return Some(id);
                }
            }
        }
        None
    }

    /// Resolve the request's session, or mint a fresh one if the cookie is
    /// absent, forged, or refers to a destroyed session. A fresh session is
    /// not stored until [`SessionStore::save`].
    pub fn load_or_create(&self, headers: &HeaderMap) -> (Uuid, Session) {
        if let Some(id) = self.session_id_from_headers(headers) {
            let guard = self.sessions.read().expect("session store poisoned");
            if let Some(session) = guard.get(&id) {
                return (id, session.clone());
            }
        }
        (Uuid::new_v4(), Session::default())
    }

    pub fn save(&self, id: Uuid, session: Session) {
        self.sessions
            .write()
            .expect("session store poisoned")
            .insert(id, session);
    }

    pub fn get(&self, id: &Uuid) -> Option<Session> {
        self.sessions
            .read()
            .expect("session store poisoned")
            .get(id)
            .cloned()
    }

    /// Invalidate the session; a later `load_or_create` with the same
    /// cookie yields a fresh, unauthenticated session.
    pub fn destroy(&self, id: &Uuid) {
        self.sessions
            .write()
            .expect("session store poisoned")
            .remove(id);
    }

    /// `Set-Cookie` value binding the session to the client.
    pub fn cookie(&self, id: &Uuid) -> String {
        format!(
            "{}={}.{}; Path=/; HttpOnly; SameSite=Lax",
            self.cookie_name,
            id,
            self.tag(id)
        )
    }

    /// `Set-Cookie` value that expires the session cookie.
    pub fn clear_cookie(&self) -> String {
        format!("{}=; Path=/; Max-Age=0; HttpOnly", self.cookie_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn store() -> SessionStore {
        SessionStore::new("zugate_session", "test-secret")
    }

    fn headers_with_cookie(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        // The Set-Cookie attributes stay server-side; clients echo name=value.
        let pair = cookie.split(';').next().unwrap();
        headers.insert(header::COOKIE, HeaderValue::from_str(pair).unwrap());
        headers
    }

    #[test]
    fn fresh_request_gets_fresh_session() {
        let store = store();
        let (id, session) = store.load_or_create(&HeaderMap::new());
        assert!(session.nonce.is_none());
        assert!(session.user.is_none());
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn cookie_roundtrip_restores_session() {
        let store = store();
        let (id, mut session) = store.load_or_create(&HeaderMap::new());
        session.nonce = Some("123".to_string());
        store.save(id, session);

        let headers = headers_with_cookie(&store.cookie(&id));
        let (loaded_id, loaded) = store.load_or_create(&headers);
        assert_eq!(loaded_id, id);
        assert_eq!(loaded.nonce.as_deref(), Some("123"));
    }

    #[test]
    fn forged_tag_is_ignored() {
        let store = store();
        let (id, session) = store.load_or_create(&HeaderMap::new());
        store.save(id, session);

        let forged = format!("zugate_session={}.{}", id, "ab".repeat(32));
        let headers = headers_with_cookie(&forged);
        let (loaded_id, _) = store.load_or_create(&headers);
        assert_ne!(loaded_id, id);
    }

    #[test]
    fn cookie_signed_with_other_secret_is_ignored() {
        let store = store();
        let other = SessionStore::new("zugate_session", "other-secret");
        let (id, session) = store.load_or_create(&HeaderMap::new());
        store.save(id, session);

        let headers = headers_with_cookie(&other.cookie(&id));
        let (loaded_id, _) = store.load_or_create(&headers);
        assert_ne!(loaded_id, id);
    }

    #[test]
    fn destroy_invalidates_the_cookie() {
        let store = store();
        let (id, mut session) = store.load_or_create(&HeaderMap::new());
        session.user = Some("resident@zuzalu.org".to_string());
        store.save(id, session);

        store.destroy(&id);

        let headers = headers_with_cookie(&store.cookie(&id));
        let (loaded_id, loaded) = store.load_or_create(&headers);
        assert_ne!(loaded_id, id);
        assert!(loaded.user.is_none());
    }
}
