//! zugate-backend
//!
//! Axum HTTP service that authenticates users by verifying a zero-knowledge
//! proof of event-ticket ownership. The flow is a nonce-based challenge
//! handshake: `GET /api/nonce` issues a session-bound challenge, the client
//! obtains a PCD watermarked with it from an external prover, and
//! `POST /api/login` runs the proof through an ordered validation pipeline
//! (authenticity, nonce binding, ticket classification, nullifier
//! freshness) before establishing the session identity.

use std::{env, sync::Arc};

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;
use zugate_pcd::{EdDsaPublicKey, PcdError, ProofVerifier, ZkTicketPcd};

pub mod nonce;
pub mod nullifier;
pub mod session;
pub mod tickets;

use nullifier::NullifierStore;
use session::{Session, SessionStore};
use tickets::TicketRegistry;

const PUBLIC_KEY_ENV: &str = "ZUGATE_PUBLIC_KEY";
const COOKIE_NAME_ENV: &str = "ZUGATE_SESSION_COOKIE_NAME";
const COOKIE_SECRET_ENV: &str = "ZUGATE_SESSION_PASSWORD";
const TICKETS_PATH_ENV: &str = "ZUGATE_TICKETS_PATH";
const DEFAULT_COOKIE_NAME: &str = "zugate_session";

const CODE_PCD_MISSING: &str = "PCD_MISSING";
const CODE_PCD_MALFORMED: &str = "PCD_MALFORMED";
const CODE_PCD_INVALID: &str = "PCD_INVALID";
const CODE_WATERMARK_MISMATCH: &str = "WATERMARK_MISMATCH";
const CODE_TICKET_INCOMPLETE: &str = "TICKET_INCOMPLETE";
const CODE_TICKET_UNSUPPORTED: &str = "TICKET_UNSUPPORTED";
const CODE_NULLIFIER_MISSING: &str = "NULLIFIER_MISSING";
const CODE_NULLIFIER_REPLAY: &str = "NULLIFIER_REPLAY";
const CODE_INTERNAL: &str = "INTERNAL_SERVER_ERROR";

/// Immutable startup configuration, constructed once and passed by
/// reference through [`AppState`].
#[derive(Clone, Debug)]
pub struct GateConfig {
    /// Public key of the recognized ticket issuer.
    pub signer_public_key: EdDsaPublicKey,
    pub cookie_name: String,
    pub cookie_secret: String,
}

impl GateConfig {
    pub fn new(
        signer_public_key: EdDsaPublicKey,
        cookie_name: impl Into<String>,
        cookie_secret: impl Into<String>,
    ) -> Self {
        Self {
            signer_public_key,
            cookie_name: cookie_name.into(),
            cookie_secret: cookie_secret.into(),
        }
    }

    /// Read configuration from the environment. The signer key is a JSON
    /// array of two hex field elements; a missing or unparseable value
    /// fails startup.
    pub fn from_env() -> Self {
        let raw_key = env::var(PUBLIC_KEY_ENV).unwrap_or_else(|_| {
            panic!("{PUBLIC_KEY_ENV} must be set to the ticket issuer public key")
        });
        let signer_public_key: EdDsaPublicKey = serde_json::from_str(&raw_key)
            .unwrap_or_else(|err| panic!("failed to parse {PUBLIC_KEY_ENV}: {err}"));

        let cookie_name =
            env::var(COOKIE_NAME_ENV).unwrap_or_else(|_| DEFAULT_COOKIE_NAME.to_string());
        let cookie_secret = env::var(COOKIE_SECRET_ENV)
            .unwrap_or_else(|_| panic!("{COOKIE_SECRET_ENV} must be set to the session secret"));

        Self {
            signer_public_key,
            cookie_name,
            cookie_secret,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    config: Arc<GateConfig>,
    registry: Arc<TicketRegistry>,
    sessions: SessionStore,
    nullifiers: NullifierStore,
    verifier: Arc<dyn ProofVerifier>,
}

impl AppState {
    /// State with in-memory stores; the nullifier backend can be swapped
    /// via [`AppState::with_components`].
    pub fn new(
        config: GateConfig,
        registry: TicketRegistry,
        verifier: Arc<dyn ProofVerifier>,
    ) -> Self {
        let sessions = SessionStore::new(config.cookie_name.clone(), config.cookie_secret.clone());
        Self::with_components(config, registry, sessions, NullifierStore::in_memory(), verifier)
    }

    pub fn with_components(
        config: GateConfig,
        registry: TicketRegistry,
        sessions: SessionStore,
        nullifiers: NullifierStore,
        verifier: Arc<dyn ProofVerifier>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            sessions,
            nullifiers,
            verifier,
        }
    }

    /// Environment-driven state for the binary: built-in Zuzalu registry
    /// unless `ZUGATE_TICKETS_PATH` overrides it, nullifier backend per
    /// `ZUGATE_NULLIFIER_DB`.
    pub fn from_env(verifier: Arc<dyn ProofVerifier>) -> Self {
        let config = GateConfig::from_env();
        let registry = match env::var(TICKETS_PATH_ENV) {
            Ok(path) => TicketRegistry::from_path(path, &config.signer_public_key),
            Err(_) => TicketRegistry::zuzalu(&config.signer_public_key),
        };
        let sessions = SessionStore::new(config.cookie_name.clone(), config.cookie_secret.clone());
        Self::with_components(config, registry, sessions, NullifierStore::from_env(), verifier)
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn registry(&self) -> &TicketRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn nullifier_store(&self) -> &NullifierStore {
        &self.nullifiers
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    fn unauthorized(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code, message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, CODE_INTERNAL, message)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    error_code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            error_code: self.code,
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    pcd: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    attendee_email: String,
}

#[derive(Serialize)]
struct LogoutResponse {
    ok: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventsResponse {
    supported_events: Vec<Uuid>,
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/api/nonce", get(nonce_handler))
        .route("/api/login", post(login_handler))
        .route("/api/logout", get(logout_handler))
        .route("/api/events", get(events_handler))
        .layer(cors)
        .with_state(state)
}

async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Hello World" }))
}

/// Attach the session cookie so the proof round-trip lands back on the
/// same session.
fn with_session_cookie(mut response: Response, cookie: &str) -> Result<Response, ApiError> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|err| ApiError::internal(format!("invalid session cookie value: {err}")))?;
    response.headers_mut().insert(header::SET_COOKIE, value);
    Ok(response)
}

async fn nonce_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (session_id, mut session) = state.sessions().load_or_create(&headers);

    // Latest nonce wins: any outstanding challenge is invalidated here.
    let nonce = nonce::issue();
    session.nonce = Some(nonce.clone());
    state.sessions().save(session_id, session);

    with_session_cookie(nonce.into_response(), &state.sessions().cookie(&session_id))
}

async fn login_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let (session_id, mut session) = state.sessions().load_or_create(&headers);

    let attendee_email = authenticate(&state, &mut session, &req.pcd)?;
    state.sessions().save(session_id, session);

    let response = Json(LoginResponse { attendee_email }).into_response();
    with_session_cookie(response, &state.sessions().cookie(&session_id))
}

async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (session_id, _) = state.sessions().load_or_create(&headers);
    state.sessions().destroy(&session_id);

    let response = Json(LogoutResponse { ok: true }).into_response();
    with_session_cookie(response, &state.sessions().clear_cookie())
}

async fn events_handler(State(state): State<AppState>) -> Json<EventsResponse> {
    Json(EventsResponse {
        supported_events: state.registry().supported_events().into_iter().collect(),
    })
}

/// Run one login attempt through the staged validation pipeline.
///
/// Stages execute in strict order and short-circuit on the first failure;
/// the replay check (the only durable mutation) comes last, so a nullifier
/// is never spent by a proof that failed an earlier stage. On success the
/// attendee email is written into the session and returned.
fn authenticate(
    state: &AppState,
    session: &mut Session,
    raw_pcd: &str,
) -> Result<String, ApiError> {
    if raw_pcd.trim().is_empty() {
        tracing::warn!("login rejected: no PCD specified");
        return Err(ApiError::bad_request(CODE_PCD_MISSING, "No PCD specified"));
    }

    let pcd = match ZkTicketPcd::from_serialized(raw_pcd) {
        Ok(pcd) => pcd,
        Err(PcdError::Malformed(detail)) => {
            tracing::warn!(%detail, "login rejected: malformed PCD");
            return Err(ApiError::bad_request(
                CODE_PCD_MALFORMED,
                format!("invalid PCD: {detail}"),
            ));
        }
        Err(err) => {
            tracing::error!(error = %err, "PCD deserialization fault");
            return Err(ApiError::internal("PCD deserialization failed"));
        }
    };

    let valid = state.verifier.verify(&pcd).map_err(|err| {
        tracing::error!(error = %err, "proof verifier fault");
        ApiError::internal("proof verification failed")
    })?;
    if !valid {
        tracing::warn!(pcd_id = %pcd.id, "login rejected: proof invalid");
        return Err(ApiError::unauthorized(
            CODE_PCD_INVALID,
            "ZK ticket PCD is not valid",
        ));
    }

    let claim = &pcd.claim;

    // Opaque string comparison; an absent session nonce never matches.
    if session.nonce.as_deref() != Some(claim.watermark.as_str()) {
        tracing::warn!(pcd_id = %pcd.id, "login rejected: watermark mismatch");
        return Err(ApiError::unauthorized(
            CODE_WATERMARK_MISMATCH,
            "PCD watermark doesn't match",
        ));
    }

    let (Some(event_id), Some(product_id)) = (
        claim.partial_ticket.event_id,
        claim.partial_ticket.product_id,
    ) else {
        tracing::warn!(pcd_id = %pcd.id, "login rejected: ticket fields not revealed");
        return Err(ApiError::unauthorized(
            CODE_TICKET_INCOMPLETE,
            "PCD ticket does not have an event ID or product ID",
        ));
    };

    let Some(category) = state
        .registry()
        .classify(&event_id, &product_id, &claim.signer)
    else {
        tracing::warn!(%event_id, %product_id, "login rejected: unsupported ticket");
        return Err(ApiError::unauthorized(
            CODE_TICKET_UNSUPPORTED,
            "PCD ticket does not have a supported event ID, product ID, or signer",
        ));
    };

    let Some(nullifier_hash) = claim.nullifier_hash.as_deref() else {
        tracing::warn!(pcd_id = %pcd.id, "login rejected: nullifier not revealed");
        return Err(ApiError::unauthorized(
            CODE_NULLIFIER_MISSING,
            "PCD ticket nullifier has not been defined",
        ));
    };

    match state.nullifier_store().insert(nullifier_hash) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(pcd_id = %pcd.id, "login rejected: nullifier already spent");
            return Err(ApiError::unauthorized(
                CODE_NULLIFIER_REPLAY,
                "PCD ticket has already been used",
            ));
        }
        Err(err) => {
            tracing::error!(error = %err, "nullifier store fault");
            return Err(ApiError::internal("nullifier store failed"));
        }
    }

    let attendee_email = claim
        .partial_ticket
        .attendee_email
        .clone()
        .unwrap_or_default();
    session.user = Some(attendee_email.clone());

    tracing::info!(?category, "ticket authenticated");
    Ok(attendee_email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickets::TicketRegistry;
    use zugate_test_fixtures::{dev_verifier, zuzalu_signer, TicketPcdBuilder};

    fn test_state() -> AppState {
        let config = GateConfig::new(zuzalu_signer(), "zugate_session", "unit-test-secret");
        let registry = TicketRegistry::zuzalu(&zuzalu_signer());
        AppState::new(config, registry, Arc::new(dev_verifier()))
    }

    fn challenged_session(nonce: &str) -> Session {
        Session {
            nonce: Some(nonce.to_string()),
            user: None,
        }
    }

    #[test]
    fn state_wires_config_into_the_session_store() {
        let state = test_state();
        assert_eq!(state.config().cookie_name, "zugate_session");

        let id = uuid::Uuid::new_v4();
        assert!(state.sessions().cookie(&id).starts_with("zugate_session="));
        assert!(state.nullifier_store().insert("wiring-check").unwrap());
    }

    #[test]
    fn authenticate_sets_session_user() {
        let state = test_state();
        let mut session = challenged_session("7001");
        let raw = TicketPcdBuilder::new("7001").serialized();

        let email = authenticate(&state, &mut session, &raw).unwrap();
        assert_eq!(email, "resident@zuzalu.org");
        assert_eq!(session.user.as_deref(), Some("resident@zuzalu.org"));
    }

    #[test]
    fn proof_check_runs_before_watermark_check() {
        let state = test_state();
        let mut session = challenged_session("7001");
        // Both the proof and the watermark are wrong; the proof failure
        // must win.
        let raw = TicketPcdBuilder::new("9999").serialized_with_bad_proof();

        let err = authenticate(&state, &mut session, &raw).unwrap_err();
        assert_eq!(err.code, CODE_PCD_INVALID);
    }

    #[test]
    fn watermark_check_runs_before_ticket_checks() {
        let state = test_state();
        let mut session = challenged_session("7001");
        let raw = TicketPcdBuilder::new("9999")
            .without_ticket_fields()
            .serialized();

        let err = authenticate(&state, &mut session, &raw).unwrap_err();
        assert_eq!(err.code, CODE_WATERMARK_MISMATCH);
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn hidden_email_yields_empty_identity() {
        let state = test_state();
        let mut session = challenged_session("7001");
        let raw = TicketPcdBuilder::new("7001").without_email().serialized();

        let email = authenticate(&state, &mut session, &raw).unwrap();
        assert_eq!(email, "");
        assert_eq!(session.user.as_deref(), Some(""));
    }

    #[test]
    fn failed_login_leaves_session_unauthenticated() {
        let state = test_state();
        let mut session = challenged_session("7001");
        let raw = TicketPcdBuilder::new("7001").without_nullifier().serialized();

        let err = authenticate(&state, &mut session, &raw).unwrap_err();
        assert_eq!(err.code, CODE_NULLIFIER_MISSING);
        assert!(session.user.is_none());
    }
}
