//! Shared fixtures for unit and router tests: Ed25519 signing keys, token minting,
//! a fake key source and a local OIDC provider.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::{SigningKey, pkcs8::EncodePrivateKey};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::services::auth::{
    discovery::{DiscoveryError, KeySource},
    keys::{SigningKeySet, VerificationKey},
};

pub const ISSUER: &str = "https://sso.example.com/realms/omc";
pub const AUDIENCE: &str = "omc-api";

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Deterministic Ed25519 key published under `kid`.
pub struct TestKey {
    kid: String,
    signing: SigningKey,
}

impl TestKey {
    pub fn new(kid: &str, seed: u8) -> Self {
        Self {
            kid: kid.to_string(),
            signing: SigningKey::from_bytes(&[seed; 32]),
        }
    }

    pub fn jwk(&self) -> Value {
        json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "x": URL_SAFE_NO_PAD.encode(self.signing.verifying_key().to_bytes()),
            "kid": self.kid,
            "alg": "EdDSA",
            "use": "sig",
        })
    }

    fn encoding_key(&self) -> EncodingKey {
        let der = self.signing.to_pkcs8_der().expect("pkcs8");
        EncodingKey::from_ed_der(der.as_bytes())
    }

    pub fn sign(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(self.kid.clone());
        jsonwebtoken::encode(&header, claims, &self.encoding_key()).expect("token")
    }

    /// Signs an arbitrary payload, JSON or not.
    pub fn sign_raw(&self, payload: &[u8]) -> String {
        let header = json!({ "alg": "EdDSA", "typ": "JWT", "kid": self.kid });
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature =
            jsonwebtoken::crypto::sign(signing_input.as_bytes(), &self.encoding_key(), Algorithm::EdDSA)
                .expect("signature");
        format!("{signing_input}.{signature}")
    }
}

/// Assembles a token from parts without signing it.
pub fn raw_token(header: &Value, claims: &Value, signature: &[u8]) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
        URL_SAFE_NO_PAD.encode(signature)
    )
}

/// Keycloak-shaped claims for `user-1`, valid for five minutes.
pub fn user_claims(roles: &[&str]) -> Value {
    let now = now();
    json!({
        "iss": ISSUER,
        "sub": "user-1",
        "aud": [AUDIENCE, "account"],
        "iat": now,
        "exp": now + 300,
        "preferred_username": "ada",
        "realm_access": { "roles": roles },
    })
}

pub fn key_set(keys: &[&TestKey]) -> SigningKeySet {
    key_set_with_algorithms(keys, vec![Algorithm::EdDSA])
}

pub fn key_set_with_algorithms(keys: &[&TestKey], algorithms: Vec<Algorithm>) -> SigningKeySet {
    let jwks: Vec<Value> = keys.iter().map(|key| key.jwk()).collect();
    SigningKeySet::new(ISSUER, AUDIENCE, algorithms, VerificationKey::from_jwks(&jwks))
}

/// In-memory key source. `refresh` hands out the queued set once, then fails.
pub struct FakeKeySource {
    current: Mutex<Arc<SigningKeySet>>,
    next: Mutex<Option<SigningKeySet>>,
    lookups: AtomicUsize,
    refreshes: AtomicUsize,
}

impl FakeKeySource {
    pub fn new(current: SigningKeySet) -> Self {
        Self {
            current: Mutex::new(Arc::new(current)),
            next: Mutex::new(None),
            lookups: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
        }
    }

    pub fn with_next(self, next: SigningKeySet) -> Self {
        *self.next.lock().expect("lock") = Some(next);
        self
    }

    /// How often a verification asked for the current keys.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySource for FakeKeySource {
    fn current_keys(&self) -> Arc<SigningKeySet> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Arc::clone(&self.current.lock().expect("lock"))
    }

    async fn refresh(&self, _stale: &SigningKeySet) -> Result<Arc<SigningKeySet>, DiscoveryError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let next = self
            .next
            .lock()
            .expect("lock")
            .take()
            .ok_or(DiscoveryError::NoUsableKeys)?;
        let next = Arc::new(next);
        *self.current.lock().expect("lock") = Arc::clone(&next);
        Ok(next)
    }
}

struct ProviderState {
    issuer: String,
    keys: Mutex<Vec<Value>>,
    version: AtomicUsize,
    fail: AtomicBool,
    delay_ms: AtomicU64,
    jwks_hits: AtomicUsize,
    not_modified: AtomicUsize,
}

/// OIDC provider on 127.0.0.1 serving a discovery document and an ETag'd JWKS.
pub struct MockProvider {
    state: Arc<ProviderState>,
}

impl MockProvider {
    pub async fn start(keys: Vec<Value>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let state = Arc::new(ProviderState {
            issuer: format!("http://{addr}/realms/omc"),
            keys: Mutex::new(keys),
            version: AtomicUsize::new(1),
            fail: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            jwks_hits: AtomicUsize::new(0),
            not_modified: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/realms/omc/.well-known/openid-configuration", get(openid_configuration))
            .route("/jwks", get(jwks))
            .with_state(Arc::clone(&state));
        tokio::spawn(async move {
            let _ = axum::serve(listener, app.into_make_service()).await;
        });

        Self { state }
    }

    pub fn issuer(&self) -> &str {
        &self.state.issuer
    }

    /// Publishes a new key list under a new ETag.
    pub fn set_keys(&self, keys: Vec<Value>) {
        *self.state.keys.lock().expect("lock") = keys;
        self.state.version.fetch_add(1, Ordering::SeqCst);
    }

    pub fn fail_jwks(&self, fail: bool) {
        self.state.fail.store(fail, Ordering::SeqCst);
    }

    /// Holds every later JWKS response for `delay` after the hit is counted.
    pub fn delay_jwks(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.state.delay_ms.store(millis, Ordering::SeqCst);
    }

    pub fn jwks_hits(&self) -> usize {
        self.state.jwks_hits.load(Ordering::SeqCst)
    }

    pub fn not_modified_hits(&self) -> usize {
        self.state.not_modified.load(Ordering::SeqCst)
    }
}

async fn openid_configuration(State(state): State<Arc<ProviderState>>) -> Json<Value> {
    let base = state.issuer.trim_end_matches("/realms/omc");
    Json(json!({
        "issuer": state.issuer,
        "jwks_uri": format!("{base}/jwks"),
        "id_token_signing_alg_values_supported": ["EdDSA", "RS256"],
    }))
}

async fn jwks(State(state): State<Arc<ProviderState>>, headers: HeaderMap) -> Response {
    state.jwks_hits.fetch_add(1, Ordering::SeqCst);
    let delay = state.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if state.fail.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let etag = format!("\"v{}\"", state.version.load(Ordering::SeqCst));
    if headers
        .get(header::IF_NONE_MATCH)
        .is_some_and(|v| v.as_bytes() == etag.as_bytes())
    {
        state.not_modified.fetch_add(1, Ordering::SeqCst);
        return StatusCode::NOT_MODIFIED.into_response();
    }

    let keys = state.keys.lock().expect("lock").clone();
    let mut response = Json(json!({ "keys": keys })).into_response();
    response.headers_mut().insert(
        header::ETAG,
        HeaderValue::from_str(&etag).expect("etag header"),
    );
    response
}
