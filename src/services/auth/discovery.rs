/*
 * Responsibility
 * - OIDC discovery: fetch `<issuer>/.well-known/openid-configuration` once at startup
 * - JWKS download and on-demand refresh (ETag aware, coalesced, backed off on failure)
 * - Hold the current SigningKeySet and swap it atomically
 */
use std::{
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use jsonwebtoken::Algorithm;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};
use url::Url;

use super::keys::{SigningKeySet, VerificationKey};

/// Where the verifier gets its keys from.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// The set verification currently runs against.
    fn current_keys(&self) -> Arc<SigningKeySet>;

    /// Replaces `stale` with a freshly fetched set.
    ///
    /// When another caller already replaced `stale`, returns the newer set without fetching.
    async fn refresh(&self, stale: &SigningKeySet) -> Result<Arc<SigningKeySet>, DiscoveryError>;
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} answered {status}")]
    Status { url: String, status: StatusCode },

    #[error("discovery document names issuer {actual:?}, expected {expected:?}")]
    IssuerMismatch { expected: String, actual: String },

    #[error("key set contains no usable signing keys")]
    NoUsableKeys,

    #[error("refresh suppressed for another {remaining:?} after failures")]
    BackingOff { remaining: Duration },

    #[error("keys were refreshed moments ago, next refresh allowed in {remaining:?}")]
    RefreshedRecently { remaining: Duration },
}

#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    pub issuer: String,
    pub audience: String,
    pub timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Shortest gap between two successful refreshes. Startup discovery does not count.
    pub min_refresh_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    issuer: String,
    jwks_uri: String,
    #[serde(default)]
    id_token_signing_alg_values_supported: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct JwksDocument {
    #[serde(default)]
    keys: Vec<Value>,
}

#[derive(Debug, Default)]
struct RefreshState {
    failures: u32,
    retry_after: Option<Instant>,
    last_success: Option<Instant>,
}

/// Key source backed by the provider's published JWKS.
#[derive(Debug)]
pub struct DiscoveryClient {
    http: Client,
    jwks_uri: Url,
    current: ArcSwap<SigningKeySet>,
    refresh: Mutex<RefreshState>,
    backoff_base: Duration,
    backoff_max: Duration,
    min_refresh_interval: Duration,
}

impl DiscoveryClient {
    /// Runs discovery and the initial key download. Any failure here is fatal for startup.
    pub async fn discover(settings: &DiscoverySettings) -> Result<Self, DiscoveryError> {
        Url::parse(&settings.issuer)?;

        let http = Client::builder()
            .user_agent(concat!("omc-gateway/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()?;

        let config_url = format!(
            "{}/.well-known/openid-configuration",
            settings.issuer.trim_end_matches('/')
        );
        let response = http.get(&config_url).send().await?;
        if !response.status().is_success() {
            return Err(DiscoveryError::Status {
                url: config_url,
                status: response.status(),
            });
        }
        let document = response.json::<DiscoveryDocument>().await?;

        if document.issuer != settings.issuer {
            return Err(DiscoveryError::IssuerMismatch {
                expected: settings.issuer.clone(),
                actual: document.issuer,
            });
        }

        let jwks_uri = Url::parse(&document.jwks_uri)?;
        let algorithms = signing_algorithms(&document.id_token_signing_alg_values_supported);

        let empty = SigningKeySet::new(
            settings.issuer.clone(),
            settings.audience.clone(),
            algorithms,
            Vec::new(),
        );
        let keys = fetch_key_set(&http, &jwks_uri, &empty).await?;

        info!(
            issuer = %settings.issuer,
            jwks_uri = %jwks_uri,
            keys = keys.len(),
            "oidc discovery complete"
        );

        Ok(Self {
            http,
            jwks_uri,
            current: ArcSwap::from_pointee(keys),
            refresh: Mutex::new(RefreshState::default()),
            backoff_base: settings.backoff_base,
            backoff_max: settings.backoff_max,
            min_refresh_interval: settings.min_refresh_interval,
        })
    }

    fn backoff_for(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.saturating_sub(1));
        self.backoff_base.saturating_mul(factor).min(self.backoff_max)
    }
}

#[async_trait]
impl KeySource for DiscoveryClient {
    fn current_keys(&self) -> Arc<SigningKeySet> {
        self.current.load_full()
    }

    async fn refresh(&self, stale: &SigningKeySet) -> Result<Arc<SigningKeySet>, DiscoveryError> {
        // One fetch at a time; waiters reuse whatever the winner stored.
        let mut state = self.refresh.lock().await;

        let current = self.current.load_full();
        if current.generation() != stale.generation() {
            return Ok(current);
        }

        // Unknown kids arrive at request rate; the provider sees at most one fetch per interval.
        if let Some(last) = state.last_success {
            let elapsed = last.elapsed();
            if elapsed < self.min_refresh_interval {
                return Err(DiscoveryError::RefreshedRecently {
                    remaining: self.min_refresh_interval - elapsed,
                });
            }
        }

        if let Some(until) = state.retry_after {
            let now = Instant::now();
            if now < until {
                return Err(DiscoveryError::BackingOff {
                    remaining: until - now,
                });
            }
        }

        match fetch_key_set(&self.http, &self.jwks_uri, &current).await {
            Ok(next) => {
                let next = Arc::new(next);
                self.current.store(Arc::clone(&next));
                *state = RefreshState {
                    last_success: Some(Instant::now()),
                    ..RefreshState::default()
                };
                info!(
                    generation = next.generation(),
                    keys = next.len(),
                    "signing keys refreshed"
                );
                Ok(next)
            }
            Err(err) => {
                state.failures = state.failures.saturating_add(1);
                let delay = self.backoff_for(state.failures);
                state.retry_after = Some(Instant::now() + delay);
                warn!(
                    error = %err,
                    failures = state.failures,
                    retry_in = ?delay,
                    "signing key refresh failed, keeping previous keys"
                );
                Err(err)
            }
        }
    }
}

/// Downloads the JWKS, revalidating with `If-None-Match` when `previous` carries an ETag.
async fn fetch_key_set(
    http: &Client,
    jwks_uri: &Url,
    previous: &SigningKeySet,
) -> Result<SigningKeySet, DiscoveryError> {
    let mut request = http.get(jwks_uri.clone());
    if let Some(etag) = previous.etag() {
        request = request.header(header::IF_NONE_MATCH, etag);
    }

    let response = request.send().await?;
    let status = response.status();
    if status == StatusCode::NOT_MODIFIED && !previous.is_empty() {
        return Ok(previous.revalidated());
    }
    if !status.is_success() {
        return Err(DiscoveryError::Status {
            url: jwks_uri.to_string(),
            status,
        });
    }

    let etag = response
        .headers()
        .get(header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let document = response.json::<JwksDocument>().await?;

    let keys = VerificationKey::from_jwks(&document.keys);
    if keys.is_empty() {
        return Err(DiscoveryError::NoUsableKeys);
    }

    Ok(previous.rotated(keys, etag))
}

/// Algorithms the provider advertises for ID tokens. Symmetric algorithms are never accepted.
fn signing_algorithms(advertised: &[String]) -> Vec<Algorithm> {
    let algorithms: Vec<Algorithm> = advertised
        .iter()
        .filter_map(|name| Algorithm::from_str(name).ok())
        .filter(|alg| !matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512))
        .collect();

    if algorithms.is_empty() {
        vec![Algorithm::RS256]
    } else {
        algorithms
    }
}
