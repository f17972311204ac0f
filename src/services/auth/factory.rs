/// Factory: build the key source and token verifier from application `Config`.
use std::sync::Arc;

use crate::config::Config;
use crate::services::auth::discovery::DiscoverySettings;
use crate::services::auth::{DiscoveryClient, DiscoveryError, KeySource, TokenVerifier};

pub async fn build_key_source(config: &Config) -> Result<Arc<dyn KeySource>, DiscoveryError> {
    let settings = DiscoverySettings {
        issuer: config.auth_issuer.clone(),
        audience: config.auth_audience.clone(),
        timeout: config.discovery_timeout,
        backoff_base: config.refresh_backoff,
        backoff_max: config.refresh_backoff_max,
        min_refresh_interval: config.refresh_min_interval,
    };

    let client = DiscoveryClient::discover(&settings).await?;
    Ok(Arc::new(client))
}

pub fn build_token_verifier(config: &Config) -> Arc<TokenVerifier> {
    Arc::new(TokenVerifier::new(
        config.access_token_leeway_seconds,
        config.roles_claim.clone(),
    ))
}
