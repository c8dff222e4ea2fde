use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::config::Config;
use crate::db::Repository;
use crate::pagination::Paginator;
use crate::policy::Throttles;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub throttles: Arc<Throttles>,
    pub tokens: Arc<TokenVerifier>,
    pub paginator: Paginator,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn Repository>,
        throttles: Throttles,
        tokens: TokenVerifier,
        paginator: Paginator,
    ) -> Self {
        Self {
            repo,
            throttles: Arc::new(throttles),
            tokens: Arc::new(tokens),
            paginator,
        }
    }

    /// Builds the state around a repository using configured policies
    pub fn from_config(config: &Config, repo: Arc<dyn Repository>) -> anyhow::Result<Self> {
        let throttles = Throttles::new(config.throttle_rates()?);
        let tokens = TokenVerifier::new(&config.jwt_secret);
        let paginator = Paginator::new(config.pagination, config.page_size, config.max_page_size);

        Ok(Self::new(repo, throttles, tokens, paginator))
    }
}
