use std::sync::Arc;

use gomen_core::{RateLimiter, TokenAuthenticator};

use crate::auth::user_store::UserStore;
use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub authenticator: Arc<TokenAuthenticator>,
    /// Shared by every request; the sweeper holds another handle to it.
    pub rate_limiter: Arc<RateLimiter>,
    pub users: Arc<UserStore>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let authenticator =
            TokenAuthenticator::new(&config.auth.jwt_secret, config.auth.token_ttl());
        let rate_limiter =
            RateLimiter::new(config.rate_limit.requests, config.rate_limit.window());
        let users = UserStore::new(&config.users);

        Self {
            config: Arc::new(config),
            authenticator: Arc::new(authenticator),
            rate_limiter: Arc::new(rate_limiter),
            users: Arc::new(users),
        }
    }
}
