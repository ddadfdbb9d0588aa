use crate::api::{self, Error};
use crate::model::{Api, Token};
use std::time::Duration;
use tokio::sync::Mutex;

/// Owns the bearer token. Fetchers only ever see the token string.
pub struct TokenManager {
    cached: Mutex<Option<Token>>,
    refresh_margin: Duration,
    reuse: bool,
}

impl TokenManager {
    /// `refresh_margin`: refresh this long before the token would expire.
    /// With `reuse == false` every call requests a new token.
    pub fn new(refresh_margin: Duration, reuse: bool) -> Self {
        TokenManager {
            cached: Mutex::new(None),
            refresh_margin,
            reuse,
        }
    }

    /// Returns a token that stays valid for at least `refresh_margin`, requesting a new one
    /// when the cached token is missing or too close to expiry.
    pub async fn ensure_valid(&self, api: &Api) -> Result<String, Error> {
        let mut cached = self.cached.lock().await;

        if self.reuse {
            if let Some(token) = cached
                .as_ref()
                .filter(|token| token.is_fresh(self.refresh_margin))
            {
                return Ok(token.access_token.clone());
            }
        }

        log::debug!("Requesting new access token");
        let token = api::access_token(api).await.map_err(|e| {
            log::error!("Error getting access token: {}", e);
            e
        })?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Drop the cached token so the next request re-authenticates.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}
