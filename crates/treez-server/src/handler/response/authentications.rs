use serde::Serialize;

use crate::service::TokenPair;

/// Tokens returned by login and refresh.
#[must_use]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: TokenPair,
}

impl From<TokenPair> for TokenResponse {
    fn from(token: TokenPair) -> Self {
        Self { token }
    }
}
