//! Security services.
//!
//! Token signing and verification, password hashing, role checks, request
//! rate limiting and the authentication cookies.

mod auth_cookies;
mod password_hasher;
mod rate_limiter;
mod role_gate;
mod token_issuer;
pub(crate) mod token_keys;
mod token_verifier;
mod user_agent;

pub use auth_cookies::{ACCESS_TOKEN_COOKIE, AuthCookies, REFRESH_TOKEN_COOKIE};
pub use password_hasher::PasswordHasher;
pub use rate_limiter::{RateLimitKey, RateLimiter};
pub use role_gate::RoleGate;
pub use token_issuer::{TokenClaims, TokenIssuer, TokenPair};
pub use token_keys::{MIN_SECRET_LENGTH, TokenKeys, TokenType};
pub use token_verifier::{
    INVALID_REFRESH_TOKEN, INVALID_TOKEN, INVALID_USER_REFRESH_TOKEN, Identity, RotatedTokens,
    TokenVerifier,
};
pub use user_agent::{DeviceInfo, UserAgentParser};
