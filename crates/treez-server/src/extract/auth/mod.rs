//! Authentication extractors.
//!
//! - [`AuthCredentials`]: raw tokens presented by the client
//! - [`AuthIdentity`]: identity resolved by the `authenticate` stage

mod auth_credentials;
mod auth_identity;

pub use self::auth_credentials::AuthCredentials;
pub use self::auth_identity::AuthIdentity;
