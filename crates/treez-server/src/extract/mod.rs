//! Request extractors.
//!
//! ## Authentication
//!
//! - [`AuthCredentials`] - tokens presented by the client
//! - [`AuthIdentity`] - identity resolved by the `authenticate` stage
//!
//! ## Request data
//!
//! - [`Json`] - JSON body with envelope rejections
//! - [`ValidateJson`] - JSON body checked against its `validator` rules
//! - [`Query`] - query string with envelope rejections
//!
//! ## Metadata
//!
//! - [`ClientInfo`] - client address and user agent
//! - [`TransactionId`] - transaction id of the request

pub mod auth;
pub mod reject;

mod client_info;
mod transaction_id;

pub use crate::extract::auth::{AuthCredentials, AuthIdentity};
pub use crate::extract::client_info::{ClientInfo, client_ip, peer_ip};
pub use crate::extract::reject::{Json, Query, ValidateJson};
pub use crate::extract::transaction_id::{MakeTransactionId, TRANSACTION_ID_HEADER, TransactionId};
