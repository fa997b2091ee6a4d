//! RPC procedures: ordered middleware chains in front of handlers.
//!
//! A [`Procedure`] is a named list of [`Stage`]s run strictly in order. The
//! first failing stage answers the request and the remaining stages never
//! run.
//!
//! | procedure   | stages                                       |
//! |-------------|----------------------------------------------|
//! | `public`    | `rate-limit`                                 |
//! | `protected` | `rate-limit`, `authenticate`, `authorize`    |
//! | `admin`     | `rate-limit`, `authenticate`, `authorize(admin)` |
//! | `role(r)`   | `rate-limit`, `authenticate`, `authorize(r)` |
//!
//! ```rust,ignore
//! let router = Router::new()
//!     .route("/api/treez/auth.me", get(me))
//!     .with_procedure(Procedure::protected(), state.clone());
//! ```

mod authenticate;
mod procedure;
mod stage;

pub use self::authenticate::{AuthRejection, Authenticated, authenticate};
pub use self::procedure::{Procedure, RouterProcedureExt};
pub use self::stage::Stage;
