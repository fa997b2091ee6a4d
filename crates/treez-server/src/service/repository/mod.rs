//! Persistence of users, sessions and verification tokens.

mod session;
mod user;
mod verification;

pub use session::{NewSession, Session, SessionRepository};
pub use user::{
    MemoryUserStore, NewUser, ROLE_ADMIN, ROLE_USER, User, UserRepository, UserStore,
};
pub use verification::{RESET_TOKEN_TTL, VerificationRepository};
