use strum::{AsRefStr, Display, IntoStaticStr};

/// A named step of a [`Procedure`].
///
/// [`Procedure`]: super::Procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Stage {
    /// Counts the request against the client's fixed window.
    RateLimit,
    /// Resolves the caller's identity, rotating an expired session.
    Authenticate,
    /// Checks the identity against the procedure's required role.
    Authorize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names() {
        assert_eq!(Stage::RateLimit.to_string(), "rate-limit");
        assert_eq!(Stage::Authenticate.as_ref(), "authenticate");
        assert_eq!(<&'static str>::from(Stage::Authorize), "authorize");
    }
}
