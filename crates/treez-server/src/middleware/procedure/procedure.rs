use std::fmt;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::header::SET_COOKIE;
use axum::middleware::{Next, from_fn_with_state};
use axum::response::{IntoResponse, Response};

use super::{Stage, authenticate};
use crate::extract::{AuthIdentity, peer_ip};
use crate::handler::{ErrorKind, Result};
use crate::service::{Identity, ROLE_ADMIN, RateLimitKey, ServiceState, TokenPair};

/// Tracing target for procedure stages.
const TRACING_TARGET: &str = "treez_server::middleware::procedure";

/// Rate limit key of requests served without connect info.
const UNKNOWN_CLIENT: &str = "unknown";

/// An ordered chain of [`Stage`]s.
///
/// Built once per route group and shared by every request it serves.
#[derive(Clone, PartialEq, Eq)]
pub struct Procedure {
    name: &'static str,
    stages: Arc<[Stage]>,
    required_role: Option<Arc<str>>,
}

impl Procedure {
    fn new(name: &'static str, stages: &[Stage], required_role: Option<Arc<str>>) -> Self {
        Self {
            name,
            stages: stages.into(),
            required_role,
        }
    }

    /// `[rate-limit]`
    pub fn public() -> Self {
        Self::new("public", &[Stage::RateLimit], None)
    }

    /// `[rate-limit, authenticate, authorize]` without a required role.
    pub fn protected() -> Self {
        Self::new(
            "protected",
            &[Stage::RateLimit, Stage::Authenticate, Stage::Authorize],
            None,
        )
    }

    /// `[rate-limit, authenticate, authorize(admin)]`
    pub fn admin() -> Self {
        Self::new(
            "admin",
            &[Stage::RateLimit, Stage::Authenticate, Stage::Authorize],
            Some(ROLE_ADMIN.into()),
        )
    }

    /// `[rate-limit, authenticate, authorize(role)]`
    pub fn role(role: impl AsRef<str>) -> Self {
        Self::new(
            "role",
            &[Stage::RateLimit, Stage::Authenticate, Stage::Authorize],
            Some(role.as_ref().into()),
        )
    }

    /// Returns the procedure name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the stages in execution order.
    #[inline]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Returns the role the `authorize` stage requires, if any.
    #[inline]
    pub fn required_role(&self) -> Option<&str> {
        self.required_role.as_deref()
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .field("required_role", &self.required_role)
            .finish()
    }
}

/// State of the procedure middleware: the chain plus the services it calls.
#[derive(Clone)]
struct ProcedureState {
    procedure: Procedure,
    service: ServiceState,
}

/// Extension trait for `axum::`[`Router`] to put routes behind a [`Procedure`].
pub trait RouterProcedureExt {
    /// Runs `procedure` in front of every route added so far.
    fn with_procedure(self, procedure: Procedure, state: ServiceState) -> Self;
}

impl<S> RouterProcedureExt for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_procedure(self, procedure: Procedure, state: ServiceState) -> Self {
        let state = ProcedureState {
            procedure,
            service: state,
        };

        self.route_layer(from_fn_with_state(state, run_procedure))
    }
}

async fn run_procedure(
    State(state): State<ProcedureState>,
    mut request: Request,
    next: Next,
) -> Response {
    let ProcedureState { procedure, service } = &state;
    let mut identity: Option<Identity> = None;
    let mut rotated: Option<TokenPair> = None;

    for &stage in procedure.stages() {
        let outcome = match stage {
            Stage::RateLimit => rate_limit(service, &request),
            Stage::Authenticate => match authenticate(service, request.headers()).await {
                Ok(authenticated) => {
                    identity = Some(authenticated.identity);
                    rotated = authenticated.rotated;
                    Ok(())
                }
                Err(rejection) => {
                    tracing::debug!(
                        target: TRACING_TARGET,
                        procedure = procedure.name(),
                        stage = %stage,
                        "procedure stage rejected request"
                    );
                    return rejection.render(&service.auth_cookies);
                }
            },
            Stage::Authorize => match &identity {
                Some(identity) => service
                    .role_gate
                    .authorize(identity, procedure.required_role()),
                None => Err(ErrorKind::MissingAuthToken
                    .with_context("authorize stage ran before authenticate")),
            },
        };

        if let Err(error) = outcome {
            tracing::debug!(
                target: TRACING_TARGET,
                procedure = procedure.name(),
                stage = %stage,
                error = %error,
                "procedure stage rejected request"
            );
            return with_rotated_cookies(service, rotated, error.into_response());
        }
    }

    if let Some(identity) = identity {
        request.extensions_mut().insert(AuthIdentity(identity));
    }

    let response = next.run(request).await;
    with_rotated_cookies(service, rotated, response)
}

/// Counts the request against its peer address. Proxy headers are not
/// consulted, a client could rotate them freely.
fn rate_limit(service: &ServiceState, request: &Request) -> Result<()> {
    let key = peer_ip(request.extensions())
        .map(RateLimitKey::from_ip)
        .unwrap_or_else(|| RateLimitKey::custom(UNKNOWN_CLIENT));

    service.rate_limiter.check(key)
}

/// Sets the cookies of a session rotated during `authenticate`.
///
/// The previous refresh token is gone once rotated, so the new cookies are
/// sent even when a later stage or the handler fails. Cookies set by the
/// handler itself win.
fn with_rotated_cookies(
    service: &ServiceState,
    rotated: Option<TokenPair>,
    response: Response,
) -> Response {
    match rotated {
        Some(tokens) if !response.headers().contains_key(SET_COOKIE) => {
            (service.auth_cookies.set(&tokens), response).into_response()
        }
        _ => response,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::routing::get;
    use axum_test::TestServer;

    use super::*;
    use crate::service::tests::config;
    use crate::service::{NewUser, ROLE_USER, ServiceConfig, TokenClaims, TokenType, User};

    async fn whoami(AuthIdentity(identity): AuthIdentity) -> String {
        identity.email
    }

    async fn ping() -> &'static str {
        "pong"
    }

    async fn server(config: &ServiceConfig) -> anyhow::Result<(TestServer, ServiceState)> {
        let state = ServiceState::from_config(config).await?;

        let public = Router::new()
            .route("/public", get(ping))
            .with_procedure(Procedure::public(), state.clone());
        let protected = Router::new()
            .route("/protected", get(whoami))
            .with_procedure(Procedure::protected(), state.clone());
        let admin = Router::new()
            .route("/admin", get(whoami))
            .with_procedure(Procedure::admin(), state.clone());
        let editor = Router::new()
            .route("/editor", get(whoami))
            .with_procedure(Procedure::role("Editor"), state.clone());

        let app = public
            .merge(protected)
            .merge(admin)
            .merge(editor)
            .with_state(state.clone());

        Ok((TestServer::new(app)?, state))
    }

    async fn user(state: &ServiceState, role: &str) -> anyhow::Result<User> {
        let email = format!("{role}@example.com");
        let user = state
            .users
            .create_user(NewUser::new("Jane", email, "hash").with_role(role))
            .await?;
        Ok(user)
    }

    async fn login(state: &ServiceState, user: &User) -> anyhow::Result<TokenPair> {
        let device = state.user_agent_parser.device_info("", None);
        Ok(state.token_issuer.issue(user, device, None).await?)
    }

    fn cookie(name: &str, value: &str) -> String {
        format!("{name}={value}")
    }

    #[test]
    fn declared_procedures() {
        assert_eq!(Procedure::public().stages(), &[Stage::RateLimit]);
        assert_eq!(Procedure::protected().required_role(), None);
        assert_eq!(Procedure::admin().required_role(), Some("admin"));
        assert_eq!(Procedure::role("editor").stages().len(), 3);
    }

    #[tokio::test]
    async fn public_procedure_is_rate_limited() -> anyhow::Result<()> {
        let mut config = config();
        config.rate_limit_requests = 2;
        let (server, _) = server(&config).await?;

        server.get("/public").await.assert_status_ok();
        server.get("/public").await.assert_status_ok();
        server
            .get("/public")
            .await
            .assert_status(axum::http::StatusCode::TOO_MANY_REQUESTS);
        Ok(())
    }

    #[tokio::test]
    async fn forwarded_for_does_not_reset_the_limit() -> anyhow::Result<()> {
        let mut config = config();
        config.rate_limit_requests = 2;
        let (server, _) = server(&config).await?;

        let mut accepted = 0;
        for i in 0..20 {
            let response = server
                .get("/public")
                .add_header("x-forwarded-for", format!("10.0.0.{i}"))
                .await;
            if response.status_code().is_success() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 2);
        Ok(())
    }

    #[tokio::test]
    async fn protected_without_credentials() -> anyhow::Result<()> {
        let (server, _) = server(&config()).await?;

        let response = server.get("/protected").await;
        response.assert_status_unauthorized();
        assert_eq!(response.headers().get_all("set-cookie").iter().count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn bearer_access_token_authenticates() -> anyhow::Result<()> {
        let (server, state) = server(&config()).await?;
        let user = user(&state, ROLE_USER).await?;
        let tokens = login(&state, &user).await?;

        let response = server
            .get("/protected")
            .authorization_bearer(&tokens.access_token)
            .await;

        response.assert_status_ok();
        response.assert_text("user@example.com");
        Ok(())
    }

    #[tokio::test]
    async fn admin_procedure_forbids_users() -> anyhow::Result<()> {
        let (server, state) = server(&config()).await?;
        let user = user(&state, ROLE_USER).await?;
        let tokens = login(&state, &user).await?;

        server
            .get("/admin")
            .authorization_bearer(&tokens.access_token)
            .await
            .assert_status_forbidden();
        Ok(())
    }

    #[tokio::test]
    async fn custom_role_matches_ignoring_case() -> anyhow::Result<()> {
        let (server, state) = server(&config()).await?;
        let user = user(&state, "editor").await?;
        let tokens = login(&state, &user).await?;

        server
            .get("/editor")
            .authorization_bearer(&tokens.access_token)
            .await
            .assert_status_ok();
        Ok(())
    }

    #[tokio::test]
    async fn expired_access_rotates_session() -> anyhow::Result<()> {
        let (server, state) = server(&config()).await?;
        let user = user(&state, ROLE_USER).await?;
        let tokens = login(&state, &user).await?;

        let mut expired = TokenClaims::new(&user, TokenType::Access, Duration::from_secs(60));
        expired.iat -= 3600;
        expired.exp -= 3600;
        let expired = state.token_issuer.encode(&expired)?;

        let response = server
            .get("/protected")
            .add_header(
                "cookie",
                format!(
                    "{}; {}",
                    cookie("access_token", &expired),
                    cookie("refresh_token", &tokens.refresh_token)
                ),
            )
            .await;

        response.assert_status_ok();
        let set_cookies: Vec<_> = response.headers().get_all("set-cookie").iter().collect();
        assert_eq!(set_cookies.len(), 2);

        // The old refresh token was consumed by the rotation.
        let again = server
            .get("/protected")
            .add_header("cookie", cookie("refresh_token", &tokens.refresh_token))
            .await;
        again.assert_status_unauthorized();
        Ok(())
    }

    #[tokio::test]
    async fn forged_access_is_not_refreshed() -> anyhow::Result<()> {
        let (server, state) = server(&config()).await?;
        let user = user(&state, ROLE_USER).await?;
        let tokens = login(&state, &user).await?;

        let response = server
            .get("/protected")
            .add_header(
                "cookie",
                format!(
                    "{}; {}",
                    cookie("access_token", "not.a.token"),
                    cookie("refresh_token", &tokens.refresh_token)
                ),
            )
            .await;

        response.assert_status_unauthorized();
        assert_eq!(response.headers().get_all("set-cookie").iter().count(), 0);

        // The refresh session is still there.
        assert!(
            state
                .sessions
                .find_session_by_token(&tokens.refresh_token)
                .await?
                .is_some()
        );
        Ok(())
    }
}
