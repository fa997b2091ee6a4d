//! Authentication handlers: registration, login, logout, token refresh and
//! password recovery.
//!
//! Every route here runs behind the `public` procedure.

use axum::Router;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;

use crate::extract::{AuthCredentials, ClientInfo, ValidateJson};
use crate::handler::request::{
    ForgotPasswordRequest, LoginRequest, Normalized, RegisterRequest, ResetPasswordRequest,
};
use crate::handler::response::{Success, TokenResponse};
use crate::handler::{ErrorKind, Result};
use crate::middleware::{Procedure, RouterProcedureExt};
use crate::service::{
    AuthCookies, EmailService, INVALID_REFRESH_TOKEN, NewUser, PasswordHasher, RESET_TOKEN_TTL,
    ServiceState, SessionRepository, TokenIssuer, TokenVerifier, UserAgentParser, UserRepository,
    VerificationRepository,
};

/// Tracing target for authentication operations.
const TRACING_TARGET: &str = "treez_server::handler::authentication";

/// Message of a failed login, whatever the cause.
const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Message of an unknown, used or expired reset token.
const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";

/// Creates a new user with the `user` role.
#[tracing::instrument(skip_all)]
async fn register(
    State(users): State<UserRepository>,
    State(password_hasher): State<PasswordHasher>,
    ValidateJson(request): ValidateJson<RegisterRequest>,
) -> Result<Success> {
    let email = request.email.normalized_string();

    tracing::trace!(
        target: TRACING_TARGET,
        email = %email,
        "registration attempt"
    );

    if users.find_user_by_email(&email).await?.is_some() {
        tracing::warn!(
            target: TRACING_TARGET,
            email = %email,
            "registration failed: email already registered"
        );

        return Err(ErrorKind::BadRequest
            .with_message("Registration failed, email already registered")
            .with_field_error("email", "Email already registered"));
    }

    let password_hash = password_hasher.hash(&request.password)?;
    let user = users
        .create_user(NewUser::new(request.name.trim(), email, password_hash))
        .await?;

    tracing::info!(
        target: TRACING_TARGET,
        user_id = %user.id,
        email = %user.email,
        "user registered"
    );

    Ok(Success::new("Registration successful").created())
}

/// Verifies credentials and opens a session.
#[tracing::instrument(skip_all)]
#[allow(clippy::too_many_arguments)]
async fn login(
    State(users): State<UserRepository>,
    State(password_hasher): State<PasswordHasher>,
    State(user_agent_parser): State<UserAgentParser>,
    State(token_issuer): State<TokenIssuer>,
    State(auth_cookies): State<AuthCookies>,
    client: ClientInfo,
    ValidateJson(request): ValidateJson<LoginRequest>,
) -> Result<Response> {
    let email = request.email.normalized_string();
    let user = users.find_user_by_email(&email).await?;

    let stored_hash = user.as_ref().map(|user| user.password_hash.as_str());
    let password_valid = password_hasher.matches(&request.password, stored_hash)?;

    let user = match user {
        Some(user) if password_valid && !user.banned => user,
        user => {
            tracing::warn!(
                target: TRACING_TARGET,
                email = %email,
                user_exists = user.is_some(),
                banned = user.as_ref().is_some_and(|u| u.banned),
                password_valid,
                "login failed"
            );

            return Err(ErrorKind::Unauthorized.with_message(INVALID_CREDENTIALS));
        }
    };

    let ip = client.ip.map(|ip| ip.to_string());
    let user_agent = client.user_agent.unwrap_or_default();
    let device = user_agent_parser.device_info(&user_agent, ip);
    let tokens = token_issuer
        .issue(&user, device, Some(user_agent).filter(|ua| !ua.is_empty()))
        .await?;

    tracing::info!(
        target: TRACING_TARGET,
        user_id = %user.id,
        email = %user.email,
        "login successful"
    );

    let cookies = auth_cookies.set(&tokens);
    let body = Success::with_data("Login successful", TokenResponse::from(tokens));
    Ok((cookies, body).into_response())
}

/// Ends the session of the presented refresh cookie.
#[tracing::instrument(skip_all)]
async fn logout(
    State(sessions): State<SessionRepository>,
    State(token_verifier): State<TokenVerifier>,
    State(auth_cookies): State<AuthCookies>,
    credentials: AuthCredentials,
) -> Result<Response> {
    if let Some(access_token) = credentials.access_token.as_deref() {
        token_verifier.evict(access_token);
    }

    if let Some(refresh_token) = credentials.refresh_token.as_deref()
        && let Some(session) = sessions.delete_session(refresh_token).await?
    {
        tracing::info!(
            target: TRACING_TARGET,
            user_id = %session.user_id,
            session_id = %session.id,
            "session ended"
        );
    }

    Ok((auth_cookies.clear(), Success::new("Logout successful")).into_response())
}

/// Exchanges the refresh cookie for a new pair.
///
/// Any failure clears both cookies.
#[tracing::instrument(skip_all)]
async fn refresh_token(
    State(token_verifier): State<TokenVerifier>,
    State(auth_cookies): State<AuthCookies>,
    credentials: AuthCredentials,
) -> Response {
    let Some(refresh_token) = credentials.refresh_token else {
        let error = ErrorKind::Unauthorized
            .with_message(INVALID_REFRESH_TOKEN)
            .with_context("no refresh token presented");
        return (auth_cookies.clear(), error).into_response();
    };

    match token_verifier.rotate(&refresh_token).await {
        Ok(rotated) => {
            tracing::info!(
                target: TRACING_TARGET,
                user_id = %rotated.identity.id,
                "token refreshed"
            );

            let cookies = auth_cookies.set(&rotated.tokens);
            let body = Success::with_data(
                "Token refreshed successfully",
                TokenResponse::from(rotated.tokens),
            );
            (cookies, body).into_response()
        }
        Err(error) => {
            let error = if error.kind() == ErrorKind::Unauthorized {
                error
            } else {
                ErrorKind::Unauthorized
                    .with_message(INVALID_REFRESH_TOKEN)
                    .with_context(error.to_string())
            };

            (auth_cookies.clear(), error).into_response()
        }
    }
}

/// Emails a reset token to a known, unbanned user.
///
/// The answer is the same whether or not the email is known.
#[tracing::instrument(skip_all)]
async fn forgot_password(
    State(users): State<UserRepository>,
    State(verifications): State<VerificationRepository>,
    State(email): State<EmailService>,
    ValidateJson(request): ValidateJson<ForgotPasswordRequest>,
) -> Result<Success> {
    let address = request.email.normalized_string();

    match users.find_user_by_email(&address).await? {
        Some(user) if !user.banned => {
            let token = verifications.create_reset_token(user.id).await?;
            let minutes = RESET_TOKEN_TTL.as_secs() / 60;

            email.send(
                &user.email,
                "Reset your password",
                format!(
                    "<p>Hi {},</p>\
                     <p>Use this token to reset your password: <code>{}</code></p>\
                     <p>It expires in {} minutes.</p>",
                    user.name, token, minutes
                ),
            );

            tracing::info!(
                target: TRACING_TARGET,
                user_id = %user.id,
                "password reset requested"
            );
        }
        _ => {
            tracing::debug!(
                target: TRACING_TARGET,
                email = %address,
                "password reset requested for unknown email"
            );
        }
    }

    Ok(Success::new(
        "Password reset link has been sent to your email",
    ))
}

/// Sets a new password with a reset token and ends every session of the user.
#[tracing::instrument(skip_all)]
async fn reset_password(
    State(users): State<UserRepository>,
    State(sessions): State<SessionRepository>,
    State(verifications): State<VerificationRepository>,
    State(password_hasher): State<PasswordHasher>,
    ValidateJson(request): ValidateJson<ResetPasswordRequest>,
) -> Result<Success> {
    let Some(user_id) = verifications.consume_reset_token(&request.token).await? else {
        tracing::warn!(target: TRACING_TARGET, "invalid reset token");
        return Err(ErrorKind::BadRequest.with_message(INVALID_RESET_TOKEN));
    };

    let password_hash = password_hasher.hash(&request.password)?;
    if !users.update_password(user_id, password_hash).await? {
        return Err(ErrorKind::BadRequest
            .with_message(INVALID_RESET_TOKEN)
            .with_context(format!("user {} no longer exists", user_id)));
    }

    let revoked = sessions.delete_user_sessions(user_id).await?;

    tracing::info!(
        target: TRACING_TARGET,
        user_id = %user_id,
        revoked,
        "password reset"
    );

    Ok(Success::new("Password has been reset successfully"))
}

/// Returns a [`Router`] with all public authentication routes.
pub fn routes(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/api/treez/auth.register", post(register))
        .route("/api/treez/auth.login", post(login))
        .route("/api/treez/auth.logout", post(logout))
        .route("/api/treez/auth.refreshToken", post(refresh_token))
        .route("/api/treez/auth.forgotPassword", post(forgot_password))
        .route("/api/treez/auth.resetPassword", post(reset_password))
        .with_procedure(Procedure::public(), state)
}
