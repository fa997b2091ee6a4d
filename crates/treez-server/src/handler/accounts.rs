//! Account handlers for the signed-in user: profile, password and sessions.
//!
//! Every route here runs behind the `protected` procedure.

use axum::Router;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};

use crate::extract::{AuthCredentials, AuthIdentity, ValidateJson};
use crate::handler::request::{ChangePasswordRequest, CleanupTokensRequest};
use crate::handler::response::{ActiveSessions, CleanedSessions, Success};
use crate::handler::{ErrorKind, Result};
use crate::middleware::{Procedure, RouterProcedureExt};
use crate::service::{
    AuthCookies, Identity, PasswordHasher, ServiceState, SessionRepository, TokenVerifier,
    UserRepository,
};

/// Tracing target for account operations.
const TRACING_TARGET: &str = "treez_server::handler::accounts";

/// Returns the caller's identity.
async fn me(AuthIdentity(identity): AuthIdentity) -> Success<Identity> {
    Success::with_data("Profile retrieved", identity)
}

/// Replaces the caller's password after checking the current one.
#[tracing::instrument(skip_all)]
async fn change_password(
    State(users): State<UserRepository>,
    State(password_hasher): State<PasswordHasher>,
    AuthIdentity(identity): AuthIdentity,
    ValidateJson(request): ValidateJson<ChangePasswordRequest>,
) -> Result<Success> {
    let Some(user) = users.find_user_by_id(identity.id).await? else {
        return Err(ErrorKind::Unauthorized
            .with_message("User not found")
            .with_context(format!("user {} no longer exists", identity.id)));
    };

    if !password_hasher.matches(&request.old_password, Some(&user.password_hash))? {
        tracing::warn!(
            target: TRACING_TARGET,
            user_id = %user.id,
            "password change rejected: wrong current password"
        );

        return Err(ErrorKind::BadRequest
            .with_message("Invalid current password")
            .with_field_error("currentPassword", "Current password is incorrect"));
    }

    let password_hash = password_hasher.hash(&request.new_password)?;
    users.update_password(user.id, password_hash).await?;

    tracing::info!(
        target: TRACING_TARGET,
        user_id = %user.id,
        "password changed"
    );

    Ok(Success::new("Password changed successfully"))
}

/// Lists the devices of the caller's unexpired sessions.
#[tracing::instrument(skip_all)]
async fn active_sessions(
    State(sessions): State<SessionRepository>,
    AuthIdentity(identity): AuthIdentity,
) -> Result<Success<ActiveSessions>> {
    let sessions = sessions.list_sessions(identity.id).await?;
    let response = ActiveSessions::from_sessions(sessions);
    Ok(Success::with_data("Active sessions retrieved", response))
}

/// Ends every session of the caller, on every device.
#[tracing::instrument(skip_all)]
async fn logout_all(
    State(sessions): State<SessionRepository>,
    State(token_verifier): State<TokenVerifier>,
    State(auth_cookies): State<AuthCookies>,
    AuthIdentity(identity): AuthIdentity,
    credentials: AuthCredentials,
) -> Result<Response> {
    let removed = sessions.delete_user_sessions(identity.id).await?;
    if let Some(access_token) = credentials.access_token.as_deref() {
        token_verifier.evict(access_token);
    }

    tracing::info!(
        target: TRACING_TARGET,
        user_id = %identity.id,
        removed,
        "logged out from all devices"
    );

    let body = Success::new("Logged out from all devices");
    Ok((auth_cookies.clear(), body).into_response())
}

/// Removes the caller's sessions not used within `unusedDays` days.
#[tracing::instrument(skip_all)]
async fn cleanup_tokens(
    State(sessions): State<SessionRepository>,
    AuthIdentity(identity): AuthIdentity,
    ValidateJson(request): ValidateJson<CleanupTokensRequest>,
) -> Result<Success<CleanedSessions>> {
    let removed = sessions
        .cleanup_sessions(identity.id, request.unused_days)
        .await?;

    tracing::debug!(
        target: TRACING_TARGET,
        user_id = %identity.id,
        unused_days = request.unused_days,
        removed,
        "unused sessions cleaned up"
    );

    Ok(Success::with_data(
        "Unused tokens cleaned up successfully",
        CleanedSessions { removed },
    ))
}

/// Returns a [`Router`] with all account routes.
pub fn routes(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/api/treez/auth.me", get(me))
        .route("/api/treez/auth.changePassword", post(change_password))
        .route("/api/treez/auth.activeSessions", get(active_sessions))
        .route("/api/treez/auth.logoutAll", post(logout_all))
        .route("/api/treez/auth.cleanupTokens", post(cleanup_tokens))
        .with_procedure(Procedure::protected(), state)
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use crate::handler::test::{cookie_header, create_test_server, login, register, set_cookies};

    async fn signed_in() -> anyhow::Result<(axum_test::TestServer, crate::service::ServiceState, String)>
    {
        let (server, state) = create_test_server().await?;
        register(&server, "jane@example.com", "Secret123").await;
        let response = login(&server, "jane@example.com", "Secret123").await;
        response.assert_status_ok();
        Ok((server, state, cookie_header(&response)))
    }

    #[tokio::test]
    async fn me_returns_identity() -> anyhow::Result<()> {
        let (server, _, cookies) = signed_in().await?;

        let response = server
            .get("/api/treez/auth.me")
            .add_header("cookie", cookies)
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["message"], "Profile retrieved");
        assert_eq!(body["data"]["email"], "jane@example.com");
        assert_eq!(body["data"]["role"], "user");
        Ok(())
    }

    #[tokio::test]
    async fn me_requires_credentials() -> anyhow::Result<()> {
        let (server, _) = create_test_server().await?;

        let response = server.get("/api/treez/auth.me").await;
        response.assert_status_unauthorized();
        assert_eq!(set_cookies(&response).len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn change_password_checks_current() -> anyhow::Result<()> {
        let (server, _, cookies) = signed_in().await?;

        let wrong = server
            .post("/api/treez/auth.changePassword")
            .add_header("cookie", cookies.clone())
            .json(&json!({
                "oldPassword": "Wrong1234",
                "newPassword": "NewSecret1",
                "confirmNewPassword": "NewSecret1",
            }))
            .await;
        wrong.assert_status_bad_request();
        let body: Value = wrong.json();
        assert_eq!(body["message"], "Invalid current password");
        assert_eq!(body["errors"]["currentPassword"][0], "Current password is incorrect");

        server
            .post("/api/treez/auth.changePassword")
            .add_header("cookie", cookies)
            .json(&json!({
                "oldPassword": "Secret123",
                "newPassword": "NewSecret1",
                "confirmNewPassword": "NewSecret1",
            }))
            .await
            .assert_status_ok();

        login(&server, "jane@example.com", "NewSecret1")
            .await
            .assert_status_ok();
        Ok(())
    }

    #[tokio::test]
    async fn sessions_per_device() -> anyhow::Result<()> {
        let (server, _, cookies) = signed_in().await?;
        login(&server, "jane@example.com", "Secret123")
            .await
            .assert_status_ok();

        let response = server
            .get("/api/treez/auth.activeSessions")
            .add_header("cookie", cookies)
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["message"], "Active sessions retrieved");
        assert_eq!(body["data"]["sessions"].as_array().map(Vec::len), Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn logout_all_ends_every_session() -> anyhow::Result<()> {
        let (server, state, cookies) = signed_in().await?;
        let other = cookie_header(&login(&server, "jane@example.com", "Secret123").await);

        let response = server
            .post("/api/treez/auth.logoutAll")
            .add_header("cookie", cookies.clone())
            .await;
        response.assert_status_ok();
        assert!(set_cookies(&response).iter().all(|c| c.contains("Max-Age=0")));

        let user = state.users.find_user_by_email("jane@example.com").await?.unwrap();
        assert!(state.sessions.list_sessions(user.id).await?.is_empty());

        server
            .post("/api/treez/auth.refreshToken")
            .add_header("cookie", other)
            .await
            .assert_status_unauthorized();
        Ok(())
    }

    #[tokio::test]
    async fn cleanup_keeps_recent_sessions() -> anyhow::Result<()> {
        let (server, _, cookies) = signed_in().await?;

        let response = server
            .post("/api/treez/auth.cleanupTokens")
            .add_header("cookie", cookies.clone())
            .json(&json!({}))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["message"], "Unused tokens cleaned up successfully");
        assert_eq!(body["data"]["removed"], 0);

        for unused_days in [0, u32::MAX] {
            server
                .post("/api/treez/auth.cleanupTokens")
                .add_header("cookie", cookies.clone())
                .json(&json!({ "unusedDays": unused_days }))
                .await
                .assert_status_bad_request();
        }
        Ok(())
    }
}
