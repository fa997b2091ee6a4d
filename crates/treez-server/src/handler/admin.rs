//! Administration handlers.
//!
//! Every route here runs behind the `admin` procedure.

use axum::Router;
use axum::extract::State;
use axum::routing::get;

use crate::extract::{AuthIdentity, Query};
use crate::handler::request::UserSessionsQuery;
use crate::handler::response::{SessionSummary, Success, UserSessions};
use crate::handler::{ErrorKind, Result};
use crate::middleware::{Procedure, RouterProcedureExt};
use crate::service::{ServiceState, SessionRepository, UserRepository};

/// Tracing target for administration operations.
const TRACING_TARGET: &str = "treez_server::handler::admin";

/// Lists the active sessions of any user.
#[tracing::instrument(skip_all)]
async fn user_sessions(
    State(users): State<UserRepository>,
    State(sessions): State<SessionRepository>,
    AuthIdentity(admin): AuthIdentity,
    Query(query): Query<UserSessionsQuery>,
) -> Result<Success<UserSessions>> {
    if users.find_user_by_id(query.user_id).await?.is_none() {
        return Err(ErrorKind::NotFound
            .with_message("User not found")
            .with_resource("user"));
    }

    let sessions: Vec<SessionSummary> = sessions
        .list_sessions(query.user_id)
        .await?
        .into_iter()
        .map(SessionSummary::from)
        .collect();

    tracing::info!(
        target: TRACING_TARGET,
        admin_id = %admin.id,
        user_id = %query.user_id,
        count = sessions.len(),
        "user sessions retrieved"
    );

    let response = UserSessions {
        user_id: query.user_id,
        sessions,
    };

    Ok(Success::with_data("User sessions retrieved", response))
}

/// Returns a [`Router`] with all admin routes.
pub fn routes(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/api/treez/admin.userSessions", get(user_sessions))
        .with_procedure(Procedure::admin(), state)
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use crate::handler::test::{
        cookie_header, create_test_server, create_test_server_with_state, login, register,
    };
    use crate::service::ServiceState;
    use crate::service::tests::config;

    #[tokio::test]
    async fn users_are_forbidden() -> anyhow::Result<()> {
        let (server, state) = create_test_server().await?;
        register(&server, "jane@example.com", "Secret123").await;
        let cookies = cookie_header(&login(&server, "jane@example.com", "Secret123").await);
        let user = state.users.find_user_by_email("jane@example.com").await?.unwrap();

        let response = server
            .get("/api/treez/admin.userSessions")
            .add_query_param("userId", user.id)
            .add_header("cookie", cookies)
            .await;

        response.assert_status_forbidden();
        let body: Value = response.json();
        assert_eq!(body["status"], "error");
        Ok(())
    }

    #[tokio::test]
    async fn admin_lists_user_sessions() -> anyhow::Result<()> {
        let mut config = config();
        config.admin_email = Some("root@example.com".into());
        config.admin_password = Some("Admin1234".into());
        let state = ServiceState::from_config(&config).await?;
        let server = create_test_server_with_state(state.clone()).await?;

        register(&server, "jane@example.com", "Secret123").await;
        login(&server, "jane@example.com", "Secret123")
            .await
            .assert_status_ok();
        let user = state.users.find_user_by_email("jane@example.com").await?.unwrap();

        let admin = cookie_header(&login(&server, "root@example.com", "Admin1234").await);
        let response = server
            .get("/api/treez/admin.userSessions")
            .add_query_param("userId", user.id)
            .add_header("cookie", admin.clone())
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["message"], "User sessions retrieved");
        assert_eq!(body["data"]["userId"], user.id.to_string());
        assert_eq!(body["data"]["sessions"].as_array().map(Vec::len), Some(1));
        assert!(body["data"]["sessions"][0].get("tokenHash").is_none());

        server
            .get("/api/treez/admin.userSessions")
            .add_query_param("userId", uuid::Uuid::now_v7())
            .add_header("cookie", admin)
            .await
            .assert_status_not_found();
        Ok(())
    }
}
