// libs/auth-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use security_cell::services::guard::RateGuard;
use shared_config::AppConfig;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;
use shared_utils::extractor::{client_addr, user_agent};

use crate::models::{
    AuthError, LoginRequest, LogoutAllRequest, LogoutRequest, RefreshRequest, RequestContext,
};
use crate::services::auth::AuthService;

/// Shared state for the auth routes: configuration plus the failed-login
/// guard, which must outlive individual requests.
#[derive(Clone)]
pub struct AuthCellState {
    pub config: Arc<AppConfig>,
    pub login_guard: RateGuard,
}

fn map_error(err: AuthError) -> AppError {
    match err {
        AuthError::InvalidCredentials => AppError::InvalidCredentials,
        AuthError::AccountLocked(locked_until) => AppError::AccountLocked { locked_until },
        AuthError::AccountDeactivated => AppError::AccountDeactivated,
        AuthError::EmailNotVerified => AppError::EmailNotVerified,
        AuthError::InvalidRefreshToken => {
            AppError::Unauthorized("Invalid refresh token".to_string())
        }
        AuthError::PrincipalNotFound => AppError::NotFound("Account not found".to_string()),
        AuthError::SessionNotFound => AppError::NotFound("Session not found".to_string()),
        AuthError::TokenError(msg) | AuthError::StoreError(msg) => AppError::Internal(msg),
    }
}

fn request_context(headers: &HeaderMap) -> RequestContext {
    RequestContext {
        source_addr: client_addr(headers),
        user_agent: user_agent(headers),
    }
}

async fn guarded_login(
    state: &AuthCellState,
    headers: &HeaderMap,
    request: LoginRequest,
    provider_variant: bool,
) -> Result<Json<Value>, AppError> {
    let ctx = request_context(headers);

    // Only failed attempts count toward the window; a success clears it.
    state.login_guard.check(&ctx.source_addr).await?;

    let result = if provider_variant {
        AuthService::provider(&state.config).login(request, &ctx).await
    } else {
        AuthService::patient(&state.config).login(request, &ctx).await
    };

    match result {
        Ok(response) => {
            state.login_guard.record_success(&ctx.source_addr).await;
            Ok(Json(json!({
                "success": true,
                "access_token": response.access_token,
                "refresh_token": response.refresh_token,
                "token_type": response.token_type,
                "expires_in": response.expires_in,
                "principal": response.principal,
            })))
        }
        Err(err) => {
            if matches!(err, AuthError::InvalidCredentials) {
                state.login_guard.record_failure(&ctx.source_addr).await;
            }
            Err(map_error(err))
        }
    }
}

// ==============================================================================
// PROVIDER AUTH HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn provider_login(
    State(state): State<AuthCellState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    guarded_login(&state, &headers, request, true).await
}

#[axum::debug_handler]
pub async fn provider_refresh(
    State(state): State<AuthCellState>,
    headers: HeaderMap,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<Value>, AppError> {
    let ctx = request_context(&headers);
    state.login_guard.check(&ctx.source_addr).await?;

    let result = AuthService::provider(&state.config)
        .refresh(&request.refresh_token, &ctx)
        .await;
    let response = match result {
        Ok(response) => response,
        Err(err) => {
            // Failed refreshes count toward the same per-source window as
            // failed logins.
            if matches!(err, AuthError::InvalidRefreshToken) {
                state.login_guard.record_failure(&ctx.source_addr).await;
            }
            return Err(map_error(err));
        }
    };

    Ok(Json(json!({
        "success": true,
        "access_token": response.access_token,
        "refresh_token": response.refresh_token,
        "token_type": response.token_type,
        "expires_in": response.expires_in,
    })))
}

#[axum::debug_handler]
pub async fn provider_logout(
    State(state): State<AuthCellState>,
    headers: HeaderMap,
    Json(request): Json<LogoutRequest>,
) -> Result<Json<Value>, AppError> {
    let ctx = request_context(&headers);
    AuthService::provider(&state.config)
        .logout(&request.refresh_token, &ctx)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({ "success": true, "message": "Logged out" })))
}

#[axum::debug_handler]
pub async fn provider_logout_all(
    State(state): State<AuthCellState>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
    Json(request): Json<LogoutAllRequest>,
) -> Result<Json<Value>, AppError> {
    let ctx = request_context(&headers);
    let revoked = AuthService::provider(&state.config)
        .logout_all(user.id, &request.password, &ctx)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({ "success": true, "sessions_revoked": revoked })))
}

// ==============================================================================
// PATIENT AUTH HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn patient_login(
    State(state): State<AuthCellState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    guarded_login(&state, &headers, request, false).await
}

#[axum::debug_handler]
pub async fn patient_refresh(
    State(state): State<AuthCellState>,
    headers: HeaderMap,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<Value>, AppError> {
    let ctx = request_context(&headers);
    state.login_guard.check(&ctx.source_addr).await?;

    let result = AuthService::patient(&state.config)
        .refresh(&request.refresh_token, &ctx)
        .await;
    let response = match result {
        Ok(response) => response,
        Err(err) => {
            // Failed refreshes count toward the same per-source window as
            // failed logins.
            if matches!(err, AuthError::InvalidRefreshToken) {
                state.login_guard.record_failure(&ctx.source_addr).await;
            }
            return Err(map_error(err));
        }
    };

    Ok(Json(json!({
        "success": true,
        "access_token": response.access_token,
        "refresh_token": response.refresh_token,
        "token_type": response.token_type,
        "expires_in": response.expires_in,
    })))
}

#[axum::debug_handler]
pub async fn patient_logout(
    State(state): State<AuthCellState>,
    headers: HeaderMap,
    Json(request): Json<LogoutRequest>,
) -> Result<Json<Value>, AppError> {
    let ctx = request_context(&headers);
    AuthService::patient(&state.config)
        .logout(&request.refresh_token, &ctx)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({ "success": true, "message": "Logged out" })))
}

#[axum::debug_handler]
pub async fn patient_logout_all(
    State(state): State<AuthCellState>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
    Json(request): Json<LogoutAllRequest>,
) -> Result<Json<Value>, AppError> {
    let ctx = request_context(&headers);
    let revoked = AuthService::patient(&state.config)
        .logout_all(user.id, &request.password, &ctx)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({ "success": true, "sessions_revoked": revoked })))
}

#[axum::debug_handler]
pub async fn patient_sessions(
    State(state): State<AuthCellState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let sessions = AuthService::patient(&state.config)
        .list_sessions(user.id, user.session_id)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({ "success": true, "sessions": sessions })))
}

#[axum::debug_handler]
pub async fn revoke_patient_session(
    State(state): State<AuthCellState>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let ctx = request_context(&headers);
    AuthService::patient(&state.config)
        .revoke_session(session_id, user.id, &ctx)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({ "success": true, "message": "Session revoked" })))
}
