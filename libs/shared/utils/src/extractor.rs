use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use shared_config::AppConfig;
use shared_models::auth::{AccessClaims, AuthUser, Role};
use shared_models::error::AppError;

use crate::jwt::validate_token;

fn bearer_token(request: &Request<Body>) -> Result<String, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid authorization header format".to_string()))?;

    if !auth_value.starts_with("Bearer ") {
        return Err(AppError::Unauthorized("Invalid authorization header format".to_string()));
    }

    Ok(auth_value[7..].to_string())
}

fn authenticate(config: &AppConfig, request: &Request<Body>) -> Result<AuthUser, AppError> {
    let token = bearer_token(request)?;

    let claims: AccessClaims = validate_token(&token, &config.access_token_secret)
        .map_err(AppError::Unauthorized)?;

    Ok(AuthUser::from_claims(&claims))
}

/// Bearer middleware for provider routes. The verified caller identity is
/// added to request extensions for handlers to consume.
pub async fn provider_auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&config, &request)?;
    if user.role != Role::Provider {
        return Err(AppError::Forbidden("Provider access required".to_string()));
    }
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Bearer middleware for patient routes.
pub async fn patient_auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&config, &request)?;
    if user.role != Role::Patient {
        return Err(AppError::Forbidden("Patient access required".to_string()));
    }
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Best-effort source address for rate limiting and session records. Behind
/// the ingress proxy the first `x-forwarded-for` hop is the client.
pub fn client_addr(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            return value.to_string();
        }
    }

    "unknown".to_string()
}

/// User agent string, or a placeholder when the client sent none.
pub fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}
