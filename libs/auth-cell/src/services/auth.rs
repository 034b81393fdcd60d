// libs/auth-cell/src/services/auth.rs
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use security_cell::models::{SecurityEvent, SecurityEventKind};
use security_cell::services::events::SecurityEventService;
use security_cell::services::password::PasswordService;
use shared_config::AppConfig;
use shared_models::auth::SessionView;
use shared_utils::digest::{constant_time_eq, device_fingerprint, token_digest};

use crate::models::{
    AuthError, LoginRequest, LoginResponse, PrincipalSummary, RequestContext,
};
use crate::services::credentials::CredentialService;
use crate::services::directory::{PrincipalDirectory, StoreDirectory};
use crate::services::session::SessionService;

/// Role-agnostic auth manager. The directory supplies the principal rows
/// and the policy (lockout ladder, TTLs, session cap); this type owns the
/// login / refresh / logout state machine for both principal kinds.
pub struct AuthService<D: PrincipalDirectory> {
    directory: D,
    sessions: SessionService,
    credentials: CredentialService,
    events: SecurityEventService,
}

impl AuthService<StoreDirectory> {
    pub fn provider(config: &AppConfig) -> Self {
        Self::with_directory(config, StoreDirectory::provider(config))
    }

    pub fn patient(config: &AppConfig) -> Self {
        Self::with_directory(config, StoreDirectory::patient(config))
    }
}

impl<D: PrincipalDirectory> AuthService<D> {
    pub fn with_directory(config: &AppConfig, directory: D) -> Self {
        Self {
            directory,
            sessions: SessionService::new(config),
            credentials: CredentialService::new(config),
            events: SecurityEventService::new(config),
        }
    }

    pub async fn login(
        &self,
        request: LoginRequest,
        ctx: &RequestContext,
    ) -> Result<LoginResponse, AuthError> {
        let policy = self.directory.policy();

        let Some(principal) = self.directory.lookup_by_identifier(&request.identifier).await?
        else {
            // Same error as a bad password: identifiers are not probeable.
            return Err(AuthError::InvalidCredentials);
        };

        let now = Utc::now();
        if let Some(locked_until) = principal.locked_until {
            if locked_until > now {
                warn!("Login attempt on locked account {}", principal.id);
                return Err(AuthError::AccountLocked(locked_until));
            }
        }

        if !principal.is_active {
            return Err(AuthError::AccountDeactivated);
        }

        if policy.requires_email_verification && !principal.email_verified {
            return Err(AuthError::EmailNotVerified);
        }

        let password_ok =
            PasswordService::verify_password(&request.password, &principal.password_hash)
                .map_err(|e| AuthError::StoreError(e.to_string()))?;

        if !password_ok {
            return Err(self.handle_failed_password(&principal, ctx).await?);
        }

        self.directory.record_successful_login(principal.id).await?;

        let device = request.device_descriptor.as_deref().unwrap_or("unknown");
        let fingerprint = device_fingerprint(&ctx.user_agent, &ctx.source_addr, device);

        let session_id = Uuid::new_v4();
        let access_ttl = policy.access_ttl_for(request.remember_me);
        let refresh_ttl = policy.refresh_ttl_for(request.remember_me);

        let pair = self.credentials.mint_pair(
            &principal,
            policy.role,
            session_id,
            &fingerprint,
            access_ttl,
            refresh_ttl,
        )?;

        self.sessions
            .create(
                policy.session_table,
                principal.id,
                session_id,
                &token_digest(&pair.refresh_token),
                device,
                &ctx.source_addr,
                &ctx.user_agent,
                refresh_ttl,
            )
            .await?;

        if let Some(cap) = policy.session_cap {
            self.sessions
                .enforce_cap(policy.session_table, principal.id, cap)
                .await?;
        }

        self.events
            .record_best_effort(
                SecurityEvent::new(
                    SecurityEventKind::LoginSuccess,
                    Some(principal.id),
                    &ctx.source_addr,
                    &ctx.user_agent,
                )
                .with_detail(json!({ "session_id": session_id, "remember_me": request.remember_me })),
            )
            .await;

        info!("{} {} logged in", policy.role, principal.id);

        Ok(LoginResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: pair.access_expires_in,
            principal: PrincipalSummary {
                id: principal.id,
                email: principal.email.clone(),
                role: policy.role,
                email_verified: principal.email_verified,
            },
        })
    }

    /// Rotate a refresh credential: verify, match against the stored hash,
    /// swap in the new hash. The old token dies with the swap; a replay of
    /// it no longer matches the stored digest.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        ctx: &RequestContext,
    ) -> Result<LoginResponse, AuthError> {
        let policy = self.directory.policy();

        let claims = self.credentials.verify_refresh(refresh_token)?;
        if claims.role != policy.role {
            return Err(AuthError::InvalidRefreshToken);
        }

        let session = self
            .sessions
            .find(policy.session_table, claims.sid)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        let now = Utc::now();
        if !session.is_live(now) {
            return Err(AuthError::InvalidRefreshToken);
        }
        if !constant_time_eq(&token_digest(refresh_token), &session.refresh_hash) {
            warn!("Refresh token digest mismatch for session {}", session.id);
            return Err(AuthError::InvalidRefreshToken);
        }

        let principal = self
            .directory
            .lookup_by_id(claims.sub)
            .await?
            .filter(|p| p.is_active)
            .ok_or(AuthError::PrincipalNotFound)?;

        // The rotated refresh token inherits the session's remaining
        // lifetime; rotation never extends a session.
        let remaining = session.expires_at - now;
        let pair = self.credentials.mint_pair(
            &principal,
            policy.role,
            session.id,
            &claims.fp,
            policy.access_ttl,
            remaining,
        )?;

        self.sessions
            .rotate(
                policy.session_table,
                session.id,
                &session.refresh_hash,
                &token_digest(&pair.refresh_token),
            )
            .await?;

        self.events
            .record_best_effort(SecurityEvent::new(
                SecurityEventKind::RefreshTokenUsed,
                Some(principal.id),
                &ctx.source_addr,
                &ctx.user_agent,
            ))
            .await;

        Ok(LoginResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: pair.access_expires_in,
            principal: PrincipalSummary {
                id: principal.id,
                email: principal.email.clone(),
                role: policy.role,
                email_verified: principal.email_verified,
            },
        })
    }

    /// Revoke the session behind a refresh token. Idempotent: revoking an
    /// already-revoked or unknown session still succeeds.
    pub async fn logout(&self, refresh_token: &str, ctx: &RequestContext) -> Result<(), AuthError> {
        let policy = self.directory.policy();

        let Ok(claims) = self.credentials.verify_refresh(refresh_token) else {
            // An unverifiable token has no session to revoke.
            return Ok(());
        };

        self.sessions
            .revoke(policy.session_table, claims.sid, claims.sub)
            .await?;

        self.events
            .record_best_effort(SecurityEvent::new(
                SecurityEventKind::Logout,
                Some(claims.sub),
                &ctx.source_addr,
                &ctx.user_agent,
            ))
            .await;

        Ok(())
    }

    /// Revoke every live session of the principal. Requires a fresh
    /// password proof.
    pub async fn logout_all(
        &self,
        principal_id: Uuid,
        password: &str,
        ctx: &RequestContext,
    ) -> Result<usize, AuthError> {
        let policy = self.directory.policy();

        let principal = self
            .directory
            .lookup_by_id(principal_id)
            .await?
            .ok_or(AuthError::PrincipalNotFound)?;

        let password_ok = PasswordService::verify_password(password, &principal.password_hash)
            .map_err(|e| AuthError::StoreError(e.to_string()))?;
        if !password_ok {
            return Err(AuthError::InvalidCredentials);
        }

        let revoked = self
            .sessions
            .revoke_all(policy.session_table, principal_id)
            .await?;

        self.events
            .record_best_effort(
                SecurityEvent::new(
                    SecurityEventKind::LogoutAll,
                    Some(principal_id),
                    &ctx.source_addr,
                    &ctx.user_agent,
                )
                .with_detail(json!({ "sessions_revoked": revoked })),
            )
            .await;

        Ok(revoked)
    }

    pub async fn list_sessions(
        &self,
        principal_id: Uuid,
        current_session_id: Uuid,
    ) -> Result<Vec<SessionView>, AuthError> {
        let policy = self.directory.policy();
        let live = self
            .sessions
            .list_live(policy.session_table, principal_id, Utc::now())
            .await?;

        Ok(live
            .into_iter()
            .map(|s| SessionView {
                session_id: s.id,
                device: s.device,
                ip_address: s.ip_address,
                user_agent: s.user_agent,
                last_used_at: s.last_used_at,
                expires_at: s.expires_at,
                location: s.location,
                is_current: s.id == current_session_id,
            })
            .collect())
    }

    pub async fn revoke_session(
        &self,
        session_id: Uuid,
        principal_id: Uuid,
        ctx: &RequestContext,
    ) -> Result<(), AuthError> {
        let policy = self.directory.policy();
        let revoked = self
            .sessions
            .revoke(policy.session_table, session_id, principal_id)
            .await?;

        if revoked == 0 {
            // Foreign and missing sessions are indistinguishable.
            return Err(AuthError::SessionNotFound);
        }

        self.events
            .record_best_effort(
                SecurityEvent::new(
                    SecurityEventKind::SessionRevoked,
                    Some(principal_id),
                    &ctx.source_addr,
                    &ctx.user_agent,
                )
                .with_detail(json!({ "session_id": session_id })),
            )
            .await;

        Ok(())
    }

    async fn handle_failed_password(
        &self,
        principal: &crate::models::PrincipalRecord,
        ctx: &RequestContext,
    ) -> Result<AuthError, AuthError> {
        let policy = self.directory.policy();
        let failed = principal.failed_login_attempts + 1;

        let locked_until = if failed >= policy.lockout_threshold {
            Some(Utc::now() + policy.lockout_duration)
        } else {
            None
        };

        self.directory
            .record_failed_login(principal.id, failed, locked_until)
            .await?;

        let kind = if locked_until.is_some() {
            SecurityEventKind::AccountLockout
        } else {
            SecurityEventKind::LoginFailed
        };
        self.events
            .record_best_effort(
                SecurityEvent::new(kind, Some(principal.id), &ctx.source_addr, &ctx.user_agent)
                    .with_detail(json!({ "failed_attempts": failed })),
            )
            .await;

        if let Some(until) = locked_until {
            warn!(
                "Account {} locked until {} after {} failures",
                principal.id, until, failed
            );
        }

        // The caller always sees InvalidCredentials; the lock only takes
        // effect on the next attempt.
        Ok(AuthError::InvalidCredentials)
    }
}
