use anyhow::Context;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use tracing::{debug, warn};

use super::claims::SessionClaims;
use crate::{config::SessionConfig, error::ApiError, state::AppState};

/// User id of the current session, if any.
///
/// Resolved from a `SessionUser` request extension set by a server-side
/// layer, else a signed `Authorization: Bearer` session token, else (only
/// with `trust_header`) the configured id header. No credentials means no
/// session; handlers decide what that means. A token that fails
/// verification is rejected outright.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionUser(pub Option<i64>);

pub(crate) fn verify_session_token(cfg: &SessionConfig, token: &str) -> anyhow::Result<i64> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(std::slice::from_ref(&cfg.issuer));
    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &validation,
    )?;
    let user_id = data
        .claims
        .sub
        .parse::<i64>()
        .context("session subject is not a user id")?;
    debug!(user_id, "session token verified");
    Ok(user_id)
}

#[async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<SessionUser>() {
            return Ok(*session);
        }

        let cfg = &state.config.session;

        if let Some(auth) = parts.headers.get(AUTHORIZATION) {
            let token = auth
                .to_str()
                .ok()
                .and_then(|h| h.strip_prefix("Bearer "))
                .ok_or(ApiError::Unauthorized("Invalid Authorization header"))?;
            let user_id = verify_session_token(cfg, token.trim()).map_err(|e| {
                warn!(error = %e, "invalid session token");
                ApiError::Unauthorized("Invalid or expired session")
            })?;
            return Ok(SessionUser(Some(user_id)));
        }

        if cfg.trust_header {
            let user_id = parts
                .headers
                .get(cfg.header.as_str())
                .and_then(|h| h.to_str().ok())
                .and_then(|v| v.trim().parse::<i64>().ok());
            return Ok(SessionUser(user_id));
        }

        debug!("request carries no session");
        Ok(SessionUser(None))
    }
}

#[cfg(test)]
pub(crate) fn sign_session_token(cfg: &SessionConfig, user_id: i64, ttl_secs: i64) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let exp = time::OffsetDateTime::now_utc().unix_timestamp() + ttl_secs;
    let claims = SessionClaims {
        sub: user_id.to_string(),
        exp: exp as usize,
        iss: cfg.issuer.clone(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )
    .expect("sign session token")
}
