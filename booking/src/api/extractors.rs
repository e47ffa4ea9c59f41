//! Session extractors.
//!
//! The access token comes from an `Authorization: Bearer` header or, for
//! browser navigation such as share links, from the `session` cookie.
//!
//! - [`AuthUser`]: signed-in user, 401 otherwise
//! - [`MaybeUser`]: signed-in user if any; a bad token counts as signed out
//! - [`AdminUser`]: signed-in user listed in `ADMIN_USER_IDS`, 403 otherwise

use super::error::AppError;
use crate::server::state::AppState;
use crate::session::{SessionError, SessionUser};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

/// Cookie carrying the access token
pub const SESSION_COOKIE: &str = "session";

/// An authenticated caller
#[derive(Debug, Clone)]
pub struct AuthUser(pub SessionUser);

/// A caller who may or may not be signed in
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<SessionUser>);

/// An authenticated administrator
#[derive(Debug, Clone)]
pub struct AdminUser(pub SessionUser);

/// Value of a cookie in the request's `Cookie` header
#[must_use]
pub fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

fn access_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .or_else(|| cookie(headers, SESSION_COOKIE))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = access_token(&parts.headers)
            .ok_or_else(|| AppError::unauthorized("Sign in to continue"))?;
        Ok(Self(state.sessions.resolve(token).await?))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = access_token(&parts.headers) else {
            return Ok(Self(None));
        };
        match state.sessions.resolve(token).await {
            Ok(user) => Ok(Self(Some(user))),
            Err(SessionError::InvalidToken) => Ok(Self(None)),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !state.is_admin(&user) {
            tracing::warn!(user_id = %user.user_id, "Admin action refused");
            return Err(AppError::forbidden("Administrator access required"));
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("session=xyz"));
        assert_eq!(access_token(&headers), Some("abc"));
    }

    #[test]
    fn cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=xyz; pending_booking=1"),
        );
        assert_eq!(access_token(&headers), Some("xyz"));
        assert_eq!(cookie(&headers, "pending_booking"), Some("1"));
        assert_eq!(cookie(&headers, "missing"), None);
    }
}
