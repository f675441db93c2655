use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use std::net::SocketAddr;

use crate::auth::repo::{session_tokens, User};
use crate::error::ApiError;
use crate::state::AppState;

/// Resolves the request's bearer token to its user row. Every
/// authenticated endpoint goes through this, so an unknown or revoked
/// token is rejected before any handler runs.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                ApiError::Unauthorized("Authentication credentials were not provided.".into())
            })?;

        // "Token <key>" is what older clients send; both schemes carry
        // the same opaque token.
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .or_else(|| auth.strip_prefix("Token "))
            .ok_or_else(|| ApiError::Unauthorized("Invalid authorization scheme.".into()))?;

        let user = session_tokens::find_user(&state.db, token)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Invalid token.".into()))?;

        if !user.is_active {
            return Err(ApiError::Unauthorized("Account is disabled.".into()));
        }

        Ok(CurrentUser(user))
    }
}

/// [`CurrentUser`] gated on the staff flag.
pub struct StaffUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for StaffUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_staff {
            return Err(ApiError::Forbidden(
                "You do not have permission to perform this action.".into(),
            ));
        }
        Ok(StaffUser(user))
    }
}

/// Source address and user agent, recorded with every login attempt.
/// The first hop of X-Forwarded-For wins when a proxy sets it.
#[derive(Debug, Clone)]
pub struct ClientMeta {
    pub ip: String,
    pub user_agent: String,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientMeta {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ci| ci.0.ip().to_string())
            })
            .unwrap_or_else(|| "unknown".into());

        let user_agent = parts
            .headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Ok(Self { ip, user_agent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn meta_for(req: axum::http::Request<()>) -> ClientMeta {
        let (mut parts, _) = req.into_parts();
        ClientMeta::from_request_parts(&mut parts, &())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn forwarded_for_first_hop_wins() {
        let req = axum::http::Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .header("user-agent", "test-agent/1.0")
            .body(())
            .unwrap();
        let meta = meta_for(req).await;
        assert_eq!(meta.ip, "203.0.113.9");
        assert_eq!(meta.user_agent, "test-agent/1.0");
    }

    #[tokio::test]
    async fn falls_back_to_peer_address() {
        let mut req = axum::http::Request::builder().body(()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo::<SocketAddr>("192.0.2.1:4711".parse().unwrap()));
        let meta = meta_for(req).await;
        assert_eq!(meta.ip, "192.0.2.1");
        assert_eq!(meta.user_agent, "");
    }

    #[tokio::test]
    async fn unknown_when_nothing_identifies_the_peer() {
        let req = axum::http::Request::builder().body(()).unwrap();
        assert_eq!(meta_for(req).await.ip, "unknown");
    }
}
