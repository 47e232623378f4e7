use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{config::JwtConfig, error::AppError, format::Format, state::AppState, users::repo_types::User};

pub const SESSION_COOKIE: &str = "session";

/// JWT payload stored in the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
}

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            ttl: Duration::from_secs((ttl_minutes.max(1) as u64) * 60),
        }
    }
}

impl JwtKeys {
    pub fn sign(&self, user_id: Uuid) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }

    /// `Set-Cookie` value carrying `token`.
    pub fn session_cookie(&self, token: &str) -> String {
        format!(
            "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.ttl.as_secs()
        )
    }
}

pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

fn session_token(parts: &Parts) -> Option<String> {
    if let Some(bearer) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(bearer.trim().to_string());
    }

    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().strip_prefix("session="))
        .find(|token| !token.is_empty())
        .map(str::to_string)
}

/// Signed-in user's id, taken from the session cookie or a bearer token.
/// The token must verify and its subject must still be a stored user.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let keys = JwtKeys::from_ref(&state);
        let reject = |parts: &Parts| {
            if Format::from_parts(parts).is_stream() {
                (StatusCode::UNAUTHORIZED, "Sign in required").into_response()
            } else {
                Redirect::to("/login").into_response()
            }
        };

        let Some(token) = session_token(parts) else {
            return Err(reject(parts));
        };

        let claims = match keys.verify(&token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "invalid or expired session");
                return Err(reject(parts));
            }
        };

        match User::find(&state.db, claims.sub).await {
            Ok(Some(user)) => Ok(AuthUser(user.id)),
            Ok(None) => {
                warn!(user_id = %claims.sub, "session for missing user");
                Err(reject(parts))
            }
            Err(e) => Err(AppError::from(e).into_response()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn keys() -> JwtKeys {
        JwtKeys::from_ref(&AppState::fake())
    }

    fn parts_with(name: header::HeaderName, value: &str) -> Parts {
        Request::builder()
            .uri("/users")
            .header(name, value)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[tokio::test]
    async fn sign_and_verify() {
        let keys = keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign(user_id).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
    }

    #[tokio::test]
    async fn verify_rejects_tampered_token() {
        let keys = keys();
        let mut token = keys.sign(Uuid::new_v4()).expect("sign");
        token.push('x');
        assert!(keys.verify(&token).is_err());
    }

    #[tokio::test]
    async fn reads_token_from_cookie() {
        let parts = parts_with(header::COOKIE, "theme=dark; session=abc.def.ghi");
        assert_eq!(session_token(&parts).as_deref(), Some("abc.def.ghi"));
    }

    #[tokio::test]
    async fn reads_token_from_bearer_header() {
        let parts = parts_with(header::AUTHORIZATION, "Bearer abc.def.ghi");
        assert_eq!(session_token(&parts).as_deref(), Some("abc.def.ghi"));
    }

    #[tokio::test]
    async fn page_requests_without_session_redirect_to_login() {
        let state = AppState::fake();
        let mut parts = parts_with(header::ACCEPT, "text/html");
        let rejection = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("rejected");
        assert_eq!(rejection.status(), StatusCode::SEE_OTHER);
        assert_eq!(rejection.headers()[header::LOCATION], "/login");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn tokens_for_missing_users_are_rejected(pool: sqlx::PgPool) {
        let state = AppState::for_tests(pool);
        let token = JwtKeys::from_ref(&state).sign(Uuid::new_v4()).expect("sign");
        let mut parts = parts_with(header::COOKIE, &format!("session={token}"));
        let rejection = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("rejected");
        assert_eq!(rejection.status(), StatusCode::SEE_OTHER);
        assert_eq!(rejection.headers()[header::LOCATION], "/login");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn tokens_for_stored_users_are_accepted(pool: sqlx::PgPool) {
        use crate::users::repo_types::NewUser;

        let user = User::create(&pool, &NewUser::fixture("jwt@example.com", "hash"))
            .await
            .expect("insert user");
        let state = AppState::for_tests(pool);
        let token = JwtKeys::from_ref(&state).sign(user.id).expect("sign");
        let mut parts = parts_with(header::AUTHORIZATION, &format!("Bearer {token}"));
        let AuthUser(id) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .ok()
            .expect("accepted");
        assert_eq!(id, user.id);
    }

    #[tokio::test]
    async fn stream_requests_without_session_are_unauthorized() {
        let state = AppState::fake();
        let mut parts = parts_with(header::ACCEPT, "text/vnd.turbo-stream.html");
        let rejection = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("rejected");
        assert_eq!(rejection.status(), StatusCode::UNAUTHORIZED);
    }
}
