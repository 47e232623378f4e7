use axum::{
    extract::{FromRef, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        jwt::{clear_session_cookie, JwtKeys},
        password::verify_password,
    },
    error::AppResult,
    html::{escape, layout},
    state::AppState,
    users::repo_types::User,
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(new_session).post(create_session))
        .route("/logout", post(destroy_session))
}

fn login_page(email: &str, alert: Option<&str>) -> String {
    let alert = alert
        .map(|a| format!(r#"<div class="alert alert-danger">{}</div>"#, escape(a)))
        .unwrap_or_default();
    format!(
        r#"<h1 class="h3 mb-3">Sign in</h1>
{alert}
<form action="/login" method="post" class="col-md-4">
  <div class="mb-3">
    <label class="form-label" for="email">Email</label>
    <input class="form-control" type="email" name="email" id="email" value="{email}" autofocus>
  </div>
  <div class="mb-3">
    <label class="form-label" for="password">Password</label>
    <input class="form-control" type="password" name="password" id="password">
  </div>
  <button class="btn btn-primary" type="submit">Log in</button>
</form>"#,
        email = escape(email),
    )
}

pub async fn new_session() -> Response {
    layout("Sign in", &login_page("", None)).into_response()
}

#[instrument(skip(state, payload))]
pub async fn create_session(
    State(state): State<AppState>,
    Form(mut payload): Form<LoginRequest>,
) -> AppResult<Response> {
    payload.email = payload.email.trim().to_lowercase();

    let user = User::find_by_email(&state.db, &payload.email).await?;
    let authenticated = match &user {
        Some(u) => verify_password(&payload.password, &u.password_hash)?,
        None => false,
    };
    let Some(user) = user.filter(|_| authenticated) else {
        warn!(email = %payload.email, "login rejected");
        let page = login_page(&payload.email, Some("Invalid email or password."));
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, layout("Sign in", &page)).into_response());
    };

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id)?;
    info!(user_id = %user.id, email = %user.email, "user signed in");
    Ok((
        [(header::SET_COOKIE, keys.session_cookie(&token))],
        Redirect::to("/users"),
    )
        .into_response())
}

pub async fn destroy_session() -> Response {
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Redirect::to("/login"),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::NewUser;
    use axum::{body::Body, http::Request};
    use sqlx::PgPool;
    use tower::ServiceExt;

    fn login_request(email: &str, password: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("email={email}&password={password}")))
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn valid_credentials_set_session_cookie(pool: PgPool) {
        let hash = crate::auth::password::hash_password("password@123").unwrap();
        User::create(&pool, &NewUser::fixture("admin@example.com", &hash))
            .await
            .unwrap();
        let app = session_routes().with_state(AppState::for_tests(pool));

        let res = app
            .oneshot(login_request("Admin%40example.com", "password%40123"))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/users");
        let cookie = res.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("session="));
        assert!(cookie.contains("HttpOnly"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn wrong_password_rerenders_form(pool: PgPool) {
        let hash = crate::auth::password::hash_password("password@123").unwrap();
        User::create(&pool, &NewUser::fixture("admin@example.com", &hash))
            .await
            .unwrap();
        let app = session_routes().with_state(AppState::for_tests(pool));

        let res = app
            .oneshot(login_request("admin%40example.com", "nope"))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(res.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn logout_clears_cookie() {
        let res = destroy_session().await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        let cookie = res.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.contains("Max-Age=0"));
    }
}
