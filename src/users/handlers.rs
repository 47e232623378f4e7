use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    countries,
    error::{AppError, AppResult},
    format::{stream, Format, StreamAction, TurboStream},
    html::layout,
    skills::repo_types::{Skill, UserSkill},
    state::AppState,
    users::{
        dto::{MethodOverride, StatesQuery, UserForm, UserParams},
        repo_types::User,
        services::{create_user, update_user, SaveError, ValidationErrors},
        views,
    },
};

type FormPairs = Form<Vec<(String, String)>>;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(index).post(create))
        .route("/users/new", get(new))
        .route("/users/fetch_country_states", get(fetch_country_states))
        .route(
            "/users/:id",
            get(show).patch(update).delete(destroy).post(overridden),
        )
        .route("/users/:id/edit", get(edit))
}

async fn find_user(state: &AppState, id: Uuid) -> AppResult<User> {
    User::find(&state.db, id)
        .await?
        .ok_or(AppError::NotFound("User"))
}

/// Empties the modal container once its form has been accepted.
fn close_modal() -> String {
    stream(StreamAction::Update, views::MODAL_TARGET, "")
}

fn form_response(
    format: Format,
    title: &str,
    form: &UserForm,
    errors: &ValidationErrors,
    skills: &[Skill],
) -> Response {
    let status = if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    let markup = views::form(form, errors, skills);
    match format {
        Format::TurboStream => TurboStream::with_status(
            status,
            stream(
                StreamAction::Replace,
                views::MODAL_TARGET,
                &views::modal(title, &markup),
            ),
        )
        .into_response(),
        Format::Html => (
            status,
            layout(title, &views::page_with_back_link(title, &markup)),
        )
            .into_response(),
    }
}

#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    format: Format,
) -> AppResult<Response> {
    let users = User::list(&state.db).await?;
    Ok(match format {
        Format::TurboStream => TurboStream::ok(stream(
            StreamAction::Replace,
            views::USERS_TARGET,
            &views::users_list(&users),
        ))
        .into_response(),
        Format::Html => layout("Users", &views::index_body(&users)).into_response(),
    })
}

#[instrument(skip(state))]
pub async fn new(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    format: Format,
) -> AppResult<Response> {
    let skills = Skill::all(&state.db).await?;
    Ok(form_response(
        format,
        "New user",
        &UserForm::default(),
        &ValidationErrors::default(),
        &skills,
    ))
}

#[instrument(skip(state, pairs))]
pub async fn create(
    State(state): State<AppState>,
    AuthUser(current_user): AuthUser,
    format: Format,
    Form(pairs): FormPairs,
) -> AppResult<Response> {
    let params = UserParams::from_pairs(pairs);
    match create_user(&state.db, params.clone()).await {
        Ok(user) => {
            info!(%current_user, user_id = %user.id, "created user via form");
            Ok(match format {
                Format::TurboStream => TurboStream::ok(format!(
                    "{}{}",
                    stream(
                        StreamAction::Prepend,
                        views::USERS_TARGET,
                        &views::user_partial(&user)
                    ),
                    close_modal()
                ))
                .into_response(),
                Format::Html => Redirect::to(&format!("/users/{}", user.id)).into_response(),
            })
        }
        Err(SaveError::Invalid(errors)) => {
            let skills = Skill::all(&state.db).await?;
            Ok(form_response(
                format,
                "New user",
                &UserForm::from_params(None, &params),
                &errors,
                &skills,
            ))
        }
        Err(SaveError::Failed(e)) => Err(e),
    }
}

#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    format: Format,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let user = find_user(&state, id).await?;
    let skills = UserSkill::for_user(&state.db, id).await?;
    let details = views::details(&user, &skills);
    Ok(match format {
        Format::TurboStream => TurboStream::ok(stream(
            StreamAction::Replace,
            views::MODAL_TARGET,
            &views::modal(&user.name, &details),
        ))
        .into_response(),
        Format::Html => {
            let body = format!(
                r#"{details}<p><a class="btn btn-outline-primary" href="/users/{id}/edit">Edit</a></p>"#
            );
            layout(&user.name, &views::page_with_back_link(&user.name, &body)).into_response()
        }
    })
}

#[instrument(skip(state))]
pub async fn edit(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    format: Format,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let user = find_user(&state, id).await?;
    let rated = UserSkill::for_user(&state.db, id).await?;
    let skills = Skill::all(&state.db).await?;
    Ok(form_response(
        format,
        "Editing user",
        &UserForm::from_user(&user, &rated),
        &ValidationErrors::default(),
        &skills,
    ))
}

async fn apply_update(
    state: &AppState,
    format: Format,
    id: Uuid,
    pairs: Vec<(String, String)>,
) -> AppResult<Response> {
    let params = UserParams::from_pairs(pairs);
    match update_user(&state.db, id, params.clone()).await {
        Ok(user) => Ok(match format {
            Format::TurboStream => TurboStream::ok(format!(
                "{}{}",
                stream(
                    StreamAction::Replace,
                    &views::dom_id(&user),
                    &views::user_partial(&user)
                ),
                close_modal()
            ))
            .into_response(),
            Format::Html => Redirect::to(&format!("/users/{}", user.id)).into_response(),
        }),
        Err(SaveError::Invalid(errors)) => {
            let skills = Skill::all(&state.db).await?;
            Ok(form_response(
                format,
                "Editing user",
                &UserForm::from_params(Some(id), &params),
                &errors,
                &skills,
            ))
        }
        Err(SaveError::Failed(e)) => Err(e),
    }
}

async fn apply_destroy(state: &AppState, format: Format, id: Uuid) -> AppResult<Response> {
    if !User::delete(&state.db, id).await? {
        return Err(AppError::NotFound("User"));
    }
    info!(user_id = %id, "user deleted");
    Ok(match format {
        Format::TurboStream => TurboStream::ok("").into_response(),
        Format::Html => Redirect::to("/users").into_response(),
    })
}

#[instrument(skip(state, pairs))]
pub async fn update(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    format: Format,
    Path(id): Path<Uuid>,
    Form(pairs): FormPairs,
) -> AppResult<Response> {
    apply_update(&state, format, id, pairs).await
}

#[instrument(skip(state))]
pub async fn destroy(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    format: Format,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    apply_destroy(&state, format, id).await
}

/// `POST /users/:id?_method=...` from plain HTML forms.
#[instrument(skip(state, pairs))]
pub async fn overridden(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    format: Format,
    Path(id): Path<Uuid>,
    Query(method): Query<MethodOverride>,
    Form(pairs): FormPairs,
) -> AppResult<Response> {
    match method.method.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("patch") | Some("put") => apply_update(&state, format, id, pairs).await,
        Some("delete") => apply_destroy(&state, format, id).await,
        other => {
            warn!(method = ?other, "unsupported method override");
            Ok(StatusCode::METHOD_NOT_ALLOWED.into_response())
        }
    }
}

#[instrument]
pub async fn fetch_country_states(
    AuthUser(_): AuthUser,
    format: Format,
    Query(query): Query<StatesQuery>,
) -> AppResult<Response> {
    if !format.is_stream() {
        return Err(AppError::NotAcceptable("states are only available as a turbo stream"));
    }
    let code = query.country_code.unwrap_or_default();
    let states = countries::states(&code);
    debug!(country_code = %code, count = states.map_or(0, <[_]>::len), "country states");
    Ok(TurboStream::ok(stream(
        StreamAction::Replace,
        views::STATE_SELECT_ID,
        &views::states_select(states, ""),
    ))
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        app::build_app,
        auth::jwt::JwtKeys,
        format::TURBO_STREAM_CONTENT_TYPE,
        skills,
    };
    use axum::{
        body::{to_bytes, Body},
        extract::FromRef,
        http::{header, Method, Request},
    };
    use sqlx::PgPool;
    use tower::ServiceExt;

    const STREAM: &str = "text/vnd.turbo-stream.html, text/html, application/xhtml+xml";
    const HTML: &str = "text/html,application/xhtml+xml";

    struct TestApp {
        app: Router,
        cookie: String,
        pool: PgPool,
        user_id: Uuid,
    }

    fn form_body(fields: &[(&str, &str)]) -> String {
        serde_urlencoded::to_string(fields).unwrap()
    }

    fn user_fields<'a>(name: &'a str, email: &'a str, contact: &'a str) -> Vec<(&'a str, &'a str)> {
        vec![
            ("user[name]", name),
            ("user[email]", email),
            ("user[password]", "password@123"),
            ("user[contact_number]", contact),
            ("user[country]", "PK"),
            ("user[state]", "PB"),
            ("user[city]", "Lahore"),
        ]
    }

    impl TestApp {
        async fn new(pool: PgPool) -> Self {
            skills::seed(&pool).await.unwrap();
            let signed_in = create_user(
                &pool,
                UserParams::from_pairs(
                    user_fields("Signed In", "signed.in@example.com", "+92 300 1111111")
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
            )
            .await
            .unwrap();
            let state = AppState::for_tests(pool.clone());
            let token = JwtKeys::from_ref(&state).sign(signed_in.id).unwrap();
            Self {
                app: build_app(state),
                cookie: format!("session={token}"),
                pool,
                user_id: signed_in.id,
            }
        }

        async fn request(
            &self,
            method: Method,
            uri: &str,
            accept: &str,
            form: Option<String>,
        ) -> Response {
            let mut builder = Request::builder()
                .method(method)
                .uri(uri)
                .header(header::ACCEPT, accept)
                .header(header::COOKIE, &self.cookie);
            let body = match form {
                Some(form) => {
                    builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
                    Body::from(form)
                }
                None => Body::empty(),
            };
            self.app
                .clone()
                .oneshot(builder.body(body).unwrap())
                .await
                .unwrap()
        }

        async fn other_user(&self, email: &str, contact: &str) -> User {
            create_user(
                &self.pool,
                UserParams::from_pairs(
                    user_fields("Other User", email, contact)
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
            )
            .await
            .unwrap()
        }
    }

    async fn body_text(res: Response) -> String {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn content_type(res: &Response) -> &str {
        res.headers()[header::CONTENT_TYPE].to_str().unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn index_renders_full_page(pool: PgPool) {
        let t = TestApp::new(pool).await;
        let res = t.request(Method::GET, "/users", HTML, None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(content_type(&res), "text/html; charset=utf-8");
        let body = body_text(res).await;
        assert!(body.contains("<!DOCTYPE html>"));
        assert!(body.contains("signed.in@example.com"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn index_requires_session(pool: PgPool) {
        let app = build_app(AppState::for_tests(pool));
        let res = app
            .oneshot(Request::builder().uri("/users").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/login");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn new_streams_form_into_modal(pool: PgPool) {
        let t = TestApp::new(pool).await;
        let res = t.request(Method::GET, "/users/new", STREAM, None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(content_type(&res), TURBO_STREAM_CONTENT_TYPE);
        let body = body_text(res).await;
        assert!(body.contains(r#"target="modal""#));
        assert!(body.contains(r#"id="user_form""#));
        assert!(body.contains("React JS"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_as_stream_renders_user_partial(pool: PgPool) {
        let t = TestApp::new(pool).await;
        let form = form_body(&user_fields("test name", "new@example.com", "+92 300 2222222"));
        let res = t.request(Method::POST, "/users", STREAM, Some(form)).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(content_type(&res), TURBO_STREAM_CONTENT_TYPE);
        let body = body_text(res).await;
        assert!(body.contains(r#"action="prepend" target="users""#));
        assert!(body.contains("test name"));
        assert_eq!(User::count(&t.pool).await.unwrap(), 2);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_as_html_redirects_to_user(pool: PgPool) {
        let t = TestApp::new(pool).await;
        let form = form_body(&user_fields("test name", "page@example.com", "+92 300 3333333"));
        let res = t.request(Method::POST, "/users", HTML, Some(form)).await;

        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        let created = User::find_by_email(&t.pool, "page@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            res.headers()[header::LOCATION],
            format!("/users/{}", created.id).as_str()
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_without_name_and_email_rerenders_form(pool: PgPool) {
        let t = TestApp::new(pool).await;
        let form = form_body(&user_fields("", "", "+92 300 4444444"));
        let res = t.request(Method::POST, "/users", STREAM, Some(form)).await;

        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(content_type(&res), TURBO_STREAM_CONTENT_TYPE);
        let body = body_text(res).await;
        assert!(body.contains(r#"target="modal""#));
        assert!(body.contains("Email can&#39;t be blank"));
        assert!(body.contains("Name can&#39;t be blank"));
        assert_eq!(User::count(&t.pool).await.unwrap(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_with_taken_email_shows_uniqueness_error(pool: PgPool) {
        let t = TestApp::new(pool).await;
        let form = form_body(&user_fields("Copy", "signed.in@example.com", "+92 300 5555555"));
        let res = t.request(Method::POST, "/users", STREAM, Some(form)).await;

        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_text(res).await;
        assert!(body.contains("Email has already been taken"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn update_as_stream_replaces_user_partial(pool: PgPool) {
        let t = TestApp::new(pool).await;
        let other = t.other_user("other@example.com", "+92 300 6666666").await;
        let form = form_body(&user_fields("test name", "renamed@example.com", "+92 300 6666666"));
        let res = t
            .request(Method::PATCH, &format!("/users/{}", other.id), STREAM, Some(form))
            .await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(content_type(&res), TURBO_STREAM_CONTENT_TYPE);
        let body = body_text(res).await;
        assert!(body.contains(&format!(r#"action="replace" target="user_{}""#, other.id)));
        let reloaded = User::find(&t.pool, other.id).await.unwrap().unwrap();
        assert_eq!(reloaded.name, "test name");
        assert_eq!(User::count(&t.pool).await.unwrap(), 2);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn update_through_method_override_redirects(pool: PgPool) {
        let t = TestApp::new(pool).await;
        let other = t.other_user("override@example.com", "+92 300 7777777").await;
        let form = form_body(&user_fields("test name", "override@example.com", "+92 300 7777777"));
        let res = t
            .request(
                Method::POST,
                &format!("/users/{}?_method=patch", other.id),
                HTML,
                Some(form),
            )
            .await;

        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            res.headers()[header::LOCATION],
            format!("/users/{}", other.id).as_str()
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn update_with_blank_fields_rerenders_form(pool: PgPool) {
        let t = TestApp::new(pool).await;
        let other = t.other_user("blank@example.com", "+92 300 8888888").await;
        let form = form_body(&user_fields("", "", "+92 300 8888888"));
        let res = t
            .request(Method::PATCH, &format!("/users/{}", other.id), STREAM, Some(form))
            .await;

        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_text(res).await;
        assert!(body.contains("Email can&#39;t be blank"));
        assert!(body.contains("Name can&#39;t be blank"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn destroy_as_stream_returns_empty_body(pool: PgPool) {
        let t = TestApp::new(pool).await;
        let other = t.other_user("gone@example.com", "+92 300 9999999").await;
        let res = t
            .request(Method::DELETE, &format!("/users/{}", other.id), STREAM, None)
            .await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(content_type(&res), TURBO_STREAM_CONTENT_TYPE);
        assert!(body_text(res).await.is_empty());
        assert_eq!(User::count(&t.pool).await.unwrap(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn destroy_as_html_redirects_to_index(pool: PgPool) {
        let t = TestApp::new(pool).await;
        let other = t.other_user("bye@example.com", "+92 300 1212121").await;
        let res = t
            .request(
                Method::POST,
                &format!("/users/{}?_method=delete", other.id),
                HTML,
                Some(String::new()),
            )
            .await;

        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/users");
        assert!(User::find(&t.pool, other.id).await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn show_and_edit_stream_into_modal(pool: PgPool) {
        let t = TestApp::new(pool).await;
        let other = t.other_user("shown@example.com", "+92 300 1313131").await;

        let res = t
            .request(Method::GET, &format!("/users/{}", other.id), STREAM, None)
            .await;
        assert_eq!(content_type(&res), TURBO_STREAM_CONTENT_TYPE);
        assert!(body_text(res).await.contains("shown@example.com"));

        let res = t
            .request(Method::GET, &format!("/users/{}/edit", other.id), STREAM, None)
            .await;
        assert_eq!(content_type(&res), TURBO_STREAM_CONTENT_TYPE);
        assert!(body_text(res).await.contains("Update User"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn unknown_user_is_404(pool: PgPool) {
        let t = TestApp::new(pool).await;
        let res = t
            .request(Method::GET, &format!("/users/{}", Uuid::new_v4()), HTML, None)
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn deleted_account_loses_its_session(pool: PgPool) {
        let t = TestApp::new(pool).await;
        let res = t
            .request(Method::DELETE, &format!("/users/{}", t.user_id), HTML, None)
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(User::count(&t.pool).await.unwrap(), 0);

        let res = t.request(Method::GET, "/users", HTML, None).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/login");

        let form = form_body(&user_fields("Ghost", "ghost@example.com", "+92 300 1414141"));
        let res = t.request(Method::POST, "/users", STREAM, Some(form)).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(User::count(&t.pool).await.unwrap(), 0);
    }

    const STATES_PATH: &str = "/users/fetch_country_states";

    #[sqlx::test(migrations = "./migrations")]
    async fn states_for_pakistan(pool: PgPool) {
        let t = TestApp::new(pool).await;
        let res = t
            .request(
                Method::GET,
                &format!("{STATES_PATH}?country_code=PK"),
                "text/vnd.turbo_stream.html",
                None,
            )
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(content_type(&res), TURBO_STREAM_CONTENT_TYPE);
        let body = body_text(res).await;
        assert!(body.contains(r#"target="user_state""#));
        assert_eq!(body.matches("<option").count(), 8);
        assert!(body.contains(r#"<option value="PB">Punjab</option>"#));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn states_for_united_states(pool: PgPool) {
        let t = TestApp::new(pool).await;
        let res = t
            .request(Method::GET, &format!("{STATES_PATH}?country_code=US"), STREAM, None)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_text(res).await;
        assert_eq!(body.matches("<option").count(), 58);
        assert!(body.contains(r#"<option value="CA">California</option>"#));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn states_for_unknown_country_are_empty(pool: PgPool) {
        let t = TestApp::new(pool).await;
        let res = t
            .request(Method::GET, &format!("{STATES_PATH}?country_code=abc"), STREAM, None)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_text(res).await;
        assert_eq!(body.matches("<option").count(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn states_are_not_served_as_html(pool: PgPool) {
        let t = TestApp::new(pool).await;
        let res = t
            .request(Method::GET, &format!("{STATES_PATH}?country_code=PK"), HTML, None)
            .await;
        assert_eq!(res.status(), StatusCode::NOT_ACCEPTABLE);
    }

    #[tokio::test]
    async fn states_require_session() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(
                Request::builder()
                    .uri(format!("{STATES_PATH}?country_code=PK"))
                    .header(header::ACCEPT, STREAM)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
