//! Client-side scripts compiled into the binary.

use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::state::AppState;

const APPLICATION_JS: &str = include_str!("../assets/application.js");
const BS_MODAL_CONTROLLER_JS: &str = include_str!("../assets/controllers/bs_modal_controller.js");
const COUNTRIES_CONTROLLER_JS: &str = include_str!("../assets/controllers/countries_controller.js");

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/assets/application.js", get(|| async { javascript(APPLICATION_JS) }))
        .route("/assets/controllers/:file", get(controller))
}

fn javascript(source: &'static str) -> Response {
    (
        [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
        source,
    )
        .into_response()
}

async fn controller(Path(file): Path<String>) -> Response {
    match file.as_str() {
        "bs_modal_controller.js" => javascript(BS_MODAL_CONTROLLER_JS),
        "countries_controller.js" => javascript(COUNTRIES_CONTROLLER_JS),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    async fn get(uri: &str) -> Response {
        router()
            .with_state(AppState::fake())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn serves_controllers_as_javascript() {
        let res = get("/assets/controllers/countries_controller.js").await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()[header::CONTENT_TYPE],
            "text/javascript; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn unknown_controller_is_404() {
        let res = get("/assets/controllers/nope.js").await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn modal_controller_keeps_misspelled_hook() {
        assert!(BS_MODAL_CONTROLLER_JS.contains("disconnet()"));
        assert!(!BS_MODAL_CONTROLLER_JS.contains("disconnect()"));
    }
}
