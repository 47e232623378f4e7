//! Response format negotiation: full HTML documents or Turbo Stream fragments.

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

pub const TURBO_STREAM_MIME: &str = "text/vnd.turbo-stream.html";
pub const TURBO_STREAM_CONTENT_TYPE: &str = "text/vnd.turbo-stream.html; charset=utf-8";

/// The country dropdown controller asks for this (underscored) media type.
const TURBO_STREAM_MIME_UNDERSCORED: &str = "text/vnd.turbo_stream.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Html,
    TurboStream,
}

impl Format {
    pub fn from_parts(parts: &Parts) -> Self {
        let accept = parts
            .headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if accept.contains(TURBO_STREAM_MIME) || accept.contains(TURBO_STREAM_MIME_UNDERSCORED) {
            return Format::TurboStream;
        }

        let query = parts.uri.query().unwrap_or_default();
        let wants_stream = query
            .split('&')
            .any(|pair| pair == "format=turbo_stream");
        if wants_stream {
            Format::TurboStream
        } else {
            Format::Html
        }
    }

    pub fn is_stream(self) -> bool {
        self == Format::TurboStream
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Format
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Format::from_parts(parts))
    }
}

/// Turbo Stream actions used by the views.
#[derive(Debug, Clone, Copy)]
pub enum StreamAction {
    Replace,
    Update,
    Prepend,
}

impl StreamAction {
    fn as_str(self) -> &'static str {
        match self {
            StreamAction::Replace => "replace",
            StreamAction::Update => "update",
            StreamAction::Prepend => "prepend",
        }
    }
}

/// A `<turbo-stream>` element wrapping `content` for `target`.
pub fn stream(action: StreamAction, target: &str, content: &str) -> String {
    format!(
        "<turbo-stream action=\"{}\" target=\"{}\"><template>{}</template></turbo-stream>",
        action.as_str(),
        crate::html::escape(target),
        content
    )
}

/// Response carrying zero or more stream elements.
pub struct TurboStream {
    pub status: StatusCode,
    pub body: String,
}

impl TurboStream {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
        }
    }

    pub fn with_status(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

impl IntoResponse for TurboStream {
    fn into_response(self) -> Response {
        (
            self.status,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static(TURBO_STREAM_CONTENT_TYPE),
            )],
            self.body,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(accept: Option<&str>, uri: &str) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(accept) = accept {
            builder = builder.header(header::ACCEPT, accept);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn turbo_form_submissions_are_streams() {
        let p = parts(
            Some("text/vnd.turbo-stream.html, text/html, application/xhtml+xml"),
            "/users",
        );
        assert_eq!(Format::from_parts(&p), Format::TurboStream);
    }

    #[test]
    fn underscored_accept_from_dropdown_is_a_stream() {
        let p = parts(Some("text/vnd.turbo_stream.html"), "/users/fetch_country_states");
        assert!(Format::from_parts(&p).is_stream());
    }

    #[test]
    fn format_query_parameter_selects_stream() {
        let p = parts(None, "/users/new?format=turbo_stream");
        assert_eq!(Format::from_parts(&p), Format::TurboStream);
    }

    #[test]
    fn browsers_get_html() {
        let p = parts(Some("text/html,application/xhtml+xml"), "/users");
        assert_eq!(Format::from_parts(&p), Format::Html);
    }

    #[test]
    fn stream_wraps_content_in_template() {
        let s = stream(StreamAction::Replace, "user_1", "<p>hi</p>");
        assert_eq!(
            s,
            "<turbo-stream action=\"replace\" target=\"user_1\"><template><p>hi</p></template></turbo-stream>"
        );
    }
}
