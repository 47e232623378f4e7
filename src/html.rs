//! Shared markup: escaping and the document layout.

use axum::response::Html;

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const IMPORT_MAP: &str = r#"<script type="importmap">
{
  "imports": {
    "application": "/assets/application.js",
    "@hotwired/turbo": "https://cdn.jsdelivr.net/npm/@hotwired/turbo@7.3.0/dist/turbo.es2017-esm.js",
    "@hotwired/stimulus": "https://cdn.jsdelivr.net/npm/@hotwired/stimulus@3.2.2/dist/stimulus.js",
    "bootstrap": "https://cdn.jsdelivr.net/npm/bootstrap@5.2.3/dist/js/bootstrap.esm.min.js",
    "@popperjs/core": "https://cdn.jsdelivr.net/npm/@popperjs/core@2.11.6/dist/esm/index.js",
    "controllers/bs_modal_controller": "/assets/controllers/bs_modal_controller.js",
    "controllers/countries_controller": "/assets/controllers/countries_controller.js"
  }
}
</script>"#;

/// Full document around `body`. The `modal` element is where stream
/// responses drop the user form and detail dialogs.
pub fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/bootstrap@5.2.3/dist/css/bootstrap.min.css">
{IMPORT_MAP}
<script type="module">import "application"</script>
</head>
<body>
<main class="container py-4">
{body}
</main>
<div id="modal"></div>
</body>
</html>"#,
        title = escape(title),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn layout_contains_modal_target_and_title() {
        let Html(page) = layout("Users <all>", "<p>body</p>");
        assert!(page.contains("<title>Users &lt;all&gt;</title>"));
        assert!(page.contains(r#"<div id="modal"></div>"#));
        assert!(page.contains("<p>body</p>"));
    }
}
