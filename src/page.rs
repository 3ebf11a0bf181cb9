//! Landing page rendering.
//!
//! The page is a static template with one `{{ result }}` slot, filled with
//! either the prediction, an error message, or nothing.

use axum::response::Html;

const INDEX_HTML: &str = include_str!("../templates/index.html");
const RESULT_SLOT: &str = "{{ result }}";

#[derive(Debug, Clone, PartialEq)]
pub enum PageView {
    Empty,
    Prediction(f64),
    Error(String),
}

pub fn render(view: &PageView) -> Html<String> {
    let fragment = match view {
        PageView::Empty => String::new(),
        PageView::Prediction(value) => format!(
            "<div class=\"result\">Predicted burned area: <strong id=\"prediction\">{}</strong> ha</div>",
            format_prediction(*value)
        ),
        PageView::Error(msg) => format!(
            "<div class=\"error\" id=\"error\" role=\"alert\">{}</div>",
            escape_html(msg)
        ),
    };
    Html(INDEX_HTML.replacen(RESULT_SLOT, &fragment, 1))
}

pub fn format_prediction(value: f64) -> String {
    format!("{:.2}", value)
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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
