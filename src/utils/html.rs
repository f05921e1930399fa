//! HTML escaping for Telegram's HTML parse mode.

/// Escape characters that would break Telegram HTML markup.
///
/// Single quotes are escaped too because listing links are emitted inside
/// single-quoted `href` attributes.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
