//! HTML text helpers shared by feeds and search.

use pulldown_cmark::escape;

/// Escapes text for an element body or a double-quoted attribute.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    // Writing into a String cannot fail.
    let _ = escape::escape_html(&mut out, raw);
    out
}

/// Escapes a URL for an `href` attribute, percent-encoding what a URL may
/// not carry literally.
pub fn escape_href(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    let _ = escape::escape_href(&mut out, url);
    out
}

/// Removes markup, keeping text content. Comments and tags are dropped
/// whole; entities are left as written.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let end = if tail.starts_with("<!--") {
            tail.find("-->").map(|i| i + 3)
        } else {
            tail.find('>').map(|i| i + 1)
        };
        match end {
            Some(end) => rest = &tail[end..],
            None => {
                // Unterminated tag: treat the rest as text.
                out.push_str(tail);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
