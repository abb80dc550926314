//! Content types used by the server

pub const HTML: &str = "text/html; charset=utf-8";
pub const PNG: &str = "image/png";

fn has_essence(content_type: &str, essence: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|e| e.trim().eq_ignore_ascii_case(essence))
}

/// Multipart requests carry their boundary in the Content-Type header
///
/// # Examples
/// ```ignore
/// assert!(is_multipart("multipart/form-data; boundary=X"));
/// assert!(!is_multipart("application/x-www-form-urlencoded"));
/// ```
pub fn is_multipart(content_type: &str) -> bool {
    has_essence(content_type, "multipart/form-data")
}

/// Plain HTML form posts, fields only
pub fn is_urlencoded(content_type: &str) -> bool {
    has_essence(content_type, "application/x-www-form-urlencoded")
}
