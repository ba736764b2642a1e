//! Output escaping shared by print directives and the autoescape policy.
//!
//! The emitted JavaScript modules carry their own copies of these routines
//! (generated code has no access to this crate); the safe sets and
//! replacement tables here are the specification both sides follow.

/// Punctuation left unencoded by `escapeUri`, in addition to alphanumerics.
const URI_SAFE: &str = "~!@#$&*()=:/,;?+'";

/// Punctuation left unencoded by `id`, in addition to alphanumerics.
const ID_SAFE: &str = "~!*()'";

/// HTML-escape in a single left-to-right scan; produced entities are never
/// re-scanned.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Percent-encode with the wide URI safe set (`|escapeUri`).
pub fn encode_uri(text: &str) -> String {
    percent_encode(text, URI_SAFE)
}

/// Percent-encode with the narrow component safe set (`|id`).
pub fn encode_id(text: &str) -> String {
    percent_encode(text, ID_SAFE)
}

/// Every UTF-8 byte of a character outside the safe set becomes an
/// uppercase `%XX` triplet. Control bytes are encoded like any other
/// unsafe byte.
fn percent_encode(text: &str, safe: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut buf = [0u8; 4];
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() || safe.contains(ch) {
            out.push(ch);
        } else {
            for byte in ch.encode_utf8(&mut buf).as_bytes() {
                out.push('%');
                out.push_str(&format!("{:02X}", byte));
            }
        }
    }
    out
}
