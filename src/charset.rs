use encoding_rs::Encoding;
use mime::Mime;

/// resolve the charset inline part payloads decode with from the request
/// content type.
///
/// multipart form submission predates utf-8 defaults, so an unspecified or
/// unknown charset falls back to latin-1 (windows-1252 is its superset
/// label in the encoding standard).
pub(crate) fn resolve(content_type: &str) -> &'static Encoding {
    content_type
        .parse::<Mime>()
        .ok()
        .and_then(|mime| {
            mime.get_param(mime::CHARSET)
                .and_then(|charset| Encoding::for_label(charset.as_str().as_bytes()))
        })
        .unwrap_or(encoding_rs::WINDOWS_1252)
}
