use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use httparse::{Error, EMPTY_HEADER};
use memchr::memmem;

use crate::{content_disposition::ContentDisposition, error::MultipartError};

/// Extract the boundary token from a multipart content type header value.
pub(crate) fn boundary(content_type: &str) -> Result<Vec<u8>, MultipartError> {
    let header = content_type.as_bytes();

    let idx = memmem::find(header, b"boundary=").ok_or(MultipartError::Boundary)?;
    let start = idx + 9;
    let len = memchr::memchr(b';', &header[start..]).unwrap_or(header.len() - start);

    let mut token = &header[start..start + len];

    // tolerate a quoted token.
    if token.len() >= 2 && token.starts_with(b"\"") && token.ends_with(b"\"") {
        token = &token[1..token.len() - 1];
    }

    if token.is_empty() {
        return Err(MultipartError::Boundary);
    }

    Ok(token.to_vec())
}

/// Parse an accumulated part header block, blank line included, into a
/// header map.
pub(crate) fn parse_headers(block: &[u8]) -> Result<HeaderMap, MultipartError> {
    let mut hdrs = [EMPTY_HEADER; 16];
    match httparse::parse_headers(block, &mut hdrs)? {
        httparse::Status::Complete((_, hdrs)) => {
            let mut headers = HeaderMap::with_capacity(hdrs.len());

            for h in hdrs {
                let name = HeaderName::try_from(h.name).map_err(|_| Error::HeaderName)?;
                let value = HeaderValue::try_from(h.value).map_err(|_| Error::HeaderValue)?;
                headers.append(name, value);
            }

            Ok(headers)
        }
        httparse::Status::Partial => Err(Error::TooManyHeaders.into()),
    }
}

/// Declared content length, if present and parsable.
pub(crate) fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers.get(&CONTENT_LENGTH)?.to_str().ok()?.parse().ok()
}

/// per part metadata pulled off a header block.
#[derive(Debug)]
pub(crate) struct PartHeader {
    pub(crate) field_name: String,
    pub(crate) filename: Option<String>,
    pub(crate) content_type: Option<String>,
}

impl PartHeader {
    pub(crate) fn from_headers(headers: &HeaderMap) -> Self {
        let (field_name, filename) = match headers.get(&CONTENT_DISPOSITION) {
            Some(value) => {
                let cd = ContentDisposition::from_slice(value.as_bytes());
                (
                    // a part without a name parameter is stored under the
                    // empty field key rather than rejected.
                    cd.name()
                        .map(|name| String::from_utf8_lossy(name).into_owned())
                        .unwrap_or_default(),
                    cd.filename().map(|name| String::from_utf8_lossy(name).into_owned()),
                )
            }
            None => (String::new(), None),
        };

        let content_type = headers
            .get(&CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .map(str::to_owned);

        Self {
            field_name,
            filename,
            content_type,
        }
    }

    /// name seeding the scratch file when the payload spills. a part with
    /// no declared filename still resolves to one.
    pub(crate) fn scratch_name(&self) -> String {
        match self.filename {
            Some(ref name) if !name.is_empty() => name.clone(),
            _ => format!("{}.tmp", self.field_name),
        }
    }
}
