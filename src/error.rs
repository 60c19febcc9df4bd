use core::fmt;

use std::{error, io};

use http::StatusCode;

#[derive(Debug)]
pub enum MultipartError {
    /// Content-Type header is not found
    NoContentType,
    /// Can not parse Content-Type header
    ParseContentType,
    /// Multipart boundary is not found
    Boundary,
    /// Error during part header parsing
    Header(httparse::Error),
    /// Declared content length exceeds the configured max request size
    RequestOverflow,
    /// A single part payload exceeds the configured max file size
    FileOverflow,
    /// Error from body read or scratch file write
    Io(io::Error),
}

impl MultipartError {
    /// http status the error maps to when rendered as a response.
    pub fn status(&self) -> StatusCode {
        match *self {
            Self::RequestOverflow | Self::FileOverflow => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for MultipartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NoContentType => f.write_str("No Content-Type header found"),
            Self::ParseContentType => f.write_str("Can not parse Content-Type header"),
            Self::Boundary => f.write_str("Multipart boundary is not found"),
            Self::Header(ref e) => fmt::Display::fmt(e, f),
            Self::RequestOverflow => f.write_str("Request body exceeds the max request size"),
            Self::FileOverflow => f.write_str("Part payload exceeds the max file size"),
            Self::Io(ref e) => fmt::Display::fmt(e, f),
        }
    }
}

impl error::Error for MultipartError {}

impl From<httparse::Error> for MultipartError {
    fn from(e: httparse::Error) -> Self {
        Self::Header(e)
    }
}

impl From<io::Error> for MultipartError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
