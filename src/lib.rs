//! streaming multipart/form-data decoding with disk backed uploads.
//!
//! A request body is decoded lazily on first access into named [Part]s.
//! Part payloads are captured in memory up to a configured threshold and
//! spill transparently to scratch files in a cache directory past it,
//! while per part and whole request size limits are enforced. Scratch
//! files are owned by their [Part] and removed with it.
//!
//! `http` crate is used as request input. It provides the content type
//! and declared content length needed before the body stream is touched.
//!
//! # Examples:
//! ```rust
//! use std::io;
//!
//! use http::Request;
//! use http_formdata::{form_data, Limits, MultipartError};
//!
//! fn handle(req: &Request<()>, body: impl io::Read) -> Result<(), MultipartError> {
//!     // built once at configuration time in a real server.
//!     let limits = Limits::new().max_file_size(8 * 1024 * 1024);
//!
//!     // no body byte is read until the first accessor call.
//!     let mut form = form_data(req, body, &limits);
//!
//!     for part in form.all_parts()? {
//!         match part.file() {
//!             Some(path) => println!("{} uploaded to {}", part.field(), path.display()),
//!             None => println!("{} = {:?}", part.field(), part.inline_data()),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

mod buf;
mod charset;
mod content_disposition;
mod decoder;
mod error;
mod header;
mod limits;
mod part;
mod scratch;
mod sink;

pub use self::{
    error::MultipartError,
    limits::Limits,
    part::{Part, PartStore},
    scratch::sweep,
};

use std::io::Read;

use http::{header::CONTENT_TYPE, Request};

use crate::decoder::Decoder;

/// Prepare lazy multipart decoding for `req` with `body` as its payload
/// stream.
///
/// The content type and declared content length are taken off the request
/// headers. Nothing is read from `body` here.
pub fn form_data<'a, Ext, R>(req: &Request<Ext>, body: R, limits: &'a Limits) -> FormData<'a, R>
where
    R: Read,
{
    let content_type = req
        .headers()
        .get(&CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let content_length = header::content_length(req.headers());

    FormData::new(content_type, content_length, body, limits)
}

/// Request scoped facade over the decoded parts of one body.
///
/// The first accessor call runs the decoder when the content type starts
/// with `multipart/form-data`; any other content type pins the store to
/// empty without touching the body. Decoding happens at most once per
/// request. The single pass body stream is never re-read.
pub struct FormData<'a, R> {
    body: R,
    content_type: Option<String>,
    content_length: Option<u64>,
    limits: &'a Limits,
    store: Option<PartStore>,
}

impl<'a, R> FormData<'a, R>
where
    R: Read,
{
    /// construct from raw header values, for callers outside the [Request]
    /// types.
    pub fn new(content_type: Option<String>, content_length: Option<u64>, body: R, limits: &'a Limits) -> Self {
        Self {
            body,
            content_type,
            content_length,
            limits,
            store: None,
        }
    }

    /// decoded parts of the request. the first call consumes the body
    /// stream; later calls return the same store without touching it.
    pub fn parts(&mut self) -> Result<&PartStore, MultipartError> {
        self.ensure_decoded()?;
        Ok(self.store.get_or_insert_with(PartStore::default))
    }

    /// decoded parts, mutable for explicit [Part::close] release.
    pub fn parts_mut(&mut self) -> Result<&mut PartStore, MultipartError> {
        self.ensure_decoded()?;
        Ok(self.store.get_or_insert_with(PartStore::default))
    }

    /// first part submitted under `name`.
    pub fn uploaded_file(&mut self, name: &str) -> Result<Option<&Part>, MultipartError> {
        Ok(self.parts()?.get(name))
    }

    /// every part submitted under `name`, in body order.
    pub fn uploaded_files(&mut self, name: &str) -> Result<Vec<&Part>, MultipartError> {
        Ok(self.parts()?.get_all(name))
    }

    /// all parts in body order.
    pub fn all_parts(&mut self) -> Result<Vec<&Part>, MultipartError> {
        Ok(self.parts()?.iter().collect())
    }

    fn ensure_decoded(&mut self) -> Result<(), MultipartError> {
        if self.store.is_some() {
            return Ok(());
        }

        match self.decode() {
            Ok(store) => {
                self.store = Some(store);
                Ok(())
            }
            Err(e) => {
                // the body can not be rewound for another attempt. pin the
                // store empty so later accessor calls see a decided state.
                self.store = Some(PartStore::default());
                Err(e)
            }
        }
    }

    fn decode(&mut self) -> Result<PartStore, MultipartError> {
        let ct = match self.content_type.as_deref() {
            Some(ct) if ct.starts_with("multipart/form-data") => ct,
            _ => return Ok(PartStore::default()),
        };

        // both checks run before the stream is consumed.
        let boundary = header::boundary(ct)?;

        if let (Some(max), Some(len)) = (self.limits.max_request_size, self.content_length) {
            if len > max {
                return Err(MultipartError::RequestOverflow);
            }
        }

        let charset = charset::resolve(ct);

        Decoder::new(&mut self.body, &boundary, self.limits, charset).decode()
    }
}
