use std::io::{self, Read};

use bytes::BytesMut;
use encoding_rs::Encoding;
use http::header::HeaderMap;
use tracing::trace;

use crate::{
    error::MultipartError,
    header::{self, PartHeader},
    limits::Limits,
    part::{Part, PartBody, PartStore},
    sink::{CapturedBody, SizeLimitedSink},
};

const CR: u8 = b'\r';
const LF: u8 = b'\n';

const READ_BUF_SIZE: usize = 8 * 1024;

/// cap on one part's accumulated header block.
const MAX_HEADER_BLOCK: usize = 8 * 1024;

/// how a part body scan ended.
enum BodyEnd {
    /// full delimiter matched. a terminator line follows.
    Boundary,
    /// stream ended before a closing boundary.
    Eof,
}

/// what follows a matched delimiter.
enum Terminator {
    /// another part.
    Part,
    /// the closing two hyphens.
    Close,
    /// stream ended.
    Eof,
}

/// Streaming decoder for one multipart/form-data body.
///
/// Consumes the reader a logical byte at a time through a partial match
/// automaton over the delimiter, with bulk skips between candidate CR
/// bytes. All reads go through an internal buffer so the underlying reader
/// sees large read calls.
pub(crate) struct Decoder<'a, R> {
    reader: R,
    limits: &'a Limits,
    charset: &'static Encoding,
    /// full delimiter: CRLF, two hyphens, then the boundary token.
    delimiter: Vec<u8>,
    buf: Box<[u8]>,
    pos: usize,
    end: usize,
}

impl<'a, R> Decoder<'a, R>
where
    R: Read,
{
    pub(crate) fn new(reader: R, boundary: &[u8], limits: &'a Limits, charset: &'static Encoding) -> Self {
        let mut delimiter = Vec::with_capacity(boundary.len() + 4);
        delimiter.extend_from_slice(b"\r\n--");
        delimiter.extend_from_slice(boundary);

        Self {
            reader,
            limits,
            charset,
            delimiter,
            buf: vec![0; READ_BUF_SIZE].into_boxed_slice(),
            pos: 0,
            end: 0,
        }
    }

    pub(crate) fn decode(mut self) -> Result<PartStore, MultipartError> {
        let mut store = PartStore::default();

        if !self.skip_preamble()? {
            // no boundary anywhere in the body. treated as no parts.
            return Ok(store);
        }

        loop {
            match self.read_terminator()? {
                Terminator::Close | Terminator::Eof => return Ok(store),
                Terminator::Part => {}
            }

            let Some(headers) = self.read_header_block()? else {
                // truncated inside a header block. keep what was completed.
                return Ok(store);
            };

            let header = PartHeader::from_headers(&headers);
            let scratch_name = header.scratch_name();
            let mut sink = SizeLimitedSink::new(self.limits, &scratch_name);

            let end = self.copy_body(&mut sink)?;

            trace!(
                target: "formdata",
                "captured part {:?} ({} bytes, spilled: {})",
                header.field_name,
                sink.written(),
                sink.swapped()
            );

            store.push(finish_part(header, sink, self.charset)?);

            if matches!(end, BodyEnd::Eof) {
                // missing final boundary. keep the parts we have.
                return Ok(store);
            }
        }
    }

    /// scan to the first delimiter, discarding the preamble. the match
    /// counter starts past the CRLF so a body whose first boundary omits
    /// the leading line break still matches, as some senders do.
    fn skip_preamble(&mut self) -> Result<bool, MultipartError> {
        let mut matched = 2;

        loop {
            if self.pos == self.end && !self.fill()? {
                return Ok(false);
            }

            if matched == 0 {
                // skip ahead to the next candidate CR.
                match memchr::memchr(CR, &self.buf[self.pos..self.end]) {
                    Some(idx) => {
                        self.pos += idx + 1;
                        matched = 1;
                    }
                    None => self.pos = self.end,
                }
                continue;
            }

            let b = self.buf[self.pos];
            if b == self.delimiter[matched] {
                self.pos += 1;
                matched += 1;
                if matched == self.delimiter.len() {
                    return Ok(true);
                }
            } else {
                // partial match failed. re-feed this byte from the start
                // state; the delimiter has no CR past its first byte so no
                // shorter restart can be missed.
                matched = 0;
            }
        }
    }

    /// read the line that follows a matched delimiter. two hyphens close
    /// the body; any other residue is discarded and a header block follows.
    fn read_terminator(&mut self) -> Result<Terminator, MultipartError> {
        match self.read_line(MAX_HEADER_BLOCK)? {
            None => Ok(Terminator::Eof),
            Some(line) if line.trim_ascii() == b"--" => Ok(Terminator::Close),
            Some(_) => Ok(Terminator::Part),
        }
    }

    /// accumulate header lines until the blank line, then parse them.
    /// [None] when the stream ends inside the block.
    fn read_header_block(&mut self) -> Result<Option<HeaderMap>, MultipartError> {
        let mut block = BytesMut::new();

        loop {
            let Some(line) = self.read_line(MAX_HEADER_BLOCK.saturating_sub(block.len()))? else {
                return Ok(None);
            };

            if line.is_empty() {
                block.extend_from_slice(b"\r\n");
                return header::parse_headers(&block).map(Some);
            }

            block.extend_from_slice(&line);
            block.extend_from_slice(b"\r\n");
        }
    }

    /// stream one part payload into `sink` until the delimiter or the end
    /// of the stream. partial delimiter matches that fail are flushed to
    /// the sink as literal payload bytes.
    fn copy_body(&mut self, sink: &mut SizeLimitedSink<'_>) -> Result<BodyEnd, MultipartError> {
        let mut matched = 0;

        loop {
            if self.pos == self.end && !self.fill()? {
                // flush a dangling partial match. it was payload after all.
                sink.write(&self.delimiter[..matched])?;
                return Ok(BodyEnd::Eof);
            }

            if matched == 0 {
                match memchr::memchr(CR, &self.buf[self.pos..self.end]) {
                    Some(idx) => {
                        sink.write(&self.buf[self.pos..self.pos + idx])?;
                        self.pos += idx + 1;
                        matched = 1;
                    }
                    None => {
                        let end = self.end;
                        sink.write(&self.buf[self.pos..end])?;
                        self.pos = end;
                    }
                }
                continue;
            }

            let b = self.buf[self.pos];
            if b == self.delimiter[matched] {
                self.pos += 1;
                matched += 1;
                if matched == self.delimiter.len() {
                    return Ok(BodyEnd::Boundary);
                }
            } else {
                sink.write(&self.delimiter[..matched])?;
                matched = 0;
            }
        }
    }

    /// read one line, CRLF or bare LF terminated, at most `limit` bytes
    /// long. [None] on end of stream, a partial last line included.
    fn read_line(&mut self, limit: usize) -> Result<Option<Vec<u8>>, MultipartError> {
        let mut line = Vec::new();

        loop {
            if self.pos == self.end && !self.fill()? {
                return Ok(None);
            }

            let chunk = &self.buf[self.pos..self.end];
            match memchr::memchr(LF, chunk) {
                Some(idx) => {
                    line.extend_from_slice(&chunk[..idx]);
                    self.pos += idx + 1;

                    if line.last() == Some(&CR) {
                        line.pop();
                    }

                    if line.len() > limit {
                        return Err(httparse::Error::TooManyHeaders.into());
                    }

                    return Ok(Some(line));
                }
                None => {
                    line.extend_from_slice(chunk);
                    self.pos = self.end;

                    if line.len() > limit {
                        return Err(httparse::Error::TooManyHeaders.into());
                    }
                }
            }
        }
    }

    /// refill the read buffer. false on end of stream.
    fn fill(&mut self) -> Result<bool, MultipartError> {
        loop {
            match self.reader.read(&mut self.buf) {
                Ok(n) => {
                    self.pos = 0;
                    self.end = n;
                    return Ok(n != 0);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn finish_part(
    header: PartHeader,
    sink: SizeLimitedSink<'_>,
    charset: &'static Encoding,
) -> Result<Part, MultipartError> {
    let body = match sink.finish()? {
        CapturedBody::Memory(bytes) => {
            let (text, ..) = charset.decode(&bytes);
            PartBody::Inline(text.into_owned())
        }
        CapturedBody::File(scratch) => PartBody::File(scratch),
    };

    Ok(Part {
        field: header.field_name,
        content_type: header.content_type,
        filename: header.filename,
        body,
    })
}
