use bytes::BytesMut;
use tracing::trace;

use crate::{buf::BufferedFileSink, error::MultipartError, limits::Limits, scratch::ScratchFile};

/// capture sink for one part payload.
///
/// bytes accumulate in memory until the configured threshold would be
/// crossed, then spill to a scratch file in the cache directory. the swap
/// happens at most once per sink. the hard per part cap is enforced before
/// a byte is appended to either buffer, so the captured size never exceeds
/// it. dropping the sink mid part closes the file handle and removes the
/// scratch file.
pub(crate) struct SizeLimitedSink<'a> {
    limits: &'a Limits,
    scratch_name: &'a str,
    written: u64,
    buf: SinkBuf,
}

enum SinkBuf {
    Memory(BytesMut),
    File(BufferedFileSink, ScratchFile),
}

/// payload handed out of a finished sink.
pub(crate) enum CapturedBody {
    Memory(BytesMut),
    File(ScratchFile),
}

impl<'a> SizeLimitedSink<'a> {
    pub(crate) fn new(limits: &'a Limits, scratch_name: &'a str) -> Self {
        Self {
            limits,
            scratch_name,
            written: 0,
            buf: SinkBuf::Memory(BytesMut::new()),
        }
    }

    pub(crate) fn swapped(&self) -> bool {
        matches!(self.buf, SinkBuf::File(..))
    }

    pub(crate) fn written(&self) -> u64 {
        self.written
    }

    pub(crate) fn write(&mut self, bytes: &[u8]) -> Result<(), MultipartError> {
        if bytes.is_empty() {
            return Ok(());
        }

        let size = self.written + bytes.len() as u64;

        if let Some(max) = self.limits.max_file_size {
            if size > max {
                return Err(MultipartError::FileOverflow);
            }
        }

        match self.buf {
            SinkBuf::Memory(ref mut mem) => {
                if size <= self.limits.max_in_memory_size as u64 {
                    mem.extend_from_slice(bytes);
                } else {
                    // one time swap. flush the captured bytes to a scratch
                    // file and route this and later writes there.
                    let (scratch, file) = ScratchFile::create(&self.limits.cache_dir, self.scratch_name)?;
                    let mut file = BufferedFileSink::new(file);
                    file.write(mem.as_ref())?;
                    file.write(bytes)?;
                    trace!(
                        target: "formdata",
                        "part payload passed {} bytes in memory. spilled to disk",
                        self.limits.max_in_memory_size
                    );
                    self.buf = SinkBuf::File(file, scratch);
                }
            }
            SinkBuf::File(ref mut file, _) => file.write(bytes)?,
        }

        self.written = size;

        Ok(())
    }

    /// flush and take the captured payload. scratch file removal stays with
    /// the receiver of [CapturedBody::File].
    pub(crate) fn finish(self) -> Result<CapturedBody, MultipartError> {
        match self.buf {
            SinkBuf::Memory(mem) => Ok(CapturedBody::Memory(mem)),
            SinkBuf::File(file, scratch) => {
                // closes the handle. the path lives on in the scratch file.
                file.finish()?;
                Ok(CapturedBody::File(scratch))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::*;

    fn file_count(dir: &std::path::Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn stays_in_memory_at_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let limits = Limits::new().cache_dir(dir.path()).max_in_memory_size(5);
        let mut sink = SizeLimitedSink::new(&limits, "a.txt");

        sink.write(b"01234").unwrap();

        assert!(!sink.swapped());
        assert_eq!(sink.written(), 5);
        assert_eq!(file_count(dir.path()), 0);

        match sink.finish().unwrap() {
            CapturedBody::Memory(mem) => assert_eq!(mem.as_ref(), b"01234"),
            CapturedBody::File(_) => panic!("payload must not spill at the threshold"),
        }
    }

    #[test]
    fn swaps_past_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let limits = Limits::new().cache_dir(dir.path()).max_in_memory_size(5);
        let mut sink = SizeLimitedSink::new(&limits, "a.txt");

        sink.write(b"012").unwrap();
        assert!(!sink.swapped());

        sink.write(b"345").unwrap();
        assert!(sink.swapped());
        assert_eq!(file_count(dir.path()), 1);

        sink.write(b"6789").unwrap();

        let scratch = match sink.finish().unwrap() {
            CapturedBody::File(scratch) => scratch,
            CapturedBody::Memory(_) => panic!("payload crossed the threshold"),
        };

        assert_eq!(fs::read(scratch.path().unwrap()).unwrap(), b"0123456789");
    }

    #[test]
    fn overflow_rejected_before_append() {
        let dir = tempfile::tempdir().unwrap();
        let limits = Limits::new().cache_dir(dir.path()).max_in_memory_size(2).max_file_size(8);
        let mut sink = SizeLimitedSink::new(&limits, "a.txt");

        sink.write(b"0123456").unwrap();
        assert!(sink.swapped());

        let err = sink.write(b"89").unwrap_err();
        assert!(matches!(err, MultipartError::FileOverflow));
        // the failed write appended nothing.
        assert_eq!(sink.written(), 7);

        // abort path. dropping the sink removes the scratch file.
        drop(sink);
        assert_eq!(file_count(dir.path()), 0);
    }

    #[test]
    fn overflow_without_swap() {
        let dir = tempfile::tempdir().unwrap();
        let limits = Limits::new().cache_dir(dir.path()).max_file_size(4);
        let mut sink = SizeLimitedSink::new(&limits, "a.txt");

        sink.write(b"0123").unwrap();
        let err = sink.write(b"4").unwrap_err();
        assert!(matches!(err, MultipartError::FileOverflow));
        assert!(!sink.swapped());
        assert_eq!(file_count(dir.path()), 0);
    }
}
