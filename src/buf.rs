use std::{fs::File, io, io::Write};

/// buffer capacity. kept small as one sink exists per in flight part and a
/// server may hold many of them across concurrent requests.
const BUF_SIZE: usize = 1024;

/// unsynchronized write buffer in front of a scratch file handle.
///
/// single writer per part. writes no smaller than the buffer skip it
/// entirely so large payload chunks are not copied twice.
pub(crate) struct BufferedFileSink {
    file: File,
    buf: Box<[u8; BUF_SIZE]>,
    len: usize,
}

impl BufferedFileSink {
    pub(crate) fn new(file: File) -> Self {
        Self {
            file,
            buf: Box::new([0; BUF_SIZE]),
            len: 0,
        }
    }

    pub(crate) fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        if bytes.len() >= BUF_SIZE {
            self.flush()?;
            return self.file.write_all(bytes);
        }

        if self.len + bytes.len() > BUF_SIZE {
            self.flush()?;
        }

        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();

        Ok(())
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        if self.len > 0 {
            self.file.write_all(&self.buf[..self.len])?;
            self.len = 0;
        }
        Ok(())
    }

    /// flush buffered bytes and hand the file handle back.
    pub(crate) fn finish(mut self) -> io::Result<File> {
        self.flush()?;
        Ok(self.file)
    }
}

#[cfg(test)]
mod test {
    use std::io::{Read, Seek, SeekFrom};

    use super::*;

    fn read_back(mut file: File) -> Vec<u8> {
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut out = Vec::new();
        file.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn small_writes_buffered() {
        let mut sink = BufferedFileSink::new(tempfile::tempfile().unwrap());

        for _ in 0..10 {
            sink.write(b"abc").unwrap();
        }

        // nothing reached the file yet.
        assert_eq!(sink.file.metadata().unwrap().len(), 0);

        let file = sink.finish().unwrap();
        assert_eq!(read_back(file), b"abc".repeat(10));
    }

    #[test]
    fn large_write_bypasses_buffer() {
        let mut sink = BufferedFileSink::new(tempfile::tempfile().unwrap());

        sink.write(b"ab").unwrap();
        let big = vec![b'x'; BUF_SIZE];
        sink.write(&big).unwrap();

        // the bypass flushed the pending small write first.
        assert_eq!(sink.file.metadata().unwrap().len(), (2 + BUF_SIZE) as u64);
        assert_eq!(sink.len, 0);

        sink.write(b"cd").unwrap();
        let file = sink.finish().unwrap();

        let mut expected = b"ab".to_vec();
        expected.extend_from_slice(&big);
        expected.extend_from_slice(b"cd");
        assert_eq!(read_back(file), expected);
    }

    #[test]
    fn buffer_boundary_flush() {
        let mut sink = BufferedFileSink::new(tempfile::tempfile().unwrap());

        sink.write(&vec![b'a'; BUF_SIZE - 1]).unwrap();
        assert_eq!(sink.file.metadata().unwrap().len(), 0);

        // does not fit next to the pending bytes. they get flushed first.
        sink.write(b"bc").unwrap();
        assert_eq!(sink.file.metadata().unwrap().len(), (BUF_SIZE - 1) as u64);
        assert_eq!(sink.len, 2);

        let file = sink.finish().unwrap();
        let mut expected = vec![b'a'; BUF_SIZE - 1];
        expected.extend_from_slice(b"bc");
        assert_eq!(read_back(file), expected);
    }
}
