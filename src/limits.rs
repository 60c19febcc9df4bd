use std::path::PathBuf;

/// Upload limits for decoding one request body.
///
/// Built once at configuration time and shared by reference across request
/// handling. Every setter consumes the value so a [Limits] is fixed before
/// the first decode runs.
#[derive(Debug, Clone)]
pub struct Limits {
    pub(crate) cache_dir: PathBuf,
    pub(crate) max_file_size: Option<u64>,
    pub(crate) max_request_size: Option<u64>,
    pub(crate) max_in_memory_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            // resolved here, once. request handling never consults ambient
            // process state for the cache location.
            cache_dir: std::env::temp_dir(),
            max_file_size: None,
            max_request_size: None,
            max_in_memory_size: 16 * 1024,
        }
    }
}

impl Limits {
    pub fn new() -> Self {
        Self::default()
    }

    /// directory spilled part payloads are written to.
    /// Defaults to the process temp directory resolved at construction.
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// byte cap for a single part payload. unbounded when not set.
    pub fn max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = Some(size);
        self
    }

    /// byte cap checked against the declared content length before any body
    /// byte is read. unbounded when not set.
    pub fn max_request_size(mut self, size: u64) -> Self {
        self.max_request_size = Some(size);
        self
    }

    /// bytes captured in memory for one part before the payload spills to a
    /// scratch file. Default to 16KB.
    pub fn max_in_memory_size(mut self, size: usize) -> Self {
        self.max_in_memory_size = size;
        self
    }
}
