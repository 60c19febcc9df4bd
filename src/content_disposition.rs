use memchr::memmem;

/// value extraction from the Content-Disposition header line of one part.
///
/// recognizes the `name=` and `filename=` pairs with optional double
/// quoting around the value. the keys are matched case sensitively; the
/// header name itself is matched case insensitively by the header map
/// lookup in front of this.
pub(crate) struct ContentDisposition<'a> {
    name: Option<&'a [u8]>,
    filename: Option<&'a [u8]>,
}

impl<'a> ContentDisposition<'a> {
    const NAME: &'static [u8; 5] = b"name=";
    const FILE_NAME: &'static [u8; 9] = b"filename=";

    pub(crate) fn from_slice(slice: &'a [u8]) -> Self {
        Self {
            name: value_of(slice, Self::NAME),
            filename: value_of(slice, Self::FILE_NAME),
        }
    }

    pub(crate) fn name(&self) -> Option<&'a [u8]> {
        self.name
    }

    pub(crate) fn filename(&self) -> Option<&'a [u8]> {
        self.filename
    }
}

fn value_of<'a>(haystack: &'a [u8], needle: &[u8]) -> Option<&'a [u8]> {
    memmem::find(haystack, needle).and_then(|idx| {
        // reject a name= hit that is really the tail of filename=.
        if needle == ContentDisposition::NAME && idx > 0 && haystack[idx - 1] == b'e' {
            return None;
        }

        let mut start = idx + needle.len();
        let remain = &haystack[start..];
        let mut len = memchr::memchr(b';', remain).unwrap_or(remain.len());

        let remain = &remain[..len];

        // adjust for quoted values.
        if remain.starts_with(b"\"") {
            start += 1;
            len = match memchr::memchr(b'"', &remain[1..]) {
                Some(idx) => idx,
                // unterminated quote. take the rest of the value.
                None => len - 1,
            };
        }

        Some(&haystack[start..start + len])
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn name_only() {
        let slice = br#"form-data; name="note""#;
        let cd = ContentDisposition::from_slice(slice);

        assert_eq!(cd.name().unwrap(), b"note");
        assert!(cd.filename().is_none());
    }

    #[test]
    fn name_and_filename() {
        let slice = br#"form-data; name="file1"; filename="report 2024.txt""#;
        let cd = ContentDisposition::from_slice(slice);
        assert_eq!(cd.name().unwrap(), b"file1");
        assert_eq!(cd.filename().unwrap(), b"report 2024.txt");

        let slice = "form-data; name=\"你好\"; filename=\"файл.txt\"".as_bytes();
        let cd = ContentDisposition::from_slice(slice);
        assert_eq!(cd.name().unwrap(), "你好".as_bytes());
        assert_eq!(cd.filename().unwrap(), "файл.txt".as_bytes());
    }

    #[test]
    fn filename_only() {
        let slice = br#"form-data; filename="file-name.txt""#;
        let cd = ContentDisposition::from_slice(slice);
        assert_eq!(cd.filename().unwrap(), b"file-name.txt");
        assert!(cd.name().is_none());
    }

    #[test]
    fn unquoted_values() {
        let slice = br"form-data; name=note";
        let cd = ContentDisposition::from_slice(slice);
        assert_eq!(cd.name().unwrap(), b"note");
        assert!(cd.filename().is_none());

        let slice = br"form-data; name=file1; filename=file-name.txt";
        let cd = ContentDisposition::from_slice(slice);
        assert_eq!(cd.name().unwrap(), b"file1");
        assert_eq!(cd.filename().unwrap(), b"file-name.txt");
    }

    #[test]
    fn unterminated_quote() {
        let slice = br#"form-data; name="note"#;
        let cd = ContentDisposition::from_slice(slice);
        assert_eq!(cd.name().unwrap(), b"note");
    }
}
