use std::{collections::HashMap, io, path::Path};

use crate::scratch::ScratchFile;

/// One decoded section of a multipart body.
///
/// The payload lives either inline as decoded text or in a scratch file on
/// disk, never both. A file backed part owns its scratch file: the file is
/// removed when the part drops or is explicitly [closed](Self::close).
#[derive(Debug)]
pub struct Part {
    pub(crate) field: String,
    pub(crate) content_type: Option<String>,
    pub(crate) filename: Option<String>,
    pub(crate) body: PartBody,
}

#[derive(Debug)]
pub(crate) enum PartBody {
    Inline(String),
    File(ScratchFile),
}

impl Part {
    /// field name from the part's Content-Disposition header.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// declared content type of the part, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// file name from the part's Content-Disposition header. present for
    /// uploaded files, absent for inline form fields.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// whether the sender declared this part as a file upload.
    pub fn is_file(&self) -> bool {
        self.filename.is_some()
    }

    /// the captured payload, when it stayed under the in memory threshold.
    pub fn inline_data(&self) -> Option<&str> {
        match self.body {
            PartBody::Inline(ref data) => Some(data),
            PartBody::File(_) => None,
        }
    }

    /// path of the spilled payload, when the part crossed the in memory
    /// threshold. [None] for inline parts and once the part was closed.
    pub fn file(&self) -> Option<&Path> {
        match self.body {
            PartBody::File(ref scratch) => scratch.path(),
            PartBody::Inline(_) => None,
        }
    }

    /// release the scratch file backing this part now. idempotent, and a
    /// no-op for inline parts. dropping the part has the same effect.
    pub fn close(&mut self) -> io::Result<()> {
        match self.body {
            PartBody::File(ref mut scratch) => scratch.close(),
            PartBody::Inline(_) => Ok(()),
        }
    }
}

/// Decoded parts of one request body, in the order they appeared.
#[derive(Debug, Default)]
pub struct PartStore {
    parts: Vec<Part>,
}

impl PartStore {
    pub(crate) fn push(&mut self, part: Part) {
        self.parts.push(part);
    }

    /// first part submitted under `name`.
    pub fn get(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|part| part.field == name)
    }

    /// first part submitted under `name`, mutable for [Part::close].
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Part> {
        self.parts.iter_mut().find(|part| part.field == name)
    }

    /// every part submitted under `name`, in body order.
    pub fn get_all(&self, name: &str) -> Vec<&Part> {
        self.parts.iter().filter(|part| part.field == name).collect()
    }

    /// all parts in body order.
    pub fn iter(&self) -> impl Iterator<Item = &Part> {
        self.parts.iter()
    }

    /// view of the parts grouped by field name. order within a name follows
    /// the body.
    pub fn as_map(&self) -> HashMap<&str, Vec<&Part>> {
        let mut map: HashMap<&str, Vec<&Part>> = HashMap::new();
        for part in &self.parts {
            map.entry(part.field.as_str()).or_default().push(part);
        }
        map
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn inline(field: &str, data: &str) -> Part {
        Part {
            field: field.into(),
            content_type: None,
            filename: None,
            body: PartBody::Inline(data.into()),
        }
    }

    #[test]
    fn body_order_preserved() {
        let mut store = PartStore::default();
        store.push(inline("a", "1"));
        store.push(inline("b", "2"));
        store.push(inline("a", "3"));

        assert_eq!(store.len(), 3);
        assert_eq!(store.get("a").unwrap().inline_data(), Some("1"));

        let a = store.get_all("a");
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].inline_data(), Some("1"));
        assert_eq!(a[1].inline_data(), Some("3"));

        let order = store.iter().map(Part::field).collect::<Vec<_>>();
        assert_eq!(order, ["a", "b", "a"]);

        let map = store.as_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"].len(), 2);
        assert_eq!(map["b"].len(), 1);
    }

    #[test]
    fn inline_part_accessors() {
        let mut part = inline("note", "hello");

        assert_eq!(part.field(), "note");
        assert!(!part.is_file());
        assert_eq!(part.inline_data(), Some("hello"));
        assert!(part.file().is_none());

        // closing an inline part is a no-op.
        part.close().unwrap();
        assert_eq!(part.inline_data(), Some("hello"));
    }
}
