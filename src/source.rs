//! # Raw sources
//!
//! A [`RawSource`] hands out ciphertext for a content at arbitrary offsets,
//! plus the side material (H3 arrays, TMD, ticket, certificates) stored next
//! to it. Where the bytes come from is up to the implementation; the engine
//! only ever asks for ranges.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemorySource`] - everything held in memory, keyed by content ID
//! - [`DirectorySource`] - an unpacked title directory (`<ID>.app`, `<ID>.h3`,
//!   `title.tmd`, `title.tik`, `title.cert`)

use crate::content::Content;
use crate::error::NusError;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::trace;

/// Boxed raw byte stream returned by [`RawSource::read_raw_range`].
pub type RawStream<'a> = Box<dyn Read + Send + 'a>;

/// Supplier of raw content bytes.
///
/// # Thread Safety
///
/// Implementations that return `true` from [`supports_parallel`](Self::supports_parallel)
/// promise that independent reads may run concurrently from several threads
/// (each call gets its own stream). Batch extraction only parallelises over
/// such sources.
pub trait RawSource {
    /// Stream of `len` raw bytes of `content` starting at `offset`.
    ///
    /// The stream may end early if the content is shorter than requested.
    fn read_raw_range(&self, content: &Content, offset: u64, len: u64)
        -> Result<RawStream<'_>, NusError>;

    /// Flat H3 array of a hashed content, if the source has one.
    fn h3_hashes(&self, content: &Content) -> Result<Option<Vec<u8>>, NusError>;

    fn raw_tmd(&self) -> Result<Option<Vec<u8>>, NusError> {
        Ok(None)
    }

    fn raw_ticket(&self) -> Result<Option<Vec<u8>>, NusError> {
        Ok(None)
    }

    fn raw_cert(&self) -> Result<Option<Vec<u8>>, NusError> {
        Ok(None)
    }

    /// Whether reads may be issued concurrently.
    fn supports_parallel(&self) -> bool {
        false
    }
}

impl<S: RawSource + ?Sized> RawSource for std::sync::Arc<S> {
    fn read_raw_range(&self, content: &Content, offset: u64, len: u64)
        -> Result<RawStream<'_>, NusError> {
        (**self).read_raw_range(content, offset, len)
    }

    fn h3_hashes(&self, content: &Content) -> Result<Option<Vec<u8>>, NusError> {
        (**self).h3_hashes(content)
    }

    fn raw_tmd(&self) -> Result<Option<Vec<u8>>, NusError> {
        (**self).raw_tmd()
    }

    fn raw_ticket(&self) -> Result<Option<Vec<u8>>, NusError> {
        (**self).raw_ticket()
    }

    fn raw_cert(&self) -> Result<Option<Vec<u8>>, NusError> {
        (**self).raw_cert()
    }

    fn supports_parallel(&self) -> bool {
        (**self).supports_parallel()
    }
}

/// In-memory raw source.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    contents: HashMap<u32, Vec<u8>>,
    h3: HashMap<u32, Vec<u8>>,
    tmd: Option<Vec<u8>>,
    ticket: Option<Vec<u8>>,
    cert: Option<Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_content(mut self, id: u32, raw: Vec<u8>) -> Self {
        self.contents.insert(id, raw);
        self
    }

    #[must_use]
    pub fn with_h3(mut self, id: u32, h3: Vec<u8>) -> Self {
        self.h3.insert(id, h3);
        self
    }

    #[must_use]
    pub fn with_tmd(mut self, tmd: Vec<u8>) -> Self {
        self.tmd = Some(tmd);
        self
    }

    #[must_use]
    pub fn with_ticket(mut self, ticket: Vec<u8>) -> Self {
        self.ticket = Some(ticket);
        self
    }

    #[must_use]
    pub fn with_cert(mut self, cert: Vec<u8>) -> Self {
        self.cert = Some(cert);
        self
    }

    pub fn insert_content(&mut self, id: u32, raw: Vec<u8>) {
        self.contents.insert(id, raw);
    }

    pub fn insert_h3(&mut self, id: u32, h3: Vec<u8>) {
        self.h3.insert(id, h3);
    }

    /// Raw bytes of a content, for tests that tamper with ciphertext.
    pub fn content_mut(&mut self, id: u32) -> Option<&mut Vec<u8>> {
        self.contents.get_mut(&id)
    }
}

impl RawSource for MemorySource {
    fn read_raw_range(&self, content: &Content, offset: u64, len: u64)
        -> Result<RawStream<'_>, NusError> {
        let raw = self.contents.get(&content.id).ok_or_else(|| {
            NusError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("content {:08X} not present", content.id),
            ))
        })?;
        let start = (offset.min(raw.len() as u64)) as usize;
        let end = (offset.saturating_add(len).min(raw.len() as u64)) as usize;
        trace!(id = content.id, offset, len, "memory range requested");
        Ok(Box::new(&raw[start..end]))
    }

    fn h3_hashes(&self, content: &Content) -> Result<Option<Vec<u8>>, NusError> {
        Ok(self.h3.get(&content.id).cloned())
    }

    fn raw_tmd(&self) -> Result<Option<Vec<u8>>, NusError> {
        Ok(self.tmd.clone())
    }

    fn raw_ticket(&self) -> Result<Option<Vec<u8>>, NusError> {
        Ok(self.ticket.clone())
    }

    fn raw_cert(&self) -> Result<Option<Vec<u8>>, NusError> {
        Ok(self.cert.clone())
    }

    fn supports_parallel(&self) -> bool {
        true
    }
}

/// Raw source over an unpacked title directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// First existing file among `names`, tried in order.
    fn find(&self, names: &[String]) -> Option<PathBuf> {
        names
            .iter()
            .map(|name| self.root.join(name))
            .find(|path| path.is_file())
    }

    fn content_path(&self, content: &Content) -> Result<PathBuf, NusError> {
        let upper = content.app_file_name();
        let lower = upper.to_lowercase();
        self.find(&[upper.clone(), lower]).ok_or_else(|| {
            NusError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{upper} not found in {}", self.root.display()),
            ))
        })
    }

    fn read_optional(&self, names: &[String]) -> Result<Option<Vec<u8>>, NusError> {
        match self.find(names) {
            Some(path) => Ok(Some(std::fs::read(path)?)),
            None => Ok(None),
        }
    }
}

impl RawSource for DirectorySource {
    fn read_raw_range(&self, content: &Content, offset: u64, len: u64)
        -> Result<RawStream<'_>, NusError> {
        let path = self.content_path(content)?;
        let mut file = File::open(&path)?;
        file.seek(SeekFrom::Start(offset))?;
        trace!(path = %path.display(), offset, len, "file range requested");
        Ok(Box::new(BufReader::new(file).take(len)))
    }

    fn h3_hashes(&self, content: &Content) -> Result<Option<Vec<u8>>, NusError> {
        let upper = content.h3_file_name();
        let lower = upper.to_lowercase();
        self.read_optional(&[upper, lower])
    }

    fn raw_tmd(&self) -> Result<Option<Vec<u8>>, NusError> {
        self.read_optional(&["title.tmd".into(), "tmd".into()])
    }

    fn raw_ticket(&self) -> Result<Option<Vec<u8>>, NusError> {
        self.read_optional(&["title.tik".into(), "cetk".into()])
    }

    fn raw_cert(&self) -> Result<Option<Vec<u8>>, NusError> {
        self.read_optional(&["title.cert".into()])
    }

    fn supports_parallel(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentFlags;

    fn content(id: u32) -> Content {
        Content::new(id, 0, ContentFlags::ENCRYPTED, 64, 64, [0u8; 20])
    }

    #[test]
    fn memory_range_is_clamped() {
        let source = MemorySource::new().with_content(1, (0..64u8).collect());
        let mut out = Vec::new();
        source
            .read_raw_range(&content(1), 60, 100)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, vec![60, 61, 62, 63]);

        let mut out = Vec::new();
        source
            .read_raw_range(&content(1), 200, 10)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn memory_missing_content_is_not_found() {
        let err = MemorySource::new().read_raw_range(&content(9), 0, 1).err().unwrap();
        match err {
            NusError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            e => panic!("unexpected error: {e:?}"),
        }
    }

    #[test]
    fn directory_reads_ranges_and_side_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("0000000A.app"), (0..32u8).collect::<Vec<_>>()).unwrap();
        std::fs::write(dir.path().join("0000000a.h3"), [7u8; 20]).unwrap();
        std::fs::write(dir.path().join("title.tmd"), b"tmd").unwrap();

        let source = DirectorySource::new(dir.path());
        let mut out = Vec::new();
        source
            .read_raw_range(&content(0x0A), 16, 8)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, (16..24u8).collect::<Vec<_>>());

        assert_eq!(source.h3_hashes(&content(0x0A)).unwrap(), Some(vec![7u8; 20]));
        assert_eq!(source.raw_tmd().unwrap(), Some(b"tmd".to_vec()));
        assert_eq!(source.raw_ticket().unwrap(), None);
        assert!(source.read_raw_range(&content(0x0B), 0, 1).is_err());
    }
}
