//! # Content processor
//!
//! Turns a logical request `(content, offset, size)` into a raw-range request
//! against a [`RawSource`], picks the decryption path for the content kind,
//! and delivers exactly the requested plaintext window.
//!
//! Two consumption modes:
//!
//! - push: [`ContentProcessor::decrypt_to`] writes into any [`Write`] sink
//! - pull: [`ContentProcessor::open`] returns a [`ContentReader`], fed by a
//!   worker thread through a bounded in-memory pipe
//!
//! # Example
//!
//! ```
//! use nuscrypt_rs::{encrypt_non_hashed, ContentProcessor, MemorySource, TitleKey};
//! use std::io::Cursor;
//!
//! let key = TitleKey::new([0x11; 16], 0x0005_0000_1010_1010);
//! let mut raw = Vec::new();
//! let digest = encrypt_non_hashed(Cursor::new(b"hello, content"), &mut raw, key.key(), 0)?;
//! let content = digest.content(0x10, 0);
//!
//! let processor = ContentProcessor::new(MemorySource::new().with_content(0x10, raw), key);
//! let mut out = Vec::new();
//! processor.decrypt_to(&content, 7, 7, &mut out)?;
//! assert_eq!(out, b"content");
//! # Ok::<(), nuscrypt_rs::NusError>(())
//! ```

use crate::consts::{
    AES_BLOCK_SIZE, DEFAULT_CHUNK_SIZE, DEFAULT_PIPE_BUFFER_SIZE, HASHED_BLOCK_SIZE,
};
use crate::content::Content;
use crate::crypto::hash_tree::sha1_hash;
use crate::decryptor::{copy_plain, decrypt_hashed, decrypt_non_hashed, HashedParams, NonHashedParams};
use crate::error::{HashLevel, NusError};
use crate::source::RawSource;
use crate::title::TitleKey;
use crate::utils::{align_to_block_u64, clamp_window};
use pipe::PipeReader;
use std::io::{self, BufWriter, Read, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Tunables of a [`ContentProcessor`]; see [`crate::builders::ProcessorBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Verify whole-content hashes and hash trees.
    pub verify_hashes: bool,
    /// Treat an absent H3 array as an error instead of a warning.
    pub require_h3: bool,
    /// Non-hashed read/decrypt granularity.
    pub chunk_size: usize,
    /// Producer-side buffering for pull mode.
    pub pipe_buffer_size: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            verify_hashes: true,
            require_h3: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            pipe_buffer_size: DEFAULT_PIPE_BUFFER_SIZE,
        }
    }
}

/// Decryption engine for the contents of one title.
///
/// Holds the raw source and the title key behind `Arc`s, so clones are cheap
/// and every clone runs fully independent operations.
pub struct ContentProcessor<S> {
    source: Arc<S>,
    key: Arc<TitleKey>,
    config: ProcessorConfig,
}

impl<S> Clone for ContentProcessor<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            key: Arc::clone(&self.key),
            config: self.config,
        }
    }
}

impl<S: RawSource> ContentProcessor<S> {
    /// Processor with default configuration.
    pub fn new(source: S, key: TitleKey) -> Self {
        Self::with_config(Arc::new(source), Arc::new(key), ProcessorConfig::default())
    }

    pub fn with_config(source: Arc<S>, key: Arc<TitleKey>, config: ProcessorConfig) -> Self {
        Self {
            source,
            key,
            config,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn key(&self) -> &TitleKey {
        &self.key
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Write plaintext `[offset, offset + size)` of `content` into `output`.
    ///
    /// The window is clamped to the content's decrypted size: a window past
    /// the end yields nothing, one that overhangs it is truncated. Returns the
    /// number of bytes written. `output` is dropped before returning, on
    /// success and on error alike.
    ///
    /// Whole-content verification only runs when the window covers the full
    /// content; hash-tree verification of hashed contents runs on every block
    /// that is decoded.
    pub fn decrypt_to<W: Write>(
        &self,
        content: &Content,
        offset: u64,
        size: u64,
        output: W,
    ) -> Result<u64, NusError> {
        let size = clamp_window(content.decrypted_size, offset, size);
        if size == 0 {
            return Ok(0);
        }
        debug!(
            id = content.id,
            index = content.index,
            offset,
            size,
            hashed = content.is_hashed(),
            encrypted = content.is_encrypted(),
            "decrypting content window"
        );

        if !content.is_encrypted() {
            self.copy_plain_window(content, offset, size, output)
        } else if content.is_hashed() {
            self.decrypt_hashed_window(content, offset, size, output)
        } else {
            self.decrypt_non_hashed_window(content, offset, size, output)
        }
    }

    /// Decrypt (and verify) a whole content.
    pub fn decrypt_content_to<W: Write>(&self, content: &Content, output: W) -> Result<u64, NusError> {
        self.decrypt_to(content, 0, content.decrypted_size, output)
    }

    fn is_whole(content: &Content, offset: u64, size: u64) -> bool {
        offset == 0 && size == content.decrypted_size
    }

    fn copy_plain_window<W: Write>(
        &self,
        content: &Content,
        offset: u64,
        size: u64,
        output: W,
    ) -> Result<u64, NusError> {
        let input = self.source.read_raw_range(content, offset, size)?;
        let expected = (self.config.verify_hashes && Self::is_whole(content, offset, size))
            .then_some((&content.hash, content.decrypted_size));
        copy_plain(input, output, size, expected, content.tolerates_mismatch())
    }

    fn decrypt_non_hashed_window<W: Write>(
        &self,
        content: &Content,
        offset: u64,
        size: u64,
        output: W,
    ) -> Result<u64, NusError> {
        let block = AES_BLOCK_SIZE as u64;
        let raw_start = offset - offset % block;
        let raw_len = align_to_block_u64(offset - raw_start + size);

        let mut params = NonHashedParams::new(offset, size, content.index)
            .with_tolerance(content.tolerates_mismatch())
            .with_chunk_size(self.config.chunk_size);
        if self.config.verify_hashes && Self::is_whole(content, offset, size) {
            params = params.with_expected_hash(&content.hash, align_to_block_u64(content.decrypted_size));
        }

        // Block N's IV is block N-1's ciphertext, so resume one block early.
        let (request_offset, request_len) = if params.needs_iv_prefix() {
            (raw_start - block, raw_len + block)
        } else {
            (raw_start, raw_len)
        };
        let input = self.source.read_raw_range(content, request_offset, request_len)?;
        decrypt_non_hashed(input, output, self.key.key(), &params)
    }

    fn decrypt_hashed_window<W: Write>(
        &self,
        content: &Content,
        offset: u64,
        size: u64,
        output: W,
    ) -> Result<u64, NusError> {
        let h3 = self.source.h3_hashes(content)?;
        if self.config.verify_hashes {
            self.check_h3_table(content, h3.as_deref())?;
        }

        let params = HashedParams::for_window(offset, size)
            .with_h3(h3.as_deref())
            .with_verification(self.config.verify_hashes)
            .with_tolerance(content.tolerates_mismatch());
        let raw_offset = params.raw_offset();
        let raw_len = (params.blocks_needed() * HASHED_BLOCK_SIZE as u64)
            .min(content.encrypted_size.saturating_sub(raw_offset));

        let input = self.source.read_raw_range(content, raw_offset, raw_len)?;
        decrypt_hashed(input, output, self.key.key(), &params)
    }

    /// The H3 array must hash to the content's recorded hash.
    fn check_h3_table(&self, content: &Content, h3: Option<&[u8]>) -> Result<(), NusError> {
        let Some(h3) = h3 else {
            if self.config.require_h3 {
                return Err(NusError::MissingHashMaterial(format!(
                    "no H3 hashes for hashed content {:08X}",
                    content.id
                )));
            }
            warn!(id = content.id, "no H3 hashes, top-level checks skipped");
            return Ok(());
        };

        let computed = sha1_hash(h3);
        if computed == content.hash {
            return Ok(());
        }
        let err = NusError::checksum(HashLevel::H3Table, None, &computed, &content.hash);
        if content.tolerates_mismatch() {
            warn!(%err, "H3 table mismatch on tolerant content, continuing");
            return Ok(());
        }
        Err(err)
    }
}

impl<S: RawSource + Send + Sync + 'static> ContentProcessor<S> {
    /// Pull-mode counterpart of [`decrypt_to`](Self::decrypt_to).
    ///
    /// A worker thread runs the push form into a bounded pipe; the returned
    /// reader yields the plaintext window and reports the worker's error, if
    /// any, when it reaches end of stream. Dropping the reader early makes the
    /// worker stop at its next write.
    pub fn open(&self, content: &Content, offset: u64, size: u64) -> Result<ContentReader, NusError> {
        let (reader, writer) = pipe::pipe();
        let processor = self.clone();
        let content = content.clone();
        let capacity = self.config.pipe_buffer_size.max(1);

        let worker = thread::Builder::new()
            .name(format!("nus-content-{:08X}", content.id))
            .spawn(move || {
                let sink = BufWriter::with_capacity(capacity, writer);
                processor.decrypt_to(&content, offset, size, sink)
            })?;

        Ok(ContentReader {
            reader: Some(reader),
            state: WorkerState::Running(worker),
        })
    }

    /// Pull-mode reader over a whole content.
    pub fn open_content(&self, content: &Content) -> Result<ContentReader, NusError> {
        self.open(content, 0, content.decrypted_size)
    }
}

enum WorkerState {
    Running(JoinHandle<Result<u64, NusError>>),
    Finished(u64),
    Failed,
}

/// Readable plaintext window produced by a background worker.
pub struct ContentReader {
    reader: Option<PipeReader>,
    state: WorkerState,
}

impl ContentReader {
    /// Close the read end, wait for the worker and return its result.
    ///
    /// Closing early is not an error: the worker stops at its next write and
    /// reports the bytes it managed to hand over.
    pub fn finish(mut self) -> Result<u64, NusError> {
        drop(self.reader.take());
        match std::mem::replace(&mut self.state, WorkerState::Failed) {
            WorkerState::Running(handle) => join(handle),
            WorkerState::Finished(written) => Ok(written),
            WorkerState::Failed => Err(NusError::Io(io::Error::other(
                "content worker failed; error already returned by read",
            ))),
        }
    }

    /// Join the worker once the pipe has reached end of stream.
    fn settle(&mut self) -> io::Result<()> {
        let state = std::mem::replace(&mut self.state, WorkerState::Failed);
        self.state = match state {
            WorkerState::Running(handle) => WorkerState::Finished(join(handle)?),
            settled => settled,
        };
        Ok(())
    }
}

fn join(handle: JoinHandle<Result<u64, NusError>>) -> Result<u64, NusError> {
    handle.join().map_err(|_| NusError::WorkerPanicked)?
}

impl Read for ContentReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(0);
        };
        let n = reader.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.reader = None;
            self.settle()?;
        }
        Ok(n)
    }
}
