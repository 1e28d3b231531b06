//! # Stream chunk assembler
//!
//! Raw sources hand out bytes at whatever granularity they like (a socket
//! read, a decompressed disc sector, a file read). The decrypt paths need
//! fixed-size chunks instead. [`ChunkReader`] sits in between: it reads the
//! source in its own granularity and keeps whatever overshoots the current
//! chunk in an overflow buffer for the next call.

use crate::consts::DEFAULT_READ_SIZE;
use crate::error::NusError;
use crate::utils::is_graceful_close;
use std::io::{ErrorKind, Read};
use tracing::{debug, trace};

pub struct ChunkReader<R> {
    inner: R,
    overflow: Vec<u8>,
    scratch: Vec<u8>,
    finished: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_read_size(inner, DEFAULT_READ_SIZE)
    }

    /// Reader that pulls `read_size` bytes from `inner` per read call.
    pub fn with_read_size(inner: R, read_size: usize) -> Self {
        Self {
            inner,
            overflow: Vec::new(),
            scratch: vec![0u8; read_size.max(1)],
            finished: false,
        }
    }

    /// Fill `buf` completely, unless the source runs dry first.
    ///
    /// Returns the number of bytes placed in `buf`: `buf.len()` for a full
    /// chunk, less (possibly 0) once the source has ended. A broken pipe
    /// from the source counts as an ordinary end of data.
    pub fn next_chunk(&mut self, buf: &mut [u8]) -> Result<usize, NusError> {
        let mut filled = self.drain_overflow(buf);

        while filled < buf.len() && !self.finished {
            let n = match self.inner.read(&mut self.scratch) {
                Ok(0) => {
                    self.finished = true;
                    break;
                }
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if is_graceful_close(&e) => {
                    debug!("raw source closed, treating as end of data");
                    self.finished = true;
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            let take = n.min(buf.len() - filled);
            buf[filled..filled + take].copy_from_slice(&self.scratch[..take]);
            filled += take;
            if take < n {
                self.overflow.extend_from_slice(&self.scratch[take..n]);
            }
        }

        trace!(requested = buf.len(), filled, "chunk assembled");
        Ok(filled)
    }

    /// Bytes read from the source but not yet handed out.
    pub fn buffered(&self) -> usize {
        self.overflow.len()
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn drain_overflow(&mut self, buf: &mut [u8]) -> usize {
        let take = self.overflow.len().min(buf.len());
        if take > 0 {
            buf[..take].copy_from_slice(&self.overflow[..take]);
            self.overflow.drain(..take);
        }
        take
    }
}
