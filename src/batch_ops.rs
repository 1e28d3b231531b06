//! Parallel extraction of several contents of one title.
//!
//! Each job is a complete, independent orchestration with its own raw stream
//! and cipher state. Jobs only run in parallel when the raw source says it
//! can serve concurrent reads.

#[cfg(feature = "batch-ops")]
use rayon::prelude::*;
#[cfg(feature = "batch-ops")]
use std::io::Write;
#[cfg(feature = "batch-ops")]
use tracing::debug;

#[cfg(feature = "batch-ops")]
use crate::{Content, ContentProcessor, NusError, RawSource};

/// Decrypt every `(content, sink)` job in full.
///
/// Returns the bytes written per job, in job order. The first failure is
/// returned; with a parallel source, jobs already running are not
/// interrupted.
#[cfg(feature = "batch-ops")]
pub fn decrypt_batch<S, W>(
    processor: &ContentProcessor<S>,
    jobs: &mut [(&Content, W)],
) -> Result<Vec<u64>, NusError>
where
    S: RawSource + Send + Sync,
    W: Write + Send,
{
    if processor.source().supports_parallel() {
        debug!(jobs = jobs.len(), "decrypting batch in parallel");
        jobs.par_iter_mut()
            .map(|job| processor.decrypt_content_to(job.0, &mut job.1))
            .collect()
    } else {
        debug!(jobs = jobs.len(), "source is sequential, decrypting batch in order");
        jobs.iter_mut()
            .map(|job| processor.decrypt_content_to(job.0, &mut job.1))
            .collect()
    }
}
