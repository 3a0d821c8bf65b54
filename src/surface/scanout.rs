//! Ownership tokens for buffers handed to display hardware
//!
//! When a surface is allowed to bypass the renderer, the buffer it wants to show is posted to the
//! display hardware wrapped in a [`ScanoutLease`]. As long as a lease (or one of its clones) is
//! alive, the pool slot backing that buffer is considered *held by hardware* and will not be reused,
//! even if the surface superseded the buffer or was destroyed in the meantime. Dropping the last
//! lease hands the slot back and, if the surface already gave up the buffer, releases it to the
//! client.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use tracing::{debug, trace};

use super::buffer::ClientBuffer;

/// Hold state shared between a buffer slot and its leases
#[derive(Debug, Default)]
pub(crate) struct ScanoutShared {
    holders: AtomicUsize,
    release_pending: AtomicBool,
}

impl ScanoutShared {
    pub(crate) fn holders(&self) -> usize {
        self.holders.load(Ordering::Acquire)
    }

    /// Request the buffer to be released once the hardware lets go of it.
    ///
    /// Returns `true` if no lease is alive anymore and the caller has to release right away.
    pub(crate) fn defer_release(&self) -> bool {
        self.release_pending.store(true, Ordering::Release);
        self.holders() == 0 && self.release_pending.swap(false, Ordering::AcqRel)
    }
}

/// Token representing the hold of display hardware on a posted buffer
///
/// Handed to [`SurfaceHandler::post_buffer`](super::SurfaceHandler::post_buffer). Keep it around
/// for as long as the hardware scans out of the buffer, and drop it once the hardware released it
/// (typically after the next page-flip completed).
pub struct ScanoutLease<B: ClientBuffer> {
    buffer: B,
    shared: Arc<ScanoutShared>,
}

impl<B: ClientBuffer> ScanoutLease<B> {
    pub(crate) fn new(buffer: B, shared: Arc<ScanoutShared>) -> Self {
        shared.holders.fetch_add(1, Ordering::AcqRel);
        ScanoutLease { buffer, shared }
    }

    /// The buffer to scan out
    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    /// Number of leases currently alive for this buffer slot, including this one
    pub fn holders(&self) -> usize {
        self.shared.holders()
    }
}

impl<B: ClientBuffer> Clone for ScanoutLease<B> {
    fn clone(&self) -> Self {
        ScanoutLease::new(self.buffer.clone(), self.shared.clone())
    }
}

impl<B: ClientBuffer> fmt::Debug for ScanoutLease<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanoutLease")
            .field("buffer", &self.buffer)
            .field("holders", &self.shared.holders())
            .finish()
    }
}

impl<B: ClientBuffer> Drop for ScanoutLease<B> {
    fn drop(&mut self) {
        let previous = self.shared.holders.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0);
        if previous != 1 {
            return;
        }

        if self.shared.release_pending.swap(false, Ordering::AcqRel) {
            if self.buffer.is_alive() {
                debug!(buffer = ?self.buffer, "Hardware let go of disowned buffer, releasing");
                self.buffer.release();
            } else {
                trace!(buffer = ?self.buffer, "Hardware let go of dead buffer");
            }
        }
    }
}
