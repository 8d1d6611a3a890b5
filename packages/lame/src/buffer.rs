//! The session's single output byte buffer.
//!
//! Capacity is derived from the worst-case MP3 expansion bound of
//! `ceil(1.25 * frames + 7200)` bytes and only ever grows.

use crate::{Error, Result};

/// Bytes reserved on top of the per-frame expansion for one maximum-size frame
/// plus the codec's internal bit reservoir.
pub const FRAME_HEADROOM: usize = 7200;

/// Worst-case output size in bytes for `frames` input frames.
///
/// Returns `None` if the bound does not fit in `usize`.
#[must_use]
pub const fn required_capacity(frames: usize) -> Option<usize> {
    let extra = frames.div_ceil(4);
    match frames.checked_add(extra) {
        Some(total) => total.checked_add(FRAME_HEADROOM),
        None => None,
    }
}

/// A growable, capacity-tracked output buffer.
///
/// The codec writes into the whole buffer; only the bytes it reports as
/// written become visible through [`OutputBuffer::commit`].
#[derive(Debug, Default)]
pub struct OutputBuffer {
    data: Vec<u8>,
    capacity: usize,
    sized_for: usize,
}

impl OutputBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: Vec::new(),
            capacity: 0,
            sized_for: 0,
        }
    }

    /// Usable capacity in bytes.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// The frame count the current capacity was computed for.
    #[must_use]
    pub const fn sized_for(&self) -> usize {
        self.sized_for
    }

    #[must_use]
    pub const fn is_allocated(&self) -> bool {
        self.capacity > 0
    }

    /// Allocates the buffer for `frames` input frames.
    ///
    /// An already allocated buffer is kept if it is at least as large.
    ///
    /// # Errors
    ///
    /// * If the allocation fails, leaving the existing buffer untouched
    pub fn allocate(&mut self, frames: usize) -> Result<()> {
        let required = capacity_for(frames)?;

        if required > self.capacity {
            self.reallocate(required)?;
        }

        self.sized_for = self.sized_for.max(frames);

        Ok(())
    }

    /// Grows the buffer if `frames` exceeds the frame count used at the last
    /// allocation. Returns whether the buffer was reallocated.
    ///
    /// # Errors
    ///
    /// * If the allocation fails, leaving the existing buffer untouched
    pub fn ensure_capacity(&mut self, frames: usize) -> Result<bool> {
        if self.is_allocated() && frames <= self.sized_for {
            return Ok(false);
        }

        let required = capacity_for(frames)?;
        let grew = required > self.capacity;

        if grew {
            log::debug!(
                "Growing output buffer from {} to {required} bytes for {frames} frames",
                self.capacity
            );
            self.reallocate(required)?;
        }

        self.sized_for = self.sized_for.max(frames);

        Ok(grew)
    }

    /// The writable region handed to the codec.
    pub(crate) fn destination(&mut self) -> &mut [u8] {
        &mut self.data[..self.capacity]
    }

    /// Returns the first `written` bytes of the destination.
    ///
    /// # Errors
    ///
    /// * If `written` exceeds the buffer's capacity
    pub(crate) fn commit(&self, written: usize) -> Result<&[u8]> {
        if written > self.capacity {
            return Err(Error::Internal(format!(
                "codec reported {written} bytes written into a {} byte buffer",
                self.capacity
            )));
        }

        Ok(&self.data[..written])
    }

    /// Releases the allocation.
    pub fn release(&mut self) {
        self.data = Vec::new();
        self.capacity = 0;
        self.sized_for = 0;
    }

    fn reallocate(&mut self, required: usize) -> Result<()> {
        let mut data = Vec::new();
        data.try_reserve_exact(required).map_err(|e| {
            Error::OutOfMemory(format!("failed to allocate {required} byte output buffer: {e}"))
        })?;
        data.resize(required, 0);

        self.data = data;
        self.capacity = required;

        Ok(())
    }
}

fn capacity_for(frames: usize) -> Result<usize> {
    required_capacity(frames).ok_or_else(|| {
        Error::OutOfMemory(format!("output buffer size for {frames} frames overflows"))
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test_log::test]
    fn test_required_capacity_matches_expansion_bound() {
        assert_eq!(required_capacity(0), Some(7200));
        assert_eq!(required_capacity(1), Some(7202));
        assert_eq!(required_capacity(4), Some(7205));
        assert_eq!(required_capacity(44_100), Some(62_325));
        assert_eq!(required_capacity(1152), Some(8640));
    }

    #[test_log::test]
    fn test_required_capacity_agrees_with_lame_encoder_crate() {
        for frames in [0, 1, 2, 3, 576, 1152, 22_050, 44_100, 1_000_003] {
            assert_eq!(
                required_capacity(frames),
                Some(mp3lame_encoder::max_required_buffer_size(frames)),
                "frames {frames}"
            );
        }
    }

    #[test_log::test]
    fn test_required_capacity_overflow_is_none() {
        assert_eq!(required_capacity(usize::MAX), None);
    }

    #[test_log::test]
    fn test_allocate_sizes_for_hint() {
        let mut buffer = OutputBuffer::new();

        buffer.allocate(44_100).unwrap();

        assert_eq!(buffer.capacity(), 62_325);
        assert_eq!(buffer.sized_for(), 44_100);
    }

    #[test_log::test]
    fn test_ensure_capacity_grows_only_for_larger_inputs() {
        let mut buffer = OutputBuffer::new();
        buffer.allocate(1000).unwrap();
        let initial = buffer.capacity();

        assert!(!buffer.ensure_capacity(1000).unwrap());
        assert!(!buffer.ensure_capacity(10).unwrap());
        assert_eq!(buffer.capacity(), initial);

        assert!(buffer.ensure_capacity(5000).unwrap());
        assert_eq!(buffer.capacity(), required_capacity(5000).unwrap());
        assert_eq!(buffer.sized_for(), 5000);
    }

    #[test_log::test]
    fn test_capacity_is_monotonic() {
        let mut buffer = OutputBuffer::new();
        buffer.allocate(0).unwrap();
        let mut last = buffer.capacity();
        let mut max_frames = 0;

        for frames in [100, 50, 20_000, 3, 19_999, 40_000, 1] {
            buffer.ensure_capacity(frames).unwrap();
            max_frames = max_frames.max(frames);

            assert!(buffer.capacity() >= last);
            assert!(buffer.capacity() >= required_capacity(max_frames).unwrap());
            last = buffer.capacity();
        }
    }

    #[test_log::test]
    fn test_ensure_capacity_on_unallocated_buffer_allocates() {
        let mut buffer = OutputBuffer::new();

        assert!(buffer.ensure_capacity(0).unwrap());
        assert_eq!(buffer.capacity(), FRAME_HEADROOM);
    }

    #[test_log::test]
    fn test_failed_growth_keeps_existing_buffer() {
        let mut buffer = OutputBuffer::new();
        buffer.allocate(100).unwrap();
        let capacity = buffer.capacity();

        let err = buffer.ensure_capacity(usize::MAX / 2).unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::OutOfMemory);
        assert_eq!(buffer.capacity(), capacity);
        assert_eq!(buffer.sized_for(), 100);
        assert!(buffer.ensure_capacity(100).is_ok());
    }

    #[test_log::test]
    fn test_overflowing_request_is_out_of_memory() {
        let mut buffer = OutputBuffer::new();

        let err = buffer.allocate(usize::MAX).unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::OutOfMemory);
        assert!(!buffer.is_allocated());
    }

    #[test_log::test]
    fn test_commit_exposes_written_bytes() {
        let mut buffer = OutputBuffer::new();
        buffer.allocate(0).unwrap();

        let destination = buffer.destination();
        assert_eq!(destination.len(), FRAME_HEADROOM);
        destination[..3].copy_from_slice(&[1, 2, 3]);

        assert_eq!(buffer.commit(3).unwrap(), &[1, 2, 3]);
    }

    #[test_log::test]
    fn test_commit_rejects_oversized_write() {
        let mut buffer = OutputBuffer::new();
        buffer.allocate(0).unwrap();

        let err = buffer.commit(FRAME_HEADROOM + 1).unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::Internal);
    }

    #[test_log::test]
    fn test_release_drops_allocation() {
        let mut buffer = OutputBuffer::new();
        buffer.allocate(10).unwrap();

        buffer.release();

        assert!(!buffer.is_allocated());
        assert_eq!(buffer.capacity(), 0);
    }
}
