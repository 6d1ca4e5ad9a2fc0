//! Decoded video frames handed from a `FrameSource` to a worker.
//!
//! A `Frame` lives for exactly one loop iteration: the worker reads it,
//! every detector backend borrows it, and it is dropped before the next poll.

use std::time::Instant;

/// One decoded frame. Pixels are packed RGB, row-major.
pub struct Frame {
    data: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// Per-source monotonic sequence number, starting at 1.
    pub sequence: u64,

    /// Monotonic capture instant.
    pub captured_at: Instant,
}

// No Clone: frames are moved through the pipeline, never duplicated.

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            data,
            width,
            height,
            sequence,
            captured_at: Instant::now(),
        }
    }

    /// Byte length of a packed RGB frame, computed without `u32` overflow.
    pub fn rgb_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    /// A zero-filled frame, used by tests and scripted sources.
    pub fn blank(width: u32, height: u32, sequence: u64) -> Self {
        Self::new(vec![0u8; Self::rgb_len(width, height)], width, height, sequence)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Pixel payloads are never formatted into logs.
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_frame_has_rgb_payload() {
        let frame = Frame::blank(4, 2, 7);
        assert_eq!(frame.byte_len(), 24);
        assert_eq!(frame.sequence, 7);
        assert!(frame.pixels().iter().all(|&p| p == 0));
    }

    #[test]
    fn rgb_len_does_not_wrap_for_large_sizes() {
        // 70_000 * 70_000 * 3 exceeds u32::MAX
        assert_eq!(Frame::rgb_len(70_000, 70_000), 14_700_000_000);
        assert_eq!(Frame::rgb_len(640, 480), 921_600);
    }

    #[test]
    fn debug_output_omits_pixels() {
        let frame = Frame::new(vec![9u8; 12], 2, 2, 1);
        let rendered = format!("{:?}", frame);
        assert!(rendered.contains("bytes: 12"));
        assert!(!rendered.contains("[9"));
    }
}
