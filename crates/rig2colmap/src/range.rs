use crate::error::ConvertError;

/// A validated half-open range of frame offsets `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRange {
    start: u32,
    end: u32,
}

impl FrameRange {
    /// Validate a frame range.
    ///
    /// # Arguments
    ///
    /// * `start` - First frame offset, inclusive.
    /// * `end` - Last frame offset, exclusive.
    /// * `max_frame` - Upper bound of the capture; `end` may equal it.
    ///
    /// # Errors
    ///
    /// [`ConvertError::InvalidRange`] when `start >= end`, and
    /// [`ConvertError::FrameOutOfBounds`] when the range leaves `[0, max_frame]`.
    pub fn new(start: i64, end: i64, max_frame: u32) -> Result<Self, ConvertError> {
        if start >= end {
            return Err(ConvertError::InvalidRange { start, end });
        }
        if start < 0 || end > i64::from(max_frame) {
            return Err(ConvertError::FrameOutOfBounds {
                start,
                end,
                max_frame,
            });
        }
        // both fit in u32 after the bounds check
        Ok(Self {
            start: start as u32,
            end: end as u32,
        })
    }

    /// First frame offset.
    pub fn start(&self) -> u32 {
        self.start
    }

    /// One past the last frame offset.
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    /// Always false for a validated range.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Iterate the frame offsets.
    pub fn iter(&self) -> std::ops::Range<u32> {
        self.start..self.end
    }
}
