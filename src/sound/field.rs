//! Per-field sample buffers

use std::ops::Range;

/// Sample indices of the field buffer that belong to `line`
///
/// Lines split the field evenly; rounding can leave some lines with an empty
/// window and others with one extra sample, but consecutive windows always
/// tile `0..samples_per_field` exactly.
#[inline]
pub fn line_window(samples_per_field: usize, line: u32, total_lines: u32) -> Range<usize> {
    let total = total_lines.max(1) as usize;
    let line = (line as usize).min(total);
    let start = samples_per_field * line / total;
    let end = samples_per_field * (line + 1).min(total) / total;
    start..end
}

/// One field of stereo audio
#[derive(Debug, Clone, Default)]
pub struct FieldBuffer {
    left: Vec<i16>,
    right: Vec<i16>,
}

impl FieldBuffer {
    /// Silent field of `samples` frames
    pub fn new(samples: usize) -> Self {
        Self {
            left: vec![0; samples],
            right: vec![0; samples],
        }
    }

    /// Resize to `samples` frames and clear
    pub fn resize(&mut self, samples: usize) {
        self.left.clear();
        self.left.resize(samples, 0);
        self.right.clear();
        self.right.resize(samples, 0);
    }

    /// Frames per field
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// No frames
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Left channel
    pub fn left(&self) -> &[i16] {
        &self.left
    }

    /// Right channel
    pub fn right(&self) -> &[i16] {
        &self.right
    }

    /// Mutable views of both channels over `range`
    pub fn window_mut(&mut self, range: Range<usize>) -> (&mut [i16], &mut [i16]) {
        (&mut self.left[range.clone()], &mut self.right[range])
    }

    /// Zero every sample
    pub fn silence(&mut self) {
        self.left.fill(0);
        self.right.fill(0);
    }
}
