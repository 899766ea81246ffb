//! Reusable destination region for planar → semi-planar conversion

/// Bytes needed for a 4:2:0 semi-planar image: `ceil(width * height * 1.5)`
pub fn semi_planar_size(width: u32, height: u32) -> usize {
    let pixels = width as usize * height as usize;
    (pixels * 3).div_ceil(2)
}

/// Capacity-matched byte region reused across frames.
///
/// Whenever the required size changes the region is reallocated, and that
/// call reports "not ready": the fresh allocation holds no valid pixels yet,
/// so the frame that triggered it must be skipped.
#[derive(Debug, Default)]
pub struct ScratchBuffer {
    data: Vec<u8>,
    reallocations: u64,
}

impl ScratchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure the region holds exactly `size` bytes.
    ///
    /// Returns `true` when the existing region is reused, `false` when it
    /// had to be reallocated.
    pub fn ensure(&mut self, size: usize) -> bool {
        if self.data.len() == size {
            return true;
        }

        log::debug!(
            "scratch buffer resize {} -> {} bytes",
            self.data.len(),
            size
        );
        self.data = vec![0u8; size];
        self.reallocations += 1;
        false
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of reallocations since creation
    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Drop the allocation; the next `ensure` reallocates
    pub fn clear(&mut self) {
        self.data = Vec::new();
    }
}
