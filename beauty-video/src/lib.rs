//! Beauty Video - frame model and pixel conversion
//!
//! Frame types consumed by the beautification pipeline plus the planar to
//! semi-planar converter vendor engines need for CPU input.
//!
//! Key points:
//! - Planes are reference counted, frames move to the render thread without copies
//! - AVX2 SIMD chroma interleave with a scalar fallback
//! - One capacity-matched scratch buffer, zero allocation in steady state

pub mod format_conversion;
pub mod scratch_buffer;
pub mod types;

pub use format_conversion::*;
pub use scratch_buffer::*;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semi_planar_size_matches_layout() {
        let (cw, ch) = chroma_size(1920, 1080);
        assert_eq!(semi_planar_size(1920, 1080), 1920 * 1080 + cw * ch * 2);
    }
}
