//! Planar I420 → semi-planar (NV12/NV21) conversion
//!
//! Luma rows are copied stride-by-stride. Chroma rows are interleaved with an
//! AVX2 fast path (32 pairs per iteration) and a portable scalar fallback.

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

use crate::scratch_buffer::{semi_planar_size, ScratchBuffer};
use crate::types::I420Buffer;
use thiserror::Error;

/// Chroma byte order of the interleaved plane
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SemiPlanarLayout {
    /// U first (U0 V0 U1 V1 ...)
    Nv12 = 0,
    /// V first (V0 U0 V1 U1 ...)
    #[default]
    Nv21 = 1,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("4:2:0 conversion needs even dimensions, got {width}x{height}")]
    OddDimensions { width: u32, height: u32 },

    #[error("plane {plane} too small: need {needed} bytes, have {actual}")]
    PlaneTooSmall {
        plane: &'static str,
        needed: usize,
        actual: usize,
    },

    #[error("plane {plane} stride {stride} is narrower than its width {width}")]
    StrideTooSmall {
        plane: &'static str,
        stride: usize,
        width: usize,
    },
}

/// Result of a conversion request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Scratch buffer holds a complete semi-planar image
    Ready,
    /// Scratch buffer was resized to `bytes`; nothing was written
    Resized { bytes: usize },
}

/// Converts planar frames into a reusable semi-planar scratch buffer
#[derive(Debug, Default)]
pub struct FormatConverter {
    layout: SemiPlanarLayout,
    scratch: ScratchBuffer,
    width: u32,
    height: u32,
}

impl FormatConverter {
    pub fn new(layout: SemiPlanarLayout) -> Self {
        Self {
            layout,
            ..Self::default()
        }
    }

    pub fn layout(&self) -> SemiPlanarLayout {
        self.layout
    }

    /// Convert `src` into the scratch buffer.
    ///
    /// A size change reallocates and returns [`Conversion::Resized`] without
    /// writing; the caller skips that frame. Steady-state calls allocate
    /// nothing.
    pub fn convert(&mut self, src: &I420Buffer) -> Result<Conversion, ConversionError> {
        validate(src)?;

        let size = semi_planar_size(src.width, src.height);
        if !self.scratch.ensure(size) {
            self.width = src.width;
            self.height = src.height;
            return Ok(Conversion::Resized { bytes: size });
        }

        let width = src.width as usize;
        let height = src.height as usize;
        let (out_y, out_uv) = self.scratch.as_mut_slice().split_at_mut(width * height);

        copy_plane(&src.data_y, src.stride_y, out_y, width, width, height);

        let (first, first_stride, second, second_stride) = match self.layout {
            SemiPlanarLayout::Nv12 => (&src.data_u, src.stride_u, &src.data_v, src.stride_v),
            SemiPlanarLayout::Nv21 => (&src.data_v, src.stride_v, &src.data_u, src.stride_u),
        };
        interleave_chroma(
            first,
            first_stride,
            second,
            second_stride,
            out_uv,
            width / 2,
            height / 2,
        );

        self.width = src.width;
        self.height = src.height;
        Ok(Conversion::Ready)
    }

    /// Last converted image (valid only after [`Conversion::Ready`])
    pub fn output(&self) -> &[u8] {
        self.scratch.as_slice()
    }

    /// Dimensions the scratch buffer is currently sized for
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn reallocations(&self) -> u64 {
        self.scratch.reallocations()
    }

    pub fn reset(&mut self) {
        self.scratch.clear();
        self.width = 0;
        self.height = 0;
    }
}

fn validate(src: &I420Buffer) -> Result<(), ConversionError> {
    if src.width % 2 != 0 || src.height % 2 != 0 {
        return Err(ConversionError::OddDimensions {
            width: src.width,
            height: src.height,
        });
    }

    let width = src.width as usize;
    let height = src.height as usize;
    check_plane("Y", &src.data_y, src.stride_y, width, height)?;
    check_plane("U", &src.data_u, src.stride_u, width / 2, height / 2)?;
    check_plane("V", &src.data_v, src.stride_v, width / 2, height / 2)
}

fn check_plane(
    plane: &'static str,
    data: &[u8],
    stride: usize,
    width: usize,
    height: usize,
) -> Result<(), ConversionError> {
    if height == 0 || width == 0 {
        return Ok(());
    }
    if stride < width {
        return Err(ConversionError::StrideTooSmall {
            plane,
            stride,
            width,
        });
    }
    // last row only needs `width` bytes, not a full stride
    let needed = stride * (height - 1) + width;
    if data.len() < needed {
        return Err(ConversionError::PlaneTooSmall {
            plane,
            needed,
            actual: data.len(),
        });
    }
    Ok(())
}

fn copy_plane(
    src: &[u8],
    src_stride: usize,
    dst: &mut [u8],
    dst_stride: usize,
    width: usize,
    height: usize,
) {
    if src_stride == width && dst_stride == width {
        dst[..width * height].copy_from_slice(&src[..width * height]);
        return;
    }
    for row in 0..height {
        let s = row * src_stride;
        let d = row * dst_stride;
        dst[d..d + width].copy_from_slice(&src[s..s + width]);
    }
}

/// Interleave two chroma planes row by row into `out` (`2 * width` bytes per row)
pub fn interleave_chroma(
    first: &[u8],
    first_stride: usize,
    second: &[u8],
    second_stride: usize,
    out: &mut [u8],
    width: usize,
    height: usize,
) {
    for row in 0..height {
        let a = &first[row * first_stride..row * first_stride + width];
        let b = &second[row * second_stride..row * second_stride + width];
        let dst = &mut out[row * width * 2..(row + 1) * width * 2];
        interleave_row(a, b, dst);
    }
}

/// Auto-dispatch row interleave with runtime CPU detection
fn interleave_row(first: &[u8], second: &[u8], out: &mut [u8]) {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") && first.len() >= 32 {
            let done = unsafe { interleave_row_avx2(first, second, out) };
            interleave_row_scalar(&first[done..], &second[done..], &mut out[done * 2..]);
            return;
        }
    }

    interleave_row_scalar(first, second, out);
}

/// Interleave 32 byte pairs per iteration using AVX2.
///
/// Returns the number of pairs written; the tail is left to the caller.
///
/// # Safety
/// Requires AVX2 CPU support. `out` must hold `2 * first.len()` bytes and
/// `second` at least `first.len()` bytes.
#[target_feature(enable = "avx2")]
#[cfg(target_arch = "x86_64")]
pub unsafe fn interleave_row_avx2(first: &[u8], second: &[u8], out: &mut [u8]) -> usize {
    debug_assert!(second.len() >= first.len());
    debug_assert!(out.len() >= first.len() * 2);

    let blocks = first.len() / 32;
    for block in 0..blocks {
        let x = block * 32;
        let a = _mm256_loadu_si256(first.as_ptr().add(x) as *const __m256i);
        let b = _mm256_loadu_si256(second.as_ptr().add(x) as *const __m256i);

        // unpack works per 128-bit lane: lo = pairs 0..8 | 16..24, hi = 8..16 | 24..32
        let lo = _mm256_unpacklo_epi8(a, b);
        let hi = _mm256_unpackhi_epi8(a, b);

        let out0 = _mm256_permute2x128_si256(lo, hi, 0x20);
        let out1 = _mm256_permute2x128_si256(lo, hi, 0x31);

        _mm256_storeu_si256(out.as_mut_ptr().add(x * 2) as *mut __m256i, out0);
        _mm256_storeu_si256(out.as_mut_ptr().add(x * 2 + 32) as *mut __m256i, out1);
    }
    blocks * 32
}

/// Scalar fallback implementation (portable, slower)
fn interleave_row_scalar(first: &[u8], second: &[u8], out: &mut [u8]) {
    for (i, (a, b)) in first.iter().zip(second).enumerate() {
        out[i * 2] = *a;
        out[i * 2 + 1] = *b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn pattern(width: u32, height: u32, stride_pad: usize) -> I420Buffer {
        let w = width as usize;
        let h = height as usize;
        let stride_y = w + stride_pad;
        let stride_c = w / 2 + stride_pad;

        let data_y: Vec<u8> = (0..stride_y * h).map(|i| (i % 251) as u8).collect();
        let data_u: Vec<u8> = (0..stride_c * h / 2).map(|i| (i * 3 % 256) as u8).collect();
        let data_v: Vec<u8> = (0..stride_c * h / 2).map(|i| (i * 7 % 256) as u8).collect();

        I420Buffer {
            width,
            height,
            data_y: Arc::from(data_y),
            data_u: Arc::from(data_u),
            data_v: Arc::from(data_v),
            stride_y,
            stride_u: stride_c,
            stride_v: stride_c,
        }
    }

    fn convert_ready(converter: &mut FormatConverter, src: &I420Buffer) -> Vec<u8> {
        assert!(matches!(converter.convert(src), Ok(Conversion::Resized { .. })));
        assert_eq!(converter.convert(src), Ok(Conversion::Ready));
        converter.output().to_vec()
    }

    #[test]
    fn test_first_call_resizes_without_writing() {
        let src = I420Buffer::filled(8, 4, 10, 20, 30);
        let mut converter = FormatConverter::new(SemiPlanarLayout::Nv21);

        assert_eq!(converter.convert(&src), Ok(Conversion::Resized { bytes: 48 }));
        assert!(converter.output().iter().all(|b| *b == 0));
        assert_eq!(converter.reallocations(), 1);
    }

    #[test]
    fn test_nv21_layout() {
        let src = I420Buffer::filled(4, 2, 16, 100, 200);
        let mut converter = FormatConverter::new(SemiPlanarLayout::Nv21);
        let out = convert_ready(&mut converter, &src);

        assert_eq!(&out[..8], &[16; 8]);
        assert_eq!(&out[8..], &[200, 100, 200, 100]);
    }

    #[test]
    fn test_nv12_layout() {
        let src = I420Buffer::filled(4, 2, 16, 100, 200);
        let mut converter = FormatConverter::new(SemiPlanarLayout::Nv12);
        let out = convert_ready(&mut converter, &src);

        assert_eq!(&out[8..], &[100, 200, 100, 200]);
    }

    #[test]
    fn test_strided_planes() {
        let src = pattern(6, 4, 5);
        let mut converter = FormatConverter::new(SemiPlanarLayout::Nv12);
        let out = convert_ready(&mut converter, &src);

        for row in 0..4 {
            for col in 0..6 {
                assert_eq!(out[row * 6 + col], src.data_y[row * src.stride_y + col]);
            }
        }
        let uv = &out[24..];
        for row in 0..2 {
            for col in 0..3 {
                assert_eq!(uv[row * 6 + col * 2], src.data_u[row * src.stride_u + col]);
                assert_eq!(uv[row * 6 + col * 2 + 1], src.data_v[row * src.stride_v + col]);
            }
        }
    }

    #[test]
    fn test_steady_state_does_not_reallocate() {
        let src = pattern(64, 16, 0);
        let mut converter = FormatConverter::new(SemiPlanarLayout::Nv21);
        convert_ready(&mut converter, &src);

        for _ in 0..5 {
            assert_eq!(converter.convert(&src), Ok(Conversion::Ready));
        }
        assert_eq!(converter.reallocations(), 1);
    }

    #[test]
    fn test_rejects_odd_dimensions() {
        let src = I420Buffer::filled(5, 4, 0, 0, 0);
        let mut converter = FormatConverter::default();

        assert_eq!(
            converter.convert(&src),
            Err(ConversionError::OddDimensions { width: 5, height: 4 })
        );
    }

    #[test]
    fn test_rejects_short_plane() {
        let mut src = I420Buffer::filled(8, 8, 0, 0, 0);
        src.data_v = Arc::from(vec![0u8; 4]);
        let mut converter = FormatConverter::default();

        assert!(matches!(
            converter.convert(&src),
            Err(ConversionError::PlaneTooSmall { plane: "V", .. })
        ));
    }

    #[test]
    #[cfg(target_arch = "x86_64")]
    fn test_avx2_vs_scalar() {
        if !is_x86_feature_detected!("avx2") {
            return;
        }

        let first: Vec<u8> = (0..70).map(|i| (i * 5 % 256) as u8).collect();
        let second: Vec<u8> = (0..70).map(|i| (255 - i * 3 % 256) as u8).collect();
        let mut out_avx2 = vec![0u8; 140];
        let mut out_scalar = vec![0u8; 140];

        interleave_row(&first, &second, &mut out_avx2);
        interleave_row_scalar(&first, &second, &mut out_scalar);

        assert_eq!(out_avx2, out_scalar);
    }
}
