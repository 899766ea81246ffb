//! Frame data types shared by the beautification pipeline

use glam::Mat4;
use std::fmt;
use std::sync::Arc;

/// Which camera produced a frame
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraFacing {
    #[default]
    Front = 0,
    Back = 1,
}

impl CameraFacing {
    pub fn is_front(self) -> bool {
        self == CameraFacing::Front
    }
}

/// Clockwise frame rotation
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Deg0 = 0,
    Deg90 = 90,
    Deg180 = 180,
    Deg270 = 270,
}

impl Rotation {
    /// Build from a degree value; anything other than a right angle is rejected
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u32 {
        self as u32
    }

    /// True for 0/180, where the rotated size equals the buffer size
    pub fn is_landscape(self) -> bool {
        self.degrees() % 180 == 0
    }

    /// Add 180 degrees
    pub fn flipped(self) -> Self {
        match self {
            Rotation::Deg0 => Rotation::Deg180,
            Rotation::Deg90 => Rotation::Deg270,
            Rotation::Deg180 => Rotation::Deg0,
            Rotation::Deg270 => Rotation::Deg90,
        }
    }
}

/// Texture sampler type
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureType {
    /// Hardware-backed external texture (needs the OES sampler)
    Oes = 0,
    /// Plain 2D RGB texture
    Rgb = 1,
}

/// Processing path a frame's buffer maps to
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    OpaqueExternalTexture = 0,
    PlainTexture = 1,
    PlanarPixels = 2,
}

impl BufferKind {
    pub fn is_texture(self) -> bool {
        !matches!(self, BufferKind::PlanarPixels)
    }
}

/// GPU texture handle plus its sampling transform
#[derive(Debug, Clone, PartialEq)]
pub struct TextureBuffer {
    pub texture_type: TextureType,
    pub texture_id: u32,
    pub width: u32,
    pub height: u32,
    pub transform: Mat4,
}

impl TextureBuffer {
    pub fn new(texture_type: TextureType, texture_id: u32, width: u32, height: u32) -> Self {
        Self {
            texture_type,
            texture_id,
            width,
            height,
            transform: Mat4::IDENTITY,
        }
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }
}

/// Planar YUV 4:2:0 buffer (Y, U, V each with its own stride)
///
/// Planes are reference counted so a frame can be handed to the render
/// thread without copying pixel data.
#[derive(Clone)]
pub struct I420Buffer {
    pub width: u32,
    pub height: u32,
    pub data_y: Arc<[u8]>,
    pub data_u: Arc<[u8]>,
    pub data_v: Arc<[u8]>,
    pub stride_y: usize,
    pub stride_u: usize,
    pub stride_v: usize,
}

impl I420Buffer {
    /// Allocate a tightly packed buffer filled with the given Y/U/V values
    pub fn filled(width: u32, height: u32, y: u8, u: u8, v: u8) -> Self {
        let (cw, ch) = chroma_size(width, height);
        Self {
            width,
            height,
            data_y: vec![y; (width * height) as usize].into(),
            data_u: vec![u; cw * ch].into(),
            data_v: vec![v; cw * ch].into(),
            stride_y: width as usize,
            stride_u: cw,
            stride_v: cw,
        }
    }

    pub fn chroma_width(&self) -> usize {
        chroma_size(self.width, self.height).0
    }

    pub fn chroma_height(&self) -> usize {
        chroma_size(self.width, self.height).1
    }
}

impl fmt::Debug for I420Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("I420Buffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride_y", &self.stride_y)
            .field("stride_u", &self.stride_u)
            .field("stride_v", &self.stride_v)
            .finish()
    }
}

/// Chroma plane size for 4:2:0 subsampling (rounded up for odd sizes)
pub fn chroma_size(width: u32, height: u32) -> (usize, usize) {
    (width.div_ceil(2) as usize, height.div_ceil(2) as usize)
}

/// Frame pixel storage
#[derive(Debug, Clone)]
pub enum Buffer {
    Texture(TextureBuffer),
    I420(I420Buffer),
}

impl Buffer {
    pub fn kind(&self) -> BufferKind {
        match self {
            Buffer::Texture(tex) => match tex.texture_type {
                TextureType::Oes => BufferKind::OpaqueExternalTexture,
                TextureType::Rgb => BufferKind::PlainTexture,
            },
            Buffer::I420(_) => BufferKind::PlanarPixels,
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            Buffer::Texture(tex) => tex.width,
            Buffer::I420(planes) => planes.width,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Buffer::Texture(tex) => tex.height,
            Buffer::I420(planes) => planes.height,
        }
    }
}

/// A captured video frame
///
/// Consumed once by the pipeline, which may swap its buffer for a
/// beautified texture before the frame travels downstream.
#[derive(Debug, Clone)]
pub struct Frame {
    pub buffer: Buffer,
    pub rotation: Rotation,
    pub timestamp_ns: i64,
    pub facing: CameraFacing,
}

impl Frame {
    pub fn new(buffer: Buffer, rotation: Rotation, timestamp_ns: i64, facing: CameraFacing) -> Self {
        Self {
            buffer,
            rotation,
            timestamp_ns,
            facing,
        }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Width after rotation is applied
    pub fn rotated_width(&self) -> u32 {
        if self.rotation.is_landscape() {
            self.width()
        } else {
            self.height()
        }
    }

    /// Height after rotation is applied
    pub fn rotated_height(&self) -> u32 {
        if self.rotation.is_landscape() {
            self.height()
        } else {
            self.width()
        }
    }

    /// Replace the pixel content with a processed 2D texture.
    ///
    /// The new texture is already upright, so rotation resets to zero and the
    /// transform is identity. The timestamp is preserved.
    pub fn replace_with_texture(&mut self, texture_id: u32) {
        let width = self.rotated_width();
        let height = self.rotated_height();
        self.buffer = Buffer::Texture(TextureBuffer::new(TextureType::Rgb, texture_id, width, height));
        self.rotation = Rotation::Deg0;
    }
}
