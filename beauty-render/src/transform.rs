//! Render transform calculation for engine input
//!
//! Texture inputs are normalised (rotation applied, mirror resolved, y
//! flipped for GL texture space) around the texture centre before the engine
//! sees them. Planar inputs carry a rotation hint instead of a matrix.

use beauty_video::Rotation;
use glam::{Mat4, Vec3};

/// Matrix applied to a texture input: `buffer * T(0.5) * Rz * S(mirror, -1) * T(-0.5)`
pub fn texture_render_transform(buffer_transform: Mat4, rotation: Rotation, mirror: bool) -> Mat4 {
    let center = Vec3::new(0.5, 0.5, 0.0);
    let scale_x = if mirror { -1.0 } else { 1.0 };

    let render = Mat4::from_translation(center)
        * Mat4::from_rotation_z((rotation.degrees() as f32).to_radians())
        * Mat4::from_scale(Vec3::new(scale_x, -1.0, 1.0))
        * Mat4::from_translation(-center);

    buffer_transform * render
}

/// Rotation hint for planar input.
///
/// A mirrored portrait image is flipped horizontally in its own frame, which
/// the engine sees as an extra half turn.
pub fn planar_rotation(rotation: Rotation, mirror: bool) -> Rotation {
    if mirror && !rotation.is_landscape() {
        rotation.flipped()
    } else {
        rotation
    }
}
