//! Vertex data structures for chunk meshes.
//!
//! This module defines the vertex format produced by mesh generation and handed
//! to the model uploader.

use cgmath::Point3;

/// A vertex of a chunk mesh.
///
/// Positions are local to the chunk; the chunk's transform places the model in
/// the world. The layout is plain old data so a mesh can be uploaded with a
/// single `bytemuck::cast_slice`.
///
/// # Memory Layout
/// - Position: [f32; 3] (12 bytes)
/// - Texture Coordinates: [f32; 2] (8 bytes)
/// - Texture Index: u32 (4 bytes)
/// - Light: u32 (4 bytes)
///
/// Total size: 28 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Chunk-local position
    pub position: [f32; 3],
    /// UV texture coordinates (normalized 0.0-1.0)
    pub tex_coords: [f32; 2],
    /// Index of the texture in the texture array
    pub texture_index: u32,
    /// Sky light of the voxel the face looks into, `0..=MAX_LIGHT`
    pub light: u32,
}

impl Vertex {
    /// Size of one vertex in bytes.
    pub const STRIDE: usize = std::mem::size_of::<Vertex>();

    /// Creates a new vertex with the given parameters.
    ///
    /// # Arguments
    /// * `position` - Chunk-local position of the vertex
    /// * `tex_coords` - UV coordinates
    /// * `texture_index` - Index of the texture in the texture array
    /// * `light` - Sky light applied to the whole face
    pub fn new(position: Point3<f32>, tex_coords: [f32; 2], texture_index: u32, light: u8) -> Self {
        Vertex {
            position: [position.x, position.y, position.z],
            tex_coords,
            texture_index,
            light: light as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertices_cast_to_tightly_packed_bytes() {
        let vertices = [
            Vertex::new(Point3::new(1.0, 2.0, 3.0), [0.0, 1.0], 4, 15),
            Vertex::new(Point3::new(0.0, 0.0, 0.0), [1.0, 0.0], 2, 0),
        ];
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        assert_eq!(Vertex::STRIDE, 28);
        assert_eq!(bytes.len(), 2 * Vertex::STRIDE);
    }
}
