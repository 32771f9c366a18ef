use cgmath::{Point3, Vector3};

use crate::engine_state::voxels::block::{BlockSide, FaceKind};

/// Distance an inset face is pulled towards the voxel centre.
const INSET: f32 = 1.0 / 16.0;

/// Texture coordinates of the four corners, in corner order.
pub const FACE_TEX_COORDS: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

/// Triangle list for one quad, relative to its first vertex.
pub const FACE_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

/// A single quad of a unit voxel.
///
/// Corners are stored lower-left, lower-right, upper-right, upper-left as seen
/// from outside the voxel, so the quad winds counter-clockwise towards the
/// viewer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    /// Corners relative to the voxel's minimum corner
    pub corners: [Point3<f32>; 4],
    /// Which side of the block this face represents
    pub block_side: BlockSide,
}

impl Face {
    /// Builds the quad of the given geometry kind for one side of a voxel.
    ///
    /// # Arguments
    /// * `kind` - Full faces lie on the voxel boundary; inset side faces are
    ///   pulled one sixteenth towards the centre while caps stay put
    /// * `block_side` - Which side of the block this face represents
    pub fn new(kind: FaceKind, block_side: BlockSide) -> Self {
        let mut corners = full_corners(block_side);

        if kind == FaceKind::Inset && !matches!(block_side, BlockSide::TOP | BlockSide::BOTTOM) {
            let pull = block_side.offset().map(|c| -(c as f32) * INSET);
            for corner in corners.iter_mut() {
                *corner += pull;
            }
        }

        Face { corners, block_side }
    }

    /// The face's corners moved to the voxel at `voxel` (chunk-local).
    pub fn translated(&self, voxel: Point3<usize>) -> [Point3<f32>; 4] {
        let shift = Vector3::new(voxel.x as f32, voxel.y as f32, voxel.z as f32);
        self.corners.map(|corner| corner + shift)
    }
}

fn full_corners(side: BlockSide) -> [Point3<f32>; 4] {
    let p = Point3::new;
    match side {
        BlockSide::FRONT => [p(0.0, 0.0, 1.0), p(1.0, 0.0, 1.0), p(1.0, 1.0, 1.0), p(0.0, 1.0, 1.0)],
        BlockSide::BACK => [p(1.0, 0.0, 0.0), p(0.0, 0.0, 0.0), p(0.0, 1.0, 0.0), p(1.0, 1.0, 0.0)],
        BlockSide::BOTTOM => [p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 0.0, 1.0), p(0.0, 0.0, 1.0)],
        BlockSide::TOP => [p(0.0, 1.0, 1.0), p(1.0, 1.0, 1.0), p(1.0, 1.0, 0.0), p(0.0, 1.0, 0.0)],
        BlockSide::LEFT => [p(0.0, 0.0, 0.0), p(0.0, 0.0, 1.0), p(0.0, 1.0, 1.0), p(0.0, 1.0, 0.0)],
        BlockSide::RIGHT => [p(1.0, 0.0, 1.0), p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0), p(1.0, 1.0, 1.0)],
    }
}

#[cfg(test)]
mod tests {
    use cgmath::InnerSpace;

    use super::*;

    fn normal(face: &Face) -> Vector3<f32> {
        let [a, b, c, _] = face.corners;
        (b - a).cross(c - a).normalize()
    }

    #[test]
    fn full_faces_wind_towards_their_side() {
        for side in BlockSide::all() {
            let face = Face::new(FaceKind::Full, side);
            let expected = side.offset().map(|c| c as f32);
            assert!((normal(&face) - expected).magnitude() < 1e-5, "{side:?}");
        }
    }

    #[test]
    fn inset_faces_move_sides_but_not_caps() {
        let left = Face::new(FaceKind::Inset, BlockSide::LEFT);
        assert!(left.corners.iter().all(|c| (c.x - INSET).abs() < 1e-6));

        let right = Face::new(FaceKind::Inset, BlockSide::RIGHT);
        assert!(right.corners.iter().all(|c| (c.x - (1.0 - INSET)).abs() < 1e-6));

        assert_eq!(
            Face::new(FaceKind::Inset, BlockSide::TOP),
            Face::new(FaceKind::Full, BlockSide::TOP)
        );
    }
}
