//! # Block Side Module
//!
//! This module defines the six faces of a voxel block, their direction vectors,
//! and the half-space test used to skip whole direction groups when rendering.

use cgmath::{Point3, Vector3};

/// Represents the six possible faces of a voxel block.
///
/// The discriminant doubles as the index into per-side tables (texture indices,
/// mesh direction ranges).
///
/// The order is: [FRONT, BACK, BOTTOM, TOP, LEFT, RIGHT]
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum BlockSide {
    /// The front face (facing positive Z)
    FRONT = 0,

    /// The back face (facing negative Z)
    BACK = 1,

    /// The bottom face (facing negative Y)
    BOTTOM = 2,

    /// The top face (facing positive Y)
    TOP = 3,

    /// The left face (facing negative X)
    LEFT = 4,

    /// The right face (facing positive X)
    RIGHT = 5,
}

impl BlockSide {
    /// Returns an array containing all six block faces in a consistent order.
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::FRONT,
            BlockSide::BACK,
            BlockSide::BOTTOM,
            BlockSide::TOP,
            BlockSide::LEFT,
            BlockSide::RIGHT,
        ]
    }

    /// Unit step from a voxel to the neighbour this face looks at.
    pub fn offset(self) -> Vector3<i32> {
        match self {
            BlockSide::FRONT => Vector3::new(0, 0, 1),
            BlockSide::BACK => Vector3::new(0, 0, -1),
            BlockSide::BOTTOM => Vector3::new(0, -1, 0),
            BlockSide::TOP => Vector3::new(0, 1, 0),
            BlockSide::LEFT => Vector3::new(-1, 0, 0),
            BlockSide::RIGHT => Vector3::new(1, 0, 0),
        }
    }

    /// The face pointing the other way.
    pub fn opposite(self) -> BlockSide {
        match self {
            BlockSide::FRONT => BlockSide::BACK,
            BlockSide::BACK => BlockSide::FRONT,
            BlockSide::BOTTOM => BlockSide::TOP,
            BlockSide::TOP => BlockSide::BOTTOM,
            BlockSide::LEFT => BlockSide::RIGHT,
            BlockSide::RIGHT => BlockSide::LEFT,
        }
    }

    /// Determines which face directions of a box can possibly be seen from `camera`.
    ///
    /// A face pointing along +X is only visible when the camera is past the
    /// box's minimum X, and so on for every axis. The renderer uses this to skip
    /// whole per-direction vertex ranges of a chunk mesh.
    ///
    /// # Arguments
    /// * `camera` - Camera position in world space
    /// * `min` - Minimum corner of the box in world space
    /// * `max` - Maximum corner of the box in world space
    pub fn get_visible_sides(camera: Point3<f32>, min: Point3<f32>, max: Point3<f32>) -> Vec<BlockSide> {
        let mut visible_sides = Vec::with_capacity(6);

        if camera.z > min.z {
            visible_sides.push(BlockSide::FRONT);
        }
        if camera.z < max.z {
            visible_sides.push(BlockSide::BACK);
        }
        if camera.y < max.y {
            visible_sides.push(BlockSide::BOTTOM);
        }
        if camera.y > min.y {
            visible_sides.push(BlockSide::TOP);
        }
        if camera.x < max.x {
            visible_sides.push(BlockSide::LEFT);
        }
        if camera.x > min.x {
            visible_sides.push(BlockSide::RIGHT);
        }

        visible_sides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_offsets_cancel() {
        for side in BlockSide::all() {
            assert_eq!(side.offset() + side.opposite().offset(), Vector3::new(0, 0, 0));
            assert_eq!(side.opposite().opposite(), side);
        }
    }

    #[test]
    fn camera_above_a_box_never_sees_its_bottom() {
        let min = Point3::new(0.0, 0.0, 0.0);
        let max = Point3::new(16.0, 16.0, 16.0);
        let sides = BlockSide::get_visible_sides(Point3::new(8.0, 40.0, 8.0), min, max);

        assert!(sides.contains(&BlockSide::TOP));
        assert!(!sides.contains(&BlockSide::BOTTOM));
        assert_eq!(sides.len(), 5);
    }
}
