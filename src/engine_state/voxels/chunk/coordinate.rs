//! # Chunk Coordinates
//!
//! Integer coordinates in the chunk grid, plus the conversions between block
//! positions, world positions and chunk-local positions.

use cgmath::{Point3, Vector3};

use super::{CHUNK_DIMENSION, CHUNK_SHIFT};

/// Offsets from a chunk to each of its 26 spatial neighbours.
pub const NEIGHBOR_OFFSETS: [(i32, i32, i32); 26] = [
    (-1, -1, -1),
    (-1, -1, 0),
    (-1, -1, 1),
    (-1, 0, -1),
    (-1, 0, 0),
    (-1, 0, 1),
    (-1, 1, -1),
    (-1, 1, 0),
    (-1, 1, 1),
    (0, -1, -1),
    (0, -1, 0),
    (0, -1, 1),
    (0, 0, -1),
    (0, 0, 1),
    (0, 1, -1),
    (0, 1, 0),
    (0, 1, 1),
    (1, -1, -1),
    (1, -1, 0),
    (1, -1, 1),
    (1, 0, -1),
    (1, 0, 0),
    (1, 0, 1),
    (1, 1, -1),
    (1, 1, 0),
    (1, 1, 1),
];

/// Position of a chunk in the chunk grid (block position shifted right by the
/// chunk size exponent).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChunkCoordinate(pub Point3<i32>);

impl ChunkCoordinate {
    /// Creates a coordinate from its three components.
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        ChunkCoordinate(Point3::new(x, y, z))
    }

    /// The chunk holding the given block position. Uses an arithmetic shift, so
    /// negative positions round towards negative infinity.
    pub fn from_block_position(position: Point3<i32>) -> Self {
        ChunkCoordinate::new(
            position.x >> CHUNK_SHIFT,
            position.y >> CHUNK_SHIFT,
            position.z >> CHUNK_SHIFT,
        )
    }

    /// The chunk holding the given continuous world position.
    pub fn from_world_position(position: Point3<f32>) -> Self {
        Self::from_block_position(Point3::new(
            position.x.floor() as i32,
            position.y.floor() as i32,
            position.z.floor() as i32,
        ))
    }

    /// Splits a block position into its chunk and the position inside that chunk.
    pub fn split_block_position(position: Point3<i32>) -> (Self, Point3<usize>) {
        let mask = CHUNK_DIMENSION - 1;
        (
            Self::from_block_position(position),
            Point3::new(
                (position.x & mask) as usize,
                (position.y & mask) as usize,
                (position.z & mask) as usize,
            ),
        )
    }

    /// Block position of this chunk's local origin.
    pub fn origin(&self) -> Point3<i32> {
        Point3::new(
            self.0.x * CHUNK_DIMENSION,
            self.0.y * CHUNK_DIMENSION,
            self.0.z * CHUNK_DIMENSION,
        )
    }

    /// The chunk `offset` steps away from this one.
    pub fn offset(&self, offset: Vector3<i32>) -> Self {
        ChunkCoordinate(self.0 + offset)
    }

    /// All 26 neighbouring coordinates.
    pub fn neighbors(&self) -> impl Iterator<Item = ChunkCoordinate> + '_ {
        NEIGHBOR_OFFSETS
            .iter()
            .map(move |&(x, y, z)| self.offset(Vector3::new(x, y, z)))
    }

    /// Largest per-axis distance to `other`.
    pub fn chebyshev_distance(&self, other: &ChunkCoordinate) -> i32 {
        (self.0.x - other.0.x)
            .abs()
            .max((self.0.y - other.0.y).abs())
            .max((self.0.z - other.0.z).abs())
    }

    /// Deterministic file name for this chunk's save file.
    pub fn file_name(&self) -> String {
        format!("chunk_{}_{}_{}.dat", self.0.x, self.0.y, self.0.z)
    }
}

impl From<Point3<i32>> for ChunkCoordinate {
    fn from(position: Point3<i32>) -> Self {
        ChunkCoordinate(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn negative_positions_round_down() {
        let (chunk, local) = ChunkCoordinate::split_block_position(Point3::new(-1, 15, 16));
        assert_eq!(chunk, ChunkCoordinate::new(-1, 0, 1));
        assert_eq!(local, Point3::new(15, 15, 0));

        assert_eq!(
            ChunkCoordinate::from_world_position(Point3::new(-0.5, 31.9, -16.0)),
            ChunkCoordinate::new(-1, 1, -1)
        );
    }

    #[test]
    fn neighbors_are_26_distinct_adjacent_chunks() {
        let center = ChunkCoordinate::new(3, -2, 7);
        let neighbors: HashSet<_> = center.neighbors().collect();

        assert_eq!(neighbors.len(), 26);
        assert!(!neighbors.contains(&center));
        assert!(neighbors.iter().all(|n| n.chebyshev_distance(&center) == 1));
    }

    #[test]
    fn file_names_differ_per_coordinate() {
        assert_eq!(ChunkCoordinate::new(1, -2, 3).file_name(), "chunk_1_-2_3.dat");
        assert_ne!(
            ChunkCoordinate::new(1, 2, 3).file_name(),
            ChunkCoordinate::new(3, 2, 1).file_name()
        );
    }
}
