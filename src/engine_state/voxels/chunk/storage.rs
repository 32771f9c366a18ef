//! # Chunk Storage
//!
//! Block and light arrays for a single chunk.
//!
//! Both arrays are immutable once published: a stage clones the current array,
//! edits its private copy, and swaps the finished copy into the chunk. Readers on
//! other threads therefore only ever observe complete arrays.
//!
//! Voxels are laid out x-fastest: `index = x + 16 * y + 256 * z`.

use cgmath::Point3;

use crate::engine_state::voxels::block::{BlockType, BlockTypeSize};

use super::{CHUNK_DIMENSION, CHUNK_PLANE_SIZE, CHUNK_SIZE, MAX_LIGHT};

/// Converts a chunk-local position to an array index.
///
/// The caller guarantees every component lies in `[0, CHUNK_DIMENSION)`.
#[inline]
pub fn local_index(position: Point3<usize>) -> usize {
    position.x + position.y * CHUNK_DIMENSION as usize + position.z * CHUNK_PLANE_SIZE as usize
}

/// Converts an array index back to a chunk-local position.
#[inline]
pub fn index_to_local(index: usize) -> Point3<usize> {
    let dimension = CHUNK_DIMENSION as usize;
    Point3::new(
        index % dimension,
        (index / dimension) % dimension,
        index / CHUNK_PLANE_SIZE as usize,
    )
}

/// `true` when every component of a signed local position is inside the chunk.
#[inline]
pub fn is_inside(position: Point3<i32>) -> bool {
    (0..CHUNK_DIMENSION).contains(&position.x)
        && (0..CHUNK_DIMENSION).contains(&position.y)
        && (0..CHUNK_DIMENSION).contains(&position.z)
}

/// Block ids of a chunk.
///
/// Chunks that resolve to nothing but air never allocate the dense array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChunkBlocks {
    /// Every voxel is `AIR`.
    Air,
    /// One `BlockTypeSize` per voxel.
    Dense(Box<[BlockTypeSize]>),
}

impl Default for ChunkBlocks {
    fn default() -> Self {
        ChunkBlocks::Air
    }
}

impl ChunkBlocks {
    /// Builds storage from a dense array, collapsing it to `Air` when possible.
    pub fn from_dense(blocks: Box<[BlockTypeSize]>) -> Self {
        if blocks.iter().all(|&block| block == BlockType::AIR.to_storage()) {
            ChunkBlocks::Air
        } else {
            ChunkBlocks::Dense(blocks)
        }
    }

    /// `true` for the compact all-air representation.
    pub fn is_air(&self) -> bool {
        matches!(self, ChunkBlocks::Air)
    }

    /// The block at a local position.
    pub fn get(&self, position: Point3<usize>) -> BlockType {
        match self {
            ChunkBlocks::Air => BlockType::AIR,
            ChunkBlocks::Dense(blocks) => BlockType::from_storage(blocks[local_index(position)]),
        }
    }

    /// Writes a block, allocating the dense array on the first non-air write.
    pub fn set(&mut self, position: Point3<usize>, block: BlockType) {
        if let ChunkBlocks::Air = self {
            if block.is_air() {
                return;
            }
            *self = ChunkBlocks::Dense(Self::air_array());
        }

        if let ChunkBlocks::Dense(blocks) = self {
            blocks[local_index(position)] = block.to_storage();
        }
    }

    /// Raw bytes of the chunk, materialising an all-air buffer for `Air`.
    pub fn to_bytes(&self) -> Vec<BlockTypeSize> {
        match self {
            ChunkBlocks::Air => Self::air_array().into_vec(),
            ChunkBlocks::Dense(blocks) => blocks.to_vec(),
        }
    }

    fn air_array() -> Box<[BlockTypeSize]> {
        vec![BlockType::AIR.to_storage(); CHUNK_SIZE as usize].into_boxed_slice()
    }
}

/// Packed light values of a chunk.
///
/// The low nibble holds sky light; the high nibble is reserved for block light,
/// which nothing computes yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LightMap {
    values: Box<[u8]>,
}

const SKY_MASK: u8 = 0x0F;

impl Default for LightMap {
    fn default() -> Self {
        LightMap::filled(0)
    }
}

impl LightMap {
    /// A light map with every voxel's sky light set to `sky_light`.
    pub fn filled(sky_light: u8) -> Self {
        LightMap {
            values: vec![sky_light.min(MAX_LIGHT) & SKY_MASK; CHUNK_SIZE as usize].into_boxed_slice(),
        }
    }

    /// Sky light at a local position.
    pub fn sky_light(&self, position: Point3<usize>) -> u8 {
        self.values[local_index(position)] & SKY_MASK
    }

    /// Sets the sky light at a local position, clamped to `MAX_LIGHT`.
    pub fn set_sky_light(&mut self, position: Point3<usize>, value: u8) {
        let slot = &mut self.values[local_index(position)];
        *slot = (*slot & !SKY_MASK) | (value.min(MAX_LIGHT) & SKY_MASK);
    }

    /// Iterates the sky light of every voxel in index order.
    pub fn sky_values(&self) -> impl Iterator<Item = u8> + '_ {
        self.values.iter().map(|value| value & SKY_MASK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_layout_is_x_fastest() {
        assert_eq!(local_index(Point3::new(1, 0, 0)), 1);
        assert_eq!(local_index(Point3::new(0, 1, 0)), 16);
        assert_eq!(local_index(Point3::new(0, 0, 1)), 256);
        assert_eq!(index_to_local(local_index(Point3::new(3, 9, 14))), Point3::new(3, 9, 14));
    }

    #[test]
    fn first_solid_write_allocates_and_all_air_collapses() {
        let mut blocks = ChunkBlocks::Air;
        blocks.set(Point3::new(1, 1, 1), BlockType::AIR);
        assert!(blocks.is_air());

        blocks.set(Point3::new(1, 1, 1), BlockType::STONE);
        assert_eq!(blocks.get(Point3::new(1, 1, 1)), BlockType::STONE);
        assert_eq!(blocks.get(Point3::new(0, 0, 0)), BlockType::AIR);

        blocks.set(Point3::new(1, 1, 1), BlockType::AIR);
        let collapsed = ChunkBlocks::from_dense(blocks.to_bytes().into_boxed_slice());
        assert!(collapsed.is_air());
    }

    #[test]
    fn sky_light_is_clamped_and_keeps_the_block_light_nibble() {
        let mut light = LightMap::default();
        light.set_sky_light(Point3::new(2, 3, 4), 40);
        assert_eq!(light.sky_light(Point3::new(2, 3, 4)), MAX_LIGHT);
        assert!(light.sky_values().all(|value| value <= MAX_LIGHT));
    }
}
