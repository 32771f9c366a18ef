//! # Chunk Iteration Module
//!
//! This module provides an iterator over the non-air blocks of a chunk's block
//! array, together with their local positions.
//!
//! For the compact all-air representation the iterator is empty without touching
//! any memory, which lets mesh generation and the serializer skip air chunks for
//! free.

use cgmath::Point3;

use crate::engine_state::voxels::block::BlockType;

use super::{index_to_local, ChunkBlocks};

/// An iterator over all non-air blocks in a chunk.
///
/// Blocks are yielded in storage order (x fastest, then y, then z).
pub struct ChunkBlockIterator<'a> {
    /// The dense block bytes, or `None` for an all-air chunk
    blocks: Option<&'a [u8]>,
    /// Next array index to inspect
    index: usize,
}

impl<'a> ChunkBlockIterator<'a> {
    /// Creates a new `ChunkBlockIterator` for the given block array.
    ///
    /// # Arguments
    /// * `blocks` - The block array to iterate over
    pub fn new(blocks: &'a ChunkBlocks) -> Self {
        let blocks = match blocks {
            ChunkBlocks::Air => None,
            ChunkBlocks::Dense(blocks) => Some(&blocks[..]),
        };
        ChunkBlockIterator { blocks, index: 0 }
    }
}

impl Iterator for ChunkBlockIterator<'_> {
    type Item = (Point3<usize>, BlockType);

    /// Gets the next non-air block in the chunk along with its position.
    ///
    /// # Returns
    /// - `Some((position, block))` if another non-air block is found
    /// - `None` once the end of the array is reached
    fn next(&mut self) -> Option<Self::Item> {
        let blocks = self.blocks?;

        while self.index < blocks.len() {
            let index = self.index;
            self.index += 1;

            let block = BlockType::from_storage(blocks[index]);
            if !block.is_air() {
                return Some((index_to_local(index), block));
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_only_solid_blocks_in_storage_order() {
        let mut blocks = ChunkBlocks::Air;
        blocks.set(Point3::new(0, 1, 0), BlockType::LOG);
        blocks.set(Point3::new(5, 0, 0), BlockType::STONE);

        let found: Vec<_> = ChunkBlockIterator::new(&blocks).collect();
        assert_eq!(
            found,
            vec![
                (Point3::new(5, 0, 0), BlockType::STONE),
                (Point3::new(0, 1, 0), BlockType::LOG),
            ]
        );
    }

    #[test]
    fn air_chunks_yield_nothing() {
        assert_eq!(ChunkBlockIterator::new(&ChunkBlocks::Air).count(), 0);
    }
}
