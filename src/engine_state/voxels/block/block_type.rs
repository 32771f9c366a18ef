//! # Block Type Module
//!
//! This module defines the different types of blocks in the voxel world together
//! with the per-face transparency flags that drive both light propagation and
//! face culling.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use super::{block_side::BlockSide, BlockTypeSize};

/// Enumerates all possible block types in the voxel world.
///
/// The discriminant is the byte stored in chunk arrays and chunk files, so
/// variants must only ever be appended. `INVALID` is a sentinel returned by
/// queries against chunks that do not exist or have no terrain yet; it is
/// never stored.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u8)]
pub enum BlockType {
    /// Empty space. Transparent on every face.
    AIR = 0,
    /// Default underground fill.
    STONE = 1,
    /// Subsurface layer in temperate biomes.
    DIRT = 2,
    /// Surface layer in temperate biomes.
    GRASS = 3,
    /// Surface and subsurface layer in deserts.
    SAND = 4,
    /// Surface layer in cold biomes.
    SNOW = 5,
    /// Common ore band close to the surface.
    COAL_ORE = 6,
    /// Ore band favouring medium depths.
    IRON_ORE = 7,
    /// Rare ore band favouring deep stone.
    GOLD_ORE = 8,
    /// Tree trunk.
    LOG = 9,
    /// Tree canopy. Lets light through.
    LEAVES = 10,
    /// Desert plant. The sides are inset so they never hide a neighbour.
    CACTUS = 11,
    /// Crop planted on grass. Lets light through.
    WHEAT = 12,
    /// Sentinel for "unknown". Never written into a chunk.
    INVALID = 255,
}

impl BlockType {
    /// Converts a stored byte back to a `BlockType`.
    ///
    /// Unknown bytes map to `INVALID` rather than panicking, so a damaged chunk
    /// file degrades into holes instead of a crash.
    pub fn from_storage(btype: BlockTypeSize) -> Self {
        Self::from_u8(btype).unwrap_or(BlockType::INVALID)
    }

    /// The byte stored in chunk arrays for this block type.
    pub fn to_storage(self) -> BlockTypeSize {
        self as BlockTypeSize
    }

    /// `true` for the empty block.
    pub fn is_air(self) -> bool {
        self == BlockType::AIR
    }

    /// Whether the given face of this block lets light and sight through.
    pub fn is_face_transparent(self, side: BlockSide) -> bool {
        match self {
            BlockType::AIR | BlockType::LEAVES | BlockType::WHEAT => true,
            BlockType::CACTUS => !matches!(side, BlockSide::TOP | BlockSide::BOTTOM),
            _ => false,
        }
    }

    /// Whether light can enter a voxel holding this block.
    pub fn lets_light_through(self) -> bool {
        BlockSide::all()
            .into_iter()
            .any(|side| self.is_face_transparent(side))
    }

    /// The geometry used for this block's faces.
    pub fn face_kind(self) -> FaceKind {
        match self {
            BlockType::CACTUS => FaceKind::Inset,
            _ => FaceKind::Full,
        }
    }

    /// Texture array layer for each face, indexed by `BlockSide as usize`.
    pub fn texture_indices(self) -> [u32; 6] {
        match self {
            // FRONT, BACK, BOTTOM, TOP, LEFT, RIGHT
            BlockType::GRASS => [3, 3, 2, 4, 3, 3],
            BlockType::LOG => [9, 9, 10, 10, 9, 9],
            BlockType::CACTUS => [12, 12, 13, 13, 12, 12],
            other => [other as u32; 6],
        }
    }
}

/// Geometry variant used when emitting a face.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FaceKind {
    /// Quad lying on the voxel boundary.
    Full,
    /// Side quads pulled one sixteenth towards the voxel centre.
    Inset,
}
