//! # Block Module
//!
//! This module provides the core block-related functionality: block type
//! definitions, their face transparency, and the six face directions.

pub mod block_side;
pub mod block_type;

/// The underlying integer type used to represent block types in memory.
/// This is the byte stored in chunk arrays and in chunk files.
pub type BlockTypeSize = u8;

pub use block_side::BlockSide;
pub use block_type::{BlockType, FaceKind};
