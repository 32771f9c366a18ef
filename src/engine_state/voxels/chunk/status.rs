//! # Chunk Status
//!
//! The lifecycle states a chunk moves through. The derive order is the
//! lifecycle order, so `<` on two statuses answers "which one is further along".

use num_derive::FromPrimitive;

/// Lifecycle state of a chunk.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive)]
#[repr(u8)]
pub enum ChunkStatus {
    /// Registered, nothing generated.
    NONE = 0,
    /// Terrain generation (or a load from disk) is in flight.
    TERRAIN_GENERATING = 1,
    /// Blocks are populated; waiting for the 26 neighbours to catch up.
    WAIT_NEIGHBORS = 2,
    /// Structure placement is in flight.
    STRUCTURE_GENERATING = 3,
    /// Blocks are final, including structures spilled in from neighbours.
    LOADED = 4,
    /// Skylight flood fill is in flight.
    LIGHT_GENERATING = 5,
    /// Skylight has been computed at least once.
    LIGHTS_GENERATED = 6,
    /// Mesh generation is in flight.
    MESH_GENERATING = 7,
    /// Mesh buffers are ready for upload.
    PREPARED = 8,
    /// Queued for upload on the render thread.
    MESH_LOADING = 9,
    /// Uploaded and visible.
    FINAL = 10,
}

impl ChunkStatus {
    /// Readiness rank used when comparing a chunk with its neighbours.
    ///
    /// Everything between terrain completion and mesh generation shares one
    /// rank, since from the outside those chunks all "have blocks".
    pub fn urgency(self) -> u8 {
        match self {
            ChunkStatus::NONE => 0,
            ChunkStatus::TERRAIN_GENERATING => 1,
            ChunkStatus::WAIT_NEIGHBORS
            | ChunkStatus::STRUCTURE_GENERATING
            | ChunkStatus::LOADED
            | ChunkStatus::LIGHT_GENERATING
            | ChunkStatus::LIGHTS_GENERATED => 2,
            ChunkStatus::MESH_GENERATING => 3,
            ChunkStatus::PREPARED => 4,
            ChunkStatus::MESH_LOADING => 5,
            ChunkStatus::FINAL => 6,
        }
    }

    /// `true` once the chunk's terrain blocks can be read.
    pub fn has_blocks(self) -> bool {
        self >= ChunkStatus::WAIT_NEIGHBORS
    }

    /// `true` once the chunk has been lit at least once.
    pub fn is_lit(self) -> bool {
        self >= ChunkStatus::LIGHTS_GENERATED
    }

    /// `true` while some stage owns the chunk and will advance it on completion.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            ChunkStatus::TERRAIN_GENERATING
                | ChunkStatus::STRUCTURE_GENERATING
                | ChunkStatus::LIGHT_GENERATING
                | ChunkStatus::MESH_GENERATING
                | ChunkStatus::PREPARED
                | ChunkStatus::MESH_LOADING
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgency_never_decreases_along_the_lifecycle() {
        let lifecycle = [
            ChunkStatus::NONE,
            ChunkStatus::TERRAIN_GENERATING,
            ChunkStatus::WAIT_NEIGHBORS,
            ChunkStatus::STRUCTURE_GENERATING,
            ChunkStatus::LOADED,
            ChunkStatus::LIGHT_GENERATING,
            ChunkStatus::LIGHTS_GENERATED,
            ChunkStatus::MESH_GENERATING,
            ChunkStatus::PREPARED,
            ChunkStatus::MESH_LOADING,
            ChunkStatus::FINAL,
        ];

        for pair in lifecycle.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].urgency() <= pair[1].urgency());
        }
        assert_eq!(ChunkStatus::LOADED.urgency(), ChunkStatus::WAIT_NEIGHBORS.urgency());
    }
}
