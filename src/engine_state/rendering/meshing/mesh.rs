//! # Chunk Mesh Generation
//!
//! Turns a chunk's blocks and light into a `ChunkMesh`. Geometry is grouped by
//! face direction so a renderer can draw only the directions that face the
//! camera.

use std::sync::Arc;

use cgmath::{Point3, Vector3};

use crate::{
    engine_state::rendering::Vertex,
    engine_state::voxels::{
        block::{BlockSide, BlockType},
        chunk::{
            chunk_iteration::ChunkBlockIterator, is_inside, ChunkBlocks, ChunkCoordinate,
            LightMap, CHUNK_DIMENSION,
        },
        world::ChunkRegistry,
    },
    error::{PipelineError, Result},
};

use super::face::{Face, FACE_INDICES, FACE_TEX_COORDS};

/// Where one face direction's geometry sits inside a [`ChunkMesh`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DirectionRange {
    pub first_vertex: u32,
    pub vertex_count: u32,
    pub first_index: u32,
    pub index_count: u32,
}

/// Triangle geometry for one chunk, in chunk-local coordinates.
///
/// Vertices and indices are laid out direction by direction in `BlockSide`
/// order. Indices are absolute into `vertices`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkMesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    /// Indexed by `BlockSide as usize`
    pub ranges: [DirectionRange; 6],
}

impl ChunkMesh {
    /// Number of quads in the mesh.
    pub fn face_count(&self) -> usize {
        self.vertices.len() / 4
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Range for a single direction.
    pub fn range(&self, side: BlockSide) -> DirectionRange {
        self.ranges[side as usize]
    }

    /// Non-empty direction ranges that can face `camera`, for a chunk at `coordinate`.
    pub fn visible_ranges(&self, coordinate: ChunkCoordinate, camera: Point3<f32>) -> Vec<(BlockSide, DirectionRange)> {
        let origin = coordinate.origin();
        let min = Point3::new(origin.x as f32, origin.y as f32, origin.z as f32);
        let max = min + Vector3::new(1.0, 1.0, 1.0) * CHUNK_DIMENSION as f32;

        BlockSide::get_visible_sides(camera, min, max)
            .into_iter()
            .map(|side| (side, self.range(side)))
            .filter(|(_, range)| range.index_count > 0)
            .collect()
    }
}

/// Snapshot of a chunk and its six face neighbours.
///
/// Face steps only ever leave the chunk across a single face, so those six
/// neighbours are all the mesher needs.
struct MeshView {
    blocks: Arc<ChunkBlocks>,
    light: Arc<LightMap>,
    /// Indexed by `BlockSide as usize`; `None` when the neighbour has no blocks yet
    neighbors: [Option<(Arc<ChunkBlocks>, Arc<LightMap>)>; 6],
}

impl MeshView {
    fn capture(chunks: &ChunkRegistry, coordinate: ChunkCoordinate) -> Result<Self> {
        let chunk = chunks
            .get(coordinate)
            .ok_or(PipelineError::ChunkMissing(coordinate))?;

        let neighbors = BlockSide::all().map(|side| {
            chunks
                .get(coordinate.offset(side.offset()))
                .filter(|neighbor| neighbor.status().has_blocks())
                .map(|neighbor| (neighbor.blocks(), neighbor.light()))
        });

        Ok(MeshView {
            blocks: chunk.blocks(),
            light: chunk.light(),
            neighbors,
        })
    }

    /// Block and light of the voxel next to `position` across `side`.
    ///
    /// Unknown neighbours report `INVALID` and no light.
    fn across(&self, position: Point3<usize>, side: BlockSide) -> (BlockType, u8) {
        let local = Point3::new(position.x as i32, position.y as i32, position.z as i32) + side.offset();

        if is_inside(local) {
            let local = to_local(local);
            return (self.blocks.get(local), self.light.sky_light(local));
        }

        match &self.neighbors[side as usize] {
            Some((blocks, light)) => {
                let wrapped = local.map(|c| c.rem_euclid(CHUNK_DIMENSION));
                let wrapped = to_local(wrapped);
                (blocks.get(wrapped), light.sky_light(wrapped))
            }
            None => (BlockType::INVALID, 0),
        }
    }
}

fn to_local(position: Point3<i32>) -> Point3<usize> {
    Point3::new(position.x as usize, position.y as usize, position.z as usize)
}

/// Builds the mesh for the chunk at `coordinate`.
///
/// A face is emitted when the voxel it looks into is unknown or that voxel's
/// opposite face is transparent. Unknown neighbours keep their faces so holes
/// never appear at the edge of the loaded area. Each face is shaded with the
/// sky light of the voxel in front of it.
pub fn generate_chunk_mesh(chunks: &ChunkRegistry, coordinate: ChunkCoordinate) -> Result<ChunkMesh> {
    let view = MeshView::capture(chunks, coordinate)?;
    let mut buckets: [Vec<(Point3<usize>, BlockType, u8)>; 6] = Default::default();

    for (position, block) in ChunkBlockIterator::new(&view.blocks) {
        for side in BlockSide::all() {
            let (neighbor, light) = view.across(position, side);
            if neighbor == BlockType::INVALID || neighbor.is_face_transparent(side.opposite()) {
                buckets[side as usize].push((position, block, light));
            }
        }
    }

    let mut mesh = ChunkMesh::default();
    for side in BlockSide::all() {
        let faces = &buckets[side as usize];
        let range = &mut mesh.ranges[side as usize];
        range.first_vertex = mesh.vertices.len() as u32;
        range.first_index = mesh.indices.len() as u32;

        for &(position, block, light) in faces {
            let face = Face::new(block.face_kind(), side);
            let texture_index = block.texture_indices()[side as usize];
            let base = mesh.vertices.len() as u32;

            for (corner, tex_coords) in face.translated(position).into_iter().zip(FACE_TEX_COORDS) {
                mesh.vertices.push(Vertex::new(corner, tex_coords, texture_index, light));
            }
            mesh.indices.extend(FACE_INDICES.iter().map(|index| base + index));
        }

        range.vertex_count = mesh.vertices.len() as u32 - range.first_vertex;
        range.index_count = mesh.indices.len() as u32 - range.first_index;
    }

    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::ComponentRegistry,
        engine_state::voxels::chunk::{index_to_local, ChunkStatus, CHUNK_SIZE, MAX_LIGHT},
    };

    fn registry() -> ChunkRegistry {
        ChunkRegistry::new(Arc::new(ComponentRegistry::new()))
    }

    fn solid_neighbors(chunks: &ChunkRegistry, center: ChunkCoordinate, block: BlockType) {
        for side in BlockSide::all() {
            let neighbor = chunks.get_or_create(center.offset(side.offset()));
            let mut blocks = ChunkBlocks::Air;
            for index in 0..CHUNK_SIZE as usize {
                blocks.set(index_to_local(index), block);
            }
            neighbor.publish_blocks(blocks);
            neighbor.advance_status(ChunkStatus::WAIT_NEIGHBORS);
        }
    }

    #[test]
    fn lone_block_in_air_gets_six_lit_faces() {
        let chunks = registry();
        let coordinate = ChunkCoordinate::new(0, 0, 0);
        let chunk = chunks.get_or_create(coordinate);
        let mut blocks = ChunkBlocks::Air;
        blocks.set(Point3::new(3, 3, 3), BlockType::STONE);
        chunk.publish_blocks(blocks);
        chunk.publish_light(LightMap::filled(MAX_LIGHT));

        let mesh = generate_chunk_mesh(&chunks, coordinate).unwrap();

        assert_eq!(mesh.face_count(), 6);
        assert_eq!(mesh.indices.len(), 36);
        assert!(mesh.vertices.iter().all(|v| v.light == MAX_LIGHT as u32));
        for side in BlockSide::all() {
            let range = mesh.range(side);
            assert_eq!(range.vertex_count, 4);
            assert_eq!(range.index_count, 6);
            assert_eq!(range.first_vertex, side as u32 * 4);
        }
    }

    #[test]
    fn boundary_faces_stay_when_the_neighbor_is_unknown() {
        let chunks = registry();
        let coordinate = ChunkCoordinate::new(0, 0, 0);
        let chunk = chunks.get_or_create(coordinate);
        let mut blocks = ChunkBlocks::Air;
        blocks.set(Point3::new(0, 0, 0), BlockType::DIRT);
        blocks.set(Point3::new(1, 0, 0), BlockType::DIRT);
        chunk.publish_blocks(blocks);

        let mesh = generate_chunk_mesh(&chunks, coordinate).unwrap();

        // The shared face between the two blocks is culled on both sides.
        assert_eq!(mesh.face_count(), 10);
        assert_eq!(mesh.range(BlockSide::LEFT).vertex_count, 4);
        assert_eq!(mesh.range(BlockSide::RIGHT).vertex_count, 4);
    }

    #[test]
    fn opaque_neighbors_hide_boundary_faces_and_leaves_do_not() {
        let chunks = registry();
        let coordinate = ChunkCoordinate::new(0, 0, 0);
        let chunk = chunks.get_or_create(coordinate);
        let mut blocks = ChunkBlocks::Air;
        blocks.set(Point3::new(0, 15, 0), BlockType::STONE);
        chunk.publish_blocks(blocks);

        solid_neighbors(&chunks, coordinate, BlockType::STONE);
        let hidden = generate_chunk_mesh(&chunks, coordinate).unwrap();
        assert_eq!(hidden.range(BlockSide::LEFT).vertex_count, 0);
        assert_eq!(hidden.range(BlockSide::TOP).vertex_count, 0);
        assert_eq!(hidden.range(BlockSide::BACK).vertex_count, 0);
        assert_eq!(hidden.face_count(), 3);

        let chunks = registry();
        let chunk = chunks.get_or_create(coordinate);
        let mut blocks = ChunkBlocks::Air;
        blocks.set(Point3::new(0, 15, 0), BlockType::STONE);
        chunk.publish_blocks(blocks);
        solid_neighbors(&chunks, coordinate, BlockType::LEAVES);
        assert_eq!(generate_chunk_mesh(&chunks, coordinate).unwrap().face_count(), 6);
    }

    #[test]
    fn faces_take_the_light_in_front_of_them() {
        let chunks = registry();
        let coordinate = ChunkCoordinate::new(0, 0, 0);
        let chunk = chunks.get_or_create(coordinate);
        let mut blocks = ChunkBlocks::Air;
        blocks.set(Point3::new(5, 5, 5), BlockType::SAND);
        chunk.publish_blocks(blocks);
        let mut light = LightMap::filled(0);
        light.set_sky_light(Point3::new(5, 6, 5), 12);
        chunk.publish_light(light);

        let mesh = generate_chunk_mesh(&chunks, coordinate).unwrap();
        let top = mesh.range(BlockSide::TOP);
        let top_vertices = &mesh.vertices[top.first_vertex as usize..(top.first_vertex + top.vertex_count) as usize];

        assert!(top_vertices.iter().all(|v| v.light == 12));
        assert!(top_vertices.iter().all(|v| v.position[1] == 6.0));
        let bottom = mesh.range(BlockSide::BOTTOM);
        assert_eq!(mesh.vertices[bottom.first_vertex as usize].light, 0);
    }

    #[test]
    fn air_chunks_mesh_to_nothing() {
        let chunks = registry();
        let coordinate = ChunkCoordinate::new(2, 0, 0);
        chunks.get_or_create(coordinate);

        let mesh = generate_chunk_mesh(&chunks, coordinate).unwrap();
        assert!(mesh.is_empty());
        assert!(mesh
            .visible_ranges(coordinate, Point3::new(0.0, 0.0, 0.0))
            .is_empty());
    }

    #[test]
    fn camera_side_selects_direction_ranges() {
        let chunks = registry();
        let coordinate = ChunkCoordinate::new(0, 0, 0);
        let chunk = chunks.get_or_create(coordinate);
        let mut blocks = ChunkBlocks::Air;
        blocks.set(Point3::new(8, 8, 8), BlockType::STONE);
        chunk.publish_blocks(blocks);

        let mesh = generate_chunk_mesh(&chunks, coordinate).unwrap();
        let above = mesh.visible_ranges(coordinate, Point3::new(8.0, 50.0, 8.0));

        assert_eq!(above.len(), 5);
        assert!(above.iter().all(|(side, _)| *side != BlockSide::BOTTOM));
    }

    #[test]
    fn missing_chunk_is_an_error() {
        let chunks = registry();
        assert!(matches!(
            generate_chunk_mesh(&chunks, ChunkCoordinate::new(9, 9, 9)),
            Err(PipelineError::ChunkMissing(_))
        ));
    }
}
