//! Stage-level scenarios run against hand-built chunk registries.

use std::sync::Arc;

use cgmath::Point3;
use voxel_streaming::{
    core::ComponentRegistry,
    engine_state::{
        rendering::meshing::generate_chunk_mesh,
        voxels::{
            block::{BlockSide, BlockType},
            chunk::{Chunk, ChunkBlocks, ChunkCoordinate, ChunkStatus, LightMap, CHUNK_SIZE, MAX_LIGHT},
            lighting::light_chunk,
            world::ChunkRegistry,
        },
    },
};

fn registry() -> ChunkRegistry {
    ChunkRegistry::new(Arc::new(ComponentRegistry::new()))
}

fn filled(block: BlockType) -> ChunkBlocks {
    ChunkBlocks::from_dense(vec![block.to_storage(); CHUNK_SIZE as usize].into_boxed_slice())
}

fn add_chunk(chunks: &ChunkRegistry, coordinate: ChunkCoordinate, blocks: ChunkBlocks, status: ChunkStatus) -> Arc<Chunk> {
    let chunk = chunks.get_or_create(coordinate);
    chunk.publish_blocks(blocks);
    chunk.advance_status(status);
    chunk
}

/// An open-sky chunk directly above `coordinate`.
fn add_sky_above(chunks: &ChunkRegistry, coordinate: ChunkCoordinate) -> Arc<Chunk> {
    let above = ChunkCoordinate::new(coordinate.0.x, coordinate.0.y + 1, coordinate.0.z);
    let sky = add_chunk(chunks, above, ChunkBlocks::Air, ChunkStatus::LIGHTS_GENERATED);
    sky.publish_light(LightMap::filled(MAX_LIGHT));
    sky
}

fn p(x: usize, y: usize, z: usize) -> Point3<usize> {
    Point3::new(x, y, z)
}

#[test]
fn status_order_and_urgency() {
    let order = [
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
    assert!(order.windows(2).all(|pair| pair[0] < pair[1]));

    assert!(order.windows(2).all(|pair| pair[0].urgency() <= pair[1].urgency()));
    assert_eq!(ChunkStatus::WAIT_NEIGHBORS.urgency(), ChunkStatus::LIGHTS_GENERATED.urgency());
    assert!(ChunkStatus::MESH_GENERATING.urgency() > ChunkStatus::LIGHTS_GENERATED.urgency());
    assert_eq!(ChunkStatus::FINAL.urgency(), 6);
}

#[test]
fn status_never_moves_backwards() {
    let chunks = registry();
    let chunk = chunks.get_or_create(ChunkCoordinate::new(0, 0, 0));

    assert!(chunk.advance_status(ChunkStatus::LOADED));
    assert!(!chunk.advance_status(ChunkStatus::WAIT_NEIGHBORS));
    assert_eq!(chunk.status(), ChunkStatus::LOADED);

    chunk.reset_status();
    assert_eq!(chunk.status(), ChunkStatus::NONE);
}

#[test]
fn neighbour_barrier_needs_all_twenty_six() {
    let chunks = registry();
    let center = ChunkCoordinate::new(4, -2, 1);

    let neighbors: Vec<ChunkCoordinate> = center.neighbors().collect();
    assert_eq!(neighbors.len(), 26);

    for &neighbor in &neighbors[..25] {
        add_chunk(&chunks, neighbor, ChunkBlocks::Air, ChunkStatus::LOADED);
    }
    assert!(!chunks.neighbors_reached(center, ChunkStatus::WAIT_NEIGHBORS));
    // The barrier never creates the missing neighbour.
    assert!(chunks.get(neighbors[25]).is_none());

    let last = add_chunk(&chunks, neighbors[25], ChunkBlocks::Air, ChunkStatus::WAIT_NEIGHBORS);
    assert!(chunks.neighbors_reached(center, ChunkStatus::WAIT_NEIGHBORS));
    assert!(!chunks.neighbors_reached(center, ChunkStatus::LOADED));

    last.advance_status(ChunkStatus::LOADED);
    assert!(chunks.neighbors_reached(center, ChunkStatus::LOADED));
}

#[test]
fn urgency_barrier_counts_equally_urgent_neighbours() {
    let chunks = registry();
    let center = ChunkCoordinate::new(0, 3, 0);
    let neighbors: Vec<ChunkCoordinate> = center.neighbors().collect();

    for &neighbor in &neighbors {
        add_chunk(&chunks, neighbor, ChunkBlocks::Air, ChunkStatus::WAIT_NEIGHBORS);
    }
    // Still waiting on their own neighbours, but as urgent as a loaded chunk.
    assert!(chunks.neighbors_urgent(center, ChunkStatus::LOADED));
    assert!(!chunks.neighbors_reached(center, ChunkStatus::LOADED));
    assert!(!chunks.neighbors_urgent(center, ChunkStatus::MESH_GENERATING));

    chunks.remove(neighbors[0]);
    assert!(!chunks.neighbors_urgent(center, ChunkStatus::LOADED));
    assert!(!chunks.neighbors_urgent(center, ChunkStatus::WAIT_NEIGHBORS));
}

#[test]
fn unobstructed_shaft_is_lit_to_the_bottom() {
    let chunks = registry();
    let center = ChunkCoordinate::new(0, 0, 0);

    let mut blocks = filled(BlockType::STONE);
    for y in 0..16 {
        blocks.set(p(8, y, 8), BlockType::AIR);
    }
    add_chunk(&chunks, center, blocks, ChunkStatus::LIGHT_GENERATING);
    add_sky_above(&chunks, center);

    light_chunk(&chunks, center).unwrap();

    let chunk = chunks.get(center).unwrap();
    for y in 0..16 {
        assert_eq!(chunk.light_at_local(p(8, y, 8)), MAX_LIGHT, "y = {y}");
    }
    assert_eq!(chunk.light_at_local(p(7, 15, 8)), 0);
}

#[test]
fn light_below_an_obstruction_falls_off_by_one_per_voxel() {
    let chunks = registry();
    let center = ChunkCoordinate::new(0, 0, 0);

    // A shaft blocked at y = 10, with an open pocket beside it reaching down to
    // y = 9 so light can step around the obstruction.
    let mut blocks = filled(BlockType::STONE);
    for y in 0..16 {
        if y != 10 {
            blocks.set(p(8, y, 8), BlockType::AIR);
        }
    }
    for y in 9..16 {
        blocks.set(p(9, y, 8), BlockType::AIR);
    }
    add_chunk(&chunks, center, blocks, ChunkStatus::LIGHT_GENERATING);
    add_sky_above(&chunks, center);

    light_chunk(&chunks, center).unwrap();

    let chunk = chunks.get(center).unwrap();
    assert_eq!(chunk.light_at_local(p(8, 11, 8)), MAX_LIGHT);
    assert_eq!(chunk.light_at_local(p(9, 9, 8)), MAX_LIGHT);
    assert_eq!(chunk.light_at_local(p(8, 10, 8)), 0);

    assert_eq!(chunk.light_at_local(p(8, 9, 8)), MAX_LIGHT - 1);
    assert_eq!(chunk.light_at_local(p(8, 8, 8)), MAX_LIGHT - 2);
    assert_eq!(chunk.light_at_local(p(8, 7, 8)), MAX_LIGHT - 3);
    assert_eq!(chunk.light_at_local(p(8, 0, 8)), MAX_LIGHT - 10);
}

#[test]
fn a_single_block_shades_only_its_own_column() {
    let chunks = registry();
    let center = ChunkCoordinate::new(0, 0, 0);

    let mut blocks = ChunkBlocks::Air;
    blocks.set(p(8, 8, 8), BlockType::STONE);
    add_chunk(&chunks, center, blocks, ChunkStatus::LIGHT_GENERATING);
    add_sky_above(&chunks, center);

    light_chunk(&chunks, center).unwrap();

    let chunk = chunks.get(center).unwrap();
    assert_eq!(chunk.light_at_local(p(8, 8, 8)), 0);
    for y in 0..8 {
        // Straight-down light is blocked; the neighbouring columns feed it sideways.
        assert_eq!(chunk.light_at_local(p(8, y, 8)), MAX_LIGHT - 1, "y = {y}");
    }
    assert_eq!(chunk.light_at_local(p(7, 0, 8)), MAX_LIGHT);
    assert_eq!(chunk.light_at_local(p(8, 9, 8)), MAX_LIGHT);
    assert_eq!(chunk.light_at_local(p(0, 0, 0)), MAX_LIGHT);
}

#[test]
fn relighting_a_neighbour_spoils_the_lit_chunk_below() {
    let chunks = registry();
    let lower = ChunkCoordinate::new(0, 0, 0);
    let upper = ChunkCoordinate::new(0, 1, 0);

    // The lower chunk was lit while nothing above it was known.
    let mut lower_blocks = filled(BlockType::STONE);
    lower_blocks.set(p(3, 15, 3), BlockType::AIR);
    add_chunk(&chunks, lower, lower_blocks, ChunkStatus::LIGHT_GENERATING);
    light_chunk(&chunks, lower).unwrap();
    chunks.get(lower).unwrap().advance_status(ChunkStatus::LIGHTS_GENERATED);
    assert_eq!(chunks.light_at(Point3::new(3, 15, 3)), 0);

    // Lighting the chunk above spills down into it.
    let mut upper_blocks = ChunkBlocks::Air;
    upper_blocks.set(p(0, 0, 0), BlockType::STONE);
    add_chunk(&chunks, upper, upper_blocks, ChunkStatus::LIGHT_GENERATING);
    add_sky_above(&chunks, upper);

    let outcome = light_chunk(&chunks, upper).unwrap();

    assert_eq!(chunks.light_at(Point3::new(3, 15, 3)), MAX_LIGHT);
    assert_eq!(outcome.spoiled, vec![lower]);
    assert!(chunks.get(lower).unwrap().is_spoiled());
}

#[test]
fn faces_between_solid_chunks_are_culled() {
    let chunks = registry();
    let left = ChunkCoordinate::new(0, 0, 0);
    let right = ChunkCoordinate::new(1, 0, 0);

    let mut left_blocks = ChunkBlocks::Air;
    left_blocks.set(p(15, 5, 5), BlockType::STONE);
    add_chunk(&chunks, left, left_blocks, ChunkStatus::LIGHTS_GENERATED);

    // Unknown neighbour: the boundary face is kept.
    let mesh = generate_chunk_mesh(&chunks, left).unwrap();
    assert_eq!(mesh.face_count(), 6);
    assert_eq!(mesh.range(BlockSide::RIGHT).index_count, 6);

    let mut right_blocks = ChunkBlocks::Air;
    right_blocks.set(p(0, 5, 5), BlockType::STONE);
    add_chunk(&chunks, right, right_blocks, ChunkStatus::LIGHTS_GENERATED);

    let mesh = generate_chunk_mesh(&chunks, left).unwrap();
    assert_eq!(mesh.face_count(), 5);
    assert_eq!(mesh.range(BlockSide::RIGHT).index_count, 0);

    let mesh = generate_chunk_mesh(&chunks, right).unwrap();
    assert_eq!(mesh.range(BlockSide::LEFT).index_count, 0);
}

#[test]
fn block_queries_never_invent_terrain() {
    let chunks = registry();
    let coordinate = ChunkCoordinate::new(0, 0, 0);

    assert_eq!(chunks.block_at(Point3::new(1, 1, 1)), BlockType::INVALID);
    assert!(chunks.is_empty());

    let chunk = chunks.get_or_create(coordinate);
    chunk.publish_blocks(filled(BlockType::DIRT));
    assert_eq!(chunks.block_at(Point3::new(1, 1, 1)), BlockType::INVALID);

    chunk.advance_status(ChunkStatus::WAIT_NEIGHBORS);
    assert_eq!(chunks.block_at(Point3::new(1, 1, 1)), BlockType::DIRT);
    assert_eq!(chunks.block_at_world(Point3::new(15.9, 0.2, 3.0)), BlockType::DIRT);
    assert_eq!(chunks.block_at_world(Point3::new(-0.1, 0.2, 3.0)), BlockType::INVALID);
}
