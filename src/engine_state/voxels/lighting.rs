//! # Skylight Propagation
//!
//! Breadth-first flood fill of sky light across chunk borders.
//!
//! ## Passes
//!
//! A chunk is lit by two passes that share one propagation rule:
//! - **Neighbour pass**: every voxel on each of the six faces is seeded from the
//!   light just outside that face, minus one. Propagation stays inside the chunk.
//! - **Above pass**: an 18x18 slab directly above the chunk seeds the voxels
//!   under it. Propagation may spread through the surrounding 3x3 columns of
//!   chunks and one voxel into the chunk below, which lets light spill sideways
//!   through gaps and under overhangs.
//!
//! ## Propagation rule
//!
//! A light step into a voxel is only taken if the voxel's block lets light
//! through and its chunk has finished terrain generation. Intensity drops by one
//! per step, except straight down from `MAX_LIGHT`, which stays at `MAX_LIGHT` so
//! open shafts are fully lit at any depth. A voxel is only written when the new
//! value beats the stored one.
//!
//! ## Spoiling
//!
//! Writing a brighter value into a different chunk that has already been lit
//! marks that chunk as spoiled; the orchestrator relights it later. Because light
//! values only ever increase and are bounded by `MAX_LIGHT`, every spoil is
//! caused by a strict increase somewhere and the process settles.
//!
//! All lighting runs on a single thread. The pass works on private copies of
//! every light map it touches and publishes them together at the end.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use cgmath::{Point3, Vector3};
use log::trace;

use crate::error::{PipelineError, Result};

use super::{
    block::{BlockSide, BlockType},
    chunk::{Chunk, ChunkBlocks, ChunkCoordinate, LightMap, CHUNK_DIMENSION, MAX_LIGHT},
    world::ChunkRegistry,
};

/// A pending light write, positioned in the lit chunk's local frame.
///
/// Positions may lie outside `[0, CHUNK_DIMENSION)` to address neighbouring chunks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LightSource {
    pub position: Point3<i32>,
    pub intensity: u8,
}

/// What a lighting run changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LightingOutcome {
    /// Chunks whose light map was republished.
    pub updated: Vec<ChunkCoordinate>,
    /// Already-lit chunks that received brighter light and must be relit.
    pub spoiled: Vec<ChunkCoordinate>,
}

/// Which voxels a pass may propagate into.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum PassArea {
    /// Strictly inside the lit chunk.
    Chunk,
    /// The 3x3 columns around the lit chunk, from one voxel below it upwards.
    Spill,
}

impl PassArea {
    fn contains(self, position: Point3<i32>) -> bool {
        let inside = |value: i32, low: i32, high: i32| value >= low && value < high;
        match self {
            PassArea::Chunk => {
                inside(position.x, 0, CHUNK_DIMENSION)
                    && inside(position.y, 0, CHUNK_DIMENSION)
                    && inside(position.z, 0, CHUNK_DIMENSION)
            }
            PassArea::Spill => {
                inside(position.x, -CHUNK_DIMENSION, 2 * CHUNK_DIMENSION)
                    && inside(position.y, -1, 2 * CHUNK_DIMENSION)
                    && inside(position.z, -CHUNK_DIMENSION, 2 * CHUNK_DIMENSION)
            }
        }
    }
}

/// Intensity after one step in `side`'s direction.
fn attenuate(intensity: u8, side: BlockSide) -> u8 {
    if side == BlockSide::BOTTOM && intensity == MAX_LIGHT {
        MAX_LIGHT
    } else {
        intensity.saturating_sub(1)
    }
}

/// A chunk loaded into the workspace.
struct LitChunk {
    chunk: Arc<Chunk>,
    blocks: Arc<ChunkBlocks>,
    light: LightMap,
    changed: bool,
    spoiled: bool,
}

/// Private copies of every light map a run touches.
struct LightWorkspace<'a> {
    chunks: &'a ChunkRegistry,
    center: ChunkCoordinate,
    origin: Point3<i32>,
    loaded: HashMap<ChunkCoordinate, Option<LitChunk>>,
}

impl<'a> LightWorkspace<'a> {
    fn new(chunks: &'a ChunkRegistry, center: ChunkCoordinate) -> Self {
        LightWorkspace {
            chunks,
            center,
            origin: center.origin(),
            loaded: HashMap::new(),
        }
    }

    /// Splits a position in the lit chunk's frame into chunk and local position.
    fn resolve(&self, position: Point3<i32>) -> (ChunkCoordinate, Point3<usize>) {
        ChunkCoordinate::split_block_position(self.origin + Vector3::new(position.x, position.y, position.z))
    }

    /// Loads a chunk into the workspace. Chunks without terrain resolve to `None`.
    fn entry(&mut self, coordinate: ChunkCoordinate) -> Option<&mut LitChunk> {
        let chunks = self.chunks;
        self.loaded
            .entry(coordinate)
            .or_insert_with(|| {
                chunks
                    .get(coordinate)
                    .filter(|chunk| chunk.status().has_blocks())
                    .map(|chunk| LitChunk {
                        blocks: chunk.blocks(),
                        light: (*chunk.light()).clone(),
                        chunk,
                        changed: false,
                        spoiled: false,
                    })
            })
            .as_mut()
    }

    fn block(&mut self, position: Point3<i32>) -> BlockType {
        let (coordinate, local) = self.resolve(position);
        self.entry(coordinate)
            .map(|lit| lit.blocks.get(local))
            .unwrap_or(BlockType::INVALID)
    }

    /// Light stored at a position, `None` when the chunk is unavailable.
    fn light(&mut self, position: Point3<i32>) -> Option<u8> {
        let (coordinate, local) = self.resolve(position);
        self.entry(coordinate).map(|lit| lit.light.sky_light(local))
    }

    /// Light entering from outside the chunk: the stored value of an
    /// already-lit chunk, `0` for anything else.
    fn external_light(&mut self, position: Point3<i32>) -> u8 {
        let (coordinate, local) = self.resolve(position);
        match self.entry(coordinate) {
            Some(lit) if lit.chunk.status().is_lit() => lit.light.sky_light(local),
            _ => 0,
        }
    }

    /// Raises the light at a position, spoiling other already-lit chunks.
    fn raise(&mut self, position: Point3<i32>, intensity: u8) {
        let (coordinate, local) = self.resolve(position);
        let center = self.center;
        if let Some(lit) = self.entry(coordinate) {
            lit.light.set_sky_light(local, intensity);
            lit.changed = true;
            if coordinate != center && lit.chunk.status().is_lit() {
                lit.spoiled = true;
            }
        }
    }

    fn can_enter(&mut self, position: Point3<i32>) -> bool {
        self.block(position).lets_light_through()
    }

    /// Publishes every changed light map and flags spoiled chunks.
    fn finish(self) -> LightingOutcome {
        let mut outcome = LightingOutcome::default();
        for (coordinate, lit) in self.loaded {
            let Some(lit) = lit else { continue };
            if lit.changed {
                lit.chunk.publish_light(lit.light);
                outcome.updated.push(coordinate);
            }
            if lit.spoiled {
                lit.chunk.mark_spoiled();
                outcome.spoiled.push(coordinate);
            }
        }
        outcome
    }
}

/// Runs the shared flood-fill rule until the frontier is empty.
fn flood(workspace: &mut LightWorkspace<'_>, frontier: &mut VecDeque<LightSource>, area: PassArea) {
    while let Some(LightSource { position, intensity }) = frontier.pop_front() {
        match workspace.light(position) {
            Some(stored) if stored < intensity => workspace.raise(position, intensity),
            _ => continue,
        }

        for side in BlockSide::all() {
            let next_intensity = attenuate(intensity, side);
            if next_intensity == 0 {
                continue;
            }
            let next = position + side.offset();
            if area.contains(next) && workspace.can_enter(next) {
                frontier.push_back(LightSource {
                    position: next,
                    intensity: next_intensity,
                });
            }
        }
    }
}

/// Seeds for the neighbour pass: each face voxel gets the light just outside
/// it, minus one.
fn neighbor_seeds(workspace: &mut LightWorkspace<'_>) -> VecDeque<LightSource> {
    let mut seeds = VecDeque::new();
    let last = CHUNK_DIMENSION - 1;

    for side in BlockSide::all() {
        let step = side.offset();
        for u in 0..CHUNK_DIMENSION {
            for v in 0..CHUNK_DIMENSION {
                let inside = match side {
                    BlockSide::FRONT => Point3::new(u, v, last),
                    BlockSide::BACK => Point3::new(u, v, 0),
                    BlockSide::TOP => Point3::new(u, last, v),
                    BlockSide::BOTTOM => Point3::new(u, 0, v),
                    BlockSide::RIGHT => Point3::new(last, u, v),
                    BlockSide::LEFT => Point3::new(0, u, v),
                };
                let intensity = workspace.external_light(inside + step).saturating_sub(1);
                if intensity > 0 && workspace.can_enter(inside) {
                    seeds.push_back(LightSource {
                        position: inside,
                        intensity,
                    });
                }
            }
        }
    }

    seeds
}

/// Seeds for the above pass: the slab one voxel above the chunk, one voxel
/// wider on every side, shining straight down.
fn above_seeds(workspace: &mut LightWorkspace<'_>) -> VecDeque<LightSource> {
    let mut seeds = VecDeque::new();

    for x in -1..=CHUNK_DIMENSION {
        for z in -1..=CHUNK_DIMENSION {
            let above = Point3::new(x, CHUNK_DIMENSION, z);
            let intensity = attenuate(workspace.external_light(above), BlockSide::BOTTOM);
            let target = Point3::new(x, CHUNK_DIMENSION - 1, z);
            if intensity > 0 && workspace.can_enter(target) {
                seeds.push_back(LightSource {
                    position: target,
                    intensity,
                });
            }
        }
    }

    seeds
}

/// Computes sky light for one chunk and publishes every light map it changed.
///
/// An all-air chunk is simply filled with `MAX_LIGHT`; the first time that
/// happens, every already-lit neighbour is spoiled so it can pick the new light up.
///
/// # Errors
/// `ChunkMissing` if the chunk has been evicted from the registry.
pub fn light_chunk(chunks: &ChunkRegistry, coordinate: ChunkCoordinate) -> Result<LightingOutcome> {
    let chunk = chunks
        .get(coordinate)
        .ok_or(PipelineError::ChunkMissing(coordinate))?;

    if chunk.is_air_chunk() {
        return Ok(light_air_chunk(chunks, &chunk));
    }

    let mut workspace = LightWorkspace::new(chunks, coordinate);

    let mut frontier = neighbor_seeds(&mut workspace);
    flood(&mut workspace, &mut frontier, PassArea::Chunk);

    let mut frontier = above_seeds(&mut workspace);
    flood(&mut workspace, &mut frontier, PassArea::Spill);

    let outcome = workspace.finish();
    trace!(
        "Lit chunk {:?}: {} map(s) updated, {} spoiled",
        coordinate,
        outcome.updated.len(),
        outcome.spoiled.len()
    );
    Ok(outcome)
}

fn light_air_chunk(chunks: &ChunkRegistry, chunk: &Chunk) -> LightingOutcome {
    let mut outcome = LightingOutcome::default();
    let full = LightMap::filled(MAX_LIGHT);
    if *chunk.light() == full {
        return outcome;
    }

    chunk.publish_light(full);
    outcome.updated.push(chunk.coordinate());

    for neighbor in chunk.coordinate().neighbors() {
        if let Some(neighbor_chunk) = chunks.get(neighbor) {
            if neighbor_chunk.status().is_lit() {
                neighbor_chunk.mark_spoiled();
                outcome.spoiled.push(neighbor);
            }
        }
    }
    outcome
}
