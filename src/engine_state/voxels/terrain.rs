//! # Terrain Generation
//!
//! First-pass block fill. Each column gets a surface height from fractal noise
//! shaped by its biome; each voxel then takes the biome's block for its depth
//! below that surface.
//!
//! Generation is a pure function of the seed and the chunk coordinate, so any
//! number of workers can run it concurrently.

use cgmath::Point3;
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use super::{
    biome::{position_roll, Biome, BiomeProvider, ClimateBiomeProvider},
    block::BlockType,
    chunk::{local_index, ChunkBlocks, ChunkCoordinate, CHUNK_DIMENSION, CHUNK_SIZE},
};

/// Salt for ore rolls, keeping them independent of structure rolls.
const ORE_SALT: u64 = 0x6F72_6573;

/// Deterministic terrain generator shared by every terrain worker.
pub struct TerrainGenerator {
    seed: u32,
    biomes: Box<dyn BiomeProvider>,
    height_noise: Fbm<Perlin>,
}

impl TerrainGenerator {
    /// Creates a generator using the climate-driven biome provider.
    pub fn new(seed: u32) -> Self {
        Self::with_biomes(seed, Box::new(ClimateBiomeProvider::new(seed)))
    }

    /// Creates a generator with a custom biome provider.
    pub fn with_biomes(seed: u32, biomes: Box<dyn BiomeProvider>) -> Self {
        TerrainGenerator {
            seed,
            biomes,
            height_noise: Fbm::<Perlin>::new(seed).set_octaves(4),
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// The biome owning a world column.
    pub fn biome_at(&self, x: i32, z: i32) -> &Biome {
        self.biomes.biome_at(x, z)
    }

    /// Surface height of a world column: the y of the topmost solid voxel.
    pub fn surface_height(&self, x: i32, z: i32) -> i32 {
        let biome = self.biome_at(x, z);
        let noise = self
            .height_noise
            .get([x as f64 * biome.roughness, z as f64 * biome.roughness]);
        (biome.baseline_height + biome.amplitude * noise).floor() as i32
    }

    /// Generates the blocks of one chunk.
    ///
    /// Returns the compact all-air representation when no voxel is solid.
    pub fn generate(&self, coordinate: ChunkCoordinate) -> ChunkBlocks {
        let origin = coordinate.origin();
        let mut blocks = vec![BlockType::AIR.to_storage(); CHUNK_SIZE as usize];
        let mut any_solid = false;

        for z in 0..CHUNK_DIMENSION {
            for x in 0..CHUNK_DIMENSION {
                let world_x = origin.x + x;
                let world_z = origin.z + z;
                let height = self.surface_height(world_x, world_z);

                // Whole column above the surface.
                if height < origin.y {
                    continue;
                }

                let biome = self.biome_at(world_x, world_z);
                for y in 0..CHUNK_DIMENSION {
                    let world_y = origin.y + y;
                    let depth = height - world_y;
                    if depth < 0 {
                        break;
                    }

                    let roll = position_roll(self.seed, ORE_SALT, world_x, world_y, world_z);
                    let block = biome.get_block(depth, roll);
                    if !block.is_air() {
                        let index =
                            local_index(Point3::new(x as usize, y as usize, z as usize));
                        blocks[index] = block.to_storage();
                        any_solid = true;
                    }
                }
            }
        }

        if any_solid {
            ChunkBlocks::Dense(blocks.into_boxed_slice())
        } else {
            ChunkBlocks::Air
        }
    }
}
