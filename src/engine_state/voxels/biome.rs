//! # Biome Module
//!
//! Biomes are plain data: a height profile, the blocks laid down at each depth
//! below the surface, ore bands and the structures that may grow on the surface.
//! A [`BiomeProvider`] decides which biome owns a column.

use noise::{NoiseFn, Perlin};

use super::{block::BlockType, structures::Structure};

/// An ore that replaces stone with a depth-dependent probability.
#[derive(Clone, Debug, PartialEq)]
pub struct OreBand {
    pub block: BlockType,
    /// Chance per voxel at `min_depth` and above.
    pub shallow_chance: f64,
    /// Chance per voxel at `max_depth` and below.
    pub deep_chance: f64,
    pub min_depth: i32,
    pub max_depth: i32,
}

impl OreBand {
    /// Probability of this ore at the given depth, smoothstepped between the
    /// shallow and deep chances.
    pub fn chance_at(&self, depth: i32) -> f64 {
        let t = smoothstep(self.min_depth as f64, self.max_depth as f64, depth as f64);
        self.shallow_chance + (self.deep_chance - self.shallow_chance) * t
    }
}

/// A structure that may be placed on top of `trigger` blocks.
#[derive(Clone, Debug, PartialEq)]
pub struct StructureRule {
    pub trigger: BlockType,
    pub chance: f64,
    pub structure: Structure,
}

/// Parameters of a single biome.
#[derive(Clone, Debug, PartialEq)]
pub struct Biome {
    pub name: &'static str,
    /// Surface height the noise oscillates around.
    pub baseline_height: f64,
    /// Peak deviation from the baseline.
    pub amplitude: f64,
    /// Horizontal noise frequency. Higher is bumpier.
    pub roughness: f64,
    /// Blocks at depth 0, 1, ... below the surface.
    pub surface_blocks: Vec<BlockType>,
    /// Blocks directly below the surface layers.
    pub subsurface_blocks: Vec<BlockType>,
    /// Everything deeper.
    pub filler: BlockType,
    pub ores: Vec<OreBand>,
    pub structures: Vec<StructureRule>,
}

impl Biome {
    /// Selects the block at `depth` voxels below the surface.
    ///
    /// Negative depths are above ground and always air. `roll` is a uniform
    /// value in `[0, 1)` and only matters in the ore region.
    pub fn get_block(&self, depth: i32, roll: f64) -> BlockType {
        if depth < 0 {
            return BlockType::AIR;
        }

        let depth_index = depth as usize;
        if let Some(&block) = self.surface_blocks.get(depth_index) {
            return block;
        }
        let subsurface_index = depth_index - self.surface_blocks.len();
        if let Some(&block) = self.subsurface_blocks.get(subsurface_index) {
            return block;
        }

        let mut threshold = 0.0;
        for ore in &self.ores {
            threshold += ore.chance_at(depth);
            if roll < threshold {
                return ore.block;
            }
        }

        self.filler
    }

    pub fn plains() -> Self {
        Biome {
            name: "plains",
            baseline_height: 4.0,
            amplitude: 6.0,
            roughness: 0.012,
            surface_blocks: vec![BlockType::GRASS],
            subsurface_blocks: vec![BlockType::DIRT; 3],
            filler: BlockType::STONE,
            ores: standard_ores(),
            structures: vec![
                StructureRule {
                    trigger: BlockType::GRASS,
                    chance: 0.004,
                    structure: Structure::Tree,
                },
                StructureRule {
                    trigger: BlockType::GRASS,
                    chance: 0.01,
                    structure: Structure::Crops,
                },
            ],
        }
    }

    pub fn forest() -> Self {
        Biome {
            name: "forest",
            baseline_height: 8.0,
            amplitude: 10.0,
            roughness: 0.018,
            surface_blocks: vec![BlockType::GRASS],
            subsurface_blocks: vec![BlockType::DIRT; 4],
            filler: BlockType::STONE,
            ores: standard_ores(),
            structures: vec![StructureRule {
                trigger: BlockType::GRASS,
                chance: 0.03,
                structure: Structure::Tree,
            }],
        }
    }

    pub fn desert() -> Self {
        Biome {
            name: "desert",
            baseline_height: 2.0,
            amplitude: 4.0,
            roughness: 0.008,
            surface_blocks: vec![BlockType::SAND; 2],
            subsurface_blocks: vec![BlockType::SAND; 3],
            filler: BlockType::STONE,
            ores: standard_ores(),
            structures: vec![StructureRule {
                trigger: BlockType::SAND,
                chance: 0.008,
                structure: Structure::Cactus,
            }],
        }
    }

    pub fn tundra() -> Self {
        Biome {
            name: "tundra",
            baseline_height: 12.0,
            amplitude: 18.0,
            roughness: 0.022,
            surface_blocks: vec![BlockType::SNOW],
            subsurface_blocks: vec![BlockType::DIRT; 2],
            filler: BlockType::STONE,
            ores: standard_ores(),
            structures: vec![StructureRule {
                trigger: BlockType::SNOW,
                chance: 0.002,
                structure: Structure::Tree,
            }],
        }
    }
}

fn standard_ores() -> Vec<OreBand> {
    vec![
        OreBand {
            block: BlockType::COAL_ORE,
            shallow_chance: 0.02,
            deep_chance: 0.008,
            min_depth: 5,
            max_depth: 40,
        },
        OreBand {
            block: BlockType::IRON_ORE,
            shallow_chance: 0.002,
            deep_chance: 0.01,
            min_depth: 10,
            max_depth: 60,
        },
        OreBand {
            block: BlockType::GOLD_ORE,
            shallow_chance: 0.0,
            deep_chance: 0.004,
            min_depth: 30,
            max_depth: 90,
        },
    ]
}

/// Hermite interpolation between `edge0` and `edge1`, clamped to `[0, 1]`.
pub fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    if edge1 <= edge0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Deterministic uniform value in `[0, 1)` for a block position.
///
/// `salt` separates independent rolls taken at the same position.
pub fn position_roll(seed: u32, salt: u64, x: i32, y: i32, z: i32) -> f64 {
    let hash = (seed as u64)
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (x as i64 as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9)
        ^ (y as i64 as u64).wrapping_mul(0x94D0_49BB_1331_11EB)
        ^ (z as i64 as u64).wrapping_mul(0x2545_F491_4F6C_DD1D)
        ^ salt.wrapping_mul(0xD6E8_FEB8_6659_FD93);
    fastrand::Rng::with_seed(hash).f64()
}

/// Decides which biome owns a world column.
pub trait BiomeProvider: Send + Sync {
    fn biome_at(&self, x: i32, z: i32) -> &Biome;
}

/// Every column uses the same biome.
pub struct SingleBiomeProvider {
    biome: Biome,
}

impl SingleBiomeProvider {
    pub fn new(biome: Biome) -> Self {
        SingleBiomeProvider { biome }
    }
}

impl BiomeProvider for SingleBiomeProvider {
    fn biome_at(&self, _x: i32, _z: i32) -> &Biome {
        &self.biome
    }
}

/// Scale applied to world coordinates when sampling the climate noise.
const CLIMATE_SCALE: f64 = 0.0025;

/// Picks plains, forest, desert or tundra from two low-frequency noise fields.
///
/// | temperature | moisture | biome  |
/// |-------------|----------|--------|
/// | cold        | any      | tundra |
/// | warm        | dry      | desert |
/// | mild        | wet      | forest |
/// | mild        | dry      | plains |
pub struct ClimateBiomeProvider {
    temperature: Perlin,
    moisture: Perlin,
    plains: Biome,
    forest: Biome,
    desert: Biome,
    tundra: Biome,
}

impl ClimateBiomeProvider {
    pub fn new(seed: u32) -> Self {
        ClimateBiomeProvider {
            temperature: Perlin::new(seed.wrapping_add(1)),
            moisture: Perlin::new(seed.wrapping_add(2)),
            plains: Biome::plains(),
            forest: Biome::forest(),
            desert: Biome::desert(),
            tundra: Biome::tundra(),
        }
    }

    /// Temperature and moisture at a column, both in roughly `[-1, 1]`.
    pub fn climate_at(&self, x: i32, z: i32) -> (f64, f64) {
        let point = [x as f64 * CLIMATE_SCALE, z as f64 * CLIMATE_SCALE];
        (self.temperature.get(point), self.moisture.get(point))
    }
}

impl BiomeProvider for ClimateBiomeProvider {
    fn biome_at(&self, x: i32, z: i32) -> &Biome {
        let (temperature, moisture) = self.climate_at(x, z);
        if temperature < -0.3 {
            &self.tundra
        } else if temperature > 0.3 && moisture < 0.0 {
            &self.desert
        } else if moisture > 0.1 {
            &self.forest
        } else {
            &self.plains
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_selects_surface_then_subsurface_then_filler() {
        let biome = Biome {
            ores: Vec::new(),
            ..Biome::plains()
        };

        assert_eq!(biome.get_block(-1, 0.0), BlockType::AIR);
        assert_eq!(biome.get_block(0, 0.0), BlockType::GRASS);
        assert_eq!(biome.get_block(1, 0.0), BlockType::DIRT);
        assert_eq!(biome.get_block(3, 0.0), BlockType::DIRT);
        assert_eq!(biome.get_block(4, 0.0), BlockType::STONE);
    }

    #[test]
    fn ore_chance_moves_from_shallow_to_deep() {
        let band = &standard_ores()[2];
        assert_eq!(band.chance_at(0), band.shallow_chance);
        assert_eq!(band.chance_at(500), band.deep_chance);
        let middle = band.chance_at((band.min_depth + band.max_depth) / 2);
        assert!(middle > band.shallow_chance && middle < band.deep_chance);
    }

    #[test]
    fn low_rolls_hit_ore_in_the_ore_region() {
        let biome = Biome::plains();
        assert_eq!(biome.get_block(20, 0.0), BlockType::COAL_ORE);
        assert_eq!(biome.get_block(20, 0.999), BlockType::STONE);
    }

    #[test]
    fn rolls_are_deterministic_and_position_dependent() {
        let a = position_roll(1, 0, 4, 5, 6);
        assert_eq!(a, position_roll(1, 0, 4, 5, 6));
        assert!((0.0..1.0).contains(&a));
        assert_ne!(a, position_roll(1, 0, 4, 5, 7));
        assert_ne!(a, position_roll(1, 1, 4, 5, 6));
    }

    #[test]
    fn climate_provider_is_deterministic() {
        let a = ClimateBiomeProvider::new(9);
        let b = ClimateBiomeProvider::new(9);
        for x in (-2000..2000).step_by(250) {
            assert_eq!(a.biome_at(x, -x).name, b.biome_at(x, -x).name);
        }
    }
}
