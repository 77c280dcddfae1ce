//! Deterministic procedural height function over infinite 2D space.

use noise::{NoiseFn, Perlin};

/// Base frequency scale applied to world coordinates before sampling.
const BASE_SCALE: f64 = 0.05;
/// Relative weight of each octave's contribution.
const OCTAVE_WEIGHTS: [f64; 3] = [0.8, 0.3, 0.1];
/// Frequency multiplier of each octave relative to the base scale.
const OCTAVE_FREQUENCIES: [f64; 3] = [0.2, 0.4, 1.0];
/// Global multiplier converting summed noise into world-space height.
const HEIGHT_SCALE: f64 = 8.0;
/// Fixed seed keeping heights reproducible for the life of the process.
const NOISE_SEED: u32 = 0x7411_5eed;

/// Multi-octave height function. Pure and side-effect-free: the same
/// `(x, z)` always yields the same height.
#[derive(Clone, Debug)]
pub struct HeightField {
    octaves: [Perlin; 3],
}

impl HeightField {
    /// Creates the height function with its fixed noise parameters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            octaves: [
                Perlin::new(NOISE_SEED),
                Perlin::new(NOISE_SEED.wrapping_add(1)),
                Perlin::new(NOISE_SEED.wrapping_add(2)),
            ],
        }
    }

    /// Samples the terrain height at the provided world coordinates.
    #[must_use]
    pub fn sample(&self, x: f64, z: f64) -> f64 {
        let mut height = 0.0;
        for (index, octave) in self.octaves.iter().enumerate() {
            let frequency = BASE_SCALE * OCTAVE_FREQUENCIES[index];
            height += OCTAVE_WEIGHTS[index] * octave.get([x * frequency, z * frequency]);
        }
        height * HEIGHT_SCALE
    }
}

impl Default for HeightField {
    fn default() -> Self {
        Self::new()
    }
}
