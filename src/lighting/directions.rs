//! Shared table of sample directions for probe rays

use glam::Vec3;

/// Deterministic PCG-style generator; same seed, same sequence on every platform
#[derive(Clone, Debug)]
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed.wrapping_add(1) }
    }

    /// Advance state and return next u32
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let mut h = (self.state >> 32) as u32;
        h = h.wrapping_mul(0x45d9f3b);
        h ^= h >> 16;
        h = h.wrapping_mul(0x45d9f3b);
        h ^= h >> 16;
        h
    }

    /// Uniform index in `0..bound` (bound > 0)
    pub fn below(&mut self, bound: usize) -> usize {
        (self.next_u32() as u64 * bound as u64 >> 32) as usize
    }
}

/// Unit vectors spread evenly over the sphere, in shuffled order so that any
/// consecutive run covers the sphere roughly uniformly.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleDirections {
    directions: Vec<Vec3>,
}

impl SampleDirections {
    /// Fibonacci sphere of `count` points, Fisher-Yates shuffled with `seed`
    pub fn generate(count: usize, seed: u64) -> Self {
        let golden_angle = std::f32::consts::PI * (3.0 - 5.0_f32.sqrt());
        let mut directions: Vec<Vec3> = (0..count)
            .map(|i| {
                let y = 1.0 - (i as f32 + 0.5) / count as f32 * 2.0;
                let r = (1.0 - y * y).max(0.0).sqrt();
                let theta = golden_angle * i as f32;
                Vec3::new(theta.cos() * r, y, theta.sin() * r)
            })
            .collect();

        let mut rng = SimpleRng::new(seed);
        for i in (1..directions.len()).rev() {
            let j = rng.below(i + 1);
            directions.swap(i, j);
        }
        Self { directions }
    }

    /// Direction at `index`, wrapping around the table
    #[inline]
    pub fn get(&self, index: usize) -> Vec3 {
        self.directions[index % self.directions.len()]
    }

    pub fn len(&self) -> usize {
        self.directions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }

    pub fn as_slice(&self) -> &[Vec3] {
        &self.directions
    }
}
