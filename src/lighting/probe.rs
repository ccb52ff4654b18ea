//! A single progressive radiosity probe

use glam::Vec3;

use crate::core::Color;
use crate::lighting::config::RadiosityConfig;
use crate::lighting::directions::SampleDirections;
use crate::lighting::query::{IncidentLight, LightQuery};

/// Fixed sample point accumulating incident light over many updates.
///
/// Direct and indirect samples live in two ring buffers of `max_samples`
/// entries; once full, each new sample overwrites the oldest.
#[derive(Clone, Debug)]
pub struct RadiosityProbe {
    pub position: Vec3,
    pub enabled: bool,
    max_samples: usize,
    direct: Vec<Color>,
    indirect: Vec<Color>,
    write_index: usize,
    next_direction: usize,
    average_direct: Color,
    average_indirect: Color,
}

impl RadiosityProbe {
    pub fn new(position: Vec3, max_samples: usize) -> Self {
        Self {
            position,
            enabled: true,
            max_samples: max_samples.max(1),
            direct: Vec::new(),
            indirect: Vec::new(),
            write_index: 0,
            next_direction: 0,
            average_direct: Color::ZERO,
            average_indirect: Color::ZERO,
        }
    }

    /// A probe that never samples
    pub fn disabled(position: Vec3, max_samples: usize) -> Self {
        Self { enabled: false, ..Self::new(position, max_samples) }
    }

    /// Number of stored samples (at most `max_samples`)
    pub fn sample_count(&self) -> usize {
        self.direct.len()
    }

    pub fn average_direct(&self) -> Color {
        self.average_direct
    }

    /// Raw indirect average; use [`indirect_clamped`](Self::indirect_clamped) for shading
    pub fn average_indirect(&self) -> Color {
        self.average_indirect
    }

    pub fn indirect_clamped(&self, ceiling: f32) -> Color {
        self.average_indirect.min(Color::splat(ceiling))
    }

    /// Drop every sample and restart the direction sequence
    pub fn reset(&mut self, position: Vec3, enabled: bool) {
        self.position = position;
        self.enabled = enabled;
        self.direct.clear();
        self.indirect.clear();
        self.write_index = 0;
        self.next_direction = 0;
        self.average_direct = Color::ZERO;
        self.average_indirect = Color::ZERO;
    }

    fn push(&mut self, sample: IncidentLight) {
        if self.direct.len() < self.max_samples {
            self.direct.push(sample.direct);
            self.indirect.push(sample.indirect);
        } else {
            self.direct[self.write_index] = sample.direct;
            self.indirect[self.write_index] = sample.indirect;
        }
        self.write_index = (self.write_index + 1) % self.max_samples;
    }

    /// Cast the next batch of rays and return how far the estimate moved
    /// (largest per-channel change of direct + indirect).
    pub fn update(&mut self, query: &dyn LightQuery, directions: &SampleDirections, config: &RadiosityConfig) -> f32 {
        if !self.enabled || directions.is_empty() {
            return 0.0;
        }
        let before = self.average_direct + self.average_indirect;

        for _ in 0..config.rays_per_update {
            let direction = directions.get(self.next_direction);
            self.next_direction = (self.next_direction + 1) % directions.len();
            let sample = query.sample_incident_light(self.position, direction, config.max_distance);
            self.push(sample);
        }

        let n = self.direct.len().max(1) as f32;
        self.average_direct = self.direct.iter().copied().sum::<Color>() / n;
        self.average_indirect = self.indirect.iter().copied().sum::<Color>() / n;

        let after = self.average_direct + self.average_indirect;
        (after - before).abs().max_element()
    }
}
