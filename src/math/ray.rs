//! Ray type used by shadow tests

use crate::core::types::Vec3;
use super::traversal::VoxelTraversal;

/// A ray defined by origin and unit direction
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Create a new ray (direction should be normalized)
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Ray from `from` towards `to`, with the distance between them.
    /// `None` when the points coincide.
    pub fn between(from: Vec3, to: Vec3) -> Option<(Self, f32)> {
        let delta = to - from;
        let distance = delta.length();
        if distance <= f32::EPSILON {
            return None;
        }
        Some((Self::new(from, delta / distance), distance))
    }

    /// Get point along ray at parameter t
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Cells crossed within `max_distance`, starting with the origin cell
    pub fn cells(&self, max_distance: f32) -> VoxelTraversal {
        VoxelTraversal::new(self, max_distance)
    }
}
