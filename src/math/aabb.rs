//! Axis-aligned bounding box

use crate::core::types::{IVec3, Vec3};

/// Axis-aligned bounding box defined by min and max corners
///
/// Also used as the collision volume type handed to physics.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create AABB from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create AABB from center and half-extents
    pub fn from_center_half_extent(center: Vec3, half_extent: Vec3) -> Self {
        Self {
            min: center - half_extent,
            max: center + half_extent,
        }
    }

    /// Create AABB covering the integer cell range `[min_cell, max_cell)`
    pub fn from_cells(min_cell: IVec3, max_cell: IVec3) -> Self {
        Self {
            min: min_cell.as_vec3(),
            max: max_cell.as_vec3(),
        }
    }

    /// Get size (max - min)
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Volume in cubic units
    pub fn volume(&self) -> f32 {
        let s = self.size();
        s.x * s.y * s.z
    }

    /// Translate by an offset
    pub fn translated(&self, offset: Vec3) -> Aabb {
        Aabb {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Check if the unit cell with minimum corner `cell` lies inside
    pub fn contains_cell(&self, cell: IVec3) -> bool {
        let center = cell.as_vec3() + Vec3::splat(0.5);
        center.x > self.min.x && center.x < self.max.x &&
        center.y > self.min.y && center.y < self.max.y &&
        center.z > self.min.z && center.z < self.max.z
    }

    /// Check if two AABBs intersect (touching faces count)
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Check if two AABBs share interior volume (touching faces do not count)
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x && self.max.x > other.min.x &&
        self.min.y < other.max.y && self.max.y > other.min.y &&
        self.min.z < other.max.z && self.max.z > other.min.z
    }

    /// Expand AABB to include point
    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_accessors() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(aabb.size(), Vec3::ONE);
        assert_eq!(aabb.volume(), 1.0);
    }

    #[test]
    fn test_contains_cell() {
        let aabb = Aabb::from_cells(IVec3::new(0, 0, 0), IVec3::new(2, 1, 1));
        assert!(aabb.contains_cell(IVec3::new(0, 0, 0)));
        assert!(aabb.contains_cell(IVec3::new(1, 0, 0)));
        assert!(!aabb.contains_cell(IVec3::new(2, 0, 0)));
        assert!(!aabb.contains_cell(IVec3::new(0, 1, 0)));
    }

    #[test]
    fn test_intersects_vs_overlaps() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let touching = Aabb::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        let b = Aabb::new(Vec3::splat(0.5), Vec3::splat(1.5));
        let c = Aabb::new(Vec3::splat(2.0), Vec3::splat(3.0));
        assert!(a.intersects(&b));
        assert!(a.overlaps(&b));
        assert!(a.intersects(&touching));
        assert!(!a.overlaps(&touching));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_expand() {
        let mut aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        aabb.expand(Vec3::new(-1.0, 0.5, 3.0));
        assert_eq!(aabb, Aabb::new(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 3.0)));
    }

    #[test]
    fn test_translated() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE).translated(Vec3::new(16.0, 0.0, -16.0));
        assert_eq!(aabb.min, Vec3::new(16.0, 0.0, -16.0));
        assert_eq!(aabb.max, Vec3::new(17.0, 1.0, -15.0));
    }
}
