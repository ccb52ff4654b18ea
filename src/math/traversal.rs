//! Grid traversal along a ray (Amanatides & Woo DDA)

use crate::core::types::{IVec3, Vec3};
use super::ray::Ray;

/// Iterator over the unit cells crossed by a ray, in hit order
///
/// The first item is the cell containing the ray origin. Iteration stops once
/// the next cell boundary lies beyond `max_distance`.
#[derive(Clone, Debug)]
pub struct VoxelTraversal {
    cell: IVec3,
    step: IVec3,
    t_max: Vec3,
    t_delta: Vec3,
    max_distance: f32,
    started: bool,
}

impl VoxelTraversal {
    /// Start a traversal along `ray` (direction should be normalized)
    pub fn new(ray: &Ray, max_distance: f32) -> Self {
        let cell = ray.origin.floor().as_ivec3();
        let mut step = IVec3::ZERO;
        let mut t_max = Vec3::splat(f32::INFINITY);
        let mut t_delta = Vec3::splat(f32::INFINITY);

        for axis in 0..3 {
            let d = ray.direction[axis];
            let o = ray.origin[axis];
            let c = cell[axis] as f32;
            if d > 0.0 {
                step[axis] = 1;
                t_max[axis] = (c + 1.0 - o) / d;
                t_delta[axis] = 1.0 / d;
            } else if d < 0.0 {
                step[axis] = -1;
                t_max[axis] = (c - o) / d;
                t_delta[axis] = -1.0 / d;
            }
        }

        Self {
            cell,
            step,
            t_max,
            t_delta,
            max_distance,
            started: false,
        }
    }
}

impl Iterator for VoxelTraversal {
    type Item = IVec3;

    fn next(&mut self) -> Option<IVec3> {
        if !self.started {
            self.started = true;
            return Some(self.cell);
        }

        let axis = if self.t_max.x < self.t_max.y {
            if self.t_max.x < self.t_max.z { 0 } else { 2 }
        } else if self.t_max.y < self.t_max.z {
            1
        } else {
            2
        };

        if self.t_max[axis] > self.max_distance {
            return None;
        }

        self.cell[axis] += self.step[axis];
        self.t_max[axis] += self.t_delta[axis];
        Some(self.cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_aligned_walk() {
        let ray = Ray::new(Vec3::new(0.5, 0.5, 0.5), Vec3::X);
        let cells: Vec<IVec3> = VoxelTraversal::new(&ray, 3.0).collect();
        assert_eq!(
            cells,
            vec![
                IVec3::new(0, 0, 0),
                IVec3::new(1, 0, 0),
                IVec3::new(2, 0, 0),
                IVec3::new(3, 0, 0),
            ]
        );
    }

    #[test]
    fn test_negative_direction() {
        let ray = Ray::new(Vec3::new(0.5, 0.5, 0.5), -Vec3::Y);
        let cells: Vec<IVec3> = VoxelTraversal::new(&ray, 1.9).collect();
        assert_eq!(cells, vec![IVec3::new(0, 0, 0), IVec3::new(0, -1, 0), IVec3::new(0, -2, 0)]);
    }

    #[test]
    fn test_diagonal_cells_are_face_connected() {
        let ray = Ray::new(Vec3::new(0.2, 0.3, 0.1), Vec3::new(1.0, 0.7, 0.4).normalize());
        let cells: Vec<IVec3> = VoxelTraversal::new(&ray, 10.0).collect();
        for pair in cells.windows(2) {
            let d = (pair[1] - pair[0]).abs();
            assert_eq!(d.x + d.y + d.z, 1, "consecutive cells must share a face");
        }
    }
}
