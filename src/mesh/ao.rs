//! Per-corner ambient occlusion for cube faces

use glam::IVec3;

use crate::mesh::snapshot::PaddedSnapshot;
use crate::mesh::tables::FaceTable;

/// Occlusion level of one corner: 0 = open, 3 = fully occluded
///
/// Two occluding sides close the corner completely, whatever the diagonal.
#[inline]
pub fn corner_occlusion(side_a: bool, side_b: bool, diagonal: bool) -> u8 {
    if side_a && side_b {
        3
    } else {
        side_a as u8 + side_b as u8 + diagonal as u8
    }
}

/// Occlusion for the four corners of one face of the cell at `cell`
pub fn face_occlusion(snapshot: &PaddedSnapshot, cell: IVec3, table: &FaceTable) -> [u8; 4] {
    table.ao_samples.map(|[a, b, d]| {
        corner_occlusion(
            snapshot.is_solid(cell + a),
            snapshot.is_solid(cell + b),
            snapshot.is_solid(cell + d),
        )
    })
}

/// Whether the quad should be split along v1-v3 instead of v0-v2
///
/// The split diagonal joins the pair of opposite corners with less combined
/// occlusion, so the shading gradient runs along the darker diagonal.
#[inline]
pub fn should_flip(occlusion: [u8; 4]) -> bool {
    occlusion[0] as u16 + occlusion[2] as u16 > occlusion[1] as u16 + occlusion[3] as u16
}

/// Brightness multiplier for an occlusion level
#[inline]
pub fn brightness(occlusion: u8, strength: f32) -> f32 {
    1.0 - strength * (occlusion.min(3) as f32 / 3.0)
}

/// Quad triangle indices relative to the first vertex
#[inline]
pub fn quad_indices(flip: bool) -> [u32; 6] {
    if flip {
        [1, 2, 3, 1, 3, 0]
    } else {
        [0, 1, 2, 0, 2, 3]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::tables::MeshTables;
    use crate::voxel::cell::VoxelCell;
    use crate::voxel::face::Face;
    use glam::UVec3;

    #[test]
    fn test_corner_occlusion_levels() {
        assert_eq!(corner_occlusion(false, false, false), 0);
        assert_eq!(corner_occlusion(false, false, true), 1);
        assert_eq!(corner_occlusion(true, false, true), 2);
        assert_eq!(corner_occlusion(true, true, false), 3);
    }

    #[test]
    fn test_flip_rule() {
        assert!(!should_flip([0, 0, 0, 0]));
        // one occluded corner on the default diagonal
        assert!(should_flip([1, 0, 0, 0]));
        assert!(should_flip([0, 0, 2, 0]));
        // occluded corner off the default diagonal keeps it
        assert!(!should_flip([0, 1, 0, 0]));
        // opposite corners both occluded
        assert!(should_flip([1, 0, 1, 0]));
        assert!(!should_flip([0, 1, 0, 1]));
    }

    #[test]
    fn test_quad_indices_cover_both_triangles() {
        for flip in [false, true] {
            let idx = quad_indices(flip);
            let mut seen = [false; 4];
            for i in idx {
                seen[i as usize] = true;
            }
            assert!(seen.iter().all(|s| *s));
        }
    }

    #[test]
    fn test_face_occlusion_against_wall() {
        // floor cell at origin with a wall block at (-1, 1, 0): the +Y face's
        // corners on the -X edge see one occluding side each
        let tables = MeshTables::new();
        let mut snap = PaddedSnapshot::new(UVec3::new(2, 2, 2), IVec3::ZERO);
        snap.set(IVec3::new(0, 0, 0), VoxelCell::solid(1));
        snap.set(IVec3::new(-1, 1, 0), VoxelCell::solid(1));
        let table = tables.face(Face::PosY);
        let occ = face_occlusion(&snap, IVec3::ZERO, table);
        for (i, corner) in table.corners.iter().enumerate() {
            if corner.x < 0.5 {
                assert!(occ[i] >= 1, "corner {} should be occluded", i);
            } else {
                assert_eq!(occ[i], 0, "corner {} should be open", i);
            }
        }
    }

    #[test]
    fn test_brightness_range() {
        assert_eq!(brightness(0, 0.8), 1.0);
        assert!((brightness(3, 0.8) - 0.2).abs() < 1e-6);
    }
}
