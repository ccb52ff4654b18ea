//! Precomputed cube geometry and AO sampling tables
//!
//! Built once per world before the worker pool starts and shared read-only by
//! every job through an `Arc`.

use glam::{IVec3, Vec2, Vec3};

use crate::voxel::block::face_corners;
use crate::voxel::face::Face;

/// Per-face constants used by the cube mesher
#[derive(Clone, Debug)]
pub struct FaceTable {
    pub face: Face,
    pub normal: Vec3,
    /// Neighbor offset across the face
    pub offset: IVec3,
    /// Quad corners in cell-local space, counter-clockwise seen from outside
    pub corners: [Vec3; 4],
    /// Unit-square texture coordinates per corner
    pub uvs: [Vec2; 4],
    /// Per corner: (side A, side B, diagonal) sample offsets in the layer in
    /// front of the face, relative to the cell
    pub ao_samples: [[IVec3; 3]; 4],
}

impl FaceTable {
    fn new(face: Face) -> Self {
        let normal_axis = match face {
            Face::PosX | Face::NegX => 0,
            Face::PosY | Face::NegY => 1,
            Face::PosZ | Face::NegZ => 2,
        };
        let offset = face.offset();
        let corners = face_corners(face);

        let ao_samples = corners.map(|corner| {
            let mut tangents = [IVec3::ZERO; 2];
            let mut n = 0;
            for axis in 0..3 {
                if axis == normal_axis {
                    continue;
                }
                let mut t = IVec3::ZERO;
                t[axis] = if corner[axis] > 0.5 { 1 } else { -1 };
                tangents[n] = t;
                n += 1;
            }
            [
                offset + tangents[0],
                offset + tangents[1],
                offset + tangents[0] + tangents[1],
            ]
        });

        // u runs along corner 0 -> 1, v along corner 0 -> 3
        let u_axis = (corners[1] - corners[0]).abs();
        let v_axis = (corners[3] - corners[0]).abs();
        let uvs = corners.map(|c| {
            let local = c - corners[0];
            Vec2::new(local.dot(u_axis).abs(), local.dot(v_axis).abs())
        });

        Self {
            face,
            normal: face.normal(),
            offset,
            corners,
            uvs,
            ao_samples,
        }
    }
}

/// All cube face tables, indexed by [`Face::index`]
#[derive(Clone, Debug)]
pub struct MeshTables {
    faces: [FaceTable; 6],
}

impl MeshTables {
    pub fn new() -> Self {
        Self {
            faces: Face::ALL.map(FaceTable::new),
        }
    }

    pub fn face(&self, face: Face) -> &FaceTable {
        &self.faces[face.index()]
    }
}

impl Default for MeshTables {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corners_lie_on_face_plane() {
        let tables = MeshTables::new();
        for face in Face::ALL {
            let t = tables.face(face);
            let plane = if t.normal.max_element() > 0.0 { 1.0 } else { 0.0 };
            for c in t.corners {
                assert_eq!(c.dot(t.normal.abs()), plane, "{:?}", face);
            }
        }
    }

    #[test]
    fn test_winding_faces_outward() {
        let tables = MeshTables::new();
        for face in Face::ALL {
            let t = tables.face(face);
            let n = (t.corners[1] - t.corners[0]).cross(t.corners[2] - t.corners[0]);
            assert!(n.normalize().dot(t.normal) > 0.99, "{:?} winding", face);
        }
    }

    #[test]
    fn test_ao_samples_in_front_layer() {
        let tables = MeshTables::new();
        for face in Face::ALL {
            let t = tables.face(face);
            for samples in t.ao_samples {
                for s in samples {
                    let along_normal = s.as_vec3().dot(t.normal);
                    assert_eq!(along_normal, 1.0);
                }
                // diagonal is the sum of the two sides minus the shared normal step
                assert_eq!(samples[2], samples[0] + samples[1] - t.offset);
            }
        }
    }

    #[test]
    fn test_uvs_span_unit_square() {
        let tables = MeshTables::new();
        for face in Face::ALL {
            let t = tables.face(face);
            assert_eq!(t.uvs[0], Vec2::ZERO);
            assert_eq!(t.uvs[2], Vec2::ONE);
        }
    }
}
