use glam::{Mat3, Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Floats per interleaved vertex: `position.xyz` followed by `normal.xyz`.
pub const VERTEX_STRIDE: usize = 6;

const UNIT_CUBE_VERTICES: &[f32] = &[
    // positions        // normals
    -0.5, -0.5, 0.5, 0.0, 0.0, 1.0, 0.5, -0.5, 0.5, 0.0, 0.0, 1.0, 0.5, 0.5, 0.5, 0.0, 0.0, 1.0,
    -0.5, 0.5, 0.5, 0.0, 0.0, 1.0, -0.5, -0.5, -0.5, 0.0, 0.0, -1.0, 0.5, -0.5, -0.5, 0.0, 0.0,
    -1.0, 0.5, 0.5, -0.5, 0.0, 0.0, -1.0, -0.5, 0.5, -0.5, 0.0, 0.0, -1.0, -0.5, -0.5, -0.5, -1.0,
    0.0, 0.0, -0.5, -0.5, 0.5, -1.0, 0.0, 0.0, -0.5, 0.5, 0.5, -1.0, 0.0, 0.0, -0.5, 0.5, -0.5,
    -1.0, 0.0, 0.0, 0.5, -0.5, -0.5, 1.0, 0.0, 0.0, 0.5, -0.5, 0.5, 1.0, 0.0, 0.0, 0.5, 0.5, 0.5,
    1.0, 0.0, 0.0, 0.5, 0.5, -0.5, 1.0, 0.0, 0.0, -0.5, -0.5, -0.5, 0.0, -1.0, 0.0, 0.5, -0.5,
    -0.5, 0.0, -1.0, 0.0, 0.5, -0.5, 0.5, 0.0, -1.0, 0.0, -0.5, -0.5, 0.5, 0.0, -1.0, 0.0, -0.5,
    0.5, -0.5, 0.0, 1.0, 0.0, 0.5, 0.5, -0.5, 0.0, 1.0, 0.0, 0.5, 0.5, 0.5, 0.0, 1.0, 0.0, -0.5,
    0.5, 0.5, 0.0, 1.0, 0.0,
];

const UNIT_CUBE_INDICES: &[u32] = &[
    0, 1, 2, 0, 2, 3, // front
    4, 6, 5, 4, 7, 6, // back
    8, 9, 10, 8, 10, 11, // left
    12, 14, 13, 12, 15, 14, // right
    16, 18, 17, 16, 19, 18, // bottom
    20, 21, 22, 20, 22, 23, // top
];

/// Indexed triangle mesh with interleaved position/normal vertices.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Axis-aligned cube of side 1 centred on the origin.
    pub fn cube() -> Self {
        Self {
            vertices: UNIT_CUBE_VERTICES.to_vec(),
            indices: UNIT_CUBE_INDICES.to_vec(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn position(&self, index: u32) -> Option<Vec3> {
        let start = index as usize * VERTEX_STRIDE;
        let slice = self.vertices.get(start..start + 3)?;
        Some(Vec3::from_slice(slice))
    }

    /// Iterates triangles as position triples, skipping out-of-range indices.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(|tri| {
            Some([
                self.position(tri[0])?,
                self.position(tri[1])?,
                self.position(tri[2])?,
            ])
        })
    }

    /// Bakes `transform` into positions and normals.
    pub fn transformed(&self, transform: Mat4) -> Self {
        let normal_matrix = Mat3::from_mat4(transform).inverse().transpose();
        let vertices = self
            .vertices
            .chunks_exact(VERTEX_STRIDE)
            .flat_map(|vertex| {
                let position = transform.transform_point3(Vec3::from_slice(&vertex[..3]));
                let normal = (normal_matrix * Vec3::from_slice(&vertex[3..])).normalize_or_zero();
                [
                    position.x, position.y, position.z, normal.x, normal.y, normal.z,
                ]
            })
            .collect();
        Self {
            vertices,
            indices: self.indices.clone(),
        }
    }
}
