use std::f32::consts::PI;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// GPU ready buffers for a UV sphere.
///
/// Positions and normals are flat, tightly packed arrays of three floats per
/// vertex with matching vertex order; indices reference vertex slots three at
/// a time, one triangle each.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SphereMesh {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub indices: Vec<u32>,
}

impl SphereMesh {
    /// Number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Number of triangles described by the index buffer.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Returns true when every index references an existing vertex and the
    /// position and normal arrays line up.
    pub fn is_consistent(&self) -> bool {
        let vertex_count = self.vertex_count() as u32;
        self.positions.len() == self.normals.len()
            && self.positions.len() % 3 == 0
            && self.indices.len() % 3 == 0
            && self.indices.iter().all(|&index| index < vertex_count)
    }
}

/// Rejected sphere parameters. Raised before any geometry is produced.
#[derive(Debug, Error, PartialEq)]
pub enum MeshParamError {
    #[error("sphere radius must be positive and finite, got {0}")]
    InvalidRadius(f32),
    #[error("band counts must be at least 1, got {latitude}x{longitude}")]
    InvalidBands { latitude: u32, longitude: u32 },
    #[error("a {latitude}x{longitude} grid has more vertices than a 32-bit index can address")]
    TooManyVertices { latitude: u32, longitude: u32 },
}

/// Tessellates a UV sphere from a closed latitude/longitude grid.
///
/// The grid runs both indices inclusively, duplicating the seam column so the
/// index pattern stays regular. The polar angle `theta` sweeps 0 (north pole)
/// to pi, the azimuthal angle `phi` sweeps a full turn. Each grid vertex is
/// the unit direction `(cos phi * sin theta, cos theta, sin phi * sin theta)`;
/// the normal is that direction and the position is `radius` times it.
///
/// Produces `(lat + 1) * (lon + 1)` vertices and `2 * lat * lon` triangles.
/// The triangles touching a pole are degenerate (the pole row collapses to a
/// single point) which is expected and harmless.
pub fn generate_sphere(
    radius: f32,
    latitude_bands: u32,
    longitude_bands: u32,
) -> Result<SphereMesh, MeshParamError> {
    if !(radius > 0.0 && radius.is_finite()) {
        return Err(MeshParamError::InvalidRadius(radius));
    }
    if latitude_bands == 0 || longitude_bands == 0 {
        return Err(MeshParamError::InvalidBands {
            latitude: latitude_bands,
            longitude: longitude_bands,
        });
    }

    // Indices are u32, so the grid must stay addressable by one.
    let vertex_count = (latitude_bands as u64 + 1) * (longitude_bands as u64 + 1);
    if vertex_count > u32::MAX as u64 {
        return Err(MeshParamError::TooManyVertices {
            latitude: latitude_bands,
            longitude: longitude_bands,
        });
    }
    let vertex_count = vertex_count as usize;
    let mut positions = Vec::with_capacity(vertex_count * 3);
    let mut normals = Vec::with_capacity(vertex_count * 3);
    let index_count = latitude_bands as u64 * longitude_bands as u64 * 6;
    let mut indices = Vec::with_capacity(index_count as usize);

    for lat in 0..=latitude_bands {
        let theta = lat as f32 * PI / latitude_bands as f32;
        let sin_theta = theta.sin();
        let cos_theta = theta.cos();

        for lon in 0..=longitude_bands {
            let phi = lon as f32 * 2.0 * PI / longitude_bands as f32;

            let x = phi.cos() * sin_theta;
            let y = cos_theta;
            let z = phi.sin() * sin_theta;

            normals.extend_from_slice(&[x, y, z]);
            positions.extend_from_slice(&[radius * x, radius * y, radius * z]);

            if lat < latitude_bands && lon < longitude_bands {
                let first = lat * (longitude_bands + 1) + lon;
                let second = first + longitude_bands + 1;

                indices.extend_from_slice(&[first, second, first + 1]);
                indices.extend_from_slice(&[second, second + 1, first + 1]);
            }
        }
    }

    let mesh = SphereMesh {
        positions,
        normals,
        indices,
    };
    debug_assert!(mesh.is_consistent());
    debug_assert_eq!(mesh.vertex_count(), vertex_count);
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use glam::Vec3;

    fn vertex(mesh: &SphereMesh, index: usize) -> (Vec3, Vec3) {
        let position = Vec3::from_slice(&mesh.positions[index * 3..index * 3 + 3]);
        let normal = Vec3::from_slice(&mesh.normals[index * 3..index * 3 + 3]);
        (position, normal)
    }

    #[test]
    fn counts_match_band_formula() {
        for (lat, lon) in [(1, 1), (2, 3), (7, 5), (30, 30)] {
            let mesh = generate_sphere(1.0, lat, lon).unwrap();
            assert_eq!(mesh.vertex_count() as u32, (lat + 1) * (lon + 1));
            assert_eq!(mesh.indices.len() as u32, 6 * lat * lon);
            assert!(mesh.is_consistent());
        }
    }

    #[test]
    fn normals_are_unit_and_positions_scale_with_radius() {
        let radius = 2.5;
        let mesh = generate_sphere(radius, 8, 12).unwrap();
        for index in 0..mesh.vertex_count() {
            let (position, normal) = vertex(&mesh, index);
            assert_abs_diff_eq!(normal.length(), 1.0, epsilon = 1e-5);
            assert_abs_diff_eq!(position.x, radius * normal.x, epsilon = 1e-6);
            assert_abs_diff_eq!(position.y, radius * normal.y, epsilon = 1e-6);
            assert_abs_diff_eq!(position.z, radius * normal.z, epsilon = 1e-6);
        }
    }

    #[test]
    fn pole_rows_collapse_to_single_points() {
        let (lat, lon) = (4, 6);
        let mesh = generate_sphere(1.0, lat, lon).unwrap();
        let (north, _) = vertex(&mesh, 0);
        let south_row = (lat * (lon + 1)) as usize;
        let (south, _) = vertex(&mesh, south_row);
        for column in 0..=lon as usize {
            let (position, _) = vertex(&mesh, column);
            assert_abs_diff_eq!(position.distance(north), 0.0, epsilon = 1e-6);
            let (position, _) = vertex(&mesh, south_row + column);
            assert_abs_diff_eq!(position.distance(south), 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn two_band_sphere_matches_expected_layout() {
        let mesh = generate_sphere(1.0, 2, 2).unwrap();
        assert_eq!(mesh.vertex_count(), 9);
        assert_eq!(mesh.triangle_count(), 8);
        assert_eq!(mesh.indices.len(), 24);
        let (position, normal) = vertex(&mesh, 0);
        assert_abs_diff_eq!(position.distance(Vec3::Y), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(normal.distance(Vec3::Y), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert_eq!(
            generate_sphere(0.0, 4, 4),
            Err(MeshParamError::InvalidRadius(0.0))
        );
        assert_eq!(
            generate_sphere(-1.0, 4, 4),
            Err(MeshParamError::InvalidRadius(-1.0))
        );
        assert!(generate_sphere(f32::NAN, 4, 4).is_err());
        assert_eq!(
            generate_sphere(1.0, 0, 4),
            Err(MeshParamError::InvalidBands {
                latitude: 0,
                longitude: 4
            })
        );
        assert_eq!(
            generate_sphere(1.0, 4, 0),
            Err(MeshParamError::InvalidBands {
                latitude: 4,
                longitude: 0
            })
        );
    }

    #[test]
    fn rejects_grids_too_large_for_u32_indices() {
        assert_eq!(
            generate_sphere(1.0, u16::MAX as u32, u16::MAX as u32),
            Err(MeshParamError::TooManyVertices {
                latitude: u16::MAX as u32,
                longitude: u16::MAX as u32
            })
        );
        assert_eq!(
            generate_sphere(1.0, u32::MAX, 1),
            Err(MeshParamError::TooManyVertices {
                latitude: u32::MAX,
                longitude: 1
            })
        );
    }
}
