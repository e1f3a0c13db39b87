//! View frustum planes and culling tests.
//!
//! Planes are stored as `Vec4(nx, ny, nz, d)` with normals pointing *into*
//! the frustum, so a point `p` is on the visible side of a plane when
//! `dot(n, p) + d >= 0`.
//!
//! # Plane Order
//!
//! ```text
//!   0: right   1: left   2: bottom   3: top   4: far   5: near
//! ```
//!
//! Extraction follows Gribb-Hartmann for OpenGL-style clip space, where the
//! clip-space depth range is `[-w, w]`.

use glam::{Mat4, Vec3, Vec4};

use super::bounds::{BoundingBox, Intersection, QueryShape};

#[derive(Debug, Clone, Copy, Default)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extracts normalized planes from a combined `projection * view` matrix.
    #[must_use]
    pub fn from_matrix(m: Mat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];

        let mut planes = [
            rows[3] - rows[0], // right
            rows[3] + rows[0], // left
            rows[3] + rows[1], // bottom
            rows[3] - rows[1], // top
            rows[3] - rows[2], // far
            rows[3] + rows[2], // near
        ];

        for plane in &mut planes {
            let length = plane.truncate().length();
            if length > 0.0 {
                *plane /= length;
            }
        }

        Self { planes }
    }

    /// Extracts planes from separate projection and view matrices.
    #[must_use]
    pub fn from_view_projection(projection: Mat4, view: Mat4) -> Self {
        Self::from_matrix(projection * view)
    }

    /// Builds a frustum from 16-float column-major uniform payloads.
    #[must_use]
    pub fn from_uniform_matrices(projection: &[f32; 16], view: &[f32; 16]) -> Self {
        Self::from_view_projection(
            Mat4::from_cols_array(projection),
            Mat4::from_cols_array(view),
        )
    }

    #[inline]
    #[must_use]
    pub fn planes(&self) -> &[Vec4; 6] {
        &self.planes
    }

    #[inline]
    fn signed_distance(plane: Vec4, point: Vec3) -> f32 {
        plane.truncate().dot(point) + plane.w
    }

    /// Returns `true` when the sphere is fully outside at least one plane.
    ///
    /// A sphere whose radius exactly reaches the plane is kept.
    #[must_use]
    pub fn cull_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .any(|&plane| radius < -Self::signed_distance(plane, center))
    }

    /// Same as [`cull_sphere`](Self::cull_sphere) but takes the squared radius,
    /// for callers that store `r²` to avoid square roots.
    #[must_use]
    pub fn cull_sphere_squared(&self, center: Vec3, radius_squared: f32) -> bool {
        self.planes.iter().any(|&plane| {
            let distance = Self::signed_distance(plane, center);
            distance < 0.0 && distance * distance > radius_squared
        })
    }

    /// Returns `true` when the box's support vertex along some plane normal is
    /// outside that plane.
    #[must_use]
    pub fn cull_box(&self, bounds: &BoundingBox) -> bool {
        let center = bounds.center();
        let extent = bounds.extent();
        self.planes.iter().any(|&plane| {
            let normal = plane.truncate();
            let support = Vec3::new(
                extent.x.copysign(normal.x),
                extent.y.copysign(normal.y),
                extent.z.copysign(normal.z),
            );
            (center + support).dot(normal) < -plane.w
        })
    }

    #[inline]
    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        !self.cull_sphere(center, radius)
    }

    #[inline]
    #[must_use]
    pub fn intersects_box(&self, bounds: &BoundingBox) -> bool {
        !self.cull_box(bounds)
    }
}

impl QueryShape for Frustum {
    /// Classifies the box through its bounding sphere.
    fn classify(&self, bounds: &BoundingBox) -> Intersection {
        let center = bounds.center();
        let radius = bounds.radius();
        let mut result = Intersection::In;
        for &plane in &self.planes {
            let distance = Self::signed_distance(plane, center);
            if distance < -radius {
                return Intersection::Out;
            }
            if distance < radius {
                result = Intersection::Intersect;
            }
        }
        result
    }
}
