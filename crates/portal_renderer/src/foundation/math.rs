//! Math utilities and types
//!
//! Provides fundamental math types for the visibility and sorting algorithms:
//! nalgebra vector/matrix aliases plus the `Plane` type the portal clipper
//! and the BSP builder are built on.

pub use nalgebra::{Matrix3, Matrix4, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Plane defined by normal and distance from origin
///
/// Points with a positive signed distance lie on the side the normal points
/// toward. Frustum planes use the convention "positive = inside".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Normal vector (should be normalized)
    pub normal: Vec3,
    /// Distance from origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Create a new plane from normal and distance, normalizing the normal
    pub fn new(normal: Vec3, distance: f32) -> Self {
        let len = normal.magnitude();
        Self {
            normal: normal / len,
            distance: distance / len,
        }
    }

    /// Create a plane passing through three points (counter-clockwise winding)
    ///
    /// Returns `None` when the points are colinear and no stable normal can
    /// be derived.
    pub fn from_points(a: Vec3, b: Vec3, c: Vec3) -> Option<Self> {
        let normal = (b - a).cross(&(c - a));
        let len = normal.magnitude();
        if len <= f32::EPSILON {
            return None;
        }
        let normal = normal / len;
        Some(Self {
            normal,
            distance: -normal.dot(&a),
        })
    }

    /// Create the support plane of a polygon using Newell's method
    ///
    /// More robust than a single cross product for nearly-degenerate or
    /// slightly non-planar vertex rings.
    pub fn from_polygon(vertices: &[Vec3]) -> Option<Self> {
        if vertices.len() < 3 {
            return None;
        }
        let mut normal = Vec3::zeros();
        let mut centroid = Vec3::zeros();
        for (i, v) in vertices.iter().enumerate() {
            let w = vertices[(i + 1) % vertices.len()];
            normal.x += (v.y - w.y) * (v.z + w.z);
            normal.y += (v.z - w.z) * (v.x + w.x);
            normal.z += (v.x - w.x) * (v.y + w.y);
            centroid += v;
        }
        let len = normal.magnitude();
        if len <= f32::EPSILON {
            return None;
        }
        let normal = normal / len;
        centroid /= vertices.len() as f32;
        Some(Self {
            normal,
            distance: -normal.dot(&centroid),
        })
    }

    /// Calculate signed distance from plane to point
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.distance
    }

    /// The same plane with opposite orientation
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            distance: -self.distance,
        }
    }
}

/// Transform a position by a 4x4 matrix (w = 1)
pub fn transform_point(m: &Mat4, p: Vec3) -> Vec3 {
    let r = m * Vec4::new(p.x, p.y, p.z, 1.0);
    Vec3::new(r.x, r.y, r.z)
}

/// Transform a direction by the rotation part of a 4x4 matrix (w = 0)
pub fn transform_vector(m: &Mat4, v: Vec3) -> Vec3 {
    let r = m * Vec4::new(v.x, v.y, v.z, 0.0);
    Vec3::new(r.x, r.y, r.z)
}

/// Area of an arbitrary planar polygon given by its vertex ring
pub fn polygon_area(vertices: &[Vec3]) -> f32 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let mut sum = Vec3::zeros();
    let origin = vertices[0];
    for i in 1..vertices.len() - 1 {
        sum += (vertices[i] - origin).cross(&(vertices[i + 1] - origin));
    }
    sum.magnitude() * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_plane_from_points_orientation() {
        // CCW triangle in the XY plane seen from +Z: normal points toward +Z
        let plane = Plane::from_points(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        )
        .unwrap();

        assert_relative_eq!(plane.normal.z, 1.0, epsilon = 1e-6);
        assert_relative_eq!(plane.distance_to_point(Vec3::new(0.0, 0.0, 2.0)), 2.0, epsilon = 1e-6);
        assert!(plane.distance_to_point(Vec3::new(0.0, 0.0, -1.0)) < 0.0);
    }

    #[test]
    fn test_plane_from_degenerate_points() {
        let colinear = Plane::from_points(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
        );
        assert!(colinear.is_none());
    }

    #[test]
    fn test_plane_from_polygon_matches_triangle_plane() {
        let quad = [
            Vec3::new(-1.0, -1.0, 3.0),
            Vec3::new(1.0, -1.0, 3.0),
            Vec3::new(1.0, 1.0, 3.0),
            Vec3::new(-1.0, 1.0, 3.0),
        ];
        let plane = Plane::from_polygon(&quad).unwrap();
        assert_relative_eq!(plane.normal.z.abs(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(plane.distance_to_point(quad[0]), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_polygon_area_quad() {
        let quad = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(2.0, 3.0, 0.0),
            Vec3::new(0.0, 3.0, 0.0),
        ];
        assert_relative_eq!(polygon_area(&quad), 6.0, epsilon = 1e-5);
    }

    #[test]
    fn test_transform_point_translation() {
        let m = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let p = transform_point(&m, Vec3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(p.x, 2.0);
        assert_relative_eq!(p.y, 3.0);
        assert_relative_eq!(p.z, 4.0);

        // Directions are unaffected by translation
        let v = transform_vector(&m, Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(v.x, 1.0);
        assert_relative_eq!(v.y, 0.0);
    }
}
