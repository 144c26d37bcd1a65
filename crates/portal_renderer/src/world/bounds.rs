//! Bounding volumes for visibility tests
//!
//! Rooms carry world-space AABBs; statics and entities carry OBBs derived
//! from a local AABB and a rigid transform. The frustum predicates in
//! `render::frustum` consume both.

use crate::foundation::math::{transform_point, Mat4, Vec3};

/// Axis-Aligned Bounding Box
#[derive(Debug, Clone, Copy)]
pub struct Aabb {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Aabb {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Check if this AABB contains a point, with each face pushed outward
    /// by `epsilon` world units
    pub fn contains_point_eps(&self, point: Vec3, epsilon: f32) -> bool {
        point.x >= self.min.x - epsilon
            && point.x <= self.max.x + epsilon
            && point.y >= self.min.y - epsilon
            && point.y <= self.max.y + epsilon
            && point.z >= self.min.z - epsilon
            && point.z <= self.max.z + epsilon
    }

    /// Check if this AABB intersects another AABB
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
}

/// Oriented Bounding Box
///
/// A local AABB carried through a rigid transform. Stores the rotated frame
/// for separating-axis tests and the eight world-space corners for plane
/// clipping tests.
#[derive(Debug, Clone, Copy)]
pub struct Obb {
    /// World-space center
    pub center: Vec3,
    /// The three local axes in world space (unit length)
    pub axes: [Vec3; 3],
    /// Half-size along each local axis
    pub extents: Vec3,
    /// World-space corners
    pub corners: [Vec3; 8],
}

impl Obb {
    /// Build an OBB from a local-space AABB and a rigid transform
    pub fn from_aabb_transform(aabb: &Aabb, transform: &Mat4) -> Self {
        let center = transform_point(transform, aabb.center());
        let axes = [
            Vec3::new(transform.m11, transform.m21, transform.m31),
            Vec3::new(transform.m12, transform.m22, transform.m32),
            Vec3::new(transform.m13, transform.m23, transform.m33),
        ];
        let extents = aabb.extents();

        let mut corners = [Vec3::zeros(); 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let sx = if i & 1 != 0 { 1.0 } else { -1.0 };
            let sy = if i & 2 != 0 { 1.0 } else { -1.0 };
            let sz = if i & 4 != 0 { 1.0 } else { -1.0 };
            *corner = center
                + axes[0] * (extents.x * sx)
                + axes[1] * (extents.y * sy)
                + axes[2] * (extents.z * sz);
        }

        Self {
            center,
            axes,
            extents,
            corners,
        }
    }

    /// Projected radius of this box onto a direction
    fn projected_radius(&self, dir: &Vec3) -> f32 {
        self.extents.x * self.axes[0].dot(dir).abs()
            + self.extents.y * self.axes[1].dot(dir).abs()
            + self.extents.z * self.axes[2].dot(dir).abs()
    }

    /// Separating-axis intersection test against another OBB
    ///
    /// 15 candidate axes: 3 + 3 face normals plus the 9 edge cross products.
    pub fn intersects(&self, other: &Obb) -> bool {
        let t = other.center - self.center;

        let try_axis = |axis: Vec3| -> bool {
            let len_sq = axis.magnitude_squared();
            if len_sq < 1e-6 {
                // Near-parallel edges; this axis cannot separate
                return true;
            }
            let axis = axis / len_sq.sqrt();
            let dist = t.dot(&axis).abs();
            dist <= self.projected_radius(&axis) + other.projected_radius(&axis)
        };

        for axis in &self.axes {
            if !try_axis(*axis) {
                return false;
            }
        }
        for axis in &other.axes {
            if !try_axis(*axis) {
                return false;
            }
        }
        for a in &self.axes {
            for b in &other.axes {
                if !try_axis(a.cross(b)) {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4;

    #[test]
    fn test_aabb_contains_point() {
        let aabb = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));

        assert!(aabb.contains_point(Vec3::zeros()));
        assert!(aabb.contains_point(Vec3::new(0.5, 0.5, 0.5)));
        assert!(!aabb.contains_point(Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_aabb_contains_point_eps() {
        let aabb = Aabb::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0));

        assert!(!aabb.contains_point(Vec3::new(1.05, 0.5, 0.5)));
        assert!(aabb.contains_point_eps(Vec3::new(1.05, 0.5, 0.5), 0.1));
        assert!(!aabb.contains_point_eps(Vec3::new(1.5, 0.5, 0.5), 0.1));
    }

    #[test]
    fn test_aabb_intersects() {
        let aabb1 = Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 2.0, 2.0));
        let aabb2 = Aabb::new(Vec3::new(1.0, 1.0, 1.0), Vec3::new(3.0, 3.0, 3.0));
        let aabb3 = Aabb::new(Vec3::new(5.0, 5.0, 5.0), Vec3::new(7.0, 7.0, 7.0));

        assert!(aabb1.intersects(&aabb2));
        assert!(!aabb1.intersects(&aabb3));
    }

    #[test]
    fn test_obb_identity_matches_aabb() {
        let aabb = Aabb::new(Vec3::new(-1.0, -2.0, -3.0), Vec3::new(1.0, 2.0, 3.0));
        let obb = Obb::from_aabb_transform(&aabb, &Mat4::identity());

        assert!((obb.center - aabb.center()).magnitude() < 1e-6);
        for corner in &obb.corners {
            assert!(aabb.contains_point_eps(*corner, 1e-5));
        }
    }

    #[test]
    fn test_obb_obb_separated_and_overlapping() {
        let unit = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let a = Obb::from_aabb_transform(&unit, &Mat4::identity());
        let b = Obb::from_aabb_transform(&unit, &Mat4::new_translation(&Vec3::new(1.5, 0.0, 0.0)));
        let c = Obb::from_aabb_transform(&unit, &Mat4::new_translation(&Vec3::new(5.0, 0.0, 0.0)));

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_obb_rotated_intersection() {
        let unit = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let a = Obb::from_aabb_transform(&unit, &Mat4::identity());

        // A box rotated 45 degrees around Z whose corner pokes into `a`
        let rot = Mat4::new_translation(&Vec3::new(2.2, 0.0, 0.0))
            * Mat4::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_4);
        let b = Obb::from_aabb_transform(&unit, &rot);
        assert!(a.intersects(&b));

        // Same rotation but pushed well clear
        let rot_far = Mat4::new_translation(&Vec3::new(4.0, 0.0, 0.0))
            * Mat4::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_4);
        let c = Obb::from_aabb_transform(&unit, &rot_far);
        assert!(!a.intersects(&c));
    }
}
