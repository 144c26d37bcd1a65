//! Camera state consumed by the visibility walk
//!
//! Holds position, view/projection matrices, the raw camera frustum
//! extracted from the combined matrix, and the room-coherence hint the walk
//! uses to relocate the camera cheaply between frames.

use nalgebra::Perspective3;

use crate::foundation::math::{Mat4, Plane, Point3, Vec3};
use crate::render::frustum::Frustum;

/// Per-frame camera state
#[derive(Debug, Clone)]
pub struct Camera {
    /// Position in world space
    pub position: Vec3,
    /// Index of the room that contained the camera last frame (coherence
    /// hint; updated by the visibility walk)
    pub current_room: Option<usize>,

    view: Mat4,
    projection: Mat4,
    view_projection: Mat4,
    frustum: Frustum,
}

impl Camera {
    /// Create a perspective camera at the origin looking down -Z
    ///
    /// `fov_degrees` is the vertical field of view.
    pub fn perspective(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let projection = Perspective3::new(aspect, fov_degrees.to_radians(), near, far)
            .to_homogeneous();
        let mut camera = Self {
            position: Vec3::zeros(),
            current_room: None,
            view: Mat4::identity(),
            projection,
            view_projection: projection,
            frustum: Frustum::empty(),
        };
        camera.look_at(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0), Vec3::y());
        camera
    }

    /// Reposition and re-orient the camera, rebuilding matrices and frustum
    pub fn look_at(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        self.position = position;
        self.view = Mat4::look_at_rh(
            &Point3::from(position),
            &Point3::from(target),
            &up,
        );
        self.view_projection = self.projection * self.view;
        self.frustum = extract_frustum(&self.view_projection);
    }

    /// The combined view-projection matrix
    pub fn view_projection(&self) -> &Mat4 {
        &self.view_projection
    }

    /// The view matrix
    pub fn view(&self) -> &Mat4 {
        &self.view
    }

    /// The raw camera frustum (six planes, positive side = inside)
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// Camera right axis in world space
    pub fn right(&self) -> Vec3 {
        Vec3::new(self.view.m11, self.view.m12, self.view.m13)
    }

    /// Camera forward axis in world space
    pub fn forward(&self) -> Vec3 {
        -Vec3::new(self.view.m31, self.view.m32, self.view.m33)
    }

    /// Billboard right axis: the camera right projected into the horizontal
    /// plane, for sprites that stay upright
    pub fn billboard_right(&self) -> Vec3 {
        let right = self.right();
        let flat = Vec3::new(right.x, 0.0, right.z);
        let len = flat.magnitude();
        if len > 1e-6 {
            flat / len
        } else {
            // Looking straight up or down; any horizontal axis works
            Vec3::x()
        }
    }
}

/// Extract the six frustum planes from a view-projection matrix
/// (Gribb-Hartmann), normals pointing inward
fn extract_frustum(m: &Mat4) -> Frustum {
    let row = |i: usize| Vec3::new(m[(i, 0)], m[(i, 1)], m[(i, 2)]);
    let w = |i: usize| m[(i, 3)];

    let planes = vec![
        Plane::new(row(3) + row(0), w(3) + w(0)), // left
        Plane::new(row(3) - row(0), w(3) - w(0)), // right
        Plane::new(row(3) + row(1), w(3) + w(1)), // bottom
        Plane::new(row(3) - row(1), w(3) - w(1)), // top
        Plane::new(row(3) + row(2), w(3) + w(2)), // near
        Plane::new(row(3) - row(2), w(3) - w(2)), // far
    ];
    Frustum::from_planes(planes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn test_camera() -> Camera {
        let mut camera = Camera::perspective(60.0, 16.0 / 9.0, 0.1, 100.0);
        camera.look_at(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0), Vec3::y());
        camera
    }

    #[test]
    fn test_frustum_contains_points_in_front() {
        let camera = test_camera();
        let frustum = camera.frustum();

        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -5.0)));
        assert!(frustum.contains_point(Vec3::new(1.0, 0.5, -10.0)));
        // Behind the camera
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 5.0)));
        // Beyond the far plane
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, -200.0)));
        // Far off to the side
        assert!(!frustum.contains_point(Vec3::new(50.0, 0.0, -5.0)));
    }

    #[test]
    fn test_axes_follow_orientation() {
        let camera = test_camera();
        assert_relative_eq!(camera.forward().z, -1.0, epsilon = 1e-5);
        assert_relative_eq!(camera.right().x, 1.0, epsilon = 1e-5);

        let mut turned = test_camera();
        turned.look_at(Vec3::zeros(), Vec3::new(0.0, 0.0, 1.0), Vec3::y());
        assert_relative_eq!(turned.forward().z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_billboard_right_is_horizontal() {
        let mut camera = test_camera();
        camera.look_at(
            Vec3::new(0.0, 2.0, 0.0),
            Vec3::new(3.0, 0.0, -4.0),
            Vec3::y(),
        );
        let right = camera.billboard_right();
        assert_relative_eq!(right.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(right.magnitude(), 1.0, epsilon = 1e-5);
    }
}
