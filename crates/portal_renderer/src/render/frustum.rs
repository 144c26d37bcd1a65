//! Convex clip volumes and the per-frame frustum pool
//!
//! A frustum here is any convex plane set: the raw camera frustum (six
//! planes, no boundary polygon) or a portal-derived volume (one plane per
//! clipped portal edge through the camera, plus the portal plane). Portal
//! frustums live one frame in the [`FrustumPool`], a bump arena reclaimed
//! wholesale at frame start; [`FrustumId`]s from previous frames stop
//! resolving after a reset.

use crate::foundation::math::{Plane, Vec3};
use crate::render::camera::Camera;
use crate::render::{RenderError, RenderResult};
use crate::world::{Aabb, Obb, Portal};

/// Vertices closer than this to a clip plane count as on it
const CLIP_EPSILON: f32 = 1e-5;

/// A convex clip volume
#[derive(Debug, Clone)]
pub struct Frustum {
    /// Bounding planes; positive side = inside
    pub planes: Vec<Plane>,
    /// Boundary polygon of the generating portal after clipping, used for
    /// stencil silhouettes (empty for the camera frustum)
    pub vertices: Vec<Vec3>,
    /// Portal-path fan-in: number of portal hops from the camera
    pub parents_count: u32,
}

impl Frustum {
    /// A frustum with no planes (contains everything)
    pub fn empty() -> Self {
        Self {
            planes: Vec::new(),
            vertices: Vec::new(),
            parents_count: 0,
        }
    }

    /// Build a frustum from bounding planes only
    pub fn from_planes(planes: Vec<Plane>) -> Self {
        Self {
            planes,
            vertices: Vec::new(),
            parents_count: 0,
        }
    }

    /// Whether a point lies inside the volume
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(point) >= 0.0)
    }

    /// Whether an AABB is inside or intersects the volume
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        for plane in &self.planes {
            // The AABB corner furthest along the plane normal; if even that
            // is outside, the whole box is
            let mut p = aabb.min;
            if plane.normal.x >= 0.0 {
                p.x = aabb.max.x;
            }
            if plane.normal.y >= 0.0 {
                p.y = aabb.max.y;
            }
            if plane.normal.z >= 0.0 {
                p.z = aabb.max.z;
            }

            if plane.distance_to_point(p) < 0.0 {
                return false;
            }
        }
        true
    }

    /// Whether an OBB is inside or intersects the volume
    pub fn intersects_obb(&self, obb: &Obb) -> bool {
        for plane in &self.planes {
            if obb
                .corners
                .iter()
                .all(|corner| plane.distance_to_point(*corner) < 0.0)
            {
                return false;
            }
        }
        true
    }

    /// Conservative polygon visibility: false only when all vertices are
    /// outside one plane
    pub fn polygon_visible(&self, vertices: impl Iterator<Item = Vec3> + Clone) -> bool {
        for plane in &self.planes {
            if vertices
                .clone()
                .all(|v| plane.distance_to_point(v) < 0.0)
            {
                return false;
            }
        }
        true
    }
}

/// Handle to a pool-allocated frustum, valid for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrustumId {
    index: u32,
    generation: u32,
}

/// Bump allocator for portal frustums
///
/// Fixed capacity; `reset` rewinds in O(1) and bumps the generation so stale
/// handles stop resolving. Slot storage is reused across frames, so a warm
/// pool does no per-frame heap allocation for the plane/vertex vectors it
/// has already grown.
#[derive(Debug)]
pub struct FrustumPool {
    frustums: Vec<Frustum>,
    active: usize,
    capacity: usize,
    generation: u32,
    exhausted: bool,
}

impl FrustumPool {
    /// Create a pool that can hand out up to `capacity` frustums per frame
    pub fn new(capacity: usize) -> Self {
        Self {
            frustums: Vec::new(),
            active: 0,
            capacity,
            generation: 0,
            exhausted: false,
        }
    }

    /// Return the entire pool to empty; O(1), no per-object deallocation
    pub fn reset(&mut self) {
        self.active = 0;
        self.generation = self.generation.wrapping_add(1);
        self.exhausted = false;
    }

    /// Number of frustums allocated since the last reset
    pub fn active_count(&self) -> usize {
        self.active
    }

    /// Resolve a handle; `None` for stale or out-of-range ids
    pub fn get(&self, id: FrustumId) -> Option<&Frustum> {
        if id.generation != self.generation || id.index as usize >= self.active {
            return None;
        }
        self.frustums.get(id.index as usize)
    }

    fn alloc(&mut self) -> RenderResult<usize> {
        if self.active >= self.capacity {
            if !self.exhausted {
                self.exhausted = true;
                log::warn!(
                    "frustum pool exhausted at {} volumes; visible set may be incomplete this frame",
                    self.capacity
                );
            }
            return Err(RenderError::CapacityExhausted {
                resource: "frustum pool",
            });
        }

        let index = self.active;
        if index == self.frustums.len() {
            self.frustums.push(Frustum::empty());
        } else {
            let slot = &mut self.frustums[index];
            slot.planes.clear();
            slot.vertices.clear();
            slot.parents_count = 0;
        }
        self.active += 1;
        Ok(index)
    }

    /// Clip a portal against a parent volume as seen from the camera
    ///
    /// The intersection of `parent` (or the raw camera frustum when `None`)
    /// with the portal polygon becomes a new convex volume: one plane per
    /// surviving portal edge through the camera position, closed off by the
    /// portal plane. This is the cull gate of the visibility walk:
    ///
    /// - `Ok(None)` — portal back-facing, or the clipped polygon is
    ///   degenerate; nothing is visible through this portal.
    /// - `Ok(Some(id))` — pool-allocated frustum ready to link into the
    ///   destination room's chain.
    /// - `Err(CapacityExhausted)` — pool full; callers continue with the
    ///   rooms found so far.
    pub fn clip_portal_frustum(
        &mut self,
        portal: &Portal,
        parent: Option<FrustumId>,
        camera: &Camera,
    ) -> RenderResult<Option<FrustumId>> {
        let cam_pos = camera.position;

        // Back-facing portals are filtered here
        if portal.plane.distance_to_point(cam_pos) <= CLIP_EPSILON {
            return Ok(None);
        }

        let parents_count = match parent {
            Some(id) => match self.get(id) {
                Some(f) => f.parents_count + 1,
                // Stale handle (pool was reset underneath); no volume
                None => return Ok(None),
            },
            None => 1,
        };

        // Clip the portal polygon against every parent plane
        let mut poly = portal.vertices.clone();
        let mut scratch = Vec::with_capacity(poly.len() + 4);
        {
            let parent_planes: &[Plane] = match parent {
                Some(id) => {
                    // Checked above
                    match self.get(id) {
                        Some(f) => &f.planes,
                        None => return Ok(None),
                    }
                }
                None => &camera.frustum().planes,
            };
            for plane in parent_planes {
                clip_polygon_by_plane(&poly, plane, &mut scratch);
                std::mem::swap(&mut poly, &mut scratch);
                if poly.len() < 3 {
                    return Ok(None);
                }
            }
        }

        // One plane per surviving edge, through the camera position,
        // oriented so the visible cone is the positive side
        let centroid = poly.iter().sum::<Vec3>() / poly.len() as f32;
        let mut planes = Vec::with_capacity(poly.len() + 1);
        for i in 0..poly.len() {
            let a = poly[i];
            let b = poly[(i + 1) % poly.len()];
            if let Some(mut plane) = Plane::from_points(cam_pos, a, b) {
                if plane.distance_to_point(centroid) < 0.0 {
                    plane = plane.flipped();
                }
                planes.push(plane);
            }
        }
        if planes.len() < 3 {
            return Ok(None);
        }
        // Close the cone at the portal so geometry on the camera side is out
        planes.push(portal.plane.flipped());

        let index = self.alloc()?;
        let slot = &mut self.frustums[index];
        slot.planes = planes;
        slot.vertices = poly;
        slot.parents_count = parents_count;

        Ok(Some(FrustumId {
            index: index as u32,
            generation: self.generation,
        }))
    }

    /// OBB visibility against a room's frustum chain
    ///
    /// An empty chain means the room is unclipped (camera room); the raw
    /// camera frustum gates instead. Otherwise visible through any chain
    /// entry counts.
    pub fn is_obb_visible_in_chain(
        &self,
        obb: &Obb,
        chain: &[FrustumId],
        camera: &Camera,
    ) -> bool {
        if chain.is_empty() {
            return camera.frustum().intersects_obb(obb);
        }
        chain
            .iter()
            .filter_map(|&id| self.get(id))
            .any(|frustum| frustum.intersects_obb(obb))
    }
}

/// Clip a polygon to the positive side of a plane (Sutherland-Hodgman)
fn clip_polygon_by_plane(input: &[Vec3], plane: &Plane, output: &mut Vec<Vec3>) {
    output.clear();
    for i in 0..input.len() {
        let curr = input[i];
        let next = input[(i + 1) % input.len()];
        let d0 = plane.distance_to_point(curr);
        let d1 = plane.distance_to_point(next);

        if d0 >= -CLIP_EPSILON {
            output.push(curr);
        }
        if (d0 > CLIP_EPSILON && d1 < -CLIP_EPSILON) || (d0 < -CLIP_EPSILON && d1 > CLIP_EPSILON) {
            let t = d0 / (d0 - d1);
            output.push(curr + (next - curr) * t);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    fn test_camera() -> Camera {
        let mut camera = Camera::perspective(90.0, 1.0, 0.1, 100.0);
        camera.look_at(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0), Vec3::y());
        camera
    }

    /// Unit-ish portal square at z = -5 facing the origin (+Z normal)
    fn facing_portal() -> Portal {
        Portal::new(
            vec![
                Vec3::new(-1.0, -1.0, -5.0),
                Vec3::new(1.0, -1.0, -5.0),
                Vec3::new(1.0, 1.0, -5.0),
                Vec3::new(-1.0, 1.0, -5.0),
            ],
            1,
        )
        .unwrap()
    }

    #[test]
    fn test_clip_produces_portal_cone() {
        let camera = test_camera();
        let mut pool = FrustumPool::new(8);

        let id = pool
            .clip_portal_frustum(&facing_portal(), None, &camera)
            .unwrap()
            .expect("front-facing portal must clip");
        let frustum = pool.get(id).unwrap();

        assert_eq!(frustum.parents_count, 1);
        assert_eq!(frustum.vertices.len(), 4);

        // Straight through the portal: inside
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -10.0)));
        // Beyond the portal but outside its silhouette cone
        assert!(!frustum.contains_point(Vec3::new(5.0, 0.0, -10.0)));
        // On the camera side of the portal plane
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, -3.0)));
    }

    #[test]
    fn test_back_facing_portal_is_culled() {
        let camera = test_camera();
        let mut pool = FrustumPool::new(8);

        // Same polygon wound the other way: normal points away from camera
        let back_facing = Portal::new(
            vec![
                Vec3::new(-1.0, 1.0, -5.0),
                Vec3::new(1.0, 1.0, -5.0),
                Vec3::new(1.0, -1.0, -5.0),
                Vec3::new(-1.0, -1.0, -5.0),
            ],
            1,
        )
        .unwrap();

        let result = pool.clip_portal_frustum(&back_facing, None, &camera).unwrap();
        assert!(result.is_none());
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_portal_outside_parent_is_culled() {
        let camera = test_camera();
        let mut pool = FrustumPool::new(8);

        let parent = pool
            .clip_portal_frustum(&facing_portal(), None, &camera)
            .unwrap()
            .unwrap();

        // A second portal fully outside the first portal's cone
        let off_axis = Portal::new(
            vec![
                Vec3::new(20.0, -1.0, -8.0),
                Vec3::new(22.0, -1.0, -8.0),
                Vec3::new(22.0, 1.0, -8.0),
                Vec3::new(20.0, 1.0, -8.0),
            ],
            2,
        )
        .unwrap();

        let result = pool
            .clip_portal_frustum(&off_axis, Some(parent), &camera)
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_nested_clip_narrows_volume() {
        let camera = test_camera();
        let mut pool = FrustumPool::new(8);

        let parent = pool
            .clip_portal_frustum(&facing_portal(), None, &camera)
            .unwrap()
            .unwrap();

        // A wider portal further along; the parent cone must clip it down
        let far_portal = Portal::new(
            vec![
                Vec3::new(-10.0, -10.0, -10.0),
                Vec3::new(10.0, -10.0, -10.0),
                Vec3::new(10.0, 10.0, -10.0),
                Vec3::new(-10.0, 10.0, -10.0),
            ],
            2,
        )
        .unwrap();

        let id = pool
            .clip_portal_frustum(&far_portal, Some(parent), &camera)
            .unwrap()
            .expect("portal inside parent cone must clip");
        let frustum = pool.get(id).unwrap();

        assert_eq!(frustum.parents_count, 2);
        // The silhouette stays bounded by the near portal's cone: at
        // z = -10 the cone reaches |x| = 2, not |x| = 10
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -12.0)));
        assert!(!frustum.contains_point(Vec3::new(9.0, 0.0, -12.0)));
    }

    #[test]
    fn test_pool_reset_invalidates_handles() {
        let camera = test_camera();
        let mut pool = FrustumPool::new(8);

        let id = pool
            .clip_portal_frustum(&facing_portal(), None, &camera)
            .unwrap()
            .unwrap();
        assert!(pool.get(id).is_some());

        pool.reset();
        assert!(pool.get(id).is_none());
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_pool_exhaustion_is_an_error_not_a_crash() {
        let camera = test_camera();
        let mut pool = FrustumPool::new(1);
        let portal = facing_portal();

        assert!(pool
            .clip_portal_frustum(&portal, None, &camera)
            .unwrap()
            .is_some());

        let err = pool.clip_portal_frustum(&portal, None, &camera);
        assert!(matches!(
            err,
            Err(RenderError::CapacityExhausted { .. })
        ));
        // Pool stays usable after a reset
        pool.reset();
        assert!(pool
            .clip_portal_frustum(&portal, None, &camera)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_aabb_visibility_against_camera_frustum() {
        let camera = test_camera();
        let frustum = camera.frustum();

        let in_front = Aabb::new(Vec3::new(-1.0, -1.0, -6.0), Vec3::new(1.0, 1.0, -4.0));
        let behind = Aabb::new(Vec3::new(-1.0, -1.0, 4.0), Vec3::new(1.0, 1.0, 6.0));
        // Straddles the near plane (camera inside)
        let around = Aabb::new(Vec3::new(-2.0, -2.0, -2.0), Vec3::new(2.0, 2.0, 2.0));

        assert!(frustum.intersects_aabb(&in_front));
        assert!(!frustum.intersects_aabb(&behind));
        assert!(frustum.intersects_aabb(&around));
    }

    #[test]
    fn test_obb_chain_visibility_falls_back_to_camera() {
        let camera = test_camera();
        let mut pool = FrustumPool::new(8);

        let local = Aabb::new(Vec3::new(-0.5, -0.5, -0.5), Vec3::new(0.5, 0.5, 0.5));
        let in_cone = Obb::from_aabb_transform(
            &local,
            &crate::foundation::math::Mat4::new_translation(&Vec3::new(0.0, 0.0, -10.0)),
        );
        let off_cone = Obb::from_aabb_transform(
            &local,
            &crate::foundation::math::Mat4::new_translation(&Vec3::new(30.0, 0.0, -10.0)),
        );

        // Empty chain: raw camera frustum gates
        assert!(pool.is_obb_visible_in_chain(&in_cone, &[], &camera));
        assert!(!pool.is_obb_visible_in_chain(&off_cone, &[], &camera));

        // With a chain, only the portal cone gates
        let id = pool
            .clip_portal_frustum(&facing_portal(), None, &camera)
            .unwrap()
            .unwrap();
        assert!(pool.is_obb_visible_in_chain(&in_cone, &[id], &camera));
        assert!(!pool.is_obb_visible_in_chain(&off_cone, &[id], &camera));
    }
}
