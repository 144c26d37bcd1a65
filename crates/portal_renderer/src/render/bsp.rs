//! Per-frame dynamic BSP for transparent draw ordering
//!
//! Transparent polygons from unrelated objects can interpenetrate, so no
//! per-object sort is correct. Instead every transparent polygon of the
//! frame is inserted into a binary space partition built from the polygons
//! themselves; polygons straddling a node plane are split exactly along it.
//! A single traversal then yields a strict back-to-front (or front-to-back)
//! order relative to the camera, independent of insertion order.
//!
//! The tree lives one frame: node and polygon arenas are rewound by
//! [`DynamicBsp::reset`] and refilled during collection. Vertices and
//! indices for all batches accumulate in one growable buffer, uploaded to
//! the backend once; traversal emits only index ranges.

use crate::foundation::math::{transform_point, transform_vector, Mat4, Plane, Vec3};
use crate::render::api::DrawSpan;
use crate::render::frustum::Frustum;
use crate::render::{RenderError, RenderResult};
use crate::world::{BlendMode, TextureAnimations, TextureId, TransparencyPolygon, Vertex};

/// Vertices closer than this to a splitting plane count as on it
const DEFAULT_COPLANAR_EPSILON: f32 = 1.0 / 64.0;

/// A polygon mid-insertion, in world space
struct WorkingPolygon {
    vertices: Vec<Vertex>,
    plane: Plane,
    texture: TextureId,
    blend_mode: BlendMode,
}

/// Landed polygon: an index range into the frame buffer
#[derive(Debug, Clone, Copy)]
struct BspPolygon {
    first_index: u32,
    index_count: u32,
    texture: TextureId,
    blend_mode: BlendMode,
}

#[derive(Debug)]
struct BspNode {
    plane: Plane,
    front: Option<u32>,
    back: Option<u32>,
    /// Coplanar polygons facing the same way as the node plane
    front_polygons: Vec<u32>,
    /// Coplanar polygons facing the opposite way
    back_polygons: Vec<u32>,
}

/// Which side of a node plane a polygon occupies
enum Side {
    Front,
    Back,
    Coplanar,
    Straddling,
}

/// Frame-scoped BSP over the frame's transparent polygons
#[derive(Debug)]
pub struct DynamicBsp {
    nodes: Vec<BspNode>,
    polygons: Vec<BspPolygon>,
    active_nodes: usize,
    active_polygons: usize,
    max_nodes: usize,
    max_polygons: usize,
    root: Option<u32>,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    animations: TextureAnimations,
    coplanar_epsilon: f32,
    exhausted: bool,
}

impl DynamicBsp {
    /// Create a tree with fixed node/polygon arena capacities
    pub fn new(max_nodes: usize, max_polygons: usize) -> Self {
        Self {
            nodes: Vec::new(),
            polygons: Vec::new(),
            active_nodes: 0,
            active_polygons: 0,
            max_nodes,
            max_polygons,
            root: None,
            vertices: Vec::new(),
            indices: Vec::new(),
            animations: TextureAnimations::default(),
            coplanar_epsilon: DEFAULT_COPLANAR_EPSILON,
            exhausted: false,
        }
    }

    /// Override the coplanarity tolerance used during classification
    pub fn with_coplanar_epsilon(mut self, epsilon: f32) -> Self {
        self.coplanar_epsilon = epsilon;
        self
    }

    /// Rewind the arenas for a new frame and snapshot the animation state
    /// used to resolve animated-texture UVs during insertion
    pub fn reset(&mut self, animations: &TextureAnimations) {
        self.active_nodes = 0;
        self.active_polygons = 0;
        self.root = None;
        self.vertices.clear();
        self.indices.clear();
        self.animations = animations.clone();
        self.exhausted = false;
    }

    /// Number of polygons landed this frame (split fragments count each)
    pub fn polygon_count(&self) -> usize {
        self.active_polygons
    }

    /// Whether nothing was collected this frame
    pub fn is_empty(&self) -> bool {
        self.active_polygons == 0
    }

    /// The frame's accumulated geometry, for a single backend upload
    pub fn frame_buffers(&self) -> (&[Vertex], &[u32]) {
        (&self.vertices, &self.indices)
    }

    /// Transform a batch of transparency polygons into world space and
    /// insert the frustum-visible ones
    ///
    /// Callers gate whole objects with an OBB test first; the per-polygon
    /// frustum check here drops the remainder cheaply. Animated-texture
    /// polygons get their UVs resolved against the frame's animation
    /// snapshot. On arena exhaustion the rest of the batch is dropped for
    /// the frame.
    pub fn add_batch(
        &mut self,
        polygons: &[TransparencyPolygon],
        transform: &Mat4,
        frustum: &Frustum,
    ) {
        for polygon in polygons {
            if self.exhausted {
                return;
            }
            if polygon.vertices.len() < 3 {
                continue;
            }

            let mut vertices = Vec::with_capacity(polygon.vertices.len());
            for v in &polygon.vertices {
                let mut out = *v;
                let p = transform_point(transform, v.pos());
                let n = transform_vector(transform, Vec3::from(v.normal));
                out.position = [p.x, p.y, p.z];
                out.normal = [n.x, n.y, n.z];
                if let Some(anim_id) = polygon.anim_id {
                    out.tex_coord =
                        self.animations
                            .resolve_uv(anim_id, polygon.frame_offset, v.tex_coord);
                }
                vertices.push(out);
            }

            let positions: Vec<Vec3> = vertices.iter().map(Vertex::pos).collect();
            if !frustum.polygon_visible(positions.iter().copied()) {
                continue;
            }
            let Some(plane) = Plane::from_polygon(&positions) else {
                continue;
            };

            let working = WorkingPolygon {
                vertices,
                plane,
                texture: polygon.texture,
                blend_mode: polygon.blend_mode,
            };
            if self.insert(working).is_err() {
                // Diagnostic already emitted; keep the frame going
                return;
            }
        }
    }

    /// Emit this frame's polygons ordered strictly back-to-front from
    /// `camera_position`
    pub fn collect_back_to_front(&self, camera_position: Vec3, out: &mut Vec<DrawSpan>) {
        self.collect(camera_position, false, out);
    }

    /// Emit this frame's polygons ordered strictly front-to-back from
    /// `camera_position`
    pub fn collect_front_to_back(&self, camera_position: Vec3, out: &mut Vec<DrawSpan>) {
        self.collect(camera_position, true, out);
    }

    fn collect(&self, camera_position: Vec3, front_first: bool, out: &mut Vec<DrawSpan>) {
        enum Walk {
            Visit(u32),
            Emit(u32, bool),
        }

        let Some(root) = self.root else {
            return;
        };

        // Explicit stack; adversarial geometry must not blow the call stack
        let mut stack = vec![Walk::Visit(root)];
        while let Some(op) = stack.pop() {
            match op {
                Walk::Visit(index) => {
                    let node = &self.nodes[index as usize];
                    let camera_in_front =
                        node.plane.distance_to_point(camera_position) >= 0.0;
                    // Back-to-front: far child, own buckets, near child.
                    // Pushed in reverse so the pops run in that order.
                    let (near, far) = if camera_in_front {
                        (node.front, node.back)
                    } else {
                        (node.back, node.front)
                    };
                    let (first, second) = if front_first { (far, near) } else { (near, far) };
                    if let Some(child) = first {
                        stack.push(Walk::Visit(child));
                    }
                    stack.push(Walk::Emit(index, camera_in_front));
                    if let Some(child) = second {
                        stack.push(Walk::Visit(child));
                    }
                }
                Walk::Emit(index, camera_in_front) => {
                    let node = &self.nodes[index as usize];
                    // Both buckets are coplanar with the split, so their
                    // mutual order cannot affect blending correctness; the
                    // away-facing bucket goes first
                    let (first, second) = if camera_in_front == !front_first {
                        (&node.back_polygons, &node.front_polygons)
                    } else {
                        (&node.front_polygons, &node.back_polygons)
                    };
                    for &poly in first.iter().chain(second.iter()) {
                        let p = &self.polygons[poly as usize];
                        out.push(DrawSpan {
                            first_index: p.first_index,
                            index_count: p.index_count,
                            texture: p.texture,
                            blend_mode: p.blend_mode,
                        });
                    }
                }
            }
        }
    }

    fn alloc_node(&mut self, plane: Plane) -> RenderResult<u32> {
        if self.active_nodes >= self.max_nodes {
            self.fault("BSP node arena")?;
        }
        let index = self.active_nodes;
        if index == self.nodes.len() {
            self.nodes.push(BspNode {
                plane,
                front: None,
                back: None,
                front_polygons: Vec::new(),
                back_polygons: Vec::new(),
            });
        } else {
            let node = &mut self.nodes[index];
            node.plane = plane;
            node.front = None;
            node.back = None;
            node.front_polygons.clear();
            node.back_polygons.clear();
        }
        self.active_nodes += 1;
        Ok(index as u32)
    }

    fn fault(&mut self, resource: &'static str) -> RenderResult<()> {
        if !self.exhausted {
            self.exhausted = true;
            log::warn!(
                "{resource} exhausted; transparent geometry incomplete this frame"
            );
        }
        Err(RenderError::CapacityExhausted { resource })
    }

    /// Fan-triangulate a landed polygon into the frame buffer and bucket it
    fn land(&mut self, node: u32, polygon: WorkingPolygon, front_facing: bool) -> RenderResult<()> {
        if self.active_polygons >= self.max_polygons {
            self.fault("BSP polygon arena")?;
        }

        let base = self.vertices.len() as u32;
        let first_index = self.indices.len() as u32;
        self.vertices.extend_from_slice(&polygon.vertices);
        for i in 1..polygon.vertices.len() as u32 - 1 {
            self.indices.push(base);
            self.indices.push(base + i);
            self.indices.push(base + i + 1);
        }

        let record = BspPolygon {
            first_index,
            index_count: self.indices.len() as u32 - first_index,
            texture: polygon.texture,
            blend_mode: polygon.blend_mode,
        };
        let slot = self.active_polygons;
        if slot == self.polygons.len() {
            self.polygons.push(record);
        } else {
            self.polygons[slot] = record;
        }
        self.active_polygons += 1;

        let node = &mut self.nodes[node as usize];
        if front_facing {
            node.front_polygons.push(slot as u32);
        } else {
            node.back_polygons.push(slot as u32);
        }
        Ok(())
    }

    fn insert(&mut self, polygon: WorkingPolygon) -> RenderResult<()> {
        let root = match self.root {
            Some(root) => root,
            None => {
                let root = self.alloc_node(polygon.plane)?;
                self.root = Some(root);
                root
            }
        };

        // Straddling polygons fork into two fragments, so this is a work
        // list rather than plain recursion
        let mut work = vec![(root, polygon)];
        while let Some((index, poly)) = work.pop() {
            let node_plane = self.nodes[index as usize].plane;
            match classify(&poly.vertices, &node_plane, self.coplanar_epsilon) {
                Side::Coplanar => {
                    let front_facing = poly.plane.normal.dot(&node_plane.normal) > 0.0;
                    self.land(index, poly, front_facing)?;
                }
                Side::Front => match self.nodes[index as usize].front {
                    Some(child) => work.push((child, poly)),
                    None => {
                        let child = self.alloc_node(poly.plane)?;
                        self.nodes[index as usize].front = Some(child);
                        self.land(child, poly, true)?;
                    }
                },
                Side::Back => match self.nodes[index as usize].back {
                    Some(child) => work.push((child, poly)),
                    None => {
                        let child = self.alloc_node(poly.plane)?;
                        self.nodes[index as usize].back = Some(child);
                        self.land(child, poly, true)?;
                    }
                },
                Side::Straddling => {
                    let (front, back) =
                        split_polygon(&poly, &node_plane, self.coplanar_epsilon);
                    match self.nodes[index as usize].front {
                        Some(child) => work.push((child, front)),
                        None => {
                            let child = self.alloc_node(front.plane)?;
                            self.nodes[index as usize].front = Some(child);
                            self.land(child, front, true)?;
                        }
                    }
                    match self.nodes[index as usize].back {
                        Some(child) => work.push((child, back)),
                        None => {
                            let child = self.alloc_node(back.plane)?;
                            self.nodes[index as usize].back = Some(child);
                            self.land(child, back, true)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn classify(vertices: &[Vertex], plane: &Plane, epsilon: f32) -> Side {
    let mut front = false;
    let mut back = false;
    for v in vertices {
        let d = plane.distance_to_point(v.pos());
        if d > epsilon {
            front = true;
        } else if d < -epsilon {
            back = true;
        }
        if front && back {
            return Side::Straddling;
        }
    }
    match (front, back) {
        (true, false) => Side::Front,
        (false, true) => Side::Back,
        _ => Side::Coplanar,
    }
}

fn lerp_vertex(a: &Vertex, b: &Vertex, t: f32) -> Vertex {
    let mut out = *a;
    for i in 0..3 {
        out.position[i] = a.position[i] + (b.position[i] - a.position[i]) * t;
        out.normal[i] = a.normal[i] + (b.normal[i] - a.normal[i]) * t;
    }
    for i in 0..4 {
        out.color[i] = a.color[i] + (b.color[i] - a.color[i]) * t;
    }
    for i in 0..2 {
        out.tex_coord[i] = a.tex_coord[i] + (b.tex_coord[i] - a.tex_coord[i]) * t;
    }
    out
}

/// Split a straddling polygon exactly along `plane` into a front and a back
/// fragment; edge crossings interpolate all vertex attributes
///
/// Approximate splitting (for example whole-triangle assignment) is not an
/// option here: fragments must meet flush at the plane or sorting shows
/// visible seams.
fn split_polygon(
    polygon: &WorkingPolygon,
    plane: &Plane,
    epsilon: f32,
) -> (WorkingPolygon, WorkingPolygon) {
    let n = polygon.vertices.len();
    let mut front = Vec::with_capacity(n + 2);
    let mut back = Vec::with_capacity(n + 2);

    for i in 0..n {
        let curr = &polygon.vertices[i];
        let next = &polygon.vertices[(i + 1) % n];
        let d0 = plane.distance_to_point(curr.pos());
        let d1 = plane.distance_to_point(next.pos());

        if d0 >= -epsilon {
            front.push(*curr);
        }
        if d0 <= epsilon {
            back.push(*curr);
        }
        if (d0 > epsilon && d1 < -epsilon) || (d0 < -epsilon && d1 > epsilon) {
            let split = lerp_vertex(curr, next, d0 / (d0 - d1));
            front.push(split);
            back.push(split);
        }
    }

    (
        WorkingPolygon {
            vertices: front,
            plane: polygon.plane,
            texture: polygon.texture,
            blend_mode: polygon.blend_mode,
        },
        WorkingPolygon {
            vertices: back,
            plane: polygon.plane,
            texture: polygon.texture,
            blend_mode: polygon.blend_mode,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::foundation::math::polygon_area;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn quad_at_z(z: f32, texture: u32) -> TransparencyPolygon {
        TransparencyPolygon {
            vertices: vec![
                Vertex::at(Vec3::new(-1.0, -1.0, z)),
                Vertex::at(Vec3::new(1.0, -1.0, z)),
                Vertex::at(Vec3::new(1.0, 1.0, z)),
                Vertex::at(Vec3::new(-1.0, 1.0, z)),
            ],
            texture: TextureId(texture),
            blend_mode: BlendMode::Screen,
            anim_id: None,
            frame_offset: 0,
        }
    }

    fn everything() -> Frustum {
        Frustum::empty()
    }

    #[test]
    fn test_back_to_front_order_is_independent_of_insertion_order() {
        let mut bsp = DynamicBsp::new(64, 64);
        bsp.reset(&TextureAnimations::default());

        // Parallel quads at z = -1, -2, ..., -6, inserted shuffled
        let order = [3_u32, 0, 5, 1, 4, 2];
        for &i in &order {
            let quad = quad_at_z(-(i as f32 + 1.0), i);
            bsp.add_batch(std::slice::from_ref(&quad), &Mat4::identity(), &everything());
        }

        let mut spans = Vec::new();
        bsp.collect_back_to_front(Vec3::zeros(), &mut spans);

        // Camera at the origin: farthest (z = -6, texture 5) first
        let textures: Vec<u32> = spans.iter().map(|s| s.texture.0).collect();
        assert_eq!(textures, vec![5, 4, 3, 2, 1, 0]);

        spans.clear();
        bsp.collect_front_to_back(Vec3::zeros(), &mut spans);
        let textures: Vec<u32> = spans.iter().map(|s| s.texture.0).collect();
        assert_eq!(textures, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_straddling_polygon_is_split_not_dropped() {
        let mut bsp = DynamicBsp::new(64, 64);
        bsp.reset(&TextureAnimations::default());

        // First quad spans z through zero in the XZ sense: plane x = 0
        let wall = TransparencyPolygon {
            vertices: vec![
                Vertex::at(Vec3::new(0.0, -1.0, -1.0)),
                Vertex::at(Vec3::new(0.0, -1.0, 1.0)),
                Vertex::at(Vec3::new(0.0, 1.0, 1.0)),
                Vertex::at(Vec3::new(0.0, 1.0, -1.0)),
            ],
            texture: TextureId(0),
            blend_mode: BlendMode::Screen,
            anim_id: None,
            frame_offset: 0,
        };
        // Second quad crosses the first's plane
        let crossing = TransparencyPolygon {
            vertices: vec![
                Vertex::at(Vec3::new(-1.0, -1.0, 0.0)),
                Vertex::at(Vec3::new(1.0, -1.0, 0.0)),
                Vertex::at(Vec3::new(1.0, 1.0, 0.0)),
                Vertex::at(Vec3::new(-1.0, 1.0, 0.0)),
            ],
            texture: TextureId(1),
            blend_mode: BlendMode::Screen,
            anim_id: None,
            frame_offset: 0,
        };

        bsp.add_batch(&[wall], &Mat4::identity(), &everything());
        bsp.add_batch(&[crossing], &Mat4::identity(), &everything());

        // Wall plus two fragments of the crossing quad
        assert_eq!(bsp.polygon_count(), 3);

        // Both fragments of texture 1 sit on opposite sides of the wall
        let mut spans = Vec::new();
        bsp.collect_back_to_front(Vec3::new(5.0, 0.0, 0.0), &mut spans);
        let textures: Vec<u32> = spans.iter().map(|s| s.texture.0).collect();
        assert_eq!(textures, vec![1, 0, 1]);
    }

    #[test]
    fn test_split_preserves_area_for_random_polygons_and_planes() {
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..200 {
            // Random convex polygon: regular n-gon, random radius/offset
            let sides = rng.gen_range(3..9);
            let radius: f32 = rng.gen_range(0.5..10.0);
            let center = Vec3::new(
                rng.gen_range(-5.0..5.0),
                rng.gen_range(-5.0..5.0),
                rng.gen_range(-5.0..5.0),
            );
            let vertices: Vec<Vertex> = (0..sides)
                .map(|i| {
                    let angle = std::f32::consts::TAU * i as f32 / sides as f32;
                    Vertex::at(center + Vec3::new(radius * angle.cos(), radius * angle.sin(), 0.0))
                })
                .collect();
            let polygon = WorkingPolygon {
                plane: Plane::from_polygon(&positions(&vertices)).unwrap(),
                vertices,
                texture: TextureId(0),
                blend_mode: BlendMode::Screen,
            };

            // Random plane through the polygon's center region
            let normal = Vec3::new(
                rng.gen_range(-1.0..1.0_f32),
                rng.gen_range(-1.0..1.0_f32),
                rng.gen_range(0.01..1.0_f32),
            )
            .normalize();
            let plane = Plane::new(normal, -normal.dot(&center));
            if !matches!(
                classify(&polygon.vertices, &plane, 0.0),
                Side::Straddling
            ) {
                continue;
            }

            let total = polygon_area(&positions(&polygon.vertices));
            let (front, back) = split_polygon(&polygon, &plane, 0.0);
            let split_total =
                polygon_area(&positions(&front.vertices)) + polygon_area(&positions(&back.vertices));

            assert_relative_eq!(total, split_total, epsilon = 1e-2, max_relative = 1e-3);
        }
    }

    fn positions(vertices: &[Vertex]) -> Vec<Vec3> {
        vertices.iter().map(Vertex::pos).collect()
    }

    #[test]
    fn test_polygon_arena_exhaustion_drops_but_does_not_corrupt() {
        let mut bsp = DynamicBsp::new(64, 2);
        bsp.reset(&TextureAnimations::default());

        for i in 0..5 {
            let quad = quad_at_z(-(i as f32) - 1.0, i);
            bsp.add_batch(std::slice::from_ref(&quad), &Mat4::identity(), &everything());
        }

        assert_eq!(bsp.polygon_count(), 2);
        let mut spans = Vec::new();
        bsp.collect_back_to_front(Vec3::zeros(), &mut spans);
        assert_eq!(spans.len(), 2);
    }

    #[test]
    fn test_reset_rewinds_frame_state() {
        let mut bsp = DynamicBsp::new(64, 64);
        bsp.reset(&TextureAnimations::default());
        let quad = quad_at_z(-3.0, 0);
        bsp.add_batch(std::slice::from_ref(&quad), &Mat4::identity(), &everything());
        assert!(!bsp.is_empty());

        bsp.reset(&TextureAnimations::default());
        assert!(bsp.is_empty());
        let (verts, idx) = bsp.frame_buffers();
        assert!(verts.is_empty());
        assert!(idx.is_empty());
    }

    #[test]
    fn test_batch_transform_and_frustum_filter() {
        let mut bsp = DynamicBsp::new(64, 64);
        bsp.reset(&TextureAnimations::default());

        // Clip everything with x > 0 away
        let frustum = Frustum::from_planes(vec![Plane::new(Vec3::new(-1.0, 0.0, 0.0), 0.0)]);
        let quad = quad_at_z(0.0, 7);

        // Pushed to x = +10: fully outside
        bsp.add_batch(
            std::slice::from_ref(&quad),
            &Mat4::new_translation(&Vec3::new(10.0, 0.0, 0.0)),
            &frustum,
        );
        assert!(bsp.is_empty());

        // Pushed to x = -10: inside, and the transform reached the buffer
        bsp.add_batch(
            std::slice::from_ref(&quad),
            &Mat4::new_translation(&Vec3::new(-10.0, 0.0, 0.0)),
            &frustum,
        );
        assert_eq!(bsp.polygon_count(), 1);
        let (verts, _) = bsp.frame_buffers();
        assert!(verts.iter().all(|v| v.position[0] < 0.0));
    }
}
