//! Per-frame visible set: the render list and the portal walk that fills it
//!
//! [`RenderList`] records which rooms are visible this frame, in discovery
//! order, together with the per-room transient state (in-list flag, frustum
//! chain) that the level data itself never carries. [`VisibilityWalker`]
//! populates it by recursing through the portal graph from the camera's
//! room, clipping a frustum at every hop.

use bitflags::bitflags;

use crate::render::camera::Camera;
use crate::render::frustum::{FrustumId, FrustumPool};
use crate::world::{Room, RoomFlags, World};

bitflags! {
    /// Frame-wide flags raised during the visibility pass
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RenderFlags: u32 {
        /// A skybox-tagged room entered the render list
        const SKYBOX = 1 << 0;
    }
}

/// One visible room
#[derive(Debug, Clone, Copy)]
pub struct RenderListEntry {
    /// Room index into the world
    pub room: usize,
    /// Euclidean distance from the camera to the room's AABB center
    pub distance: f32,
}

/// Fixed-capacity list of rooms visible this frame, in discovery order
///
/// Capacity is fixed when the world is bound (room count plus headroom);
/// entries are overwritten each frame, never reallocated. The list also owns
/// the per-room transient state: the in-list flag and the frustum chain, one
/// entry per portal path the room was reached through. An empty chain on a
/// listed room means it is unclipped (the camera's own room, or a room from
/// the brute-force fallback).
#[derive(Debug)]
pub struct RenderList {
    entries: Vec<RenderListEntry>,
    capacity: usize,
    in_list: Vec<bool>,
    chains: Vec<Vec<FrustumId>>,
    flags: RenderFlags,
    overflow_warned: bool,
}

impl RenderList {
    /// Create a list sized for a world of `room_count` rooms
    pub fn new(room_count: usize, headroom: usize) -> Self {
        let capacity = room_count + headroom;
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            in_list: vec![false; room_count],
            chains: vec![Vec::new(); room_count],
            flags: RenderFlags::empty(),
            overflow_warned: false,
        }
    }

    /// Rebind to a world with a different room count (level load)
    pub fn rebind(&mut self, room_count: usize, headroom: usize) {
        self.capacity = room_count + headroom;
        self.entries = Vec::with_capacity(self.capacity);
        self.in_list = vec![false; room_count];
        self.chains = vec![Vec::new(); room_count];
        self.flags = RenderFlags::empty();
        self.overflow_warned = false;
    }

    /// Clear the list and every room's transient state for a new frame
    ///
    /// Rooms not touched last frame must not retain stale flags, so this is
    /// O(room count), not O(active count).
    pub fn clean(&mut self) {
        self.entries.clear();
        for flag in &mut self.in_list {
            *flag = false;
        }
        for chain in &mut self.chains {
            chain.clear();
        }
        self.flags = RenderFlags::empty();
        self.overflow_warned = false;
    }

    /// Add a room; idempotent per frame
    ///
    /// Returns whether this call newly created an entry. The in-list flag is
    /// raised even when the list is full, so the walk still prunes correctly
    /// on overflow; the room just produces no draw.
    pub fn add_room(&mut self, index: usize, room: &Room, camera_position: crate::foundation::math::Vec3) -> bool {
        if self.in_list[index] {
            return false;
        }
        self.in_list[index] = true;

        if room.flags.contains(RoomFlags::SKYBOX) {
            self.flags |= RenderFlags::SKYBOX;
        }

        if self.entries.len() >= self.capacity {
            if !self.overflow_warned {
                self.overflow_warned = true;
                log::warn!(
                    "render list full at {} rooms; dropping further rooms this frame",
                    self.capacity
                );
            }
            return false;
        }

        let distance = (room.aabb.center() - camera_position).magnitude();
        self.entries.push(RenderListEntry {
            room: index,
            distance,
        });
        true
    }

    /// Whether a room is in the visible set (flag, not entry scan)
    pub fn contains(&self, room: usize) -> bool {
        self.in_list[room]
    }

    /// The room's frustum chain; empty means unclipped
    pub fn chain(&self, room: usize) -> &[FrustumId] {
        &self.chains[room]
    }

    /// Attach another portal view to a room's chain
    pub fn push_chain(&mut self, room: usize, id: FrustumId) {
        self.chains[room].push(id);
    }

    /// Visible rooms in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &RenderListEntry> {
        self.entries.iter()
    }

    /// Entry by list position
    pub fn entry(&self, index: usize) -> RenderListEntry {
        self.entries[index]
    }

    /// Number of rooms with entries this frame
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no room produced an entry
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Frame flags raised by the pass
    pub fn flags(&self) -> RenderFlags {
        self.flags
    }

    /// Room count this list is sized for
    pub fn room_count(&self) -> usize {
        self.in_list.len()
    }
}

/// Recursive portal walk producing the visible-room set
///
/// Stateless across frames apart from logging latches; the camera carries
/// the room-coherence hint itself.
#[derive(Debug)]
pub struct VisibilityWalker {
    max_depth: usize,
    boundary_epsilon: f32,
    depth_warned: bool,
}

impl VisibilityWalker {
    /// Create a walker with a hard recursion cap and the boundary epsilon
    /// used for speculative expansion near portal planes
    pub fn new(max_depth: usize, boundary_epsilon: f32) -> Self {
        Self {
            max_depth,
            boundary_epsilon,
            depth_warned: false,
        }
    }

    /// Run the visibility pass for one frame
    ///
    /// Resets the list and pool, relocates the camera room from its hint,
    /// then walks the portal graph. With no containing room (free camera
    /// outside the level) every room whose AABB intersects the raw camera
    /// frustum is added directly.
    pub fn gen_render_list(
        &mut self,
        world: &World,
        camera: &mut Camera,
        list: &mut RenderList,
        pool: &mut FrustumPool,
    ) {
        list.clean();
        pool.reset();
        self.depth_warned = false;

        let current = world.find_room_by_position(camera.position, camera.current_room);
        camera.current_room = current;

        let Some(current) = current else {
            log::debug!("camera outside all rooms; brute-force visibility pass");
            for (index, room) in world.rooms.iter().enumerate() {
                if camera.frustum().intersects_aabb(&room.aabb) {
                    list.add_room(index, room, camera.position);
                }
            }
            return;
        };

        // The camera room is always visible and never clipped
        list.add_room(current, &world.rooms[current], camera.position);

        for portal in &world.rooms[current].portals {
            match pool.clip_portal_frustum(portal, None, camera) {
                Ok(Some(frustum)) => {
                    self.process_room(world, camera, list, pool, portal.dest_room, frustum, 1);
                }
                Ok(None) => {
                    // Camera sitting on a portal plane can fail the clip on
                    // float noise alone; rooms whose box practically
                    // contains the camera get one speculative hop, unless
                    // the overlap relation already excludes them
                    let dest = portal.dest_room;
                    if !world.is_overlapped(current, dest)
                        && world.rooms[dest]
                            .aabb
                            .contains_point_eps(camera.position, self.boundary_epsilon)
                        && list.add_room(dest, &world.rooms[dest], camera.position)
                    {
                        for next in &world.rooms[dest].portals {
                            if let Ok(Some(frustum)) =
                                pool.clip_portal_frustum(next, None, camera)
                            {
                                self.process_room(
                                    world,
                                    camera,
                                    list,
                                    pool,
                                    next.dest_room,
                                    frustum,
                                    1,
                                );
                            }
                        }
                    }
                }
                // Pool exhausted; the pool logged it, finish with what we have
                Err(_) => {}
            }
        }
    }

    /// Recurse into a room reached through `frustum`
    fn process_room(
        &mut self,
        world: &World,
        camera: &Camera,
        list: &mut RenderList,
        pool: &mut FrustumPool,
        room_index: usize,
        frustum: FrustumId,
        depth: usize,
    ) {
        // Already proven fully visible; a clipped view adds nothing
        if list.contains(room_index) && list.chain(room_index).is_empty() {
            return;
        }

        let room = &world.rooms[room_index];
        list.add_room(room_index, room, camera.position);
        list.push_chain(room_index, frustum);

        if depth >= self.max_depth {
            if !self.depth_warned {
                self.depth_warned = true;
                log::warn!(
                    "portal recursion capped at depth {}; level graph may be malformed",
                    self.max_depth
                );
            }
            return;
        }

        for portal in &room.portals {
            match pool.clip_portal_frustum(portal, Some(frustum), camera) {
                Ok(Some(child)) => {
                    self.process_room(world, camera, list, pool, portal.dest_room, child, depth + 1);
                }
                Ok(None) | Err(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::world::{Aabb, Portal, Room};

    /// Three rooms in a row along -Z, joined by square portals. Classic
    /// level scale: 1024 units per room.
    fn corridor_world() -> World {
        let size = 1024.0;
        let half = 512.0;
        let mut rooms = Vec::new();
        for i in 0..3 {
            let z_max = -(i as f32) * size;
            rooms.push(Room::new(Aabb::new(
                Vec3::new(-half, -half, z_max - size),
                Vec3::new(half, half, z_max),
            )));
        }

        // Portal polygon at a given z, wound so the normal faces +Z or -Z
        let portal_at = |z: f32, toward_pos_z: bool, dest: usize| {
            let mut verts = vec![
                Vec3::new(-half, -half, z),
                Vec3::new(half, -half, z),
                Vec3::new(half, half, z),
                Vec3::new(-half, half, z),
            ];
            if !toward_pos_z {
                verts.reverse();
            }
            Portal::new(verts, dest).unwrap()
        };

        // A -> B at z = -1024 (normal toward A, i.e. +Z), and back
        rooms[0].portals.push(portal_at(-size, true, 1));
        rooms[1].portals.push(portal_at(-size, false, 0));
        // B -> C at z = -2048, and back
        rooms[1].portals.push(portal_at(-2.0 * size, true, 2));
        rooms[2].portals.push(portal_at(-2.0 * size, false, 1));

        World::new(rooms)
    }

    fn corridor_camera(looking_down: bool) -> Camera {
        let mut camera = Camera::perspective(75.0, 16.0 / 9.0, 1.0, 65536.0);
        let target = if looking_down {
            Vec3::new(0.0, 0.0, -4096.0)
        } else {
            Vec3::new(0.0, 0.0, 4096.0)
        };
        camera.look_at(Vec3::new(0.0, 0.0, -512.0), target, Vec3::y());
        camera
    }

    fn run_walk(world: &World, camera: &mut Camera) -> (RenderList, FrustumPool) {
        let mut list = RenderList::new(world.rooms.len(), 8);
        let mut pool = FrustumPool::new(64);
        let mut walker = VisibilityWalker::new(32, 10.0);
        walker.gen_render_list(world, camera, &mut list, &mut pool);
        (list, pool)
    }

    #[test]
    fn test_corridor_walk_finds_all_three_rooms_in_order() {
        let world = corridor_world();
        let mut camera = corridor_camera(true);

        let (list, _pool) = run_walk(&world, &mut camera);

        let order: Vec<usize> = list.iter().map(|e| e.room).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(camera.current_room, Some(0));

        // Camera room unclipped, each deeper room reached through one portal
        assert!(list.chain(0).is_empty());
        assert_eq!(list.chain(1).len(), 1);
        assert_eq!(list.chain(2).len(), 1);
    }

    #[test]
    fn test_corridor_walk_facing_away_sees_only_camera_room() {
        let world = corridor_world();
        let mut camera = corridor_camera(false);

        let (list, pool) = run_walk(&world, &mut camera);

        let order: Vec<usize> = list.iter().map(|e| e.room).collect();
        assert_eq!(order, vec![0]);
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_walk_is_deterministic() {
        let world = corridor_world();
        let mut camera = corridor_camera(true);

        let (first, _) = run_walk(&world, &mut camera);
        let (second, _) = run_walk(&world, &mut camera);

        let a: Vec<usize> = first.iter().map(|e| e.room).collect();
        let b: Vec<usize> = second.iter().map(|e| e.room).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fan_in_increases_along_the_chain() {
        let world = corridor_world();
        let mut camera = corridor_camera(true);

        let (list, pool) = run_walk(&world, &mut camera);

        let b_frustum = pool.get(list.chain(1)[0]).unwrap();
        let c_frustum = pool.get(list.chain(2)[0]).unwrap();
        assert_eq!(b_frustum.parents_count, 1);
        assert_eq!(c_frustum.parents_count, 2);
    }

    #[test]
    fn test_boundary_heuristic_adds_room_behind_camera_on_portal_plane() {
        let world = corridor_world();
        // Standing almost exactly on the A/B portal plane, facing back
        // into A: the clip fails but B's box still contains the camera
        // within the epsilon, so B is speculatively kept
        let mut camera = Camera::perspective(75.0, 16.0 / 9.0, 1.0, 65536.0);
        camera.look_at(
            Vec3::new(0.0, 0.0, -1023.5),
            Vec3::new(0.0, 0.0, 4096.0),
            Vec3::y(),
        );

        let (list, _) = run_walk(&world, &mut camera);
        assert!(list.contains(0));
        assert!(list.contains(1));
    }

    #[test]
    fn test_boundary_expansion_skips_already_listed_destination() {
        let mut world = corridor_world();
        // A second A -> B portal wound the wrong way: its clip fails while
        // the camera hugs the portal plane, steering the walk into the
        // speculative expansion after the first portal already listed B
        let mut verts = vec![
            Vec3::new(-512.0, -512.0, -1024.0),
            Vec3::new(512.0, -512.0, -1024.0),
            Vec3::new(512.0, 512.0, -1024.0),
            Vec3::new(-512.0, 512.0, -1024.0),
        ];
        verts.reverse();
        world.rooms[0].portals.push(Portal::new(verts, 1).unwrap());

        let mut camera = Camera::perspective(75.0, 16.0 / 9.0, 1.0, 65536.0);
        camera.look_at(
            Vec3::new(0.0, 0.0, -1015.0),
            Vec3::new(0.0, 0.0, -4096.0),
            Vec3::y(),
        );

        let (list, pool) = run_walk(&world, &mut camera);
        let order: Vec<usize> = list.iter().map(|e| e.room).collect();
        assert_eq!(order, vec![0, 1, 2]);
        // One frustum per hop; the failed duplicate must not re-clip B's
        // portals through the expansion path
        assert_eq!(list.chain(2).len(), 1);
        assert_eq!(pool.active_count(), 2);
    }

    #[test]
    fn test_brute_force_when_camera_outside_level() {
        let world = corridor_world();
        let mut camera = Camera::perspective(75.0, 16.0 / 9.0, 1.0, 65536.0);
        // Above the level looking straight down across all three rooms
        camera.look_at(
            Vec3::new(0.0, 5000.0, -1536.0),
            Vec3::new(0.0, 0.0, -1536.0),
            Vec3::z(),
        );

        let (list, pool) = run_walk(&world, &mut camera);

        assert_eq!(camera.current_room, None);
        assert_eq!(pool.active_count(), 0);
        assert!(list.len() >= 2);
        for entry in list.iter() {
            assert!(list.chain(entry.room).is_empty());
        }
    }

    #[test]
    fn test_add_room_is_idempotent_and_caps_at_capacity() {
        let world = corridor_world();
        let cam_pos = Vec3::zeros();

        let mut list = RenderList::new(world.rooms.len(), 0);
        assert!(list.add_room(0, &world.rooms[0], cam_pos));
        assert!(!list.add_room(0, &world.rooms[0], cam_pos));
        assert_eq!(list.len(), 1);

        // Shrink capacity to force overflow
        let mut tiny = RenderList::new(world.rooms.len(), 0);
        tiny.capacity = 1;
        assert!(tiny.add_room(0, &world.rooms[0], cam_pos));
        assert!(!tiny.add_room(1, &world.rooms[1], cam_pos));
        assert_eq!(tiny.len(), 1);
        // Flag still set so the walk prunes instead of revisiting
        assert!(tiny.contains(1));
    }

    #[test]
    fn test_clean_clears_flags_and_chains() {
        let world = corridor_world();
        let mut camera = corridor_camera(true);
        let (mut list, _) = run_walk(&world, &mut camera);

        assert!(!list.is_empty());
        list.clean();
        assert!(list.is_empty());
        for room in 0..world.rooms.len() {
            assert!(!list.contains(room));
            assert!(list.chain(room).is_empty());
        }
        assert_eq!(list.flags(), RenderFlags::empty());
    }

    #[test]
    fn test_skybox_flag_raised_by_tagged_room() {
        let mut world = corridor_world();
        world.rooms[1].flags |= RoomFlags::SKYBOX;
        let mut camera = corridor_camera(true);

        let (list, _) = run_walk(&world, &mut camera);
        assert!(list.flags().contains(RenderFlags::SKYBOX));
    }

    #[test]
    fn test_cyclic_graph_terminates() {
        // A <-> B with both portals wound to face the camera from either
        // side would loop forever without the in-list prune and depth cap
        let world = corridor_world();
        let mut camera = corridor_camera(true);

        let mut list = RenderList::new(world.rooms.len(), 8);
        let mut pool = FrustumPool::new(256);
        let mut walker = VisibilityWalker::new(4, 10.0);
        walker.gen_render_list(&world, &mut camera, &mut list, &mut pool);

        assert!(list.len() <= world.rooms.len());
    }
}
