//! Level data model
//!
//! Rooms and portals form a cyclic graph, so everything is referenced by
//! index into flat arrays owned by [`World`] — no owning pointers across the
//! graph, which keeps the re-entrant visibility traversal free of lifetime
//! hazards. Level loading (file parsing, mesh upload) happens outside this
//! crate; the world arrives fully populated.

pub mod animation;
pub mod bounds;
pub mod mesh;

use bitflags::bitflags;

use crate::foundation::math::{Mat4, Plane, Vec3};

pub use animation::{AnimSeq, TexAnimMode, TexFrame, TextureAnimations};
pub use bounds::{Aabb, Obb};
pub use mesh::{
    BlendMode, BoneMesh, Entity, LightKind, MeshHandle, PointLight, RoomMesh, RoomSprite,
    StaticMeshInstance, TextureId, TransparencyPolygon, Vertex,
};

bitflags! {
    /// Static per-room properties from the level data
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RoomFlags: u32 {
        /// Room is under water; draws get the water tint
        const WATER = 1 << 0;
        /// Room opens to the sky; seeing it requests the skybox pass
        const SKYBOX = 1 << 1;
    }
}

/// A see-through boundary polygon connecting two rooms
///
/// The plane normal points into the source room, so a camera that can look
/// through the portal sits on the positive side. Read-only at render time.
#[derive(Debug, Clone)]
pub struct Portal {
    /// Convex boundary polygon in world space
    pub vertices: Vec<Vec3>,
    /// Support plane, normal toward the source room
    pub plane: Plane,
    /// Polygon centroid
    pub center: Vec3,
    /// Index of the destination room
    pub dest_room: usize,
}

impl Portal {
    /// Build a portal from its boundary polygon and destination room index
    ///
    /// Returns `None` for degenerate polygons (fewer than three vertices or
    /// no derivable plane); level loaders drop such portals with a warning.
    pub fn new(vertices: Vec<Vec3>, dest_room: usize) -> Option<Self> {
        let plane = Plane::from_polygon(&vertices)?;
        let center = vertices.iter().sum::<Vec3>() / vertices.len() as f32;
        Some(Self {
            vertices,
            plane,
            center,
            dest_room,
        })
    }
}

/// The fundamental indoor visibility cell of the level
#[derive(Debug, Clone)]
pub struct Room {
    /// World-space bounding box
    pub aabb: Aabb,
    /// Rigid placement of the room mesh
    pub transform: Mat4,
    /// Portals leaving this room
    pub portals: Vec<Portal>,
    /// Precomputed spatial adjacency beyond direct portals (room indices)
    pub near_rooms: Vec<usize>,
    /// Rooms whose volume overlaps this one (vertically stacked sectors);
    /// used by the boundary heuristic and the stencil-mask decision
    pub overlapped_rooms: Vec<usize>,
    /// Base mesh with its transparency polygons, if the room has geometry
    pub mesh: Option<RoomMesh>,
    /// Static mesh instances placed in the room
    pub static_meshes: Vec<StaticMeshInstance>,
    /// Movable objects currently contained in the room
    pub entities: Vec<Entity>,
    /// Camera-facing sprites anchored in the room
    pub sprites: Vec<RoomSprite>,
    /// Light sources for entity shading
    pub lights: Vec<PointLight>,
    /// Static property flags
    pub flags: RoomFlags,
    /// Ambient light color
    pub ambient: [f32; 3],
    /// World-space oriented bounds (AABB carried through the transform);
    /// used for the near-room object overlap test
    pub obb: Obb,
}

impl Room {
    /// Create an empty room covering `aabb` with an identity placement
    pub fn new(aabb: Aabb) -> Self {
        let transform = Mat4::identity();
        let obb = Obb::from_aabb_transform(&aabb, &transform);
        Self {
            aabb,
            transform,
            portals: Vec::new(),
            near_rooms: Vec::new(),
            overlapped_rooms: Vec::new(),
            mesh: None,
            static_meshes: Vec::new(),
            entities: Vec::new(),
            sprites: Vec::new(),
            lights: Vec::new(),
            flags: RoomFlags::empty(),
            ambient: [1.0, 1.0, 1.0],
            obb,
        }
    }
}

/// A loaded level: flat room array plus level-wide tables
///
/// Owned by the caller and outlives frames; the renderer only reads it
/// during visibility and draw passes.
#[derive(Debug, Default)]
pub struct World {
    /// All rooms of the level
    pub rooms: Vec<Room>,
    /// Animated-texture sequence table
    pub animations: TextureAnimations,
    /// Skybox mesh drawn centered on the camera, if the level has one
    pub skybox: Option<MeshHandle>,
}

impl World {
    /// Create a world from rooms
    pub fn new(rooms: Vec<Room>) -> Self {
        Self {
            rooms,
            animations: TextureAnimations::default(),
            skybox: None,
        }
    }

    /// Number of rooms in the level
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Find the room containing a position, searching outward from a hint
    ///
    /// Checks the hint room first, then its portal destinations and near
    /// rooms, then falls back to a linear scan. Returns `None` when the
    /// position is outside every room (free camera outside the level).
    pub fn find_room_by_position(&self, position: Vec3, hint: Option<usize>) -> Option<usize> {
        if let Some(hint) = hint {
            if let Some(room) = self.rooms.get(hint) {
                if room.aabb.contains_point(position) {
                    return Some(hint);
                }
                for portal in &room.portals {
                    if self.rooms[portal.dest_room].aabb.contains_point(position) {
                        return Some(portal.dest_room);
                    }
                }
                for &near in &room.near_rooms {
                    if self.rooms[near].aabb.contains_point(position) {
                        return Some(near);
                    }
                }
            }
        }

        self.rooms
            .iter()
            .position(|room| room.aabb.contains_point(position))
    }

    /// Whether room `b` is in room `a`'s overlapped-rooms list
    pub fn is_overlapped(&self, a: usize, b: usize) -> bool {
        self.rooms
            .get(a)
            .map_or(false, |room| room.overlapped_rooms.contains(&b))
    }
}
