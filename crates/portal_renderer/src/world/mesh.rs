//! Mesh-side data consumed by the renderer core
//!
//! Opaque geometry stays on the graphics backend behind a [`MeshHandle`];
//! only the transparent polygon lists travel through the core, because the
//! dynamic BSP has to transform, split, and re-order them on the CPU each
//! frame.

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{Mat4, Vec3};
use crate::world::bounds::Obb;

/// Handle to an opaque mesh resource stored in the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u64);

/// Identifier of a 2D texture on the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Vertex layout shared by transparency polygons and sprite quads
///
/// Matches what the backend expects for the per-frame upload; `Pod` so the
/// whole accumulated buffer can be handed over as raw bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Position in the frame's common space
    pub position: [f32; 3],
    /// Surface normal
    pub normal: [f32; 3],
    /// Vertex color (RGBA)
    pub color: [f32; 4],
    /// Texture coordinates
    pub tex_coord: [f32; 2],
}

/// Blending equation a transparent polygon was authored with
///
/// The backend maps these to its blend-state pairs; the BSP only carries the
/// tag so draw spans can switch state lazily.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// No blending (alpha-tested opaque pass)
    Opaque,
    /// Additive (classic alpha-add)
    Additive,
    /// Inversion by source color
    InvertSrc,
    /// Inversion by destination color
    InvertDest,
    /// Screen blend (smoke and similar effects)
    Screen,
    /// Opaque but with animated texture coordinates
    AnimatedTexture,
}

/// A single transparent polygon attached to a mesh
///
/// Vertices are in the owner's local space; the BSP transforms them into the
/// frame's common space at insertion time.
#[derive(Debug, Clone)]
pub struct TransparencyPolygon {
    /// Convex vertex ring (fan order)
    pub vertices: Vec<Vertex>,
    /// Texture bound while drawing this polygon
    pub texture: TextureId,
    /// Blend equation tag
    pub blend_mode: BlendMode,
    /// Animated-texture sequence index, if the polygon's UVs animate
    pub anim_id: Option<u16>,
    /// Frame offset within the animated sequence
    pub frame_offset: u16,
}

/// A room's base mesh: opaque handle plus its transparency polygon list
#[derive(Debug, Clone)]
pub struct RoomMesh {
    /// Opaque geometry on the backend
    pub handle: MeshHandle,
    /// Transparent polygons split out of the mesh at load time
    pub transparency_polygons: Vec<TransparencyPolygon>,
}

/// A static mesh instance placed in a room
#[derive(Debug, Clone)]
pub struct StaticMeshInstance {
    /// Opaque geometry on the backend
    pub mesh: MeshHandle,
    /// Transparent polygons of the mesh, if any
    pub transparency_polygons: Vec<TransparencyPolygon>,
    /// World-space placement
    pub transform: Mat4,
    /// World-space bounds for visibility gating
    pub obb: Obb,
    /// Tint multiplier applied when drawing
    pub tint: [f32; 4],
    /// Editor-hidden dummy statics are skipped when drawing
    pub hidden: bool,
}

/// One bone of an entity's skeletal mesh
#[derive(Debug, Clone)]
pub struct BoneMesh {
    /// Opaque geometry on the backend
    pub mesh: MeshHandle,
    /// Bone transform relative to the entity (current animation pose,
    /// evaluated externally)
    pub local_transform: Mat4,
    /// Transparent polygons of the bone mesh, if any
    pub transparency_polygons: Vec<TransparencyPolygon>,
}

/// A movable object contained in a room
///
/// Animation evaluation happens outside the core; the renderer only reads
/// the posed bone transforms and bounds.
#[derive(Debug, Clone)]
pub struct Entity {
    /// Whether the entity is currently drawable
    pub visible: bool,
    /// World-space placement
    pub transform: Mat4,
    /// World-space bounds for visibility gating
    pub obb: Obb,
    /// Posed bone meshes
    pub bones: Vec<BoneMesh>,
}

/// A camera-facing sprite anchored in a room
#[derive(Debug, Clone, Copy)]
pub struct RoomSprite {
    /// Anchor position in world space
    pub position: Vec3,
    /// Sprite texture
    pub texture: TextureId,
    /// Horizontal extent toward the camera-left
    pub left: f32,
    /// Horizontal extent toward the camera-right
    pub right: f32,
    /// Vertical extent above the anchor
    pub top: f32,
    /// Vertical extent below the anchor
    pub bottom: f32,
}

/// Kind of a light source for entity shading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    /// Omnidirectional point light
    Point,
    /// Negative light (darkens)
    Shadow,
    /// Infinitely distant directional light
    Sun,
}

/// A light placed in a room, used to pick the lit shader variant
#[derive(Debug, Clone, Copy)]
pub struct PointLight {
    /// World-space position
    pub position: Vec3,
    /// Light color (RGBA)
    pub color: [f32; 4],
    /// Inner falloff radius
    pub inner: f32,
    /// Outer falloff radius
    pub outer: f32,
    /// Light kind
    pub kind: LightKind,
}

impl Vertex {
    /// Convenience constructor for a white vertex at a position
    pub fn at(position: Vec3) -> Self {
        Self {
            position: [position.x, position.y, position.z],
            normal: [0.0, 0.0, 1.0],
            color: [1.0, 1.0, 1.0, 1.0],
            tex_coord: [0.0, 0.0],
        }
    }

    /// Position as a math vector
    pub fn pos(&self) -> Vec3 {
        Vec3::new(self.position[0], self.position[1], self.position[2])
    }
}
