//! Backend abstraction traits for the rendering system
//!
//! This module defines the trait a graphics backend must implement for the
//! visibility core to submit its frame. The core decides *what* to draw and
//! in *what order*; everything below an indexed draw call is the backend's
//! business.

use crate::foundation::math::{Mat4, Vec3};
use crate::render::RenderError;
use crate::world::{BlendMode, MeshHandle, TextureId};

/// Result type for backend operations
pub type BackendResult<T> = Result<T, RenderError>;

/// Shader variant selected by capability, not by name
///
/// The backend owns the actual programs; the core only states what the next
/// draw needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderVariant {
    /// Room geometry; `water` enables the underwater distortion path
    Room {
        /// Room is under water
        water: bool,
    },
    /// Static mesh instances (unlit, tinted)
    StaticMesh,
    /// Skeletal entities lit by up to `light_count` lights
    Entity {
        /// Number of active lights bound for this draw
        light_count: u32,
    },
    /// Camera-facing sprites
    Sprite,
    /// Unlit tinted geometry (sky, stencil silhouettes, transparency pass)
    UnlitTinted,
}

/// Primitive topology of an indexed draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    /// Independent triangles
    TriangleList,
    /// Triangle fan (convex polygons)
    TriangleFan,
}

/// One draw range into the frame's shared transparency buffer
///
/// Emitted by the BSP traversal; references geometry uploaded earlier in the
/// frame, never new geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawSpan {
    /// First index into the uploaded index buffer
    pub first_index: u32,
    /// Number of indices
    pub index_count: u32,
    /// Texture bound for this span
    pub texture: TextureId,
    /// Blend equation for this span
    pub blend_mode: BlendMode,
}

/// Light parameters handed to the backend for a lit draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuLight {
    /// World-space position
    pub position: [f32; 3],
    /// Light color (RGBA)
    pub color: [f32; 4],
    /// Inner falloff radius
    pub inner_radius: f32,
    /// Outer falloff radius
    pub outer_radius: f32,
}

/// Main rendering backend trait
///
/// Call order within a frame is meaningful: the orchestrator brackets all
/// submission between `begin_frame` and `end_frame`, and state setters apply
/// to subsequent draws until changed.
pub trait RenderBackend {
    /// Begin recording a frame
    fn begin_frame(&mut self) -> BackendResult<()>;

    /// Finish and submit the frame
    fn end_frame(&mut self) -> BackendResult<()>;

    /// Select a shader variant by capability
    fn bind_shader(&mut self, variant: ShaderVariant) -> BackendResult<()>;

    /// Set the view-projection matrix for subsequent draws
    fn set_view_projection(&mut self, view_projection: &Mat4);

    /// Set the model transform for subsequent draws
    fn set_model(&mut self, model: &Mat4);

    /// Set the tint multiplier for subsequent draws
    fn set_tint(&mut self, tint: [f32; 4]);

    /// Bind light parameters for a lit draw
    fn set_lights(&mut self, lights: &[GpuLight]);

    /// Bind a 2D texture by identifier
    fn bind_texture(&mut self, texture: TextureId);

    /// Switch the blend equation
    fn set_blend_mode(&mut self, mode: BlendMode);

    /// Enable or disable depth writes
    fn set_depth_write(&mut self, enabled: bool);

    /// Draw an opaque mesh resource previously uploaded by the level loader
    fn draw_mesh(&mut self, mesh: MeshHandle) -> BackendResult<()>;

    /// Upload the frame's accumulated transparency vertex/index buffer
    ///
    /// `vertices` is the raw byte view of a `[Vertex]` slice. Called at most
    /// once per frame, before any [`RenderBackend::draw_indexed`].
    fn upload_transparency_buffer(&mut self, vertices: &[u8], indices: &[u32])
        -> BackendResult<()>;

    /// Submit an indexed draw range into the uploaded transparency buffer
    fn draw_indexed(
        &mut self,
        first_index: u32,
        index_count: u32,
        topology: PrimitiveTopology,
    ) -> BackendResult<()>;

    /// Draw a transient batch of sprite quads (triangle list)
    fn draw_sprite_batch(&mut self, vertices: &[u8], indices: &[u32]) -> BackendResult<()>;

    /// Clear the stencil buffer and start writing silhouettes
    ///
    /// Subsequent [`RenderBackend::draw_stencil_silhouette`] calls mark
    /// pixels; color and depth output are suppressed until
    /// [`RenderBackend::stencil_gate_equal`].
    fn stencil_begin_silhouette(&mut self) -> BackendResult<()>;

    /// Rasterize one convex silhouette fan into the stencil buffer
    fn draw_stencil_silhouette(&mut self, fan: &[Vec3]) -> BackendResult<()>;

    /// Gate subsequent draws to pixels marked by the silhouettes
    fn stencil_gate_equal(&mut self);

    /// Disable the stencil test
    fn stencil_end(&mut self);
}
