//! # Portal Renderer
//!
//! Per-frame visibility and transparency ordering for indoor room/portal
//! levels.
//!
//! ## Features
//!
//! - **Portal Visibility**: Recursive portal/frustum walk producing the
//!   visible-room set with clipped frustum chains per room
//! - **Frustum Pool**: Frame-scoped bump allocator behind the walk
//! - **Dynamic BSP**: Exact polygon-splitting BSP giving a strict
//!   back-to-front order for transparent geometry
//! - **Draw Orchestration**: Sky, stencil-masked rooms, room contents,
//!   sprites, and the blended pass, sequenced over an abstract backend
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use portal_renderer::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let world = World::new(Vec::new());
//!     let mut camera = Camera::perspective(75.0, 16.0 / 9.0, 8.0, 65536.0);
//!
//!     let backend = RecordingBackend::new();
//!     let mut renderer = Renderer::new(Box::new(backend), RendererConfig::default())?;
//!     renderer.reset_world(&world);
//!
//!     // Per frame:
//!     renderer.gen_render_list(&world, &mut camera);
//!     renderer.draw_list(&world, &camera)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod render;
pub mod world;

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, RendererConfig},
        foundation::math::{Mat4, Plane, Vec3},
        render::{
            Camera, DynamicBsp, FrustumPool, RenderBackend, RenderError, RenderList, RenderResult,
            Renderer, ShaderVariant, VisibilityWalker,
            api::{BackendCommand, RecordingBackend},
        },
        world::{
            Aabb, BlendMode, Entity, MeshHandle, Obb, Portal, Room, RoomFlags, RoomMesh,
            RoomSprite, StaticMeshInstance, TextureAnimations, TextureId, TransparencyPolygon,
            Vertex, World,
        },
    };
}
