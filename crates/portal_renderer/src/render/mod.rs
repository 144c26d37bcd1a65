//! Per-frame rendering core: visibility, ordering, and draw sequencing
//!
//! The [`Renderer`] ties the frame together: it runs the portal visibility
//! walk to build the render list, draws opaque geometry in discovery order,
//! then collects every transparent polygon of the frame into the dynamic
//! BSP and replays it back-to-front. Actual submission goes through the
//! [`RenderBackend`] trait; the core never talks to a graphics API.

pub mod api;
pub mod bsp;
pub mod camera;
pub mod frustum;
pub mod visibility;

use thiserror::Error;

use crate::config::RendererConfig;
use crate::foundation::math::{Mat4, Vec3};
use crate::world::{
    BlendMode, Entity, LightKind, Room, RoomFlags, StaticMeshInstance, TextureId, Vertex, World,
};

pub use api::{
    BackendResult, DrawSpan, GpuLight, PrimitiveTopology, RenderBackend, ShaderVariant,
};
pub use bsp::DynamicBsp;
pub use camera::Camera;
pub use frustum::{Frustum, FrustumId, FrustumPool};
pub use visibility::{RenderFlags, RenderList, VisibilityWalker};

/// Renderer-specific error types
#[derive(Debug, Error)]
pub enum RenderError {
    /// A fixed-capacity frame structure ran out of slots
    #[error("{resource} capacity exhausted")]
    CapacityExhausted {
        /// The structure that ran out
        resource: &'static str,
    },
    /// The graphics backend rejected a submission
    #[error("backend error: {0}")]
    Backend(String),
    /// The renderer was handed an unusable configuration
    #[error("invalid configuration: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Result type for renderer operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Most lights a single entity draw can bind
const MAX_LIGHTS: usize = 8;

/// Point and shadow lights reach this far beyond their outer radius when
/// picking lights for an entity (level units)
const LIGHT_REACH_MARGIN: f32 = 1024.0;

/// Color grade multiplied into geometry drawn in water rooms
const WATER_TINT: [f32; 4] = [0.6, 0.7, 1.0, 1.0];

/// Frame orchestrator over an abstract graphics backend
///
/// Owns the frame-scoped structures (frustum pool, render list, BSP) and
/// sequences one frame as: visibility walk, sky, opaque rooms with optional
/// stencil masking, room contents, sprites, then the transparency pass.
pub struct Renderer {
    backend: Box<dyn RenderBackend>,
    config: RendererConfig,
    pool: FrustumPool,
    bsp: DynamicBsp,
    list: RenderList,
    walker: VisibilityWalker,
    spans: Vec<DrawSpan>,
}

impl Renderer {
    /// Create a renderer over a backend, sized by `config`
    ///
    /// Fails when the configuration carries an unusable capacity or
    /// heuristic value.
    pub fn new(backend: Box<dyn RenderBackend>, config: RendererConfig) -> RenderResult<Self> {
        config.validate()?;
        let pool = FrustumPool::new(config.frustum_pool_capacity);
        let bsp = DynamicBsp::new(config.bsp_max_nodes, config.bsp_max_polygons)
            .with_coplanar_epsilon(config.coplanar_epsilon);
        let walker =
            VisibilityWalker::new(config.max_portal_depth as usize, config.boundary_epsilon);
        let list = RenderList::new(0, config.render_list_headroom);
        Ok(Self {
            backend,
            config,
            pool,
            bsp,
            list,
            walker,
            spans: Vec::new(),
        })
    }

    /// Rebind the per-frame structures to a freshly loaded level
    pub fn reset_world(&mut self, world: &World) {
        self.list
            .rebind(world.room_count(), self.config.render_list_headroom);
        self.pool.reset();
    }

    /// Run the visibility pass: relocate the camera room and fill the
    /// render list through the portal graph
    pub fn gen_render_list(&mut self, world: &World, camera: &mut Camera) {
        if self.list.room_count() != world.room_count() {
            self.reset_world(world);
        }
        self.walker
            .gen_render_list(world, camera, &mut self.list, &mut self.pool);
    }

    /// Rooms visible after the last visibility pass
    pub fn render_list(&self) -> &RenderList {
        &self.list
    }

    /// Draw one frame from the current render list
    ///
    /// Pass order: sky, opaque room meshes in discovery order, static
    /// meshes and entities gated by each room's frustum chain, sprites,
    /// then every transparent polygon through the BSP back-to-front.
    pub fn draw_list(&mut self, world: &World, camera: &Camera) -> RenderResult<()> {
        self.backend.begin_frame()?;
        self.backend.set_view_projection(camera.view_projection());

        if self.list.flags().contains(RenderFlags::SKYBOX) {
            if let Some(sky) = world.skybox {
                // Sky follows the camera so it never parallaxes
                self.backend.bind_shader(ShaderVariant::UnlitTinted)?;
                self.backend.set_tint([1.0, 1.0, 1.0, 1.0]);
                self.backend.set_depth_write(false);
                self.backend
                    .set_model(&Mat4::new_translation(&camera.position));
                self.backend.draw_mesh(sky)?;
                self.backend.set_depth_write(true);
            }
        }

        for i in 0..self.list.len() {
            let entry = self.list.entry(i);
            self.draw_room(world, camera, entry.room)?;
        }
        for i in 0..self.list.len() {
            let entry = self.list.entry(i);
            self.draw_room_contents(world, camera, entry.room)?;
        }

        self.draw_sprites(world, camera)?;
        self.draw_transparency(world, camera)?;

        self.backend.end_frame()
    }

    /// Draw a room's opaque base mesh, stencil-masked when its clipped view
    /// could collide on screen with an overlapping room already in the list
    fn draw_room(&mut self, world: &World, _camera: &Camera, room_index: usize) -> RenderResult<()> {
        let room = &world.rooms[room_index];
        let Some(mesh) = &room.mesh else {
            return Ok(());
        };

        let chain = self.list.chain(room_index);
        let needs_stencil = !chain.is_empty()
            && room
                .overlapped_rooms
                .iter()
                .any(|&other| self.list.contains(other));

        if needs_stencil {
            // Mark the pixels covered by this room's portal silhouettes and
            // gate the room draw on them, so stacked rooms cannot bleed
            // through each other at shared screen regions
            self.backend.stencil_begin_silhouette()?;
            for &id in chain {
                if let Some(frustum) = self.pool.get(id) {
                    self.backend.draw_stencil_silhouette(&frustum.vertices)?;
                }
            }
            self.backend.stencil_gate_equal();
        }

        let water = room.flags.contains(RoomFlags::WATER);
        self.backend.bind_shader(ShaderVariant::Room { water })?;
        self.backend
            .set_tint(if water { WATER_TINT } else { [1.0, 1.0, 1.0, 1.0] });
        self.backend.set_model(&room.transform);
        self.backend.draw_mesh(mesh.handle)?;

        if needs_stencil {
            self.backend.stencil_end();
        }
        Ok(())
    }

    /// Draw a room's static meshes and entities, OBB-gated against the
    /// room's frustum chain, plus objects poking in from unlisted near rooms
    fn draw_room_contents(
        &mut self,
        world: &World,
        camera: &Camera,
        room_index: usize,
    ) -> RenderResult<()> {
        let room = &world.rooms[room_index];
        let water = room.flags.contains(RoomFlags::WATER);

        for instance in &room.static_meshes {
            // Re-fetch the chain so its borrow ends before the draw
            let chain = self.list.chain(room_index);
            if instance.hidden
                || !self
                    .pool
                    .is_obb_visible_in_chain(&instance.obb, chain, camera)
            {
                continue;
            }
            self.draw_static(instance, water)?;
        }

        for entity in &room.entities {
            let chain = self.list.chain(room_index);
            if !entity.visible
                || !self.pool.is_obb_visible_in_chain(&entity.obb, chain, camera)
            {
                continue;
            }
            self.draw_entity(room, entity)?;
        }

        // Objects anchored in an adjacent room can stick through the shared
        // boundary into this one; rooms already in the list draw their own
        // contents, so only unlisted neighbors contribute here
        for &near_index in &room.near_rooms {
            if self.list.contains(near_index) {
                continue;
            }
            let near = &world.rooms[near_index];
            let near_water = near.flags.contains(RoomFlags::WATER);

            for instance in &near.static_meshes {
                let chain = self.list.chain(room_index);
                if instance.hidden
                    || !instance.obb.intersects(&room.obb)
                    || !self
                        .pool
                        .is_obb_visible_in_chain(&instance.obb, chain, camera)
                {
                    continue;
                }
                self.draw_static(instance, near_water)?;
            }
            for entity in &near.entities {
                let chain = self.list.chain(room_index);
                if !entity.visible
                    || !entity.obb.intersects(&room.obb)
                    || !self.pool.is_obb_visible_in_chain(&entity.obb, chain, camera)
                {
                    continue;
                }
                self.draw_entity(near, entity)?;
            }
        }
        Ok(())
    }

    fn draw_static(&mut self, instance: &StaticMeshInstance, water: bool) -> RenderResult<()> {
        self.backend.bind_shader(ShaderVariant::StaticMesh)?;
        self.backend.set_tint(if water {
            water_grade(instance.tint)
        } else {
            instance.tint
        });
        self.backend.set_model(&instance.transform);
        self.backend.draw_mesh(instance.mesh)
    }

    fn draw_entity(&mut self, room: &Room, entity: &Entity) -> RenderResult<()> {
        let position = entity.obb.center;
        let lights = gather_lights(room, position);
        self.backend.bind_shader(ShaderVariant::Entity {
            light_count: lights.len() as u32,
        })?;
        self.backend.set_lights(&lights);
        self.backend.set_tint([1.0, 1.0, 1.0, 1.0]);

        for bone in &entity.bones {
            let model = entity.transform * bone.local_transform;
            self.backend.set_model(&model);
            self.backend.draw_mesh(bone.mesh)?;
        }
        Ok(())
    }

    /// Draw all visible room sprites as camera-facing quads, batched by
    /// texture
    fn draw_sprites(&mut self, world: &World, camera: &Camera) -> RenderResult<()> {
        struct SpriteBatch {
            texture: TextureId,
            vertices: Vec<Vertex>,
            indices: Vec<u32>,
        }
        let mut batches: Vec<SpriteBatch> = Vec::new();

        let right = camera.billboard_right();
        let up = Vec3::y();

        for i in 0..self.list.len() {
            let entry = self.list.entry(i);
            let room = &world.rooms[entry.room];
            // Every sprite of a listed room batches; sprites are small and
            // a per-anchor frustum test would cull quads whose edge is
            // still on screen
            for sprite in &room.sprites {
                let slot = match batches.iter().position(|b| b.texture == sprite.texture) {
                    Some(slot) => slot,
                    None => {
                        batches.push(SpriteBatch {
                            texture: sprite.texture,
                            vertices: Vec::new(),
                            indices: Vec::new(),
                        });
                        batches.len() - 1
                    }
                };
                let batch = &mut batches[slot];

                let base = batch.vertices.len() as u32;
                let corners = [
                    (sprite.left, sprite.bottom, [0.0, 1.0]),
                    (sprite.right, sprite.bottom, [1.0, 1.0]),
                    (sprite.right, sprite.top, [1.0, 0.0]),
                    (sprite.left, sprite.top, [0.0, 0.0]),
                ];
                for (x, y, uv) in corners {
                    let mut v = Vertex::at(sprite.position + right * x + up * y);
                    v.tex_coord = uv;
                    batch.vertices.push(v);
                }
                batch
                    .indices
                    .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
            }
        }

        if batches.is_empty() {
            return Ok(());
        }
        self.backend.bind_shader(ShaderVariant::Sprite)?;
        self.backend.set_model(&Mat4::identity());
        self.backend.set_tint([1.0, 1.0, 1.0, 1.0]);
        for batch in &batches {
            self.backend.bind_texture(batch.texture);
            self.backend
                .draw_sprite_batch(bytemuck::cast_slice(&batch.vertices), &batch.indices)?;
        }
        Ok(())
    }

    /// Collect the frame's transparent polygons into the BSP, upload the
    /// shared buffer once, and replay the tree back-to-front
    fn draw_transparency(&mut self, world: &World, camera: &Camera) -> RenderResult<()> {
        self.bsp.reset(&world.animations);

        for i in 0..self.list.len() {
            let entry = self.list.entry(i);
            let room = &world.rooms[entry.room];
            let chain = self.list.chain(entry.room);

            if let Some(mesh) = &room.mesh {
                if !mesh.transparency_polygons.is_empty() {
                    self.bsp.add_batch(
                        &mesh.transparency_polygons,
                        &room.transform,
                        camera.frustum(),
                    );
                }
            }
            for instance in &room.static_meshes {
                if instance.hidden
                    || instance.transparency_polygons.is_empty()
                    || !self
                        .pool
                        .is_obb_visible_in_chain(&instance.obb, chain, camera)
                {
                    continue;
                }
                self.bsp.add_batch(
                    &instance.transparency_polygons,
                    &instance.transform,
                    camera.frustum(),
                );
            }
            for entity in &room.entities {
                if !entity.visible
                    || !self.pool.is_obb_visible_in_chain(&entity.obb, chain, camera)
                {
                    continue;
                }
                for bone in &entity.bones {
                    if bone.transparency_polygons.is_empty() {
                        continue;
                    }
                    let model = entity.transform * bone.local_transform;
                    self.bsp
                        .add_batch(&bone.transparency_polygons, &model, camera.frustum());
                }
            }
        }

        if self.bsp.is_empty() {
            return Ok(());
        }

        let (vertices, indices) = self.bsp.frame_buffers();
        self.backend
            .upload_transparency_buffer(bytemuck::cast_slice(vertices), indices)?;

        self.spans.clear();
        self.bsp
            .collect_back_to_front(camera.position, &mut self.spans);

        self.backend.bind_shader(ShaderVariant::UnlitTinted)?;
        self.backend.set_tint([1.0, 1.0, 1.0, 1.0]);
        self.backend.set_model(&Mat4::identity());
        self.backend.set_depth_write(false);

        let mut bound_texture = None;
        let mut bound_blend = None;
        for span in &self.spans {
            if bound_texture != Some(span.texture) {
                self.backend.bind_texture(span.texture);
                bound_texture = Some(span.texture);
            }
            if bound_blend != Some(span.blend_mode) {
                self.backend.set_blend_mode(span.blend_mode);
                bound_blend = Some(span.blend_mode);
            }
            self.backend.draw_indexed(
                span.first_index,
                span.index_count,
                PrimitiveTopology::TriangleList,
            )?;
        }

        self.backend.set_blend_mode(BlendMode::Opaque);
        self.backend.set_depth_write(true);
        Ok(())
    }
}

/// Componentwise water grade over a draw tint
fn water_grade(tint: [f32; 4]) -> [f32; 4] {
    [
        tint[0] * WATER_TINT[0],
        tint[1] * WATER_TINT[1],
        tint[2] * WATER_TINT[2],
        tint[3] * WATER_TINT[3],
    ]
}

/// Pick the lights shading an entity at `position`
///
/// The sun always participates; point and shadow lights only when the
/// entity is within reach of their falloff.
fn gather_lights(room: &Room, position: Vec3) -> Vec<GpuLight> {
    let mut lights = Vec::with_capacity(MAX_LIGHTS.min(room.lights.len()));
    for light in &room.lights {
        if lights.len() == MAX_LIGHTS {
            break;
        }
        let in_reach = match light.kind {
            LightKind::Sun => true,
            LightKind::Point | LightKind::Shadow => {
                (light.position - position).magnitude() <= light.outer + LIGHT_REACH_MARGIN
            }
        };
        if in_reach {
            lights.push(GpuLight {
                position: [light.position.x, light.position.y, light.position.z],
                color: light.color,
                inner_radius: light.inner,
                outer_radius: light.outer,
            });
        }
    }
    lights
}
