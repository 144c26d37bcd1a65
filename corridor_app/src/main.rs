//! Corridor demo application
//!
//! Builds a small three-room corridor level (one room under water, torches,
//! columns, a patrolling guard entity, transparent water surfaces) and
//! walks the camera through it headlessly, logging what each frame's
//! visibility pass and draw sequencing produce.

use std::cell::Cell;
use std::rc::Rc;

use portal_renderer::foundation::logging;
use portal_renderer::prelude::*;
use portal_renderer::render::api::{BackendResult, GpuLight, PrimitiveTopology};
use portal_renderer::world::{
    AnimSeq, BoneMesh, LightKind, PointLight, TexAnimMode, TexFrame,
};

/// Per-frame submission counters shared out of the boxed backend
#[derive(Debug, Default, Clone, Copy)]
struct FrameStats {
    mesh_draws: u32,
    indexed_draws: u32,
    sprite_batches: u32,
    stencil_passes: u32,
}

/// Headless backend that only counts what a GPU backend would submit
struct StatsBackend {
    stats: Rc<Cell<FrameStats>>,
}

impl StatsBackend {
    fn new() -> (Self, Rc<Cell<FrameStats>>) {
        let stats = Rc::new(Cell::new(FrameStats::default()));
        (
            Self {
                stats: Rc::clone(&stats),
            },
            stats,
        )
    }

    fn bump(&self, f: impl FnOnce(&mut FrameStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

impl RenderBackend for StatsBackend {
    fn begin_frame(&mut self) -> BackendResult<()> {
        self.stats.set(FrameStats::default());
        Ok(())
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        Ok(())
    }

    fn bind_shader(&mut self, _variant: ShaderVariant) -> BackendResult<()> {
        Ok(())
    }

    fn set_view_projection(&mut self, _view_projection: &Mat4) {}

    fn set_model(&mut self, _model: &Mat4) {}

    fn set_tint(&mut self, _tint: [f32; 4]) {}

    fn set_lights(&mut self, _lights: &[GpuLight]) {}

    fn bind_texture(&mut self, _texture: TextureId) {}

    fn set_blend_mode(&mut self, _mode: BlendMode) {}

    fn set_depth_write(&mut self, _enabled: bool) {}

    fn draw_mesh(&mut self, _mesh: MeshHandle) -> BackendResult<()> {
        self.bump(|s| s.mesh_draws += 1);
        Ok(())
    }

    fn upload_transparency_buffer(
        &mut self,
        _vertices: &[u8],
        _indices: &[u32],
    ) -> BackendResult<()> {
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        _first_index: u32,
        _index_count: u32,
        _topology: PrimitiveTopology,
    ) -> BackendResult<()> {
        self.bump(|s| s.indexed_draws += 1);
        Ok(())
    }

    fn draw_sprite_batch(&mut self, _vertices: &[u8], _indices: &[u32]) -> BackendResult<()> {
        self.bump(|s| s.sprite_batches += 1);
        Ok(())
    }

    fn stencil_begin_silhouette(&mut self) -> BackendResult<()> {
        self.bump(|s| s.stencil_passes += 1);
        Ok(())
    }

    fn draw_stencil_silhouette(&mut self, _fan: &[Vec3]) -> BackendResult<()> {
        Ok(())
    }

    fn stencil_gate_equal(&mut self) {}

    fn stencil_end(&mut self) {}
}

const SECTOR: f32 = 1024.0;

fn transparent_quad(z: f32, y: f32, texture: u32, anim_id: Option<u16>) -> TransparencyPolygon {
    TransparencyPolygon {
        vertices: vec![
            Vertex::at(Vec3::new(-SECTOR / 2.0, y, z)),
            Vertex::at(Vec3::new(SECTOR / 2.0, y, z)),
            Vertex::at(Vec3::new(SECTOR / 2.0, y + 256.0, z)),
            Vertex::at(Vec3::new(-SECTOR / 2.0, y + 256.0, z)),
        ],
        texture: TextureId(texture),
        blend_mode: BlendMode::Screen,
        anim_id,
        frame_offset: 0,
    }
}

fn column(z: f32) -> StaticMeshInstance {
    let transform = Mat4::new_translation(&Vec3::new(300.0, -400.0, z));
    let local = Aabb::new(
        Vec3::new(-64.0, 0.0, -64.0),
        Vec3::new(64.0, 800.0, 64.0),
    );
    StaticMeshInstance {
        mesh: MeshHandle(200),
        transparency_polygons: Vec::new(),
        transform,
        obb: Obb::from_aabb_transform(&local, &transform),
        tint: [1.0, 1.0, 1.0, 1.0],
        hidden: false,
    }
}

fn guard(z: f32) -> Entity {
    let transform = Mat4::new_translation(&Vec3::new(-200.0, -400.0, z));
    let local = Aabb::new(
        Vec3::new(-128.0, 0.0, -128.0),
        Vec3::new(128.0, 768.0, 128.0),
    );
    Entity {
        visible: true,
        transform,
        obb: Obb::from_aabb_transform(&local, &transform),
        bones: vec![
            BoneMesh {
                mesh: MeshHandle(300),
                local_transform: Mat4::identity(),
                transparency_polygons: Vec::new(),
            },
            BoneMesh {
                mesh: MeshHandle(301),
                local_transform: Mat4::new_translation(&Vec3::new(0.0, 512.0, 0.0)),
                transparency_polygons: Vec::new(),
            },
        ],
    }
}

fn torch(z: f32) -> RoomSprite {
    RoomSprite {
        position: Vec3::new(420.0, 100.0, z),
        texture: TextureId(50),
        left: -48.0,
        right: 48.0,
        top: 96.0,
        bottom: -96.0,
    }
}

/// Three rooms in a row along -Z joined by full-wall portals; the middle
/// room is flooded
fn build_level() -> World {
    let half = SECTOR / 2.0;
    let mut rooms: Vec<Room> = (0..3)
        .map(|i| {
            let z_max = -(i as f32) * SECTOR;
            let mut room = Room::new(Aabb::new(
                Vec3::new(-half, -half, z_max - SECTOR),
                Vec3::new(half, half, z_max),
            ));
            room.mesh = Some(RoomMesh {
                handle: MeshHandle(100 + i as u64),
                transparency_polygons: Vec::new(),
            });
            room
        })
        .collect();

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
        Portal::new(verts, dest).expect("portal polygon is non-degenerate")
    };
    rooms[0].portals.push(portal_at(-SECTOR, true, 1));
    rooms[1].portals.push(portal_at(-SECTOR, false, 0));
    rooms[1].portals.push(portal_at(-2.0 * SECTOR, true, 2));
    rooms[2].portals.push(portal_at(-2.0 * SECTOR, false, 1));
    for i in 0..3 {
        rooms[i].near_rooms = (0..3).filter(|&j| j != i).collect();
    }

    rooms[0].flags |= RoomFlags::SKYBOX;
    rooms[0].static_meshes.push(column(-600.0));
    rooms[0].sprites.push(torch(-300.0));
    rooms[0].lights.push(PointLight {
        position: Vec3::new(420.0, 100.0, -300.0),
        color: [1.0, 0.7, 0.3, 1.0],
        inner: 256.0,
        outer: 1536.0,
        kind: LightKind::Point,
    });

    // The flooded middle room: water surface plus an animated caustic strip
    rooms[1].flags |= RoomFlags::WATER;
    if let Some(mesh) = &mut rooms[1].mesh {
        mesh.transparency_polygons.push(transparent_quad(-1400.0, -100.0, 60, None));
        mesh.transparency_polygons.push(transparent_quad(-1700.0, -100.0, 61, Some(0)));
    }
    rooms[1].entities.push(guard(-1500.0));
    rooms[1].lights.push(PointLight {
        position: Vec3::new(0.0, 400.0, -1500.0),
        color: [0.4, 0.6, 1.0, 1.0],
        inner: 128.0,
        outer: 1024.0,
        kind: LightKind::Point,
    });

    rooms[2].static_meshes.push(column(-2600.0));
    rooms[2].sprites.push(torch(-2300.0));

    let mut world = World::new(rooms);
    world.skybox = Some(MeshHandle(1));

    // Two-frame caustic flicker for the tagged water quad
    let frame = |v: f32| TexFrame {
        uv_basis: [[1.0, 0.0], [0.0, 1.0]],
        uv_offset: [0.0, v],
        uvrotate_max: 0.0,
        current_uvrotate: 0.0,
    };
    world
        .animations
        .sequences
        .push(AnimSeq::new(vec![frame(0.0), frame(0.5)], TexAnimMode::Forward, 0.25));

    world
}

fn main() {
    logging::init();
    log::info!("Building corridor level...");
    let world = build_level();
    log::info!("Level ready: {} rooms", world.room_count());

    let (backend, stats) = StatsBackend::new();
    let mut renderer = match Renderer::new(Box::new(backend), RendererConfig::default()) {
        Ok(renderer) => renderer,
        Err(err) => {
            log::error!("renderer setup failed: {err}");
            return;
        }
    };
    renderer.reset_world(&world);

    let mut camera = Camera::perspective(75.0, 16.0 / 9.0, 8.0, 65536.0);
    let mut world = world;

    // Fly from the first room into the flooded one, 120 simulated frames
    let dt = 1.0 / 60.0;
    for frame in 0..120 {
        let z = -256.0 - frame as f32 * 12.0;
        camera.look_at(
            Vec3::new(0.0, 0.0, z),
            Vec3::new(0.0, 0.0, z - SECTOR),
            Vec3::y(),
        );

        world.animations.advance(dt);
        renderer.gen_render_list(&world, &mut camera);
        if let Err(err) = renderer.draw_list(&world, &camera) {
            log::error!("frame {frame}: {err}");
            break;
        }

        if frame % 30 == 0 {
            let s = stats.get();
            log::info!(
                "frame {frame:3}: room {:?}, {} rooms visible, {} mesh draws, {} blended spans, {} sprite batches, {} stencil passes",
                camera.current_room,
                renderer.render_list().len(),
                s.mesh_draws,
                s.indexed_draws,
                s.sprite_batches,
                s.stencil_passes,
            );
        }
    }

    log::info!("Corridor demo finished");
}
