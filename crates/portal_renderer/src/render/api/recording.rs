//! Recording backend for tests and headless runs
//!
//! Captures the orchestrator's command stream so tests can assert pass
//! ordering and state transitions without a GPU.

use std::cell::RefCell;
use std::rc::Rc;

use crate::foundation::math::{Mat4, Vec3};
use crate::world::{BlendMode, MeshHandle, TextureId};

use super::render_backend::{BackendResult, GpuLight, PrimitiveTopology, RenderBackend, ShaderVariant};

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    /// `begin_frame`
    BeginFrame,
    /// `end_frame`
    EndFrame,
    /// `bind_shader`
    BindShader(ShaderVariant),
    /// `set_view_projection`
    SetViewProjection,
    /// `set_model`
    SetModel,
    /// `set_tint`
    SetTint([f32; 4]),
    /// `set_lights` with the light count
    SetLights(usize),
    /// `bind_texture`
    BindTexture(TextureId),
    /// `set_blend_mode`
    SetBlendMode(BlendMode),
    /// `set_depth_write`
    SetDepthWrite(bool),
    /// `draw_mesh`
    DrawMesh(MeshHandle),
    /// `upload_transparency_buffer` with (vertex bytes, index count)
    UploadTransparencyBuffer(usize, usize),
    /// `draw_indexed`
    DrawIndexed(u32, u32, PrimitiveTopology),
    /// `draw_sprite_batch` with (vertex bytes, index count)
    DrawSpriteBatch(usize, usize),
    /// `stencil_begin_silhouette`
    StencilBegin,
    /// `draw_stencil_silhouette` with the fan vertex count
    StencilSilhouette(usize),
    /// `stencil_gate_equal`
    StencilGateEqual,
    /// `stencil_end`
    StencilEnd,
}

/// Backend implementation that records every call
///
/// The command log is shared, so a test can keep a handle to it after the
/// recorder itself is boxed into a [`Renderer`](crate::render::Renderer).
#[derive(Debug, Default)]
pub struct RecordingBackend {
    commands: Rc<RefCell<Vec<BackendCommand>>>,
}

/// Shared view of a recorder's command stream
#[derive(Debug, Clone, Default)]
pub struct CommandLog(Rc<RefCell<Vec<BackendCommand>>>);

impl CommandLog {
    /// Snapshot of the recorded commands, in submission order
    pub fn commands(&self) -> Vec<BackendCommand> {
        self.0.borrow().clone()
    }

    /// Number of `draw_mesh` submissions recorded
    pub fn mesh_draw_count(&self) -> usize {
        self.0
            .borrow()
            .iter()
            .filter(|c| matches!(c, BackendCommand::DrawMesh(_)))
            .count()
    }

    /// Number of `draw_indexed` submissions recorded
    pub fn indexed_draw_count(&self) -> usize {
        self.0
            .borrow()
            .iter()
            .filter(|c| matches!(c, BackendCommand::DrawIndexed(..)))
            .count()
    }

    /// Position of the first command matching a predicate
    pub fn position_of(&self, pred: impl Fn(&BackendCommand) -> bool) -> Option<usize> {
        self.0.borrow().iter().position(pred)
    }

    /// Drop all recorded commands
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl RecordingBackend {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// A shared handle to this recorder's command stream
    pub fn log(&self) -> CommandLog {
        CommandLog(Rc::clone(&self.commands))
    }
}

impl RenderBackend for RecordingBackend {
    fn begin_frame(&mut self) -> BackendResult<()> {
        self.commands.borrow_mut().push(BackendCommand::BeginFrame);
        Ok(())
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        self.commands.borrow_mut().push(BackendCommand::EndFrame);
        Ok(())
    }

    fn bind_shader(&mut self, variant: ShaderVariant) -> BackendResult<()> {
        self.commands.borrow_mut().push(BackendCommand::BindShader(variant));
        Ok(())
    }

    fn set_view_projection(&mut self, _view_projection: &Mat4) {
        self.commands.borrow_mut().push(BackendCommand::SetViewProjection);
    }

    fn set_model(&mut self, _model: &Mat4) {
        self.commands.borrow_mut().push(BackendCommand::SetModel);
    }

    fn set_tint(&mut self, tint: [f32; 4]) {
        self.commands.borrow_mut().push(BackendCommand::SetTint(tint));
    }

    fn set_lights(&mut self, lights: &[GpuLight]) {
        self.commands.borrow_mut().push(BackendCommand::SetLights(lights.len()));
    }

    fn bind_texture(&mut self, texture: TextureId) {
        self.commands.borrow_mut().push(BackendCommand::BindTexture(texture));
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.commands.borrow_mut().push(BackendCommand::SetBlendMode(mode));
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.commands.borrow_mut().push(BackendCommand::SetDepthWrite(enabled));
    }

    fn draw_mesh(&mut self, mesh: MeshHandle) -> BackendResult<()> {
        self.commands.borrow_mut().push(BackendCommand::DrawMesh(mesh));
        Ok(())
    }

    fn upload_transparency_buffer(
        &mut self,
        vertices: &[u8],
        indices: &[u32],
    ) -> BackendResult<()> {
        self.commands.borrow_mut().push(BackendCommand::UploadTransparencyBuffer(
            vertices.len(),
            indices.len(),
        ));
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        first_index: u32,
        index_count: u32,
        topology: PrimitiveTopology,
    ) -> BackendResult<()> {
        self.commands
            .borrow_mut()
            .push(BackendCommand::DrawIndexed(first_index, index_count, topology));
        Ok(())
    }

    fn draw_sprite_batch(&mut self, vertices: &[u8], indices: &[u32]) -> BackendResult<()> {
        self.commands
            .borrow_mut()
            .push(BackendCommand::DrawSpriteBatch(vertices.len(), indices.len()));
        Ok(())
    }

    fn stencil_begin_silhouette(&mut self) -> BackendResult<()> {
        self.commands.borrow_mut().push(BackendCommand::StencilBegin);
        Ok(())
    }

    fn draw_stencil_silhouette(&mut self, fan: &[Vec3]) -> BackendResult<()> {
        self.commands
            .borrow_mut()
            .push(BackendCommand::StencilSilhouette(fan.len()));
        Ok(())
    }

    fn stencil_gate_equal(&mut self) {
        self.commands.borrow_mut().push(BackendCommand::StencilGateEqual);
    }

    fn stencil_end(&mut self) {
        self.commands.borrow_mut().push(BackendCommand::StencilEnd);
    }
}
