//! Backend abstraction for draw submission
//!
//! The core never talks to a graphics API directly; it emits an ordered
//! command stream against the [`RenderBackend`] trait. Shader compilation,
//! buffer objects, and pipeline state live on the other side of this seam.

mod recording;
mod render_backend;

pub use recording::{BackendCommand, CommandLog, RecordingBackend};
pub use render_backend::{
    BackendResult, DrawSpan, GpuLight, PrimitiveTopology, RenderBackend, ShaderVariant,
};
