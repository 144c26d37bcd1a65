//! Animated texture sequences
//!
//! Levels author UV animations as frame sequences over the texture atlas:
//! plain forward/backward cycling, ping-pong ("reverse") cycling, and
//! continuous UV rotation. The table is advanced once per rendered frame;
//! the dynamic BSP snapshots it at reset so polygon insertion can resolve
//! the current frame's UVs.

/// Playback mode of an animated texture sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexAnimMode {
    /// Cycle frames forward
    Forward,
    /// Cycle frames backward (frame order is authored inverted)
    Backward,
    /// Ping-pong between the first and last frame
    Reverse,
}

/// One frame of an animated texture sequence: an affine UV transform into
/// the atlas region of that frame
#[derive(Debug, Clone, Copy)]
pub struct TexFrame {
    /// 2x2 UV basis (column-major: [u-axis, v-axis])
    pub uv_basis: [[f32; 2]; 2],
    /// UV translation into the frame's atlas region
    pub uv_offset: [f32; 2],
    /// Full-cycle V offset for uv-rotate sequences
    pub uvrotate_max: f32,
    /// Current V scroll within the cycle (updated during advance)
    pub current_uvrotate: f32,
}

impl TexFrame {
    /// Resolve a polygon UV through this frame
    pub fn apply(&self, uv: [f32; 2]) -> [f32; 2] {
        [
            self.uv_basis[0][0] * uv[0] + self.uv_basis[1][0] * uv[1] + self.uv_offset[0],
            self.uv_basis[0][1] * uv[0]
                + self.uv_basis[1][1] * uv[1]
                + self.uv_offset[1]
                + self.current_uvrotate,
        ]
    }
}

/// An animated texture sequence with its per-frame playback state
#[derive(Debug, Clone)]
pub struct AnimSeq {
    /// Atlas frames of the sequence
    pub frames: Vec<TexFrame>,
    /// Playback mode
    pub mode: TexAnimMode,
    /// Seconds per frame
    pub frame_rate: f32,
    /// Whether this sequence scrolls UVs continuously instead of stepping
    pub uvrotate: bool,
    /// Freeze playback (scripted sequences)
    pub frame_lock: bool,

    frame_time: f32,
    current_frame: usize,
    reverse_direction: bool,
}

impl AnimSeq {
    /// Create a sequence from frames, mode, and frame rate
    pub fn new(frames: Vec<TexFrame>, mode: TexAnimMode, frame_rate: f32) -> Self {
        Self {
            frames,
            mode,
            frame_rate,
            uvrotate: false,
            frame_lock: false,
            frame_time: 0.0,
            current_frame: 0,
            reverse_direction: false,
        }
    }

    /// Currently displayed frame index
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Advance playback by `dt` seconds
    pub fn advance(&mut self, dt: f32) {
        if self.frame_lock || self.frames.is_empty() {
            return;
        }

        self.frame_time += dt;
        if self.uvrotate {
            let steps = (self.frame_time / self.frame_rate).floor();
            self.frame_time -= steps * self.frame_rate;
            let frame = &mut self.frames[self.current_frame];
            frame.current_uvrotate = self.frame_time * frame.uvrotate_max / self.frame_rate;
        } else if self.frame_time >= self.frame_rate {
            let steps = (self.frame_time / self.frame_rate).floor();
            self.frame_time -= steps * self.frame_rate;

            match self.mode {
                TexAnimMode::Reverse => {
                    if self.reverse_direction {
                        if self.current_frame == 0 {
                            self.current_frame += 1;
                            self.reverse_direction = false;
                        } else {
                            self.current_frame -= 1;
                        }
                    } else if self.current_frame == self.frames.len() - 1 {
                        self.current_frame = self.current_frame.saturating_sub(1);
                        self.reverse_direction = true;
                    } else {
                        self.current_frame += 1;
                    }
                    self.current_frame %= self.frames.len();
                }
                TexAnimMode::Forward | TexAnimMode::Backward => {
                    self.current_frame = (self.current_frame + 1) % self.frames.len();
                }
            }
        }
    }
}

/// The level's animated-texture sequence table
#[derive(Debug, Clone, Default)]
pub struct TextureAnimations {
    /// All sequences, indexed by a polygon's `anim_id`
    pub sequences: Vec<AnimSeq>,
}

impl TextureAnimations {
    /// Create a table from sequences
    pub fn new(sequences: Vec<AnimSeq>) -> Self {
        Self { sequences }
    }

    /// Advance every unlocked sequence by `dt` seconds
    pub fn advance(&mut self, dt: f32) {
        for seq in &mut self.sequences {
            seq.advance(dt);
        }
    }

    /// Resolve a UV through a sequence's current frame
    ///
    /// Returns the input unchanged when `anim_id` is out of range (polygons
    /// from stale level data must not derail a frame).
    pub fn resolve_uv(&self, anim_id: u16, frame_offset: u16, uv: [f32; 2]) -> [f32; 2] {
        let Some(seq) = self.sequences.get(anim_id as usize) else {
            return uv;
        };
        if seq.frames.is_empty() {
            return uv;
        }
        let frame = (seq.current_frame + frame_offset as usize) % seq.frames.len();
        seq.frames[frame].apply(uv)
    }
}
