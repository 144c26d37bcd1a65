//! Renderer configuration
//!
//! Capacity limits and heuristics for the per-frame structures. All fields
//! are serializable so capacities can be tuned per level without a rebuild;
//! supports TOML and RON config files.

pub use serde::{Deserialize, Serialize};

/// Configuration trait for serializable settings types
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, Default::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Capacity and heuristic settings for the per-frame renderer structures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Maximum number of portal frustums allocated in one frame
    pub frustum_pool_capacity: usize,

    /// Maximum number of BSP splitter nodes per frame
    pub bsp_max_nodes: usize,

    /// Maximum number of transparent polygons inserted into the BSP per frame
    pub bsp_max_polygons: usize,

    /// Render list slots reserved beyond the level's room count
    pub render_list_headroom: usize,

    /// Hard cap on the portal traversal depth (hops from the camera room)
    pub max_portal_depth: u32,

    /// World-unit slack for the speculative boundary expansion when the
    /// camera sits close to a neighbor room's AABB.
    ///
    /// Best-effort heuristic against floating-point edge cases when the
    /// camera is on a portal plane; validated empirically, not derived.
    pub boundary_epsilon: f32,

    /// Distance below which a polygon vertex counts as lying on a BSP
    /// splitting plane
    pub coplanar_epsilon: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frustum_pool_capacity: 1024,
            bsp_max_nodes: 4096,
            bsp_max_polygons: 16384,
            render_list_headroom: 32,
            max_portal_depth: 32,
            boundary_epsilon: 10.0,
            coplanar_epsilon: 1.0 / 64.0,
        }
    }
}

impl Config for RendererConfig {}

impl RendererConfig {
    /// Check that all capacities are usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frustum_pool_capacity == 0 {
            return Err(ConfigError::Parse(
                "frustum_pool_capacity must be non-zero".to_string(),
            ));
        }
        if self.bsp_max_nodes == 0 || self.bsp_max_polygons == 0 {
            return Err(ConfigError::Parse(
                "BSP arena capacities must be non-zero".to_string(),
            ));
        }
        if self.max_portal_depth == 0 {
            return Err(ConfigError::Parse(
                "max_portal_depth must be non-zero".to_string(),
            ));
        }
        if !self.boundary_epsilon.is_finite() || self.boundary_epsilon < 0.0 {
            return Err(ConfigError::Parse(
                "boundary_epsilon must be finite and non-negative".to_string(),
            ));
        }
        Ok(())
    }
}
