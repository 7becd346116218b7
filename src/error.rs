use std::io;
use std::time::Duration;

use thiserror::Error;

/// Reasons a light pose cannot produce a well-defined view matrix.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PoseError {
    #[error("light pose contains non-finite components")]
    NonFinite,
    #[error("focal point coincides with the light position")]
    CoincidentFocalPoint,
    #[error("up vector has zero length")]
    ZeroUpVector,
    #[error("up vector is parallel to the view direction")]
    ParallelUpVector,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ProjectionError {
    #[error("orthographic extent must be positive (got {0})")]
    NonPositiveExtent(f32),
    #[error("far plane ({far}) must lie beyond near plane ({near})")]
    InvertedDepthRange { near: f32, far: f32 },
    #[error("projection parameters must be finite")]
    NonFinite,
}

/// Failure to allocate a GPU-side (or emulated) resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("depth target {label:?} has zero area ({width}x{height})")]
    ZeroArea {
        label: String,
        width: u32,
        height: u32,
    },
    #[error("depth target {label:?} is {width}x{height}, exceeding the {max} texel limit")]
    ExceedsLimit {
        label: String,
        width: u32,
        height: u32,
        max: u32,
    },
}

#[derive(Debug, Error)]
pub enum LightError {
    #[error("invalid light pose")]
    Pose(#[from] PoseError),
    #[error("invalid shadow projection")]
    Projection(#[from] ProjectionError),
    #[error("failed to allocate shadow map")]
    Resource(#[from] ResourceError),
}

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("shader source not found: {0}")]
    NotFound(String),
    #[error("unable to read shader source {path}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("timed out after {timeout:?} fetching shaders {vertex} and {fragment}")]
    Timeout {
        vertex: String,
        fragment: String,
        timeout: Duration,
    },
}

#[derive(Debug, Error)]
pub enum MaterialError {
    #[error("light has no shadow map to render into")]
    MissingShadowMap,
    #[error("failed to fetch shadow shaders")]
    Shader(#[from] ShaderError),
}
