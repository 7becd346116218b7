//! Light-space transforms and shadow-pass bindings for directional shadow
//! mapping.
//!
//! A [`DirectionalLight`] owns its pose and its depth target. For every
//! object drawn into the shadow map, [`compute_light_space_mvp`] composes
//! `Projection · View · Model` in the light's frame, and a
//! [`ShadowMaterial`] binds that matrix together with the light's target so
//! a render pass can consume it. The GPU is kept outside of the crate; the
//! headless [`DepthPass`] rasterizes the bindings in system memory so the
//! whole pipeline stays testable.

pub mod depth_pass;
pub mod error;
pub mod light;
pub mod material;
pub mod mesh;
pub mod render_target;
pub mod scene;
pub mod shader_source;
pub mod shadow;

pub use depth_pass::{DepthPass, Draw, PassStats};
pub use error::{
    LightError, MaterialError, PoseError, ProjectionError, ResourceError, ShaderError,
};
pub use light::{
    compute_light_space_mvp, DirectionalLight, DirectionalLightDesc, LightPose, ObjectTransform,
    ProjectionConfig,
};
pub use material::{
    EmissiveMaterial, Material, ShaderPair, TextureBinding, UniformValue, Uniforms,
};
pub use mesh::Mesh;
pub use render_target::{DepthTarget, DepthTargetDescriptor, GraphicsContext, HeadlessContext};
pub use scene::{Scene, SceneLight, SceneObject};
pub use shader_source::{
    fetch_shader_pair, FsShaderLoader, MemoryShaderLoader, ShaderLoader, BUILTIN_FRAGMENT_PATH,
    BUILTIN_VERTEX_PATH,
};
pub use shadow::{build_shadow_material, LightMvpUniform, ShadowMaterial, LIGHT_MVP_UNIFORM};
