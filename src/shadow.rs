use std::sync::Arc;
use std::time::Duration;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use log::debug;

use crate::error::MaterialError;
use crate::light::{DirectionalLight, ObjectTransform};
use crate::material::{Material, ShaderPair, TextureBinding, UniformValue, Uniforms};
use crate::render_target::DepthTarget;
use crate::shader_source::{fetch_shader_pair, ShaderLoader};

/// Name of the single uniform a shadow material binds.
pub const LIGHT_MVP_UNIFORM: &str = "uLightMVP";

/// GPU layout of the shadow pass uniform block.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct LightMvpUniform {
    pub light_mvp: [[f32; 4]; 4],
}

/// Binds one object's light-space MVP to a light's depth target.
#[derive(Debug, Clone)]
pub struct ShadowMaterial {
    uniforms: Uniforms,
    shaders: ShaderPair,
    target: Arc<DepthTarget>,
    slot: u32,
}

impl ShadowMaterial {
    pub fn new(
        light: &DirectionalLight,
        transform: &ObjectTransform,
        slot: u32,
        shaders: ShaderPair,
    ) -> Result<Self, MaterialError> {
        let target = light
            .shadow_map()
            .cloned()
            .ok_or(MaterialError::MissingShadowMap)?;
        let mut uniforms = Uniforms::new();
        uniforms.insert(
            LIGHT_MVP_UNIFORM.to_string(),
            UniformValue::Mat4(light.light_mvp(transform)),
        );
        Ok(Self {
            uniforms,
            shaders,
            target,
            slot,
        })
    }

    pub fn light_mvp(&self) -> Mat4 {
        self.uniforms
            .get(LIGHT_MVP_UNIFORM)
            .and_then(UniformValue::as_mat4)
            .unwrap_or(Mat4::IDENTITY)
    }

    /// Column-major uniform block ready for upload.
    pub fn uniform_block(&self) -> LightMvpUniform {
        LightMvpUniform {
            light_mvp: self.light_mvp().to_cols_array_2d(),
        }
    }

    pub fn uniform_bytes(&self) -> Vec<u8> {
        bytemuck::bytes_of(&self.uniform_block()).to_vec()
    }
}

impl Material for ShadowMaterial {
    fn uniforms(&self) -> &Uniforms {
        &self.uniforms
    }

    fn textures(&self) -> &[TextureBinding] {
        &[]
    }

    fn shaders(&self) -> &ShaderPair {
        &self.shaders
    }

    fn render_target(&self) -> Option<&Arc<DepthTarget>> {
        Some(&self.target)
    }

    fn slot(&self) -> u32 {
        self.slot
    }
}

/// Fetches the depth shader pair, then binds the light MVP for `transform`.
///
/// Both sources are requested at once; construction only happens after
/// both arrive. A failed or timed-out fetch is returned and no material is
/// built.
pub async fn build_shadow_material(
    light: &DirectionalLight,
    transform: &ObjectTransform,
    slot: u32,
    loader: &dyn ShaderLoader,
    vertex_path: &str,
    fragment_path: &str,
    timeout: Duration,
) -> Result<ShadowMaterial, MaterialError> {
    if light.shadow_map().is_none() {
        return Err(MaterialError::MissingShadowMap);
    }
    let shaders = fetch_shader_pair(loader, vertex_path, fragment_path, timeout).await?;
    debug!(
        "binding shadow material for light {} at slot {slot}",
        light.label()
    );
    ShadowMaterial::new(light, transform, slot, shaders)
}
