use std::collections::BTreeMap;
use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::render_target::DepthTarget;
use crate::shader_source::{EMISSIVE_FRAGMENT_SHADER, EMISSIVE_VERTEX_SHADER};

/// Typed value bound to a named shader uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec3(Vec3),
    Mat4(Mat4),
}

impl UniformValue {
    /// Uniform upload tag understood by the pass driver.
    pub fn gl_type(&self) -> &'static str {
        match self {
            UniformValue::Float(_) => "1f",
            UniformValue::Int(_) => "1i",
            UniformValue::Vec3(_) => "3fv",
            UniformValue::Mat4(_) => "matrix4fv",
        }
    }

    pub fn as_mat4(&self) -> Option<Mat4> {
        match self {
            UniformValue::Mat4(matrix) => Some(*matrix),
            _ => None,
        }
    }
}

pub type Uniforms = BTreeMap<String, UniformValue>;

/// Texture sampled by a material, bound to a texture unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureBinding {
    pub uniform: String,
    pub unit: u32,
}

/// Vertex and fragment shader source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderPair {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderPair {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }
}

/// Everything a render pass needs to issue a draw with this material.
pub trait Material {
    fn uniforms(&self) -> &Uniforms;
    fn textures(&self) -> &[TextureBinding];
    fn shaders(&self) -> &ShaderPair;
    /// Off-screen target, or `None` to draw to the default framebuffer.
    fn render_target(&self) -> Option<&Arc<DepthTarget>>;
    fn slot(&self) -> u32;
}

/// Unlit material used to visualise a light source.
#[derive(Debug, Clone)]
pub struct EmissiveMaterial {
    uniforms: Uniforms,
    shaders: ShaderPair,
}

impl EmissiveMaterial {
    pub const INTENSITY_UNIFORM: &'static str = "uLigIntensity";
    pub const COLOR_UNIFORM: &'static str = "uLightColor";

    pub fn new(intensity: f32, color: Vec3) -> Self {
        let mut uniforms = Uniforms::new();
        uniforms.insert(
            Self::INTENSITY_UNIFORM.to_string(),
            UniformValue::Float(intensity),
        );
        uniforms.insert(Self::COLOR_UNIFORM.to_string(), UniformValue::Vec3(color));
        Self {
            uniforms,
            shaders: ShaderPair::new(EMISSIVE_VERTEX_SHADER, EMISSIVE_FRAGMENT_SHADER),
        }
    }
}

impl Material for EmissiveMaterial {
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
        None
    }

    fn slot(&self) -> u32 {
        0
    }
}
