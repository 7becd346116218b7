use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::light::{LightPose, ObjectTransform, ProjectionConfig};

/// Runtime representation of a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
    pub lights: Vec<SceneLight>,
}

impl Scene {
    /// Parses the scene XML produced by the authoring tools.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene XML")?;
        let mut objects = Vec::new();
        let mut lights = Vec::new();

        for node in document.descendants().filter(|n| n.has_tag_name("object")) {
            let mut object = SceneObject::default();
            object.name = required_text(&node, "name")?;
            object.object_type = optional_text(&node, "type").unwrap_or_else(|| "mesh".to_string());
            object.color = parse_color(optional_text(&node, "color"), object.color)?;
            object.position = parse_vec3(optional_text(&node, "position"), object.position)?;
            object.rotation = parse_vec3(optional_text(&node, "rotation"), object.rotation)?;
            object.scale = parse_vec3(optional_text(&node, "scale"), object.scale)?;
            object.intensity = parse_f32(optional_text(&node, "intensity"), object.intensity)?;

            if object.object_type == "light" {
                lights.push(
                    parse_light(&node, &object)
                        .with_context(|| format!("invalid light {}", object.name))?,
                );
            }
            objects.push(object);
        }

        Ok(Self { objects, lights })
    }

    /// Objects that cast shadows into the light's depth target.
    pub fn shadow_casters(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter().filter(|o| o.object_type == "mesh")
    }
}

/// Scene object as described by the authoring tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default = "default_color")]
    pub color: Vec3,
    #[serde(default)]
    pub position: Vec3,
    /// Euler angles in degrees, applied X, then Y, then Z.
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default = "default_scale")]
    pub scale: Vec3,
    #[serde(default = "default_intensity")]
    pub intensity: f32,
}

impl Default for SceneObject {
    fn default() -> Self {
        Self {
            name: String::new(),
            object_type: String::new(),
            color: default_color(),
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            intensity: default_intensity(),
        }
    }
}

impl SceneObject {
    pub fn transform(&self) -> ObjectTransform {
        let rotation = Vec3::new(
            self.rotation.x.to_radians(),
            self.rotation.y.to_radians(),
            self.rotation.z.to_radians(),
        );
        ObjectTransform::new(self.position, rotation, self.scale)
    }
}

fn default_color() -> Vec3 {
    Vec3::ONE
}

fn default_scale() -> Vec3 {
    Vec3::ONE
}

fn default_intensity() -> f32 {
    1.0
}

fn default_up() -> Vec3 {
    Vec3::Y
}

fn default_shadow() -> bool {
    true
}

/// Directional light extracted from the scene object list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneLight {
    pub name: String,
    pub position: Vec3,
    #[serde(default)]
    pub focal_point: Vec3,
    #[serde(default = "default_up")]
    pub up: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    #[serde(default = "default_shadow")]
    pub has_shadow_map: bool,
    #[serde(default)]
    pub projection: ProjectionConfig,
}

impl SceneLight {
    pub fn pose(&self) -> Result<LightPose> {
        LightPose::new(self.position, self.focal_point, self.up)
            .map_err(|err| anyhow!("light {}: {err}", self.name))
    }
}

fn parse_light(node: &Node<'_, '_>, object: &SceneObject) -> Result<SceneLight> {
    let defaults = ProjectionConfig::default();
    let projection = ProjectionConfig {
        ortho_size: parse_f32(optional_text(node, "ortho_size"), defaults.ortho_size)?,
        near: parse_f32(optional_text(node, "near"), defaults.near)?,
        far: parse_f32(optional_text(node, "far"), defaults.far)?,
    };
    Ok(SceneLight {
        name: object.name.clone(),
        position: object.position,
        focal_point: parse_vec3(optional_text(node, "focal"), Vec3::ZERO)?,
        up: parse_vec3(optional_text(node, "up"), default_up())?,
        color: object.color,
        intensity: object.intensity,
        has_shadow_map: parse_bool(optional_text(node, "shadow"), default_shadow())?,
        projection,
    })
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_components(value: &str, what: &str) -> Result<[f32; 3]> {
    let components = value
        .split_whitespace()
        .map(|component| {
            component
                .parse::<f32>()
                .map_err(|err| anyhow!("invalid {what} component {component:?}: {err}"))
        })
        .collect::<Result<Vec<_>>>()?;
    <[f32; 3]>::try_from(components.as_slice())
        .map_err(|_| anyhow!("{what} needs 3 components, found {}", components.len()))
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    Ok(Vec3::from_array(parse_components(&value, "vector")?))
}

fn parse_color(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    Ok(Vec3::from_array(parse_components(&value, "color")?) / 255.0)
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float: {err}")),
        None => Ok(default),
    }
}

fn parse_bool(value: Option<String>, default: bool) -> Result<bool> {
    match value.as_deref() {
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some("false") | Some("0") | Some("no") => Ok(false),
        Some(other) => Err(anyhow!("expected a boolean, found {other:?}")),
        None => Ok(default),
    }
}
