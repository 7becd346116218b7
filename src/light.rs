use std::sync::Arc;

use glam::{Mat4, Vec3};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{LightError, PoseError, ProjectionError};
use crate::material::EmissiveMaterial;
use crate::mesh::Mesh;
use crate::render_target::{DepthTarget, DepthTargetDescriptor, GraphicsContext};

/// Squared sine below which the up vector counts as parallel to the view axis.
const PARALLEL_EPSILON: f32 = 1e-6;

/// Where a light sits, what it looks at, and which way is up.
///
/// Only constructible through [`LightPose::new`], so a pose always yields a
/// well-formed view matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LightPose {
    position: Vec3,
    focal_point: Vec3,
    up: Vec3,
}

impl LightPose {
    pub fn new(position: Vec3, focal_point: Vec3, up: Vec3) -> Result<Self, PoseError> {
        if !(position.is_finite() && focal_point.is_finite() && up.is_finite()) {
            return Err(PoseError::NonFinite);
        }
        let direction = focal_point - position;
        if direction.length_squared() <= f32::EPSILON {
            return Err(PoseError::CoincidentFocalPoint);
        }
        if up.length_squared() <= f32::EPSILON {
            return Err(PoseError::ZeroUpVector);
        }
        if direction
            .normalize()
            .cross(up.normalize())
            .length_squared()
            < PARALLEL_EPSILON
        {
            return Err(PoseError::ParallelUpVector);
        }
        Ok(Self {
            position,
            focal_point,
            up,
        })
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn focal_point(&self) -> Vec3 {
        self.focal_point
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn direction(&self) -> Vec3 {
        (self.focal_point - self.position).normalize()
    }

    /// Right-handed look-at from the light towards its focal point.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.focal_point, self.up)
    }
}

/// Per-draw placement of an object. Rotation angles are radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectTransform {
    pub translation: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for ObjectTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ObjectTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    pub fn new(translation: Vec3, rotation: Vec3, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// `T · Rx · Ry · Rz · S`.
    ///
    /// The three rotations are chained one axis at a time, X first, which
    /// is not interchangeable with other Euler orderings.
    pub fn model_matrix(&self) -> Mat4 {
        let mut model = Mat4::from_translation(self.translation);
        model *= Mat4::from_rotation_x(self.rotation.x);
        model *= Mat4::from_rotation_y(self.rotation.y);
        model *= Mat4::from_rotation_z(self.rotation.z);
        model *= Mat4::from_scale(self.scale);
        model
    }
}

/// Orthographic volume covered by a light's shadow map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Half-width and half-height of the volume.
    pub ortho_size: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            ortho_size: 200.0,
            near: 0.01,
            far: 200.0,
        }
    }
}

impl ProjectionConfig {
    pub fn validate(&self) -> Result<(), ProjectionError> {
        if !(self.ortho_size.is_finite() && self.near.is_finite() && self.far.is_finite()) {
            return Err(ProjectionError::NonFinite);
        }
        if self.ortho_size <= 0.0 {
            return Err(ProjectionError::NonPositiveExtent(self.ortho_size));
        }
        if self.far <= self.near {
            return Err(ProjectionError::InvertedDepthRange {
                near: self.near,
                far: self.far,
            });
        }
        Ok(())
    }

    /// Right-handed orthographic matrix with clip z in `[-1, 1]`.
    pub fn projection_matrix(&self) -> Mat4 {
        let size = self.ortho_size;
        Mat4::orthographic_rh_gl(-size, size, -size, size, self.near, self.far)
    }
}

/// Maps object-local points into the light's clip space.
///
/// Computes `Projection · View · Model`; pure and never fails, since a
/// [`LightPose`] is always well-formed.
pub fn compute_light_space_mvp(
    transform: &ObjectTransform,
    pose: &LightPose,
    projection: &ProjectionConfig,
) -> Mat4 {
    let mut mvp = projection.projection_matrix();
    mvp *= pose.view_matrix();
    mvp *= transform.model_matrix();
    mvp
}

/// Construction parameters for a [`DirectionalLight`].
#[derive(Debug, Clone)]
pub struct DirectionalLightDesc {
    pub label: String,
    pub intensity: f32,
    pub color: Vec3,
    pub pose: LightPose,
    pub has_shadow_map: bool,
    pub projection: ProjectionConfig,
    pub shadow_map_size: u32,
}

impl DirectionalLightDesc {
    pub const DEFAULT_SHADOW_MAP_SIZE: u32 = 2048;

    pub fn new(label: impl Into<String>, pose: LightPose) -> Self {
        Self {
            label: label.into(),
            intensity: 1.0,
            color: Vec3::ONE,
            pose,
            has_shadow_map: true,
            projection: ProjectionConfig::default(),
            shadow_map_size: Self::DEFAULT_SHADOW_MAP_SIZE,
        }
    }
}

/// Directional light that owns its shadow-map depth target.
#[derive(Debug)]
pub struct DirectionalLight {
    label: String,
    intensity: f32,
    color: Vec3,
    pose: LightPose,
    projection: ProjectionConfig,
    shadow_map: Option<Arc<DepthTarget>>,
}

impl DirectionalLight {
    /// Builds the light, allocating its shadow map when requested.
    ///
    /// Fails if the projection is invalid or the depth target cannot be
    /// allocated; no light exists without the resources it asked for.
    pub fn new(
        context: &dyn GraphicsContext,
        desc: DirectionalLightDesc,
    ) -> Result<Self, LightError> {
        desc.projection.validate()?;
        let shadow_map = if desc.has_shadow_map {
            let target = context.create_depth_target(&DepthTargetDescriptor::square(
                format!("{}-shadow-map", desc.label),
                desc.shadow_map_size,
            ))?;
            Some(target)
        } else {
            None
        };
        info!(
            "created directional light {} at {:?} (shadow map: {})",
            desc.label,
            desc.pose.position(),
            shadow_map.is_some()
        );
        Ok(Self {
            label: desc.label,
            intensity: desc.intensity,
            color: desc.color,
            pose: desc.pose,
            projection: desc.projection,
            shadow_map,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn color(&self) -> Vec3 {
        self.color
    }

    pub fn pose(&self) -> &LightPose {
        &self.pose
    }

    pub fn projection(&self) -> &ProjectionConfig {
        &self.projection
    }

    pub fn shadow_map(&self) -> Option<&Arc<DepthTarget>> {
        self.shadow_map.as_ref()
    }

    pub fn light_mvp(&self, transform: &ObjectTransform) -> Mat4 {
        compute_light_space_mvp(transform, &self.pose, &self.projection)
    }

    /// Half-unit cube at the light's position, drawn with an emissive material.
    pub fn gizmo(&self) -> (Mesh, EmissiveMaterial) {
        let placement = ObjectTransform::new(self.pose.position(), Vec3::ZERO, Vec3::splat(0.5));
        (
            Mesh::cube().transformed(placement.model_matrix()),
            EmissiveMaterial::new(self.intensity, self.color),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use glam::Vec4;

    use super::*;
    use crate::error::ResourceError;
    use crate::material::{Material, UniformValue};
    use crate::render_target::HeadlessContext;

    const TOLERANCE: f32 = 1e-5;

    fn overhead_pose() -> LightPose {
        LightPose::new(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y).unwrap()
    }

    #[test]
    fn identity_transform_collapses_to_projection_view() {
        let pose = overhead_pose();
        let projection = ProjectionConfig::default();
        let mvp = compute_light_space_mvp(&ObjectTransform::IDENTITY, &pose, &projection);
        assert_eq!(mvp, projection.projection_matrix() * pose.view_matrix());
    }

    #[test]
    fn identical_inputs_give_identical_matrices() {
        let pose = LightPose::new(Vec3::new(40.0, 80.0, 40.0), Vec3::ZERO, Vec3::Y).unwrap();
        let transform = ObjectTransform::new(
            Vec3::new(3.0, -1.0, 7.5),
            Vec3::new(0.3, -0.7, 1.1),
            Vec3::new(2.0, 1.0, 0.5),
        );
        let projection = ProjectionConfig::default();
        let first = compute_light_space_mvp(&transform, &pose, &projection);
        let second = compute_light_space_mvp(&transform, &pose, &projection);
        assert_eq!(first.to_cols_array(), second.to_cols_array());
    }

    #[test]
    fn rotations_chain_x_then_y_then_z() {
        let transform = ObjectTransform::new(
            Vec3::ZERO,
            Vec3::new(FRAC_PI_2, FRAC_PI_2, FRAC_PI_2),
            Vec3::ONE,
        );
        // Rx(90) * Ry(90) * Rz(90), worked out by hand.
        let expected = Mat4::from_cols(
            Vec4::new(0.0, 0.0, 1.0, 0.0),
            Vec4::new(0.0, -1.0, 0.0, 0.0),
            Vec4::new(1.0, 0.0, 0.0, 0.0),
            Vec4::W,
        );
        let model = transform.model_matrix();
        assert!(model.abs_diff_eq(expected, TOLERANCE), "{model:?}");

        let reversed = Mat4::from_rotation_z(FRAC_PI_2)
            * Mat4::from_rotation_y(FRAC_PI_2)
            * Mat4::from_rotation_x(FRAC_PI_2);
        assert!(!model.abs_diff_eq(reversed, TOLERANCE));
    }

    #[test]
    fn x_then_y_differs_from_y_then_x() {
        let transform =
            ObjectTransform::new(Vec3::ZERO, Vec3::new(FRAC_PI_2, FRAC_PI_2, 0.0), Vec3::ONE);
        let model = transform.model_matrix();
        // Local X lands on world Y, local Y on world Z.
        assert!(model.transform_vector3(Vec3::X).abs_diff_eq(Vec3::Y, TOLERANCE));
        assert!(model.transform_vector3(Vec3::Y).abs_diff_eq(Vec3::Z, TOLERANCE));
        assert!(model.transform_vector3(Vec3::Z).abs_diff_eq(Vec3::X, TOLERANCE));

        let other_order = Mat4::from_rotation_y(FRAC_PI_2) * Mat4::from_rotation_x(FRAC_PI_2);
        assert!(!model.abs_diff_eq(other_order, TOLERANCE));
    }

    #[test]
    fn translation_applies_after_rotation_and_scale() {
        let transform = ObjectTransform::new(
            Vec3::new(5.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, FRAC_PI_2),
            Vec3::splat(2.0),
        );
        let point = transform.model_matrix().transform_point3(Vec3::X);
        assert!(point.abs_diff_eq(Vec3::new(5.0, 2.0, 0.0), TOLERANCE));
    }

    #[test]
    fn scale_is_applied_per_axis() {
        let transform = ObjectTransform::new(Vec3::ZERO, Vec3::ZERO, Vec3::new(2.0, 1.0, 0.5));
        let model = transform.model_matrix();
        assert_eq!(model.transform_vector3(Vec3::X), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(model.transform_vector3(Vec3::Y), Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(model.transform_vector3(Vec3::Z), Vec3::new(0.0, 0.0, 0.5));
    }

    #[test]
    fn orthographic_depth_range_matches_gl_convention() {
        let config = ProjectionConfig::default();
        let projection = config.projection_matrix();

        let origin = projection.project_point3(Vec3::ZERO);
        let expected = -(config.far + config.near) / (config.far - config.near);
        assert!((origin.z - expected).abs() < TOLERANCE);

        let near = projection.project_point3(Vec3::new(0.0, 0.0, -config.near));
        assert!((near.z + 1.0).abs() < TOLERANCE);
        let far = projection.project_point3(Vec3::new(0.0, 0.0, -config.far));
        assert!((far.z - 1.0).abs() < TOLERANCE);

        let corner = projection.project_point3(Vec3::new(200.0, -200.0, -100.0));
        assert!((corner.x - 1.0).abs() < TOLERANCE);
        assert!((corner.y + 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn focal_point_projects_to_clip_centre() {
        let pose = LightPose::new(Vec3::new(0.0, 100.0, 0.0), Vec3::ZERO, Vec3::Z).unwrap();
        let mvp = compute_light_space_mvp(
            &ObjectTransform::IDENTITY,
            &pose,
            &ProjectionConfig::default(),
        );
        let clip = mvp.project_point3(Vec3::ZERO);
        assert!(clip.x.abs() < TOLERANCE && clip.y.abs() < TOLERANCE);
        // 100 units in front of the light, half way through [0.01, 200].
        assert!(clip.z.abs() < 1e-3);
    }

    #[test]
    fn degenerate_poses_are_rejected() {
        assert_eq!(
            LightPose::new(Vec3::ONE, Vec3::ONE, Vec3::Y),
            Err(PoseError::CoincidentFocalPoint)
        );
        assert_eq!(
            LightPose::new(Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO, Vec3::Y),
            Err(PoseError::ParallelUpVector)
        );
        assert_eq!(
            LightPose::new(Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO, Vec3::NEG_Y * 3.0),
            Err(PoseError::ParallelUpVector)
        );
        assert_eq!(
            LightPose::new(Vec3::Z, Vec3::ZERO, Vec3::ZERO),
            Err(PoseError::ZeroUpVector)
        );
        assert_eq!(
            LightPose::new(Vec3::new(f32::NAN, 0.0, 0.0), Vec3::ZERO, Vec3::Y),
            Err(PoseError::NonFinite)
        );
    }

    #[test]
    fn projection_validation() {
        assert!(ProjectionConfig::default().validate().is_ok());
        let flat = ProjectionConfig {
            ortho_size: 0.0,
            ..ProjectionConfig::default()
        };
        assert_eq!(flat.validate(), Err(ProjectionError::NonPositiveExtent(0.0)));
        let inverted = ProjectionConfig {
            near: 10.0,
            far: 1.0,
            ..ProjectionConfig::default()
        };
        assert_eq!(
            inverted.validate(),
            Err(ProjectionError::InvertedDepthRange { near: 10.0, far: 1.0 })
        );
    }

    #[test]
    fn light_allocates_its_shadow_map() {
        let mut desc = DirectionalLightDesc::new("sun", overhead_pose());
        desc.shadow_map_size = 32;
        let light = DirectionalLight::new(&HeadlessContext::new(), desc).unwrap();
        let target = light.shadow_map().unwrap();
        assert_eq!(target.size(), (32, 32));
        assert_eq!(target.label(), "sun-shadow-map");
        assert_eq!(
            light.light_mvp(&ObjectTransform::IDENTITY),
            compute_light_space_mvp(
                &ObjectTransform::IDENTITY,
                light.pose(),
                light.projection()
            )
        );
    }

    #[test]
    fn light_without_shadow_map_allocates_nothing() {
        let mut desc = DirectionalLightDesc::new("fill", overhead_pose());
        desc.has_shadow_map = false;
        let light = DirectionalLight::new(&HeadlessContext::with_max_dimension(0), desc).unwrap();
        assert!(light.shadow_map().is_none());
    }

    #[test]
    fn failed_allocation_aborts_light_construction() {
        let desc = DirectionalLightDesc::new("sun", overhead_pose());
        let err = DirectionalLight::new(&HeadlessContext::with_max_dimension(1024), desc)
            .unwrap_err();
        assert!(matches!(
            err,
            LightError::Resource(ResourceError::ExceedsLimit { max: 1024, .. })
        ));
    }

    #[test]
    fn invalid_projection_aborts_light_construction() {
        let mut desc = DirectionalLightDesc::new("sun", overhead_pose());
        desc.projection.far = desc.projection.near;
        let err = DirectionalLight::new(&HeadlessContext::new(), desc).unwrap_err();
        assert!(matches!(err, LightError::Projection(_)));
    }

    #[test]
    fn gizmo_sits_on_the_light() {
        let mut desc = DirectionalLightDesc::new("sun", overhead_pose());
        desc.shadow_map_size = 8;
        desc.intensity = 3.0;
        let light = DirectionalLight::new(&HeadlessContext::new(), desc).unwrap();
        let (mesh, material) = light.gizmo();
        assert_eq!(mesh.position(0), Some(Vec3::new(-0.25, -0.25, 10.25)));
        assert_eq!(
            material.uniforms()[EmissiveMaterial::INTENSITY_UNIFORM],
            UniformValue::Float(3.0)
        );
    }
}
