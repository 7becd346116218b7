use std::sync::Arc;

use glam::{Mat4, Vec3};
use log::{debug, warn};

use crate::material::{Material, UniformValue};
use crate::mesh::Mesh;
use crate::render_target::{DepthTarget, DepthWriter};
use crate::shadow::LIGHT_MVP_UNIFORM;

/// One mesh drawn with one material.
#[derive(Clone, Copy)]
pub struct Draw<'a> {
    pub material: &'a dyn Material,
    pub mesh: &'a Mesh,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassStats {
    pub draws: usize,
    pub skipped: usize,
    pub triangles: usize,
    pub fragments: usize,
}

/// Software depth-only pass that renders bound materials into their targets.
#[derive(Debug, Clone, Copy)]
pub struct DepthPass {
    clear_targets: bool,
}

impl Default for DepthPass {
    fn default() -> Self {
        Self {
            clear_targets: true,
        }
    }
}

impl DepthPass {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps whatever depth the targets already hold.
    pub fn preserving_targets() -> Self {
        Self {
            clear_targets: false,
        }
    }

    pub fn execute(&self, draws: &[Draw<'_>]) -> PassStats {
        if self.clear_targets {
            clear_targets(draws);
        }

        let mut stats = PassStats::default();
        for draw in draws {
            let Some(target) = draw.material.render_target() else {
                warn!("skipping draw without a depth target");
                stats.skipped += 1;
                continue;
            };
            let Some(mvp) = draw
                .material
                .uniforms()
                .get(LIGHT_MVP_UNIFORM)
                .and_then(UniformValue::as_mat4)
            else {
                warn!(
                    "skipping draw into {} without a {LIGHT_MVP_UNIFORM} matrix",
                    target.label()
                );
                stats.skipped += 1;
                continue;
            };

            let mut writer = target.write();
            let mut fragments = 0;
            for triangle in draw.mesh.triangles() {
                stats.triangles += 1;
                fragments += rasterize(&mut writer, mvp, triangle);
            }
            debug!(
                "slot {}: {fragments} fragment(s) into {}",
                draw.material.slot(),
                target.label()
            );
            stats.fragments += fragments;
            stats.draws += 1;
        }
        stats
    }
}

fn clear_targets(draws: &[Draw<'_>]) {
    let mut cleared: Vec<&Arc<DepthTarget>> = Vec::new();
    for target in draws.iter().filter_map(|draw| draw.material.render_target()) {
        if !cleared.iter().any(|seen| Arc::ptr_eq(seen, target)) {
            target.clear();
            cleared.push(target);
        }
    }
}

/// Rasterizes one triangle with a less-than depth test, sampling at texel
/// centres. Returns the number of texels written.
fn rasterize(writer: &mut DepthWriter<'_>, mvp: Mat4, triangle: [Vec3; 3]) -> usize {
    let (width, height) = writer.size();
    let (w, h) = (width as f32, height as f32);

    let mut screen = [Vec3::ZERO; 3];
    for (out, position) in screen.iter_mut().zip(triangle) {
        let clip = mvp * position.extend(1.0);
        if clip.w <= f32::EPSILON {
            return 0;
        }
        let ndc = clip.truncate() / clip.w;
        *out = Vec3::new(
            (ndc.x * 0.5 + 0.5) * w,
            (0.5 - ndc.y * 0.5) * h,
            ndc.z * 0.5 + 0.5,
        );
    }

    let [a, b, c] = screen;
    let area = edge(a, b, c);
    if area.abs() <= f32::EPSILON {
        return 0;
    }

    let min_x = a.x.min(b.x).min(c.x).floor().max(0.0) as u32;
    let max_x = a.x.max(b.x).max(c.x).ceil().min(w) as u32;
    let min_y = a.y.min(b.y).min(c.y).floor().max(0.0) as u32;
    let max_y = a.y.max(b.y).max(c.y).ceil().min(h) as u32;

    let mut written = 0;
    for y in min_y..max_y {
        for x in min_x..max_x {
            let p = Vec3::new(x as f32 + 0.5, y as f32 + 0.5, 0.0);
            let w0 = edge(b, c, p) / area;
            let w1 = edge(c, a, p) / area;
            let w2 = edge(a, b, p) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }
            let depth = w0 * a.z + w1 * b.z + w2 * c.z;
            if !(0.0..=1.0).contains(&depth) {
                continue;
            }
            if writer.test_and_set(x, y, depth) {
                written += 1;
            }
        }
    }
    written
}

fn edge(a: Vec3, b: Vec3, p: Vec3) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::{
        DirectionalLight, DirectionalLightDesc, LightPose, ObjectTransform, ProjectionConfig,
    };
    use crate::material::{EmissiveMaterial, ShaderPair};
    use crate::render_target::{HeadlessContext, FAR_DEPTH};
    use crate::shadow::ShadowMaterial;

    fn make_light() -> DirectionalLight {
        let pose = LightPose::new(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y).unwrap();
        let mut desc = DirectionalLightDesc::new("key", pose);
        desc.shadow_map_size = 8;
        desc.projection = ProjectionConfig {
            ortho_size: 1.0,
            near: 0.01,
            far: 20.0,
        };
        DirectionalLight::new(&HeadlessContext::new(), desc).unwrap()
    }

    fn shadow_material(light: &DirectionalLight, transform: ObjectTransform) -> ShadowMaterial {
        ShadowMaterial::new(light, &transform, 0, ShaderPair::new("vs", "fs")).unwrap()
    }

    #[test]
    fn cube_covers_its_footprint_with_front_face_depth() {
        let light = make_light();
        let material = shadow_material(&light, ObjectTransform::IDENTITY);
        let cube = Mesh::cube();

        let stats = DepthPass::new().execute(&[Draw {
            material: &material,
            mesh: &cube,
        }]);
        assert_eq!(stats.draws, 1);
        assert_eq!(stats.triangles, 12);

        let target = light.shadow_map().unwrap();
        // The cube spans half the volume: the centre 4x4 texels.
        assert_eq!(target.covered_texels(), 16);
        assert_eq!(target.depth_at(1, 1), Some(FAR_DEPTH));

        let front = material.light_mvp().project_point3(Vec3::new(0.0, 0.0, 0.5));
        let expected = front.z * 0.5 + 0.5;
        let depth = target.depth_at(4, 4).unwrap();
        assert!((depth - expected).abs() < 1e-4, "{depth} vs {expected}");
    }

    #[test]
    fn nearer_object_wins_the_depth_test() {
        let light = make_light();
        let far = shadow_material(&light, ObjectTransform::IDENTITY);
        let near = shadow_material(
            &light,
            ObjectTransform::new(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, Vec3::splat(0.5)),
        );
        let cube = Mesh::cube();

        DepthPass::new().execute(&[
            Draw {
                material: &far,
                mesh: &cube,
            },
            Draw {
                material: &near,
                mesh: &cube,
            },
        ]);

        let target = light.shadow_map().unwrap();
        let far_depth =
            far.light_mvp().project_point3(Vec3::new(0.0, 0.0, 0.5)).z * 0.5 + 0.5;
        assert!(target.depth_at(4, 4).unwrap() < far_depth);
        assert!((target.depth_at(2, 2).unwrap() - far_depth).abs() < 1e-4);
    }

    #[test]
    fn draws_without_target_or_matrix_are_skipped() {
        let emissive = EmissiveMaterial::new(1.0, Vec3::ONE);
        let cube = Mesh::cube();
        let stats = DepthPass::new().execute(&[Draw {
            material: &emissive,
            mesh: &cube,
        }]);
        assert_eq!(
            stats,
            PassStats {
                draws: 0,
                skipped: 1,
                triangles: 0,
                fragments: 0,
            }
        );
    }

    #[test]
    fn targets_are_cleared_unless_preserved() {
        let light = make_light();
        let material = shadow_material(&light, ObjectTransform::IDENTITY);
        let cube = Mesh::cube();
        let draws = [Draw {
            material: &material,
            mesh: &cube,
        }];

        DepthPass::new().execute(&draws);
        let stats = DepthPass::preserving_targets().execute(&draws);
        assert_eq!(stats.fragments, 0);

        let stats = DepthPass::new().execute(&draws);
        assert_eq!(stats.fragments, 16);
    }

    #[test]
    fn geometry_outside_the_volume_writes_nothing() {
        let light = make_light();
        let material = shadow_material(
            &light,
            ObjectTransform::new(Vec3::new(50.0, 0.0, 0.0), Vec3::ZERO, Vec3::ONE),
        );
        let cube = Mesh::cube();
        let stats = DepthPass::new().execute(&[Draw {
            material: &material,
            mesh: &cube,
        }]);
        assert_eq!(stats.fragments, 0);
        assert_eq!(light.shadow_map().unwrap().covered_texels(), 0);
    }
}
