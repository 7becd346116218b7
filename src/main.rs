use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures::future::try_join_all;
use glam::Mat4;
use log::info;

use shadowcast::{
    build_shadow_material, DepthPass, DirectionalLight, DirectionalLightDesc, Draw,
    FsShaderLoader, GraphicsContext, HeadlessContext, MemoryShaderLoader, Mesh, Scene,
    ShaderLoader, ShadowMaterial, BUILTIN_FRAGMENT_PATH, BUILTIN_VERTEX_PATH,
};

const USAGE: &str = "Usage: shadowcast <scene.xml> [--shader-dir DIR] [--vertex NAME] \
[--fragment NAME] [--shadow-map-size N] [--timeout-ms N] [--print-matrices]";

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(err) = run().await {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let xml = tokio::fs::read_to_string(&options.scene_path)
        .await
        .with_context(|| format!("failed to read scene {}", options.scene_path.display()))?;
    let scene = Scene::from_xml(&xml).context("failed to parse scene XML")?;

    println!(
        "Loaded scene with {} objects ({} lights)",
        scene.objects.len(),
        scene.lights.len()
    );

    let context = HeadlessContext::new();
    let lights = build_lights(&context, &scene, options.shadow_map_size)?;

    let loader: Box<dyn ShaderLoader> = match &options.shader_dir {
        Some(dir) => Box::new(FsShaderLoader::new(dir)),
        None => Box::new(MemoryShaderLoader::with_builtin_shaders()),
    };

    let caster = Mesh::cube();
    for (slot, light) in lights.iter().enumerate() {
        let slot = slot as u32;
        let materials = bind_casters(&scene, light, slot, loader.as_ref(), &options).await?;

        let draws: Vec<Draw<'_>> = materials
            .iter()
            .map(|(_, material)| Draw {
                material,
                mesh: &caster,
            })
            .collect();
        let stats = DepthPass::new().execute(&draws);
        let covered = light
            .shadow_map()
            .map(|target| target.covered_texels())
            .unwrap_or_default();

        println!(
            "Light {} (slot {slot}): {} draw(s), {} triangle(s), {covered} texel(s) covered",
            light.label(),
            stats.draws,
            stats.triangles
        );
        if options.print_matrices {
            for (name, material) in &materials {
                print_matrix(name, &material.light_mvp());
            }
        }
    }

    for light in scene.lights.iter().filter(|light| !light.has_shadow_map) {
        println!("Light {}: no shadow map", light.name);
    }
    Ok(())
}

fn build_lights(
    context: &dyn GraphicsContext,
    scene: &Scene,
    shadow_map_size: u32,
) -> Result<Vec<DirectionalLight>> {
    scene
        .lights
        .iter()
        .filter(|light| light.has_shadow_map)
        .map(|light| {
            let mut desc = DirectionalLightDesc::new(light.name.clone(), light.pose()?);
            desc.intensity = light.intensity;
            desc.color = light.color;
            desc.projection = light.projection;
            desc.shadow_map_size = shadow_map_size;
            DirectionalLight::new(context, desc)
                .with_context(|| format!("failed to create light {}", light.name))
        })
        .collect()
}

/// Binds every shadow caster to `light`, fetching shaders for all of them at once.
async fn bind_casters(
    scene: &Scene,
    light: &DirectionalLight,
    slot: u32,
    loader: &dyn ShaderLoader,
    options: &CliOptions,
) -> Result<Vec<(String, ShadowMaterial)>> {
    let bindings = scene.shadow_casters().map(|object| async move {
        let material = build_shadow_material(
            light,
            &object.transform(),
            slot,
            loader,
            &options.vertex,
            &options.fragment,
            options.timeout,
        )
        .await
        .with_context(|| {
            format!(
                "failed to bind {} into the shadow map of {}",
                object.name,
                light.label()
            )
        })?;
        Ok::<_, anyhow::Error>((object.name.clone(), material))
    });
    let materials = try_join_all(bindings).await?;
    info!(
        "bound {} shadow caster(s) for light {}",
        materials.len(),
        light.label()
    );
    Ok(materials)
}

fn print_matrix(name: &str, matrix: &Mat4) {
    println!("   {name}:");
    for row in 0..4 {
        let row = matrix.row(row);
        println!(
            "     [{:>10.5} {:>10.5} {:>10.5} {:>10.5}]",
            row.x, row.y, row.z, row.w
        );
    }
}

struct CliOptions {
    scene_path: PathBuf,
    shader_dir: Option<PathBuf>,
    vertex: String,
    fragment: String,
    shadow_map_size: u32,
    timeout: Duration,
    print_matrices: bool,
}

impl CliOptions {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let Some(scene_path) = args.next() else {
            return Err(anyhow!(USAGE));
        };
        let mut options = Self {
            scene_path: PathBuf::from(scene_path),
            shader_dir: None,
            vertex: BUILTIN_VERTEX_PATH.to_string(),
            fragment: BUILTIN_FRAGMENT_PATH.to_string(),
            shadow_map_size: DirectionalLightDesc::DEFAULT_SHADOW_MAP_SIZE,
            timeout: Duration::from_millis(5000),
            print_matrices: false,
        };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--shader-dir" => {
                    options.shader_dir = Some(PathBuf::from(value(&mut args, &arg)?));
                }
                "--vertex" => options.vertex = value(&mut args, &arg)?,
                "--fragment" => options.fragment = value(&mut args, &arg)?,
                "--shadow-map-size" => {
                    options.shadow_map_size = value(&mut args, &arg)?
                        .parse()
                        .context("--shadow-map-size expects a texel count")?;
                }
                "--timeout-ms" => {
                    let millis: u64 = value(&mut args, &arg)?
                        .parse()
                        .context("--timeout-ms expects milliseconds")?;
                    options.timeout = Duration::from_millis(millis);
                }
                "--print-matrices" => options.print_matrices = true,
                other => {
                    return Err(anyhow!("Unknown argument: {other}. {USAGE}"));
                }
            }
        }
        Ok(options)
    }
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next().ok_or_else(|| anyhow!("{flag} expects a value"))
}
