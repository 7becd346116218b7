use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};
use log::debug;

use crate::error::ShaderError;
use crate::material::ShaderPair;

pub const BUILTIN_VERTEX_PATH: &str = "shadow.vert";
pub const BUILTIN_FRAGMENT_PATH: &str = "shadow.frag";

/// Depth-only vertex stage: positions go straight through the light MVP.
pub const DEPTH_VERTEX_SHADER: &str = r#"
attribute vec3 aVertexPosition;

uniform mat4 uLightMVP;

void main(void) {
    gl_Position = uLightMVP * vec4(aVertexPosition, 1.0);
}
"#;

/// Packs fragment depth into RGBA8 so it survives targets without float depth.
pub const DEPTH_FRAGMENT_SHADER: &str = r#"
#ifdef GL_ES
precision mediump float;
#endif

vec4 pack(float depth) {
    const vec4 bitShift = vec4(1.0, 256.0, 256.0 * 256.0, 256.0 * 256.0 * 256.0);
    const vec4 bitMask = vec4(1.0 / 256.0, 1.0 / 256.0, 1.0 / 256.0, 0.0);
    vec4 rgbaDepth = fract(depth * bitShift);
    rgbaDepth -= rgbaDepth.gbaa * bitMask;
    return rgbaDepth;
}

void main(void) {
    gl_FragColor = pack(gl_FragCoord.z);
}
"#;

pub(crate) const EMISSIVE_VERTEX_SHADER: &str = r#"
attribute vec3 aVertexPosition;

uniform mat4 uModelMatrix;
uniform mat4 uViewMatrix;
uniform mat4 uProjectionMatrix;

void main(void) {
    gl_Position = uProjectionMatrix * uViewMatrix * uModelMatrix * vec4(aVertexPosition, 1.0);
}
"#;

pub(crate) const EMISSIVE_FRAGMENT_SHADER: &str = r#"
#ifdef GL_ES
precision mediump float;
#endif

uniform float uLigIntensity;
uniform vec3 uLightColor;

void main(void) {
    gl_FragColor = vec4(uLightColor * uLigIntensity, 1.0);
}
"#;

/// Asynchronous source of shader text keyed by an opaque path.
pub trait ShaderLoader: Send + Sync {
    fn load<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<String, ShaderError>>;
}

/// Reads shader sources relative to a root directory.
#[derive(Debug, Clone)]
pub struct FsShaderLoader {
    root: PathBuf,
}

impl FsShaderLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ShaderLoader for FsShaderLoader {
    fn load<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<String, ShaderError>> {
        let full_path = self.root.join(path);
        async move {
            debug!("reading shader {}", full_path.display());
            tokio::fs::read_to_string(&full_path)
                .await
                .map_err(|err| match err.kind() {
                    io::ErrorKind::NotFound => ShaderError::NotFound(path.to_string()),
                    _ => ShaderError::Io {
                        path: path.to_string(),
                        source: err,
                    },
                })
        }
        .boxed()
    }
}

/// Shader sources held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryShaderLoader {
    sources: HashMap<String, String>,
}

impl MemoryShaderLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader preloaded with the depth-only pair under
    /// [`BUILTIN_VERTEX_PATH`] and [`BUILTIN_FRAGMENT_PATH`].
    pub fn with_builtin_shaders() -> Self {
        let mut loader = Self::new();
        loader.insert(BUILTIN_VERTEX_PATH, DEPTH_VERTEX_SHADER);
        loader.insert(BUILTIN_FRAGMENT_PATH, DEPTH_FRAGMENT_SHADER);
        loader
    }

    pub fn insert(&mut self, path: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(path.into(), source.into());
    }
}

impl ShaderLoader for MemoryShaderLoader {
    fn load<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<String, ShaderError>> {
        let result = self
            .sources
            .get(path)
            .cloned()
            .ok_or_else(|| ShaderError::NotFound(path.to_string()));
        future::ready(result).boxed()
    }
}

/// Fetches both stages concurrently and waits for both, up to `timeout`.
///
/// The first failure wins; nothing is returned unless both sources arrive.
pub async fn fetch_shader_pair(
    loader: &dyn ShaderLoader,
    vertex_path: &str,
    fragment_path: &str,
    timeout: Duration,
) -> Result<ShaderPair, ShaderError> {
    let fetch = async { tokio::try_join!(loader.load(vertex_path), loader.load(fragment_path)) };
    let (vertex, fragment) = tokio::time::timeout(timeout, fetch)
        .await
        .map_err(|_| ShaderError::Timeout {
            vertex: vertex_path.to_string(),
            fragment: fragment_path.to_string(),
            timeout,
        })??;
    Ok(ShaderPair::new(vertex, fragment))
}
