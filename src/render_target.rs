use std::fmt;
use std::sync::Arc;

use log::debug;
use parking_lot::{RwLock, RwLockWriteGuard};

use crate::error::ResourceError;

/// Depth value a freshly cleared texel holds.
pub const FAR_DEPTH: f32 = 1.0;

/// Parameters for allocating a light's depth target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthTargetDescriptor {
    pub label: String,
    pub width: u32,
    pub height: u32,
}

impl DepthTargetDescriptor {
    pub fn square(label: impl Into<String>, size: u32) -> Self {
        Self {
            label: label.into(),
            width: size,
            height: size,
        }
    }
}

/// Source of render-target resources.
///
/// Allocation is fallible; callers must not keep using an object whose
/// target failed to allocate.
pub trait GraphicsContext {
    fn create_depth_target(
        &self,
        desc: &DepthTargetDescriptor,
    ) -> Result<Arc<DepthTarget>, ResourceError>;
}

/// Graphics context that keeps depth targets in system memory.
#[derive(Debug, Clone, Copy)]
pub struct HeadlessContext {
    max_dimension: u32,
}

impl Default for HeadlessContext {
    fn default() -> Self {
        Self {
            max_dimension: Self::DEFAULT_MAX_DIMENSION,
        }
    }
}

impl HeadlessContext {
    pub const DEFAULT_MAX_DIMENSION: u32 = 8192;

    pub fn new() -> Self {
        Self::default()
    }

    /// Limits the side length of any target this context will allocate.
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self { max_dimension }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }
}

impl GraphicsContext for HeadlessContext {
    fn create_depth_target(
        &self,
        desc: &DepthTargetDescriptor,
    ) -> Result<Arc<DepthTarget>, ResourceError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(ResourceError::ZeroArea {
                label: desc.label.clone(),
                width: desc.width,
                height: desc.height,
            });
        }
        if desc.width > self.max_dimension || desc.height > self.max_dimension {
            return Err(ResourceError::ExceedsLimit {
                label: desc.label.clone(),
                width: desc.width,
                height: desc.height,
                max: self.max_dimension,
            });
        }
        debug!(
            "allocating depth target {} ({}x{})",
            desc.label, desc.width, desc.height
        );
        Ok(Arc::new(DepthTarget::new(desc)))
    }
}

/// Off-screen depth buffer owned by a light.
pub struct DepthTarget {
    label: String,
    width: u32,
    height: u32,
    texels: RwLock<Vec<f32>>,
}

impl fmt::Debug for DepthTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DepthTarget")
            .field("label", &self.label)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl DepthTarget {
    fn new(desc: &DepthTargetDescriptor) -> Self {
        let len = desc.width as usize * desc.height as usize;
        Self {
            label: desc.label.clone(),
            width: desc.width,
            height: desc.height,
            texels: RwLock::new(vec![FAR_DEPTH; len]),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Resets every texel to the far plane.
    pub fn clear(&self) {
        self.texels.write().fill(FAR_DEPTH);
    }

    /// Returns the stored depth, or `None` outside the target.
    pub fn depth_at(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = y as usize * self.width as usize + x as usize;
        self.texels.read().get(index).copied()
    }

    /// Counts texels that received a fragment since the last clear.
    pub fn covered_texels(&self) -> usize {
        self.texels
            .read()
            .iter()
            .filter(|&&depth| depth < FAR_DEPTH)
            .count()
    }

    /// Locks the target for writing. Held for the duration of one pass.
    pub fn write(&self) -> DepthWriter<'_> {
        DepthWriter {
            width: self.width,
            height: self.height,
            texels: self.texels.write(),
        }
    }
}

/// Exclusive write access to a depth target's texels.
pub struct DepthWriter<'a> {
    width: u32,
    height: u32,
    texels: RwLockWriteGuard<'a, Vec<f32>>,
}

impl DepthWriter<'_> {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Stores `depth` if it is nearer than the current texel.
    pub fn test_and_set(&mut self, x: u32, y: u32, depth: f32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let index = y as usize * self.width as usize + x as usize;
        let texel = &mut self.texels[index];
        if depth < *texel {
            *texel = depth;
            true
        } else {
            false
        }
    }
}
