//! Texture binding records.

use std::collections::BTreeMap;

use prism_core::NameId;
use wgpu::TextureViewDimension;

use crate::device::TextureHandle;

/// A texture addressed by name, as supplied by scene code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureEntry {
    pub name: NameId,
    pub handle: TextureHandle,
    pub target: TextureViewDimension,
}

impl TextureEntry {
    /// A 2D texture entry.
    #[must_use]
    pub fn new(name: NameId, handle: TextureHandle) -> Self {
        Self {
            name,
            handle,
            target: TextureViewDimension::D2,
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: TextureViewDimension) -> Self {
        self.target = target;
        self
    }
}

/// A texture resolved to a texture unit of a specific pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundTexture {
    pub unit: u32,
    pub target: TextureViewDimension,
    pub handle: TextureHandle,
}

impl BoundTexture {
    #[must_use]
    pub fn new(unit: u32, entry: &TextureEntry) -> Self {
        Self {
            unit,
            target: entry.target,
            handle: entry.handle,
        }
    }
}

/// A render target texture, owned or referenced by a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub target: TextureViewDimension,
    pub handle: TextureHandle,
}

/// Name → texture table that render targets are published into and passes
/// resolve sampler inputs from.
pub type SharedTextures = BTreeMap<NameId, TextureEntry>;
