//! Models: geometry a pass draws.
//!
//! Two kinds of model reach a pass:
//!
//! - **Local models** are registered with the renderer
//!   ([`Renderer::add_model`](crate::renderer::Renderer::add_model)) and copied
//!   into every pass that consumes their draw group. Each pass keeps its own
//!   [`RenderModel`] with overrides resolved against that pass's program.
//! - **External models** ([`ExternalModel`]) live in scene code and are handed
//!   to [`Renderer::render`](crate::renderer::Renderer::render) by reference
//!   every frame, grouped by draw group. Their overrides are resolved by name
//!   on the fly.

use std::fmt;
use std::rc::Rc;

use prism_core::NameId;
use rustc_hash::FxHashMap;
use slotmap::{DenseSlotMap, new_key_type};

use crate::commands::DrawCommands;
use crate::device::VertexArrayHandle;
use crate::texture::{BoundTexture, TextureEntry};
use crate::uniform::{BoundUniform, UniformEntry};

new_key_type! {
    /// Stable handle of a model registered with the renderer.
    pub struct ModelHandle;

    struct TextureOverrideKey;
    struct UniformOverrideKey;
}

/// What scene code registers: a vertex array, its index count, and the draw
/// group that decides which passes draw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelEntry {
    pub group: NameId,
    pub vertex_array: VertexArrayHandle,
    pub element_count: u32,
}

impl ModelEntry {
    #[must_use]
    pub fn new(group: NameId, vertex_array: VertexArrayHandle, element_count: u32) -> Self {
        Self {
            group,
            vertex_array,
            element_count,
        }
    }
}

// ============================================================================
// Pass-Local Model
// ============================================================================

/// A local model as held by one pass, with overrides resolved to that pass's
/// texture units and uniform locations.
///
/// Overrides are stored densely for iteration during rendering, with a
/// name index for updates.
#[derive(Debug)]
pub struct RenderModel {
    pub(crate) vertex_array: VertexArrayHandle,
    pub(crate) element_count: u32,

    texture_overrides: DenseSlotMap<TextureOverrideKey, BoundTexture>,
    texture_names: FxHashMap<NameId, TextureOverrideKey>,
    uniform_overrides: DenseSlotMap<UniformOverrideKey, BoundUniform>,
    uniform_names: FxHashMap<NameId, UniformOverrideKey>,
}

impl RenderModel {
    #[must_use]
    pub fn new(entry: &ModelEntry) -> Self {
        Self {
            vertex_array: entry.vertex_array,
            element_count: entry.element_count,
            texture_overrides: DenseSlotMap::with_key(),
            texture_names: FxHashMap::default(),
            uniform_overrides: DenseSlotMap::with_key(),
            uniform_names: FxHashMap::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn texture_override_count(&self) -> usize {
        self.texture_overrides.len()
    }

    #[inline]
    #[must_use]
    pub fn uniform_override_count(&self) -> usize {
        self.uniform_overrides.len()
    }

    pub fn texture_overrides(&self) -> impl Iterator<Item = &BoundTexture> {
        self.texture_overrides.values()
    }

    pub fn uniform_overrides(&self) -> impl Iterator<Item = &BoundUniform> {
        self.uniform_overrides.values()
    }

    /// Whether an override exists for texture `name`.
    #[must_use]
    pub fn has_texture_override(&self, name: NameId) -> bool {
        self.texture_names.contains_key(&name)
    }

    #[must_use]
    pub fn has_uniform_override(&self, name: NameId) -> bool {
        self.uniform_names.contains_key(&name)
    }

    /// Updates the override named `name` in place, or inserts `make()`.
    pub(crate) fn set_texture_override(
        &mut self,
        name: NameId,
        handle: crate::device::TextureHandle,
        target: wgpu::TextureViewDimension,
        make: impl FnOnce() -> BoundTexture,
    ) {
        if let Some(bound) = self
            .texture_names
            .get(&name)
            .and_then(|key| self.texture_overrides.get_mut(*key))
        {
            bound.handle = handle;
            bound.target = target;
            return;
        }
        let key = self.texture_overrides.insert(make());
        self.texture_names.insert(name, key);
    }

    /// Returns `false` if there was no override named `name`.
    pub(crate) fn remove_texture_override(&mut self, name: NameId) -> bool {
        match self.texture_names.remove(&name) {
            Some(key) => self.texture_overrides.remove(key).is_some(),
            None => false,
        }
    }

    pub(crate) fn set_uniform_override(
        &mut self,
        name: NameId,
        data: crate::uniform::UniformData,
        make: impl FnOnce() -> BoundUniform,
    ) {
        if let Some(bound) = self
            .uniform_names
            .get(&name)
            .and_then(|key| self.uniform_overrides.get_mut(*key))
        {
            bound.data = data;
            return;
        }
        let key = self.uniform_overrides.insert(make());
        self.uniform_names.insert(name, key);
    }

    pub(crate) fn remove_uniform_override(&mut self, name: NameId) -> bool {
        match self.uniform_names.remove(&name) {
            Some(key) => self.uniform_overrides.remove(key).is_some(),
            None => false,
        }
    }
}

// ============================================================================
// External Models
// ============================================================================

/// How an external model draws itself.
#[derive(Clone)]
pub enum ExternalDraw {
    /// Indexed triangles from a vertex array.
    VertexArray {
        vertex_array: VertexArrayHandle,
        element_count: u32,
    },
    /// Arbitrary draw calls issued through the wrapper.
    Custom(Rc<dyn Fn(&mut dyn DrawCommands)>),
}

impl fmt::Debug for ExternalDraw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalDraw::VertexArray {
                vertex_array,
                element_count,
            } => f
                .debug_struct("VertexArray")
                .field("vertex_array", vertex_array)
                .field("element_count", element_count)
                .finish(),
            ExternalDraw::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A model owned by scene code, drawn with per-model texture and uniform
/// overrides addressed by name.
///
/// Overrides a pass does not know (no sampler for the texture name, or no
/// active uniform with that name) are skipped for that pass.
#[derive(Debug, Clone)]
pub struct ExternalModel {
    pub draw: ExternalDraw,
    pub enabled: bool,
    pub textures: Vec<TextureEntry>,
    pub uniforms: Vec<UniformEntry>,
}

impl ExternalModel {
    #[must_use]
    pub fn new(vertex_array: VertexArrayHandle, element_count: u32) -> Self {
        Self::with_draw(ExternalDraw::VertexArray {
            vertex_array,
            element_count,
        })
    }

    /// A model with custom draw logic.
    #[must_use]
    pub fn custom(draw: impl Fn(&mut dyn DrawCommands) + 'static) -> Self {
        Self::with_draw(ExternalDraw::Custom(Rc::new(draw)))
    }

    #[must_use]
    pub fn with_draw(draw: ExternalDraw) -> Self {
        Self {
            draw,
            enabled: true,
            textures: Vec::new(),
            uniforms: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_texture(mut self, texture: TextureEntry) -> Self {
        self.textures.push(texture);
        self
    }

    #[must_use]
    pub fn with_uniform(mut self, uniform: UniformEntry) -> Self {
        self.uniforms.push(uniform);
        self
    }

    pub fn set_vertex_array(&mut self, vertex_array: VertexArrayHandle, element_count: u32) {
        self.draw = ExternalDraw::VertexArray {
            vertex_array,
            element_count,
        };
    }

    #[inline]
    #[must_use]
    pub fn draw_enabled(&self) -> bool {
        self.enabled
    }

    /// Issues this model's draw calls.
    pub fn draw(&self, gl: &mut dyn DrawCommands) {
        match &self.draw {
            ExternalDraw::VertexArray {
                vertex_array,
                element_count,
            } => gl.draw_geometry(*vertex_array, *element_count),
            ExternalDraw::Custom(draw) => draw(gl),
        }
    }
}

/// External models of one pass, keyed by draw group.
pub type GroupModels<'a> = FxHashMap<NameId, Vec<&'a ExternalModel>>;

/// External models keyed by pass, then draw group.
pub type PassModels<'a> = FxHashMap<NameId, GroupModels<'a>>;

/// The external model set handed to a frame.
#[derive(Debug, Clone, Copy, Default)]
pub enum ExternalModels<'m, 'a> {
    /// Only local models are drawn.
    #[default]
    None,
    /// The same draw-group map is offered to every pass.
    ByGroup(&'m GroupModels<'a>),
    /// Each pass looks up its own draw-group map by pass name.
    ByPass(&'m PassModels<'a>),
}

impl<'m, 'a> ExternalModels<'m, 'a> {
    /// The draw-group map offered to the pass named `pass`.
    #[must_use]
    pub fn for_pass(&self, pass: NameId) -> Option<&'m GroupModels<'a>> {
        match *self {
            ExternalModels::None => None,
            ExternalModels::ByGroup(groups) => Some(groups),
            ExternalModels::ByPass(passes) => passes.get(&pass),
        }
    }
}
