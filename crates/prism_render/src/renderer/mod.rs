//! Renderer
//!
//! The [`Renderer`] owns the ordered pass list, the shader cache and the
//! shared texture table, and is the entry point scene code talks to.
//!
//! # Initialization
//!
//! ```text
//!   for each pass config, in order:
//!     ├─ vertex + fragment shader: cached by "file define define ..."
//!     │    └─ miss ─► load source, insert #define block, compile
//!     ├─ RenderPass::new  (resolves inputs from the shared table)
//!     └─ publish the pass's render targets into the shared table
//! ```
//!
//! A later pass can therefore sample any target an earlier pass renders to,
//! by naming it as a sampler's `texture_name`.
//!
//! # Frame
//!
//! [`render`](Renderer::render) walks the passes in order. Each pass gets the
//! external model lists of its draw groups. When a pass rebuilds its targets
//! (window resize) the new handles are republished at once, so downstream
//! passes sample the fresh textures in the same frame.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use prism_core::NameMap;
//! use prism_render::prelude::*;
//!
//! let list = PassList::load("passes.toml")?;
//! let mut names = NameMap::new();
//! let mut renderer = Renderer::new(HeadlessDevice::new(), list.settings.clone());
//! renderer.initialize(&list.passes, &mut names, &mut FileShaderLoader, (1280, 720))?;
//!
//! let model = renderer.add_model(ModelEntry::new(names.add("normal"), vao, 36));
//! renderer.render((1280, 720), ExternalModels::None);
//! ```

pub mod shaders;
mod status;

use std::collections::{BTreeMap, BTreeSet};

use prism_core::{NameId, NameMap, PrismError, Result};
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::commands::GpuCommands;
use crate::config::{PassConfig, PassList};
use crate::device::{GpuDevice, ShaderStage};
use crate::model::{ExternalModel, ExternalModels, ModelEntry, ModelHandle};
use crate::pass::{PassSetup, RenderPass};
use crate::settings::RendererSettings;
use crate::texture::{SharedTextures, TextureEntry};
use crate::uniform::{BoundUniform, UniformEntry};

use self::shaders::{
    ShaderLoader, ShaderObject, insert_define_block, shader_cache_name, shader_file_path,
};

pub struct Renderer<D: GpuDevice> {
    gl: GpuCommands<D>,
    settings: RendererSettings,

    // === Shaders ===
    /// Compiled stages keyed by cache name (file plus pass defines).
    shaders: BTreeMap<String, ShaderObject>,

    // === Passes ===
    passes: Vec<RenderPass>,
    pass_indices: FxHashMap<NameId, usize>,
    draw_group_passes: FxHashMap<NameId, Vec<usize>>,

    // === Scene Data ===
    models: SlotMap<ModelHandle, ModelEntry>,
    shared_textures: SharedTextures,
}

impl<D: GpuDevice> Renderer<D> {
    #[must_use]
    pub fn new(device: D, settings: RendererSettings) -> Self {
        Self {
            gl: GpuCommands::new(device, settings.command_options()),
            settings,
            shaders: BTreeMap::new(),
            passes: Vec::new(),
            pass_indices: FxHashMap::default(),
            draw_group_passes: FxHashMap::default(),
            models: SlotMap::with_key(),
            shared_textures: SharedTextures::new(),
        }
    }

    // ========================================================================
    // Initialization
    // ========================================================================

    /// Builds the pass list, replacing any previous one.
    ///
    /// On failure everything created so far is released and the renderer is
    /// left empty.
    pub fn initialize(
        &mut self,
        passes: &[PassConfig],
        names: &mut NameMap,
        loader: &mut dyn ShaderLoader,
        framebuffer_size: (u32, u32),
    ) -> Result<()> {
        self.clear();

        for config in passes {
            if let Err(error) = self.add_pass(config, names, loader, framebuffer_size) {
                log::error!("{error}");
                self.clear();
                return Err(error);
            }
        }

        log::info!(
            "Renderer initialized: {} pass(es), {} shader(s), {} shared texture(s)",
            self.passes.len(),
            self.shaders.len(),
            self.shared_textures.len()
        );
        Ok(())
    }

    /// Adopts the settings embedded in `list`, then initializes its passes.
    pub fn initialize_pass_list(
        &mut self,
        list: &PassList,
        names: &mut NameMap,
        loader: &mut dyn ShaderLoader,
        framebuffer_size: (u32, u32),
    ) -> Result<()> {
        self.set_settings(list.settings.clone());
        self.initialize(&list.passes, names, loader, framebuffer_size)
    }

    fn add_pass(
        &mut self,
        config: &PassConfig,
        names: &mut NameMap,
        loader: &mut dyn ShaderLoader,
        framebuffer_size: (u32, u32),
    ) -> Result<()> {
        let vertex = self.load_shader(
            loader,
            &config.vertex_shader,
            &config.vertex_shader_defines,
            ShaderStage::Vertex,
        )?;
        let fragment = self.load_shader(
            loader,
            &config.fragment_shader,
            &config.fragment_shader_defines,
            ShaderStage::Fragment,
        )?;

        let index = self.passes.len();
        let setup = PassSetup {
            config,
            vertex_shader: &self.shaders[&vertex],
            fragment_shader: &self.shaders[&fragment],
            shared_textures: &self.shared_textures,
            framebuffer_size,
        };
        let pass = RenderPass::new(&mut self.gl, names, &setup)?;

        for (name, target) in pass.render_targets() {
            self.shared_textures.insert(
                *name,
                TextureEntry::new(*name, target.handle).with_target(target.target),
            );
        }
        for group in pass.draw_groups() {
            self.draw_group_passes.entry(*group).or_default().push(index);
        }
        self.pass_indices.insert(pass.name_id(), index);
        self.passes.push(pass);
        Ok(())
    }

    /// Returns the cache name of the compiled stage, compiling it on a miss.
    fn load_shader(
        &mut self,
        loader: &mut dyn ShaderLoader,
        file: &str,
        defines: &BTreeSet<String>,
        stage: ShaderStage,
    ) -> Result<String> {
        let name = shader_cache_name(file, defines);
        if self.shaders.contains_key(&name) {
            return Ok(name);
        }

        let path = shader_file_path(&self.settings.shader_path, file);
        let source = loader.load(&path)?;
        if source.is_empty() {
            return Err(PrismError::ShaderSourceMissing(path.display().to_string()));
        }

        let mut all_defines = defines.clone();
        all_defines.extend(self.settings.global_defines.iter().cloned());
        let source = insert_define_block(&source, &all_defines);

        let handle = self.gl.compile_shader(&name, stage, &source)?;
        log::debug!("Compiled shader {name} ({stage:?}) as {handle}");
        self.shaders.insert(
            name.clone(),
            ShaderObject {
                handle,
                stage,
                defines: all_defines,
            },
        );
        Ok(name)
    }

    /// Deletes every pass and shader and forgets all models and shared
    /// textures. Vertex data of models is owned by the caller.
    pub fn clear(&mut self) {
        for shader in std::mem::take(&mut self.shaders).into_values() {
            self.gl.delete_shader(shader.handle);
        }
        for mut pass in self.passes.drain(..) {
            pass.clear(&mut self.gl);
        }
        self.shared_textures.clear();
        self.pass_indices.clear();
        self.draw_group_passes.clear();
        self.models.clear();
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Renders every enabled pass in order.
    ///
    /// `external` selects the external models offered to each pass; only the
    /// lists of the pass's own draw groups are drawn.
    pub fn render(&mut self, framebuffer_size: (u32, u32), external: ExternalModels<'_, '_>) {
        let wait = self.settings.wait_on_timer_query;

        for index in 0..self.passes.len() {
            let pass = &mut self.passes[index];
            let lists: SmallVec<[&[&ExternalModel]; 4]> = match external.for_pass(pass.name_id()) {
                Some(groups) => pass
                    .draw_groups()
                    .iter()
                    .filter_map(|group| groups.get(group))
                    .map(Vec::as_slice)
                    .collect(),
                None => SmallVec::new(),
            };

            let recreated =
                pass.render(&mut self.gl, framebuffer_size, &lists, &self.shared_textures, wait);
            if recreated {
                self.republish_targets(index);
            }
        }
    }

    /// Pushes the current targets of pass `index` into the shared table and
    /// every pass's default textures.
    ///
    /// Owned targets missing after a failed rebuild are withdrawn, so
    /// referencing passes fall back to an unbound unit instead of a deleted
    /// texture.
    fn republish_targets(&mut self, index: usize) {
        let pass = &self.passes[index];
        let targets: SmallVec<[TextureEntry; 4]> = pass
            .render_targets()
            .iter()
            .map(|(name, target)| {
                TextureEntry::new(*name, target.handle).with_target(target.target)
            })
            .collect();
        let withdrawn: SmallVec<[NameId; 4]> = pass
            .owned_target_names()
            .iter()
            .filter(|name| !pass.render_targets().contains_key(*name))
            .copied()
            .collect();

        for name in withdrawn {
            log::warn!(
                "Pass \"{}\": target {name} withdrawn until its framebuffer rebuilds",
                self.passes[index].name()
            );
            self.remove_global_texture(name);
        }
        for entry in &targets {
            self.set_global_texture(entry.name, entry);
        }
    }

    // ========================================================================
    // Models
    // ========================================================================

    /// Registers a model with every pass that draws its group.
    pub fn add_model(&mut self, entry: ModelEntry) -> ModelHandle {
        let handle = self.models.insert(entry);
        if let Some(indices) = self.draw_group_passes.get(&entry.group) {
            for &index in indices {
                self.passes[index].add_model(&entry, handle);
            }
        }
        handle
    }

    pub fn remove_model(&mut self, handle: ModelHandle) {
        let Some(entry) = self.models.remove(handle) else {
            panic!("remove_model: missing model {handle:?}");
        };
        for index in self.group_pass_indices(entry.group) {
            self.passes[index].remove_model(handle);
        }
    }

    fn model_group(&self, handle: ModelHandle, operation: &str) -> NameId {
        match self.models.get(handle) {
            Some(entry) => entry.group,
            None => panic!("{operation}: missing model {handle:?}"),
        }
    }

    fn group_pass_indices(&self, group: NameId) -> SmallVec<[usize; 4]> {
        self.draw_group_passes
            .get(&group)
            .map(|indices| indices.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn set_model_texture(&mut self, handle: ModelHandle, texture: &TextureEntry) {
        let group = self.model_group(handle, "set_model_texture");
        for index in self.group_pass_indices(group) {
            self.passes[index].set_model_texture(handle, texture);
        }
    }

    pub fn remove_model_texture(&mut self, handle: ModelHandle, name: NameId) {
        let group = self.model_group(handle, "remove_model_texture");
        for index in self.group_pass_indices(group) {
            self.passes[index].remove_model_texture(handle, name);
        }
    }

    pub fn set_model_uniform(&mut self, handle: ModelHandle, uniform: &UniformEntry) {
        let group = self.model_group(handle, "set_model_uniform");
        for index in self.group_pass_indices(group) {
            self.passes[index].set_model_uniform(handle, uniform);
        }
    }

    pub fn remove_model_uniform(&mut self, handle: ModelHandle, name: NameId) {
        let group = self.model_group(handle, "remove_model_uniform");
        for index in self.group_pass_indices(group) {
            self.passes[index].remove_model_uniform(handle, name);
        }
    }

    #[must_use]
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    // ========================================================================
    // Default Bindings
    // ========================================================================

    /// Publishes `texture` under `name` and makes it the default for every
    /// pass sampling that name. Replaces any previous entry.
    pub fn set_global_texture(&mut self, name: NameId, texture: &TextureEntry) {
        self.shared_textures.insert(name, *texture);
        for pass in &mut self.passes {
            pass.set_default_texture(name, texture);
        }
    }

    pub fn remove_global_texture(&mut self, name: NameId) {
        self.shared_textures.remove(&name);
        for pass in &mut self.passes {
            pass.remove_default_texture(name);
        }
    }

    pub fn set_pass_texture(&mut self, pass: NameId, texture_name: NameId, texture: &TextureEntry) {
        if let Some(pass) = self.pass_mut(pass) {
            pass.set_default_texture(texture_name, texture);
        }
    }

    pub fn remove_pass_texture(&mut self, pass: NameId, texture_name: NameId) {
        if let Some(pass) = self.pass_mut(pass) {
            pass.remove_default_texture(texture_name);
        }
    }

    /// Sets a default uniform on every pass that has it active.
    ///
    /// Returns the number of passes affected.
    pub fn set_global_uniform(&mut self, uniform: &UniformEntry) -> usize {
        self.passes
            .iter_mut()
            .map(|pass| pass.set_default_uniform(uniform))
            .filter(|affected| *affected)
            .count()
    }

    pub fn remove_global_uniform(&mut self, name: NameId) {
        for pass in &mut self.passes {
            pass.remove_default_uniform(name);
        }
    }

    pub fn set_pass_uniform(&mut self, pass: NameId, uniform: &UniformEntry) {
        if let Some(pass) = self.pass_mut(pass) {
            pass.set_default_uniform(uniform);
        }
    }

    pub fn remove_pass_uniform(&mut self, pass: NameId, name: NameId) {
        if let Some(pass) = self.pass_mut(pass) {
            pass.remove_default_uniform(name);
        }
    }

    /// Default value of a uniform in one pass.
    #[must_use]
    pub fn get_pass_uniform(&self, pass: NameId, name: NameId) -> Option<&BoundUniform> {
        self.pass(pass)?.get_default_uniform(name)
    }

    // ========================================================================
    // Pass Queries
    // ========================================================================

    pub fn set_pass_enabled(&mut self, pass: NameId, enabled: bool) {
        if let Some(pass) = self.pass_mut(pass) {
            pass.set_enabled(enabled);
        }
    }

    /// `false` for unknown passes.
    #[must_use]
    pub fn pass_enabled(&self, pass: NameId) -> bool {
        self.pass(pass).is_some_and(RenderPass::enabled)
    }

    /// Free-form fields declared on a pass; empty for unknown passes.
    #[must_use]
    pub fn user_defined_fields(&self, pass: NameId) -> &BTreeMap<String, String> {
        static EMPTY: BTreeMap<String, String> = BTreeMap::new();
        self.pass(pass).map_or(&EMPTY, RenderPass::user_defined_fields)
    }

    /// Draw groups of a pass; empty for unknown passes.
    #[must_use]
    pub fn draw_groups(&self, pass: NameId) -> &BTreeSet<NameId> {
        static EMPTY: BTreeSet<NameId> = BTreeSet::new();
        self.pass(pass).map_or(&EMPTY, RenderPass::draw_groups)
    }

    /// Pass names in execution order.
    #[must_use]
    pub fn pass_names(&self) -> Vec<NameId> {
        self.passes.iter().map(RenderPass::name_id).collect()
    }

    #[must_use]
    pub fn pass(&self, name: NameId) -> Option<&RenderPass> {
        let index = *self.pass_indices.get(&name)?;
        self.passes.get(index)
    }

    fn pass_mut(&mut self, name: NameId) -> Option<&mut RenderPass> {
        let index = *self.pass_indices.get(&name)?;
        self.passes.get_mut(index)
    }

    #[inline]
    #[must_use]
    pub fn passes(&self) -> &[RenderPass] {
        &self.passes
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Textures published by passes plus global textures, by name.
    #[inline]
    #[must_use]
    pub fn shared_textures(&self) -> &SharedTextures {
        &self.shared_textures
    }

    #[must_use]
    pub fn shader(&self, cache_name: &str) -> Option<&ShaderObject> {
        self.shaders.get(cache_name)
    }

    #[must_use]
    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// Replaces the settings. Shader path and defines apply from the next
    /// [`initialize`](Self::initialize); diagnostics apply at once.
    pub fn set_settings(&mut self, settings: RendererSettings) {
        self.gl.set_options(settings.command_options());
        self.settings = settings;
    }

    #[inline]
    #[must_use]
    pub fn gl(&self) -> &GpuCommands<D> {
        &self.gl
    }

    #[inline]
    pub fn gl_mut(&mut self) -> &mut GpuCommands<D> {
        &mut self.gl
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &D {
        self.gl.device()
    }

    #[inline]
    pub fn device_mut(&mut self) -> &mut D {
        self.gl.device_mut()
    }
}
