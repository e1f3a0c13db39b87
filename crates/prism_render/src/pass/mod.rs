//! Render Pass
//!
//! A [`RenderPass`] owns one GPU stage end-to-end: its linked program, its
//! framebuffer and the render targets it creates, the default texture and
//! uniform bindings, and the models drawn in it.
//!
//! # Frame Flow
//!
//! ```text
//!   render(w, h)
//!     │
//!     ├─ dimensions changed? ──► rebuild framebuffer + owned targets
//!     │                          (targets of earlier passes are referenced)
//!     ├─ bind framebuffer, viewport, program, state lists
//!     ├─ clear
//!     ├─ default uniforms + samplers + default textures   (the baseline)
//!     │
//!     ├─ local models:    apply overrides ─► draw ─► restore touched slots
//!     ├─ external models: diff against previous model ─► draw
//!     │
//!     └─ unbind framebuffer, auto-mipmap targets, unbind samplers
//! ```
//!
//! Every texture unit and uniform location touched by one model's overrides
//! is back at its baseline value (or unbound) before the next model draws.
//!
//! # Ownership
//!
//! The pass deletes what it creates: its program, samplers, framebuffer,
//! depth renderbuffer, timer query and owned render targets. Shader stages
//! belong to the [`Renderer`](crate::renderer::Renderer). Targets looked up
//! from the shared texture table are attached but never deleted.

mod bindings;
mod framebuffer;
mod render;
mod status;

use std::collections::{BTreeMap, BTreeSet};

use prism_core::{NameId, NameMap, PrismError, Result};
use slotmap::SecondaryMap;

use crate::commands::GpuCommands;
use crate::config::{IndexedState, PassConfig};
use crate::device::{
    ClearMask, FramebufferHandle, GpuDevice, ProgramHandle, QueryHandle, RenderbufferHandle,
    SamplerHandle, ShaderHandle, TextureParameter, UniformLocation,
};
use crate::dimensions::RenderDimensions;
use crate::lookup::CAPABILITIES;
use crate::model::{ModelHandle, RenderModel};
use crate::renderer::shaders::ShaderObject;
use crate::state::{self, CapabilityToggle, FixedFunctionState};
use crate::texture::{BoundTexture, RenderTarget, SharedTextures};
use crate::uniform::{BoundUniform, UniformData, UniformVector};

pub use framebuffer::TargetSpec;
pub use status::{PrintContext, StatusVerbosity};

/// Everything a pass needs besides the command wrapper and the interner.
#[derive(Debug, Clone, Copy)]
pub struct PassSetup<'a> {
    pub config: &'a PassConfig,
    pub vertex_shader: &'a ShaderObject,
    pub fragment_shader: &'a ShaderObject,
    /// Targets published by earlier passes and global textures.
    pub shared_textures: &'a SharedTextures,
    /// Current window framebuffer size.
    pub framebuffer_size: (u32, u32),
}

/// A sampler object bound to one texture unit.
#[derive(Debug, Clone)]
pub struct PassSampler {
    /// Name of the sampler uniform in the shader.
    pub uniform: NameId,
    /// Texture name bound to this unit by default.
    pub texture_name: NameId,
    pub unit: u32,
    pub handle: SamplerHandle,
    pub parameters: Vec<TextureParameter>,
}

/// One configured render pass.
#[derive(Debug)]
pub struct RenderPass {
    // === Identity ===
    name: String,
    name_id: NameId,
    enabled: bool,
    draw_groups: BTreeSet<NameId>,
    user_defined_fields: BTreeMap<String, String>,

    // === Clearing ===
    clear_mask: ClearMask,
    clear_color: [f32; 4],
    clear_depth: f32,
    clear_stencil: i32,

    // === Program ===
    program: Option<ProgramHandle>,
    vertex_shader: (String, ShaderHandle),
    fragment_shader: (String, ShaderHandle),
    uniform_locations: BTreeMap<NameId, UniformLocation>,
    default_uniforms: Vec<BoundUniform>,

    // === Textures ===
    samplers: Vec<PassSampler>,
    texture_units: BTreeMap<NameId, u32>,
    default_textures: Vec<BoundTexture>,

    // === Fixed-Function State ===
    toggles: Vec<CapabilityToggle>,
    states: Vec<FixedFunctionState>,

    // === Framebuffer ===
    targets: Vec<TargetSpec>,
    dimensions: RenderDimensions,
    framebuffer: Option<FramebufferHandle>,
    depth_renderbuffer: Option<RenderbufferHandle>,
    render_targets: BTreeMap<NameId, RenderTarget>,
    external_render_targets: BTreeMap<NameId, RenderTarget>,
    /// Names of targets this pass creates; rebuilds never reference them.
    owned_target_names: BTreeSet<NameId>,
    auto_mipmap_targets: Vec<RenderTarget>,
    /// Set when a framebuffer rebuild failed; retried next frame.
    framebuffer_stale: bool,

    // === Models ===
    models: SecondaryMap<ModelHandle, RenderModel>,

    // === Profiling ===
    timer_query: Option<QueryHandle>,
    last_time: f64,
}

impl RenderPass {
    /// Builds a pass from its configuration.
    ///
    /// Links the program, resolves uniforms and samplers, parses state and
    /// creates the framebuffer. On failure every GPU object created so far
    /// is deleted and the error names the pass.
    pub fn new<D: GpuDevice>(
        gl: &mut GpuCommands<D>,
        names: &mut NameMap,
        setup: &PassSetup<'_>,
    ) -> Result<Self> {
        let config = setup.config;
        let mut pass = Self::unconfigured(config, names, setup);

        match pass.initialize(gl, names, setup) {
            Ok(()) => {
                log::info!(
                    "Initialized pass \"{}\": {} sampler(s), {} uniform(s), {} render target(s)",
                    pass.name,
                    pass.samplers.len(),
                    pass.uniform_locations.len(),
                    pass.render_targets.len() + pass.external_render_targets.len()
                );
                Ok(pass)
            }
            Err(error) => {
                pass.clear(gl);
                Err(error.in_pass(&config.name))
            }
        }
    }

    fn unconfigured(config: &PassConfig, names: &mut NameMap, setup: &PassSetup<'_>) -> Self {
        let mut clear_mask = ClearMask::empty();
        clear_mask.set(ClearMask::COLOR, config.clear_color);
        clear_mask.set(ClearMask::DEPTH, config.clear_depth);
        clear_mask.set(ClearMask::STENCIL, config.clear_stencil);

        let clear_color = match config.clear_color_value[..] {
            [r, g, b, a] => [r, g, b, a],
            _ => [0.0; 4],
        };

        Self {
            name: config.name.clone(),
            name_id: names.add(&config.name),
            enabled: true,
            draw_groups: config.draw_groups.iter().map(|group| names.add(group)).collect(),
            user_defined_fields: config.user_defined_fields.clone(),

            clear_mask,
            clear_color,
            clear_depth: config.clear_depth_value,
            clear_stencil: config.clear_stencil_value,

            program: None,
            vertex_shader: (config.vertex_shader.clone(), setup.vertex_shader.handle),
            fragment_shader: (config.fragment_shader.clone(), setup.fragment_shader.handle),
            uniform_locations: BTreeMap::new(),
            default_uniforms: Vec::new(),

            samplers: Vec::new(),
            texture_units: BTreeMap::new(),
            default_textures: Vec::new(),

            toggles: Vec::new(),
            states: Vec::new(),

            targets: Vec::new(),
            dimensions: RenderDimensions::new(1.0, 1.0, true),
            framebuffer: None,
            depth_renderbuffer: None,
            render_targets: BTreeMap::new(),
            external_render_targets: BTreeMap::new(),
            owned_target_names: BTreeSet::new(),
            auto_mipmap_targets: Vec::new(),
            framebuffer_stale: false,

            models: SecondaryMap::new(),

            timer_query: None,
            last_time: -1.0,
        }
    }

    fn initialize<D: GpuDevice>(
        &mut self,
        gl: &mut GpuCommands<D>,
        names: &mut NameMap,
        setup: &PassSetup<'_>,
    ) -> Result<()> {
        let config = setup.config;

        // Render targets are parsed first: they also name the fragment outputs.
        self.targets = config
            .render_targets
            .iter()
            .map(|(attachment, target)| TargetSpec::parse(attachment, target, names))
            .collect::<Result<_>>()?;

        let frag_data: BTreeMap<u32, String> = self
            .targets
            .iter()
            .filter_map(|target| target.color_index().map(|i| (i, target.variable.clone())))
            .filter(|(_, variable)| !variable.is_empty())
            .collect();
        let program = gl.link_program(
            &config.shader_attribute_bindings,
            &[setup.vertex_shader.handle, setup.fragment_shader.handle],
            &frag_data,
        )?;
        self.program = Some(program);

        for (uniform_name, uniform) in &config.uniforms {
            let Some(location) = gl.uniform_location(program, uniform_name) else {
                continue;
            };
            self.uniform_locations.insert(names.add(uniform_name), location);
            if !uniform.data.is_empty() {
                self.default_uniforms
                    .push(BoundUniform::new(location, UniformData::from_slice(&uniform.data)));
            }
        }

        self.parse_state(config)?;
        self.create_samplers(gl, names, setup)?;

        // The depth target sizes the viewport, else the first target, else the window.
        let sizing = config
            .render_targets
            .get("GL_DEPTH_ATTACHMENT")
            .or_else(|| config.render_targets.values().next());
        if let Some(target) = sizing {
            self.dimensions =
                RenderDimensions::new(
                    target.width,
                    target.height,
                    target.width_height_are_multiples,
                );
        }

        let (width, height) = setup.framebuffer_size;
        self.dimensions.update(width, height);
        self.create_framebuffer(gl, setup.framebuffer_size, setup.shared_textures)?;

        self.timer_query = Some(gl.create_query());
        self.last_time = -1.0;
        Ok(())
    }

    fn parse_state(&mut self, config: &PassConfig) -> Result<()> {
        let plain = |names: &[String], enable: bool| -> Result<Vec<CapabilityToggle>> {
            names
                .iter()
                .map(|name| {
                    Ok(CapabilityToggle {
                        capability: CAPABILITIES.lookup(name)?,
                        index: None,
                        enable,
                    })
                })
                .collect()
        };
        let indexed = |states: &[IndexedState], enable: bool| {
            states
                .iter()
                .map(|state| {
                    Ok(CapabilityToggle {
                        capability: CAPABILITIES.lookup(&state.name)?,
                        index: Some(state.index),
                        enable,
                    })
                })
                .collect::<Result<Vec<_>>>()
        };

        self.toggles = plain(&config.state_enable, true)?;
        self.toggles.extend(plain(&config.state_disable, false)?);
        self.toggles.extend(indexed(&config.state_enablei, true)?);
        self.toggles.extend(indexed(&config.state_disablei, false)?);

        self.states = config
            .state_enum
            .iter()
            .map(|(name, value)| FixedFunctionState::parse(name, value))
            .collect::<Result<_>>()?;
        Ok(())
    }

    /// One sampler per entry, on consecutive texture units in name order.
    fn create_samplers<D: GpuDevice>(
        &mut self,
        gl: &mut GpuCommands<D>,
        names: &mut NameMap,
        setup: &PassSetup<'_>,
    ) -> Result<()> {
        let Some(program) = self.program else {
            return Ok(());
        };
        let unit_limit = gl.limits().max_texture_image_units;

        for (uniform_name, sampler_config) in &setup.config.samplers {
            let unit = self.samplers.len() as u32;
            if unit >= unit_limit {
                return Err(PrismError::TextureUnitsExceeded(unit_limit));
            }

            let parameters = sampler_config
                .state
                .iter()
                .map(|(name, value)| state::parse_sampler_parameter(name, value))
                .collect::<Result<Vec<_>>>()?;

            let texture_name = names.add(&sampler_config.texture_name);
            self.texture_units.insert(texture_name, unit);

            let handle = gl.create_sampler();
            self.samplers.push(PassSampler {
                uniform: names.add(uniform_name),
                texture_name,
                unit,
                handle,
                parameters,
            });
            state::apply_sampler_parameters(gl, handle, &self.samplers[unit as usize].parameters);

            if let Some(location) = gl.uniform_location(program, uniform_name) {
                gl.use_program(Some(program));
                gl.apply_uniform(location, &UniformVector::<i32>::from_slice(&[unit as i32]));
            }

            if let Some(shared) = setup.shared_textures.get(&texture_name) {
                self.default_textures.push(BoundTexture::new(unit, shared));
            }
        }
        Ok(())
    }

    /// Deletes every GPU object the pass owns and forgets its models.
    pub fn clear<D: GpuDevice>(&mut self, gl: &mut GpuCommands<D>) {
        self.delete_framebuffer(gl);
        self.owned_target_names.clear();

        if let Some(program) = self.program.take() {
            gl.delete_program(program);
        }
        self.models.clear();
        self.texture_units.clear();
        self.uniform_locations.clear();
        self.default_textures.clear();
        self.default_uniforms.clear();

        for sampler in self.samplers.drain(..) {
            gl.delete_sampler(sampler.handle);
        }
        if let Some(query) = self.timer_query.take() {
            gl.delete_query(query);
        }
        self.toggles.clear();
        self.states.clear();
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn name_id(&self) -> NameId {
        self.name_id
    }

    #[inline]
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    #[inline]
    #[must_use]
    pub fn draw_groups(&self) -> &BTreeSet<NameId> {
        &self.draw_groups
    }

    #[inline]
    #[must_use]
    pub fn user_defined_fields(&self) -> &BTreeMap<String, String> {
        &self.user_defined_fields
    }

    #[inline]
    #[must_use]
    pub fn program(&self) -> Option<ProgramHandle> {
        self.program
    }

    /// Targets this pass created and owns, by name.
    #[inline]
    #[must_use]
    pub fn render_targets(&self) -> &BTreeMap<NameId, RenderTarget> {
        &self.render_targets
    }

    /// Names of every target this pass creates, including ones currently
    /// missing after a failed rebuild.
    #[inline]
    #[must_use]
    pub fn owned_target_names(&self) -> &BTreeSet<NameId> {
        &self.owned_target_names
    }

    /// Whether the last framebuffer rebuild failed and is pending a retry.
    #[inline]
    #[must_use]
    pub fn framebuffer_stale(&self) -> bool {
        self.framebuffer_stale
    }

    /// Targets of earlier passes this pass renders into.
    #[inline]
    #[must_use]
    pub fn external_render_targets(&self) -> &BTreeMap<NameId, RenderTarget> {
        &self.external_render_targets
    }

    #[inline]
    #[must_use]
    pub fn framebuffer(&self) -> Option<FramebufferHandle> {
        self.framebuffer
    }

    #[inline]
    #[must_use]
    pub fn dimensions(&self) -> &RenderDimensions {
        &self.dimensions
    }

    #[must_use]
    pub fn samplers(&self) -> &[PassSampler] {
        &self.samplers
    }

    /// Texture unit that texture `name` is sampled from, if this pass samples it.
    #[must_use]
    pub fn texture_unit(&self, name: NameId) -> Option<u32> {
        self.texture_units.get(&name).copied()
    }

    #[must_use]
    pub fn uniform_location(&self, name: NameId) -> Option<UniformLocation> {
        self.uniform_locations.get(&name).copied()
    }

    #[must_use]
    pub fn default_textures(&self) -> &[BoundTexture] {
        &self.default_textures
    }

    #[must_use]
    pub fn default_uniforms(&self) -> &[BoundUniform] {
        &self.default_uniforms
    }

    #[must_use]
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    #[must_use]
    pub fn model(&self, handle: ModelHandle) -> Option<&RenderModel> {
        self.models.get(handle)
    }

    /// GPU time of the previous frame in seconds; `-1` before the first frame.
    #[inline]
    #[must_use]
    pub fn last_time(&self) -> f64 {
        self.last_time
    }

    fn capability_names(&self, enable: bool) -> Vec<String> {
        self.toggles
            .iter()
            .filter(|toggle| toggle.enable == enable)
            .map(ToString::to_string)
            .collect()
    }

    /// Index of the default binding for a unit or location, if any.
    fn default_texture_index(&self, unit: u32) -> Option<usize> {
        self.default_textures.iter().position(|bound| bound.unit == unit)
    }

    fn default_uniform_index(&self, location: UniformLocation) -> Option<usize> {
        self.default_uniforms
            .iter()
            .position(|bound| bound.location == location)
    }
}
