//! Pass-List Configuration
//!
//! A pass list is a TOML document with one `[[pass]]` table per render pass,
//! in execution order, plus an optional `[settings]` table:
//!
//! ```toml
//! [settings]
//! shader_path = "shaders"
//!
//! [[pass]]
//! name = "gbuffer"
//! draw_groups = ["normal", "car"]
//! vertex_shader = "gbuffer.vert"
//! fragment_shader = "gbuffer.frag"
//! clear_color = true
//! clear_depth = true
//! clear_color_value = [0.0, 0.0, 0.0, 1.0]
//! state_enable = ["GL_DEPTH_TEST", "GL_CULL_FACE"]
//!
//! [pass.state_enum.GL_DEPTH_FUNC]
//! type = "enum"
//! enum_data = "GL_LEQUAL"
//!
//! [pass.render_targets.GL_COLOR_ATTACHMENT0]
//! name = "albedo"
//! variable = "albedoOut"
//! format = "GL_RGBA8"
//! width = 1.0
//! height = 1.0
//! width_height_are_multiples = true
//!
//! [pass.samplers.diffuseSampler]
//! texture_name = "diffuseTexture"
//! ```
//!
//! Every field has a default, so a pass only spells out what it uses.
//! Enum-valued strings are kept as strings here and resolved through the
//! [`lookup`](crate::lookup) tables when the pass initializes.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use prism_core::Result;
use serde::{Deserialize, Serialize};

use crate::settings::RendererSettings;

/// Declarative description of one render pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassConfig {
    pub name: String,

    pub clear_color: bool,
    pub clear_depth: bool,
    pub clear_stencil: bool,
    /// RGBA; anything other than four values clears to transparent black.
    pub clear_color_value: Vec<f32>,
    pub clear_depth_value: f32,
    pub clear_stencil_value: i32,

    /// Draw groups whose models this pass renders.
    pub draw_groups: Vec<String>,
    /// Free-form metadata for scene code (e.g. `camera = "default"`).
    pub user_defined_fields: BTreeMap<String, String>,

    pub vertex_shader: String,
    pub vertex_shader_defines: BTreeSet<String>,
    pub fragment_shader: String,
    pub fragment_shader_defines: BTreeSet<String>,

    /// Vertex attribute names, bound to their index in this list.
    pub shader_attribute_bindings: Vec<String>,

    /// Default uniform values keyed by variable name.
    pub uniforms: BTreeMap<String, UniformConfig>,

    pub state_enable: Vec<String>,
    pub state_disable: Vec<String>,
    pub state_enablei: Vec<IndexedState>,
    pub state_disablei: Vec<IndexedState>,
    /// Fixed-function state keyed by parameter name (`GL_DEPTH_FUNC`, ...).
    pub state_enum: BTreeMap<String, StateConfig>,

    /// Render targets keyed by attachment point (`GL_COLOR_ATTACHMENT0`, `GL_DEPTH_ATTACHMENT`).
    pub render_targets: BTreeMap<String, RenderTargetConfig>,
    /// Samplers keyed by the sampler uniform name.
    pub samplers: BTreeMap<String, SamplerConfig>,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            clear_color: false,
            clear_depth: false,
            clear_stencil: false,
            clear_color_value: Vec::new(),
            clear_depth_value: 1.0,
            clear_stencil_value: 0,
            draw_groups: Vec::new(),
            user_defined_fields: BTreeMap::new(),
            vertex_shader: String::new(),
            vertex_shader_defines: BTreeSet::new(),
            fragment_shader: String::new(),
            fragment_shader_defines: BTreeSet::new(),
            shader_attribute_bindings: Vec::new(),
            uniforms: BTreeMap::new(),
            state_enable: Vec::new(),
            state_disable: Vec::new(),
            state_enablei: Vec::new(),
            state_disablei: Vec::new(),
            state_enum: BTreeMap::new(),
            render_targets: BTreeMap::new(),
            samplers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniformConfig {
    pub data: Vec<f32>,
}

/// A capability toggled on one indexed target (e.g. blending on draw buffer 1).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedState {
    pub name: String,
    pub index: u32,
}

/// Kind of payload a [`StateConfig`] carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    /// `enum_data` names an enum (`"GL_LEQUAL"`).
    #[default]
    Enum,
    /// `int_data` holds integers.
    Int,
    /// `float_data` holds one, two, or four floats.
    Float,
}

/// One fixed-function or sampler parameter value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    #[serde(rename = "type")]
    pub kind: StateKind,
    pub enum_data: String,
    pub int_data: Vec<i32>,
    pub float_data: Vec<f32>,
}

impl StateConfig {
    #[must_use]
    pub fn enumeration(name: &str) -> Self {
        Self {
            kind: StateKind::Enum,
            enum_data: name.to_owned(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn ints(values: &[i32]) -> Self {
        Self {
            kind: StateKind::Int,
            int_data: values.to_vec(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn floats(values: &[f32]) -> Self {
        Self {
            kind: StateKind::Float,
            float_data: values.to_vec(),
            ..Self::default()
        }
    }
}

/// A texture a pass renders into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderTargetConfig {
    /// Name under which later passes can bind this target.
    pub name: String,
    /// Fragment shader output variable routed to this attachment.
    pub variable: String,
    pub format: String,
    pub target: String,
    pub auto_mipmap: bool,
    pub width: f32,
    pub height: f32,
    /// `width`/`height` scale the framebuffer size instead of being pixels.
    pub width_height_are_multiples: bool,
}

impl Default for RenderTargetConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            variable: String::new(),
            format: "GL_RGBA8".to_owned(),
            target: "GL_TEXTURE_2D".to_owned(),
            auto_mipmap: false,
            width: 1.0,
            height: 1.0,
            width_height_are_multiples: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Texture bound to this sampler's unit by default.
    pub texture_name: String,
    /// Sampler parameters keyed by name (`GL_TEXTURE_MIN_FILTER`, ...).
    pub state: BTreeMap<String, StateConfig>,
}

/// A full pass-list document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassList {
    pub settings: RendererSettings,
    #[serde(rename = "pass")]
    pub passes: Vec<PassConfig>,
}

impl PassList {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Serializes back to TOML, e.g. for an editor that saves pass lists.
    pub fn to_toml_string(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}
