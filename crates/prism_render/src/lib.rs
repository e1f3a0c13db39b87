//! Prism Render
//!
//! A config-driven, multi-pass renderer. Each pass owns its program,
//! framebuffer and render targets; later passes sample earlier passes'
//! targets by name.
//!
//! - [`device`]: the [`GpuDevice`] seam and the [`HeadlessDevice`] backend
//! - [`commands`]: [`GpuCommands`], the caching, error-checking call wrapper
//! - [`config`] / [`settings`]: pass-list documents and renderer knobs
//! - [`lookup`] / [`state`]: configuration strings resolved to typed state
//! - [`pass`]: one [`RenderPass`]
//! - [`renderer`]: the ordered pass list and the scene-facing API
//! - [`cull`]: draw-list assembly with frustum and contribution culling

pub mod commands;
pub mod config;
pub mod cull;
pub mod device;
pub mod dimensions;
pub mod lookup;
pub mod model;
pub mod pass;
pub mod renderer;
pub mod settings;
pub mod state;
pub mod texture;
pub mod uniform;

pub use commands::{CommandOptions, DrawCommands, GpuCommands};
pub use config::{PassConfig, PassList};
pub use cull::{CullSettings, Drawable, DrawableKey, DrawListAssembler, FrameView, SceneDrawables};
pub use device::{GpuDevice, HeadlessDevice};
pub use model::{ExternalModel, ExternalModels, GroupModels, ModelEntry, ModelHandle, PassModels};
pub use pass::{PrintContext, RenderPass, StatusVerbosity};
pub use renderer::Renderer;
pub use renderer::shaders::{FileShaderLoader, MemoryShaderLoader, ShaderLoader};
pub use settings::RendererSettings;
pub use texture::{SharedTextures, TextureEntry};
pub use uniform::{UniformData, UniformEntry};

/// Everything a typical frame loop needs.
pub mod prelude {
    pub use crate::commands::GpuCommands;
    pub use crate::config::{PassConfig, PassList};
    pub use crate::cull::{CullSettings, Drawable, DrawListAssembler, FrameView, SceneDrawables};
    pub use crate::device::{GpuDevice, HeadlessDevice};
    pub use crate::model::{ExternalModel, ExternalModels, ModelEntry, ModelHandle};
    pub use crate::pass::StatusVerbosity;
    pub use crate::renderer::Renderer;
    pub use crate::renderer::shaders::{FileShaderLoader, MemoryShaderLoader, ShaderLoader};
    pub use crate::settings::RendererSettings;
    pub use crate::texture::TextureEntry;
    pub use crate::uniform::UniformEntry;
}
