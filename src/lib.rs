//! Prism
//!
//! A multi-pass, config-driven scene renderer.
//!
//! This umbrella crate re-exports the workspace crates:
//!
//! - [`core`] (`prism_core`): name interning, errors, logging setup, bounds
//!   math and the static-geometry spatial tree
//! - [`render`] (`prism_render`): the GPU command wrapper, render passes, the
//!   renderer and draw-list assembly
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use prism::prelude::*;
//!
//! init_logging(&LoggingConfig::default());
//!
//! let list = PassList::load("passes.toml")?;
//! let mut names = NameMap::new();
//! let mut renderer = Renderer::new(HeadlessDevice::new(), list.settings.clone());
//! renderer.initialize(&list.passes, &mut names, &mut FileShaderLoader, (1280, 720))?;
//!
//! let mut scene = SceneDrawables::new();
//! let mut assembler = DrawListAssembler::new(CullSettings::default());
//!
//! loop {
//!     let view = FrameView { camera_position: eye, resolution_y: 720.0 };
//!     let draw_map = assembler.assemble(&renderer, &scene, &names, view);
//!     renderer.render((1280, 720), ExternalModels::ByPass(&draw_map));
//! }
//! ```

pub use prism_core as core;
pub use prism_render as render;

pub use prism_core::{AabbTree, BoundingBox, Frustum, NameId, NameMap, PrismError, Result};
pub use prism_render::{PassList, Renderer, RendererSettings};

pub mod prelude {
    pub use prism_core::logging::{LoggingConfig, init_logging};
    pub use prism_core::math::{IntersectAlways, Ray};
    pub use prism_core::{AabbTree, BoundingBox, Frustum, NameId, NameMap, PrismError, Result};
    pub use prism_render::prelude::*;
}
