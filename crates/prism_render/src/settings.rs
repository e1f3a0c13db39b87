//! Renderer Settings
//!
//! Process-wide knobs for the [`Renderer`](crate::renderer::Renderer): where
//! shader sources live, which preprocessor defines every shader receives, and
//! how GPU diagnostics behave.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use prism_render::settings::RendererSettings;
//!
//! // Defaults: shaders resolved relative to the working directory,
//! // error checking in debug builds only.
//! let settings = RendererSettings::default();
//!
//! // Verbose diagnostics while chasing a driver problem.
//! let settings = RendererSettings {
//!     shader_path: "data/shaders/gl3".into(),
//!     error_checking: true,
//!     log_calls: true,
//!     ..Default::default()
//! };
//!
//! let renderer = Renderer::new(device, settings);
//! ```
//!
//! Settings can also be embedded in a pass-list file as a `[settings]` table;
//! see [`PassList`](crate::config::PassList).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::commands::CommandOptions;

// ---------------------------------------------------------------------------
// RendererSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    // === Shader Sources ===
    /// Directory shader file names are resolved against.
    ///
    /// Empty means file names are used as given.
    pub shader_path: String,

    /// Defines added to every shader compiled by the renderer, in addition
    /// to the per-pass defines.
    pub global_defines: BTreeSet<String>,

    // === Profiling ===
    /// Block on the previous frame's timer query instead of skipping it when
    /// the result is not ready yet.
    ///
    /// `true` gives a timing every frame at the cost of a pipeline stall.
    pub wait_on_timer_query: bool,

    // === Diagnostics ===
    /// Poll the GPU error flag after every call and log failures with
    /// call-site context.
    pub error_checking: bool,

    /// Panic on the first GPU error. Ignored in release builds.
    pub break_on_error: bool,

    /// Emit every GPU call at `trace` level under the `prism::gpu` target.
    pub log_calls: bool,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            shader_path: String::new(),
            global_defines: BTreeSet::new(),
            wait_on_timer_query: true,
            error_checking: cfg!(debug_assertions),
            break_on_error: false,
            log_calls: false,
        }
    }
}

impl RendererSettings {
    /// The diagnostics subset handed to the command wrapper.
    #[inline]
    #[must_use]
    pub fn command_options(&self) -> CommandOptions {
        CommandOptions {
            error_checking: self.error_checking,
            break_on_error: self.break_on_error,
            log_calls: self.log_calls,
        }
    }
}
