//! Error Types
//!
//! This module defines the error types used throughout the renderer.
//!
//! # Overview
//!
//! The main error type [`PrismError`] covers every failure that can abort
//! renderer initialization:
//! - Pass configuration errors (unknown enum names, attachment limits)
//! - Shader compile and link failures
//! - Framebuffer completeness failures
//! - Pass-list file loading and parsing
//!
//! Runtime GPU errors are *not* represented here. They are logged by the
//! command wrapper with call-site context and never change control flow.
//!
//! # Usage
//!
//! ```rust,ignore
//! use prism_core::errors::{PrismError, Result};
//!
//! fn initialize() -> Result<()> {
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the Prism renderer.
#[derive(Error, Debug)]
pub enum PrismError {
    // ========================================================================
    // Pass Configuration Errors
    // ========================================================================
    /// A configuration string did not resolve through the enum lookup table.
    #[error("Unknown {kind} name in pass configuration: \"{name}\"")]
    UnknownEnum {
        /// Which lookup table was consulted (e.g. "capability", "texture format")
        kind: &'static str,
        /// The offending string
        name: String,
    },

    /// A state entry carried a value that does not fit its parameter.
    #[error("Invalid value for state \"{state}\": {reason}")]
    InvalidStateValue {
        /// State parameter name as written in the configuration
        state: String,
        /// Human-readable reason
        reason: String,
    },

    /// More than one depth attachment was declared for a pass.
    #[error("Multiple depth attachments are not supported: {0}")]
    MultipleDepthAttachments(usize),

    /// More color attachments than the device supports.
    #[error("Pass has {requested} draw buffers, but only {supported} are supported")]
    TooManyColorAttachments {
        /// Number of color attachments declared
        requested: usize,
        /// Device limit (minimum of draw buffers and color attachments)
        supported: usize,
    },

    /// Render targets were declared but none of them is a color or depth attachment.
    #[error("Pass has no color or depth attachments, but render targets were specified")]
    NoAttachableTargets,

    /// The sampler count exceeds the number of texture image units.
    #[error("Maximum supported texture unit count exceeded: {0}")]
    TextureUnitsExceeded(u32),

    /// The render target format cannot be used for its attachment point.
    #[error("Unhandled render target format: {0}")]
    UnsupportedFormat(String),

    /// A uniform payload length that no upload path handles.
    #[error("Encountered unexpected uniform size: {size} (location {location})")]
    UnexpectedUniformSize {
        /// Number of scalars in the payload
        size: usize,
        /// Target uniform location
        location: i32,
    },

    // ========================================================================
    // Shader Errors
    // ========================================================================
    /// The shader source could not be read.
    #[error("Couldn't open shader file: {0}")]
    ShaderSourceMissing(String),

    /// Shader compilation failed; carries the compiler info log.
    #[error("Unable to compile shader {name}:\n{log}")]
    ShaderCompile {
        /// Shader cache name (file plus defines)
        name: String,
        /// Compiler output
        log: String,
    },

    /// Program linking failed; carries the linker info log.
    #[error("Linking of shader program failed:\n{0}")]
    ShaderLink(String),

    // ========================================================================
    // Framebuffer Errors
    // ========================================================================
    /// The framebuffer is not complete.
    #[error("Incomplete framebuffer: {0}")]
    IncompleteFramebuffer(&'static str),

    // ========================================================================
    // Pass-List Loading Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Pass-list TOML parse error.
    #[error("Pass list parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A pass initialization failed; wraps the underlying cause with the pass name.
    #[error("Unable to initialize pass \"{pass}\": {source}")]
    PassInit {
        /// Pass name
        pass: String,
        /// Underlying failure
        #[source]
        source: Box<PrismError>,
    },
}

impl PrismError {
    /// Wraps this error with the name of the pass being initialized.
    #[must_use]
    pub fn in_pass(self, pass: &str) -> Self {
        Self::PassInit {
            pass: pass.to_owned(),
            source: Box::new(self),
        }
    }
}

/// Alias for `Result<T, PrismError>`.
pub type Result<T> = std::result::Result<T, PrismError>;
