//! GPU Device Seam
//!
//! Everything the renderer asks of the graphics driver goes through the
//! [`GpuDevice`] trait. The trait mirrors an immediate-mode, bind-to-edit
//! driver model (bind a texture, then upload storage to "the bound texture")
//! because pass state is expressed that way: enable lists, per-unit texture
//! bindings, per-location uniforms.
//!
//! State values use wgpu's typed vocabulary ([`wgpu::CompareFunction`],
//! [`wgpu::BlendFactor`], [`wgpu::TextureFormat`], ...) rather than raw
//! integers, so a pass configuration is fully validated when it is parsed.
//!
//! # Handles
//!
//! GPU objects are referred to by small `Copy` handles. Handles are
//! **non-owning**: copying or dropping one never creates or destroys the
//! underlying object. Whoever called the matching `create_*` method is
//! responsible for calling `delete_*` exactly once. Passes document which
//! handles they own (render targets they create) and which they merely
//! reference (targets published by earlier passes, caller textures).
//!
//! # Implementations
//!
//! - [`HeadlessDevice`]: a complete in-memory implementation that validates
//!   usage, tracks bindings, and records every call. Used by tests, tools,
//!   and the headless demo.
//!
//! Error reporting follows the driver model as well: misuse sets an error
//! flag that [`GpuDevice::take_error`] returns and clears. The command
//! wrapper polls it after every call.

mod headless;

use std::fmt;

use bitflags::bitflags;

pub use headless::{CallRecord, DrawRecord, FixedFunctionSnapshot, HeadlessDevice};

// ============================================================================
// Handles
// ============================================================================

macro_rules! gpu_handle {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u32);

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

gpu_handle! {
    /// A compiled shader stage.
    ShaderHandle;
    /// A linked shader program.
    ProgramHandle;
    /// A texture object.
    TextureHandle;
    /// A sampler object.
    SamplerHandle;
    /// A framebuffer object. `None` in APIs taking `Option` means the default framebuffer.
    FramebufferHandle;
    /// A renderbuffer object.
    RenderbufferHandle;
    /// A vertex array object.
    VertexArrayHandle;
    /// A timer query object.
    QueryHandle;
}

/// Location of an active uniform within a linked program.
///
/// Locations are program-relative: the same number means different
/// variables in different programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformLocation(pub u32);

impl UniformLocation {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for UniformLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// State Vocabulary
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Toggleable pipeline capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    Blend,
    ClipDistance0,
    ClipDistance1,
    ColorLogicOp,
    CullFace,
    DepthClamp,
    DepthTest,
    Dither,
    FramebufferSrgb,
    LineSmooth,
    Multisample,
    PolygonOffsetFill,
    PolygonOffsetLine,
    PolygonOffsetPoint,
    PolygonSmooth,
    PrimitiveRestart,
    ProgramPointSize,
    RasterizerDiscard,
    SampleAlphaToCoverage,
    SampleAlphaToOne,
    SampleCoverage,
    SampleMask,
    ScissorTest,
    StencilTest,
    TextureCubeMapSeamless,
}

/// Which polygon faces are culled when [`Capability::CullFace`] is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullFace {
    Front,
    Back,
    FrontAndBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HintTarget {
    LineSmooth,
    PolygonSmooth,
    FragmentShaderDerivative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HintMode {
    Fastest,
    Nicest,
    DontCare,
}

bitflags! {
    /// Buffers cleared by [`GpuDevice::clear`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClearMask: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Framebuffer attachment point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attachment {
    Color(u32),
    Depth,
    Stencil,
    DepthStencil,
}

impl Attachment {
    #[must_use]
    pub fn is_color(self) -> bool {
        matches!(self, Attachment::Color(_))
    }
}

impl fmt::Display for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attachment::Color(index) => write!(f, "GL_COLOR_ATTACHMENT{index}"),
            Attachment::Depth => f.write_str("GL_DEPTH_ATTACHMENT"),
            Attachment::Stencil => f.write_str("GL_STENCIL_ATTACHMENT"),
            Attachment::DepthStencil => f.write_str("GL_DEPTH_STENCIL_ATTACHMENT"),
        }
    }
}

/// Result of a framebuffer completeness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferStatus {
    Complete,
    Undefined,
    IncompleteAttachment,
    MissingAttachment,
    IncompleteDimensions,
    IncompleteDrawBuffer,
    Unsupported,
}

impl FramebufferStatus {
    #[must_use]
    pub fn is_complete(self) -> bool {
        self == FramebufferStatus::Complete
    }

    /// Driver enum spelling, used in diagnostics.
    #[must_use]
    pub fn enum_name(self) -> &'static str {
        match self {
            FramebufferStatus::Complete => "GL_FRAMEBUFFER_COMPLETE",
            FramebufferStatus::Undefined => "GL_FRAMEBUFFER_UNDEFINED",
            FramebufferStatus::IncompleteAttachment => "GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT",
            FramebufferStatus::MissingAttachment => {
                "GL_FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT"
            }
            FramebufferStatus::IncompleteDimensions => "GL_FRAMEBUFFER_INCOMPLETE_DIMENSIONS",
            FramebufferStatus::IncompleteDrawBuffer => "GL_FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER",
            FramebufferStatus::Unsupported => "GL_FRAMEBUFFER_UNSUPPORTED",
        }
    }
}

/// Error flag raised by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuError {
    InvalidEnum,
    InvalidValue,
    InvalidOperation,
    InvalidFramebufferOperation,
    OutOfMemory,
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GpuError::InvalidEnum => "invalid enumerant",
            GpuError::InvalidValue => "invalid value",
            GpuError::InvalidOperation => "invalid operation",
            GpuError::InvalidFramebufferOperation => "invalid framebuffer operation",
            GpuError::OutOfMemory => "out of memory",
        })
    }
}

/// A texture or sampler parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextureParameter {
    /// Minification filter, optionally blending between mip levels.
    MinFilter(wgpu::FilterMode, Option<wgpu::MipmapFilterMode>),
    MagFilter(wgpu::FilterMode),
    WrapS(wgpu::AddressMode),
    WrapT(wgpu::AddressMode),
    WrapR(wgpu::AddressMode),
    /// `true` compares against the reference value (shadow sampling).
    CompareMode(bool),
    CompareFunc(wgpu::CompareFunction),
    MinLod(f32),
    MaxLod(f32),
    LodBias(f32),
    MaxAnisotropy(f32),
    BorderColor([f32; 4]),
}

/// A uniform payload, already dispatched to its upload shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Column-major 4×4 matrix.
    Mat4([f32; 16]),
    Int(i32),
    IVec2([i32; 2]),
    IVec3([i32; 3]),
    IVec4([i32; 4]),
}

/// Returns `true` for formats that can only back depth or stencil attachments.
#[must_use]
pub fn is_depth_stencil_format(format: wgpu::TextureFormat) -> bool {
    matches!(
        format,
        wgpu::TextureFormat::Depth16Unorm
            | wgpu::TextureFormat::Depth24Plus
            | wgpu::TextureFormat::Depth24PlusStencil8
            | wgpu::TextureFormat::Depth32Float
            | wgpu::TextureFormat::Depth32FloatStencil8
            | wgpu::TextureFormat::Stencil8
    )
}

/// Implementation limits queried once per framebuffer or sampler setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    pub max_texture_image_units: u32,
    pub max_draw_buffers: u32,
    pub max_color_attachments: u32,
    pub max_texture_size: u32,
    pub anisotropic_filtering: bool,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_texture_image_units: 16,
            max_draw_buffers: 8,
            max_color_attachments: 8,
            max_texture_size: 16384,
            anisotropic_filtering: true,
        }
    }
}

// ============================================================================
// Device Trait
// ============================================================================

/// The raw driver interface.
///
/// Methods never return `Result`: failures raise the error flag instead,
/// matching how the driver reports them. Only the command wrapper
/// ([`GpuCommands`](crate::commands::GpuCommands)) should call these.
pub trait GpuDevice {
    fn limits(&self) -> DeviceLimits;

    /// Returns and clears the oldest pending error.
    fn take_error(&mut self) -> Option<GpuError>;

    // --- Shaders and programs ---

    fn create_shader(&mut self, stage: ShaderStage) -> ShaderHandle;
    fn shader_source(&mut self, shader: ShaderHandle, source: &str);
    /// Returns the compile status.
    fn compile_shader(&mut self, shader: ShaderHandle) -> bool;
    fn shader_info_log(&self, shader: ShaderHandle) -> String;
    fn delete_shader(&mut self, shader: ShaderHandle);

    fn create_program(&mut self) -> ProgramHandle;
    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle);
    fn bind_attrib_location(&mut self, program: ProgramHandle, index: u32, name: &str);
    fn bind_frag_data_location(&mut self, program: ProgramHandle, color: u32, name: &str);
    /// Returns the link status.
    fn link_program(&mut self, program: ProgramHandle) -> bool;
    fn program_info_log(&self, program: ProgramHandle) -> String;
    fn delete_program(&mut self, program: ProgramHandle);
    fn use_program(&mut self, program: Option<ProgramHandle>);
    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;
    /// Uploads to the current program.
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);

    // --- Fixed-function state ---

    fn enable(&mut self, capability: Capability);
    fn disable(&mut self, capability: Capability);
    fn enable_indexed(&mut self, capability: Capability, index: u32);
    fn disable_indexed(&mut self, capability: Capability, index: u32);
    fn depth_func(&mut self, func: wgpu::CompareFunction);
    fn depth_mask(&mut self, write: bool);
    fn cull_face(&mut self, face: CullFace);
    fn front_face(&mut self, face: wgpu::FrontFace);
    fn polygon_mode(&mut self, mode: wgpu::PolygonMode);
    fn polygon_offset(&mut self, factor: f32, units: f32);
    fn sample_coverage(&mut self, value: f32, invert: bool);
    fn sample_mask(&mut self, index: u32, mask: u32);
    fn hint(&mut self, target: HintTarget, mode: HintMode);
    fn blend_equation_separate(&mut self, rgb: wgpu::BlendOperation, alpha: wgpu::BlendOperation);
    fn blend_func_separate(
        &mut self,
        src_rgb: wgpu::BlendFactor,
        dst_rgb: wgpu::BlendFactor,
        src_alpha: wgpu::BlendFactor,
        dst_alpha: wgpu::BlendFactor,
    );
    fn viewport(&mut self, width: u32, height: u32);
    fn clear_color(&mut self, rgba: [f32; 4]);
    fn clear_depth(&mut self, depth: f32);
    fn clear_stencil(&mut self, stencil: i32);
    fn clear(&mut self, mask: ClearMask);

    // --- Textures ---

    fn create_texture(&mut self) -> TextureHandle;
    fn delete_texture(&mut self, texture: TextureHandle);
    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, target: wgpu::TextureViewDimension, texture: Option<TextureHandle>);
    /// Allocates storage for the texture bound to `target` on the active unit.
    fn tex_image_2d(
        &mut self,
        target: wgpu::TextureViewDimension,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    );
    fn tex_parameter(&mut self, target: wgpu::TextureViewDimension, parameter: TextureParameter);
    fn generate_mipmap(&mut self, target: wgpu::TextureViewDimension);

    // --- Samplers ---

    fn create_sampler(&mut self) -> SamplerHandle;
    fn delete_sampler(&mut self, sampler: SamplerHandle);
    fn bind_sampler(&mut self, unit: u32, sampler: Option<SamplerHandle>);
    fn sampler_parameter(&mut self, sampler: SamplerHandle, parameter: TextureParameter);

    // --- Framebuffers ---

    fn create_framebuffer(&mut self) -> FramebufferHandle;
    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle);
    /// Binds the draw framebuffer; `None` is the default framebuffer.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>);
    fn check_framebuffer_status(&mut self) -> FramebufferStatus;
    /// Routes fragment outputs: entry `i` is the color attachment written by output `i`.
    fn draw_buffers(&mut self, buffers: &[Option<u32>]);
    fn framebuffer_texture_2d(
        &mut self,
        attachment: Attachment,
        target: wgpu::TextureViewDimension,
        texture: Option<TextureHandle>,
        level: u32,
    );
    fn create_renderbuffer(&mut self) -> RenderbufferHandle;
    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferHandle);
    fn bind_renderbuffer(&mut self, renderbuffer: Option<RenderbufferHandle>);
    fn renderbuffer_storage(&mut self, format: wgpu::TextureFormat, width: u32, height: u32);
    fn framebuffer_renderbuffer(
        &mut self,
        attachment: Attachment,
        renderbuffer: Option<RenderbufferHandle>,
    );

    // --- Geometry ---

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>);
    fn draw_elements(
        &mut self,
        topology: wgpu::PrimitiveTopology,
        count: u32,
        index_format: wgpu::IndexFormat,
        offset: u64,
    );
    fn draw_arrays(&mut self, topology: wgpu::PrimitiveTopology, first: u32, count: u32);

    // --- Timer queries ---

    fn create_query(&mut self) -> QueryHandle;
    fn delete_query(&mut self, query: QueryHandle);
    fn begin_time_elapsed(&mut self, query: QueryHandle);
    fn end_time_elapsed(&mut self);
    fn query_result_available(&mut self, query: QueryHandle) -> bool;
    /// Elapsed time in nanoseconds. Blocks until the result is available.
    fn query_result(&mut self, query: QueryHandle) -> u64;
}
