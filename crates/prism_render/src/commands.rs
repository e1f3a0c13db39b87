//! GPU Command Wrapper
//!
//! [`GpuCommands`] owns the device and is the only path from the renderer to
//! it. Routing every call through one place gives three things:
//!
//! 1. **Redundant-call elimination.** The wrapper tracks the active texture
//!    unit, the 2D texture bound on each unit, and the last payload uploaded
//!    to each uniform location. A call that would not change driver state is
//!    dropped.
//! 2. **Error reporting with call-site context.** After each call the device
//!    error flag is polled (when enabled) and failures are logged with the
//!    file and line of the renderer code that issued the call.
//! 3. **Call tracing.** With `log_calls` enabled every call is emitted at
//!    `trace` level under the `prism::gpu` target.
//!
//! # Cache Lifetime
//!
//! ```text
//!   use_program(A) ──► caches empty
//!        │
//!        ├─ apply_uniform(loc 3, M)   → sent, cached
//!        ├─ apply_uniform(loc 3, M)   → skipped
//!        ├─ active_texture(0)         → sent, unit known
//!        ├─ bind_texture(2D, T)       → sent, cached for unit 0
//!        ├─ bind_texture(2D, T)       → skipped
//!        │
//!   use_program(B) ──► caches empty (locations are program-relative)
//! ```
//!
//! Uniform locations belong to a program, so every program switch discards
//! the uniform caches. Texture bindings are discarded with them, since the
//! active unit is no longer tracked after the switch.
//!
//! GPU errors never change control flow: the wrapper logs and carries on.
//! Only configuration-time operations (compile, link) return `Result`.

use std::collections::BTreeMap;
use std::panic::Location;

use bytemuck::Pod;
use prism_core::{PrismError, Result};
use wgpu::{BlendFactor, BlendOperation, IndexFormat, PrimitiveTopology, TextureViewDimension};

use crate::device::{
    Attachment, Capability, ClearMask, CullFace, DeviceLimits, FramebufferHandle,
    FramebufferStatus, GpuDevice, HintMode, HintTarget, ProgramHandle, QueryHandle,
    RenderbufferHandle, SamplerHandle, ShaderHandle, ShaderStage, TextureHandle,
    TextureParameter, UniformLocation, UniformValue, VertexArrayHandle,
};
use crate::uniform::UniformVector;

/// Target under which call traces are logged.
pub const TRACE_TARGET: &str = "prism::gpu";

/// Diagnostics switches for the wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOptions {
    /// Poll the device error flag after every call.
    pub error_checking: bool,
    /// Panic on the first GPU error. Only honored in debug builds.
    pub break_on_error: bool,
    /// Trace every device call.
    pub log_calls: bool,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            error_checking: cfg!(debug_assertions),
            break_on_error: false,
            log_calls: false,
        }
    }
}

// ============================================================================
// Uniform Caches
// ============================================================================

/// Last uploaded payload per uniform location, one table per scalar type.
#[derive(Debug, Default)]
pub struct UniformCaches {
    floats: Vec<Option<UniformVector<f32>>>,
    ints: Vec<Option<UniformVector<i32>>>,
}

impl UniformCaches {
    fn clear(&mut self) {
        self.floats.clear();
        self.ints.clear();
    }
}

/// Scalar types a uniform payload can be made of.
pub trait UniformScalar: Pod {
    #[doc(hidden)]
    fn cache(caches: &mut UniformCaches) -> &mut Vec<Option<UniformVector<Self>>>;

    /// Dispatches a payload to its upload shape by length.
    fn to_value(data: &[Self]) -> Option<UniformValue>;
}

impl UniformScalar for f32 {
    fn cache(caches: &mut UniformCaches) -> &mut Vec<Option<UniformVector<f32>>> {
        &mut caches.floats
    }

    fn to_value(data: &[f32]) -> Option<UniformValue> {
        Some(match *data {
            [x] => UniformValue::Float(x),
            [x, y] => UniformValue::Vec2([x, y]),
            [x, y, z] => UniformValue::Vec3([x, y, z]),
            [x, y, z, w] => UniformValue::Vec4([x, y, z, w]),
            _ if data.len() == 16 => {
                let mut matrix = [0.0; 16];
                matrix.copy_from_slice(data);
                UniformValue::Mat4(matrix)
            }
            _ => return None,
        })
    }
}

impl UniformScalar for i32 {
    fn cache(caches: &mut UniformCaches) -> &mut Vec<Option<UniformVector<i32>>> {
        &mut caches.ints
    }

    fn to_value(data: &[i32]) -> Option<UniformValue> {
        Some(match *data {
            [x] => UniformValue::Int(x),
            [x, y] => UniformValue::IVec2([x, y]),
            [x, y, z] => UniformValue::IVec3([x, y, z]),
            [x, y, z, w] => UniformValue::IVec4([x, y, z, w]),
            _ => return None,
        })
    }
}

// ============================================================================
// Blend State
// ============================================================================

/// The four blend factors and two equations, set one component at a time.
///
/// The driver only accepts them in separate-pairs, so the wrapper remembers
/// the other components of each pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendState {
    pub equation_rgb: BlendOperation,
    pub equation_alpha: BlendOperation,
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            equation_rgb: BlendOperation::Add,
            equation_alpha: BlendOperation::Add,
            src_rgb: BlendFactor::One,
            dst_rgb: BlendFactor::Zero,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
        }
    }
}

// ============================================================================
// Draw Dispatch
// ============================================================================

/// The slice of the wrapper available to custom draw callbacks.
///
/// Kept object-safe so external models can carry `dyn Fn(&mut dyn DrawCommands)`.
pub trait DrawCommands {
    /// Binds `vertex_array` and draws `element_count` indexed triangles.
    fn draw_geometry(&mut self, vertex_array: VertexArrayHandle, element_count: u32);
    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>);
    fn draw_elements(
        &mut self,
        topology: PrimitiveTopology,
        count: u32,
        index_format: IndexFormat,
        offset: u64,
    );
    fn draw_arrays(&mut self, topology: PrimitiveTopology, first: u32, count: u32);
}

// ============================================================================
// Wrapper
// ============================================================================

/// Generates methods that forward straight to the device with tracing and
/// error checking.
macro_rules! forward {
    ($($(#[$meta:meta])* fn $name:ident(&mut self $(, $arg:ident: $ty:ty)*) $(-> $ret:ty)?;)*) => {
        $(
            $(#[$meta])*
            #[track_caller]
            pub fn $name(&mut self $(, $arg: $ty)*) $(-> $ret)? {
                self.trace(stringify!($name), || format!("{:?}", ($(&$arg,)*)));
                let result = self.device.$name($($arg),*);
                self.check_error(stringify!($name));
                result
            }
        )*
    };
}

/// Caching, error-checking owner of a [`GpuDevice`].
#[derive(Debug)]
pub struct GpuCommands<D: GpuDevice> {
    device: D,
    options: CommandOptions,

    active_unit: Option<u32>,
    /// 2D texture per unit; `None` entries are known-unbound.
    bound_textures: Vec<Option<TextureHandle>>,
    uniforms: UniformCaches,
    blend: BlendState,
}

impl<D: GpuDevice> GpuCommands<D> {
    #[must_use]
    pub fn new(device: D, options: CommandOptions) -> Self {
        Self {
            device,
            options,
            active_unit: None,
            bound_textures: Vec::new(),
            uniforms: UniformCaches::default(),
            blend: BlendState::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Direct device access. Calls made this way bypass the caches, so the
    /// caller must not change bindings the wrapper tracks.
    #[inline]
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    #[must_use]
    pub fn into_device(self) -> D {
        self.device
    }

    #[inline]
    #[must_use]
    pub fn options(&self) -> CommandOptions {
        self.options
    }

    pub fn set_options(&mut self, options: CommandOptions) {
        self.options = options;
    }

    /// Turns per-call tracing on or off.
    pub fn set_log_calls(&mut self, enabled: bool) {
        self.options.log_calls = enabled;
    }

    #[must_use]
    pub fn limits(&self) -> DeviceLimits {
        self.device.limits()
    }

    #[must_use]
    pub fn blend_state(&self) -> BlendState {
        self.blend
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    fn trace(&self, name: &str, args: impl FnOnce() -> String) {
        if self.options.log_calls {
            log::trace!(target: TRACE_TARGET, "{name}{}", args());
        }
    }

    /// Polls the device error flag. Returns `false` if an error was pending.
    #[track_caller]
    pub fn check_error(&mut self, function: &str) -> bool {
        if !self.options.error_checking {
            return true;
        }
        let Some(error) = self.device.take_error() else {
            return true;
        };

        let caller = Location::caller();
        log::error!(
            "GPU error \"{error}\" during: {function}:{}:{}",
            caller.file(),
            caller.line()
        );
        if self.options.break_on_error && cfg!(debug_assertions) {
            panic!("GPU error \"{error}\" during {function} at {caller}");
        }
        false
    }

    fn clear_caches(&mut self) {
        self.active_unit = None;
        self.bound_textures.clear();
        self.uniforms.clear();
    }

    // ========================================================================
    // Cached State
    // ========================================================================

    /// Switches programs and discards every cache.
    #[track_caller]
    pub fn use_program(&mut self, program: Option<ProgramHandle>) {
        self.trace("use_program", || format!("({program:?})"));
        self.device.use_program(program);
        self.check_error("use_program");
        self.clear_caches();
    }

    #[track_caller]
    pub fn active_texture(&mut self, unit: u32) {
        if self.active_unit == Some(unit) {
            return;
        }
        self.active_unit = Some(unit);
        self.trace("active_texture", || format!("({unit})"));
        self.device.active_texture(unit);
        self.check_error("active_texture");
    }

    /// Binds a texture on the active unit.
    ///
    /// Only 2D bindings are cached, and only while the active unit is known.
    #[track_caller]
    pub fn bind_texture(&mut self, target: TextureViewDimension, texture: Option<TextureHandle>) {
        if target == TextureViewDimension::D2
            && let Some(unit) = self.active_unit
        {
            let slot = unit as usize;
            if slot >= self.bound_textures.len() {
                self.bound_textures.resize(slot + 1, None);
            } else if self.bound_textures[slot] == texture {
                return;
            }
            self.bound_textures[slot] = texture;
        }

        self.trace("bind_texture", || format!("({target:?}, {texture:?})"));
        self.device.bind_texture(target, texture);
        self.check_error("bind_texture");
    }

    #[track_caller]
    pub fn unbind_texture(&mut self, target: TextureViewDimension) {
        self.bind_texture(target, None);
    }

    #[track_caller]
    pub fn delete_texture(&mut self, texture: TextureHandle) {
        for bound in &mut self.bound_textures {
            if *bound == Some(texture) {
                *bound = None;
            }
        }
        self.trace("delete_texture", || format!("({texture})"));
        self.device.delete_texture(texture);
        self.check_error("delete_texture");
    }

    /// Uploads `data` to `location` unless the cache shows the same bits are
    /// already there.
    #[track_caller]
    pub fn apply_uniform<T: UniformScalar>(
        &mut self,
        location: UniformLocation,
        data: &UniformVector<T>,
    ) {
        let slot = location.index();
        if T::cache(&mut self.uniforms).get(slot).and_then(Option::as_ref) == Some(data) {
            return;
        }
        if !self.apply_uniform_uncached(location, data) {
            return;
        }
        let cache = T::cache(&mut self.uniforms);
        if slot >= cache.len() {
            cache.resize(slot + 1, None);
        }
        cache[slot] = Some(*data);
    }

    /// Uploads `data` without consulting or updating the cache.
    ///
    /// Returns `false` if the payload has no matching uniform type.
    #[track_caller]
    pub fn apply_uniform_uncached<T: UniformScalar>(
        &mut self,
        location: UniformLocation,
        data: &UniformVector<T>,
    ) -> bool {
        let Some(value) = T::to_value(data) else {
            let error = PrismError::UnexpectedUniformSize {
                size: data.len(),
                location: location.0 as i32,
            };
            log::error!("{error}");
            return false;
        };
        self.trace("set_uniform", || format!("({location}, {value:?})"));
        self.device.set_uniform(location, value);
        self.check_error("set_uniform");
        true
    }

    // ========================================================================
    // Blend Components
    // ========================================================================

    #[track_caller]
    pub fn blend_equation_rgb(&mut self, operation: BlendOperation) {
        self.blend.equation_rgb = operation;
        self.send_blend_equation();
    }

    #[track_caller]
    pub fn blend_equation_alpha(&mut self, operation: BlendOperation) {
        self.blend.equation_alpha = operation;
        self.send_blend_equation();
    }

    #[track_caller]
    pub fn blend_src_rgb(&mut self, factor: BlendFactor) {
        self.blend.src_rgb = factor;
        self.send_blend_func();
    }

    #[track_caller]
    pub fn blend_dst_rgb(&mut self, factor: BlendFactor) {
        self.blend.dst_rgb = factor;
        self.send_blend_func();
    }

    #[track_caller]
    pub fn blend_src_alpha(&mut self, factor: BlendFactor) {
        self.blend.src_alpha = factor;
        self.send_blend_func();
    }

    #[track_caller]
    pub fn blend_dst_alpha(&mut self, factor: BlendFactor) {
        self.blend.dst_alpha = factor;
        self.send_blend_func();
    }

    #[track_caller]
    fn send_blend_equation(&mut self) {
        let BlendState {
            equation_rgb,
            equation_alpha,
            ..
        } = self.blend;
        self.trace("blend_equation_separate", || {
            format!("({equation_rgb:?}, {equation_alpha:?})")
        });
        self.device
            .blend_equation_separate(equation_rgb, equation_alpha);
        self.check_error("blend_equation_separate");
    }

    #[track_caller]
    fn send_blend_func(&mut self) {
        let BlendState {
            src_rgb,
            dst_rgb,
            src_alpha,
            dst_alpha,
            ..
        } = self.blend;
        self.trace("blend_func_separate", || {
            format!("({src_rgb:?}, {dst_rgb:?}, {src_alpha:?}, {dst_alpha:?})")
        });
        self.device
            .blend_func_separate(src_rgb, dst_rgb, src_alpha, dst_alpha);
        self.check_error("blend_func_separate");
    }

    // ========================================================================
    // Shaders
    // ========================================================================

    /// Creates and compiles a shader stage.
    ///
    /// On failure the compiler log is logged, the shader is deleted, and the
    /// log is returned in the error.
    #[track_caller]
    pub fn compile_shader(
        &mut self,
        name: &str,
        stage: ShaderStage,
        source: &str,
    ) -> Result<ShaderHandle> {
        let shader = self.create_shader(stage);
        self.shader_source(shader, source);
        let compiled = self.device.compile_shader(shader);
        self.check_error("compile_shader");
        let log = self.device.shader_info_log(shader);

        if !compiled {
            log::error!("Shader compilation failed: {name}\n{log}");
            self.delete_shader(shader);
            return Err(PrismError::ShaderCompile {
                name: name.to_owned(),
                log,
            });
        }
        if !log.is_empty() {
            log::warn!("Shader compiler output for {name}:\n{log}");
        }
        Ok(shader)
    }

    /// Creates a program from compiled stages and links it.
    ///
    /// Vertex attributes are bound to their index in `attributes` (empty
    /// names are skipped) and fragment outputs to the color attachment they
    /// are keyed by, both before linking.
    #[track_caller]
    pub fn link_program(
        &mut self,
        attributes: &[String],
        shaders: &[ShaderHandle],
        frag_data: &BTreeMap<u32, String>,
    ) -> Result<ProgramHandle> {
        let program = self.create_program();
        for &shader in shaders {
            self.attach_shader(program, shader);
        }
        for (index, name) in attributes.iter().enumerate() {
            if !name.is_empty() {
                self.bind_attrib_location(program, index as u32, name);
            }
        }
        for (color, name) in frag_data {
            self.bind_frag_data_location(program, *color, name);
        }

        self.link_existing(program).inspect_err(|_| {
            self.delete_program(program);
        })?;
        Ok(program)
    }

    /// Links `program` again, e.g. after attribute bindings changed.
    /// The program is deleted if linking fails.
    #[track_caller]
    pub fn relink_program(&mut self, program: ProgramHandle) -> Result<()> {
        self.link_existing(program).inspect_err(|_| {
            self.delete_program(program);
        })
    }

    #[track_caller]
    fn link_existing(&mut self, program: ProgramHandle) -> Result<()> {
        self.trace("link_program", || format!("({program})"));
        let linked = self.device.link_program(program);
        self.check_error("link_program");
        let log = self.device.program_info_log(program);

        if !linked {
            log::error!("Linking of shader program failed:\n{log}");
            return Err(PrismError::ShaderLink(log));
        }
        if !log.is_empty() {
            log::warn!("Shader linker output:\n{log}");
        }
        Ok(())
    }

    // ========================================================================
    // Framebuffers
    // ========================================================================

    /// Binds a framebuffer and validates it. The default framebuffer is
    /// always considered complete.
    ///
    /// Returns `false` and logs the status if the framebuffer is incomplete.
    #[track_caller]
    pub fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) -> bool {
        self.bind_framebuffer_unchecked(framebuffer);
        if framebuffer.is_none() {
            return true;
        }

        let status = self.check_framebuffer_status();
        if status.is_complete() {
            true
        } else {
            log::error!(
                "{}",
                PrismError::IncompleteFramebuffer(status.enum_name())
            );
            false
        }
    }

    /// Binds without a completeness check.
    #[track_caller]
    pub fn bind_framebuffer_unchecked(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.trace("bind_framebuffer", || format!("({framebuffer:?})"));
        self.device.bind_framebuffer(framebuffer);
        self.check_error("bind_framebuffer");
    }

    #[track_caller]
    pub fn unbind_framebuffer(&mut self) {
        self.bind_framebuffer_unchecked(None);
    }

    // ========================================================================
    // Composite Operations
    // ========================================================================

    /// Binds `vertex_array` and draws `element_count` indexed triangles.
    #[track_caller]
    pub fn draw_geometry(&mut self, vertex_array: VertexArrayHandle, element_count: u32) {
        self.bind_vertex_array(Some(vertex_array));
        self.draw_elements(
            PrimitiveTopology::TriangleList,
            element_count,
            IndexFormat::Uint32,
            0,
        );
    }

    /// Regenerates the mip chain of `texture` on the active unit.
    #[track_caller]
    pub fn generate_mipmaps(&mut self, target: TextureViewDimension, texture: TextureHandle) {
        self.bind_texture(target, Some(texture));
        self.generate_mipmap(target);
        self.unbind_texture(target);
    }

    #[track_caller]
    pub fn unbind_sampler(&mut self, unit: u32) {
        self.bind_sampler(unit, None);
    }

    // ========================================================================
    // Forwarded Calls
    // ========================================================================

    forward! {
        fn create_shader(&mut self, stage: ShaderStage) -> ShaderHandle;
        fn shader_source(&mut self, shader: ShaderHandle, source: &str);
        fn delete_shader(&mut self, shader: ShaderHandle);
        fn create_program(&mut self) -> ProgramHandle;
        fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle);
        fn bind_attrib_location(&mut self, program: ProgramHandle, index: u32, name: &str);
        fn bind_frag_data_location(&mut self, program: ProgramHandle, color: u32, name: &str);
        fn delete_program(&mut self, program: ProgramHandle);
        /// `None` when the program has no active uniform with that name.
        fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

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
        fn viewport(&mut self, width: u32, height: u32);
        fn clear_color(&mut self, rgba: [f32; 4]);
        fn clear_depth(&mut self, depth: f32);
        fn clear_stencil(&mut self, stencil: i32);
        fn clear(&mut self, mask: ClearMask);

        fn create_texture(&mut self) -> TextureHandle;
        fn tex_image_2d(&mut self, target: TextureViewDimension, format: wgpu::TextureFormat, width: u32, height: u32);
        fn tex_parameter(&mut self, target: TextureViewDimension, parameter: TextureParameter);
        fn generate_mipmap(&mut self, target: TextureViewDimension);

        fn create_sampler(&mut self) -> SamplerHandle;
        fn delete_sampler(&mut self, sampler: SamplerHandle);
        fn bind_sampler(&mut self, unit: u32, sampler: Option<SamplerHandle>);
        fn sampler_parameter(&mut self, sampler: SamplerHandle, parameter: TextureParameter);

        fn create_framebuffer(&mut self) -> FramebufferHandle;
        fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle);
        fn check_framebuffer_status(&mut self) -> FramebufferStatus;
        fn draw_buffers(&mut self, buffers: &[Option<u32>]);
        fn framebuffer_texture_2d(&mut self, attachment: Attachment, target: TextureViewDimension, texture: Option<TextureHandle>, level: u32);
        fn create_renderbuffer(&mut self) -> RenderbufferHandle;
        fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferHandle);
        fn bind_renderbuffer(&mut self, renderbuffer: Option<RenderbufferHandle>);
        fn renderbuffer_storage(&mut self, format: wgpu::TextureFormat, width: u32, height: u32);
        fn framebuffer_renderbuffer(&mut self, attachment: Attachment, renderbuffer: Option<RenderbufferHandle>);

        fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>);
        fn draw_elements(&mut self, topology: PrimitiveTopology, count: u32, index_format: IndexFormat, offset: u64);
        fn draw_arrays(&mut self, topology: PrimitiveTopology, first: u32, count: u32);

        fn create_query(&mut self) -> QueryHandle;
        fn delete_query(&mut self, query: QueryHandle);
        fn begin_time_elapsed(&mut self, query: QueryHandle);
        fn end_time_elapsed(&mut self);
        fn query_result_available(&mut self, query: QueryHandle) -> bool;
        /// Elapsed nanoseconds; blocks until available.
        fn query_result(&mut self, query: QueryHandle) -> u64;
    }
}

impl<D: GpuDevice> DrawCommands for GpuCommands<D> {
    fn draw_geometry(&mut self, vertex_array: VertexArrayHandle, element_count: u32) {
        GpuCommands::draw_geometry(self, vertex_array, element_count);
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>) {
        GpuCommands::bind_vertex_array(self, vertex_array);
    }

    fn draw_elements(
        &mut self,
        topology: PrimitiveTopology,
        count: u32,
        index_format: IndexFormat,
        offset: u64,
    ) {
        GpuCommands::draw_elements(self, topology, count, index_format, offset);
    }

    fn draw_arrays(&mut self, topology: PrimitiveTopology, first: u32, count: u32) {
        GpuCommands::draw_arrays(self, topology, first, count);
    }
}
