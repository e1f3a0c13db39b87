//! In-memory [`GpuDevice`] implementation.
//!
//! `HeadlessDevice` behaves like a strict driver without producing pixels:
//!
//! - Shaders "compile" by scanning their source. An empty source or a line
//!   starting with `#error` fails; every `uniform <type> <name>;` line
//!   declares an active uniform.
//! - Linking requires a compiled vertex and fragment stage. Uniform
//!   locations are assigned in declaration order, vertex stage first.
//! - Framebuffer completeness is validated from attachment storage, formats,
//!   sizes, and draw-buffer routing.
//! - Misuse raises the same error flags a driver would.
//!
//! Every call is recorded (name plus arguments) and draws capture the
//! bindings in effect, so tests can assert on exactly what reached the
//! device.

use std::collections::BTreeMap;
use std::mem;

use rustc_hash::{FxHashMap, FxHashSet};
use wgpu::{
    BlendFactor, BlendOperation, CompareFunction, FrontFace, IndexFormat, PolygonMode,
    PrimitiveTopology, TextureFormat, TextureViewDimension,
};

use super::{
    Attachment, Capability, ClearMask, CullFace, DeviceLimits, FramebufferHandle,
    FramebufferStatus, GpuDevice, GpuError, HintMode, HintTarget, ProgramHandle, QueryHandle,
    RenderbufferHandle, SamplerHandle, ShaderHandle, ShaderStage, TextureHandle,
    TextureParameter, UniformLocation, UniformValue, VertexArrayHandle, is_depth_stencil_format,
};

/// Simulated cost of a timer query with no draws inside it.
const QUERY_BASE_NANOS: u64 = 5_000;
/// Simulated cost added per draw call inside a timer query.
const QUERY_NANOS_PER_DRAW: u64 = 25_000;

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub name: &'static str,
    pub detail: String,
}

/// Bindings captured at a draw call.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: Option<ProgramHandle>,
    pub framebuffer: Option<FramebufferHandle>,
    pub vertex_array: Option<VertexArrayHandle>,
    pub count: u32,
    /// 2D texture bound on each unit.
    pub textures: BTreeMap<u32, TextureHandle>,
    /// Uniform values of the current program, by location.
    pub uniforms: BTreeMap<u32, UniformValue>,
}

impl DrawRecord {
    #[must_use]
    pub fn texture(&self, unit: u32) -> Option<TextureHandle> {
        self.textures.get(&unit).copied()
    }

    #[must_use]
    pub fn uniform(&self, location: UniformLocation) -> Option<UniformValue> {
        self.uniforms.get(&location.0).copied()
    }
}

/// Current fixed-function state.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedFunctionSnapshot {
    pub depth_func: CompareFunction,
    pub depth_mask: bool,
    pub cull_face: CullFace,
    pub front_face: FrontFace,
    pub polygon_mode: PolygonMode,
    pub polygon_offset: (f32, f32),
    pub sample_coverage: (f32, bool),
    pub sample_mask: u32,
    pub hints: Vec<(HintTarget, HintMode)>,
    pub blend_equation: (BlendOperation, BlendOperation),
    /// `[src_rgb, dst_rgb, src_alpha, dst_alpha]`
    pub blend_func: [BlendFactor; 4],
    pub viewport: (u32, u32),
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub clear_stencil: i32,
}

impl Default for FixedFunctionSnapshot {
    fn default() -> Self {
        Self {
            depth_func: CompareFunction::Less,
            depth_mask: true,
            cull_face: CullFace::Back,
            front_face: FrontFace::Ccw,
            polygon_mode: PolygonMode::Fill,
            polygon_offset: (0.0, 0.0),
            sample_coverage: (1.0, false),
            sample_mask: u32::MAX,
            hints: Vec::new(),
            blend_equation: (BlendOperation::Add, BlendOperation::Add),
            blend_func: [
                BlendFactor::One,
                BlendFactor::Zero,
                BlendFactor::One,
                BlendFactor::Zero,
            ],
            viewport: (0, 0),
            clear_color: [0.0; 4],
            clear_depth: 1.0,
            clear_stencil: 0,
        }
    }
}

#[derive(Debug)]
struct ShaderObject {
    stage: ShaderStage,
    source: String,
    compiled: bool,
    info_log: String,
    uniforms: Vec<String>,
}

#[derive(Debug, Default)]
struct ProgramObject {
    shaders: Vec<ShaderHandle>,
    attrib_locations: BTreeMap<String, u32>,
    frag_data_locations: BTreeMap<String, u32>,
    linked: bool,
    info_log: String,
    uniforms: Vec<String>,
    values: FxHashMap<u32, UniformValue>,
}

#[derive(Debug, Default)]
struct TextureObject {
    target: Option<TextureViewDimension>,
    storage: Option<(TextureFormat, u32, u32)>,
    parameters: Vec<TextureParameter>,
    mipmap_generations: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttachmentSource {
    Texture(TextureHandle),
    Renderbuffer(RenderbufferHandle),
}

#[derive(Debug, Default)]
struct FramebufferObject {
    attachments: BTreeMap<Attachment, AttachmentSource>,
    draw_buffers: Vec<Option<u32>>,
}

#[derive(Debug, Default)]
struct QueryObject {
    result: Option<u64>,
}

/// A validating, recording, pixel-less device.
#[derive(Debug)]
pub struct HeadlessDevice {
    limits: DeviceLimits,
    next_id: u32,
    error: Option<GpuError>,

    record_calls: bool,
    calls: Vec<CallRecord>,
    draws: Vec<DrawRecord>,
    clear_count: usize,

    shaders: FxHashMap<ShaderHandle, ShaderObject>,
    programs: FxHashMap<ProgramHandle, ProgramObject>,
    textures: FxHashMap<TextureHandle, TextureObject>,
    samplers: FxHashMap<SamplerHandle, Vec<TextureParameter>>,
    framebuffers: FxHashMap<FramebufferHandle, FramebufferObject>,
    renderbuffers: FxHashMap<RenderbufferHandle, Option<(TextureFormat, u32, u32)>>,
    queries: FxHashMap<QueryHandle, QueryObject>,

    current_program: Option<ProgramHandle>,
    active_unit: u32,
    texture_bindings: FxHashMap<(u32, TextureViewDimension), TextureHandle>,
    sampler_bindings: FxHashMap<u32, SamplerHandle>,
    draw_framebuffer: Option<FramebufferHandle>,
    renderbuffer_binding: Option<RenderbufferHandle>,
    vertex_array: Option<VertexArrayHandle>,
    enabled: FxHashSet<Capability>,
    enabled_indexed: FxHashSet<(Capability, u32)>,
    fixed: FixedFunctionSnapshot,

    active_query: Option<(QueryHandle, usize)>,
    hold_query_results: bool,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(DeviceLimits::default())
    }

    #[must_use]
    pub fn with_limits(limits: DeviceLimits) -> Self {
        Self {
            limits,
            next_id: 1,
            error: None,
            record_calls: true,
            calls: Vec::new(),
            draws: Vec::new(),
            clear_count: 0,
            shaders: FxHashMap::default(),
            programs: FxHashMap::default(),
            textures: FxHashMap::default(),
            samplers: FxHashMap::default(),
            framebuffers: FxHashMap::default(),
            renderbuffers: FxHashMap::default(),
            queries: FxHashMap::default(),
            current_program: None,
            active_unit: 0,
            texture_bindings: FxHashMap::default(),
            sampler_bindings: FxHashMap::default(),
            draw_framebuffer: None,
            renderbuffer_binding: None,
            vertex_array: None,
            enabled: FxHashSet::default(),
            enabled_indexed: FxHashSet::default(),
            fixed: FixedFunctionSnapshot::default(),
            active_query: None,
            hold_query_results: false,
        }
    }

    // ========================================================================
    // Test & Tool Controls
    // ========================================================================

    pub fn set_limits(&mut self, limits: DeviceLimits) {
        self.limits = limits;
    }

    /// Turns call recording on or off. Draw records are always kept.
    pub fn set_call_recording(&mut self, enabled: bool) {
        self.record_calls = enabled;
    }

    /// While held, timer query results report as not yet available.
    pub fn hold_query_results(&mut self, hold: bool) {
        self.hold_query_results = hold;
    }

    /// Allocates a vertex array name. Vertex data lives outside the renderer,
    /// so the device only hands out identifiers for it.
    pub fn allocate_vertex_array(&mut self) -> VertexArrayHandle {
        VertexArrayHandle(self.allocate_id())
    }

    /// Allocates a texture with storage, as an asset loader would.
    pub fn allocate_texture_2d(
        &mut self,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> TextureHandle {
        let handle = TextureHandle(self.allocate_id());
        self.textures.insert(
            handle,
            TextureObject {
                target: Some(TextureViewDimension::D2),
                storage: Some((format, width, height)),
                ..TextureObject::default()
            },
        );
        handle
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn clear_draws(&mut self) {
        self.draws.clear();
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    #[must_use]
    pub fn calls(&self) -> &[CallRecord] {
        &self.calls
    }

    /// Number of recorded calls with the given device method name.
    #[must_use]
    pub fn call_count(&self, name: &str) -> usize {
        self.calls.iter().filter(|call| call.name == name).count()
    }

    #[must_use]
    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    #[must_use]
    pub fn clear_count(&self) -> usize {
        self.clear_count
    }

    /// The pending error, without clearing it.
    #[must_use]
    pub fn pending_error(&self) -> Option<GpuError> {
        self.error
    }

    #[must_use]
    pub fn current_program(&self) -> Option<ProgramHandle> {
        self.current_program
    }

    #[must_use]
    pub fn active_unit(&self) -> u32 {
        self.active_unit
    }

    #[must_use]
    pub fn bound_texture(&self, unit: u32, target: TextureViewDimension) -> Option<TextureHandle> {
        self.texture_bindings.get(&(unit, target)).copied()
    }

    #[must_use]
    pub fn bound_sampler(&self, unit: u32) -> Option<SamplerHandle> {
        self.sampler_bindings.get(&unit).copied()
    }

    #[must_use]
    pub fn bound_framebuffer(&self) -> Option<FramebufferHandle> {
        self.draw_framebuffer
    }

    #[must_use]
    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.enabled.contains(&capability)
    }

    #[must_use]
    pub fn is_enabled_indexed(&self, capability: Capability, index: u32) -> bool {
        self.enabled_indexed.contains(&(capability, index))
    }

    #[must_use]
    pub fn fixed_function(&self) -> &FixedFunctionSnapshot {
        &self.fixed
    }

    #[must_use]
    pub fn texture_exists(&self, texture: TextureHandle) -> bool {
        self.textures.contains_key(&texture)
    }

    #[must_use]
    pub fn texture_storage(&self, texture: TextureHandle) -> Option<(TextureFormat, u32, u32)> {
        self.textures.get(&texture).and_then(|t| t.storage)
    }

    #[must_use]
    pub fn texture_parameters(&self, texture: TextureHandle) -> Option<&[TextureParameter]> {
        self.textures.get(&texture).map(|t| t.parameters.as_slice())
    }

    #[must_use]
    pub fn mipmap_generations(&self, texture: TextureHandle) -> u32 {
        self.textures.get(&texture).map_or(0, |t| t.mipmap_generations)
    }

    #[must_use]
    pub fn sampler_parameters(&self, sampler: SamplerHandle) -> Option<&[TextureParameter]> {
        self.samplers.get(&sampler).map(Vec::as_slice)
    }

    #[must_use]
    pub fn shader_source_text(&self, shader: ShaderHandle) -> Option<&str> {
        self.shaders.get(&shader).map(|s| s.source.as_str())
    }

    #[must_use]
    pub fn program_uniforms(&self, program: ProgramHandle) -> Option<&[String]> {
        self.programs.get(&program).map(|p| p.uniforms.as_slice())
    }

    #[must_use]
    pub fn uniform_value(
        &self,
        program: ProgramHandle,
        location: UniformLocation,
    ) -> Option<UniformValue> {
        self.programs
            .get(&program)
            .and_then(|p| p.values.get(&location.0).copied())
    }

    #[must_use]
    pub fn attrib_location(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        self.programs
            .get(&program)
            .and_then(|p| p.attrib_locations.get(name).copied())
    }

    #[must_use]
    pub fn frag_data_location(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        self.programs
            .get(&program)
            .and_then(|p| p.frag_data_locations.get(name).copied())
    }

    /// Texture attached at `attachment`, if it is a texture attachment.
    #[must_use]
    pub fn attached_texture(
        &self,
        framebuffer: FramebufferHandle,
        attachment: Attachment,
    ) -> Option<TextureHandle> {
        match self.framebuffers.get(&framebuffer)?.attachments.get(&attachment)? {
            AttachmentSource::Texture(texture) => Some(*texture),
            AttachmentSource::Renderbuffer(_) => None,
        }
    }

    #[must_use]
    pub fn has_renderbuffer_attachment(
        &self,
        framebuffer: FramebufferHandle,
        attachment: Attachment,
    ) -> bool {
        matches!(
            self.framebuffers
                .get(&framebuffer)
                .and_then(|f| f.attachments.get(&attachment)),
            Some(AttachmentSource::Renderbuffer(_))
        )
    }

    #[must_use]
    pub fn draw_buffer_routing(&self, framebuffer: FramebufferHandle) -> Option<&[Option<u32>]> {
        self.framebuffers
            .get(&framebuffer)
            .map(|f| f.draw_buffers.as_slice())
    }

    #[must_use]
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    #[must_use]
    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    #[must_use]
    pub fn live_renderbuffers(&self) -> usize {
        self.renderbuffers.len()
    }

    #[must_use]
    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    #[must_use]
    pub fn live_shaders(&self) -> usize {
        self.shaders.len()
    }

    #[must_use]
    pub fn live_samplers(&self) -> usize {
        self.samplers.len()
    }

    #[must_use]
    pub fn live_queries(&self) -> usize {
        self.queries.len()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn record(&mut self, name: &'static str, detail: impl FnOnce() -> String) {
        if self.record_calls {
            self.calls.push(CallRecord {
                name,
                detail: detail(),
            });
        }
    }

    /// Drivers keep the first error until it is read.
    fn raise(&mut self, error: GpuError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn bound_texture_object(&mut self, target: TextureViewDimension) -> Option<&mut TextureObject> {
        let handle = self.texture_bindings.get(&(self.active_unit, target)).copied()?;
        self.textures.get_mut(&handle)
    }

    fn bound_framebuffer_object(&mut self) -> Option<&mut FramebufferObject> {
        let handle = self.draw_framebuffer?;
        self.framebuffers.get_mut(&handle)
    }

    fn attachment_storage(&self, source: AttachmentSource) -> Option<(TextureFormat, u32, u32)> {
        match source {
            AttachmentSource::Texture(texture) => self.textures.get(&texture)?.storage,
            AttachmentSource::Renderbuffer(renderbuffer) => *self.renderbuffers.get(&renderbuffer)?,
        }
    }

    fn framebuffer_status(&self, framebuffer: FramebufferHandle) -> FramebufferStatus {
        let Some(object) = self.framebuffers.get(&framebuffer) else {
            return FramebufferStatus::Undefined;
        };
        if object.attachments.is_empty() {
            return FramebufferStatus::MissingAttachment;
        }

        let mut size = None;
        for (attachment, source) in &object.attachments {
            let Some((format, width, height)) = self.attachment_storage(*source) else {
                return FramebufferStatus::IncompleteAttachment;
            };
            if width == 0 || height == 0 {
                return FramebufferStatus::IncompleteAttachment;
            }
            if attachment.is_color() == is_depth_stencil_format(format) {
                return FramebufferStatus::IncompleteAttachment;
            }
            match size {
                None => size = Some((width, height)),
                Some(existing) if existing != (width, height) => {
                    return FramebufferStatus::IncompleteDimensions;
                }
                Some(_) => {}
            }
        }

        let routes_to_missing = object
            .draw_buffers
            .iter()
            .flatten()
            .any(|color| !object.attachments.contains_key(&Attachment::Color(*color)));
        if routes_to_missing {
            return FramebufferStatus::IncompleteDrawBuffer;
        }

        FramebufferStatus::Complete
    }

    fn validate_draw(&mut self) -> bool {
        if self.current_program.is_none() || self.vertex_array.is_none() {
            self.raise(GpuError::InvalidOperation);
            return false;
        }
        if let Some(framebuffer) = self.draw_framebuffer
            && !self.framebuffer_status(framebuffer).is_complete()
        {
            self.raise(GpuError::InvalidFramebufferOperation);
            return false;
        }
        true
    }

    fn capture_draw(&mut self, count: u32) {
        let textures: BTreeMap<u32, TextureHandle> = self
            .texture_bindings
            .iter()
            .filter(|((_, target), _)| *target == TextureViewDimension::D2)
            .map(|((unit, _), texture)| (*unit, *texture))
            .collect();
        let uniforms: BTreeMap<u32, UniformValue> = self
            .current_program
            .and_then(|program| self.programs.get(&program))
            .map(|program| program.values.iter().map(|(k, v)| (*k, *v)).collect())
            .unwrap_or_default();
        self.draws.push(DrawRecord {
            program: self.current_program,
            framebuffer: self.draw_framebuffer,
            vertex_array: self.vertex_array,
            count,
            textures,
            uniforms,
        });
    }
}

/// Scans shader source for compile errors and active uniforms.
fn scan_shader_source(source: &str) -> Result<Vec<String>, String> {
    if source.trim().is_empty() {
        return Err("0:0: error: empty shader source".to_owned());
    }

    let mut uniforms: Vec<String> = Vec::new();
    for (number, line) in source.lines().enumerate() {
        let line = line.trim();
        if line.starts_with("#error") {
            return Err(format!("0:{}: {line}", number + 1));
        }
        if let Some(name) = parse_uniform_declaration(line)
            && !uniforms.contains(&name)
        {
            uniforms.push(name);
        }
    }
    Ok(uniforms)
}

/// `uniform <type> <name>;` with optional qualifiers and array suffix.
fn parse_uniform_declaration(line: &str) -> Option<String> {
    let declaration = line.strip_suffix(';')?;
    let mut tokens = declaration.split_whitespace();
    tokens.find(|token| *token == "uniform")?;
    let rest: Vec<&str> = tokens.collect();
    if rest.len() < 2 {
        return None;
    }
    let name = rest.last()?.split('[').next()?;
    (!name.is_empty()).then(|| name.to_owned())
}

impl GpuDevice for HeadlessDevice {
    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn take_error(&mut self) -> Option<GpuError> {
        self.error.take()
    }

    // --- Shaders and programs ---

    fn create_shader(&mut self, stage: ShaderStage) -> ShaderHandle {
        let handle = ShaderHandle(self.allocate_id());
        self.record("create_shader", || format!("{stage:?} -> {handle}"));
        self.shaders.insert(
            handle,
            ShaderObject {
                stage,
                source: String::new(),
                compiled: false,
                info_log: String::new(),
                uniforms: Vec::new(),
            },
        );
        handle
    }

    fn shader_source(&mut self, shader: ShaderHandle, source: &str) {
        self.record("shader_source", || format!("{shader}, {} bytes", source.len()));
        match self.shaders.get_mut(&shader) {
            Some(object) => object.source = source.to_owned(),
            None => self.raise(GpuError::InvalidValue),
        }
    }

    fn compile_shader(&mut self, shader: ShaderHandle) -> bool {
        self.record("compile_shader", || shader.to_string());
        let Some(object) = self.shaders.get_mut(&shader) else {
            self.raise(GpuError::InvalidValue);
            return false;
        };
        match scan_shader_source(&object.source) {
            Ok(uniforms) => {
                object.compiled = true;
                object.info_log.clear();
                object.uniforms = uniforms;
            }
            Err(log) => {
                object.compiled = false;
                object.info_log = log;
                object.uniforms.clear();
            }
        }
        object.compiled
    }

    fn shader_info_log(&self, shader: ShaderHandle) -> String {
        self.shaders
            .get(&shader)
            .map(|s| s.info_log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        self.record("delete_shader", || shader.to_string());
        self.shaders.remove(&shader);
    }

    fn create_program(&mut self) -> ProgramHandle {
        let handle = ProgramHandle(self.allocate_id());
        self.record("create_program", || handle.to_string());
        self.programs.insert(handle, ProgramObject::default());
        handle
    }

    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) {
        self.record("attach_shader", || format!("{program}, {shader}"));
        if !self.shaders.contains_key(&shader) {
            self.raise(GpuError::InvalidValue);
            return;
        }
        match self.programs.get_mut(&program) {
            Some(object) if object.shaders.contains(&shader) => {
                self.raise(GpuError::InvalidOperation);
            }
            Some(object) => object.shaders.push(shader),
            None => self.raise(GpuError::InvalidValue),
        }
    }

    fn bind_attrib_location(&mut self, program: ProgramHandle, index: u32, name: &str) {
        self.record("bind_attrib_location", || format!("{program}, {index}, {name}"));
        match self.programs.get_mut(&program) {
            Some(object) => {
                object.attrib_locations.insert(name.to_owned(), index);
            }
            None => self.raise(GpuError::InvalidValue),
        }
    }

    fn bind_frag_data_location(&mut self, program: ProgramHandle, color: u32, name: &str) {
        self.record("bind_frag_data_location", || {
            format!("{program}, {color}, {name}")
        });
        if color >= self.limits.max_draw_buffers {
            self.raise(GpuError::InvalidValue);
            return;
        }
        match self.programs.get_mut(&program) {
            Some(object) => {
                object.frag_data_locations.insert(name.to_owned(), color);
            }
            None => self.raise(GpuError::InvalidValue),
        }
    }

    fn link_program(&mut self, program: ProgramHandle) -> bool {
        self.record("link_program", || program.to_string());
        let Some(object) = self.programs.get(&program) else {
            self.raise(GpuError::InvalidValue);
            return false;
        };

        let mut vertex = Vec::new();
        let mut fragment = Vec::new();
        let mut failure = None;
        for shader in &object.shaders {
            match self.shaders.get(shader) {
                Some(stage) if stage.compiled => match stage.stage {
                    ShaderStage::Vertex => vertex.extend(stage.uniforms.iter().cloned()),
                    ShaderStage::Fragment => fragment.extend(stage.uniforms.iter().cloned()),
                },
                _ => failure = Some(format!("error: shader {shader} is not compiled")),
            }
        }
        let has_vertex = object
            .shaders
            .iter()
            .any(|s| self.shaders.get(s).is_some_and(|o| o.stage == ShaderStage::Vertex));
        let has_fragment = object
            .shaders
            .iter()
            .any(|s| self.shaders.get(s).is_some_and(|o| o.stage == ShaderStage::Fragment));
        if failure.is_none() && !(has_vertex && has_fragment) {
            failure = Some("error: program needs a vertex and a fragment shader".to_owned());
        }

        let mut uniforms: Vec<String> = Vec::new();
        for name in vertex.into_iter().chain(fragment) {
            if !uniforms.contains(&name) {
                uniforms.push(name);
            }
        }

        let Some(object) = self.programs.get_mut(&program) else {
            return false;
        };
        object.values.clear();
        match failure {
            Some(log) => {
                object.linked = false;
                object.info_log = log;
                object.uniforms.clear();
            }
            None => {
                object.linked = true;
                object.info_log.clear();
                object.uniforms = uniforms;
            }
        }
        object.linked
    }

    fn program_info_log(&self, program: ProgramHandle) -> String {
        self.programs
            .get(&program)
            .map(|p| p.info_log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.record("delete_program", || program.to_string());
        self.programs.remove(&program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        self.record("use_program", || format!("{program:?}"));
        if let Some(handle) = program {
            match self.programs.get(&handle) {
                Some(object) if object.linked => {}
                _ => {
                    self.raise(GpuError::InvalidOperation);
                    return;
                }
            }
        }
        self.current_program = program;
    }

    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        self.record("uniform_location", || format!("{program}, {name}"));
        let Some(object) = self.programs.get(&program) else {
            self.raise(GpuError::InvalidValue);
            return None;
        };
        if !object.linked {
            self.raise(GpuError::InvalidOperation);
            return None;
        }
        object
            .uniforms
            .iter()
            .position(|uniform| uniform == name)
            .and_then(|index| u32::try_from(index).ok())
            .map(UniformLocation)
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        self.record("set_uniform", || format!("{location}, {value:?}"));
        let Some(program) = self.current_program else {
            self.raise(GpuError::InvalidOperation);
            return;
        };
        let Some(object) = self.programs.get_mut(&program) else {
            self.raise(GpuError::InvalidOperation);
            return;
        };
        if location.index() >= object.uniforms.len() {
            self.raise(GpuError::InvalidOperation);
            return;
        }
        object.values.insert(location.0, value);
    }

    // --- Fixed-function state ---

    fn enable(&mut self, capability: Capability) {
        self.record("enable", || format!("{capability:?}"));
        self.enabled.insert(capability);
    }

    fn disable(&mut self, capability: Capability) {
        self.record("disable", || format!("{capability:?}"));
        self.enabled.remove(&capability);
    }

    fn enable_indexed(&mut self, capability: Capability, index: u32) {
        self.record("enable_indexed", || format!("{capability:?}, {index}"));
        if index >= self.limits.max_draw_buffers {
            self.raise(GpuError::InvalidValue);
            return;
        }
        self.enabled_indexed.insert((capability, index));
    }

    fn disable_indexed(&mut self, capability: Capability, index: u32) {
        self.record("disable_indexed", || format!("{capability:?}, {index}"));
        if index >= self.limits.max_draw_buffers {
            self.raise(GpuError::InvalidValue);
            return;
        }
        self.enabled_indexed.remove(&(capability, index));
    }

    fn depth_func(&mut self, func: CompareFunction) {
        self.record("depth_func", || format!("{func:?}"));
        self.fixed.depth_func = func;
    }

    fn depth_mask(&mut self, write: bool) {
        self.record("depth_mask", || write.to_string());
        self.fixed.depth_mask = write;
    }

    fn cull_face(&mut self, face: CullFace) {
        self.record("cull_face", || format!("{face:?}"));
        self.fixed.cull_face = face;
    }

    fn front_face(&mut self, face: FrontFace) {
        self.record("front_face", || format!("{face:?}"));
        self.fixed.front_face = face;
    }

    fn polygon_mode(&mut self, mode: PolygonMode) {
        self.record("polygon_mode", || format!("{mode:?}"));
        self.fixed.polygon_mode = mode;
    }

    fn polygon_offset(&mut self, factor: f32, units: f32) {
        self.record("polygon_offset", || format!("{factor}, {units}"));
        self.fixed.polygon_offset = (factor, units);
    }

    fn sample_coverage(&mut self, value: f32, invert: bool) {
        self.record("sample_coverage", || format!("{value}, {invert}"));
        self.fixed.sample_coverage = (value.clamp(0.0, 1.0), invert);
    }

    fn sample_mask(&mut self, index: u32, mask: u32) {
        self.record("sample_mask", || format!("{index}, {mask:#x}"));
        if index != 0 {
            self.raise(GpuError::InvalidValue);
            return;
        }
        self.fixed.sample_mask = mask;
    }

    fn hint(&mut self, target: HintTarget, mode: HintMode) {
        self.record("hint", || format!("{target:?}, {mode:?}"));
        match self.fixed.hints.iter_mut().find(|(t, _)| *t == target) {
            Some(entry) => entry.1 = mode,
            None => self.fixed.hints.push((target, mode)),
        }
    }

    fn blend_equation_separate(&mut self, rgb: BlendOperation, alpha: BlendOperation) {
        self.record("blend_equation_separate", || format!("{rgb:?}, {alpha:?}"));
        self.fixed.blend_equation = (rgb, alpha);
    }

    fn blend_func_separate(
        &mut self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        self.record("blend_func_separate", || {
            format!("{src_rgb:?}, {dst_rgb:?}, {src_alpha:?}, {dst_alpha:?}")
        });
        self.fixed.blend_func = [src_rgb, dst_rgb, src_alpha, dst_alpha];
    }

    fn viewport(&mut self, width: u32, height: u32) {
        self.record("viewport", || format!("{width}x{height}"));
        self.fixed.viewport = (width, height);
    }

    fn clear_color(&mut self, rgba: [f32; 4]) {
        self.record("clear_color", || format!("{rgba:?}"));
        self.fixed.clear_color = rgba;
    }

    fn clear_depth(&mut self, depth: f32) {
        self.record("clear_depth", || depth.to_string());
        self.fixed.clear_depth = depth.clamp(0.0, 1.0);
    }

    fn clear_stencil(&mut self, stencil: i32) {
        self.record("clear_stencil", || stencil.to_string());
        self.fixed.clear_stencil = stencil;
    }

    fn clear(&mut self, mask: ClearMask) {
        self.record("clear", || format!("{mask:?}"));
        if let Some(framebuffer) = self.draw_framebuffer
            && !self.framebuffer_status(framebuffer).is_complete()
        {
            self.raise(GpuError::InvalidFramebufferOperation);
            return;
        }
        self.clear_count += 1;
    }

    // --- Textures ---

    fn create_texture(&mut self) -> TextureHandle {
        let handle = TextureHandle(self.allocate_id());
        self.record("create_texture", || handle.to_string());
        self.textures.insert(handle, TextureObject::default());
        handle
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.record("delete_texture", || texture.to_string());
        self.textures.remove(&texture);
        self.texture_bindings.retain(|_, bound| *bound != texture);
    }

    fn active_texture(&mut self, unit: u32) {
        self.record("active_texture", || unit.to_string());
        if unit >= self.limits.max_texture_image_units {
            self.raise(GpuError::InvalidEnum);
            return;
        }
        self.active_unit = unit;
    }

    fn bind_texture(&mut self, target: TextureViewDimension, texture: Option<TextureHandle>) {
        self.record("bind_texture", || format!("{target:?}, {texture:?}"));
        let key = (self.active_unit, target);
        let Some(handle) = texture else {
            self.texture_bindings.remove(&key);
            return;
        };
        let Some(object) = self.textures.get_mut(&handle) else {
            self.raise(GpuError::InvalidOperation);
            return;
        };
        match object.target {
            Some(existing) if existing != target => {
                self.raise(GpuError::InvalidOperation);
                return;
            }
            Some(_) => {}
            None => object.target = Some(target),
        }
        self.texture_bindings.insert(key, handle);
    }

    fn tex_image_2d(
        &mut self,
        target: TextureViewDimension,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) {
        self.record("tex_image_2d", || {
            format!("{target:?}, {format:?}, {width}x{height}")
        });
        if target != TextureViewDimension::D2 {
            self.raise(GpuError::InvalidEnum);
            return;
        }
        let max = self.limits.max_texture_size;
        if width > max || height > max {
            self.raise(GpuError::InvalidValue);
            return;
        }
        match self.bound_texture_object(target) {
            Some(object) => {
                object.storage = Some((format, width, height));
                object.mipmap_generations = 0;
            }
            None => self.raise(GpuError::InvalidOperation),
        }
    }

    fn tex_parameter(&mut self, target: TextureViewDimension, parameter: TextureParameter) {
        self.record("tex_parameter", || format!("{target:?}, {parameter:?}"));
        match self.bound_texture_object(target) {
            Some(object) => {
                object
                    .parameters
                    .retain(|p| mem::discriminant(p) != mem::discriminant(&parameter));
                object.parameters.push(parameter);
            }
            None => self.raise(GpuError::InvalidOperation),
        }
    }

    fn generate_mipmap(&mut self, target: TextureViewDimension) {
        self.record("generate_mipmap", || format!("{target:?}"));
        match self.bound_texture_object(target) {
            Some(object) if object.storage.is_some() => object.mipmap_generations += 1,
            _ => self.raise(GpuError::InvalidOperation),
        }
    }

    // --- Samplers ---

    fn create_sampler(&mut self) -> SamplerHandle {
        let handle = SamplerHandle(self.allocate_id());
        self.record("create_sampler", || handle.to_string());
        self.samplers.insert(handle, Vec::new());
        handle
    }

    fn delete_sampler(&mut self, sampler: SamplerHandle) {
        self.record("delete_sampler", || sampler.to_string());
        self.samplers.remove(&sampler);
        self.sampler_bindings.retain(|_, bound| *bound != sampler);
    }

    fn bind_sampler(&mut self, unit: u32, sampler: Option<SamplerHandle>) {
        self.record("bind_sampler", || format!("{unit}, {sampler:?}"));
        if unit >= self.limits.max_texture_image_units {
            self.raise(GpuError::InvalidValue);
            return;
        }
        match sampler {
            None => {
                self.sampler_bindings.remove(&unit);
            }
            Some(handle) if self.samplers.contains_key(&handle) => {
                self.sampler_bindings.insert(unit, handle);
            }
            Some(_) => self.raise(GpuError::InvalidOperation),
        }
    }

    fn sampler_parameter(&mut self, sampler: SamplerHandle, parameter: TextureParameter) {
        self.record("sampler_parameter", || format!("{sampler}, {parameter:?}"));
        if matches!(parameter, TextureParameter::MaxAnisotropy(_))
            && !self.limits.anisotropic_filtering
        {
            self.raise(GpuError::InvalidEnum);
            return;
        }
        match self.samplers.get_mut(&sampler) {
            Some(parameters) => {
                parameters.retain(|p| mem::discriminant(p) != mem::discriminant(&parameter));
                parameters.push(parameter);
            }
            None => self.raise(GpuError::InvalidOperation),
        }
    }

    // --- Framebuffers ---

    fn create_framebuffer(&mut self) -> FramebufferHandle {
        let handle = FramebufferHandle(self.allocate_id());
        self.record("create_framebuffer", || handle.to_string());
        self.framebuffers.insert(handle, FramebufferObject::default());
        handle
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.record("delete_framebuffer", || framebuffer.to_string());
        self.framebuffers.remove(&framebuffer);
        if self.draw_framebuffer == Some(framebuffer) {
            self.draw_framebuffer = None;
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.record("bind_framebuffer", || format!("{framebuffer:?}"));
        if let Some(handle) = framebuffer
            && !self.framebuffers.contains_key(&handle)
        {
            self.raise(GpuError::InvalidOperation);
            return;
        }
        self.draw_framebuffer = framebuffer;
    }

    fn check_framebuffer_status(&mut self) -> FramebufferStatus {
        self.record("check_framebuffer_status", String::new);
        match self.draw_framebuffer {
            Some(framebuffer) => self.framebuffer_status(framebuffer),
            None => FramebufferStatus::Complete,
        }
    }

    fn draw_buffers(&mut self, buffers: &[Option<u32>]) {
        self.record("draw_buffers", || format!("{buffers:?}"));
        let limits = self.limits;
        if buffers.len() > limits.max_draw_buffers as usize {
            self.raise(GpuError::InvalidValue);
            return;
        }
        if buffers
            .iter()
            .flatten()
            .any(|color| *color >= limits.max_color_attachments)
        {
            self.raise(GpuError::InvalidOperation);
            return;
        }
        match self.bound_framebuffer_object() {
            Some(object) => object.draw_buffers = buffers.to_vec(),
            None => self.raise(GpuError::InvalidOperation),
        }
    }

    fn framebuffer_texture_2d(
        &mut self,
        attachment: Attachment,
        target: TextureViewDimension,
        texture: Option<TextureHandle>,
        level: u32,
    ) {
        self.record("framebuffer_texture_2d", || {
            format!("{attachment}, {target:?}, {texture:?}, {level}")
        });
        if let Attachment::Color(index) = attachment
            && index >= self.limits.max_color_attachments
        {
            self.raise(GpuError::InvalidEnum);
            return;
        }
        if let Some(handle) = texture
            && !self.textures.contains_key(&handle)
        {
            self.raise(GpuError::InvalidOperation);
            return;
        }
        match self.bound_framebuffer_object() {
            Some(object) => match texture {
                Some(handle) => {
                    object
                        .attachments
                        .insert(attachment, AttachmentSource::Texture(handle));
                }
                None => {
                    object.attachments.remove(&attachment);
                }
            },
            None => self.raise(GpuError::InvalidOperation),
        }
    }

    fn create_renderbuffer(&mut self) -> RenderbufferHandle {
        let handle = RenderbufferHandle(self.allocate_id());
        self.record("create_renderbuffer", || handle.to_string());
        self.renderbuffers.insert(handle, None);
        handle
    }

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferHandle) {
        self.record("delete_renderbuffer", || renderbuffer.to_string());
        self.renderbuffers.remove(&renderbuffer);
        if self.renderbuffer_binding == Some(renderbuffer) {
            self.renderbuffer_binding = None;
        }
    }

    fn bind_renderbuffer(&mut self, renderbuffer: Option<RenderbufferHandle>) {
        self.record("bind_renderbuffer", || format!("{renderbuffer:?}"));
        if let Some(handle) = renderbuffer
            && !self.renderbuffers.contains_key(&handle)
        {
            self.raise(GpuError::InvalidOperation);
            return;
        }
        self.renderbuffer_binding = renderbuffer;
    }

    fn renderbuffer_storage(&mut self, format: TextureFormat, width: u32, height: u32) {
        self.record("renderbuffer_storage", || {
            format!("{format:?}, {width}x{height}")
        });
        let Some(handle) = self.renderbuffer_binding else {
            self.raise(GpuError::InvalidOperation);
            return;
        };
        if let Some(storage) = self.renderbuffers.get_mut(&handle) {
            *storage = Some((format, width, height));
        }
    }

    fn framebuffer_renderbuffer(
        &mut self,
        attachment: Attachment,
        renderbuffer: Option<RenderbufferHandle>,
    ) {
        self.record("framebuffer_renderbuffer", || {
            format!("{attachment}, {renderbuffer:?}")
        });
        if let Some(handle) = renderbuffer
            && !self.renderbuffers.contains_key(&handle)
        {
            self.raise(GpuError::InvalidOperation);
            return;
        }
        match self.bound_framebuffer_object() {
            Some(object) => match renderbuffer {
                Some(handle) => {
                    object
                        .attachments
                        .insert(attachment, AttachmentSource::Renderbuffer(handle));
                }
                None => {
                    object.attachments.remove(&attachment);
                }
            },
            None => self.raise(GpuError::InvalidOperation),
        }
    }

    // --- Geometry ---

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>) {
        self.record("bind_vertex_array", || format!("{vertex_array:?}"));
        self.vertex_array = vertex_array;
    }

    fn draw_elements(
        &mut self,
        topology: PrimitiveTopology,
        count: u32,
        index_format: IndexFormat,
        offset: u64,
    ) {
        self.record("draw_elements", || {
            format!("{topology:?}, {count}, {index_format:?}, {offset}")
        });
        if self.validate_draw() {
            self.capture_draw(count);
        }
    }

    fn draw_arrays(&mut self, topology: PrimitiveTopology, first: u32, count: u32) {
        self.record("draw_arrays", || format!("{topology:?}, {first}, {count}"));
        if self.validate_draw() {
            self.capture_draw(count);
        }
    }

    // --- Timer queries ---

    fn create_query(&mut self) -> QueryHandle {
        let handle = QueryHandle(self.allocate_id());
        self.record("create_query", || handle.to_string());
        self.queries.insert(handle, QueryObject::default());
        handle
    }

    fn delete_query(&mut self, query: QueryHandle) {
        self.record("delete_query", || query.to_string());
        self.queries.remove(&query);
        if self.active_query.is_some_and(|(active, _)| active == query) {
            self.active_query = None;
        }
    }

    fn begin_time_elapsed(&mut self, query: QueryHandle) {
        self.record("begin_time_elapsed", || query.to_string());
        if self.active_query.is_some() {
            self.raise(GpuError::InvalidOperation);
            return;
        }
        match self.queries.get_mut(&query) {
            Some(object) => {
                object.result = None;
                self.active_query = Some((query, self.draws.len()));
            }
            None => self.raise(GpuError::InvalidOperation),
        }
    }

    fn end_time_elapsed(&mut self) {
        self.record("end_time_elapsed", String::new);
        let Some((query, draws_at_begin)) = self.active_query.take() else {
            self.raise(GpuError::InvalidOperation);
            return;
        };
        let draws = (self.draws.len() - draws_at_begin) as u64;
        if let Some(object) = self.queries.get_mut(&query) {
            object.result = Some(QUERY_BASE_NANOS + draws * QUERY_NANOS_PER_DRAW);
        }
    }

    fn query_result_available(&mut self, query: QueryHandle) -> bool {
        self.record("query_result_available", || query.to_string());
        match self.queries.get(&query) {
            Some(object) => object.result.is_some() && !self.hold_query_results,
            None => {
                self.raise(GpuError::InvalidOperation);
                false
            }
        }
    }

    fn query_result(&mut self, query: QueryHandle) -> u64 {
        self.record("query_result", || query.to_string());
        match self.queries.get(&query) {
            Some(object) => object.result.unwrap_or(0),
            None => {
                self.raise(GpuError::InvalidOperation);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled(device: &mut HeadlessDevice, stage: ShaderStage, source: &str) -> ShaderHandle {
        let shader = device.create_shader(stage);
        device.shader_source(shader, source);
        assert!(device.compile_shader(shader));
        shader
    }

    #[test]
    fn uniform_locations_follow_declaration_order() {
        let mut device = HeadlessDevice::new();
        let vs = compiled(
            &mut device,
            ShaderStage::Vertex,
            "#version 330\nuniform mat4 modelView;\nuniform mat4 projection;\n",
        );
        let fs = compiled(
            &mut device,
            ShaderStage::Fragment,
            "#version 330\nuniform sampler2D diffuse;\nuniform mat4 projection;\n",
        );
        let program = device.create_program();
        device.attach_shader(program, vs);
        device.attach_shader(program, fs);
        assert!(device.link_program(program));

        assert_eq!(
            device.uniform_location(program, "diffuse"),
            Some(UniformLocation(2))
        );
        assert_eq!(device.uniform_location(program, "missing"), None);
        assert_eq!(device.take_error(), None);
    }

    #[test]
    fn error_directive_fails_compilation() {
        let mut device = HeadlessDevice::new();
        let shader = device.create_shader(ShaderStage::Fragment);
        device.shader_source(shader, "#version 330\n#error unsupported path\n");

        assert!(!device.compile_shader(shader));
        assert_eq!(device.shader_info_log(shader), "0:2: #error unsupported path");
    }

    #[test]
    fn link_requires_both_stages() {
        let mut device = HeadlessDevice::new();
        let vs = compiled(&mut device, ShaderStage::Vertex, "void main() {}");
        let program = device.create_program();
        device.attach_shader(program, vs);

        assert!(!device.link_program(program));
        assert!(device.program_info_log(program).contains("fragment"));
    }

    #[test]
    fn mismatched_attachment_sizes_are_incomplete() {
        let mut device = HeadlessDevice::new();
        let small = device.allocate_texture_2d(TextureFormat::Rgba8Unorm, 64, 64);
        let large = device.allocate_texture_2d(TextureFormat::Rgba8Unorm, 128, 128);
        let framebuffer = device.create_framebuffer();
        device.bind_framebuffer(Some(framebuffer));
        device.framebuffer_texture_2d(
            Attachment::Color(0),
            TextureViewDimension::D2,
            Some(small),
            0,
        );
        device.framebuffer_texture_2d(
            Attachment::Color(1),
            TextureViewDimension::D2,
            Some(large),
            0,
        );

        assert_eq!(
            device.check_framebuffer_status(),
            FramebufferStatus::IncompleteDimensions
        );
    }

    #[test]
    fn misuse_raises_first_error_only() {
        let mut device = HeadlessDevice::new();
        device.set_uniform(UniformLocation(0), UniformValue::Float(1.0));
        device.active_texture(99);

        assert_eq!(device.take_error(), Some(GpuError::InvalidOperation));
        assert_eq!(device.take_error(), None);
    }
}
