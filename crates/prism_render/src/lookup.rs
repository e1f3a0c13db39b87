//! String ↔ enum lookup tables.
//!
//! Pass configurations spell driver enums the way shader authors know them
//! (`"GL_DEPTH_TEST"`, `"GL_LEQUAL"`, `"GL_RGBA8"`). Each table maps those
//! spellings onto typed values, and back again for status printing.
//!
//! Unknown spellings are configuration errors and abort initialization.

use prism_core::{PrismError, Result};
use wgpu::{
    AddressMode, BlendFactor, BlendOperation, CompareFunction, FilterMode, FrontFace,
    MipmapFilterMode, PolygonMode, TextureFormat, TextureViewDimension,
};

use crate::device::{Attachment, Capability, CullFace, HintMode, HintTarget};

/// A static, bidirectional string table.
#[derive(Debug)]
pub struct NameTable<T: 'static> {
    kind: &'static str,
    entries: &'static [(&'static str, T)],
}

impl<T: Copy + PartialEq + 'static> NameTable<T> {
    /// What the table resolves, for error messages.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn lookup(&self, name: &str) -> Result<T> {
        self.entries
            .iter()
            .find(|(spelling, _)| *spelling == name)
            .map(|(_, value)| *value)
            .ok_or_else(|| PrismError::UnknownEnum {
                kind: self.kind,
                name: name.to_owned(),
            })
    }

    /// The first spelling mapped to `value`.
    #[must_use]
    pub fn name_of(&self, value: T) -> &'static str {
        self.entries
            .iter()
            .find(|(_, v)| *v == value)
            .map_or("<unknown>", |(spelling, _)| spelling)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static (&'static str, T)> {
        self.entries.iter()
    }
}

macro_rules! name_table {
    ($(#[$meta:meta])* $vis:vis static $name:ident: $ty:ty = $kind:literal { $($spelling:literal => $value:expr),* $(,)? }) => {
        $(#[$meta])*
        $vis static $name: NameTable<$ty> = NameTable {
            kind: $kind,
            entries: &[$(($spelling, $value)),*],
        };
    };
}

name_table! {
    pub static CAPABILITIES: Capability = "capability" {
        "GL_BLEND" => Capability::Blend,
        "GL_CLIP_DISTANCE0" => Capability::ClipDistance0,
        "GL_CLIP_DISTANCE1" => Capability::ClipDistance1,
        "GL_COLOR_LOGIC_OP" => Capability::ColorLogicOp,
        "GL_CULL_FACE" => Capability::CullFace,
        "GL_DEPTH_CLAMP" => Capability::DepthClamp,
        "GL_DEPTH_TEST" => Capability::DepthTest,
        "GL_DITHER" => Capability::Dither,
        "GL_FRAMEBUFFER_SRGB" => Capability::FramebufferSrgb,
        "GL_LINE_SMOOTH" => Capability::LineSmooth,
        "GL_MULTISAMPLE" => Capability::Multisample,
        "GL_POLYGON_OFFSET_FILL" => Capability::PolygonOffsetFill,
        "GL_POLYGON_OFFSET_LINE" => Capability::PolygonOffsetLine,
        "GL_POLYGON_OFFSET_POINT" => Capability::PolygonOffsetPoint,
        "GL_POLYGON_SMOOTH" => Capability::PolygonSmooth,
        "GL_PRIMITIVE_RESTART" => Capability::PrimitiveRestart,
        "GL_PROGRAM_POINT_SIZE" => Capability::ProgramPointSize,
        "GL_RASTERIZER_DISCARD" => Capability::RasterizerDiscard,
        "GL_SAMPLE_ALPHA_TO_COVERAGE" => Capability::SampleAlphaToCoverage,
        "GL_SAMPLE_ALPHA_TO_ONE" => Capability::SampleAlphaToOne,
        "GL_SAMPLE_COVERAGE" => Capability::SampleCoverage,
        "GL_SAMPLE_MASK" => Capability::SampleMask,
        "GL_SCISSOR_TEST" => Capability::ScissorTest,
        "GL_STENCIL_TEST" => Capability::StencilTest,
        "GL_TEXTURE_CUBE_MAP_SEAMLESS" => Capability::TextureCubeMapSeamless,
    }
}

name_table! {
    pub static COMPARE_FUNCTIONS: CompareFunction = "compare function" {
        "GL_NEVER" => CompareFunction::Never,
        "GL_LESS" => CompareFunction::Less,
        "GL_EQUAL" => CompareFunction::Equal,
        "GL_LEQUAL" => CompareFunction::LessEqual,
        "GL_GREATER" => CompareFunction::Greater,
        "GL_NOTEQUAL" => CompareFunction::NotEqual,
        "GL_GEQUAL" => CompareFunction::GreaterEqual,
        "GL_ALWAYS" => CompareFunction::Always,
    }
}

name_table! {
    pub static CULL_FACES: CullFace = "cull face" {
        "GL_FRONT" => CullFace::Front,
        "GL_BACK" => CullFace::Back,
        "GL_FRONT_AND_BACK" => CullFace::FrontAndBack,
    }
}

name_table! {
    pub static FRONT_FACES: FrontFace = "front face" {
        "GL_CCW" => FrontFace::Ccw,
        "GL_CW" => FrontFace::Cw,
    }
}

name_table! {
    pub static POLYGON_MODES: PolygonMode = "polygon mode" {
        "GL_FILL" => PolygonMode::Fill,
        "GL_LINE" => PolygonMode::Line,
        "GL_POINT" => PolygonMode::Point,
    }
}

name_table! {
    pub static HINT_TARGETS: HintTarget = "hint target" {
        "GL_LINE_SMOOTH_HINT" => HintTarget::LineSmooth,
        "GL_POLYGON_SMOOTH_HINT" => HintTarget::PolygonSmooth,
        "GL_FRAGMENT_SHADER_DERIVATIVE_HINT" => HintTarget::FragmentShaderDerivative,
    }
}

name_table! {
    pub static HINT_MODES: HintMode = "hint mode" {
        "GL_FASTEST" => HintMode::Fastest,
        "GL_NICEST" => HintMode::Nicest,
        "GL_DONT_CARE" => HintMode::DontCare,
    }
}

name_table! {
    pub static BLEND_OPERATIONS: BlendOperation = "blend equation" {
        "GL_FUNC_ADD" => BlendOperation::Add,
        "GL_FUNC_SUBTRACT" => BlendOperation::Subtract,
        "GL_FUNC_REVERSE_SUBTRACT" => BlendOperation::ReverseSubtract,
        "GL_MIN" => BlendOperation::Min,
        "GL_MAX" => BlendOperation::Max,
    }
}

name_table! {
    pub static BLEND_FACTORS: BlendFactor = "blend factor" {
        "GL_ZERO" => BlendFactor::Zero,
        "GL_ONE" => BlendFactor::One,
        "GL_SRC_COLOR" => BlendFactor::Src,
        "GL_ONE_MINUS_SRC_COLOR" => BlendFactor::OneMinusSrc,
        "GL_DST_COLOR" => BlendFactor::Dst,
        "GL_ONE_MINUS_DST_COLOR" => BlendFactor::OneMinusDst,
        "GL_SRC_ALPHA" => BlendFactor::SrcAlpha,
        "GL_ONE_MINUS_SRC_ALPHA" => BlendFactor::OneMinusSrcAlpha,
        "GL_DST_ALPHA" => BlendFactor::DstAlpha,
        "GL_ONE_MINUS_DST_ALPHA" => BlendFactor::OneMinusDstAlpha,
        "GL_CONSTANT_COLOR" => BlendFactor::Constant,
        "GL_ONE_MINUS_CONSTANT_COLOR" => BlendFactor::OneMinusConstant,
        "GL_SRC_ALPHA_SATURATE" => BlendFactor::SrcAlphaSaturated,
        "GL_SRC1_COLOR" => BlendFactor::Src1,
        "GL_ONE_MINUS_SRC1_COLOR" => BlendFactor::OneMinusSrc1,
        "GL_SRC1_ALPHA" => BlendFactor::Src1Alpha,
        "GL_ONE_MINUS_SRC1_ALPHA" => BlendFactor::OneMinusSrc1Alpha,
    }
}

name_table! {
    /// Internal formats accepted for render targets.
    pub static TEXTURE_FORMATS: TextureFormat = "texture format" {
        "GL_R8" => TextureFormat::R8Unorm,
        "GL_RG8" => TextureFormat::Rg8Unorm,
        "GL_RGBA8" => TextureFormat::Rgba8Unorm,
        "GL_SRGB8_ALPHA8" => TextureFormat::Rgba8UnormSrgb,
        "GL_R16F" => TextureFormat::R16Float,
        "GL_RG16F" => TextureFormat::Rg16Float,
        "GL_RGBA16F" => TextureFormat::Rgba16Float,
        "GL_R32F" => TextureFormat::R32Float,
        "GL_RG32F" => TextureFormat::Rg32Float,
        "GL_RGBA32F" => TextureFormat::Rgba32Float,
        "GL_RGB10_A2" => TextureFormat::Rgb10a2Unorm,
        "GL_DEPTH_COMPONENT16" => TextureFormat::Depth16Unorm,
        "GL_DEPTH_COMPONENT24" => TextureFormat::Depth24Plus,
        "GL_DEPTH_COMPONENT32F" => TextureFormat::Depth32Float,
        "GL_DEPTH24_STENCIL8" => TextureFormat::Depth24PlusStencil8,
        "GL_DEPTH32F_STENCIL8" => TextureFormat::Depth32FloatStencil8,
    }
}

name_table! {
    pub static TEXTURE_TARGETS: TextureViewDimension = "texture target" {
        "GL_TEXTURE_2D" => TextureViewDimension::D2,
        "GL_TEXTURE_2D_ARRAY" => TextureViewDimension::D2Array,
        "GL_TEXTURE_CUBE_MAP" => TextureViewDimension::Cube,
        "GL_TEXTURE_3D" => TextureViewDimension::D3,
    }
}

name_table! {
    /// Minification filters, split into the texel filter and the optional mip filter.
    pub static MIN_FILTERS: (FilterMode, Option<MipmapFilterMode>) = "min filter" {
        "GL_NEAREST" => (FilterMode::Nearest, None),
        "GL_LINEAR" => (FilterMode::Linear, None),
        "GL_NEAREST_MIPMAP_NEAREST" => (FilterMode::Nearest, Some(MipmapFilterMode::Nearest)),
        "GL_LINEAR_MIPMAP_NEAREST" => (FilterMode::Linear, Some(MipmapFilterMode::Nearest)),
        "GL_NEAREST_MIPMAP_LINEAR" => (FilterMode::Nearest, Some(MipmapFilterMode::Linear)),
        "GL_LINEAR_MIPMAP_LINEAR" => (FilterMode::Linear, Some(MipmapFilterMode::Linear)),
    }
}

name_table! {
    pub static MAG_FILTERS: FilterMode = "mag filter" {
        "GL_NEAREST" => FilterMode::Nearest,
        "GL_LINEAR" => FilterMode::Linear,
    }
}

name_table! {
    pub static ADDRESS_MODES: AddressMode = "wrap mode" {
        "GL_CLAMP_TO_EDGE" => AddressMode::ClampToEdge,
        "GL_REPEAT" => AddressMode::Repeat,
        "GL_MIRRORED_REPEAT" => AddressMode::MirrorRepeat,
        "GL_CLAMP_TO_BORDER" => AddressMode::ClampToBorder,
    }
}

name_table! {
    /// `true` enables depth comparison.
    pub static COMPARE_MODES: bool = "compare mode" {
        "GL_NONE" => false,
        "GL_COMPARE_REF_TO_TEXTURE" => true,
    }
}

name_table! {
    pub static BOOLEANS: bool = "boolean" {
        "GL_FALSE" => false,
        "GL_TRUE" => true,
    }
}

/// Fixed-function parameters a pass can set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateParameter {
    DepthFunc,
    DepthWriteMask,
    CullFaceMode,
    FrontFace,
    PolygonMode,
    PolygonOffset,
    SampleCoverage,
    SampleMask,
    Hint(HintTarget),
    BlendEquationRgb,
    BlendEquationAlpha,
    BlendSrcRgb,
    BlendSrcAlpha,
    BlendDstRgb,
    BlendDstAlpha,
}

name_table! {
    pub static STATE_PARAMETERS: StateParameter = "state parameter" {
        "GL_DEPTH_FUNC" => StateParameter::DepthFunc,
        "GL_DEPTH_WRITEMASK" => StateParameter::DepthWriteMask,
        "GL_CULL_FACE_MODE" => StateParameter::CullFaceMode,
        "GL_FRONT_FACE" => StateParameter::FrontFace,
        "GL_POLYGON_MODE" => StateParameter::PolygonMode,
        "GL_POLYGON_OFFSET_FACTOR" => StateParameter::PolygonOffset,
        "GL_SAMPLE_COVERAGE_VALUE" => StateParameter::SampleCoverage,
        "GL_SAMPLE_MASK_VALUE" => StateParameter::SampleMask,
        "GL_LINE_SMOOTH_HINT" => StateParameter::Hint(HintTarget::LineSmooth),
        "GL_POLYGON_SMOOTH_HINT" => StateParameter::Hint(HintTarget::PolygonSmooth),
        "GL_FRAGMENT_SHADER_DERIVATIVE_HINT" => {
            StateParameter::Hint(HintTarget::FragmentShaderDerivative)
        },
        "GL_BLEND_EQUATION_RGB" => StateParameter::BlendEquationRgb,
        "GL_BLEND_EQUATION_ALPHA" => StateParameter::BlendEquationAlpha,
        "GL_BLEND_SRC_RGB" => StateParameter::BlendSrcRgb,
        "GL_BLEND_SRC_ALPHA" => StateParameter::BlendSrcAlpha,
        "GL_BLEND_DST_RGB" => StateParameter::BlendDstRgb,
        "GL_BLEND_DST_ALPHA" => StateParameter::BlendDstAlpha,
    }
}

/// Sampler parameters a pass can set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerParameter {
    MinFilter,
    MagFilter,
    WrapS,
    WrapT,
    WrapR,
    CompareMode,
    CompareFunc,
    MinLod,
    MaxLod,
    LodBias,
    MaxAnisotropy,
    BorderColor,
}

name_table! {
    pub static SAMPLER_PARAMETERS: SamplerParameter = "sampler parameter" {
        "GL_TEXTURE_MIN_FILTER" => SamplerParameter::MinFilter,
        "GL_TEXTURE_MAG_FILTER" => SamplerParameter::MagFilter,
        "GL_TEXTURE_WRAP_S" => SamplerParameter::WrapS,
        "GL_TEXTURE_WRAP_T" => SamplerParameter::WrapT,
        "GL_TEXTURE_WRAP_R" => SamplerParameter::WrapR,
        "GL_TEXTURE_COMPARE_MODE" => SamplerParameter::CompareMode,
        "GL_TEXTURE_COMPARE_FUNC" => SamplerParameter::CompareFunc,
        "GL_TEXTURE_MIN_LOD" => SamplerParameter::MinLod,
        "GL_TEXTURE_MAX_LOD" => SamplerParameter::MaxLod,
        "GL_TEXTURE_LOD_BIAS" => SamplerParameter::LodBias,
        "GL_TEXTURE_MAX_ANISOTROPY_EXT" => SamplerParameter::MaxAnisotropy,
        "GL_TEXTURE_BORDER_COLOR" => SamplerParameter::BorderColor,
    }
}

const COLOR_ATTACHMENT_PREFIX: &str = "GL_COLOR_ATTACHMENT";

/// Parses a render-target variable name into an attachment point.
///
/// Accepts `GL_DEPTH_ATTACHMENT`, `GL_STENCIL_ATTACHMENT`,
/// `GL_DEPTH_STENCIL_ATTACHMENT` and `GL_COLOR_ATTACHMENT<n>`.
pub fn parse_attachment(name: &str) -> Result<Attachment> {
    match name {
        "GL_DEPTH_ATTACHMENT" => Ok(Attachment::Depth),
        "GL_STENCIL_ATTACHMENT" => Ok(Attachment::Stencil),
        "GL_DEPTH_STENCIL_ATTACHMENT" => Ok(Attachment::DepthStencil),
        _ => name
            .strip_prefix(COLOR_ATTACHMENT_PREFIX)
            .and_then(|index| index.parse().ok())
            .map(Attachment::Color)
            .ok_or_else(|| PrismError::UnknownEnum {
                kind: "attachment",
                name: name.to_owned(),
            }),
    }
}

/// Returns `true` when `name` spells a color attachment, whether or not its index parses.
#[must_use]
pub fn is_color_attachment_name(name: &str) -> bool {
    name.starts_with(COLOR_ATTACHMENT_PREFIX)
}
