//! Fixed-function and sampler state.
//!
//! A pass configuration spells state as `(parameter name, StateConfig)`
//! pairs. They are parsed once at initialization into typed values, so a
//! bad enum name fails the pass before anything renders, and applying state
//! each frame is a plain match.

use std::fmt;

use prism_core::{PrismError, Result};
use wgpu::{BlendFactor, BlendOperation, CompareFunction, FrontFace, PolygonMode};

use crate::commands::GpuCommands;
use crate::config::{StateConfig, StateKind};
use crate::device::{
    Capability, CullFace, GpuDevice, HintMode, HintTarget, SamplerHandle, TextureParameter,
};
use crate::lookup::{
    self, NameTable, SamplerParameter, StateParameter, ADDRESS_MODES, BLEND_FACTORS,
    BLEND_OPERATIONS, BOOLEANS, COMPARE_FUNCTIONS, COMPARE_MODES, CULL_FACES, FRONT_FACES,
    HINT_MODES, MAG_FILTERS, MIN_FILTERS, POLYGON_MODES,
};

// ============================================================================
// Value Helpers
// ============================================================================

fn invalid(state: &str, reason: impl Into<String>) -> PrismError {
    PrismError::InvalidStateValue {
        state: state.to_owned(),
        reason: reason.into(),
    }
}

fn enum_value<T: Copy + PartialEq + 'static>(
    table: &NameTable<T>,
    state: &str,
    config: &StateConfig,
) -> Result<T> {
    if config.kind != StateKind::Enum {
        return Err(invalid(state, format!("expected an enum ({})", table.kind())));
    }
    table.lookup(&config.enum_data)
}

fn float_values<const N: usize>(state: &str, config: &StateConfig) -> Result<[f32; N]> {
    if config.kind != StateKind::Float || config.float_data.len() < N {
        return Err(invalid(state, format!("expected {N} float value(s)")));
    }
    let mut values = [0.0; N];
    values.copy_from_slice(&config.float_data[..N]);
    Ok(values)
}

fn int_value(state: &str, config: &StateConfig) -> Result<i32> {
    match config.kind {
        StateKind::Int => config
            .int_data
            .first()
            .copied()
            .ok_or_else(|| invalid(state, "expected an integer value")),
        _ => Err(invalid(state, "expected an integer value")),
    }
}

/// Booleans may be spelled as `GL_TRUE`/`GL_FALSE` or as an integer.
fn bool_value(state: &str, config: &StateConfig) -> Result<bool> {
    match config.kind {
        StateKind::Enum => BOOLEANS.lookup(&config.enum_data),
        StateKind::Int => int_value(state, config).map(|v| v != 0),
        StateKind::Float => float_values::<1>(state, config).map(|[v]| v != 0.0),
    }
}

// ============================================================================
// Fixed-Function State
// ============================================================================

/// One fixed-function state assignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixedFunctionState {
    DepthFunc(CompareFunction),
    DepthWriteMask(bool),
    CullFace(CullFace),
    FrontFace(FrontFace),
    PolygonMode(PolygonMode),
    PolygonOffset { factor: f32, units: f32 },
    SampleCoverage { value: f32, invert: bool },
    SampleMask(u32),
    Hint(HintTarget, HintMode),
    BlendEquationRgb(BlendOperation),
    BlendEquationAlpha(BlendOperation),
    BlendSrcRgb(BlendFactor),
    BlendSrcAlpha(BlendFactor),
    BlendDstRgb(BlendFactor),
    BlendDstAlpha(BlendFactor),
}

impl FixedFunctionState {
    /// Parses a `state_enum` entry.
    pub fn parse(name: &str, config: &StateConfig) -> Result<Self> {
        let parameter = lookup::STATE_PARAMETERS.lookup(name)?;
        Ok(match parameter {
            StateParameter::DepthFunc => {
                Self::DepthFunc(enum_value(&COMPARE_FUNCTIONS, name, config)?)
            }
            StateParameter::DepthWriteMask => Self::DepthWriteMask(bool_value(name, config)?),
            StateParameter::CullFaceMode => Self::CullFace(enum_value(&CULL_FACES, name, config)?),
            StateParameter::FrontFace => Self::FrontFace(enum_value(&FRONT_FACES, name, config)?),
            StateParameter::PolygonMode => {
                Self::PolygonMode(enum_value(&POLYGON_MODES, name, config)?)
            }
            StateParameter::PolygonOffset => {
                let [factor, units] = float_values(name, config)?;
                Self::PolygonOffset { factor, units }
            }
            StateParameter::SampleCoverage => {
                let [value, invert] = float_values(name, config)?;
                Self::SampleCoverage {
                    value,
                    invert: invert != 0.0,
                }
            }
            StateParameter::SampleMask => Self::SampleMask(int_value(name, config)? as u32),
            StateParameter::Hint(target) => {
                Self::Hint(target, enum_value(&HINT_MODES, name, config)?)
            }
            StateParameter::BlendEquationRgb => {
                Self::BlendEquationRgb(enum_value(&BLEND_OPERATIONS, name, config)?)
            }
            StateParameter::BlendEquationAlpha => {
                Self::BlendEquationAlpha(enum_value(&BLEND_OPERATIONS, name, config)?)
            }
            StateParameter::BlendSrcRgb => {
                Self::BlendSrcRgb(enum_value(&BLEND_FACTORS, name, config)?)
            }
            StateParameter::BlendSrcAlpha => {
                Self::BlendSrcAlpha(enum_value(&BLEND_FACTORS, name, config)?)
            }
            StateParameter::BlendDstRgb => {
                Self::BlendDstRgb(enum_value(&BLEND_FACTORS, name, config)?)
            }
            StateParameter::BlendDstAlpha => {
                Self::BlendDstAlpha(enum_value(&BLEND_FACTORS, name, config)?)
            }
        })
    }

    #[track_caller]
    pub fn apply<D: GpuDevice>(&self, gl: &mut GpuCommands<D>) {
        match *self {
            Self::DepthFunc(func) => gl.depth_func(func),
            Self::DepthWriteMask(write) => gl.depth_mask(write),
            Self::CullFace(face) => gl.cull_face(face),
            Self::FrontFace(face) => gl.front_face(face),
            Self::PolygonMode(mode) => gl.polygon_mode(mode),
            Self::PolygonOffset { factor, units } => gl.polygon_offset(factor, units),
            Self::SampleCoverage { value, invert } => gl.sample_coverage(value, invert),
            Self::SampleMask(mask) => gl.sample_mask(0, mask),
            Self::Hint(target, mode) => gl.hint(target, mode),
            Self::BlendEquationRgb(op) => gl.blend_equation_rgb(op),
            Self::BlendEquationAlpha(op) => gl.blend_equation_alpha(op),
            Self::BlendSrcRgb(factor) => gl.blend_src_rgb(factor),
            Self::BlendSrcAlpha(factor) => gl.blend_src_alpha(factor),
            Self::BlendDstRgb(factor) => gl.blend_dst_rgb(factor),
            Self::BlendDstAlpha(factor) => gl.blend_dst_alpha(factor),
        }
    }
}

fn hint_parameter_name(target: HintTarget) -> &'static str {
    lookup::HINT_TARGETS.name_of(target)
}

fn gl_bool(value: bool) -> &'static str {
    BOOLEANS.name_of(value)
}

impl fmt::Display for FixedFunctionState {
    /// `GL_DEPTH_FUNC: GL_LESS`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::DepthFunc(func) => {
                write!(f, "GL_DEPTH_FUNC: {}", COMPARE_FUNCTIONS.name_of(func))
            }
            Self::DepthWriteMask(write) => write!(f, "GL_DEPTH_WRITEMASK: {}", gl_bool(write)),
            Self::CullFace(face) => write!(f, "GL_CULL_FACE_MODE: {}", CULL_FACES.name_of(face)),
            Self::FrontFace(face) => write!(f, "GL_FRONT_FACE: {}", FRONT_FACES.name_of(face)),
            Self::PolygonMode(mode) => {
                write!(f, "GL_POLYGON_MODE: {}", POLYGON_MODES.name_of(mode))
            }
            Self::PolygonOffset { factor, units } => {
                write!(f, "GL_POLYGON_OFFSET_FACTOR: {factor},{units}")
            }
            Self::SampleCoverage { value, invert } => {
                write!(f, "GL_SAMPLE_COVERAGE_VALUE: {value},{}", u8::from(invert))
            }
            Self::SampleMask(mask) => write!(f, "GL_SAMPLE_MASK_VALUE: {mask}"),
            Self::Hint(target, mode) => write!(
                f,
                "{}: {}",
                hint_parameter_name(target),
                HINT_MODES.name_of(mode)
            ),
            Self::BlendEquationRgb(op) => {
                write!(f, "GL_BLEND_EQUATION_RGB: {}", BLEND_OPERATIONS.name_of(op))
            }
            Self::BlendEquationAlpha(op) => {
                write!(f, "GL_BLEND_EQUATION_ALPHA: {}", BLEND_OPERATIONS.name_of(op))
            }
            Self::BlendSrcRgb(factor) => {
                write!(f, "GL_BLEND_SRC_RGB: {}", BLEND_FACTORS.name_of(factor))
            }
            Self::BlendSrcAlpha(factor) => {
                write!(f, "GL_BLEND_SRC_ALPHA: {}", BLEND_FACTORS.name_of(factor))
            }
            Self::BlendDstRgb(factor) => {
                write!(f, "GL_BLEND_DST_RGB: {}", BLEND_FACTORS.name_of(factor))
            }
            Self::BlendDstAlpha(factor) => {
                write!(f, "GL_BLEND_DST_ALPHA: {}", BLEND_FACTORS.name_of(factor))
            }
        }
    }
}

// ============================================================================
// Capability Toggles
// ============================================================================

/// An enable/disable entry, optionally targeting one indexed draw buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityToggle {
    pub capability: Capability,
    pub index: Option<u32>,
    pub enable: bool,
}

impl CapabilityToggle {
    #[track_caller]
    pub fn apply<D: GpuDevice>(&self, gl: &mut GpuCommands<D>) {
        match (self.enable, self.index) {
            (true, None) => gl.enable(self.capability),
            (false, None) => gl.disable(self.capability),
            (true, Some(index)) => gl.enable_indexed(self.capability, index),
            (false, Some(index)) => gl.disable_indexed(self.capability, index),
        }
    }
}

impl fmt::Display for CapabilityToggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = lookup::CAPABILITIES.name_of(self.capability);
        match self.index {
            Some(index) => write!(f, "{name}:{index}"),
            None => f.write_str(name),
        }
    }
}

// ============================================================================
// Sampler State
// ============================================================================

/// Parses one sampler `state` entry into a parameter.
pub fn parse_sampler_parameter(name: &str, config: &StateConfig) -> Result<TextureParameter> {
    let parameter = lookup::SAMPLER_PARAMETERS.lookup(name)?;
    Ok(match parameter {
        SamplerParameter::MinFilter => {
            let (filter, mipmap) = enum_value(&MIN_FILTERS, name, config)?;
            TextureParameter::MinFilter(filter, mipmap)
        }
        SamplerParameter::MagFilter => {
            TextureParameter::MagFilter(enum_value(&MAG_FILTERS, name, config)?)
        }
        SamplerParameter::WrapS => {
            TextureParameter::WrapS(enum_value(&ADDRESS_MODES, name, config)?)
        }
        SamplerParameter::WrapT => {
            TextureParameter::WrapT(enum_value(&ADDRESS_MODES, name, config)?)
        }
        SamplerParameter::WrapR => {
            TextureParameter::WrapR(enum_value(&ADDRESS_MODES, name, config)?)
        }
        SamplerParameter::CompareMode => {
            TextureParameter::CompareMode(enum_value(&COMPARE_MODES, name, config)?)
        }
        SamplerParameter::CompareFunc => {
            TextureParameter::CompareFunc(enum_value(&COMPARE_FUNCTIONS, name, config)?)
        }
        SamplerParameter::MinLod => TextureParameter::MinLod(float_values::<1>(name, config)?[0]),
        SamplerParameter::MaxLod => TextureParameter::MaxLod(float_values::<1>(name, config)?[0]),
        SamplerParameter::LodBias => TextureParameter::LodBias(float_values::<1>(name, config)?[0]),
        SamplerParameter::MaxAnisotropy => {
            TextureParameter::MaxAnisotropy(float_values::<1>(name, config)?[0])
        }
        SamplerParameter::BorderColor => TextureParameter::BorderColor(float_values(name, config)?),
    })
}

/// Applies sampler parameters, skipping anisotropy on devices without it.
#[track_caller]
pub fn apply_sampler_parameters<D: GpuDevice>(
    gl: &mut GpuCommands<D>,
    sampler: SamplerHandle,
    parameters: &[TextureParameter],
) {
    let anisotropy = gl.limits().anisotropic_filtering;
    for parameter in parameters {
        if matches!(parameter, TextureParameter::MaxAnisotropy(_)) && !anisotropy {
            continue;
        }
        gl.sampler_parameter(sampler, *parameter);
    }
}

/// `GL_TEXTURE_MIN_FILTER: GL_LINEAR_MIPMAP_LINEAR`
#[derive(Debug, Clone, Copy)]
pub struct DisplaySamplerParameter(pub TextureParameter);

impl fmt::Display for DisplaySamplerParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            TextureParameter::MinFilter(filter, mipmap) => write!(
                f,
                "GL_TEXTURE_MIN_FILTER: {}",
                MIN_FILTERS.name_of((filter, mipmap))
            ),
            TextureParameter::MagFilter(filter) => {
                write!(f, "GL_TEXTURE_MAG_FILTER: {}", MAG_FILTERS.name_of(filter))
            }
            TextureParameter::WrapS(mode) => {
                write!(f, "GL_TEXTURE_WRAP_S: {}", ADDRESS_MODES.name_of(mode))
            }
            TextureParameter::WrapT(mode) => {
                write!(f, "GL_TEXTURE_WRAP_T: {}", ADDRESS_MODES.name_of(mode))
            }
            TextureParameter::WrapR(mode) => {
                write!(f, "GL_TEXTURE_WRAP_R: {}", ADDRESS_MODES.name_of(mode))
            }
            TextureParameter::CompareMode(compare) => {
                write!(f, "GL_TEXTURE_COMPARE_MODE: {}", COMPARE_MODES.name_of(compare))
            }
            TextureParameter::CompareFunc(func) => {
                write!(f, "GL_TEXTURE_COMPARE_FUNC: {}", COMPARE_FUNCTIONS.name_of(func))
            }
            TextureParameter::MinLod(v) => write!(f, "GL_TEXTURE_MIN_LOD: {v}"),
            TextureParameter::MaxLod(v) => write!(f, "GL_TEXTURE_MAX_LOD: {v}"),
            TextureParameter::LodBias(v) => write!(f, "GL_TEXTURE_LOD_BIAS: {v}"),
            TextureParameter::MaxAnisotropy(v) => write!(f, "GL_TEXTURE_MAX_ANISOTROPY_EXT: {v}"),
            TextureParameter::BorderColor([r, g, b, a]) => {
                write!(f, "GL_TEXTURE_BORDER_COLOR: {r},{g},{b},{a}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandOptions;
    use crate::device::{DeviceLimits, HeadlessDevice};

    #[test]
    fn parses_and_prints_state() {
        let state =
            FixedFunctionState::parse("GL_DEPTH_FUNC", &StateConfig::enumeration("GL_LESS"))
                .unwrap();
        assert_eq!(state, FixedFunctionState::DepthFunc(CompareFunction::Less));
        assert_eq!(state.to_string(), "GL_DEPTH_FUNC: GL_LESS");

        let offset =
            FixedFunctionState::parse("GL_POLYGON_OFFSET_FACTOR", &StateConfig::floats(&[1.0, 4.0]))
                .unwrap();
        assert_eq!(
            offset,
            FixedFunctionState::PolygonOffset {
                factor: 1.0,
                units: 4.0
            }
        );
    }

    #[test]
    fn rejects_mismatched_payloads() {
        assert!(matches!(
            FixedFunctionState::parse("GL_DEPTH_FUNC", &StateConfig::ints(&[1])),
            Err(PrismError::InvalidStateValue { .. })
        ));
        assert!(matches!(
            FixedFunctionState::parse("GL_DEPTH_FUNC", &StateConfig::enumeration("GL_SOMETIMES")),
            Err(PrismError::UnknownEnum { .. })
        ));
        assert!(matches!(
            FixedFunctionState::parse("GL_NOT_A_STATE", &StateConfig::enumeration("GL_LESS")),
            Err(PrismError::UnknownEnum { kind: "state parameter", .. })
        ));
    }

    #[test]
    fn depth_mask_accepts_enum_or_int() {
        let from_enum =
            FixedFunctionState::parse("GL_DEPTH_WRITEMASK", &StateConfig::enumeration("GL_FALSE"));
        let from_int = FixedFunctionState::parse("GL_DEPTH_WRITEMASK", &StateConfig::ints(&[0]));

        assert_eq!(from_enum.unwrap(), FixedFunctionState::DepthWriteMask(false));
        assert_eq!(from_int.unwrap(), FixedFunctionState::DepthWriteMask(false));
    }

    #[test]
    fn anisotropy_is_skipped_without_support() {
        let device = HeadlessDevice::with_limits(DeviceLimits {
            anisotropic_filtering: false,
            ..DeviceLimits::default()
        });
        let mut gl = GpuCommands::new(device, CommandOptions::default());
        let sampler = gl.create_sampler();

        let parameters = [
            parse_sampler_parameter("GL_TEXTURE_MAX_ANISOTROPY_EXT", &StateConfig::floats(&[8.0]))
                .unwrap(),
            parse_sampler_parameter("GL_TEXTURE_MAG_FILTER", &StateConfig::enumeration("GL_LINEAR"))
                .unwrap(),
        ];
        apply_sampler_parameters(&mut gl, sampler, &parameters);

        assert_eq!(
            gl.device().sampler_parameters(sampler).map(<[_]>::len),
            Some(1)
        );
        assert_eq!(gl.device().pending_error(), None);
    }
}
