//! GPU Command Cache Tests
//!
//! Tests for:
//! - Uniform upload elimination (same bits skipped, changed bits sent)
//! - Cache reset on program switch
//! - Active unit and 2D texture binding elimination
//! - Blend component tracking
//! - Compile and link failures surfaced as errors

use std::collections::BTreeMap;

use wgpu::{BlendFactor, TextureFormat, TextureViewDimension};

use prism::PrismError;
use prism::render::commands::{CommandOptions, GpuCommands};
use prism::render::device::{
    HeadlessDevice, ProgramHandle, ShaderStage, UniformLocation, UniformValue,
};
use prism::render::uniform::{UniformData, UniformVector};

const VERTEX: &str = "#version 330\nuniform mat4 modelView;\nvoid main() {}\n";
const FRAGMENT: &str =
    "#version 330\nuniform vec4 tint;\nuniform sampler2D diffuse;\nvoid main() {}\n";

fn commands() -> GpuCommands<HeadlessDevice> {
    GpuCommands::new(
        HeadlessDevice::new(),
        CommandOptions {
            error_checking: true,
            break_on_error: false,
            log_calls: false,
        },
    )
}

fn linked_program(gl: &mut GpuCommands<HeadlessDevice>) -> ProgramHandle {
    let vertex = gl.compile_shader("test.vert", ShaderStage::Vertex, VERTEX).unwrap();
    let fragment = gl.compile_shader("test.frag", ShaderStage::Fragment, FRAGMENT).unwrap();
    gl.link_program(&[], &[vertex, fragment], &BTreeMap::new()).unwrap()
}

fn tint_location(gl: &mut GpuCommands<HeadlessDevice>, program: ProgramHandle) -> UniformLocation {
    gl.uniform_location(program, "tint").unwrap()
}

// ============================================================================
// Uniform Cache
// ============================================================================

#[test]
fn identical_uniform_payload_is_sent_once() {
    let mut gl = commands();
    let program = linked_program(&mut gl);
    let tint = tint_location(&mut gl, program);
    gl.use_program(Some(program));

    let red = UniformData::from([1.0, 0.0, 0.0, 1.0]);
    gl.apply_uniform(tint, &red);
    gl.apply_uniform(tint, &red);

    assert_eq!(gl.device().call_count("set_uniform"), 1);
}

#[test]
fn changed_component_is_sent_again() {
    let mut gl = commands();
    let program = linked_program(&mut gl);
    let tint = tint_location(&mut gl, program);
    gl.use_program(Some(program));

    gl.apply_uniform(tint, &UniformData::from([1.0, 0.0, 0.0, 1.0]));
    gl.apply_uniform(tint, &UniformData::from([1.0, 0.0, 0.0, 0.5]));

    assert_eq!(gl.device().call_count("set_uniform"), 2);
    assert_eq!(
        gl.device().uniform_value(program, tint),
        Some(UniformValue::Vec4([1.0, 0.0, 0.0, 0.5]))
    );
}

#[test]
fn negative_zero_is_a_different_payload() {
    let mut gl = commands();
    let program = linked_program(&mut gl);
    let tint = tint_location(&mut gl, program);
    gl.use_program(Some(program));

    gl.apply_uniform(tint, &UniformData::from([0.0, 0.0, 0.0, 1.0]));
    gl.apply_uniform(tint, &UniformData::from([-0.0, 0.0, 0.0, 1.0]));

    assert_eq!(gl.device().call_count("set_uniform"), 2);
}

#[test]
fn program_switch_discards_uniform_cache() {
    let mut gl = commands();
    let program = linked_program(&mut gl);
    let tint = tint_location(&mut gl, program);
    let white = UniformData::from([1.0; 4]);

    gl.use_program(Some(program));
    gl.apply_uniform(tint, &white);
    gl.use_program(Some(program));
    gl.apply_uniform(tint, &white);

    assert_eq!(gl.device().call_count("set_uniform"), 2);
}

#[test]
fn uncached_upload_always_reaches_the_device() {
    let mut gl = commands();
    let program = linked_program(&mut gl);
    let tint = tint_location(&mut gl, program);
    gl.use_program(Some(program));

    let blue = UniformData::from([0.0, 0.0, 1.0, 1.0]);
    gl.apply_uniform_uncached(tint, &blue);
    gl.apply_uniform_uncached(tint, &blue);

    assert_eq!(gl.device().call_count("set_uniform"), 2);
}

#[test]
fn int_and_float_caches_are_separate() {
    let mut gl = commands();
    let program = linked_program(&mut gl);
    let sampler = gl.uniform_location(program, "diffuse").unwrap();
    gl.use_program(Some(program));

    gl.apply_uniform(sampler, &UniformVector::<i32>::from_slice(&[3]));
    gl.apply_uniform(sampler, &UniformVector::<i32>::from_slice(&[3]));
    gl.apply_uniform(sampler, &UniformData::from(3.0));

    assert_eq!(gl.device().call_count("set_uniform"), 2);
}

#[test]
fn unsupported_payload_size_is_dropped() {
    let mut gl = commands();
    let program = linked_program(&mut gl);
    let tint = tint_location(&mut gl, program);
    gl.use_program(Some(program));

    gl.apply_uniform(tint, &UniformData::from([1.0; 7]));

    assert_eq!(gl.device().call_count("set_uniform"), 0);
}

#[test]
fn dropped_payload_does_not_replace_the_cached_value() {
    let mut gl = commands();
    let program = linked_program(&mut gl);
    let tint = tint_location(&mut gl, program);
    gl.use_program(Some(program));

    let white = UniformData::from([1.0, 1.0, 1.0, 1.0]);
    gl.apply_uniform(tint, &white);
    gl.apply_uniform(tint, &UniformData::from([1.0; 7]));
    gl.apply_uniform(tint, &white);
    assert_eq!(gl.device().call_count("set_uniform"), 1);

    let odd = UniformData::from([0.5; 5]);
    assert!(!gl.apply_uniform_uncached(tint, &odd));
    gl.apply_uniform(tint, &odd);
    gl.apply_uniform(tint, &odd);
    assert_eq!(gl.device().call_count("set_uniform"), 1);
    assert_eq!(
        gl.device().uniform_value(program, tint),
        Some(UniformValue::Vec4([1.0, 1.0, 1.0, 1.0]))
    );
}

// ============================================================================
// Texture Binding Cache
// ============================================================================

#[test]
fn repeated_unit_and_binding_are_skipped() {
    let mut gl = commands();
    let texture = gl
        .device_mut()
        .allocate_texture_2d(TextureFormat::Rgba8Unorm, 4, 4);

    gl.active_texture(2);
    gl.bind_texture(TextureViewDimension::D2, Some(texture));
    gl.active_texture(2);
    gl.bind_texture(TextureViewDimension::D2, Some(texture));

    assert_eq!(gl.device().call_count("active_texture"), 1);
    assert_eq!(gl.device().call_count("bind_texture"), 1);
    assert_eq!(gl.device().bound_texture(2, TextureViewDimension::D2), Some(texture));
}

#[test]
fn binding_cache_is_per_unit() {
    let mut gl = commands();
    let texture = gl
        .device_mut()
        .allocate_texture_2d(TextureFormat::Rgba8Unorm, 4, 4);

    gl.active_texture(0);
    gl.bind_texture(TextureViewDimension::D2, Some(texture));
    gl.active_texture(1);
    gl.bind_texture(TextureViewDimension::D2, Some(texture));
    gl.active_texture(0);
    gl.bind_texture(TextureViewDimension::D2, Some(texture));

    assert_eq!(gl.device().call_count("active_texture"), 3);
    assert_eq!(gl.device().call_count("bind_texture"), 2);
}

#[test]
fn deleting_a_texture_forgets_its_bindings() {
    let mut gl = commands();
    let texture = gl
        .device_mut()
        .allocate_texture_2d(TextureFormat::Rgba8Unorm, 4, 4);
    let replacement = gl
        .device_mut()
        .allocate_texture_2d(TextureFormat::Rgba8Unorm, 4, 4);

    gl.active_texture(0);
    gl.bind_texture(TextureViewDimension::D2, Some(texture));
    gl.delete_texture(texture);
    gl.bind_texture(TextureViewDimension::D2, None);
    gl.bind_texture(TextureViewDimension::D2, Some(replacement));

    // The unbind after deletion is already known and skipped.
    assert_eq!(gl.device().call_count("bind_texture"), 2);
    assert_eq!(gl.device().live_textures(), 1);
}

// ============================================================================
// Blend Components
// ============================================================================

#[test]
fn blend_components_keep_their_partners() {
    let mut gl = commands();

    gl.blend_src_rgb(BlendFactor::SrcAlpha);
    gl.blend_dst_rgb(BlendFactor::OneMinusSrcAlpha);
    gl.blend_dst_alpha(BlendFactor::One);

    assert_eq!(
        gl.device().fixed_function().blend_func,
        [
            BlendFactor::SrcAlpha,
            BlendFactor::OneMinusSrcAlpha,
            BlendFactor::One,
            BlendFactor::One,
        ]
    );
    assert_eq!(gl.device().call_count("blend_func_separate"), 3);
}

// ============================================================================
// Compile & Link
// ============================================================================

#[test]
fn compile_failure_returns_the_log_and_deletes_the_shader() {
    let mut gl = commands();
    let result = gl.compile_shader("broken.frag", ShaderStage::Fragment, "#error nope\n");

    match result {
        Err(PrismError::ShaderCompile { name, log }) => {
            assert_eq!(name, "broken.frag");
            assert!(log.contains("#error nope"));
        }
        other => panic!("expected a compile error, got {other:?}"),
    }
    assert_eq!(gl.device().live_shaders(), 0);
}

#[test]
fn link_without_fragment_stage_fails_and_deletes_the_program() {
    let mut gl = commands();
    let vertex = gl.compile_shader("only.vert", ShaderStage::Vertex, VERTEX).unwrap();

    let result = gl.link_program(&[], &[vertex], &BTreeMap::new());

    assert!(matches!(result, Err(PrismError::ShaderLink(_))));
    assert_eq!(gl.device().live_programs(), 0);
}

#[test]
fn link_binds_attributes_and_outputs() {
    let mut gl = commands();
    let vertex = gl.compile_shader("a.vert", ShaderStage::Vertex, VERTEX).unwrap();
    let fragment = gl.compile_shader("a.frag", ShaderStage::Fragment, FRAGMENT).unwrap();
    let attributes = vec!["position".to_owned(), String::new(), "uv".to_owned()];
    let outputs = BTreeMap::from([(1, "normalOut".to_owned())]);

    let program = gl.link_program(&attributes, &[vertex, fragment], &outputs).unwrap();

    let device = gl.device();
    assert_eq!(device.attrib_location(program, "position"), Some(0));
    assert_eq!(device.attrib_location(program, "uv"), Some(2));
    assert_eq!(device.frag_data_location(program, "normalOut"), Some(1));
    assert_eq!(
        device.program_uniforms(program),
        Some(&["modelView".to_owned(), "tint".to_owned(), "diffuse".to_owned()][..])
    );
}
