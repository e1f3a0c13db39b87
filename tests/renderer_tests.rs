//! Renderer Tests
//!
//! Tests for:
//! - Pass-list initialization and render target publication
//! - Cross-pass sampling, including republication after a resize
//! - Failed framebuffer rebuilds and their retry
//! - Local model overrides and their restoration between draws
//! - External model override diffing
//! - Global and per-pass default textures and uniforms
//! - Shader cache sharing and define injection
//! - Fatal configuration errors and rollback
//! - Status and profiling output

use wgpu::{PrimitiveTopology, TextureFormat};

use prism::prelude::*;
use prism::render::GroupModels;
use prism::render::cull::FULL_SCREEN_RECT_GROUP;
use prism::render::device::{TextureHandle, UniformValue};

const PIPELINE: &str = r#"
[[pass]]
name = "scene"
draw_groups = ["normal"]
vertex_shader = "scene.vert"
fragment_shader = "scene.frag"
clear_color = true
clear_depth = true
clear_color_value = [0.1, 0.2, 0.3, 1.0]
state_enable = ["GL_DEPTH_TEST"]

[pass.user_defined_fields]
camera = "main"

[pass.uniforms.colorTint]
data = [1.0, 1.0, 1.0, 1.0]

[pass.uniforms.modelView]

[pass.render_targets.GL_COLOR_ATTACHMENT0]
name = "sceneColor"
variable = "colorOut"
format = "GL_RGBA8"
width = 512.0
height = 512.0
width_height_are_multiples = false

[pass.samplers.diffuseSampler]
texture_name = "diffuseTexture"

[[pass]]
name = "post"
draw_groups = ["full screen rect"]
vertex_shader = "post.vert"
fragment_shader = "post.frag"

[pass.uniforms.exposure]

[pass.samplers.sceneSampler]
texture_name = "sceneColor"
"#;

const SCENE_VERT: &str = "#version 330\nuniform mat4 modelView;\nvoid main() {}\n";
const SCENE_FRAG: &str =
    "#version 330\nuniform vec4 colorTint;\nuniform sampler2D diffuseSampler;\nvoid main() {}\n";
const POST_VERT: &str = "#version 330\nvoid main() {}\n";
const POST_FRAG: &str =
    "#version 330\nuniform sampler2D sceneSampler;\nuniform float exposure;\nvoid main() {}\n";

const WINDOW: (u32, u32) = (800, 600);

fn loader() -> MemoryShaderLoader {
    MemoryShaderLoader::new()
        .with_source("scene.vert", SCENE_VERT)
        .with_source("scene.frag", SCENE_FRAG)
        .with_source("post.vert", POST_VERT)
        .with_source("post.frag", POST_FRAG)
}

fn pipeline() -> PassList {
    PassList::from_toml_str(PIPELINE).unwrap()
}

fn build(list: &PassList, names: &mut NameMap) -> Renderer<HeadlessDevice> {
    init_logging(&LoggingConfig::for_tests());
    let mut renderer = Renderer::new(HeadlessDevice::new(), list.settings.clone());
    renderer
        .initialize(&list.passes, names, &mut loader(), WINDOW)
        .unwrap();
    renderer
}

fn texture(renderer: &mut Renderer<HeadlessDevice>) -> TextureHandle {
    renderer
        .device_mut()
        .allocate_texture_2d(TextureFormat::Rgba8Unorm, 64, 64)
}

fn full_screen_rect(renderer: &mut Renderer<HeadlessDevice>) -> ExternalModel {
    let vao = renderer.device_mut().allocate_vertex_array();
    ExternalModel::custom(move |gl| {
        gl.bind_vertex_array(Some(vao));
        gl.draw_arrays(PrimitiveTopology::TriangleStrip, 0, 4);
    })
}

fn scene_color(renderer: &Renderer<HeadlessDevice>, names: &NameMap) -> TextureHandle {
    let name = names.id_of("sceneColor").unwrap();
    renderer.shared_textures()[&name].handle
}

// ============================================================================
// Initialization
// ============================================================================

#[test]
fn render_target_is_published_and_sampled_downstream() -> anyhow::Result<()> {
    let mut list = PassList::from_toml_str(PIPELINE)?;
    list.settings.error_checking = true;
    let mut names = NameMap::new();
    let mut renderer = Renderer::new(HeadlessDevice::new(), list.settings.clone());
    renderer.initialize(&list.passes, &mut names, &mut loader(), WINDOW)?;
    let scene_color = scene_color(&renderer, &names);

    assert_eq!(
        renderer.device().texture_storage(scene_color),
        Some((TextureFormat::Rgba8Unorm, 512, 512))
    );

    let post = renderer.pass(names.add("post")).unwrap();
    assert_eq!(post.default_textures().len(), 1);
    assert_eq!(post.default_textures()[0].handle, scene_color);
    assert_eq!(post.default_textures()[0].unit, 0);
    assert!(post.framebuffer().is_none());

    let scene = renderer.pass(names.add("scene")).unwrap();
    let framebuffer = scene.framebuffer().unwrap();
    assert_eq!(
        renderer
            .device()
            .attached_texture(framebuffer, prism::render::device::Attachment::Color(0)),
        Some(scene_color)
    );
    assert_eq!(scene.dimensions().current(), (512, 512));
    Ok(())
}

#[test]
fn fragment_outputs_route_to_their_attachments() {
    let mut names = NameMap::new();
    let renderer = build(&pipeline(), &mut names);
    let scene = renderer.pass(names.add("scene")).unwrap();
    let program = scene.program().unwrap();

    assert_eq!(renderer.device().frag_data_location(program, "colorOut"), Some(0));
    assert_eq!(
        renderer
            .device()
            .draw_buffer_routing(scene.framebuffer().unwrap())
            .map(|routing| routing[0]),
        Some(Some(0))
    );
}

#[test]
fn pass_queries_expose_configuration() {
    let mut names = NameMap::new();
    let renderer = build(&pipeline(), &mut names);
    let scene = names.add("scene");

    assert_eq!(renderer.pass_names(), vec![scene, names.add("post")]);
    assert_eq!(renderer.user_defined_fields(scene)["camera"], "main");
    assert!(renderer.draw_groups(scene).contains(&names.add("normal")));
    assert!(renderer.draw_groups(names.add("missing")).is_empty());
    assert!(renderer.pass_enabled(scene));
    assert!(!renderer.pass_enabled(names.add("missing")));
}

#[test]
fn sampler_units_are_assigned_at_link_time() {
    let mut names = NameMap::new();
    let renderer = build(&pipeline(), &mut names);
    let post = renderer.pass(names.add("post")).unwrap();
    let program = post.program().unwrap();
    let location = post.uniform_location(names.add("exposure")).unwrap();

    // sceneSampler was declared first, so it holds location 0.
    assert_eq!(
        renderer.device().uniform_value(program, prism::render::device::UniformLocation(0)),
        Some(UniformValue::Int(0))
    );
    assert_eq!(location.0, 1);
    assert_eq!(post.texture_unit(names.add("sceneColor")), Some(0));
}

// ============================================================================
// Frame Rendering
// ============================================================================

#[test]
fn downstream_pass_samples_the_upstream_target() {
    let mut names = NameMap::new();
    let mut renderer = build(&pipeline(), &mut names);
    let rect = full_screen_rect(&mut renderer);
    let mut groups = GroupModels::default();
    groups.insert(names.add(FULL_SCREEN_RECT_GROUP), vec![&rect]);

    renderer.render(WINDOW, ExternalModels::ByGroup(&groups));

    let draws = renderer.device().draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].framebuffer, None);
    assert_eq!(draws[0].texture(0), Some(scene_color(&renderer, &names)));
    assert_eq!(draws[0].count, 4);
}

#[test]
fn resize_republishes_recreated_targets_in_the_same_frame() {
    let mut list = pipeline();
    let target = list.passes[0]
        .render_targets
        .get_mut("GL_COLOR_ATTACHMENT0")
        .unwrap();
    target.width = 1.0;
    target.height = 1.0;
    target.width_height_are_multiples = true;

    let mut names = NameMap::new();
    let mut renderer = build(&list, &mut names);
    let before = scene_color(&renderer, &names);
    let rect = full_screen_rect(&mut renderer);
    let mut groups = GroupModels::default();
    groups.insert(names.add(FULL_SCREEN_RECT_GROUP), vec![&rect]);

    renderer.render((1024, 768), ExternalModels::ByGroup(&groups));

    let after = scene_color(&renderer, &names);
    assert_ne!(before, after);
    assert!(!renderer.device().texture_exists(before));
    assert_eq!(
        renderer.device().texture_storage(after),
        Some((TextureFormat::Rgba8Unorm, 1024, 768))
    );

    let post = renderer.pass(names.add("post")).unwrap();
    assert_eq!(post.default_textures()[0].handle, after);
    assert_eq!(renderer.device().draws().last().unwrap().texture(0), Some(after));
}

#[test]
fn failed_rebuild_skips_the_pass_and_withdraws_its_targets() {
    let mut list = pipeline();
    let target = list.passes[0]
        .render_targets
        .get_mut("GL_COLOR_ATTACHMENT0")
        .unwrap();
    target.width = 1.0;
    target.height = 1.0;
    target.width_height_are_multiples = true;

    let mut names = NameMap::new();
    let mut renderer = build(&list, &mut names);
    let scene_name = names.add("scene");
    let color_name = names.id_of("sceneColor").unwrap();
    let before = scene_color(&renderer, &names);

    let vao = renderer.device_mut().allocate_vertex_array();
    let mesh = ExternalModel::new(vao, 36);
    let rect = full_screen_rect(&mut renderer);
    let mut groups = GroupModels::default();
    groups.insert(names.add("normal"), vec![&mesh]);
    groups.insert(names.add(FULL_SCREEN_RECT_GROUP), vec![&rect]);
    let scene_program = renderer.pass(scene_name).unwrap().program();

    // A zero-sized window leaves the scene framebuffer incomplete.
    renderer.render((0, 0), ExternalModels::ByGroup(&groups));

    assert!(!renderer.device().texture_exists(before));
    assert!(!renderer.shared_textures().contains_key(&color_name));
    assert!(renderer.pass(scene_name).unwrap().framebuffer_stale());
    assert!(renderer.pass(scene_name).unwrap().framebuffer().is_none());
    assert!(
        renderer
            .device()
            .draws()
            .iter()
            .all(|draw| draw.program != scene_program)
    );

    // The post pass still runs, sampling nothing instead of a deleted texture.
    let post = renderer.pass(names.add("post")).unwrap();
    assert!(post.default_textures().is_empty());
    let last = renderer.device().draws().last().unwrap();
    assert_ne!(last.texture(0), Some(before));

    // Retried while the size stays unusable.
    renderer.render((0, 0), ExternalModels::ByGroup(&groups));
    assert!(renderer.pass(scene_name).unwrap().framebuffer_stale());
    assert!(renderer.pass(scene_name).unwrap().enabled());

    renderer.device_mut().clear_draws();
    renderer.render(WINDOW, ExternalModels::ByGroup(&groups));

    let scene = renderer.pass(scene_name).unwrap();
    assert!(!scene.framebuffer_stale());
    assert!(scene.framebuffer().is_some());
    let after = scene_color(&renderer, &names);
    assert_eq!(
        renderer.device().texture_storage(after),
        Some((TextureFormat::Rgba8Unorm, 800, 600))
    );
    assert!(
        renderer
            .device()
            .draws()
            .iter()
            .any(|draw| draw.program == scene_program)
    );

    let post = renderer.pass(names.add("post")).unwrap();
    assert_eq!(post.default_textures()[0].handle, after);
    assert_eq!(renderer.device().draws().last().unwrap().texture(0), Some(after));
}

#[test]
fn unchanged_size_keeps_targets() {
    let mut names = NameMap::new();
    let mut renderer = build(&pipeline(), &mut names);
    let before = scene_color(&renderer, &names);

    renderer.render(WINDOW, ExternalModels::None);
    renderer.render((1920, 1080), ExternalModels::None);

    // Absolute-size targets ignore the window.
    assert_eq!(scene_color(&renderer, &names), before);
}

#[test]
fn baseline_state_is_applied_before_drawing() {
    let mut names = NameMap::new();
    let mut renderer = build(&pipeline(), &mut names);
    let vao = renderer.device_mut().allocate_vertex_array();
    renderer.add_model(ModelEntry::new(names.add("normal"), vao, 36));
    // Keeps the scene pass's state as the last one applied.
    renderer.set_pass_enabled(names.add("post"), false);

    renderer.render(WINDOW, ExternalModels::None);

    let device = renderer.device();
    let scene = renderer.pass(names.add("scene")).unwrap();
    assert!(device.is_enabled(prism::render::device::Capability::DepthTest));
    assert_eq!(device.fixed_function().clear_color, [0.1, 0.2, 0.3, 1.0]);
    assert_eq!(device.fixed_function().viewport, (512, 512));
    assert_eq!(device.draws()[0].framebuffer, scene.framebuffer());
    assert_eq!(device.draws()[0].vertex_array, Some(vao));
    assert_eq!(device.bound_framebuffer(), None);
}

#[test]
fn disabled_pass_is_skipped() {
    let mut names = NameMap::new();
    let mut renderer = build(&pipeline(), &mut names);
    let vao = renderer.device_mut().allocate_vertex_array();
    renderer.add_model(ModelEntry::new(names.add("normal"), vao, 36));
    renderer.set_pass_enabled(names.add("scene"), false);

    renderer.render(WINDOW, ExternalModels::None);

    assert!(renderer.device().draws().is_empty());
}

// ============================================================================
// Local Models
// ============================================================================

#[test]
fn local_overrides_are_restored_for_the_next_model() {
    let mut names = NameMap::new();
    let mut renderer = build(&pipeline(), &mut names);
    let normal = names.add("normal");
    let diffuse = names.add("diffuseTexture");
    let tint = names.add("colorTint");
    let base = texture(&mut renderer);
    let special = texture(&mut renderer);
    renderer.set_global_texture(diffuse, &TextureEntry::new(diffuse, base));

    let first_vao = renderer.device_mut().allocate_vertex_array();
    let second_vao = renderer.device_mut().allocate_vertex_array();
    let first = renderer.add_model(ModelEntry::new(normal, first_vao, 36));
    renderer.add_model(ModelEntry::new(normal, second_vao, 12));
    renderer.set_model_texture(first, &TextureEntry::new(diffuse, special));
    renderer.set_model_uniform(first, &UniformEntry::new(tint, [1.0, 0.0, 0.0, 1.0]));

    renderer.render(WINDOW, ExternalModels::None);

    let location = renderer
        .pass(names.add("scene"))
        .and_then(|pass| pass.uniform_location(tint))
        .unwrap();
    let draws = renderer.device().draws();
    assert_eq!(draws.len(), 2);

    assert_eq!(draws[0].vertex_array, Some(first_vao));
    assert_eq!(draws[0].texture(0), Some(special));
    assert_eq!(draws[0].uniform(location), Some(UniformValue::Vec4([1.0, 0.0, 0.0, 1.0])));

    assert_eq!(draws[1].vertex_array, Some(second_vao));
    assert_eq!(draws[1].texture(0), Some(base));
    assert_eq!(draws[1].uniform(location), Some(UniformValue::Vec4([1.0; 4])));
}

#[test]
fn model_texture_override_updates_in_place_and_removes() {
    let mut names = NameMap::new();
    let mut renderer = build(&pipeline(), &mut names);
    let diffuse = names.add("diffuseTexture");
    let first_texture = texture(&mut renderer);
    let second_texture = texture(&mut renderer);
    let vao = renderer.device_mut().allocate_vertex_array();
    let model = renderer.add_model(ModelEntry::new(names.add("normal"), vao, 36));
    let scene = names.add("scene");

    renderer.set_model_texture(model, &TextureEntry::new(diffuse, first_texture));
    renderer.set_model_texture(model, &TextureEntry::new(diffuse, second_texture));
    {
        let held = renderer.pass(scene).and_then(|pass| pass.model(model)).unwrap();
        assert_eq!(held.texture_override_count(), 1);
        assert_eq!(held.texture_overrides().next().unwrap().handle, second_texture);
    }

    renderer.remove_model_texture(model, diffuse);
    let held = renderer.pass(scene).and_then(|pass| pass.model(model)).unwrap();
    assert_eq!(held.texture_override_count(), 0);
}

#[test]
fn model_uniform_override_removal() {
    let mut names = NameMap::new();
    let mut renderer = build(&pipeline(), &mut names);
    let tint = names.add("colorTint");
    let vao = renderer.device_mut().allocate_vertex_array();
    let model = renderer.add_model(ModelEntry::new(names.add("normal"), vao, 36));
    let scene = names.add("scene");

    renderer.set_model_uniform(model, &UniformEntry::new(tint, [0.0, 0.0, 1.0, 1.0]));
    assert!(
        renderer
            .pass(scene)
            .and_then(|pass| pass.model(model))
            .unwrap()
            .has_uniform_override(tint)
    );

    renderer.remove_model_uniform(model, tint);
    let held = renderer.pass(scene).and_then(|pass| pass.model(model)).unwrap();
    assert_eq!(held.uniform_override_count(), 0);
}

#[test]
fn models_join_only_passes_drawing_their_group() {
    let mut names = NameMap::new();
    let mut renderer = build(&pipeline(), &mut names);
    let vao = renderer.device_mut().allocate_vertex_array();

    let model = renderer.add_model(ModelEntry::new(names.add("normal"), vao, 36));
    let orphan = renderer.add_model(ModelEntry::new(names.add("no such group"), vao, 3));

    assert_eq!(renderer.model_count(), 2);
    assert_eq!(renderer.pass(names.add("scene")).unwrap().model_count(), 1);
    assert_eq!(renderer.pass(names.add("post")).unwrap().model_count(), 0);

    renderer.remove_model(model);
    renderer.remove_model(orphan);
    assert_eq!(renderer.model_count(), 0);
    assert_eq!(renderer.pass(names.add("scene")).unwrap().model_count(), 0);
}

#[test]
#[should_panic(expected = "remove_model")]
fn removing_a_missing_model_panics() {
    let mut names = NameMap::new();
    let mut renderer = build(&pipeline(), &mut names);
    let vao = renderer.device_mut().allocate_vertex_array();
    let model = renderer.add_model(ModelEntry::new(names.add("normal"), vao, 36));

    renderer.remove_model(model);
    renderer.remove_model(model);
}

// ============================================================================
// External Models
// ============================================================================

#[test]
fn external_overrides_are_diffed_between_models() {
    let mut names = NameMap::new();
    let mut renderer = build(&pipeline(), &mut names);
    let diffuse = names.add("diffuseTexture");
    let tint = names.add("colorTint");
    let base = texture(&mut renderer);
    let special = texture(&mut renderer);
    renderer.set_global_texture(diffuse, &TextureEntry::new(diffuse, base));

    let vaos: Vec<_> = (0..4)
        .map(|_| renderer.device_mut().allocate_vertex_array())
        .collect();
    let green = ExternalModel::new(vaos[0], 6)
        .with_texture(TextureEntry::new(diffuse, special))
        .with_uniform(UniformEntry::new(tint, [0.0, 1.0, 0.0, 1.0]));
    let plain = ExternalModel::new(vaos[1], 6);
    let unknown_names = ExternalModel::new(vaos[2], 6)
        .with_texture(TextureEntry::new(names.add("unsampled"), special))
        .with_uniform(UniformEntry::new(names.add("notAUniform"), 1.0));
    let mut hidden = ExternalModel::new(vaos[3], 6);
    hidden.enabled = false;

    let mut groups = GroupModels::default();
    groups.insert(names.add("normal"), vec![&green, &plain, &unknown_names, &hidden]);
    renderer.render(WINDOW, ExternalModels::ByGroup(&groups));

    let location = renderer
        .pass(names.add("scene"))
        .and_then(|pass| pass.uniform_location(tint))
        .unwrap();
    let draws = renderer.device().draws();
    assert_eq!(draws.len(), 3);

    assert_eq!(draws[0].texture(0), Some(special));
    assert_eq!(draws[0].uniform(location), Some(UniformValue::Vec4([0.0, 1.0, 0.0, 1.0])));
    for draw in &draws[1..] {
        assert_eq!(draw.texture(0), Some(base));
        assert_eq!(draw.uniform(location), Some(UniformValue::Vec4([1.0; 4])));
    }
}

#[test]
fn external_models_by_pass_reach_only_their_pass() {
    let mut names = NameMap::new();
    let mut renderer = build(&pipeline(), &mut names);
    let vao = renderer.device_mut().allocate_vertex_array();
    let model = ExternalModel::new(vao, 9);

    let mut scene_groups = GroupModels::default();
    scene_groups.insert(names.add("normal"), vec![&model]);
    let mut draw_map = prism::render::PassModels::default();
    draw_map.insert(names.add("post"), scene_groups);

    // "post" does not draw the "normal" group, and "scene" has no entry.
    renderer.render(WINDOW, ExternalModels::ByPass(&draw_map));
    assert!(renderer.device().draws().is_empty());
}

// ============================================================================
// Default Bindings
// ============================================================================

#[test]
fn global_uniform_reaches_passes_with_an_active_location() {
    let mut names = NameMap::new();
    let mut renderer = build(&pipeline(), &mut names);
    let tint = names.add("colorTint");
    let exposure = names.add("exposure");
    let scene = names.add("scene");
    let post = names.add("post");

    assert_eq!(renderer.set_global_uniform(&UniformEntry::new(tint, [0.5; 4])), 1);
    assert_eq!(renderer.set_global_uniform(&UniformEntry::new(exposure, 2.0)), 1);
    assert_eq!(
        renderer.set_global_uniform(&UniformEntry::new(names.add("unused"), 1.0)),
        0
    );

    assert_eq!(
        renderer.get_pass_uniform(scene, tint).map(|u| u.data.to_vec()),
        Some(vec![0.5; 4])
    );
    assert_eq!(
        renderer.get_pass_uniform(post, exposure).map(|u| u.data[0]),
        Some(2.0)
    );

    renderer.remove_global_uniform(tint);
    assert!(renderer.get_pass_uniform(scene, tint).is_none());
}

#[test]
fn pass_uniform_only_touches_one_pass() {
    let mut names = NameMap::new();
    let mut renderer = build(&pipeline(), &mut names);
    let exposure = names.add("exposure");
    let scene = names.add("scene");
    let post = names.add("post");

    renderer.set_pass_uniform(post, &UniformEntry::new(exposure, 3.0));
    renderer.set_pass_uniform(scene, &UniformEntry::new(exposure, 4.0));

    assert_eq!(renderer.get_pass_uniform(post, exposure).map(|u| u.data[0]), Some(3.0));
    assert!(renderer.get_pass_uniform(scene, exposure).is_none());

    let rect = full_screen_rect(&mut renderer);
    let mut groups = GroupModels::default();
    groups.insert(names.add(FULL_SCREEN_RECT_GROUP), vec![&rect]);
    renderer.render(WINDOW, ExternalModels::ByGroup(&groups));

    let location = renderer.pass(post).unwrap().uniform_location(exposure).unwrap();
    assert_eq!(
        renderer.device().draws()[0].uniform(location),
        Some(UniformValue::Float(3.0))
    );

    renderer.remove_pass_uniform(post, exposure);
    assert!(renderer.get_pass_uniform(post, exposure).is_none());
}

#[test]
fn pass_texture_overrides_the_shared_one_locally() {
    let mut names = NameMap::new();
    let mut renderer = build(&pipeline(), &mut names);
    let scene_color_name = names.add("sceneColor");
    let post = names.add("post");
    let replacement = texture(&mut renderer);
    let published = scene_color(&renderer, &names);

    renderer.set_pass_texture(
        post,
        scene_color_name,
        &TextureEntry::new(scene_color_name, replacement),
    );

    assert_eq!(renderer.pass(post).unwrap().default_textures()[0].handle, replacement);
    assert_eq!(scene_color(&renderer, &names), published);

    renderer.remove_pass_texture(post, scene_color_name);
    assert!(renderer.pass(post).unwrap().default_textures().is_empty());
}

#[test]
fn global_texture_removal_clears_defaults() {
    let mut names = NameMap::new();
    let mut renderer = build(&pipeline(), &mut names);
    let diffuse = names.add("diffuseTexture");
    let base = texture(&mut renderer);
    let scene = names.add("scene");

    renderer.set_global_texture(diffuse, &TextureEntry::new(diffuse, base));
    assert_eq!(renderer.pass(scene).unwrap().default_textures().len(), 1);
    assert!(renderer.shared_textures().contains_key(&diffuse));

    renderer.remove_global_texture(diffuse);
    assert!(renderer.pass(scene).unwrap().default_textures().is_empty());
    assert!(!renderer.shared_textures().contains_key(&diffuse));
}

// ============================================================================
// Shader Cache
// ============================================================================

#[test]
fn identical_shaders_compile_once() {
    let mut list = pipeline();
    let mut copy = list.passes[0].clone();
    copy.name = "scene copy".to_owned();
    copy.render_targets.clear();
    list.passes.push(copy);

    let mut names = NameMap::new();
    let renderer = build(&list, &mut names);

    assert_eq!(renderer.passes().len(), 3);
    assert_eq!(renderer.shader_count(), 4);
    assert_eq!(renderer.device().call_count("compile_shader"), 4);
}

#[test]
fn defines_key_the_cache_and_reach_the_source() {
    let mut list = pipeline();
    list.settings.global_defines.insert("_SHADOWS_".to_owned());
    let mut variant = list.passes[0].clone();
    variant.name = "alpha tested".to_owned();
    variant.render_targets.clear();
    variant.fragment_shader_defines.insert("_ALPHATEST_".to_owned());
    list.passes.push(variant);

    let mut names = NameMap::new();
    let renderer = build(&list, &mut names);

    assert_eq!(renderer.shader_count(), 5);
    let shader = renderer.shader("scene.frag _ALPHATEST_").unwrap();
    assert!(shader.defines.contains("_ALPHATEST_"));
    assert!(shader.defines.contains("_SHADOWS_"));

    let source = renderer.device().shader_source_text(shader.handle).unwrap();
    assert!(source.starts_with("#version 330\n#define _ALPHATEST_\n#define _SHADOWS_\n"));
}

// ============================================================================
// Configuration Errors
// ============================================================================

#[test]
fn unknown_state_name_fails_and_rolls_back() {
    let mut list = pipeline();
    list.passes[1].state_enable.push("GL_DEPTH_TESTING".to_owned());

    let mut names = NameMap::new();
    let mut renderer = Renderer::new(HeadlessDevice::new(), list.settings.clone());
    let error = renderer
        .initialize(&list.passes, &mut names, &mut loader(), WINDOW)
        .unwrap_err();

    match error {
        PrismError::PassInit { pass, source } => {
            assert_eq!(pass, "post");
            assert!(matches!(
                *source,
                PrismError::UnknownEnum { ref name, .. } if name == "GL_DEPTH_TESTING"
            ));
        }
        other => panic!("expected a pass error, got {other:?}"),
    }

    assert!(renderer.passes().is_empty());
    assert_eq!(renderer.shader_count(), 0);
    let device = renderer.device();
    assert_eq!(device.live_programs(), 0);
    assert_eq!(device.live_shaders(), 0);
    assert_eq!(device.live_textures(), 0);
    assert_eq!(device.live_framebuffers(), 0);
    assert_eq!(device.live_renderbuffers(), 0);
    assert_eq!(device.live_samplers(), 0);
    assert_eq!(device.live_queries(), 0);
}

#[test]
fn two_depth_attachments_are_rejected() {
    let mut list = pipeline();
    let targets = &mut list.passes[0].render_targets;
    for (attachment, format) in [
        ("GL_DEPTH_ATTACHMENT", "GL_DEPTH_COMPONENT24"),
        ("GL_DEPTH_STENCIL_ATTACHMENT", "GL_DEPTH24_STENCIL8"),
    ] {
        let mut depth = targets["GL_COLOR_ATTACHMENT0"].clone();
        depth.name = format!("{attachment} target");
        depth.format = format.to_owned();
        targets.insert(attachment.to_owned(), depth);
    }

    let mut names = NameMap::new();
    let mut renderer = Renderer::new(HeadlessDevice::new(), list.settings.clone());
    let error = renderer
        .initialize(&list.passes, &mut names, &mut loader(), WINDOW)
        .unwrap_err();

    assert!(matches!(
        error,
        PrismError::PassInit { ref source, .. }
            if matches!(**source, PrismError::MultipleDepthAttachments(2))
    ));
}

#[test]
fn missing_shader_source_is_reported_by_path() {
    let mut list = pipeline();
    list.settings.shader_path = "shaders".to_owned();

    let mut names = NameMap::new();
    let mut renderer = Renderer::new(HeadlessDevice::new(), list.settings.clone());
    let error = renderer
        .initialize(&list.passes, &mut names, &mut loader(), WINDOW)
        .unwrap_err();

    let expected = std::path::Path::new("shaders").join("scene.vert");
    assert!(matches!(
        error,
        PrismError::ShaderSourceMissing(ref path) if *path == expected.display().to_string()
    ));
}

#[test]
fn shader_compile_error_keeps_the_compiler_log() {
    let mut loader = loader();
    loader.insert("post.frag", "#version 330\n#error post effects unsupported\n");

    let list = pipeline();
    let mut names = NameMap::new();
    let mut renderer = Renderer::new(HeadlessDevice::new(), list.settings.clone());
    let error = renderer
        .initialize(&list.passes, &mut names, &mut loader, WINDOW)
        .unwrap_err();

    match error {
        PrismError::ShaderCompile { name, log } => {
            assert_eq!(name, "post.frag");
            assert!(log.contains("post effects unsupported"));
        }
        other => panic!("expected a compile error, got {other:?}"),
    }
    assert_eq!(renderer.device().live_textures(), 0);
}

#[test]
fn texture_units_are_limited_by_the_device() {
    let mut list = pipeline();
    for index in 0..3 {
        list.passes[1]
            .samplers
            .insert(format!("extra{index}"), Default::default());
    }
    let device = HeadlessDevice::with_limits(prism::render::device::DeviceLimits {
        max_texture_image_units: 2,
        ..Default::default()
    });

    let mut names = NameMap::new();
    let mut renderer = Renderer::new(device, list.settings.clone());
    let error = renderer
        .initialize(&list.passes, &mut names, &mut loader(), WINDOW)
        .unwrap_err();

    assert!(matches!(
        error,
        PrismError::PassInit { ref source, .. }
            if matches!(**source, PrismError::TextureUnitsExceeded(2))
    ));
}

#[test]
fn reinitialize_replaces_previous_passes() {
    let mut names = NameMap::new();
    let mut renderer = build(&pipeline(), &mut names);
    let vao = renderer.device_mut().allocate_vertex_array();
    renderer.add_model(ModelEntry::new(names.add("normal"), vao, 36));

    let mut list = pipeline();
    list.passes.truncate(1);
    renderer
        .initialize(&list.passes, &mut names, &mut loader(), WINDOW)
        .unwrap();

    assert_eq!(renderer.passes().len(), 1);
    assert_eq!(renderer.model_count(), 0);
    assert_eq!(renderer.device().live_programs(), 1);
    assert_eq!(renderer.device().live_textures(), 1);
}

// ============================================================================
// Status & Profiling
// ============================================================================

#[test]
fn status_report_lists_passes_and_targets() {
    let mut names = NameMap::new();
    let mut renderer = build(&pipeline(), &mut names);
    let vao = renderer.device_mut().allocate_vertex_array();
    renderer.add_model(ModelEntry::new(names.add("normal"), vao, 36));

    let brief = renderer.renderer_status(StatusVerbosity::PassBrief, &names);
    assert!(brief.starts_with("Renderer status\n---------------\nModel count: 1\n"));
    assert!(brief.contains("Shaders: post.frag, post.vert, scene.frag, scene.vert\n"));
    assert!(brief.contains("Passes: 2\nPass \"scene\"\n   Draw groups: normal\n"));
    assert!(brief.contains("   Clear mask: GL_COLOR_BUFFER_BIT GL_DEPTH_BUFFER_BIT\n"));
    assert!(brief.contains("   Render dimensions: 512x512\n"));
    assert!(brief.contains("   Created render targets: 1\n      sceneColor: handle "));
    assert!(brief.contains("   Framebuffer object: default\n"));
    assert!(brief.contains("   Using depth renderbuffer: yes\n"));
    assert!(!brief.contains("Enabled states"));
    assert!(!brief.contains("Models: "));

    let detailed = renderer.renderer_status(StatusVerbosity::ModelsTexturesUniforms, &names);
    assert!(detailed.contains("Enabled states: GL_DEPTH_TEST"));
    assert!(detailed.contains("Global textures: 1\n   sceneColor, handle "));
    assert!(detailed.contains("Models: 1\n"));
}

#[test]
fn profiling_reports_previous_frame_times() {
    let mut names = NameMap::new();
    let mut renderer = build(&pipeline(), &mut names);
    let vao = renderer.device_mut().allocate_vertex_array();
    renderer.add_model(ModelEntry::new(names.add("normal"), vao, 36));
    let scene = names.add("scene");

    assert!(renderer.pass(scene).unwrap().last_time() < 0.0);
    renderer.render(WINDOW, ExternalModels::None);
    assert_eq!(renderer.pass(scene).unwrap().last_time(), 0.0);
    renderer.render(WINDOW, ExternalModels::None);

    // One draw inside the timer query: 5 us base plus 25 us per draw.
    let seconds = renderer.pass(scene).unwrap().last_time();
    assert!((seconds - 30e-6).abs() < 1e-12);

    let mut report = String::new();
    renderer.print_profiling_info(&mut report).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("scene: ") && lines[0].ends_with(" us"));
    assert!(lines[1].starts_with("post: "));
}

#[test]
fn held_query_results_read_as_zero_without_waiting() {
    let mut list = pipeline();
    list.settings.wait_on_timer_query = false;
    let mut names = NameMap::new();
    let mut renderer = build(&list, &mut names);
    renderer.device_mut().hold_query_results(true);

    renderer.render(WINDOW, ExternalModels::None);
    renderer.render(WINDOW, ExternalModels::None);

    assert_eq!(renderer.pass(names.add("scene")).unwrap().last_time(), 0.0);
}
