//! Culling and Draw-List Assembly Tests
//!
//! Tests for:
//! - Frustum sphere culling at and beyond a plane
//! - Contribution (screen-size) culling threshold
//! - Draw-list assembly from pass uniforms (viewMatrix / projectionMatrix)
//! - Dynamic drawables bypassing culling
//! - Camera/group list sharing between passes
//! - Full-screen rect injection
//! - Assembled lists reaching the device

use std::collections::BTreeMap;
use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Vec3};

use prism::core::math::ContributionCuller;
use prism::prelude::*;
use prism::render::config::UniformConfig;
use prism::render::cull::FULL_SCREEN_RECT_GROUP;

const VERTEX: &str = "#version 330
uniform mat4 viewMatrix;
uniform mat4 projectionMatrix;
void main() {}
";
const FRAGMENT: &str = "#version 330\nvoid main() {}\n";

fn ortho() -> Mat4 {
    Mat4::orthographic_rh_gl(-1.0, 1.0, -1.0, 1.0, 0.1, 10.0)
}

fn ortho_frustum() -> Frustum {
    Frustum::from_view_projection(ortho(), Mat4::IDENTITY)
}

fn loader() -> MemoryShaderLoader {
    MemoryShaderLoader::new()
        .with_source("scene.vert", VERTEX)
        .with_source("scene.frag", FRAGMENT)
}

fn pass(name: &str, camera: &str, groups: &[&str], with_matrices: bool) -> PassConfig {
    let mut uniforms = BTreeMap::new();
    if with_matrices {
        uniforms.insert(
            "viewMatrix".to_owned(),
            UniformConfig {
                data: Mat4::IDENTITY.to_cols_array().to_vec(),
            },
        );
        uniforms.insert(
            "projectionMatrix".to_owned(),
            UniformConfig {
                data: ortho().to_cols_array().to_vec(),
            },
        );
    }
    PassConfig {
        name: name.to_owned(),
        draw_groups: groups.iter().map(|group| (*group).to_owned()).collect(),
        user_defined_fields: BTreeMap::from([("camera".to_owned(), camera.to_owned())]),
        vertex_shader: "scene.vert".to_owned(),
        fragment_shader: "scene.frag".to_owned(),
        uniforms,
        ..PassConfig::default()
    }
}

fn renderer(passes: &[PassConfig], names: &mut NameMap) -> Renderer<HeadlessDevice> {
    let mut renderer = Renderer::new(HeadlessDevice::new(), RendererSettings::default());
    renderer
        .initialize(passes, names, &mut loader(), (640, 480))
        .unwrap();
    renderer
}

fn drawable(renderer: &mut Renderer<HeadlessDevice>, center: Vec3, radius: f32) -> Drawable {
    let vao = renderer.device_mut().allocate_vertex_array();
    Drawable::new(
        ExternalModel::new(vao, 36),
        BoundingBox::from_sphere(center, radius),
    )
}

fn view() -> FrameView {
    FrameView {
        camera_position: Vec3::ZERO,
        resolution_y: 1000.0,
    }
}

// ============================================================================
// Frustum Sphere Tests
// ============================================================================

#[test]
fn sphere_beyond_a_plane_is_culled() {
    let frustum = ortho_frustum();

    // Right plane is x = 1; this sphere ends at x = 2.
    assert!(frustum.cull_sphere(Vec3::new(3.0, 0.0, -5.0), 1.0));
    assert!(frustum.cull_sphere_squared(Vec3::new(3.0, 0.0, -5.0), 1.0));
}

#[test]
fn sphere_touching_a_plane_is_kept() {
    let frustum = ortho_frustum();

    // Distance to the right plane equals the radius.
    assert!(!frustum.cull_sphere(Vec3::new(3.0, 0.0, -5.0), 2.0));
    assert!(!frustum.cull_sphere_squared(Vec3::new(3.0, 0.0, -5.0), 4.0));
}

#[test]
fn sphere_behind_the_camera_is_culled() {
    let frustum = ortho_frustum();

    assert!(frustum.cull_sphere(Vec3::new(0.0, 0.0, 5.0), 1.0));
    assert!(!frustum.cull_sphere(Vec3::new(0.0, 0.0, -5.0), 0.1));
}

#[test]
fn box_culling_uses_the_support_corner() {
    let frustum = ortho_frustum();
    let straddling = BoundingBox::new(Vec3::new(0.5, -0.1, -5.1), Vec3::new(3.0, 0.1, -4.9));
    let outside = BoundingBox::new(Vec3::new(1.5, -0.1, -5.1), Vec3::new(3.0, 0.1, -4.9));

    assert!(frustum.intersects_box(&straddling));
    assert!(frustum.cull_box(&outside));
}

// ============================================================================
// Contribution Culling
// ============================================================================

#[test]
fn contribution_threshold_separates_small_and_large_objects() {
    // min_angle = 2 * (pi / 2) / 1000, threshold = min_angle^2 / 4 ≈ 2.47e-6
    let culler = ContributionCuller::new(Vec3::ZERO, 1000.0, FRAC_PI_2, 2.0);
    let center = Vec3::new(0.0, 0.0, -100.0);

    // d^2 * threshold ≈ 0.0247
    assert!(culler.cull(center, 0.1));
    assert!(!culler.cull(center, 0.2));
    assert!(!culler.cull_squared(center, 0.04));
}

#[test]
fn contribution_scales_with_resolution() {
    let center = Vec3::new(0.0, 0.0, -100.0);
    let low = ContributionCuller::new(Vec3::ZERO, 250.0, FRAC_PI_2, 2.0);
    let high = ContributionCuller::new(Vec3::ZERO, 4000.0, FRAC_PI_2, 2.0);

    // The same object covers more pixels on a taller screen.
    assert!(low.cull(center, 0.2));
    assert!(!high.cull(center, 0.2));
}

// ============================================================================
// Draw-List Assembly
// ============================================================================

#[test]
fn static_drawables_are_frustum_culled_and_dynamic_ones_kept() {
    let mut names = NameMap::new();
    let mut renderer = renderer(&[pass("scene", "main", &["normal"], true)], &mut names);
    let group = names.add("normal");
    let pass_id = names.add("scene");

    let mut scene = SceneDrawables::new();
    let visible = drawable(&mut renderer, Vec3::new(0.0, 0.0, -5.0), 0.5);
    let hidden = drawable(&mut renderer, Vec3::new(8.0, 0.0, -5.0), 0.5);
    let far_dynamic = drawable(&mut renderer, Vec3::new(-50.0, 0.0, -5.0), 0.5);
    let visible_key = scene.add_static(group, visible);
    scene.add_static(group, hidden);
    let dynamic_key = scene.add_dynamic(group, far_dynamic);
    scene.optimize();

    let mut assembler = DrawListAssembler::new(CullSettings::default());
    let draw_map = assembler.assemble(&renderer, &scene, &names, view());

    let list = &draw_map[&pass_id][&group];
    assert_eq!(list.len(), 2);
    assert!(std::ptr::eq(list[0], &scene.get(dynamic_key).unwrap().model));
    assert!(std::ptr::eq(list[1], &scene.get(visible_key).unwrap().model));

    let stats = assembler.stats();
    assert_eq!(stats.dynamic, 1);
    assert_eq!(stats.static_candidates, 1);
    assert_eq!(stats.lists, 1);
}

#[test]
fn pass_without_matrices_draws_every_static_drawable() {
    let mut names = NameMap::new();
    let mut renderer = renderer(&[pass("overlay", "", &["normal"], false)], &mut names);
    let group = names.add("normal");
    let pass_id = names.add("overlay");

    let mut scene = SceneDrawables::new();
    for x in [0.0, 8.0, 500.0] {
        let drawable = drawable(&mut renderer, Vec3::new(x, 0.0, -5.0), 0.5);
        scene.add_static(group, drawable);
    }
    scene.optimize();

    let mut assembler = DrawListAssembler::default();
    let draw_map = assembler.assemble(&renderer, &scene, &names, view());

    assert_eq!(draw_map[&pass_id][&group].len(), 3);
}

#[test]
fn contribution_culling_only_applies_when_enabled() {
    let mut names = NameMap::new();
    let mut renderer = renderer(&[pass("scene", "main", &["normal"], true)], &mut names);
    let group = names.add("normal");
    let pass_id = names.add("scene");

    let mut scene = SceneDrawables::new();
    let speck = drawable(&mut renderer, Vec3::new(0.0, 0.0, -5.0), 0.0001);
    let crate_box = drawable(&mut renderer, Vec3::new(0.2, 0.0, -5.0), 0.5);
    scene.add_static(group, speck);
    scene.add_static(group, crate_box);
    scene.optimize();

    let mut assembler = DrawListAssembler::default();
    let draw_map = assembler.assemble(&renderer, &scene, &names, view());
    assert_eq!(draw_map[&pass_id][&group].len(), 2);

    assembler.set_settings(CullSettings {
        contribution_culling: true,
        ..CullSettings::default()
    });
    let draw_map = assembler.assemble(&renderer, &scene, &names, view());
    assert_eq!(draw_map[&pass_id][&group].len(), 1);
    assert_eq!(assembler.stats().contribution_culled, 1);
}

#[test]
fn passes_sharing_a_camera_share_group_lists() {
    let mut names = NameMap::new();
    let mut renderer = renderer(
        &[
            pass("opaque", "main", &["normal"], true),
            pass("outline", "main", &["normal"], true),
            pass("reflection", "mirror", &["normal"], true),
        ],
        &mut names,
    );
    let group = names.add("normal");

    let mut scene = SceneDrawables::new();
    let drawable = drawable(&mut renderer, Vec3::new(0.0, 0.0, -5.0), 0.5);
    scene.add_static(group, drawable);
    scene.optimize();

    let mut assembler = DrawListAssembler::default();
    let draw_map = assembler.assemble(&renderer, &scene, &names, view());

    assert_eq!(draw_map.len(), 3);
    assert_eq!(assembler.stats().lists, 2);
    let opaque = &draw_map[&names.add("opaque")][&group];
    let outline = &draw_map[&names.add("outline")][&group];
    assert!(std::ptr::eq(opaque[0], outline[0]));
}

#[test]
fn disabled_passes_get_no_lists() {
    let mut names = NameMap::new();
    let mut renderer = renderer(
        &[
            pass("scene", "main", &["normal"], true),
            pass("debug", "debug", &["normal"], false),
        ],
        &mut names,
    );
    let debug = names.add("debug");
    renderer.set_pass_enabled(debug, false);

    let scene = SceneDrawables::new();
    let mut assembler = DrawListAssembler::default();
    let draw_map = assembler.assemble(&renderer, &scene, &names, view());

    assert!(draw_map.contains_key(&names.add("scene")));
    assert!(!draw_map.contains_key(&debug));
}

#[test]
fn full_screen_rect_joins_its_group() {
    let mut names = NameMap::new();
    let mut renderer = renderer(
        &[pass("post", "", &[FULL_SCREEN_RECT_GROUP], false)],
        &mut names,
    );
    let group = names.add(FULL_SCREEN_RECT_GROUP);

    let vao = renderer.device_mut().allocate_vertex_array();
    let mut scene = SceneDrawables::new();
    scene.set_full_screen_rect(ExternalModel::new(vao, 6));

    let mut assembler = DrawListAssembler::default();
    let draw_map = assembler.assemble(&renderer, &scene, &names, view());

    let list = &draw_map[&names.add("post")][&group];
    assert_eq!(list.len(), 1);
    assert!(std::ptr::eq(list[0], scene.full_screen_rect().unwrap()));
}

#[test]
fn assembled_lists_are_drawn() {
    let mut names = NameMap::new();
    let mut renderer = renderer(&[pass("scene", "main", &["normal"], true)], &mut names);
    let group = names.add("normal");

    let mut scene = SceneDrawables::new();
    for x in [-0.5, 0.5, 9.0] {
        let drawable = drawable(&mut renderer, Vec3::new(x, 0.0, -5.0), 0.25);
        scene.add_static(group, drawable);
    }
    scene.optimize();

    let mut assembler = DrawListAssembler::default();
    let draw_map = assembler.assemble(&renderer, &scene, &names, view());
    renderer.device_mut().clear_draws();
    renderer.render((640, 480), ExternalModels::ByPass(&draw_map));

    let draws = renderer.device().draws();
    assert_eq!(draws.len(), 2);
    assert!(draws.iter().all(|draw| draw.count == 36));
}
