//! Headless Frame
//!
//! Builds a two-pass pipeline (scene into an offscreen target, then a
//! full-screen post pass sampling it) on the recording device, fills a scene
//! with a grid of static boxes and one dynamic marker, and renders a few
//! culled frames. The last frame resizes the window so the scene target is
//! rebuilt and republished.
//!
//! Run with `RUST_LOG=debug` to see every pass rebuild.

use glam::{Mat4, Vec3};
use prism::prelude::*;
use prism::render::cull::FULL_SCREEN_RECT_GROUP;
use wgpu::PrimitiveTopology;

const PIPELINE: &str = r#"
[settings]
global_defines = ["_HEADLESS_"]

[[pass]]
name = "scene"
draw_groups = ["opaque"]
vertex_shader = "scene.vert"
fragment_shader = "scene.frag"
clear_color = true
clear_depth = true
clear_color_value = [0.05, 0.05, 0.08, 1.0]
state_enable = ["GL_DEPTH_TEST", "GL_CULL_FACE"]

[pass.user_defined_fields]
camera = "main"

[pass.state_enum.GL_DEPTH_FUNC]
type = "enum"
enum_data = "GL_LEQUAL"

[pass.uniforms.viewMatrix]
[pass.uniforms.projectionMatrix]
[pass.uniforms.tint]
data = [1.0, 1.0, 1.0, 1.0]

[pass.render_targets.GL_COLOR_ATTACHMENT0]
name = "sceneColor"
variable = "colorOut"
format = "GL_RGBA8"

[pass.render_targets.GL_DEPTH_ATTACHMENT]
name = "sceneDepth"
format = "GL_DEPTH_COMPONENT24"

[[pass]]
name = "post"
draw_groups = ["full screen rect"]
vertex_shader = "post.vert"
fragment_shader = "post.frag"

[pass.uniforms.exposure]
data = [1.2]

[pass.samplers.sceneSampler]
texture_name = "sceneColor"
"#;

const SCENE_VERT: &str = "#version 330
uniform mat4 viewMatrix;
uniform mat4 projectionMatrix;
void main() {}
";
const SCENE_FRAG: &str = "#version 330
uniform vec4 tint;
out vec4 colorOut;
void main() {}
";
const POST_VERT: &str = "#version 330
void main() {}
";
const POST_FRAG: &str = "#version 330
uniform sampler2D sceneSampler;
uniform float exposure;
void main() {}
";

const GRID: i32 = 12;

fn main() -> anyhow::Result<()> {
    init_logging(&LoggingConfig::default());

    let list = PassList::from_toml_str(PIPELINE)?;
    let mut loader = MemoryShaderLoader::new()
        .with_source("scene.vert", SCENE_VERT)
        .with_source("scene.frag", SCENE_FRAG)
        .with_source("post.vert", POST_VERT)
        .with_source("post.frag", POST_FRAG);

    let mut window = (1280, 720);
    let mut names = NameMap::new();
    let mut renderer = Renderer::new(HeadlessDevice::new(), list.settings.clone());
    renderer.initialize(&list.passes, &mut names, &mut loader, window)?;

    let eye = Vec3::new(0.0, 4.0, 30.0);
    let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
    let projection = Mat4::perspective_rh_gl(
        50f32.to_radians(),
        window.0 as f32 / window.1 as f32,
        0.1,
        60.0,
    );
    renderer.set_global_uniform(&UniformEntry::new(names.add("viewMatrix"), view));
    renderer.set_global_uniform(&UniformEntry::new(names.add("projectionMatrix"), projection));

    let scene = build_scene(&mut renderer, &mut names);
    let mut assembler = DrawListAssembler::new(CullSettings {
        contribution_culling: true,
        ..CullSettings::default()
    });

    for frame in 0..4 {
        if frame == 3 {
            window = (1920, 1080);
        }
        renderer.device_mut().clear_draws();

        let frame_view = FrameView {
            camera_position: eye,
            resolution_y: window.1 as f32,
        };
        let draw_map = assembler.assemble(&renderer, &scene, &names, frame_view);
        renderer.render(window, ExternalModels::ByPass(&draw_map));

        let stats = assembler.stats();
        log::info!(
            "Frame {frame} at {}x{}: {} draw(s), {} static candidate(s), {} contribution-culled",
            window.0,
            window.1,
            renderer.device().draws().len(),
            stats.static_candidates,
            stats.contribution_culled
        );
    }

    log::info!(
        "\n{}",
        renderer.renderer_status(StatusVerbosity::PassDetail, &names)
    );

    let mut profile = String::new();
    renderer.print_profiling_info(&mut profile)?;
    log::info!("GPU time per pass:\n{profile}");

    renderer.clear();
    Ok(())
}

/// A grid of static boxes spread along the view axis, a dynamic marker, and
/// the full-screen rectangle for the post pass.
fn build_scene(renderer: &mut Renderer<HeadlessDevice>, names: &mut NameMap) -> SceneDrawables {
    let opaque = names.add("opaque");
    let tint = names.add("tint");
    let mut scene = SceneDrawables::new();

    for x in -GRID..GRID {
        for z in -GRID..GRID {
            let vao = renderer.device_mut().allocate_vertex_array();
            let center = Vec3::new(x as f32 * 4.0, 0.0, z as f32 * 8.0);
            let mut model = ExternalModel::new(vao, 36);
            if (x + z) % 5 == 0 {
                model = model.with_uniform(UniformEntry::new(tint, [1.0, 0.4, 0.2, 1.0]));
            }
            scene.add_static(opaque, Drawable::new(model, BoundingBox::from_sphere(center, 0.75)));
        }
    }

    let marker_vao = renderer.device_mut().allocate_vertex_array();
    scene.add_dynamic(
        opaque,
        Drawable::new(
            ExternalModel::new(marker_vao, 12),
            BoundingBox::from_sphere(Vec3::new(0.0, 2.0, 0.0), 0.5),
        )
        .with_draw_order(-1.0),
    );

    let rect_vao = renderer.device_mut().allocate_vertex_array();
    scene.set_full_screen_rect(ExternalModel::custom(move |gl| {
        gl.bind_vertex_array(Some(rect_vao));
        gl.draw_arrays(PrimitiveTopology::TriangleStrip, 0, 4);
    }));
    names.add(FULL_SCREEN_RECT_GROUP);

    scene.optimize();
    scene
}
