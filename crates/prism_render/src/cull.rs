//! Draw-List Assembly
//!
//! Turns the scene's drawables into the per-pass external model map that
//! [`Renderer::render`] consumes, culling static geometry on the way.
//!
//! # Overview
//!
//! ```text
//!   SceneDrawables                       DrawListAssembler::assemble
//!   ├─ static:  group ─► AabbTree   ──►  frustum query ─► contribution cull ─┐
//!   ├─ dynamic: group ─► [drawable] ──►  (never culled, sorted by order) ────┼─► PassModels
//!   └─ full screen rect              ──►  (only for its own draw group) ──────┘
//! ```
//!
//! Passes sharing a camera and a draw group share one culled list: lists
//! are keyed by `"camera/group"`, where the camera is the pass's `camera`
//! user-defined field (empty when absent). The frustum is built from the
//! pass's `viewMatrix` and `projectionMatrix` default uniforms. A pass
//! missing either one draws everything in its groups unculled.
//!
//! Dynamic drawables are always visible. Their bounds are not guaranteed to
//! be in the camera's space, so they bypass frustum and contribution tests.

use std::cmp::Ordering;

use glam::Vec3;
use prism_core::math::contribution::{DEFAULT_FOV_Y, DEFAULT_MIN_PIXELS};
use prism_core::math::{ContributionCuller, IntersectAlways};
use prism_core::{AabbTree, BoundingBox, Frustum, NameId, NameMap};
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

use crate::device::GpuDevice;
use crate::model::{ExternalModel, GroupModels, PassModels};
use crate::renderer::Renderer;

/// Leaf capacity of the per-group static trees.
pub const STATIC_OBJECTS_PER_NODE: usize = 64;

/// Draw group that receives the full-screen rectangle.
pub const FULL_SCREEN_RECT_GROUP: &str = "full screen rect";

const VIEW_MATRIX: &str = "viewMatrix";
const PROJECTION_MATRIX: &str = "projectionMatrix";
const CAMERA_FIELD: &str = "camera";

new_key_type! {
    /// Handle of a drawable stored in [`SceneDrawables`].
    pub struct DrawableKey;
}

/// A model with world-space bounds and a draw order.
#[derive(Debug, Clone)]
pub struct Drawable {
    pub model: ExternalModel,
    pub bounds: BoundingBox,
    /// Dynamic drawables of a group are drawn in ascending order.
    pub draw_order: f32,
}

impl Drawable {
    #[must_use]
    pub fn new(model: ExternalModel, bounds: BoundingBox) -> Self {
        Self {
            model,
            bounds,
            draw_order: 0.0,
        }
    }

    #[must_use]
    pub fn with_draw_order(mut self, draw_order: f32) -> Self {
        self.draw_order = draw_order;
        self
    }

    #[inline]
    #[must_use]
    pub fn center(&self) -> Vec3 {
        self.bounds.center()
    }

    #[inline]
    #[must_use]
    pub fn radius(&self) -> f32 {
        self.bounds.radius()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Static(NameId),
    Dynamic(NameId),
}

// ============================================================================
// Scene Storage
// ============================================================================

/// Drawables grouped by draw group, static ones in spatial trees.
#[derive(Debug, Default)]
pub struct SceneDrawables {
    drawables: SlotMap<DrawableKey, (Drawable, Placement)>,
    static_groups: FxHashMap<NameId, AabbTree<DrawableKey>>,
    dynamic_groups: FxHashMap<NameId, Vec<DrawableKey>>,
    full_screen_rect: Option<ExternalModel>,
    /// Set when static drawables were added since the last optimize.
    needs_optimize: bool,
}

impl SceneDrawables {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds static geometry. It becomes part of the tree hierarchy on the
    /// next [`optimize`](Self::optimize); until then it is still found.
    pub fn add_static(&mut self, group: NameId, drawable: Drawable) -> DrawableKey {
        let bounds = drawable.bounds;
        let key = self.drawables.insert((drawable, Placement::Static(group)));
        self.static_groups
            .entry(group)
            .or_insert_with(|| AabbTree::with_ideal_objects_per_node(STATIC_OBJECTS_PER_NODE))
            .add(key, bounds);
        self.needs_optimize = true;
        key
    }

    pub fn add_dynamic(&mut self, group: NameId, drawable: Drawable) -> DrawableKey {
        let key = self.drawables.insert((drawable, Placement::Dynamic(group)));
        self.dynamic_groups.entry(group).or_default().push(key);
        key
    }

    /// Removes a drawable. Returns it, or `None` for a stale key.
    pub fn remove(&mut self, key: DrawableKey) -> Option<Drawable> {
        let (drawable, placement) = self.drawables.remove(key)?;
        match placement {
            Placement::Static(group) => {
                if let Some(tree) = self.static_groups.get_mut(&group) {
                    tree.remove(&key, &drawable.bounds);
                }
            }
            Placement::Dynamic(group) => {
                if let Some(list) = self.dynamic_groups.get_mut(&group) {
                    list.retain(|other| *other != key);
                }
            }
        }
        Some(drawable)
    }

    #[must_use]
    pub fn get(&self, key: DrawableKey) -> Option<&Drawable> {
        self.drawables.get(key).map(|(drawable, _)| drawable)
    }

    /// Mutable access for per-frame updates of model overrides.
    ///
    /// Moving a static drawable requires removing and re-adding it.
    pub fn get_mut(&mut self, key: DrawableKey) -> Option<&mut Drawable> {
        self.drawables.get_mut(key).map(|(drawable, _)| drawable)
    }

    /// Rebuilds the static trees.
    pub fn optimize(&mut self) {
        for tree in self.static_groups.values_mut() {
            tree.optimize();
        }
        self.needs_optimize = false;
    }

    #[must_use]
    pub fn needs_optimize(&self) -> bool {
        self.needs_optimize
    }

    /// The model fed to the [`FULL_SCREEN_RECT_GROUP`] draw group.
    pub fn set_full_screen_rect(&mut self, model: ExternalModel) {
        self.full_screen_rect = Some(model);
    }

    #[must_use]
    pub fn full_screen_rect(&self) -> Option<&ExternalModel> {
        self.full_screen_rect.as_ref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.drawables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drawables.is_empty()
    }

    #[must_use]
    pub fn static_tree(&self, group: NameId) -> Option<&AabbTree<DrawableKey>> {
        self.static_groups.get(&group)
    }

    /// Removes every drawable, including the full-screen rect.
    pub fn clear(&mut self) {
        self.drawables.clear();
        self.static_groups.clear();
        self.dynamic_groups.clear();
        self.full_screen_rect = None;
        self.needs_optimize = false;
    }
}

// ============================================================================
// Assembly
// ============================================================================

/// Culling options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CullSettings {
    /// Reject static objects smaller than `min_pixels` on screen.
    pub contribution_culling: bool,
    /// Vertical field of view in radians used by the contribution test.
    pub fov_y: f32,
    pub min_pixels: f32,
}

impl Default for CullSettings {
    fn default() -> Self {
        Self {
            contribution_culling: false,
            fov_y: DEFAULT_FOV_Y,
            min_pixels: DEFAULT_MIN_PIXELS,
        }
    }
}

/// Per-frame view information.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameView {
    /// World-space eye position for the contribution test.
    pub camera_position: Vec3,
    /// Vertical resolution in pixels.
    pub resolution_y: f32,
}

/// Counters from the last [`DrawListAssembler::assemble`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CullStats {
    /// Distinct camera/group lists built.
    pub lists: usize,
    /// Static objects returned by tree queries.
    pub static_candidates: usize,
    pub contribution_culled: usize,
    pub dynamic: usize,
}

/// Builds the pass → draw group → model map for a frame.
#[derive(Debug, Default)]
pub struct DrawListAssembler {
    settings: CullSettings,
    query_results: Vec<DrawableKey>,
    stats: CullStats,
}

impl DrawListAssembler {
    #[must_use]
    pub fn new(settings: CullSettings) -> Self {
        Self {
            settings,
            query_results: Vec::new(),
            stats: CullStats::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &CullSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: CullSettings) {
        self.settings = settings;
    }

    #[inline]
    #[must_use]
    pub fn stats(&self) -> CullStats {
        self.stats
    }

    /// Assembles the draw map for every enabled pass of `renderer`.
    ///
    /// Dynamic drawables are never culled.
    pub fn assemble<'s, D: GpuDevice>(
        &mut self,
        renderer: &Renderer<D>,
        scene: &'s SceneDrawables,
        names: &NameMap,
        view: FrameView,
    ) -> PassModels<'s> {
        if scene.needs_optimize() {
            log::debug!("Static drawables were added without optimize(); trees are unbalanced");
        }
        self.stats = CullStats::default();

        let culler = ContributionCuller::new(
            view.camera_position,
            view.resolution_y,
            self.settings.fov_y,
            self.settings.min_pixels,
        );
        let full_screen_group = names.id_of(FULL_SCREEN_RECT_GROUP);

        let mut lists: FxHashMap<String, Vec<&'s ExternalModel>> = FxHashMap::default();
        let mut draw_map = PassModels::default();

        for pass in renderer.pass_names() {
            if !renderer.pass_enabled(pass) {
                continue;
            }
            let camera = renderer
                .user_defined_fields(pass)
                .get(CAMERA_FIELD)
                .map_or("", String::as_str);
            let frustum = Self::pass_frustum(renderer, names, pass);

            let mut groups = GroupModels::default();
            for &group in renderer.draw_groups(pass) {
                let key = format!("{camera}/{}", names.display(group));
                if !lists.contains_key(&key) {
                    let mut list = Vec::new();
                    self.collect_group(scene, group, frustum.as_ref(), &culler, &mut list);
                    if Some(group) == full_screen_group
                        && let Some(rect) = scene.full_screen_rect()
                    {
                        list.push(rect);
                    }
                    self.stats.lists += 1;
                    lists.insert(key.clone(), list);
                }
                if let Some(list) = lists.get(&key) {
                    groups.insert(group, list.clone());
                }
            }
            draw_map.insert(pass, groups);
        }

        log::trace!("Draw list assembly: {:?}", self.stats);
        draw_map
    }

    fn pass_frustum<D: GpuDevice>(
        renderer: &Renderer<D>,
        names: &NameMap,
        pass: NameId,
    ) -> Option<Frustum> {
        let matrix = |name: &str| -> Option<[f32; 16]> {
            let uniform = renderer.get_pass_uniform(pass, names.id_of(name)?)?;
            uniform.data.as_slice().try_into().ok()
        };
        let view = matrix(VIEW_MATRIX)?;
        let projection = matrix(PROJECTION_MATRIX)?;
        Some(Frustum::from_uniform_matrices(&projection, &view))
    }

    fn collect_group<'s>(
        &mut self,
        scene: &'s SceneDrawables,
        group: NameId,
        frustum: Option<&Frustum>,
        culler: &ContributionCuller,
        out: &mut Vec<&'s ExternalModel>,
    ) {
        if let Some(keys) = scene.dynamic_groups.get(&group) {
            let mut dynamic: Vec<&Drawable> =
                keys.iter().filter_map(|key| scene.get(*key)).collect();
            dynamic.sort_by(|a, b| {
                a.draw_order
                    .partial_cmp(&b.draw_order)
                    .unwrap_or(Ordering::Equal)
            });
            self.stats.dynamic += dynamic.len();
            out.extend(dynamic.into_iter().map(|drawable| &drawable.model));
        }

        let Some(tree) = scene.static_groups.get(&group) else {
            return;
        };
        self.query_results.clear();
        match frustum {
            Some(frustum) => tree.query(frustum, &mut self.query_results),
            None => tree.query(&IntersectAlways, &mut self.query_results),
        }
        self.stats.static_candidates += self.query_results.len();

        let contribution = frustum.is_some() && self.settings.contribution_culling;
        for key in &self.query_results {
            let Some(drawable) = scene.get(*key) else {
                continue;
            };
            if contribution && culler.cull(drawable.center(), drawable.radius()) {
                self.stats.contribution_culled += 1;
                continue;
            }
            out.push(&drawable.model);
        }
    }
}
