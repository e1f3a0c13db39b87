//! Per-frame rendering of a pass.

use smallvec::SmallVec;
use wgpu::TextureViewDimension;

use super::RenderPass;
use crate::commands::GpuCommands;
use crate::device::{GpuDevice, TextureHandle, UniformLocation};
use crate::model::ExternalModel;
use crate::texture::SharedTextures;
use crate::uniform::UniformData;

type UnitList = SmallVec<[u32; 8]>;
type LocationList = SmallVec<[UniformLocation; 8]>;

#[track_caller]
fn apply_texture<D: GpuDevice>(
    gl: &mut GpuCommands<D>,
    unit: u32,
    target: TextureViewDimension,
    texture: Option<TextureHandle>,
) {
    gl.active_texture(unit);
    gl.bind_texture(target, texture);
}

impl RenderPass {
    /// Renders one frame.
    ///
    /// `external` holds the external model lists of this pass's draw groups.
    /// Returns `true` when the render targets were recreated, including a
    /// failed rebuild; the caller republishes [`render_targets`](Self::render_targets)
    /// in that case. A failed rebuild skips the pass for this frame and is
    /// retried on the next one.
    pub fn render<D: GpuDevice>(
        &mut self,
        gl: &mut GpuCommands<D>,
        framebuffer_size: (u32, u32),
        external: &[&[&ExternalModel]],
        shared: &SharedTextures,
        wait_on_timer_query: bool,
    ) -> bool {
        if !self.enabled {
            return false;
        }

        let (window_width, window_height) = framebuffer_size;
        let resized = self.dimensions.update(window_width, window_height);
        let recreated = resized || self.framebuffer_stale;
        if recreated {
            if let Err(error) = self.create_framebuffer(gl, framebuffer_size, shared) {
                log::error!(
                    "Unable to create framebuffer object for pass \"{}\": {error}",
                    self.name
                );
                self.framebuffer_stale = true;
                return true;
            }
            self.framebuffer_stale = false;
        }

        self.read_timer(gl, wait_on_timer_query);
        if let Some(query) = self.timer_query {
            gl.begin_time_elapsed(query);
        }

        self.apply_baseline(gl);
        self.draw_local_models(gl);
        self.draw_external_models(gl, external);

        gl.unbind_framebuffer();
        for target in &self.auto_mipmap_targets {
            gl.generate_mipmaps(target.target, target.handle);
        }
        for sampler in &self.samplers {
            gl.unbind_sampler(sampler.unit);
        }
        if self.timer_query.is_some() {
            gl.end_time_elapsed();
        }

        recreated
    }

    /// Collects the previous frame's GPU time, if one was measured.
    fn read_timer<D: GpuDevice>(&mut self, gl: &mut GpuCommands<D>, wait: bool) {
        let Some(query) = self.timer_query else {
            return;
        };
        if self.last_time < 0.0 {
            self.last_time = 0.0;
            return;
        }
        self.last_time = if gl.query_result_available(query) || wait {
            gl.query_result(query) as f64 * 1e-9
        } else {
            0.0
        };
    }

    /// Framebuffer, state, clears and default bindings.
    fn apply_baseline<D: GpuDevice>(&self, gl: &mut GpuCommands<D>) {
        gl.bind_framebuffer(self.framebuffer);
        let (width, height) = self.dimensions.current();
        gl.viewport(width, height);
        gl.use_program(self.program);

        for toggle in &self.toggles {
            toggle.apply(gl);
        }
        for state in &self.states {
            state.apply(gl);
        }

        // After the state lists, so write masks are already in effect.
        gl.clear_color(self.clear_color);
        gl.clear_depth(self.clear_depth);
        gl.clear_stencil(self.clear_stencil);
        if !self.clear_mask.is_empty() {
            gl.clear(self.clear_mask);
        }

        for uniform in &self.default_uniforms {
            gl.apply_uniform(uniform.location, &uniform.data);
        }
        for sampler in &self.samplers {
            gl.bind_sampler(sampler.unit, Some(sampler.handle));
            apply_texture(gl, sampler.unit, TextureViewDimension::D2, None);
        }
        for texture in &self.default_textures {
            apply_texture(gl, texture.unit, texture.target, Some(texture.handle));
        }
    }

    fn default_uniform_at(&self, location: UniformLocation) -> Option<&UniformData> {
        self.default_uniform_index(location)
            .map(|index| &self.default_uniforms[index].data)
    }

    /// Puts a texture unit back to its default binding, or unbinds it.
    fn restore_texture<D: GpuDevice>(&self, gl: &mut GpuCommands<D>, unit: u32) {
        match self.default_texture_index(unit) {
            Some(index) => {
                let texture = self.default_textures[index];
                apply_texture(gl, unit, texture.target, Some(texture.handle));
            }
            None => apply_texture(gl, unit, TextureViewDimension::D2, None),
        }
    }

    /// A uniform location without a default keeps its last value.
    fn restore_uniform<D: GpuDevice>(&self, gl: &mut GpuCommands<D>, location: UniformLocation) {
        if let Some(data) = self.default_uniform_at(location) {
            gl.apply_uniform(location, data);
        }
    }

    fn draw_local_models<D: GpuDevice>(&self, gl: &mut GpuCommands<D>) {
        let mut touched_units = UnitList::new();
        let mut touched_locations = LocationList::new();

        for model in self.models.values() {
            touched_units.clear();
            for texture in model.texture_overrides() {
                apply_texture(gl, texture.unit, texture.target, Some(texture.handle));
                touched_units.push(texture.unit);
            }

            touched_locations.clear();
            for uniform in model.uniform_overrides() {
                gl.apply_uniform(uniform.location, &uniform.data);
                touched_locations.push(uniform.location);
            }

            gl.draw_geometry(model.vertex_array, model.element_count);

            for &location in &touched_locations {
                self.restore_uniform(gl, location);
            }
            for &unit in &touched_units {
                self.restore_texture(gl, unit);
            }
        }
    }

    /// Draws external models, diffing each model's overrides against the
    /// previous model's rather than against the baseline.
    fn draw_external_models<D: GpuDevice>(
        &self,
        gl: &mut GpuCommands<D>,
        external: &[&[&ExternalModel]],
    ) {
        let mut last_units = UnitList::new();
        let mut units = UnitList::new();
        let mut last_locations = LocationList::new();
        let mut locations = LocationList::new();

        for model in external.iter().flat_map(|group| group.iter()) {
            if !model.draw_enabled() {
                continue;
            }

            // Textures: names this pass does not sample are skipped.
            units.clear();
            let textures: SmallVec<[_; 8]> = model
                .textures
                .iter()
                .filter_map(|texture| {
                    self.texture_unit(texture.name)
                        .map(|unit| (unit, texture.target, texture.handle))
                })
                .collect();
            units.extend(textures.iter().map(|(unit, ..)| *unit));

            for &unit in last_units.iter().filter(|unit| !units.contains(*unit)) {
                self.restore_texture(gl, unit);
            }
            for &(unit, target, handle) in &textures {
                apply_texture(gl, unit, target, Some(handle));
            }
            std::mem::swap(&mut last_units, &mut units);

            // Uniforms: names without an active location are skipped.
            locations.clear();
            let uniforms: SmallVec<[_; 8]> = model
                .uniforms
                .iter()
                .filter_map(|uniform| {
                    self.uniform_location(uniform.name)
                        .map(|location| (location, &uniform.data))
                })
                .collect();
            locations.extend(uniforms.iter().map(|(location, _)| *location));

            for &location in last_locations
                .iter()
                .filter(|location| !locations.contains(*location))
            {
                self.restore_uniform(gl, location);
            }
            for &(location, data) in &uniforms {
                gl.apply_uniform(location, data);
            }
            std::mem::swap(&mut last_locations, &mut locations);

            model.draw(gl);
        }
    }
}
