//! Model registration and default binding edits.
//!
//! Misuse of the model API (unknown handle, overriding a texture the pass
//! does not sample, removing an override that was never set) is a
//! programmer error and asserts. Default binding edits for names the pass
//! does not know are silently ignored, since global edits are broadcast to
//! every pass.

use prism_core::NameId;

use super::RenderPass;
use crate::model::{ModelEntry, ModelHandle, RenderModel};
use crate::texture::{BoundTexture, TextureEntry};
use crate::uniform::{BoundUniform, UniformData, UniformEntry};

impl RenderPass {
    // ========================================================================
    // Local Models
    // ========================================================================

    pub fn add_model(&mut self, entry: &ModelEntry, handle: ModelHandle) {
        self.models.insert(handle, RenderModel::new(entry));
    }

    pub fn remove_model(&mut self, handle: ModelHandle) {
        let removed = self.models.remove(handle);
        assert!(removed.is_some(), "remove_model: missing model {handle:?}");
    }

    fn model_mut(&mut self, handle: ModelHandle, operation: &str) -> &mut RenderModel {
        match self.models.get_mut(handle) {
            Some(model) => model,
            None => panic!("{operation}: missing model {handle:?}"),
        }
    }

    /// Sets or updates the model's override for `texture.name`.
    pub fn set_model_texture(&mut self, handle: ModelHandle, texture: &TextureEntry) {
        let unit = self.texture_unit(texture.name);
        let model = self.model_mut(handle, "set_model_texture");
        model.set_texture_override(texture.name, texture.handle, texture.target, || {
            let unit = unit.unwrap_or_else(|| {
                panic!("set_model_texture: texture {} has no sampler in this pass", texture.name)
            });
            BoundTexture::new(unit, texture)
        });
    }

    pub fn remove_model_texture(&mut self, handle: ModelHandle, name: NameId) {
        let removed = self
            .model_mut(handle, "remove_model_texture")
            .remove_texture_override(name);
        assert!(removed, "remove_model_texture: missing override {name}");
    }

    /// Sets or updates the model's override for `uniform.name`.
    pub fn set_model_uniform(&mut self, handle: ModelHandle, uniform: &UniformEntry) {
        let location = self.uniform_location(uniform.name);
        let model = self.model_mut(handle, "set_model_uniform");
        model.set_uniform_override(uniform.name, uniform.data, || {
            let location = location.unwrap_or_else(|| {
                panic!("set_model_uniform: uniform {} is not active in this pass", uniform.name)
            });
            BoundUniform::new(location, uniform.data)
        });
    }

    pub fn remove_model_uniform(&mut self, handle: ModelHandle, name: NameId) {
        let removed = self
            .model_mut(handle, "remove_model_uniform")
            .remove_uniform_override(name);
        assert!(removed, "remove_model_uniform: missing override {name}");
    }

    // ========================================================================
    // Default Bindings
    // ========================================================================

    /// Binds `texture` by default on the unit sampling `name`.
    pub fn set_default_texture(&mut self, name: NameId, texture: &TextureEntry) {
        let Some(unit) = self.texture_unit(name) else {
            return;
        };
        let bound = BoundTexture::new(unit, texture);
        match self.default_texture_index(unit) {
            Some(index) => self.default_textures[index] = bound,
            None => self.default_textures.push(bound),
        }
    }

    pub fn remove_default_texture(&mut self, name: NameId) {
        if let Some(index) = self
            .texture_unit(name)
            .and_then(|unit| self.default_texture_index(unit))
        {
            self.default_textures.swap_remove(index);
        }
    }

    /// The default value of uniform `name`, if it has one.
    #[must_use]
    pub fn get_default_uniform(&self, name: NameId) -> Option<&BoundUniform> {
        let location = self.uniform_location(name)?;
        self.default_uniform_index(location)
            .map(|index| &self.default_uniforms[index])
    }

    /// Sets the default value of an active uniform.
    ///
    /// Returns `false` if the program has no active uniform named `uniform.name`.
    pub fn set_default_uniform(&mut self, uniform: &UniformEntry) -> bool {
        let Some(location) = self.uniform_location(uniform.name) else {
            return false;
        };
        let bound = BoundUniform::new(location, uniform.data);
        match self.default_uniform_index(location) {
            Some(index) => self.default_uniforms[index] = bound,
            None => self.default_uniforms.push(bound),
        }
        true
    }

    pub fn remove_default_uniform(&mut self, name: NameId) {
        if let Some(index) = self
            .uniform_location(name)
            .and_then(|location| self.default_uniform_index(location))
        {
            self.default_uniforms.swap_remove(index);
        }
    }

    /// Current default payload for `name`, for callers that only need the data.
    #[must_use]
    pub fn default_uniform_data(&self, name: NameId) -> Option<&UniformData> {
        self.get_default_uniform(name).map(|bound| &bound.data)
    }
}
