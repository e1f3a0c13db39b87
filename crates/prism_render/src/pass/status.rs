//! Human-readable pass status.
//!
//! Output is written through a [`PrintContext`], which carries the sink, the
//! interner used to spell names, and the current indentation. Nothing is
//! global, so several dumps can be produced side by side.

use std::fmt;

use prism_core::{NameId, NameMap};

use super::RenderPass;
use crate::device::ClearMask;
use crate::lookup::TEXTURE_TARGETS;
use crate::state::DisplaySamplerParameter;
use crate::texture::RenderTarget;

const INDENT: &str = "   ";

/// How much detail a status dump includes. Each level includes the ones
/// before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum StatusVerbosity {
    /// Counts and handles.
    #[default]
    PassBrief,
    /// Adds sampler, uniform and state listings.
    PassDetail,
    /// Adds one line per local model.
    Models,
    /// Adds each model's texture overrides.
    ModelsTextures,
    /// Adds each model's uniform overrides.
    ModelsTexturesUniforms,
}

/// Destination and formatting state of a status dump.
pub struct PrintContext<'a> {
    out: &'a mut dyn fmt::Write,
    names: &'a NameMap,
    prefix: String,
}

impl<'a> PrintContext<'a> {
    pub fn new(out: &'a mut dyn fmt::Write, names: &'a NameMap) -> Self {
        Self {
            out,
            names,
            prefix: String::new(),
        }
    }

    /// Writes one line at the current indentation.
    pub fn line(&mut self, args: fmt::Arguments<'_>) -> fmt::Result {
        self.out.write_str(&self.prefix)?;
        self.out.write_fmt(args)?;
        self.out.write_char('\n')
    }

    /// Spelling of an interned name.
    #[must_use]
    pub fn name(&self, id: NameId) -> &'a str {
        let names: &'a NameMap = self.names;
        names.display(id)
    }

    /// Runs `f` one indentation level deeper.
    pub fn nested<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let depth = self.prefix.len();
        self.prefix.push_str(INDENT);
        let result = f(self);
        self.prefix.truncate(depth);
        result
    }
}

impl fmt::Debug for PrintContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrintContext")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

fn clear_mask_names(mask: ClearMask) -> String {
    if mask.is_empty() {
        return " (empty)".to_owned();
    }
    [
        (ClearMask::COLOR, "GL_COLOR_BUFFER_BIT"),
        (ClearMask::DEPTH, "GL_DEPTH_BUFFER_BIT"),
        (ClearMask::STENCIL, "GL_STENCIL_BUFFER_BIT"),
    ]
    .iter()
    .filter(|(bit, _)| mask.contains(*bit))
    .map(|(_, name)| format!(" {name}"))
    .collect()
}

fn print_targets(
    ctx: &mut PrintContext<'_>,
    title: &str,
    targets: &std::collections::BTreeMap<NameId, RenderTarget>,
) -> fmt::Result {
    ctx.line(format_args!("{title}: {}", targets.len()))?;
    ctx.nested(|ctx| {
        for (name, target) in targets {
            ctx.line(format_args!("{}: handle {}", ctx.name(*name), target.handle))?;
        }
        Ok(())
    })
}

impl RenderPass {
    /// Writes this pass's status at `verbosity`, one level below the
    /// context's current indentation.
    pub fn print_status(
        &self,
        verbosity: StatusVerbosity,
        ctx: &mut PrintContext<'_>,
    ) -> fmt::Result {
        let detail = verbosity >= StatusVerbosity::PassDetail;
        ctx.nested(|ctx| {
            ctx.line(format_args!("Clear mask:{}", clear_mask_names(self.clear_mask)))?;
            match self.program {
                Some(program) => ctx.line(format_args!("Shader program: {program}"))?,
                None => ctx.line(format_args!("Shader program: none"))?,
            }
            ctx.nested(|ctx| {
                ctx.line(format_args!("Vertex shader: {}", self.vertex_shader.0))?;
                ctx.line(format_args!("Fragment shader: {}", self.fragment_shader.0))
            })?;

            self.print_textures(detail, ctx)?;
            self.print_uniforms(detail, ctx)?;

            ctx.line(format_args!("Render dimensions: {}", self.dimensions))?;
            match self.framebuffer {
                Some(framebuffer) => ctx.line(format_args!("Framebuffer object: {framebuffer}"))?,
                None => ctx.line(format_args!("Framebuffer object: default"))?,
            }
            ctx.line(format_args!(
                "Using depth renderbuffer: {}",
                if self.depth_renderbuffer.is_some() { "yes" } else { "no" }
            ))?;
            print_targets(ctx, "Created render targets", &self.render_targets)?;
            print_targets(ctx, "External render targets", &self.external_render_targets)?;

            if self.auto_mipmap_targets.is_empty() {
                ctx.line(format_args!("Auto-mipmapped render targets: none"))?;
            } else {
                let handles: Vec<String> = self
                    .auto_mipmap_targets
                    .iter()
                    .map(|target| target.handle.to_string())
                    .collect();
                ctx.line(format_args!("Auto-mipmapped render targets: {}", handles.join(" ")))?;
            }

            if detail {
                self.print_state(ctx)?;
            }
            if verbosity >= StatusVerbosity::Models {
                self.print_models(verbosity, ctx)?;
            }
            Ok(())
        })
    }

    fn print_textures(&self, detail: bool, ctx: &mut PrintContext<'_>) -> fmt::Result {
        ctx.line(format_args!("Samplers: {} TU(s)", self.samplers.len()))?;
        if !detail {
            return Ok(());
        }
        ctx.nested(|ctx| {
            for sampler in &self.samplers {
                ctx.line(format_args!("Sampler handle TU {}: {}", sampler.unit, sampler.handle))?;
                ctx.line(format_args!("Sampler state TU {}: ", sampler.unit))?;
                ctx.nested(|ctx| {
                    for parameter in &sampler.parameters {
                        ctx.line(format_args!("{}", DisplaySamplerParameter(*parameter)))?;
                    }
                    Ok(())
                })?;
            }

            ctx.line(format_args!("Texture name assignments to TU:"))?;
            ctx.nested(|ctx| {
                for (name, unit) in &self.texture_units {
                    ctx.line(format_args!("{}: {unit}", ctx.name(*name)))?;
                }
                Ok(())
            })?;

            ctx.line(format_args!("Default textures: {}", self.default_textures.len()))?;
            ctx.nested(|ctx| {
                for texture in &self.default_textures {
                    ctx.line(format_args!(
                        "TU: {}, target: {}, handle: {}",
                        texture.unit,
                        TEXTURE_TARGETS.name_of(texture.target),
                        texture.handle
                    ))?;
                }
                Ok(())
            })
        })
    }

    fn print_uniforms(&self, detail: bool, ctx: &mut PrintContext<'_>) -> fmt::Result {
        ctx.line(format_args!("Uniforms: {}", self.uniform_locations.len()))?;
        if !detail {
            return Ok(());
        }
        ctx.nested(|ctx| {
            for (name, location) in &self.uniform_locations {
                ctx.line(format_args!("{}: {location}", ctx.name(*name)))?;
            }
            ctx.line(format_args!("Default uniforms: {}", self.default_uniforms.len()))?;
            ctx.nested(|ctx| {
                for uniform in &self.default_uniforms {
                    ctx.line(format_args!(
                        "location: {}, data: {}",
                        uniform.location, uniform.data
                    ))?;
                }
                Ok(())
            })
        })
    }

    fn print_state(&self, ctx: &mut PrintContext<'_>) -> fmt::Result {
        for (title, enable) in [("Enabled states", true), ("Disabled states", false)] {
            let names = self.capability_names(enable);
            if names.is_empty() {
                ctx.line(format_args!("{title}: default"))?;
            } else {
                ctx.line(format_args!("{title}: {}", names.join(" ")))?;
            }
        }

        if self.states.is_empty() {
            return ctx.line(format_args!("Additional state: default"));
        }
        ctx.line(format_args!("Additional state:"))?;
        ctx.nested(|ctx| {
            for state in &self.states {
                ctx.line(format_args!("{state}"))?;
            }
            Ok(())
        })
    }

    fn print_models(&self, verbosity: StatusVerbosity, ctx: &mut PrintContext<'_>) -> fmt::Result {
        ctx.line(format_args!("Models: {}", self.models.len()))?;
        ctx.nested(|ctx| {
            for (index, model) in self.models.values().enumerate() {
                ctx.line(format_args!(
                    "Model {index}: vertex array {}, {} element(s), \
                     {} texture / {} uniform override(s)",
                    model.vertex_array,
                    model.element_count,
                    model.texture_override_count(),
                    model.uniform_override_count()
                ))?;

                ctx.nested(|ctx| {
                    if verbosity >= StatusVerbosity::ModelsTextures {
                        for texture in model.texture_overrides() {
                            ctx.line(format_args!(
                                "TU {}: handle {}, target: {}",
                                texture.unit,
                                texture.handle,
                                TEXTURE_TARGETS.name_of(texture.target)
                            ))?;
                        }
                    }
                    if verbosity >= StatusVerbosity::ModelsTexturesUniforms {
                        for uniform in model.uniform_overrides() {
                            ctx.line(format_args!(
                                "location {}: {}",
                                uniform.location, uniform.data
                            ))?;
                        }
                    }
                    Ok(())
                })?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_lines_are_indented() {
        let names = NameMap::new();
        let mut out = String::new();
        let mut ctx = PrintContext::new(&mut out, &names);

        ctx.line(format_args!("top")).unwrap();
        ctx.nested(|ctx| {
            ctx.line(format_args!("inner"))?;
            ctx.nested(|ctx| ctx.line(format_args!("deepest")))
        })
        .unwrap();
        ctx.line(format_args!("back")).unwrap();

        assert_eq!(out, "top\n   inner\n      deepest\nback\n");
    }

    #[test]
    fn clear_mask_spelling() {
        assert_eq!(clear_mask_names(ClearMask::empty()), " (empty)");
        assert_eq!(
            clear_mask_names(ClearMask::COLOR | ClearMask::STENCIL),
            " GL_COLOR_BUFFER_BIT GL_STENCIL_BUFFER_BIT"
        );
    }

    #[test]
    fn verbosity_levels_are_ordered() {
        assert!(StatusVerbosity::PassBrief < StatusVerbosity::PassDetail);
        assert!(StatusVerbosity::Models < StatusVerbosity::ModelsTextures);
        assert!(StatusVerbosity::ModelsTextures < StatusVerbosity::ModelsTexturesUniforms);
    }
}
