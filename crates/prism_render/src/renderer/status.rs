//! Renderer-level status and profiling dumps.

use std::fmt;

use prism_core::NameMap;

use super::Renderer;
use crate::device::GpuDevice;
use crate::pass::{PrintContext, StatusVerbosity};

impl<D: GpuDevice> Renderer<D> {
    /// Writes a status report: models, shaders, shared textures and every pass.
    pub fn print_renderer_status(
        &self,
        verbosity: StatusVerbosity,
        names: &NameMap,
        out: &mut dyn fmt::Write,
    ) -> fmt::Result {
        let mut ctx = PrintContext::new(out, names);
        ctx.line(format_args!("Renderer status"))?;
        ctx.line(format_args!("---------------"))?;
        ctx.line(format_args!("Model count: {}", self.models.len()))?;

        let shaders: Vec<String> = self
            .shaders
            .iter()
            .map(|(name, shader)| {
                if shader.defines.is_empty() {
                    name.clone()
                } else {
                    let defines: Vec<&str> = shader.defines.iter().map(String::as_str).collect();
                    format!("{name}({})", defines.join("/"))
                }
            })
            .collect();
        ctx.line(format_args!("Shaders: {}", shaders.join(", ")))?;

        if verbosity >= StatusVerbosity::ModelsTextures {
            ctx.line(format_args!("Global textures: {}", self.shared_textures.len()))?;
            ctx.nested(|ctx| {
                for (name, texture) in &self.shared_textures {
                    ctx.line(format_args!("{}, handle {}", ctx.name(*name), texture.handle))?;
                }
                Ok(())
            })?;
        }

        ctx.line(format_args!("Passes: {}", self.passes.len()))?;
        for pass in &self.passes {
            ctx.line(format_args!("Pass \"{}\"", pass.name()))?;
            let groups: Vec<&str> = pass
                .draw_groups()
                .iter()
                .map(|group| ctx.name(*group))
                .collect();
            ctx.nested(|ctx| ctx.line(format_args!("Draw groups: {}", groups.join(", "))))?;
            pass.print_status(verbosity, &mut ctx)?;
        }
        Ok(())
    }

    /// Writes the last measured GPU time of every pass, in microseconds.
    pub fn print_profiling_info(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        for pass in &self.passes {
            writeln!(out, "{}: {} us", pass.name(), pass.last_time() * 1e6)?;
        }
        Ok(())
    }

    /// [`print_renderer_status`](Self::print_renderer_status) into a string.
    #[must_use]
    pub fn renderer_status(&self, verbosity: StatusVerbosity, names: &NameMap) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.print_renderer_status(verbosity, names, &mut out);
        out
    }
}
