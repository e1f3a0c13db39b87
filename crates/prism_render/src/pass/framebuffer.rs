//! Framebuffer and render target management.

use std::mem;

use prism_core::{NameId, NameMap, PrismError, Result};
use wgpu::{AddressMode, FilterMode, TextureFormat, TextureViewDimension};

use super::RenderPass;
use crate::commands::GpuCommands;
use crate::config::RenderTargetConfig;
use crate::device::{Attachment, GpuDevice, TextureParameter, is_depth_stencil_format};
use crate::lookup::{self, TEXTURE_FORMATS, TEXTURE_TARGETS};
use crate::texture::{RenderTarget, SharedTextures};

/// Format of the depth renderbuffer added when a pass declares no depth target.
const DEPTH_RENDERBUFFER_FORMAT: TextureFormat = TextureFormat::Depth24Plus;

/// A render target declaration, validated against the lookup tables.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSpec {
    pub attachment: Attachment,
    /// Name the target is published under.
    pub name: NameId,
    /// Fragment output routed to this attachment.
    pub variable: String,
    pub format: TextureFormat,
    pub target: TextureViewDimension,
    pub auto_mipmap: bool,
    pub width: f32,
    pub height: f32,
    pub multiples: bool,
}

impl TargetSpec {
    /// Parses the `render_targets.<attachment>` entry of a pass.
    pub fn parse(
        attachment: &str,
        config: &RenderTargetConfig,
        names: &mut NameMap,
    ) -> Result<Self> {
        let attachment = lookup::parse_attachment(attachment)?;
        let format = TEXTURE_FORMATS.lookup(&config.format)?;
        let target = TEXTURE_TARGETS.lookup(&config.target)?;

        if target != TextureViewDimension::D2 {
            return Err(PrismError::UnsupportedFormat(config.target.clone()));
        }
        if attachment.is_color() == is_depth_stencil_format(format) {
            return Err(PrismError::UnsupportedFormat(config.format.clone()));
        }

        Ok(Self {
            attachment,
            name: names.add(&config.name),
            variable: config.variable.clone(),
            format,
            target,
            auto_mipmap: config.auto_mipmap,
            width: config.width,
            height: config.height,
            multiples: config.width_height_are_multiples,
        })
    }

    #[must_use]
    pub fn color_index(&self) -> Option<u32> {
        match self.attachment {
            Attachment::Color(index) => Some(index),
            _ => None,
        }
    }

    /// Depth and combined depth-stencil attachments both provide depth.
    #[must_use]
    pub fn is_depth(&self) -> bool {
        matches!(self.attachment, Attachment::Depth | Attachment::DepthStencil)
    }

    /// Pixel size for a window of `framebuffer_size`.
    #[must_use]
    pub fn size(&self, framebuffer_size: (u32, u32)) -> (u32, u32) {
        if self.multiples {
            (
                (self.width * framebuffer_size.0 as f32) as u32,
                (self.height * framebuffer_size.1 as f32) as u32,
            )
        } else {
            (self.width as u32, self.height as u32)
        }
    }
}

impl RenderPass {
    /// (Re)creates the framebuffer, the depth renderbuffer and owned targets.
    ///
    /// Targets whose name is already in `shared` are attached instead of
    /// created, unless this pass created them on an earlier build. With no
    /// targets at all the pass draws to the default framebuffer.
    pub(crate) fn create_framebuffer<D: GpuDevice>(
        &mut self,
        gl: &mut GpuCommands<D>,
        framebuffer_size: (u32, u32),
        shared: &SharedTextures,
    ) -> Result<()> {
        self.delete_framebuffer(gl);

        let limits = gl.limits();
        let depth_count = self.targets.iter().filter(|spec| spec.is_depth()).count();
        let color_count = self
            .targets
            .iter()
            .filter(|spec| spec.color_index().is_some())
            .count();
        let supported = limits.max_draw_buffers.min(limits.max_color_attachments);

        if depth_count > 1 {
            return Err(PrismError::MultipleDepthAttachments(depth_count));
        }
        if color_count > supported as usize {
            return Err(PrismError::TooManyColorAttachments {
                requested: color_count,
                supported: supported as usize,
            });
        }
        if self.targets.is_empty() {
            self.framebuffer = None;
            return Ok(());
        }
        if color_count + depth_count == 0 {
            return Err(PrismError::NoAttachableTargets);
        }

        let framebuffer = gl.create_framebuffer();
        self.framebuffer = Some(framebuffer);
        gl.bind_framebuffer_unchecked(Some(framebuffer));

        let draw_buffers: Vec<Option<u32>> = (0..supported)
            .map(|color| {
                self.targets
                    .iter()
                    .any(|spec| spec.color_index() == Some(color))
                    .then_some(color)
            })
            .collect();
        gl.draw_buffers(&draw_buffers);

        let (width, height) = self.dimensions.current();
        if depth_count == 0 {
            let renderbuffer = gl.create_renderbuffer();
            gl.bind_renderbuffer(Some(renderbuffer));
            gl.renderbuffer_storage(DEPTH_RENDERBUFFER_FORMAT, width, height);
            gl.framebuffer_renderbuffer(Attachment::Depth, Some(renderbuffer));
            self.depth_renderbuffer = Some(renderbuffer);
        }

        for spec in &self.targets {
            let referenced = shared
                .get(&spec.name)
                .filter(|_| !self.owned_target_names.contains(&spec.name));
            let texture = match referenced {
                Some(existing) => {
                    let texture = RenderTarget {
                        target: spec.target,
                        handle: existing.handle,
                    };
                    self.external_render_targets.insert(spec.name, texture);
                    texture
                }
                None => {
                    let texture = RenderTarget {
                        target: spec.target,
                        handle: gl.create_texture(),
                    };
                    let (target_width, target_height) = spec.size(framebuffer_size);
                    gl.bind_texture(texture.target, Some(texture.handle));
                    gl.tex_image_2d(texture.target, spec.format, target_width, target_height);
                    for parameter in [
                        TextureParameter::MinFilter(FilterMode::Linear, None),
                        TextureParameter::MagFilter(FilterMode::Linear),
                        TextureParameter::WrapS(AddressMode::ClampToEdge),
                        TextureParameter::WrapT(AddressMode::ClampToEdge),
                    ] {
                        gl.tex_parameter(texture.target, parameter);
                    }
                    gl.unbind_texture(texture.target);
                    self.render_targets.insert(spec.name, texture);
                    self.owned_target_names.insert(spec.name);
                    texture
                }
            };

            if spec.auto_mipmap {
                self.auto_mipmap_targets.push(texture);
            }
            gl.framebuffer_texture_2d(spec.attachment, texture.target, Some(texture.handle), 0);
        }

        if !gl.bind_framebuffer(Some(framebuffer)) {
            let status = gl.check_framebuffer_status();
            gl.unbind_framebuffer();
            self.delete_framebuffer(gl);
            return Err(PrismError::IncompleteFramebuffer(status.enum_name()));
        }
        gl.unbind_framebuffer();

        log::debug!(
            "Pass \"{}\": framebuffer {framebuffer} at {width}x{height}, \
             {} created / {} referenced target(s)",
            self.name,
            self.render_targets.len(),
            self.external_render_targets.len()
        );
        Ok(())
    }

    /// Deletes the framebuffer, the depth renderbuffer and owned targets.
    /// Referenced targets are only forgotten.
    pub(crate) fn delete_framebuffer<D: GpuDevice>(&mut self, gl: &mut GpuCommands<D>) {
        if let Some(framebuffer) = self.framebuffer.take() {
            gl.delete_framebuffer(framebuffer);
        }
        if let Some(renderbuffer) = self.depth_renderbuffer.take() {
            gl.delete_renderbuffer(renderbuffer);
        }
        self.auto_mipmap_targets.clear();

        for target in mem::take(&mut self.render_targets).into_values() {
            gl.delete_texture(target.handle);
        }
        self.external_render_targets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(attachment: &str, config: RenderTargetConfig) -> Result<TargetSpec> {
        TargetSpec::parse(attachment, &config, &mut NameMap::new())
    }

    #[test]
    fn height_scales_with_window_height() {
        let spec = parse(
            "GL_COLOR_ATTACHMENT0",
            RenderTargetConfig {
                name: "half".into(),
                width: 0.5,
                height: 0.25,
                ..RenderTargetConfig::default()
            },
        )
        .unwrap();

        assert_eq!(spec.color_index(), Some(0));
        assert_eq!(spec.size((1024, 800)), (512, 200));
    }

    #[test]
    fn formats_must_match_attachment_kind() {
        let depth_on_color = RenderTargetConfig {
            format: "GL_DEPTH_COMPONENT24".into(),
            ..RenderTargetConfig::default()
        };
        assert!(matches!(
            parse("GL_COLOR_ATTACHMENT0", depth_on_color.clone()),
            Err(PrismError::UnsupportedFormat(_))
        ));
        assert!(parse("GL_DEPTH_ATTACHMENT", depth_on_color).unwrap().is_depth());

        assert!(matches!(
            parse("GL_COLOR_ATTACHMENT0", RenderTargetConfig {
                format: "GL_RGBA9000".into(),
                ..RenderTargetConfig::default()
            }),
            Err(PrismError::UnknownEnum { kind: "texture format", .. })
        ));
    }
}
