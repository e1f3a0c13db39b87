//! Render target sizing.

use std::fmt;

/// Dimension policy of a pass's render targets.
///
/// Either absolute pixel sizes, or multiples of the framebuffer size
/// (`0.5` renders at half resolution). The computed size is cached so the
/// pass can tell when a window resize requires new targets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderDimensions {
    width: f32,
    height: f32,
    multiples: bool,
    framebuffer: (u32, u32),
    computed: (u32, u32),
}

impl RenderDimensions {
    #[must_use]
    pub fn new(width: f32, height: f32, multiples: bool) -> Self {
        Self {
            width,
            height,
            multiples,
            framebuffer: (0, 0),
            computed: (0, 0),
        }
    }

    /// Feeds the current framebuffer size. Returns `true` if the computed
    /// render size changed.
    pub fn update(&mut self, framebuffer_width: u32, framebuffer_height: u32) -> bool {
        self.framebuffer = (framebuffer_width, framebuffer_height);
        let computed = self.compute();
        let changed = computed != self.computed;
        self.computed = computed;
        changed
    }

    /// The size computed by the last [`update`](Self::update).
    #[inline]
    #[must_use]
    pub fn current(&self) -> (u32, u32) {
        self.computed
    }

    /// Computes the render size for the last framebuffer size seen.
    #[must_use]
    pub fn compute(&self) -> (u32, u32) {
        if self.multiples {
            (
                (self.width * self.framebuffer.0 as f32) as u32,
                (self.height * self.framebuffer.1 as f32) as u32,
            )
        } else {
            (self.width as u32, self.height as u32)
        }
    }

    #[inline]
    #[must_use]
    pub fn is_multiple(&self) -> bool {
        self.multiples
    }
}

impl fmt::Display for RenderDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h) = self.computed;
        if self.multiples {
            write!(f, "{}x{} of framebuffer ({w}x{h})", self.width, self.height)
        } else {
            write!(f, "{w}x{h}")
        }
    }
}
