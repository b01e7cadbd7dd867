//! Display platform seam.
//!
//! On device the platform owns the EGL display, the context made current on
//! the render thread and the screen surface (DispmanX or a GLFW window).
//! Setting those up is vendor territory and lives outside the engine; the
//! engine only needs the GL surface, the image importer and a way to present.

use crate::error::{Error, Result};
use crate::gl::{Gl, HeadlessGl, ImageImporter};
use crate::render::{DebugChecks, RenderCtx};

/// What the run loop needs from the display side.
pub trait Platform {
    fn gl(&self) -> &dyn Gl;

    /// Zero-copy buffer import, when the platform has one.
    fn images(&self) -> Option<&dyn ImageImporter> {
        None
    }

    /// Screen size in pixels.
    fn size(&self) -> (u32, u32);

    /// Shows the frame drawn into the default framebuffer.
    fn present(&mut self) -> Result<()>;

    /// Builds a render context over this platform's GL surface.
    fn render_ctx(&self, checks: DebugChecks) -> RenderCtx<'_> {
        RenderCtx { gl: self.gl(), images: self.images(), checks }
    }
}

/// Offscreen platform over [`HeadlessGl`].
///
/// Used by the studio when no display is attached, and by tests.
pub struct HeadlessPlatform {
    gl: HeadlessGl,
    width: u32,
    height: u32,
    presented: u64,
}

impl HeadlessPlatform {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidSize { what: "screen", width, height });
        }
        log::debug!("headless platform {width}x{height}");
        Ok(Self { gl: HeadlessGl::new(width, height), width, height, presented: 0 })
    }

    /// The backing emulator, for inspecting what was drawn.
    pub fn headless(&self) -> &HeadlessGl {
        &self.gl
    }

    /// Frames presented so far.
    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl Platform for HeadlessPlatform {
    fn gl(&self) -> &dyn Gl {
        &self.gl
    }

    fn images(&self) -> Option<&dyn ImageImporter> {
        Some(&self.gl)
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn present(&mut self) -> Result<()> {
        self.gl.finish();
        self.presented += 1;
        Ok(())
    }
}

impl std::fmt::Debug for HeadlessPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessPlatform")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("presented", &self.presented)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_screen_is_rejected() {
        assert!(matches!(
            HeadlessPlatform::new(0, 480),
            Err(Error::InvalidSize { what: "screen", .. })
        ));
    }

    #[test]
    fn render_ctx_carries_the_importer() {
        let platform = HeadlessPlatform::new(64, 32).unwrap();
        let ctx = platform.render_ctx(DebugChecks::off());
        assert!(ctx.images.is_some());
        assert_eq!(ctx.checks, DebugChecks::off());
        assert_eq!(platform.size(), (64, 32));
    }
}
