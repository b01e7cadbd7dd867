use crate::gl::{Gl, ImageImporter};

/// Opt-in driver checks.
///
/// Polling `glGetError` after every draw stalls most GLES drivers, so it is
/// off in release builds unless asked for.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DebugChecks {
    /// Poll `Gl::get_error` after each draw and log what it reports.
    pub check_errors: bool,
    /// Compare the binding state before and after each draw.
    pub check_bindings: bool,
}

impl Default for DebugChecks {
    fn default() -> Self {
        Self {
            check_errors: cfg!(debug_assertions),
            check_bindings: cfg!(debug_assertions),
        }
    }
}

impl DebugChecks {
    pub const fn off() -> Self {
        Self { check_errors: false, check_bindings: false }
    }
}

/// Renderer-facing context: the GL surface plus what the platform offers
/// around it.
///
/// Cheap to copy; pass it by reference into everything that touches GL.
#[derive(Copy, Clone)]
pub struct RenderCtx<'a> {
    pub gl: &'a dyn Gl,
    /// Zero-copy image import, when the platform has one.
    pub images: Option<&'a dyn ImageImporter>,
    pub checks: DebugChecks,
}

impl<'a> RenderCtx<'a> {
    #[inline]
    pub fn new(gl: &'a dyn Gl) -> Self {
        Self { gl, images: None, checks: DebugChecks::default() }
    }

    #[inline]
    pub fn with_importer(gl: &'a dyn Gl, images: &'a dyn ImageImporter) -> Self {
        Self { gl, images: Some(images), checks: DebugChecks::default() }
    }

    #[inline]
    pub fn with_checks(mut self, checks: DebugChecks) -> Self {
        self.checks = checks;
        self
    }

    /// Drains pending driver errors, logging each against `label`.
    /// Returns how many were found.
    pub fn drain_errors(&self, label: &str) -> usize {
        let mut n = 0;
        while let Some(code) = self.gl.get_error() {
            log::error!("{label}: GL error {code:#06x}");
            n += 1;
        }
        n
    }
}

impl std::fmt::Debug for RenderCtx<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCtx")
            .field("images", &self.images.is_some())
            .field("checks", &self.checks)
            .finish_non_exhaustive()
    }
}
