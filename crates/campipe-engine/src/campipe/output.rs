use std::fmt;

use crate::render::{DrawCall, Fbo};

/// Handle to one output of a [`super::Campipe`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct OutputId(pub(crate) u32);

impl OutputId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "output#{}", self.0)
    }
}

/// One render of the camera mesh into its own FBO.
#[derive(Debug)]
pub struct Output {
    pub(super) id: OutputId,
    pub(super) draw: DrawCall,
    pub(super) fbo: Fbo,
    pub(super) apply_ldc: bool,
}

impl Output {
    #[inline]
    pub fn id(&self) -> OutputId {
        self.id
    }

    #[inline]
    pub fn fbo(&self) -> &Fbo {
        &self.fbo
    }

    #[inline]
    pub fn applies_ldc(&self) -> bool {
        self.apply_ldc
    }

    #[inline]
    pub fn draw_call(&self) -> &DrawCall {
        &self.draw
    }
}
