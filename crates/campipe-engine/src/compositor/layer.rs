use std::fmt;

use crate::coords::{Mat4, Rect, Viewport};
use crate::gl::TextureId;
use crate::render::DrawCall;

/// Stable handle to a layer of one compositor.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct LayerId(pub(crate) u32);

impl LayerId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

/// One textured quad of a compositor.
#[derive(Debug)]
pub struct Layer {
    pub(super) id: LayerId,
    pub(super) draw: DrawCall,
    pub(super) transform: Mat4,
    pub(super) rect: Rect,
    pub(super) texture: Option<TextureId>,
    /// Samples the feed passed to `Compositor::draw` instead of `texture`.
    pub(super) from_feed: bool,
}

impl Layer {
    #[inline]
    pub fn id(&self) -> LayerId {
        self.id
    }

    #[inline]
    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    /// Placement as a fraction of the compositor viewport at the time it was set.
    #[inline]
    pub fn display_rect(&self) -> Rect {
        self.rect
    }

    /// Absolute pixel viewport the quad is drawn into.
    #[inline]
    pub fn viewport(&self) -> Viewport {
        self.draw.viewport()
    }

    #[inline]
    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    #[inline]
    pub fn samples_feed(&self) -> bool {
        self.from_feed
    }

    #[inline]
    pub fn draw_call(&self) -> &DrawCall {
        &self.draw
    }
}
