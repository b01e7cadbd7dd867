//! Coordinate, color and matrix types shared by draw calls and compositors.
//!
//! Two spaces are in play:
//! - pixel viewports (`Viewport`), bottom-left origin as GL expects
//! - fractional rects (`Rect`) in `[0, 1]`, relative to a parent viewport

mod color;
mod mat4;
mod rect;
mod vec2;
mod viewport;

pub use color::ColorRgba;
pub use mat4::Mat4;
pub use rect::Rect;
pub use vec2::Vec2;
pub use viewport::Viewport;
