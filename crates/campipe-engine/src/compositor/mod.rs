//! Layer compositing into an FBO or the screen.

mod layer;
mod stack;

pub use layer::{Layer, LayerId};
pub use stack::Compositor;
