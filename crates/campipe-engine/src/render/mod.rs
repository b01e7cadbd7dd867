//! GPU resources and the draw-call abstraction built on [`crate::gl::Gl`].

mod bindings;
mod ctx;
mod drawcall;
mod fbo;
pub mod shader;
mod texture;

pub use bindings::{BindingTable, MAX_BINDINGS};
pub use ctx::{DebugChecks, RenderCtx};
pub use drawcall::{AttributeBinding, DrawCall, TextureBinding};
pub use fbo::{Fbo, FboTarget, MappedFrame, SharedFbo, SharedMemory};
pub use shader::{Program, ShaderLibrary};
pub use texture::{ImageData, Texture, ROW_ALIGN};
