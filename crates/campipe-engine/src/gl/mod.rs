//! The GLES2 surface the engine draws through.
//!
//! Everything above this module talks to a [`Gl`] trait object instead of a
//! driver binding, so the same draw-call code runs against a real context
//! ([`GlowGl`], behind the `glow` feature) or the in-memory [`HeadlessGl`].
//!
//! GL contexts are thread-affine: implementations take `&self` and are
//! expected to be `!Sync`. All calls must come from the thread that owns the
//! context.

#[cfg(feature = "glow")]
mod glow_backend;
pub mod headless;
mod types;

#[cfg(feature = "glow")]
pub use glow_backend::GlowGl;
pub use headless::HeadlessGl;
pub use types::*;

use crate::feed::{CameraBuffer, Plane};

/// GLES2 subset used by draw calls, framebuffers, shaders and feeds.
///
/// Creation calls report failure through `Err` with the driver's message;
/// everything else mirrors its GL counterpart and cannot fail locally. Driver
/// errors from those calls surface through [`Gl::get_error`].
pub trait Gl {
    // ── buffers ───────────────────────────────────────────────────────────
    fn create_buffer(&self) -> Result<BufferId, String>;
    fn delete_buffer(&self, buffer: BufferId);
    fn bind_buffer(&self, target: BufferTarget, buffer: Option<BufferId>);
    /// Uploads `data` to the buffer bound at `target` (`GL_STATIC_DRAW`).
    fn buffer_data(&self, target: BufferTarget, data: &[u8]);

    // ── textures ──────────────────────────────────────────────────────────
    fn create_texture(&self) -> Result<TextureId, String>;
    fn delete_texture(&self, texture: TextureId);
    /// Selects texture unit `unit` (zero based).
    fn active_texture(&self, unit: u32);
    fn bind_texture(&self, target: TextureTarget, texture: Option<TextureId>);
    /// Allocates storage for the texture bound at `target`. Rows of `pixels`
    /// are expected at the default 4-byte unpack alignment.
    fn tex_image_2d(
        &self,
        target: TextureTarget,
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: Option<&[u8]>,
    );
    /// Sets min/mag filters and clamp-to-edge wrapping on the bound texture.
    fn tex_parameters(&self, target: TextureTarget, filter: Filter);

    // ── framebuffers ──────────────────────────────────────────────────────
    fn create_framebuffer(&self) -> Result<FramebufferId, String>;
    fn delete_framebuffer(&self, framebuffer: FramebufferId);
    /// Binds `framebuffer`, or the default (screen) framebuffer for `None`.
    fn bind_framebuffer(&self, framebuffer: Option<FramebufferId>);
    /// Attaches a 2D texture as color attachment 0 of the bound framebuffer.
    fn framebuffer_texture_2d(&self, texture: Option<TextureId>);
    fn framebuffer_complete(&self) -> bool;

    // ── shaders ───────────────────────────────────────────────────────────
    fn create_shader(&self, stage: ShaderStage) -> Result<ShaderId, String>;
    fn shader_source(&self, shader: ShaderId, source: &str);
    fn compile_shader(&self, shader: ShaderId);
    fn shader_compile_status(&self, shader: ShaderId) -> bool;
    fn shader_info_log(&self, shader: ShaderId) -> String;
    fn delete_shader(&self, shader: ShaderId);

    fn create_program(&self) -> Result<ProgramId, String>;
    fn attach_shader(&self, program: ProgramId, shader: ShaderId);
    fn link_program(&self, program: ProgramId);
    fn program_link_status(&self, program: ProgramId) -> bool;
    fn program_info_log(&self, program: ProgramId) -> String;
    fn delete_program(&self, program: ProgramId);
    fn use_program(&self, program: Option<ProgramId>);

    fn attrib_location(&self, program: ProgramId, name: &str) -> Option<AttribLocation>;
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    /// Sets an int/sampler uniform of the program in use.
    fn uniform_1i(&self, location: UniformLocation, value: i32);
    /// Sets a mat4 uniform of the program in use (column major).
    fn uniform_matrix4(&self, location: UniformLocation, value: &[f32; 16]);

    // ── vertex attributes ─────────────────────────────────────────────────
    fn enable_vertex_attrib_array(&self, location: AttribLocation);
    fn disable_vertex_attrib_array(&self, location: AttribLocation);
    /// Float attribute sourced from the bound array buffer.
    fn vertex_attrib_pointer_f32(&self, location: AttribLocation, components: i32, stride: i32, offset: i32);

    // ── drawing ───────────────────────────────────────────────────────────
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32);
    /// Clears the color buffer of the bound framebuffer.
    fn clear(&self);
    /// `glDrawElements` with `GL_UNSIGNED_SHORT` indices from the bound
    /// element buffer, starting `offset` bytes in.
    fn draw_elements_u16(&self, primitive: Primitive, count: i32, offset: i32);
    /// Reads RGBA8 pixels from the bound framebuffer, bottom row first.
    fn read_pixels_rgba(&self, x: i32, y: i32, width: i32, height: i32, out: &mut [u8]);
    fn finish(&self);

    // ── diagnostics ───────────────────────────────────────────────────────
    /// Pops the oldest recorded driver error code, if any.
    fn get_error(&self) -> Option<u32>;
    /// Queries the binding state. Costly on real drivers; meant for debug
    /// checks and tests.
    fn binding_snapshot(&self) -> BindingSnapshot;
}

/// Zero-copy import of producer buffers as GPU images.
///
/// On device this is `eglCreateImageKHR` plus `glEGLImageTargetTexture2DOES`;
/// the platform layer provides it since the required extensions are vendor
/// specific.
pub trait ImageImporter {
    /// Wraps one plane of `buffer` as an image and attaches it to `texture`
    /// (an external texture). The previous image attached to `texture` must
    /// already have been released.
    fn import(&self, buffer: &CameraBuffer, plane: Plane, texture: TextureId) -> Result<ExternalImage, String>;

    /// Destroys an image returned by [`ImageImporter::import`].
    fn release(&self, image: ExternalImage);
}
