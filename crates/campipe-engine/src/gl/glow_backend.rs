use std::cell::RefCell;
use std::collections::BTreeSet;
use std::num::NonZeroU32;

use glow::HasContext;

use super::{
    AttribLocation, BindingSnapshot, BufferId, BufferTarget, Filter, FramebufferId, Gl, PixelFormat, Primitive,
    ProgramId, ShaderId, ShaderStage, TextureId, TextureTarget, UniformLocation,
};

const TEXTURE_EXTERNAL_OES: u32 = 0x8D65;
const TEXTURE_BINDING_EXTERNAL_OES: u32 = 0x8D67;

/// [`Gl`] on top of a real driver through `glow`.
///
/// The context must be current on the calling thread for the whole lifetime
/// of this value.
pub struct GlowGl {
    gl: glow::Context,
    attribs: AttribTracker,
}

impl GlowGl {
    /// # Safety
    /// `gl` must wrap a GLES2 context that is current on this thread, with
    /// every vertex attribute array disabled.
    pub unsafe fn new(gl: glow::Context) -> Self {
        Self { gl, attribs: AttribTracker::default() }
    }

    pub fn context(&self) -> &glow::Context {
        &self.gl
    }
}

impl std::fmt::Debug for GlowGl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlowGl").finish_non_exhaustive()
    }
}

/// Enabled vertex attribute arrays, as last set through this backend.
///
/// GLES2 has no cheap query for the enabled flag, so the snapshot reports
/// what was enabled through [`Gl`] calls.
#[derive(Debug, Default)]
struct AttribTracker {
    enabled: RefCell<BTreeSet<u32>>,
}

impl AttribTracker {
    fn set(&self, location: u32, enabled: bool) {
        let mut set = self.enabled.borrow_mut();
        if enabled {
            set.insert(location);
        } else {
            set.remove(&location);
        }
    }

    fn enabled(&self) -> Vec<AttribLocation> {
        self.enabled.borrow().iter().copied().map(AttribLocation).collect()
    }
}

// ── enum mapping ──────────────────────────────────────────────────────────

fn buffer_target(t: BufferTarget) -> u32 {
    match t {
        BufferTarget::Array => glow::ARRAY_BUFFER,
        BufferTarget::ElementArray => glow::ELEMENT_ARRAY_BUFFER,
    }
}

fn texture_target(t: TextureTarget) -> u32 {
    match t {
        TextureTarget::Texture2D => glow::TEXTURE_2D,
        TextureTarget::External => TEXTURE_EXTERNAL_OES,
    }
}

fn pixel_format(f: PixelFormat) -> u32 {
    match f {
        PixelFormat::Luminance => glow::LUMINANCE,
        PixelFormat::Rgb => glow::RGB,
        PixelFormat::Rgba => glow::RGBA,
    }
}

fn primitive(p: Primitive) -> u32 {
    match p {
        Primitive::TriangleStrip => glow::TRIANGLE_STRIP,
        Primitive::Triangles => glow::TRIANGLES,
    }
}

// Handle conversions. Our ids and glow's native handles are both non-zero
// GL names.

fn buf(id: BufferId) -> glow::NativeBuffer {
    glow::NativeBuffer(id.0)
}

fn tex(id: TextureId) -> glow::NativeTexture {
    glow::NativeTexture(id.0)
}

fn fbo(id: FramebufferId) -> glow::NativeFramebuffer {
    glow::NativeFramebuffer(id.0)
}

fn shader(id: ShaderId) -> glow::NativeShader {
    glow::NativeShader(id.0)
}

fn program(id: ProgramId) -> glow::NativeProgram {
    glow::NativeProgram(id.0)
}

fn uniform(loc: UniformLocation) -> glow::NativeUniformLocation {
    glow::NativeUniformLocation(loc.0)
}

fn name_of(raw: i32) -> Option<NonZeroU32> {
    NonZeroU32::new(raw as u32)
}

impl Gl for GlowGl {
    // ── buffers ───────────────────────────────────────────────────────────

    fn create_buffer(&self) -> Result<BufferId, String> {
        unsafe { self.gl.create_buffer() }.map(|b| BufferId(b.0))
    }

    fn delete_buffer(&self, buffer: BufferId) {
        unsafe { self.gl.delete_buffer(buf(buffer)) }
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<BufferId>) {
        unsafe { self.gl.bind_buffer(buffer_target(target), buffer.map(buf)) }
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8]) {
        unsafe { self.gl.buffer_data_u8_slice(buffer_target(target), data, glow::STATIC_DRAW) }
    }

    // ── textures ──────────────────────────────────────────────────────────

    fn create_texture(&self) -> Result<TextureId, String> {
        unsafe { self.gl.create_texture() }.map(|t| TextureId(t.0))
    }

    fn delete_texture(&self, texture: TextureId) {
        unsafe { self.gl.delete_texture(tex(texture)) }
    }

    fn active_texture(&self, unit: u32) {
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) }
    }

    fn bind_texture(&self, target: TextureTarget, texture: Option<TextureId>) {
        unsafe { self.gl.bind_texture(texture_target(target), texture.map(tex)) }
    }

    fn tex_image_2d(
        &self,
        target: TextureTarget,
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: Option<&[u8]>,
    ) {
        let fmt = pixel_format(format);
        unsafe {
            self.gl.tex_image_2d(
                texture_target(target),
                0,
                fmt as i32,
                width as i32,
                height as i32,
                0,
                fmt,
                glow::UNSIGNED_BYTE,
                pixels,
            )
        }
    }

    fn tex_parameters(&self, target: TextureTarget, filter: Filter) {
        let target = texture_target(target);
        let filter = match filter {
            Filter::Nearest => glow::NEAREST,
            Filter::Linear => glow::LINEAR,
        } as i32;
        unsafe {
            self.gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, filter);
            self.gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, filter);
            self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
            self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
        }
    }

    // ── framebuffers ──────────────────────────────────────────────────────

    fn create_framebuffer(&self) -> Result<FramebufferId, String> {
        unsafe { self.gl.create_framebuffer() }.map(|f| FramebufferId(f.0))
    }

    fn delete_framebuffer(&self, framebuffer: FramebufferId) {
        unsafe { self.gl.delete_framebuffer(fbo(framebuffer)) }
    }

    fn bind_framebuffer(&self, framebuffer: Option<FramebufferId>) {
        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, framebuffer.map(fbo)) }
    }

    fn framebuffer_texture_2d(&self, texture: Option<TextureId>) {
        unsafe {
            self.gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                texture.map(tex),
                0,
            )
        }
    }

    fn framebuffer_complete(&self) -> bool {
        unsafe { self.gl.check_framebuffer_status(glow::FRAMEBUFFER) == glow::FRAMEBUFFER_COMPLETE }
    }

    // ── shaders ───────────────────────────────────────────────────────────

    fn create_shader(&self, stage: ShaderStage) -> Result<ShaderId, String> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe { self.gl.create_shader(kind) }.map(|s| ShaderId(s.0))
    }

    fn shader_source(&self, s: ShaderId, source: &str) {
        unsafe { self.gl.shader_source(shader(s), source) }
    }

    fn compile_shader(&self, s: ShaderId) {
        unsafe { self.gl.compile_shader(shader(s)) }
    }

    fn shader_compile_status(&self, s: ShaderId) -> bool {
        unsafe { self.gl.get_shader_compile_status(shader(s)) }
    }

    fn shader_info_log(&self, s: ShaderId) -> String {
        unsafe { self.gl.get_shader_info_log(shader(s)) }
    }

    fn delete_shader(&self, s: ShaderId) {
        unsafe { self.gl.delete_shader(shader(s)) }
    }

    fn create_program(&self) -> Result<ProgramId, String> {
        unsafe { self.gl.create_program() }.map(|p| ProgramId(p.0))
    }

    fn attach_shader(&self, p: ProgramId, s: ShaderId) {
        unsafe { self.gl.attach_shader(program(p), shader(s)) }
    }

    fn link_program(&self, p: ProgramId) {
        unsafe { self.gl.link_program(program(p)) }
    }

    fn program_link_status(&self, p: ProgramId) -> bool {
        unsafe { self.gl.get_program_link_status(program(p)) }
    }

    fn program_info_log(&self, p: ProgramId) -> String {
        unsafe { self.gl.get_program_info_log(program(p)) }
    }

    fn delete_program(&self, p: ProgramId) {
        unsafe { self.gl.delete_program(program(p)) }
    }

    fn use_program(&self, p: Option<ProgramId>) {
        unsafe { self.gl.use_program(p.map(program)) }
    }

    fn attrib_location(&self, p: ProgramId, name: &str) -> Option<AttribLocation> {
        unsafe { self.gl.get_attrib_location(program(p), name) }.map(AttribLocation)
    }

    fn uniform_location(&self, p: ProgramId, name: &str) -> Option<UniformLocation> {
        unsafe { self.gl.get_uniform_location(program(p), name) }.map(|l| UniformLocation(l.0))
    }

    fn uniform_1i(&self, location: UniformLocation, value: i32) {
        unsafe { self.gl.uniform_1_i32(Some(&uniform(location)), value) }
    }

    fn uniform_matrix4(&self, location: UniformLocation, value: &[f32; 16]) {
        unsafe { self.gl.uniform_matrix_4_f32_slice(Some(&uniform(location)), false, value) }
    }

    // ── vertex attributes ─────────────────────────────────────────────────

    fn enable_vertex_attrib_array(&self, location: AttribLocation) {
        unsafe { self.gl.enable_vertex_attrib_array(location.0) }
        self.attribs.set(location.0, true);
    }

    fn disable_vertex_attrib_array(&self, location: AttribLocation) {
        unsafe { self.gl.disable_vertex_attrib_array(location.0) }
        self.attribs.set(location.0, false);
    }

    fn vertex_attrib_pointer_f32(&self, location: AttribLocation, components: i32, stride: i32, offset: i32) {
        unsafe {
            self.gl
                .vertex_attrib_pointer_f32(location.0, components, glow::FLOAT, false, stride, offset)
        }
    }

    // ── drawing ───────────────────────────────────────────────────────────

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.viewport(x, y, width, height) }
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        unsafe { self.gl.clear_color(r, g, b, a) }
    }

    fn clear(&self) {
        unsafe { self.gl.clear(glow::COLOR_BUFFER_BIT) }
    }

    fn draw_elements_u16(&self, p: Primitive, count: i32, offset: i32) {
        unsafe { self.gl.draw_elements(primitive(p), count, glow::UNSIGNED_SHORT, offset) }
    }

    fn read_pixels_rgba(&self, x: i32, y: i32, width: i32, height: i32, out: &mut [u8]) {
        unsafe {
            self.gl.read_pixels(
                x,
                y,
                width,
                height,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelPackData::Slice(out),
            )
        }
    }

    fn finish(&self) {
        unsafe { self.gl.finish() }
    }

    // ── diagnostics ───────────────────────────────────────────────────────

    fn get_error(&self) -> Option<u32> {
        match unsafe { self.gl.get_error() } {
            glow::NO_ERROR => None,
            code => Some(code),
        }
    }

    fn binding_snapshot(&self) -> BindingSnapshot {
        let gl = &self.gl;
        unsafe {
            let active = gl.get_parameter_i32(glow::ACTIVE_TEXTURE) as u32;
            let units = gl.get_parameter_i32(glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS).max(0) as u32;

            let mut textures = Vec::new();
            for unit in 0..units {
                gl.active_texture(glow::TEXTURE0 + unit);
                for (target, binding) in [
                    (TextureTarget::Texture2D, glow::TEXTURE_BINDING_2D),
                    (TextureTarget::External, TEXTURE_BINDING_EXTERNAL_OES),
                ] {
                    if let Some(name) = name_of(gl.get_parameter_i32(binding)) {
                        textures.push((unit, target, TextureId(name)));
                    }
                }
            }
            gl.active_texture(active);
            // Drivers without OES_EGL_image_external flag the external query.
            while gl.get_error() == glow::INVALID_ENUM {}

            let enabled_attribs = self.attribs.enabled();

            BindingSnapshot {
                program: name_of(gl.get_parameter_i32(glow::CURRENT_PROGRAM)).map(ProgramId),
                active_unit: active - glow::TEXTURE0,
                array_buffer: name_of(gl.get_parameter_i32(glow::ARRAY_BUFFER_BINDING)).map(BufferId),
                element_buffer: name_of(gl.get_parameter_i32(glow::ELEMENT_ARRAY_BUFFER_BINDING)).map(BufferId),
                framebuffer: name_of(gl.get_parameter_i32(glow::FRAMEBUFFER_BINDING)).map(FramebufferId),
                textures,
                enabled_attribs,
            }
        }
    }
}
