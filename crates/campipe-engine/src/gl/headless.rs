//! In-memory GL implementation.
//!
//! `HeadlessGl` keeps the object tables and binding state a GLES2 driver
//! would keep, allocates CPU storage for textures and the default
//! framebuffer, and records every draw submission. It does not rasterize
//! triangles: a draw is validated and logged, clears and readbacks operate
//! on real pixel storage.
//!
//! Shader "compilation" accepts any non-empty source without an `#error`
//! directive and extracts `attribute`/`uniform` declarations so location
//! lookups behave like a real linker's.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::num::NonZeroU64;

use crate::coords::Viewport;
use crate::feed::{CameraBuffer, Plane};

use super::{
    AttribLocation, BindingSnapshot, BufferId, BufferTarget, ExternalImage, Filter, FramebufferId, Gl,
    ImageImporter, PixelFormat, Primitive, ProgramId, ShaderId, ShaderStage, TextureId, TextureTarget,
    UniformLocation,
};

pub const GL_INVALID_ENUM: u32 = 0x0500;
pub const GL_INVALID_VALUE: u32 = 0x0501;
pub const GL_INVALID_OPERATION: u32 = 0x0502;
pub const GL_INVALID_FRAMEBUFFER_OPERATION: u32 = 0x0506;

const MAX_TEXTURE_UNITS: u32 = 16;

/// CPU-side texture storage. Rows are padded to 4 bytes, row 0 first.
#[derive(Debug, Clone, PartialEq)]
pub struct TexStorage {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub filter: Filter,
    pub data: Vec<u8>,
}

impl TexStorage {
    fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let stride = Self::stride_for(width, format);
        Self {
            width,
            height,
            format,
            filter: Filter::default(),
            data: vec![0; stride * height as usize],
        }
    }

    fn stride_for(width: u32, format: PixelFormat) -> usize {
        (width as usize * format.components()).next_multiple_of(4)
    }

    pub fn stride(&self) -> usize {
        Self::stride_for(self.width, self.format)
    }

    /// Pixel at `(x, y)` expanded to RGBA.
    pub fn rgba_at(&self, x: u32, y: u32) -> [u8; 4] {
        let n = self.format.components();
        let at = y as usize * self.stride() + x as usize * n;
        let px = &self.data[at..at + n];
        match self.format {
            PixelFormat::Luminance => [px[0], px[0], px[0], 255],
            PixelFormat::Rgb => [px[0], px[1], px[2], 255],
            PixelFormat::Rgba => [px[0], px[1], px[2], px[3]],
        }
    }

    fn fill(&mut self, rgba: [u8; 4]) {
        let n = self.format.components();
        let stride = self.stride();
        let row_bytes = self.width as usize * n;
        for row in self.data.chunks_mut(stride) {
            for px in row[..row_bytes].chunks_mut(n) {
                px.copy_from_slice(&rgba[..n]);
            }
        }
    }
}

/// One recorded `glDrawElements` submission.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: ProgramId,
    pub framebuffer: Option<FramebufferId>,
    pub viewport: Viewport,
    pub primitive: Primitive,
    pub count: i32,
    pub textures: Vec<(u32, TextureTarget, TextureId)>,
    pub enabled_attribs: Vec<AttribLocation>,
    /// Value of the program's `mvp` uniform at draw time, if it has one.
    pub mvp: Option<[f32; 16]>,
}

/// Counts of live objects, for leak checks.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct LiveObjects {
    pub buffers: usize,
    pub textures: usize,
    pub framebuffers: usize,
    pub shaders: usize,
    pub programs: usize,
    pub images: usize,
}

#[derive(Debug)]
struct ShaderObject {
    stage: ShaderStage,
    source: String,
    compiled: bool,
    log: String,
}

#[derive(Debug, Default)]
struct ProgramObject {
    shaders: Vec<ShaderId>,
    linked: bool,
    log: String,
    attributes: Vec<String>,
    uniforms: Vec<String>,
}

#[derive(Debug, Copy, Clone)]
struct AttribPointer {
    buffer: BufferId,
}

#[derive(Debug, Copy, Clone)]
enum UniformValue {
    Int(i32),
    Mat4([f32; 16]),
}

#[derive(Debug)]
struct State {
    next_name: u32,
    next_image: u64,
    fail_creation: bool,

    buffers: HashMap<BufferId, Vec<u8>>,
    textures: HashMap<TextureId, Option<TexStorage>>,
    framebuffers: HashMap<FramebufferId, Option<TextureId>>,
    shaders: HashMap<ShaderId, ShaderObject>,
    programs: HashMap<ProgramId, ProgramObject>,
    images: HashMap<ExternalImage, TextureId>,
    uniforms: HashMap<(ProgramId, UniformLocation), UniformValue>,
    screen: TexStorage,

    program: Option<ProgramId>,
    active_unit: u32,
    array_buffer: Option<BufferId>,
    element_buffer: Option<BufferId>,
    framebuffer: Option<FramebufferId>,
    texture_units: BTreeMap<(u32, TextureTarget), TextureId>,
    enabled_attribs: BTreeSet<AttribLocation>,
    attrib_pointers: HashMap<AttribLocation, AttribPointer>,
    viewport: Viewport,
    clear_color: [f32; 4],

    errors: VecDeque<u32>,
    draws: Vec<DrawRecord>,
}

impl State {
    fn name(&mut self) -> u32 {
        self.next_name += 1;
        self.next_name
    }

    fn error(&mut self, code: u32, what: &str) {
        log::trace!("headless gl error {code:#06x}: {what}");
        self.errors.push_back(code);
    }

    fn bound_texture(&self, target: TextureTarget) -> Option<TextureId> {
        self.texture_units.get(&(self.active_unit, target)).copied()
    }

    /// Storage backing the bound framebuffer's color attachment.
    fn target_storage(&mut self) -> Option<&mut TexStorage> {
        match self.framebuffer {
            None => Some(&mut self.screen),
            Some(fb) => {
                let tex = (*self.framebuffers.get(&fb)?)?;
                self.textures.get_mut(&tex)?.as_mut()
            }
        }
    }

    fn framebuffer_complete(&self) -> bool {
        let Some(fb) = self.framebuffer else { return true };
        let Some(Some(tex)) = self.framebuffers.get(&fb) else { return false };
        match self.textures.get(tex) {
            Some(Some(s)) => s.width > 0 && s.height > 0 && s.format != PixelFormat::Luminance,
            _ => false,
        }
    }
}

/// Headless GLES2 context. See the module docs.
#[derive(Debug)]
pub struct HeadlessGl {
    state: RefCell<State>,
}

impl HeadlessGl {
    /// Creates a context whose default framebuffer is `width x height` RGBA.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            state: RefCell::new(State {
                next_name: 0,
                next_image: 0,
                fail_creation: false,
                buffers: HashMap::new(),
                textures: HashMap::new(),
                framebuffers: HashMap::new(),
                shaders: HashMap::new(),
                programs: HashMap::new(),
                images: HashMap::new(),
                uniforms: HashMap::new(),
                screen: TexStorage::new(width, height, PixelFormat::Rgba),
                program: None,
                active_unit: 0,
                array_buffer: None,
                element_buffer: None,
                framebuffer: None,
                texture_units: BTreeMap::new(),
                enabled_attribs: BTreeSet::new(),
                attrib_pointers: HashMap::new(),
                viewport: Viewport::full(width, height),
                clear_color: [0.0; 4],
                errors: VecDeque::new(),
                draws: Vec::new(),
            }),
        }
    }

    /// Makes every subsequent `create_*` call fail until reset.
    pub fn set_fail_creation(&self, fail: bool) {
        self.state.borrow_mut().fail_creation = fail;
    }

    /// Draw submissions recorded so far.
    pub fn draws(&self) -> Vec<DrawRecord> {
        self.state.borrow().draws.clone()
    }

    pub fn clear_draws(&self) {
        self.state.borrow_mut().draws.clear();
    }

    pub fn texture_storage(&self, texture: TextureId) -> Option<TexStorage> {
        self.state.borrow().textures.get(&texture).cloned().flatten()
    }

    pub fn screen(&self) -> TexStorage {
        self.state.borrow().screen.clone()
    }

    pub fn buffer_contents(&self, buffer: BufferId) -> Option<Vec<u8>> {
        self.state.borrow().buffers.get(&buffer).cloned()
    }

    /// Current value of a mat4 uniform, looked up by name.
    pub fn uniform_matrix(&self, program: ProgramId, name: &str) -> Option<[f32; 16]> {
        let loc = self.uniform_location(program, name)?;
        match self.state.borrow().uniforms.get(&(program, loc)) {
            Some(UniformValue::Mat4(m)) => Some(*m),
            _ => None,
        }
    }

    /// Current value of an int/sampler uniform, looked up by name.
    pub fn uniform_int(&self, program: ProgramId, name: &str) -> Option<i32> {
        let loc = self.uniform_location(program, name)?;
        match self.state.borrow().uniforms.get(&(program, loc)) {
            Some(UniformValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn live_objects(&self) -> LiveObjects {
        let s = self.state.borrow();
        LiveObjects {
            buffers: s.buffers.len(),
            textures: s.textures.len(),
            framebuffers: s.framebuffers.len(),
            shaders: s.shaders.len(),
            programs: s.programs.len(),
            images: s.images.len(),
        }
    }

    /// Drains all pending error codes.
    pub fn take_errors(&self) -> Vec<u32> {
        self.state.borrow_mut().errors.drain(..).collect()
    }

    fn create_name(&self, what: &str) -> Result<u32, String> {
        let mut s = self.state.borrow_mut();
        if s.fail_creation {
            return Err(format!("out of memory creating {what}"));
        }
        Ok(s.name())
    }
}

/// Pulls declared names out of `qualifier`-prefixed lines, e.g.
/// `uniform highp mat4 mvp;` yields `mvp`.
fn declared_names(source: &str, qualifier: &str) -> Vec<String> {
    source
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix(qualifier)?;
            if !rest.starts_with(char::is_whitespace) {
                return None;
            }
            let decl = rest.split(';').next()?;
            let name = decl.split_whitespace().last()?;
            let name = name.split('[').next()?;
            Some(name.to_string())
        })
        .collect()
}

fn compile_log(source: &str) -> Option<String> {
    if source.trim().is_empty() {
        return Some("ERROR: 0:0: empty shader source".to_string());
    }
    source
        .lines()
        .enumerate()
        .find(|(_, line)| line.trim_start().starts_with("#error"))
        .map(|(i, line)| format!("ERROR: 0:{}: {}", i + 1, line.trim()))
}

impl Gl for HeadlessGl {
    // ── buffers ───────────────────────────────────────────────────────────

    fn create_buffer(&self) -> Result<BufferId, String> {
        let id = BufferId::from_raw(self.create_name("buffer")?).ok_or("name overflow")?;
        self.state.borrow_mut().buffers.insert(id, Vec::new());
        Ok(id)
    }

    fn delete_buffer(&self, buffer: BufferId) {
        let mut s = self.state.borrow_mut();
        s.buffers.remove(&buffer);
        if s.array_buffer == Some(buffer) {
            s.array_buffer = None;
        }
        if s.element_buffer == Some(buffer) {
            s.element_buffer = None;
        }
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<BufferId>) {
        let mut s = self.state.borrow_mut();
        if let Some(b) = buffer
            && !s.buffers.contains_key(&b)
        {
            s.error(GL_INVALID_OPERATION, "bind of deleted buffer");
            return;
        }
        match target {
            BufferTarget::Array => s.array_buffer = buffer,
            BufferTarget::ElementArray => s.element_buffer = buffer,
        }
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8]) {
        let mut s = self.state.borrow_mut();
        let bound = match target {
            BufferTarget::Array => s.array_buffer,
            BufferTarget::ElementArray => s.element_buffer,
        };
        match bound.and_then(|b| s.buffers.get_mut(&b)) {
            Some(store) => *store = data.to_vec(),
            None => s.error(GL_INVALID_OPERATION, "buffer_data with no buffer bound"),
        }
    }

    // ── textures ──────────────────────────────────────────────────────────

    fn create_texture(&self) -> Result<TextureId, String> {
        let id = TextureId::from_raw(self.create_name("texture")?).ok_or("name overflow")?;
        self.state.borrow_mut().textures.insert(id, None);
        Ok(id)
    }

    fn delete_texture(&self, texture: TextureId) {
        let mut s = self.state.borrow_mut();
        s.textures.remove(&texture);
        s.texture_units.retain(|_, t| *t != texture);
        for attachment in s.framebuffers.values_mut() {
            if *attachment == Some(texture) {
                *attachment = None;
            }
        }
    }

    fn active_texture(&self, unit: u32) {
        let mut s = self.state.borrow_mut();
        if unit >= MAX_TEXTURE_UNITS {
            s.error(GL_INVALID_ENUM, "texture unit out of range");
            return;
        }
        s.active_unit = unit;
    }

    fn bind_texture(&self, target: TextureTarget, texture: Option<TextureId>) {
        let mut s = self.state.borrow_mut();
        let unit = s.active_unit;
        match texture {
            Some(t) if !s.textures.contains_key(&t) => {
                s.error(GL_INVALID_OPERATION, "bind of deleted texture");
            }
            Some(t) => {
                s.texture_units.insert((unit, target), t);
            }
            None => {
                s.texture_units.remove(&(unit, target));
            }
        }
    }

    fn tex_image_2d(
        &self,
        target: TextureTarget,
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: Option<&[u8]>,
    ) {
        let mut s = self.state.borrow_mut();
        let Some(tex) = s.bound_texture(target) else {
            s.error(GL_INVALID_OPERATION, "tex_image_2d with no texture bound");
            return;
        };

        let mut storage = TexStorage::new(width, height, format);
        if let Some(pixels) = pixels {
            if pixels.len() < storage.data.len() {
                s.error(GL_INVALID_VALUE, "tex_image_2d pixel data too short");
                return;
            }
            let len = storage.data.len();
            storage.data.copy_from_slice(&pixels[..len]);
        }
        s.textures.insert(tex, Some(storage));
    }

    fn tex_parameters(&self, target: TextureTarget, filter: Filter) {
        let mut s = self.state.borrow_mut();
        let Some(tex) = s.bound_texture(target) else {
            s.error(GL_INVALID_OPERATION, "tex_parameters with no texture bound");
            return;
        };
        if let Some(Some(storage)) = s.textures.get_mut(&tex) {
            storage.filter = filter;
        }
    }

    // ── framebuffers ──────────────────────────────────────────────────────

    fn create_framebuffer(&self) -> Result<FramebufferId, String> {
        let id = FramebufferId::from_raw(self.create_name("framebuffer")?).ok_or("name overflow")?;
        self.state.borrow_mut().framebuffers.insert(id, None);
        Ok(id)
    }

    fn delete_framebuffer(&self, framebuffer: FramebufferId) {
        let mut s = self.state.borrow_mut();
        s.framebuffers.remove(&framebuffer);
        if s.framebuffer == Some(framebuffer) {
            s.framebuffer = None;
        }
    }

    fn bind_framebuffer(&self, framebuffer: Option<FramebufferId>) {
        let mut s = self.state.borrow_mut();
        if let Some(fb) = framebuffer
            && !s.framebuffers.contains_key(&fb)
        {
            s.error(GL_INVALID_OPERATION, "bind of deleted framebuffer");
            return;
        }
        s.framebuffer = framebuffer;
    }

    fn framebuffer_texture_2d(&self, texture: Option<TextureId>) {
        let mut s = self.state.borrow_mut();
        let Some(fb) = s.framebuffer else {
            s.error(GL_INVALID_OPERATION, "attachment to the default framebuffer");
            return;
        };
        s.framebuffers.insert(fb, texture);
    }

    fn framebuffer_complete(&self) -> bool {
        self.state.borrow().framebuffer_complete()
    }

    // ── shaders ───────────────────────────────────────────────────────────

    fn create_shader(&self, stage: ShaderStage) -> Result<ShaderId, String> {
        let id = ShaderId::from_raw(self.create_name("shader")?).ok_or("name overflow")?;
        self.state.borrow_mut().shaders.insert(
            id,
            ShaderObject { stage, source: String::new(), compiled: false, log: String::new() },
        );
        Ok(id)
    }

    fn shader_source(&self, shader: ShaderId, source: &str) {
        if let Some(obj) = self.state.borrow_mut().shaders.get_mut(&shader) {
            obj.source = source.to_string();
        }
    }

    fn compile_shader(&self, shader: ShaderId) {
        if let Some(obj) = self.state.borrow_mut().shaders.get_mut(&shader) {
            match compile_log(&obj.source) {
                Some(log) => {
                    obj.compiled = false;
                    obj.log = log;
                }
                None => {
                    obj.compiled = true;
                    obj.log.clear();
                }
            }
        }
    }

    fn shader_compile_status(&self, shader: ShaderId) -> bool {
        self.state.borrow().shaders.get(&shader).is_some_and(|s| s.compiled)
    }

    fn shader_info_log(&self, shader: ShaderId) -> String {
        self.state.borrow().shaders.get(&shader).map(|s| s.log.clone()).unwrap_or_default()
    }

    fn delete_shader(&self, shader: ShaderId) {
        self.state.borrow_mut().shaders.remove(&shader);
    }

    fn create_program(&self) -> Result<ProgramId, String> {
        let id = ProgramId::from_raw(self.create_name("program")?).ok_or("name overflow")?;
        self.state.borrow_mut().programs.insert(id, ProgramObject::default());
        Ok(id)
    }

    fn attach_shader(&self, program: ProgramId, shader: ShaderId) {
        if let Some(p) = self.state.borrow_mut().programs.get_mut(&program) {
            p.shaders.push(shader);
        }
    }

    fn link_program(&self, program: ProgramId) {
        let mut s = self.state.borrow_mut();
        let State { programs, shaders, .. } = &mut *s;
        let Some(p) = programs.get_mut(&program) else { return };

        let stages: Vec<&ShaderObject> = p.shaders.iter().filter_map(|id| shaders.get(id)).collect();
        let vertex = stages.iter().find(|s| s.stage == ShaderStage::Vertex);
        let fragment = stages.iter().find(|s| s.stage == ShaderStage::Fragment);

        match (vertex, fragment) {
            (Some(vs), Some(fs)) if vs.compiled && fs.compiled => {
                p.attributes = declared_names(&vs.source, "attribute");
                p.uniforms = declared_names(&vs.source, "uniform");
                for name in declared_names(&fs.source, "uniform") {
                    if !p.uniforms.contains(&name) {
                        p.uniforms.push(name);
                    }
                }
                p.linked = true;
                p.log.clear();
            }
            (Some(_), Some(_)) => {
                p.linked = false;
                p.log = "ERROR: one or more attached shaders not successfully compiled".into();
            }
            _ => {
                p.linked = false;
                p.log = "ERROR: program needs a vertex and a fragment shader".into();
            }
        }
    }

    fn program_link_status(&self, program: ProgramId) -> bool {
        self.state.borrow().programs.get(&program).is_some_and(|p| p.linked)
    }

    fn program_info_log(&self, program: ProgramId) -> String {
        self.state.borrow().programs.get(&program).map(|p| p.log.clone()).unwrap_or_default()
    }

    fn delete_program(&self, program: ProgramId) {
        let mut s = self.state.borrow_mut();
        s.programs.remove(&program);
        s.uniforms.retain(|(p, _), _| *p != program);
        if s.program == Some(program) {
            s.program = None;
        }
    }

    fn use_program(&self, program: Option<ProgramId>) {
        let mut s = self.state.borrow_mut();
        if let Some(p) = program
            && !s.programs.get(&p).is_some_and(|p| p.linked)
        {
            s.error(GL_INVALID_OPERATION, "use of unlinked program");
            return;
        }
        s.program = program;
    }

    fn attrib_location(&self, program: ProgramId, name: &str) -> Option<AttribLocation> {
        let s = self.state.borrow();
        let p = s.programs.get(&program).filter(|p| p.linked)?;
        p.attributes.iter().position(|a| a == name).map(|i| AttribLocation(i as u32))
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let s = self.state.borrow();
        let p = s.programs.get(&program).filter(|p| p.linked)?;
        p.uniforms.iter().position(|u| u == name).map(|i| UniformLocation(i as u32))
    }

    fn uniform_1i(&self, location: UniformLocation, value: i32) {
        let mut s = self.state.borrow_mut();
        let Some(p) = s.program else {
            s.error(GL_INVALID_OPERATION, "uniform with no program in use");
            return;
        };
        s.uniforms.insert((p, location), UniformValue::Int(value));
    }

    fn uniform_matrix4(&self, location: UniformLocation, value: &[f32; 16]) {
        let mut s = self.state.borrow_mut();
        let Some(p) = s.program else {
            s.error(GL_INVALID_OPERATION, "uniform with no program in use");
            return;
        };
        s.uniforms.insert((p, location), UniformValue::Mat4(*value));
    }

    // ── vertex attributes ─────────────────────────────────────────────────

    fn enable_vertex_attrib_array(&self, location: AttribLocation) {
        self.state.borrow_mut().enabled_attribs.insert(location);
    }

    fn disable_vertex_attrib_array(&self, location: AttribLocation) {
        self.state.borrow_mut().enabled_attribs.remove(&location);
    }

    fn vertex_attrib_pointer_f32(&self, location: AttribLocation, components: i32, stride: i32, offset: i32) {
        let mut s = self.state.borrow_mut();
        if !(1..=4).contains(&components) || stride < 0 || offset < 0 {
            s.error(GL_INVALID_VALUE, "bad vertex attribute layout");
            return;
        }
        let Some(buffer) = s.array_buffer else {
            s.error(GL_INVALID_OPERATION, "attribute pointer with no array buffer bound");
            return;
        };
        s.attrib_pointers.insert(location, AttribPointer { buffer });
    }

    // ── drawing ───────────────────────────────────────────────────────────

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        let mut s = self.state.borrow_mut();
        if width < 0 || height < 0 {
            s.error(GL_INVALID_VALUE, "negative viewport");
            return;
        }
        s.viewport = Viewport::new(x, y, width, height);
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        self.state.borrow_mut().clear_color = [r, g, b, a];
    }

    fn clear(&self) {
        let mut s = self.state.borrow_mut();
        if !s.framebuffer_complete() {
            s.error(GL_INVALID_FRAMEBUFFER_OPERATION, "clear of incomplete framebuffer");
            return;
        }
        let [r, g, b, a] = s.clear_color;
        let rgba = crate::coords::ColorRgba::new(r, g, b, a).to_rgba8();
        if let Some(storage) = s.target_storage() {
            storage.fill(rgba);
        }
    }

    fn draw_elements_u16(&self, primitive: Primitive, count: i32, offset: i32) {
        let mut s = self.state.borrow_mut();

        let Some(program) = s.program else {
            s.error(GL_INVALID_OPERATION, "draw with no program in use");
            return;
        };
        if !s.framebuffer_complete() {
            s.error(GL_INVALID_FRAMEBUFFER_OPERATION, "draw into incomplete framebuffer");
            return;
        }
        let index_bytes = s.element_buffer.and_then(|b| s.buffers.get(&b)).map_or(0, Vec::len);
        if count < 0 || offset < 0 || (offset as usize + count as usize * 2) > index_bytes {
            s.error(GL_INVALID_OPERATION, "index range exceeds element buffer");
            return;
        }
        let missing_pointer = s.enabled_attribs.iter().any(|loc| {
            s.attrib_pointers
                .get(loc)
                .is_none_or(|p| !s.buffers.contains_key(&p.buffer))
        });
        if missing_pointer {
            s.error(GL_INVALID_OPERATION, "enabled attribute without a live buffer");
            return;
        }

        let mvp = s
            .programs
            .get(&program)
            .and_then(|p| p.uniforms.iter().position(|u| u == "mvp"))
            .and_then(|i| match s.uniforms.get(&(program, UniformLocation(i as u32))) {
                Some(UniformValue::Mat4(m)) => Some(*m),
                _ => None,
            });

        let record = DrawRecord {
            program,
            framebuffer: s.framebuffer,
            viewport: s.viewport,
            primitive,
            count,
            textures: s.texture_units.iter().map(|(&(unit, target), &tex)| (unit, target, tex)).collect(),
            enabled_attribs: s.enabled_attribs.iter().copied().collect(),
            mvp,
        };
        s.draws.push(record);
    }

    fn read_pixels_rgba(&self, x: i32, y: i32, width: i32, height: i32, out: &mut [u8]) {
        let mut s = self.state.borrow_mut();
        if width < 0 || height < 0 || out.len() < width as usize * height as usize * 4 {
            s.error(GL_INVALID_VALUE, "read_pixels destination too small");
            return;
        }
        let Some(storage) = s.target_storage() else {
            s.error(GL_INVALID_FRAMEBUFFER_OPERATION, "read from incomplete framebuffer");
            return;
        };

        for row in 0..height {
            for col in 0..width {
                let (sx, sy) = (x + col, y + row);
                let px = if sx >= 0 && sy >= 0 && (sx as u32) < storage.width && (sy as u32) < storage.height {
                    storage.rgba_at(sx as u32, sy as u32)
                } else {
                    [0; 4]
                };
                let at = (row as usize * width as usize + col as usize) * 4;
                out[at..at + 4].copy_from_slice(&px);
            }
        }
    }

    fn finish(&self) {}

    // ── diagnostics ───────────────────────────────────────────────────────

    fn get_error(&self) -> Option<u32> {
        self.state.borrow_mut().errors.pop_front()
    }

    fn binding_snapshot(&self) -> BindingSnapshot {
        let s = self.state.borrow();
        BindingSnapshot {
            program: s.program,
            active_unit: s.active_unit,
            array_buffer: s.array_buffer,
            element_buffer: s.element_buffer,
            framebuffer: s.framebuffer,
            textures: s.texture_units.iter().map(|(&(unit, target), &tex)| (unit, target, tex)).collect(),
            enabled_attribs: s.enabled_attribs.iter().copied().collect(),
        }
    }
}

impl ImageImporter for HeadlessGl {
    fn import(&self, buffer: &CameraBuffer, plane: Plane, texture: TextureId) -> Result<ExternalImage, String> {
        let (bytes, width, height) = buffer.plane(plane);
        let mut s = self.state.borrow_mut();
        if !s.textures.contains_key(&texture) {
            return Err(format!("texture {} does not exist", texture.get()));
        }

        let mut storage = TexStorage::new(width, height, PixelFormat::Luminance);
        let stride = storage.stride();
        for (row, src) in bytes.chunks(width as usize).take(height as usize).enumerate() {
            storage.data[row * stride..row * stride + src.len()].copy_from_slice(src);
        }
        s.textures.insert(texture, Some(storage));

        s.next_image += 1;
        let image = ExternalImage(NonZeroU64::new(s.next_image).ok_or("image name overflow")?);
        s.images.insert(image, texture);
        Ok(image)
    }

    fn release(&self, image: ExternalImage) {
        if self.state.borrow_mut().images.remove(&image).is_none() {
            log::warn!("release of unknown external image {}", image.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = "attribute vec2 position;\nattribute vec2 tc;\nuniform mat4 mvp;\nvoid main() {}\n";
    const FS: &str = "precision mediump float;\nuniform sampler2D tex;\nvoid main() {}\n";

    fn program(gl: &HeadlessGl, vs: &str, fs: &str) -> ProgramId {
        let v = gl.create_shader(ShaderStage::Vertex).unwrap();
        gl.shader_source(v, vs);
        gl.compile_shader(v);
        let f = gl.create_shader(ShaderStage::Fragment).unwrap();
        gl.shader_source(f, fs);
        gl.compile_shader(f);
        let p = gl.create_program().unwrap();
        gl.attach_shader(p, v);
        gl.attach_shader(p, f);
        gl.link_program(p);
        p
    }

    #[test]
    fn declared_names_handles_qualifiers() {
        let src = "uniform highp mat4 mvp;\n  uniform float k[4];\nuniformity x;\nattribute vec2 tc;";
        assert_eq!(declared_names(src, "uniform"), vec!["mvp", "k"]);
        assert_eq!(declared_names(src, "attribute"), vec!["tc"]);
    }

    #[test]
    fn linked_program_resolves_locations() {
        let gl = HeadlessGl::new(4, 4);
        let p = program(&gl, VS, FS);
        assert!(gl.program_link_status(p));
        assert_eq!(gl.attrib_location(p, "tc"), Some(AttribLocation(1)));
        assert!(gl.uniform_location(p, "tex").is_some());
        assert!(gl.attrib_location(p, "normal").is_none());
    }

    #[test]
    fn error_directive_fails_compile_with_line() {
        let gl = HeadlessGl::new(4, 4);
        let s = gl.create_shader(ShaderStage::Fragment).unwrap();
        gl.shader_source(s, "void main() {}\n#error broken\n");
        gl.compile_shader(s);
        assert!(!gl.shader_compile_status(s));
        assert!(gl.shader_info_log(s).contains("0:2"));
    }

    #[test]
    fn clear_and_read_back_framebuffer() {
        let gl = HeadlessGl::new(4, 4);
        let tex = gl.create_texture().unwrap();
        gl.bind_texture(TextureTarget::Texture2D, Some(tex));
        gl.tex_image_2d(TextureTarget::Texture2D, 3, 2, PixelFormat::Rgba, None);
        gl.bind_texture(TextureTarget::Texture2D, None);

        let fb = gl.create_framebuffer().unwrap();
        gl.bind_framebuffer(Some(fb));
        gl.framebuffer_texture_2d(Some(tex));
        assert!(gl.framebuffer_complete());

        gl.clear_color(1.0, 0.0, 0.0, 1.0);
        gl.clear();
        let mut out = vec![0u8; 3 * 2 * 4];
        gl.read_pixels_rgba(0, 0, 3, 2, &mut out);
        gl.bind_framebuffer(None);

        assert!(out.chunks(4).all(|px| px == [255, 0, 0, 255]));
        assert!(gl.take_errors().is_empty());
    }

    #[test]
    fn zero_sized_attachment_is_incomplete() {
        let gl = HeadlessGl::new(4, 4);
        let tex = gl.create_texture().unwrap();
        gl.bind_texture(TextureTarget::Texture2D, Some(tex));
        gl.tex_image_2d(TextureTarget::Texture2D, 0, 0, PixelFormat::Rgba, None);
        let fb = gl.create_framebuffer().unwrap();
        gl.bind_framebuffer(Some(fb));
        gl.framebuffer_texture_2d(Some(tex));
        assert!(!gl.framebuffer_complete());
    }

    #[test]
    fn draw_without_program_records_error() {
        let gl = HeadlessGl::new(4, 4);
        gl.draw_elements_u16(Primitive::Triangles, 3, 0);
        assert_eq!(gl.get_error(), Some(GL_INVALID_OPERATION));
        assert!(gl.draws().is_empty());
    }

    #[test]
    fn failing_creation_reports_err() {
        let gl = HeadlessGl::new(4, 4);
        gl.set_fail_creation(true);
        assert!(gl.create_texture().is_err());
        gl.set_fail_creation(false);
        assert!(gl.create_texture().is_ok());
    }
}
