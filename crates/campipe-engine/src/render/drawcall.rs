//! Declarative draw calls.
//!
//! A [`DrawCall`] records everything one `glDrawElements` needs (program,
//! buffers, named textures and attributes, viewport, target) and replays it
//! with [`DrawCall::draw`]. Every draw starts from and returns to the
//! unbound baseline: no program, texture unit 0, no buffers, textures or
//! enabled attribute arrays, default framebuffer.

use bytemuck::Pod;

use crate::coords::{Mat4, Viewport};
use crate::error::{BindingKind, Error, Result};
use crate::feed::FeedPlanes;
use crate::gl::{AttribLocation, BufferId, BufferTarget, Primitive, ProgramId, TextureId, TextureTarget, UniformLocation};

use super::bindings::BindingTable;
use super::{FboTarget, Program, RenderCtx};

/// Float vertex attribute sourced from the draw call's vertex buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AttributeBinding {
    pub location: AttribLocation,
    pub components: i32,
    /// Bytes between consecutive vertices.
    pub stride: i32,
    /// Byte offset of the first component.
    pub offset: i32,
}

/// A named texture input. `unit` is fixed when the name is first seen.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TextureBinding {
    pub target: TextureTarget,
    pub texture: Option<TextureId>,
    pub unit: u32,
}

#[derive(Debug)]
pub struct DrawCall {
    label: String,
    program: ProgramId,
    vertex_buffer: BufferId,
    index_buffer: BufferId,
    buffers: BindingTable<BufferTarget, BufferId>,
    textures: BindingTable<String, TextureBinding>,
    attributes: BindingTable<String, AttributeBinding>,
    /// Texture slots filled from the feed passed to `draw`, in plane order.
    feed_slots: Vec<usize>,
    index_count: i32,
    viewport: Viewport,
    fbo: Option<FboTarget>,
    mvp: Option<UniformLocation>,
    primitive: Primitive,
}

impl DrawCall {
    /// Allocates the vertex and index buffers. The program is referenced,
    /// not owned.
    pub fn create(ctx: &RenderCtx<'_>, program: &Program) -> Result<Self> {
        let gl = ctx.gl;
        let label = program.name().to_string();

        let vertex_buffer = gl.create_buffer().map_err(|msg| {
            log::error!("{label}: failed to create vertex buffer: {msg}");
            Error::creation("vertex buffer", msg)
        })?;
        let index_buffer = match gl.create_buffer() {
            Ok(b) => b,
            Err(msg) => {
                log::error!("{label}: failed to create index buffer: {msg}");
                gl.delete_buffer(vertex_buffer);
                return Err(Error::creation("index buffer", msg));
            }
        };

        let mut buffers = BindingTable::new(BindingKind::Buffer);
        buffers.push(BufferTarget::Array, vertex_buffer)?;
        buffers.push(BufferTarget::ElementArray, index_buffer)?;

        Ok(Self {
            label,
            program: program.id(),
            vertex_buffer,
            index_buffer,
            buffers,
            textures: BindingTable::new(BindingKind::Texture),
            attributes: BindingTable::new(BindingKind::Attribute),
            feed_slots: Vec::new(),
            index_count: 0,
            viewport: Viewport::default(),
            fbo: None,
            mvp: None,
            primitive: Primitive::TriangleStrip,
        })
    }

    // ── geometry ──────────────────────────────────────────────────────────

    /// Declares (or updates) a float attribute. The shader location is
    /// looked up the first time `name` is seen.
    pub fn set_attribute(
        &mut self,
        ctx: &RenderCtx<'_>,
        name: &str,
        components: i32,
        stride: i32,
        offset: i32,
    ) -> Result<()> {
        if let Some(b) = self.attributes.get_mut(name) {
            b.components = components;
            b.stride = stride;
            b.offset = offset;
            return Ok(());
        }

        let location = ctx.gl.attrib_location(self.program, name).ok_or_else(|| {
            log::error!("{}: program has no attribute {name:?}", self.label);
            Error::MissingAttribute(name.to_string())
        })?;
        self.attributes
            .push(name.to_string(), AttributeBinding { location, components, stride, offset })?;
        Ok(())
    }

    /// Replaces the vertex buffer contents.
    pub fn set_vertex_data<T: Pod>(&mut self, ctx: &RenderCtx<'_>, vertices: &[T]) {
        ctx.gl.bind_buffer(BufferTarget::Array, Some(self.vertex_buffer));
        ctx.gl.buffer_data(BufferTarget::Array, bytemuck::cast_slice(vertices));
        ctx.gl.bind_buffer(BufferTarget::Array, None);
    }

    /// Replaces the index buffer contents; the draw uses all of them.
    pub fn set_indices(&mut self, ctx: &RenderCtx<'_>, indices: &[u16]) {
        ctx.gl.bind_buffer(BufferTarget::ElementArray, Some(self.index_buffer));
        ctx.gl.buffer_data(BufferTarget::ElementArray, bytemuck::cast_slice(indices));
        ctx.gl.bind_buffer(BufferTarget::ElementArray, None);
        self.index_count = indices.len() as i32;
    }

    pub fn set_primitive(&mut self, primitive: Primitive) {
        self.primitive = primitive;
    }

    // ── textures ──────────────────────────────────────────────────────────

    /// Binds `texture` to the sampler `name`, returning its texture unit.
    ///
    /// Units follow first-registration order: the Nth distinct name set on
    /// this draw call always samples unit N. Re-setting a name only swaps
    /// the texture.
    pub fn set_texture(
        &mut self,
        ctx: &RenderCtx<'_>,
        name: &str,
        target: TextureTarget,
        texture: TextureId,
    ) -> Result<u32> {
        let slot = self.register_texture(ctx, name, target, Some(texture))?;
        Ok(slot.unit)
    }

    /// Clears the texture bound to `name` while keeping its unit.
    pub fn clear_texture(&mut self, name: &str) {
        if let Some(b) = self.textures.get_mut(name) {
            b.texture = None;
        }
    }

    /// Reserves one texture slot per sampler, filled at draw time from the
    /// feed passed to [`DrawCall::draw`] (plane `i` goes to `samplers[i]`).
    /// The stored bindings are never modified by a draw.
    pub fn set_feed_planes(&mut self, ctx: &RenderCtx<'_>, samplers: &[&str]) -> Result<()> {
        let mut slots = Vec::with_capacity(samplers.len());
        for name in samplers {
            let index = match self.textures.position(*name) {
                Some(i) => i,
                None => {
                    self.register_texture(ctx, name, TextureTarget::Texture2D, None)?;
                    self.textures.len() - 1
                }
            };
            slots.push(index);
        }
        self.feed_slots = slots;
        Ok(())
    }

    fn register_texture(
        &mut self,
        ctx: &RenderCtx<'_>,
        name: &str,
        target: TextureTarget,
        texture: Option<TextureId>,
    ) -> Result<TextureBinding> {
        if let Some(b) = self.textures.get_mut(name) {
            b.target = target;
            b.texture = texture;
            return Ok(*b);
        }

        let binding = TextureBinding { target, texture, unit: self.textures.len() as u32 };
        self.textures.push(name.to_string(), binding)?;

        let gl = ctx.gl;
        match gl.uniform_location(self.program, name) {
            Some(loc) => {
                gl.use_program(Some(self.program));
                gl.uniform_1i(loc, binding.unit as i32);
                gl.use_program(None);
            }
            // Compilers drop unused samplers; binding the texture is harmless.
            None => log::debug!("{}: program has no sampler {name:?}", self.label),
        }
        Ok(binding)
    }

    // ── target and transform ──────────────────────────────────────────────

    /// Renders into `fbo` (or the screen for `None`). Also resets the
    /// viewport to the full target extent.
    pub fn set_fbo(&mut self, fbo: Option<FboTarget>) {
        self.fbo = fbo;
        if let Some(f) = fbo {
            self.viewport = Viewport::full(f.width, f.height);
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Uploads `mvp` to the program's `mvp` uniform right away.
    pub fn set_mvp(&mut self, ctx: &RenderCtx<'_>, mvp: &Mat4) -> Result<()> {
        let loc = match self.mvp {
            Some(loc) => loc,
            None => {
                let loc = ctx
                    .gl
                    .uniform_location(self.program, "mvp")
                    .ok_or_else(|| Error::MissingUniform("mvp".into()))?;
                self.mvp = Some(loc);
                loc
            }
        };
        ctx.gl.use_program(Some(self.program));
        ctx.gl.uniform_matrix4(loc, mvp.as_array());
        ctx.gl.use_program(None);
        Ok(())
    }

    // ── execution ─────────────────────────────────────────────────────────

    fn resolve(&self, slot: usize, binding: &TextureBinding, feed: Option<&FeedPlanes>) -> Option<(TextureTarget, TextureId)> {
        match self.feed_slots.iter().position(|&s| s == slot) {
            Some(plane) => feed?.get(plane).map(|p| (p.target, p.texture)),
            None => binding.texture.map(|t| (binding.target, t)),
        }
    }

    /// Binds everything, draws, and unbinds everything again.
    ///
    /// Does not validate: the bindings were checked when they were set, and
    /// driver failures are only visible through the opt-in debug checks.
    pub fn draw(&self, ctx: &RenderCtx<'_>, feed: Option<&FeedPlanes>) {
        if self.index_count == 0 {
            return;
        }
        let gl = ctx.gl;
        let before = ctx.checks.check_bindings.then(|| gl.binding_snapshot());

        gl.bind_framebuffer(self.fbo.map(|f| f.framebuffer));
        let vp = self.viewport;
        gl.viewport(vp.x, vp.y, vp.width, vp.height);
        gl.use_program(Some(self.program));

        for (slot, (_, b)) in self.textures.iter().enumerate() {
            if let Some((target, texture)) = self.resolve(slot, b, feed) {
                gl.active_texture(b.unit);
                gl.bind_texture(target, Some(texture));
            }
        }
        for (&target, &buffer) in self.buffers.iter() {
            gl.bind_buffer(target, Some(buffer));
        }
        for a in self.attributes.values() {
            gl.enable_vertex_attrib_array(a.location);
            gl.vertex_attrib_pointer_f32(a.location, a.components, a.stride, a.offset);
        }

        gl.draw_elements_u16(self.primitive, self.index_count, 0);

        for a in self.attributes.values() {
            gl.disable_vertex_attrib_array(a.location);
        }
        for (&target, _) in self.buffers.iter() {
            gl.bind_buffer(target, None);
        }
        for (slot, (_, b)) in self.textures.iter().enumerate() {
            if let Some((target, _)) = self.resolve(slot, b, feed) {
                gl.active_texture(b.unit);
                gl.bind_texture(target, None);
            }
        }
        gl.active_texture(0);
        gl.use_program(None);
        if self.fbo.is_some() {
            gl.bind_framebuffer(None);
        }

        if ctx.checks.check_errors {
            ctx.drain_errors(&self.label);
        }
        if let Some(before) = before {
            let after = gl.binding_snapshot();
            if before != after {
                log::warn!("{}: binding state changed across draw\n before: {before:?}\n after:  {after:?}", self.label);
            }
        }
    }

    /// Releases the buffers this draw call owns. Programs, textures and
    /// FBOs it references are left alone.
    pub fn destroy(self, ctx: &RenderCtx<'_>) {
        ctx.gl.delete_buffer(self.vertex_buffer);
        ctx.gl.delete_buffer(self.index_buffer);
    }

    // ── accessors ─────────────────────────────────────────────────────────

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    #[inline]
    pub fn program(&self) -> ProgramId {
        self.program
    }

    #[inline]
    pub fn index_count(&self) -> i32 {
        self.index_count
    }

    #[inline]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[inline]
    pub fn fbo(&self) -> Option<FboTarget> {
        self.fbo
    }

    #[inline]
    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    #[inline]
    pub fn vertex_buffer(&self) -> BufferId {
        self.vertex_buffer
    }

    #[inline]
    pub fn index_buffer(&self) -> BufferId {
        self.index_buffer
    }

    pub fn texture(&self, name: &str) -> Option<TextureBinding> {
        self.textures.get(name).copied()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn attribute(&self, name: &str) -> Option<AttributeBinding> {
        self.attributes.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::PlaneTexture;
    use crate::gl::{Gl, HeadlessGl};
    use crate::render::shader::{COMPOSITOR_VS, QUAD_FS};
    use crate::render::{Fbo, ShaderLibrary};

    const QUAD: [f32; 16] = [
        -1.0, -1.0, 0.0, 0.0, //
        1.0, -1.0, 1.0, 0.0, //
        -1.0, 1.0, 0.0, 1.0, //
        1.0, 1.0, 1.0, 1.0,
    ];

    fn setup(gl: &HeadlessGl) -> (Program, DrawCall) {
        let ctx = RenderCtx::new(gl);
        let program = ShaderLibrary::builtin().program(&ctx, COMPOSITOR_VS, QUAD_FS).unwrap();
        let mut dc = DrawCall::create(&ctx, &program).unwrap();
        dc.set_vertex_data(&ctx, &QUAD);
        dc.set_indices(&ctx, &[0, 1, 2, 3]);
        dc.set_attribute(&ctx, "position", 2, 16, 0).unwrap();
        dc.set_attribute(&ctx, "tc", 2, 16, 8).unwrap();
        dc.set_viewport(Viewport::new(0, 0, 8, 8));
        (program, dc)
    }

    fn texture(gl: &HeadlessGl) -> TextureId {
        gl.create_texture().unwrap()
    }

    // ── bindings ──

    #[test]
    fn set_texture_twice_updates_one_slot() {
        let gl = HeadlessGl::new(8, 8);
        let ctx = RenderCtx::new(&gl);
        let (_, mut dc) = setup(&gl);
        let (h1, h2) = (texture(&gl), texture(&gl));

        assert_eq!(dc.set_texture(&ctx, "tex", TextureTarget::Texture2D, h1).unwrap(), 0);
        assert_eq!(dc.set_texture(&ctx, "tex", TextureTarget::Texture2D, h2).unwrap(), 0);
        assert_eq!(dc.texture_count(), 1);
        assert_eq!(dc.texture("tex").unwrap().texture, Some(h2));
    }

    #[test]
    fn units_follow_first_registration_order() {
        let gl = HeadlessGl::new(8, 8);
        let ctx = RenderCtx::new(&gl);
        let (program, mut dc) = setup(&gl);
        let t = texture(&gl);

        assert_eq!(dc.set_texture(&ctx, "lut", TextureTarget::Texture2D, t).unwrap(), 0);
        assert_eq!(dc.set_texture(&ctx, "tex", TextureTarget::Texture2D, t).unwrap(), 1);
        assert_eq!(dc.set_texture(&ctx, "lut", TextureTarget::Texture2D, t).unwrap(), 0);
        assert_eq!(gl.uniform_int(program.id(), "tex"), Some(1));
        assert!(gl.binding_snapshot().program.is_none());
    }

    #[test]
    fn unknown_attribute_is_rejected() {
        let gl = HeadlessGl::new(8, 8);
        let ctx = RenderCtx::new(&gl);
        let (_, mut dc) = setup(&gl);
        let err = dc.set_attribute(&ctx, "normal", 3, 12, 0).unwrap_err();
        assert!(matches!(err, Error::MissingAttribute(name) if name == "normal"));
    }

    #[test]
    fn texture_table_overflow_is_an_error() {
        let gl = HeadlessGl::new(8, 8);
        let ctx = RenderCtx::new(&gl);
        let (_, mut dc) = setup(&gl);
        let t = texture(&gl);
        for i in 0..10 {
            dc.set_texture(&ctx, &format!("t{i}"), TextureTarget::Texture2D, t).unwrap();
        }
        assert!(matches!(
            dc.set_texture(&ctx, "t10", TextureTarget::Texture2D, t),
            Err(Error::BindingTableFull { kind: BindingKind::Texture, .. })
        ));
    }

    // ── draw ──

    #[test]
    fn draw_restores_baseline_state() {
        let gl = HeadlessGl::new(8, 8);
        let ctx = RenderCtx::new(&gl);
        let (_, mut dc) = setup(&gl);
        let (a, b) = (texture(&gl), texture(&gl));
        dc.set_texture(&ctx, "tex", TextureTarget::Texture2D, a).unwrap();
        dc.set_texture(&ctx, "other", TextureTarget::Texture2D, b).unwrap();

        let before = gl.binding_snapshot();
        dc.draw(&ctx, None);
        assert_eq!(gl.binding_snapshot(), before);
        assert!(gl.take_errors().is_empty());

        let draws = gl.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].count, 4);
        assert_eq!(draws[0].primitive, Primitive::TriangleStrip);
        assert_eq!(draws[0].textures.len(), 2);
        assert_eq!(draws[0].enabled_attribs.len(), 2);
    }

    #[test]
    fn fbo_target_sets_full_viewport() {
        let gl = HeadlessGl::new(8, 8);
        let ctx = RenderCtx::new(&gl);
        let (_, mut dc) = setup(&gl);
        let fbo = Fbo::create(&ctx, 32, 16).unwrap();

        dc.set_fbo(Some(fbo.target()));
        assert_eq!(dc.viewport(), Viewport::new(0, 0, 32, 16));
        dc.draw(&ctx, None);

        let draw = &gl.draws()[0];
        assert_eq!(draw.framebuffer, Some(fbo.target().framebuffer));
        assert_eq!(draw.viewport, Viewport::new(0, 0, 32, 16));
        assert!(gl.binding_snapshot().framebuffer.is_none());
    }

    #[test]
    fn feed_planes_are_substituted_only_during_draw() {
        let gl = HeadlessGl::new(8, 8);
        let ctx = RenderCtx::new(&gl);
        let (_, mut dc) = setup(&gl);
        dc.set_feed_planes(&ctx, &["tex"]).unwrap();

        let t = texture(&gl);
        let planes = FeedPlanes::new(vec![PlaneTexture { sampler: "tex", target: TextureTarget::External, texture: t }]);

        dc.draw(&ctx, Some(&planes));
        dc.draw(&ctx, None);

        let draws = gl.draws();
        assert_eq!(draws[0].textures, vec![(0, TextureTarget::External, t)]);
        assert!(draws[1].textures.is_empty());
        assert_eq!(dc.texture("tex").unwrap().texture, None);
        assert!(gl.binding_snapshot().textures.is_empty());
    }

    #[test]
    fn mvp_is_uploaded_immediately() {
        let gl = HeadlessGl::new(8, 8);
        let ctx = RenderCtx::new(&gl);
        let (program, mut dc) = setup(&gl);
        let m = Mat4::scale(2.0, 3.0, 1.0);

        dc.set_mvp(&ctx, &m).unwrap();
        assert_eq!(gl.uniform_matrix(program.id(), "mvp"), Some(*m.as_array()));
        assert!(gl.binding_snapshot().program.is_none());
    }

    #[test]
    fn empty_index_buffer_skips_draw() {
        let gl = HeadlessGl::new(8, 8);
        let ctx = RenderCtx::new(&gl);
        let (_, mut dc) = setup(&gl);
        dc.set_indices(&ctx, &[]);
        dc.draw(&ctx, None);
        assert!(gl.draws().is_empty());
    }

    #[test]
    fn destroy_releases_only_owned_buffers() {
        let gl = HeadlessGl::new(8, 8);
        let ctx = RenderCtx::new(&gl);
        let (program, dc) = setup(&gl);
        let buffers = gl.live_objects().buffers;
        dc.destroy(&ctx);
        assert_eq!(gl.live_objects().buffers, buffers - 2);
        assert_eq!(gl.live_objects().programs, 1);
        program.destroy(&ctx);
    }
}
