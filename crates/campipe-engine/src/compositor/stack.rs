use crate::coords::{ColorRgba, Mat4, Rect, Viewport};
use crate::error::{Error, Result};
use crate::feed::FeedPlanes;
use crate::gl::{TextureId, TextureTarget, UniformLocation};
use crate::render::shader::{COMPOSITOR_VS, QUAD_FS};
use crate::render::{DrawCall, FboTarget, Program, RenderCtx, ShaderLibrary};

use super::{Layer, LayerId};

/// Full-target quad: clip-space positions, texture coordinates in `[0, 1]`.
const QUAD: [f32; 16] = [
    -1.0, -1.0, 0.0, 0.0, //
    1.0, -1.0, 1.0, 0.0, //
    -1.0, 1.0, 0.0, 1.0, //
    1.0, 1.0, 1.0, 1.0,
];
const QUAD_INDICES: [u16; 4] = [0, 1, 2, 3];
const STRIDE: i32 = 16;

/// Ordered stack of textured quads drawn into one target.
///
/// List order is draw order: later layers land on top. There is no depth
/// buffer. All layers share one program, so each layer's transform is
/// uploaded right before its draw.
#[derive(Debug)]
pub struct Compositor {
    program: Program,
    mvp: UniformLocation,
    target: Option<FboTarget>,
    size: (u32, u32),
    viewport: Viewport,
    layers: Vec<Layer>,
    next_id: u32,
    clear_color: Option<ColorRgba>,
}

impl Compositor {
    /// Composites into `target`.
    pub fn create(ctx: &RenderCtx<'_>, shaders: &ShaderLibrary, target: FboTarget) -> Result<Self> {
        Self::new(ctx, shaders, Some(target), target.width, target.height)
    }

    /// Composites into the default framebuffer of a `width x height` surface.
    pub fn create_for_screen(ctx: &RenderCtx<'_>, shaders: &ShaderLibrary, width: u32, height: u32) -> Result<Self> {
        Self::new(ctx, shaders, None, width, height)
    }

    fn new(
        ctx: &RenderCtx<'_>,
        shaders: &ShaderLibrary,
        target: Option<FboTarget>,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let program = shaders.program(ctx, COMPOSITOR_VS, QUAD_FS).inspect_err(|e| {
            log::error!("couldn't build compositor shaders: {e}");
        })?;
        let mvp = match program.uniform(ctx, "mvp") {
            Ok(loc) => loc,
            Err(e) => {
                log::error!("compositor program: {e}");
                program.destroy(ctx);
                return Err(e);
            }
        };

        Ok(Self {
            program,
            mvp,
            target,
            size: (width, height),
            viewport: Viewport::full(width, height),
            layers: Vec::new(),
            next_id: 0,
            clear_color: Some(ColorRgba::transparent()),
        })
    }

    // ── configuration ─────────────────────────────────────────────────────

    /// Region later display rects are relative to. Layers placed before the
    /// change keep their pixel viewport.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    #[inline]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Colour the target is cleared to before the layers are drawn, or
    /// `None` to draw over the previous contents.
    pub fn set_clear_color(&mut self, color: Option<ColorRgba>) {
        self.clear_color = color;
    }

    #[inline]
    pub fn clear_color(&self) -> Option<ColorRgba> {
        self.clear_color
    }

    #[inline]
    pub fn target(&self) -> Option<FboTarget> {
        self.target
    }

    // ── layers ────────────────────────────────────────────────────────────

    /// Appends a full-viewport layer with an identity transform and no
    /// texture.
    pub fn create_layer(&mut self, ctx: &RenderCtx<'_>) -> Result<LayerId> {
        let id = LayerId(self.next_id);
        let mut draw = DrawCall::create(ctx, &self.program)?;
        if let Err(e) = self.init_quad(ctx, &mut draw, id) {
            draw.destroy(ctx);
            return Err(e);
        }

        self.next_id += 1;
        self.layers.push(Layer {
            id,
            draw,
            transform: Mat4::IDENTITY,
            rect: Rect::unit(),
            texture: None,
            from_feed: false,
        });
        log::debug!("created {id} ({} layers)", self.layers.len());
        Ok(id)
    }

    fn init_quad(&self, ctx: &RenderCtx<'_>, draw: &mut DrawCall, id: LayerId) -> Result<()> {
        draw.set_label(id.to_string());
        draw.set_vertex_data(ctx, &QUAD);
        draw.set_indices(ctx, &QUAD_INDICES);
        draw.set_attribute(ctx, "position", 2, STRIDE, 0)?;
        draw.set_attribute(ctx, "tc", 2, STRIDE, 8)?;
        draw.set_fbo(self.target);
        draw.set_viewport(Rect::unit().to_viewport(self.viewport));
        Ok(())
    }

    /// Removes a layer and releases its buffers. Textures it showed are not
    /// touched.
    pub fn remove_layer(&mut self, ctx: &RenderCtx<'_>, id: LayerId) -> Result<()> {
        let pos = self.position(id)?;
        let layer = self.layers.remove(pos);
        layer.draw.destroy(ctx);
        log::debug!("removed {id} ({} layers)", self.layers.len());
        Ok(())
    }

    pub fn set_texture(&mut self, ctx: &RenderCtx<'_>, id: LayerId, texture: Option<TextureId>) -> Result<()> {
        let layer = self.layer_mut(id)?;
        match texture {
            Some(t) => {
                layer.draw.set_texture(ctx, "tex", TextureTarget::Texture2D, t)?;
            }
            None => layer.draw.clear_texture("tex"),
        }
        layer.texture = texture;
        Ok(())
    }

    /// Makes the layer sample the first plane of the feed passed to
    /// [`Compositor::draw`]. Suits single-plane (RGB) feeds.
    pub fn set_feed(&mut self, ctx: &RenderCtx<'_>, id: LayerId) -> Result<()> {
        let layer = self.layer_mut(id)?;
        layer.draw.set_feed_planes(ctx, &["tex"])?;
        layer.from_feed = true;
        Ok(())
    }

    /// Places the layer at `rect`, a fraction of the compositor viewport.
    /// Resolved to pixels now, not at draw time.
    pub fn set_display_rect(&mut self, id: LayerId, rect: Rect) -> Result<()> {
        let viewport = rect.to_viewport(self.viewport);
        let layer = self.layer_mut(id)?;
        layer.rect = rect;
        layer.draw.set_viewport(viewport);
        Ok(())
    }

    pub fn set_transform(&mut self, id: LayerId, transform: Mat4) -> Result<()> {
        self.layer_mut(id)?.transform = transform;
        Ok(())
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Layers in draw order.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    #[inline]
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    fn position(&self, id: LayerId) -> Result<usize> {
        self.layers.iter().position(|l| l.id == id).ok_or(Error::UnknownLayer(id.0))
    }

    fn layer_mut(&mut self, id: LayerId) -> Result<&mut Layer> {
        let pos = self.position(id)?;
        Ok(&mut self.layers[pos])
    }

    // ── drawing ───────────────────────────────────────────────────────────

    /// Clears the target, then draws every layer in list order.
    pub fn draw(&self, ctx: &RenderCtx<'_>, feed: Option<&FeedPlanes>) {
        let gl = ctx.gl;

        if let Some(c) = self.clear_color {
            let fb = self.target.map(|t| t.framebuffer);
            gl.bind_framebuffer(fb);
            gl.viewport(0, 0, self.size.0 as i32, self.size.1 as i32);
            gl.clear_color(c.r, c.g, c.b, c.a);
            gl.clear();
            if fb.is_some() {
                gl.bind_framebuffer(None);
            }
        }

        let program = self.program.id();
        for layer in &self.layers {
            gl.use_program(Some(program));
            gl.uniform_matrix4(self.mvp, layer.transform.as_array());
            gl.use_program(None);

            layer.draw.draw(ctx, feed);
        }
    }

    /// Releases every layer and the shared program.
    pub fn destroy(self, ctx: &RenderCtx<'_>) {
        for layer in self.layers {
            layer.draw.destroy(ctx);
        }
        self.program.destroy(ctx);
    }
}
