use crate::coords::{Mat4, Viewport};
use crate::error::{Error, Result};
use crate::gl::{Primitive, TextureTarget};
use crate::mesh::MeshVertex;
use crate::render::{DrawCall, FboTarget, Program, RenderCtx};

use super::{ElementArray, Font};

/// Most characters one label can hold with 16-bit indices.
pub const MAX_LABEL_CHARS: usize = (u16::MAX as usize + 1) / 4;

/// A line of text drawn with one draw call.
///
/// Positions are in clip units with Y pointing down, so `(-1, -1)` is the
/// top-left corner of the viewport.
#[derive(Debug)]
pub struct Label {
    draw: DrawCall,
    /// Text and placement the buffers currently hold.
    laid_out: Option<(String, [f32; 3])>,
}

impl Label {
    /// `program` must take `position`/`tc` attributes, an `mvp` uniform and a
    /// `tex` sampler (the compositor program does).
    pub fn create(ctx: &RenderCtx<'_>, program: &Program, font: &Font, viewport: Viewport) -> Result<Self> {
        let mut draw = DrawCall::create(ctx, program)?;
        if let Err(e) = Self::configure(ctx, &mut draw, font, viewport) {
            draw.destroy(ctx);
            return Err(e);
        }
        Ok(Self { draw, laid_out: None })
    }

    fn configure(ctx: &RenderCtx<'_>, draw: &mut DrawCall, font: &Font, viewport: Viewport) -> Result<()> {
        draw.set_label("label");
        draw.set_primitive(Primitive::Triangles);
        draw.set_attribute(ctx, "position", 2, MeshVertex::STRIDE, MeshVertex::POSITION_OFFSET)?;
        draw.set_attribute(ctx, "tc", 2, MeshVertex::STRIDE, MeshVertex::TC_OFFSET)?;
        draw.set_texture(ctx, "tex", TextureTarget::Texture2D, font.texture().id())?;
        draw.set_mvp(ctx, &Mat4::flip_y())?;
        draw.set_viewport(viewport);
        Ok(())
    }

    /// Replaces the text. The buffers are only rewritten when the text or
    /// its placement changed.
    pub fn set_text(&mut self, ctx: &RenderCtx<'_>, font: &Font, text: &str, x: f32, y: f32, size: f32) -> Result<()> {
        if text.chars().count() > MAX_LABEL_CHARS {
            return Err(Error::InvalidSize { what: "label", width: text.len() as u32, height: 1 });
        }
        let placement = [x, y, size];
        if let Some((t, p)) = &self.laid_out
            && t == text
            && *p == placement
        {
            return Ok(());
        }
        self.upload(ctx, &font.layout(text, x, y, size)?);
        self.laid_out = Some((text.to_string(), placement));
        Ok(())
    }

    /// Uploads prebuilt quads, e.g. several runs joined with
    /// [`ElementArray::append`].
    pub fn upload(&mut self, ctx: &RenderCtx<'_>, elements: &ElementArray) {
        self.draw.set_vertex_data(ctx, &elements.vertices);
        self.draw.set_indices(ctx, &elements.indices);
        self.laid_out = None;
    }

    pub fn set_fbo(&mut self, fbo: Option<FboTarget>) {
        self.draw.set_fbo(fbo);
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.draw.set_viewport(viewport);
    }

    /// Text last set with [`Label::set_text`], empty after a raw upload.
    pub fn text(&self) -> &str {
        self.laid_out.as_ref().map_or("", |(t, _)| t)
    }

    pub fn draw(&self, ctx: &RenderCtx<'_>) {
        self.draw.draw(ctx, None);
    }

    pub fn draw_call(&self) -> &DrawCall {
        &self.draw
    }

    pub fn destroy(self, ctx: &RenderCtx<'_>) {
        self.draw.destroy(ctx);
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::gl::{Gl, HeadlessGl, PixelFormat};
    use crate::render::shader::{COMPOSITOR_VS, QUAD_FS};
    use crate::render::{ImageData, ShaderLibrary};

    fn font(ctx: &RenderCtx<'_>) -> Font {
        // "x" 1px wide, fallback 1px; markers at 1 and 3.
        let mut px = vec![0u8; 4 * 2 * 4];
        for m in [1usize, 3] {
            px[(4 + m) * 4..(4 + m) * 4 + 4].copy_from_slice(&[0xff; 4]);
        }
        let img = ImageData::from_packed(4, 2, PixelFormat::Rgba, &px).unwrap();
        Font::from_image(ctx, Path::new("f.png"), &img, "x\u{7f}").unwrap()
    }

    #[test]
    fn label_draws_triangles_for_its_text() {
        let gl = HeadlessGl::new(32, 32);
        let ctx = RenderCtx::new(&gl);
        let program = ShaderLibrary::builtin().program(&ctx, COMPOSITOR_VS, QUAD_FS).unwrap();
        let font = font(&ctx);

        let mut label = Label::create(&ctx, &program, &font, Viewport::full(32, 32)).unwrap();
        label.draw(&ctx);
        assert!(gl.draws().is_empty(), "empty label draws nothing");

        label.set_text(&ctx, &font, "xyz", -1.0, -1.0, 0.1).unwrap();
        assert_eq!(label.draw_call().index_count(), 18);
        label.draw(&ctx);

        let draws = gl.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].primitive, Primitive::Triangles);
        assert_eq!(draws[0].mvp, Some(Mat4::flip_y().0));
        assert_eq!(draws[0].textures, vec![(0, TextureTarget::Texture2D, font.texture().id())]);
        assert_eq!(gl.binding_snapshot(), Default::default());
    }

    #[test]
    fn unchanged_text_is_not_reuploaded() {
        let gl = HeadlessGl::new(32, 32);
        let ctx = RenderCtx::new(&gl);
        let program = ShaderLibrary::builtin().program(&ctx, COMPOSITOR_VS, QUAD_FS).unwrap();
        let font = font(&ctx);
        let mut label = Label::create(&ctx, &program, &font, Viewport::full(32, 32)).unwrap();

        label.set_text(&ctx, &font, "x", 0.0, 0.0, 0.1).unwrap();
        let vb = label.draw_call().vertex_buffer();
        let first = gl.buffer_contents(vb).unwrap();
        label.set_text(&ctx, &font, "x", 0.0, 0.0, 0.1).unwrap();
        assert_eq!(gl.buffer_contents(vb).unwrap(), first);
        assert_eq!(label.text(), "x");

        label.set_text(&ctx, &font, "x", 0.5, 0.0, 0.1).unwrap();
        assert_ne!(gl.buffer_contents(vb).unwrap(), first);
    }
}
