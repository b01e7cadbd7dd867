//! Fixed-height bitmap fonts.
//!
//! An atlas is one image holding every glyph side by side. Its bottom pixel
//! row is not drawn: it holds one opaque white marker pixel after each glyph,
//! which is how glyph widths are found. Glyphs appear in charset order.

use std::path::Path;

use crate::error::{Error, FormatError, Result};
use crate::gl::{Filter, PixelFormat};
use crate::mesh::MeshVertex;
use crate::render::{ImageData, RenderCtx, Texture};

/// Stand-in for characters the atlas does not have.
pub const FALLBACK_GLYPH: u8 = 0x7f;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Glyph {
    /// Left and right texture coordinates.
    pub x1: f32,
    pub x2: f32,
    /// Width in atlas pixels.
    pub width: u32,
}

/// Vertices and triangle-list indices for a run of quads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementArray {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u16>,
}

/// Vertices a `u16` index buffer can address.
pub const MAX_ELEMENT_VERTICES: usize = u16::MAX as usize + 1;

impl ElementArray {
    /// Appends `other`, rebasing its indices past this array's vertices.
    /// Fails, leaving `self` untouched, if the result would not be
    /// addressable with `u16` indices.
    pub fn append(&mut self, other: ElementArray) -> Result<()> {
        let base = self.reserve_base(other.vertices.len())?;
        self.vertices.extend(other.vertices);
        self.indices.extend(other.indices.into_iter().map(|i| i + base));
        Ok(())
    }

    /// Index of the next vertex, provided `adding` more still fit.
    fn reserve_base(&self, adding: usize) -> Result<u16> {
        let count = self.vertices.len() + adding;
        if count > MAX_ELEMENT_VERTICES {
            return Err(Error::TooManyVertices { count, max: MAX_ELEMENT_VERTICES });
        }
        u16::try_from(self.vertices.len()).map_err(|_| Error::TooManyVertices { count, max: MAX_ELEMENT_VERTICES })
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[derive(Debug)]
pub struct Font {
    texture: Texture,
    /// Glyph height in pixels (the atlas minus its marker row).
    height: u32,
    /// Top texture coordinate of the glyph area.
    maxy: f32,
    glyphs: [Option<Glyph>; 128],
}

impl Font {
    pub fn load(ctx: &RenderCtx<'_>, path: impl AsRef<Path>, charset: &str) -> Result<Self> {
        let path = path.as_ref();
        let image = ImageData::load(path)?;
        Self::from_image(ctx, path, &image, charset)
    }

    /// `path` names the atlas in error messages.
    pub fn from_image(ctx: &RenderCtx<'_>, path: &Path, image: &ImageData, charset: &str) -> Result<Self> {
        let glyphs = detect_glyphs(path, image, charset)?;
        let texture = Texture::upload(ctx, image, Filter::Nearest)?;
        log::debug!(
            "loaded font {} ({} glyphs, {}px high)",
            path.display(),
            charset.len(),
            image.height - 1
        );
        Ok(Self {
            texture,
            height: image.height - 1,
            maxy: 1.0 - 1.0 / image.height as f32,
            glyphs,
        })
    }

    #[inline]
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    /// Glyph height in atlas pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The glyph drawn for `c`.
    pub fn glyph(&self, c: char) -> Glyph {
        let direct = u8::try_from(c).ok().and_then(|b| self.glyphs.get(b as usize).copied().flatten());
        // The fallback glyph's presence is checked at load.
        direct
            .or(self.glyphs[FALLBACK_GLYPH as usize])
            .unwrap_or(Glyph { x1: 0.0, x2: 0.0, width: 0 })
    }

    /// Quads for `text` with its top-left corner at `(x, y)`, glyphs `size`
    /// units high. Y grows downwards.
    pub fn layout(&self, text: &str, x: f32, y: f32, size: f32) -> Result<ElementArray> {
        let scale = size / self.height as f32;
        let mut out = ElementArray {
            vertices: Vec::with_capacity(text.len() * 4),
            indices: Vec::with_capacity(text.len() * 6),
        };

        let mut pen = x;
        for c in text.chars() {
            let g = self.glyph(c);
            let w = scale * g.width as f32;
            let base = out.reserve_base(4)?;

            out.vertices.extend([
                MeshVertex { position: [pen, y], tc: [g.x1, 0.0] },
                MeshVertex { position: [pen, y + size], tc: [g.x1, self.maxy] },
                MeshVertex { position: [pen + w, y + size], tc: [g.x2, self.maxy] },
                MeshVertex { position: [pen + w, y], tc: [g.x2, 0.0] },
            ]);
            out.indices.extend([0, 1, 2, 2, 3, 0].map(|i| base + i));
            pen += w;
        }
        Ok(out)
    }

    /// Width `layout` would give `text` at `size`.
    pub fn measure(&self, text: &str, size: f32) -> f32 {
        let scale = size / self.height as f32;
        text.chars().map(|c| scale * self.glyph(c).width as f32).sum()
    }

    pub fn destroy(self, ctx: &RenderCtx<'_>) {
        self.texture.destroy(ctx);
    }
}

fn detect_glyphs(path: &Path, image: &ImageData, charset: &str) -> Result<[Option<Glyph>; 128]> {
    let fail = |msg: String| {
        let e = FormatError::new(path, None, msg);
        log::error!("corrupt font image: {e}");
        e
    };

    if image.format == PixelFormat::Luminance {
        return Err(fail("atlas must be RGB or RGBA".into()).into());
    }
    if image.height < 2 || image.width == 0 {
        return Err(fail(format!("atlas is too small ({}x{})", image.width, image.height)).into());
    }
    if !charset.is_ascii() {
        return Err(fail("charset must be ASCII".into()).into());
    }
    if !charset.bytes().any(|b| b == FALLBACK_GLYPH) {
        return Err(fail("charset has no fallback glyph (0x7f)".into()).into());
    }

    let chars = charset.as_bytes();
    let marker_row = image.row(image.height - 1);
    let components = image.format.components();

    let mut glyphs = [None; 128];
    let mut found = 0;
    let mut start = 0u32;
    for x in 0..image.width {
        let px = &marker_row[x as usize * components..][..components];
        if px.iter().any(|&v| v != 0xff) {
            continue;
        }
        let Some(&c) = chars.get(found) else {
            return Err(fail(format!("too many width markers for {} characters", chars.len())).into());
        };
        let width = x - start;
        glyphs[c as usize] = Some(Glyph {
            x1: start as f32 / image.width as f32,
            x2: x as f32 / image.width as f32,
            width,
        });
        log::trace!("glyph {:?}: {width}px", c as char);
        found += 1;
        start = x + 1;
    }

    if found != chars.len() {
        return Err(fail(format!("{found} width markers for {} characters", chars.len())).into());
    }
    Ok(glyphs)
}
