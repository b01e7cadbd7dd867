use std::path::Path;

use crate::error::{Error, Result};
use crate::gl::{Filter, PixelFormat, TextureId, TextureTarget};

use super::RenderCtx;

/// Row alignment GLES2 unpacks with by default.
pub const ROW_ALIGN: usize = 4;

/// Decoded image: interleaved 8-bit components, rows padded to [`ROW_ALIGN`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub stride: usize,
    pub data: Vec<u8>,
}

impl ImageData {
    /// Row stride for `width` pixels of `format`.
    pub fn stride_for(width: u32, format: PixelFormat) -> usize {
        (width as usize * format.components()).next_multiple_of(ROW_ALIGN)
    }

    /// Builds an image from tightly packed rows, adding row padding.
    pub fn from_packed(width: u32, height: u32, format: PixelFormat, packed: &[u8]) -> Result<Self> {
        let row = width as usize * format.components();
        if packed.len() != row * height as usize {
            return Err(Error::InvalidSize { what: "image", width, height });
        }

        let stride = Self::stride_for(width, format);
        let mut data = vec![0u8; stride * height as usize];
        if row > 0 {
            for (dst, src) in data.chunks_mut(stride).zip(packed.chunks(row)) {
                dst[..row].copy_from_slice(src);
            }
        }
        Ok(Self { width, height, format, stride, data })
    }

    /// Loads a Netpbm (`.pnm .pbm .pgm .ppm .pam`) or PNG file.
    ///
    /// Grey images stay single-channel; anything with alpha or more than
    /// three channels becomes RGBA.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let fail = |message: String| Error::TextureLoad { path: path.to_path_buf(), message };

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !matches!(ext.as_str(), "pnm" | "pbm" | "pgm" | "ppm" | "pam" | "png") {
            return Err(fail(format!("unsupported image extension {ext:?}")));
        }

        let img = image::ImageReader::open(path)
            .map_err(|e| fail(e.to_string()))?
            .decode()
            .map_err(|e| fail(e.to_string()))?;

        let (width, height) = (img.width(), img.height());
        let (format, packed) = match img.color() {
            image::ColorType::L8 => (PixelFormat::Luminance, img.into_luma8().into_raw()),
            image::ColorType::Rgb8 | image::ColorType::Rgb16 => (PixelFormat::Rgb, img.into_rgb8().into_raw()),
            image::ColorType::L16 => (PixelFormat::Luminance, img.into_luma8().into_raw()),
            _ => (PixelFormat::Rgba, img.into_rgba8().into_raw()),
        };

        let data = Self::from_packed(width, height, format, &packed)?;
        log::debug!("loaded {} ({width}x{height}, {format:?})", path.display());
        Ok(data)
    }

    /// Row `y` without padding.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * self.format.components()]
    }

    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let n = self.format.components();
        let start = y as usize * self.stride + x as usize * n;
        &self.data[start..start + n]
    }
}

/// GPU-side 2D texture.
#[derive(Debug)]
pub struct Texture {
    id: TextureId,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl Texture {
    /// Uninitialised storage of the given size.
    pub fn empty(ctx: &RenderCtx<'_>, width: u32, height: u32, format: PixelFormat, filter: Filter) -> Result<Self> {
        Self::create(ctx, width, height, format, filter, None)
    }

    pub fn upload(ctx: &RenderCtx<'_>, image: &ImageData, filter: Filter) -> Result<Self> {
        Self::create(ctx, image.width, image.height, image.format, filter, Some(&image.data))
    }

    pub fn load(ctx: &RenderCtx<'_>, path: impl AsRef<Path>, filter: Filter) -> Result<Self> {
        let image = ImageData::load(path)?;
        Self::upload(ctx, &image, filter)
    }

    fn create(
        ctx: &RenderCtx<'_>,
        width: u32,
        height: u32,
        format: PixelFormat,
        filter: Filter,
        pixels: Option<&[u8]>,
    ) -> Result<Self> {
        let gl = ctx.gl;
        let id = gl.create_texture().map_err(|msg| {
            log::error!("failed to create {width}x{height} texture: {msg}");
            Error::creation("texture", msg)
        })?;

        gl.bind_texture(TextureTarget::Texture2D, Some(id));
        gl.tex_image_2d(TextureTarget::Texture2D, width, height, format, pixels);
        gl.tex_parameters(TextureTarget::Texture2D, filter);
        gl.bind_texture(TextureTarget::Texture2D, None);

        log::debug!("texture {} {width}x{height} {format:?}", id.get());
        Ok(Self { id, width, height, format })
    }

    #[inline]
    pub fn id(&self) -> TextureId {
        self.id
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn set_filter(&self, ctx: &RenderCtx<'_>, filter: Filter) {
        ctx.gl.bind_texture(TextureTarget::Texture2D, Some(self.id));
        ctx.gl.tex_parameters(TextureTarget::Texture2D, filter);
        ctx.gl.bind_texture(TextureTarget::Texture2D, None);
    }

    pub fn destroy(self, ctx: &RenderCtx<'_>) {
        ctx.gl.delete_texture(self.id);
    }
}
