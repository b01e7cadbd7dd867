//! Off-screen render targets.

use crate::error::{Error, Result};
use crate::gl::{Filter, FramebufferId, PixelFormat, TextureId};

use super::{RenderCtx, Texture};

/// What a draw call needs to render into an FBO it does not own.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FboTarget {
    pub framebuffer: FramebufferId,
    pub texture: TextureId,
    pub width: u32,
    pub height: u32,
}

/// A framebuffer with a single RGBA texture as its color attachment.
#[derive(Debug)]
pub struct Fbo {
    framebuffer: FramebufferId,
    texture: Texture,
}

impl Fbo {
    /// Allocates a `width x height` target.
    ///
    /// A zero extent is rejected before touching GL. On an incomplete
    /// framebuffer both objects are released again.
    pub fn create(ctx: &RenderCtx<'_>, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            log::error!("refusing to create a {width}x{height} framebuffer");
            return Err(Error::InvalidSize { what: "framebuffer", width, height });
        }

        let gl = ctx.gl;
        let texture = Texture::empty(ctx, width, height, PixelFormat::Rgba, Filter::Linear)?;

        let framebuffer = match gl.create_framebuffer() {
            Ok(fb) => fb,
            Err(msg) => {
                log::error!("failed to create framebuffer: {msg}");
                texture.destroy(ctx);
                return Err(Error::creation("framebuffer", msg));
            }
        };

        gl.bind_framebuffer(Some(framebuffer));
        gl.framebuffer_texture_2d(Some(texture.id()));
        let complete = gl.framebuffer_complete();
        gl.bind_framebuffer(None);

        if !complete {
            log::error!("framebuffer {width}x{height} not complete");
            gl.delete_framebuffer(framebuffer);
            texture.destroy(ctx);
            return Err(Error::FramebufferIncomplete { width, height });
        }

        log::debug!("fbo {} {width}x{height}", framebuffer.get());
        Ok(Self { framebuffer, texture })
    }

    pub fn target(&self) -> FboTarget {
        FboTarget {
            framebuffer: self.framebuffer,
            texture: self.texture.id(),
            width: self.texture.width(),
            height: self.texture.height(),
        }
    }

    #[inline]
    pub fn texture(&self) -> TextureId {
        self.texture.id()
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.texture.height()
    }

    /// Reads the whole target as RGBA8, bottom row first.
    pub fn read_pixels(&self, ctx: &RenderCtx<'_>, out: &mut [u8]) {
        ctx.gl.bind_framebuffer(Some(self.framebuffer));
        ctx.gl.read_pixels_rgba(0, 0, self.width() as i32, self.height() as i32, out);
        ctx.gl.bind_framebuffer(None);
    }

    pub fn destroy(self, ctx: &RenderCtx<'_>) {
        ctx.gl.delete_framebuffer(self.framebuffer);
        self.texture.destroy(ctx);
    }
}

// ── CPU access ────────────────────────────────────────────────────────────

/// Pixels of a mapped FBO. RGBA8 rows, `stride` bytes apart.
#[derive(Debug, Copy, Clone)]
pub struct MappedFrame<'a> {
    pub data: &'a [u8],
    pub stride: usize,
    pub width: u32,
    pub height: u32,
    /// GL order: the first row in `data` is the bottom of the image.
    pub bottom_up: bool,
}

impl<'a> MappedFrame<'a> {
    /// Rows from the top of the image down, without padding.
    pub fn rows_top_down(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        let row_bytes = self.width as usize * 4;
        let rows = self.data.chunks(self.stride).take(self.height as usize);
        let rows: Vec<&'a [u8]> = rows.map(|r| &r[..row_bytes]).collect();
        let bottom_up = self.bottom_up;
        let n = rows.len();
        (0..n).map(move |i| if bottom_up { rows[n - 1 - i] } else { rows[i] })
    }

    /// Packed copy, top row first.
    pub fn to_top_down(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for row in self.rows_top_down() {
            out.extend_from_slice(row);
        }
        out
    }
}

/// CPU-mappable storage backing an FBO texture without a GPU to CPU copy.
///
/// Platform specific (VideoCore shared memory on the Pi); the engine only
/// drives the lock protocol.
pub trait SharedMemory {
    /// Makes the region the color storage of `texture`.
    fn attach(&mut self, texture: TextureId, width: u32, height: u32) -> std::result::Result<(), String>;
    /// Locks the region for CPU reads. Returns the bytes and the row stride.
    fn lock(&mut self) -> std::result::Result<(&[u8], usize), String>;
    fn unlock(&mut self);
}

enum Backing {
    /// `glReadPixels` into a CPU buffer on every map.
    Readback(Vec<u8>),
    Shared { memory: Box<dyn SharedMemory>, locked: bool },
}

/// An FBO whose pixels can be mapped for export.
///
/// Single-threaded: map and unmap from the GL thread only.
pub struct SharedFbo {
    fbo: Fbo,
    backing: Backing,
}

impl SharedFbo {
    /// Portable variant, mapping through pixel readback.
    pub fn create(ctx: &RenderCtx<'_>, width: u32, height: u32) -> Result<Self> {
        let fbo = Fbo::create(ctx, width, height)?;
        let buf = vec![0u8; width as usize * height as usize * 4];
        Ok(Self { fbo, backing: Backing::Readback(buf) })
    }

    /// Zero-copy variant over platform shared memory.
    pub fn with_shared_memory(
        ctx: &RenderCtx<'_>,
        width: u32,
        height: u32,
        mut memory: Box<dyn SharedMemory>,
    ) -> Result<Self> {
        let fbo = Fbo::create(ctx, width, height)?;
        if let Err(msg) = memory.attach(fbo.texture(), width, height) {
            log::error!("failed to attach shared memory to fbo: {msg}");
            fbo.destroy(ctx);
            return Err(Error::creation("shared memory", msg));
        }
        Ok(Self { fbo, backing: Backing::Shared { memory, locked: false } })
    }

    #[inline]
    pub fn fbo(&self) -> &Fbo {
        &self.fbo
    }

    #[inline]
    pub fn target(&self) -> FboTarget {
        self.fbo.target()
    }

    /// Makes the current contents readable from the CPU.
    pub fn map(&mut self, ctx: &RenderCtx<'_>) -> Result<MappedFrame<'_>> {
        let (width, height) = (self.fbo.width(), self.fbo.height());
        match &mut self.backing {
            Backing::Readback(buf) => {
                self.fbo.read_pixels(ctx, buf);
                Ok(MappedFrame { data: buf, stride: width as usize * 4, width, height, bottom_up: true })
            }
            Backing::Shared { memory, locked } => {
                ctx.gl.finish();
                let (data, stride) = memory.lock().map_err(Error::Export)?;
                *locked = true;
                Ok(MappedFrame { data, stride, width, height, bottom_up: true })
            }
        }
    }

    /// Ends CPU access. A no-op for the readback variant.
    pub fn unmap(&mut self) {
        if let Backing::Shared { memory, locked } = &mut self.backing
            && *locked
        {
            memory.unlock();
            *locked = false;
        }
    }

    pub fn destroy(mut self, ctx: &RenderCtx<'_>) {
        self.unmap();
        self.fbo.destroy(ctx);
    }
}

impl std::fmt::Debug for SharedFbo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backing = match self.backing {
            Backing::Readback(_) => "readback",
            Backing::Shared { .. } => "shared",
        };
        f.debug_struct("SharedFbo").field("fbo", &self.fbo).field("backing", &backing).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::gl::{Gl, HeadlessGl};

    #[test]
    fn zero_size_is_rejected_without_gl_objects() {
        let gl = HeadlessGl::new(4, 4);
        let ctx = RenderCtx::new(&gl);
        let err = Fbo::create(&ctx, 0, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidSize { width: 0, height: 0, .. }));
        assert_eq!(gl.live_objects(), Default::default());
    }

    #[test]
    fn creation_failure_releases_texture() {
        let gl = HeadlessGl::new(4, 4);
        let ctx = RenderCtx::new(&gl);
        let fbo = Fbo::create(&ctx, 2, 2).unwrap();
        fbo.destroy(&ctx);

        gl.set_fail_creation(true);
        assert!(Fbo::create(&ctx, 2, 2).is_err());
        assert_eq!(gl.live_objects().textures, 0);
        assert_eq!(gl.live_objects().framebuffers, 0);
    }

    #[test]
    fn map_reads_back_with_packed_stride() {
        let gl = HeadlessGl::new(4, 4);
        let ctx = RenderCtx::new(&gl);
        let mut fbo = SharedFbo::create(&ctx, 3, 2).unwrap();

        gl.bind_framebuffer(Some(fbo.target().framebuffer));
        gl.clear_color(0.0, 0.0, 1.0, 1.0);
        gl.clear();
        gl.bind_framebuffer(None);

        let frame = fbo.map(&ctx).unwrap();
        assert_eq!(frame.stride, 12);
        assert_eq!(frame.data.len(), 24);
        assert!(frame.data.chunks(4).all(|px| px == [0, 0, 255, 255]));
        fbo.unmap();
        fbo.destroy(&ctx);
        assert!(gl.binding_snapshot().framebuffer.is_none());
    }

    #[test]
    fn rows_top_down_flips_gl_order() {
        let data = [1u8, 1, 1, 1, 2, 2, 2, 2];
        let frame = MappedFrame { data: &data, stride: 4, width: 1, height: 2, bottom_up: true };
        assert_eq!(frame.to_top_down(), vec![2, 2, 2, 2, 1, 1, 1, 1]);
    }

    struct FakeShared {
        buf: Vec<u8>,
        calls: Rc<Cell<(usize, usize)>>,
    }

    impl SharedMemory for FakeShared {
        fn attach(&mut self, _: TextureId, w: u32, h: u32) -> std::result::Result<(), String> {
            self.buf = vec![9; (w * h * 4) as usize];
            Ok(())
        }
        fn lock(&mut self) -> std::result::Result<(&[u8], usize), String> {
            let (l, u) = self.calls.get();
            self.calls.set((l + 1, u));
            Ok((&self.buf, 8))
        }
        fn unlock(&mut self) {
            let (l, u) = self.calls.get();
            self.calls.set((l, u + 1));
        }
    }

    #[test]
    fn shared_memory_map_locks_and_unlocks_once() {
        let gl = HeadlessGl::new(4, 4);
        let ctx = RenderCtx::new(&gl);
        let calls = Rc::new(Cell::new((0, 0)));
        let mem = Box::new(FakeShared { buf: Vec::new(), calls: calls.clone() });
        let mut fbo = SharedFbo::with_shared_memory(&ctx, 2, 2, mem).unwrap();

        assert_eq!(fbo.map(&ctx).unwrap().stride, 8);
        fbo.unmap();
        fbo.unmap();
        assert_eq!(calls.get(), (1, 1));
        fbo.destroy(&ctx);
    }
}
