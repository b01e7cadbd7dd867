//! The per-frame scene: camera pipe, screen composite, overlay text and the
//! optional export path.

use anyhow::{Context as _, Result};

use campipe_engine::campipe::{Campipe, mesh_for_config};
use campipe_engine::compositor::Compositor;
use campipe_engine::config::PipelineConfig;
use campipe_engine::coords::Viewport;
use campipe_engine::export::{ExportStats, Exporter};
use campipe_engine::feed::{CameraFeed, Feed, StaticFeed, SyntheticProducer};
use campipe_engine::render::shader::{COMPOSITOR_VS, QUAD_FS};
use campipe_engine::render::{Program, RenderCtx, ShaderLibrary, SharedFbo};
use campipe_engine::runloop::{FrameControl, FrameCtx};
use campipe_engine::text::{Font, Label};

use crate::tcp::TcpSink;

struct Overlay {
    font: Font,
    program: Program,
    label: Label,
    size: f32,
}

struct ExportPath {
    fbo: SharedFbo,
    compositor: Compositor,
    exporter: Exporter<TcpSink>,
}

pub struct Studio {
    pipe: Campipe,
    screen: Compositor,
    overlay: Option<Overlay>,
    export: Option<ExportPath>,
}

impl Studio {
    pub fn build(ctx: &RenderCtx<'_>, config: &PipelineConfig, export: Option<TcpSink>) -> Result<Self> {
        let shaders = match &config.shader_dir {
            Some(dir) => ShaderLibrary::from_dir(dir.clone()),
            None => ShaderLibrary::builtin(),
        };

        let mesh = mesh_for_config(config).context("failed to build correction mesh")?;
        let feed: Box<dyn Feed> = match &config.texture {
            Some(path) => Box::new(
                StaticFeed::load(ctx, path).with_context(|| format!("failed to load {}", path.display()))?,
            ),
            None => Box::new(
                CameraFeed::new(ctx, SyntheticProducer::new(), config.camera.clone())
                    .context("failed to create camera feed")?,
            ),
        };
        let mut pipe = Campipe::with_mesh(ctx, &shaders, feed, mesh).context("failed to set up campipe")?;

        let out = &config.output;
        let output = pipe
            .output_create(ctx, out.width, out.height, out.apply_ldc)
            .context("failed to create campipe output")?;
        let texture = pipe.output_texture(output)?;

        let (sw, sh) = (config.screen.width, config.screen.height);
        let mut screen =
            Compositor::create_for_screen(ctx, &shaders, sw, sh).context("failed to create screen compositor")?;
        let layer = screen.create_layer(ctx)?;
        screen.set_texture(ctx, layer, Some(texture))?;

        let overlay = match &config.font {
            Some(fc) => {
                let font = Font::load(ctx, &fc.atlas, &fc.charset)
                    .with_context(|| format!("failed to load font {}", fc.atlas.display()))?;
                let program = shaders.program(ctx, COMPOSITOR_VS, QUAD_FS).context("failed to build text shader")?;
                let label = Label::create(ctx, &program, &font, Viewport::full(sw, sh))?;
                Some(Overlay { font, program, label, size: fc.size })
            }
            None => None,
        };

        let export = match export {
            Some(sink) => {
                let fbo = SharedFbo::create(ctx, out.width, out.height).context("failed to create export target")?;
                let mut compositor = Compositor::create(ctx, &shaders, fbo.target())?;
                let layer = compositor.create_layer(ctx)?;
                compositor.set_texture(ctx, layer, Some(texture))?;
                Some(ExportPath { fbo, compositor, exporter: Exporter::new(sink) })
            }
            None => None,
        };

        pipe.enable(ctx).context("failed to start feed")?;
        Ok(Self { pipe, screen, overlay, export })
    }

    /// One frame: dequeue, compose, export, queue. The frame is returned to
    /// the feed even when a later step fails.
    pub fn frame(&mut self, f: &FrameCtx<'_>) -> campipe_engine::Result<FrameControl> {
        let info = self.pipe.dequeue(&f.render)?;
        let drawn = self.compose(f, info.sequence);
        self.pipe.queue()?;
        drawn.map(|()| FrameControl::Continue)
    }

    fn compose(&mut self, f: &FrameCtx<'_>, sequence: u64) -> campipe_engine::Result<()> {
        let ctx = &f.render;
        self.screen.draw(ctx, None);

        if let Some(o) = &mut self.overlay {
            let text = format!("{sequence:>6} {:>5.1} ms", f.time.dt * 1000.0);
            o.label.set_text(ctx, &o.font, &text, -0.95, -0.95, o.size)?;
            o.label.draw(ctx);
        }

        if let Some(e) = &mut self.export {
            e.compositor.draw(ctx, None);
            let status = {
                let frame = e.fbo.map(ctx)?;
                e.exporter.submit(&frame)
            };
            e.fbo.unmap();
            status?;
        }
        Ok(())
    }

    pub fn teardown(self, ctx: &RenderCtx<'_>) -> Option<ExportStats> {
        let Self { pipe, screen, overlay, export } = self;

        let stats = export.map(|e| {
            let stats = match e.exporter.finish() {
                Ok((_, stats)) => stats,
                Err(err) => {
                    log::warn!("{err}");
                    ExportStats::default()
                }
            };
            e.compositor.destroy(ctx);
            e.fbo.destroy(ctx);
            stats
        });
        if let Some(o) = overlay {
            o.label.destroy(ctx);
            o.program.destroy(ctx);
            o.font.destroy(ctx);
        }
        screen.destroy(ctx);
        pipe.terminate(ctx);
        stats
    }
}
